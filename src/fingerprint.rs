//! Dataset fingerprinting for cache change detection.
//!
//! A fingerprint is a cheap, lossy summary of a tabular dataset: record count,
//! count of recognized field values, the sum of every finite numeric contribution and the
//! greatest `dd/mm/yyyy` string seen. It is compared against the hash stored in
//! the remote cache metadata to decide whether derived data must be rebuilt.
//!
//! It is NOT a cryptographic digest. Two different datasets can produce the
//! same fingerprint, and cached entries written by other clients rely on the
//! exact string format, so it must stay this weak.

use regex::Regex;
use serde_json::Value;
use std::fmt;
use std::sync::LazyLock;

/// Fingerprint of an empty or non-sequence dataset.
pub const EMPTY_FINGERPRINT: &str = "empty";

/// Placeholder for the date component when no date field was recognized.
const NO_DATE: &str = "nodate";

const SEPARATOR: &str = "_";

static DATE_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^\d{2}/\d{2}/\d{4}$").expect("valid date regex"));

/// Thousands-grouped value with a comma decimal, e.g. `1.234,56`.
static EUROPEAN_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^-?\d{1,3}(?:\.\d{3})+,\d+$").expect("valid european regex"));

/// Leading plain number. Only the matched prefix is parsed, so `56,78` reads as 56.
static PLAIN_RE: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"^-?\d+\.?\d*").expect("valid plain number regex"));

/// Whether `text` looks like a `dd/mm/yyyy` date. No calendar validation.
pub fn is_day_month_year(text: &str) -> bool {
  DATE_RE.is_match(text)
}

/// Whether `text` matches either numeric pattern, finite or not.
fn is_numeric_text(text: &str) -> bool {
  EUROPEAN_RE.is_match(text) || PLAIN_RE.is_match(text)
}

/// Parse a numeric text value, European format first, then plain.
///
/// Returns `None` when neither pattern matches or the result is not finite.
pub fn parse_amount(text: &str) -> Option<f64> {
  let parsed = if EUROPEAN_RE.is_match(text) {
    text.replace('.', "").replace(',', ".").parse::<f64>().ok()
  } else {
    PLAIN_RE
      .find(text)
      .and_then(|m| m.as_str().parse::<f64>().ok())
  };

  parsed.filter(|n| n.is_finite())
}

/// Summary of a dataset used as its content hash.
#[derive(Debug, Clone, PartialEq)]
pub enum Fingerprint {
  /// Empty dataset, or input that is not a sequence at all
  Empty,
  Summary {
    /// Length of the sequence, including entries skipped as non-records
    records: usize,
    /// Number of recognized field values (numbers, dates, numeric text)
    fields: usize,
    /// Finite numeric contributions, rounded to cents
    sum: f64,
    /// Lexicographically greatest `dd/mm/yyyy` string
    latest_date: Option<String>,
  },
}

impl Fingerprint {
  /// Compute the fingerprint of a JSON dataset.
  ///
  /// Never fails: anything that is not an array of objects degrades to
  /// `Empty` or is skipped record by record.
  pub fn of(dataset: &Value) -> Self {
    let records = match dataset.as_array() {
      Some(records) if !records.is_empty() => records,
      _ => return Fingerprint::Empty,
    };

    let mut fields = 0usize;
    let mut sum = 0.0f64;
    let mut latest_date: Option<&str> = None;

    for record in records.iter().filter_map(Value::as_object) {
      for value in record.values() {
        match value {
          Value::Number(n) => {
            fields += 1;
            if let Some(n) = n.as_f64().filter(|n| n.is_finite()) {
              sum += n;
            }
          }
          Value::String(text) => {
            if is_day_month_year(text) {
              fields += 1;
              // String comparison on purpose: "31/01/2024" > "01/12/2024".
              if latest_date.map_or(true, |latest| text.as_str() > latest) {
                latest_date = Some(text.as_str());
              }
            } else if is_numeric_text(text) {
              fields += 1;
              if let Some(n) = parse_amount(text) {
                sum += n;
              }
            }
          }
          _ => {}
        }
      }
    }

    Fingerprint::Summary {
      records: records.len(),
      fields,
      sum: round_cents(sum),
      latest_date: latest_date.map(String::from),
    }
  }

  /// String form stored as `sourceDataHash` in the cache metadata.
  pub fn as_hash(&self) -> String {
    self.to_string()
  }
}

impl fmt::Display for Fingerprint {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Fingerprint::Empty => f.write_str(EMPTY_FINGERPRINT),
      Fingerprint::Summary {
        records,
        fields,
        sum,
        latest_date,
      } => write!(
        f,
        "{records}{SEPARATOR}{fields}{SEPARATOR}{}{SEPARATOR}{}",
        format_number(*sum),
        latest_date.as_deref().unwrap_or(NO_DATE)
      ),
    }
  }
}

/// Round to cents with ties going up, so `-0.125` becomes `-0.12`.
fn round_cents(value: f64) -> f64 {
  let rounded = (value * 100.0 + 0.5).floor() / 100.0;
  // Avoid "-0" in the hash
  if rounded == 0.0 {
    0.0
  } else {
    rounded
  }
}

/// Shortest round-trip form, switching to `1e+21` style from 1e21 upwards.
fn format_number(value: f64) -> String {
  if value.abs() < 1e21 {
    return value.to_string();
  }
  let exp = format!("{:e}", value);
  match exp.split_once('e') {
    Some((mantissa, exponent)) if !exponent.starts_with('-') => {
      format!("{}e+{}", mantissa, exponent)
    }
    _ => exp,
  }
}
