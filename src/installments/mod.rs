//! Installment ("cuota") records derived from the raw dataset.

mod filter;
mod metrics;

pub use filter::InstallmentFilter;
pub use metrics::aggregate_metrics;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::fingerprint::parse_amount;

/// Payment status of an installment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum InstallmentStatus {
  Done,
  Scheduled,
  Graced,
  Delayed,
  /// Any other value, kept verbatim and ignored by the metrics
  Other(String),
}

impl From<String> for InstallmentStatus {
  fn from(value: String) -> Self {
    match value.as_str() {
      "done" => Self::Done,
      "scheduled" => Self::Scheduled,
      "graced" => Self::Graced,
      "delayed" => Self::Delayed,
      _ => Self::Other(value),
    }
  }
}

impl From<InstallmentStatus> for String {
  fn from(status: InstallmentStatus) -> Self {
    match status {
      InstallmentStatus::Done => "done".to_string(),
      InstallmentStatus::Scheduled => "scheduled".to_string(),
      InstallmentStatus::Graced => "graced".to_string(),
      InstallmentStatus::Delayed => "delayed".to_string(),
      InstallmentStatus::Other(s) => s,
    }
  }
}

/// A single installment as stored in the remote cache.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Installment {
  #[serde(rename = "estadoCuota")]
  pub status: InstallmentStatus,
  #[serde(rename = "monto")]
  pub amount: f64,
  #[serde(
    rename = "fechaCuota",
    default,
    skip_serializing_if = "Option::is_none",
    with = "day_month_year"
  )]
  pub due_date: Option<NaiveDate>,
  #[serde(rename = "orden", default, skip_serializing_if = "Option::is_none")]
  pub order: Option<String>,
  #[serde(rename = "tienda", default, skip_serializing_if = "Option::is_none")]
  pub store: Option<String>,
}

impl Installment {
  /// Build an installment from one raw record. Missing fields degrade to defaults.
  fn from_record(record: &Map<String, Value>) -> Self {
    let status = match record.get("estadoCuota") {
      Some(Value::String(s)) => InstallmentStatus::from(s.trim().to_lowercase()),
      _ => InstallmentStatus::Other(String::new()),
    };

    let amount = match record.get("monto") {
      Some(Value::Number(n)) => n.as_f64().filter(|n| n.is_finite()).unwrap_or(0.0),
      Some(Value::String(s)) => parse_amount(s.trim()).unwrap_or(0.0),
      _ => 0.0,
    };

    let due_date = record
      .get("fechaCuota")
      .and_then(Value::as_str)
      .and_then(|s| NaiveDate::parse_from_str(s.trim(), day_month_year::FORMAT).ok());

    Self {
      status,
      amount,
      due_date,
      order: identifier(record.get("orden")),
      store: identifier(record.get("tienda")),
    }
  }
}

/// Text or numeric identifier rendered as text.
fn identifier(value: Option<&Value>) -> Option<String> {
  match value? {
    Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
    Value::Number(n) => Some(n.to_string()),
    _ => None,
  }
}

/// Derive installment records from a raw dataset.
///
/// Non-object entries are skipped; a non-array dataset yields nothing.
pub fn recompute_installments(dataset: &Value) -> Vec<Installment> {
  dataset
    .as_array()
    .map(|records| {
      records
        .iter()
        .filter_map(Value::as_object)
        .map(Installment::from_record)
        .collect()
    })
    .unwrap_or_default()
}

/// `dd/mm/yyyy` serde format for optional dates.
mod day_month_year {
  use chrono::NaiveDate;
  use serde::{Deserialize, Deserializer, Serializer};

  pub const FORMAT: &str = "%d/%m/%Y";

  pub fn serialize<S: Serializer>(date: &Option<NaiveDate>, s: S) -> Result<S::Ok, S::Error> {
    match date {
      Some(d) => s.serialize_str(&d.format(FORMAT).to_string()),
      None => s.serialize_none(),
    }
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Option<NaiveDate>, D::Error> {
    let raw: Option<String> = Option::deserialize(d)?;
    Ok(raw.and_then(|s| NaiveDate::parse_from_str(s.trim(), FORMAT).ok()))
  }
}
