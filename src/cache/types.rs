//! Core types shared by the cache transport and coordinator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Logical buckets of derived data held by the remote cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CacheKey {
  Installments,
  BankStatements,
  OrdenTiendaMap,
}

impl CacheKey {
  #[cfg(test)]
  pub const ALL: [CacheKey; 3] = [
    CacheKey::Installments,
    CacheKey::BankStatements,
    CacheKey::OrdenTiendaMap,
  ];

  /// Wire name of the key.
  pub fn as_str(&self) -> &'static str {
    match self {
      CacheKey::Installments => "installments",
      CacheKey::BankStatements => "bankStatements",
      CacheKey::OrdenTiendaMap => "ordenTiendaMap",
    }
  }
}

impl fmt::Display for CacheKey {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Metadata stored next to one cache key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheEntry {
  /// Fingerprint of the dataset the cached records were derived from
  pub source_data_hash: String,
  /// When the cached records were computed, as reported by the store
  #[serde(default)]
  pub calculated_at: Option<String>,
  /// Bumped by the store on every metadata update
  #[serde(default)]
  pub data_version: u64,
}

/// Metadata for every known cache key. `None` means never populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheMetadata {
  #[serde(default)]
  pub installments: Option<CacheEntry>,
  #[serde(default)]
  pub bank_statements: Option<CacheEntry>,
  #[serde(default)]
  pub orden_tienda_map: Option<CacheEntry>,
}

impl CacheMetadata {
  pub fn get(&self, key: CacheKey) -> Option<&CacheEntry> {
    match key {
      CacheKey::Installments => self.installments.as_ref(),
      CacheKey::BankStatements => self.bank_statements.as_ref(),
      CacheKey::OrdenTiendaMap => self.orden_tienda_map.as_ref(),
    }
  }

  #[cfg(test)]
  pub fn set(&mut self, key: CacheKey, entry: Option<CacheEntry>) {
    let slot = match key {
      CacheKey::Installments => &mut self.installments,
      CacheKey::BankStatements => &mut self.bank_statements,
      CacheKey::OrdenTiendaMap => &mut self.orden_tienda_map,
    };
    *slot = entry;
  }
}

/// Outcome of a metadata fetch. Mirrors the wire response.
///
/// `success == false` means the cache state is unknown and callers should
/// treat every key as stale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetadataResult {
  #[serde(default)]
  pub success: bool,
  #[serde(default)]
  pub data: Option<CacheMetadata>,
}

impl MetadataResult {
  pub fn failed() -> Self {
    Self {
      success: false,
      data: None,
    }
  }

  pub fn entry(&self, key: CacheKey) -> Option<&CacheEntry> {
    self.data.as_ref().and_then(|data| data.get(key))
  }
}

/// Where a cache key stands relative to the current source data.
///
/// `Unpopulated -> Populated(H) -> Stale -> (invalidate) -> Populated(H')`.
/// A key invalidated without a following save reads as `Unpopulated`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "camelCase")]
pub enum CacheState {
  /// Metadata could not be fetched
  Unknown,
  Unpopulated,
  Populated { hash: String },
  Stale { stored: String, current: String },
}

impl CacheState {
  /// Compare a stored entry against the fingerprint of the current data.
  pub fn evaluate(entry: Option<&CacheEntry>, current_hash: &str) -> Self {
    match entry {
      None => CacheState::Unpopulated,
      Some(entry) if entry.source_data_hash == current_hash => CacheState::Populated {
        hash: entry.source_data_hash.clone(),
      },
      Some(entry) => CacheState::Stale {
        stored: entry.source_data_hash.clone(),
        current: current_hash.to_string(),
      },
    }
  }

  /// Evaluate a key from a fetch result, `Unknown` if the fetch failed.
  pub fn from_metadata(result: &MetadataResult, key: CacheKey, current_hash: &str) -> Self {
    if !result.success {
      return CacheState::Unknown;
    }
    Self::evaluate(result.entry(key), current_hash)
  }

  /// Whether derived data has to be recomputed and saved.
  pub fn needs_rebuild(&self) -> bool {
    !matches!(self, CacheState::Populated { .. })
  }

  /// Whether a stored value may exist and must be discarded first.
  pub fn needs_invalidation(&self) -> bool {
    matches!(self, CacheState::Stale { .. } | CacheState::Unknown)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  fn entry(hash: &str) -> CacheEntry {
    CacheEntry {
      source_data_hash: hash.to_string(),
      calculated_at: None,
      data_version: 1,
    }
  }

  #[test]
  fn test_metadata_response_shape() {
    let body = json!({
      "success": true,
      "data": {
        "installments": {
          "sourceDataHash": "2_2_150_nodate",
          "calculatedAt": "2024-03-01T10:00:00.000Z",
          "dataVersion": 3
        },
        "bankStatements": null,
        "ordenTiendaMap": null
      }
    });

    let result: MetadataResult = serde_json::from_value(body).unwrap();
    assert!(result.success);
    let installments = result.entry(CacheKey::Installments).unwrap();
    assert_eq!(installments.source_data_hash, "2_2_150_nodate");
    assert_eq!(installments.data_version, 3);
    assert!(result.entry(CacheKey::BankStatements).is_none());
    assert!(result.entry(CacheKey::OrdenTiendaMap).is_none());
  }

  #[test]
  fn test_failed_response_has_no_data() {
    let result: MetadataResult =
      serde_json::from_value(json!({"success": false, "data": null})).unwrap();
    assert_eq!(result, MetadataResult::failed());
  }

  #[test]
  fn test_cache_key_wire_names() {
    for key in CacheKey::ALL {
      assert_eq!(serde_json::to_value(key).unwrap(), json!(key.as_str()));
    }
  }

  #[test]
  fn test_state_evaluation() {
    assert_eq!(CacheState::evaluate(None, "h"), CacheState::Unpopulated);
    assert_eq!(
      CacheState::evaluate(Some(&entry("h")), "h"),
      CacheState::Populated {
        hash: "h".to_string()
      }
    );

    let stale = CacheState::evaluate(Some(&entry("old")), "new");
    assert!(stale.needs_rebuild());
    assert!(stale.needs_invalidation());
  }

  #[test]
  fn test_failed_fetch_is_unknown() {
    let state = CacheState::from_metadata(&MetadataResult::failed(), CacheKey::Installments, "h");
    assert_eq!(state, CacheState::Unknown);
    assert!(state.needs_rebuild());
    assert!(state.needs_invalidation());
  }

  #[test]
  fn test_unpopulated_rebuilds_without_invalidation() {
    let result = MetadataResult {
      success: true,
      data: Some(CacheMetadata::default()),
    };
    let state = CacheState::from_metadata(&result, CacheKey::Installments, "h");
    assert!(state.needs_rebuild());
    assert!(!state.needs_invalidation());
  }
}
