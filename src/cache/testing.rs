//! In-memory remote store with failure injection, for tests.

use chrono::{DateTime, SecondsFormat, Utc};
use color_eyre::{eyre::eyre, Result};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use super::store::RemoteStore;
use super::types::{CacheEntry, CacheKey, CacheMetadata, MetadataResult};
use crate::installments::Installment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Failure {
  Metadata,
  Invalidate,
  PutInstallments,
  UpdateMetadata,
  UpdateStatuses,
}

#[derive(Default)]
struct Inner {
  metadata: CacheMetadata,
  versions: HashMap<CacheKey, u64>,
  installments: Vec<Installment>,
  failures: HashSet<Failure>,
  status_updates: u64,
  status_requests: Vec<DateTime<Utc>>,
  calls: Vec<String>,
}

/// Behaves like the remote cache store: invalidation drops records and
/// metadata, metadata updates stamp the time and bump the version.
#[derive(Default)]
pub struct MemoryStore {
  inner: Mutex<Inner>,
}

impl MemoryStore {
  pub fn fail(&self, failure: Failure) {
    self.inner.lock().unwrap().failures.insert(failure);
  }

  pub fn recover(&self, failure: Failure) {
    self.inner.lock().unwrap().failures.remove(&failure);
  }

  pub fn set_status_updates(&self, updated: u64) {
    self.inner.lock().unwrap().status_updates = updated;
  }

  pub fn installments(&self) -> Vec<Installment> {
    self.inner.lock().unwrap().installments.clone()
  }

  pub fn calls(&self) -> Vec<String> {
    self.inner.lock().unwrap().calls.clone()
  }

  pub fn status_requests(&self) -> Vec<DateTime<Utc>> {
    self.inner.lock().unwrap().status_requests.clone()
  }

  fn begin(&self, call: &str, failure: Failure) -> Result<std::sync::MutexGuard<'_, Inner>> {
    let mut inner = self.inner.lock().unwrap();
    inner.calls.push(call.to_string());
    if inner.failures.contains(&failure) {
      return Err(eyre!("{} failed (injected)", call));
    }
    Ok(inner)
  }
}

impl RemoteStore for MemoryStore {
  async fn metadata(&self) -> Result<MetadataResult> {
    let inner = self.begin("metadata", Failure::Metadata)?;
    Ok(MetadataResult {
      success: true,
      data: Some(inner.metadata.clone()),
    })
  }

  async fn invalidate(&self, key: CacheKey) -> Result<()> {
    let mut inner = self.begin("invalidate", Failure::Invalidate)?;
    inner.metadata.set(key, None);
    if key == CacheKey::Installments {
      inner.installments.clear();
    }
    Ok(())
  }

  async fn put_installments(&self, installments: &[Installment]) -> Result<()> {
    let mut inner = self.begin("put_installments", Failure::PutInstallments)?;
    inner.installments = installments.to_vec();
    Ok(())
  }

  async fn update_metadata(&self, key: CacheKey, source_data_hash: &str) -> Result<()> {
    let mut inner = self.begin("update_metadata", Failure::UpdateMetadata)?;
    let version = inner.versions.entry(key).or_insert(0);
    *version += 1;
    let entry = CacheEntry {
      source_data_hash: source_data_hash.to_string(),
      calculated_at: Some(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)),
      data_version: *version,
    };
    inner.metadata.set(key, Some(entry));
    Ok(())
  }

  async fn update_statuses(&self, current_date: DateTime<Utc>) -> Result<u64> {
    let mut inner = self.begin("update_statuses", Failure::UpdateStatuses)?;
    inner.status_requests.push(current_date);
    Ok(inner.status_updates)
  }
}
