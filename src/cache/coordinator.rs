//! Cache coordinator: best-effort orchestration against the remote store.

use chrono::{DateTime, Utc};

use super::store::RemoteStore;
use super::types::{CacheKey, MetadataResult};
use crate::installments::Installment;

/// Coordinates metadata reads, invalidation and saves for derived caches.
///
/// No operation here returns an error. Transport failures are logged and
/// turned into `false`, `0` or an unsuccessful `MetadataResult`, so the
/// dashboard can keep rendering whatever data it already has.
pub struct CacheCoordinator<S: RemoteStore> {
  store: S,
}

impl<S: RemoteStore> CacheCoordinator<S> {
  pub fn new(store: S) -> Self {
    Self { store }
  }

  #[cfg(test)]
  pub fn store(&self) -> &S {
    &self.store
  }

  /// Fetch metadata for every cache key.
  ///
  /// On failure the result has `success == false` and no data: treat the
  /// cache state as unknown.
  pub async fn fetch_metadata(&self) -> MetadataResult {
    match self.store.metadata().await {
      Ok(result) => {
        if !result.success {
          tracing::warn!("Cache store reported unsuccessful metadata fetch");
        }
        result
      }
      Err(e) => {
        tracing::warn!("Failed to fetch cache metadata: {}", e);
        MetadataResult::failed()
      }
    }
  }

  /// Discard the cached value for `key` ahead of a recompute.
  ///
  /// A failure is only logged; the stale entry will be caught again on the
  /// next cycle, so callers should carry on with their recompute.
  pub async fn invalidate(&self, key: CacheKey, new_hash: &str) -> bool {
    match self.store.invalidate(key).await {
      Ok(()) => {
        tracing::info!("Invalidated cache '{}' (new source hash {})", key, new_hash);
        true
      }
      Err(e) => {
        tracing::warn!("Failed to invalidate cache '{}': {}", key, e);
        false
      }
    }
  }

  /// Persist computed records, then the metadata describing them.
  ///
  /// Records are written first. If that fails the metadata is left alone so
  /// it never describes content that is not there. If the metadata write
  /// fails afterwards the records stay durable and `false` is returned so the
  /// caller can retry the metadata update alone.
  pub async fn save(&self, key: CacheKey, installments: &[Installment], new_hash: &str) -> bool {
    if key != CacheKey::Installments {
      tracing::warn!("No records endpoint for cache '{}', nothing saved", key);
      return false;
    }

    if let Err(e) = self.store.put_installments(installments).await {
      tracing::warn!("Failed to save cache '{}' records: {}", key, e);
      return false;
    }

    self.update_metadata(key, new_hash).await
  }

  /// Write metadata only, e.g. to retry after a partially failed `save`.
  pub async fn update_metadata(&self, key: CacheKey, new_hash: &str) -> bool {
    match self.store.update_metadata(key, new_hash).await {
      Ok(()) => {
        tracing::info!("Saved cache '{}' with source hash {}", key, new_hash);
        true
      }
      Err(e) => {
        tracing::warn!(
          "Records for cache '{}' saved but metadata update failed: {}",
          key,
          e
        );
        false
      }
    }
  }

  /// Ask the store to recompute time-based statuses as of now.
  pub async fn trigger_time_based_recompute(&self) -> u64 {
    self.trigger_time_based_recompute_at(Utc::now()).await
  }

  /// Returns the number of updated records, 0 on any failure.
  pub async fn trigger_time_based_recompute_at(&self, now: DateTime<Utc>) -> u64 {
    match self.store.update_statuses(now).await {
      Ok(updated) => {
        tracing::info!("Time-based status update changed {} installments", updated);
        updated
      }
      Err(e) => {
        tracing::warn!("Time-based status update failed: {}", e);
        0
      }
    }
  }
}
