//! One sync cycle of the installment cache.
//!
//! 1. Fingerprint the raw dataset
//! 2. Compare against the stored metadata for `installments`
//! 3. On mismatch (or unknown state): invalidate, recompute, save under the new hash
//! 4. Independently, run the time-based status refresh once per calendar day

use chrono::{DateTime, Utc};
use color_eyre::Result;
use serde::Serialize;
use serde_json::Value;

use crate::cache::{CacheCoordinator, CacheKey, CacheState, RemoteStore};
use crate::fingerprint::Fingerprint;
use crate::installments::recompute_installments;
use crate::staleness::DailyUpdatePolicy;
use crate::state::StateStore;

/// What a sync cycle did.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
  pub fingerprint: String,
  /// State of the installments cache before this cycle
  pub cache_state: CacheState,
  /// Installments were recomputed from the dataset
  pub recomputed: bool,
  /// Invalidation was attempted and acknowledged
  pub invalidated: bool,
  /// Records and metadata were both written
  pub saved: bool,
  /// The daily gate fired during this cycle
  pub daily_update: bool,
  pub statuses_updated: u64,
}

pub struct Synchronizer<S: RemoteStore> {
  coordinator: CacheCoordinator<S>,
  state: StateStore,
}

impl<S: RemoteStore> Synchronizer<S> {
  pub fn new(store: S, state: StateStore) -> Self {
    Self {
      coordinator: CacheCoordinator::new(store),
      state,
    }
  }

  #[cfg(test)]
  pub fn coordinator(&self) -> &CacheCoordinator<S> {
    &self.coordinator
  }

  pub async fn sync(&self, dataset: &Value) -> SyncReport {
    self
      .run(dataset, |policy| policy.should_update(), Utc::now())
      .await
  }

  /// Run a sync cycle as if the current instant were `now`.
  #[cfg(test)]
  pub async fn sync_at(&self, dataset: &Value, now: DateTime<chrono::Local>) -> SyncReport {
    self
      .run(
        dataset,
        |policy| policy.should_update_on(now.date_naive()),
        now.with_timezone(&Utc),
      )
      .await
  }

  /// `gate` consults the daily policy; `now` is sent with the status refresh.
  async fn run<F>(&self, dataset: &Value, gate: F, now: DateTime<Utc>) -> SyncReport
  where
    F: FnOnce(&DailyUpdatePolicy<'_>) -> Result<bool>,
  {
    let key = CacheKey::Installments;
    let fingerprint = Fingerprint::of(dataset).as_hash();

    let metadata = self.coordinator.fetch_metadata().await;
    let cache_state = CacheState::from_metadata(&metadata, key, &fingerprint);
    tracing::info!("Cache '{}' is {:?}", key, cache_state);

    let mut report = SyncReport {
      fingerprint,
      cache_state,
      recomputed: false,
      invalidated: false,
      saved: false,
      daily_update: false,
      statuses_updated: 0,
    };

    if report.cache_state.needs_rebuild() {
      // Invalidate strictly before saving for the same key
      if report.cache_state.needs_invalidation() {
        report.invalidated = self.coordinator.invalidate(key, &report.fingerprint).await;
      }

      let installments = recompute_installments(dataset);
      report.recomputed = true;
      tracing::debug!("Recomputed {} installments", installments.len());

      report.saved = self
        .coordinator
        .save(key, &installments, &report.fingerprint)
        .await;
    }

    let policy = DailyUpdatePolicy::new(&self.state);
    report.daily_update = match gate(&policy) {
      Ok(due) => due,
      Err(e) => {
        tracing::warn!("Daily update check failed, skipping: {}", e);
        false
      }
    };

    if report.daily_update {
      report.statuses_updated = self
        .coordinator
        .trigger_time_based_recompute_at(now)
        .await;
    }

    report
  }

  /// Manual status refresh, not subject to the daily gate.
  pub async fn refresh_statuses(&self) -> u64 {
    self.coordinator.trigger_time_based_recompute().await
  }
}
