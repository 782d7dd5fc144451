//! Once-per-day gate for time-dependent installment statuses.

use chrono::{Local, NaiveDate};
use color_eyre::Result;

use crate::state::StateStore;

/// State key holding the local date of the last daily trigger.
pub const LAST_DAILY_UPDATE_KEY: &str = "lastDailyUpdate";

const MARKER_FORMAT: &str = "%Y-%m-%d";

/// Decides whether the automatic daily status refresh should run.
///
/// Only automatic triggering goes through here; a manual refresh is always
/// allowed and never touches the marker.
pub struct DailyUpdatePolicy<'a> {
  store: &'a StateStore,
}

impl<'a> DailyUpdatePolicy<'a> {
  pub fn new(store: &'a StateStore) -> Self {
    Self { store }
  }

  /// Check against today's date in the local timezone.
  pub fn should_update(&self) -> Result<bool> {
    self.should_update_on(Local::now().date_naive())
  }

  /// Returns true at most once per calendar day, recording `today` as the marker.
  pub fn should_update_on(&self, today: NaiveDate) -> Result<bool> {
    let marker = today.format(MARKER_FORMAT).to_string();
    let changed = self.store.set_if_changed(LAST_DAILY_UPDATE_KEY, &marker)?;

    if changed {
      tracing::debug!("Daily status update due for {}", marker);
    }

    Ok(changed)
  }

  /// Date of the last automatic trigger, if any.
  #[cfg(test)]
  pub fn last_update(&self) -> Result<Option<String>> {
    self.store.get(LAST_DAILY_UPDATE_KEY)
  }
}
