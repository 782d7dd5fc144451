//! Display metrics over already computed installments.

use serde::Serialize;

use super::{Installment, InstallmentStatus};

/// Count and amount of installments in one status group.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct MetricBucket {
  pub count: usize,
  pub amount: f64,
}

impl MetricBucket {
  fn add(&mut self, amount: f64) {
    self.count += 1;
    self.amount += amount;
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct InstallmentMetrics {
  /// `done`
  pub paid: MetricBucket,
  /// `scheduled` and `graced`
  pub scheduled: MetricBucket,
  /// `delayed`
  pub overdue: MetricBucket,
  /// Every installment, including statuses outside the three groups
  pub total: MetricBucket,
}

pub fn aggregate_metrics<'a, I>(installments: I) -> InstallmentMetrics
where
  I: IntoIterator<Item = &'a Installment>,
{
  let mut metrics = InstallmentMetrics::default();

  for installment in installments {
    match installment.status {
      InstallmentStatus::Done => metrics.paid.add(installment.amount),
      InstallmentStatus::Scheduled | InstallmentStatus::Graced => {
        metrics.scheduled.add(installment.amount)
      }
      InstallmentStatus::Delayed => metrics.overdue.add(installment.amount),
      InstallmentStatus::Other(_) => {}
    }
    metrics.total.add(installment.amount);
  }

  metrics
}
