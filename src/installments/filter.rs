use chrono::NaiveDate;

use super::Installment;

/// Dashboard filter over installments: due date range, order and store.
///
/// Bounds are inclusive. An installment without a due date never matches an
/// active date bound.
#[derive(Debug, Clone, Default)]
pub struct InstallmentFilter {
  pub from: Option<NaiveDate>,
  pub to: Option<NaiveDate>,
  pub order: Option<String>,
  pub store: Option<String>,
}

impl InstallmentFilter {
  pub fn matches(&self, installment: &Installment) -> bool {
    if self.from.is_some() || self.to.is_some() {
      let Some(due) = installment.due_date else {
        return false;
      };
      if self.from.is_some_and(|from| due < from) || self.to.is_some_and(|to| due > to) {
        return false;
      }
    }

    if let Some(order) = &self.order {
      if installment.order.as_deref() != Some(order.as_str()) {
        return false;
      }
    }

    if let Some(store) = &self.store {
      // Store names come from free text, compare case-insensitively
      match &installment.store {
        Some(s) if s.eq_ignore_ascii_case(store) => {}
        _ => return false,
      }
    }

    true
  }

  pub fn apply<'a>(&self, installments: &'a [Installment]) -> Vec<&'a Installment> {
    installments.iter().filter(|i| self.matches(i)).collect()
  }
}
