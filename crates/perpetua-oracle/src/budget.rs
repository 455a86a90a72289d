//! Daily oracle spend budget.
//!
//! The budget is a soft gate checked before each oracle call: once the
//! day's accumulated cost reaches the limit, the pipeline stops calling
//! the oracle and hands out budget fallbacks until the UTC date rolls
//! over. Charges already in flight when the limit is crossed still land,
//! so the spend can slightly overshoot; that is accepted.
//!
//! All monetary values use [`rust_decimal::Decimal`].

use std::sync::Mutex;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;

/// Thread-safe daily spend accumulator with UTC date rollover.
#[derive(Debug)]
pub struct DailyBudget {
    limit: Decimal,
    inner: Mutex<BudgetDay>,
}

#[derive(Debug, Clone, Copy)]
struct BudgetDay {
    date: NaiveDate,
    spent: Decimal,
}

/// Snapshot of the budget state, for logs and the admin surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BudgetSummary {
    /// The UTC day being accumulated.
    pub date: NaiveDate,
    /// Dollars spent so far today.
    pub spent: Decimal,
    /// The configured daily limit.
    pub limit: Decimal,
}

impl DailyBudget {
    /// Create a budget with a daily dollar limit.
    pub fn new(limit: Decimal) -> Self {
        Self {
            limit,
            inner: Mutex::new(BudgetDay {
                date: Utc::now().date_naive(),
                spent: Decimal::ZERO,
            }),
        }
    }

    /// Whether today's spend has reached the limit.
    pub fn is_exhausted(&self) -> bool {
        self.is_exhausted_on(Utc::now().date_naive())
    }

    /// Record a charge against today's budget.
    pub fn charge(&self, cost: Decimal) {
        self.charge_on(Utc::now().date_naive(), cost);
    }

    /// Snapshot today's state.
    pub fn summary(&self) -> BudgetSummary {
        let date = Utc::now().date_naive();
        let Ok(mut day) = self.inner.lock() else {
            return BudgetSummary {
                date,
                spent: Decimal::ZERO,
                limit: self.limit,
            };
        };
        roll_over(&mut day, date);
        BudgetSummary {
            date: day.date,
            spent: day.spent,
            limit: self.limit,
        }
    }

    fn is_exhausted_on(&self, date: NaiveDate) -> bool {
        let Ok(mut day) = self.inner.lock() else {
            // A poisoned budget fails closed: no more spend today.
            return true;
        };
        roll_over(&mut day, date);
        day.spent >= self.limit
    }

    fn charge_on(&self, date: NaiveDate, cost: Decimal) {
        let Ok(mut day) = self.inner.lock() else {
            return;
        };
        roll_over(&mut day, date);
        day.spent = day.spent.checked_add(cost).unwrap_or(day.spent);
        if day.spent >= self.limit {
            tracing::warn!(
                spent = %day.spent,
                limit = %self.limit,
                "daily oracle budget exhausted"
            );
        }
    }
}

/// Reset the accumulator when the UTC date has moved on.
fn roll_over(day: &mut BudgetDay, date: NaiveDate) {
    if day.date != date {
        tracing::info!(from = %day.date, to = %date, spent = %day.spent, "budget day rolled over");
        day.date = date;
        day.spent = Decimal::ZERO;
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn day(n: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 8, n).unwrap()
    }

    #[test]
    fn charges_accumulate_toward_the_limit() {
        let budget = DailyBudget::new(dec!(1.00));
        let today = day(1);
        budget.charge_on(today, dec!(0.40));
        assert!(!budget.is_exhausted_on(today));
        budget.charge_on(today, dec!(0.60));
        assert!(budget.is_exhausted_on(today));
    }

    #[test]
    fn overshoot_still_lands() {
        let budget = DailyBudget::new(dec!(0.50));
        let today = day(1);
        budget.charge_on(today, dec!(0.40));
        // In-flight call completes after the gate check.
        budget.charge_on(today, dec!(0.40));
        assert!(budget.is_exhausted_on(today));
    }

    #[test]
    fn date_rollover_resets_the_spend() {
        let budget = DailyBudget::new(dec!(1.00));
        budget.charge_on(day(1), dec!(1.00));
        assert!(budget.is_exhausted_on(day(1)));
        assert!(!budget.is_exhausted_on(day(2)));
    }

    #[test]
    fn zero_limit_is_always_exhausted() {
        let budget = DailyBudget::new(Decimal::ZERO);
        assert!(budget.is_exhausted_on(day(1)));
    }
}
