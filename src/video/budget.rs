//! Session budget ledger.

/// The operation would push the session past its ceiling.
#[derive(Debug, Clone, Copy, PartialEq, thiserror::Error)]
#[error("Operation would exceed budget: ${projected:.2} > ${limit:.2}")]
pub struct BudgetExceeded {
    /// Spent so far plus the estimate that was rejected.
    pub projected: f64,
    pub limit: f64,
}

/// Spend and limit are kept in whole micro-dollars.
const MICROS_PER_USD: f64 = 1_000_000.0;

fn to_micros(usd: f64) -> i64 {
    (usd * MICROS_PER_USD).round() as i64
}

fn to_usd(micros: i64) -> f64 {
    micros as f64 / MICROS_PER_USD
}

/// Cumulative spend against a fixed ceiling.
///
/// Checking and charging are separate: `check` never changes the total, and
/// `commit` is only called once a generation actually succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BudgetLedger {
    limit: i64,
    spent: i64,
}

impl BudgetLedger {
    pub fn new(limit: f64) -> Self {
        Self {
            limit: to_micros(limit),
            spent: 0,
        }
    }

    /// Reject `estimated_cost` if it would take the total above the limit.
    /// Reaching the limit exactly is allowed.
    pub fn check(&self, estimated_cost: f64) -> Result<(), BudgetExceeded> {
        let projected = self.spent.saturating_add(to_micros(estimated_cost));
        if projected > self.limit {
            return Err(BudgetExceeded {
                projected: to_usd(projected),
                limit: self.limit(),
            });
        }
        Ok(())
    }

    /// Record the cost of a completed generation.
    pub fn commit(&mut self, actual_cost: f64) {
        self.spent = self.spent.saturating_add(to_micros(actual_cost).max(0));
    }

    pub fn spent(&self) -> f64 {
        to_usd(self.spent)
    }

    pub fn limit(&self) -> f64 {
        to_usd(self.limit)
    }

    /// Budget left; zero or negative once exhausted.
    pub fn remaining(&self) -> f64 {
        to_usd(self.limit - self.spent)
    }
}
