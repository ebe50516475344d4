// Restart budget for the recovery loop

use tracing::{debug, warn};

/// What the recovery loop may do after a failed health check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BudgetDecision {
    /// Restart; `attempt` is the 1-based consecutive failure count.
    Restart { attempt: u32 },
    /// No restarts left. `first` is true only on the check that used up the
    /// budget, so the exhaustion is reported once.
    Exhausted { first: bool },
}

/// Counts consecutive failed health checks. Any healthy check resets it.
#[derive(Debug, Clone)]
pub struct RestartBudget {
    consecutive_failures: u32,
    max_attempts: u32,
}

impl RestartBudget {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            consecutive_failures: 0,
            max_attempts,
        }
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_exhausted(&self) -> bool {
        self.consecutive_failures >= self.max_attempts
    }

    /// Record a failed check. The counter saturates at `max_attempts`.
    pub fn record_failure(&mut self) -> BudgetDecision {
        if self.is_exhausted() {
            debug!(
                "Restart budget already exhausted ({}/{})",
                self.consecutive_failures, self.max_attempts
            );
            return BudgetDecision::Exhausted { first: false };
        }

        self.consecutive_failures += 1;

        if self.is_exhausted() {
            warn!(
                "Restart budget exhausted after {} consecutive failures",
                self.consecutive_failures
            );
            BudgetDecision::Exhausted { first: true }
        } else {
            BudgetDecision::Restart {
                attempt: self.consecutive_failures,
            }
        }
    }

    /// Record a healthy check. Returns the failure count it cleared, if any.
    pub fn record_success(&mut self) -> Option<u32> {
        let cleared = self.consecutive_failures;
        self.consecutive_failures = 0;
        (cleared > 0).then_some(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exhausts_after_max_attempts() {
        let mut budget = RestartBudget::new(3);
        assert_eq!(budget.record_failure(), BudgetDecision::Restart { attempt: 1 });
        assert_eq!(budget.record_failure(), BudgetDecision::Restart { attempt: 2 });
        assert_eq!(budget.record_failure(), BudgetDecision::Exhausted { first: true });
        assert_eq!(budget.record_failure(), BudgetDecision::Exhausted { first: false });
        assert_eq!(budget.consecutive_failures(), 3);
        assert!(budget.is_exhausted());
    }

    #[test]
    fn test_success_resets() {
        let mut budget = RestartBudget::new(3);
        assert_eq!(budget.record_success(), None);

        budget.record_failure();
        budget.record_failure();
        assert_eq!(budget.record_success(), Some(2));
        assert_eq!(budget.consecutive_failures(), 0);
        assert_eq!(budget.record_failure(), BudgetDecision::Restart { attempt: 1 });
    }

    #[test]
    fn test_single_attempt_budget() {
        let mut budget = RestartBudget::new(1);
        assert_eq!(budget.record_failure(), BudgetDecision::Exhausted { first: true });
    }
}
