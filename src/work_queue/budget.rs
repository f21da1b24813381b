//! Per-page wall-clock budget.

use std::time::Duration;

use tokio::time::Instant;

/// Tracks elapsed time for one page against its budget.
///
/// Uses the tokio clock, which is monotonic and can be paused in tests.
#[derive(Debug, Clone, Copy)]
pub struct PageBudget {
    started: Instant,
    budget: Duration,
}

impl PageBudget {
    /// Start the clock now.
    pub fn start(budget: Duration) -> Self {
        Self {
            started: Instant::now(),
            budget,
        }
    }

    pub fn budget(&self) -> Duration {
        self.budget
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// True once elapsed time is strictly greater than the budget.
    pub fn over_budget(&self) -> bool {
        self.elapsed() > self.budget
    }

    /// Time left before the budget is spent, zero once over.
    pub fn remaining(&self) -> Duration {
        self.budget.saturating_sub(self.elapsed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_over_budget_after_elapsed() {
        let budget = PageBudget::start(Duration::from_secs(10));
        assert!(!budget.over_budget());
        assert_eq!(budget.remaining(), Duration::from_secs(10));

        tokio::time::advance(Duration::from_secs(4)).await;
        assert_eq!(budget.remaining(), Duration::from_secs(6));
        assert!(!budget.over_budget());

        tokio::time::advance(Duration::from_secs(7)).await;
        assert!(budget.over_budget());
        assert_eq!(budget.remaining(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exactly_at_budget_is_not_over() {
        let budget = PageBudget::start(Duration::from_secs(2));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert!(!budget.over_budget());
    }
}
