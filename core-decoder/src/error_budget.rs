//! Tolerance for runs of undecodable packets.
//!
//! Both backends skip a corrupt packet and keep reading, but a file where
//! nothing decodes must not be read to the end packet by packet. The budget
//! counts failures in a row and is refilled by every decoded frame.

use tracing::{error, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorBudget {
    max: usize,
    consecutive: usize,
}

impl ErrorBudget {
    /// Allow up to `max` failures in a row.
    pub fn new(max: usize) -> Self {
        Self { max, consecutive: 0 }
    }

    /// Count a failure. Returns `false` once more than `max` failures
    /// happened without a success in between.
    pub fn record(&mut self, reason: &str) -> bool {
        self.consecutive += 1;
        if self.consecutive > self.max {
            error!(
                "Giving up after {} consecutive bad packets: {}",
                self.consecutive, reason
            );
            return false;
        }

        warn!(
            "Skipping bad packet ({}/{}): {}",
            self.consecutive, self.max, reason
        );
        true
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> usize {
        self.consecutive
    }

    pub fn max(&self) -> usize {
        self.max
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gives_up_after_max_plus_one() {
        let mut budget = ErrorBudget::new(3);
        assert!(budget.record("bad frame"));
        assert!(budget.record("bad frame"));
        assert!(budget.record("bad frame"));
        assert!(!budget.record("bad frame"));
        assert_eq!(budget.consecutive(), 4);
    }

    #[test]
    fn test_success_refills_budget() {
        let mut budget = ErrorBudget::new(2);
        assert!(budget.record("bad frame"));
        assert!(budget.record("bad frame"));
        budget.reset();
        assert_eq!(budget.consecutive(), 0);

        // A fresh run of `max` failures is tolerated again.
        assert!(budget.record("bad frame"));
        assert!(budget.record("bad frame"));
        assert!(!budget.record("bad frame"));
    }

    #[test]
    fn test_interleaved_successes_never_exhaust() {
        let mut budget = ErrorBudget::new(1);
        for _ in 0..100 {
            assert!(budget.record("bad frame"));
            budget.reset();
        }
        assert_eq!(budget.max(), 1);
    }
}
