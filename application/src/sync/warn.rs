//! Rate-limited warnings
//!
//! A degraded mesh can trip the same warning on every write. This keeps at
//! most one per interval and reports how many were swallowed in between.

use std::sync::{Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Default)]
struct WarnState {
    last_emitted: Option<Instant>,
    suppressed: u64,
}

/// Gate for a single recurring warning
#[derive(Debug)]
pub struct RateLimitedWarning {
    interval: Duration,
    state: Mutex<WarnState>,
}

impl RateLimitedWarning {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            state: Mutex::new(WarnState::default()),
        }
    }

    /// Record an occurrence.
    ///
    /// Returns `Some(suppressed)` when the caller should emit the warning,
    /// where `suppressed` counts the occurrences swallowed since the last
    /// emission. Returns `None` inside the quiet interval.
    pub fn check(&self) -> Option<u64> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let now = Instant::now();
        let due = state
            .last_emitted
            .is_none_or(|last| now.duration_since(last) >= self.interval);
        if due {
            state.last_emitted = Some(now);
            Some(std::mem::take(&mut state.suppressed))
        } else {
            state.suppressed += 1;
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_one_warning_per_interval() {
        let warning = RateLimitedWarning::new(Duration::from_secs(15));

        assert_eq!(warning.check(), Some(0));
        assert_eq!(warning.check(), None);
        assert_eq!(warning.check(), None);

        tokio::time::advance(Duration::from_secs(14)).await;
        assert_eq!(warning.check(), None);

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(warning.check(), Some(3));
        assert_eq!(warning.check(), None);
    }
}
