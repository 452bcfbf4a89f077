//! # Error Backoff
//!
//! Requeue delays for tenants whose reconciliation keeps failing.
//!
//! Delays follow the Fibonacci sequence in whole minutes starting at the
//! configured minimum: 1m, 1m, 2m, 3m, 5m, 8m, then the cap (10m by default).
//! A successful pass drops the tenant's state, so the next failure starts
//! over.
//!
//! ```rust
//! use capsule_argo_addon::controller::backoff::BackoffState;
//! use std::time::Duration;
//!
//! let mut state = BackoffState::new(1, 10);
//! assert_eq!(state.record_error(), Duration::from_secs(60));
//! assert_eq!(state.record_error(), Duration::from_secs(60));
//! assert_eq!(state.record_error(), Duration::from_secs(120));
//! ```

use std::time::Duration;

/// Consecutive failures of one tenant and the delay owed for the next one
#[derive(Debug, Clone)]
pub struct BackoffState {
    pub error_count: u32,
    /// Delay handed out before the current one (minutes)
    previous: u64,
    /// Delay handed out on the next failure (minutes)
    upcoming: u64,
    cap: u64,
}

impl BackoffState {
    /// Bounds are in minutes; the floor is at least one minute and the cap at
    /// least the floor
    pub fn new(min_minutes: u64, max_minutes: u64) -> Self {
        let floor = min_minutes.max(1);
        Self {
            error_count: 0,
            previous: 0,
            upcoming: floor,
            cap: max_minutes.max(floor),
        }
    }

    /// Count a failure and return the delay before the next attempt
    pub fn record_error(&mut self) -> Duration {
        self.error_count = self.error_count.saturating_add(1);

        let minutes = self.upcoming;
        let following = self.previous.saturating_add(self.upcoming).min(self.cap);
        self.previous = self.upcoming;
        self.upcoming = following;

        Duration::from_secs(minutes.saturating_mul(60))
    }
}
