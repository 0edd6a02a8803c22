//! Multi-winner grace window.

use std::time::Duration;
use tokio::time::Instant;

use crate::game::WinClaim;

/// Opened by the first accepted claim of a round. Collects further winners
/// until the deadline passes.
#[derive(Debug, Clone)]
pub struct GracePeriod {
    deadline: Instant,
    winners: Vec<WinClaim>,
}

impl GracePeriod {
    pub fn open(first: WinClaim, now: Instant, window: Duration) -> Self {
        Self {
            deadline: now + window,
            winners: vec![first],
        }
    }

    /// Append a winner accepted inside the window.
    pub fn add(&mut self, claim: WinClaim) {
        self.winners.push(claim);
    }

    pub fn has_elapsed(&self, now: Instant) -> bool {
        now >= self.deadline
    }

    pub fn remaining(&self, now: Instant) -> Duration {
        self.deadline.saturating_duration_since(now)
    }

    /// Winners in acceptance order.
    pub fn winners(&self) -> &[WinClaim] {
        &self.winners
    }

    pub fn into_winners(self) -> Vec<WinClaim> {
        self.winners
    }
}
