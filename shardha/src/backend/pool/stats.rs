//!
//! Pool statistics.
//!
//! Updated on checkout, check-in and connection creation.
//!

use std::ops::Sub;

use serde::{Deserialize, Serialize};

/// Pool counters.
#[derive(Debug, Clone, Default, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counts {
    /// How many times a connection has been given to a caller.
    pub checkouts: usize,
    /// Connections returned healthy.
    pub checkins: usize,
    /// Connections opened.
    pub connects: usize,
    /// Failed connection attempts.
    pub connect_errors: usize,
    /// Connections discarded as broken.
    pub errors: usize,
    /// Callers that gave up waiting for a connection.
    pub checkout_timeouts: usize,
    /// Health checks sent.
    pub healthchecks: usize,
    /// Healthy connections closed because the idle list was full.
    pub closed_idle: usize,
}

impl Sub for Counts {
    type Output = Counts;

    fn sub(self, rhs: Self) -> Self::Output {
        Self {
            checkouts: self.checkouts.saturating_sub(rhs.checkouts),
            checkins: self.checkins.saturating_sub(rhs.checkins),
            connects: self.connects.saturating_sub(rhs.connects),
            connect_errors: self.connect_errors.saturating_sub(rhs.connect_errors),
            errors: self.errors.saturating_sub(rhs.errors),
            checkout_timeouts: self.checkout_timeouts.saturating_sub(rhs.checkout_timeouts),
            healthchecks: self.healthchecks.saturating_sub(rhs.healthchecks),
            closed_idle: self.closed_idle.saturating_sub(rhs.closed_idle),
        }
    }
}
