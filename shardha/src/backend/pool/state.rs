use serde::Serialize;

use super::{stats::Counts, Address, Config, Pool};

/// Pool state.
#[derive(Debug, Clone, Serialize)]
pub struct State {
    /// Node address.
    pub addr: Address,
    /// Pool is accepting checkouts.
    pub online: bool,
    /// Idle connections.
    pub idle: usize,
    /// Connections held by callers, including ones being opened.
    pub checked_out: usize,
    /// Pool configuration.
    pub config: Config,
    /// Counters.
    pub stats: Counts,
}

impl State {
    pub(super) fn get(pool: &Pool) -> Self {
        let checked_out = pool.checked_out();
        let guard = pool.lock();

        State {
            addr: pool.addr().clone(),
            online: guard.online,
            idle: guard.idle(),
            checked_out,
            config: *pool.config(),
            stats: guard.stats,
        }
    }
}
