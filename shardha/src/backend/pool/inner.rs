//! Pool internals synchronized with a mutex.

use super::{stats::Counts, Config};
use crate::backend::Backend;

/// Pool internals protected by a mutex.
#[derive(Default)]
pub(super) struct Inner {
    /// Idle connections, most recently used last.
    idle_connections: Vec<Box<dyn Backend>>,
    /// Pool configuration.
    pub(super) config: Config,
    /// Pool is online and available to callers.
    pub(super) online: bool,
    /// Counters.
    pub(super) stats: Counts,
}

impl std::fmt::Debug for Inner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Inner")
            .field("idle_connections", &self.idle_connections.len())
            .field("online", &self.online)
            .finish()
    }
}

impl Inner {
    /// New inner structure.
    pub(super) fn new(config: Config) -> Self {
        Self {
            idle_connections: Vec::new(),
            config,
            online: false,
            stats: Counts::default(),
        }
    }

    /// Number of idle connections in the pool.
    #[inline]
    pub(super) fn idle(&self) -> usize {
        self.idle_connections.len()
    }

    /// Take the most recently used idle connection.
    #[inline]
    pub(super) fn take(&mut self) -> Option<Box<dyn Backend>> {
        self.idle_connections.pop()
    }

    /// Place a healthy connection back into the idle list.
    /// Returns false if the connection was closed instead.
    #[inline]
    pub(super) fn put(&mut self, conn: Box<dyn Backend>) -> bool {
        if !self.online || self.idle() >= self.config.max_idle {
            self.stats.closed_idle += 1;
            false
        } else {
            self.stats.checkins += 1;
            self.idle_connections.push(conn);
            true
        }
    }

    /// Close all idle connections.
    #[inline]
    pub(super) fn dump_idle(&mut self) {
        self.idle_connections.clear();
    }
}
