use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Connection pool settings, one set per cluster.
///
/// All timeouts are in milliseconds.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Pool {
    /// Maximum number of idle connections kept per node.
    #[serde(default = "Pool::max_idle")]
    pub max_idle: usize,
    /// Maximum number of connections, idle and checked out, per node.
    #[serde(default = "Pool::max_total")]
    pub max_total: usize,
    /// How long to wait for a connection before giving up.
    #[serde(default = "Pool::max_wait")]
    pub max_wait: u64,
    /// Ping connections before handing them out.
    #[serde(default)]
    pub test_on_borrow: bool,
    /// Ping connections before putting them back.
    #[serde(default)]
    pub test_on_return: bool,
    /// How long to wait for a new connection to be established.
    #[serde(default = "Pool::connect_timeout")]
    pub connect_timeout: u64,
    /// Socket read timeout for one reply.
    #[serde(default = "Pool::read_timeout")]
    pub read_timeout: u64,
}

impl Default for Pool {
    fn default() -> Self {
        Self {
            max_idle: Self::max_idle(),
            max_total: Self::max_total(),
            max_wait: Self::max_wait(),
            test_on_borrow: false,
            test_on_return: false,
            connect_timeout: Self::connect_timeout(),
            read_timeout: Self::read_timeout(),
        }
    }
}

impl Pool {
    fn env_or_default<T: std::str::FromStr>(env_var: &str, default: T) -> T {
        env::var(env_var)
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn max_idle() -> usize {
        Self::env_or_default("SHARDHA_MAX_IDLE", 8)
    }

    fn max_total() -> usize {
        Self::env_or_default("SHARDHA_MAX_TOTAL", 8)
    }

    fn max_wait() -> u64 {
        Self::env_or_default("SHARDHA_MAX_WAIT", 1_000)
    }

    fn connect_timeout() -> u64 {
        Self::env_or_default("SHARDHA_CONNECT_TIMEOUT", 2_000)
    }

    fn read_timeout() -> u64 {
        Self::env_or_default("SHARDHA_READ_TIMEOUT", 2_000)
    }

    /// Checkout timeout.
    pub fn checkout_timeout(&self) -> Duration {
        Duration::from_millis(self.max_wait)
    }

    /// Connect timeout.
    pub fn connect_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.connect_timeout)
    }

    /// Read timeout.
    pub fn read_timeout_duration(&self) -> Duration {
        Duration::from_millis(self.read_timeout)
    }
}
