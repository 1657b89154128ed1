//! Pool configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Pool configuration.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq)]
pub struct Config {
    /// Maximum idle connections kept around.
    pub max_idle: usize,
    /// Maximum connections checked out at the same time.
    pub max_total: usize,
    /// How long to wait for a connection before giving up.
    pub checkout_timeout: Duration,
    /// How long to wait for a new connection to be established.
    pub connect_timeout: Duration,
    /// How long to wait for a reply.
    pub read_timeout: Duration,
    /// Ping idle connections before handing them out.
    pub test_on_borrow: bool,
    /// Ping connections before checking them back in.
    pub test_on_return: bool,
}

impl Config {
    /// Health check timeout.
    pub fn healthcheck_timeout(&self) -> Duration {
        self.read_timeout
    }
}

impl Default for Config {
    fn default() -> Self {
        (&shardha_config::Pool::default()).into()
    }
}

impl From<&shardha_config::Pool> for Config {
    fn from(pool: &shardha_config::Pool) -> Self {
        Self {
            max_idle: pool.max_idle,
            max_total: pool.max_total.max(1),
            checkout_timeout: pool.checkout_timeout(),
            connect_timeout: pool.connect_timeout_duration(),
            read_timeout: pool.read_timeout_duration(),
            test_on_borrow: pool.test_on_borrow,
            test_on_return: pool.test_on_return,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_config() {
        let pool = shardha_config::Pool {
            max_idle: 2,
            max_total: 0,
            max_wait: 150,
            test_on_borrow: true,
            ..Default::default()
        };
        let config = Config::from(&pool);

        assert_eq!(config.max_idle, 2);
        assert_eq!(config.max_total, 1);
        assert_eq!(config.checkout_timeout, Duration::from_millis(150));
        assert!(config.test_on_borrow);
        assert!(!config.test_on_return);
    }
}
