//! Manage connections to the nodes.

pub mod address;
pub mod config;
pub mod guard;
pub mod healthcheck;
pub mod inner;
pub mod pool_impl;
pub mod state;
pub mod stats;

pub use address::Address;
pub use config::Config;
pub use guard::Guard;
pub use healthcheck::Healthcheck;
pub use pool_impl::Pool;
pub use state::State;
pub use stats::Counts;

use inner::Inner;

/// Address and settings for one node's pool.
#[derive(Debug, Clone, PartialEq)]
pub struct PoolConfig {
    /// Node address.
    pub address: Address,
    /// Pool settings.
    pub config: Config,
}

#[cfg(test)]
pub mod test;
