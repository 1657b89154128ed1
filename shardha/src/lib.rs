//! High-availability client over two sharded Redis clusters.

pub mod backend;
pub mod cli;
pub mod client;
pub mod codec;
pub mod error;
pub mod ha;
pub mod net;
pub mod outcome;

pub use backend::{Address, MemoryConnector, MemoryNode, Pool, TcpConnector};
pub use client::{Pipeline, Popped, ShardedClient};
pub use error::Error;
pub use ha::HaClient;
pub use outcome::Outcome;
pub use shardha_config::{Cluster, Config, Node, Role};

use std::io::IsTerminal;

use tracing::level_filters::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Install the log subscriber. Level comes from `RUST_LOG`, default `info`.
/// Set `SHARDHA_LOG_JSON` for JSON output.
///
/// Safe to call more than once.
pub fn logger() {
    let json = std::env::var_os("SHARDHA_LOG_JSON").is_some();

    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();

    let text = (!json).then(|| {
        fmt::layer()
            .with_ansi(std::io::stderr().is_terminal())
            .with_writer(std::io::stderr)
            .with_file(false)
    });
    let json = json.then(|| fmt::layer().json().with_writer(std::io::stderr));

    let _ = tracing_subscriber::registry()
        .with(text)
        .with(json)
        .with(filter)
        .try_init();
}
