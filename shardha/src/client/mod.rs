//! Shard pool client.

use bytes::Bytes;

pub mod pipeline;
pub mod sharded;

pub use pipeline::Pipeline;
pub use sharded::ShardedClient;

/// Element returned by a blocking pop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Popped {
    /// List the element came from.
    pub key: Bytes,
    /// The element.
    pub value: Bytes,
}

#[cfg(test)]
pub(crate) mod test;
