//! Configuration for the primary/secondary cluster pair.

pub mod cluster;
pub mod core;
pub mod error;
pub mod pooling;
pub mod properties;

pub use cluster::{Cluster, Node, Role, MAX_WEIGHT};
pub use self::core::Config;
pub use error::Error;
pub use pooling::Pool;
pub use properties::Properties;
