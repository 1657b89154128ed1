//! Key to node selection.

pub mod hasher;
pub mod ring;

pub use hasher::murmur64a;
pub use ring::Ring;
