//! Wire protocol.

pub mod command;
pub mod resp;
pub mod stream;

pub use command::Command;
pub use resp::Value;
pub use stream::Stream;
