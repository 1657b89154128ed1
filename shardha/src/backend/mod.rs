//! Backend nodes: connections, pools and sharding.

use async_trait::async_trait;

pub mod memory;
pub mod pool;
pub mod server;
pub mod sharding;

pub use memory::{MemoryConnector, MemoryNode};
pub use pool::{Address, Guard, Pool, PoolConfig, State};
pub use server::{Server, TcpConnector};
pub use sharding::Ring;

use crate::net::{Command, Value};
use crate::Error;

/// A live connection to one node.
///
/// Implementations return `Err` only for transport failures. Error replies
/// from the node come back as [`Value::Error`].
#[async_trait]
pub trait Backend: Send + std::fmt::Debug {
    /// Send one command and wait for its reply.
    async fn execute(&mut self, command: &Command) -> Result<Value, Error>;

    /// Send several commands at once and read all replies, in order.
    async fn execute_batch(&mut self, commands: &[Command]) -> Result<Vec<Value>, Error> {
        let mut replies = Vec::with_capacity(commands.len());
        for command in commands {
            replies.push(self.execute(command).await?);
        }
        Ok(replies)
    }

    /// Check the connection is alive.
    async fn ping(&mut self) -> Result<(), Error> {
        match self.execute(&Command::new("PING")).await? {
            Value::Simple(pong) if pong.eq_ignore_ascii_case("PONG") => Ok(()),
            _ => Err(Error::HealthcheckError),
        }
    }

    /// Node this connection talks to.
    fn addr(&self) -> &Address;
}

/// Opens connections to nodes.
#[async_trait]
pub trait Connect: Send + Sync + std::fmt::Debug {
    async fn connect(
        &self,
        addr: &Address,
        config: &pool::Config,
    ) -> Result<Box<dyn Backend>, Error>;
}
