//! Redis server connection over TCP.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::{pool::Config, Address, Backend, Connect};
use crate::net::{Command, Stream, Value};
use crate::Error;

/// Redis server connection.
#[derive(Debug)]
pub struct Server {
    addr: Address,
    stream: Stream<TcpStream>,
    read_timeout: Duration,
}

impl Server {
    /// Open a new connection.
    pub async fn connect(addr: &Address, config: &Config) -> Result<Self, Error> {
        debug!("=> {}", addr);
        let stream = TcpStream::connect(addr.addr().await?).await?;
        stream.set_nodelay(true)?;

        Ok(Self {
            addr: addr.clone(),
            stream: Stream::new(stream),
            read_timeout: config.read_timeout,
        })
    }

    /// Read deadline for a reply to these commands.
    fn deadline(&self, commands: &[Command]) -> Duration {
        let blocking = commands
            .iter()
            .filter_map(|command| command.blocking_timeout())
            .sum::<Duration>();
        self.read_timeout + blocking
    }
}

#[async_trait]
impl Backend for Server {
    async fn execute(&mut self, command: &Command) -> Result<Value, Error> {
        let commands = std::slice::from_ref(command);
        let deadline = self.deadline(commands);
        self.stream.send(commands).await?;

        match timeout(deadline, self.stream.read()).await {
            Ok(reply) => reply,
            Err(_) => Err(Error::ReadTimeout),
        }
    }

    async fn execute_batch(&mut self, commands: &[Command]) -> Result<Vec<Value>, Error> {
        let deadline = self.deadline(commands);
        self.stream.send(commands).await?;

        let stream = &mut self.stream;
        let read = async move {
            let mut replies = Vec::with_capacity(commands.len());
            for _ in commands {
                replies.push(stream.read().await?);
            }
            Ok::<_, Error>(replies)
        };

        match timeout(deadline, read).await {
            Ok(replies) => replies,
            Err(_) => Err(Error::ReadTimeout),
        }
    }

    fn addr(&self) -> &Address {
        &self.addr
    }
}

/// Connects to real Redis nodes.
#[derive(Debug, Clone, Copy, Default)]
pub struct TcpConnector;

#[async_trait]
impl Connect for TcpConnector {
    async fn connect(&self, addr: &Address, config: &Config) -> Result<Box<dyn Backend>, Error> {
        Ok(Box::new(Server::connect(addr, config).await?))
    }
}
