//! Buffered socket speaking RESP.

use bytes::BytesMut;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufStream};
use tracing::trace;

use super::{Command, Value};
use crate::Error;

/// A RESP connection over any async byte stream.
#[derive(Debug)]
pub struct Stream<S> {
    inner: BufStream<S>,
    buffer: BytesMut,
}

impl<S> Stream<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    /// Wrap a socket.
    pub fn new(stream: S) -> Self {
        Self {
            inner: BufStream::new(stream),
            buffer: BytesMut::with_capacity(4096),
        }
    }

    /// Write commands and flush them in one go.
    pub async fn send(&mut self, commands: &[Command]) -> Result<(), Error> {
        let mut buf = BytesMut::new();
        for command in commands {
            trace!("=> {}", command.name());
            command.encode(&mut buf);
        }
        self.inner.write_all(&buf).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Write one value and flush.
    pub async fn write_value(&mut self, value: &Value) -> Result<(), Error> {
        let mut buf = BytesMut::new();
        value.encode(&mut buf);
        self.inner.write_all(&buf).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Read one complete value.
    pub async fn read(&mut self) -> Result<Value, Error> {
        loop {
            if let Some(value) = Value::decode(&mut self.buffer)? {
                return Ok(value);
            }

            let read = self.inner.read_buf(&mut self.buffer).await?;
            if read == 0 {
                return Err(Error::Io(std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "connection closed",
                )));
            }
        }
    }

    /// Read one value, or `None` if the peer closed the connection cleanly
    /// between values.
    pub async fn read_optional(&mut self) -> Result<Option<Value>, Error> {
        loop {
            if let Some(value) = Value::decode(&mut self.buffer)? {
                return Ok(Some(value));
            }

            let read = self.inner.read_buf(&mut self.buffer).await?;
            if read == 0 {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(Error::Protocol("connection closed mid-value".into()))
                };
            }
        }
    }
}
