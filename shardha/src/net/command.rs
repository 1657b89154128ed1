//! Commands sent to a node.

use std::time::Duration;

use bytes::{BufMut, Bytes, BytesMut};

use super::resp::{encode_bulk, Value};
use crate::Error;

/// One command: name and arguments, sent as an array of bulk strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Bytes>,
    blocking: Option<Duration>,
}

impl Command {
    /// New command without arguments.
    pub fn new(name: &str) -> Self {
        Self {
            args: vec![Bytes::copy_from_slice(name.as_bytes())],
            blocking: None,
        }
    }

    /// Add an argument.
    pub fn arg(mut self, arg: impl AsRef<[u8]>) -> Self {
        self.args.push(Bytes::copy_from_slice(arg.as_ref()));
        self
    }

    /// Add several arguments.
    pub fn args<A: AsRef<[u8]>>(mut self, args: &[A]) -> Self {
        self.args
            .extend(args.iter().map(|arg| Bytes::copy_from_slice(arg.as_ref())));
        self
    }

    /// Add an integer argument.
    pub fn int(self, arg: i64) -> Self {
        self.arg(arg.to_string())
    }

    /// The server may hold the reply for up to `timeout`. The timeout is
    /// sent in whole seconds, rounded up, and never as zero, which would
    /// block forever.
    pub fn blocking(mut self, timeout: Duration) -> Self {
        let mut seconds = timeout.as_secs();
        if timeout.subsec_nanos() > 0 || seconds == 0 {
            seconds += 1;
        }
        self.blocking = Some(Duration::from_secs(seconds));
        self.int(seconds as i64)
    }

    /// Command name.
    pub fn name(&self) -> &str {
        self.args
            .first()
            .and_then(|name| std::str::from_utf8(name).ok())
            .unwrap_or("")
    }

    /// Arguments, without the name.
    pub fn arguments(&self) -> &[Bytes] {
        self.args.get(1..).unwrap_or(&[])
    }

    /// How long the server may block before replying.
    pub fn blocking_timeout(&self) -> Option<Duration> {
        self.blocking
    }

    /// Write the command in wire format.
    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u8(b'*');
        buf.put_slice(self.args.len().to_string().as_bytes());
        buf.put_slice(b"\r\n");
        for arg in &self.args {
            encode_bulk(arg, buf);
        }
    }
}

impl TryFrom<Value> for Command {
    type Error = Error;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Array(values) if !values.is_empty() => {
                let args = values
                    .into_iter()
                    .map(|value| match value {
                        Value::Bulk(bytes) => Ok(bytes),
                        _ => Err(Error::Protocol("command arguments must be bulk strings".into())),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Self {
                    args,
                    blocking: None,
                })
            }
            _ => Err(Error::Protocol("expected a command array".into())),
        }
    }
}
