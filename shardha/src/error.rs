//! Client errors.

use thiserror::Error;

use crate::backend::pool::Address;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("protocol error: {0}")]
    Protocol(String),

    #[error("read timeout")]
    ReadTimeout,

    #[error("connect timeout")]
    ConnectTimeout,

    #[error("server error: {0}")]
    Server(String),

    #[error("unexpected reply to {0}")]
    UnexpectedReply(&'static str),

    #[error("checkout timeout, pool exhausted")]
    PoolExhausted,

    #[error("pool is shut down")]
    Offline,

    #[error("{operation}: {reason}")]
    InvalidArgument {
        operation: &'static str,
        reason: &'static str,
    },

    #[error("health check failed")]
    HealthcheckError,

    #[error("config: {0}")]
    Config(#[from] shardha_config::Error),

    #[error("node {addr} is unreachable: {source}")]
    Unreachable {
        addr: Address,
        #[source]
        source: Box<Error>,
    },

    #[error("codec: {0}")]
    Codec(String),

    #[error("pipeline batch failed: {0}")]
    Pipeline(String),

    #[error("{operation} failed on both clusters [primary: {primary}, secondary: {secondary}]")]
    BothClustersUnavailable {
        operation: &'static str,
        primary: Box<Error>,
        secondary: Box<Error>,
    },
}

impl Error {
    /// The connection that produced this error can't be trusted
    /// and must not go back into the pool.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::Protocol(_)
                | Error::ReadTimeout
                | Error::UnexpectedReply(_)
                | Error::HealthcheckError
        )
    }

    /// A push was given nothing to push.
    pub fn no_values(operation: &'static str) -> Self {
        Error::InvalidArgument {
            operation,
            reason: "no values given",
        }
    }

    pub fn ttl_out_of_range() -> Self {
        Error::InvalidArgument {
            operation: "EXPIRE",
            reason: "seconds out of range",
        }
    }

    /// Both clusters failed a write.
    pub fn both_unavailable(&self) -> bool {
        matches!(self, Error::BothClustersUnavailable { .. })
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(value: rmp_serde::encode::Error) -> Self {
        Error::Codec(value.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(value: rmp_serde::decode::Error) -> Self {
        Error::Codec(value.to_string())
    }
}
