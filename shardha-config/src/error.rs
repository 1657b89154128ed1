//! Configuration errors.

use thiserror::Error;

use crate::Role;

#[derive(Debug, Error)]
pub enum Error {
    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Toml(#[from] toml::de::Error),

    #[error("missing configuration key \"{0}\"")]
    Missing(String),

    #[error("invalid value \"{value}\" for \"{key}\"")]
    Invalid { key: String, value: String },

    #[error("{0} cluster has no nodes configured")]
    NoNodes(Role),

    #[error("{role} node {index} has an empty host")]
    EmptyHost { role: Role, index: usize },

    #[error("{role} pool: {reason}")]
    Pool { role: Role, reason: &'static str },
}

impl Error {
    /// Format a TOML error together with the offending config source.
    pub fn config(source: &str, err: toml::de::Error) -> Self {
        let line = err
            .span()
            .and_then(|span| source.get(..span.start))
            .map(|before| before.lines().count().max(1));

        match line {
            Some(line) => tracing::error!("config error on line {}: {}", line, err.message()),
            None => tracing::error!("config error: {}", err.message()),
        }

        Self::Toml(err)
    }

    pub(crate) fn invalid(key: &str, value: &str) -> Self {
        Self::Invalid {
            key: key.to_string(),
            value: value.to_string(),
        }
    }
}
