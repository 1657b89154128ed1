//! Result of one call against a single cluster.

use crate::Error;

/// Outcome of a single-cluster operation.
///
/// Keeps "the node answered with nothing" apart from "the call failed",
/// so callers never need sentinel values.
#[derive(Debug)]
#[must_use]
pub enum Outcome<T> {
    /// The node returned a value.
    Value(T),
    /// The node answered, but had nothing: missing key, empty list,
    /// blocking pop timed out.
    Empty,
    /// The call failed. Reason is logged where it happened.
    Failed(Error),
}

impl<T> Outcome<T> {
    pub fn is_value(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }

    pub fn is_empty(&self) -> bool {
        matches!(self, Outcome::Empty)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Outcome::Failed(_))
    }

    /// The value, dropping the reason for not having one.
    pub fn into_option(self) -> Option<T> {
        match self {
            Outcome::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Borrow the value.
    pub fn get(&self) -> Option<&T> {
        match self {
            Outcome::Value(value) => Some(value),
            _ => None,
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
        match self {
            Outcome::Value(value) => Outcome::Value(f(value)),
            Outcome::Empty => Outcome::Empty,
            Outcome::Failed(err) => Outcome::Failed(err),
        }
    }

    /// The failure, if any.
    pub fn error(&self) -> Option<&Error> {
        match self {
            Outcome::Failed(err) => Some(err),
            _ => None,
        }
    }

    /// Treat `Empty` as a failure. Used by writes, which always
    /// produce a value when they succeed.
    pub fn require(self, command: &'static str) -> Result<T, Error> {
        match self {
            Outcome::Value(value) => Ok(value),
            Outcome::Empty => Err(Error::UnexpectedReply(command)),
            Outcome::Failed(err) => Err(err),
        }
    }

    /// `Empty` becomes `Ok(None)`.
    pub fn into_result(self) -> Result<Option<T>, Error> {
        match self {
            Outcome::Value(value) => Ok(Some(value)),
            Outcome::Empty => Ok(None),
            Outcome::Failed(err) => Err(err),
        }
    }
}

impl<T> From<Option<T>> for Outcome<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(value) => Outcome::Value(value),
            None => Outcome::Empty,
        }
    }
}

impl<T> From<Result<Option<T>, Error>> for Outcome<T> {
    fn from(value: Result<Option<T>, Error>) -> Self {
        match value {
            Ok(value) => value.into(),
            Err(err) => Outcome::Failed(err),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_outcome() {
        let value: Outcome<i64> = Some(3).into();
        assert!(value.is_value());
        assert_eq!(value.get(), Some(&3));
        assert_eq!(value.map(|v| v * 2).into_option(), Some(6));

        let empty: Outcome<i64> = None.into();
        assert!(empty.is_empty());
        assert!(matches!(
            empty.require("RPUSH"),
            Err(Error::UnexpectedReply("RPUSH"))
        ));

        let failed: Outcome<i64> = Err(Error::PoolExhausted).into();
        assert!(failed.is_failed());
        assert!(matches!(failed.error(), Some(Error::PoolExhausted)));
        assert!(failed.into_result().is_err());
    }
}
