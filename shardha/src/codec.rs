//! Typed values stored as MessagePack.

use bytes::Bytes;
use serde::{de::DeserializeOwned, Serialize};

use crate::Error;

/// Encode a value for storage.
pub fn encode<T: Serialize + ?Sized>(value: &T) -> Result<Bytes, Error> {
    Ok(Bytes::from(rmp_serde::to_vec_named(value)?))
}

/// Decode a stored value.
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, Error> {
    Ok(rmp_serde::from_slice(bytes)?)
}
