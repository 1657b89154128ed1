//! Two sharded clusters acting as one store.
//!
//! Writes go to the primary cluster and fall back to the secondary when the
//! primary can't take them. Reads try the primary and fall back to the
//! secondary when it has nothing or fails. Nothing is replicated or repaired
//! between the clusters.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use shardha_config::{Config, Role};
use tracing::{debug, error, info, warn};

use crate::backend::{Connect, TcpConnector};
use crate::client::ShardedClient;
use crate::{Error, Outcome};

/// Primary and secondary cluster behind one set of list operations.
///
/// Cheap to clone.
#[derive(Clone, Debug)]
pub struct HaClient {
    primary: ShardedClient,
    secondary: ShardedClient,
}

impl HaClient {
    /// Pair two clients.
    pub fn new(primary: ShardedClient, secondary: ShardedClient) -> Self {
        Self { primary, secondary }
    }

    /// Connect to both clusters over TCP.
    pub async fn connect(config: &Config) -> Result<Self, Error> {
        Self::with_connector(config, Arc::new(TcpConnector)).await
    }

    /// Connect to both clusters. If either can't be reached, nothing is
    /// left running and the error is returned.
    pub async fn with_connector(config: &Config, connector: Arc<dyn Connect>) -> Result<Self, Error> {
        config.check()?;

        let primary =
            ShardedClient::with_role(Role::Primary, &config.primary, connector.clone()).await?;
        let secondary =
            match ShardedClient::with_role(Role::Secondary, &config.secondary, connector).await {
                Ok(secondary) => secondary,
                Err(err) => {
                    primary.shutdown();
                    return Err(err);
                }
            };

        info!(
            "ha client ready [primary: {} nodes, secondary: {} nodes]",
            primary.pools().len(),
            secondary.pools().len()
        );

        Ok(Self::new(primary, secondary))
    }

    pub fn primary(&self) -> &ShardedClient {
        &self.primary
    }

    pub fn secondary(&self) -> &ShardedClient {
        &self.secondary
    }

    /// Client for the role.
    pub fn client(&self, role: Role) -> &ShardedClient {
        match role {
            Role::Primary => &self.primary,
            Role::Secondary => &self.secondary,
        }
    }

    /// Replace the primary cluster client.
    pub fn set_primary(&mut self, primary: ShardedClient) {
        self.primary = primary;
    }

    /// Replace the secondary cluster client.
    pub fn set_secondary(&mut self, secondary: ShardedClient) {
        self.secondary = secondary;
    }

    /// Shut down both clusters.
    pub fn shutdown(&self) {
        self.primary.shutdown();
        self.secondary.shutdown();
    }

    /// Run a write on the primary; if it fails, on the secondary.
    async fn write_fallback<'a, F, Fut>(&'a self, op: &'static str, write: F) -> Result<i64, Error>
    where
        F: Fn(&'a ShardedClient) -> Fut,
        Fut: Future<Output = Outcome<i64>>,
    {
        let primary = match write(&self.primary).await.require(op) {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        warn!("{} failed on primary, writing to secondary: {}", op, primary);

        match write(&self.secondary).await.require(op) {
            Ok(value) => Ok(value),
            Err(secondary) => {
                error!(
                    "{} failed on both clusters [primary: {}, secondary: {}]",
                    op, primary, secondary
                );
                Err(Error::BothClustersUnavailable {
                    operation: op,
                    primary: Box::new(primary),
                    secondary: Box::new(secondary),
                })
            }
        }
    }

    /// Read from the primary; if it has nothing or fails, from the secondary.
    async fn read_fallback<'a, T, F, Fut>(&'a self, op: &'static str, read: F) -> Option<T>
    where
        F: Fn(&'a ShardedClient) -> Fut,
        Fut: Future<Output = Outcome<T>>,
    {
        match read(&self.primary).await {
            Outcome::Value(value) => return Some(value),
            Outcome::Empty => debug!("{} found nothing on primary, reading secondary", op),
            Outcome::Failed(err) => {
                warn!("{} failed on primary, reading secondary: {}", op, err)
            }
        }

        read(&self.secondary).await.into_option()
    }

    /// Append to a list. Returns the list length on whichever cluster took it.
    pub async fn rpush(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<i64, Error> {
        let (key, value) = (key.as_ref(), value.as_ref());
        self.write_fallback("RPUSH", |client| client.rpush(key, value))
            .await
    }

    /// Append values in order. An empty `values` is rejected without
    /// touching either cluster.
    pub async fn rpush_many<V: AsRef<[u8]>>(
        &self,
        key: impl AsRef<[u8]>,
        values: &[V],
    ) -> Result<i64, Error> {
        if values.is_empty() {
            return Err(Error::no_values("RPUSH"));
        }
        let key = key.as_ref();
        self.write_fallback("RPUSH", |client| client.rpush_many(key, values))
            .await
    }

    /// Prepend to a list.
    pub async fn lpush(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Result<i64, Error> {
        let (key, value) = (key.as_ref(), value.as_ref());
        self.write_fallback("LPUSH", |client| client.lpush(key, value))
            .await
    }

    pub async fn lpush_many<V: AsRef<[u8]>>(
        &self,
        key: impl AsRef<[u8]>,
        values: &[V],
    ) -> Result<i64, Error> {
        if values.is_empty() {
            return Err(Error::no_values("LPUSH"));
        }
        let key = key.as_ref();
        self.write_fallback("LPUSH", |client| client.lpush_many(key, values))
            .await
    }

    /// Remove occurrences of a value.
    ///
    /// If the primary removed anything, that count is returned and the
    /// secondary is left alone. Otherwise the secondary's count is returned,
    /// even if zero. A zero from the primary still counts as an answer when
    /// the secondary then fails.
    pub async fn lrem(
        &self,
        key: impl AsRef<[u8]>,
        count: i64,
        value: impl AsRef<[u8]>,
    ) -> Result<i64, Error> {
        let (key, value) = (key.as_ref(), value.as_ref());

        let primary = match self.primary.lrem(key, count, value).await {
            Outcome::Value(removed) if removed > 0 => return Ok(removed),
            Outcome::Value(_) => None,
            Outcome::Empty => Some(Error::UnexpectedReply("LREM")),
            Outcome::Failed(err) => {
                warn!("LREM failed on primary, trying secondary: {}", err);
                Some(err)
            }
        };

        match (self.secondary.lrem(key, count, value).await.require("LREM"), primary) {
            (Ok(removed), _) => Ok(removed),
            (Err(_), None) => Ok(0),
            (Err(secondary), Some(primary)) => {
                error!(
                    "LREM failed on both clusters [primary: {}, secondary: {}]",
                    primary, secondary
                );
                Err(Error::BothClustersUnavailable {
                    operation: "LREM",
                    primary: Box::new(primary),
                    secondary: Box::new(secondary),
                })
            }
        }
    }

    /// Pop the head of a list, from the primary or else the secondary.
    pub async fn lpop(&self, key: impl AsRef<[u8]>) -> Option<Bytes> {
        let key = key.as_ref();
        self.read_fallback("LPOP", |client| client.lpop(key)).await
    }

    /// Pop the tail of a list, from the primary or else the secondary.
    pub async fn rpop(&self, key: impl AsRef<[u8]>) -> Option<Bytes> {
        let key = key.as_ref();
        self.read_fallback("RPOP", |client| client.rpop(key)).await
    }

    /// Blocking pop from the head of a list.
    ///
    /// Only the primary blocks. If it has nothing when the timeout expires,
    /// or fails, the secondary gets one non-blocking pop. A push landing on
    /// the secondary while the primary is blocked is not seen until then.
    pub async fn blpop(&self, key: impl AsRef<[u8]>, timeout: Duration) -> Option<Bytes> {
        let key = key.as_ref();
        match self.primary.blpop(key, timeout).await {
            Outcome::Value(popped) => return Some(popped.value),
            Outcome::Empty => debug!("BLPOP timed out on primary, reading secondary"),
            Outcome::Failed(err) => warn!("BLPOP failed on primary, reading secondary: {}", err),
        }
        self.secondary.lpop(key).await.into_option()
    }

    /// Blocking pop from the tail of a list. Same fallback as [`HaClient::blpop`].
    pub async fn brpop(&self, key: impl AsRef<[u8]>, timeout: Duration) -> Option<Bytes> {
        let key = key.as_ref();
        match self.primary.brpop(key, timeout).await {
            Outcome::Value(popped) => return Some(popped.value),
            Outcome::Empty => debug!("BRPOP timed out on primary, reading secondary"),
            Outcome::Failed(err) => warn!("BRPOP failed on primary, reading secondary: {}", err),
        }
        self.secondary.rpop(key).await.into_option()
    }

    pub async fn lindex_from_primary(&self, key: impl AsRef<[u8]>, index: i64) -> Outcome<Bytes> {
        self.primary.lindex(key, index).await
    }

    pub async fn lindex_from_secondary(&self, key: impl AsRef<[u8]>, index: i64) -> Outcome<Bytes> {
        self.secondary.lindex(key, index).await
    }

    pub async fn lrange_from_primary(
        &self,
        key: impl AsRef<[u8]>,
        start: i64,
        stop: i64,
    ) -> Outcome<Vec<Bytes>> {
        self.primary.lrange(key, start, stop).await
    }

    pub async fn lrange_from_secondary(
        &self,
        key: impl AsRef<[u8]>,
        start: i64,
        stop: i64,
    ) -> Outcome<Vec<Bytes>> {
        self.secondary.lrange(key, start, stop).await
    }

    pub async fn llen_from_primary(&self, key: impl AsRef<[u8]>) -> Outcome<i64> {
        self.primary.llen(key).await
    }

    pub async fn llen_from_secondary(&self, key: impl AsRef<[u8]>) -> Outcome<i64> {
        self.secondary.llen(key).await
    }

    pub async fn lset_from_primary(
        &self,
        key: impl AsRef<[u8]>,
        index: i64,
        value: impl AsRef<[u8]>,
    ) -> Outcome<()> {
        self.primary.lset(key, index, value).await
    }

    pub async fn lset_from_secondary(
        &self,
        key: impl AsRef<[u8]>,
        index: i64,
        value: impl AsRef<[u8]>,
    ) -> Outcome<()> {
        self.secondary.lset(key, index, value).await
    }
}
