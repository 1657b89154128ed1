//! Client over one sharded cluster.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use serde::{de::DeserializeOwned, Serialize};
use shardha_config::{Cluster, Role};
use tracing::{debug, error, info};

use super::{Pipeline, Popped};
use crate::backend::{Address, Connect, Pool, PoolConfig, Ring, State, TcpConnector};
use crate::backend::pool::Config;
use crate::codec;
use crate::net::{Command, Value};
use crate::{Error, Outcome};

/// Client for one sharded cluster.
///
/// Holds one connection pool per node and sends each key to the node
/// that owns it on the hash ring. Every operation checks a connection
/// out, runs one command and returns the connection, translating the
/// reply into an [`Outcome`]. Failures are logged and returned, never
/// raised.
///
/// Cheap to clone.
#[derive(Clone, Debug)]
pub struct ShardedClient {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    role: Role,
    pools: Vec<Pool>,
    ring: Ring,
}

impl ShardedClient {
    /// Connect to real nodes over TCP.
    pub async fn connect(cluster: &Cluster) -> Result<Self, Error> {
        Self::with_connector(cluster, Arc::new(TcpConnector)).await
    }

    /// Connect using the given connector.
    pub async fn with_connector(
        cluster: &Cluster,
        connector: Arc<dyn Connect>,
    ) -> Result<Self, Error> {
        Self::with_role(Role::default(), cluster, connector).await
    }

    /// Connect, labeling the cluster with its role in logs and errors.
    ///
    /// Opens one connection to every node. If any node can't be reached,
    /// pools opened so far are shut down and the error is returned.
    pub async fn with_role(
        role: Role,
        cluster: &Cluster,
        connector: Arc<dyn Connect>,
    ) -> Result<Self, Error> {
        cluster.check(role)?;

        let config = Config::from(&cluster.pool);
        let addresses = cluster
            .nodes
            .iter()
            .enumerate()
            .map(|(number, node)| Address::new(node, number))
            .collect::<Vec<_>>();

        let pools = addresses
            .iter()
            .map(|address| {
                Pool::new(
                    &PoolConfig {
                        address: address.clone(),
                        config,
                    },
                    connector.clone(),
                )
            })
            .collect::<Vec<_>>();

        for pool in &pools {
            pool.launch();
        }

        let warm_up = join_all(pools.iter().map(|pool| pool.warm_up())).await;
        for (pool, result) in pools.iter().zip(warm_up) {
            if let Err(err) = result {
                error!("{} node unreachable: {} [{}]", role, err, pool.addr());
                for pool in &pools {
                    pool.shutdown();
                }
                return Err(Error::Unreachable {
                    addr: pool.addr().clone(),
                    source: Box::new(err),
                });
            }
        }

        info!("{} cluster ready with {} nodes", role, pools.len());

        Ok(Self {
            inner: Arc::new(Inner {
                role,
                ring: Ring::new(&addresses),
                pools,
            }),
        })
    }

    /// Cluster role.
    pub fn role(&self) -> Role {
        self.inner.role
    }

    /// Node position owning the key.
    pub fn shard(&self, key: impl AsRef<[u8]>) -> usize {
        self.inner.ring.shard(key.as_ref())
    }

    /// Pool for the node owning the key.
    pub fn pool(&self, key: impl AsRef<[u8]>) -> &Pool {
        &self.inner.pools[self.shard(key)]
    }

    /// All pools, in node order.
    pub fn pools(&self) -> &[Pool] {
        &self.inner.pools
    }

    /// Pool state for every node.
    pub fn state(&self) -> Vec<State> {
        self.inner.pools.iter().map(|pool| pool.state()).collect()
    }

    /// Take every pool offline. Operations fail from now on.
    pub fn shutdown(&self) {
        debug!("shutting down {} cluster", self.role());
        for pool in &self.inner.pools {
            pool.shutdown();
        }
    }

    /// Start a pipeline.
    pub fn pipeline(&self) -> Pipeline {
        Pipeline::new(self.clone())
    }

    /// Check out a connection for the key, run the command and parse
    /// the reply. Error replies from the node become [`Error::Server`].
    async fn run<T>(
        &self,
        op: &'static str,
        key: &[u8],
        command: Command,
        parse: impl FnOnce(Value) -> Result<Option<T>, Error>,
    ) -> Outcome<T> {
        let pool = self.pool(key);

        let result = async {
            let mut conn = pool.get().await?;
            match conn.execute(&command).await? {
                Value::Error(err) => Err(Error::Server(err)),
                reply => parse(reply),
            }
        }
        .await;

        if let Err(ref err) = result {
            error!("{} failed: {} [{}, {}]", op, err, self.role(), pool.addr());
        }

        result.into()
    }

    /// Run a batch of commands on one node. Replies come back in order,
    /// tagged with the position they were queued at.
    pub(super) async fn run_batch(
        &self,
        shard: usize,
        batch: Vec<(usize, Command)>,
    ) -> Vec<(usize, Outcome<Value>)> {
        let pool = &self.inner.pools[shard];
        let (positions, commands): (Vec<_>, Vec<_>) = batch.into_iter().unzip();

        let result = async {
            let mut conn = pool.get().await?;
            conn.execute_batch(&commands).await
        }
        .await;

        match result {
            Ok(replies) => positions
                .into_iter()
                .zip(replies)
                .map(|(position, reply)| {
                    let outcome = match reply {
                        Value::Error(err) => Outcome::Failed(Error::Server(err)),
                        Value::Nil => Outcome::Empty,
                        reply => Outcome::Value(reply),
                    };
                    (position, outcome)
                })
                .collect(),

            Err(err) => {
                error!(
                    "pipeline of {} commands failed: {} [{}, {}]",
                    commands.len(),
                    err,
                    self.role(),
                    pool.addr()
                );
                let reason = err.to_string();
                positions
                    .into_iter()
                    .map(|position| (position, Outcome::Failed(Error::Pipeline(reason.clone()))))
                    .collect()
            }
        }
    }

    /// Append one value to the tail of a list. Returns the new length.
    pub async fn rpush(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Outcome<i64> {
        self.rpush_many(key, &[value]).await
    }

    /// Append values to the tail of a list, in order.
    pub async fn rpush_many<V: AsRef<[u8]>>(
        &self,
        key: impl AsRef<[u8]>,
        values: &[V],
    ) -> Outcome<i64> {
        let key = key.as_ref();
        if values.is_empty() {
            return Outcome::Failed(Error::no_values("RPUSH"));
        }
        let command = Command::new("RPUSH").arg(key).args(values);
        self.run("RPUSH", key, command, |reply| {
            reply.integer("RPUSH").map(Some)
        })
        .await
    }

    /// Prepend one value to the head of a list.
    pub async fn lpush(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Outcome<i64> {
        self.lpush_many(key, &[value]).await
    }

    /// Prepend values to the head of a list. The last value ends up first.
    pub async fn lpush_many<V: AsRef<[u8]>>(
        &self,
        key: impl AsRef<[u8]>,
        values: &[V],
    ) -> Outcome<i64> {
        let key = key.as_ref();
        if values.is_empty() {
            return Outcome::Failed(Error::no_values("LPUSH"));
        }
        let command = Command::new("LPUSH").arg(key).args(values);
        self.run("LPUSH", key, command, |reply| {
            reply.integer("LPUSH").map(Some)
        })
        .await
    }

    pub async fn rpop(&self, key: impl AsRef<[u8]>) -> Outcome<Bytes> {
        let key = key.as_ref();
        self.run("RPOP", key, Command::new("RPOP").arg(key), |reply| {
            reply.bulk("RPOP")
        })
        .await
    }

    pub async fn lpop(&self, key: impl AsRef<[u8]>) -> Outcome<Bytes> {
        let key = key.as_ref();
        self.run("LPOP", key, Command::new("LPOP").arg(key), |reply| {
            reply.bulk("LPOP")
        })
        .await
    }

    /// Pop from the head of a list, waiting up to `timeout` for an element.
    /// The timeout is rounded up to whole seconds. `Empty` if it expires.
    pub async fn blpop(&self, key: impl AsRef<[u8]>, timeout: Duration) -> Outcome<Popped> {
        let key = key.as_ref();
        let command = Command::new("BLPOP").arg(key).blocking(timeout);
        self.run("BLPOP", key, command, |reply| popped(reply, "BLPOP"))
            .await
    }

    /// Pop from the tail of a list, waiting up to `timeout` for an element.
    pub async fn brpop(&self, key: impl AsRef<[u8]>, timeout: Duration) -> Outcome<Popped> {
        let key = key.as_ref();
        let command = Command::new("BRPOP").arg(key).blocking(timeout);
        self.run("BRPOP", key, command, |reply| popped(reply, "BRPOP"))
            .await
    }

    /// Remove occurrences of a value. Positive `count` removes from the head,
    /// negative from the tail, zero removes all. Returns how many were removed.
    pub async fn lrem(
        &self,
        key: impl AsRef<[u8]>,
        count: i64,
        value: impl AsRef<[u8]>,
    ) -> Outcome<i64> {
        let key = key.as_ref();
        let command = Command::new("LREM").arg(key).int(count).arg(value);
        self.run("LREM", key, command, |reply| reply.integer("LREM").map(Some))
            .await
    }

    /// Elements between `start` and `stop`, inclusive. Negative indexes
    /// count from the tail.
    pub async fn lrange(&self, key: impl AsRef<[u8]>, start: i64, stop: i64) -> Outcome<Vec<Bytes>> {
        let key = key.as_ref();
        let command = Command::new("LRANGE").arg(key).int(start).int(stop);
        self.run("LRANGE", key, command, |reply| {
            reply.bulks("LRANGE").map(Some)
        })
        .await
    }

    pub async fn lindex(&self, key: impl AsRef<[u8]>, index: i64) -> Outcome<Bytes> {
        let key = key.as_ref();
        let command = Command::new("LINDEX").arg(key).int(index);
        self.run("LINDEX", key, command, |reply| reply.bulk("LINDEX"))
            .await
    }

    pub async fn llen(&self, key: impl AsRef<[u8]>) -> Outcome<i64> {
        let key = key.as_ref();
        self.run("LLEN", key, Command::new("LLEN").arg(key), |reply| {
            reply.integer("LLEN").map(Some)
        })
        .await
    }

    /// Replace the element at `index`. Fails if the index is out of range.
    pub async fn lset(
        &self,
        key: impl AsRef<[u8]>,
        index: i64,
        value: impl AsRef<[u8]>,
    ) -> Outcome<()> {
        let key = key.as_ref();
        let command = Command::new("LSET").arg(key).int(index).arg(value);
        self.run("LSET", key, command, |reply| reply.ok("LSET").map(Some))
            .await
    }

    pub async fn get(&self, key: impl AsRef<[u8]>) -> Outcome<Bytes> {
        let key = key.as_ref();
        self.run("GET", key, Command::new("GET").arg(key), |reply| {
            reply.bulk("GET")
        })
        .await
    }

    pub async fn set(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Outcome<()> {
        let key = key.as_ref();
        let command = Command::new("SET").arg(key).arg(value);
        self.run("SET", key, command, |reply| reply.ok("SET").map(Some))
            .await
    }

    /// Set the key only if it doesn't exist. `true` if it was set.
    pub async fn setnx(&self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> Outcome<bool> {
        let key = key.as_ref();
        let command = Command::new("SETNX").arg(key).arg(value);
        self.run("SETNX", key, command, |reply| {
            reply.integer("SETNX").map(|set| Some(set == 1))
        })
        .await
    }

    /// Delete a key. Returns the number of keys removed.
    pub async fn del(&self, key: impl AsRef<[u8]>) -> Outcome<i64> {
        let key = key.as_ref();
        self.run("DEL", key, Command::new("DEL").arg(key), |reply| {
            reply.integer("DEL").map(Some)
        })
        .await
    }

    /// Expire the key after `seconds`. `false` if the key doesn't exist.
    pub async fn expire(&self, key: impl AsRef<[u8]>, seconds: u64) -> Outcome<bool> {
        let key = key.as_ref();
        let seconds = match i64::try_from(seconds) {
            Ok(seconds) => seconds,
            Err(_) => return Outcome::Failed(Error::ttl_out_of_range()),
        };
        let command = Command::new("EXPIRE").arg(key).int(seconds);
        self.run("EXPIRE", key, command, |reply| {
            reply.integer("EXPIRE").map(|set| Some(set == 1))
        })
        .await
    }

    /// Set a hash field. Returns 1 if the field is new.
    pub async fn hset(
        &self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> Outcome<i64> {
        let key = key.as_ref();
        let command = Command::new("HSET").arg(key).arg(field).arg(value);
        self.run("HSET", key, command, |reply| reply.integer("HSET").map(Some))
            .await
    }

    /// All values of a hash.
    pub async fn hvals(&self, key: impl AsRef<[u8]>) -> Outcome<Vec<Bytes>> {
        let key = key.as_ref();
        self.run("HVALS", key, Command::new("HVALS").arg(key), |reply| {
            reply.bulks("HVALS").map(Some)
        })
        .await
    }

    /// Store a serialized value.
    pub async fn set_object<T: Serialize + ?Sized>(
        &self,
        key: impl AsRef<[u8]>,
        value: &T,
    ) -> Outcome<()> {
        match codec::encode(value) {
            Ok(bytes) => self.set(key, bytes).await,
            Err(err) => {
                error!("SET failed: {} [{}]", err, self.role());
                Outcome::Failed(err)
            }
        }
    }

    /// Load and deserialize a value.
    pub async fn get_object<T: DeserializeOwned>(&self, key: impl AsRef<[u8]>) -> Outcome<T> {
        match self.get(key).await {
            Outcome::Value(bytes) => self.decode("GET", codec::decode(&bytes)),
            Outcome::Empty => Outcome::Empty,
            Outcome::Failed(err) => Outcome::Failed(err),
        }
    }

    /// Deserialize every value of a hash.
    pub async fn hvals_objects<T: DeserializeOwned>(&self, key: impl AsRef<[u8]>) -> Outcome<Vec<T>> {
        match self.hvals(key).await {
            Outcome::Value(values) => self.decode(
                "HVALS",
                values
                    .iter()
                    .map(|bytes| codec::decode(bytes))
                    .collect::<Result<Vec<T>, _>>(),
            ),
            Outcome::Empty => Outcome::Empty,
            Outcome::Failed(err) => Outcome::Failed(err),
        }
    }

    fn decode<T>(&self, op: &'static str, result: Result<T, Error>) -> Outcome<T> {
        match result {
            Ok(value) => Outcome::Value(value),
            Err(err) => {
                error!("{} failed: {} [{}]", op, err, self.role());
                Outcome::Failed(err)
            }
        }
    }
}

/// `[key, value]` pair from a blocking pop, nil on timeout.
fn popped(reply: Value, command: &'static str) -> Result<Option<Popped>, Error> {
    let mut pair = reply.bulks(command)?.into_iter();
    match (pair.next(), pair.next(), pair.next()) {
        (None, _, _) => Ok(None),
        (Some(key), Some(value), None) => Ok(Some(Popped { key, value })),
        _ => Err(Error::UnexpectedReply(command)),
    }
}
