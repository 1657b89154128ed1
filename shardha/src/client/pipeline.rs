//! Pipelined commands.

use std::collections::BTreeMap;

use futures::future::join_all;
use tracing::warn;

use super::ShardedClient;
use crate::net::{Command, Value};
use crate::{Error, Outcome};

/// Queue of commands sent in batches, one per node.
///
/// Nothing is sent until [`Pipeline::sync`]. Dropping the pipeline
/// before that discards the queue.
#[derive(Debug)]
pub struct Pipeline {
    client: ShardedClient,
    // Commands that can't be built fail at sync without reaching a node.
    queue: Vec<(usize, Result<Command, Error>)>,
}

impl Pipeline {
    pub(super) fn new(client: ShardedClient) -> Self {
        Self {
            client,
            queue: vec![],
        }
    }

    /// Queue any command. It goes to the node owning `key`.
    pub fn command(&mut self, key: impl AsRef<[u8]>, command: Command) -> &mut Self {
        let shard = self.client.shard(key);
        self.queue.push((shard, Ok(command)));
        self
    }

    pub fn rpush(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> &mut Self {
        let command = Command::new("RPUSH").arg(key.as_ref()).arg(value);
        self.command(key, command)
    }

    pub fn lpush(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> &mut Self {
        let command = Command::new("LPUSH").arg(key.as_ref()).arg(value);
        self.command(key, command)
    }

    pub fn rpop(&mut self, key: impl AsRef<[u8]>) -> &mut Self {
        let command = Command::new("RPOP").arg(key.as_ref());
        self.command(key, command)
    }

    pub fn lpop(&mut self, key: impl AsRef<[u8]>) -> &mut Self {
        let command = Command::new("LPOP").arg(key.as_ref());
        self.command(key, command)
    }

    pub fn lrem(&mut self, key: impl AsRef<[u8]>, count: i64, value: impl AsRef<[u8]>) -> &mut Self {
        let command = Command::new("LREM").arg(key.as_ref()).int(count).arg(value);
        self.command(key, command)
    }

    pub fn llen(&mut self, key: impl AsRef<[u8]>) -> &mut Self {
        let command = Command::new("LLEN").arg(key.as_ref());
        self.command(key, command)
    }

    pub fn get(&mut self, key: impl AsRef<[u8]>) -> &mut Self {
        let command = Command::new("GET").arg(key.as_ref());
        self.command(key, command)
    }

    pub fn set(&mut self, key: impl AsRef<[u8]>, value: impl AsRef<[u8]>) -> &mut Self {
        let command = Command::new("SET").arg(key.as_ref()).arg(value);
        self.command(key, command)
    }

    pub fn del(&mut self, key: impl AsRef<[u8]>) -> &mut Self {
        let command = Command::new("DEL").arg(key.as_ref());
        self.command(key, command)
    }

    pub fn expire(&mut self, key: impl AsRef<[u8]>, seconds: u64) -> &mut Self {
        match i64::try_from(seconds) {
            Ok(seconds) => {
                let command = Command::new("EXPIRE").arg(key.as_ref()).int(seconds);
                self.command(key, command)
            }
            Err(_) => {
                let shard = self.client.shard(key);
                self.queue.push((shard, Err(Error::ttl_out_of_range())));
                self
            }
        }
    }

    pub fn hset(
        &mut self,
        key: impl AsRef<[u8]>,
        field: impl AsRef<[u8]>,
        value: impl AsRef<[u8]>,
    ) -> &mut Self {
        let command = Command::new("HSET").arg(key.as_ref()).arg(field).arg(value);
        self.command(key, command)
    }

    /// Commands queued.
    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Send every queued command and collect the replies, in the order
    /// the commands were queued.
    ///
    /// Commands are grouped by node and each group is written on one
    /// connection in a single batch. Groups run concurrently. If a batch
    /// fails, every command in it fails; other nodes are unaffected.
    /// Nil replies are `Empty`, error replies are `Failed`.
    pub async fn sync(mut self) -> Vec<Outcome<Value>> {
        let queue = std::mem::take(&mut self.queue);
        let total = queue.len();

        let mut replies: Vec<Option<Outcome<Value>>> = (0..total).map(|_| None).collect();
        let mut groups: BTreeMap<usize, Vec<(usize, Command)>> = BTreeMap::new();
        for (position, (shard, command)) in queue.into_iter().enumerate() {
            match command {
                Ok(command) => groups.entry(shard).or_default().push((position, command)),
                Err(err) => replies[position] = Some(Outcome::Failed(err)),
            }
        }

        let batches = join_all(
            groups
                .into_iter()
                .map(|(shard, batch)| self.client.run_batch(shard, batch)),
        )
        .await;

        for (position, outcome) in batches.into_iter().flatten() {
            if let Some(slot) = replies.get_mut(position) {
                *slot = Some(outcome);
            }
        }

        replies
            .into_iter()
            .map(|reply| {
                reply.unwrap_or_else(|| Outcome::Failed(Error::Pipeline("no reply".into())))
            })
            .collect()
    }
}

impl Drop for Pipeline {
    fn drop(&mut self) {
        if !self.queue.is_empty() {
            warn!(
                "pipeline dropped with {} commands never sent",
                self.queue.len()
            );
        }
    }
}
