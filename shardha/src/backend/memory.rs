//! In-process node speaking the same command set as a real server.
//!
//! Used by tests and local runs. A node can be taken down and brought
//! back up, which fails every connection to it the same way a dead
//! socket would.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use fnv::FnvHashMap;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tokio::sync::Notify;
use tokio::time::{timeout_at, Instant};
use tracing::{debug, error};

use super::{pool::Config, Address, Backend, Connect};
use crate::net::{Command, Stream, Value};
use crate::Error;

/// One in-memory node. Clones share the same data.
#[derive(Clone, Default, Debug)]
pub struct MemoryNode {
    inner: Arc<NodeInner>,
}

#[derive(Default, Debug)]
struct NodeInner {
    store: Mutex<Store>,
    down: AtomicBool,
    generation: AtomicU64,
    pushed: Notify,
    connects: AtomicUsize,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum End {
    Left,
    Right,
}

impl MemoryNode {
    /// Take the node down or bring it back. While down, new connections
    /// are refused and existing ones fail.
    pub fn set_down(&self, down: bool) {
        self.inner.down.store(down, Ordering::SeqCst);
        self.inner.pushed.notify_waiters();
    }

    pub fn is_down(&self) -> bool {
        self.inner.down.load(Ordering::SeqCst)
    }

    /// Break every open connection without taking the node down.
    pub fn kill_connections(&self) {
        self.inner.generation.fetch_add(1, Ordering::SeqCst);
        self.inner.pushed.notify_waiters();
    }

    /// Connections opened so far.
    pub fn connects(&self) -> usize {
        self.inner.connects.load(Ordering::SeqCst)
    }

    /// Number of keys stored.
    pub fn len(&self) -> usize {
        self.inner.store.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Open a connection to this node.
    pub fn connection(&self, addr: Address) -> Box<dyn Backend> {
        self.inner.connects.fetch_add(1, Ordering::SeqCst);
        Box::new(MemoryConnection {
            node: self.clone(),
            addr,
            generation: self.generation(),
        })
    }

    fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Run one command against the node.
    pub async fn execute(&self, command: &Command) -> Result<Value, Error> {
        if self.is_down() {
            return Err(reset());
        }

        let name = command.name().to_ascii_uppercase();
        let reply = match name.as_str() {
            "BLPOP" => self.blocking_pop(command, End::Left).await?,
            "BRPOP" => self.blocking_pop(command, End::Right).await?,
            _ => self.execute_now(&name, command.arguments()),
        };

        if matches!(name.as_str(), "RPUSH" | "LPUSH") {
            self.inner.pushed.notify_waiters();
        }

        Ok(reply)
    }

    fn execute_now(&self, name: &str, args: &[Bytes]) -> Value {
        self.inner.store.lock().execute(name, args)
    }

    /// Pop from the first non-empty list, waiting for a push until the
    /// timeout expires. Zero waits forever.
    async fn blocking_pop(&self, command: &Command, end: End) -> Result<Value, Error> {
        let generation = self.generation();
        let Some((seconds, keys)) = command.arguments().split_last() else {
            return Ok(wrong_arity(command.name()));
        };
        if keys.is_empty() {
            return Ok(wrong_arity(command.name()));
        }
        let seconds = match int(seconds) {
            Some(seconds) if seconds >= 0 => seconds as u64,
            _ => return Ok(Value::Error("ERR timeout is negative".into())),
        };
        let deadline = (seconds > 0).then(|| Instant::now() + Duration::from_secs(seconds));

        loop {
            let notified = self.inner.pushed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if self.is_down() || self.generation() != generation {
                return Err(reset());
            }

            let popped = self.inner.store.lock().pop_any(keys, end);
            if let Some(reply) = popped {
                return Ok(reply);
            }

            match deadline {
                Some(deadline) => {
                    if timeout_at(deadline, notified).await.is_err() {
                        return Ok(Value::Nil);
                    }
                }
                None => notified.await,
            }
        }
    }
}

/// Connection to a [`MemoryNode`].
#[derive(Debug)]
struct MemoryConnection {
    node: MemoryNode,
    addr: Address,
    generation: u64,
}

#[async_trait]
impl Backend for MemoryConnection {
    async fn execute(&mut self, command: &Command) -> Result<Value, Error> {
        if self.generation != self.node.generation() {
            return Err(reset());
        }
        self.node.execute(command).await
    }

    fn addr(&self) -> &Address {
        &self.addr
    }
}

/// Opens connections to in-memory nodes, one node per host and port.
#[derive(Clone, Default, Debug)]
pub struct MemoryConnector {
    nodes: Arc<Mutex<FnvHashMap<(String, u16), MemoryNode>>>,
}

impl MemoryConnector {
    /// Node behind this address, created on first use.
    pub fn node(&self, addr: &Address) -> MemoryNode {
        self.node_at(&addr.host, addr.port)
    }

    pub fn node_at(&self, host: &str, port: u16) -> MemoryNode {
        self.nodes
            .lock()
            .entry((host.to_string(), port))
            .or_default()
            .clone()
    }
}

#[async_trait]
impl Connect for MemoryConnector {
    async fn connect(&self, addr: &Address, _config: &Config) -> Result<Box<dyn Backend>, Error> {
        let node = self.node(addr);
        if node.is_down() {
            return Err(Error::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("node {} is down", addr),
            )));
        }
        Ok(node.connection(addr.clone()))
    }
}

/// Serve a node over TCP until the listener fails.
pub async fn serve(listener: TcpListener, node: MemoryNode) -> Result<(), Error> {
    loop {
        let (socket, peer) = listener.accept().await?;
        let node = node.clone();
        debug!("client connected [{}]", peer);

        tokio::spawn(async move {
            if let Err(err) = handle(socket, node).await {
                error!("client error: {} [{}]", err, peer);
            }
        });
    }
}

async fn handle(socket: tokio::net::TcpStream, node: MemoryNode) -> Result<(), Error> {
    let mut stream = Stream::new(socket);

    while let Some(value) = stream.read_optional().await? {
        let reply = match Command::try_from(value) {
            Ok(command) => node.execute(&command).await?,
            Err(err) => Value::Error(format!("ERR {}", err)),
        };
        stream.write_value(&reply).await?;
    }

    Ok(())
}

fn reset() -> Error {
    Error::Io(std::io::Error::new(
        std::io::ErrorKind::ConnectionReset,
        "connection reset by node",
    ))
}

fn wrong_arity(name: &str) -> Value {
    Value::Error(format!(
        "ERR wrong number of arguments for '{}' command",
        name.to_ascii_lowercase()
    ))
}

fn wrong_type() -> Value {
    Value::Error("WRONGTYPE Operation against a key holding the wrong kind of value".into())
}

fn not_integer() -> Value {
    Value::Error("ERR value is not an integer or out of range".into())
}

fn int(arg: &[u8]) -> Option<i64> {
    std::str::from_utf8(arg).ok()?.parse().ok()
}

#[derive(Debug)]
enum Data {
    String(Bytes),
    List(VecDeque<Bytes>),
    Hash(Vec<(Bytes, Bytes)>),
}

#[derive(Debug)]
struct Entry {
    data: Data,
    expires: Option<Instant>,
}

impl Entry {
    fn new(data: Data) -> Self {
        Self {
            data,
            expires: None,
        }
    }
}

#[derive(Debug, Default)]
struct Store {
    keys: FnvHashMap<Bytes, Entry>,
}

impl Store {
    fn len(&self) -> usize {
        let now = Instant::now();
        self.keys
            .values()
            .filter(|entry| entry.expires.map_or(true, |expires| expires > now))
            .count()
    }

    /// Live entry for a key, dropping it if expired.
    fn entry(&mut self, key: &Bytes) -> Option<&mut Entry> {
        let expired = self
            .keys
            .get(key)
            .and_then(|entry| entry.expires)
            .is_some_and(|expires| expires <= Instant::now());
        if expired {
            self.keys.remove(key);
        }
        self.keys.get_mut(key)
    }

    fn list(&mut self, key: &Bytes) -> Result<Option<&mut VecDeque<Bytes>>, Value> {
        match self.entry(key) {
            None => Ok(None),
            Some(Entry {
                data: Data::List(list),
                ..
            }) => Ok(Some(list)),
            Some(_) => Err(wrong_type()),
        }
    }

    fn execute(&mut self, name: &str, args: &[Bytes]) -> Value {
        let reply = match (name, args) {
            ("PING", []) => Ok(Value::Simple("PONG".into())),
            ("PING", [message]) => Ok(Value::Bulk(message.clone())),
            ("GET", [key]) => self.get(key),
            ("SET", [key, value]) => {
                self.keys
                    .insert(key.clone(), Entry::new(Data::String(value.clone())));
                Ok(Value::Simple("OK".into()))
            }
            ("SETNX", [key, value]) => Ok(Value::Integer(self.setnx(key, value))),
            ("DEL", keys) if !keys.is_empty() => Ok(Value::Integer(
                keys.iter()
                    .filter(|key| self.entry(key).is_some() && self.keys.remove(*key).is_some())
                    .count() as i64,
            )),
            ("EXPIRE", [key, seconds]) => self.expire(key, seconds),
            ("RPUSH", [key, values @ ..]) if !values.is_empty() => {
                self.push(key, values, End::Right)
            }
            ("LPUSH", [key, values @ ..]) if !values.is_empty() => {
                self.push(key, values, End::Left)
            }
            ("RPOP", [key]) => self.pop(key, End::Right),
            ("LPOP", [key]) => self.pop(key, End::Left),
            ("LREM", [key, count, value]) => self.lrem(key, count, value),
            ("LRANGE", [key, start, stop]) => self.lrange(key, start, stop),
            ("LINDEX", [key, index]) => self.lindex(key, index),
            ("LLEN", [key]) => self
                .list(key)
                .map(|list| Value::Integer(list.map_or(0, |list| list.len() as i64))),
            ("LSET", [key, index, value]) => self.lset(key, index, value),
            ("HSET", [key, pairs @ ..]) if !pairs.is_empty() && pairs.len() % 2 == 0 => {
                self.hset(key, pairs)
            }
            ("HVALS", [key]) => self.hvals(key),
            (
                "PING" | "GET" | "SET" | "SETNX" | "DEL" | "EXPIRE" | "RPUSH" | "LPUSH" | "RPOP"
                | "LPOP" | "LREM" | "LRANGE" | "LINDEX" | "LLEN" | "LSET" | "HSET" | "HVALS",
                _,
            ) => Err(wrong_arity(name)),
            _ => Err(Value::Error(format!(
                "ERR unknown command '{}'",
                name.to_ascii_lowercase()
            ))),
        };

        reply.unwrap_or_else(|err| err)
    }

    fn get(&mut self, key: &Bytes) -> Result<Value, Value> {
        match self.entry(key) {
            None => Ok(Value::Nil),
            Some(Entry {
                data: Data::String(value),
                ..
            }) => Ok(Value::Bulk(value.clone())),
            Some(_) => Err(wrong_type()),
        }
    }

    fn setnx(&mut self, key: &Bytes, value: &Bytes) -> i64 {
        if self.entry(key).is_some() {
            0
        } else {
            self.keys
                .insert(key.clone(), Entry::new(Data::String(value.clone())));
            1
        }
    }

    fn expire(&mut self, key: &Bytes, seconds: &Bytes) -> Result<Value, Value> {
        let seconds = int(seconds).ok_or_else(not_integer)?;
        if self.entry(key).is_none() {
            return Ok(Value::Integer(0));
        }
        if seconds <= 0 {
            self.keys.remove(key);
        } else if let Some(entry) = self.keys.get_mut(key) {
            entry.expires = Some(Instant::now() + Duration::from_secs(seconds as u64));
        }
        Ok(Value::Integer(1))
    }

    fn push(&mut self, key: &Bytes, values: &[Bytes], end: End) -> Result<Value, Value> {
        if self.list(key)?.is_none() {
            self.keys
                .insert(key.clone(), Entry::new(Data::List(VecDeque::new())));
        }
        let list = self.list(key)?.ok_or_else(wrong_type)?;
        for value in values {
            match end {
                End::Left => list.push_front(value.clone()),
                End::Right => list.push_back(value.clone()),
            }
        }
        Ok(Value::Integer(list.len() as i64))
    }

    fn pop(&mut self, key: &Bytes, end: End) -> Result<Value, Value> {
        let Some(list) = self.list(key)? else {
            return Ok(Value::Nil);
        };
        let value = match end {
            End::Left => list.pop_front(),
            End::Right => list.pop_back(),
        };
        if list.is_empty() {
            self.keys.remove(key);
        }
        Ok(value.map_or(Value::Nil, Value::Bulk))
    }

    /// Pop from the first key holding a non-empty list.
    fn pop_any(&mut self, keys: &[Bytes], end: End) -> Option<Value> {
        for key in keys {
            match self.pop(key, end) {
                Ok(Value::Bulk(value)) => {
                    return Some(Value::Array(vec![Value::Bulk(key.clone()), Value::Bulk(value)]))
                }
                Ok(_) => continue,
                Err(err) => return Some(err),
            }
        }
        None
    }

    fn lrem(&mut self, key: &Bytes, count: &Bytes, value: &Bytes) -> Result<Value, Value> {
        let count = int(count).ok_or_else(not_integer)?;
        let Some(list) = self.list(key)? else {
            return Ok(Value::Integer(0));
        };

        let limit = if count == 0 {
            usize::MAX
        } else {
            count.unsigned_abs() as usize
        };
        let mut removed = 0;

        if count >= 0 {
            let mut i = 0;
            while i < list.len() && removed < limit {
                if list[i] == *value {
                    list.remove(i);
                    removed += 1;
                } else {
                    i += 1;
                }
            }
        } else {
            let mut i = list.len();
            while i > 0 && removed < limit {
                i -= 1;
                if list[i] == *value {
                    list.remove(i);
                    removed += 1;
                }
            }
        }

        if list.is_empty() {
            self.keys.remove(key);
        }
        Ok(Value::Integer(removed as i64))
    }

    fn lrange(&mut self, key: &Bytes, start: &Bytes, stop: &Bytes) -> Result<Value, Value> {
        let (start, stop) = match (int(start), int(stop)) {
            (Some(start), Some(stop)) => (start, stop),
            _ => return Err(not_integer()),
        };
        let Some(list) = self.list(key)? else {
            return Ok(Value::Array(vec![]));
        };

        let len = list.len() as i64;
        let start = if start < 0 { (start + len).max(0) } else { start };
        let stop = if stop < 0 { stop + len } else { stop.min(len - 1) };
        if start > stop || start >= len {
            return Ok(Value::Array(vec![]));
        }

        Ok(Value::Array(
            list.iter()
                .skip(start as usize)
                .take((stop - start + 1) as usize)
                .cloned()
                .map(Value::Bulk)
                .collect(),
        ))
    }

    fn lindex(&mut self, key: &Bytes, index: &Bytes) -> Result<Value, Value> {
        let index = int(index).ok_or_else(not_integer)?;
        let Some(list) = self.list(key)? else {
            return Ok(Value::Nil);
        };
        Ok(position(index, list.len())
            .and_then(|i| list.get(i).cloned())
            .map_or(Value::Nil, Value::Bulk))
    }

    fn lset(&mut self, key: &Bytes, index: &Bytes, value: &Bytes) -> Result<Value, Value> {
        let index = int(index).ok_or_else(not_integer)?;
        let list = self
            .list(key)?
            .ok_or_else(|| Value::Error("ERR no such key".into()))?;
        let slot = match position(index, list.len()) {
            Some(i) => list.get_mut(i),
            None => None,
        }
        .ok_or_else(|| Value::Error("ERR index out of range".into()))?;
        *slot = value.clone();
        Ok(Value::Simple("OK".into()))
    }

    fn hset(&mut self, key: &Bytes, pairs: &[Bytes]) -> Result<Value, Value> {
        if self.entry(key).is_none() {
            self.keys
                .insert(key.clone(), Entry::new(Data::Hash(Vec::new())));
        }
        let hash = match self.keys.get_mut(key) {
            Some(Entry {
                data: Data::Hash(hash),
                ..
            }) => hash,
            _ => return Err(wrong_type()),
        };

        let mut added = 0;
        for pair in pairs.chunks(2) {
            let (field, value) = (&pair[0], &pair[1]);
            match hash.iter_mut().find(|(existing, _)| existing == field) {
                Some((_, existing)) => *existing = value.clone(),
                None => {
                    hash.push((field.clone(), value.clone()));
                    added += 1;
                }
            }
        }
        Ok(Value::Integer(added))
    }

    fn hvals(&mut self, key: &Bytes) -> Result<Value, Value> {
        match self.entry(key) {
            None => Ok(Value::Array(vec![])),
            Some(Entry {
                data: Data::Hash(hash),
                ..
            }) => Ok(Value::Array(
                hash.iter()
                    .map(|(_, value)| Value::Bulk(value.clone()))
                    .collect(),
            )),
            Some(_) => Err(wrong_type()),
        }
    }
}

/// List position for a possibly negative index.
fn position(index: i64, len: usize) -> Option<usize> {
    let index = if index < 0 { index + len as i64 } else { index };
    (0..len as i64).contains(&index).then_some(index as usize)
}
