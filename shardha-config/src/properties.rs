//! Flat `key=value` configuration.
//!
//! Each cluster is described by:
//!
//! ```text
//! pool.maxIdle=8
//! pool.maxWait=1000
//! pool.testOnBorrow=true
//! pool.testOnReturn=false
//! num_nodes=2
//! node0.host=10.0.0.1
//! node0.port=6379
//! node1.host=10.0.0.2
//! node1.port=6379
//! ```
//!
//! When both clusters share one file, every key is prefixed with the role,
//! e.g. `primary.num_nodes` and `secondary.node0.host`.

use std::collections::BTreeMap;
use std::fs::read_to_string;
use std::path::Path;
use std::str::FromStr;

use tracing::info;

use super::cluster::{Cluster, Node};
use super::error::Error;
use super::pooling::Pool;

/// Parsed key-value pairs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Properties {
    values: BTreeMap<String, String>,
}

impl Properties {
    /// Parse `key=value` (or `key: value`) lines. Blank lines and lines
    /// starting with `#` or `!` are skipped.
    pub fn parse(text: &str) -> Result<Self, Error> {
        let mut values = BTreeMap::new();

        for line in text.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
                continue;
            }

            let split = line
                .find(['=', ':'])
                .ok_or_else(|| Error::invalid(line, ""))?;
            let (key, value) = line.split_at(split);
            values.insert(key.trim().to_string(), value[1..].trim().to_string());
        }

        Ok(Self { values })
    }

    /// Read and parse a properties file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let properties = Self::parse(&read_to_string(path)?)?;
        info!("loaded \"{}\"", path.display());
        Ok(properties)
    }

    /// Raw value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Set a value.
    pub fn insert(&mut self, key: impl ToString, value: impl ToString) {
        self.values.insert(key.to_string(), value.to_string());
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn scoped(&self, prefix: Option<&str>, key: &str) -> String {
        match prefix {
            Some(prefix) => format!("{}.{}", prefix, key),
            None => key.to_string(),
        }
    }

    fn required<T: FromStr>(&self, prefix: Option<&str>, key: &str) -> Result<T, Error> {
        let key = self.scoped(prefix, key);
        let value = self.get(&key).ok_or_else(|| Error::Missing(key.clone()))?;
        value.parse().map_err(|_| Error::invalid(&key, value))
    }

    fn optional<T: FromStr>(&self, prefix: Option<&str>, key: &str) -> Result<Option<T>, Error> {
        let key = self.scoped(prefix, key);
        match self.get(&key) {
            Some(value) => value
                .parse()
                .map(Some)
                .map_err(|_| Error::invalid(&key, value)),
            None => Ok(None),
        }
    }

    fn flag(&self, prefix: Option<&str>, key: &str) -> Result<Option<bool>, Error> {
        let key = self.scoped(prefix, key);
        match self.get(&key) {
            None => Ok(None),
            Some(value) => match value.to_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(Some(true)),
                "false" | "0" | "no" | "off" => Ok(Some(false)),
                _ => Err(Error::invalid(&key, value)),
            },
        }
    }

    /// Build one cluster's settings, reading keys under `prefix` if given.
    pub fn cluster(&self, prefix: Option<&str>) -> Result<Cluster, Error> {
        let mut pool = Pool::default();

        if let Some(max_idle) = self.optional(prefix, "pool.maxIdle")? {
            pool.max_idle = max_idle;
        }
        if let Some(max_total) = self.optional(prefix, "pool.maxTotal")? {
            pool.max_total = max_total;
        }
        if let Some(max_wait) = self.optional(prefix, "pool.maxWait")? {
            pool.max_wait = max_wait;
        }
        if let Some(test_on_borrow) = self.flag(prefix, "pool.testOnBorrow")? {
            pool.test_on_borrow = test_on_borrow;
        }
        if let Some(test_on_return) = self.flag(prefix, "pool.testOnReturn")? {
            pool.test_on_return = test_on_return;
        }
        if let Some(connect_timeout) = self.optional(prefix, "pool.connectTimeout")? {
            pool.connect_timeout = connect_timeout;
        }
        if let Some(read_timeout) = self.optional(prefix, "pool.readTimeout")? {
            pool.read_timeout = read_timeout;
        }

        // Grows with the nodes actually read; `num_nodes` is untrusted.
        let num_nodes: usize = self.required(prefix, "num_nodes")?;
        let mut nodes = vec![];

        for i in 0..num_nodes {
            let host: String = self.required(prefix, &format!("node{}.host", i))?;
            let port: u16 = self.required(prefix, &format!("node{}.port", i))?;
            let mut node = Node::new(host, port);
            node.name = self.optional(prefix, &format!("node{}.name", i))?;
            if let Some(weight) = self.optional(prefix, &format!("node{}.weight", i))? {
                node.weight = weight;
            }
            nodes.push(node);
        }

        Ok(Cluster { pool, nodes })
    }
}
