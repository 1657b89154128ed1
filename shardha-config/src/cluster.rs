use serde::{Deserialize, Serialize};
use std::fmt::Display;

use super::error::Error;
use super::pooling::Pool;

/// Cluster role inside the HA pair.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    /// Preferred cluster, always tried first.
    #[default]
    Primary,
    /// Durability fallback.
    Secondary,
}

impl Role {
    /// Key prefix used by the flat key-value config format.
    pub fn prefix(&self) -> &'static str {
        match self {
            Self::Primary => "primary",
            Self::Secondary => "secondary",
        }
    }
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.prefix())
    }
}

/// One backend node.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Hash)]
#[serde(deny_unknown_fields)]
pub struct Node {
    /// Hostname or IP.
    pub host: String,
    /// Port.
    #[serde(default = "Node::port")]
    pub port: u16,
    /// Optional stable name, used for hashing instead of the node position.
    #[serde(default)]
    pub name: Option<String>,
    /// Relative share of the keyspace.
    #[serde(default = "Node::weight")]
    pub weight: usize,
}

impl Node {
    /// Node with default port and weight.
    pub fn new(host: impl ToString, port: u16) -> Self {
        Self {
            host: host.to_string(),
            port,
            name: None,
            weight: Self::weight(),
        }
    }

    fn port() -> u16 {
        6379
    }

    fn weight() -> usize {
        1
    }
}

/// Largest node weight accepted. Each unit of weight puts 160 points
/// on the hash ring.
pub const MAX_WEIGHT: usize = 1000;

/// Settings for one sharded cluster.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct Cluster {
    /// Pool settings shared by every node in the cluster.
    #[serde(default)]
    pub pool: Pool,
    /// Nodes, in hashing order.
    #[serde(default)]
    pub nodes: Vec<Node>,
}

impl Cluster {
    /// Validate the cluster settings.
    pub fn check(&self, role: Role) -> Result<(), Error> {
        if self.nodes.is_empty() {
            return Err(Error::NoNodes(role));
        }

        for (index, node) in self.nodes.iter().enumerate() {
            if node.host.trim().is_empty() {
                return Err(Error::EmptyHost { role, index });
            }
            if node.weight == 0 || node.weight > MAX_WEIGHT {
                return Err(Error::invalid(
                    &format!("{}.node{}.weight", role.prefix(), index),
                    &node.weight.to_string(),
                ));
            }
        }

        if self.pool.max_total == 0 {
            return Err(Error::Pool {
                role,
                reason: "max_total must be at least 1",
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_check_no_nodes() {
        let cluster = Cluster::default();
        assert!(matches!(
            cluster.check(Role::Secondary),
            Err(Error::NoNodes(Role::Secondary))
        ));
    }

    #[test]
    fn test_check_empty_host() {
        let cluster = Cluster {
            nodes: vec![Node::new("127.0.0.1", 6379), Node::new(" ", 6380)],
            ..Default::default()
        };
        assert!(matches!(
            cluster.check(Role::Primary),
            Err(Error::EmptyHost { index: 1, .. })
        ));
    }

    #[test]
    fn test_check_weight() {
        let mut cluster = Cluster {
            nodes: vec![Node::new("127.0.0.1", 6379)],
            ..Default::default()
        };

        cluster.nodes[0].weight = MAX_WEIGHT;
        assert!(cluster.check(Role::Primary).is_ok());

        for weight in [0, MAX_WEIGHT + 1, usize::MAX / 100] {
            cluster.nodes[0].weight = weight;
            assert!(matches!(
                cluster.check(Role::Primary),
                Err(Error::Invalid { ref key, .. }) if key == "primary.node0.weight"
            ));
        }
    }

    #[test]
    fn test_check_zero_pool() {
        let mut cluster = Cluster {
            nodes: vec![Node::new("127.0.0.1", 6379)],
            ..Default::default()
        };
        cluster.pool.max_total = 0;
        assert!(matches!(
            cluster.check(Role::Primary),
            Err(Error::Pool { .. })
        ));
    }
}
