//! Node address.
use std::net::SocketAddr;

use serde::{Deserialize, Serialize};
use shardha_config::Node;

use crate::Error;

/// Node address.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default, Eq, Hash)]
pub struct Address {
    /// Node host.
    pub host: String,
    /// Node port.
    pub port: u16,
    /// Stable node name used for hashing, if configured.
    pub name: Option<String>,
    /// Hashing weight.
    pub weight: usize,
    /// Position of the node in the config.
    pub node_number: usize,
}

impl Address {
    /// Create new address from config values.
    pub fn new(node: &Node, node_number: usize) -> Self {
        Self {
            host: node.host.clone(),
            port: node.port,
            name: node.name.clone(),
            weight: node.weight,
            node_number,
        }
    }

    /// Resolve the address.
    pub async fn addr(&self) -> Result<SocketAddr, Error> {
        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await?
            .next()
            .ok_or_else(|| {
                Error::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("can't resolve \"{}\"", self.host),
                ))
            })
    }

    #[cfg(test)]
    pub fn new_test() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 6379,
            name: None,
            weight: 1,
            node_number: 0,
        }
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.name {
            Some(ref name) => write!(f, "{}@{}:{}", name, self.host, self.port),
            None => write!(f, "{}:{}", self.host, self.port),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_from_node() {
        let mut node = Node::new("10.0.0.5", 6380);
        node.weight = 3;
        let address = Address::new(&node, 2);

        assert_eq!(address.host, "10.0.0.5");
        assert_eq!(address.port, 6380);
        assert_eq!(address.weight, 3);
        assert_eq!(address.node_number, 2);
        assert_eq!(address.to_string(), "10.0.0.5:6380");

        node.name = Some("queue-a".into());
        assert_eq!(Address::new(&node, 0).to_string(), "queue-a@10.0.0.5:6380");
    }

    #[tokio::test]
    async fn test_resolve() {
        let addr = Address::new_test().addr().await.unwrap();
        assert_eq!(addr.port(), 6379);
        assert!(addr.ip().is_loopback());
    }
}
