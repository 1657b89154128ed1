//! Consistent hash ring.

use std::collections::BTreeMap;

use shardha_config::MAX_WEIGHT;

use super::hasher::hash;
use crate::backend::Address;

/// Virtual points per unit of node weight.
pub const POINTS_PER_WEIGHT: usize = 160;

/// Ketama-style ring mapping keys to node positions.
///
/// Each node contributes `160 * weight` points. A key belongs to the
/// node owning the first point at or after the key's hash, wrapping
/// around to the lowest point.
#[derive(Debug, Clone, Default)]
pub struct Ring {
    points: BTreeMap<i64, usize>,
    nodes: usize,
}

impl Ring {
    /// Build the ring. Node identity is its name if set, otherwise its
    /// position in the list. Weights are clamped to `1..=MAX_WEIGHT`.
    pub fn new(nodes: &[Address]) -> Self {
        let mut points = BTreeMap::new();

        for (i, node) in nodes.iter().enumerate() {
            let weight = node.weight.clamp(1, MAX_WEIGHT);
            let count = POINTS_PER_WEIGHT
                .checked_mul(weight)
                .unwrap_or(POINTS_PER_WEIGHT * MAX_WEIGHT);
            for n in 0..count {
                let label = match node.name {
                    Some(ref name) => format!("{}*{}{}", name, weight, n),
                    None => format!("SHARD-{}-NODE-{}", i, n),
                };
                points.insert(hash(label.as_bytes()), i);
            }
        }

        Self {
            points,
            nodes: nodes.len(),
        }
    }

    /// Node position owning the key.
    pub fn shard(&self, key: &[u8]) -> usize {
        let hash = hash(key);
        self.points
            .range(hash..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, node)| *node)
            .unwrap_or(0)
    }

    /// Number of nodes on the ring.
    pub fn len(&self) -> usize {
        self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes == 0
    }

    /// Number of virtual points.
    pub fn points(&self) -> usize {
        self.points.len()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn nodes(count: usize) -> Vec<Address> {
        (0..count)
            .map(|i| Address {
                port: 7000 + i as u16,
                node_number: i,
                ..Address::new_test()
            })
            .collect()
    }

    #[test]
    fn test_single_node() {
        let ring = Ring::new(&nodes(1));
        assert_eq!(ring.len(), 1);
        for key in ["a", "b", "queue", ""] {
            assert_eq!(ring.shard(key.as_bytes()), 0);
        }
    }

    #[test]
    fn test_deterministic() {
        let first = Ring::new(&nodes(4));
        let second = Ring::new(&nodes(4));
        for i in 0..1000 {
            let key = format!("key:{}", i);
            assert_eq!(first.shard(key.as_bytes()), second.shard(key.as_bytes()));
        }
    }

    #[test]
    fn test_distribution() {
        let ring = Ring::new(&nodes(4));
        let mut counts = [0usize; 4];
        for i in 0..10_000 {
            counts[ring.shard(format!("key:{}", i).as_bytes())] += 1;
        }
        for count in counts {
            // Roughly 2500 each.
            assert!(count > 1500, "{:?}", counts);
        }
    }

    #[test]
    fn test_weight_and_names() {
        let mut weighted = nodes(2);
        weighted[1].weight = 3;
        let ring = Ring::new(&weighted);
        assert!(ring.points() > 4 * POINTS_PER_WEIGHT - 10);

        let mut counts = [0usize; 2];
        for i in 0..10_000 {
            counts[ring.shard(format!("key:{}", i).as_bytes())] += 1;
        }
        assert!(counts[1] > counts[0] * 2, "{:?}", counts);

        // Named nodes hash by name, so reordering keeps key placement.
        let mut named = nodes(2);
        named[0].name = Some("a".into());
        named[1].name = Some("b".into());
        let forward = Ring::new(&named);
        named.reverse();
        let backward = Ring::new(&named);
        for i in 0..100 {
            let key = format!("key:{}", i);
            let owner = &named[backward.shard(key.as_bytes())];
            let expected = &named[1 - forward.shard(key.as_bytes())];
            assert_eq!(owner.name, expected.name);
        }
    }

    #[test]
    fn test_weight_clamped() {
        let mut heavy = nodes(2);
        heavy[0].weight = usize::MAX / 100;
        let ring = Ring::new(&heavy);
        assert!(ring.points() <= POINTS_PER_WEIGHT * (MAX_WEIGHT + 1));
        assert!(ring.points() > POINTS_PER_WEIGHT * MAX_WEIGHT - 100);
    }
}
