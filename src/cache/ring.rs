/// Consistent-hash ring.
///
/// Each node is placed on a 32-bit ring at `VIRTUAL_NODES` points
/// (`crc32("<addr>-<i>")`). A key belongs to the first point clockwise from
/// `crc32(key)`. Adding or removing a node only moves the keys that land
/// on that node's points.

use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Ring points per node.
pub const VIRTUAL_NODES: usize = 100;

#[derive(Debug, Clone)]
pub struct HashRing {
    nodes: Vec<SocketAddr>,
    points: BTreeMap<u32, usize>,
}

impl HashRing {
    /// Builds a ring over `nodes`. Input order does not matter and
    /// duplicate addresses are ignored.
    pub fn new(nodes: &[SocketAddr]) -> Self {
        let mut unique = nodes.to_vec();
        unique.sort();
        unique.dedup();

        let mut points = BTreeMap::new();
        for (idx, node) in unique.iter().enumerate() {
            for v in 0..VIRTUAL_NODES {
                let point = crc32fast::hash(format!("{}-{}", node, v).as_bytes());
                // collisions: lowest address keeps the point
                points.entry(point).or_insert(idx);
            }
        }

        Self { nodes: unique, points }
    }

    pub fn nodes(&self) -> &[SocketAddr] {
        &self.nodes
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Index into `nodes()` of the node owning `key`.
    pub fn node_index(&self, key: &str) -> Option<usize> {
        let hash = crc32fast::hash(key.as_bytes());
        self.points
            .range(hash..)
            .next()
            .or_else(|| self.points.iter().next())
            .map(|(_, &idx)| idx)
    }

    /// Address of the node owning `key`.
    pub fn node_for(&self, key: &str) -> Option<SocketAddr> {
        self.node_index(key).map(|idx| self.nodes[idx])
    }
}
