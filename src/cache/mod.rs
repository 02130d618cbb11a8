/// Distributed cache client layer.
///
/// - `ring`: consistent-hash placement of keys on nodes
/// - `memcached`: one pooled `memcache` client per node, and
///   `HashClient` routing keys across nodes
/// - `topology`: discovers live nodes and rebuilds the routing client
///   when membership changes
/// - `memory`: in-process client for tests and single-process use

pub mod memcached;
pub mod memory;
pub mod ring;
pub mod topology;

use std::time::Duration;

use crate::error::CacheError;

pub use memcached::{HashClient, MemcachedNode};
pub use memory::MemoryCache;
pub use ring::HashRing;
pub use topology::{CacheTopology, DnsDiscovery, NodeDiscovery};

/// Key-value cache operations used by the query service.
///
/// A `ttl` of zero means the entry does not expire.
pub trait CacheClient: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError>;
    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError>;
}
