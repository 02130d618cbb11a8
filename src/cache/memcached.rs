/// Memcached node clients and ring routing.
///
/// Each node is served by its own `memcache::Client` (ASCII protocol,
/// small connection pool) created on first use, so building a
/// `HashClient` after a membership change never blocks on the network.
/// `HashClient` places every key on exactly one node through the
/// consistent-hash ring; the crate's own multi-server hashing is not used.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use crate::cache::ring::HashRing;
use crate::cache::CacheClient;
use crate::error::CacheError;

/// Pooled connections per node.
const POOL_SIZE: u32 = 4;

/// Longest key memcached accepts.
const MAX_KEY_LEN: usize = 250;

/// Expiry values above this are read by memcached as unix timestamps.
const MAX_RELATIVE_EXPTIME: u64 = 60 * 60 * 24 * 30;

impl From<memcache::MemcacheError> for CacheError {
    fn from(e: memcache::MemcacheError) -> Self {
        match e {
            memcache::MemcacheError::IOError(io) => CacheError::Io(io),
            other => CacheError::Protocol(other.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Single node
// ---------------------------------------------------------------------------

/// Client for one memcached node.
pub struct MemcachedNode {
    addr: SocketAddr,
    io_timeout: Duration,
    client: Mutex<Option<Arc<memcache::Client>>>,
}

impl std::fmt::Debug for MemcachedNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemcachedNode")
            .field("addr", &self.addr)
            .field("io_timeout", &self.io_timeout)
            .finish()
    }
}

impl MemcachedNode {
    pub fn new(addr: SocketAddr, io_timeout: Duration) -> Self {
        Self {
            addr,
            io_timeout,
            client: Mutex::new(None),
        }
    }

    pub fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        validate_key(key)?;
        Ok(self.client()?.get::<Vec<u8>>(key)?)
    }

    pub fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        validate_key(key)?;
        Ok(self.client()?.set(key, value, exptime_for(ttl))?)
    }

    /// The pooled client, connecting on first use. A failed connect is
    /// retried by the next call.
    fn client(&self) -> Result<Arc<memcache::Client>, CacheError> {
        let mut slot = self.client.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(client) = slot.as_ref() {
            return Ok(client.clone());
        }

        let client = memcache::Client::with_pool_size(connection_url(self.addr, self.io_timeout), POOL_SIZE)?;
        client.set_read_timeout(Some(self.io_timeout))?;
        client.set_write_timeout(Some(self.io_timeout))?;
        tracing::debug!(node = %self.addr, "Connected to memcached node");

        let client = Arc::new(client);
        *slot = Some(client.clone());
        Ok(client)
    }
}

/// `memcache://` URL for one node. `timeout` bounds reads and writes on
/// every pooled connection, `connect_timeout` bounds pool checkout.
fn connection_url(addr: SocketAddr, io_timeout: Duration) -> String {
    let secs = io_timeout.as_secs_f64();
    format!(
        "memcache://{}?protocol=ascii&tcp_nodelay=true&timeout={}&connect_timeout={}",
        addr, secs, secs
    )
}

fn validate_key(key: &str) -> Result<(), CacheError> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(CacheError::Protocol(format!("key length {} out of range", key.len())));
    }
    if key.bytes().any(|b| b.is_ascii_whitespace() || b.is_ascii_control()) {
        return Err(CacheError::Protocol(format!("key {:?} contains whitespace or control bytes", key)));
    }
    Ok(())
}

/// Memcached expiry for `ttl`: relative seconds up to 30 days, an absolute
/// unix time beyond that, capped at the largest 32-bit value.
fn exptime_for(ttl: Duration) -> u32 {
    let secs = ttl.as_secs();
    let exptime = if secs > MAX_RELATIVE_EXPTIME {
        let now = u64::try_from(chrono::Utc::now().timestamp()).unwrap_or(0);
        now.saturating_add(secs)
    } else {
        secs
    };
    u32::try_from(exptime).unwrap_or(u32::MAX)
}

// ---------------------------------------------------------------------------
// Ring-routed client
// ---------------------------------------------------------------------------

/// Routes each key to one node via a consistent-hash ring.
#[derive(Debug)]
pub struct HashClient {
    ring: HashRing,
    nodes: Vec<MemcachedNode>,
}

impl HashClient {
    pub fn new(addrs: &[SocketAddr], io_timeout: Duration) -> Self {
        let ring = HashRing::new(addrs);
        let nodes = ring
            .nodes()
            .iter()
            .map(|&addr| MemcachedNode::new(addr, io_timeout))
            .collect();
        Self { ring, nodes }
    }

    fn node_for(&self, key: &str) -> Result<&MemcachedNode, CacheError> {
        self.ring
            .node_index(key)
            .and_then(|idx| self.nodes.get(idx))
            .ok_or(CacheError::NoNodes)
    }
}

impl CacheClient for HashClient {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, CacheError> {
        self.node_for(key)?.get(key)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Duration) -> Result<(), CacheError> {
        self.node_for(key)?.set(key, value, ttl)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
