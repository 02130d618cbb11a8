/// Cache topology manager.
///
/// Tracks which cache nodes are alive and owns the routing client built
/// over them. Membership is rediscovered lazily: `get_client` checks
/// whether the resync interval has passed and, if so, resolves the cache
/// host again. Between resyncs it only reads shared state.
///
/// States:
///
/// ```text
/// Stale  --resync()-->  Fresh  --interval elapses-->  Stale
/// ```
///
/// Resync rules:
/// - a failed lookup counts as zero nodes
/// - an unchanged address set keeps the existing client instance, so key
///   placement is not perturbed
/// - a changed set builds a new client, or none when the set is empty
///
/// At most one resync runs at a time. Callers that lose the race use the
/// client as of their read, which is at most one interval stale.

use std::collections::BTreeSet;
use std::io;
use std::net::{SocketAddr, ToSocketAddrs};
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use crate::cache::memcached::HashClient;
use crate::cache::CacheClient;

/// Default seconds between membership checks.
pub const DEFAULT_RESYNC_INTERVAL: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// Discovery
// ---------------------------------------------------------------------------

/// Resolves the current set of cache node addresses.
pub trait NodeDiscovery: Send + Sync {
    fn discover(&self) -> io::Result<Vec<SocketAddr>>;
}

/// Name resolution against the cache service host. Each address record
/// is one node.
#[derive(Debug, Clone)]
pub struct DnsDiscovery {
    host: String,
    port: u16,
}

impl DnsDiscovery {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl NodeDiscovery for DnsDiscovery {
    fn discover(&self) -> io::Result<Vec<SocketAddr>> {
        Ok((self.host.as_str(), self.port).to_socket_addrs()?.collect())
    }
}

/// Builds a routing client over a non-empty node set.
pub type ClientFactory = Box<dyn Fn(&[SocketAddr]) -> Arc<dyn CacheClient> + Send + Sync>;

// ---------------------------------------------------------------------------
// Topology
// ---------------------------------------------------------------------------

#[derive(Default)]
struct TopologyState {
    nodes: BTreeSet<SocketAddr>,
    client: Option<Arc<dyn CacheClient>>,
    last_resync: Option<Instant>,
}

pub struct CacheTopology {
    discovery: Box<dyn NodeDiscovery>,
    factory: ClientFactory,
    resync_interval: Duration,
    state: RwLock<TopologyState>,
    resync_lock: Mutex<()>,
}

impl CacheTopology {
    pub fn new(
        discovery: Box<dyn NodeDiscovery>,
        factory: ClientFactory,
        resync_interval: Duration,
    ) -> Self {
        Self {
            discovery,
            factory,
            resync_interval,
            state: RwLock::new(TopologyState::default()),
            resync_lock: Mutex::new(()),
        }
    }

    /// Memcached nodes behind `host:port`, routed with `HashClient`.
    pub fn memcached(host: &str, port: u16, resync_interval: Duration, io_timeout: Duration) -> Self {
        Self::new(
            Box::new(DnsDiscovery::new(host, port)),
            Box::new(move |nodes: &[SocketAddr]| -> Arc<dyn CacheClient> {
                Arc::new(HashClient::new(nodes, io_timeout))
            }),
            resync_interval,
        )
    }

    /// A topology that never finds a node. Every query bypasses the cache.
    pub fn disabled() -> Self {
        struct NoNodes;
        impl NodeDiscovery for NoNodes {
            fn discover(&self) -> io::Result<Vec<SocketAddr>> {
                Ok(Vec::new())
            }
        }
        Self::new(
            Box::new(NoNodes),
            Box::new(|nodes: &[SocketAddr]| -> Arc<dyn CacheClient> {
                Arc::new(HashClient::new(nodes, Duration::ZERO))
            }),
            Duration::MAX,
        )
    }

    pub fn resync_interval(&self) -> Duration {
        self.resync_interval
    }

    /// The current routing client, resyncing first when one is due.
    pub fn get_client(&self) -> Option<Arc<dyn CacheClient>> {
        if self.is_due() {
            // Someone else is resyncing: use what is there now
            if let Ok(_guard) = self.resync_lock.try_lock() {
                if self.is_due() {
                    self.resync_locked();
                }
            }
        }
        self.read_state().client.clone()
    }

    /// Rediscovers nodes now, regardless of the interval.
    pub fn resync(&self) {
        let _guard = self.resync_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.resync_locked();
    }

    /// Node set from the last resync.
    pub fn current_nodes(&self) -> Vec<SocketAddr> {
        self.read_state().nodes.iter().copied().collect()
    }

    fn is_due(&self) -> bool {
        match self.read_state().last_resync {
            None => true,
            Some(at) => at.elapsed() > self.resync_interval,
        }
    }

    fn read_state(&self) -> std::sync::RwLockReadGuard<'_, TopologyState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    // Caller holds `resync_lock`.
    fn resync_locked(&self) {
        let discovered: BTreeSet<SocketAddr> = match self.discovery.discover() {
            Ok(addrs) => addrs.into_iter().collect(),
            Err(e) => {
                tracing::warn!(error = %e, "Cache node discovery failed, treating as zero nodes");
                BTreeSet::new()
            }
        };

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        state.last_resync = Some(Instant::now());

        if discovered == state.nodes {
            tracing::debug!(nodes = discovered.len(), "Cache membership unchanged");
            return;
        }

        state.client = if discovered.is_empty() {
            None
        } else {
            let addrs: Vec<SocketAddr> = discovered.iter().copied().collect();
            Some((self.factory)(&addrs))
        };

        tracing::info!(
            previous = state.nodes.len(),
            current = discovered.len(),
            "Cache membership changed, rebuilt routing client"
        );
        state.nodes = discovered;
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::memory::MemoryCache;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    /// Discovery returning a settable address list and counting calls.
    #[derive(Clone)]
    struct ScriptedDiscovery {
        nodes: Arc<Mutex<io::Result<Vec<SocketAddr>>>>,
        calls: Arc<AtomicUsize>,
        delay: Duration,
    }

    impl ScriptedDiscovery {
        fn with_nodes(nodes: Vec<SocketAddr>) -> Self {
            Self {
                nodes: Arc::new(Mutex::new(Ok(nodes))),
                calls: Arc::new(AtomicUsize::new(0)),
                delay: Duration::ZERO,
            }
        }

        fn slow(mut self, delay: Duration) -> Self {
            self.delay = delay;
            self
        }

        fn set_nodes(&self, nodes: Vec<SocketAddr>) {
            *self.nodes.lock().unwrap() = Ok(nodes);
        }

        fn fail(&self) {
            *self.nodes.lock().unwrap() = Err(io::Error::new(io::ErrorKind::NotFound, "no such host"));
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl NodeDiscovery for ScriptedDiscovery {
        fn discover(&self) -> io::Result<Vec<SocketAddr>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            thread::sleep(self.delay);
            match &*self.nodes.lock().unwrap() {
                Ok(nodes) => Ok(nodes.clone()),
                Err(e) => Err(io::Error::new(e.kind(), e.to_string())),
            }
        }
    }

    fn memory_factory() -> ClientFactory {
        Box::new(|_nodes: &[SocketAddr]| -> Arc<dyn CacheClient> { Arc::new(MemoryCache::new()) })
    }

    fn node(last: u8) -> SocketAddr {
        SocketAddr::from(([10, 0, 0, last], 11211))
    }

    fn topology(discovery: &ScriptedDiscovery, interval: Duration) -> CacheTopology {
        CacheTopology::new(Box::new(discovery.clone()), memory_factory(), interval)
    }

    #[test]
    fn test_two_calls_within_interval_discover_once() {
        let discovery = ScriptedDiscovery::with_nodes(vec![node(1)]);
        let topo = topology(&discovery, Duration::from_secs(60));

        assert!(topo.get_client().is_some());
        assert!(topo.get_client().is_some());
        assert_eq!(discovery.calls(), 1, "second call must not rediscover");
    }

    #[test]
    fn test_unchanged_membership_keeps_client_instance() {
        let discovery = ScriptedDiscovery::with_nodes(vec![node(1), node(2)]);
        let topo = topology(&discovery, Duration::from_millis(10));

        let first = topo.get_client().unwrap();
        thread::sleep(Duration::from_millis(30));
        // same set, different order
        discovery.set_nodes(vec![node(2), node(1)]);
        let second = topo.get_client().unwrap();

        assert_eq!(discovery.calls(), 2, "interval elapsed, so a second discovery ran");
        assert!(Arc::ptr_eq(&first, &second), "client must not be rebuilt");
    }

    #[test]
    fn test_changed_membership_rebuilds_client() {
        let discovery = ScriptedDiscovery::with_nodes(vec![node(1)]);
        let topo = topology(&discovery, Duration::from_millis(10));

        let first = topo.get_client().unwrap();
        discovery.set_nodes(vec![node(1), node(2)]);
        thread::sleep(Duration::from_millis(30));
        let second = topo.get_client().unwrap();

        assert!(!Arc::ptr_eq(&first, &second));
        assert_eq!(topo.current_nodes(), vec![node(1), node(2)]);
    }

    #[test]
    fn test_empty_membership_clears_client() {
        let discovery = ScriptedDiscovery::with_nodes(vec![node(1)]);
        let topo = topology(&discovery, Duration::from_millis(10));
        assert!(topo.get_client().is_some());

        discovery.set_nodes(vec![]);
        thread::sleep(Duration::from_millis(30));
        assert!(topo.get_client().is_none());
        assert!(topo.current_nodes().is_empty());
    }

    #[test]
    fn test_discovery_failure_counts_as_zero_nodes() {
        let discovery = ScriptedDiscovery::with_nodes(vec![node(1)]);
        discovery.fail();
        let topo = topology(&discovery, Duration::from_secs(60));
        assert!(topo.get_client().is_none(), "lookup failure must not panic or error");
    }

    #[test]
    fn test_explicit_resync_ignores_interval() {
        let discovery = ScriptedDiscovery::with_nodes(vec![node(1)]);
        let topo = topology(&discovery, Duration::from_secs(60));
        topo.get_client();
        topo.resync();
        assert_eq!(discovery.calls(), 2);
    }

    #[test]
    fn test_concurrent_callers_trigger_single_resync() {
        let discovery = ScriptedDiscovery::with_nodes(vec![node(1)]).slow(Duration::from_millis(50));
        let topo = Arc::new(topology(&discovery, Duration::from_secs(60)));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let topo = topo.clone();
                thread::spawn(move || {
                    topo.get_client();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(discovery.calls(), 1, "racing callers must not resync in parallel");
        assert!(topo.get_client().is_some());
    }

    #[test]
    fn test_disabled_topology_has_no_client() {
        let topo = CacheTopology::disabled();
        assert!(topo.get_client().is_none());
        assert!(topo.get_client().is_none());
    }

    #[test]
    fn test_dns_discovery_resolves_localhost() {
        let addrs = DnsDiscovery::new("127.0.0.1", 11211).discover().unwrap();
        assert_eq!(addrs, vec![SocketAddr::from(([127, 0, 0, 1], 11211))]);
    }
}
