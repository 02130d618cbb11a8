/// Cache-resolving query service.
///
/// `QueryService::resolve` answers a keyed query from the cache when it
/// can and from `compute` when it must:
///
/// 1. ask the topology for a client; none means compute directly
/// 2. `get(key)`; a decodable hit is returned as is
/// 3. on a miss, compute, store the JSON payload with the TTL, return
///
/// Cache errors at any step are logged and treated as a miss. Compute
/// errors are returned to the caller and never stored.
///
/// Per-station query kinds implement `Fetchable`, which names the cache key
/// and the computation for a station id.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::analysis::reshape;
use crate::cache::CacheTopology;
use crate::error::{ExplorerError, ExplorerResult};
use crate::ingest::FlowStore;
use crate::model::FlowSeries;
use crate::stations::StationCatalog;

// ---------------------------------------------------------------------------
// Query kinds
// ---------------------------------------------------------------------------

/// A per-station query that can be cached.
pub trait Fetchable: Send + Sync {
    type Output: Serialize + DeserializeOwned + Send + 'static;

    /// Cache key for `station_id`; unique across query kinds.
    fn cache_key(&self, station_id: &str) -> String;

    /// Computes the result from source.
    fn fetch(&self, station_id: &str) -> ExplorerResult<Self::Output>;
}

/// Daily flow hydrograph with unit runoff, one station at a time.
pub struct HydrographQuery {
    store: Arc<dyn FlowStore>,
    catalog: Arc<StationCatalog>,
}

impl HydrographQuery {
    pub fn new(store: Arc<dyn FlowStore>, catalog: Arc<StationCatalog>) -> Self {
        Self { store, catalog }
    }
}

impl Fetchable for HydrographQuery {
    type Output = FlowSeries;

    fn cache_key(&self, station_id: &str) -> String {
        format!("hydrograph-{}", station_id)
    }

    fn fetch(&self, station_id: &str) -> ExplorerResult<FlowSeries> {
        let station = self
            .catalog
            .find_station(station_id)
            .ok_or_else(|| ExplorerError::unavailable(station_id, "station not in catalog"))?;

        let rows = self
            .store
            .daily_flows(station_id)
            .map_err(|e| ExplorerError::unavailable(station_id, e.to_string()))?;

        let series = reshape(station_id, &rows, station.drainage_area_km2);
        if series.is_empty() {
            return Err(ExplorerError::unavailable(station_id, "no daily flow records"));
        }
        Ok(series)
    }
}

// ---------------------------------------------------------------------------
// Service
// ---------------------------------------------------------------------------

pub struct QueryService {
    topology: Arc<CacheTopology>,
    ttl: Duration,
}

impl QueryService {
    /// `ttl` is used by `run`; `resolve` takes its own.
    pub fn new(topology: Arc<CacheTopology>, ttl: Duration) -> Self {
        Self { topology, ttl }
    }

    pub fn topology(&self) -> &CacheTopology {
        &self.topology
    }

    /// Resolves one `Fetchable` query for a station with the default TTL.
    pub fn run<Q: Fetchable + ?Sized>(&self, query: &Q, station_id: &str) -> ExplorerResult<Q::Output> {
        self.resolve(&query.cache_key(station_id), || query.fetch(station_id), self.ttl)
    }

    pub fn resolve<T, F>(&self, key: &str, compute: F, ttl: Duration) -> ExplorerResult<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> ExplorerResult<T>,
    {
        let Some(client) = self.topology.get_client() else {
            return compute();
        };

        match client.get(key) {
            Ok(Some(payload)) => match serde_json::from_slice::<T>(&payload) {
                Ok(value) => {
                    tracing::debug!(key = %key, "Cache hit");
                    return Ok(value);
                }
                Err(e) => tracing::warn!(key = %key, error = %e, "Undecodable cache payload, recomputing"),
            },
            Ok(None) => tracing::debug!(key = %key, "Cache miss"),
            Err(e) => tracing::warn!(key = %key, error = %e, "Cache get failed, computing from source"),
        }

        let value = compute()?;

        match serde_json::to_vec(&value) {
            Ok(payload) => {
                if let Err(e) = client.set(key, &payload, ttl) {
                    tracing::warn!(key = %key, error = %e, "Cache set failed");
                }
            }
            Err(e) => tracing::warn!(key = %key, error = %e, "Could not serialize result for cache"),
        }

        Ok(value)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::topology::{ClientFactory, NodeDiscovery};
    use crate::cache::{CacheClient, MemoryCache};
    use crate::error::CacheError;
    use crate::ingest::fixtures::*;
    use crate::ingest::MemoryFlowStore;
    use std::cell::Cell;
    use std::io;
    use std::net::SocketAddr;

    struct OneNode;

    impl NodeDiscovery for OneNode {
        fn discover(&self) -> io::Result<Vec<SocketAddr>> {
            Ok(vec![SocketAddr::from(([10, 0, 0, 1], 11211))])
        }
    }

    /// Every operation fails as if the node were down.
    struct BrokenCache;

    impl CacheClient for BrokenCache {
        fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, CacheError> {
            Err(CacheError::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset")))
        }

        fn set(&self, _key: &str, _value: &[u8], _ttl: Duration) -> Result<(), CacheError> {
            Err(CacheError::Io(io::Error::new(io::ErrorKind::TimedOut, "timed out")))
        }
    }

    fn service_with(client: Arc<dyn CacheClient>) -> QueryService {
        let factory: ClientFactory = Box::new(move |_nodes: &[SocketAddr]| client.clone());
        let topology = CacheTopology::new(Box::new(OneNode), factory, Duration::from_secs(60));
        QueryService::new(Arc::new(topology), Duration::from_secs(3600))
    }

    fn ttl() -> Duration {
        Duration::from_secs(3600)
    }

    #[test]
    fn test_without_cache_computes_directly() {
        let service = QueryService::new(Arc::new(CacheTopology::disabled()), ttl());
        let calls = Cell::new(0);
        let value: Vec<u32> = service
            .resolve("k", || {
                calls.set(calls.get() + 1);
                Ok(vec![1, 2, 3])
            }, ttl())
            .unwrap();
        assert_eq!(value, vec![1, 2, 3]);
        assert_eq!(calls.get(), 1);
    }

    #[test]
    fn test_failing_cache_is_fail_open() {
        let service = service_with(Arc::new(BrokenCache));
        let value: Vec<u32> = service.resolve("k", || Ok(vec![7, 8]), ttl()).unwrap();
        assert_eq!(value, vec![7, 8], "broken cache must not change the result");
    }

    #[test]
    fn test_miss_populates_then_hit_skips_compute() {
        let cache = Arc::new(MemoryCache::new());
        let service = service_with(cache.clone());
        let calls = Cell::new(0);
        let compute = || {
            calls.set(calls.get() + 1);
            Ok(String::from("series"))
        };

        let first: String = service.resolve("hydrograph-08MG005", compute, ttl()).unwrap();
        let second: String = service.resolve("hydrograph-08MG005", compute, ttl()).unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.get(), 1, "second resolve should be served from cache");
        assert_eq!(cache.sets(), 1);
        assert!(cache.contains_key("hydrograph-08MG005"));
    }

    #[test]
    fn test_compute_errors_are_not_cached() {
        let cache = Arc::new(MemoryCache::new());
        let service = service_with(cache.clone());

        let result: ExplorerResult<String> = service.resolve(
            "hydrograph-08MG005",
            || Err(ExplorerError::unavailable("08MG005", "store unreachable")),
            ttl(),
        );

        assert!(matches!(result, Err(ExplorerError::DataUnavailable { .. })));
        assert_eq!(cache.sets(), 0);
        assert!(!cache.contains_key("hydrograph-08MG005"));
    }

    #[test]
    fn test_undecodable_payload_counts_as_miss() {
        let cache = Arc::new(MemoryCache::new());
        cache.set("k", b"not json", ttl()).unwrap();
        let service = service_with(cache.clone());

        let value: Vec<u32> = service.resolve("k", || Ok(vec![4]), ttl()).unwrap();
        assert_eq!(value, vec![4]);
        assert_eq!(cache.get("k").unwrap(), Some(b"[4]".to_vec()), "payload overwritten");
    }

    // -- HydrographQuery --

    fn hydrograph(store: MemoryFlowStore) -> HydrographQuery {
        let catalog = crate::stations::load_catalog("stations.toml").unwrap();
        HydrographQuery::new(Arc::new(store), Arc::new(catalog))
    }

    #[test]
    fn test_hydrograph_cache_key() {
        let query = hydrograph(MemoryFlowStore::new());
        assert_eq!(query.cache_key("08MG005"), "hydrograph-08MG005");
    }

    #[test]
    fn test_hydrograph_reshapes_with_drainage_area() {
        let query = hydrograph(MemoryFlowStore::with_rows(vec![fixture_lillooet_feb_2001()]));
        let series = query.fetch("08MG005").unwrap();

        assert_eq!(series.len(), 4, "slot 30 lies past NO_DAYS and must be dropped");
        assert!(series.observations.iter().all(|o| o.unit_runoff.is_some()));
    }

    #[test]
    fn test_hydrograph_station_without_area_has_no_runoff() {
        // 08GA072 has no drainage area in the bundled catalog
        let query = hydrograph(MemoryFlowStore::with_rows(vec![fixture_full_row(
            "08GA072", 2005, 5, Some(31), 12.0,
        )]));
        let series = query.fetch("08GA072").unwrap();
        assert_eq!(series.len(), 31);
        assert!(series.observations.iter().all(|o| o.unit_runoff.is_none()));
    }

    #[test]
    fn test_hydrograph_unknown_station_unavailable() {
        let query = hydrograph(MemoryFlowStore::new());
        let err = query.fetch("00XX000").unwrap_err();
        assert!(err.to_string().contains("not in catalog"));
    }

    #[test]
    fn test_hydrograph_empty_history_unavailable() {
        let query = hydrograph(MemoryFlowStore::new());
        assert!(matches!(query.fetch("08MG005"), Err(ExplorerError::DataUnavailable { .. })));
    }

    #[test]
    fn test_hydrograph_store_failure_unavailable() {
        let store = MemoryFlowStore::with_rows(vec![fixture_lillooet_feb_2001()]);
        store.set_offline("08MG005");
        let query = hydrograph(store);
        let err = query.fetch("08MG005").unwrap_err();
        assert!(err.to_string().contains("unreachable"));
    }

    #[test]
    fn test_run_caches_hydrograph_series() {
        let cache = Arc::new(MemoryCache::new());
        let service = service_with(cache.clone());
        let query = hydrograph(MemoryFlowStore::with_rows(vec![fixture_lillooet_feb_2001()]));

        let first = service.run(&query, "08MG005").unwrap();
        let second = service.run(&query, "08MG005").unwrap();
        assert_eq!(first, second, "cached series must decode to the same value");
        assert_eq!(cache.sets(), 1);
    }
}
