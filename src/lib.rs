/// wsc_explorer: hydrometric station search and daily flow service.
///
/// # Module structure
///
/// ```text
/// wsc_explorer
/// ├── model       — shared data types (StationRecord, DailyFlowRow, FlowSeries, MergedSeries, …)
/// ├── error       — ExplorerError / CacheError
/// ├── config      — service configuration loader (explorer.toml + env overrides)
/// ├── projection  — WGS84 ⇄ UTM, Web-Mercator click conversion
/// ├── proximity   — zone-restricted nearest-station search
/// ├── stations    — WSC station catalog (stations.toml)
/// ├── climate_stations — MSC climate station catalog + bulk-data URLs
/// ├── db          — PostgreSQL connection and schema validation
/// ├── ingest
/// │   ├── hydat   — FlowStore trait, HYDAT DLY_FLOWS reader, in-memory store
/// │   └── fixtures (test only) — hand-built DLY_FLOWS rows
/// ├── analysis
/// │   ├── reshape — wide monthly rows → daily series with unit runoff
/// │   └── merge   — outer join of several series on date
/// ├── cache
/// │   ├── ring     — consistent-hash ring
/// │   ├── memcached — per-node memcache clients + ring-routed HashClient
/// │   ├── topology — node discovery and client rebuild on membership change
/// │   └── memory   — in-process cache
/// ├── query       — cache-resolving query service, Fetchable query kinds
/// ├── fanout      — parallel per-station fetch with failure isolation
/// └── endpoint    — JSON HTTP API
/// ```

pub mod analysis;
pub mod cache;
pub mod climate_stations;
pub mod config;
pub mod db;
pub mod endpoint;
pub mod error;
pub mod fanout;
pub mod ingest;
pub mod model;
pub mod projection;
pub mod proximity;
pub mod query;
pub mod stations;
