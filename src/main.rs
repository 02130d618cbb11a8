//! Hydrometric Station Explorer - Service Entry Point
//!
//! Answers two questions for a map/hydrograph front end:
//! 1. Which WSC stations lie near a point?
//! 2. What does each station's daily flow history look like, normalized
//!    by drainage area so stations can be compared?
//!
//! Flow history comes from the HYDAT archive in PostgreSQL and is cached
//! in memcached when cache nodes are reachable.
//!
//! Usage:
//!   wsc_explorer serve --port 8080
//!   wsc_explorer nearby --lat 49.796 --lon -123.203 --radius-km 50
//!   wsc_explorer flows 08MG005 08GA022
//!
//! Environment:
//!   DATABASE_URL   - PostgreSQL connection string (HYDAT in schema 'hydat')
//!   MEMCACHED_HOST - overrides [cache] host
//!   MEMCACHED_PORT - overrides [cache] port
//!   RUST_LOG       - overrides --log-level

use clap::{Parser, Subcommand};
use std::error::Error;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use wsc_explorer::cache::CacheTopology;
use wsc_explorer::climate_stations;
use wsc_explorer::config::{ServiceConfig, DEFAULT_CONFIG_PATH};
use wsc_explorer::db;
use wsc_explorer::endpoint::{self, AppState, FlowsResponse};
use wsc_explorer::fanout::Orchestrator;
use wsc_explorer::ingest::hydat::{PostgresFlowStore, HYDAT_SCHEMA};
use wsc_explorer::model::GeoPoint;
use wsc_explorer::proximity;
use wsc_explorer::query::{HydrographQuery, QueryService};
use wsc_explorer::stations::{self, StationCatalog};

#[derive(Parser, Debug)]
#[command(name = "wsc_explorer")]
#[command(about = "Hydrometric station search and daily flow service", version)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    /// Log level (RUST_LOG takes precedence)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP endpoint
    Serve {
        /// Listen port (default: [server] port)
        #[arg(long)]
        port: Option<u16>,
    },
    /// List stations near a point
    Nearby {
        #[arg(long, allow_negative_numbers = true)]
        lat: f64,
        #[arg(long, allow_negative_numbers = true)]
        lon: f64,
        /// One of the configured radius options
        #[arg(long)]
        radius_km: Option<f64>,
    },
    /// Fetch and merge daily flows for stations, printed as JSON
    Flows {
        #[arg(required = true)]
        stations: Vec<String>,
    },
}

fn main() {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(true).init();

    if let Err(e) = run(cli) {
        eprintln!("\n❌ {}\n", e);
        std::process::exit(1);
    }
}

fn run(cli: Cli) -> Result<(), Box<dyn Error>> {
    let config = ServiceConfig::load(&cli.config)?;
    let catalog = Arc::new(stations::load_catalog(&config.catalog.path)?);

    match cli.command {
        Command::Serve { port } => serve(config, catalog, port),
        Command::Nearby { lat, lon, radius_km } => nearby(&config, &catalog, lat, lon, radius_km),
        Command::Flows { stations } => flows(&config, catalog, &stations),
    }
}

fn build_orchestrator(
    config: &ServiceConfig,
    catalog: Arc<StationCatalog>,
) -> Result<Orchestrator<HydrographQuery>, Box<dyn Error>> {
    let store = PostgresFlowStore::from_env()?;

    let topology = CacheTopology::memcached(
        &config.cache.host,
        config.cache.port,
        config.cache.resync_interval(),
        config.cache.io_timeout(),
    );
    let service = Arc::new(QueryService::new(Arc::new(topology), config.cache.ttl()));
    let query = Arc::new(HydrographQuery::new(Arc::new(store), catalog));

    Ok(Orchestrator::new(service, query).with_task_timeout(config.fanout.task_timeout()))
}

fn serve(config: ServiceConfig, catalog: Arc<StationCatalog>, port: Option<u16>) -> Result<(), Box<dyn Error>> {
    // Fail early on a missing or unreadable HYDAT schema
    db::connect_and_verify(&[HYDAT_SCHEMA])?;
    tracing::info!("Database schema verified");

    let climate = climate_stations::load_climate_stations(&config.climate.path)?;
    let orchestrator = build_orchestrator(&config, catalog.clone())?;
    let port = port.unwrap_or(config.server.port);

    tracing::info!(
        stations = catalog.len(),
        climate_stations = climate.len(),
        cache_host = %config.cache.host,
        "Starting station explorer"
    );

    endpoint::start_endpoint_server(
        port,
        AppState {
            config,
            catalog,
            climate,
            orchestrator,
        },
    )?;
    Ok(())
}

fn nearby(
    config: &ServiceConfig,
    catalog: &StationCatalog,
    lat: f64,
    lon: f64,
    radius_km: Option<f64>,
) -> Result<(), Box<dyn Error>> {
    let radius_km = config.search.pick_radius(radius_km)?;
    let found = proximity::find_nearby(GeoPoint::new(lat, lon), radius_km, catalog.stations())?;

    if found.is_empty() {
        println!("No stations within {} km of ({}, {})", radius_km, lat, lon);
        return Ok(());
    }

    println!("{} stations within {} km of ({}, {}):", found.len(), radius_km, lat, lon);
    for n in &found {
        println!(
            "   {}  {:>7.1} km  {}",
            n.station.id,
            n.distance_km(),
            n.station.name
        );
    }
    Ok(())
}

fn flows(config: &ServiceConfig, catalog: Arc<StationCatalog>, station_ids: &[String]) -> Result<(), Box<dyn Error>> {
    let orchestrator = build_orchestrator(config, catalog)?;
    let station_ids: Vec<String> = station_ids.iter().map(|s| s.trim().to_uppercase()).collect();

    let report = orchestrator.fetch_all(&station_ids);
    for (station, error) in report.errors() {
        eprintln!("   ✗ {} - {}", station, error);
    }

    let response = FlowsResponse {
        merged: report.merged(&station_ids),
        errors: report.errors(),
        elapsed_ms: report.elapsed.as_millis() as u64,
    };
    println!("{}", serde_json::to_string_pretty(&response)?);
    Ok(())
}
