/// Integration tests against a live HYDAT database
///
/// Prerequisites:
/// - PostgreSQL with the HYDAT archive loaded into schema 'hydat'
/// - DATABASE_URL set in .env
///
/// Run with: cargo test --test hydat_database -- --ignored --test-threads=1

use wsc_explorer::analysis::reshape;
use wsc_explorer::db;
use wsc_explorer::ingest::hydat::{FlowStore, PostgresFlowStore, HYDAT_SCHEMA};
use wsc_explorer::stations::load_catalog;

#[test]
#[ignore]
fn test_hydat_schema_is_present_and_readable() {
    let result = db::connect_and_verify(&[HYDAT_SCHEMA]);
    assert!(result.is_ok(), "HYDAT schema check failed: {:?}", result.err());
}

#[test]
#[ignore]
fn test_missing_schema_is_named_in_error() {
    let error = db::connect_and_verify(&["nonexistent_schema"]).err().expect("schema should be missing");
    assert!(
        error.to_string().contains("nonexistent_schema"),
        "Error message should identify the missing schema"
    );
}

#[test]
#[ignore]
fn test_catalog_stations_reshape_from_database() {
    let store = PostgresFlowStore::from_env().expect("DATABASE_URL must be set");
    let catalog = load_catalog("stations.toml").unwrap();

    let station = catalog.find_station("08MG005").expect("08MG005 in catalog");
    let rows = store.daily_flows(&station.id).expect("query should succeed");
    assert!(!rows.is_empty());

    let series = reshape(&station.id, &rows, station.drainage_area_km2);
    assert!(!series.is_empty());
    assert!(series.observations.windows(2).all(|w| w[0].date <= w[1].date));
    assert!(series.observations.iter().all(|o| o.unit_runoff.is_some()));
}

#[test]
#[ignore]
fn test_unknown_station_returns_no_rows() {
    let store = PostgresFlowStore::from_env().expect("DATABASE_URL must be set");
    let rows = store.daily_flows("00XX000").expect("query should succeed");
    assert!(rows.is_empty());
}
