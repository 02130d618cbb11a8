/// HTTP endpoint for map and hydrograph consumers
///
/// Provides a small JSON API over the explorer core so a presentation
/// layer can render station maps and hydrographs.
///
/// Endpoints:
/// - GET /health - Service health check
/// - GET /stations/nearby?lat=&lon=&radius_km= - Hydrometric stations near a point
/// - GET /climate/nearby?lat=&lon=&radius_km= - Climate stations near a point
///
/// Both nearby endpoints also accept `x=&y=` (EPSG:3857 metres, as sent by
/// a map click) in place of `lat`/`lon`.
/// - GET /flows?stations=A,B,... - Merged unit-runoff table for several stations

use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::climate_stations::{self, ClimateStation};
use crate::config::ServiceConfig;
use crate::error::ExplorerError;
use crate::fanout::Orchestrator;
use crate::model::{GeoPoint, MergedSeries, StationStatus};
use crate::projection;
use crate::proximity;
use crate::query::HydrographQuery;
use crate::stations::StationCatalog;

type JsonResponse = tiny_http::Response<std::io::Cursor<Vec<u8>>>;

// ---------------------------------------------------------------------------
// Response Types
// ---------------------------------------------------------------------------

/// One station in a proximity search result
#[derive(Debug, Serialize)]
pub struct NearbyStationData {
    pub station_id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    pub distance_km: f64,
    pub drainage_area_km2: Option<f64>,
    pub status: StationStatus,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
}

/// Proximity search response
#[derive(Debug, Serialize)]
pub struct NearbyResponse {
    pub latitude: f64,
    pub longitude: f64,
    pub zone: String,
    pub radius_km: f64,
    pub stations: Vec<NearbyStationData>,
}

/// One climate station with its daily bulk-data downloads
#[derive(Debug, Serialize)]
pub struct NearbyClimateData {
    pub station_id: u32,
    pub climate_id: String,
    pub name: String,
    pub distance_km: f64,
    pub monthly_first_year: Option<i32>,
    pub monthly_last_year: Option<i32>,
    pub bulk_data_urls: Vec<String>,
}

/// Merged flows response
#[derive(Debug, Serialize)]
pub struct FlowsResponse {
    pub merged: MergedSeries,
    pub errors: BTreeMap<String, String>,
    pub elapsed_ms: u64,
}

// ---------------------------------------------------------------------------
// State
// ---------------------------------------------------------------------------

/// Everything a request handler needs. Shared read-only across requests.
pub struct AppState {
    pub config: ServiceConfig,
    pub catalog: Arc<StationCatalog>,
    pub climate: Vec<ClimateStation>,
    pub orchestrator: Orchestrator<HydrographQuery>,
}

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// Routes one request URL to its handler. Returns status code and body.
pub fn handle_request(state: &AppState, url: &str) -> (u16, serde_json::Value) {
    let (path, query) = match url.split_once('?') {
        Some((path, query)) => (path, parse_query(query)),
        None => (url, HashMap::new()),
    };

    match path {
        "/health" => handle_health(state),
        "/stations/nearby" => handle_nearby(state, &query),
        "/climate/nearby" => handle_climate_nearby(state, &query),
        "/flows" => handle_flows(state, &query),
        _ => (
            404,
            serde_json::json!({
                "error": "Not found",
                "available_endpoints": ["/health", "/stations/nearby", "/climate/nearby", "/flows"]
            }),
        ),
    }
}

/// Decodes `a=1&b=x%20y` into a map. Later duplicates win.
fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (decode(key), decode(value))
        })
        .collect()
}

fn decode(s: &str) -> String {
    let s = s.replace('+', " ");
    urlencoding::decode(&s)
        .map(|c| c.into_owned())
        .unwrap_or_else(|_| s.clone())
}

fn bad_request(message: impl Into<String>) -> (u16, serde_json::Value) {
    (400, serde_json::json!({ "error": message.into() }))
}

fn required_f64(query: &HashMap<String, String>, name: &str) -> Result<f64, (u16, serde_json::Value)> {
    let raw = query
        .get(name)
        .ok_or_else(|| bad_request(format!("missing query parameter '{}'", name)))?;
    raw.trim()
        .parse()
        .map_err(|_| bad_request(format!("'{}' is not a number: {}", name, raw)))
}

fn optional_f64(query: &HashMap<String, String>, name: &str) -> Result<Option<f64>, (u16, serde_json::Value)> {
    match query.get(name) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| bad_request(format!("'{}' is not a number: {}", name, raw))),
    }
}

/// Target point and radius shared by both proximity endpoints.
fn search_params(
    state: &AppState,
    query: &HashMap<String, String>,
) -> Result<(GeoPoint, f64), (u16, serde_json::Value)> {
    // map clicks arrive as Web-Mercator metres
    let target = match (optional_f64(query, "x")?, optional_f64(query, "y")?) {
        (Some(x), Some(y)) => projection::web_mercator_to_geographic(x, y),
        _ => GeoPoint::new(required_f64(query, "lat")?, required_f64(query, "lon")?),
    };
    let radius_km = state
        .config
        .search
        .pick_radius(optional_f64(query, "radius_km")?)
        .map_err(|e| bad_request(e.to_string()))?;
    Ok((target, radius_km))
}

fn to_json<T: Serialize>(status: u16, body: &T) -> (u16, serde_json::Value) {
    match serde_json::to_value(body) {
        Ok(value) => (status, value),
        Err(e) => (500, serde_json::json!({ "error": format!("serialization failed: {}", e) })),
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// Handle /health endpoint
fn handle_health(state: &AppState) -> (u16, serde_json::Value) {
    let cache_nodes: Vec<String> = state
        .orchestrator
        .service()
        .topology()
        .current_nodes()
        .iter()
        .map(|a| a.to_string())
        .collect();
    (
        200,
        serde_json::json!({
            "status": "ok",
            "service": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "stations": state.catalog.len(),
            "cache_nodes": cache_nodes,
        }),
    )
}

/// Handle /stations/nearby endpoint
fn handle_nearby(state: &AppState, query: &HashMap<String, String>) -> (u16, serde_json::Value) {
    let (target, radius_km) = match search_params(state, query) {
        Ok(params) => params,
        Err(response) => return response,
    };

    let found = match proximity::find_nearby(target, radius_km, state.catalog.stations()) {
        Ok(found) => found,
        Err(e) => return bad_request(e.to_string()),
    };

    let zone = projection::project_point(target)
        .map(|p| p.zone.to_string())
        .unwrap_or_default();

    let stations = found
        .iter()
        .map(|n| NearbyStationData {
            station_id: n.station.id.clone(),
            name: n.station.name.clone(),
            latitude: n.station.location.lat,
            longitude: n.station.location.lon,
            distance_km: n.distance_km(),
            drainage_area_km2: n.station.drainage_area_km2,
            status: n.station.status,
            first_year: n.station.record.map(|r| r.first_year),
            last_year: n.station.record.map(|r| r.last_year),
        })
        .collect();

    to_json(
        200,
        &NearbyResponse {
            latitude: target.lat,
            longitude: target.lon,
            zone,
            radius_km,
            stations,
        },
    )
}

/// Handle /climate/nearby endpoint
fn handle_climate_nearby(state: &AppState, query: &HashMap<String, String>) -> (u16, serde_json::Value) {
    let (target, radius_km) = match search_params(state, query) {
        Ok(params) => params,
        Err(response) => return response,
    };

    let found = match climate_stations::find_climate_stations(target, radius_km, &state.climate) {
        Ok(found) => found,
        Err(e) => return bad_request(e.to_string()),
    };

    let stations: Vec<NearbyClimateData> = found
        .iter()
        .map(|n| {
            let s = n.station;
            let bulk_data_urls = match (s.monthly_first_year, s.monthly_last_year) {
                (Some(first), Some(last)) => climate_stations::bulk_data_urls(s.station_id, first, last),
                _ => Vec::new(),
            };
            NearbyClimateData {
                station_id: s.station_id,
                climate_id: s.climate_id.clone(),
                name: s.name.clone(),
                distance_km: n.distance_km(),
                monthly_first_year: s.monthly_first_year,
                monthly_last_year: s.monthly_last_year,
                bulk_data_urls,
            }
        })
        .collect();

    to_json(200, &serde_json::json!({ "radius_km": radius_km, "stations": stations }))
}

/// Handle /flows endpoint
fn handle_flows(state: &AppState, query: &HashMap<String, String>) -> (u16, serde_json::Value) {
    let Some(raw) = query.get("stations") else {
        return bad_request("missing query parameter 'stations'");
    };
    let station_ids: Vec<String> = raw
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect();
    if station_ids.is_empty() {
        return bad_request("'stations' must name at least one station");
    }

    let report = state.orchestrator.fetch_all(&station_ids);
    let response = FlowsResponse {
        merged: report.merged(&station_ids),
        errors: report.errors(),
        elapsed_ms: report.elapsed.as_millis() as u64,
    };

    // Nothing usable at all is still a well-formed answer, but not a success
    let status = if report.succeeded() == 0 { 404 } else { 200 };
    to_json(status, &response)
}

// ---------------------------------------------------------------------------
// HTTP Server
// ---------------------------------------------------------------------------

/// Start HTTP endpoint server on the specified port
pub fn start_endpoint_server(port: u16, state: AppState) -> Result<(), ExplorerError> {
    let server = tiny_http::Server::http(format!("0.0.0.0:{}", port))
        .map_err(|e| ExplorerError::Config(format!("Failed to start HTTP server: {}", e)))?;

    tracing::info!(port, "HTTP endpoint listening");

    for request in server.incoming_requests() {
        let (status, body) = handle_request(&state, request.url());
        tracing::debug!(url = %request.url(), status, "Handled request");

        if let Err(e) = request.respond(create_response(status, &body)) {
            tracing::warn!(error = %e, "Failed to send response");
        }
    }

    Ok(())
}

/// Create HTTP response with JSON body
fn create_response(status_code: u16, json: &serde_json::Value) -> JsonResponse {
    let body = serde_json::to_string_pretty(json).unwrap_or_else(|_| "{}".to_string());

    let response = tiny_http::Response::from_data(body.into_bytes())
        .with_status_code(tiny_http::StatusCode::from(status_code));

    match tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..]) {
        Ok(header) => response.with_header(header),
        Err(_) => response,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
