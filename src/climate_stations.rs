/// MSC Climate Station TOML Configuration Loader
///
/// Loads Meteorological Service of Canada climate station metadata from
/// climate_stations.toml. Climate stations are searched the same way as
/// hydrometric stations, so a flow record can be paired with nearby
/// precipitation and temperature records, and their daily data is
/// downloaded through the MSC bulk-data service one year at a time.

use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::error::ExplorerResult;
use crate::model::{GeoPoint, PlanarPoint};
use crate::projection;
use crate::proximity::{self, Nearby, Sited};
use crate::stations::CatalogError;

const BULK_DATA_BASE_URL: &str = "https://climate.weather.gc.ca/climate_data/bulk_data_e.html";

// ============================================================================
// TOML Configuration Structures
// ============================================================================

#[derive(Debug, Deserialize)]
struct ClimateConfig {
    #[serde(default)]
    stations: Vec<ClimateStationEntry>,
}

#[derive(Debug, Deserialize)]
struct ClimateStationEntry {
    station_id: u32,
    climate_id: String,
    name: String,
    province: String,
    latitude: f64,
    longitude: f64,
    elevation_m: Option<f64>,
    first_year: Option<i32>,
    last_year: Option<i32>,
    monthly_first_year: Option<i32>,
    monthly_last_year: Option<i32>,
}

// ============================================================================
// Climate stations
// ============================================================================

/// Climate station with its projected position.
#[derive(Debug, Clone, PartialEq)]
pub struct ClimateStation {
    /// Numeric MSC station id used by the bulk-data service.
    pub station_id: u32,
    /// 7-character climate identifier.
    pub climate_id: String,
    pub name: String,
    pub province: String,
    pub location: GeoPoint,
    pub planar: PlanarPoint,
    pub elevation_m: Option<f64>,
    pub first_year: Option<i32>,
    pub last_year: Option<i32>,
    pub monthly_first_year: Option<i32>,
    pub monthly_last_year: Option<i32>,
}

impl ClimateStation {
    /// True when the station reports a monthly period of record.
    pub fn has_monthly_record(&self) -> bool {
        self.monthly_first_year.is_some() && self.monthly_last_year.is_some()
    }
}

impl Sited for ClimateStation {
    fn planar(&self) -> &PlanarPoint {
        &self.planar
    }
}

/// Load climate stations from TOML file
pub fn load_climate_stations<P: AsRef<Path>>(path: P) -> Result<Vec<ClimateStation>, CatalogError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    parse_climate_stations(&content)
}

/// Parse climate station TOML text
pub fn parse_climate_stations(content: &str) -> Result<Vec<ClimateStation>, CatalogError> {
    let config: ClimateConfig = toml::from_str(content)?;

    config
        .stations
        .into_iter()
        .map(|entry| {
            let planar = projection::project(entry.latitude, entry.longitude).map_err(|e| {
                CatalogError::InvalidStation {
                    id: entry.climate_id.clone(),
                    reason: e.to_string(),
                }
            })?;

            Ok(ClimateStation {
                station_id: entry.station_id,
                climate_id: entry.climate_id,
                name: entry.name,
                province: entry.province,
                location: GeoPoint::new(entry.latitude, entry.longitude),
                planar,
                elevation_m: entry.elevation_m,
                first_year: entry.first_year,
                last_year: entry.last_year,
                monthly_first_year: entry.monthly_first_year,
                monthly_last_year: entry.monthly_last_year,
            })
        })
        .collect()
}

/// Finds climate stations near a target, nearest first.
///
/// Same zone-restricted search as hydrometric stations. Stations without a
/// monthly period of record are dropped since there is nothing to
/// download for them.
pub fn find_climate_stations<'a>(
    target: GeoPoint,
    radius_km: f64,
    stations: &'a [ClimateStation],
) -> ExplorerResult<Vec<Nearby<'a, ClimateStation>>> {
    let mut found = proximity::find_nearby(target, radius_km, stations)?;
    found.retain(|n| n.station.has_monthly_record());
    Ok(found)
}

// ============================================================================
// Bulk data URLs
// ============================================================================

/// Bulk-data timeframe code for daily values.
const DAILY_TIMEFRAME: u8 = 2;

/// Builds one daily-timeframe bulk CSV URL per year in
/// `start_year..=end_year`. For daily data the month is ignored by the
/// service, so every URL requests January.
pub fn bulk_data_urls(station_id: u32, start_year: i32, end_year: i32) -> Vec<String> {
    (start_year..=end_year)
        .map(|year| bulk_data_url(station_id, year))
        .collect()
}

fn bulk_data_url(station_id: u32, year: i32) -> String {
    format!(
        "{}?format=csv&stationID={}&Year={}&Month=1&Day=14&timeframe={}&submit={}",
        BULK_DATA_BASE_URL,
        station_id,
        year,
        DAILY_TIMEFRAME,
        urlencoding::encode("Download Data"),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [[stations]]
        station_id = 708
        climate_id = "1107873"
        name = "SQUAMISH AIRPORT"
        province = "BRITISH COLUMBIA"
        latitude = 49.78
        longitude = -123.16
        elevation_m = 52.1
        first_year = 1982
        last_year = 2017
        monthly_first_year = 1982
        monthly_last_year = 2007

        [[stations]]
        station_id = 43843
        climate_id = "1107877"
        name = "SQUAMISH AUTO"
        province = "BRITISH COLUMBIA"
        latitude = 49.78
        longitude = -123.16
        first_year = 2005
        last_year = 2017

        [[stations]]
        station_id = 927
        climate_id = "1105192"
        name = "PEMBERTON AIRPORT"
        province = "BRITISH COLUMBIA"
        latitude = 50.30
        longitude = -122.74
        monthly_first_year = 1984
        monthly_last_year = 2007
    "#;

    #[test]
    fn test_parse_sample_stations() {
        let stations = parse_climate_stations(SAMPLE).expect("sample should parse");
        assert_eq!(stations.len(), 3);
        assert_eq!(stations[0].planar.zone.to_string(), "10U");
        assert!(stations[0].has_monthly_record());
        assert!(!stations[1].has_monthly_record());
    }

    #[test]
    fn test_search_drops_stations_without_monthly_record() {
        let stations = parse_climate_stations(SAMPLE).unwrap();
        let found = find_climate_stations(GeoPoint::new(49.796, -123.203), 100.0, &stations).unwrap();
        let names: Vec<&str> = found.iter().map(|n| n.station.name.as_str()).collect();
        assert_eq!(names, vec!["SQUAMISH AIRPORT", "PEMBERTON AIRPORT"]);
    }

    #[test]
    fn test_bulk_urls_one_per_year() {
        let urls = bulk_data_urls(708, 2000, 2002);
        assert_eq!(urls.len(), 3);
        assert!(urls[0].contains("stationID=708"));
        assert!(urls[0].contains("Year=2000"));
        assert!(urls[2].contains("Year=2002"));
        assert!(urls.iter().all(|u| u.contains("timeframe=2")), "daily timeframe");
        assert!(urls[0].contains("submit=Download%20Data"));
    }

    #[test]
    fn test_bulk_urls_empty_for_inverted_range() {
        assert!(bulk_data_urls(708, 2010, 2000).is_empty());
    }

    #[test]
    fn test_load_bundled_climate_stations() {
        let stations = load_climate_stations("climate_stations.toml").expect("bundled file should load");
        assert!(!stations.is_empty());
    }
}
