/// Hydrometric station catalog.
///
/// The catalog is the single source of truth for station metadata: name,
/// location, drainage area and period of record. It is read from a TOML
/// file once at startup and never mutated afterwards; building that file
/// from the raw WSC inventory happens outside this service.
///
/// Planar (UTM) coordinates may be stored in the file. Entries without
/// them are projected on load.

use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::model::{GeoPoint, PeriodOfRecord, PlanarPoint, StationRecord, StationStatus, UtmZone};
use crate::projection;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse catalog: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("station {id}: {reason}")]
    InvalidStation { id: String, reason: String },

    #[error("duplicate station id '{0}' in catalog")]
    DuplicateStation(String),
}

// ---------------------------------------------------------------------------
// TOML structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CatalogFile {
    #[serde(default)]
    station: Vec<StationEntry>,
}

#[derive(Debug, Deserialize)]
struct StationEntry {
    id: String,
    name: String,
    latitude: f64,
    longitude: f64,

    // Pre-computed UTM position (optional)
    easting: Option<f64>,
    northing: Option<f64>,
    zone: Option<UtmZone>,

    drainage_area_km2: Option<f64>,
    first_year: Option<i32>,
    last_year: Option<i32>,
    #[serde(default = "default_status")]
    status: StationStatus,
    regulated: Option<bool>,
}

fn default_status() -> StationStatus {
    StationStatus::Active
}

impl StationEntry {
    fn into_record(self) -> Result<StationRecord, CatalogError> {
        let invalid = |reason: String| CatalogError::InvalidStation {
            id: self.id.clone(),
            reason,
        };

        if self.id.trim().is_empty() {
            return Err(invalid("station id must not be empty".to_string()));
        }

        let planar = match (self.easting, self.northing, self.zone) {
            (Some(easting), Some(northing), Some(zone)) => PlanarPoint { easting, northing, zone },
            _ => projection::project(self.latitude, self.longitude)
                .map_err(|e| invalid(e.to_string()))?,
        };

        let record = match (self.first_year, self.last_year) {
            (Some(first_year), Some(last_year)) if first_year <= last_year => {
                Some(PeriodOfRecord { first_year, last_year })
            }
            (Some(first), Some(last)) => {
                return Err(invalid(format!("first_year {} is after last_year {}", first, last)));
            }
            _ => None,
        };

        Ok(StationRecord {
            id: self.id.trim().to_string(),
            name: self.name,
            location: GeoPoint::new(self.latitude, self.longitude),
            planar,
            drainage_area_km2: self.drainage_area_km2,
            record,
            status: self.status,
            regulated: self.regulated,
        })
    }
}

// ---------------------------------------------------------------------------
// Catalog
// ---------------------------------------------------------------------------

/// Read-only station catalog with O(1) lookup by station id.
#[derive(Debug, Clone, Default)]
pub struct StationCatalog {
    stations: Vec<StationRecord>,
    index: HashMap<String, usize>,
}

impl StationCatalog {
    /// Builds a catalog from already-constructed records.
    ///
    /// # Errors
    /// `DuplicateStation` if two records share an id.
    pub fn from_records(stations: Vec<StationRecord>) -> Result<Self, CatalogError> {
        let mut index = HashMap::with_capacity(stations.len());
        for (i, station) in stations.iter().enumerate() {
            if index.insert(station.id.clone(), i).is_some() {
                return Err(CatalogError::DuplicateStation(station.id.clone()));
            }
        }
        Ok(Self { stations, index })
    }

    /// Parses catalog TOML text.
    pub fn from_toml_str(contents: &str) -> Result<Self, CatalogError> {
        let file: CatalogFile = toml::from_str(contents)?;
        let records = file
            .station
            .into_iter()
            .map(StationEntry::into_record)
            .collect::<Result<Vec<_>, _>>()?;
        Self::from_records(records)
    }

    pub fn stations(&self) -> &[StationRecord] {
        &self.stations
    }

    pub fn len(&self) -> usize {
        self.stations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stations.is_empty()
    }

    /// Looks up a station by id. Returns `None` if not found.
    pub fn find_station(&self, station_id: &str) -> Option<&StationRecord> {
        self.index.get(station_id).map(|&i| &self.stations[i])
    }

    /// Drainage area for unit-runoff derivation. `None` for unknown
    /// stations and stations without a recorded area.
    pub fn drainage_area(&self, station_id: &str) -> Option<f64> {
        self.find_station(station_id).and_then(|s| s.drainage_area_km2)
    }

    pub fn all_station_ids(&self) -> Vec<&str> {
        self.stations.iter().map(|s| s.id.as_str()).collect()
    }
}

/// Loads the station catalog from a TOML file.
pub fn load_catalog<P: AsRef<Path>>(path: P) -> Result<StationCatalog, CatalogError> {
    let path = path.as_ref();
    let contents = fs::read_to_string(path).map_err(|source| CatalogError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let catalog = StationCatalog::from_toml_str(&contents)?;
    tracing::info!(path = %path.display(), stations = catalog.len(), "Loaded station catalog");
    Ok(catalog)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
