/// Shared data types for the station explorer.
///
/// Catalog entries (`StationRecord`) are loaded once and read-only after
/// that. Flow data moves through three shapes: wide storage rows
/// (`DailyFlowRow`), one station's long-format series (`FlowSeries`), and
/// the date-aligned comparison table (`MergedSeries`).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of day slots in one HYDAT monthly row.
pub const DAYS_PER_ROW: usize = 31;

// ---------------------------------------------------------------------------
// Coordinates
// ---------------------------------------------------------------------------

/// WGS84 geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lon: f64) -> Self {
        Self { lat, lon }
    }
}

/// UTM zone: longitude zone number plus latitude band letter, e.g. `10U`.
///
/// Planar distances are only comparable between points carrying the
/// exact same zone (number AND letter).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UtmZone {
    pub number: u8,
    pub letter: char,
}

impl UtmZone {
    /// Bands `N` and above are in the northern hemisphere.
    pub fn is_northern(&self) -> bool {
        self.letter >= 'N'
    }
}

impl fmt::Display for UtmZone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.number, self.letter)
    }
}

impl TryFrom<String> for UtmZone {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let value = value.trim();
        let letter = value
            .chars()
            .last()
            .filter(|c| c.is_ascii_alphabetic())
            .ok_or_else(|| format!("zone '{}' is missing its band letter", value))?
            .to_ascii_uppercase();
        let number: u8 = value[..value.len() - 1]
            .parse()
            .map_err(|_| format!("zone '{}' has no valid zone number", value))?;
        if !(1..=60).contains(&number) {
            return Err(format!("zone number {} outside 1..=60", number));
        }
        Ok(UtmZone { number, letter })
    }
}

impl From<UtmZone> for String {
    fn from(zone: UtmZone) -> Self {
        zone.to_string()
    }
}

/// Projected position in metres within a UTM zone.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PlanarPoint {
    pub easting: f64,
    pub northing: f64,
    pub zone: UtmZone,
}

impl PlanarPoint {
    /// Euclidean distance in metres. Meaningless across zones; callers
    /// must compare `zone` first.
    pub fn distance_to(&self, other: &PlanarPoint) -> f64 {
        ((self.easting - other.easting).powi(2) + (self.northing - other.northing).powi(2)).sqrt()
    }
}

// ---------------------------------------------------------------------------
// Station catalog
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StationStatus {
    Active,
    Discontinued,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeriodOfRecord {
    pub first_year: i32,
    pub last_year: i32,
}

/// Catalog entry for one hydrometric station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationRecord {
    /// WSC station number, e.g. `08MG005`.
    pub id: String,
    pub name: String,
    pub location: GeoPoint,
    pub planar: PlanarPoint,
    /// Gross drainage area in km². Absent or zero for some stations.
    pub drainage_area_km2: Option<f64>,
    pub record: Option<PeriodOfRecord>,
    pub status: StationStatus,
    pub regulated: Option<bool>,
}

// ---------------------------------------------------------------------------
// Flow data
// ---------------------------------------------------------------------------

/// One wide storage row: a station-month with a slot per day.
#[derive(Debug, Clone, PartialEq)]
pub struct DailyFlowRow {
    pub station_id: String,
    pub year: i32,
    pub month: u32,
    /// Number of valid days in this month; `None` means no slot is valid.
    pub no_days: Option<u32>,
    /// Flow in m³/s for day `i + 1`.
    pub flows: [Option<f64>; DAYS_PER_ROW],
    /// Quality symbol for day `i + 1` (e.g. `B` backwater, `E` estimated).
    pub flags: [Option<String>; DAYS_PER_ROW],
}

impl DailyFlowRow {
    /// An empty row with every slot missing.
    pub fn empty(station_id: &str, year: i32, month: u32, no_days: Option<u32>) -> Self {
        Self {
            station_id: station_id.to_string(),
            year,
            month,
            no_days,
            flows: [None; DAYS_PER_ROW],
            flags: std::array::from_fn(|_| None),
        }
    }
}

/// One station-day of flow in long format.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowObservation {
    pub station_id: String,
    pub date: NaiveDate,
    pub flow: f64,
    pub flag: Option<String>,
    /// Flow per unit drainage area (L/s/km²); only when drainage area > 0.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_runoff: Option<f64>,
}

/// Date-ordered daily series for a single station.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlowSeries {
    pub station_id: String,
    pub observations: Vec<FlowObservation>,
}

impl FlowSeries {
    pub fn len(&self) -> usize {
        self.observations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observations.is_empty()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.observations.first().map(|o| o.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.observations.last().map(|o| o.date)
    }
}

/// Per-station values on one merged date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedCell {
    pub unit_runoff: Option<f64>,
    pub flag: Option<String>,
}

/// One date of the merged table. `cells[i]` belongs to `stations[i]` of the
/// owning `MergedSeries`; `None` when that station has no observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedRow {
    pub date: NaiveDate,
    pub cells: Vec<Option<MergedCell>>,
}

/// Outer join of several stations' series on date.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct MergedSeries {
    pub stations: Vec<String>,
    pub rows: Vec<MergedRow>,
}

impl MergedSeries {
    /// The non-empty cells of one station's column, in date order.
    pub fn column(&self, station_id: &str) -> Vec<(NaiveDate, &MergedCell)> {
        let Some(idx) = self.stations.iter().position(|s| s == station_id) else {
            return Vec::new();
        };
        self.rows
            .iter()
            .filter_map(|row| row.cells.get(idx).and_then(|c| c.as_ref()).map(|c| (row.date, c)))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zone_parses_and_displays() {
        let zone = UtmZone::try_from("10U".to_string()).expect("10U should parse");
        assert_eq!(zone.number, 10);
        assert_eq!(zone.letter, 'U');
        assert_eq!(zone.to_string(), "10U");
        assert!(zone.is_northern());
    }

    #[test]
    fn test_zone_rejects_bad_input() {
        assert!(UtmZone::try_from("U".to_string()).is_err());
        assert!(UtmZone::try_from("10".to_string()).is_err());
        assert!(UtmZone::try_from("61N".to_string()).is_err());
    }

    #[test]
    fn test_southern_band_is_not_northern() {
        let zone = UtmZone { number: 33, letter: 'H' };
        assert!(!zone.is_northern());
    }

    #[test]
    fn test_planar_distance() {
        let zone = UtmZone { number: 10, letter: 'U' };
        let a = PlanarPoint { easting: 0.0, northing: 0.0, zone };
        let b = PlanarPoint { easting: 3000.0, northing: 4000.0, zone };
        assert!((a.distance_to(&b) - 5000.0).abs() < 1e-9);
    }

    #[test]
    fn test_empty_row_has_no_values() {
        let row = DailyFlowRow::empty("08MG005", 2001, 2, Some(28));
        assert!(row.flows.iter().all(|f| f.is_none()));
        assert!(row.flags.iter().all(|f| f.is_none()));
    }
}
