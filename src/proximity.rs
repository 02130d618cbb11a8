/// Station proximity search.
///
/// Ranks catalog entries by planar UTM distance from a target coordinate.
///
/// Known limitation: only stations in the target's own UTM zone (number
/// and band letter) are considered. A station a few hundred metres across
/// a zone boundary is invisible to the search even when it is closer than
/// every in-zone result. Cross-zone planar distances are not meaningful,
/// and widening the search needs a geodesic distance instead; that change
/// is a product decision, not a bug fix.

use crate::error::ExplorerResult;
use crate::model::{GeoPoint, PlanarPoint, StationRecord};
use crate::projection;

/// Search radii are given in km, distances are computed in metres.
pub const METRES_PER_KM: f64 = 1000.0;

/// Anything with a pre-projected planar position can be searched.
pub trait Sited {
    fn planar(&self) -> &PlanarPoint;
}

impl Sited for StationRecord {
    fn planar(&self) -> &PlanarPoint {
        &self.planar
    }
}

/// A catalog entry together with its distance from the search target.
#[derive(Debug, Clone, PartialEq)]
pub struct Nearby<'a, T> {
    pub station: &'a T,
    pub distance_m: f64,
}

impl<T> Nearby<'_, T> {
    pub fn distance_km(&self) -> f64 {
        self.distance_m / METRES_PER_KM
    }
}

/// Returns catalog entries within `radius_km` of `target`, nearest first.
///
/// An empty result is not an error. A negative or NaN radius matches
/// nothing.
///
/// # Errors
/// `InvalidCoordinate` if the target is outside the geographic range.
pub fn find_nearby<'a, T: Sited>(
    target: GeoPoint,
    radius_km: f64,
    catalog: &'a [T],
) -> ExplorerResult<Vec<Nearby<'a, T>>> {
    let origin = projection::project_point(target)?;
    let search_radius_m = radius_km * METRES_PER_KM;

    let mut found: Vec<Nearby<'a, T>> = catalog
        .iter()
        .filter(|station| station.planar().zone == origin.zone)
        .map(|station| Nearby {
            station,
            distance_m: origin.distance_to(station.planar()),
        })
        .filter(|n| n.distance_m <= search_radius_m)
        .collect();

    found.sort_by(|a, b| a.distance_m.total_cmp(&b.distance_m));

    Ok(found)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
