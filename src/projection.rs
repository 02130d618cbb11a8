//! Universal Transverse Mercator projection on the WGS84 ellipsoid.
//!
//! Stations are compared by planar distance in metres, so every geographic
//! coordinate is projected into the UTM zone its own longitude and
//! latitude fall in. The zone label is the zone number plus the 8° latitude
//! band letter (`10U`, `11U`, ...). Two points are only distance-comparable
//! when the labels match exactly.
//!
//! Series expansions follow Snyder, "Map Projections: A Working Manual"
//! (USGS PP 1395), §8, which are accurate to well under a metre inside a
//! zone.

use std::f64::consts::PI;

use crate::error::{ExplorerError, ExplorerResult};
use crate::model::{GeoPoint, PlanarPoint, UtmZone};

const K0: f64 = 0.9996;
/// WGS84 semi-major axis (metres).
const R: f64 = 6_378_137.0;
/// WGS84 first eccentricity squared.
const E: f64 = 0.006_694_38;
const E2: f64 = E * E;
const E3: f64 = E2 * E;
const E_P2: f64 = E / (1.0 - E);

const M1: f64 = 1.0 - E / 4.0 - 3.0 * E2 / 64.0 - 5.0 * E3 / 256.0;
const M2: f64 = 3.0 * E / 8.0 + 3.0 * E2 / 32.0 + 45.0 * E3 / 1024.0;
const M3: f64 = 15.0 * E2 / 256.0 + 45.0 * E3 / 1024.0;
const M4: f64 = 35.0 * E3 / 3072.0;

const FALSE_EASTING: f64 = 500_000.0;
const FALSE_NORTHING_SOUTH: f64 = 10_000_000.0;

/// Latitude band letters from 80°S northward, 8° each (X spans 72–84°N).
const BAND_LETTERS: &[u8] = b"CDEFGHJKLMNPQRSTUVWX";

/// Spherical Web-Mercator radius used by EPSG:3857.
const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

// ---------------------------------------------------------------------------
// Zone selection
// ---------------------------------------------------------------------------

/// Zone number for a coordinate, including the Norway (32V) and
/// Svalbard (31X–37X) exceptions.
pub fn zone_number(lat: f64, lon: f64) -> u8 {
    if (56.0..64.0).contains(&lat) && (3.0..12.0).contains(&lon) {
        return 32;
    }

    if (72.0..=84.0).contains(&lat) && lon >= 0.0 {
        if lon < 9.0 {
            return 31;
        } else if lon < 21.0 {
            return 33;
        } else if lon < 33.0 {
            return 35;
        } else if lon < 42.0 {
            return 37;
        }
    }

    // lon = 180 wraps back into zone 1
    let n = ((lon + 180.0) / 6.0).floor() as i32 % 60 + 1;
    n as u8
}

/// Latitude band letter. Latitudes beyond the UTM bands clamp to the
/// outermost band (`C` in the south, `X` in the north).
pub fn band_letter(lat: f64) -> char {
    let idx = ((lat + 80.0) / 8.0).floor();
    let idx = idx.clamp(0.0, (BAND_LETTERS.len() - 1) as f64) as usize;
    BAND_LETTERS[idx] as char
}

fn central_longitude(zone_number: u8) -> f64 {
    (zone_number as f64 - 1.0) * 6.0 - 180.0 + 3.0
}

/// Wraps an angle in radians into [-π, π).
fn mod_angle(value: f64) -> f64 {
    (value + PI).rem_euclid(2.0 * PI) - PI
}

fn validate(lat: f64, lon: f64) -> ExplorerResult<()> {
    let lat_ok = lat.is_finite() && (-90.0..=90.0).contains(&lat);
    let lon_ok = lon.is_finite() && (-180.0..=180.0).contains(&lon);
    if lat_ok && lon_ok {
        Ok(())
    } else {
        Err(ExplorerError::InvalidCoordinate { lat, lon })
    }
}

// ---------------------------------------------------------------------------
// Forward / inverse
// ---------------------------------------------------------------------------

/// Projects a geographic coordinate into its own UTM zone.
///
/// # Errors
/// `InvalidCoordinate` when lat is outside [-90, 90] or lon outside
/// [-180, 180] (or either is not finite).
pub fn project(lat: f64, lon: f64) -> ExplorerResult<PlanarPoint> {
    validate(lat, lon)?;
    let zone = UtmZone {
        number: zone_number(lat, lon),
        letter: band_letter(lat),
    };
    let (easting, northing) = forward(lat, lon, zone.number);
    Ok(PlanarPoint { easting, northing, zone })
}

/// Convenience wrapper over `project` for a `GeoPoint`.
pub fn project_point(point: GeoPoint) -> ExplorerResult<PlanarPoint> {
    project(point.lat, point.lon)
}

fn forward(lat: f64, lon: f64, zone_number: u8) -> (f64, f64) {
    let lat_rad = lat.to_radians();
    let lat_sin = lat_rad.sin();
    let lat_cos = lat_rad.cos();
    let lat_tan = lat_rad.tan();
    let lat_tan2 = lat_tan * lat_tan;
    let lat_tan4 = lat_tan2 * lat_tan2;

    let lon_rad = lon.to_radians();
    let central_lon_rad = central_longitude(zone_number).to_radians();

    let n = R / (1.0 - E * lat_sin * lat_sin).sqrt();
    let c = E_P2 * lat_cos * lat_cos;

    let a = lat_cos * mod_angle(lon_rad - central_lon_rad);
    let a2 = a * a;
    let a3 = a2 * a;
    let a4 = a3 * a;
    let a5 = a4 * a;
    let a6 = a5 * a;

    let m = R
        * (M1 * lat_rad - M2 * (2.0 * lat_rad).sin() + M3 * (4.0 * lat_rad).sin()
            - M4 * (6.0 * lat_rad).sin());

    let easting = K0
        * n
        * (a + a3 / 6.0 * (1.0 - lat_tan2 + c)
            + a5 / 120.0 * (5.0 - 18.0 * lat_tan2 + lat_tan4 + 72.0 * c - 58.0 * E_P2))
        + FALSE_EASTING;

    let mut northing = K0
        * (m + n
            * lat_tan
            * (a2 / 2.0
                + a4 / 24.0 * (5.0 - lat_tan2 + 9.0 * c + 4.0 * c * c)
                + a6 / 720.0 * (61.0 - 58.0 * lat_tan2 + lat_tan4 + 600.0 * c - 330.0 * E_P2)));

    if lat < 0.0 {
        northing += FALSE_NORTHING_SOUTH;
    }

    (easting, northing)
}

/// Converts a UTM position back to a geographic coordinate.
///
/// The hemisphere comes from the zone's band letter.
pub fn unproject(easting: f64, northing: f64, zone: UtmZone) -> GeoPoint {
    let sqrt_e = (1.0 - E).sqrt();
    let e1 = (1.0 - sqrt_e) / (1.0 + sqrt_e);
    let e1_2 = e1 * e1;
    let e1_3 = e1_2 * e1;
    let e1_4 = e1_3 * e1;
    let e1_5 = e1_4 * e1;

    let p2 = 3.0 / 2.0 * e1 - 27.0 / 32.0 * e1_3 + 269.0 / 512.0 * e1_5;
    let p3 = 21.0 / 16.0 * e1_2 - 55.0 / 32.0 * e1_4;
    let p4 = 151.0 / 96.0 * e1_3 - 417.0 / 128.0 * e1_5;
    let p5 = 1097.0 / 512.0 * e1_4;

    let x = easting - FALSE_EASTING;
    let mut y = northing;
    if !zone.is_northern() {
        y -= FALSE_NORTHING_SOUTH;
    }

    let m = y / K0;
    let mu = m / (R * M1);

    let p_rad = mu
        + p2 * (2.0 * mu).sin()
        + p3 * (4.0 * mu).sin()
        + p4 * (6.0 * mu).sin()
        + p5 * (8.0 * mu).sin();

    let p_sin = p_rad.sin();
    let p_sin2 = p_sin * p_sin;
    let p_cos = p_rad.cos();
    let p_tan = p_sin / p_cos;
    let p_tan2 = p_tan * p_tan;
    let p_tan4 = p_tan2 * p_tan2;

    let ep_sin = 1.0 - E * p_sin2;
    let ep_sin_sqrt = ep_sin.sqrt();

    let n = R / ep_sin_sqrt;
    let r = (1.0 - E) / ep_sin;

    let c = E_P2 * p_cos * p_cos;
    let c2 = c * c;

    let d = x / (n * K0);
    let d2 = d * d;
    let d3 = d2 * d;
    let d4 = d3 * d;
    let d5 = d4 * d;
    let d6 = d5 * d;

    let lat_rad = p_rad
        - (p_tan / r)
            * (d2 / 2.0 - d4 / 24.0 * (5.0 + 3.0 * p_tan2 + 10.0 * c - 4.0 * c2 - 9.0 * E_P2)
                + d6 / 720.0 * (61.0 + 90.0 * p_tan2 + 298.0 * c + 45.0 * p_tan4 - 252.0 * E_P2 - 3.0 * c2));

    let lon_rad = (d - d3 / 6.0 * (1.0 + 2.0 * p_tan2 + c)
        + d5 / 120.0 * (5.0 - 2.0 * c + 28.0 * p_tan2 - 3.0 * c2 + 8.0 * E_P2 + 24.0 * p_tan4))
        / p_cos;

    let lon_rad = mod_angle(lon_rad + central_longitude(zone.number).to_radians());

    GeoPoint {
        lat: lat_rad.to_degrees(),
        lon: lon_rad.to_degrees(),
    }
}

/// Converts Web-Mercator (EPSG:3857) metres, as reported by web map
/// clicks, to a geographic coordinate.
pub fn web_mercator_to_geographic(x: f64, y: f64) -> GeoPoint {
    let lon = (x / WEB_MERCATOR_RADIUS).to_degrees();
    let lat = (2.0 * (y / WEB_MERCATOR_RADIUS).exp().atan() - PI / 2.0).to_degrees();
    GeoPoint { lat, lon }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
