/// Error types shared across the explorer.
///
/// `ExplorerError` is what callers see. Cache failures have their own
/// `CacheError` type and never leave the query service: a broken cache
/// degrades to direct computation instead of failing a request.

use thiserror::Error;

/// Result alias using `ExplorerError`.
pub type ExplorerResult<T> = Result<T, ExplorerError>;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ExplorerError {
    /// Latitude/longitude outside the valid geographic range.
    #[error("invalid coordinate: lat={lat}, lon={lon} (lat must be within [-90, 90], lon within [-180, 180])")]
    InvalidCoordinate { lat: f64, lon: f64 },

    /// The flow store could not produce a series for this station.
    #[error("data unavailable for station {station_id}: {reason}")]
    DataUnavailable { station_id: String, reason: String },

    /// Bad or unreadable configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ExplorerError {
    pub fn unavailable(station_id: &str, reason: impl Into<String>) -> Self {
        ExplorerError::DataUnavailable {
            station_id: station_id.to_string(),
            reason: reason.into(),
        }
    }
}

/// Internal cache failure. Always handled fail-open.
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("no cache nodes available")]
    NoNodes,

    #[error("cache node I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("unexpected cache response: {0}")]
    Protocol(String),
}
