/// HYDAT historical daily flow store.
///
/// Daily flows live in the national HYDAT archive, table `DLY_FLOWS`: one
/// row per station-month with `FLOW1..FLOW31`, `FLOW_SYMBOL1..FLOW_SYMBOL31`
/// and `NO_DAYS`. The explorer reads them through the `FlowStore` trait so
/// the query pipeline can run against PostgreSQL in production and against
/// `MemoryFlowStore` in tests.
///
/// Connection lifecycle stays inside one call: `PostgresFlowStore` opens a
/// connection, runs a single query and drops it. Fan-out workers therefore
/// never share a `postgres::Client`.

use postgres::{Client, NoTls, Row};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::RwLock;
use thiserror::Error;

use crate::db::{self, DbConfigError};
use crate::model::{DailyFlowRow, DAYS_PER_ROW};

// ---------------------------------------------------------------------------
// Store trait
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] postgres::Error),

    #[error("malformed row for {station_id} {year}-{month}: {reason}")]
    MalformedRow {
        station_id: String,
        year: i32,
        month: i32,
        reason: String,
    },

    #[error("store offline: {0}")]
    Offline(String),
}

/// Blocking station-id → rows lookup.
///
/// An unknown station yields an empty `Vec`, not an error.
pub trait FlowStore: Send + Sync {
    fn daily_flows(&self, station_id: &str) -> Result<Vec<DailyFlowRow>, StoreError>;
}

// ---------------------------------------------------------------------------
// PostgreSQL
// ---------------------------------------------------------------------------

/// Schema holding the HYDAT tables.
pub const HYDAT_SCHEMA: &str = "hydat";

/// Reads `hydat.dly_flows` from PostgreSQL.
#[derive(Debug, Clone)]
pub struct PostgresFlowStore {
    database_url: String,
}

impl PostgresFlowStore {
    pub fn new(database_url: impl Into<String>) -> Self {
        Self {
            database_url: database_url.into(),
        }
    }

    /// Builds a store from `DATABASE_URL` (after loading `.env`).
    pub fn from_env() -> Result<Self, DbConfigError> {
        Ok(Self::new(db::database_url()?))
    }

    fn connect(&self) -> Result<Client, StoreError> {
        Ok(Client::connect(&self.database_url, NoTls)?)
    }
}

impl FlowStore for PostgresFlowStore {
    fn daily_flows(&self, station_id: &str) -> Result<Vec<DailyFlowRow>, StoreError> {
        let mut client = self.connect()?;
        let rows = client.query(daily_flows_sql().as_str(), &[&station_id])?;

        tracing::debug!(station = %station_id, rows = rows.len(), "Fetched HYDAT daily flow rows");

        rows.iter().map(row_to_daily_flow).collect()
    }
}

/// `SELECT` over the 31 flow and symbol columns, ordered by year and month.
pub fn daily_flows_sql() -> String {
    let flows: Vec<String> = (1..=DAYS_PER_ROW).map(|d| format!("flow{}", d)).collect();
    let symbols: Vec<String> = (1..=DAYS_PER_ROW).map(|d| format!("flow_symbol{}", d)).collect();
    format!(
        "SELECT station_number, year, month, no_days, {}, {}
         FROM {}.dly_flows
         WHERE station_number = $1
         ORDER BY year, month",
        flows.join(", "),
        symbols.join(", "),
        HYDAT_SCHEMA,
    )
}

// Column offsets in the SELECT above
const FIRST_FLOW_COL: usize = 4;
const FIRST_SYMBOL_COL: usize = FIRST_FLOW_COL + DAYS_PER_ROW;

fn row_to_daily_flow(row: &Row) -> Result<DailyFlowRow, StoreError> {
    let station_id: String = row.try_get(0)?;
    let year: i32 = row.try_get(1)?;
    let month: i32 = row.try_get(2)?;
    let no_days: Option<i32> = row.try_get(3)?;

    let malformed = |reason: &str| StoreError::MalformedRow {
        station_id: station_id.clone(),
        year,
        month,
        reason: reason.to_string(),
    };

    let month_u = u32::try_from(month).map_err(|_| malformed("negative month"))?;
    // A negative day count means no valid slots, same as NULL
    let no_days = no_days.and_then(|n| u32::try_from(n).ok());

    let mut out = DailyFlowRow::empty(&station_id, year, month_u, no_days);

    for day in 0..DAYS_PER_ROW {
        let flow: Option<Decimal> = row.try_get(FIRST_FLOW_COL + day)?;
        out.flows[day] = flow.and_then(|d| d.to_f64());

        let symbol: Option<String> = row.try_get(FIRST_SYMBOL_COL + day)?;
        out.flags[day] = normalize_symbol(symbol);
    }

    Ok(out)
}

/// HYDAT stores "no symbol" as NULL or blank text.
fn normalize_symbol(symbol: Option<String>) -> Option<String> {
    symbol
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

/// `FlowStore` backed by a map. Stations can be marked offline to simulate
/// store failures; every lookup is counted.
#[derive(Debug, Default)]
pub struct MemoryFlowStore {
    rows: RwLock<HashMap<String, Vec<DailyFlowRow>>>,
    offline: RwLock<HashSet<String>>,
    calls: AtomicUsize,
}

impl MemoryFlowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: impl IntoIterator<Item = DailyFlowRow>) -> Self {
        let store = Self::new();
        for row in rows {
            store.insert(row);
        }
        store
    }

    pub fn insert(&self, row: DailyFlowRow) {
        if let Ok(mut map) = self.rows.write() {
            map.entry(row.station_id.clone()).or_default().push(row);
        }
    }

    /// Makes every lookup for `station_id` fail.
    pub fn set_offline(&self, station_id: &str) {
        if let Ok(mut set) = self.offline.write() {
            set.insert(station_id.to_string());
        }
    }

    /// Number of `daily_flows` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl FlowStore for MemoryFlowStore {
    fn daily_flows(&self, station_id: &str) -> Result<Vec<DailyFlowRow>, StoreError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let offline = self
            .offline
            .read()
            .map_err(|_| StoreError::Offline("store lock poisoned".to_string()))?;
        if offline.contains(station_id) {
            return Err(StoreError::Offline(format!("station {} unreachable", station_id)));
        }

        let rows = self
            .rows
            .read()
            .map_err(|_| StoreError::Offline("store lock poisoned".to_string()))?;
        Ok(rows.get(station_id).cloned().unwrap_or_default())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
