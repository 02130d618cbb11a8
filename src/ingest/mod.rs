/// Flow data ingestion.
///
/// - `hydat`: `FlowStore` trait and the PostgreSQL HYDAT reader
/// - `fixtures` (test only): hand-built `DLY_FLOWS` rows

pub mod hydat;

#[cfg(test)]
pub(crate) mod fixtures;

pub use hydat::{FlowStore, MemoryFlowStore, PostgresFlowStore};
