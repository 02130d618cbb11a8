/// Flow series analysis.
///
/// Submodules:
/// - `reshape`: wide HYDAT rows into a per-day series, plus unit runoff.
/// - `merge`: aligns several stations' series on date.

pub mod merge;
pub mod reshape;

pub use merge::merge;
pub use reshape::{derive_unit_runoff, reshape, UNIT_RUNOFF_SCALE};
