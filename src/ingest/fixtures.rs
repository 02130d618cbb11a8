/// Test fixtures: HYDAT `DLY_FLOWS` rows built in code.
///
/// The real table stores one station-month per row with `FLOW1..FLOW31`
/// and `FLOW_SYMBOL1..FLOW_SYMBOL31` columns plus `NO_DAYS`. Fixtures mirror
/// that layout so reshape and store tests exercise the same edge cases the
/// database produces: short months, missing `NO_DAYS`, stray values past
/// the end of the month and sparse symbols.

use crate::model::{DailyFlowRow, DAYS_PER_ROW};

/// A row with only the given days filled.
///
/// `values` holds `(day, flow, symbol)` with `day` counted from 1.
#[cfg(test)]
pub(crate) fn fixture_row(
    station: &str,
    year: i32,
    month: u32,
    no_days: Option<u32>,
    values: &[(usize, f64, Option<&str>)],
) -> DailyFlowRow {
    let mut row = DailyFlowRow::empty(station, year, month, no_days);
    for &(day, flow, symbol) in values {
        assert!((1..=DAYS_PER_ROW).contains(&day), "fixture day {} out of range", day);
        row.flows[day - 1] = Some(flow);
        row.flags[day - 1] = symbol.map(str::to_string);
    }
    row
}

/// A row with every one of the 31 slots holding `value`, regardless of
/// how many days the month really has.
#[cfg(test)]
pub(crate) fn fixture_full_row(
    station: &str,
    year: i32,
    month: u32,
    no_days: Option<u32>,
    value: f64,
) -> DailyFlowRow {
    let mut row = DailyFlowRow::empty(station, year, month, no_days);
    row.flows = [Some(value); DAYS_PER_ROW];
    row
}

/// Lillooet River near Pemberton, February 2001: 28 valid days, a freshet
/// estimate flagged `E` on the 3rd and a leftover value in slot 30.
#[cfg(test)]
pub(crate) fn fixture_lillooet_feb_2001() -> DailyFlowRow {
    let mut row = fixture_row(
        "08MG005",
        2001,
        2,
        Some(28),
        &[(1, 21.4, None), (2, 20.9, None), (3, 24.0, Some("E")), (28, 19.7, Some("B"))],
    );
    row.flows[29] = Some(999.0);
    row
}
