/// Multi-station date alignment.
///
/// `merge` outer-joins several stations' series on date so unit runoff
/// can be compared side by side. Every date present in any input becomes a
/// row; stations without an observation on that date leave their cell
/// empty. Nothing is interpolated or filled.

use chrono::NaiveDate;
use std::collections::BTreeMap;

use crate::model::{FlowSeries, MergedCell, MergedRow, MergedSeries};

/// Full outer join of `series` on date. Column order follows input order.
pub fn merge(series: &[FlowSeries]) -> MergedSeries {
    let width = series.len();
    let mut by_date: BTreeMap<NaiveDate, Vec<Option<MergedCell>>> = BTreeMap::new();

    for (column, s) in series.iter().enumerate() {
        for obs in &s.observations {
            let cells = by_date.entry(obs.date).or_insert_with(|| vec![None; width]);
            // duplicate dates within one series: last one wins
            cells[column] = Some(MergedCell {
                unit_runoff: obs.unit_runoff,
                flag: obs.flag.clone(),
            });
        }
    }

    MergedSeries {
        stations: series.iter().map(|s| s.station_id.clone()).collect(),
        rows: by_date
            .into_iter()
            .map(|(date, cells)| MergedRow { date, cells })
            .collect(),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
