/// Wide-to-long reshaping of HYDAT daily flow rows.
///
/// Each storage row holds one station-month with 31 day slots. `reshape`
/// turns those rows into one `FlowObservation` per valid, present day:
///
/// - slots past the row's `no_days` are ignored, even when they hold a value
/// - rows with no `no_days` contribute nothing
/// - missing flows are dropped, never zero-filled
/// - slots that cannot form a real date or carry a non-finite flow are
///   dropped and counted; the series is still returned
///
/// Overlapping rows are not deduplicated. Source rows are unique per
/// (station, year, month), so duplicates only appear with bad input.

use chrono::NaiveDate;

use crate::model::{DailyFlowRow, FlowObservation, FlowSeries};

/// Converts m³/s per km² into L/s/km².
pub const UNIT_RUNOFF_SCALE: f64 = 1000.0;

/// Flow normalized by drainage area, in L/s/km².
///
/// `None` when the drainage area is unknown, zero or negative.
pub fn derive_unit_runoff(flow: f64, drainage_area_km2: Option<f64>) -> Option<f64> {
    match drainage_area_km2 {
        Some(area) if area > 0.0 => Some(flow / area * UNIT_RUNOFF_SCALE),
        _ => None,
    }
}

/// Reshapes a station's wide rows into a date-ordered series.
pub fn reshape(station_id: &str, rows: &[DailyFlowRow], drainage_area_km2: Option<f64>) -> FlowSeries {
    let mut observations = Vec::with_capacity(rows.len() * 31);
    let mut dropped = 0usize;

    for row in rows {
        let valid_days = row.no_days.unwrap_or(0) as usize;

        for (idx, (flow, flag)) in row.flows.iter().zip(row.flags.iter()).enumerate() {
            let day = idx + 1;
            if day > valid_days {
                break;
            }

            let Some(flow) = *flow else {
                continue;
            };

            if !flow.is_finite() {
                dropped += 1;
                continue;
            }

            // no_days larger than the calendar month (e.g. 31 for April)
            let Some(date) = NaiveDate::from_ymd_opt(row.year, row.month, day as u32) else {
                dropped += 1;
                continue;
            };

            observations.push(FlowObservation {
                station_id: row.station_id.clone(),
                date,
                flow,
                flag: flag.clone(),
                unit_runoff: derive_unit_runoff(flow, drainage_area_km2),
            });
        }
    }

    if dropped > 0 {
        tracing::debug!(station = %station_id, dropped, "Dropped inconsistent daily flow slots");
    }

    observations.sort_by(|a, b| a.date.cmp(&b.date).then_with(|| a.station_id.cmp(&b.station_id)));

    FlowSeries {
        station_id: station_id.to_string(),
        observations,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::fixtures::*;
    use chrono::Datelike;

    #[test]
    fn test_unit_runoff_requires_positive_area() {
        assert_eq!(derive_unit_runoff(100.0, Some(0.0)), None);
        assert_eq!(derive_unit_runoff(100.0, Some(-5.0)), None);
        assert_eq!(derive_unit_runoff(100.0, None), None);
        assert_eq!(derive_unit_runoff(100.0, Some(f64::NAN)), None);
    }

    #[test]
    fn test_unit_runoff_scaling() {
        assert_eq!(derive_unit_runoff(100.0, Some(50.0)), Some(2000.0));
    }

    #[test]
    fn test_february_never_emits_days_past_no_days() {
        // Values exist in slots 29..31 but the month only has 28 days
        let row = fixture_full_row("08MG005", 2001, 2, Some(28), 10.0);
        let series = reshape("08MG005", &[row], Some(100.0));

        assert_eq!(series.len(), 28);
        assert!(
            series.observations.iter().all(|o| o.date.month() == 2),
            "no observation may spill into March"
        );
        assert_eq!(series.last_date(), NaiveDate::from_ymd_opt(2001, 2, 28));
    }

    #[test]
    fn test_missing_values_are_dropped_not_zero_filled() {
        let row = fixture_row("08MG005", 2010, 6, Some(30), &[(1, 5.0, None), (3, 7.5, Some("E"))]);
        let series = reshape("08MG005", &[row], None);

        assert_eq!(series.len(), 2);
        assert_eq!(series.observations[0].date, NaiveDate::from_ymd_opt(2010, 6, 1).unwrap());
        assert_eq!(series.observations[1].date, NaiveDate::from_ymd_opt(2010, 6, 3).unwrap());
        assert!(series.observations.iter().all(|o| o.flow != 0.0));
    }

    #[test]
    fn test_flags_follow_their_day() {
        let row = fixture_row("08MG005", 2010, 6, Some(30), &[(2, 4.0, Some("B")), (5, 6.0, None)]);
        let series = reshape("08MG005", &[row], None);
        assert_eq!(series.observations[0].flag.as_deref(), Some("B"));
        assert_eq!(series.observations[1].flag, None);
    }

    #[test]
    fn test_missing_no_days_drops_whole_row() {
        let row = fixture_full_row("08MG005", 2010, 1, None, 3.0);
        let series = reshape("08MG005", &[row], Some(10.0));
        assert!(series.is_empty());
    }

    #[test]
    fn test_impossible_day_count_drops_only_bad_slots() {
        // April has 30 days; a row claiming 31 loses only day 31
        let row = fixture_full_row("08MG005", 2010, 4, Some(31), 3.0);
        let series = reshape("08MG005", &[row], Some(10.0));
        assert_eq!(series.len(), 30);
    }

    #[test]
    fn test_non_finite_flow_dropped() {
        let row = fixture_row("08MG005", 2010, 4, Some(30), &[(1, f64::NAN, None), (2, 1.0, None)]);
        let series = reshape("08MG005", &[row], None);
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn test_output_sorted_by_date_across_rows() {
        let later = fixture_full_row("08MG005", 2011, 1, Some(31), 2.0);
        let earlier = fixture_full_row("08MG005", 2010, 12, Some(31), 1.0);
        let series = reshape("08MG005", &[later, earlier], Some(10.0));

        assert_eq!(series.len(), 62);
        assert!(series.observations.windows(2).all(|w| w[0].date <= w[1].date));
        assert_eq!(series.first_date(), NaiveDate::from_ymd_opt(2010, 12, 1));
    }

    #[test]
    fn test_unit_runoff_attached_when_area_known() {
        let row = fixture_row("08MG005", 2010, 6, Some(30), &[(1, 100.0, None)]);
        let with_area = reshape("08MG005", &[row.clone()], Some(50.0));
        let without = reshape("08MG005", &[row], Some(0.0));

        assert_eq!(with_area.observations[0].unit_runoff, Some(2000.0));
        assert_eq!(without.observations[0].unit_runoff, None);
    }

    #[test]
    fn test_overlapping_rows_are_not_deduplicated() {
        let a = fixture_row("08MG005", 2010, 6, Some(30), &[(1, 1.0, None)]);
        let b = fixture_row("08MG005", 2010, 6, Some(30), &[(1, 2.0, None)]);
        let series = reshape("08MG005", &[a, b], None);
        assert_eq!(series.len(), 2);
        // stable sort keeps source order for equal dates
        assert_eq!(series.observations[1].flow, 2.0);
    }

    #[test]
    fn test_empty_input_gives_empty_series_for_station() {
        let series = reshape("08MG005", &[], None);
        assert_eq!(series.station_id, "08MG005");
        assert!(series.is_empty());
    }
}
