//! Per-participant summary statistics.
//!
//! All primitives work over `&[Option<f64>]`: a missing observation is
//! excluded from sums and means, excluded pairwise from the regression,
//! and never coerced to zero. Division by zero and too-short series are
//! explicit errors, not NaN or infinity.

use tracing::warn;

use crate::error::StatsError;
use crate::models::{
    BatchOutcome, DateAxis, Metric, ParticipantFailure, ParticipantSeries, ParticipantStats,
    StatsRecord,
};
use crate::table::{MetricRow, NormalizedTable};

/// Sum of the present observations. An all-missing series totals 0.0.
pub fn total(series: &[Option<f64>]) -> f64 {
    series.iter().flatten().sum()
}

/// Mean of the present observations.
pub fn mean(series: &[Option<f64>]) -> Result<f64, StatsError> {
    let count = series.iter().flatten().count();
    if count == 0 {
        return Err(StatsError::InsufficientData {
            stat: "mean",
            needed: 1,
            present: 0,
        });
    }
    Ok(total(series) / count as f64)
}

/// Percent change between the final two positions of the series as ordered.
///
/// The contract is positional: a missing value at either of the last two
/// positions is insufficient data, not a cue to look further back.
pub fn delta_pct(series: &[Option<f64>]) -> Result<f64, StatsError> {
    if series.len() < 2 {
        return Err(StatsError::InsufficientData {
            stat: "percent change",
            needed: 2,
            present: series.len(),
        });
    }
    let prev = series[series.len() - 2];
    let last = series[series.len() - 1];
    match (prev, last) {
        (Some(prev), Some(last)) => {
            if prev == 0.0 {
                Err(StatsError::DivideByZero {
                    stat: "percent change",
                })
            } else {
                Ok((last - prev) / prev * 100.0)
            }
        }
        _ => Err(StatsError::InsufficientData {
            stat: "percent change",
            needed: 2,
            present: [prev, last].iter().flatten().count(),
        }),
    }
}

/// Ordinary least squares slope of value against week index 0..n-1.
///
/// Missing values are excluded pairwise; surviving points keep their
/// original week indices.
pub fn trend_slope(series: &[Option<f64>]) -> Result<f64, StatsError> {
    let points: Vec<(f64, f64)> = series
        .iter()
        .enumerate()
        .filter_map(|(week, value)| value.map(|v| (week as f64, v)))
        .collect();

    if points.len() < 2 {
        return Err(StatsError::InsufficientData {
            stat: "trend slope",
            needed: 2,
            present: points.len(),
        });
    }

    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|(x, _)| (x - mean_x) * (x - mean_x)).sum();
    let sxy: f64 = points.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    if sxx == 0.0 {
        return Err(StatsError::DivideByZero { stat: "trend slope" });
    }
    Ok(sxy / sxx)
}

/// Produce yielded per unit of water over the whole series, both sums
/// taken over the present observations independently.
pub fn yield_ratio(produce: &[Option<f64>], water: &[Option<f64>]) -> Result<f64, StatsError> {
    let total_water = total(water);
    if total_water == 0.0 {
        return Err(StatsError::DivideByZero {
            stat: "Yield per water",
        });
    }
    Ok(total(produce) / total_water)
}

/// Select one Water row and one Produce row for a participant and project
/// both onto the axis labels.
pub fn participant_series(
    table: &NormalizedTable,
    axis: &DateAxis,
    participant: &str,
) -> Result<ParticipantSeries, StatsError> {
    let water_row = single_metric_row(table, participant, Metric::Water)?;
    let produce_row = single_metric_row(table, participant, Metric::Produce)?;

    Ok(ParticipantSeries {
        participant: participant.to_string(),
        email: water_row.email.clone(),
        water: project(table, axis, water_row)?,
        produce: project(table, axis, produce_row)?,
    })
}

fn single_metric_row<'a>(
    table: &'a NormalizedTable,
    participant: &str,
    metric: Metric,
) -> Result<&'a MetricRow, StatsError> {
    let rows = table.metric_rows(participant, metric);
    match rows.as_slice() {
        [] => Err(StatsError::MissingMetric {
            participant: participant.to_string(),
            metric,
        }),
        [row] => Ok(*row),
        _ => Err(StatsError::DuplicateMetric {
            participant: participant.to_string(),
            metric,
            count: rows.len(),
        }),
    }
}

fn project(
    table: &NormalizedTable,
    axis: &DateAxis,
    row: &MetricRow,
) -> Result<Vec<Option<f64>>, StatsError> {
    axis.labels
        .iter()
        .map(|label| {
            let index = table
                .value_index(label)
                .ok_or_else(|| StatsError::MissingColumn {
                    column: label.clone(),
                })?;
            Ok(row.values.get(index).copied().flatten())
        })
        .collect()
}

/// Assemble the full record. Any failed statistic fails the whole record,
/// so a record that exists is always complete.
pub fn stats_record(series: &ParticipantSeries) -> Result<StatsRecord, StatsError> {
    Ok(StatsRecord {
        total_produce: total(&series.produce),
        total_water: total(&series.water),
        mean_produce: mean(&series.produce).map_err(|e| e.for_stat("Mean produce"))?,
        mean_water: mean(&series.water).map_err(|e| e.for_stat("Mean water"))?,
        dif_produce: delta_pct(&series.produce).map_err(|e| e.for_stat("Dif produce"))?,
        dif_water: delta_pct(&series.water).map_err(|e| e.for_stat("Dif water"))?,
        dwater_dt: trend_slope(&series.water).map_err(|e| e.for_stat("dWater/dt"))?,
        yield_per_water: yield_ratio(&series.produce, &series.water)?,
    })
}

/// Compute every participant's record. Participants are visited in
/// first-seen order; a participant that fails is skipped with the reason
/// retained and the batch continues.
pub fn compute_stats(table: &NormalizedTable, axis: &DateAxis) -> BatchOutcome {
    let mut outcome = BatchOutcome::default();

    for participant in table.participants() {
        let result = participant_series(table, axis, participant).and_then(|series| {
            let stats = stats_record(&series)?;
            Ok(ParticipantStats {
                participant: series.participant,
                email: series.email,
                stats,
            })
        });
        match result {
            Ok(record) => outcome.records.push(record),
            Err(error) => {
                warn!(participant, %error, "skipping participant");
                outcome.failures.push(ParticipantFailure {
                    participant: participant.to_string(),
                    error,
                });
            }
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::table::{extract_date_axis, normalize, RawTable};

    fn series(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    fn load(csv: &str) -> (NormalizedTable, DateAxis) {
        let raw = RawTable::from_reader(csv.as_bytes()).unwrap();
        let table = normalize(&raw).unwrap();
        let axis = extract_date_axis(&table, 2024).unwrap();
        (table, axis)
    }

    fn sample() -> (NormalizedTable, DateAxis) {
        load(
            "Participant,DataType,Email,6/5,6/12,6/19,6/26\n\
             1,Water,ana@example.com,10,20,30,40\n\
             1,Produce ,ana@example.com,1,2,3,4\n\
             2,Water,ben@example.com,5,5,5,5\n\
             2,Produce ,ben@example.com,2,2,2,2\n",
        )
    }

    #[test]
    fn worked_example_matches_known_values() {
        let (table, axis) = sample();
        let series = participant_series(&table, &axis, "1").unwrap();
        let stats = stats_record(&series).unwrap();

        assert_eq!(stats.total_water, 100.0);
        assert_eq!(stats.total_produce, 10.0);
        assert_eq!(stats.mean_water, 25.0);
        assert_eq!(stats.mean_produce, 2.5);
        assert!((stats.dif_water - (40.0 - 30.0) / 30.0 * 100.0).abs() < 1e-9);
        assert!((stats.dwater_dt - 10.0).abs() < 1e-9);
        assert!((stats.yield_per_water - 0.1).abs() < 1e-9);
    }

    #[test]
    fn totals_and_means_exclude_missing_values() {
        let gappy = vec![Some(10.0), None, Some(30.0)];
        assert_eq!(total(&gappy), 40.0);
        assert_eq!(mean(&gappy).unwrap(), 20.0);
        assert_eq!(total(&[]), 0.0);
    }

    #[test]
    fn mean_of_all_missing_is_insufficient() {
        assert_eq!(
            mean(&[None, None]),
            Err(StatsError::InsufficientData {
                stat: "mean",
                needed: 1,
                present: 0
            })
        );
    }

    #[test]
    fn delta_sign_follows_the_last_two_values() {
        assert!(delta_pct(&series(&[1.0, 2.0])).unwrap() > 0.0);
        assert!(delta_pct(&series(&[2.0, 1.0])).unwrap() < 0.0);
        assert_eq!(delta_pct(&series(&[3.0, 3.0])).unwrap(), 0.0);
    }

    #[test]
    fn delta_with_zero_previous_value_is_divide_by_zero() {
        assert_eq!(
            delta_pct(&series(&[5.0, 0.0, 10.0])),
            Err(StatsError::DivideByZero {
                stat: "percent change"
            })
        );
    }

    #[test]
    fn delta_needs_two_trailing_observations() {
        assert!(matches!(
            delta_pct(&series(&[7.0])),
            Err(StatsError::InsufficientData { .. })
        ));
        assert!(matches!(
            delta_pct(&[Some(1.0), Some(2.0), None]),
            Err(StatsError::InsufficientData { .. })
        ));
    }

    #[test]
    fn slope_sign_tracks_the_series_direction() {
        assert!(trend_slope(&series(&[1.0, 2.0, 4.0, 7.0])).unwrap() > 0.0);
        assert!(trend_slope(&series(&[9.0, 6.0, 2.0])).unwrap() < 0.0);
        assert!(trend_slope(&series(&[5.0, 5.0, 5.0])).unwrap().abs() < 1e-12);
    }

    #[test]
    fn slope_excludes_missing_values_pairwise() {
        // weeks 0 and 2 survive: a rise of 20 over 2 weeks
        let gappy = vec![Some(10.0), None, Some(30.0)];
        assert!((trend_slope(&gappy).unwrap() - 10.0).abs() < 1e-9);
        assert!(matches!(
            trend_slope(&[None, Some(1.0)]),
            Err(StatsError::InsufficientData { .. })
        ));
    }

    #[test]
    fn yield_ratio_fails_on_zero_water() {
        assert_eq!(
            yield_ratio(&series(&[1.0]), &series(&[0.0])),
            Err(StatsError::DivideByZero {
                stat: "Yield per water"
            })
        );
        assert_eq!(
            yield_ratio(&series(&[2.0, 2.0]), &series(&[5.0, 5.0])).unwrap(),
            0.4
        );
    }

    #[test]
    fn records_are_deterministic() {
        let (table, axis) = sample();
        let first = compute_stats(&table, &axis);
        let second = compute_stats(&table, &axis);
        assert_eq!(first.records, second.records);
    }

    #[test]
    fn one_bad_participant_does_not_abort_the_batch() {
        let (table, axis) = load(
            "Participant,DataType,Email,6/5,6/12\n\
             1,Water,ana@example.com,10,20\n\
             1,Produce ,ana@example.com,1,2\n\
             2,Water,ben@example.com,5,5\n",
        );

        let outcome = compute_stats(&table, &axis);
        assert_eq!(outcome.records.len(), 1);
        assert_eq!(outcome.records[0].participant, "1");
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(
            outcome.failures[0].error,
            StatsError::MissingMetric {
                participant: "2".to_string(),
                metric: Metric::Produce
            }
        );
    }

    #[test]
    fn duplicate_metric_rows_are_rejected() {
        let (table, axis) = load(
            "Participant,DataType,Email,6/5,6/12\n\
             1,Water,ana@example.com,10,20\n\
             1,Water,ana@example.com,11,21\n\
             1,Produce ,ana@example.com,1,2\n",
        );

        let outcome = compute_stats(&table, &axis);
        assert!(outcome.records.is_empty());
        assert_eq!(
            outcome.failures[0].error,
            StatsError::DuplicateMetric {
                participant: "1".to_string(),
                metric: Metric::Water,
                count: 2
            }
        );
    }

    #[test]
    fn records_keep_first_seen_participant_order() {
        let (table, axis) = load(
            "Participant,DataType,Email,6/5,6/12\n\
             9,Water,nina@example.com,4,5\n\
             9,Produce ,nina@example.com,1,1\n\
             3,Water,theo@example.com,6,7\n\
             3,Produce ,theo@example.com,2,2\n",
        );

        let outcome = compute_stats(&table, &axis);
        let order: Vec<&str> = outcome
            .records
            .iter()
            .map(|record| record.participant.as_str())
            .collect();
        assert_eq!(order, ["9", "3"]);
    }

    #[test]
    fn series_projection_follows_the_axis_label_order() {
        let (table, axis) = load(
            "Participant,DataType,Email,6/19,6/5,6/12\n\
             1,Water,ana@example.com,30,10,20\n\
             1,Produce ,ana@example.com,3,1,2\n",
        );

        let series = participant_series(&table, &axis, "1").unwrap();
        assert_eq!(series.water, vec![Some(30.0), Some(10.0), Some(20.0)]);
        assert_eq!(series.email, "ana@example.com");
    }
}
