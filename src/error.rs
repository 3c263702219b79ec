//! Error types for the garden LCA digest.

use thiserror::Error;

use crate::models::Metric;

/// Structural problems with the input table. These abort the whole batch:
/// every participant's series depends on the shared columns.
#[derive(Error, Debug)]
pub enum TableError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("expected {expected} identity columns, table has {found}")]
    MissingIdentityColumns { expected: usize, found: usize },

    #[error("column {column:?} is not a month/day date label")]
    DateParse { column: String },

    #[error("row {row}, column {column:?}: {value:?} is not a number")]
    InvalidNumber {
        row: usize,
        column: String,
        value: String,
    },
}

/// Problems scoped to a single participant's record. The batch skips the
/// participant and keeps going.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StatsError {
    #[error("participant {participant:?} has no {metric} row")]
    MissingMetric { participant: String, metric: Metric },

    #[error("participant {participant:?} has {count} {metric} rows, expected exactly one")]
    DuplicateMetric {
        participant: String,
        metric: Metric,
        count: usize,
    },

    #[error("date column {column:?} is missing from the table")]
    MissingColumn { column: String },

    #[error("{stat} needs at least {needed} observations, found {present}")]
    InsufficientData {
        stat: &'static str,
        needed: usize,
        present: usize,
    },

    #[error("{stat} is undefined: the denominator is zero")]
    DivideByZero { stat: &'static str },
}

impl StatsError {
    /// Relabel a series primitive's error with the public statistic name.
    pub(crate) fn for_stat(self, stat: &'static str) -> Self {
        match self {
            StatsError::InsufficientData {
                needed, present, ..
            } => StatsError::InsufficientData {
                stat,
                needed,
                present,
            },
            StatsError::DivideByZero { .. } => StatsError::DivideByZero { stat },
            other => other,
        }
    }
}
