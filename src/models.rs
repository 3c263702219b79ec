use chrono::NaiveDate;
use serde::Serialize;

use crate::error::StatsError;

/// The two tracked metrics. Raw `DataType` labels are resolved to this enum
/// once, during normalization; incidental whitespace in the source (the
/// produce rows are labelled `"Produce "` in the reference export) is
/// trimmed away there instead of being matched against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Metric {
    Water,
    Produce,
}

impl Metric {
    pub fn from_label(label: &str) -> Option<Metric> {
        match label.trim() {
            "Water" => Some(Metric::Water),
            "Produce" => Some(Metric::Produce),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Metric::Water => "Water",
            Metric::Produce => "Produce",
        }
    }
}

impl std::fmt::Display for Metric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The observation dates shared by every participant's series, in the exact
/// order the columns appear in the table. The original `month/day` labels
/// ride along so series projection goes through the label, not the position.
#[derive(Debug, Clone, PartialEq)]
pub struct DateAxis {
    pub dates: Vec<NaiveDate>,
    pub labels: Vec<String>,
}

impl DateAxis {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }
}

/// One participant's water and produce series, aligned to the date axis.
/// Missing observations stay missing; they are never coerced to zero.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantSeries {
    pub participant: String,
    pub email: String,
    pub water: Vec<Option<f64>>,
    pub produce: Vec<Option<f64>>,
}

/// Derived summary statistics for one participant. Serialized field names
/// are the stable statistic names consumed downstream.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsRecord {
    #[serde(rename = "Total produce")]
    pub total_produce: f64,
    #[serde(rename = "Total water")]
    pub total_water: f64,
    #[serde(rename = "Mean produce")]
    pub mean_produce: f64,
    #[serde(rename = "Mean water")]
    pub mean_water: f64,
    #[serde(rename = "Dif produce")]
    pub dif_produce: f64,
    #[serde(rename = "Dif water")]
    pub dif_water: f64,
    #[serde(rename = "dWater/dt")]
    pub dwater_dt: f64,
    #[serde(rename = "Yield per water")]
    pub yield_per_water: f64,
}

impl StatsRecord {
    /// Statistics in presentation order under their stable names.
    pub fn entries(&self) -> [(&'static str, f64); 8] {
        [
            ("Total produce", self.total_produce),
            ("Total water", self.total_water),
            ("Mean produce", self.mean_produce),
            ("Mean water", self.mean_water),
            ("Dif produce", self.dif_produce),
            ("Dif water", self.dif_water),
            ("dWater/dt", self.dwater_dt),
            ("Yield per water", self.yield_per_water),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParticipantStats {
    pub participant: String,
    pub email: String,
    pub stats: StatsRecord,
}

/// What a batch run produced: complete records in first-seen participant
/// order, plus one entry per participant that had to be skipped.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    pub records: Vec<ParticipantStats>,
    pub failures: Vec<ParticipantFailure>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParticipantFailure {
    pub participant: String,
    pub error: StatsError,
}
