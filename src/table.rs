//! CSV ingestion and table normalization.
//!
//! The raw export has a fixed identity prefix (`Participant`, `DataType`,
//! `Email`) followed by one `month/day` column per observation date, with
//! auto-generated placeholder columns sprinkled in by the spreadsheet
//! export. Normalization strips the placeholders, resolves each row's
//! metric label, and parses the numeric cells; date parsing happens
//! separately under an explicit assumed year.

use std::collections::{HashMap, HashSet};
use std::io::Read;
use std::path::Path;

use chrono::NaiveDate;
use csv::ReaderBuilder;
use tracing::debug;

use crate::error::TableError;
use crate::models::{DateAxis, Metric};

/// Fixed identity prefix: Participant, DataType, Email.
pub const IDENTITY_COLUMNS: usize = 3;

/// A delimited file as read: header labels plus string records.
#[derive(Debug, Clone)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub records: Vec<Vec<String>>,
}

impl RawTable {
    pub fn from_path(path: &Path) -> Result<RawTable, TableError> {
        let file = std::fs::File::open(path)?;
        RawTable::from_reader(file)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<RawTable, TableError> {
        let mut rdr = ReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .from_reader(reader);

        let headers = rdr.headers()?.iter().map(str::to_string).collect();
        let mut records = Vec::new();
        for result in rdr.records() {
            let record = result?;
            records.push(record.iter().map(str::to_string).collect());
        }
        Ok(RawTable { headers, records })
    }
}

/// One participant-metric row with its values aligned to the date labels.
#[derive(Debug, Clone)]
pub struct MetricRow {
    pub participant: String,
    pub metric: Option<Metric>,
    /// The `DataType` label exactly as it appears in the source.
    pub label: String,
    pub email: String,
    pub values: Vec<Option<f64>>,
}

/// A table with placeholder columns stripped and rows resolved: every
/// remaining column is an identity column or a date label.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    date_labels: Vec<String>,
    label_index: HashMap<String, usize>,
    rows: Vec<MetricRow>,
}

impl NormalizedTable {
    pub fn date_labels(&self) -> &[String] {
        &self.date_labels
    }

    pub fn rows(&self) -> &[MetricRow] {
        &self.rows
    }

    /// Value index of a date label, for projection by label.
    pub fn value_index(&self, label: &str) -> Option<usize> {
        self.label_index.get(label).copied()
    }

    /// Distinct participants in first-seen order.
    pub fn participants(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for row in &self.rows {
            if seen.insert(row.participant.as_str()) {
                out.push(row.participant.as_str());
            }
        }
        out
    }

    /// Rows for one participant carrying the given metric.
    pub fn metric_rows(&self, participant: &str, metric: Metric) -> Vec<&MetricRow> {
        self.rows
            .iter()
            .filter(|row| row.participant == participant && row.metric == Some(metric))
            .collect()
    }
}

/// Auto-generated placeholder labels carry no data. Spreadsheet exports
/// name them `Unnamed: N`; a blank header is the same thing.
pub fn is_placeholder_label(label: &str) -> bool {
    let label = label.trim();
    label.is_empty() || label.starts_with("Unnamed")
}

/// Strip placeholder columns and resolve every row: metric labels are
/// matched once here (trimmed), numeric cells are parsed, empty cells
/// become missing values.
pub fn normalize(raw: &RawTable) -> Result<NormalizedTable, TableError> {
    let keep: Vec<usize> = raw
        .headers
        .iter()
        .enumerate()
        .filter(|(_, label)| !is_placeholder_label(label))
        .map(|(index, _)| index)
        .collect();

    for label in raw.headers.iter().filter(|l| is_placeholder_label(l)) {
        debug!(column = %label, "dropping placeholder column");
    }

    if keep.len() < IDENTITY_COLUMNS {
        return Err(TableError::MissingIdentityColumns {
            expected: IDENTITY_COLUMNS,
            found: keep.len(),
        });
    }

    let date_labels: Vec<String> = keep[IDENTITY_COLUMNS..]
        .iter()
        .map(|&index| raw.headers[index].trim().to_string())
        .collect();
    let label_index: HashMap<String, usize> = date_labels
        .iter()
        .enumerate()
        .map(|(index, label)| (label.clone(), index))
        .collect();

    let mut rows = Vec::with_capacity(raw.records.len());
    for (row_no, record) in raw.records.iter().enumerate() {
        let cell = |slot: usize| record.get(keep[slot]).map(|s| s.trim()).unwrap_or("");

        let label = record.get(keep[1]).cloned().unwrap_or_default();
        let metric = Metric::from_label(&label);
        if metric.is_none() {
            debug!(row = row_no + 1, label = %label, "unrecognized DataType label");
        }

        let mut values = Vec::with_capacity(date_labels.len());
        for (slot, &column) in keep[IDENTITY_COLUMNS..].iter().enumerate() {
            let text = record.get(column).map(|s| s.trim()).unwrap_or("");
            if text.is_empty() {
                values.push(None);
            } else {
                let value = text.parse::<f64>().map_err(|_| TableError::InvalidNumber {
                    row: row_no + 1,
                    column: date_labels[slot].clone(),
                    value: text.to_string(),
                })?;
                values.push(Some(value));
            }
        }

        rows.push(MetricRow {
            participant: cell(0).to_string(),
            metric,
            label,
            email: cell(2).to_string(),
            values,
        });
    }

    Ok(NormalizedTable {
        date_labels,
        label_index,
        rows,
    })
}

/// Parse the retained date labels as `month/day` under `assumed_year`.
///
/// Column order is trusted to be chronological and is never re-sorted. The
/// source data stores no year, so the caller supplies one; a file spanning
/// a year boundary comes out wrong and there is no way to detect that here.
pub fn extract_date_axis(
    table: &NormalizedTable,
    assumed_year: i32,
) -> Result<DateAxis, TableError> {
    let mut dates = Vec::with_capacity(table.date_labels.len());
    for label in &table.date_labels {
        let composed = format!("{assumed_year}/{label}");
        let date = NaiveDate::parse_from_str(&composed, "%Y/%m/%d")
            .map_err(|_| TableError::DateParse {
                column: label.clone(),
            })?;
        dates.push(date);
    }
    Ok(DateAxis {
        dates,
        labels: table.date_labels.clone(),
    })
}
