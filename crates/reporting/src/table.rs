//! Tabular report output in CSV and JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use funnel_core::FunnelResult;

/// A named, rectangular table of report values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

/// Anything that can be flattened into a `ReportTable`.
pub trait ToReportTable {
    fn to_table(&self) -> ReportTable;
}

impl ReportTable {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row(&mut self, row: Vec<Value>) {
        debug_assert_eq!(row.len(), self.columns.len(), "row width mismatch in {}", self.name);
        self.rows.push(row);
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn to_csv(&self) -> String {
        let mut csv = self.columns.join(",");
        csv.push('\n');
        for row in &self.rows {
            let cells: Vec<String> = row
                .iter()
                .map(|v| match v {
                    Value::String(s) => format!("\"{}\"", s.replace('"', "\"\"")),
                    Value::Null => String::new(),
                    other => other.to_string(),
                })
                .collect();
            csv.push_str(&cells.join(","));
            csv.push('\n');
        }
        csv
    }

    /// Rows as an array of `column -> value` objects.
    pub fn to_json(&self) -> FunnelResult<String> {
        let records: Vec<Map<String, Value>> = self
            .rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect();
        Ok(serde_json::to_string_pretty(&records)?)
    }
}

/// Rounds to cents / hundredths of a percent for presentation.
pub fn round2(value: f64) -> Value {
    Value::from((value * 100.0).round() / 100.0)
}

/// `numerator / denominator * 100`, or zero for an empty denominator.
pub fn pct(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator * 100.0
    } else {
        0.0
    }
}

/// `numerator / denominator`, or zero for an empty denominator.
pub fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}
