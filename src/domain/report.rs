//! Presentation-neutral report data.
//!
//! Operations produce a [`Report`] of typed cells; formatting (currency,
//! percentages, alignment) is left to the report adapters.

use chrono::NaiveDate;
use serde::Serialize;

use super::error::CalcWarning;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Cell {
    Text(String),
    Date(NaiveDate),
    Quantity(f64),
    Money(f64),
    /// A fraction: 0.1234 renders as 12.34%.
    Percent(f64),
    Factor(f64),
    Flag(bool),
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<NaiveDate> for Cell {
    fn from(d: NaiveDate) -> Self {
        Cell::Date(d)
    }
}

impl From<bool> for Cell {
    fn from(b: bool) -> Self {
        Cell::Flag(b)
    }
}

/// Headline metric for a report, e.g. the aggregate TWR.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub label: String,
    pub value: Cell,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Table {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Appends a row. Rows shorter than the header are padded with empty
    /// text; longer rows are truncated.
    pub fn push_row(&mut self, mut row: Vec<Cell>) {
        row.resize(self.columns.len(), Cell::Text(String::new()));
        self.rows.push(row);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub title: String,
    pub summary: Option<Summary>,
    pub tables: Vec<Table>,
    pub warnings: Vec<CalcWarning>,
}

impl Report {
    pub fn new(title: &str) -> Self {
        Self {
            title: title.to_string(),
            summary: None,
            tables: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn with_summary(mut self, label: &str, value: Cell) -> Self {
        self.summary = Some(Summary {
            label: label.to_string(),
            value,
        });
        self
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_warnings(mut self, warnings: Vec<CalcWarning>) -> Self {
        self.warnings.extend(warnings);
        self
    }
}
