//! Minimal columnar table used for contract rows, per-strike levels and OHLC
//! history.
//!
//! Cells are dynamically typed so that messy input can be carried as-is
//! until [`crate::schema`] repairs the columns a calculation needs.

use std::collections::{BTreeMap, BTreeSet};

use chrono::NaiveDateTime;
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

use crate::config_loader::json_kind;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Input is not tabular: expected an array of records or an object of columns, got {0}")]
    NotTabular(&'static str),

    #[error("Record {index} is not an object")]
    BadRecord { index: usize },

    #[error("Column '{column}' is not an array")]
    BadColumn { column: String },

    #[error("Column '{column}' has {found} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        found: usize,
    },
}

/// A single table value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Cell {
    Number(f64),
    Text(String),
    Timestamp(NaiveDateTime),
    Missing,
}

impl Cell {
    /// Finite numeric value, if this cell holds one.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Number(v) if v.is_finite() => Some(*v),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_timestamp(&self) -> Option<NaiveDateTime> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }

    /// True for `Missing` and for NaN numbers.
    #[must_use]
    pub fn is_missing(&self) -> bool {
        match self {
            Self::Missing => true,
            Self::Number(v) => v.is_nan(),
            _ => false,
        }
    }

    #[must_use]
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => Self::Missing,
            Value::Bool(b) => Self::Number(if *b { 1.0 } else { 0.0 }),
            Value::Number(n) => n.as_f64().map_or(Self::Missing, Self::Number),
            Value::String(s) => Self::Text(s.clone()),
            other => Self::Text(other.to_string()),
        }
    }
}

impl From<f64> for Cell {
    fn from(value: f64) -> Self {
        Self::Number(value)
    }
}

impl From<&str> for Cell {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Cell {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<NaiveDateTime> for Cell {
    fn from(value: NaiveDateTime) -> Self {
        Self::Timestamp(value)
    }
}

/// Named columns of equal length.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    len: usize,
    columns: BTreeMap<String, Vec<Cell>>,
}

impl Table {
    /// An empty table with `len` rows and no columns.
    #[must_use]
    pub fn with_len(len: usize) -> Self {
        Self {
            len,
            columns: BTreeMap::new(),
        }
    }

    /// Builds a table from named columns.
    ///
    /// # Errors
    ///
    /// Returns an error if the columns differ in length.
    pub fn from_columns<I, S>(columns: I) -> Result<Self, TableError>
    where
        I: IntoIterator<Item = (S, Vec<Cell>)>,
        S: Into<String>,
    {
        let mut table = Self::default();
        for (index, (name, cells)) in columns.into_iter().enumerate() {
            let name = name.into();
            if index == 0 {
                table.len = cells.len();
            } else if cells.len() != table.len {
                return Err(TableError::LengthMismatch {
                    column: name,
                    expected: table.len,
                    found: cells.len(),
                });
            }
            table.columns.insert(name, cells);
        }
        Ok(table)
    }

    /// Builds a table from row records; keys absent from a record become
    /// missing cells.
    #[must_use]
    pub fn from_records(records: &[BTreeMap<String, Cell>]) -> Self {
        let names: BTreeSet<&String> = records.iter().flat_map(BTreeMap::keys).collect();
        let columns = names
            .into_iter()
            .map(|name| {
                let cells = records
                    .iter()
                    .map(|record| record.get(name).cloned().unwrap_or(Cell::Missing))
                    .collect();
                (name.clone(), cells)
            })
            .collect();
        Self {
            len: records.len(),
            columns,
        }
    }

    /// Parses either an array of row objects or an object of column arrays.
    ///
    /// # Errors
    ///
    /// Returns an error when the value has neither shape.
    pub fn from_json(value: &Value) -> Result<Self, TableError> {
        match value {
            Value::Array(rows) => {
                let mut records = Vec::with_capacity(rows.len());
                for (index, row) in rows.iter().enumerate() {
                    let Value::Object(map) = row else {
                        return Err(TableError::BadRecord { index });
                    };
                    records.push(
                        map.iter()
                            .map(|(k, v)| (k.clone(), Cell::from_json(v)))
                            .collect::<BTreeMap<_, _>>(),
                    );
                }
                Ok(Self::from_records(&records))
            }
            Value::Object(columns) => {
                let mut parsed = Vec::with_capacity(columns.len());
                for (name, cells) in columns {
                    let Value::Array(cells) = cells else {
                        return Err(TableError::BadColumn {
                            column: name.clone(),
                        });
                    };
                    parsed.push((name.clone(), cells.iter().map(Cell::from_json).collect()));
                }
                Self::from_columns(parsed)
            }
            other => Err(TableError::NotTabular(json_kind(other))),
        }
    }

    #[must_use]
    pub const fn len(&self) -> usize {
        self.len
    }

    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    #[must_use]
    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&[Cell]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    #[must_use]
    pub fn cell(&self, name: &str, row: usize) -> Option<&Cell> {
        self.columns.get(name).and_then(|cells| cells.get(row))
    }

    /// Numeric view of a column; non-numeric cells read as NaN.
    #[must_use]
    pub fn numeric(&self, name: &str) -> Option<Vec<f64>> {
        self.columns.get(name).map(|cells| {
            cells
                .iter()
                .map(|c| match c {
                    Cell::Number(v) => *v,
                    _ => f64::NAN,
                })
                .collect()
        })
    }

    /// Inserts or replaces a column. Cells beyond the table length are
    /// dropped; short columns are padded with missing cells.
    pub fn set_column(&mut self, name: impl Into<String>, mut cells: Vec<Cell>) {
        if self.columns.is_empty() && self.len == 0 {
            self.len = cells.len();
        }
        cells.resize(self.len, Cell::Missing);
        self.columns.insert(name.into(), cells);
    }

    pub fn set_numeric(&mut self, name: impl Into<String>, values: &[f64]) {
        self.set_column(name, values.iter().copied().map(Cell::Number).collect());
    }

    pub fn remove_column(&mut self, name: &str) -> Option<Vec<Cell>> {
        self.columns.remove(name)
    }

    /// Rows at `indices`, in that order.
    #[must_use]
    pub fn take_rows(&self, indices: &[usize]) -> Self {
        let columns = self
            .columns
            .iter()
            .map(|(name, cells)| {
                let picked = indices
                    .iter()
                    .map(|&i| cells.get(i).cloned().unwrap_or(Cell::Missing))
                    .collect();
                (name.clone(), picked)
            })
            .collect();
        Self {
            len: indices.len(),
            columns,
        }
    }

    /// Rows for which `keep` returns true.
    #[must_use]
    pub fn filter_rows(&self, mut keep: impl FnMut(usize) -> bool) -> Self {
        let indices: Vec<usize> = (0..self.len).filter(|&i| keep(i)).collect();
        self.take_rows(&indices)
    }
}
