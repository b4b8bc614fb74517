//! Column schema repair.
//!
//! Each column name maps to a semantic kind through a static descriptor
//! ([`ColumnKind::for_column`]). [`ensure_columns`] adds missing columns with
//! typed defaults and coerces wrong-typed cells, reporting whether anything
//! had to change.

use chrono::{DateTime, NaiveDate, NaiveDateTime};

use crate::table::{Cell, Table};

/// Fill for identifier cells that were present but unusable.
pub const IDENTIFIER_FILL: &str = "N/A_FILLED";
/// Default for identifier columns that are absent altogether.
pub const IDENTIFIER_DEFAULT: &str = "N/A_DEFAULT";

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColumnKind {
    /// String identifier; `default` is used when the column is absent.
    Identifier { default: &'static str },
    /// Timestamp; absent or unparseable values stay missing.
    DateTime,
    /// Finite number; absent, unparseable or infinite values become `default`.
    Numeric { default: f64 },
}

impl ColumnKind {
    #[must_use]
    pub fn for_column(name: &str) -> Self {
        match name {
            "opt_kind" => Self::Identifier { default: "unknown" },
            "symbol" | "underlying_symbol" | "expiration_date" | "fetch_timestamp" => {
                Self::Identifier {
                    default: IDENTIFIER_DEFAULT,
                }
            }
            "date" => Self::DateTime,
            _ => Self::Numeric { default: 0.0 },
        }
    }

    fn absent_cell(self) -> Cell {
        match self {
            Self::Identifier { default } => Cell::Text(default.to_string()),
            Self::DateTime => Cell::Missing,
            Self::Numeric { default } => Cell::Number(default),
        }
    }
}

/// Guarantees every column in `required` exists with its semantic type.
///
/// Returns the repaired table and `true` only if no column had to be added
/// and no cell had to be coerced.
pub fn ensure_columns<S: AsRef<str>>(mut table: Table, required: &[S], context: &str) -> (Table, bool) {
    let mut all_valid = true;
    for name in required {
        let name = name.as_ref();
        let kind = ColumnKind::for_column(name);
        let Some(cells) = table.column(name) else {
            tracing::warn!(context, column = name, kind = ?kind, "Required column missing, adding default");
            table.set_column(name, vec![kind.absent_cell(); table.len()]);
            all_valid = false;
            continue;
        };

        let (repaired, coerced) = repair(cells, kind, true);
        if coerced > 0 {
            tracing::warn!(context, column = name, kind = ?kind, coerced, "Coerced column values");
            table.set_column(name, repaired);
            all_valid = false;
        }
    }
    (table, all_valid)
}

/// Coerces the listed columns to their semantic type without filling
/// failures; unusable cells become [`Cell::Missing`]. Absent columns are
/// added as all-missing.
#[must_use]
pub fn coerce_columns<S: AsRef<str>>(mut table: Table, columns: &[S]) -> Table {
    for name in columns {
        let name = name.as_ref();
        let kind = ColumnKind::for_column(name);
        let repaired = match table.column(name) {
            Some(cells) => repair(cells, kind, false).0,
            None => vec![Cell::Missing; table.len()],
        };
        table.set_column(name, repaired);
    }
    table
}

/// Returns the coerced cells and how many cells changed.
fn repair(cells: &[Cell], kind: ColumnKind, fill: bool) -> (Vec<Cell>, usize) {
    let mut changed = 0;
    let repaired = cells
        .iter()
        .map(|cell| {
            let (out, was_changed) = coerce_cell(cell, kind, fill);
            if was_changed {
                changed += 1;
            }
            out
        })
        .collect();
    (repaired, changed)
}

fn coerce_cell(cell: &Cell, kind: ColumnKind, fill: bool) -> (Cell, bool) {
    match kind {
        ColumnKind::Identifier { .. } => match cell {
            Cell::Text(_) => (cell.clone(), false),
            Cell::Number(v) if !v.is_nan() => (Cell::Text(v.to_string()), true),
            Cell::Timestamp(ts) => (Cell::Text(ts.to_string()), true),
            _ if fill => (Cell::Text(IDENTIFIER_FILL.to_string()), true),
            _ => (Cell::Missing, true),
        },
        ColumnKind::DateTime => match cell {
            Cell::Timestamp(_) => (cell.clone(), false),
            // a gap is only a repair when filling
            Cell::Missing => (Cell::Missing, fill),
            Cell::Text(s) => (parse_datetime(s).map_or(Cell::Missing, Cell::Timestamp), true),
            Cell::Number(secs) => (
                from_epoch_seconds(*secs).map_or(Cell::Missing, Cell::Timestamp),
                true,
            ),
        },
        ColumnKind::Numeric { default } => {
            let parsed = match cell {
                Cell::Number(v) if v.is_finite() => return (cell.clone(), false),
                Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
                _ => None,
            };
            match parsed {
                Some(v) => (Cell::Number(v), true),
                None if fill => (Cell::Number(default), true),
                None => (Cell::Missing, true),
            }
        }
    }
}

/// Parses RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS` or a bare
/// `YYYY-MM-DD` date.
#[must_use]
pub fn parse_datetime(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

fn from_epoch_seconds(secs: f64) -> Option<NaiveDateTime> {
    if !secs.is_finite() {
        return None;
    }
    DateTime::from_timestamp(secs.trunc() as i64, 0).map(|dt| dt.naive_utc())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table(columns: Vec<(&str, Vec<Cell>)>) -> Table {
        Table::from_columns(columns).unwrap()
    }

    #[test]
    fn clean_table_is_valid_and_untouched() {
        let input = table(vec![
            ("strike", vec![Cell::from(100.0), Cell::from(105.0)]),
            ("symbol", vec![Cell::from("SPY"), Cell::from("SPY")]),
        ]);
        let (out, valid) = ensure_columns(input.clone(), &["strike", "symbol"], "test");
        assert!(valid);
        assert_eq!(out, input);
    }

    #[test]
    fn missing_columns_get_typed_defaults() {
        let input = table(vec![("strike", vec![Cell::from(100.0)])]);
        let (out, valid) =
            ensure_columns(input, &["opt_kind", "symbol", "date", "gxoi"], "test");
        assert!(!valid);
        assert_eq!(out.cell("opt_kind", 0), Some(&Cell::from("unknown")));
        assert_eq!(out.cell("symbol", 0), Some(&Cell::from(IDENTIFIER_DEFAULT)));
        assert_eq!(out.cell("date", 0), Some(&Cell::Missing));
        assert_eq!(out.cell("gxoi", 0), Some(&Cell::from(0.0)));
    }

    #[test]
    fn bad_numeric_cells_are_coerced_and_filled() {
        let input = table(vec![(
            "gxoi",
            vec![Cell::from("1.5"), Cell::from("junk"), Cell::Missing, Cell::from(2.0)],
        )]);
        let (out, valid) = ensure_columns(input, &["gxoi"], "test");
        assert!(!valid);
        assert_eq!(out.numeric("gxoi").unwrap(), vec![1.5, 0.0, 0.0, 2.0]);
    }

    #[test]
    fn identifier_gaps_use_fill_sentinel() {
        let input = table(vec![("symbol", vec![Cell::Missing, Cell::from(42.0)])]);
        let (out, _) = ensure_columns(input, &["symbol"], "test");
        assert_eq!(out.cell("symbol", 0), Some(&Cell::from(IDENTIFIER_FILL)));
        assert_eq!(out.cell("symbol", 1), Some(&Cell::from("42")));
    }

    #[test]
    fn date_strings_are_parsed_or_left_missing() {
        let input = table(vec![(
            "date",
            vec![Cell::from("2024-03-01"), Cell::from("not a date")],
        )]);
        let (out, valid) = ensure_columns(input, &["date"], "test");
        assert!(!valid);
        assert!(out.cell("date", 0).unwrap().as_timestamp().is_some());
        assert_eq!(out.cell("date", 1), Some(&Cell::Missing));
    }

    #[test]
    fn coerce_without_fill_marks_failures_missing() {
        let input = table(vec![("high", vec![Cell::from("x"), Cell::from("3")])]);
        let out = coerce_columns(input, &["high", "low"]);
        assert_eq!(out.cell("high", 0), Some(&Cell::Missing));
        assert_eq!(out.cell("high", 1), Some(&Cell::from(3.0)));
        assert_eq!(out.cell("low", 0), Some(&Cell::Missing));
    }

    #[test]
    fn infinite_and_missing_cells_in_present_columns_are_repairs() {
        let input = table(vec![
            ("date", vec![Cell::Missing]),
            ("strike", vec![Cell::from(f64::INFINITY)]),
        ]);
        let (out, valid) = ensure_columns(input, &["date", "strike"], "test");
        assert!(!valid);
        assert_eq!(out.cell("date", 0), Some(&Cell::Missing));
        assert_eq!(out.numeric("strike").unwrap(), vec![0.0]);
    }

    #[test]
    fn coerce_drops_infinite_numbers() {
        let input = table(vec![("close", vec![Cell::from(f64::NEG_INFINITY), Cell::from("inf")])]);
        let out = coerce_columns(input, &["close"]);
        assert_eq!(out.cell("close", 0), Some(&Cell::Missing));
        assert_eq!(out.cell("close", 1), Some(&Cell::Missing));
    }

    #[test]
    fn parses_common_timestamp_formats() {
        assert!(parse_datetime("2024-03-01T10:30:00Z").is_some());
        assert!(parse_datetime("2024-03-01 10:30:00").is_some());
        assert!(parse_datetime("2024-03-01T10:30:00").is_some());
        assert!(parse_datetime("03/01/2024").is_none());
    }
}
