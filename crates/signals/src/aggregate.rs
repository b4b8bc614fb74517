//! Per-strike aggregation of contract rows.
//!
//! Each column has a fixed reduction: additive exposures are summed,
//! precomputed per-strike scalars take the first non-missing value. Raw
//! SDAG columns of active methods are summed and their normalized columns
//! take the first value.

use std::cmp::Ordering;

use mspi_core::{coerce_columns, AppConfig, Cell, SdagMethod, Table};

/// Structure stability index; 0.5 is its neutral value.
pub const SSI_COLUMN: &str = "ssi";
const SSI_NEUTRAL: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reduction {
    Sum,
    First,
}

const SUMMED: [&str; 4] = ["mspi", "dag_custom", "tdpi", "vri"];

const FIRST: [&str; 17] = [
    "sai",
    "ssi",
    "cfi",
    "ctr",
    "tdfi",
    "vfi",
    "vvr",
    "price",
    "net_volume_pressure",
    "net_value_pressure",
    "net_delta_flow_total",
    "heuristic_net_delta_pressure",
    "net_gamma_flow",
    "net_vega_flow",
    "net_theta_exposure",
    "true_net_volume_flow",
    "true_net_value_flow",
];

#[derive(Debug, Clone)]
pub struct LevelAggregator {
    sdag_methods: Vec<SdagMethod>,
}

impl LevelAggregator {
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        Self {
            sdag_methods: config.strategy_settings.dag_methodologies.active_methods(),
        }
    }

    /// Full reduction table, static columns first.
    #[must_use]
    pub fn reductions(&self) -> Vec<(String, Reduction)> {
        let mut map: Vec<(String, Reduction)> = SUMMED
            .iter()
            .map(|c| ((*c).to_string(), Reduction::Sum))
            .chain(FIRST.iter().map(|c| ((*c).to_string(), Reduction::First)))
            .collect();
        for method in &self.sdag_methods {
            map.push((method.raw_column(), Reduction::Sum));
            map.push((method.norm_column(), Reduction::First));
        }
        map
    }

    /// Reduces `table` to one row per distinct `group_column` value, sorted
    /// ascending. Returns an empty table when the grouping column is absent,
    /// no row has a valid key, or none of the aggregation columns exist.
    #[must_use]
    pub fn aggregate(&self, table: &Table, group_column: &str) -> Table {
        if table.is_empty() {
            tracing::debug!(group_column, "No rows to aggregate");
            return Table::default();
        }
        if !table.has_column(group_column) {
            tracing::warn!(group_column, "Grouping column missing, no levels produced");
            return Table::default();
        }

        let present: Vec<(String, Reduction)> = self
            .reductions()
            .into_iter()
            .filter(|(column, _)| table.has_column(column) && column != group_column)
            .collect();
        if present.is_empty() {
            tracing::warn!(group_column, "No aggregation columns present");
            return Table::default();
        }

        let mut to_coerce: Vec<&str> = present.iter().map(|(c, _)| c.as_str()).collect();
        to_coerce.push(group_column);
        let coerced = coerce_columns(table.clone(), &to_coerce);

        let Some(keys) = coerced.numeric(group_column) else {
            return Table::default();
        };
        let mut order: Vec<usize> = (0..keys.len()).filter(|&i| keys[i].is_finite()).collect();
        let dropped = keys.len() - order.len();
        if dropped > 0 {
            tracing::warn!(group_column, dropped, "Dropped rows with invalid grouping key");
        }
        if order.is_empty() {
            return Table::default();
        }
        order.sort_by(|&a, &b| keys[a].partial_cmp(&keys[b]).unwrap_or(Ordering::Equal));

        let groups = group_runs(&order, &keys);
        let mut out = Table::with_len(groups.len());
        out.set_numeric(group_column, &groups.iter().map(|g| keys[g[0]]).collect::<Vec<_>>());

        for (column, reduction) in &present {
            let values = coerced.numeric(column).unwrap_or_default();
            let fill = if column == SSI_COLUMN { SSI_NEUTRAL } else { 0.0 };
            let reduced: Vec<Cell> = groups
                .iter()
                .map(|rows| {
                    let v = reduce(rows, &values, *reduction).unwrap_or(fill);
                    Cell::Number(v)
                })
                .collect();
            out.set_column(column.clone(), reduced);
        }

        tracing::debug!(
            group_column,
            rows = table.len(),
            levels = out.len(),
            columns = present.len(),
            "Aggregated contract rows to levels"
        );
        out
    }
}

/// Splits sorted row indices into runs of equal key.
fn group_runs(order: &[usize], keys: &[f64]) -> Vec<Vec<usize>> {
    let mut groups: Vec<Vec<usize>> = Vec::new();
    for &row in order {
        match groups.last_mut() {
            Some(group) if keys[group[0]] == keys[row] => group.push(row),
            _ => groups.push(vec![row]),
        }
    }
    groups
}

fn reduce(rows: &[usize], values: &[f64], reduction: Reduction) -> Option<f64> {
    let mut present = rows
        .iter()
        .filter_map(|&i| values.get(i).copied())
        .filter(|v| !v.is_nan());
    match reduction {
        // An all-missing group sums to 0.0, matching the fill value.
        Reduction::Sum => Some(present.sum()),
        Reduction::First => present.next(),
    }
}
