//! Bounded history of processed per-strike snapshots.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use mspi_core::Table;
use mspi_signals::COMPOSITE_COLUMN;
use serde::Serialize;

/// Fixed-capacity buffer; pushing past capacity evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct HistoryBuffer<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T> HistoryBuffer<T> {
    /// A zero capacity is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `entry`, returning the evicted oldest entry if full.
    pub fn push(&mut self, entry: T) -> Option<T> {
        let evicted = if self.entries.len() == self.capacity {
            self.entries.pop_front()
        } else {
            None
        };
        self.entries.push_back(entry);
        evicted
    }

    #[must_use]
    pub const fn capacity(&self) -> usize {
        self.capacity
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest first.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.entries.iter()
    }

    #[must_use]
    pub fn latest(&self) -> Option<&T> {
        self.entries.back()
    }

    #[must_use]
    pub fn oldest(&self) -> Option<&T> {
        self.entries.front()
    }
}

/// Composite score by strike at one point in time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LevelSnapshot {
    pub timestamp: DateTime<Utc>,
    pub strikes: Vec<f64>,
    pub composite: Vec<f64>,
}

impl LevelSnapshot {
    /// Snapshot of the per-strike table; `None` without a strike column.
    #[must_use]
    pub fn from_levels(levels: &Table, timestamp: DateTime<Utc>) -> Option<Self> {
        let strikes = levels.numeric("strike")?;
        let composite = levels
            .numeric(COMPOSITE_COLUMN)
            .unwrap_or_else(|| vec![0.0; strikes.len()]);
        Some(Self {
            timestamp,
            strikes,
            composite,
        })
    }

    /// Composite at exactly `strike`.
    #[must_use]
    pub fn composite_at(&self, strike: f64) -> Option<f64> {
        self.strikes
            .iter()
            .position(|s| *s == strike)
            .and_then(|i| self.composite.get(i).copied())
            .filter(|v| v.is_finite())
    }
}

impl HistoryBuffer<LevelSnapshot> {
    /// Newest minus oldest composite at `strike`, over the snapshots that
    /// carry the strike. `None` with fewer than two such snapshots.
    #[must_use]
    pub fn composite_trend(&self, strike: f64) -> Option<f64> {
        let mut values = self.iter().filter_map(|s| s.composite_at(strike));
        let first = values.next()?;
        let last = values.last()?;
        Some(last - first)
    }
}
