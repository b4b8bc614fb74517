//! Average True Range estimation with a percentage-of-price fallback.
//!
//! True Range: max(high-low, |high-prev_close|, |low-prev_close|), with the
//! first bar using high-low only. ATR is the last value of an EMA of the
//! true range with span = period (alpha = 2 / (period + 1)).

use mspi_core::config::{AtrFallbackConfig, AtrFallbackKind};
use mspi_core::{coerce_columns, AppConfig, Table, DENOMINATOR_FLOOR};

/// Columns an OHLC history table must provide.
pub const OHLC_COLUMNS: [&str; 4] = ["date", "high", "low", "close"];

const DEFAULT_MIN_ATR: f64 = 1.0;

#[derive(Debug, Clone)]
pub struct AtrEstimator {
    period: usize,
    fallback: AtrFallbackConfig,
}

impl AtrEstimator {
    #[must_use]
    pub fn new(config: &AppConfig) -> Self {
        let approximations = &config.data_processor_settings.approximations;
        Self {
            period: approximations.atr_period.max(1),
            fallback: approximations.tdpi_atr_fallback.clone(),
        }
    }

    /// Estimates ATR for `symbol`. Always finite and strictly positive.
    #[must_use]
    pub fn estimate(&self, symbol: &str, price: Option<f64>, history: Option<&Table>) -> f64 {
        let floor = self.min_value();
        if let Some(atr) = history.and_then(|h| self.from_history(symbol, h)) {
            let atr = atr.max(floor);
            tracing::debug!(symbol, atr, "ATR from history");
            return atr;
        }
        self.fallback_value(symbol, price)
    }

    fn min_value(&self) -> f64 {
        let configured = self.fallback.min_value;
        if configured.is_finite() && configured > 0.0 {
            configured
        } else {
            tracing::warn!(configured, "Invalid minimum ATR, using default");
            DEFAULT_MIN_ATR
        }
    }

    fn from_history(&self, symbol: &str, history: &Table) -> Option<f64> {
        let coerced = coerce_columns(history.clone(), &OHLC_COLUMNS);
        let mut rows: Vec<(chrono::NaiveDateTime, f64, f64, f64)> = (0..coerced.len())
            .filter_map(|i| {
                let date = coerced.cell("date", i)?.as_timestamp()?;
                let high = coerced.cell("high", i)?.as_f64()?;
                let low = coerced.cell("low", i)?.as_f64()?;
                let close = coerced.cell("close", i)?.as_f64()?;
                Some((date, high, low, close))
            })
            .collect();

        let dropped = history.len() - rows.len();
        if dropped > 0 {
            tracing::debug!(symbol, dropped, "Dropped invalid OHLC rows");
        }
        if rows.len() < self.period {
            tracing::debug!(
                symbol,
                valid = rows.len(),
                required = self.period,
                "Insufficient OHLC history for ATR"
            );
            return None;
        }

        rows.sort_by_key(|row| row.0);
        let highs: Vec<f64> = rows.iter().map(|r| r.1).collect();
        let lows: Vec<f64> = rows.iter().map(|r| r.2).collect();
        let closes: Vec<f64> = rows.iter().map(|r| r.3).collect();

        let tr = true_range(&highs, &lows, &closes);
        let atr = ema(&tr, self.period).last().copied()?;
        if atr.is_finite() && atr > DENOMINATOR_FLOOR {
            Some(atr)
        } else {
            tracing::warn!(symbol, atr, "ATR from history not usable");
            None
        }
    }

    fn fallback_value(&self, symbol: &str, price: Option<f64>) -> f64 {
        let floor = self.min_value();
        let Some(price) = price.filter(|p| p.is_finite() && *p > 0.0) else {
            tracing::warn!(symbol, min_value = floor, "No valid price for ATR fallback, using minimum");
            return floor;
        };
        match self.fallback.kind {
            AtrFallbackKind::PercentageOfPrice => {
                let atr = (price * self.fallback.percentage).max(floor);
                let atr = if atr.is_finite() { atr } else { floor };
                tracing::info!(
                    symbol,
                    price,
                    percentage = self.fallback.percentage,
                    atr,
                    "Using percentage-of-price ATR fallback"
                );
                atr
            }
            AtrFallbackKind::MinValueOnly => {
                tracing::warn!(symbol, min_value = floor, "Unknown ATR fallback type, using minimum");
                floor
            }
        }
    }
}

/// True range series. `TR[0] = high[0] - low[0]`.
#[must_use]
pub fn true_range(high: &[f64], low: &[f64], close: &[f64]) -> Vec<f64> {
    let n = high.len().min(low.len()).min(close.len());
    (0..n)
        .map(|i| {
            let range = high[i] - low[i];
            if i == 0 {
                range
            } else {
                let prev_close = close[i - 1];
                range
                    .max((high[i] - prev_close).abs())
                    .max((low[i] - prev_close).abs())
            }
        })
        .collect()
}

/// Recursive EMA seeded with the first value, alpha = 2 / (span + 1).
/// Entries before index `span - 1` are NaN.
#[must_use]
pub fn ema(values: &[f64], span: usize) -> Vec<f64> {
    let span = span.max(1);
    let alpha = 2.0 / (span as f64 + 1.0);
    let mut out = Vec::with_capacity(values.len());
    let mut state: Option<f64> = None;
    for (i, &v) in values.iter().enumerate() {
        let next = match state {
            None => v,
            Some(prev) => alpha.mul_add(v - prev, prev),
        };
        state = Some(next);
        out.push(if i + 1 >= span { next } else { f64::NAN });
    }
    out
}
