//! Shared foundation for the options conviction engine.
//!
//! - Layered configuration: built-in typed defaults, JSON override file and
//!   `MSPI_` environment variables, resolved once into an immutable
//!   [`ConfigStore`]
//! - A small columnar [`Table`] for contract rows and OHLC history
//! - Schema repair for required columns ([`ensure_columns`])
//! - Max-abs series normalization ([`normalize_series`])
//! - Tracing bootstrap

pub mod config;
pub mod config_loader;
pub mod config_store;
pub mod normalize;
pub mod schema;
pub mod table;
pub mod telemetry;

pub use config::{
    AppConfig, SdagMethod, SelectionLogic, StrategySettings, ThresholdSpec, ThresholdValue,
    WeightSet,
};
pub use config_loader::{deep_merge, ConfigError, ConfigLoader};
pub use config_store::ConfigStore;
pub use normalize::{normalize_series, DENOMINATOR_FLOOR};
pub use schema::{coerce_columns, ensure_columns, ColumnKind};
pub use table::{Cell, Table, TableError};
