//! Domain error and warning types.
//!
//! `PerfolioError` is what the outer layers (config, import, CLI) fail with.
//! The calculation core never fails: it degrades and reports a
//! [`CalcWarning`] alongside its result instead.

use chrono::NaiveDate;
use serde::Serialize;

use super::price::PriceField;

/// Which part of a `(symbol, field, date)` price key was absent.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum MissingPrice {
    Symbol,
    Field,
    Date,
    /// The provider failed to populate the cache for the current scope.
    Unavailable(String),
}

impl std::fmt::Display for MissingPrice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissingPrice::Symbol => write!(f, "symbol not in price source"),
            MissingPrice::Field => write!(f, "field not in price source"),
            MissingPrice::Date => write!(f, "no observation on that date"),
            MissingPrice::Unavailable(reason) => write!(f, "price source unavailable: {reason}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("no {field} price for {symbol} on {date}: {missing}")]
pub struct PriceNotFound {
    pub symbol: String,
    pub date: NaiveDate,
    pub field: PriceField,
    pub missing: MissingPrice,
}

/// Non-fatal condition surfaced with a valuation or return result.
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
pub enum CalcWarning {
    #[error(transparent)]
    PriceNotFound(#[from] PriceNotFound),

    #[error("zero starting value for period {start} to {end}, return reported as 0")]
    DivisionByZero { start: NaiveDate, end: NaiveDate },
}

/// Top-level error type for perfolio.
#[derive(Debug, thiserror::Error)]
pub enum PerfolioError {
    #[error("config parse error in {file}: {reason}")]
    ConfigParse { file: String, reason: String },

    #[error("missing config key [{section}] {key}")]
    ConfigMissing { section: String, key: String },

    #[error("invalid config value [{section}] {key}: {reason}")]
    ConfigInvalid {
        section: String,
        key: String,
        reason: String,
    },

    #[error("invalid setting '{key}': {reason}")]
    InvalidSetting { key: String, reason: String },

    #[error("malformed record at line {line}: {reason}")]
    MalformedRecord { line: usize, reason: String },

    #[error("price source error: {reason}")]
    PriceSource { reason: String },

    #[error("database error: {reason}")]
    Database { reason: String },

    #[error("report error: {reason}")]
    Report { reason: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl PerfolioError {
    pub fn exit_code(&self) -> u8 {
        match self {
            PerfolioError::Io(_) | PerfolioError::Report { .. } => 1,
            PerfolioError::ConfigParse { .. }
            | PerfolioError::ConfigMissing { .. }
            | PerfolioError::ConfigInvalid { .. }
            | PerfolioError::InvalidSetting { .. } => 2,
            PerfolioError::Database { .. } | PerfolioError::PriceSource { .. } => 3,
            PerfolioError::MalformedRecord { .. } => 4,
        }
    }
}

impl From<&PerfolioError> for std::process::ExitCode {
    fn from(err: &PerfolioError) -> Self {
        std::process::ExitCode::from(err.exit_code())
    }
}
