//! Per-session configuration, resolved once from a [`ConfigPort`] and passed
//! by reference to everything that needs it.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use super::error::PerfolioError;
use super::price::PriceField;
use crate::ports::config_port::ConfigPort;

pub const DEFAULT_POOL_SIZE: i64 = 4;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PriceSourceConfig {
    /// One `<SYMBOL>.csv` per symbol under `directory`.
    Csv { directory: PathBuf },
    Sqlite { path: PathBuf, pool_size: u32 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
}

impl ReportFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReportFormat::Text => "text",
            ReportFormat::Json => "json",
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(ReportFormat::Text),
            "json" => Ok(ReportFormat::Json),
            other => Err(format!("unknown report format '{other}' (expected text or json)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub ledger_path: PathBuf,
    pub prices: PriceSourceConfig,
    pub field: PriceField,
    pub format: ReportFormat,
    /// Indented JSON output. Ignored for text.
    pub pretty: bool,
}

impl SessionConfig {
    /// Reads a session from config. Expects the config to have passed
    /// `validate_session_config`; anything still wrong is reported here too.
    pub fn from_config(config: &dyn ConfigPort) -> Result<Self, PerfolioError> {
        let ledger_path = require(config, "ledger", "path")?;

        let source = config
            .get_string("prices", "source")
            .unwrap_or_else(|| "csv".to_string());
        let prices = match source.trim().to_lowercase().as_str() {
            "csv" => PriceSourceConfig::Csv {
                directory: PathBuf::from(require(config, "prices", "directory")?),
            },
            "sqlite" => {
                let pool_size = config.get_int("sqlite", "pool_size", DEFAULT_POOL_SIZE);
                PriceSourceConfig::Sqlite {
                    path: PathBuf::from(require(config, "sqlite", "path")?),
                    pool_size: u32::try_from(pool_size)
                        .ok()
                        .filter(|n| *n > 0)
                        .ok_or_else(|| invalid("sqlite", "pool_size", "must be a positive integer"))?,
                }
            }
            other => {
                return Err(invalid(
                    "prices",
                    "source",
                    &format!("unknown source '{other}' (expected csv or sqlite)"),
                ))
            }
        };

        let field = match config.get_string("prices", "field") {
            Some(s) => s.parse().map_err(|e: String| invalid("prices", "field", &e))?,
            None => PriceField::Close,
        };

        let format = match config.get_string("report", "format") {
            Some(s) => s.parse().map_err(|e: String| invalid("report", "format", &e))?,
            None => ReportFormat::default(),
        };

        Ok(Self {
            ledger_path: PathBuf::from(ledger_path),
            prices,
            field,
            format,
            pretty: config.get_bool("report", "pretty", true),
        })
    }
}

fn require(config: &dyn ConfigPort, section: &str, key: &str) -> Result<String, PerfolioError> {
    config
        .get_string(section, key)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .ok_or_else(|| PerfolioError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        })
}

fn invalid(section: &str, key: &str, reason: &str) -> PerfolioError {
    PerfolioError::ConfigInvalid {
        section: section.to_string(),
        key: key.to_string(),
        reason: reason.to_string(),
    }
}
