//! Configuration validation.
//!
//! Validates all config fields before any file is read or price fetched.

use crate::domain::error::PerfolioError;
use crate::domain::price::PriceField;
use crate::domain::session::ReportFormat;
use crate::ports::config_port::ConfigPort;

pub fn validate_session_config(config: &dyn ConfigPort) -> Result<(), PerfolioError> {
    validate_ledger(config)?;
    validate_price_source(config)?;
    validate_price_field(config)?;
    validate_report_format(config)?;
    Ok(())
}

fn validate_ledger(config: &dyn ConfigPort) -> Result<(), PerfolioError> {
    require_non_empty(config, "ledger", "path")
}

fn validate_price_source(config: &dyn ConfigPort) -> Result<(), PerfolioError> {
    let source = config
        .get_string("prices", "source")
        .unwrap_or_else(|| "csv".to_string());

    match source.trim().to_lowercase().as_str() {
        "csv" => require_non_empty(config, "prices", "directory"),
        "sqlite" => {
            if !cfg!(feature = "sqlite") {
                return Err(PerfolioError::ConfigInvalid {
                    section: "prices".to_string(),
                    key: "source".to_string(),
                    reason: "sqlite support is not enabled in this build".to_string(),
                });
            }
            require_non_empty(config, "sqlite", "path")?;
            let pool_size = config.get_int("sqlite", "pool_size", 4);
            if pool_size <= 0 || pool_size > u32::MAX as i64 {
                return Err(PerfolioError::ConfigInvalid {
                    section: "sqlite".to_string(),
                    key: "pool_size".to_string(),
                    reason: "pool_size must be a positive integer".to_string(),
                });
            }
            Ok(())
        }
        other => Err(PerfolioError::ConfigInvalid {
            section: "prices".to_string(),
            key: "source".to_string(),
            reason: format!("unknown source '{other}' (expected csv or sqlite)"),
        }),
    }
}

fn validate_price_field(config: &dyn ConfigPort) -> Result<(), PerfolioError> {
    if let Some(value) = config.get_string("prices", "field") {
        value
            .parse::<PriceField>()
            .map_err(|reason| PerfolioError::ConfigInvalid {
                section: "prices".to_string(),
                key: "field".to_string(),
                reason,
            })?;
    }
    Ok(())
}

fn validate_report_format(config: &dyn ConfigPort) -> Result<(), PerfolioError> {
    if let Some(value) = config.get_string("report", "format") {
        value
            .parse::<ReportFormat>()
            .map_err(|reason| PerfolioError::ConfigInvalid {
                section: "report".to_string(),
                key: "format".to_string(),
                reason,
            })?;
    }
    Ok(())
}

fn require_non_empty(config: &dyn ConfigPort, section: &str, key: &str) -> Result<(), PerfolioError> {
    match config.get_string(section, key) {
        Some(s) if !s.trim().is_empty() => Ok(()),
        _ => Err(PerfolioError::ConfigMissing {
            section: section.to_string(),
            key: key.to_string(),
        }),
    }
}
