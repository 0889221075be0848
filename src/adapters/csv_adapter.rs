//! CSV file price adapter.
//!
//! Reads `<base_path>/<SYMBOL>.csv`. Columns are located by header name, so
//! exports with extra columns (high, low, volume) load unchanged.
//!
//! A file that cannot be read or parsed only drops its own symbol from the
//! table. The fetch fails as a whole only when the base directory is gone.

use crate::domain::error::PerfolioError;
use crate::domain::price::{PriceField, PriceTable};
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

pub struct CsvPriceAdapter {
    base_path: PathBuf,
}

struct Columns {
    date: usize,
    open: Option<usize>,
    close: Option<usize>,
}

impl Columns {
    fn locate(headers: &csv::StringRecord) -> Option<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim().eq_ignore_ascii_case(name))
        };
        Some(Self {
            date: find("date")?,
            open: find("open"),
            close: find("close").or_else(|| find("adj close")),
        })
    }
}

impl CsvPriceAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str) -> PathBuf {
        self.base_path.join(format!("{symbol}.csv"))
    }

    /// Parses one symbol's file into `(field, date, price)` observations.
    fn load_symbol(
        &self,
        path: &Path,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<(PriceField, NaiveDate, f64)>, PerfolioError> {
        let content = fs::read_to_string(path).map_err(|e| PerfolioError::PriceSource {
            reason: format!("failed to read {}: {}", path.display(), e),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let headers = rdr.headers().map_err(|e| PerfolioError::PriceSource {
            reason: format!("{}: CSV header error: {}", path.display(), e),
        })?;
        let columns = Columns::locate(headers).ok_or_else(|| PerfolioError::PriceSource {
            reason: format!("{}: missing date column", path.display()),
        })?;

        let mut observations = Vec::new();
        for result in rdr.records() {
            let record = result.map_err(|e| PerfolioError::PriceSource {
                reason: format!("{}: CSV parse error: {}", path.display(), e),
            })?;

            let date_str = record.get(columns.date).unwrap_or_default();
            let date = parse_date(date_str).ok_or_else(|| PerfolioError::PriceSource {
                reason: format!("{}: invalid date '{}'", path.display(), date_str),
            })?;

            if date < start || date > end {
                continue;
            }

            for (field, index) in [
                (PriceField::Open, columns.open),
                (PriceField::Close, columns.close),
            ] {
                let Some(index) = index else { continue };
                let price = parse_price(record.get(index).unwrap_or_default()).ok_or_else(|| {
                    PerfolioError::PriceSource {
                        reason: format!("{}: invalid {} value on {}", path.display(), field, date),
                    }
                })?;
                observations.push((field, date, price));
            }
        }
        Ok(observations)
    }
}

/// Accepts `YYYY-MM-DD`, optionally followed by a time component.
fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(s.get(..10)?, "%Y-%m-%d").ok())
}

/// Blank and `nan` cells become NaN; anything else must be a number.
fn parse_price(s: &str) -> Option<f64> {
    let s = s.trim();
    if s.is_empty() || s.eq_ignore_ascii_case("nan") || s.eq_ignore_ascii_case("null") {
        return Some(f64::NAN);
    }
    s.parse().ok()
}

impl PricePort for CsvPriceAdapter {
    fn fetch(
        &self,
        symbols: &BTreeSet<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, PerfolioError> {
        if !self.base_path.is_dir() {
            return Err(PerfolioError::PriceSource {
                reason: format!("price directory {} does not exist", self.base_path.display()),
            });
        }

        let mut table = PriceTable::new();

        for symbol in symbols {
            let path = self.csv_path(symbol);
            if !path.is_file() {
                tracing::warn!(%symbol, path = %path.display(), "no price file for symbol");
                continue;
            }
            match self.load_symbol(&path, start, end) {
                Ok(observations) => {
                    for (field, date, price) in observations {
                        table.insert(symbol, field, date, price);
                    }
                }
                Err(e) => tracing::warn!(%symbol, "skipping symbol: {e}"),
            }
        }

        tracing::debug!(
            symbols = table.symbol_count(),
            observations = table.observation_count(),
            "loaded CSV prices"
        );
        Ok(table)
    }
}
