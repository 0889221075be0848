//! SQLite price adapter.
//!
//! The `prices` table is created on open if missing. It is filled by
//! `perfolio import-prices` (or any external loader writing the same schema).

use crate::domain::error::PerfolioError;
use crate::domain::price::{PriceField, PriceTable};
use crate::ports::price_port::PricePort;
use chrono::NaiveDate;
use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;
use rusqlite::params;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// One daily observation. `None` is stored as NULL and read back as NaN.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceRow {
    pub symbol: String,
    pub date: NaiveDate,
    pub open: Option<f64>,
    pub close: Option<f64>,
}

pub struct SqlitePriceAdapter {
    pool: Pool<SqliteConnectionManager>,
}

fn db_err(e: impl std::fmt::Display) -> PerfolioError {
    PerfolioError::Database {
        reason: e.to_string(),
    }
}

impl SqlitePriceAdapter {
    pub fn open(path: &Path, pool_size: u32) -> Result<Self, PerfolioError> {
        let manager = SqliteConnectionManager::file(path);
        let pool = Pool::builder()
            .max_size(pool_size)
            .build(manager)
            .map_err(|e: r2d2::Error| db_err(e))?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        tracing::debug!(path = %path.display(), pool_size, "opened SQLite price store");
        Ok(adapter)
    }

    #[cfg(test)]
    fn in_memory() -> Result<Self, PerfolioError> {
        let manager = SqliteConnectionManager::memory();
        // Every in-memory connection is its own database.
        let pool = Pool::builder()
            .max_size(1)
            .build(manager)
            .map_err(|e: r2d2::Error| db_err(e))?;

        let adapter = Self { pool };
        adapter.initialize_schema()?;
        Ok(adapter)
    }

    fn initialize_schema(&self) -> Result<(), PerfolioError> {
        let conn = self.pool.get().map_err(|e: r2d2::Error| db_err(e))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS prices (
                symbol TEXT NOT NULL,
                date TEXT NOT NULL,
                open REAL,
                close REAL,
                PRIMARY KEY (symbol, date)
            );
            CREATE INDEX IF NOT EXISTS idx_prices_date ON prices(date);",
        )
        .map_err(|e: rusqlite::Error| db_err(e))?;

        Ok(())
    }

    pub fn insert_prices(&self, rows: &[PriceRow]) -> Result<(), PerfolioError> {
        let mut conn = self.pool.get().map_err(|e: r2d2::Error| db_err(e))?;
        let tx = conn.transaction().map_err(|e: rusqlite::Error| db_err(e))?;

        for row in rows {
            tx.execute(
                "INSERT OR REPLACE INTO prices (symbol, date, open, close)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    row.symbol,
                    row.date.format("%Y-%m-%d").to_string(),
                    row.open,
                    row.close
                ],
            )
            .map_err(|e: rusqlite::Error| db_err(e))?;
        }

        tx.commit().map_err(|e: rusqlite::Error| db_err(e))?;
        Ok(())
    }
}

/// Flattens a fetched table into one row per `(symbol, date)`. NaN cells
/// become NULL.
pub fn rows_from_table(table: &PriceTable) -> Vec<PriceRow> {
    let mut grouped: BTreeMap<(&str, NaiveDate), (Option<f64>, Option<f64>)> = BTreeMap::new();
    for (symbol, field, date, price) in table.observations() {
        let entry = grouped.entry((symbol, date)).or_default();
        let value = Some(price).filter(|p| !p.is_nan());
        match field {
            PriceField::Open => entry.0 = value,
            PriceField::Close => entry.1 = value,
        }
    }
    grouped
        .into_iter()
        .map(|((symbol, date), (open, close))| PriceRow {
            symbol: symbol.to_string(),
            date,
            open,
            close,
        })
        .collect()
}

impl PricePort for SqlitePriceAdapter {
    fn fetch(
        &self,
        symbols: &BTreeSet<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, PerfolioError> {
        let conn = self.pool.get().map_err(|e: r2d2::Error| db_err(e))?;

        let start_str = start.format("%Y-%m-%d").to_string();
        let end_str = end.format("%Y-%m-%d").to_string();

        let mut stmt = conn
            .prepare(
                "SELECT date, open, close
                 FROM prices
                 WHERE symbol = ?1 AND date >= ?2 AND date <= ?3
                 ORDER BY date ASC",
            )
            .map_err(|e: rusqlite::Error| db_err(e))?;

        let mut table = PriceTable::new();
        for symbol in symbols {
            let rows = stmt
                .query_map(params![symbol, start_str, end_str], |row| {
                    let date_str: String = row.get(0)?;
                    let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d").map_err(|e| {
                        rusqlite::Error::FromSqlConversionFailure(
                            date_str.len(),
                            rusqlite::types::Type::Text,
                            Box::new(e),
                        )
                    })?;
                    let open: Option<f64> = row.get(1)?;
                    let close: Option<f64> = row.get(2)?;
                    Ok((date, open, close))
                })
                .map_err(|e: rusqlite::Error| db_err(e))?;

            for row in rows {
                let (date, open, close) = row.map_err(|e: rusqlite::Error| db_err(e))?;
                table.insert(symbol, PriceField::Open, date, open.unwrap_or(f64::NAN));
                table.insert(symbol, PriceField::Close, date, close.unwrap_or(f64::NAN));
            }
        }

        tracing::debug!(
            symbols = table.symbol_count(),
            observations = table.observation_count(),
            "loaded SQLite prices"
        );
        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::MissingPrice;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(symbol: &str, date: NaiveDate, open: Option<f64>, close: Option<f64>) -> PriceRow {
        PriceRow {
            symbol: symbol.to_string(),
            date,
            open,
            close,
        }
    }

    fn seeded() -> SqlitePriceAdapter {
        let adapter = SqlitePriceAdapter::in_memory().unwrap();
        adapter
            .insert_prices(&[
                row("AAPL", d(2024, 1, 2), Some(185.0), Some(186.0)),
                row("AAPL", d(2024, 1, 3), Some(184.0), None),
                row("AAPL", d(2024, 1, 4), Some(182.0), Some(181.0)),
                row("MSFT", d(2024, 1, 2), Some(370.0), Some(371.0)),
            ])
            .unwrap();
        adapter
    }

    fn symbols(names: &[&str]) -> BTreeSet<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn in_memory_initialization() {
        let adapter = SqlitePriceAdapter::in_memory().unwrap();
        adapter.initialize_schema().unwrap();
        // Idempotent
        adapter.initialize_schema().unwrap();
    }

    #[test]
    fn fetch_returns_requested_symbols_in_range() {
        let adapter = seeded();

        let table = adapter
            .fetch(&symbols(&["AAPL"]), d(2024, 1, 2), d(2024, 1, 3))
            .unwrap();

        assert_eq!(table.get("AAPL", PriceField::Open, d(2024, 1, 2)), Ok(185.0));
        assert_eq!(table.get("AAPL", PriceField::Close, d(2024, 1, 2)), Ok(186.0));
        assert!(!table.contains_symbol("MSFT"));
        let err = table.get("AAPL", PriceField::Close, d(2024, 1, 4)).unwrap_err();
        assert_eq!(err.missing, MissingPrice::Date);
    }

    #[test]
    fn null_price_reads_as_nan() {
        let adapter = seeded();
        let table = adapter
            .fetch(&symbols(&["AAPL"]), d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        assert!(table.get("AAPL", PriceField::Close, d(2024, 1, 3)).unwrap().is_nan());
        assert_eq!(table.get("AAPL", PriceField::Open, d(2024, 1, 3)), Ok(184.0));
    }

    #[test]
    fn unknown_symbol_is_absent() {
        let adapter = seeded();
        let table = adapter
            .fetch(&symbols(&["MSFT", "TSLA"]), d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        assert!(table.contains_symbol("MSFT"));
        assert!(!table.contains_symbol("TSLA"));
    }

    #[test]
    fn insert_replaces_existing_row() {
        let adapter = seeded();
        adapter
            .insert_prices(&[row("MSFT", d(2024, 1, 2), Some(1.0), Some(2.0))])
            .unwrap();
        let table = adapter
            .fetch(&symbols(&["MSFT"]), d(2024, 1, 2), d(2024, 1, 2))
            .unwrap();
        assert_eq!(table.get("MSFT", PriceField::Close, d(2024, 1, 2)), Ok(2.0));
        assert_eq!(table.observation_count(), 2);
    }

    #[test]
    fn fresh_database_file_gets_schema_on_open() {
        let dir = tempfile::TempDir::new().unwrap();
        let adapter = SqlitePriceAdapter::open(&dir.path().join("prices.db"), 2).unwrap();

        let table = adapter
            .fetch(&symbols(&["AAPL"]), d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        assert_eq!(table.symbol_count(), 0);

        adapter
            .insert_prices(&[row("AAPL", d(2024, 1, 2), Some(185.0), Some(186.0))])
            .unwrap();
        let table = adapter
            .fetch(&symbols(&["AAPL"]), d(2024, 1, 1), d(2024, 1, 31))
            .unwrap();
        assert_eq!(table.get("AAPL", PriceField::Close, d(2024, 1, 2)), Ok(186.0));
    }

    #[test]
    fn rows_from_table_pairs_fields_and_nulls_nan() {
        let mut table = PriceTable::new();
        table.insert("BHP", PriceField::Open, d(2024, 1, 2), 40.0);
        table.insert("BHP", PriceField::Close, d(2024, 1, 2), 41.0);
        table.insert("BHP", PriceField::Close, d(2024, 1, 3), f64::NAN);
        table.insert("AAPL", PriceField::Close, d(2024, 1, 2), 186.0);

        assert_eq!(
            rows_from_table(&table),
            vec![
                row("AAPL", d(2024, 1, 2), None, Some(186.0)),
                row("BHP", d(2024, 1, 2), Some(40.0), Some(41.0)),
                row("BHP", d(2024, 1, 3), None, None),
            ]
        );
    }
}
