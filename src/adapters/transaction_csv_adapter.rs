//! Transaction ledger import from CSV.
//!
//! The first row is a header. Columns are matched by name against a small
//! alias list; if the header names none of them the file is read
//! positionally as `symbol, date, type, quantity, price`.

use crate::domain::error::PerfolioError;
use crate::domain::ledger::Ledger;
use crate::domain::transaction::{Transaction, TransactionKind};
use chrono::NaiveDate;
use std::fs::File;
use std::io::Read;
use std::path::PathBuf;

const SYMBOL_ALIASES: &[&str] = &["symbol", "ticker", "code"];
const DATE_ALIASES: &[&str] = &["date", "trade date", "transaction date"];
const KIND_ALIASES: &[&str] = &["type", "kind", "side", "action"];
const QUANTITY_ALIASES: &[&str] = &["quantity", "qty", "shares", "units"];
const PRICE_ALIASES: &[&str] = &["price", "unit price", "share price"];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct ColumnMap {
    symbol: usize,
    date: usize,
    kind: usize,
    quantity: usize,
    price: usize,
}

impl ColumnMap {
    const POSITIONAL: ColumnMap = ColumnMap {
        symbol: 0,
        date: 1,
        kind: 2,
        quantity: 3,
        price: 4,
    };

    fn resolve(headers: &csv::StringRecord) -> Result<Self, PerfolioError> {
        let find = |aliases: &[&str]| {
            headers.iter().position(|h| {
                let h = h.trim();
                aliases.iter().any(|a| h.eq_ignore_ascii_case(a))
            })
        };

        let found = [
            find(SYMBOL_ALIASES),
            find(DATE_ALIASES),
            find(KIND_ALIASES),
            find(QUANTITY_ALIASES),
            find(PRICE_ALIASES),
        ];

        match found {
            [Some(symbol), Some(date), Some(kind), Some(quantity), Some(price)] => Ok(Self {
                symbol,
                date,
                kind,
                quantity,
                price,
            }),
            [None, None, None, None, None] => Ok(Self::POSITIONAL),
            _ => {
                let names = ["symbol", "date", "type", "quantity", "price"];
                let missing: Vec<&str> = names
                    .iter()
                    .zip(found)
                    .filter(|(_, f)| f.is_none())
                    .map(|(n, _)| *n)
                    .collect();
                Err(PerfolioError::MalformedRecord {
                    line: 1,
                    reason: format!("header is missing column(s): {}", missing.join(", ")),
                })
            }
        }
    }
}

pub struct TransactionCsvAdapter {
    path: PathBuf,
}

impl TransactionCsvAdapter {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn load(&self) -> Result<Ledger, PerfolioError> {
        let file = File::open(&self.path)?;
        let transactions = read_transactions(file)?;
        tracing::info!(
            path = %self.path.display(),
            transactions = transactions.len(),
            "loaded ledger"
        );
        Ok(Ledger::from_transactions(transactions))
    }
}

/// Parses every row, failing on the first malformed one.
pub fn read_transactions<R: Read>(reader: R) -> Result<Vec<Transaction>, PerfolioError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers = rdr.headers().map_err(|e| PerfolioError::MalformedRecord {
        line: 1,
        reason: e.to_string(),
    })?;
    let columns = ColumnMap::resolve(headers)?;

    let mut transactions = Vec::new();
    for (index, result) in rdr.records().enumerate() {
        let fallback_line = index + 2;
        let record = result.map_err(|e| PerfolioError::MalformedRecord {
            line: fallback_line,
            reason: e.to_string(),
        })?;
        let line = record
            .position()
            .map(|p| p.line() as usize)
            .unwrap_or(fallback_line);

        transactions.push(parse_record(&record, &columns, line)?);
    }
    Ok(transactions)
}

fn parse_record(record: &csv::StringRecord, columns: &ColumnMap, line: usize) -> Result<Transaction, PerfolioError> {
    let malformed = |reason: String| PerfolioError::MalformedRecord { line, reason };
    let cell = |index: usize, name: &str| {
        record
            .get(index)
            .filter(|s| !s.is_empty())
            .ok_or_else(|| malformed(format!("missing {name}")))
    };

    let symbol = cell(columns.symbol, "symbol")?.to_uppercase();

    let date_str = cell(columns.date, "date")?;
    let date = DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(date_str, fmt).ok())
        .ok_or_else(|| malformed(format!("invalid date '{date_str}' (expected YYYY-MM-DD)")))?;

    let kind: TransactionKind = cell(columns.kind, "type")?.parse().map_err(malformed)?;

    let quantity_str = cell(columns.quantity, "quantity")?;
    let quantity: f64 = quantity_str
        .parse()
        .map_err(|_| malformed(format!("invalid quantity '{quantity_str}'")))?;

    let price_str = cell(columns.price, "price")?;
    let price: f64 = price_str
        .trim_start_matches('$')
        .replace(',', "")
        .parse()
        .map_err(|_| malformed(format!("invalid price '{price_str}'")))?;

    Transaction::new(&symbol, date, kind, quantity, price).map_err(malformed)
}
