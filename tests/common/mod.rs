#![allow(dead_code)]

use chrono::NaiveDate;
use perfolio::domain::error::PerfolioError;
use perfolio::domain::ledger::Ledger;
use perfolio::domain::price::{PriceField, PriceTable};
use perfolio::domain::transaction::{Transaction, TransactionKind};
use perfolio::ports::price_port::PricePort;
use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub fn d(y: i32, m: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, day).unwrap()
}

pub fn buy(symbol: &str, date: NaiveDate, qty: f64, price: f64) -> Transaction {
    Transaction::new(symbol, date, TransactionKind::Buy, qty, price).unwrap()
}

pub fn sell(symbol: &str, date: NaiveDate, qty: f64, price: f64) -> Transaction {
    Transaction::new(symbol, date, TransactionKind::Sell, qty, price).unwrap()
}

/// Buy 10 AAPL at 100 on 2023-01-01, sell 5 at 150 on 2023-06-01.
pub fn aapl_ledger() -> Ledger {
    Ledger::from_transactions(vec![
        buy("AAPL", d(2023, 1, 1), 10.0, 100.0),
        sell("AAPL", d(2023, 6, 1), 5.0, 150.0),
    ])
}

pub fn aapl_closes() -> Vec<(NaiveDate, f64)> {
    vec![
        (d(2023, 1, 1), 100.0),
        (d(2023, 6, 1), 150.0),
        (d(2023, 12, 31), 180.0),
    ]
}

/// In-memory price source that counts how often it is asked.
pub struct MockPricePort {
    pub table: PriceTable,
    pub error: Option<String>,
    pub fetches: Arc<AtomicUsize>,
}

impl MockPricePort {
    pub fn new() -> Self {
        Self {
            table: PriceTable::new(),
            error: None,
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_closes(mut self, symbol: &str, closes: &[(NaiveDate, f64)]) -> Self {
        for (date, price) in closes {
            self.table.insert(symbol, PriceField::Close, *date, *price);
            self.table.insert(symbol, PriceField::Open, *date, *price);
        }
        self
    }

    pub fn with_error(mut self, reason: &str) -> Self {
        self.error = Some(reason.to_string());
        self
    }

    pub fn fetch_count(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.fetches)
    }
}

impl PricePort for MockPricePort {
    fn fetch(
        &self,
        _symbols: &BTreeSet<String>,
        _start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<PriceTable, PerfolioError> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        match &self.error {
            Some(reason) => Err(PerfolioError::PriceSource {
                reason: reason.clone(),
            }),
            None => Ok(self.table.clone()),
        }
    }
}

/// A ledger CSV, a price directory and an INI pointing at both.
pub struct Workspace {
    pub dir: tempfile::TempDir,
}

impl Workspace {
    pub fn new() -> Self {
        let ws = Self {
            dir: tempfile::TempDir::new().unwrap(),
        };
        fs::create_dir(ws.prices_dir()).unwrap();
        ws
    }

    /// The AAPL buy/sell ledger with its closing prices on disk.
    pub fn aapl() -> Self {
        let ws = Self::new();
        ws.write_ledger(
            "symbol,date,type,quantity,price\n\
             AAPL,2023-01-01,buy,10,100\n\
             aapl,2023-06-01,sell,5,$150.00\n",
        );
        let mut prices = String::from("Date,Open,Close\n");
        for (date, price) in aapl_closes() {
            prices.push_str(&format!("{date},{price},{price}\n"));
        }
        ws.write_prices("AAPL", &prices);
        ws
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn ledger_path(&self) -> PathBuf {
        self.root().join("transactions.csv")
    }

    pub fn prices_dir(&self) -> PathBuf {
        self.root().join("prices")
    }

    pub fn config_path(&self) -> PathBuf {
        self.root().join("perfolio.ini")
    }

    pub fn write_ledger(&self, content: &str) {
        fs::write(self.ledger_path(), content).unwrap();
    }

    pub fn write_prices(&self, symbol: &str, content: &str) {
        fs::write(self.prices_dir().join(format!("{symbol}.csv")), content).unwrap();
    }

    /// Writes an INI for a CSV session, with optional extra lines in
    /// `[report]`.
    pub fn write_config(&self, report_extra: &str) -> PathBuf {
        let content = format!(
            "[ledger]\npath = {}\n\n[prices]\nsource = csv\ndirectory = {}\n\n[report]\n{}\n",
            self.ledger_path().display(),
            self.prices_dir().display(),
            report_extra
        );
        fs::write(self.config_path(), content).unwrap();
        self.config_path()
    }
}
