//! Ledger transactions.

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum TransactionKind {
    Buy,
    Sell,
}

impl TransactionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionKind::Buy => "buy",
            TransactionKind::Sell => "sell",
        }
    }

    /// +1 for quantity entering the portfolio, -1 for quantity leaving it.
    pub fn sign(&self) -> f64 {
        match self {
            TransactionKind::Buy => 1.0,
            TransactionKind::Sell => -1.0,
        }
    }
}

impl fmt::Display for TransactionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransactionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "buy" => Ok(TransactionKind::Buy),
            "sell" => Ok(TransactionKind::Sell),
            other => Err(format!("unknown transaction type '{other}'")),
        }
    }
}

/// A single buy or sell. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Transaction {
    symbol: String,
    date: NaiveDate,
    kind: TransactionKind,
    quantity: f64,
    price: f64,
}

impl Transaction {
    /// Builds a transaction, rejecting an empty symbol, a non-positive
    /// quantity or a negative price.
    pub fn new(
        symbol: &str,
        date: NaiveDate,
        kind: TransactionKind,
        quantity: f64,
        price: f64,
    ) -> Result<Self, String> {
        let symbol = symbol.trim();
        if symbol.is_empty() {
            return Err("symbol must not be empty".to_string());
        }
        if !(quantity.is_finite() && quantity > 0.0) {
            return Err(format!("quantity must be positive, got {quantity}"));
        }
        if !(price.is_finite() && price >= 0.0) {
            return Err(format!("price must be non-negative, got {price}"));
        }
        Ok(Self {
            symbol: symbol.to_string(),
            date,
            kind,
            quantity,
            price,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn date(&self) -> NaiveDate {
        self.date
    }

    pub fn kind(&self) -> TransactionKind {
        self.kind
    }

    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    pub fn price(&self) -> f64 {
        self.price
    }

    /// Quantity with the sign of its effect on holdings.
    pub fn signed_quantity(&self) -> f64 {
        self.kind.sign() * self.quantity
    }

    /// Cash put into the portfolio: positive for buys, negative for sells.
    pub fn cash_flow(&self) -> f64 {
        self.kind.sign() * self.quantity * self.price
    }
}
