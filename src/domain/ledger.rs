//! Transaction ledger and the holdings / cash-flow queries over it.
//!
//! Reporting periods are half-open: a period `(start, end]` owns the
//! transactions dated after `start` up to and including `end`. Holdings at
//! the open of a date exclude that date's transactions and holdings at the
//! close include them, so a transaction on a period boundary is counted in
//! exactly one period.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};

use super::transaction::Transaction;

/// Share counts below this magnitude are treated as a closed position.
pub const QUANTITY_EPSILON: f64 = 1e-9;

/// Symbol -> signed share count.
pub type Holdings = BTreeMap<String, f64>;

/// Which side of a date's transactions a holdings query sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cutoff {
    /// Before any transaction dated on the target day.
    Open,
    /// After every transaction dated on the target day.
    Close,
}

impl Cutoff {
    fn includes(&self, transaction_date: NaiveDate, target: NaiveDate) -> bool {
        match self {
            Cutoff::Open => transaction_date < target,
            Cutoff::Close => transaction_date <= target,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HoldingsDiff {
    pub symbol: String,
    pub start_quantity: f64,
    pub end_quantity: f64,
    pub difference: f64,
}

/// Insertion-ordered transactions. Duplicates are kept and counted
/// independently.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Ledger {
    transactions: Vec<Transaction>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_transactions(transactions: Vec<Transaction>) -> Self {
        Self { transactions }
    }

    pub fn push(&mut self, transaction: Transaction) {
        self.transactions.push(transaction);
    }

    /// Drops every transaction and loads `transactions` in their place.
    pub fn replace(&mut self, transactions: Vec<Transaction>) {
        self.transactions = transactions;
    }

    pub fn clear(&mut self) {
        self.transactions.clear();
    }

    pub fn len(&self) -> usize {
        self.transactions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.transactions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter()
    }

    pub fn symbols(&self) -> BTreeSet<String> {
        self.transactions
            .iter()
            .map(|t| t.symbol().to_string())
            .collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.transactions.iter().map(|t| t.date()).min()
    }

    /// Transactions with `start < date <= end`, in ledger order.
    pub fn transactions_between(&self, start: NaiveDate, end: NaiveDate) -> Vec<&Transaction> {
        self.transactions
            .iter()
            .filter(|t| start < t.date() && t.date() <= end)
            .collect()
    }

    pub fn holdings_at(&self, date: NaiveDate, cutoff: Cutoff, filter_empty: bool) -> Holdings {
        let mut holdings = Holdings::new();

        for transaction in &self.transactions {
            if cutoff.includes(transaction.date(), date) {
                *holdings
                    .entry(transaction.symbol().to_string())
                    .or_insert(0.0) += transaction.signed_quantity();
            }
        }

        if filter_empty {
            holdings.retain(|_, quantity| quantity.abs() >= QUANTITY_EPSILON);
        }

        holdings
    }

    /// Net cash put into the portfolio over `(start, end]`: buys add,
    /// sells subtract.
    pub fn cash_flow_between(&self, start: NaiveDate, end: NaiveDate) -> f64 {
        self.transactions_between(start, end)
            .iter()
            .map(|t| t.cash_flow())
            .sum()
    }

    /// Change in share counts from the open of `start` to the close of `end`.
    pub fn holdings_diff(&self, start: NaiveDate, end: NaiveDate) -> Vec<HoldingsDiff> {
        let start_holdings = self.holdings_at(start, Cutoff::Open, true);
        let end_holdings = self.holdings_at(end, Cutoff::Close, true);

        let symbols: BTreeSet<&String> = start_holdings.keys().chain(end_holdings.keys()).collect();

        symbols
            .into_iter()
            .map(|symbol| {
                let start_quantity = start_holdings.get(symbol).copied().unwrap_or(0.0);
                let end_quantity = end_holdings.get(symbol).copied().unwrap_or(0.0);
                HoldingsDiff {
                    symbol: symbol.clone(),
                    start_quantity,
                    end_quantity,
                    difference: end_quantity - start_quantity,
                }
            })
            .collect()
    }
}
