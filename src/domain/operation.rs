//! Static catalogue of portfolio operations.
//!
//! Each [`OperationKind`] carries its menu placement, a schema of date
//! settings with defaults, validation, and an `execute` that turns a ledger
//! and a price oracle into a [`Report`].

use chrono::{Months, NaiveDate};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::error::PerfolioError;
use super::ledger::{Cutoff, Ledger};
use super::price::PriceField;
use super::price_oracle::{PriceLookup, PriceOracle, PriceScope};
use super::report::{Cell, Report, Table};
use super::returns::ReturnEngine;
use super::valuator;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OperationKind {
    CalculateTwr,
    CalculateMwr,
    ViewHoldings,
    ViewTransactions,
    ViewHoldingsDiff,
}

/// Where a setting's value comes from when the caller does not supply one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateDefault {
    Today,
    OneYearAgo,
}

impl DateDefault {
    pub fn resolve(&self, today: NaiveDate) -> NaiveDate {
        match self {
            DateDefault::Today => today,
            DateDefault::OneYearAgo => today.checked_sub_months(Months::new(12)).unwrap_or(today),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettingSpec {
    pub key: &'static str,
    pub label: &'static str,
    pub default: DateDefault,
}

const FROM: SettingSpec = SettingSpec {
    key: "from",
    label: "From",
    default: DateDefault::OneYearAgo,
};

const TO: SettingSpec = SettingSpec {
    key: "to",
    label: "To",
    default: DateDefault::Today,
};

const DATE: SettingSpec = SettingSpec {
    key: "date",
    label: "Date",
    default: DateDefault::Today,
};

const RANGE_SETTINGS: &[SettingSpec] = &[FROM, TO];
const DATE_SETTINGS: &[SettingSpec] = &[DATE];

impl OperationKind {
    pub const ALL: [OperationKind; 5] = [
        OperationKind::CalculateTwr,
        OperationKind::CalculateMwr,
        OperationKind::ViewHoldings,
        OperationKind::ViewTransactions,
        OperationKind::ViewHoldingsDiff,
    ];

    /// Short command-line identifier.
    pub fn id(&self) -> &'static str {
        match self {
            OperationKind::CalculateTwr => "twr",
            OperationKind::CalculateMwr => "mwr",
            OperationKind::ViewHoldings => "holdings",
            OperationKind::ViewTransactions => "transactions",
            OperationKind::ViewHoldingsDiff => "holdings-diff",
        }
    }

    pub fn category(&self) -> &'static str {
        match self {
            OperationKind::CalculateTwr | OperationKind::CalculateMwr => "Return Calculation",
            _ => "Portfolio Analysis",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            OperationKind::CalculateTwr => "Calculate TWR",
            OperationKind::CalculateMwr => "Calculate MWR",
            OperationKind::ViewHoldings => "View Holdings",
            OperationKind::ViewTransactions => "View Transactions",
            OperationKind::ViewHoldingsDiff => "View Holdings Diff",
        }
    }

    pub fn display_name(&self) -> String {
        format!("{}|{}", self.category(), self.name())
    }

    pub fn settings(&self) -> &'static [SettingSpec] {
        match self {
            OperationKind::ViewHoldings => DATE_SETTINGS,
            _ => RANGE_SETTINGS,
        }
    }

    /// Checks that every supplied key is known and that a `from`/`to` pair,
    /// once defaults are applied, is in order.
    pub fn validate(&self, settings: &OperationSettings, today: NaiveDate) -> Result<(), PerfolioError> {
        for key in settings.values.keys() {
            if !self.settings().iter().any(|setting| setting.key == key) {
                return Err(PerfolioError::InvalidSetting {
                    key: key.clone(),
                    reason: format!("not a setting of {}", self.display_name()),
                });
            }
        }

        if self.settings() == RANGE_SETTINGS {
            let from = settings.resolve(self, FROM.key, today)?;
            let to = settings.resolve(self, TO.key, today)?;
            if from > to {
                return Err(PerfolioError::InvalidSetting {
                    key: FROM.key.to_string(),
                    reason: format!("{from} is after {to}"),
                });
            }
        }
        Ok(())
    }

    pub fn execute(
        &self,
        settings: &OperationSettings,
        ctx: &OperationContext<'_>,
    ) -> Result<Report, PerfolioError> {
        self.validate(settings, ctx.today)?;

        let report = match self {
            OperationKind::CalculateTwr => {
                let (from, to) = settings.range(self, ctx.today)?;
                ctx.scope_prices(from, to);
                calculate_twr(ctx, from, to)
            }
            OperationKind::CalculateMwr => {
                let (from, to) = settings.range(self, ctx.today)?;
                ctx.scope_prices(from, to);
                calculate_mwr(ctx, from, to)
            }
            OperationKind::ViewHoldings => {
                let date = settings.resolve(self, DATE.key, ctx.today)?;
                ctx.scope_prices(date, date);
                view_holdings(ctx, date)
            }
            OperationKind::ViewTransactions => {
                let (from, to) = settings.range(self, ctx.today)?;
                view_transactions(ctx.ledger, from, to)
            }
            OperationKind::ViewHoldingsDiff => {
                let (from, to) = settings.range(self, ctx.today)?;
                view_holdings_diff(ctx.ledger, from, to)
            }
        };

        tracing::info!(
            operation = %self.display_name(),
            warnings = report.warnings.len(),
            "operation complete"
        );
        Ok(report)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())
    }
}

impl FromStr for OperationKind {
    type Err = String;

    /// Accepts either the short id (`twr`) or the display name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        OperationKind::ALL
            .into_iter()
            .find(|op| op.id().eq_ignore_ascii_case(s) || op.display_name() == s)
            .ok_or_else(|| format!("unknown operation '{s}'"))
    }
}

/// Caller-supplied setting values. Absent keys fall back to the schema
/// default for the operation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationSettings {
    values: BTreeMap<String, NaiveDate>,
}

impl OperationSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: &str, date: NaiveDate) -> &mut Self {
        self.values.insert(key.to_string(), date);
        self
    }

    pub fn with(mut self, key: &str, date: NaiveDate) -> Self {
        self.set(key, date);
        self
    }

    pub fn get(&self, key: &str) -> Option<NaiveDate> {
        self.values.get(key).copied()
    }

    pub fn resolve(&self, op: &OperationKind, key: &str, today: NaiveDate) -> Result<NaiveDate, PerfolioError> {
        if let Some(date) = self.get(key) {
            return Ok(date);
        }
        op.settings()
            .iter()
            .find(|setting| setting.key == key)
            .map(|setting| setting.default.resolve(today))
            .ok_or_else(|| PerfolioError::InvalidSetting {
                key: key.to_string(),
                reason: format!("not a setting of {}", op.display_name()),
            })
    }

    fn range(&self, op: &OperationKind, today: NaiveDate) -> Result<(NaiveDate, NaiveDate), PerfolioError> {
        Ok((self.resolve(op, FROM.key, today)?, self.resolve(op, TO.key, today)?))
    }
}

/// Everything an operation runs against. Built once per session.
pub struct OperationContext<'a> {
    pub ledger: &'a Ledger,
    pub oracle: &'a PriceOracle,
    pub field: PriceField,
    pub today: NaiveDate,
}

impl OperationContext<'_> {
    fn scope_prices(&self, start: NaiveDate, end: NaiveDate) {
        self.oracle
            .set_scope(PriceScope::new(self.ledger.symbols(), start, end));
    }
}

fn calculate_twr(ctx: &OperationContext<'_>, from: NaiveDate, to: NaiveDate) -> Report {
    let engine = ReturnEngine::new(ctx.ledger, ctx.oracle, ctx.field);
    let twr = engine.calculate_twr(from, to);

    let mut table = Table::new(
        "periods",
        &[
            "From",
            "To",
            "Growth Factor",
            "Return",
            "Portfolio Initial Value",
            "Portfolio Final Value",
            "Cash Flow",
            "Gain/Loss",
        ],
    );
    for p in &twr.periods {
        table.push_row(vec![
            Cell::Date(p.start_date),
            Cell::Date(p.end_date),
            Cell::Factor(p.growth_factor),
            Cell::Percent(p.period_return),
            Cell::Money(p.begin_value),
            Cell::Money(p.end_value),
            Cell::Money(p.cash_flow),
            Cell::Money(p.gain_loss),
        ]);
    }

    Report::new(OperationKind::CalculateTwr.name())
        .with_summary("Time-Weighted Return (TWR)", Cell::Percent(twr.value))
        .with_table(table)
        .with_warnings(twr.warnings)
}

fn calculate_mwr(ctx: &OperationContext<'_>, from: NaiveDate, to: NaiveDate) -> Report {
    let engine = ReturnEngine::new(ctx.ledger, ctx.oracle, ctx.field);
    let mwr = engine.calculate_mwr(from, to);

    let mut table = Table::new(
        "mwr",
        &["Initial Value", "Final Value", "Cash Flow", "Gain/Loss", "Degenerate"],
    );
    table.push_row(vec![
        Cell::Money(mwr.initial_value),
        Cell::Money(mwr.final_value),
        Cell::Money(mwr.cash_flow),
        Cell::Money(mwr.gain_loss),
        Cell::Flag(mwr.degenerate),
    ]);

    Report::new(OperationKind::CalculateMwr.name())
        .with_summary("Money-Weighted Return (MWR)", Cell::Percent(mwr.mwr))
        .with_table(table)
        .with_warnings(mwr.warnings)
}

fn view_holdings(ctx: &OperationContext<'_>, date: NaiveDate) -> Report {
    let holdings = ctx.ledger.holdings_at(date, Cutoff::Open, true);
    let valuation = valuator::value_at(ctx.oracle, &holdings, date, ctx.field);

    let mut table = Table::new("holdings", &["Symbol", "Quantity", "Price", "Value"]);
    for (symbol, &quantity) in &holdings {
        // Lookup failures were already reported by the valuation.
        let price = ctx
            .oracle
            .price_at(symbol, date, ctx.field)
            .ok()
            .filter(|p| !p.is_nan());
        let (price_cell, value_cell) = match price {
            Some(price) => (Cell::Money(price), Cell::Money(quantity * price)),
            None => (Cell::from("n/a"), Cell::from("n/a")),
        };
        table.push_row(vec![
            Cell::from(symbol.as_str()),
            Cell::Quantity(quantity),
            price_cell,
            value_cell,
        ]);
    }

    Report::new(OperationKind::ViewHoldings.name())
        .with_summary("Portfolio Value", Cell::Money(valuation.value))
        .with_table(table)
        .with_warnings(valuation.warnings)
}

fn view_transactions(ledger: &Ledger, from: NaiveDate, to: NaiveDate) -> Report {
    let mut table = Table::new(
        "transactions",
        &["Symbol", "Date", "Type", "Quantity", "Price"],
    );
    for t in ledger.transactions_between(from, to) {
        table.push_row(vec![
            Cell::from(t.symbol()),
            Cell::Date(t.date()),
            Cell::from(t.kind().as_str()),
            Cell::Quantity(t.quantity()),
            Cell::Money(t.price()),
        ]);
    }
    Report::new(OperationKind::ViewTransactions.name()).with_table(table)
}

fn view_holdings_diff(ledger: &Ledger, from: NaiveDate, to: NaiveDate) -> Report {
    let mut table = Table::new(
        "holdings_diff",
        &["Symbol", "Start Quantity", "End Quantity", "Diff"],
    );
    for row in ledger.holdings_diff(from, to) {
        table.push_row(vec![
            Cell::from(row.symbol),
            Cell::Quantity(row.start_quantity),
            Cell::Quantity(row.end_quantity),
            Cell::Quantity(row.difference),
        ]);
    }
    Report::new(OperationKind::ViewHoldingsDiff.name()).with_table(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::price::PriceTable;
    use crate::domain::transaction::{Transaction, TransactionKind};
    use crate::ports::price_port::PricePort;
    use std::collections::BTreeSet;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    struct FixedPort(PriceTable);

    impl PricePort for FixedPort {
        fn fetch(&self, _: &BTreeSet<String>, _: NaiveDate, _: NaiveDate) -> Result<PriceTable, PerfolioError> {
            Ok(self.0.clone())
        }
    }

    fn ledger() -> Ledger {
        Ledger::from_transactions(vec![
            Transaction::new("AAPL", d(2023, 1, 1), TransactionKind::Buy, 10.0, 100.0).unwrap(),
            Transaction::new("AAPL", d(2023, 6, 1), TransactionKind::Sell, 5.0, 150.0).unwrap(),
        ])
    }

    fn oracle() -> PriceOracle {
        let mut table = PriceTable::new();
        table.insert("AAPL", PriceField::Close, d(2023, 1, 1), 100.0);
        table.insert("AAPL", PriceField::Close, d(2023, 6, 1), 150.0);
        table.insert("AAPL", PriceField::Close, d(2023, 12, 31), 180.0);
        PriceOracle::new(
            Box::new(FixedPort(table)),
            PriceScope::new(BTreeSet::new(), d(2023, 1, 1), d(2023, 1, 1)),
        )
    }

    #[test]
    fn catalogue_names() {
        assert_eq!(OperationKind::CalculateTwr.display_name(), "Return Calculation|Calculate TWR");
        assert_eq!(
            OperationKind::ViewHoldingsDiff.display_name(),
            "Portfolio Analysis|View Holdings Diff"
        );
        assert_eq!("twr".parse::<OperationKind>(), Ok(OperationKind::CalculateTwr));
        assert_eq!(
            "Portfolio Analysis|View Holdings".parse::<OperationKind>(),
            Ok(OperationKind::ViewHoldings)
        );
        assert!("sharpe".parse::<OperationKind>().is_err());
    }

    #[test]
    fn defaults_are_relative_to_today() {
        let today = d(2024, 2, 29);
        let settings = OperationSettings::new();
        let op = OperationKind::CalculateTwr;
        assert_eq!(settings.resolve(&op, "from", today).unwrap(), d(2023, 2, 28));
        assert_eq!(settings.resolve(&op, "to", today).unwrap(), today);
        assert_eq!(
            settings.resolve(&OperationKind::ViewHoldings, "date", today).unwrap(),
            today
        );
    }

    #[test]
    fn validate_rejects_unknown_key() {
        let settings = OperationSettings::new().with("date", d(2023, 1, 1));
        let err = OperationKind::CalculateTwr
            .validate(&settings, d(2024, 1, 1))
            .unwrap_err();
        assert!(matches!(err, PerfolioError::InvalidSetting { ref key, .. } if key == "date"));
    }

    #[test]
    fn validate_rejects_inverted_range() {
        let settings = OperationSettings::new()
            .with("from", d(2023, 12, 31))
            .with("to", d(2023, 1, 1));
        assert!(OperationKind::ViewTransactions
            .validate(&settings, d(2024, 1, 1))
            .is_err());

        // A `from` after the defaulted `to` is caught too.
        let settings = OperationSettings::new().with("from", d(2030, 1, 1));
        assert!(OperationKind::CalculateMwr
            .validate(&settings, d(2024, 1, 1))
            .is_err());
    }

    #[test]
    fn twr_report_has_summary_and_periods() {
        let ledger = ledger();
        let oracle = oracle();
        let ctx = OperationContext {
            ledger: &ledger,
            oracle: &oracle,
            field: PriceField::Close,
            today: d(2024, 1, 1),
        };
        let settings = OperationSettings::new()
            .with("from", d(2023, 1, 1))
            .with("to", d(2023, 12, 31));

        let report = OperationKind::CalculateTwr.execute(&settings, &ctx).unwrap();

        let summary = report.summary.unwrap();
        assert_eq!(summary.label, "Time-Weighted Return (TWR)");
        match summary.value {
            Cell::Percent(v) => assert!((v - 0.2).abs() < 1e-12),
            other => panic!("unexpected cell {other:?}"),
        }
        assert_eq!(report.tables[0].columns.len(), 8);
        assert_eq!(report.tables[0].rows.len(), 2);
        assert_eq!(report.warnings.len(), 1);

        let scope = oracle.scope();
        assert_eq!(scope.start, d(2023, 1, 1));
        assert_eq!(scope.end, d(2023, 12, 31));
        assert!(scope.symbols.contains("AAPL"));
    }

    #[test]
    fn holdings_report_prices_each_position() {
        let ledger = ledger();
        let oracle = oracle();
        let ctx = OperationContext {
            ledger: &ledger,
            oracle: &oracle,
            field: PriceField::Close,
            today: d(2024, 1, 1),
        };
        let settings = OperationSettings::new().with("date", d(2023, 12, 31));

        let report = OperationKind::ViewHoldings.execute(&settings, &ctx).unwrap();

        assert_eq!(
            report.tables[0].rows,
            vec![vec![
                Cell::from("AAPL"),
                Cell::Quantity(5.0),
                Cell::Money(180.0),
                Cell::Money(900.0),
            ]]
        );
        assert_eq!(report.summary.unwrap().value, Cell::Money(900.0));
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn holdings_report_marks_unpriced_positions() {
        let ledger = ledger();
        let oracle = oracle();
        let ctx = OperationContext {
            ledger: &ledger,
            oracle: &oracle,
            field: PriceField::Close,
            today: d(2024, 1, 1),
        };
        // Saturday, no observation
        let settings = OperationSettings::new().with("date", d(2023, 12, 30));

        let report = OperationKind::ViewHoldings.execute(&settings, &ctx).unwrap();
        assert_eq!(report.tables[0].rows[0][2], Cell::from("n/a"));
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn transactions_and_diff_need_no_prices() {
        let ledger = ledger();
        let oracle = oracle();
        let ctx = OperationContext {
            ledger: &ledger,
            oracle: &oracle,
            field: PriceField::Close,
            today: d(2024, 1, 1),
        };
        let settings = OperationSettings::new()
            .with("from", d(2022, 12, 31))
            .with("to", d(2023, 12, 31));

        let report = OperationKind::ViewTransactions.execute(&settings, &ctx).unwrap();
        assert_eq!(report.tables[0].rows.len(), 2);
        assert_eq!(report.tables[0].rows[1][2], Cell::from("sell"));

        let report = OperationKind::ViewHoldingsDiff.execute(&settings, &ctx).unwrap();
        assert_eq!(
            report.tables[0].rows,
            vec![vec![
                Cell::from("AAPL"),
                Cell::Quantity(0.0),
                Cell::Quantity(5.0),
                Cell::Quantity(5.0),
            ]]
        );
        assert!(!oracle.is_populated());
    }
}
