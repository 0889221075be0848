//! Time-weighted and money-weighted returns.
//!
//! TWR splits `(begin, end]` into sub-periods at every date with a
//! transaction, computes a growth factor per sub-period with that period's
//! cash flow backed out, and chains the factors geometrically:
//!
//! ```text
//! growth_i = (V_end_i - CF_i) / V_begin_i
//! TWR      = prod(growth_i) - 1
//! ```
//!
//! A sub-period that starts from a zero value has no defined growth; it is
//! given a neutral factor of 1 and flagged, but its gain/loss is still
//! reported. MWR is the single-period version of the same ratio over the
//! whole range.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeSet;

use super::error::CalcWarning;
use super::ledger::{Cutoff, Ledger};
use super::price::PriceField;
use super::price_oracle::PriceLookup;
use super::valuator::{self, Valuation};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwrPeriod {
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    /// NaN when the period's values were themselves undefined.
    pub growth_factor: f64,
    pub period_return: f64,
    pub begin_value: f64,
    pub end_value: f64,
    pub cash_flow: f64,
    pub gain_loss: f64,
    /// Began from a zero value; growth forced to 1.
    pub zero_basis: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TwrResult {
    pub periods: Vec<TwrPeriod>,
    /// Compounded return over the whole range.
    pub value: f64,
    pub warnings: Vec<CalcWarning>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MwrResult {
    pub from: NaiveDate,
    pub to: NaiveDate,
    pub mwr: f64,
    pub initial_value: f64,
    pub final_value: f64,
    pub cash_flow: f64,
    pub gain_loss: f64,
    /// Initial value was zero; `mwr` is reported as 0.
    pub degenerate: bool,
    pub warnings: Vec<CalcWarning>,
}

/// Product of every defined growth factor, minus one. NaN factors are
/// skipped rather than propagated.
pub fn compound(growth_factors: impl IntoIterator<Item = f64>) -> f64 {
    growth_factors
        .into_iter()
        .filter(|g| !g.is_nan())
        .product::<f64>()
        - 1.0
}

pub struct ReturnEngine<'a> {
    ledger: &'a Ledger,
    prices: &'a dyn PriceLookup,
    field: PriceField,
}

impl<'a> ReturnEngine<'a> {
    pub fn new(ledger: &'a Ledger, prices: &'a dyn PriceLookup, field: PriceField) -> Self {
        Self {
            ledger,
            prices,
            field,
        }
    }

    /// Value of the holdings at the open or close of `date`, priced on `date`.
    pub fn portfolio_value(&self, date: NaiveDate, cutoff: Cutoff) -> Valuation {
        let holdings = self.ledger.holdings_at(date, cutoff, true);
        valuator::value_at(self.prices, &holdings, date, self.field)
    }

    pub fn calculate_twr(&self, begin: NaiveDate, end: NaiveDate) -> TwrResult {
        // An empty (or inverted) range has no growth to report.
        if begin >= end {
            return TwrResult {
                periods: Vec::new(),
                value: 0.0,
                warnings: Vec::new(),
            };
        }

        let break_dates: BTreeSet<NaiveDate> = self
            .ledger
            .transactions_between(begin, end)
            .iter()
            .map(|t| t.date())
            .collect();

        let mut warnings = Vec::new();
        let mut periods = Vec::with_capacity(break_dates.len() + 1);

        let seed = self.portfolio_value(begin, Cutoff::Open);
        warnings.extend(seed.warnings);
        let mut previous_value = seed.value;
        let mut previous_date = begin;

        for date in break_dates {
            if date == previous_date {
                continue;
            }
            let period = self.period(previous_date, date, previous_value, &mut warnings);
            previous_date = date;
            previous_value = period.end_value;
            periods.push(period);
        }

        if previous_date != end {
            let period = self.period(previous_date, end, previous_value, &mut warnings);
            periods.push(period);
        }

        let value = compound(periods.iter().map(|p| p.growth_factor));

        tracing::debug!(
            %begin,
            %end,
            periods = periods.len(),
            twr = value,
            "time-weighted return computed"
        );

        TwrResult {
            periods,
            value,
            warnings,
        }
    }

    fn period(
        &self,
        start: NaiveDate,
        end: NaiveDate,
        begin_value: f64,
        warnings: &mut Vec<CalcWarning>,
    ) -> TwrPeriod {
        let current = self.portfolio_value(end, Cutoff::Close);
        warnings.extend(current.warnings);
        let end_value = current.value;
        let cash_flow = self.ledger.cash_flow_between(start, end);
        let gain_loss = end_value - begin_value - cash_flow;

        let (growth_factor, period_return, zero_basis) = if begin_value != 0.0 {
            let growth = (end_value - cash_flow) / begin_value;
            (growth, growth - 1.0, false)
        } else {
            tracing::warn!(%start, %end, "period starts from zero value, growth set to 1");
            warnings.push(CalcWarning::DivisionByZero { start, end });
            (1.0, 0.0, true)
        };

        TwrPeriod {
            start_date: start,
            end_date: end,
            growth_factor,
            period_return,
            begin_value,
            end_value,
            cash_flow,
            gain_loss,
            zero_basis,
        }
    }

    pub fn calculate_mwr(&self, from: NaiveDate, to: NaiveDate) -> MwrResult {
        let mut warnings = Vec::new();

        let cash_flow = self.ledger.cash_flow_between(from, to);
        let initial = self.portfolio_value(from, Cutoff::Open);
        let final_ = self.portfolio_value(to, Cutoff::Close);
        warnings.extend(initial.warnings);
        warnings.extend(final_.warnings);

        let initial_value = initial.value;
        let final_value = final_.value;
        let gain_loss = final_value - initial_value - cash_flow;

        let (mwr, degenerate) = if initial_value != 0.0 {
            ((final_value - cash_flow) / initial_value - 1.0, false)
        } else {
            tracing::warn!(%from, %to, "initial value is zero, money-weighted return reported as 0");
            warnings.push(CalcWarning::DivisionByZero {
                start: from,
                end: to,
            });
            (0.0, true)
        };

        MwrResult {
            from,
            to,
            mwr,
            initial_value,
            final_value,
            cash_flow,
            gain_loss,
            degenerate,
            warnings,
        }
    }
}
