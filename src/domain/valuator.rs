//! Monetary value of a set of holdings at a date.
//!
//! One bad symbol never fails the whole valuation: a missing price is
//! reported as a warning and an undefined (NaN) price contributes nothing.

use chrono::NaiveDate;

use super::error::CalcWarning;
use super::ledger::Holdings;
use super::price::PriceField;
use super::price_oracle::PriceLookup;

#[derive(Debug, Clone, PartialEq)]
pub struct Valuation {
    pub value: f64,
    pub warnings: Vec<CalcWarning>,
}

pub fn value_at(
    prices: &dyn PriceLookup,
    holdings: &Holdings,
    date: NaiveDate,
    field: PriceField,
) -> Valuation {
    let mut value = 0.0;
    let mut warnings = Vec::new();

    for (symbol, &quantity) in holdings {
        match prices.price_at(symbol, date, field) {
            Ok(price) if price.is_nan() => {
                tracing::debug!(%symbol, %date, "undefined price, skipping");
            }
            Ok(price) => value += quantity * price,
            Err(e) => {
                tracing::warn!("{e}");
                warnings.push(CalcWarning::PriceNotFound(e));
            }
        }
    }

    Valuation { value, warnings }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::error::MissingPrice;
    use crate::domain::price::PriceTable;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn holdings(entries: &[(&str, f64)]) -> Holdings {
        entries.iter().map(|(s, q)| (s.to_string(), *q)).collect()
    }

    fn prices() -> PriceTable {
        let mut table = PriceTable::new();
        table.insert("AAPL", PriceField::Close, d(2023, 6, 1), 180.0);
        table.insert("AAPL", PriceField::Open, d(2023, 6, 1), 177.0);
        table.insert("MSFT", PriceField::Close, d(2023, 6, 1), 330.0);
        table.insert("BAD", PriceField::Close, d(2023, 6, 1), f64::NAN);
        table
    }

    #[test]
    fn sums_quantity_times_price() {
        let v = value_at(
            &prices(),
            &holdings(&[("AAPL", 10.0), ("MSFT", 2.0)]),
            d(2023, 6, 1),
            PriceField::Close,
        );
        assert_eq!(v.value, 10.0 * 180.0 + 2.0 * 330.0);
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn uses_requested_field() {
        let v = value_at(&prices(), &holdings(&[("AAPL", 1.0)]), d(2023, 6, 1), PriceField::Open);
        assert_eq!(v.value, 177.0);
    }

    #[test]
    fn nan_price_contributes_nothing_silently() {
        let v = value_at(
            &prices(),
            &holdings(&[("AAPL", 1.0), ("BAD", 50.0)]),
            d(2023, 6, 1),
            PriceField::Close,
        );
        assert_eq!(v.value, 180.0);
        assert!(v.warnings.is_empty());
    }

    #[test]
    fn missing_price_is_reported_not_fatal() {
        let v = value_at(
            &prices(),
            &holdings(&[("AAPL", 1.0), ("TSLA", 3.0)]),
            d(2023, 6, 1),
            PriceField::Close,
        );
        assert_eq!(v.value, 180.0);
        assert_eq!(v.warnings.len(), 1);
        match &v.warnings[0] {
            CalcWarning::PriceNotFound(e) => {
                assert_eq!(e.symbol, "TSLA");
                assert_eq!(e.missing, MissingPrice::Symbol);
            }
            other => panic!("unexpected warning {other:?}"),
        }
    }

    #[test]
    fn weekend_yields_zero_with_warnings() {
        // 2023-06-03 is a Saturday
        let v = value_at(
            &prices(),
            &holdings(&[("AAPL", 1.0), ("MSFT", 1.0)]),
            d(2023, 6, 3),
            PriceField::Close,
        );
        assert_eq!(v.value, 0.0);
        assert_eq!(v.warnings.len(), 2);
    }

    #[test]
    fn empty_holdings_value_zero() {
        let v = value_at(&prices(), &Holdings::new(), d(2023, 6, 1), PriceField::Close);
        assert_eq!(v.value, 0.0);
        assert!(v.warnings.is_empty());
    }
}
