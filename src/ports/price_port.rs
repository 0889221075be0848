//! Historical price provider port.

use crate::domain::error::PerfolioError;
use crate::domain::price::PriceTable;
use chrono::NaiveDate;
use std::collections::BTreeSet;

/// A source of historical prices.
///
/// `fetch` is a one-shot, fully materializing call over the inclusive range
/// `[start, end]`. Symbols the source does not know are simply absent from
/// the returned table; an `Err` means the source itself failed.
pub trait PricePort: Send + Sync {
    fn fetch(
        &self,
        symbols: &BTreeSet<String>,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<PriceTable, PerfolioError>;
}
