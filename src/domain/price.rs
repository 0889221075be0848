//! Historical price observations.

use chrono::NaiveDate;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use super::error::{MissingPrice, PriceNotFound};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum PriceField {
    Open,
    Close,
}

impl PriceField {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceField::Open => "open",
            PriceField::Close => "close",
        }
    }
}

impl fmt::Display for PriceField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PriceField {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "open" => Ok(PriceField::Open),
            "close" => Ok(PriceField::Close),
            other => Err(format!("unknown price field '{other}' (expected open or close)")),
        }
    }
}

/// Materialized result of one provider fetch: symbol -> field -> date -> price.
///
/// Prices may be NaN where the source had a row but no usable value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PriceTable {
    series: HashMap<String, HashMap<PriceField, BTreeMap<NaiveDate, f64>>>,
}

impl PriceTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, symbol: &str, field: PriceField, date: NaiveDate, price: f64) {
        self.series
            .entry(symbol.to_string())
            .or_default()
            .entry(field)
            .or_default()
            .insert(date, price);
    }

    pub fn contains_symbol(&self, symbol: &str) -> bool {
        self.series.contains_key(symbol)
    }

    pub fn symbol_count(&self) -> usize {
        self.series.len()
    }

    pub fn observation_count(&self) -> usize {
        self.series
            .values()
            .flat_map(|fields| fields.values())
            .map(|dates| dates.len())
            .sum()
    }

    /// Every stored `(symbol, field, date, price)`, in no particular order.
    pub fn observations(&self) -> impl Iterator<Item = (&str, PriceField, NaiveDate, f64)> + '_ {
        self.series.iter().flat_map(|(symbol, fields)| {
            fields.iter().flat_map(move |(field, dates)| {
                dates
                    .iter()
                    .map(move |(date, price)| (symbol.as_str(), *field, *date, *price))
            })
        })
    }

    pub fn get(&self, symbol: &str, field: PriceField, date: NaiveDate) -> Result<f64, PriceNotFound> {
        let missing = |missing| PriceNotFound {
            symbol: symbol.to_string(),
            date,
            field,
            missing,
        };

        let fields = self
            .series
            .get(symbol)
            .ok_or_else(|| missing(MissingPrice::Symbol))?;
        let dates = fields
            .get(&field)
            .ok_or_else(|| missing(MissingPrice::Field))?;
        dates
            .get(&date)
            .copied()
            .ok_or_else(|| missing(MissingPrice::Date))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn sample_table() -> PriceTable {
        let mut table = PriceTable::new();
        table.insert("AAPL", PriceField::Close, d(2023, 1, 3), 125.07);
        table.insert("AAPL", PriceField::Open, d(2023, 1, 3), 130.28);
        table.insert("MSFT", PriceField::Close, d(2023, 1, 3), 239.58);
        table
    }

    #[test]
    fn get_returns_stored_price() {
        let table = sample_table();
        assert_eq!(table.get("AAPL", PriceField::Close, d(2023, 1, 3)), Ok(125.07));
        assert_eq!(table.get("AAPL", PriceField::Open, d(2023, 1, 3)), Ok(130.28));
    }

    #[test]
    fn get_distinguishes_missing_symbol_field_and_date() {
        let table = sample_table();

        let err = table.get("TSLA", PriceField::Close, d(2023, 1, 3)).unwrap_err();
        assert_eq!(err.missing, MissingPrice::Symbol);

        let err = table.get("MSFT", PriceField::Open, d(2023, 1, 3)).unwrap_err();
        assert_eq!(err.missing, MissingPrice::Field);

        // Saturday
        let err = table.get("AAPL", PriceField::Close, d(2023, 1, 7)).unwrap_err();
        assert_eq!(err.missing, MissingPrice::Date);
        assert_eq!(err.symbol, "AAPL");
    }

    #[test]
    fn nan_is_stored_not_dropped() {
        let mut table = PriceTable::new();
        table.insert("AAPL", PriceField::Close, d(2023, 1, 3), f64::NAN);
        assert!(table.get("AAPL", PriceField::Close, d(2023, 1, 3)).unwrap().is_nan());
    }

    #[test]
    fn counts() {
        let table = sample_table();
        assert_eq!(table.symbol_count(), 2);
        assert_eq!(table.observation_count(), 3);
        assert!(table.contains_symbol("MSFT"));
        assert!(!table.contains_symbol("TSLA"));
    }

    #[test]
    fn observations_lists_every_entry() {
        let table = sample_table();
        let mut seen: Vec<(String, NaiveDate)> = table
            .observations()
            .map(|(symbol, _, date, _)| (symbol.to_string(), date))
            .collect();
        seen.sort();
        assert_eq!(seen.len(), table.observation_count());
        assert_eq!(seen[0].0, "AAPL");
    }

    #[test]
    fn price_field_parse() {
        assert_eq!("Close".parse::<PriceField>(), Ok(PriceField::Close));
        assert_eq!(" open ".parse::<PriceField>(), Ok(PriceField::Open));
        assert!("adj".parse::<PriceField>().is_err());
        assert_eq!(PriceField::Open.to_string(), "open");
    }
}
