//! Read-through price cache over a [`PricePort`].
//!
//! The cache covers one [`PriceScope`] (symbol set + inclusive date range)
//! and is populated whole on first lookup. Any scope change or explicit
//! invalidation throws the table away; there is no incremental merge.
//! Population happens under a write lock so concurrent callers never see a
//! half-filled table. Once populated, lookups only take the read lock long
//! enough to clone an `Arc`.

use chrono::NaiveDate;
use parking_lot::RwLock;
use std::collections::BTreeSet;
use std::sync::Arc;

use super::error::{MissingPrice, PriceNotFound};
use super::price::{PriceField, PriceTable};
use crate::ports::price_port::PricePort;

/// Anything that can answer "what was `symbol` worth on `date`".
pub trait PriceLookup {
    fn price_at(&self, symbol: &str, date: NaiveDate, field: PriceField) -> Result<f64, PriceNotFound>;
}

impl PriceLookup for PriceTable {
    fn price_at(&self, symbol: &str, date: NaiveDate, field: PriceField) -> Result<f64, PriceNotFound> {
        self.get(symbol, field, date)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PriceScope {
    pub symbols: BTreeSet<String>,
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl PriceScope {
    pub fn new(symbols: BTreeSet<String>, start: NaiveDate, end: NaiveDate) -> Self {
        Self { symbols, start, end }
    }
}

enum Cache {
    Empty,
    Ready(Arc<PriceTable>),
    Failed(String),
}

struct CacheState {
    scope: PriceScope,
    cache: Cache,
}

pub struct PriceOracle {
    port: Box<dyn PricePort>,
    state: RwLock<CacheState>,
}

impl PriceOracle {
    pub fn new(port: Box<dyn PricePort>, scope: PriceScope) -> Self {
        Self {
            port,
            state: RwLock::new(CacheState {
                scope,
                cache: Cache::Empty,
            }),
        }
    }

    pub fn scope(&self) -> PriceScope {
        self.state.read().scope.clone()
    }

    /// Switches to `scope`, dropping the cache if it differs from the
    /// current one.
    pub fn set_scope(&self, scope: PriceScope) {
        let mut state = self.state.write();
        if state.scope != scope {
            tracing::debug!(
                symbols = scope.symbols.len(),
                start = %scope.start,
                end = %scope.end,
                "price scope changed, invalidating cache"
            );
            state.scope = scope;
            state.cache = Cache::Empty;
        }
    }

    pub fn invalidate(&self) {
        self.state.write().cache = Cache::Empty;
    }

    pub fn is_populated(&self) -> bool {
        matches!(self.state.read().cache, Cache::Ready(_))
    }

    fn table(&self) -> Result<Arc<PriceTable>, MissingPrice> {
        {
            let state = self.state.read();
            match &state.cache {
                Cache::Ready(table) => return Ok(Arc::clone(table)),
                Cache::Failed(reason) => return Err(MissingPrice::Unavailable(reason.clone())),
                Cache::Empty => {}
            }
        }

        let mut state = self.state.write();
        // Another caller may have populated while we waited for the lock.
        if matches!(state.cache, Cache::Empty) {
            let cache = self.populate(&state.scope);
            state.cache = cache;
        }
        match &state.cache {
            Cache::Ready(table) => Ok(Arc::clone(table)),
            Cache::Failed(reason) => Err(MissingPrice::Unavailable(reason.clone())),
            Cache::Empty => Err(MissingPrice::Unavailable("cache not populated".into())),
        }
    }

    fn populate(&self, scope: &PriceScope) -> Cache {
        tracing::debug!(
            symbols = scope.symbols.len(),
            start = %scope.start,
            end = %scope.end,
            "populating price cache"
        );
        match self.port.fetch(&scope.symbols, scope.start, scope.end) {
            Ok(table) => {
                tracing::debug!(
                    symbols = table.symbol_count(),
                    observations = table.observation_count(),
                    "price cache populated"
                );
                Cache::Ready(Arc::new(table))
            }
            Err(e) => {
                tracing::warn!("price fetch failed: {e}");
                Cache::Failed(e.to_string())
            }
        }
    }
}

impl PriceLookup for PriceOracle {
    fn price_at(&self, symbol: &str, date: NaiveDate, field: PriceField) -> Result<f64, PriceNotFound> {
        let table = self.table().map_err(|missing| PriceNotFound {
            symbol: symbol.to_string(),
            date,
            field,
            missing,
        })?;
        table.get(symbol, field, date)
    }
}
