// src/infrastructure/market/mod.rs
// In-memory instrument store

use parking_lot::{Mutex, RwLock};
use std::collections::HashMap;
use std::sync::Arc;

use crate::config::InstrumentConfig;
use crate::domain::errors::{PricingError, PricingResult};
use crate::domain::models::InstrumentSnapshot;

/// Holds the live state of every instrument.
///
/// Each instrument sits behind its own mutex, so pricing and fills for one
/// symbol are serialized while different symbols proceed independently.
pub struct InstrumentStore {
    instruments: RwLock<HashMap<String, Arc<Mutex<InstrumentSnapshot>>>>,
    history_capacity: usize,
}

impl InstrumentStore {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            instruments: RwLock::new(HashMap::new()),
            history_capacity: history_capacity.max(1),
        }
    }

    /// Store seeded from configured instruments
    pub fn from_config(instruments: &[InstrumentConfig], history_capacity: usize) -> Self {
        let store = Self::new(history_capacity);
        for config in instruments {
            store.insert(
                InstrumentSnapshot::new(
                    &config.symbol,
                    config.sector,
                    config.initial_price,
                    config.volatility_rating,
                )
                .with_shares_outstanding(config.shares_outstanding),
            );
        }
        store
    }

    pub fn history_capacity(&self) -> usize {
        self.history_capacity
    }

    /// Add or replace an instrument
    pub fn insert(&self, instrument: InstrumentSnapshot) {
        let symbol = instrument.symbol.clone();
        self.instruments
            .write()
            .insert(symbol, Arc::new(Mutex::new(instrument)));
    }

    /// Copy of the current state of an instrument
    pub fn get(&self, symbol: &str) -> PricingResult<InstrumentSnapshot> {
        Ok(self.entry(symbol)?.lock().clone())
    }

    pub fn symbols(&self) -> Vec<String> {
        let mut symbols: Vec<String> = self.instruments.read().keys().cloned().collect();
        symbols.sort();
        symbols
    }

    pub fn len(&self) -> usize {
        self.instruments.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.instruments.read().is_empty()
    }

    /// Run `f` with exclusive access to one instrument
    pub fn update<T, F>(&self, symbol: &str, f: F) -> PricingResult<T>
    where
        F: FnOnce(&mut InstrumentSnapshot) -> T,
    {
        let entry = self.entry(symbol)?;
        let mut instrument = entry.lock();
        Ok(f(&mut instrument))
    }

    /// Append a newly computed price, evicting history past the cap
    pub fn apply_price(&self, symbol: &str, new_price: f64) -> PricingResult<()> {
        let capacity = self.history_capacity;
        self.update(symbol, |instrument| instrument.apply_price_update(new_price, capacity))
    }

    pub fn record_volume(&self, symbol: &str, quantity: f64) -> PricingResult<()> {
        self.update(symbol, |instrument| instrument.record_volume(quantity))
    }

    /// Zero every instrument's daily volume
    pub fn reset_daily_volumes(&self) {
        for entry in self.instruments.read().values() {
            entry.lock().reset_daily_volume();
        }
    }

    fn entry(&self, symbol: &str) -> PricingResult<Arc<Mutex<InstrumentSnapshot>>> {
        self.instruments
            .read()
            .get(symbol)
            .cloned()
            .ok_or_else(|| PricingError::UnknownInstrument(symbol.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::Sector;

    fn store() -> InstrumentStore {
        let store = InstrumentStore::new(3);
        store.insert(InstrumentSnapshot::new("ACME", Sector::Industrial, 10.0, 0.2));
        store
    }

    #[test]
    fn test_unknown_instrument() {
        let store = store();
        assert_eq!(
            store.get("NOPE").unwrap_err(),
            PricingError::UnknownInstrument("NOPE".to_string())
        );
        assert!(store.apply_price("NOPE", 1.0).is_err());
    }

    #[test]
    fn test_history_evicts_oldest() {
        let store = store();
        for price in [11.0, 12.0, 13.0, 14.0] {
            store.apply_price("ACME", price).unwrap();
        }

        let acme = store.get("ACME").unwrap();
        assert_eq!(acme.price_history.iter().copied().collect::<Vec<_>>(), vec![12.0, 13.0, 14.0]);
        assert_eq!(acme.current_price, 14.0);
        assert_eq!(acme.previous_price, 13.0);
    }

    #[test]
    fn test_price_floor_on_apply() {
        let store = store();
        store.apply_price("ACME", 0.0).unwrap();
        assert_eq!(store.get("ACME").unwrap().current_price, 0.01);
    }

    #[test]
    fn test_volume_and_reset() {
        let store = store();
        store.record_volume("ACME", 5.0).unwrap();
        store.record_volume("ACME", -1.0).unwrap();
        assert_eq!(store.get("ACME").unwrap().daily_volume, 5.0);

        store.reset_daily_volumes();
        assert_eq!(store.get("ACME").unwrap().daily_volume, 0.0);
    }

    #[test]
    fn test_from_config() {
        let config = crate::config::MarketConfig::default();
        let store = InstrumentStore::from_config(&config.instruments, config.history_capacity);
        assert_eq!(store.len(), config.instruments.len());
        for instrument in &config.instruments {
            let snapshot = store.get(&instrument.symbol).unwrap();
            assert_eq!(snapshot.current_price, instrument.initial_price);
            assert_eq!(snapshot.market_cap(), instrument.initial_price * instrument.shares_outstanding);
        }
    }
}
