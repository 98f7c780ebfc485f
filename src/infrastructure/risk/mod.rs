// src/infrastructure/risk/mod.rs
// Volume-keyed price dampening

use parking_lot::RwLock;
use std::collections::HashMap;

use crate::config::PriceThresholdConfig;
use crate::domain::models::InstrumentSnapshot;
use crate::domain::service::DampeningStrategy;

#[derive(Debug, Clone, Default)]
struct SymbolThresholdState {
    /// First price seen for the symbol, never overwritten
    initial_price: Option<f64>,
    recent_trading_volume: f64,
}

/// Brakes oversized moves on instruments that have run far from their
/// first-seen price without the trading volume to back it.
pub struct PriceThresholdController {
    config: PriceThresholdConfig,
    states: RwLock<HashMap<String, SymbolThresholdState>>,
}

impl PriceThresholdController {
    pub fn new(config: PriceThresholdConfig) -> Self {
        Self {
            config,
            states: RwLock::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &PriceThresholdConfig {
        &self.config
    }

    /// Record the first-seen price; later calls are ignored.
    pub fn record_initial_price(&self, symbol: &str, price: f64) {
        if !(price > 0.0 && price.is_finite()) {
            log::warn!("Ignoring invalid initial price {} for {}", price, symbol);
            return;
        }

        let mut states = self.states.write();
        let state = states.entry(symbol.to_string()).or_default();
        if state.initial_price.is_none() {
            state.initial_price = Some(price);
        }
    }

    /// Accumulate traded volume for a symbol.
    pub fn record_trading_activity(&self, symbol: &str, volume: f64) {
        if !(volume > 0.0 && volume.is_finite()) {
            return;
        }

        let mut states = self.states.write();
        states.entry(symbol.to_string()).or_default().recent_trading_volume += volume;
    }

    /// Multiplier in [dampening_factor, 1.0] for a proposed fractional impact
    pub fn calculate_dampening_factor(&self, instrument: &InstrumentSnapshot, proposed_impact: f64) -> f64 {
        if !self.config.enabled {
            return 1.0;
        }

        let (initial_price, volume) = self.observe(instrument);

        let price_multiplier = instrument.current_price / initial_price;
        if !(price_multiplier > self.config.price_multiplier_threshold) {
            return 1.0;
        }

        if proposed_impact.abs() <= self.config.max_change_percent {
            return 1.0;
        }

        let base = self.config.dampening_factor;
        let min_volume = self.config.min_volume_threshold;

        if volume >= min_volume {
            let volume_reduction = ((volume - min_volume) * self.config.volume_sensitivity / min_volume).min(1.0);
            let factor = base + (1.0 - base) * volume_reduction;
            log::debug!(
                "{}: {:.2}x initial price, impact {:+.4}, volume {} -> dampening {:.3}",
                instrument.symbol,
                price_multiplier,
                proposed_impact,
                volume,
                factor
            );
            factor
        } else {
            log::debug!(
                "{}: {:.2}x initial price on thin volume {} -> dampening {:.3}",
                instrument.symbol,
                price_multiplier,
                volume,
                base
            );
            base
        }
    }

    /// Initial price and recent volume, recording the initial price on first sight
    fn observe(&self, instrument: &InstrumentSnapshot) -> (f64, f64) {
        {
            let states = self.states.read();
            if let Some(SymbolThresholdState {
                initial_price: Some(initial),
                recent_trading_volume,
            }) = states.get(&instrument.symbol)
            {
                return (*initial, *recent_trading_volume);
            }
        }

        let mut states = self.states.write();
        let state = states.entry(instrument.symbol.clone()).or_default();
        let initial = *state.initial_price.get_or_insert(instrument.current_price);
        (initial, state.recent_trading_volume)
    }

    /// Current price relative to the recorded initial price
    pub fn get_price_multiplier(&self, symbol: &str, current_price: f64) -> Option<f64> {
        self.states
            .read()
            .get(symbol)
            .and_then(|state| state.initial_price)
            .map(|initial| current_price / initial)
    }

    pub fn get_initial_price(&self, symbol: &str) -> Option<f64> {
        self.states.read().get(symbol).and_then(|state| state.initial_price)
    }

    pub fn get_trading_activity(&self, symbol: &str) -> f64 {
        self.states
            .read()
            .get(symbol)
            .map(|state| state.recent_trading_volume)
            .unwrap_or(0.0)
    }

    /// Zero every volume counter, keeping initial prices.
    pub fn reset_trading_activity(&self) {
        let mut states = self.states.write();
        for state in states.values_mut() {
            state.recent_trading_volume = 0.0;
        }
        log::debug!("Reset trading activity for {} symbols", states.len());
    }

    /// Forget everything, including initial prices.
    pub fn clear(&self) {
        self.states.write().clear();
    }

    pub fn tracked_symbols(&self) -> Vec<String> {
        self.states.read().keys().cloned().collect()
    }
}

impl DampeningStrategy for PriceThresholdController {
    fn dampening_factor(&self, instrument: &InstrumentSnapshot, proposed_impact: f64) -> f64 {
        self.calculate_dampening_factor(instrument, proposed_impact)
    }
}
