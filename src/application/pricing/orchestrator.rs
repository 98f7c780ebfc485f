// src/application/pricing/orchestrator.rs
// Combines the price signals into one bounded move per tick

use rand::Rng;
use std::sync::Arc;

use crate::application::pricing::affinity::SectorAffinityTable;
use crate::application::pricing::signals::{InfluenceSignal, MomentumSignal, NoiseSignal, TechnicalSignal};
use crate::domain::errors::{PricingError, PricingResult};
use crate::domain::influence::MarketInfluenceState;
use crate::domain::models::{InstrumentSnapshot, MIN_PRICE};
use crate::domain::service::{DampeningStrategy, NoDampening};

// Fixed signal weights
const INFLUENCE_WEIGHT: f64 = 0.4;
const TECHNICAL_WEIGHT: f64 = 0.2;
const NOISE_WEIGHT: f64 = 0.2;
const MOMENTUM_WEIGHT: f64 = 0.2;

/// Largest fractional move allowed in one tick
pub const MAX_TICK_MOVE: f64 = 0.20;

// Mean reversion
const MEAN_REVERSION_WINDOW: usize = 50;
const MEAN_REVERSION_TRIGGER: f64 = 0.5;
const MEAN_REVERSION_PULL: f64 = 0.05;

/// Breakdown of one price computation
#[derive(Debug, Clone, PartialEq)]
pub struct PriceUpdate {
    pub symbol: String,
    pub influence: f64,
    pub technical: f64,
    pub momentum: f64,
    pub noise: f64,
    /// Weighted, volatility-scaled impact before dampening
    pub raw_impact: f64,
    pub dampening_factor: f64,
    /// Impact after dampening and clamping
    pub applied_impact: f64,
    /// Price before mean reversion
    pub unreverted_price: f64,
    pub new_price: f64,
    pub mean_reverted: bool,
}

/// Computes the next price of an instrument from market influences and its own history
pub struct PriceUpdateOrchestrator {
    influence_signal: InfluenceSignal,
    technical_signal: TechnicalSignal,
    momentum_signal: MomentumSignal,
    noise_signal: NoiseSignal,
    dampening: Arc<dyn DampeningStrategy>,
}

impl Default for PriceUpdateOrchestrator {
    fn default() -> Self {
        Self::new()
    }
}

impl PriceUpdateOrchestrator {
    /// Orchestrator with the standard sector table and no dampening
    pub fn new() -> Self {
        Self {
            influence_signal: InfluenceSignal::new(SectorAffinityTable::standard()),
            technical_signal: TechnicalSignal,
            momentum_signal: MomentumSignal,
            noise_signal: NoiseSignal,
            dampening: Arc::new(NoDampening),
        }
    }

    pub fn with_affinity(mut self, affinity: SectorAffinityTable) -> Self {
        self.influence_signal = InfluenceSignal::new(affinity);
        self
    }

    pub fn with_dampening(mut self, dampening: Arc<dyn DampeningStrategy>) -> Self {
        self.dampening = dampening;
        self
    }

    /// Next price using the thread-local RNG
    pub fn calculate_new_price(
        &self,
        instrument: &InstrumentSnapshot,
        influences: &[MarketInfluenceState],
    ) -> PricingResult<f64> {
        self.calculate_new_price_with_rng(instrument, influences, &mut rand::thread_rng())
    }

    pub fn calculate_new_price_with_rng<R: Rng + ?Sized>(
        &self,
        instrument: &InstrumentSnapshot,
        influences: &[MarketInfluenceState],
        rng: &mut R,
    ) -> PricingResult<f64> {
        self.calculate_price_update(instrument, influences, rng)
            .map(|update| update.new_price)
    }

    /// Full computation, keeping every intermediate value
    pub fn calculate_price_update<R: Rng + ?Sized>(
        &self,
        instrument: &InstrumentSnapshot,
        influences: &[MarketInfluenceState],
        rng: &mut R,
    ) -> PricingResult<PriceUpdate> {
        let current_price = instrument.current_price;
        if !(current_price > 0.0 && current_price.is_finite()) {
            return Err(PricingError::ComputationDegenerate {
                symbol: instrument.symbol.clone(),
                price: current_price,
            });
        }

        let influence = self.influence_signal.compute(instrument, influences);
        let technical = self.technical_signal.compute(instrument);
        let momentum = self.momentum_signal.compute(instrument);
        let noise = self.noise_signal.compute(rng);

        let raw_impact = (INFLUENCE_WEIGHT * influence
            + TECHNICAL_WEIGHT * technical
            + NOISE_WEIGHT * noise
            + MOMENTUM_WEIGHT * momentum)
            * (1.0 + instrument.volatility_rating);

        let mut impact = raw_impact;
        let dampening_factor = self.dampening.dampening_factor(instrument, impact);
        if dampening_factor < 1.0 {
            impact *= dampening_factor.max(0.0);
            log::debug!(
                "{}: impact {:+.4} dampened by {:.3} to {:+.4}",
                instrument.symbol,
                raw_impact,
                dampening_factor,
                impact
            );
        }

        let applied_impact = if impact.is_finite() {
            impact.clamp(-MAX_TICK_MOVE, MAX_TICK_MOVE)
        } else {
            0.0
        };
        let unreverted_price = (current_price * (1.0 + applied_impact)).max(MIN_PRICE);

        let (new_price, mean_reverted) = Self::apply_mean_reversion(instrument, unreverted_price);

        log::debug!(
            "{}: influence {:+.4} technical {:+.4} momentum {:+.4} noise {:+.4} -> {:.4} => {:.4}",
            instrument.symbol,
            influence,
            technical,
            momentum,
            noise,
            applied_impact,
            new_price
        );

        Ok(PriceUpdate {
            symbol: instrument.symbol.clone(),
            influence,
            technical,
            momentum,
            noise,
            raw_impact,
            dampening_factor,
            applied_impact,
            unreverted_price,
            new_price,
            mean_reverted,
        })
    }

    /// Pull extreme deviations from the long-run average partway back
    fn apply_mean_reversion(instrument: &InstrumentSnapshot, price: f64) -> (f64, bool) {
        let history = &instrument.price_history;
        if history.len() < MEAN_REVERSION_WINDOW {
            return (price, false);
        }

        let skip = history.len() - MEAN_REVERSION_WINDOW;
        let average = history.iter().skip(skip).sum::<f64>() / MEAN_REVERSION_WINDOW as f64;
        if average <= 0.0 {
            return (price, false);
        }

        let deviation = (price - average) / average;
        if deviation.abs() <= MEAN_REVERSION_TRIGGER {
            return (price, false);
        }

        let reverted = (price - (price - average) * MEAN_REVERSION_PULL).max(MIN_PRICE);
        (reverted, true)
    }
}
