// src/application/pricing/signals.rs
// Signal generators combined by the price orchestrator

use rand::Rng;
use rand_distr::StandardNormal;
use std::collections::VecDeque;
use ta::indicators::{Maximum, Minimum, SimpleMovingAverage};
use ta::Next;

use crate::application::pricing::affinity::SectorAffinityTable;
use crate::domain::influence::MarketInfluenceState;
use crate::domain::models::InstrumentSnapshot;

// Technical signal parameters
const SUPPORT_RESISTANCE_WINDOW: usize = 20;
const RESISTANCE_BAND: f64 = 0.95;
const SUPPORT_BAND: f64 = 1.05;
const SUPPORT_RESISTANCE_PUSH: f64 = 0.02;
const SHORT_MA_PERIOD: usize = 5;
const LONG_MA_PERIOD: usize = 10;
const MA_TREND_SCALE: f64 = 0.5;
const VOLUME_SURGE_THRESHOLD: f64 = 1_000_000.0;
const VOLUME_PUSH: f64 = 0.01;

// Momentum parameters
const MOMENTUM_DECAY: f64 = 0.95;
const MOMENTUM_SCALE: f64 = 0.3;

// Noise parameters
const NOISE_SCALE: f64 = 0.02 * 0.5;
const FAT_TAIL_PROBABILITY: f64 = 0.01;
const FAT_TAIL_MIN: f64 = 2.0;
const FAT_TAIL_MAX: f64 = 5.0;

/// Last `n` points of the history, oldest first
fn tail(history: &VecDeque<f64>, n: usize) -> Vec<f64> {
    let skip = history.len().saturating_sub(n);
    history.iter().skip(skip).copied().collect()
}

/// Simple moving average over the last `period` values
fn simple_moving_average(values: &[f64], period: usize) -> Option<f64> {
    if period == 0 || values.len() < period {
        return None;
    }

    let mut sma = SimpleMovingAverage::new(period).ok()?;
    let start = values.len() - period;
    values[start..].iter().fold(None, |_, &price| Some(sma.next(price)))
}

/// Highest and lowest value of a non-empty window
fn window_extremes(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }

    let mut maximum = Maximum::new(values.len()).ok()?;
    let mut minimum = Minimum::new(values.len()).ok()?;
    let mut extremes = None;
    for &price in values {
        extremes = Some((maximum.next(price), minimum.next(price)));
    }
    extremes
}

/// Aggregate, sector-adjusted impact of the macro factors
#[derive(Debug, Clone, Default)]
pub struct InfluenceSignal {
    affinity: SectorAffinityTable,
}

impl InfluenceSignal {
    pub fn new(affinity: SectorAffinityTable) -> Self {
        Self { affinity }
    }

    /// Weighted average of each factor's impact; 0 without influences.
    pub fn compute(&self, instrument: &InstrumentSnapshot, influences: &[MarketInfluenceState]) -> f64 {
        let volatility_boost = 1.0 + instrument.volatility_rating * 0.2;

        let (weighted_sum, total_weight) = influences.iter().fold((0.0, 0.0), |(sum, total), influence| {
            let factor = influence.factor();
            let weight = factor.base_weight()
                * self.affinity.multiplier(instrument.sector, factor.name())
                * volatility_boost;
            (sum + influence.calculate_impact() * weight, total + weight)
        });

        if total_weight <= 0.0 {
            return 0.0;
        }
        weighted_sum / total_weight
    }
}

/// Support/resistance, moving-average trend and volume surge, averaged
#[derive(Debug, Clone, Copy, Default)]
pub struct TechnicalSignal;

impl TechnicalSignal {
    pub fn compute(&self, instrument: &InstrumentSnapshot) -> f64 {
        if instrument.price_history.is_empty() {
            return 0.0;
        }

        (self.support_resistance(instrument) + self.moving_average_trend(instrument) + self.volume_surge(instrument))
            / 3.0
    }

    /// Pushes down near the recent high and up near the recent low
    pub fn support_resistance(&self, instrument: &InstrumentSnapshot) -> f64 {
        let window = tail(&instrument.price_history, SUPPORT_RESISTANCE_WINDOW);
        let Some((recent_high, recent_low)) = window_extremes(&window) else {
            return 0.0;
        };

        let price = instrument.current_price;
        if price > RESISTANCE_BAND * recent_high {
            -SUPPORT_RESISTANCE_PUSH
        } else if price < SUPPORT_BAND * recent_low {
            SUPPORT_RESISTANCE_PUSH
        } else {
            0.0
        }
    }

    /// Relative gap between the short and long moving averages
    pub fn moving_average_trend(&self, instrument: &InstrumentSnapshot) -> f64 {
        if instrument.price_history.len() < LONG_MA_PERIOD {
            return 0.0;
        }

        let window = tail(&instrument.price_history, LONG_MA_PERIOD);
        match (
            simple_moving_average(&window, SHORT_MA_PERIOD),
            simple_moving_average(&window, LONG_MA_PERIOD),
        ) {
            (Some(short_ma), Some(long_ma)) if long_ma > 0.0 => (short_ma - long_ma) / long_ma * MA_TREND_SCALE,
            _ => 0.0,
        }
    }

    /// Heavy trading reinforces the direction of the last move
    pub fn volume_surge(&self, instrument: &InstrumentSnapshot) -> f64 {
        if instrument.daily_volume <= VOLUME_SURGE_THRESHOLD {
            return 0.0;
        }

        let last_return = instrument.last_return();
        if last_return > 0.0 {
            VOLUME_PUSH
        } else if last_return < 0.0 {
            -VOLUME_PUSH
        } else {
            0.0
        }
    }
}

/// Decayed continuation of the last return
#[derive(Debug, Clone, Copy, Default)]
pub struct MomentumSignal;

impl MomentumSignal {
    pub fn compute(&self, instrument: &InstrumentSnapshot) -> f64 {
        instrument.last_return() * MOMENTUM_DECAY * MOMENTUM_SCALE
    }
}

/// Gaussian shock with rare fat tails
#[derive(Debug, Clone, Copy, Default)]
pub struct NoiseSignal;

impl NoiseSignal {
    pub fn compute<R: Rng + ?Sized>(&self, rng: &mut R) -> f64 {
        let shock: f64 = rng.sample::<f64, _>(StandardNormal) * NOISE_SCALE;

        if rng.gen_bool(FAT_TAIL_PROBABILITY) {
            shock * rng.gen_range(FAT_TAIL_MIN..=FAT_TAIL_MAX)
        } else {
            shock
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::influence::{factor_names, MarketFactor};
    use crate::domain::models::Sector;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::sync::Arc;

    fn influence(name: &str, weight: f64, volatility: f64, value: f64, intensity: f64) -> MarketInfluenceState {
        let factor = Arc::new(MarketFactor::new(name, weight, volatility).unwrap());
        MarketInfluenceState::with_values(factor, value, intensity)
    }

    fn instrument_with_history(history: Vec<f64>) -> InstrumentSnapshot {
        InstrumentSnapshot::new("TEST", Sector::Other, 1.0, 0.0).with_history(history)
    }

    #[test]
    fn test_influence_signal_empty_is_zero() {
        let signal = InfluenceSignal::new(SectorAffinityTable::standard());
        let instrument = InstrumentSnapshot::new("TEST", Sector::Technology, 100.0, 0.5);
        assert_eq!(signal.compute(&instrument, &[]), 0.0);
    }

    #[test]
    fn test_influence_signal_single_factor_equals_its_impact() {
        let signal = InfluenceSignal::new(SectorAffinityTable::standard());
        let instrument = InstrumentSnapshot::new("TEST", Sector::Technology, 100.0, 0.5);
        let state = influence(factor_names::TECH_INNOVATION, 1.0, 0.5, 0.6, 0.8);

        assert_relative_eq!(signal.compute(&instrument, &[state.clone()]), state.calculate_impact(), epsilon = 1e-12);
    }

    #[test]
    fn test_influence_signal_weights_by_sector_affinity() {
        let table = SectorAffinityTable::new().with_multiplier(Sector::Energy, "OIL", 3.0);
        let signal = InfluenceSignal::new(table);
        let instrument = InstrumentSnapshot::new("OILX", Sector::Energy, 50.0, 0.0);

        let oil = influence("OIL", 1.0, 0.0, 1.0, 1.0); // impact 1.0, weight 3.0
        let rates = influence("RATES", 1.0, 0.0, -1.0, 1.0); // impact -1.0, weight 1.0

        assert_relative_eq!(signal.compute(&instrument, &[oil, rates]), 0.5, epsilon = 1e-12);
    }

    #[test]
    fn test_technical_signal_empty_history_is_zero() {
        let mut instrument = InstrumentSnapshot::new("TEST", Sector::Other, 10.0, 0.1);
        instrument.price_history.clear();
        assert_eq!(TechnicalSignal.compute(&instrument), 0.0);
    }

    #[test]
    fn test_resistance_near_recent_high() {
        let instrument = instrument_with_history(vec![90.0, 95.0, 100.0]);
        assert_eq!(TechnicalSignal.support_resistance(&instrument), -0.02);
    }

    #[test]
    fn test_support_near_recent_low() {
        let mut instrument = instrument_with_history(vec![100.0, 80.0, 60.0, 50.0]);
        instrument.current_price = 51.0;
        assert_eq!(TechnicalSignal.support_resistance(&instrument), 0.02);
    }

    #[test]
    fn test_support_resistance_neutral_mid_range() {
        let mut instrument = instrument_with_history(vec![100.0, 50.0, 75.0]);
        instrument.current_price = 75.0;
        assert_eq!(TechnicalSignal.support_resistance(&instrument), 0.0);
    }

    #[test]
    fn test_support_resistance_only_looks_at_last_twenty_points() {
        let mut history = vec![1_000.0];
        history.extend(std::iter::repeat(50.0).take(10));
        history.extend(std::iter::repeat(100.0).take(10));
        let mut instrument = instrument_with_history(history);
        instrument.current_price = 99.0;
        // high of the window is 100, not the old 1000
        assert_eq!(TechnicalSignal.support_resistance(&instrument), -0.02);
    }

    #[test]
    fn test_moving_average_trend_needs_ten_points() {
        let instrument = instrument_with_history((1..=9).map(|p| p as f64).collect());
        assert_eq!(TechnicalSignal.moving_average_trend(&instrument), 0.0);
    }

    #[test]
    fn test_moving_average_trend_rising() {
        let instrument = instrument_with_history((1..=10).map(|p| p as f64).collect());
        // short MA = 8.0, long MA = 5.5
        let expected = (8.0 - 5.5) / 5.5 * 0.5;
        assert_relative_eq!(TechnicalSignal.moving_average_trend(&instrument), expected, epsilon = 1e-12);
    }

    #[test]
    fn test_volume_surge_follows_last_return() {
        let base = InstrumentSnapshot::new("TEST", Sector::Other, 110.0, 0.1).with_previous_price(100.0);

        assert_eq!(TechnicalSignal.volume_surge(&base.clone().with_daily_volume(2_000_000.0)), 0.01);
        assert_eq!(TechnicalSignal.volume_surge(&base.clone().with_daily_volume(500_000.0)), 0.0);

        let falling = InstrumentSnapshot::new("TEST", Sector::Other, 90.0, 0.1)
            .with_previous_price(100.0)
            .with_daily_volume(2_000_000.0);
        assert_eq!(TechnicalSignal.volume_surge(&falling), -0.01);
    }

    #[test]
    fn test_momentum_signal() {
        let instrument = InstrumentSnapshot::new("TEST", Sector::Other, 110.0, 0.1).with_previous_price(100.0);
        assert_relative_eq!(MomentumSignal.compute(&instrument), 0.1 * 0.95 * 0.3, epsilon = 1e-12);
    }

    #[test]
    fn test_noise_is_small_on_average() {
        let mut rng = StdRng::seed_from_u64(42);
        let samples: Vec<f64> = (0..20_000).map(|_| NoiseSignal.compute(&mut rng)).collect();
        let mean = samples.iter().sum::<f64>() / samples.len() as f64;

        assert!(mean.abs() < 0.001);
        // 8 sigma of the base distribution times the largest fat-tail multiplier
        assert!(samples.iter().all(|s| s.abs() < 0.01 * 8.0 * 5.0));
    }
}
