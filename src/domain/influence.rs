// src/domain/influence.rs
// Macro market factors and their evolving influence state

use chrono::{DateTime, Utc};
use rand::Rng;
use rand_distr::StandardNormal;
use std::collections::HashMap;
use std::sync::Arc;

use crate::domain::errors::{AppError, AppResult};

/// Chance per tick that a factor is hit by a major event
pub const MAJOR_EVENT_PROBABILITY: f64 = 0.001;

/// Largest per-tick intensity drift
const INTENSITY_STEP: f64 = 0.025;

/// Names of the factors shipped in the default catalog
pub mod factor_names {
    pub const INTEREST_RATES: &str = "INTEREST_RATES";
    pub const INFLATION: &str = "INFLATION";
    pub const GDP_GROWTH: &str = "GDP_GROWTH";
    pub const UNEMPLOYMENT: &str = "UNEMPLOYMENT";
    pub const OIL_PRICES: &str = "OIL_PRICES";
    pub const TECH_INNOVATION: &str = "TECH_INNOVATION";
    pub const CONSUMER_CONFIDENCE: &str = "CONSUMER_CONFIDENCE";
    pub const GEOPOLITICAL_TENSION: &str = "GEOPOLITICAL_TENSION";
    pub const HOUSING_DEMAND: &str = "HOUSING_DEMAND";
    pub const HEALTH_POLICY: &str = "HEALTH_POLICY";
}

/// A named macro driver such as interest rates
#[derive(Debug, Clone, PartialEq)]
pub struct MarketFactor {
    name: String,
    base_weight: f64,
    volatility: f64,
}

impl MarketFactor {
    pub fn new(name: &str, base_weight: f64, volatility: f64) -> AppResult<Self> {
        if !(base_weight > 0.0 && base_weight.is_finite()) {
            return Err(AppError::Config(format!(
                "Factor {} needs a positive base weight, got {}",
                name, base_weight
            )));
        }
        if !(0.0..=1.0).contains(&volatility) {
            return Err(AppError::Config(format!(
                "Factor {} volatility must be within [0, 1], got {}",
                name, volatility
            )));
        }

        Ok(Self {
            name: name.to_string(),
            base_weight,
            volatility,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn base_weight(&self) -> f64 {
        self.base_weight
    }

    pub fn volatility(&self) -> f64 {
        self.volatility
    }
}

/// Registry of the factors known to one engine
#[derive(Debug, Clone, Default)]
pub struct MarketFactorCatalog {
    factors: Vec<Arc<MarketFactor>>,
    by_name: HashMap<String, usize>,
}

impl MarketFactorCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog with the standard set of macro factors
    pub fn standard() -> AppResult<Self> {
        use factor_names::*;

        let mut catalog = Self::new();
        for (name, weight, volatility) in [
            (INTEREST_RATES, 1.2, 0.3),
            (INFLATION, 1.0, 0.4),
            (GDP_GROWTH, 1.1, 0.2),
            (UNEMPLOYMENT, 0.8, 0.3),
            (OIL_PRICES, 0.9, 0.6),
            (TECH_INNOVATION, 1.0, 0.5),
            (CONSUMER_CONFIDENCE, 0.9, 0.4),
            (GEOPOLITICAL_TENSION, 0.7, 0.7),
            (HOUSING_DEMAND, 0.8, 0.3),
            (HEALTH_POLICY, 0.6, 0.2),
        ] {
            catalog.register(MarketFactor::new(name, weight, volatility)?)?;
        }

        Ok(catalog)
    }

    pub fn register(&mut self, factor: MarketFactor) -> AppResult<()> {
        if self.by_name.contains_key(factor.name()) {
            return Err(AppError::Config(format!("Duplicate market factor: {}", factor.name())));
        }

        self.by_name.insert(factor.name().to_string(), self.factors.len());
        self.factors.push(Arc::new(factor));
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<Arc<MarketFactor>> {
        self.by_name.get(name).map(|&idx| self.factors[idx].clone())
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<MarketFactor>> {
        self.factors.iter()
    }

    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// One neutral influence state per registered factor
    pub fn initial_influences(&self) -> Vec<MarketInfluenceState> {
        self.factors
            .iter()
            .map(|factor| MarketInfluenceState::new(factor.clone()))
            .collect()
    }
}

/// Mutable state of one factor: where it stands, how strongly, and which way it moves
#[derive(Debug, Clone)]
pub struct MarketInfluenceState {
    factor: Arc<MarketFactor>,
    current_value: f64,
    intensity: f64,
    trend_direction: f64,
    last_updated: DateTime<Utc>,
}

impl MarketInfluenceState {
    pub fn new(factor: Arc<MarketFactor>) -> Self {
        Self::with_values(factor, 0.0, 0.5)
    }

    pub fn with_values(factor: Arc<MarketFactor>, value: f64, intensity: f64) -> Self {
        Self {
            factor,
            current_value: value.clamp(-1.0, 1.0),
            intensity: intensity.clamp(0.0, 1.0),
            trend_direction: 0.0,
            last_updated: Utc::now(),
        }
    }

    pub fn factor(&self) -> &MarketFactor {
        &self.factor
    }

    pub fn current_value(&self) -> f64 {
        self.current_value
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub fn trend_direction(&self) -> f64 {
        self.trend_direction
    }

    pub fn last_updated(&self) -> DateTime<Utc> {
        self.last_updated
    }

    pub fn is_neutral(&self) -> bool {
        self.current_value.abs() < 0.1
    }

    pub fn is_trending(&self) -> bool {
        self.trend_direction.abs() > 0.0
    }

    pub fn is_strong(&self) -> bool {
        self.intensity > 0.7
    }

    /// Set new value and intensity, clamped, and derive the trend from the change.
    pub fn update_influence(&mut self, new_value: f64, new_intensity: f64) {
        let new_value = if new_value.is_finite() { new_value.clamp(-1.0, 1.0) } else { self.current_value };
        let new_intensity = if new_intensity.is_finite() { new_intensity.clamp(0.0, 1.0) } else { self.intensity };

        self.trend_direction = (new_value - self.current_value).clamp(-1.0, 1.0);
        self.current_value = new_value;
        self.intensity = new_intensity;
        self.last_updated = Utc::now();
    }

    /// Small random walk scaled by the factor's volatility
    pub fn apply_random_fluctuation<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let value_step = self.factor.volatility() * 0.1;
        let value_delta = if value_step > 0.0 { rng.gen_range(-value_step..=value_step) } else { 0.0 };
        let intensity_delta = rng.gen_range(-INTENSITY_STEP..=INTENSITY_STEP);

        self.update_influence(self.current_value + value_delta, self.intensity + intensity_delta);
    }

    /// Gaussian shock well beyond the normal random-walk step, still clamped
    pub fn apply_major_event<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        let value_shock: f64 = rng.sample::<f64, _>(StandardNormal) * 0.5;
        let intensity_boost: f64 = rng.sample::<f64, _>(StandardNormal).abs() * 0.3;

        log::info!(
            "Major event on {}: value shock {:+.3}, intensity boost {:.3}",
            self.factor.name(),
            value_shock,
            intensity_boost
        );

        self.update_influence(self.current_value + value_shock, self.intensity + intensity_boost);
    }

    /// Roll for a major event; returns true when one fired.
    pub fn maybe_apply_major_event<R: Rng + ?Sized>(&mut self, rng: &mut R) -> bool {
        if rng.gen_bool(MAJOR_EVENT_PROBABILITY) {
            self.apply_major_event(rng);
            return true;
        }
        false
    }

    /// Signed impact of this factor on prices
    pub fn calculate_impact(&self) -> f64 {
        let volatility = self.factor.volatility();
        self.factor.base_weight()
            * self.current_value
            * self.intensity
            * (1.0 + volatility * self.intensity * 0.5)
    }
}
