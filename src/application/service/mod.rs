// src/application/service/mod.rs
// Market engine: the single owner of pricing and trading state

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use rand::SeedableRng;
use std::sync::Arc;

use crate::application::pricing::{PriceUpdate, PriceUpdateOrchestrator, SectorAffinityTable};
use crate::application::trading::TradingEconomicsEvaluator;
use crate::application::usecase::{update_market_influences, InfluenceTickSummary};
use crate::config::Config;
use crate::domain::errors::{AppResult, PricingResult, TradingResult};
use crate::domain::influence::{MarketFactorCatalog, MarketInfluenceState};
use crate::domain::models::{InstrumentSnapshot, OrderFill, OrderRequest};
use crate::infrastructure::risk::PriceThresholdController;

/// Owns the factor catalog, influence states, dampening controller and
/// order evaluator. One per process.
pub struct MarketEngine {
    catalog: MarketFactorCatalog,
    influences: Mutex<Vec<MarketInfluenceState>>,
    orchestrator: PriceUpdateOrchestrator,
    controller: Arc<PriceThresholdController>,
    evaluator: TradingEconomicsEvaluator,
    rng: Mutex<StdRng>,
}

impl MarketEngine {
    pub fn new(config: &Config) -> AppResult<Self> {
        Self::with_catalog(config, MarketFactorCatalog::standard()?)
    }

    pub fn with_catalog(config: &Config, catalog: MarketFactorCatalog) -> AppResult<Self> {
        config.validate()?;

        let controller = Arc::new(PriceThresholdController::new(config.threshold.clone()));
        let orchestrator = PriceUpdateOrchestrator::new()
            .with_affinity(SectorAffinityTable::standard())
            .with_dampening(controller.clone());
        let evaluator = TradingEconomicsEvaluator::new(config.trading.clone())?;

        let rng = match config.market.seed {
            Some(seed) => {
                log::info!("Market engine seeded with {}", seed);
                StdRng::seed_from_u64(seed)
            }
            None => StdRng::from_entropy(),
        };

        Ok(Self {
            influences: Mutex::new(catalog.initial_influences()),
            catalog,
            orchestrator,
            controller,
            evaluator,
            rng: Mutex::new(rng),
        })
    }

    pub fn catalog(&self) -> &MarketFactorCatalog {
        &self.catalog
    }

    pub fn controller(&self) -> &Arc<PriceThresholdController> {
        &self.controller
    }

    pub fn evaluator(&self) -> &TradingEconomicsEvaluator {
        &self.evaluator
    }

    /// Advance every market factor by one tick
    pub fn update_market_influences(&self) -> InfluenceTickSummary {
        let mut influences = self.influences.lock();
        let mut rng = self.rng.lock();
        update_market_influences(&mut influences, &mut *rng)
    }

    pub fn influences_snapshot(&self) -> Vec<MarketInfluenceState> {
        self.influences.lock().clone()
    }

    /// Compute the next price of an instrument. The caller persists it.
    pub fn price_instrument(&self, instrument: &InstrumentSnapshot) -> PricingResult<PriceUpdate> {
        let influences = self.influences.lock();
        let mut rng = self.rng.lock();
        self.orchestrator
            .calculate_price_update(instrument, &influences, &mut *rng)
    }

    /// Make an instrument known to the dampening controller and the circuit breaker
    pub fn register_instrument(&self, instrument: &InstrumentSnapshot) {
        self.controller
            .record_initial_price(&instrument.symbol, instrument.current_price);
        self.evaluator
            .open_session(&instrument.symbol, instrument.current_price);
    }

    /// Evaluate an order; accepted fills feed the dampening controller's volume.
    pub fn submit_order(&self, order: &OrderRequest, instrument: &InstrumentSnapshot) -> TradingResult<OrderFill> {
        let fill = self.evaluator.evaluate(order, instrument)?;
        self.controller
            .record_trading_activity(&fill.symbol, fill.quantity);
        Ok(fill)
    }

    /// Same as [`submit_order`](Self::submit_order) for a buyer who reserved `budget`
    pub fn submit_order_within(
        &self,
        order: &OrderRequest,
        instrument: &InstrumentSnapshot,
        budget: Decimal,
    ) -> TradingResult<OrderFill> {
        let fill = self.evaluator.evaluate_within(order, instrument, budget)?;
        self.controller
            .record_trading_activity(&fill.symbol, fill.quantity);
        Ok(fill)
    }

    pub fn reset_trading_activity(&self) {
        self.controller.reset_trading_activity();
    }

    pub fn start_new_session(&self) {
        self.evaluator.start_new_session();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::pricing::MAX_TICK_MOVE;
    use crate::domain::errors::TradingError;
    use crate::domain::models::{OrderSide, Sector, MIN_PRICE};

    fn seeded_config() -> Config {
        let mut config = Config::default();
        config.market.seed = Some(11);
        config
    }

    #[test]
    fn test_engine_starts_with_one_influence_per_factor() {
        let engine = MarketEngine::new(&seeded_config()).unwrap();
        assert_eq!(engine.influences_snapshot().len(), engine.catalog().len());
        assert!(engine.influences_snapshot().iter().all(|i| i.current_value() == 0.0));
    }

    #[test]
    fn test_priced_moves_are_bounded() {
        let engine = MarketEngine::new(&seeded_config()).unwrap();
        let mut instrument = InstrumentSnapshot::new("TECH", Sector::Technology, 50.0, 1.0);
        engine.register_instrument(&instrument);

        for _ in 0..500 {
            engine.update_market_influences();
            let update = engine.price_instrument(&instrument).unwrap();
            assert!(update.new_price >= MIN_PRICE);
            assert!(update.applied_impact.abs() <= MAX_TICK_MOVE);
            instrument.apply_price_update(update.new_price, 1_000);
        }
    }

    #[test]
    fn test_same_seed_same_prices() {
        let a = MarketEngine::new(&seeded_config()).unwrap();
        let b = MarketEngine::new(&seeded_config()).unwrap();
        let instrument = InstrumentSnapshot::new("OILX", Sector::Energy, 80.0, 0.4);

        for _ in 0..20 {
            a.update_market_influences();
            b.update_market_influences();
            assert_eq!(
                a.price_instrument(&instrument).unwrap(),
                b.price_instrument(&instrument).unwrap()
            );
        }
    }

    #[test]
    fn test_fills_feed_controller_volume() {
        let engine = MarketEngine::new(&seeded_config()).unwrap();
        let instrument = InstrumentSnapshot::new("BANK", Sector::Finance, 40.0, 0.2);
        engine.register_instrument(&instrument);

        let order = OrderRequest::market("alice", "BANK", OrderSide::Buy, 25.0);
        engine.submit_order(&order, &instrument).unwrap();
        assert_eq!(engine.controller().get_trading_activity("BANK"), 25.0);

        // Rejected by the cooldown: no volume recorded
        let again = OrderRequest::market("alice", "BANK", OrderSide::Buy, 5.0);
        assert!(matches!(
            engine.submit_order(&again, &instrument),
            Err(TradingError::RateLimitExceeded(_))
        ));
        assert_eq!(engine.controller().get_trading_activity("BANK"), 25.0);

        engine.reset_trading_activity();
        assert_eq!(engine.controller().get_trading_activity("BANK"), 0.0);
        assert_eq!(engine.controller().get_initial_price("BANK"), Some(40.0));
    }

    #[test]
    fn test_degenerate_instrument_rejected() {
        let engine = MarketEngine::new(&seeded_config()).unwrap();
        let mut instrument = InstrumentSnapshot::new("BAD", Sector::Other, 1.0, 0.1);
        instrument.current_price = f64::NAN;
        assert!(engine.price_instrument(&instrument).is_err());
    }
}
