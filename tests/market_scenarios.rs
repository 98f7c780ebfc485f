// tests/market_scenarios.rs
// End-to-end behaviour of pricing, dampening and order evaluation

use approx::assert_relative_eq;
use chrono::{Duration, Utc};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rust_decimal_macros::dec;
use std::sync::Arc;

use market_sim::application::pricing::{PriceUpdateOrchestrator, MAX_TICK_MOVE};
use market_sim::application::MarketEngine;
use market_sim::application::trading::TradingEconomicsEvaluator;
use market_sim::config::{Config, FeeConfig, FeeMode, PriceThresholdConfig, SlippageConfig, SlippageMode, TradingConfig};
use market_sim::domain::errors::TradingError;
use market_sim::domain::influence::{MarketFactorCatalog, MarketInfluenceState};
use market_sim::domain::models::{InstrumentSnapshot, OrderRequest, OrderSide, Sector, MIN_PRICE};
use market_sim::infrastructure::PriceThresholdController;

fn scenario_threshold() -> PriceThresholdConfig {
    PriceThresholdConfig {
        enabled: true,
        max_change_percent: 0.15,
        price_multiplier_threshold: 2.0,
        dampening_factor: 0.5,
        min_volume_threshold: 10.0,
        volume_sensitivity: 0.5,
    }
}

#[test]
fn empty_influences_never_fail() {
    let orchestrator = PriceUpdateOrchestrator::new();
    let mut rng = StdRng::seed_from_u64(5);
    let instrument = InstrumentSnapshot::new("TECH", Sector::Technology, 25.0, 0.3);

    for _ in 0..200 {
        let price = orchestrator
            .calculate_new_price_with_rng(&instrument, &[], &mut rng)
            .unwrap();
        assert!(price >= MIN_PRICE);
    }
}

#[test]
fn pump_is_braked_until_volume_arrives() {
    let controller = Arc::new(PriceThresholdController::new(scenario_threshold()));
    controller.record_initial_price("PUMP", 100.0);

    let pumped = InstrumentSnapshot::new("PUMP", Sector::Technology, 300.0, 0.5);
    assert_eq!(controller.calculate_dampening_factor(&pumped, 0.20), 0.5);

    controller.record_trading_activity("PUMP", 20.0);
    assert_relative_eq!(controller.calculate_dampening_factor(&pumped, 0.20), 0.75, epsilon = 1e-12);

    let modest = InstrumentSnapshot::new("PUMP", Sector::Technology, 150.0, 0.5);
    assert_eq!(controller.calculate_dampening_factor(&modest, 0.20), 1.0);
}

#[test]
fn dampened_orchestrator_stays_bounded_under_strong_influences() {
    let controller = Arc::new(PriceThresholdController::new(scenario_threshold()));
    let orchestrator = PriceUpdateOrchestrator::new().with_dampening(controller.clone());
    let catalog = MarketFactorCatalog::standard().unwrap();
    let influences: Vec<MarketInfluenceState> = catalog
        .iter()
        .map(|factor| MarketInfluenceState::with_values(factor.clone(), 1.0, 1.0))
        .collect();

    let mut rng = StdRng::seed_from_u64(9);
    let mut instrument = InstrumentSnapshot::new("RUN", Sector::Technology, 10.0, 1.0);
    controller.record_initial_price("RUN", 10.0);

    for _ in 0..300 {
        let update = orchestrator
            .calculate_price_update(&instrument, &influences, &mut rng)
            .unwrap();
        assert!(update.applied_impact.abs() <= MAX_TICK_MOVE + 1e-12);
        assert!((0.5..=1.0).contains(&update.dampening_factor));
        assert!(update.new_price >= MIN_PRICE);
        instrument.apply_price_update(update.new_price, 1_000);
    }
}

#[test]
fn oversized_order_has_no_effect() {
    let mut config = Config::default();
    config.market.seed = Some(21);
    config.trading.max_order_quantity = 10.0;
    let engine = MarketEngine::new(&config).unwrap();

    let instrument = InstrumentSnapshot::new("ACME", Sector::Industrial, 10.0, 0.2);
    engine.register_instrument(&instrument);
    let now = Utc::now();

    let oversized = OrderRequest::market("alice", "ACME", OrderSide::Buy, 11.0);
    match engine.submit_order(&oversized, &instrument) {
        Err(TradingError::Validation(_)) => {}
        other => panic!("Expected validation error, got {:?}", other),
    }

    assert_eq!(engine.evaluator().account_notional("alice", now), dec!(0));
    assert_eq!(engine.controller().get_trading_activity("ACME"), 0.0);

    // No cooldown was started: an immediate valid order goes through
    let valid = OrderRequest::market("alice", "ACME", OrderSide::Buy, 10.0);
    let fill = engine.submit_order(&valid, &instrument).unwrap();
    assert_eq!(fill.quantity, 10.0);
    assert_eq!(engine.controller().get_trading_activity("ACME"), 10.0);
}

#[test]
fn breaker_halts_then_releases() {
    let evaluator = TradingEconomicsEvaluator::new(TradingConfig {
        fees: FeeConfig {
            mode: FeeMode::Flat,
            percent: dec!(0),
            flat: dec!(1),
        },
        slippage: SlippageConfig {
            mode: SlippageMode::None,
            coefficient: 0.0,
        },
        cooldown_ms: 0,
        ..TradingConfig::default()
    })
    .unwrap();
    let now = Utc::now();
    evaluator.open_session("ACME", 100.0);

    let spike = InstrumentSnapshot::new("ACME", Sector::Industrial, 110.0, 0.2);
    let order = OrderRequest::market("alice", "ACME", OrderSide::Buy, 1.0);

    let fill = evaluator.evaluate_at(&order, &spike, now).unwrap();
    assert!(fill.circuit_breaker_triggered());
    assert_eq!(fill.total, dec!(111));

    assert!(matches!(
        evaluator.evaluate_at(&order, &spike, now + Duration::minutes(1)),
        Err(TradingError::CircuitBreakerHalted { .. })
    ));

    // Default first level halts for five minutes
    let fill = evaluator
        .evaluate_at(&order, &spike, now + Duration::minutes(5))
        .unwrap();
    assert!(!fill.circuit_breaker_triggered());
}

#[test]
fn default_config_round_trips_through_json() {
    let dir = std::env::temp_dir().join(format!("market_sim_config_{}.json", std::process::id()));
    let config = Config::default();

    config.to_file(&dir).unwrap();
    let loaded = Config::from_file(&dir).unwrap();
    std::fs::remove_file(&dir).ok();

    assert_eq!(loaded.market.instruments.len(), config.market.instruments.len());
    assert_eq!(loaded.trading.max_notional_per_minute, config.trading.max_notional_per_minute);
    assert_eq!(loaded.trading.circuit_breaker.halt_minutes, config.trading.circuit_breaker.halt_minutes);
}
