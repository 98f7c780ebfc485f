// src/application/trading/mod.rs
pub mod circuit_breaker;
pub mod costs;
pub mod evaluator;

pub use circuit_breaker::{CircuitBreaker, Halt};
pub use costs::{compute_fee, slipped_price, to_money};
pub use evaluator::TradingEconomicsEvaluator;
