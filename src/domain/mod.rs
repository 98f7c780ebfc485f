// src/domain/mod.rs
pub mod errors;
pub mod influence;
pub mod models;
pub mod service;

// Re-export common types for convenience
pub use errors::{
    AppError, AppResult, EconomyError, EconomyResult, PricingError, PricingResult, TradingError, TradingResult,
};
pub use influence::{MarketFactor, MarketFactorCatalog, MarketInfluenceState};
pub use models::{
    CircuitBreakerTrip, HaltDuration, InstrumentSnapshot, OrderFill, OrderKind, OrderRequest, OrderSide, OrderType,
    Sector, MIN_PRICE,
};
pub use service::{DampeningStrategy, EconomyProvider, NoDampening};
