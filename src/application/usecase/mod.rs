// src/application/usecase/mod.rs
pub mod influence_usecase;

// Re-export public API
pub use influence_usecase::{update_market_influences, InfluenceTickSummary};
