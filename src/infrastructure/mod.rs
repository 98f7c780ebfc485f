// src/infrastructure/mod.rs
pub mod economy;
pub mod market;
pub mod risk;

pub use economy::{create_economy_provider, InMemoryEconomy};
pub use market::InstrumentStore;
pub use risk::PriceThresholdController;
