// src/application/pricing/mod.rs
pub mod affinity;
pub mod orchestrator;
pub mod signals;

pub use affinity::SectorAffinityTable;
pub use orchestrator::{PriceUpdate, PriceUpdateOrchestrator, MAX_TICK_MOVE};
pub use signals::{InfluenceSignal, MomentumSignal, NoiseSignal, TechnicalSignal};
