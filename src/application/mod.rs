// src/application/mod.rs
pub mod pricing;
pub mod service;
pub mod trading;
pub mod usecase;

pub use service::MarketEngine;
