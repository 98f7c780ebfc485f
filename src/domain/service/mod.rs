// src/domain/service/mod.rs
// Domain service interfaces

use async_trait::async_trait;
use rust_decimal::Decimal;

use crate::domain::errors::EconomyResult;
use crate::domain::models::InstrumentSnapshot;

/// Suppresses oversized price moves.
///
/// Returns a multiplier in [0, 1] for a proposed fractional price impact;
/// 1.0 leaves the move untouched.
pub trait DampeningStrategy: Send + Sync {
    fn dampening_factor(&self, instrument: &InstrumentSnapshot, proposed_impact: f64) -> f64;
}

/// Strategy used when no dampening is attached
#[derive(Debug, Clone, Copy, Default)]
pub struct NoDampening;

impl DampeningStrategy for NoDampening {
    fn dampening_factor(&self, _instrument: &InstrumentSnapshot, _proposed_impact: f64) -> f64 {
        1.0
    }
}

/// Wallet capability of the surrounding economy.
///
/// Selected once at startup; the pricing core never sees it.
#[async_trait]
pub trait EconomyProvider: Send + Sync {
    /// Provider name as used in configuration
    fn name(&self) -> &str;

    /// Current balance of an account
    async fn balance(&self, account: &str) -> EconomyResult<Decimal>;

    /// Credit an account, returning the new balance
    async fn deposit(&self, account: &str, amount: Decimal) -> EconomyResult<Decimal>;

    /// Debit an account, returning the new balance
    async fn withdraw(&self, account: &str, amount: Decimal) -> EconomyResult<Decimal>;
}
