// src/infrastructure/economy/mod.rs
// Wallet providers for the surrounding economy

use async_trait::async_trait;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::config::EconomyConfig;
use crate::domain::errors::{EconomyError, EconomyResult};
use crate::domain::service::EconomyProvider;

pub const INTERNAL_PROVIDER: &str = "internal";

/// Process-local wallets. New accounts open with the starting balance.
pub struct InMemoryEconomy {
    balances: Mutex<HashMap<String, Decimal>>,
    starting_balance: Decimal,
}

impl InMemoryEconomy {
    pub fn new(starting_balance: Decimal) -> Self {
        Self {
            balances: Mutex::new(HashMap::new()),
            starting_balance,
        }
    }

    fn check_amount(amount: Decimal) -> EconomyResult<()> {
        if amount < Decimal::ZERO {
            return Err(EconomyError::InvalidAmount(amount));
        }
        Ok(())
    }
}

#[async_trait]
impl EconomyProvider for InMemoryEconomy {
    fn name(&self) -> &str {
        INTERNAL_PROVIDER
    }

    async fn balance(&self, account: &str) -> EconomyResult<Decimal> {
        let balances = self.balances.lock().await;
        Ok(balances.get(account).copied().unwrap_or(self.starting_balance))
    }

    async fn deposit(&self, account: &str, amount: Decimal) -> EconomyResult<Decimal> {
        Self::check_amount(amount)?;

        let mut balances = self.balances.lock().await;
        let balance = balances
            .entry(account.to_string())
            .or_insert(self.starting_balance);
        *balance += amount;
        Ok(*balance)
    }

    async fn withdraw(&self, account: &str, amount: Decimal) -> EconomyResult<Decimal> {
        Self::check_amount(amount)?;

        let mut balances = self.balances.lock().await;
        let balance = balances
            .entry(account.to_string())
            .or_insert(self.starting_balance);
        if *balance < amount {
            return Err(EconomyError::InsufficientFunds {
                account: account.to_string(),
                needed: amount,
                available: *balance,
            });
        }
        *balance -= amount;
        Ok(*balance)
    }
}

/// Select the economy provider named in configuration
pub fn create_economy_provider(config: &EconomyConfig) -> EconomyResult<Arc<dyn EconomyProvider>> {
    match config.provider.to_lowercase().as_str() {
        INTERNAL_PROVIDER => {
            log::info!(
                "Using internal economy, starting balance {}",
                config.starting_balance
            );
            Ok(Arc::new(InMemoryEconomy::new(config.starting_balance)))
        }
        other => Err(EconomyError::UnknownProvider(other.to_string())),
    }
}
