// src/main.rs
use market_sim::adapter::SimulationCoordinator;
use market_sim::application::MarketEngine;
use market_sim::config::Config;
use market_sim::domain::errors::{AppError, AppResult};
use market_sim::domain::models::{OrderRequest, OrderSide};
use market_sim::infrastructure::{create_economy_provider, InstrumentStore};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;
use tokio::signal::ctrl_c;
use tokio::time::Duration;

const DEMO_ACCOUNTS: [&str; 3] = ["retail-1", "retail-2", "retail-3"];

#[tokio::main]
async fn main() -> AppResult<()> {
    // Load configuration
    let config = Config::from_env()?;

    // Initialize logging
    config.init_logging()?;

    log::info!("Starting market_sim v{}", env!("CARGO_PKG_VERSION"));

    let economy = create_economy_provider(&config.economy)?;
    log::info!("Using {} economy provider", economy.name());

    let engine = Arc::new(MarketEngine::new(&config)?);
    let store = Arc::new(InstrumentStore::from_config(
        &config.market.instruments,
        config.market.history_capacity,
    ));
    log::info!("Listed {} instruments: {:?}", store.len(), store.symbols());

    let coordinator = Arc::new(SimulationCoordinator::new(engine, store.clone(), economy, &config.market));
    coordinator.start().await?;

    // Background retail order flow so the dampening controller sees volume
    let flow = coordinator.clone();
    let order_flow = tokio::spawn(async move {
        let mut rng = StdRng::from_entropy();
        let mut interval = tokio::time::interval(Duration::from_millis(750));
        let symbols = flow.store().symbols();

        loop {
            interval.tick().await;
            if symbols.is_empty() {
                continue;
            }

            let account = DEMO_ACCOUNTS[rng.gen_range(0..DEMO_ACCOUNTS.len())];
            let symbol = &symbols[rng.gen_range(0..symbols.len())];
            let side = if rng.gen_bool(0.5) { OrderSide::Buy } else { OrderSide::Sell };
            let quantity = f64::from(rng.gen_range(1u32..=50));

            let order = OrderRequest::market(account, symbol, side, quantity);
            match flow.submit_order(&order).await {
                Ok(fill) => log::debug!("Retail fill: {:?}", fill),
                Err(AppError::Trading(e)) => log::debug!("Retail order rejected: {}", e),
                Err(e) => log::warn!("Retail order failed: {}", e),
            }
        }
    });

    // Periodic status log
    let status_store = store.clone();
    let status = tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(60));

        loop {
            interval.tick().await;

            log::info!("=== Market ===");
            for symbol in status_store.symbols() {
                if let Ok(instrument) = status_store.get(&symbol) {
                    log::info!(
                        "{} [{}]: {:.4} ({:+.2}%), volume {}, cap {:.0}",
                        instrument.symbol,
                        instrument.sector,
                        instrument.current_price,
                        instrument.last_return() * 100.0,
                        instrument.daily_volume,
                        instrument.market_cap()
                    );
                }
            }
        }
    });

    // Wait for shutdown signal
    log::info!("Simulation is running. Press Ctrl+C to stop.");
    ctrl_c().await.expect("Failed to listen for control-c event");

    // Shutdown
    log::info!("Shutting down...");
    order_flow.abort();
    status.abort();
    coordinator.stop().await;

    log::info!("Shutdown complete. Goodbye!");
    Ok(())
}
