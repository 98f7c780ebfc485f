// src/adapter/coordinator.rs
// Drives the market engine on a schedule and routes orders to the economy

use rust_decimal::Decimal;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio::time::{self, Duration, MissedTickBehavior};

use crate::application::pricing::{PriceUpdate, MAX_TICK_MOVE};
use crate::application::service::MarketEngine;
use crate::application::trading::{compute_fee, slipped_price, to_money};
use crate::application::usecase::InfluenceTickSummary;
use crate::config::MarketConfig;
use crate::domain::errors::{AppError, AppResult, EconomyError, PricingError, TradingError};
use crate::domain::models::{OrderFill, OrderRequest, OrderSide};
use crate::domain::service::EconomyProvider;
use crate::infrastructure::market::InstrumentStore;

/// Result of one simulation tick
#[derive(Debug, Default)]
pub struct TickReport {
    pub influences: InfluenceTickSummary,
    pub updates: Vec<PriceUpdate>,
    pub failures: Vec<(String, PricingError)>,
}

pub struct SimulationCoordinator {
    engine: Arc<MarketEngine>,
    store: Arc<InstrumentStore>,
    economy: Arc<dyn EconomyProvider>,
    tick_interval: Duration,
    reset_interval: Duration,
    running: Arc<AtomicBool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl SimulationCoordinator {
    pub fn new(
        engine: Arc<MarketEngine>,
        store: Arc<InstrumentStore>,
        economy: Arc<dyn EconomyProvider>,
        config: &MarketConfig,
    ) -> Self {
        for symbol in store.symbols() {
            if let Ok(instrument) = store.get(&symbol) {
                engine.register_instrument(&instrument);
            }
        }

        Self {
            engine,
            store,
            economy,
            tick_interval: Duration::from_millis(config.tick_interval_ms),
            reset_interval: Duration::from_secs(config.activity_reset_interval_secs.max(1)),
            running: Arc::new(AtomicBool::new(false)),
            tasks: Mutex::new(Vec::new()),
        }
    }

    pub fn engine(&self) -> &Arc<MarketEngine> {
        &self.engine
    }

    pub fn store(&self) -> &Arc<InstrumentStore> {
        &self.store
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Advance influences, then price every instrument once.
    pub fn run_tick(&self) -> TickReport {
        run_tick(&self.engine, &self.store)
    }

    /// Spawn the tick and counter-reset loops
    pub async fn start(&self) -> AppResult<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AppError::Simulation("Simulation already running".to_string()));
        }

        log::info!(
            "Starting simulation: {} instruments, tick every {:?}, counters reset every {:?}",
            self.store.len(),
            self.tick_interval,
            self.reset_interval
        );

        let mut tasks = self.tasks.lock().await;

        let engine = self.engine.clone();
        let store = self.store.clone();
        let running = self.running.clone();
        let tick_interval = self.tick_interval;
        tasks.push(tokio::spawn(async move {
            let mut timer = time::interval(tick_interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);

            while running.load(Ordering::SeqCst) {
                timer.tick().await;
                let report = run_tick(&engine, &store);
                for (symbol, error) in &report.failures {
                    log::error!("Pricing failed for {}: {}", symbol, error);
                }
            }
        }));

        let engine = self.engine.clone();
        let store = self.store.clone();
        let running = self.running.clone();
        let reset_interval = self.reset_interval;
        tasks.push(tokio::spawn(async move {
            let mut timer = time::interval(reset_interval);
            timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // The first tick completes immediately
            timer.tick().await;

            while running.load(Ordering::SeqCst) {
                timer.tick().await;
                engine.reset_trading_activity();
                store.reset_daily_volumes();
                log::info!("Trading activity counters reset");
            }
        }));

        Ok(())
    }

    /// Stop the loops and wait for them to wind down
    pub async fn stop(&self) {
        if !self.running.swap(false, Ordering::SeqCst) {
            return;
        }

        let mut tasks = self.tasks.lock().await;
        for task in tasks.drain(..) {
            task.abort();
            // Aborted tasks report a cancellation error
            let _ = task.await;
        }
        log::info!("Simulation stopped");
    }

    /// Begin a new trading session, reopening every instrument at its current price
    pub fn start_new_session(&self) {
        self.engine.start_new_session();
        for symbol in self.store.symbols() {
            if let Ok(instrument) = self.store.get(&symbol) {
                self.engine.evaluator().open_session(&symbol, instrument.current_price);
            }
        }
    }

    /// Evaluate an order against the live instrument and settle it with the economy.
    ///
    /// Buys withdraw a reservation up front and are evaluated against it, so a
    /// fill is only recorded once its cost is covered. Unused funds are refunded.
    pub async fn submit_order(&self, order: &OrderRequest) -> AppResult<OrderFill> {
        let snapshot = self
            .store
            .get(&order.symbol)
            .map_err(|_| TradingError::UnknownInstrument(order.symbol.clone()))?;

        let reserved = match order.side {
            OrderSide::Buy => Some(self.reserve_funds(order, snapshot.current_price).await?),
            OrderSide::Sell => None,
        };

        let engine = &self.engine;
        let evaluated = self
            .store
            .update(&order.symbol, |instrument| {
                let fill = match reserved {
                    Some(budget) => engine.submit_order_within(order, instrument, budget)?,
                    None => engine.submit_order(order, instrument)?,
                };
                instrument.record_volume(fill.quantity);
                Ok::<_, TradingError>(fill)
            })
            .map_err(AppError::from)
            .and_then(|result| result.map_err(AppError::from));

        let fill = match evaluated {
            Ok(fill) => fill,
            Err(e) => {
                if let Some(reserved) = reserved {
                    self.refund(&order.account_id, reserved).await;
                }
                return Err(e);
            }
        };

        match reserved {
            Some(reserved) => self.refund(&fill.account_id, reserved - fill.total).await,
            None => {
                let balance = self.economy.deposit(&fill.account_id, fill.total).await?;
                log::debug!("{} received {}, balance {}", fill.account_id, fill.total, balance);
            }
        }

        Ok(fill)
    }

    /// Withdraw the estimated cost of a buy plus one tick of price headroom, capped by the balance
    async fn reserve_funds(&self, order: &OrderRequest, reference: f64) -> AppResult<Decimal> {
        let estimate = self.estimate_cost(order, reference)?;
        let available = self.economy.balance(&order.account_id).await?;
        if available < estimate {
            return Err(EconomyError::InsufficientFunds {
                account: order.account_id.clone(),
                needed: estimate,
                available,
            }
            .into());
        }

        let headroom = to_money(1.0 + MAX_TICK_MOVE).unwrap_or(Decimal::ONE);
        let reserved = (estimate * headroom).round_dp(8).min(available);
        self.economy.withdraw(&order.account_id, reserved).await?;
        Ok(reserved)
    }

    async fn refund(&self, account: &str, amount: Decimal) {
        if amount <= Decimal::ZERO {
            return;
        }
        match self.economy.deposit(account, amount).await {
            Ok(balance) => log::debug!("Refunded {} to {}, balance {}", amount, account, balance),
            Err(e) => log::error!("Refund of {} to {} failed: {}", amount, account, e),
        }
    }

    /// Expected buy total at the given reference price
    fn estimate_cost(&self, order: &OrderRequest, reference: f64) -> AppResult<Decimal> {
        let config = self.engine.evaluator().config();
        let price = slipped_price(&config.slippage, reference, order.quantity, order.side);
        let notional = to_money(price * order.quantity).ok_or_else(|| {
            TradingError::Validation(format!("Quantity {} is not a finite amount", order.quantity))
        })?;
        Ok(notional + compute_fee(&config.fees, notional))
    }
}

fn run_tick(engine: &MarketEngine, store: &InstrumentStore) -> TickReport {
    let mut report = TickReport {
        influences: engine.update_market_influences(),
        ..TickReport::default()
    };

    let capacity = store.history_capacity();
    for symbol in store.symbols() {
        let priced = store.update(&symbol, |instrument| {
            let update = engine.price_instrument(instrument)?;
            instrument.apply_price_update(update.new_price, capacity);
            Ok::<_, PricingError>(update)
        });

        match priced.and_then(|result| result) {
            Ok(update) => report.updates.push(update),
            Err(e) => report.failures.push((symbol, e)),
        }
    }

    log::debug!(
        "Tick priced {} instruments, {} failures",
        report.updates.len(),
        report.failures.len()
    );

    report
}
