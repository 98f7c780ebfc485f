// src/application/trading/evaluator.rs
// Order admission, fill pricing and circuit-breaker evaluation

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use rust_decimal::Decimal;
use std::collections::{HashMap, VecDeque};

use crate::application::trading::circuit_breaker::CircuitBreaker;
use crate::application::trading::costs::{compute_fee, slipped_price, to_money};
use crate::config::TradingConfig;
use crate::domain::errors::{AppResult, TradingError, TradingResult};
use crate::domain::models::{InstrumentSnapshot, OrderFill, OrderRequest, OrderSide, OrderType};

/// Trailing window for the per-account notional limit
const NOTIONAL_WINDOW_SECS: i64 = 60;

#[derive(Debug, Default)]
struct AccountActivity {
    /// Accepted fills inside the trailing window, oldest first
    recent: VecDeque<(DateTime<Utc>, Decimal)>,
    last_order_at: Option<DateTime<Utc>>,
}

impl AccountActivity {
    fn prune(&mut self, now: DateTime<Utc>) {
        let window = Duration::seconds(NOTIONAL_WINDOW_SECS);
        while let Some(&(at, _)) = self.recent.front() {
            if now.signed_duration_since(at) >= window {
                self.recent.pop_front();
            } else {
                break;
            }
        }
    }

    fn notional_since(&self, now: DateTime<Utc>) -> Decimal {
        let window = Duration::seconds(NOTIONAL_WINDOW_SECS);
        self.recent
            .iter()
            .filter(|(at, _)| now.signed_duration_since(*at) < window)
            .map(|(_, notional)| *notional)
            .sum()
    }
}

struct EvaluatorState {
    accounts: HashMap<String, AccountActivity>,
    breaker: CircuitBreaker,
}

/// Validates orders and prices their fills.
///
/// Rejections leave every counter untouched; only accepted fills are recorded.
pub struct TradingEconomicsEvaluator {
    config: TradingConfig,
    state: Mutex<EvaluatorState>,
}

impl TradingEconomicsEvaluator {
    pub fn new(config: TradingConfig) -> AppResult<Self> {
        config.validate()?;
        let breaker = CircuitBreaker::new(&config.circuit_breaker)?;

        Ok(Self {
            config,
            state: Mutex::new(EvaluatorState {
                accounts: HashMap::new(),
                breaker,
            }),
        })
    }

    pub fn config(&self) -> &TradingConfig {
        &self.config
    }

    /// Structural checks that need no market state
    pub fn validate(&self, order: &OrderRequest) -> TradingResult<()> {
        if !(order.quantity > 0.0 && order.quantity.is_finite()) {
            return Err(TradingError::Validation(format!(
                "Quantity must be positive, got {}",
                order.quantity
            )));
        }

        match order.order_type {
            OrderType::Limit(price) if !(price > 0.0 && price.is_finite()) => {
                return Err(TradingError::Validation(format!(
                    "LIMIT order needs a positive limit price, got {}",
                    price
                )));
            }
            OrderType::Stop(price) if !(price > 0.0 && price.is_finite()) => {
                return Err(TradingError::Validation(format!(
                    "STOP order needs a positive stop price, got {}",
                    price
                )));
            }
            _ => {}
        }

        if !self.config.allowed_order_types.contains(&order.order_type.kind()) {
            return Err(TradingError::Validation(format!(
                "Order type {:?} is disabled",
                order.order_type.kind()
            )));
        }

        if order.quantity > self.config.max_order_quantity {
            return Err(TradingError::Validation(format!(
                "Quantity {} exceeds maximum {}",
                order.quantity, self.config.max_order_quantity
            )));
        }

        Ok(())
    }

    pub fn evaluate(&self, order: &OrderRequest, instrument: &InstrumentSnapshot) -> TradingResult<OrderFill> {
        self.evaluate_at(order, instrument, Utc::now())
    }

    /// Evaluate an order against the instrument's current price at time `now`
    pub fn evaluate_at(
        &self,
        order: &OrderRequest,
        instrument: &InstrumentSnapshot,
        now: DateTime<Utc>,
    ) -> TradingResult<OrderFill> {
        self.evaluate_within_at(order, instrument, None, now)
    }

    /// Like [`evaluate`](Self::evaluate), but a buy whose total exceeds `budget`
    /// is rejected before anything is recorded.
    pub fn evaluate_within(
        &self,
        order: &OrderRequest,
        instrument: &InstrumentSnapshot,
        budget: Decimal,
    ) -> TradingResult<OrderFill> {
        self.evaluate_within_at(order, instrument, Some(budget), Utc::now())
    }

    pub fn evaluate_within_at(
        &self,
        order: &OrderRequest,
        instrument: &InstrumentSnapshot,
        budget: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> TradingResult<OrderFill> {
        let result = self.try_evaluate(order, instrument, budget, now);

        if let Err(e) = &result {
            log::warn!(
                "Rejected {} {} {} x{} for {}: [{}] {}",
                order.side,
                order.order_type,
                order.symbol,
                order.quantity,
                order.account_id,
                e.reason(),
                e
            );
        }

        result
    }

    fn try_evaluate(
        &self,
        order: &OrderRequest,
        instrument: &InstrumentSnapshot,
        budget: Option<Decimal>,
        now: DateTime<Utc>,
    ) -> TradingResult<OrderFill> {
        self.validate(order)?;

        if order.symbol != instrument.symbol {
            return Err(TradingError::Validation(format!(
                "Order for {} evaluated against {}",
                order.symbol, instrument.symbol
            )));
        }

        let reference = instrument.current_price;
        if !(reference > 0.0 && reference.is_finite()) {
            return Err(TradingError::ComputationDegenerate(format!(
                "Reference price of {} is {}",
                instrument.symbol, reference
            )));
        }

        let mut state = self.state.lock();

        if let Some(halt) = state.breaker.active_halt(&order.symbol, now) {
            return Err(TradingError::CircuitBreakerHalted {
                symbol: order.symbol.clone(),
                until: halt.until(),
            });
        }

        self.check_rate_limits(state.accounts.get(&order.account_id), order, reference, now)?;

        let fill_price = Self::fill_price(&self.config, order, reference)?;

        let notional = to_money(fill_price * order.quantity).ok_or_else(|| {
            TradingError::ComputationDegenerate(format!("Notional of {} is not finite", order.symbol))
        })?;
        let fee = compute_fee(&self.config.fees, notional);
        let total = match order.side {
            OrderSide::Buy => notional + fee,
            OrderSide::Sell => (notional - fee).max(Decimal::ZERO),
        };

        if let (OrderSide::Buy, Some(reserved)) = (order.side, budget) {
            if total > reserved {
                return Err(TradingError::BudgetExceeded { needed: total, reserved });
            }
        }

        // Accepted: record the account activity, then check the breaker
        let activity = state.accounts.entry(order.account_id.clone()).or_default();
        activity.prune(now);
        activity.recent.push_back((now, notional));
        activity.last_order_at = Some(now);

        let circuit_breaker = state.breaker.record_fill(&order.symbol, reference, fill_price, now);

        log::info!(
            "Filled {} {} {} x{} @ {:.4} (ref {:.4}), fee {}, total {}",
            order.account_id,
            order.side,
            order.symbol,
            order.quantity,
            fill_price,
            reference,
            fee,
            total
        );

        Ok(OrderFill {
            account_id: order.account_id.clone(),
            symbol: order.symbol.clone(),
            side: order.side,
            quantity: order.quantity,
            reference_price: reference,
            fill_price,
            notional,
            fee,
            total,
            circuit_breaker,
            timestamp: now,
        })
    }

    fn check_rate_limits(
        &self,
        activity: Option<&AccountActivity>,
        order: &OrderRequest,
        reference: f64,
        now: DateTime<Utc>,
    ) -> TradingResult<()> {
        let Some(activity) = activity else {
            return self.check_notional(Decimal::ZERO, order, reference);
        };

        if let Some(last) = activity.last_order_at {
            let cooldown = Duration::milliseconds(i64::try_from(self.config.cooldown_ms).unwrap_or(i64::MAX));
            let elapsed = now.signed_duration_since(last);
            if elapsed < cooldown {
                return Err(TradingError::RateLimitExceeded(format!(
                    "Account {} is cooling down for another {} ms",
                    order.account_id,
                    (cooldown - elapsed).num_milliseconds()
                )));
            }
        }

        self.check_notional(activity.notional_since(now), order, reference)
    }

    fn check_notional(&self, traded: Decimal, order: &OrderRequest, reference: f64) -> TradingResult<()> {
        let estimate = to_money(reference * order.quantity).ok_or_else(|| {
            TradingError::ComputationDegenerate(format!("Notional of {} is not finite", order.symbol))
        })?;

        if traded + estimate > self.config.max_notional_per_minute {
            return Err(TradingError::RateLimitExceeded(format!(
                "Account {} would trade {} in the last minute, limit {}",
                order.account_id,
                traded + estimate,
                self.config.max_notional_per_minute
            )));
        }

        Ok(())
    }

    /// Slipped fill price, honouring limit and stop semantics
    fn fill_price(config: &TradingConfig, order: &OrderRequest, reference: f64) -> TradingResult<f64> {
        if let OrderType::Stop(stop) = order.order_type {
            let triggered = match order.side {
                OrderSide::Buy => reference >= stop,
                OrderSide::Sell => reference <= stop,
            };
            if !triggered {
                return Err(TradingError::Validation(format!(
                    "STOP {} not triggered at reference {}",
                    stop, reference
                )));
            }
        }

        let fill = slipped_price(&config.slippage, reference, order.quantity, order.side);

        if let OrderType::Limit(limit) = order.order_type {
            let marketable = match order.side {
                OrderSide::Buy => fill <= limit,
                OrderSide::Sell => fill >= limit,
            };
            if !marketable {
                return Err(TradingError::Validation(format!(
                    "LIMIT {} not marketable, fill would be {:.4}",
                    limit, fill
                )));
            }
        }

        Ok(fill)
    }

    pub fn is_halted(&self, symbol: &str) -> bool {
        self.is_halted_at(symbol, Utc::now())
    }

    pub fn is_halted_at(&self, symbol: &str, now: DateTime<Utc>) -> bool {
        self.state.lock().breaker.active_halt(symbol, now).is_some()
    }

    /// Set the session-open reference price used by the circuit breaker
    pub fn open_session(&self, symbol: &str, reference: f64) {
        self.state.lock().breaker.open_session(symbol, reference);
    }

    pub fn session_reference(&self, symbol: &str) -> Option<f64> {
        self.state.lock().breaker.session_reference(symbol)
    }

    /// Lift a halt before it expires
    pub fn reopen(&self, symbol: &str) -> bool {
        let reopened = self.state.lock().breaker.reopen(symbol);
        if reopened {
            log::info!("Trading in {} reopened", symbol);
        }
        reopened
    }

    /// Start a fresh trading session: session references, fired levels and halts are cleared.
    pub fn start_new_session(&self) {
        self.state.lock().breaker.start_new_session();
        log::info!("New trading session started");
    }

    /// Notional an account traded over the trailing minute
    pub fn account_notional(&self, account_id: &str, now: DateTime<Utc>) -> Decimal {
        self.state
            .lock()
            .accounts
            .get(account_id)
            .map(|activity| activity.notional_since(now))
            .unwrap_or(Decimal::ZERO)
    }
}
