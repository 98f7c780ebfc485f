// src/domain/models.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use crate::domain::errors::TradingError;

/// Lowest price any instrument may trade at
pub const MIN_PRICE: f64 = 0.01;

/// Default number of history points kept per instrument
pub const DEFAULT_HISTORY_CAPACITY: usize = 1000;

/// Market sector an instrument belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sector {
    Technology,
    Energy,
    Finance,
    Healthcare,
    Consumer,
    Industrial,
    RealEstate,
    Materials,
    Utilities,
    Other,
}

impl fmt::Display for Sector {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Sector::Technology => "TECHNOLOGY",
            Sector::Energy => "ENERGY",
            Sector::Finance => "FINANCE",
            Sector::Healthcare => "HEALTHCARE",
            Sector::Consumer => "CONSUMER",
            Sector::Industrial => "INDUSTRIAL",
            Sector::RealEstate => "REAL_ESTATE",
            Sector::Materials => "MATERIALS",
            Sector::Utilities => "UTILITIES",
            Sector::Other => "OTHER",
        };
        write!(f, "{}", name)
    }
}

/// Read model of an instrument's price state.
///
/// The pricing engine only reads it; the owner applies the returned price
/// through [`InstrumentSnapshot::apply_price_update`].
#[derive(Debug, Clone)]
pub struct InstrumentSnapshot {
    pub symbol: String,
    pub sector: Sector,
    pub current_price: f64,
    pub previous_price: f64,
    /// 0.0 (calm) to 1.0 (wild)
    pub volatility_rating: f64,
    /// Oldest first, newest last
    pub price_history: VecDeque<f64>,
    pub daily_volume: f64,
    pub shares_outstanding: f64,
}

impl InstrumentSnapshot {
    pub fn new(symbol: &str, sector: Sector, price: f64, volatility_rating: f64) -> Self {
        let mut price_history = VecDeque::with_capacity(64);
        price_history.push_back(price);

        Self {
            symbol: symbol.to_string(),
            sector,
            current_price: price,
            previous_price: price,
            volatility_rating: volatility_rating.clamp(0.0, 1.0),
            price_history,
            daily_volume: 0.0,
            shares_outstanding: 0.0,
        }
    }

    /// Replace the history; the last point becomes the current price.
    pub fn with_history<I: IntoIterator<Item = f64>>(mut self, history: I) -> Self {
        self.price_history = history.into_iter().collect();
        if let Some(&last) = self.price_history.back() {
            self.previous_price = if self.price_history.len() > 1 {
                self.price_history[self.price_history.len() - 2]
            } else {
                last
            };
            self.current_price = last;
        }
        self
    }

    pub fn with_previous_price(mut self, previous_price: f64) -> Self {
        self.previous_price = previous_price;
        self
    }

    pub fn with_daily_volume(mut self, daily_volume: f64) -> Self {
        self.daily_volume = daily_volume;
        self
    }

    pub fn with_shares_outstanding(mut self, shares: f64) -> Self {
        self.shares_outstanding = shares;
        self
    }

    /// Fractional return of the last move, 0 when there is no usable previous price
    pub fn last_return(&self) -> f64 {
        if self.previous_price <= 0.0 || !self.previous_price.is_finite() {
            return 0.0;
        }
        (self.current_price - self.previous_price) / self.previous_price
    }

    pub fn market_cap(&self) -> f64 {
        self.current_price * self.shares_outstanding
    }

    /// Record a newly computed price, evicting the oldest history past `history_cap`.
    pub fn apply_price_update(&mut self, new_price: f64, history_cap: usize) {
        let cap = history_cap.max(1);

        self.previous_price = self.current_price;
        self.current_price = new_price.max(MIN_PRICE);
        self.price_history.push_back(self.current_price);

        while self.price_history.len() > cap {
            self.price_history.pop_front();
        }
    }

    pub fn record_volume(&mut self, quantity: f64) {
        if quantity.is_finite() && quantity > 0.0 {
            self.daily_volume += quantity;
        }
    }

    pub fn reset_daily_volume(&mut self) {
        self.daily_volume = 0.0;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OrderSide {
    Buy,
    Sell,
}

impl OrderSide {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderSide::Buy => "BUY",
            OrderSide::Sell => "SELL",
        }
    }

    /// +1 for buys, -1 for sells: the direction slippage moves the price against the trader
    pub fn adverse_sign(&self) -> f64 {
        match self {
            OrderSide::Buy => 1.0,
            OrderSide::Sell => -1.0,
        }
    }
}

impl fmt::Display for OrderSide {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for OrderSide {
    type Err = TradingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "BUY" => Ok(OrderSide::Buy),
            "SELL" => Ok(OrderSide::Sell),
            other => Err(TradingError::Validation(format!("Invalid order side: {}", other))),
        }
    }
}

/// Order type with its trigger price where one applies
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OrderType {
    Market,
    Limit(f64),
    Stop(f64),
}

impl OrderType {
    pub fn kind(&self) -> OrderKind {
        match self {
            OrderType::Market => OrderKind::Market,
            OrderType::Limit(_) => OrderKind::Limit,
            OrderType::Stop(_) => OrderKind::Stop,
        }
    }
}

impl fmt::Display for OrderType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            OrderType::Market => write!(f, "MARKET"),
            OrderType::Limit(price) => write!(f, "LIMIT {}", price),
            OrderType::Stop(price) => write!(f, "STOP {}", price),
        }
    }
}

/// Order type without its price, used for configuration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderKind {
    Market,
    Limit,
    Stop,
}

#[derive(Debug, Clone)]
pub struct OrderRequest {
    pub account_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub order_type: OrderType,
    pub quantity: f64,
}

impl OrderRequest {
    pub fn market(account_id: &str, symbol: &str, side: OrderSide, quantity: f64) -> Self {
        Self {
            account_id: account_id.to_string(),
            symbol: symbol.to_string(),
            side,
            order_type: OrderType::Market,
            quantity,
        }
    }

    pub fn limit(account_id: &str, symbol: &str, side: OrderSide, quantity: f64, limit_price: f64) -> Self {
        Self {
            order_type: OrderType::Limit(limit_price),
            ..Self::market(account_id, symbol, side, quantity)
        }
    }

    pub fn stop(account_id: &str, symbol: &str, side: OrderSide, quantity: f64, stop_price: f64) -> Self {
        Self {
            order_type: OrderType::Stop(stop_price),
            ..Self::market(account_id, symbol, side, quantity)
        }
    }
}

/// How long a circuit-breaker level halts trading
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltDuration {
    Minutes(u32),
    RestOfSession,
}

impl HaltDuration {
    /// -1 means rest of session; other negative values are invalid.
    pub fn from_minutes(minutes: i64) -> Option<Self> {
        match minutes {
            -1 => Some(HaltDuration::RestOfSession),
            m if m >= 0 => u32::try_from(m).ok().map(HaltDuration::Minutes),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CircuitBreakerTrip {
    pub symbol: String,
    pub level_percent: f64,
    pub move_percent: f64,
    pub halt: HaltDuration,
}

/// Outcome of an accepted order
#[derive(Debug, Clone)]
pub struct OrderFill {
    pub account_id: String,
    pub symbol: String,
    pub side: OrderSide,
    pub quantity: f64,
    pub reference_price: f64,
    pub fill_price: f64,
    pub notional: Decimal,
    pub fee: Decimal,
    /// Cost to the buyer (notional + fee) or proceeds to the seller (notional - fee)
    pub total: Decimal,
    pub circuit_breaker: Option<CircuitBreakerTrip>,
    pub timestamp: DateTime<Utc>,
}

impl OrderFill {
    pub fn circuit_breaker_triggered(&self) -> bool {
        self.circuit_breaker.is_some()
    }
}
