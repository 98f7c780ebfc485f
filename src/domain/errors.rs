// src/domain/errors.rs
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Pricing error: {0}")]
    Pricing(#[from] PricingError),

    #[error("Trading error: {0}")]
    Trading(#[from] TradingError),

    #[error("Economy error: {0}")]
    Economy(#[from] EconomyError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Simulation error: {0}")]
    Simulation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PricingError {
    /// Zero, negative or non-finite reference price. Never divided through silently.
    #[error("Degenerate price for {symbol}: {price}")]
    ComputationDegenerate { symbol: String, price: f64 },

    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum TradingError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimitExceeded(String),

    #[error("Circuit breaker halted trading in {symbol}")]
    CircuitBreakerHalted {
        symbol: String,
        /// `None` means halted for the rest of the session.
        until: Option<DateTime<Utc>>,
    },

    #[error("Degenerate computation: {0}")]
    ComputationDegenerate(String),

    #[error("Unknown instrument: {0}")]
    UnknownInstrument(String),

    #[error("Fill costs {needed} but only {reserved} was reserved")]
    BudgetExceeded { needed: Decimal, reserved: Decimal },
}

impl TradingError {
    /// Short machine-friendly reason used in rejection logs.
    pub fn reason(&self) -> &'static str {
        match self {
            TradingError::Validation(_) => "VALIDATION",
            TradingError::RateLimitExceeded(_) => "RATE_LIMIT",
            TradingError::CircuitBreakerHalted { .. } => "HALTED",
            TradingError::ComputationDegenerate(_) => "DEGENERATE",
            TradingError::UnknownInstrument(_) => "UNKNOWN_INSTRUMENT",
            TradingError::BudgetExceeded { .. } => "BUDGET",
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EconomyError {
    #[error("Insufficient funds in {account}: needed {needed}, available {available}")]
    InsufficientFunds {
        account: String,
        needed: Decimal,
        available: Decimal,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(Decimal),

    #[error("Unknown economy provider: {0}")]
    UnknownProvider(String),
}

// Result type alias for convenience
pub type AppResult<T> = Result<T, AppError>;
pub type PricingResult<T> = Result<T, PricingError>;
pub type TradingResult<T> = Result<T, TradingError>;
pub type EconomyResult<T> = Result<T, EconomyError>;
