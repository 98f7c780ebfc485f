// src/config.rs
use crate::domain::errors::{AppError, AppResult};
use crate::domain::models::{HaltDuration, OrderKind, Sector, DEFAULT_HISTORY_CAPACITY};
use dotenv::dotenv;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

/// Longest per-account cooldown accepted (one day)
pub const MAX_COOLDOWN_MS: u64 = 86_400_000;

/// Market simulation configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Tick scheduling and instrument universe
    pub market: MarketConfig,

    /// Anti-manipulation price dampening
    pub threshold: PriceThresholdConfig,

    /// Trading economics rules
    pub trading: TradingConfig,

    /// Wallet backend selection
    pub economy: EconomyConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

/// Tick scheduling and instrument universe
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketConfig {
    /// Milliseconds between price ticks
    pub tick_interval_ms: u64,

    /// Seconds between trading-activity counter resets
    pub activity_reset_interval_secs: u64,

    /// Price history points kept per instrument
    pub history_capacity: usize,

    /// Fixed RNG seed for reproducible runs
    pub seed: Option<u64>,

    /// Instruments listed at startup
    pub instruments: Vec<InstrumentConfig>,
}

/// Instrument listed at startup
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    pub symbol: String,
    pub sector: Sector,
    pub initial_price: f64,
    pub volatility_rating: f64,
    #[serde(default)]
    pub shares_outstanding: f64,
}

/// Dampening controller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriceThresholdConfig {
    /// Master switch; disabled means dampening is always 1.0
    pub enabled: bool,

    /// Impacts at or below this magnitude are never dampened (0.15 = 15%)
    pub max_change_percent: f64,

    /// Current/initial price ratio above which dampening may apply
    pub price_multiplier_threshold: f64,

    /// Multiplier applied to thinly traded instruments
    pub dampening_factor: f64,

    /// Volume at which real liquidity starts releasing the brake
    pub min_volume_threshold: f64,

    /// How quickly volume above the threshold releases the brake
    pub volume_sensitivity: f64,
}

impl Default for PriceThresholdConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_change_percent: 0.15,
            price_multiplier_threshold: 5.0,
            dampening_factor: 0.5,
            min_volume_threshold: 100.0,
            volume_sensitivity: 0.5,
        }
    }
}

impl PriceThresholdConfig {
    pub fn validate(&self) -> AppResult<()> {
        if !(0.0..=1.0).contains(&self.dampening_factor) {
            return Err(AppError::Config(format!(
                "dampening_factor must be within [0, 1], got {}",
                self.dampening_factor
            )));
        }
        if self.max_change_percent < 0.0 || self.price_multiplier_threshold <= 0.0 {
            return Err(AppError::Config(
                "max_change_percent must be >= 0 and price_multiplier_threshold > 0".to_string(),
            ));
        }
        if self.min_volume_threshold <= 0.0 || self.volume_sensitivity < 0.0 {
            return Err(AppError::Config(
                "min_volume_threshold must be > 0 and volume_sensitivity >= 0".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeeMode {
    Percent,
    Flat,
    Mixed,
}

/// Trading fee settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeeConfig {
    pub mode: FeeMode,

    /// Percent of notional (0.1 = 0.1%)
    pub percent: Decimal,

    /// Fixed fee per order
    pub flat: Decimal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SlippageMode {
    None,
    Linear,
    SqrtImpact,
}

/// Slippage model settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlippageConfig {
    pub mode: SlippageMode,
    pub coefficient: f64,
}

/// Circuit breaker settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CircuitBreakerConfig {
    pub enabled: bool,

    /// Ascending move thresholds in percent from the session open
    pub levels_percent: Vec<f64>,

    /// Halt length per level in minutes, -1 for the rest of the session
    pub halt_minutes: Vec<i64>,
}

impl CircuitBreakerConfig {
    /// Levels paired with their halt durations
    pub fn levels(&self) -> AppResult<Vec<(f64, HaltDuration)>> {
        if self.levels_percent.len() != self.halt_minutes.len() {
            return Err(AppError::Config(format!(
                "Circuit breaker has {} levels but {} halt durations",
                self.levels_percent.len(),
                self.halt_minutes.len()
            )));
        }

        let mut previous = 0.0;
        let mut levels = Vec::with_capacity(self.levels_percent.len());
        for (&level, &minutes) in self.levels_percent.iter().zip(self.halt_minutes.iter()) {
            if !(level > previous) || !level.is_finite() {
                return Err(AppError::Config(format!(
                    "Circuit breaker levels must be positive and strictly ascending, got {:?}",
                    self.levels_percent
                )));
            }
            let halt = HaltDuration::from_minutes(minutes).ok_or_else(|| {
                AppError::Config(format!("Invalid circuit breaker halt duration: {}", minutes))
            })?;
            levels.push((level, halt));
            previous = level;
        }

        Ok(levels)
    }
}

/// Trading economics configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TradingConfig {
    pub fees: FeeConfig,

    /// Largest quantity a single order may carry
    pub max_order_quantity: f64,

    /// Largest notional an account may trade over a trailing minute
    pub max_notional_per_minute: Decimal,

    /// Minimum milliseconds between two accepted orders of one account
    pub cooldown_ms: u64,

    pub circuit_breaker: CircuitBreakerConfig,

    /// Order types accepted by the market
    pub allowed_order_types: Vec<OrderKind>,

    pub slippage: SlippageConfig,
}

impl Default for TradingConfig {
    fn default() -> Self {
        Self {
            fees: FeeConfig {
                mode: FeeMode::Percent,
                percent: Decimal::new(1, 1), // 0.1%
                flat: Decimal::ZERO,
            },
            max_order_quantity: 10_000.0,
            max_notional_per_minute: Decimal::new(1_000_000, 0),
            cooldown_ms: 1_000,
            circuit_breaker: CircuitBreakerConfig {
                enabled: true,
                levels_percent: vec![10.0, 20.0, 30.0],
                halt_minutes: vec![5, 15, -1],
            },
            allowed_order_types: vec![OrderKind::Market, OrderKind::Limit, OrderKind::Stop],
            slippage: SlippageConfig {
                mode: SlippageMode::SqrtImpact,
                coefficient: 0.001,
            },
        }
    }
}

impl TradingConfig {
    pub fn validate(&self) -> AppResult<()> {
        if !(self.max_order_quantity > 0.0) {
            return Err(AppError::Config("max_order_quantity must be positive".to_string()));
        }
        if self.max_notional_per_minute <= Decimal::ZERO {
            return Err(AppError::Config("max_notional_per_minute must be positive".to_string()));
        }
        if self.fees.percent < Decimal::ZERO || self.fees.flat < Decimal::ZERO {
            return Err(AppError::Config("Fees must not be negative".to_string()));
        }
        if !(self.slippage.coefficient >= 0.0) {
            return Err(AppError::Config("Slippage coefficient must not be negative".to_string()));
        }
        if self.cooldown_ms > MAX_COOLDOWN_MS {
            return Err(AppError::Config(format!(
                "cooldown_ms must be at most {}, got {}",
                MAX_COOLDOWN_MS, self.cooldown_ms
            )));
        }
        self.circuit_breaker.levels()?;
        Ok(())
    }
}

/// Wallet backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EconomyConfig {
    /// Provider name (e.g., "internal")
    pub provider: String,

    /// Balance granted to accounts on first sight
    pub starting_balance: Decimal,
}

impl Default for EconomyConfig {
    fn default() -> Self {
        Self {
            provider: "internal".to_string(),
            starting_balance: Decimal::new(100_000, 0),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (e.g., "info", "debug", "warn", "error")
    pub level: String,

    /// Log to file
    pub to_file: bool,

    /// Log file path
    pub file_path: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            to_file: false,
            file_path: None,
        }
    }
}

impl Default for MarketConfig {
    fn default() -> Self {
        let listing = |symbol: &str, sector: Sector, price: f64, volatility: f64| InstrumentConfig {
            symbol: symbol.to_string(),
            sector,
            initial_price: price,
            volatility_rating: volatility,
            shares_outstanding: 1_000_000.0,
        };

        Self {
            tick_interval_ms: 5_000,
            activity_reset_interval_secs: 300,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            seed: None,
            instruments: vec![
                listing("TECH", Sector::Technology, 120.0, 0.6),
                listing("OILX", Sector::Energy, 75.0, 0.5),
                listing("BANK", Sector::Finance, 45.0, 0.3),
                listing("HOME", Sector::RealEstate, 30.0, 0.2),
                listing("MEDI", Sector::Healthcare, 60.0, 0.4),
            ],
        }
    }
}

/// Parse an environment variable, falling back to `default` when unset or malformed
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key).ok().and_then(|v| v.trim().parse().ok()).unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Starts from `MARKET_CONFIG_FILE` when set, otherwise from defaults,
    /// then applies individual overrides.
    pub fn from_env() -> AppResult<Self> {
        // Load .env file if it exists
        dotenv().ok();

        let mut config = match env::var("MARKET_CONFIG_FILE") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };

        // Market overrides
        config.market.tick_interval_ms = env_or("TICK_INTERVAL_MS", config.market.tick_interval_ms);
        config.market.activity_reset_interval_secs =
            env_or("ACTIVITY_RESET_INTERVAL_SECS", config.market.activity_reset_interval_secs);
        config.market.history_capacity = env_or("HISTORY_CAPACITY", config.market.history_capacity);
        if let Ok(seed) = env::var("SIM_SEED") {
            config.market.seed = Some(seed.trim().parse().map_err(|_| {
                AppError::Config(format!("SIM_SEED must be an unsigned integer, got {}", seed))
            })?);
        }

        // Threshold overrides
        config.threshold.enabled = env_or("DAMPENING_ENABLED", config.threshold.enabled);
        config.threshold.price_multiplier_threshold =
            env_or("PRICE_MULTIPLIER_THRESHOLD", config.threshold.price_multiplier_threshold);
        config.threshold.min_volume_threshold = env_or("MIN_VOLUME_THRESHOLD", config.threshold.min_volume_threshold);

        // Trading overrides
        config.trading.max_order_quantity = env_or("MAX_ORDER_QUANTITY", config.trading.max_order_quantity);
        config.trading.max_notional_per_minute =
            env_or("MAX_NOTIONAL_PER_MINUTE", config.trading.max_notional_per_minute);
        config.trading.cooldown_ms = env_or("ORDER_COOLDOWN_MS", config.trading.cooldown_ms);
        config.trading.circuit_breaker.enabled =
            env_or("CIRCUIT_BREAKER_ENABLED", config.trading.circuit_breaker.enabled);

        // Economy overrides
        if let Ok(provider) = env::var("ECONOMY_PROVIDER") {
            config.economy.provider = provider;
        }

        // Logging overrides
        if let Ok(level) = env::var("LOG_LEVEL") {
            config.logging.level = level;
        }
        config.logging.to_file = env_or("LOG_TO_FILE", config.logging.to_file);
        if let Ok(path) = env::var("LOG_FILE_PATH") {
            config.logging.file_path = Some(path);
        }

        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        let mut contents = String::new();
        File::open(path)?.read_to_string(&mut contents)?;

        let config: Config = serde_json::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> AppResult<()> {
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> AppResult<()> {
        self.threshold.validate()?;
        self.trading.validate()?;

        for instrument in &self.market.instruments {
            if !(instrument.initial_price > 0.0) {
                return Err(AppError::Config(format!(
                    "Instrument {} needs a positive initial price",
                    instrument.symbol
                )));
            }
        }

        if self.market.tick_interval_ms == 0 {
            return Err(AppError::Config("tick_interval_ms must be positive".to_string()));
        }

        Ok(())
    }

    /// Initialize logging based on configuration
    pub fn init_logging(&self) -> AppResult<()> {
        let mut builder = env_logger::Builder::new();

        // Set log level
        let log_level = match self.logging.level.to_lowercase().as_str() {
            "trace" => log::LevelFilter::Trace,
            "debug" => log::LevelFilter::Debug,
            "info" => log::LevelFilter::Info,
            "warn" => log::LevelFilter::Warn,
            "error" => log::LevelFilter::Error,
            _ => log::LevelFilter::Info,
        };

        builder.filter_level(log_level);

        // Configure output
        if self.logging.to_file {
            if let Some(file_path) = &self.logging.file_path {
                let file = File::create(file_path).map_err(|e| {
                    AppError::Config(format!("Failed to create log file: {}", e))
                })?;

                builder.target(env_logger::Target::Pipe(Box::new(file)));
            }
        }

        builder.try_init().map_err(|e| {
            AppError::Config(format!("Failed to initialize logger: {}", e))
        })?;

        Ok(())
    }
}
