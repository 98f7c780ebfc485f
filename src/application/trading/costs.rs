// src/application/trading/costs.rs
// Fee and slippage rules

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;

use crate::config::{FeeConfig, FeeMode, SlippageConfig, SlippageMode};
use crate::domain::models::{OrderSide, MIN_PRICE};

/// Decimal places kept on monetary amounts
const MONEY_SCALE: u32 = 8;

/// Convert a float amount to money, `None` for non-finite input
pub fn to_money(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value).map(|amount| amount.round_dp(MONEY_SCALE))
}

/// Fee charged on a fill of the given notional
pub fn compute_fee(config: &FeeConfig, notional: Decimal) -> Decimal {
    let percent_fee = notional * config.percent / Decimal::new(100, 0);

    let fee = match config.mode {
        FeeMode::Percent => percent_fee,
        FeeMode::Flat => config.flat,
        FeeMode::Mixed => percent_fee + config.flat,
    };

    fee.round_dp(MONEY_SCALE)
}

/// Reference price moved against the trader by the configured slippage model
pub fn slipped_price(config: &SlippageConfig, reference: f64, quantity: f64, side: OrderSide) -> f64 {
    let impact = match config.mode {
        SlippageMode::None => 0.0,
        SlippageMode::Linear => config.coefficient * quantity,
        SlippageMode::SqrtImpact => config.coefficient * quantity.sqrt(),
    };

    (reference * (1.0 + side.adverse_sign() * impact)).max(MIN_PRICE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use rust_decimal_macros::dec;

    fn fees(mode: FeeMode) -> FeeConfig {
        FeeConfig {
            mode,
            percent: dec!(0.5),
            flat: dec!(2),
        }
    }

    #[test]
    fn test_fee_modes() {
        assert_eq!(compute_fee(&fees(FeeMode::Percent), dec!(1000)), dec!(5));
        assert_eq!(compute_fee(&fees(FeeMode::Flat), dec!(1000)), dec!(2));
        assert_eq!(compute_fee(&fees(FeeMode::Mixed), dec!(1000)), dec!(7));
    }

    #[test]
    fn test_no_slippage() {
        let config = SlippageConfig { mode: SlippageMode::None, coefficient: 0.5 };
        assert_eq!(slipped_price(&config, 100.0, 50.0, OrderSide::Buy), 100.0);
        assert_eq!(slipped_price(&config, 100.0, 50.0, OrderSide::Sell), 100.0);
    }

    #[test]
    fn test_linear_slippage_is_adverse() {
        let config = SlippageConfig { mode: SlippageMode::Linear, coefficient: 0.001 };
        assert_relative_eq!(slipped_price(&config, 100.0, 10.0, OrderSide::Buy), 101.0, epsilon = 1e-9);
        assert_relative_eq!(slipped_price(&config, 100.0, 10.0, OrderSide::Sell), 99.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sqrt_impact_slippage() {
        let config = SlippageConfig { mode: SlippageMode::SqrtImpact, coefficient: 0.01 };
        assert_relative_eq!(slipped_price(&config, 100.0, 16.0, OrderSide::Buy), 104.0, epsilon = 1e-9);
        assert_relative_eq!(slipped_price(&config, 100.0, 16.0, OrderSide::Sell), 96.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sell_slippage_floors_at_min_price() {
        let config = SlippageConfig { mode: SlippageMode::Linear, coefficient: 1.0 };
        assert_eq!(slipped_price(&config, 1.0, 5.0, OrderSide::Sell), MIN_PRICE);
    }

    #[test]
    fn test_to_money() {
        assert_eq!(to_money(12.5), Some(dec!(12.5)));
        assert_eq!(to_money(f64::NAN), None);
    }
}
