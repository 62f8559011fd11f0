//! Price and volume validation functions

use rust_decimal::prelude::*;
use crate::errors::{ValuationError, ValuationResult};

pub fn validate_price(price: Decimal, exchange: &str) -> ValuationResult<()> {
    if price <= Decimal::ZERO {
        return Err(ValuationError::InvalidPrice {
            exchange: exchange.to_string(),
            price,
        });
    }

    Ok(())
}

pub fn validate_volume(volume: Decimal, exchange: &str) -> ValuationResult<()> {
    if volume < Decimal::ZERO {
        return Err(ValuationError::InvalidVolume {
            exchange: exchange.to_string(),
            volume,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn rejects_non_positive_prices() {
        assert!(validate_price(dec!(2450.10), "binance").is_ok());
        assert_eq!(
            validate_price(dec!(0), "kraken"),
            Err(ValuationError::InvalidPrice { exchange: "kraken".into(), price: dec!(0) })
        );
        assert!(validate_price(dec!(-1), "kraken").is_err());
    }

    #[test]
    fn zero_volume_is_allowed() {
        assert!(validate_volume(dec!(0), "uniswap").is_ok());
        assert!(validate_volume(dec!(-0.5), "uniswap").is_err());
    }
}
