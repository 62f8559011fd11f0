//! Record-level invariant checks for opportunities

use rust_decimal::prelude::*;
use crate::errors::{ValuationError, ValuationResult};

pub fn validate_capital(capital_usd: Decimal) -> ValuationResult<()> {
    if capital_usd <= Decimal::ZERO {
        return Err(ValuationError::InvalidCapital { capital_usd });
    }
    Ok(())
}

pub fn validate_cost(field: &'static str, value: Decimal) -> ValuationResult<()> {
    if value < Decimal::ZERO {
        return Err(ValuationError::InvalidCost { field, value });
    }
    Ok(())
}

pub fn validate_confidence(score: Decimal) -> ValuationResult<()> {
    if score < Decimal::ZERO || score > Decimal::ONE {
        return Err(ValuationError::InvalidConfidence { score });
    }
    Ok(())
}

pub fn validate_duration(hours: Decimal) -> ValuationResult<()> {
    if hours <= Decimal::ZERO {
        return Err(ValuationError::InvalidDuration { hours });
    }
    Ok(())
}

/// Trims, drops empties and duplicates (first occurrence wins) and requires
/// at least two distinct exchanges.
pub fn distinct_exchanges<I, S>(symbol: &str, exchanges: I) -> ValuationResult<Vec<String>>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut distinct: Vec<String> = Vec::new();
    for exchange in exchanges {
        let name = exchange.as_ref().trim();
        if name.is_empty() || distinct.iter().any(|e| e == name) {
            continue;
        }
        distinct.push(name.to_string());
    }

    if distinct.len() < 2 {
        return Err(ValuationError::InsufficientExchanges {
            symbol: symbol.to_string(),
            found: distinct.len(),
        });
    }

    Ok(distinct)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn capital_must_be_strictly_positive() {
        assert!(validate_capital(dec!(0.01)).is_ok());
        assert_eq!(
            validate_capital(dec!(0)),
            Err(ValuationError::InvalidCapital { capital_usd: dec!(0) })
        );
        assert!(validate_capital(dec!(-100)).is_err());
    }

    #[test]
    fn confidence_bounds_are_inclusive() {
        assert!(validate_confidence(dec!(0)).is_ok());
        assert!(validate_confidence(dec!(1)).is_ok());
        assert!(validate_confidence(dec!(1.01)).is_err());
        assert!(validate_confidence(dec!(-0.01)).is_err());
    }

    #[test]
    fn duplicate_exchanges_do_not_count_twice() {
        let err = distinct_exchanges("ETH", ["binance", " binance", ""]).unwrap_err();
        assert_eq!(err, ValuationError::InsufficientExchanges { symbol: "ETH".into(), found: 1 });

        let ok = distinct_exchanges("ETH", ["binance", "uniswap", "binance"]).unwrap();
        assert_eq!(ok, vec!["binance".to_string(), "uniswap".to_string()]);
    }
}
