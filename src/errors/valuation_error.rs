//! Custom error types for the valuation core

use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValuationError {
    #[error("Invalid capital: capital_required_usd must be greater than zero, got {capital_usd}")]
    InvalidCapital {
        capital_usd: Decimal,
    },

    #[error("Invalid confidence score {score}: must be within [0, 1]")]
    InvalidConfidence {
        score: Decimal,
    },

    #[error("Insufficient exchanges for {symbol}: need at least 2 distinct, got {found}")]
    InsufficientExchanges {
        symbol: String,
        found: usize,
    },

    #[error("Stale derived value: {field} - {details}")]
    StaleDerivedValue {
        field: String,
        details: String,
    },

    #[error("Invalid cost input: {field} must not be negative, got {value}")]
    InvalidCost {
        field: &'static str,
        value: Decimal,
    },

    #[error("Invalid price on {exchange}: {price} is zero or negative")]
    InvalidPrice {
        exchange: String,
        price: Decimal,
    },

    #[error("Invalid volume on {exchange}: {volume} is negative")]
    InvalidVolume {
        exchange: String,
        volume: Decimal,
    },

    #[error("Invalid duration: expected hours must be greater than zero, got {hours}")]
    InvalidDuration {
        hours: Decimal,
    },

    #[error("Observation for {symbol} has no exchange name")]
    MissingExchange {
        symbol: String,
    },

    #[error("Observation symbol {found} does not match scanned symbol {expected}")]
    SymbolMismatch {
        expected: String,
        found: String,
    },

    #[error("Value out of range: {operation} overflows a decimal")]
    OutOfRange {
        operation: &'static str,
    },
}

impl ValuationError {
    /// Short machine-readable kind, used as a counter key in scan statistics.
    pub fn kind(&self) -> &'static str {
        match self {
            ValuationError::InvalidCapital { .. } => "invalid_capital",
            ValuationError::InvalidConfidence { .. } => "invalid_confidence",
            ValuationError::InsufficientExchanges { .. } => "insufficient_exchanges",
            ValuationError::StaleDerivedValue { .. } => "stale_derived_value",
            ValuationError::InvalidCost { .. } => "invalid_cost",
            ValuationError::InvalidPrice { .. } => "invalid_price",
            ValuationError::InvalidVolume { .. } => "invalid_volume",
            ValuationError::InvalidDuration { .. } => "invalid_duration",
            ValuationError::MissingExchange { .. } => "missing_exchange",
            ValuationError::SymbolMismatch { .. } => "symbol_mismatch",
            ValuationError::OutOfRange { .. } => "out_of_range",
        }
    }
}

pub type ValuationResult<T> = Result<T, ValuationError>;
