//! Wiggle Service - cost-aware arbitrage opportunity valuation
//!
//! Turns raw multi-exchange price observations into ranked, cost-adjusted
//! opportunities, keeps per-token scan documents with scheduling hints, and
//! stores and reports on the results.

pub mod config;
pub mod types;
pub mod errors;
pub mod validation;
pub mod valuation;
pub mod storage;
pub mod analytics;
pub mod utils;

// Re-export commonly used items
pub use config::{Config, ValuationConfig, CONFIG};
pub use errors::{StoreError, StoreResult, ValuationError, ValuationResult};
pub use types::*;
