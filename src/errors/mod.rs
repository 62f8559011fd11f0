//! Error types for valuation and storage

pub mod valuation_error;
pub mod store_error;

pub use valuation_error::*;
pub use store_error::*;
