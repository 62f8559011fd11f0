//! Validation functions for prices, costs and opportunity records

pub mod price;
pub mod opportunity;

pub use price::*;
pub use opportunity::*;
