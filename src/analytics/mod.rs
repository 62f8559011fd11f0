//! Reporting over stored opportunities

pub mod summary;
pub mod report;

pub use summary::*;
pub use report::*;
