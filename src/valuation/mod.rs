//! Cost-aware valuation, ranking and scan prioritisation

pub mod cost;
pub mod ranking;
pub mod priority;
pub mod scan;
pub mod batch;

pub use cost::*;
pub use ranking::*;
pub use priority::*;
pub use scan::*;
pub use batch::*;
