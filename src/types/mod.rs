//! Core data types and structures

pub mod analysis;
pub mod exchange;
pub mod fees;
pub mod market;
pub mod multi_exchange;
pub mod opportunity;
pub mod pair;
pub mod priority;
pub mod token;

pub use analysis::*;
pub use exchange::*;
pub use fees::*;
pub use market::*;
pub use multi_exchange::*;
pub use opportunity::*;
pub use pair::*;
pub use priority::*;
pub use token::*;
