//! Document stores and the opportunity journal

pub mod query;
pub mod opportunities;
pub mod multi_exchange;
pub mod tokens;
pub mod exchanges;
pub mod analysis;
pub mod journal;

pub use query::*;
pub use opportunities::*;
pub use multi_exchange::*;
pub use tokens::*;
pub use exchanges::*;
pub use analysis::*;
pub use journal::*;
