//! API handlers for LendingDesk

pub mod eligibility;
pub mod health;
pub mod loans;
pub mod overdue;
pub mod statistics;

pub use eligibility::*;
pub use health::*;
pub use loans::*;
pub use overdue::*;
pub use statistics::*;
