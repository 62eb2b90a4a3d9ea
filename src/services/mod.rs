//! Business logic services for LendingDesk

pub mod bootstrap;
pub mod eligibility;
pub mod overdue;
pub mod statistics;

pub use bootstrap::{ensure_loan_statuses, SeedOutcome};
pub use eligibility::{DenialReason, EligibilityDecision, EligibilityEvaluator};
pub use overdue::{OverdueService, Severity};
pub use statistics::StatisticsService;

// Note: LoanService lives at the crate root next to the loan models
