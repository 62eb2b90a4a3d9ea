//! Startup seeding of the loan status vocabulary

use crate::config::Environment;
use crate::store::LoanStatusCatalog;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    /// Test environments manage their own fixtures
    Skipped,
    AlreadyPresent,
    Seeded,
    /// Logged, never fatal
    Failed,
}

/// Make sure every loan status exists in the catalog.
///
/// Failures are logged and reported through the outcome; startup carries on.
pub async fn ensure_loan_statuses(
    catalog: &dyn LoanStatusCatalog,
    environment: &Environment,
) -> SeedOutcome {
    if environment.is_test() {
        tracing::debug!("Skipping loan status seed in test environment");
        return SeedOutcome::Skipped;
    }

    match catalog.verify_loan_statuses_exist().await {
        Ok(true) => {
            tracing::info!("Loan statuses already present");
            return SeedOutcome::AlreadyPresent;
        }
        Ok(false) => {}
        Err(e) => {
            tracing::error!(error = %e, "Failed to verify loan statuses");
            return SeedOutcome::Failed;
        }
    }

    match catalog.seed_loan_statuses().await {
        Ok(()) => {
            tracing::info!("Seeded loan statuses");
            SeedOutcome::Seeded
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to seed loan statuses");
            SeedOutcome::Failed
        }
    }
}
