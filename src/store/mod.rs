//! Collaborator contracts consumed by the lending engine
//!
//! The engine never talks to a database directly. It reads and writes loan
//! records through [`LoanStore`], reads people through [`PersonProvider`],
//! reads and flips resource availability through [`ResourceProvider`], and
//! seeds the status vocabulary through [`LoanStatusCatalog`].
//!
//! Two adapters ship with the crate: PostgreSQL (via sqlx) and an in-memory
//! store used by tests and local runs.

mod memory;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::ApiResult;
use crate::loan::{Loan, LoanFilter, LoanPatch, LoanSort, NewLoan, PageRequest};
use crate::models::{Availability, Person, Resource};

pub use memory::InMemoryLendingStore;
pub use postgres::PgLendingStore;

/// Durable loan records
#[async_trait]
pub trait LoanStore: Send + Sync {
    async fn find(
        &self,
        filter: &LoanFilter,
        sort: LoanSort,
        page: Option<PageRequest>,
    ) -> ApiResult<Vec<Loan>>;

    async fn count(&self, filter: &LoanFilter) -> ApiResult<i64>;

    async fn find_one(&self, id: Uuid) -> ApiResult<Option<Loan>>;

    /// Insert an `active` loan and flip its resource from available to
    /// borrowed in one atomic step.
    ///
    /// Returns `Conflict` when the resource is no longer available or already
    /// has an open loan, and `NotFound` when the resource does not exist.
    async fn insert(&self, loan: NewLoan) -> ApiResult<Loan>;

    /// Apply `patch` only while the loan is in one of `patch.expected`.
    ///
    /// Returns `NotFound` for an unknown id and `InvalidState` when the
    /// current status is not expected.
    async fn update(&self, id: Uuid, patch: LoanPatch) -> ApiResult<Loan>;
}

#[async_trait]
pub trait PersonProvider: Send + Sync {
    /// `NotFound` for an unknown id
    async fn get_person(&self, id: Uuid) -> ApiResult<Person>;
}

#[async_trait]
pub trait ResourceProvider: Send + Sync {
    /// `NotFound` for an unknown id
    async fn get_resource(&self, id: Uuid) -> ApiResult<Resource>;

    async fn set_availability(&self, id: Uuid, availability: Availability) -> ApiResult<()>;
}

/// Loan status reference vocabulary
#[async_trait]
pub trait LoanStatusCatalog: Send + Sync {
    async fn verify_loan_statuses_exist(&self) -> ApiResult<bool>;

    /// Insert missing statuses, leaving existing rows untouched
    async fn seed_loan_statuses(&self) -> ApiResult<()>;
}
