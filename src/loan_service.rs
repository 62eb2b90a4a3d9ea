//! Loan service layer - Business logic for the loan lifecycle
//!
//! ```text
//! active ──return──▶ returned
//!   │  ╲
//!   │   ╲─(due date passes)─▶ overdue ──return──▶ returned
//!   │                           │
//!   └──────mark lost────────────┴──mark lost──▶ lost
//! ```

use std::sync::Arc;

use uuid::Uuid;

use crate::clock::Clock;
use crate::config::EngineSettings;
use crate::error::{ApiError, ApiResult};
use crate::loan::{
    CreateLoanRequest, ListLoansQuery, Loan, LoanFilter, LoanPatch, LoanSort, LoanView, NewLoan,
    PageRequest,
};
use crate::models::{Availability, PaginatedResponse, PaginationParams};
use crate::services::eligibility::EligibilityEvaluator;
use crate::services::overdue::{classify, materialize_overdue};
use crate::store::{LoanStore, ResourceProvider};

/// Loan service for managing loan lifecycle
#[derive(Clone)]
pub struct LoanService {
    store: Arc<dyn LoanStore>,
    resources: Arc<dyn ResourceProvider>,
    eligibility: EligibilityEvaluator,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl LoanService {
    /// Create a new loan service instance
    pub fn new(
        store: Arc<dyn LoanStore>,
        resources: Arc<dyn ResourceProvider>,
        eligibility: EligibilityEvaluator,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            resources,
            eligibility,
            clock,
            settings,
        }
    }

    /// Lend a resource.
    ///
    /// Eligibility is re-checked here with the requested resource; a refusal
    /// becomes `Denied`. A concurrent loan of the same resource that slips
    /// past the check is reported by the store as `Conflict`.
    pub async fn create_loan(&self, request: CreateLoanRequest) -> ApiResult<LoanView> {
        request.validate()?;

        let (person, decision) = self
            .eligibility
            .assess(request.person_id, Some(request.resource_id))
            .await?;
        if !decision.allowed {
            return Err(ApiError::denied(decision));
        }

        let now = self.clock.now();
        let due_date = self
            .settings
            .lending
            .due_date_for(person.person_type, now)
            .ok_or_else(|| {
                ApiError::InternalError(format!(
                    "Loan period for {} is out of range",
                    person.person_type.as_str()
                ))
            })?;

        let loan = self
            .store
            .insert(NewLoan {
                person_id: request.person_id,
                resource_id: request.resource_id,
                loan_date: now,
                due_date,
            })
            .await
            .map_err(|e| {
                if matches!(e, ApiError::Conflict(_)) {
                    tracing::warn!(
                        resource_id = %request.resource_id,
                        "Concurrent loan creation lost the race"
                    );
                }
                e
            })?;

        tracing::info!(
            loan_id = %loan.id,
            person_id = %loan.person_id,
            resource_id = %loan.resource_id,
            due_date = %loan.due_date,
            "Loan created"
        );

        Ok(self.view(loan))
    }

    /// Close an open loan and put the resource back on the shelf
    pub async fn return_loan(&self, id: Uuid) -> ApiResult<LoanView> {
        let loan = self.load_open(id).await?;

        // Never let the return predate the loan, whatever the clock says
        let returned_at = self.clock.now().max(loan.loan_date);
        let loan = self.store.update(id, LoanPatch::returned(returned_at)).await?;

        self.resources
            .set_availability(loan.resource_id, Availability::Available)
            .await?;

        tracing::info!(loan_id = %loan.id, resource_id = %loan.resource_id, "Loan returned");

        Ok(self.view(loan))
    }

    /// Administrative close: the resource will not come back
    pub async fn mark_lost(&self, id: Uuid) -> ApiResult<LoanView> {
        self.load_open(id).await?;

        let loan = self.store.update(id, LoanPatch::lost()).await?;

        self.resources
            .set_availability(loan.resource_id, Availability::Lost)
            .await?;

        tracing::info!(loan_id = %loan.id, resource_id = %loan.resource_id, "Loan marked lost");

        Ok(self.view(loan))
    }

    /// Get loan by ID
    pub async fn get_loan(&self, id: Uuid) -> ApiResult<LoanView> {
        let loan = self
            .store
            .find_one(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Loan {}", id)))?;

        let loan = materialize_overdue(self.store.as_ref(), loan, self.clock.now()).await;
        Ok(self.view(loan))
    }

    /// List loans with filters, newest first
    pub async fn list_loans(&self, query: ListLoansQuery) -> ApiResult<PaginatedResponse<LoanView>> {
        let (page, limit) = PaginationParams {
            page: query.page,
            limit: query.limit,
        }
        .resolve(self.settings.default_page_size, self.settings.max_page_size);

        let now = self.clock.now();
        let mut filter = LoanFilter {
            person_id: query.person_id,
            resource_id: query.resource_id,
            ..LoanFilter::default()
        };
        if let Some(status) = query.status {
            filter = filter.with_live_status(status, now);
        }

        let total = self.store.count(&filter).await?;
        let loans = self
            .store
            .find(&filter, LoanSort::NewestFirst, Some(PageRequest::new(page, limit)))
            .await?;

        let mut data = Vec::with_capacity(loans.len());
        for loan in loans {
            let loan = materialize_overdue(self.store.as_ref(), loan, now).await;
            data.push(self.view(loan));
        }

        Ok(PaginatedResponse {
            data,
            total,
            page,
            limit,
        })
    }

    async fn load_open(&self, id: Uuid) -> ApiResult<Loan> {
        let loan = self
            .store
            .find_one(id)
            .await?
            .ok_or_else(|| ApiError::NotFound(format!("Loan {}", id)))?;

        if !loan.is_open() {
            return Err(ApiError::InvalidState(format!(
                "Loan {} is already {}",
                id, loan.status
            )));
        }
        Ok(loan)
    }

    fn view(&self, loan: Loan) -> LoanView {
        let classification = classify(&loan, self.clock.now(), &self.settings.severity);
        LoanView {
            loan,
            classification,
        }
    }
}
