//! In-memory lending store
//!
//! One mutex guards loans, people, resources and the status vocabulary, so
//! every check-and-set (resource availability on loan creation, guarded loan
//! updates) is atomic. Useful for testing and local development.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{LoanStatusCatalog, LoanStore, PersonProvider, ResourceProvider};
use crate::error::{ApiError, ApiResult};
use crate::loan::{Loan, LoanFilter, LoanPatch, LoanSort, LoanStatus, LoanStatusRecord, NewLoan, PageRequest};
use crate::models::{Availability, Person, Resource};

#[derive(Debug, Default)]
struct State {
    loans: HashMap<Uuid, Loan>,
    people: HashMap<Uuid, Person>,
    resources: HashMap<Uuid, Resource>,
    statuses: Vec<LoanStatusRecord>,
}

#[derive(Debug, Clone, Default)]
pub struct InMemoryLendingStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryLendingStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> ApiResult<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| ApiError::InternalError("Failed to acquire store lock".to_string()))
    }

    pub fn add_person(&self, person: Person) -> ApiResult<()> {
        self.lock()?.people.insert(person.id, person);
        Ok(())
    }

    pub fn add_resource(&self, resource: Resource) -> ApiResult<()> {
        self.lock()?.resources.insert(resource.id, resource);
        Ok(())
    }

    /// Store a loan record as-is, bypassing availability checks.
    /// Meant for loading history.
    pub fn put_loan(&self, loan: Loan) -> ApiResult<()> {
        self.lock()?.loans.insert(loan.id, loan);
        Ok(())
    }

    pub fn loan_statuses(&self) -> ApiResult<Vec<LoanStatusRecord>> {
        Ok(self.lock()?.statuses.clone())
    }
}

#[async_trait]
impl LoanStore for InMemoryLendingStore {
    async fn find(
        &self,
        filter: &LoanFilter,
        sort: LoanSort,
        page: Option<PageRequest>,
    ) -> ApiResult<Vec<Loan>> {
        let state = self.lock()?;
        let mut loans: Vec<Loan> = state
            .loans
            .values()
            .filter(|l| filter.matches(l))
            .cloned()
            .collect();

        match sort {
            LoanSort::NewestFirst => {
                loans.sort_by(|a, b| b.loan_date.cmp(&a.loan_date).then(a.id.cmp(&b.id)))
            }
            LoanSort::OldestFirst => {
                loans.sort_by(|a, b| a.loan_date.cmp(&b.loan_date).then(a.id.cmp(&b.id)))
            }
        }

        Ok(match page {
            Some(p) => loans
                .into_iter()
                .skip(p.offset.max(0) as usize)
                .take(p.limit.max(0) as usize)
                .collect(),
            None => loans,
        })
    }

    async fn count(&self, filter: &LoanFilter) -> ApiResult<i64> {
        let state = self.lock()?;
        Ok(state.loans.values().filter(|l| filter.matches(l)).count() as i64)
    }

    async fn find_one(&self, id: Uuid) -> ApiResult<Option<Loan>> {
        Ok(self.lock()?.loans.get(&id).cloned())
    }

    async fn insert(&self, new_loan: NewLoan) -> ApiResult<Loan> {
        let mut state = self.lock()?;

        let has_open_loan = state
            .loans
            .values()
            .any(|l| l.resource_id == new_loan.resource_id && l.is_open());

        let resource = state
            .resources
            .get_mut(&new_loan.resource_id)
            .ok_or_else(|| ApiError::NotFound(format!("Resource {}", new_loan.resource_id)))?;

        if resource.availability != Availability::Available || has_open_loan {
            return Err(ApiError::Conflict(format!(
                "Resource {} is already on loan",
                new_loan.resource_id
            )));
        }
        resource.availability = Availability::Borrowed;

        let now = Utc::now();
        let loan = Loan {
            id: Uuid::new_v4(),
            person_id: new_loan.person_id,
            resource_id: new_loan.resource_id,
            loan_date: new_loan.loan_date,
            due_date: new_loan.due_date,
            return_date: None,
            status: LoanStatus::Active,
            created_at: now,
            updated_at: now,
        };
        state.loans.insert(loan.id, loan.clone());

        Ok(loan)
    }

    async fn update(&self, id: Uuid, patch: LoanPatch) -> ApiResult<Loan> {
        let mut state = self.lock()?;
        let loan = state
            .loans
            .get_mut(&id)
            .ok_or_else(|| ApiError::NotFound(format!("Loan {}", id)))?;

        if !patch.expected.contains(&loan.status) {
            return Err(ApiError::InvalidState(format!(
                "Loan {} is {}",
                id, loan.status
            )));
        }

        loan.status = patch.status;
        loan.return_date = patch.return_date;
        loan.updated_at = Utc::now();

        Ok(loan.clone())
    }
}

#[async_trait]
impl PersonProvider for InMemoryLendingStore {
    async fn get_person(&self, id: Uuid) -> ApiResult<Person> {
        self.lock()?
            .people
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("Person {}", id)))
    }
}

#[async_trait]
impl ResourceProvider for InMemoryLendingStore {
    async fn get_resource(&self, id: Uuid) -> ApiResult<Resource> {
        self.lock()?
            .resources
            .get(&id)
            .cloned()
            .ok_or_else(|| ApiError::NotFound(format!("Resource {}", id)))
    }

    async fn set_availability(&self, id: Uuid, availability: Availability) -> ApiResult<()> {
        let mut state = self.lock()?;
        let resource = state
            .resources
            .get_mut(&id)
            .ok_or_else(|| ApiError::NotFound(format!("Resource {}", id)))?;
        resource.availability = availability;
        Ok(())
    }
}

#[async_trait]
impl LoanStatusCatalog for InMemoryLendingStore {
    async fn verify_loan_statuses_exist(&self) -> ApiResult<bool> {
        let state = self.lock()?;
        Ok(LoanStatus::ALL
            .iter()
            .all(|s| state.statuses.iter().any(|r| r.name == s.as_str())))
    }

    async fn seed_loan_statuses(&self) -> ApiResult<()> {
        let mut state = self.lock()?;
        for status in LoanStatus::ALL {
            if !state.statuses.iter().any(|r| r.name == status.as_str()) {
                state.statuses.push(status.into());
            }
        }
        Ok(())
    }
}
