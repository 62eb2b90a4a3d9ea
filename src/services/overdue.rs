//! Overdue classification and reporting
//!
//! Overdue state is derived from the due date and the clock at read time.
//! The stored `overdue` label is only a cache of that derivation: it is
//! written opportunistically when a stale `active` loan is read, and never
//! trusted by the checks in this crate.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::{EngineSettings, SeverityThresholds};
use crate::error::{ApiError, ApiResult};
use crate::loan::{Loan, LoanFilter, LoanPatch, LoanSort, LoanStatus, PageRequest};
use crate::models::{PaginatedResponse, PaginationParams, Person, PersonType, Resource};
use crate::store::{LoanStore, PersonProvider, ResourceProvider};

// ============================================================================
// Classification
// ============================================================================

/// Severity tier of an overdue loan
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// [1, medium)
    Low,
    /// [medium, high)
    Medium,
    /// [high, critical)
    High,
    /// [critical, ∞)
    Critical,
}

impl Severity {
    pub const ALL: [Severity; 4] = [
        Severity::Low,
        Severity::Medium,
        Severity::High,
        Severity::Critical,
    ];

    /// `None` when the loan is not overdue at all
    pub fn from_days(days_overdue: i64, thresholds: &SeverityThresholds) -> Option<Self> {
        match days_overdue {
            d if d >= thresholds.critical => Some(Severity::Critical),
            d if d >= thresholds.high => Some(Severity::High),
            d if d >= thresholds.medium => Some(Severity::Medium),
            d if d >= 1 => Some(Severity::Low),
            _ => None,
        }
    }
}

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct Classification {
    pub days_overdue: i64,
    pub severity: Option<Severity>,
}

impl Classification {
    pub fn is_overdue(&self) -> bool {
        self.days_overdue > 0
    }
}

/// Whole days elapsed since `due_date`, never negative
pub fn days_overdue(due_date: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - due_date).num_days().max(0)
}

/// Classify a loan at `now`. Closed loans (returned, lost) are never overdue.
pub fn classify(loan: &Loan, now: DateTime<Utc>, thresholds: &SeverityThresholds) -> Classification {
    let days = if loan.is_open() {
        days_overdue(loan.due_date, now)
    } else {
        0
    };
    Classification {
        days_overdue: days,
        severity: Severity::from_days(days, thresholds),
    }
}

/// Live overdue check, independent of the stored label
pub fn is_overdue(loan: &Loan, now: DateTime<Utc>) -> bool {
    loan.is_open() && days_overdue(loan.due_date, now) > 0
}

/// Flip a stale `active` label to `overdue`. Failures are logged and the
/// original record is returned; a read never fails because of this write.
pub async fn materialize_overdue(store: &dyn LoanStore, loan: Loan, now: DateTime<Utc>) -> Loan {
    if loan.status != LoanStatus::Active || !is_overdue(&loan, now) {
        return loan;
    }

    match store.update(loan.id, LoanPatch::mark_overdue()).await {
        Ok(updated) => {
            tracing::debug!(loan_id = %loan.id, "Materialized overdue status");
            updated
        }
        Err(e) => {
            tracing::warn!(loan_id = %loan.id, error = %e, "Failed to materialize overdue status");
            loan
        }
    }
}

// ============================================================================
// Fines
// ============================================================================

/// Source of the monetary amount owed for an overdue loan
pub trait FineSchedule: Send + Sync {
    fn amount_for(&self, record: &OverdueRecord) -> f64;
}

/// No fine policy configured
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFines;

impl FineSchedule for NoFines {
    fn amount_for(&self, _record: &OverdueRecord) -> f64 {
        0.0
    }
}

// ============================================================================
// Bulk query models
// ============================================================================

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OverdueSortField {
    #[default]
    DaysOverdue,
    DueDate,
    LoanDate,
    PersonName,
    ResourceTitle,
}

#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

/// Filters for the overdue listing. Due date bounds are half open.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct OverdueQuery {
    /// Free text matched against person and resource display fields
    pub search: Option<String>,
    pub person_id: Option<Uuid>,
    pub resource_id: Option<Uuid>,
    pub due_date_from: Option<DateTime<Utc>>,
    pub due_date_to: Option<DateTime<Utc>>,
    pub person_type: Option<PersonType>,
    pub min_days_overdue: Option<i64>,
    pub grade: Option<String>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
    pub sort_by: Option<OverdueSortField>,
    pub sort_order: Option<SortOrder>,
}

impl OverdueQuery {
    pub fn validate(&self) -> ApiResult<()> {
        if let Some(min) = self.min_days_overdue {
            if min < 0 {
                return Err(ApiError::ValidationError(
                    "min_days_overdue must not be negative".to_string(),
                ));
            }
        }
        if let (Some(from), Some(to)) = (self.due_date_from, self.due_date_to) {
            if to < from {
                return Err(ApiError::ValidationError(
                    "due_date_to must not be before due_date_from".to_string(),
                ));
            }
        }
        Ok(())
    }
}

/// One overdue loan with the display fields of its borrower and resource
#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct OverdueRecord {
    pub loan_id: Uuid,
    pub person_id: Uuid,
    pub person_name: String,
    pub person_type: PersonType,
    pub grade: Option<String>,
    pub resource_id: Uuid,
    pub resource_title: String,
    pub resource_type: String,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub stored_status: LoanStatus,
    pub days_overdue: i64,
    pub severity: Severity,
}

#[derive(Debug, Serialize, Clone)]
pub struct OverdueStats {
    pub total_overdue: usize,
    /// Sum reported by the fine schedule; zero without one
    pub total_overdue_amount: f64,
    pub average_days_overdue: f64,
    pub by_severity: BTreeMap<Severity, usize>,
    pub by_person_type: BTreeMap<String, usize>,
    pub by_grade: BTreeMap<String, usize>,
    pub oldest_overdue: Option<OverdueRecord>,
}

// ============================================================================
// Overdue Service
// ============================================================================

#[derive(Clone)]
pub struct OverdueService {
    store: Arc<dyn LoanStore>,
    people: Arc<dyn PersonProvider>,
    resources: Arc<dyn ResourceProvider>,
    clock: Arc<dyn Clock>,
    fines: Arc<dyn FineSchedule>,
    settings: EngineSettings,
}

impl OverdueService {
    pub fn new(
        store: Arc<dyn LoanStore>,
        people: Arc<dyn PersonProvider>,
        resources: Arc<dyn ResourceProvider>,
        clock: Arc<dyn Clock>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            store,
            people,
            resources,
            clock,
            fines: Arc::new(NoFines),
            settings,
        }
    }

    pub fn with_fine_schedule(mut self, fines: Arc<dyn FineSchedule>) -> Self {
        self.fines = fines;
        self
    }

    /// Classify a single loan against the service clock
    pub fn classify(&self, loan: &Loan) -> Classification {
        classify(loan, self.clock.now(), &self.settings.severity)
    }

    /// Paginated overdue listing, sorted by days overdue descending unless asked otherwise
    pub async fn list_overdue(
        &self,
        query: OverdueQuery,
    ) -> ApiResult<PaginatedResponse<OverdueRecord>> {
        query.validate()?;

        let mut records = self.collect(&query).await?;
        sort_records(
            &mut records,
            query.sort_by.unwrap_or_default(),
            query.sort_order.unwrap_or_default(),
        );

        let (page, limit) = PaginationParams {
            page: query.page,
            limit: query.limit,
        }
        .resolve(self.settings.default_page_size, self.settings.max_page_size);

        let window = PageRequest::new(page, limit);
        let total = records.len() as i64;
        let data = records
            .into_iter()
            .skip(usize::try_from(window.offset).unwrap_or(usize::MAX))
            .take(limit as usize)
            .collect();

        Ok(PaginatedResponse {
            data,
            total,
            page,
            limit,
        })
    }

    /// Aggregate view over every overdue loan right now
    pub async fn overdue_stats(&self) -> ApiResult<OverdueStats> {
        let records = self.collect(&OverdueQuery::default()).await?;

        let mut by_severity: BTreeMap<Severity, usize> =
            Severity::ALL.iter().map(|s| (*s, 0)).collect();
        let mut by_person_type: BTreeMap<String, usize> = [PersonType::Student, PersonType::Teacher]
            .iter()
            .map(|t| (t.as_str().to_string(), 0))
            .collect();
        let mut by_grade: BTreeMap<String, usize> = BTreeMap::new();
        let mut total_amount = 0.0;
        let mut total_days = 0i64;

        for record in &records {
            *by_severity.entry(record.severity).or_insert(0) += 1;
            *by_person_type
                .entry(record.person_type.as_str().to_string())
                .or_insert(0) += 1;
            if let Some(grade) = &record.grade {
                *by_grade.entry(grade.clone()).or_insert(0) += 1;
            }
            total_amount += self.fines.amount_for(record);
            total_days += record.days_overdue;
        }

        let average_days_overdue = if records.is_empty() {
            0.0
        } else {
            total_days as f64 / records.len() as f64
        };

        let oldest_overdue = records
            .iter()
            .min_by(|a, b| {
                b.days_overdue
                    .cmp(&a.days_overdue)
                    .then(a.loan_date.cmp(&b.loan_date))
                    .then(a.loan_id.cmp(&b.loan_id))
            })
            .cloned();

        Ok(OverdueStats {
            total_overdue: records.len(),
            total_overdue_amount: total_amount,
            average_days_overdue,
            by_severity,
            by_person_type,
            by_grade,
            oldest_overdue,
        })
    }

    /// Every overdue loan matching `query`, unsorted
    async fn collect(&self, query: &OverdueQuery) -> ApiResult<Vec<OverdueRecord>> {
        let now = self.clock.now();
        let filter = LoanFilter {
            person_id: query.person_id,
            resource_id: query.resource_id,
            statuses: LoanStatus::OPEN.to_vec(),
            due_date_from: query.due_date_from,
            due_date_to: query.due_date_to,
            ..LoanFilter::default()
        };

        let loans = self.store.find(&filter, LoanSort::OldestFirst, None).await?;

        let mut people: HashMap<Uuid, Option<Person>> = HashMap::new();
        let mut resources: HashMap<Uuid, Option<Resource>> = HashMap::new();
        let needle = query.search.as_deref().map(str::trim).filter(|s| !s.is_empty());
        let min_days = query.min_days_overdue.unwrap_or(1).max(1);

        let mut records = Vec::new();
        for loan in loans {
            let classification = classify(&loan, now, &self.settings.severity);
            let severity = match classification.severity {
                Some(severity) if classification.days_overdue >= min_days => severity,
                _ => continue,
            };

            if !people.contains_key(&loan.person_id) {
                let person = lookup(self.people.get_person(loan.person_id).await)?;
                people.insert(loan.person_id, person);
            }
            if !resources.contains_key(&loan.resource_id) {
                let resource = lookup(self.resources.get_resource(loan.resource_id).await)?;
                resources.insert(loan.resource_id, resource);
            }
            let (Some(Some(person)), Some(Some(resource))) =
                (people.get(&loan.person_id), resources.get(&loan.resource_id))
            else {
                tracing::warn!(loan_id = %loan.id, "Skipping overdue loan with dangling reference");
                continue;
            };

            if query.person_type.is_some_and(|t| t != person.person_type) {
                continue;
            }
            if let Some(grade) = &query.grade {
                if person.grade.as_deref() != Some(grade.as_str()) {
                    continue;
                }
            }

            if let Some(needle) = needle {
                if !person.matches_search(needle) && !resource.matches_search(needle) {
                    continue;
                }
            }

            let loan = materialize_overdue(self.store.as_ref(), loan, now).await;
            let record = OverdueRecord {
                loan_id: loan.id,
                person_id: person.id,
                person_name: person.full_name.clone(),
                person_type: person.person_type,
                grade: person.grade.clone(),
                resource_id: resource.id,
                resource_title: resource.title.clone(),
                resource_type: resource.resource_type.clone(),
                loan_date: loan.loan_date,
                due_date: loan.due_date,
                stored_status: loan.status,
                days_overdue: classification.days_overdue,
                severity,
            };
            records.push(record);
        }

        Ok(records)
    }
}

/// Turn a provider miss into `None`; other errors propagate
fn lookup<T>(result: ApiResult<T>) -> ApiResult<Option<T>> {
    match result {
        Ok(value) => Ok(Some(value)),
        Err(ApiError::NotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

fn sort_records(records: &mut [OverdueRecord], field: OverdueSortField, order: SortOrder) {
    records.sort_by(|a, b| {
        let primary = match field {
            OverdueSortField::DaysOverdue => a.days_overdue.cmp(&b.days_overdue),
            OverdueSortField::DueDate => a.due_date.cmp(&b.due_date),
            OverdueSortField::LoanDate => a.loan_date.cmp(&b.loan_date),
            OverdueSortField::PersonName => a.person_name.cmp(&b.person_name),
            OverdueSortField::ResourceTitle => a.resource_title.cmp(&b.resource_title),
        };
        let primary = match order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary
            .then(a.loan_date.cmp(&b.loan_date))
            .then(a.loan_id.cmp(&b.loan_id))
    });
}
