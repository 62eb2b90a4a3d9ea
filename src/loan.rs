//! Loan models for LendingDesk
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::services::overdue::Classification;

/// Loan status enum
#[derive(Debug, Serialize, Deserialize, sqlx::Type, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[sqlx(type_name = "loan_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum LoanStatus {
    Active,
    Returned,
    Overdue,
    Lost,
}

impl LoanStatus {
    pub const ALL: [LoanStatus; 4] = [
        LoanStatus::Active,
        LoanStatus::Returned,
        LoanStatus::Overdue,
        LoanStatus::Lost,
    ];

    /// Statuses a loan may be in while the resource is still out
    pub const OPEN: [LoanStatus; 2] = [LoanStatus::Active, LoanStatus::Overdue];

    pub fn is_open(&self) -> bool {
        matches!(self, LoanStatus::Active | LoanStatus::Overdue)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanStatus::Active => "active",
            LoanStatus::Returned => "returned",
            LoanStatus::Overdue => "overdue",
            LoanStatus::Lost => "lost",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            LoanStatus::Active => "Resource is out on loan and within its lending period",
            LoanStatus::Returned => "Resource was handed back",
            LoanStatus::Overdue => "Resource is out on loan past its due date",
            LoanStatus::Lost => "Resource was declared lost while on loan",
        }
    }

    /// Presentation color used by the status distribution
    pub fn color(&self) -> &'static str {
        match self {
            LoanStatus::Active => "#3b82f6",
            LoanStatus::Returned => "#10b981",
            LoanStatus::Overdue => "#ef4444",
            LoanStatus::Lost => "#6b7280",
        }
    }
}

impl std::fmt::Display for LoanStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference vocabulary row for loan statuses
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq, Eq)]
pub struct LoanStatusRecord {
    pub name: String,
    pub description: String,
}

impl From<LoanStatus> for LoanStatusRecord {
    fn from(status: LoanStatus) -> Self {
        Self {
            name: status.as_str().to_string(),
            description: status.description().to_string(),
        }
    }
}

/// Loan model
#[derive(Debug, Serialize, Deserialize, sqlx::FromRow, Clone, PartialEq)]
pub struct Loan {
    pub id: Uuid,
    pub person_id: Uuid,
    pub resource_id: Uuid,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    /// Set if and only if the loan is returned
    pub return_date: Option<DateTime<Utc>>,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    /// Open loans hold their resource, whatever the stored label says
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }

    pub fn returned_on_time(&self) -> bool {
        matches!(self.return_date, Some(returned) if returned <= self.due_date)
    }
}

/// Insert payload; the store assigns id, status and audit timestamps
#[derive(Debug, Clone)]
pub struct NewLoan {
    pub person_id: Uuid,
    pub resource_id: Uuid,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

/// Guarded status change: applied only while the loan is in one of `expected`
#[derive(Debug, Clone)]
pub struct LoanPatch {
    pub status: LoanStatus,
    pub return_date: Option<DateTime<Utc>>,
    pub expected: Vec<LoanStatus>,
}

impl LoanPatch {
    pub fn returned(at: DateTime<Utc>) -> Self {
        Self {
            status: LoanStatus::Returned,
            return_date: Some(at),
            expected: LoanStatus::OPEN.to_vec(),
        }
    }

    pub fn lost() -> Self {
        Self {
            status: LoanStatus::Lost,
            return_date: None,
            expected: LoanStatus::OPEN.to_vec(),
        }
    }

    pub fn mark_overdue() -> Self {
        Self {
            status: LoanStatus::Overdue,
            return_date: None,
            expected: vec![LoanStatus::Active],
        }
    }
}

/// Ordering of store query results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LoanSort {
    #[default]
    NewestFirst,
    OldestFirst,
}

/// Window into a sorted result set
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: i64,
    pub limit: i64,
}

impl PageRequest {
    pub fn new(page: u32, limit: u32) -> Self {
        Self {
            offset: (page.max(1) as i64 - 1) * limit as i64,
            limit: limit as i64,
        }
    }
}

/// Store-side filter. Date bounds are half open: `from` inclusive, `to` exclusive.
#[derive(Debug, Clone, Default)]
pub struct LoanFilter {
    pub person_id: Option<Uuid>,
    pub resource_id: Option<Uuid>,
    /// Empty means any status
    pub statuses: Vec<LoanStatus>,
    pub loan_date_from: Option<DateTime<Utc>>,
    pub loan_date_to: Option<DateTime<Utc>>,
    pub due_date_from: Option<DateTime<Utc>>,
    pub due_date_to: Option<DateTime<Utc>>,
    /// Due date compared against a cutoff instant
    pub due_standing: Option<(DueStanding, DateTime<Utc>)>,
}

/// Side of a cutoff a loan's due date falls on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DueStanding {
    /// `due_date <= cutoff`
    AtOrBefore,
    /// `due_date > cutoff`
    After,
}

impl LoanFilter {
    pub fn open_for_person(person_id: Uuid) -> Self {
        Self {
            person_id: Some(person_id),
            statuses: LoanStatus::OPEN.to_vec(),
            ..Self::default()
        }
    }

    pub fn open() -> Self {
        Self {
            statuses: LoanStatus::OPEN.to_vec(),
            ..Self::default()
        }
    }

    pub fn loaned_between(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self {
            loan_date_from: Some(start),
            loan_date_to: Some(end),
            ..Self::default()
        }
    }

    /// Restrict to loans whose status at `now` is `status`. An open loan is
    /// overdue once a whole day has passed since its due date, whatever label
    /// it is stored under.
    pub fn with_live_status(mut self, status: LoanStatus, now: DateTime<Utc>) -> Self {
        let cutoff = now - Duration::days(1);
        match status {
            LoanStatus::Overdue => {
                self.statuses = LoanStatus::OPEN.to_vec();
                self.due_standing = Some((DueStanding::AtOrBefore, cutoff));
            }
            LoanStatus::Active => {
                self.statuses = LoanStatus::OPEN.to_vec();
                self.due_standing = Some((DueStanding::After, cutoff));
            }
            closed => self.statuses = vec![closed],
        }
        self
    }

    /// In-process evaluation, used by the in-memory store
    pub fn matches(&self, loan: &Loan) -> bool {
        fn within(
            value: DateTime<Utc>,
            from: Option<DateTime<Utc>>,
            to: Option<DateTime<Utc>>,
        ) -> bool {
            from.map_or(true, |f| value >= f) && to.map_or(true, |t| value < t)
        }

        self.person_id.map_or(true, |id| loan.person_id == id)
            && self.resource_id.map_or(true, |id| loan.resource_id == id)
            && (self.statuses.is_empty() || self.statuses.contains(&loan.status))
            && within(loan.loan_date, self.loan_date_from, self.loan_date_to)
            && within(loan.due_date, self.due_date_from, self.due_date_to)
            && self.due_standing.map_or(true, |(standing, cutoff)| match standing {
                DueStanding::AtOrBefore => loan.due_date <= cutoff,
                DueStanding::After => loan.due_date > cutoff,
            })
    }
}

/// Request to create a new loan
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CreateLoanRequest {
    pub person_id: Uuid,
    pub resource_id: Uuid,
}

impl CreateLoanRequest {
    /// Validate request
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.person_id.is_nil() {
            return Err(ApiError::ValidationError(
                "person_id must not be nil".to_string(),
            ));
        }
        if self.resource_id.is_nil() {
            return Err(ApiError::ValidationError(
                "resource_id must not be nil".to_string(),
            ));
        }
        Ok(())
    }
}

/// Query for listing loans
#[derive(Debug, Deserialize, Default)]
pub struct ListLoansQuery {
    pub person_id: Option<Uuid>,
    pub resource_id: Option<Uuid>,
    pub status: Option<LoanStatus>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

/// Loan together with its classification at read time
#[derive(Debug, Serialize, Clone)]
pub struct LoanView {
    #[serde(flatten)]
    pub loan: Loan,
    #[serde(flatten)]
    pub classification: Classification,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn loan_at(loan_date: DateTime<Utc>, status: LoanStatus) -> Loan {
        Loan {
            id: Uuid::new_v4(),
            person_id: Uuid::new_v4(),
            resource_id: Uuid::new_v4(),
            loan_date,
            due_date: loan_date + Duration::days(14),
            return_date: None,
            status,
            created_at: loan_date,
            updated_at: loan_date,
        }
    }

    #[test]
    fn test_open_statuses() {
        assert!(LoanStatus::Active.is_open());
        assert!(LoanStatus::Overdue.is_open());
        assert!(!LoanStatus::Returned.is_open());
        assert!(!LoanStatus::Lost.is_open());
    }

    #[test]
    fn test_filter_date_bounds_are_half_open() {
        let start = Utc::now();
        let end = start + Duration::days(1);
        let filter = LoanFilter::loaned_between(start, end);

        assert!(filter.matches(&loan_at(start, LoanStatus::Active)));
        assert!(!filter.matches(&loan_at(end, LoanStatus::Active)));
        assert!(!filter.matches(&loan_at(start - Duration::seconds(1), LoanStatus::Active)));
    }

    #[test]
    fn test_filter_statuses() {
        let loan = loan_at(Utc::now(), LoanStatus::Returned);
        assert!(LoanFilter::default().matches(&loan));
        assert!(!LoanFilter::open().matches(&loan));
    }

    #[test]
    fn test_live_status_ignores_stale_label() {
        let now = Utc::now();
        let late = loan_at(now - Duration::days(20), LoanStatus::Active);
        let current = loan_at(now - Duration::days(2), LoanStatus::Active);
        let returned = loan_at(now - Duration::days(20), LoanStatus::Returned);

        let overdue = LoanFilter::default().with_live_status(LoanStatus::Overdue, now);
        assert!(overdue.matches(&late));
        assert!(!overdue.matches(&current));
        assert!(!overdue.matches(&returned));

        let active = LoanFilter::default().with_live_status(LoanStatus::Active, now);
        assert!(!active.matches(&late));
        assert!(active.matches(&current));

        let closed = LoanFilter::default().with_live_status(LoanStatus::Returned, now);
        assert!(closed.matches(&returned));
        assert!(!closed.matches(&late));
    }

    #[test]
    fn test_live_overdue_starts_after_a_whole_day() {
        let now = Utc::now();
        let mut loan = loan_at(now, LoanStatus::Active);
        let overdue = LoanFilter::default().with_live_status(LoanStatus::Overdue, now);

        loan.due_date = now - Duration::days(1);
        assert!(overdue.matches(&loan));
        loan.due_date = now - Duration::days(1) + Duration::seconds(1);
        assert!(!overdue.matches(&loan));
    }

    #[test]
    fn test_returned_on_time() {
        let mut loan = loan_at(Utc::now(), LoanStatus::Returned);
        loan.return_date = Some(loan.due_date);
        assert!(loan.returned_on_time());
        loan.return_date = Some(loan.due_date + Duration::minutes(1));
        assert!(!loan.returned_on_time());
    }

    #[test]
    fn test_create_request_rejects_nil_ids() {
        let request = CreateLoanRequest {
            person_id: Uuid::nil(),
            resource_id: Uuid::new_v4(),
        };
        assert!(matches!(
            request.validate(),
            Err(ApiError::ValidationError(_))
        ));
    }

    #[test]
    fn test_page_request_offsets() {
        assert_eq!(PageRequest::new(1, 20), PageRequest { offset: 0, limit: 20 });
        assert_eq!(PageRequest::new(3, 10), PageRequest { offset: 20, limit: 10 });
    }
}
