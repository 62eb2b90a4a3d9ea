//! Borrowing eligibility
//!
//! Checks run in a fixed order and stop at the first failure:
//! inactive person, active penalty, overdue loans, loan limit, and finally
//! availability of the requested resource. A refusal is an ordinary result,
//! not an error.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::SeverityThresholds;
use crate::error::ApiResult;
use crate::loan::{Loan, LoanFilter, LoanSort};
use crate::models::Person;
use crate::services::overdue::{classify, Severity};
use crate::store::{LoanStore, PersonProvider, ResourceProvider};

/// Why a borrow request was refused
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum DenialReason {
    #[serde(rename = "person inactive")]
    PersonInactive,
    #[serde(rename = "active penalty")]
    ActivePenalty,
    #[serde(rename = "has overdue loans")]
    HasOverdueLoans,
    #[serde(rename = "limit reached")]
    LimitReached,
    #[serde(rename = "resource unavailable")]
    ResourceUnavailable,
}

impl DenialReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            DenialReason::PersonInactive => "person inactive",
            DenialReason::ActivePenalty => "active penalty",
            DenialReason::HasOverdueLoans => "has overdue loans",
            DenialReason::LimitReached => "limit reached",
            DenialReason::ResourceUnavailable => "resource unavailable",
        }
    }
}

impl std::fmt::Display for DenialReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An open loan listed for remediation
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CurrentLoan {
    pub loan_id: Uuid,
    pub resource_id: Uuid,
    pub loan_date: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub days_overdue: i64,
    pub severity: Option<Severity>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct EligibilityDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
    /// Open loans, overdue ones included
    pub active_count: usize,
    /// Open loans that are overdue right now
    pub overdue_count: usize,
    pub max_loans_allowed: i32,
    /// Filled for overdue and loan-limit denials
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub current_loans: Vec<CurrentLoan>,
}

impl EligibilityDecision {
    pub fn allow(active_count: usize, overdue_count: usize, max_loans_allowed: i32) -> Self {
        Self {
            allowed: true,
            reason: None,
            active_count,
            overdue_count,
            max_loans_allowed,
            current_loans: Vec::new(),
        }
    }

    pub fn deny(
        reason: DenialReason,
        active_count: usize,
        overdue_count: usize,
        max_loans_allowed: i32,
        current_loans: Vec<CurrentLoan>,
    ) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            active_count,
            overdue_count,
            max_loans_allowed,
            current_loans,
        }
    }
}

/// Person's open loans classified at one instant
struct LoanSnapshot {
    loans: Vec<CurrentLoan>,
    overdue_count: usize,
}

impl LoanSnapshot {
    fn new(open_loans: &[Loan], now: DateTime<Utc>, thresholds: &SeverityThresholds) -> Self {
        let loans: Vec<CurrentLoan> = open_loans
            .iter()
            .map(|loan| {
                let c = classify(loan, now, thresholds);
                CurrentLoan {
                    loan_id: loan.id,
                    resource_id: loan.resource_id,
                    loan_date: loan.loan_date,
                    due_date: loan.due_date,
                    days_overdue: c.days_overdue,
                    severity: c.severity,
                }
            })
            .collect();
        let overdue_count = loans.iter().filter(|l| l.days_overdue > 0).count();
        Self {
            loans,
            overdue_count,
        }
    }
}

#[derive(Clone)]
pub struct EligibilityEvaluator {
    store: Arc<dyn LoanStore>,
    people: Arc<dyn PersonProvider>,
    resources: Arc<dyn ResourceProvider>,
    clock: Arc<dyn Clock>,
    thresholds: SeverityThresholds,
}

impl EligibilityEvaluator {
    pub fn new(
        store: Arc<dyn LoanStore>,
        people: Arc<dyn PersonProvider>,
        resources: Arc<dyn ResourceProvider>,
        clock: Arc<dyn Clock>,
        thresholds: SeverityThresholds,
    ) -> Self {
        Self {
            store,
            people,
            resources,
            clock,
            thresholds,
        }
    }

    /// Decide whether `person_id` may start a new loan, optionally of `resource_id`.
    ///
    /// Unknown person or resource ids are `NotFound` errors; every business
    /// refusal comes back as `allowed = false`.
    pub async fn can_borrow(
        &self,
        person_id: Uuid,
        resource_id: Option<Uuid>,
    ) -> ApiResult<EligibilityDecision> {
        let (_, decision) = self.assess(person_id, resource_id).await?;
        Ok(decision)
    }

    /// Same as [`can_borrow`](Self::can_borrow), also handing back the person
    pub(crate) async fn assess(
        &self,
        person_id: Uuid,
        resource_id: Option<Uuid>,
    ) -> ApiResult<(Person, EligibilityDecision)> {
        let person = self.people.get_person(person_id).await?;
        let open_loans = self
            .store
            .find(&LoanFilter::open_for_person(person_id), LoanSort::OldestFirst, None)
            .await?;
        let snapshot = LoanSnapshot::new(&open_loans, self.clock.now(), &self.thresholds);

        let decision = self.evaluate(&person, snapshot, resource_id).await?;
        if let Some(reason) = decision.reason {
            tracing::debug!(person_id = %person_id, reason = %reason, "Borrowing denied");
        }
        Ok((person, decision))
    }

    async fn evaluate(
        &self,
        person: &Person,
        snapshot: LoanSnapshot,
        resource_id: Option<Uuid>,
    ) -> ApiResult<EligibilityDecision> {
        let active_count = snapshot.loans.len();
        let overdue_count = snapshot.overdue_count;
        let max_loans = person.max_loans;
        let deny = |reason, loans| {
            EligibilityDecision::deny(reason, active_count, overdue_count, max_loans, loans)
        };

        // 1. Active person
        if !person.active {
            return Ok(deny(DenialReason::PersonInactive, Vec::new()));
        }

        // 2. No penalty
        if person.has_penalty {
            return Ok(deny(DenialReason::ActivePenalty, Vec::new()));
        }

        // 3. Nothing overdue, by live classification
        if overdue_count > 0 {
            return Ok(deny(DenialReason::HasOverdueLoans, snapshot.loans));
        }

        // 4. Below the per-type limit
        if active_count as i64 >= i64::from(max_loans) {
            return Ok(deny(DenialReason::LimitReached, snapshot.loans));
        }

        // 5. Requested resource is free
        if let Some(resource_id) = resource_id {
            let resource = self.resources.get_resource(resource_id).await?;
            let open_on_resource = self
                .store
                .count(&LoanFilter {
                    resource_id: Some(resource_id),
                    ..LoanFilter::open()
                })
                .await?;

            if !resource.is_available() || open_on_resource > 0 {
                return Ok(deny(DenialReason::ResourceUnavailable, Vec::new()));
            }
        }

        Ok(EligibilityDecision::allow(
            active_count,
            overdue_count,
            max_loans,
        ))
    }
}
