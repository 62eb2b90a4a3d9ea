//! Loan statistics over named periods or explicit date ranges
//!
//! Everything here is recomputed per request from the loan records. Range
//! bound counts (total, returned, lost, durations) look at loans whose loan
//! date falls inside the range; active and overdue counts are a snapshot of
//! every open loan at "now".

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Months, NaiveDate, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::clock::Clock;
use crate::config::EngineSettings;
use crate::error::{ApiError, ApiResult};
use crate::loan::{Loan, LoanFilter, LoanSort, LoanStatus};
use crate::services::overdue::is_overdue;
use crate::store::{LoanStore, PersonProvider, ResourceProvider};

// ============================================================================
// Periods
// ============================================================================

/// Named calendar period containing "now"
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Today,
    Week,
    Month,
    Quarter,
    Year,
}

/// Half-open range `[start, end)`
#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateRange {
    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }

    /// Range of equal length ending where this one starts, if it is representable
    pub fn preceding(&self) -> Option<DateRange> {
        let length = self.end - self.start;
        let start = self.start.checked_sub_signed(length)?;
        Some(DateRange {
            start,
            end: self.start,
        })
    }
}

fn midnight(date: NaiveDate) -> DateTime<Utc> {
    Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN))
}

fn first_of_month(date: NaiveDate) -> ApiResult<NaiveDate> {
    NaiveDate::from_ymd_opt(date.year(), date.month(), 1)
        .ok_or_else(|| ApiError::InternalError(format!("Invalid month start for {}", date)))
}

fn shift_months(date: NaiveDate, months: i32) -> ApiResult<NaiveDate> {
    let shifted = if months >= 0 {
        date.checked_add_months(Months::new(months as u32))
    } else {
        date.checked_sub_months(Months::new(months.unsigned_abs()))
    };
    shifted.ok_or_else(|| ApiError::InternalError(format!("Date out of range: {}", date)))
}

impl Period {
    /// Calendar range of this period containing `now`
    pub fn range(&self, now: DateTime<Utc>) -> ApiResult<DateRange> {
        let today = now.date_naive();
        let (start, end) = match self {
            Period::Today => (today, today + Duration::days(1)),
            Period::Week => {
                let monday =
                    today - Duration::days(i64::from(today.weekday().num_days_from_monday()));
                (monday, monday + Duration::days(7))
            }
            Period::Month => {
                let start = first_of_month(today)?;
                (start, shift_months(start, 1)?)
            }
            Period::Quarter => {
                let first_month = (today.month0() / 3) * 3 + 1;
                let start = NaiveDate::from_ymd_opt(today.year(), first_month, 1).ok_or_else(
                    || ApiError::InternalError(format!("Invalid quarter start for {}", today)),
                )?;
                (start, shift_months(start, 3)?)
            }
            Period::Year => {
                let start = NaiveDate::from_ymd_opt(today.year(), 1, 1).ok_or_else(|| {
                    ApiError::InternalError(format!("Invalid year start for {}", today))
                })?;
                (start, shift_months(start, 12)?)
            }
        };
        Ok(DateRange {
            start: midnight(start),
            end: midnight(end),
        })
    }

    /// The same kind of period immediately before `current`
    pub fn previous(&self, current: &DateRange) -> Option<DateRange> {
        let months = match self {
            Period::Today | Period::Week => return current.preceding(),
            Period::Month => 1,
            Period::Quarter => 3,
            Period::Year => 12,
        };
        let start = shift_months(current.start.date_naive(), -months).ok()?;
        Some(DateRange {
            start: midnight(start),
            end: current.start,
        })
    }
}

// ============================================================================
// Query & snapshot models
// ============================================================================

#[derive(Debug, Deserialize, Default, Clone)]
pub struct StatsQuery {
    pub period: Option<Period>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub include_trends: bool,
    #[serde(default)]
    pub include_details: bool,
}

impl StatsQuery {
    pub fn for_period(period: Period) -> Self {
        Self {
            period: Some(period),
            ..Self::default()
        }
    }

    /// Resolve to the current range and, when one exists, the previous one.
    ///
    /// Explicit dates win over the period keyword; both must be present and
    /// ordered. Without either, the current month is used.
    pub fn resolve(&self, now: DateTime<Utc>) -> ApiResult<(DateRange, Option<DateRange>)> {
        match (self.start_date, self.end_date) {
            (Some(start), Some(end)) => {
                if end < start {
                    return Err(ApiError::ValidationError(
                        "end_date must not be before start_date".to_string(),
                    ));
                }
                let range = DateRange { start, end };
                Ok((range, range.preceding()))
            }
            (Some(_), None) | (None, Some(_)) => Err(ApiError::ValidationError(
                "start_date and end_date must be given together".to_string(),
            )),
            (None, None) => {
                let period = self.period.unwrap_or(Period::Month);
                let range = period.range(now)?;
                Ok((range, period.previous(&range)))
            }
        }
    }
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct PeriodComparison {
    pub previous_start: DateTime<Utc>,
    pub previous_end: DateTime<Utc>,
    pub previous_new_loans: usize,
    pub previous_returned_loans: usize,
    /// Absent when the previous period had no loans
    pub new_loans_change_percentage: Option<f64>,
    pub returned_loans_change_percentage: Option<f64>,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TopResource {
    pub resource_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub loan_count: usize,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct TopBorrower {
    pub person_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub loan_count: usize,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct StatusShare {
    pub status: LoanStatus,
    pub count: usize,
    pub percentage: f64,
    pub color: &'static str,
}

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct MonthlyTrend {
    /// `YYYY-MM`
    pub month: String,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub new_loans: usize,
    pub returned_loans: usize,
    pub overdue_loans: usize,
}

#[derive(Debug, Serialize, Clone)]
pub struct LoanStatsSnapshot {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub period: Option<Period>,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub generated_at: DateTime<Utc>,
    pub total_loans: usize,
    pub active_loans: usize,
    pub overdue_loans: usize,
    pub returned_loans: usize,
    pub lost_resources: usize,
    pub on_time_return_rate: f64,
    pub overdue_rate: f64,
    /// Days
    pub average_loan_duration: f64,
    pub comparison: Option<PeriodComparison>,
    pub top_resources: Vec<TopResource>,
    pub top_borrowers: Vec<TopBorrower>,
    pub status_distribution: Vec<StatusShare>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub monthly_trends: Option<Vec<MonthlyTrend>>,
}

// ============================================================================
// Core aggregation
// ============================================================================

/// Counts over the loans issued inside one range
#[derive(Debug, Default, Clone, PartialEq)]
struct RangeCounts {
    new_loans: usize,
    returned: usize,
    returned_on_time: usize,
    lost: usize,
    /// Loans from the range that are overdue right now
    overdue: usize,
    total_duration_days: f64,
    by_status: BTreeMap<LoanStatus, usize>,
}

impl RangeCounts {
    fn aggregate<'a>(loans: impl IntoIterator<Item = &'a Loan>, now: DateTime<Utc>) -> Self {
        let mut counts = RangeCounts::default();
        for loan in loans {
            counts.new_loans += 1;
            let effective = match loan.status {
                LoanStatus::Returned => {
                    counts.returned += 1;
                    if loan.returned_on_time() {
                        counts.returned_on_time += 1;
                    }
                    if let Some(returned_at) = loan.return_date {
                        counts.total_duration_days +=
                            (returned_at - loan.loan_date).num_seconds() as f64 / 86_400.0;
                    }
                    LoanStatus::Returned
                }
                LoanStatus::Lost => {
                    counts.lost += 1;
                    LoanStatus::Lost
                }
                LoanStatus::Active | LoanStatus::Overdue => {
                    if is_overdue(loan, now) {
                        counts.overdue += 1;
                        LoanStatus::Overdue
                    } else {
                        LoanStatus::Active
                    }
                }
            };
            *counts.by_status.entry(effective).or_insert(0) += 1;
        }
        counts
    }

    fn average_duration(&self) -> f64 {
        ratio(self.total_duration_days, self.returned as f64)
    }
}

/// `numerator / denominator`, or zero for an empty denominator
fn ratio(numerator: f64, denominator: f64) -> f64 {
    if denominator > 0.0 {
        numerator / denominator
    } else {
        0.0
    }
}

/// Percentage change, undefined when there is nothing to compare against
pub fn change_percentage(current: usize, previous: usize) -> Option<f64> {
    if previous == 0 {
        None
    } else {
        Some((current as f64 - previous as f64) / previous as f64 * 100.0)
    }
}

/// Ids ranked by count descending, ties by id ascending
fn top_n(counts: HashMap<Uuid, usize>, n: usize) -> Vec<(Uuid, usize)> {
    let mut ranked: Vec<(Uuid, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(&b.0)));
    ranked.truncate(n);
    ranked
}

fn month_buckets(range: &DateRange) -> ApiResult<Vec<(String, DateRange)>> {
    let mut buckets = Vec::new();
    let mut cursor = first_of_month(range.start.date_naive())?;
    while midnight(cursor) < range.end {
        let next = shift_months(cursor, 1)?;
        let bucket = DateRange {
            start: midnight(cursor).max(range.start),
            end: midnight(next).min(range.end),
        };
        if bucket.start < bucket.end {
            buckets.push((cursor.format("%Y-%m").to_string(), bucket));
        }
        cursor = next;
    }
    Ok(buckets)
}

// ============================================================================
// Statistics Service
// ============================================================================

#[derive(Clone)]
pub struct StatisticsService {
    store: Arc<dyn LoanStore>,
    people: Arc<dyn PersonProvider>,
    resources: Arc<dyn ResourceProvider>,
    clock: Arc<dyn Clock>,
    settings: EngineSettings,
}

impl StatisticsService {
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
            settings,
        }
    }

    pub async fn compute_stats(&self, query: StatsQuery) -> ApiResult<LoanStatsSnapshot> {
        let now = self.clock.now();
        let (range, previous) = query.resolve(now)?;

        let in_range = self
            .store
            .find(
                &LoanFilter::loaned_between(range.start, range.end),
                LoanSort::OldestFirst,
                None,
            )
            .await?;
        let open = self
            .store
            .find(&LoanFilter::open(), LoanSort::OldestFirst, None)
            .await?;

        let current = RangeCounts::aggregate(&in_range, now);

        // Point-in-time snapshot, not bound to the range
        let overdue_loans = open.iter().filter(|l| is_overdue(l, now)).count();
        let active_loans = open.len() - overdue_loans;

        let comparison = match previous {
            Some(previous) => Some(self.compare(&current, previous, now).await?),
            None => {
                tracing::debug!(start = %range.start, "No representable previous period");
                None
            }
        };

        let status_distribution = LoanStatus::ALL
            .iter()
            .map(|status| {
                let count = current.by_status.get(status).copied().unwrap_or(0);
                StatusShare {
                    status: *status,
                    count,
                    percentage: ratio(count as f64 * 100.0, current.new_loans as f64),
                    color: status.color(),
                }
            })
            .collect();

        let (top_resources, top_borrowers) = self
            .top_lists(&in_range, query.include_details)
            .await?;

        let monthly_trends = if query.include_trends {
            Some(
                month_buckets(&range)?
                    .into_iter()
                    .map(|(month, bucket)| {
                        let counts = RangeCounts::aggregate(
                            in_range.iter().filter(|l| bucket.contains(l.loan_date)),
                            now,
                        );
                        MonthlyTrend {
                            month,
                            start_date: bucket.start,
                            end_date: bucket.end,
                            new_loans: counts.new_loans,
                            returned_loans: counts.returned,
                            overdue_loans: counts.overdue,
                        }
                    })
                    .collect(),
            )
        } else {
            None
        };

        tracing::debug!(
            start = %range.start,
            end = %range.end,
            total_loans = current.new_loans,
            "Computed loan statistics"
        );

        Ok(LoanStatsSnapshot {
            period: match (query.start_date, query.end_date) {
                (Some(_), Some(_)) => None,
                _ => Some(query.period.unwrap_or(Period::Month)),
            },
            start_date: range.start,
            end_date: range.end,
            generated_at: now,
            total_loans: current.new_loans,
            active_loans,
            overdue_loans,
            returned_loans: current.returned,
            lost_resources: current.lost,
            on_time_return_rate: ratio(current.returned_on_time as f64, current.returned as f64),
            overdue_rate: ratio(overdue_loans as f64, open.len() as f64),
            average_loan_duration: current.average_duration(),
            comparison,
            top_resources,
            top_borrowers,
            status_distribution,
            monthly_trends,
        })
    }

    async fn compare(
        &self,
        current: &RangeCounts,
        previous: DateRange,
        now: DateTime<Utc>,
    ) -> ApiResult<PeriodComparison> {
        let loans = self
            .store
            .find(
                &LoanFilter::loaned_between(previous.start, previous.end),
                LoanSort::OldestFirst,
                None,
            )
            .await?;
        let before = RangeCounts::aggregate(&loans, now);

        Ok(PeriodComparison {
            previous_start: previous.start,
            previous_end: previous.end,
            previous_new_loans: before.new_loans,
            previous_returned_loans: before.returned,
            new_loans_change_percentage: change_percentage(current.new_loans, before.new_loans),
            returned_loans_change_percentage: change_percentage(current.returned, before.returned),
        })
    }

    /// Most lent resources and most active borrowers; display names are
    /// looked up only when details are requested
    async fn top_lists(
        &self,
        loans: &[Loan],
        include_details: bool,
    ) -> ApiResult<(Vec<TopResource>, Vec<TopBorrower>)> {
        let mut by_resource: HashMap<Uuid, usize> = HashMap::new();
        let mut by_person: HashMap<Uuid, usize> = HashMap::new();
        for loan in loans {
            *by_resource.entry(loan.resource_id).or_insert(0) += 1;
            *by_person.entry(loan.person_id).or_insert(0) += 1;
        }

        let n = self.settings.stats_top_n;
        let mut top_resources = Vec::new();
        for (resource_id, loan_count) in top_n(by_resource, n) {
            let title = if include_details {
                match self.resources.get_resource(resource_id).await {
                    Ok(resource) => Some(resource.title),
                    Err(ApiError::NotFound(_)) => None,
                    Err(e) => return Err(e),
                }
            } else {
                None
            };
            top_resources.push(TopResource {
                resource_id,
                title,
                loan_count,
            });
        }

        let mut top_borrowers = Vec::new();
        for (person_id, loan_count) in top_n(by_person, n) {
            let name = if include_details {
                match self.people.get_person(person_id).await {
                    Ok(person) => Some(person.full_name),
                    Err(ApiError::NotFound(_)) => None,
                    Err(e) => return Err(e),
                }
            } else {
                None
            };
            top_borrowers.push(TopBorrower {
                person_id,
                name,
                loan_count,
            });
        }

        Ok((top_resources, top_borrowers))
    }
}
