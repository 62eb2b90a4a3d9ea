//! Overdue listing and aggregate stats

mod common;

use std::sync::Arc;

use common::{at, Desk};
use lendingdesk_server::error::ApiError;
use lendingdesk_server::loan::LoanStatus;
use lendingdesk_server::models::PersonType;
use lendingdesk_server::services::overdue::{
    FineSchedule, OverdueQuery, OverdueRecord, OverdueService, OverdueSortField, SortOrder,
};
use lendingdesk_server::services::Severity;
use lendingdesk_server::store::LoanStore;
use uuid::Uuid;

struct Ids {
    ana_loan: Uuid,
    luis_loan: Uuid,
    marta_loan: Uuid,
    marta: Uuid,
}

/// Three overdue loans (6, 25 and 40 days), one current loan and one late return
async fn seeded_desk() -> (Desk, Ids) {
    let desk = Desk::new(at(2024, 5, 10, 9));

    let ana = desk.add_person("Ana Ruiz", PersonType::Student, Some("5A"));
    let luis = desk.add_person("Luis Mora", PersonType::Student, Some("6B"));
    let pablo = desk.add_person("Pablo Vega", PersonType::Student, Some("5A"));
    let marta = desk.teacher("Marta Gil");

    let atlas = desk.resource("World Atlas");
    let chess = desk.resource("Chess Set");
    let microscope = desk.resource("Microscope");
    let globe = desk.resource("Globe");
    let novel = desk.resource("Short Novels");

    let ana_loan = desk
        .history(ana, atlas, at(2024, 4, 1, 9), 14, LoanStatus::Active, None)
        .await;
    let luis_loan = desk
        .history(luis, chess, at(2024, 4, 20, 9), 14, LoanStatus::Active, None)
        .await;
    let marta_loan = desk
        .history(marta, microscope, at(2024, 3, 1, 9), 30, LoanStatus::Overdue, None)
        .await;
    desk.history(pablo, globe, at(2024, 5, 5, 9), 14, LoanStatus::Active, None)
        .await;
    desk.history(
        pablo,
        novel,
        at(2024, 3, 1, 9),
        14,
        LoanStatus::Returned,
        Some(at(2024, 4, 1, 9)),
    )
    .await;

    (
        desk,
        Ids {
            ana_loan,
            luis_loan,
            marta_loan,
            marta,
        },
    )
}

fn loan_ids(records: &[OverdueRecord]) -> Vec<Uuid> {
    records.iter().map(|r| r.loan_id).collect()
}

// ============================================================================
// Listing
// ============================================================================

#[tokio::test]
async fn test_list_sorted_by_days_overdue() {
    let (desk, ids) = seeded_desk().await;

    let page = desk
        .state
        .overdue_service
        .list_overdue(OverdueQuery::default())
        .await
        .unwrap();

    assert_eq!(page.total, 3);
    assert_eq!(
        loan_ids(&page.data),
        vec![ids.marta_loan, ids.ana_loan, ids.luis_loan]
    );

    let marta = &page.data[0];
    assert_eq!(marta.days_overdue, 40);
    assert_eq!(marta.severity, Severity::Critical);
    assert_eq!(marta.person_name, "Marta Gil");
    assert_eq!(marta.resource_title, "Microscope");
    assert_eq!(page.data[1].severity, Severity::High);
    assert_eq!(page.data[2].severity, Severity::Low);
}

#[tokio::test]
async fn test_listing_materializes_stored_status() {
    let (desk, ids) = seeded_desk().await;

    desk.state
        .overdue_service
        .list_overdue(OverdueQuery::default())
        .await
        .unwrap();

    let stored = desk.store.find_one(ids.ana_loan).await.unwrap().unwrap();
    assert_eq!(stored.status, LoanStatus::Overdue);
}

#[tokio::test]
async fn test_search_is_case_insensitive() {
    let (desk, ids) = seeded_desk().await;

    let by_name = desk
        .state
        .overdue_service
        .list_overdue(OverdueQuery {
            search: Some("ana ruiz".to_string()),
            ..OverdueQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(loan_ids(&by_name.data), vec![ids.ana_loan]);

    let by_title = desk
        .state
        .overdue_service
        .list_overdue(OverdueQuery {
            search: Some("CHESS".to_string()),
            ..OverdueQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(loan_ids(&by_title.data), vec![ids.luis_loan]);
}

#[tokio::test]
async fn test_filters() {
    let (desk, ids) = seeded_desk().await;
    let service = &desk.state.overdue_service;

    let teachers = service
        .list_overdue(OverdueQuery {
            person_type: Some(PersonType::Teacher),
            ..OverdueQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(loan_ids(&teachers.data), vec![ids.marta_loan]);

    let grade = service
        .list_overdue(OverdueQuery {
            grade: Some("6B".to_string()),
            ..OverdueQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(loan_ids(&grade.data), vec![ids.luis_loan]);

    let at_least_a_week = service
        .list_overdue(OverdueQuery {
            min_days_overdue: Some(7),
            ..OverdueQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(at_least_a_week.total, 2);

    let by_person = service
        .list_overdue(OverdueQuery {
            person_id: Some(ids.marta),
            ..OverdueQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(by_person.total, 1);

    let due_in_april = service
        .list_overdue(OverdueQuery {
            due_date_from: Some(at(2024, 4, 1, 0)),
            due_date_to: Some(at(2024, 5, 1, 0)),
            ..OverdueQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(loan_ids(&due_in_april.data), vec![ids.ana_loan]);
}

#[tokio::test]
async fn test_sort_and_paging() {
    let (desk, ids) = seeded_desk().await;

    let page = desk
        .state
        .overdue_service
        .list_overdue(OverdueQuery {
            sort_by: Some(OverdueSortField::PersonName),
            sort_order: Some(SortOrder::Asc),
            page: Some(2),
            limit: Some(2),
            ..OverdueQuery::default()
        })
        .await
        .unwrap();

    // Ana, Luis | Marta
    assert_eq!(page.total, 3);
    assert_eq!(page.page, 2);
    assert_eq!(loan_ids(&page.data), vec![ids.marta_loan]);
}

#[tokio::test]
async fn test_page_far_past_the_end_is_empty() {
    let (desk, _) = seeded_desk().await;

    let page = desk
        .state
        .overdue_service
        .list_overdue(OverdueQuery {
            page: Some(u32::MAX),
            limit: Some(50),
            ..OverdueQuery::default()
        })
        .await
        .unwrap();

    assert_eq!(page.total, 3);
    assert_eq!(page.page, u32::MAX);
    assert!(page.data.is_empty());
}

/// Two loans due the same day; the one lent earlier was kept longer
async fn same_due_date_desk() -> (Desk, Uuid, Uuid) {
    let desk = Desk::new(at(2024, 5, 10, 9));
    let ana = desk.student("Ana Ruiz");
    let luis = desk.student("Luis Mora");
    let atlas = desk.resource("World Atlas");
    let chess = desk.resource("Chess Set");

    let later = desk
        .history(ana, atlas, at(2024, 4, 1, 9), 14, LoanStatus::Active, None)
        .await;
    let earlier = desk
        .history(luis, chess, at(2024, 3, 23, 9), 23, LoanStatus::Active, None)
        .await;

    (desk, earlier, later)
}

#[tokio::test]
async fn test_equal_days_overdue_ordered_by_loan_date() {
    let (desk, earlier, later) = same_due_date_desk().await;

    let page = desk
        .state
        .overdue_service
        .list_overdue(OverdueQuery::default())
        .await
        .unwrap();

    assert_eq!(page.data[0].days_overdue, page.data[1].days_overdue);
    assert_eq!(loan_ids(&page.data), vec![earlier, later]);

    let ascending = desk
        .state
        .overdue_service
        .list_overdue(OverdueQuery {
            sort_order: Some(SortOrder::Asc),
            ..OverdueQuery::default()
        })
        .await
        .unwrap();
    assert_eq!(loan_ids(&ascending.data), vec![earlier, later]);
}

#[tokio::test]
async fn test_invalid_query() {
    let (desk, _) = seeded_desk().await;

    let err = desk
        .state
        .overdue_service
        .list_overdue(OverdueQuery {
            min_days_overdue: Some(-1),
            ..OverdueQuery::default()
        })
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::ValidationError(_)));
}

// ============================================================================
// Stats
// ============================================================================

#[tokio::test]
async fn test_overdue_stats() {
    let (desk, ids) = seeded_desk().await;

    let stats = desk.state.overdue_service.overdue_stats().await.unwrap();

    assert_eq!(stats.total_overdue, 3);
    assert_eq!(stats.total_overdue_amount, 0.0);
    assert!((stats.average_days_overdue - 71.0 / 3.0).abs() < 1e-9);
    assert_eq!(stats.by_severity[&Severity::Low], 1);
    assert_eq!(stats.by_severity[&Severity::Medium], 0);
    assert_eq!(stats.by_severity[&Severity::High], 1);
    assert_eq!(stats.by_severity[&Severity::Critical], 1);
    assert_eq!(stats.by_person_type["student"], 2);
    assert_eq!(stats.by_person_type["teacher"], 1);
    assert_eq!(stats.by_grade["5A"], 1);
    assert_eq!(stats.by_grade["6B"], 1);
    assert_eq!(
        stats.oldest_overdue.map(|r| r.loan_id),
        Some(ids.marta_loan)
    );
}

#[tokio::test]
async fn test_empty_stats_are_zeroed() {
    let desk = Desk::new(at(2024, 5, 10, 9));

    let stats = desk.state.overdue_service.overdue_stats().await.unwrap();

    assert_eq!(stats.total_overdue, 0);
    assert_eq!(stats.average_days_overdue, 0.0);
    assert_eq!(stats.by_severity.len(), 4);
    assert!(stats.by_severity.values().all(|c| *c == 0));
    assert_eq!(stats.by_person_type["teacher"], 0);
    assert!(stats.oldest_overdue.is_none());
}

#[tokio::test]
async fn test_oldest_overdue_tie_goes_to_earliest_loan() {
    let (desk, earlier, _) = same_due_date_desk().await;

    let stats = desk.state.overdue_service.overdue_stats().await.unwrap();

    assert_eq!(stats.total_overdue, 2);
    assert_eq!(stats.oldest_overdue.map(|r| r.loan_id), Some(earlier));
}

struct HalfPerDay;

impl FineSchedule for HalfPerDay {
    fn amount_for(&self, record: &OverdueRecord) -> f64 {
        record.days_overdue as f64 * 0.5
    }
}

#[tokio::test]
async fn test_fine_schedule_feeds_total_amount() {
    let (desk, _) = seeded_desk().await;
    let service = OverdueService::new(
        desk.store.clone(),
        desk.store.clone(),
        desk.store.clone(),
        desk.clock.clone(),
        Default::default(),
    )
    .with_fine_schedule(Arc::new(HalfPerDay));

    let stats = service.overdue_stats().await.unwrap();

    assert_eq!(stats.total_overdue_amount, 35.5);
}
