//! Borrowing eligibility scenarios against the in-memory store

mod common;

use chrono::Duration;
use uuid::Uuid;

use common::{at, Desk};
use lendingdesk_server::error::ApiError;
use lendingdesk_server::loan::LoanStatus;
use lendingdesk_server::services::{DenialReason, Severity};

// ============================================================================
// Person checks
// ============================================================================

#[tokio::test]
async fn test_fresh_student_is_allowed() {
    let desk = Desk::new(at(2024, 5, 10, 9));
    let ana = desk.student("Ana Ruiz");

    let decision = desk.state.eligibility.can_borrow(ana, None).await.unwrap();

    assert!(decision.allowed);
    assert_eq!(decision.reason, None);
    assert_eq!(decision.active_count, 0);
    assert_eq!(decision.overdue_count, 0);
    assert_eq!(decision.max_loans_allowed, 3);
}

#[tokio::test]
async fn test_inactive_person_is_checked_first() {
    let desk = Desk::new(at(2024, 5, 10, 9));
    let ana = desk.student("Ana Ruiz");
    desk.update_person(ana, |p| {
        p.active = false;
        p.has_penalty = true;
    })
    .await;

    let decision = desk.state.eligibility.can_borrow(ana, None).await.unwrap();

    assert!(!decision.allowed);
    assert_eq!(decision.reason, Some(DenialReason::PersonInactive));
}

#[tokio::test]
async fn test_penalty_wins_over_overdue_loans() {
    let desk = Desk::new(at(2024, 5, 10, 9));
    let ana = desk.student("Ana Ruiz");
    let atlas = desk.resource("World Atlas");
    desk.history(ana, atlas, at(2024, 4, 1, 9), 14, LoanStatus::Active, None)
        .await;
    desk.update_person(ana, |p| p.has_penalty = true).await;

    let decision = desk.state.eligibility.can_borrow(ana, None).await.unwrap();

    assert_eq!(decision.reason, Some(DenialReason::ActivePenalty));
    assert_eq!(decision.overdue_count, 1);
    assert!(decision.current_loans.is_empty());
}

#[tokio::test]
async fn test_unknown_person_is_not_found() {
    let desk = Desk::new(at(2024, 5, 10, 9));

    let result = desk.state.eligibility.can_borrow(Uuid::new_v4(), None).await;

    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

// ============================================================================
// Loan checks
// ============================================================================

#[tokio::test]
async fn test_live_overdue_blocks_even_with_active_label() {
    let desk = Desk::new(at(2024, 5, 10, 9));
    let ana = desk.student("Ana Ruiz");
    let atlas = desk.resource("World Atlas");
    // Due 2024-05-08 09:00, two days late
    let loan_id = desk
        .history(ana, atlas, at(2024, 4, 24, 9), 14, LoanStatus::Active, None)
        .await;

    let decision = desk.state.eligibility.can_borrow(ana, None).await.unwrap();

    assert!(!decision.allowed);
    assert_eq!(decision.reason, Some(DenialReason::HasOverdueLoans));
    assert_eq!(decision.active_count, 1);
    assert_eq!(decision.overdue_count, 1);
    assert_eq!(decision.current_loans.len(), 1);
    assert_eq!(decision.current_loans[0].loan_id, loan_id);
    assert_eq!(decision.current_loans[0].days_overdue, 2);
    assert_eq!(decision.current_loans[0].severity, Some(Severity::Low));
}

#[tokio::test]
async fn test_less_than_a_day_late_is_not_overdue() {
    let desk = Desk::new(at(2024, 5, 10, 8));
    let ana = desk.student("Ana Ruiz");
    let atlas = desk.resource("World Atlas");
    // Due 2024-05-09 09:00, 23 hours ago
    desk.history(ana, atlas, at(2024, 4, 25, 9), 14, LoanStatus::Active, None)
        .await;

    let decision = desk.state.eligibility.can_borrow(ana, None).await.unwrap();
    assert!(decision.allowed);
    assert_eq!(decision.overdue_count, 0);

    desk.clock.advance(Duration::hours(1));
    let decision = desk.state.eligibility.can_borrow(ana, None).await.unwrap();
    assert_eq!(decision.reason, Some(DenialReason::HasOverdueLoans));
}

#[tokio::test]
async fn test_student_limit_reached() {
    let desk = Desk::new(at(2024, 5, 10, 9));
    let ana = desk.student("Ana Ruiz");
    for title in ["Atlas", "Chess Set", "Microscope"] {
        let resource = desk.resource(title);
        desk.history(ana, resource, at(2024, 5, 8, 9), 14, LoanStatus::Active, None)
            .await;
    }

    let decision = desk.state.eligibility.can_borrow(ana, None).await.unwrap();

    assert!(!decision.allowed);
    assert_eq!(decision.reason, Some(DenialReason::LimitReached));
    assert_eq!(decision.active_count, 3);
    assert_eq!(decision.current_loans.len(), 3);
    assert!(decision.current_loans.iter().all(|l| l.days_overdue == 0));
}

#[tokio::test]
async fn test_teacher_limit_is_higher() {
    let desk = Desk::new(at(2024, 5, 10, 9));
    let marta = desk.teacher("Marta Gil");
    for i in 0..4 {
        let resource = desk.resource(&format!("Lab Kit {}", i));
        desk.history(marta, resource, at(2024, 5, 8, 9), 30, LoanStatus::Active, None)
            .await;
    }

    let decision = desk.state.eligibility.can_borrow(marta, None).await.unwrap();

    assert!(decision.allowed);
    assert_eq!(decision.active_count, 4);
    assert_eq!(decision.max_loans_allowed, 5);
}

#[tokio::test]
async fn test_returned_and_lost_loans_do_not_count() {
    let desk = Desk::new(at(2024, 5, 10, 9));
    let ana = desk.student("Ana Ruiz");
    for i in 0..3 {
        let resource = desk.resource(&format!("Novel {}", i));
        desk.history(
            ana,
            resource,
            at(2024, 3, 1, 9),
            14,
            LoanStatus::Returned,
            Some(at(2024, 3, 20, 9)),
        )
        .await;
    }
    let lost = desk.resource("Old Map");
    desk.history(ana, lost, at(2024, 2, 1, 9), 14, LoanStatus::Lost, None)
        .await;

    let decision = desk.state.eligibility.can_borrow(ana, None).await.unwrap();

    assert!(decision.allowed);
    assert_eq!(decision.active_count, 0);
}

// ============================================================================
// Resource checks
// ============================================================================

#[tokio::test]
async fn test_resource_on_loan_is_unavailable() {
    let desk = Desk::new(at(2024, 5, 10, 9));
    let ana = desk.student("Ana Ruiz");
    let luis = desk.student("Luis Mora");
    let atlas = desk.resource("World Atlas");
    desk.history(luis, atlas, at(2024, 5, 9, 9), 14, LoanStatus::Active, None)
        .await;

    let decision = desk
        .state
        .eligibility
        .can_borrow(ana, Some(atlas))
        .await
        .unwrap();

    assert!(!decision.allowed);
    assert_eq!(decision.reason, Some(DenialReason::ResourceUnavailable));
}

#[tokio::test]
async fn test_lost_resource_is_unavailable() {
    let desk = Desk::new(at(2024, 5, 10, 9));
    let ana = desk.student("Ana Ruiz");
    let luis = desk.student("Luis Mora");
    let atlas = desk.resource("World Atlas");
    desk.history(luis, atlas, at(2024, 1, 9, 9), 14, LoanStatus::Lost, None)
        .await;

    let decision = desk
        .state
        .eligibility
        .can_borrow(ana, Some(atlas))
        .await
        .unwrap();

    assert_eq!(decision.reason, Some(DenialReason::ResourceUnavailable));
}

#[tokio::test]
async fn test_unknown_resource_is_not_found() {
    let desk = Desk::new(at(2024, 5, 10, 9));
    let ana = desk.student("Ana Ruiz");

    let result = desk
        .state
        .eligibility
        .can_borrow(ana, Some(Uuid::new_v4()))
        .await;

    assert!(matches!(result, Err(ApiError::NotFound(_))));
}

#[tokio::test]
async fn test_available_resource_is_allowed() {
    let desk = Desk::new(at(2024, 5, 10, 9));
    let ana = desk.student("Ana Ruiz");
    let atlas = desk.resource("World Atlas");

    let decision = desk
        .state
        .eligibility
        .can_borrow(ana, Some(atlas))
        .await
        .unwrap();

    assert!(decision.allowed);
}
