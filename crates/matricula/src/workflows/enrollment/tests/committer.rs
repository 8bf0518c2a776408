use std::sync::Arc;

use super::common::*;
use crate::workflows::enrollment::domain::{SectionId, StudentId};
use crate::workflows::enrollment::error::EnrollmentError;
use crate::workflows::enrollment::EnrollmentService;

#[tokio::test]
async fn commit_occupies_a_seat_and_records_a_pending_enrollment() {
    let (service, store) = build_service();

    let enrollment = service
        .committer()
        .commit(ANA, LAST_SEAT)
        .await
        .expect("seat available");

    assert_eq!(enrollment.period, current_period());
    assert_eq!(enrollment.grade_name, "Primero");
    assert_eq!(enrollment.section_name, "A");
    assert_eq!(enrollment.status.as_str(), "Pendiente");

    let section = store.section(LAST_SEAT).expect("section");
    assert_eq!(section.occupied(), 30);
    assert!(section.is_full());
}

#[tokio::test]
async fn commit_rejects_a_full_section_without_changing_it() {
    let (service, store) = build_service();

    let error = service
        .committer()
        .commit(ANA, FULL)
        .await
        .expect_err("section is full");

    assert_eq!(error, EnrollmentError::CapacityExhausted { section_id: FULL });
    assert_eq!(store.section(FULL).expect("section").occupied(), 30);
}

#[tokio::test]
async fn commit_rejects_a_second_enrollment_in_the_same_period() {
    let (service, store) = build_service();
    service
        .committer()
        .commit(CARLA, ROOMY)
        .await
        .expect("first enrollment");

    let error = service
        .committer()
        .commit(CARLA, LAST_SEAT)
        .await
        .expect_err("already enrolled");

    assert_eq!(
        error,
        EnrollmentError::DuplicateEnrollment { student_id: CARLA }
    );
    assert_eq!(store.section(LAST_SEAT).expect("section").occupied(), 29);
}

#[tokio::test]
async fn enrollment_in_a_past_period_does_not_block_the_current_one() {
    let (service, _) = build_service();
    service
        .committer()
        .commit(ANA, LAST_YEAR)
        .await
        .expect("previous period");

    let enrollment = service
        .committer()
        .commit(ANA, LAST_SEAT)
        .await
        .expect("current period");
    assert_eq!(enrollment.period, current_period());
}

#[tokio::test]
async fn commit_validates_ids_before_calling_the_backend() {
    let service = Arc::new(EnrollmentService::new(
        Arc::new(UnavailableGateway),
        &enrollment_config(),
    ));

    let missing_student = service
        .committer()
        .commit(StudentId(0), LAST_SEAT)
        .await
        .expect_err("no student");
    assert!(matches!(missing_student, EnrollmentError::Validation(_)));

    let missing_section = service
        .committer()
        .commit(ANA, SectionId(0))
        .await
        .expect_err("no section");
    assert!(matches!(missing_section, EnrollmentError::Validation(_)));

    let unreachable = service
        .committer()
        .commit(ANA, LAST_SEAT)
        .await
        .expect_err("backend down");
    assert!(unreachable.is_retryable());
}

#[tokio::test]
async fn unknown_student_or_section_is_not_found() {
    let (service, _) = build_service();

    assert!(matches!(
        service.committer().commit(StudentId(404), ROOMY).await,
        Err(EnrollmentError::NotFound(_))
    ));
    assert!(matches!(
        service.committer().commit(ANA, SectionId(404)).await,
        Err(EnrollmentError::NotFound(_))
    ));
}

#[tokio::test]
async fn concurrent_commits_never_oversubscribe_the_last_seat() {
    let (service, store) = build_service();

    let first = {
        let service = service.clone();
        tokio::spawn(async move { service.committer().commit(ANA, LAST_SEAT).await })
    };
    let second = {
        let service = service.clone();
        tokio::spawn(async move { service.committer().commit(BRUNO, LAST_SEAT).await })
    };

    let results = [
        first.await.expect("task completes"),
        second.await.expect("task completes"),
    ];

    assert_eq!(results.iter().filter(|result| result.is_ok()).count(), 1);
    assert!(results.iter().any(|result| matches!(
        result,
        Err(EnrollmentError::CapacityExhausted { section_id }) if *section_id == LAST_SEAT
    )));
    assert_eq!(store.section(LAST_SEAT).expect("section").occupied(), 30);
}
