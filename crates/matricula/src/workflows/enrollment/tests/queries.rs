use std::sync::Arc;

use super::common::*;
use crate::workflows::enrollment::domain::AcademicPeriod;
use crate::workflows::enrollment::{EnrollmentQuery, EnrollmentService};

#[tokio::test]
async fn listing_defaults_to_the_current_period() {
    let (service, _) = build_service();
    service
        .committer()
        .commit(ANA, LAST_YEAR)
        .await
        .expect("previous period");
    service
        .committer()
        .commit(CARLA, ROOMY)
        .await
        .expect("current period");

    let current = service
        .queries()
        .list_enrollments(None)
        .await
        .expect("listing");
    assert_eq!(current.len(), 1);
    assert_eq!(current[0].student_id, CARLA);

    let previous = service
        .queries()
        .list_enrollments(Some(previous_period()))
        .await
        .expect("listing");
    assert_eq!(previous.len(), 1);
    assert_eq!(previous[0].student_id, ANA);
}

#[tokio::test]
async fn repeated_reads_are_served_from_cache_until_a_commit() {
    let gateway = Arc::new(CountingGateway::wrapping(seeded_store()));
    let service = EnrollmentService::new(gateway.clone(), &enrollment_config());

    let first = service.queries().list_enrollments(None).await.expect("read");
    let second = service.queries().list_enrollments(None).await.expect("read");
    assert_eq!(first, second);
    assert_eq!(gateway.reads(), 1);

    service
        .committer()
        .commit(ANA, LAST_SEAT)
        .await
        .expect("commit");
    let after = service.queries().list_enrollments(None).await.expect("read");
    assert_eq!(gateway.reads(), 2);
    assert_eq!(after.len(), 1);

    service
        .queries()
        .refresh(current_period())
        .await
        .expect("refresh");
    assert_eq!(gateway.reads(), 3);
}

#[tokio::test]
async fn a_listing_overtaken_by_a_commit_is_not_cached() {
    let gateway = Arc::new(HeldListingGateway::wrapping(seeded_store()));
    let service = Arc::new(EnrollmentService::new(
        gateway.clone(),
        &enrollment_config(),
    ));

    let reader = {
        let service = service.clone();
        tokio::spawn(async move { service.queries().list_enrollments(None).await })
    };
    gateway.snapshot_taken.notified().await;

    service
        .committer()
        .commit(ANA, LAST_SEAT)
        .await
        .expect("commit");
    gateway.release.notify_one();

    let overtaken = reader.await.expect("reader task").expect("read");
    assert!(overtaken.is_empty());

    let after = service.queries().list_enrollments(None).await.expect("read");
    assert_eq!(after.len(), 1);
    assert_eq!(after[0].student_id, ANA);
}

#[tokio::test]
async fn search_filters_case_insensitively_and_paginates() {
    let (service, _) = build_service();
    for (student, section) in [(ANA, LAST_SEAT), (BRUNO, LAST_YEAR), (CARLA, ROOMY)] {
        service
            .committer()
            .commit(student, section)
            .await
            .expect("commit");
    }

    let page = service
        .queries()
        .search(EnrollmentQuery {
            search: Some("PÉREZ".to_string()),
            ..EnrollmentQuery::default()
        })
        .await
        .expect("search");
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].student_id, ANA);

    let paged = service
        .queries()
        .search(EnrollmentQuery {
            page: 1,
            page_size: 1,
            ..EnrollmentQuery::default()
        })
        .await
        .expect("page");
    assert_eq!(paged.total, 2);
    assert_eq!(paged.items.len(), 1);
    assert_eq!(paged.items[0].student_id, CARLA);
    assert_eq!(paged.period, current_period());
}

#[tokio::test]
async fn known_periods_merge_configuration_and_loaded_data_newest_first() {
    let (service, _) = build_service();
    service
        .queries()
        .list_enrollments(Some(AcademicPeriod::from("2023-2024")))
        .await
        .expect("listing");

    let periods: Vec<String> = service
        .queries()
        .known_periods()
        .into_iter()
        .map(|period| period.to_string())
        .collect();
    assert_eq!(periods, vec!["2025-2026", "2024-2025", "2023-2024"]);
}

#[tokio::test]
async fn a_failed_read_is_not_cached() {
    let service = EnrollmentService::new(Arc::new(UnavailableGateway), &enrollment_config());

    assert!(service.queries().list_enrollments(None).await.is_err());
    assert_eq!(service.queries().known_periods().len(), 2);
}
