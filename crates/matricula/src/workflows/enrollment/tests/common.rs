use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use axum::response::Response;
use serde_json::Value;
use tokio::sync::Notify;

use crate::config::EnrollmentConfig;
use crate::workflows::enrollment::domain::{
    AcademicPeriod, AcademicSection, Enrollment, NewEnrollment, SectionId, SelectorOption,
    SlotFilter, StudentId, StudentOption,
};
use crate::workflows::enrollment::error::EnrollmentError;
use crate::workflows::enrollment::gateway::{
    EnrollmentGateway, InMemoryEnrollmentStore, SectionSeed, StudentSeed,
};
use crate::workflows::enrollment::{enrollment_router, EnrollmentService};

pub(super) const ANA: StudentId = StudentId(7);
pub(super) const BRUNO: StudentId = StudentId(8);
pub(super) const CARLA: StudentId = StudentId(9);

/// 1ro A, one seat left.
pub(super) const LAST_SEAT: SectionId = SectionId(12);
/// 1ro B, full.
pub(super) const FULL: SectionId = SectionId(13);
/// 2do A, plenty of room.
pub(super) const ROOMY: SectionId = SectionId(14);
/// 1ro A of the previous year.
pub(super) const LAST_YEAR: SectionId = SectionId(20);

pub(super) fn current_period() -> AcademicPeriod {
    AcademicPeriod::from("2025-2026")
}

pub(super) fn previous_period() -> AcademicPeriod {
    AcademicPeriod::from("2024-2025")
}

pub(super) fn enrollment_config() -> EnrollmentConfig {
    EnrollmentConfig::from_list("2024-2025,2025-2026").expect("valid periods")
}

pub(super) fn seeded_store() -> InMemoryEnrollmentStore {
    let store = InMemoryEnrollmentStore::new(current_period());
    store.add_grade(1, "Primero");
    store.add_grade(2, "Segundo");
    store.add_paralelo(1, "A");
    store.add_paralelo(2, "B");
    store.add_academic_year(1, current_period());
    store.add_academic_year(2, previous_period());

    for (id, grade_id, paralelo_id, academic_year_id, capacity, occupied) in [
        (LAST_SEAT, 1, 1, 1, 30, 29),
        (FULL, 1, 2, 1, 30, 30),
        (ROOMY, 2, 1, 1, 25, 10),
        (LAST_YEAR, 1, 1, 2, 30, 0),
    ] {
        store
            .add_section(SectionSeed {
                id,
                grade_id,
                paralelo_id,
                academic_year_id,
                capacity,
                occupied,
            })
            .expect("valid section");
    }

    for (id, name, grade_id) in [
        (ANA, "Ana Pérez", Some(1)),
        (BRUNO, "Bruno Díaz", Some(1)),
        (CARLA, "Carla Ruiz", Some(2)),
    ] {
        store.add_student(StudentSeed {
            id,
            name: name.to_string(),
            grade_id,
        });
    }

    store
}

pub(super) fn build_service() -> (
    Arc<EnrollmentService<InMemoryEnrollmentStore>>,
    InMemoryEnrollmentStore,
) {
    let store = seeded_store();
    let service = Arc::new(EnrollmentService::new(
        Arc::new(store.clone()),
        &enrollment_config(),
    ));
    (service, store)
}

pub(super) fn router_with_store(store: InMemoryEnrollmentStore) -> axum::Router {
    enrollment_router(Arc::new(EnrollmentService::new(
        Arc::new(store),
        &enrollment_config(),
    )))
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("valid json")
}

/// Store wrapper counting how often the enrollment listing reaches the backend.
pub(super) struct CountingGateway {
    inner: InMemoryEnrollmentStore,
    enrollment_reads: AtomicUsize,
}

impl CountingGateway {
    pub(super) fn wrapping(store: InMemoryEnrollmentStore) -> Self {
        Self {
            inner: store,
            enrollment_reads: AtomicUsize::new(0),
        }
    }

    pub(super) fn reads(&self) -> usize {
        self.enrollment_reads.load(Ordering::SeqCst)
    }
}

impl EnrollmentGateway for CountingGateway {
    async fn available_slots(
        &self,
        filter: &SlotFilter,
    ) -> Result<Vec<AcademicSection>, EnrollmentError> {
        self.inner.available_slots(filter).await
    }

    async fn candidate_slots(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<AcademicSection>, EnrollmentError> {
        self.inner.candidate_slots(student_id).await
    }

    async fn eligible_students(&self) -> Result<Vec<StudentOption>, EnrollmentError> {
        self.inner.eligible_students().await
    }

    async fn create_enrollment(
        &self,
        request: NewEnrollment,
    ) -> Result<Enrollment, EnrollmentError> {
        self.inner.create_enrollment(request).await
    }

    async fn enrollments(
        &self,
        period: Option<&AcademicPeriod>,
    ) -> Result<Vec<Enrollment>, EnrollmentError> {
        self.enrollment_reads.fetch_add(1, Ordering::SeqCst);
        self.inner.enrollments(period).await
    }

    async fn grade_options(&self) -> Result<Vec<SelectorOption>, EnrollmentError> {
        self.inner.grade_options().await
    }

    async fn section_options(&self) -> Result<Vec<SelectorOption>, EnrollmentError> {
        self.inner.section_options().await
    }

    async fn academic_year_options(&self) -> Result<Vec<SelectorOption>, EnrollmentError> {
        self.inner.academic_year_options().await
    }
}

/// Store wrapper whose next enrollment listing takes its snapshot and then waits to be released.
pub(super) struct HeldListingGateway {
    inner: InMemoryEnrollmentStore,
    hold_next: AtomicBool,
    pub(super) snapshot_taken: Notify,
    pub(super) release: Notify,
}

impl HeldListingGateway {
    pub(super) fn wrapping(store: InMemoryEnrollmentStore) -> Self {
        Self {
            inner: store,
            hold_next: AtomicBool::new(true),
            snapshot_taken: Notify::new(),
            release: Notify::new(),
        }
    }
}

impl EnrollmentGateway for HeldListingGateway {
    async fn available_slots(
        &self,
        filter: &SlotFilter,
    ) -> Result<Vec<AcademicSection>, EnrollmentError> {
        self.inner.available_slots(filter).await
    }

    async fn candidate_slots(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<AcademicSection>, EnrollmentError> {
        self.inner.candidate_slots(student_id).await
    }

    async fn eligible_students(&self) -> Result<Vec<StudentOption>, EnrollmentError> {
        self.inner.eligible_students().await
    }

    async fn create_enrollment(
        &self,
        request: NewEnrollment,
    ) -> Result<Enrollment, EnrollmentError> {
        self.inner.create_enrollment(request).await
    }

    async fn enrollments(
        &self,
        period: Option<&AcademicPeriod>,
    ) -> Result<Vec<Enrollment>, EnrollmentError> {
        let snapshot = self.inner.enrollments(period).await;
        if self.hold_next.swap(false, Ordering::SeqCst) {
            self.snapshot_taken.notify_one();
            self.release.notified().await;
        }
        snapshot
    }

    async fn grade_options(&self) -> Result<Vec<SelectorOption>, EnrollmentError> {
        self.inner.grade_options().await
    }

    async fn section_options(&self) -> Result<Vec<SelectorOption>, EnrollmentError> {
        self.inner.section_options().await
    }

    async fn academic_year_options(&self) -> Result<Vec<SelectorOption>, EnrollmentError> {
        self.inner.academic_year_options().await
    }
}

/// Backend that is never reachable.
pub(super) struct UnavailableGateway;

impl UnavailableGateway {
    fn down<T>() -> Result<T, EnrollmentError> {
        Err(EnrollmentError::Transport("connection refused".to_string()))
    }
}

impl EnrollmentGateway for UnavailableGateway {
    async fn available_slots(
        &self,
        _filter: &SlotFilter,
    ) -> Result<Vec<AcademicSection>, EnrollmentError> {
        Self::down()
    }

    async fn candidate_slots(
        &self,
        _student_id: StudentId,
    ) -> Result<Vec<AcademicSection>, EnrollmentError> {
        Self::down()
    }

    async fn eligible_students(&self) -> Result<Vec<StudentOption>, EnrollmentError> {
        Self::down()
    }

    async fn create_enrollment(
        &self,
        _request: NewEnrollment,
    ) -> Result<Enrollment, EnrollmentError> {
        Self::down()
    }

    async fn enrollments(
        &self,
        _period: Option<&AcademicPeriod>,
    ) -> Result<Vec<Enrollment>, EnrollmentError> {
        Self::down()
    }

    async fn grade_options(&self) -> Result<Vec<SelectorOption>, EnrollmentError> {
        Self::down()
    }

    async fn section_options(&self) -> Result<Vec<SelectorOption>, EnrollmentError> {
        Self::down()
    }

    async fn academic_year_options(&self) -> Result<Vec<SelectorOption>, EnrollmentError> {
        Self::down()
    }
}
