use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::debug;

use super::EnrollmentGateway;
use crate::workflows::enrollment::domain::{
    AcademicPeriod, AcademicSection, Enrollment, EnrollmentId, EnrollmentStatus, NewEnrollment,
    SectionId, SelectorOption, SlotFilter, StudentId, StudentOption,
};
use crate::workflows::enrollment::error::EnrollmentError;

/// Student registered in the in-memory store. `grade_id` narrows the sections offered to the
/// student to one grade level; `None` offers every section of the period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudentSeed {
    pub id: StudentId,
    pub name: String,
    pub grade_id: Option<u64>,
}

/// Grade/section offering registered in the in-memory store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionSeed {
    pub id: SectionId,
    pub grade_id: u64,
    pub paralelo_id: u64,
    pub academic_year_id: u64,
    pub capacity: u32,
    pub occupied: u32,
}

#[derive(Debug, Clone)]
struct SectionEntry {
    grade_id: u64,
    academic_year_id: u64,
    section: AcademicSection,
}

#[derive(Debug, Default)]
struct StoreState {
    grades: BTreeMap<u64, String>,
    paralelos: BTreeMap<u64, String>,
    academic_years: BTreeMap<u64, AcademicPeriod>,
    sections: BTreeMap<SectionId, SectionEntry>,
    students: BTreeMap<StudentId, StudentSeed>,
    enrollments: Vec<Enrollment>,
    next_enrollment_id: u64,
}

impl StoreState {
    fn is_enrolled(&self, student_id: StudentId, period: &AcademicPeriod) -> bool {
        self.enrollments
            .iter()
            .any(|enrollment| enrollment.student_id == student_id && &enrollment.period == period)
    }

    /// Check-and-increment under the store lock; the whole call is one critical section.
    fn create(&mut self, request: NewEnrollment) -> Result<Enrollment, EnrollmentError> {
        if request.student_id.0 == 0 || request.section_id.0 == 0 {
            return Err(EnrollmentError::Validation(
                "estudianteId and gradoParaleloId must be positive".to_string(),
            ));
        }

        let student = self
            .students
            .get(&request.student_id)
            .cloned()
            .ok_or_else(|| EnrollmentError::NotFound(format!("student {}", request.student_id)))?;

        let period = self
            .sections
            .get(&request.section_id)
            .map(|entry| entry.section.academic_year.clone())
            .ok_or_else(|| EnrollmentError::NotFound(format!("section {}", request.section_id)))?;

        if self.is_enrolled(request.student_id, &period) {
            return Err(EnrollmentError::DuplicateEnrollment {
                student_id: request.student_id,
            });
        }

        let entry = self
            .sections
            .get_mut(&request.section_id)
            .ok_or_else(|| EnrollmentError::NotFound(format!("section {}", request.section_id)))?;
        entry
            .section
            .occupy_one()
            .map_err(|_| EnrollmentError::CapacityExhausted {
                section_id: request.section_id,
            })?;

        self.next_enrollment_id += 1;
        let enrollment = Enrollment {
            id: EnrollmentId(self.next_enrollment_id),
            student_id: student.id,
            student_name: student.name,
            section_id: request.section_id,
            grade_name: entry.section.grade_name.clone(),
            section_name: entry.section.section_name.clone(),
            period,
            status: EnrollmentStatus::pending(),
            created_at: Utc::now().naive_utc(),
        };
        self.enrollments.push(enrollment.clone());
        Ok(enrollment)
    }
}

/// Authoritative in-process store with the same contract as the REST backend.
#[derive(Debug, Clone)]
pub struct InMemoryEnrollmentStore {
    state: Arc<Mutex<StoreState>>,
    current_period: AcademicPeriod,
}

impl InMemoryEnrollmentStore {
    /// `current_period` is the period eligibility and candidate slots are computed for.
    pub fn new(current_period: AcademicPeriod) -> Self {
        Self {
            state: Arc::new(Mutex::new(StoreState::default())),
            current_period,
        }
    }

    pub fn current_period(&self) -> &AcademicPeriod {
        &self.current_period
    }

    pub fn add_grade(&self, id: u64, name: impl Into<String>) {
        self.lock().grades.insert(id, name.into());
    }

    pub fn add_paralelo(&self, id: u64, name: impl Into<String>) {
        self.lock().paralelos.insert(id, name.into());
    }

    pub fn add_academic_year(&self, id: u64, label: AcademicPeriod) {
        self.lock().academic_years.insert(id, label);
    }

    pub fn add_student(&self, seed: StudentSeed) {
        self.lock().students.insert(seed.id, seed);
    }

    pub fn add_section(&self, seed: SectionSeed) -> Result<AcademicSection, EnrollmentError> {
        let mut state = self.lock();
        let grade = state
            .grades
            .get(&seed.grade_id)
            .cloned()
            .ok_or_else(|| EnrollmentError::NotFound(format!("grade {}", seed.grade_id)))?;
        let paralelo = state
            .paralelos
            .get(&seed.paralelo_id)
            .cloned()
            .ok_or_else(|| EnrollmentError::NotFound(format!("paralelo {}", seed.paralelo_id)))?;
        let year = state
            .academic_years
            .get(&seed.academic_year_id)
            .cloned()
            .ok_or_else(|| {
                EnrollmentError::NotFound(format!("academic year {}", seed.academic_year_id))
            })?;

        let section = AcademicSection::new(
            seed.id,
            seed.paralelo_id,
            grade,
            paralelo,
            year,
            seed.capacity,
            seed.occupied,
        )
        .map_err(|violation| EnrollmentError::Validation(violation.to_string()))?;

        state.sections.insert(
            seed.id,
            SectionEntry {
                grade_id: seed.grade_id,
                academic_year_id: seed.academic_year_id,
                section: section.clone(),
            },
        );
        Ok(section)
    }

    pub fn section(&self, id: SectionId) -> Option<AcademicSection> {
        self.lock()
            .sections
            .get(&id)
            .map(|entry| entry.section.clone())
    }

    fn lock(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn options(map: &BTreeMap<u64, impl ToString>) -> Vec<SelectorOption> {
        map.iter()
            .map(|(key, value)| SelectorOption {
                key: *key,
                value: value.to_string(),
            })
            .collect()
    }
}

impl EnrollmentGateway for InMemoryEnrollmentStore {
    async fn available_slots(
        &self,
        filter: &SlotFilter,
    ) -> Result<Vec<AcademicSection>, EnrollmentError> {
        let filter = filter.normalized();
        let state = self.lock();
        Ok(state
            .sections
            .values()
            .filter(|entry| filter.grade_id.map_or(true, |id| entry.grade_id == id))
            .filter(|entry| {
                filter
                    .section_id
                    .map_or(true, |id| entry.section.paralelo_id == id)
            })
            .filter(|entry| {
                filter
                    .academic_year_id
                    .map_or(true, |id| entry.academic_year_id == id)
            })
            .map(|entry| entry.section.clone())
            .collect())
    }

    async fn candidate_slots(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<AcademicSection>, EnrollmentError> {
        let state = self.lock();
        let student = state
            .students
            .get(&student_id)
            .ok_or_else(|| EnrollmentError::NotFound(format!("student {student_id}")))?;

        if state.is_enrolled(student_id, &self.current_period) {
            debug!(%student_id, "student already enrolled; no candidate slots");
            return Ok(Vec::new());
        }

        Ok(state
            .sections
            .values()
            .filter(|entry| entry.section.academic_year == self.current_period)
            .filter(|entry| student.grade_id.map_or(true, |id| entry.grade_id == id))
            .map(|entry| entry.section.clone())
            .collect())
    }

    async fn eligible_students(&self) -> Result<Vec<StudentOption>, EnrollmentError> {
        let state = self.lock();
        Ok(state
            .students
            .values()
            .filter(|student| !state.is_enrolled(student.id, &self.current_period))
            .map(|student| StudentOption {
                id: student.id,
                label: student.name.clone(),
            })
            .collect())
    }

    async fn create_enrollment(
        &self,
        request: NewEnrollment,
    ) -> Result<Enrollment, EnrollmentError> {
        // Let concurrent commits interleave the way network calls would.
        tokio::task::yield_now().await;
        self.lock().create(request)
    }

    async fn enrollments(
        &self,
        period: Option<&AcademicPeriod>,
    ) -> Result<Vec<Enrollment>, EnrollmentError> {
        let state = self.lock();
        Ok(state
            .enrollments
            .iter()
            .filter(|enrollment| period.map_or(true, |period| &enrollment.period == period))
            .cloned()
            .collect())
    }

    async fn grade_options(&self) -> Result<Vec<SelectorOption>, EnrollmentError> {
        Ok(Self::options(&self.lock().grades))
    }

    async fn section_options(&self) -> Result<Vec<SelectorOption>, EnrollmentError> {
        Ok(Self::options(&self.lock().paralelos))
    }

    async fn academic_year_options(&self) -> Result<Vec<SelectorOption>, EnrollmentError> {
        Ok(Self::options(&self.lock().academic_years))
    }
}
