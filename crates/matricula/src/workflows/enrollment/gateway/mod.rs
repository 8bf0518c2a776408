//! Port to the authoritative enrollment backend.
//!
//! [`RestGateway`] talks to the school's REST API; [`InMemoryEnrollmentStore`] keeps the same
//! invariants in process for the demo runner and tests.

mod memory;
mod rest;

use std::future::Future;

use super::domain::{
    AcademicPeriod, AcademicSection, Enrollment, NewEnrollment, SelectorOption, SlotFilter,
    StudentId, StudentOption,
};
use super::error::EnrollmentError;

pub use memory::{InMemoryEnrollmentStore, SectionSeed, StudentSeed};
pub use rest::RestGateway;

/// Storage abstraction so the enrollment components can be exercised in isolation.
///
/// Implementations own the capacity check: `create_enrollment` must refuse a full section and a
/// second enrollment of the same student in one period, atomically.
pub trait EnrollmentGateway: Send + Sync {
    fn available_slots(
        &self,
        filter: &SlotFilter,
    ) -> impl Future<Output = Result<Vec<AcademicSection>, EnrollmentError>> + Send;

    fn candidate_slots(
        &self,
        student_id: StudentId,
    ) -> impl Future<Output = Result<Vec<AcademicSection>, EnrollmentError>> + Send;

    fn eligible_students(
        &self,
    ) -> impl Future<Output = Result<Vec<StudentOption>, EnrollmentError>> + Send;

    fn create_enrollment(
        &self,
        request: NewEnrollment,
    ) -> impl Future<Output = Result<Enrollment, EnrollmentError>> + Send;

    /// `None` asks for every period the backend knows.
    fn enrollments(
        &self,
        period: Option<&AcademicPeriod>,
    ) -> impl Future<Output = Result<Vec<Enrollment>, EnrollmentError>> + Send;

    fn grade_options(
        &self,
    ) -> impl Future<Output = Result<Vec<SelectorOption>, EnrollmentError>> + Send;

    fn section_options(
        &self,
    ) -> impl Future<Output = Result<Vec<SelectorOption>, EnrollmentError>> + Send;

    fn academic_year_options(
        &self,
    ) -> impl Future<Output = Result<Vec<SelectorOption>, EnrollmentError>> + Send;
}
