use std::sync::Arc;

use tracing::{info, warn};

use super::domain::{Enrollment, NewEnrollment, SectionId, StudentId};
use super::error::EnrollmentError;
use super::gateway::EnrollmentGateway;
use super::queries::EnrollmentQueryService;

/// Turns a chosen (student, section) pair into an enrollment record.
///
/// Capacity is checked by the backend at commit time; an earlier availability read proves
/// nothing. The response is authoritative and failures are never retried here.
pub struct EnrollmentCommitter<G> {
    gateway: Arc<G>,
    queries: Arc<EnrollmentQueryService<G>>,
}

impl<G> EnrollmentCommitter<G>
where
    G: EnrollmentGateway + 'static,
{
    pub fn new(gateway: Arc<G>, queries: Arc<EnrollmentQueryService<G>>) -> Self {
        Self { gateway, queries }
    }

    pub async fn commit(
        &self,
        student_id: StudentId,
        section_id: SectionId,
    ) -> Result<Enrollment, EnrollmentError> {
        let request = validate(student_id, section_id)?;

        match self.gateway.create_enrollment(request).await {
            Ok(enrollment) => {
                self.queries.invalidate();
                info!(
                    %student_id,
                    %section_id,
                    enrollment_id = %enrollment.id,
                    period = %enrollment.period,
                    "enrollment committed"
                );
                Ok(enrollment)
            }
            Err(err) => {
                warn!(
                    %student_id,
                    %section_id,
                    code = err.code(),
                    error = %err,
                    "enrollment commit rejected"
                );
                Err(err)
            }
        }
    }
}

fn validate(
    student_id: StudentId,
    section_id: SectionId,
) -> Result<NewEnrollment, EnrollmentError> {
    match (student_id.0, section_id.0) {
        (0, _) => Err(EnrollmentError::Validation(
            "a student must be selected".to_string(),
        )),
        (_, 0) => Err(EnrollmentError::Validation(
            "a section must be selected".to_string(),
        )),
        _ => Ok(NewEnrollment {
            student_id,
            section_id,
        }),
    }
}
