use std::sync::Arc;

use tracing::{debug, warn};

use super::domain::{CandidateSlot, StudentId, StudentOption};
use super::error::EnrollmentError;
use super::gateway::EnrollmentGateway;

/// Works out who can still be enrolled and where.
pub struct EligibilityResolver<G> {
    gateway: Arc<G>,
}

impl<G> EligibilityResolver<G>
where
    G: EnrollmentGateway + 'static,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Students with no active enrollment for the target period.
    pub async fn list_eligible_students(&self) -> Result<Vec<StudentOption>, EnrollmentError> {
        let students = self.gateway.eligible_students().await.map_err(|err| {
            warn!(code = err.code(), error = %err, "loading eligible students failed");
            err
        })?;
        debug!(count = students.len(), "listed eligible students");
        Ok(students)
    }

    /// Sections the student may join, full ones included and flagged.
    pub async fn list_candidate_slots(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<CandidateSlot>, EnrollmentError> {
        if student_id.0 == 0 {
            return Err(EnrollmentError::Validation(
                "a student must be selected".to_string(),
            ));
        }

        let sections = self
            .gateway
            .candidate_slots(student_id)
            .await
            .map_err(|err| {
                warn!(
                    %student_id,
                    code = err.code(),
                    error = %err,
                    "loading candidate slots failed"
                );
                err
            })?;

        let slots: Vec<CandidateSlot> = sections
            .into_iter()
            .map(CandidateSlot::from_section)
            .collect();
        debug!(
            %student_id,
            total = slots.len(),
            full = slots.iter().filter(|slot| slot.is_full).count(),
            "listed candidate slots"
        );
        Ok(slots)
    }
}
