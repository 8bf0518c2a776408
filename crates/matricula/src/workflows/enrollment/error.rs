use super::domain::{SectionId, StudentId};

/// Failure taxonomy shared by the gateway and every enrollment component.
///
/// Nothing here is retried automatically: only [`EnrollmentError::is_retryable`] errors are even
/// worth offering the operator a retry button for.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum EnrollmentError {
    #[error("enrollment backend unreachable: {0}")]
    Transport(String),
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("section {section_id} has no remaining capacity")]
    CapacityExhausted { section_id: SectionId },
    #[error("student {student_id} already holds an enrollment for this period")]
    DuplicateEnrollment { student_id: StudentId },
    #[error("not found: {0}")]
    NotFound(String),
    #[error("session is not authorized")]
    Unauthorized,
    #[error("backend reported a conflict: {0}")]
    Conflict(String),
    #[error("backend error (status {status}): {message}")]
    Backend { status: u16, message: String },
    #[error("unexpected backend payload: {0}")]
    Decode(String),
}

impl EnrollmentError {
    /// Stable code used in JSON error payloads.
    pub const fn code(&self) -> &'static str {
        match self {
            EnrollmentError::Transport(_) => "TransportError",
            EnrollmentError::Validation(_) => "ValidationFailed",
            EnrollmentError::CapacityExhausted { .. } => "CapacityExhausted",
            EnrollmentError::DuplicateEnrollment { .. } => "DuplicateEnrollment",
            EnrollmentError::NotFound(_) => "NotFound",
            EnrollmentError::Unauthorized => "Unauthorized",
            EnrollmentError::Conflict(_) => "Conflict",
            EnrollmentError::Backend { .. } => "BackendError",
            EnrollmentError::Decode(_) => "DecodeError",
        }
    }

    /// Message shown to the operator. Each variant reads differently on purpose.
    pub fn user_message(&self) -> String {
        match self {
            EnrollmentError::Transport(_) => {
                "The enrollment service could not be reached. Try again.".to_string()
            }
            EnrollmentError::Validation(detail) => format!("Check the form: {detail}."),
            EnrollmentError::CapacityExhausted { .. } => {
                "This section just filled up, pick another.".to_string()
            }
            EnrollmentError::DuplicateEnrollment { .. } => {
                "The student is already enrolled this period.".to_string()
            }
            EnrollmentError::NotFound(_) => {
                "This record no longer exists, refresh the list.".to_string()
            }
            EnrollmentError::Unauthorized => "Your session ended. Log in again.".to_string(),
            EnrollmentError::Conflict(_) => {
                "The record changed while you were working on it. Refresh the list.".to_string()
            }
            EnrollmentError::Backend { .. } => {
                "The enrollment service reported an internal error.".to_string()
            }
            EnrollmentError::Decode(_) => {
                "The enrollment service answered with data the console cannot read.".to_string()
            }
        }
    }

    pub const fn is_retryable(&self) -> bool {
        matches!(self, EnrollmentError::Transport(_))
    }
}
