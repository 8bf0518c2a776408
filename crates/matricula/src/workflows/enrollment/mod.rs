//! Enrollment slot allocation: which grade/section offerings still have seats, which students
//! can still be enrolled, committing an enrollment against live capacity, and the audit listing.
//!
//! Every component talks to the backend through [`EnrollmentGateway`]. [`RestGateway`] speaks the
//! school's REST API; [`InMemoryEnrollmentStore`] holds the same contract in process.

mod committer;
mod directory;
pub mod domain;
mod eligibility;
pub mod error;
pub mod flow;
pub mod gateway;
mod queries;
pub mod router;
mod service;

#[cfg(test)]
mod tests;

pub use committer::EnrollmentCommitter;
pub use directory::SlotDirectory;
pub use domain::{
    AcademicPeriod, AcademicSection, CandidateSlot, CapacityViolation, Enrollment, EnrollmentId,
    EnrollmentStatus, NewEnrollment, SectionId, SelectorOption, SlotFilter, SlotFilterOptions,
    StudentId, StudentOption,
};
pub use eligibility::EligibilityResolver;
pub use error::EnrollmentError;
pub use flow::{
    Applied, CommitOutcome, CommitTicket, EnrollmentFlow, FetchTicket, FlowController, FlowError,
    FlowNotice, FlowPhase, FlowState, NoticeKind,
};
pub use gateway::{
    EnrollmentGateway, InMemoryEnrollmentStore, RestGateway, SectionSeed, StudentSeed,
};
pub use queries::{EnrollmentPage, EnrollmentQuery, EnrollmentQueryService, DEFAULT_PAGE_SIZE};
pub use router::enrollment_router;
pub use service::EnrollmentService;
