//! Interactive enrollment flow: pick a student, load their slots, pick a slot, confirm.
//!
//! [`EnrollmentFlow`] is the synchronous state machine; [`FlowController`] drives it against the
//! backend. Every fetch and commit is issued with a ticket stamped with the flow generation, and
//! a result carrying an older generation is dropped on arrival.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info};

use super::domain::{CandidateSlot, Enrollment, NewEnrollment, SectionId, StudentId, StudentOption};
use super::error::EnrollmentError;
use super::gateway::EnrollmentGateway;
use super::service::EnrollmentService;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    StudentSelected {
        student: StudentOption,
    },
    SlotsLoaded {
        student: StudentOption,
        slots: Vec<CandidateSlot>,
    },
    SlotSelected {
        student: StudentOption,
        slots: Vec<CandidateSlot>,
        selected: SectionId,
    },
    Committing {
        student: StudentOption,
        slots: Vec<CandidateSlot>,
        selected: SectionId,
    },
    Committed {
        enrollment: Enrollment,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlowPhase {
    Idle,
    StudentSelected,
    SlotsLoaded,
    SlotSelected,
    Committing,
    Committed,
}

impl FlowState {
    pub fn phase(&self) -> FlowPhase {
        match self {
            FlowState::Idle => FlowPhase::Idle,
            FlowState::StudentSelected { .. } => FlowPhase::StudentSelected,
            FlowState::SlotsLoaded { .. } => FlowPhase::SlotsLoaded,
            FlowState::SlotSelected { .. } => FlowPhase::SlotSelected,
            FlowState::Committing { .. } => FlowPhase::Committing,
            FlowState::Committed { .. } => FlowPhase::Committed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Success,
    Error,
}

/// Transient notification for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowNotice {
    pub kind: NoticeKind,
    pub message: String,
    pub error: Option<EnrollmentError>,
}

impl FlowNotice {
    fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
            error: None,
        }
    }

    fn failure(error: EnrollmentError) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: error.user_message(),
            error: Some(error),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchTicket {
    generation: u64,
    pub student_id: StudentId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommitTicket {
    generation: u64,
    pub request: NewEnrollment,
}

/// Whether a result was applied or dropped as stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Applied {
    Accepted,
    Stale,
}

/// Operator actions refused without changing state.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FlowError {
    #[error("an enrollment is being saved; wait for the result")]
    CommitInProgress,
    #[error("select a student first")]
    NoStudentSelected,
    #[error("the sections for this student have not loaded yet")]
    SlotsNotLoaded,
    #[error("section {0} is not offered to this student")]
    UnknownSlot(SectionId),
    #[error("section {0} has no seats left")]
    SlotFull(SectionId),
    #[error("select a student and a section with seats before confirming")]
    NotReady,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentFlow {
    state: FlowState,
    generation: u64,
    notice: Option<FlowNotice>,
}

impl Default for EnrollmentFlow {
    fn default() -> Self {
        Self::new()
    }
}

impl EnrollmentFlow {
    pub fn new() -> Self {
        Self {
            state: FlowState::Idle,
            generation: 0,
            notice: None,
        }
    }

    pub fn state(&self) -> &FlowState {
        &self.state
    }

    pub fn phase(&self) -> FlowPhase {
        self.state.phase()
    }

    pub fn notice(&self) -> Option<&FlowNotice> {
        self.notice.as_ref()
    }

    pub fn student(&self) -> Option<&StudentOption> {
        match &self.state {
            FlowState::StudentSelected { student }
            | FlowState::SlotsLoaded { student, .. }
            | FlowState::SlotSelected { student, .. }
            | FlowState::Committing { student, .. } => Some(student),
            FlowState::Idle | FlowState::Committed { .. } => None,
        }
    }

    pub fn slots(&self) -> &[CandidateSlot] {
        match &self.state {
            FlowState::SlotsLoaded { slots, .. }
            | FlowState::SlotSelected { slots, .. }
            | FlowState::Committing { slots, .. } => slots,
            _ => &[],
        }
    }

    pub fn selected_slot(&self) -> Option<&CandidateSlot> {
        match &self.state {
            FlowState::SlotSelected {
                slots, selected, ..
            }
            | FlowState::Committing {
                slots, selected, ..
            } => slots.iter().find(|slot| slot.id() == *selected),
            _ => None,
        }
    }

    pub fn enrollment(&self) -> Option<&Enrollment> {
        match &self.state {
            FlowState::Committed { enrollment } => Some(enrollment),
            _ => None,
        }
    }

    /// The confirm control is enabled only with a student and a non-full slot selected.
    pub fn can_confirm(&self) -> bool {
        matches!(self.state, FlowState::SlotSelected { .. })
            && self.selected_slot().is_some_and(CandidateSlot::is_selectable)
    }

    /// Selecting (or re-selecting) a student clears loaded slots and starts a new fetch.
    pub fn select_student(&mut self, student: StudentOption) -> Result<FetchTicket, FlowError> {
        self.ensure_not_committing()?;
        let student_id = student.id;
        self.generation += 1;
        self.notice = None;
        self.state = FlowState::StudentSelected { student };
        Ok(FetchTicket {
            generation: self.generation,
            student_id,
        })
    }

    /// Re-fetches slots for the current student, dropping any slot selection.
    pub fn reload_slots(&mut self) -> Result<FetchTicket, FlowError> {
        self.ensure_not_committing()?;
        let student = self.student().cloned().ok_or(FlowError::NoStudentSelected)?;
        self.select_student(student)
    }

    pub fn apply_slots(
        &mut self,
        ticket: FetchTicket,
        result: Result<Vec<CandidateSlot>, EnrollmentError>,
    ) -> Applied {
        if ticket.generation != self.generation {
            debug!(student_id = %ticket.student_id, "dropping stale slot response");
            return Applied::Stale;
        }
        let FlowState::StudentSelected { student } = &self.state else {
            return Applied::Stale;
        };

        match result {
            Ok(slots) => {
                self.state = FlowState::SlotsLoaded {
                    student: student.clone(),
                    slots,
                };
            }
            Err(error) => {
                self.notice = Some(FlowNotice::failure(error));
            }
        }
        Applied::Accepted
    }

    /// Picks a slot. Unknown and full slots are refused and the state is left untouched.
    pub fn select_slot(&mut self, section_id: SectionId) -> Result<(), FlowError> {
        let (student, slots) = match &self.state {
            FlowState::SlotsLoaded { student, slots }
            | FlowState::SlotSelected { student, slots, .. } => (student, slots),
            FlowState::Committing { .. } => return Err(FlowError::CommitInProgress),
            FlowState::StudentSelected { .. } => return Err(FlowError::SlotsNotLoaded),
            FlowState::Idle | FlowState::Committed { .. } => {
                return Err(FlowError::NoStudentSelected)
            }
        };

        let slot = slots
            .iter()
            .find(|slot| slot.id() == section_id)
            .ok_or(FlowError::UnknownSlot(section_id))?;
        if !slot.is_selectable() {
            return Err(FlowError::SlotFull(section_id));
        }

        self.state = FlowState::SlotSelected {
            student: student.clone(),
            slots: slots.clone(),
            selected: section_id,
        };
        Ok(())
    }

    /// Enters `Committing`. A second confirmation while one is in flight is refused.
    pub fn begin_commit(&mut self) -> Result<CommitTicket, FlowError> {
        self.ensure_not_committing()?;
        if !self.can_confirm() {
            return Err(FlowError::NotReady);
        }

        let FlowState::SlotSelected {
            student,
            slots,
            selected,
        } = std::mem::replace(&mut self.state, FlowState::Idle)
        else {
            return Err(FlowError::NotReady);
        };

        let request = NewEnrollment {
            student_id: student.id,
            section_id: selected,
        };
        self.notice = None;
        self.state = FlowState::Committing {
            student,
            slots,
            selected,
        };
        Ok(CommitTicket {
            generation: self.generation,
            request,
        })
    }

    /// Success ends the flow; failure returns to `SlotsLoaded` so another slot can be picked.
    pub fn apply_commit(
        &mut self,
        ticket: CommitTicket,
        result: Result<Enrollment, EnrollmentError>,
    ) -> Applied {
        if ticket.generation != self.generation
            || !matches!(self.state, FlowState::Committing { .. })
        {
            return Applied::Stale;
        }

        let FlowState::Committing { student, slots, .. } =
            std::mem::replace(&mut self.state, FlowState::Idle)
        else {
            return Applied::Stale;
        };

        match result {
            Ok(enrollment) => {
                self.notice = Some(FlowNotice::success(format!(
                    "Enrollment created for {}",
                    student.label
                )));
                self.state = FlowState::Committed { enrollment };
            }
            Err(error) => {
                self.notice = Some(FlowNotice::failure(error));
                self.state = FlowState::SlotsLoaded { student, slots };
            }
        }
        Applied::Accepted
    }

    /// Leaves the flow. Pending fetches are dropped when they arrive; an in-flight commit must be
    /// seen through.
    pub fn abandon(&mut self) -> Result<(), FlowError> {
        self.ensure_not_committing()?;
        self.generation += 1;
        self.notice = None;
        self.state = FlowState::Idle;
        Ok(())
    }

    fn ensure_not_committing(&self) -> Result<(), FlowError> {
        if matches!(self.state, FlowState::Committing { .. }) {
            Err(FlowError::CommitInProgress)
        } else {
            Ok(())
        }
    }
}

/// Outcome of a confirmation the flow accepted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitOutcome {
    Committed(Enrollment),
    Failed(EnrollmentError),
}

/// Drives one [`EnrollmentFlow`] against the enrollment service.
pub struct FlowController<G> {
    service: Arc<EnrollmentService<G>>,
    flow: EnrollmentFlow,
}

impl<G> FlowController<G>
where
    G: EnrollmentGateway + 'static,
{
    pub fn new(service: Arc<EnrollmentService<G>>) -> Self {
        Self {
            service,
            flow: EnrollmentFlow::new(),
        }
    }

    pub fn flow(&self) -> &EnrollmentFlow {
        &self.flow
    }

    pub async fn eligible_students(&self) -> Result<Vec<StudentOption>, EnrollmentError> {
        self.service.eligibility().list_eligible_students().await
    }

    /// Selects the student and loads their candidate slots.
    pub async fn choose_student(&mut self, student: StudentOption) -> Result<FlowPhase, FlowError> {
        let ticket = self.flow.select_student(student)?;
        self.fetch_slots(ticket).await;
        Ok(self.flow.phase())
    }

    pub async fn reload_slots(&mut self) -> Result<FlowPhase, FlowError> {
        let ticket = self.flow.reload_slots()?;
        self.fetch_slots(ticket).await;
        Ok(self.flow.phase())
    }

    pub fn select_slot(&mut self, section_id: SectionId) -> Result<(), FlowError> {
        self.flow.select_slot(section_id)
    }

    pub async fn confirm(&mut self) -> Result<CommitOutcome, FlowError> {
        let ticket = self.flow.begin_commit()?;
        let request = ticket.request;
        info!(
            student_id = %request.student_id,
            section_id = %request.section_id,
            "confirming enrollment"
        );

        let result = self
            .service
            .committer()
            .commit(request.student_id, request.section_id)
            .await;
        let outcome = match &result {
            Ok(enrollment) => CommitOutcome::Committed(enrollment.clone()),
            Err(error) => CommitOutcome::Failed(error.clone()),
        };
        self.flow.apply_commit(ticket, result);
        Ok(outcome)
    }

    pub fn abandon(&mut self) -> Result<(), FlowError> {
        self.flow.abandon()
    }

    async fn fetch_slots(&mut self, ticket: FetchTicket) {
        let result = self
            .service
            .eligibility()
            .list_candidate_slots(ticket.student_id)
            .await;
        self.flow.apply_slots(ticket, result);
    }
}
