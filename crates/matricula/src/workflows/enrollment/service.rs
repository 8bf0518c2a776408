use std::sync::Arc;

use super::committer::EnrollmentCommitter;
use super::directory::SlotDirectory;
use super::eligibility::EligibilityResolver;
use super::flow::FlowController;
use super::gateway::EnrollmentGateway;
use super::queries::EnrollmentQueryService;
use crate::config::EnrollmentConfig;

/// Service composing the slot directory, eligibility resolver, committer and query service
/// over one gateway.
pub struct EnrollmentService<G> {
    directory: SlotDirectory<G>,
    eligibility: EligibilityResolver<G>,
    committer: EnrollmentCommitter<G>,
    queries: Arc<EnrollmentQueryService<G>>,
}

impl<G> EnrollmentService<G>
where
    G: EnrollmentGateway + 'static,
{
    pub fn new(gateway: Arc<G>, config: &EnrollmentConfig) -> Self {
        let queries = Arc::new(EnrollmentQueryService::new(gateway.clone(), config));
        Self {
            directory: SlotDirectory::new(gateway.clone()),
            eligibility: EligibilityResolver::new(gateway.clone()),
            committer: EnrollmentCommitter::new(gateway, queries.clone()),
            queries,
        }
    }

    pub fn directory(&self) -> &SlotDirectory<G> {
        &self.directory
    }

    pub fn eligibility(&self) -> &EligibilityResolver<G> {
        &self.eligibility
    }

    pub fn committer(&self) -> &EnrollmentCommitter<G> {
        &self.committer
    }

    pub fn queries(&self) -> &EnrollmentQueryService<G> {
        &self.queries
    }

    /// Starts a fresh interactive enrollment session.
    pub fn flow(self: &Arc<Self>) -> FlowController<G> {
        FlowController::new(self.clone())
    }
}
