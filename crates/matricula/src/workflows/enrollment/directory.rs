use std::sync::Arc;

use tracing::{debug, error};

use super::domain::{AcademicSection, SlotFilter, SlotFilterOptions};
use super::error::EnrollmentError;
use super::gateway::EnrollmentGateway;

/// Read-only view of the grade/section offerings and their remaining capacity.
pub struct SlotDirectory<G> {
    gateway: Arc<G>,
}

impl<G> SlotDirectory<G>
where
    G: EnrollmentGateway + 'static,
{
    pub fn new(gateway: Arc<G>) -> Self {
        Self { gateway }
    }

    /// Lists offerings matching the filter. No match is an empty list; failures are reported
    /// once, without retrying.
    pub async fn list_available_slots(
        &self,
        filter: SlotFilter,
    ) -> Result<Vec<AcademicSection>, EnrollmentError> {
        let filter = filter.normalized();
        match self.gateway.available_slots(&filter).await {
            Ok(slots) => {
                debug!(?filter, count = slots.len(), "listed available slots");
                Ok(slots)
            }
            Err(err) => {
                error!(?filter, code = err.code(), error = %err, "listing slots failed");
                Err(err)
            }
        }
    }

    /// Loads the grade, section and academic-year choices of the filter bar together.
    pub async fn filter_options(&self) -> Result<SlotFilterOptions, EnrollmentError> {
        let (grades, sections, academic_years) = tokio::try_join!(
            self.gateway.grade_options(),
            self.gateway.section_options(),
            self.gateway.academic_year_options(),
        )?;

        Ok(SlotFilterOptions {
            grades,
            sections,
            academic_years,
        })
    }
}
