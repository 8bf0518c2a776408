use crate::infra::{connect, BackendAuth};
use matricula::config::AppConfig;
use matricula::error::AppError;
use matricula::telemetry::{self, LogSink};
use matricula::workflows::enrollment::{
    AcademicSection, CandidateSlot, CommitOutcome, Enrollment, EnrollmentError, EnrollmentGateway,
    EnrollmentPage, EnrollmentQuery, EnrollmentService, FlowError, NewEnrollment, SlotFilter,
    SlotFilterOptions, StudentId, StudentOption,
};
use serde::Serialize;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub(crate) enum OutputFormat {
    #[default]
    Table,
    Json,
}

/// One-shot operations against the configured backend.
#[derive(Debug, Clone)]
pub(crate) enum ConsoleCommand {
    Slots(SlotFilter),
    Filters,
    Students,
    Candidates(StudentId),
    Enroll(NewEnrollment),
    Enrollments(EnrollmentQuery),
}

pub(crate) async fn run(
    command: ConsoleCommand,
    auth: BackendAuth,
    format: OutputFormat,
) -> Result<(), AppError> {
    let config = AppConfig::load()?;
    telemetry::init_with_sink(&config.telemetry, LogSink::Stderr)?;

    let gateway = Arc::new(connect(&config, &auth).await?);
    let service = Arc::new(EnrollmentService::new(gateway, &config.enrollment));

    match command {
        ConsoleCommand::Slots(filter) => {
            let slots = service.directory().list_available_slots(filter).await?;
            emit(format, slots.as_slice(), render_slots)
        }
        ConsoleCommand::Filters => {
            let options = service.directory().filter_options().await?;
            emit(format, &options, render_filter_options)
        }
        ConsoleCommand::Students => {
            let students = service.eligibility().list_eligible_students().await?;
            emit(format, students.as_slice(), render_students)
        }
        ConsoleCommand::Candidates(student_id) => {
            let slots = service
                .eligibility()
                .list_candidate_slots(student_id)
                .await?;
            emit(format, slots.as_slice(), render_candidates)
        }
        ConsoleCommand::Enroll(request) => {
            let enrollment = enroll_through_flow(&service, request).await?;
            emit(format, &enrollment, render_enrollment)
        }
        ConsoleCommand::Enrollments(query) => {
            let page = service.queries().search(query).await?;
            emit(format, &page, render_enrollment_page)
        }
    }
}

/// Runs one enrollment through the interactive flow so full sections are refused before the
/// commit reaches the backend.
pub(crate) async fn enroll_through_flow<G>(
    service: &Arc<EnrollmentService<G>>,
    request: NewEnrollment,
) -> Result<Enrollment, AppError>
where
    G: EnrollmentGateway + 'static,
{
    let eligible = service
        .eligibility()
        .list_eligible_students()
        .await?
        .into_iter()
        .find(|student| student.id == request.student_id);
    let is_eligible = eligible.is_some();
    let label = eligible
        .map(|student| student.label)
        .unwrap_or_else(|| format!("student {}", request.student_id));

    let mut flow = service.flow();
    flow_step(
        flow.choose_student(StudentOption {
            id: request.student_id,
            label,
        })
        .await,
    )?;
    if let Some(error) = flow.flow().notice().and_then(|notice| notice.error.clone()) {
        return Err(error.into());
    }
    // An enrolled student is offered nothing; say so instead of "section not offered".
    if flow.flow().slots().is_empty() && !is_eligible {
        return Err(EnrollmentError::DuplicateEnrollment {
            student_id: request.student_id,
        }
        .into());
    }

    flow_step(flow.select_slot(request.section_id))?;
    match flow_step(flow.confirm().await)? {
        CommitOutcome::Committed(enrollment) => Ok(enrollment),
        CommitOutcome::Failed(error) => Err(error.into()),
    }
}

/// Flow refusals surface as validation failures on the command line.
pub(crate) fn flow_step<T>(result: Result<T, FlowError>) -> Result<T, AppError> {
    result.map_err(|err| EnrollmentError::Validation(err.to_string()).into())
}

fn emit<T, F>(format: OutputFormat, value: &T, render: F) -> Result<(), AppError>
where
    T: Serialize + ?Sized,
    F: Fn(&T),
{
    match format {
        OutputFormat::Table => render(value),
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).map_err(std::io::Error::from)?;
            println!("{json}");
        }
    }
    Ok(())
}

pub(crate) fn render_slots(slots: &[AcademicSection]) {
    if slots.is_empty() {
        println!("No sections match the filters.");
        return;
    }

    println!(
        "{:>6}  {:<24} {:<10} {:>8} {:>8} {:>10}",
        "ID", "Section", "Period", "Capacity", "Occupied", "Available"
    );
    for slot in slots {
        println!(
            "{:>6}  {:<24} {:<10} {:>8} {:>8} {:>10}",
            slot.id.to_string(),
            slot.label(),
            slot.academic_year.to_string(),
            slot.capacity(),
            slot.occupied(),
            slot.available()
        );
    }
}

pub(crate) fn render_filter_options(options: &SlotFilterOptions) {
    for (title, entries) in [
        ("Grades", &options.grades),
        ("Sections", &options.sections),
        ("Academic years", &options.academic_years),
    ] {
        println!("{title}");
        for entry in entries {
            println!("  {:>4}  {}", entry.key, entry.value);
        }
    }
}

pub(crate) fn render_students(students: &[StudentOption]) {
    if students.is_empty() {
        println!("Every student already has an enrollment for this period.");
        return;
    }
    for student in students {
        println!("{:>6}  {}", student.id.to_string(), student.label);
    }
}

pub(crate) fn render_candidates(slots: &[CandidateSlot]) {
    if slots.is_empty() {
        println!("No sections are offered to this student.");
        return;
    }
    for slot in slots {
        let marker = if slot.is_full { "FULL" } else { "" };
        println!(
            "{:>6}  {:<24} {:>3} available  {}",
            slot.id().to_string(),
            slot.section.label(),
            slot.section.available(),
            marker
        );
    }
}

pub(crate) fn render_enrollment(enrollment: &Enrollment) {
    println!(
        "Enrollment #{}: {} in {} {} ({}), status {}, recorded {}",
        enrollment.id,
        enrollment.student_name,
        enrollment.grade_name,
        enrollment.section_name,
        enrollment.period,
        enrollment.status,
        enrollment.created_at.format("%Y-%m-%d %H:%M")
    );
}

pub(crate) fn render_enrollment_page(page: &EnrollmentPage) {
    println!(
        "Enrollments for {}: {} total (page {}, {} per page)",
        page.period,
        page.total,
        page.page + 1,
        page.page_size
    );
    for enrollment in &page.items {
        println!(
            "  #{:<5} {:<28} {:<16} {:<4} {}",
            enrollment.id.to_string(),
            enrollment.student_name,
            enrollment.grade_name,
            enrollment.section_name,
            enrollment.status
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infra::{demo_store, DEMO_FULL, DEMO_LAST_SEAT, DEMO_OPEN};
    use matricula::config::EnrollmentConfig;
    use matricula::workflows::enrollment::{AcademicPeriod, InMemoryEnrollmentStore};

    fn service() -> (Arc<EnrollmentService<InMemoryEnrollmentStore>>, InMemoryEnrollmentStore) {
        let store = demo_store(&AcademicPeriod::from("2025-2026")).expect("seeded");
        let config = EnrollmentConfig::from_list("2025-2026").expect("periods");
        let service = Arc::new(EnrollmentService::new(Arc::new(store.clone()), &config));
        (service, store)
    }

    #[tokio::test]
    async fn enroll_through_flow_commits_an_open_seat() {
        let (service, store) = service();

        let enrollment = enroll_through_flow(
            &service,
            NewEnrollment {
                student_id: StudentId(1),
                section_id: DEMO_LAST_SEAT,
            },
        )
        .await
        .expect("enrolled");

        assert_eq!(enrollment.student_name, "Elena Mora");
        assert!(store.section(DEMO_LAST_SEAT).expect("section").is_full());
    }

    #[tokio::test]
    async fn enroll_through_flow_refuses_a_full_section_locally() {
        let (service, store) = service();

        let error = enroll_through_flow(
            &service,
            NewEnrollment {
                student_id: StudentId(1),
                section_id: DEMO_FULL,
            },
        )
        .await
        .expect_err("full section");

        assert!(matches!(
            error,
            AppError::Enrollment(EnrollmentError::Validation(_))
        ));
        assert!(store.enrollments(None).await.expect("listing").is_empty());
    }

    #[tokio::test]
    async fn enroll_through_flow_reports_an_enrolled_student_as_a_duplicate() {
        let (service, store) = service();
        enroll_through_flow(
            &service,
            NewEnrollment {
                student_id: StudentId(1),
                section_id: DEMO_LAST_SEAT,
            },
        )
        .await
        .expect("first enrollment");

        let error = enroll_through_flow(
            &service,
            NewEnrollment {
                student_id: StudentId(1),
                section_id: DEMO_OPEN,
            },
        )
        .await
        .expect_err("already enrolled");

        assert!(matches!(
            error,
            AppError::Enrollment(EnrollmentError::DuplicateEnrollment {
                student_id: StudentId(1)
            })
        ));
        assert_eq!(store.enrollments(None).await.expect("listing").len(), 1);
    }
}
