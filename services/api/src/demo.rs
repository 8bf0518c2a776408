use crate::console::{
    flow_step, render_candidates, render_enrollment, render_enrollment_page, render_slots,
};
use crate::infra::{demo_store, parse_period, DEMO_FULL, DEMO_LAST_SEAT, DEMO_OPEN};
use clap::Args;
use matricula::config::{EnrollmentConfig, TelemetryConfig};
use matricula::error::AppError;
use matricula::telemetry::{self, LogSink};
use matricula::workflows::enrollment::{
    AcademicPeriod, CommitOutcome, EnrollmentError, EnrollmentQuery, EnrollmentService,
    InMemoryEnrollmentStore, SectionId, SlotFilter, StudentOption,
};
use std::sync::Arc;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Academic period to enroll into (defaults to 2025-2026).
    #[arg(long, value_parser = parse_period)]
    pub(crate) period: Option<AcademicPeriod>,
    /// Log filter for the demo's diagnostics on stderr.
    #[arg(long, default_value = "warn")]
    pub(crate) log_level: String,
}

/// Walks the capacity scenarios against an in-process school.
pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    telemetry::init_with_sink(
        &TelemetryConfig {
            log_level: args.log_level,
        },
        LogSink::Stderr,
    )?;

    let period = args
        .period
        .unwrap_or_else(|| AcademicPeriod::from("2025-2026"));
    let store = demo_store(&period)?;
    let config = EnrollmentConfig {
        periods: vec![period.clone()],
    };
    let service = Arc::new(EnrollmentService::new(Arc::new(store.clone()), &config));

    println!("Enrollment console demo ({period})");
    println!("\nSlot directory");
    let slots = service
        .directory()
        .list_available_slots(SlotFilter::default())
        .await?;
    render_slots(&slots);

    let students = service.eligibility().list_eligible_students().await?;
    let (first, second) = match students.as_slice() {
        [first, second, ..] => (first.clone(), second.clone()),
        _ => {
            return Err(EnrollmentError::NotFound("two eligible demo students".to_string()).into())
        }
    };

    println!("\nA full section is listed but cannot be chosen");
    let mut first_flow = service.flow();
    flow_step(first_flow.choose_student(first.clone()).await)?;
    println!("Sections offered to {}:", first.label);
    render_candidates(first_flow.flow().slots());
    match first_flow.select_slot(DEMO_FULL) {
        Err(refusal) => println!("  Selecting section {DEMO_FULL}: refused ({refusal})"),
        Ok(()) => println!("  Selecting section {DEMO_FULL}: unexpectedly accepted"),
    }

    println!("\nTwo operators race for the last seat of section {DEMO_LAST_SEAT}");
    let mut second_flow = service.flow();
    flow_step(second_flow.choose_student(second.clone()).await)?;
    flow_step(first_flow.select_slot(DEMO_LAST_SEAT))?;
    flow_step(second_flow.select_slot(DEMO_LAST_SEAT))?;

    let (first_outcome, second_outcome) = tokio::join!(first_flow.confirm(), second_flow.confirm());
    report_outcome(&first, flow_step(first_outcome)?);
    report_outcome(&second, flow_step(second_outcome)?);
    report_section(&store, DEMO_LAST_SEAT);

    let (winner, loser, loser_flow) = if first_flow.flow().enrollment().is_some() {
        (&first, &second, &second_flow)
    } else {
        (&second, &first, &first_flow)
    };
    println!(
        "  {} is back at section selection ({:?})",
        loser.label,
        loser_flow.flow().phase()
    );
    println!("\nEnrolling {} a second time in the same period", winner.label);
    match service.committer().commit(winner.id, DEMO_OPEN).await {
        Ok(enrollment) => {
            print!("  Unexpectedly accepted: ");
            render_enrollment(&enrollment);
        }
        Err(err) => println!("  Refused [{}]: {}", err.code(), err.user_message()),
    }
    report_section(&store, DEMO_OPEN);

    println!("\nStudents still eligible");
    for student in service.eligibility().list_eligible_students().await? {
        println!("  {:>4}  {}", student.id.to_string(), student.label);
    }

    println!();
    let page = service.queries().search(EnrollmentQuery::default()).await?;
    render_enrollment_page(&page);
    Ok(())
}

fn report_outcome(student: &StudentOption, outcome: CommitOutcome) {
    match outcome {
        CommitOutcome::Committed(enrollment) => {
            print!("  {}: ", student.label);
            render_enrollment(&enrollment);
        }
        CommitOutcome::Failed(err) => {
            println!(
                "  {}: rejected [{}] {}",
                student.label,
                err.code(),
                err.user_message()
            );
        }
    }
}

fn report_section(store: &InMemoryEnrollmentStore, section_id: SectionId) {
    if let Some(section) = store.section(section_id) {
        println!(
            "  Section {} now holds {}/{} students",
            section.label(),
            section.occupied(),
            section.capacity()
        );
    }
}
