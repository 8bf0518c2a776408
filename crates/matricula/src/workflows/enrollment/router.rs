use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Deserialize;
use serde_json::json;

use super::domain::{AcademicPeriod, NewEnrollment, SlotFilter, StudentId};
use super::error::EnrollmentError;
use super::gateway::EnrollmentGateway;
use super::queries::{EnrollmentQuery, DEFAULT_PAGE_SIZE};
use super::service::EnrollmentService;

/// Router builder exposing the console's slot, eligibility and enrollment endpoints.
pub fn enrollment_router<G>(service: Arc<EnrollmentService<G>>) -> Router
where
    G: EnrollmentGateway + 'static,
{
    Router::new()
        .route("/api/v1/slots", get(slots_handler::<G>))
        .route("/api/v1/slots/filters", get(filter_options_handler::<G>))
        .route("/api/v1/students/eligible", get(eligible_students_handler::<G>))
        .route(
            "/api/v1/students/:student_id/slots",
            get(candidate_slots_handler::<G>),
        )
        .route(
            "/api/v1/enrollments",
            get(enrollments_handler::<G>).post(create_enrollment_handler::<G>),
        )
        .with_state(service)
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct EnrollmentListParams {
    pub periodo: Option<String>,
    pub search: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl EnrollmentListParams {
    fn into_query(self) -> EnrollmentQuery {
        EnrollmentQuery {
            period: self.periodo.as_deref().and_then(AcademicPeriod::parse),
            search: self.search.filter(|search| !search.trim().is_empty()),
            page: self.page.unwrap_or(0),
            page_size: self.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
        }
    }
}

pub(crate) async fn slots_handler<G>(
    State(service): State<Arc<EnrollmentService<G>>>,
    Query(filter): Query<SlotFilter>,
) -> Response
where
    G: EnrollmentGateway + 'static,
{
    match service.directory().list_available_slots(filter).await {
        Ok(slots) => (StatusCode::OK, axum::Json(slots)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn filter_options_handler<G>(
    State(service): State<Arc<EnrollmentService<G>>>,
) -> Response
where
    G: EnrollmentGateway + 'static,
{
    match service.directory().filter_options().await {
        Ok(options) => (StatusCode::OK, axum::Json(options)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn eligible_students_handler<G>(
    State(service): State<Arc<EnrollmentService<G>>>,
) -> Response
where
    G: EnrollmentGateway + 'static,
{
    match service.eligibility().list_eligible_students().await {
        Ok(students) => (StatusCode::OK, axum::Json(students)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn candidate_slots_handler<G>(
    State(service): State<Arc<EnrollmentService<G>>>,
    Path(student_id): Path<String>,
) -> Response
where
    G: EnrollmentGateway + 'static,
{
    let Ok(student_id) = student_id.trim().parse::<u64>() else {
        return error_response(EnrollmentError::Validation(format!(
            "'{student_id}' is not a student id"
        )));
    };

    match service
        .eligibility()
        .list_candidate_slots(StudentId(student_id))
        .await
    {
        Ok(slots) => (StatusCode::OK, axum::Json(slots)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_enrollment_handler<G>(
    State(service): State<Arc<EnrollmentService<G>>>,
    axum::Json(request): axum::Json<NewEnrollment>,
) -> Response
where
    G: EnrollmentGateway + 'static,
{
    match service
        .committer()
        .commit(request.student_id, request.section_id)
        .await
    {
        Ok(enrollment) => (StatusCode::CREATED, axum::Json(enrollment)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn enrollments_handler<G>(
    State(service): State<Arc<EnrollmentService<G>>>,
    Query(params): Query<EnrollmentListParams>,
) -> Response
where
    G: EnrollmentGateway + 'static,
{
    match service.queries().search(params.into_query()).await {
        Ok(page) => (StatusCode::OK, axum::Json(page)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) fn status_for(error: &EnrollmentError) -> StatusCode {
    match error {
        EnrollmentError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
        EnrollmentError::NotFound(_) => StatusCode::NOT_FOUND,
        EnrollmentError::CapacityExhausted { .. }
        | EnrollmentError::DuplicateEnrollment { .. }
        | EnrollmentError::Conflict(_) => StatusCode::CONFLICT,
        EnrollmentError::Unauthorized => StatusCode::UNAUTHORIZED,
        EnrollmentError::Transport(_)
        | EnrollmentError::Backend { .. }
        | EnrollmentError::Decode(_) => StatusCode::BAD_GATEWAY,
    }
}

fn error_response(error: EnrollmentError) -> Response {
    let payload = json!({
        "code": error.code(),
        "error": error.user_message(),
    });
    (status_for(&error), axum::Json(payload)).into_response()
}
