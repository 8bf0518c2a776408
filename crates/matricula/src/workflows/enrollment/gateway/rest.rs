use reqwest::{Client, Response, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::EnrollmentGateway;
use crate::config::BackendConfig;
use crate::session::{AuthUser, LoginRequest, LoginResponse, SessionHandle};
use crate::workflows::enrollment::domain::{
    AcademicPeriod, AcademicSection, Enrollment, NewEnrollment, SelectorOption, SlotFilter,
    StudentId, StudentOption,
};
use crate::workflows::enrollment::error::EnrollmentError;

const SLOTS_AVAILABLE: &str = "GradoParalelo/Disponibles";
const SLOTS_FOR_STUDENT: &str = "GradoParalelo/GetCuposDisponibles";
const STUDENT_SELECTOR: &str = "Estudiante/SelectorEstudiante";
const ENROLLMENT_CREATE: &str = "Matricula/Crear";
const ENROLLMENT_LIST: &str = "Matricula/GetAll";
const GRADE_SELECTOR: &str = "Grado/SelectorGrados";
const SECTION_SELECTOR: &str = "Paralelo/SelectorParalelos";
const YEAR_SELECTOR: &str = "AnioLectivo/SelectorAnioLectivo";
const LOGIN: &str = "Auth/login";

/// Error body convention: `{ "code": "CapacityExhausted", "message": "..." }`.
#[derive(Debug, Default, Deserialize)]
struct ErrorPayload {
    #[serde(default)]
    code: Option<String>,
    #[serde(default, alias = "error", alias = "title", alias = "mensaje")]
    message: Option<String>,
}

/// Gateway backed by the school's REST API.
#[derive(Debug, Clone)]
pub struct RestGateway {
    client: Client,
    base_url: Url,
    session: SessionHandle,
}

impl RestGateway {
    pub fn new(config: &BackendConfig, session: SessionHandle) -> Result<Self, EnrollmentError> {
        let client = Client::builder()
            .build()
            .map_err(|err| EnrollmentError::Transport(err.to_string()))?;
        Ok(Self::with_client(client, config.base_url.clone(), session))
    }

    pub fn with_client(client: Client, base_url: Url, session: SessionHandle) -> Self {
        Self {
            client,
            base_url,
            session,
        }
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Posts credentials and establishes the shared session on success.
    pub async fn login(&self, request: &LoginRequest) -> Result<AuthUser, EnrollmentError> {
        let url = self.endpoint(LOGIN)?;
        let response = self
            .client
            .post(url)
            .json(request)
            .send()
            .await
            .map_err(transport_error)?;
        let payload: LoginResponse = self.read_json(response, None).await?;
        Ok(self.session.establish(payload))
    }

    pub fn logout(&self) {
        self.session.invalidate();
    }

    fn endpoint(&self, path: &str) -> Result<Url, EnrollmentError> {
        self.base_url
            .join(path)
            .map_err(|err| EnrollmentError::Validation(format!("bad endpoint '{path}': {err}")))
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match self.session.bearer_token() {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, EnrollmentError> {
        let url = self.endpoint(path)?;
        debug!(%url, ?query, "GET");
        let response = self
            .authorize(self.client.get(url))
            .query(query)
            .send()
            .await
            .map_err(transport_error)?;
        self.read_json(response, None).await
    }

    async fn post_json<B, T>(
        &self,
        path: &str,
        body: &B,
        request: Option<&NewEnrollment>,
    ) -> Result<T, EnrollmentError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.endpoint(path)?;
        debug!(%url, "POST");
        let response = self
            .authorize(self.client.post(url))
            .json(body)
            .send()
            .await
            .map_err(transport_error)?;
        self.read_json(response, request).await
    }

    async fn read_json<T: DeserializeOwned>(
        &self,
        response: Response,
        request: Option<&NewEnrollment>,
    ) -> Result<T, EnrollmentError> {
        let status = response.status();
        if status.is_success() {
            let body = response.bytes().await.map_err(transport_error)?;
            return serde_json::from_slice(&body)
                .map_err(|err| EnrollmentError::Decode(err.to_string()));
        }

        if status == StatusCode::UNAUTHORIZED {
            warn!("backend rejected the session; logging out");
            self.session.invalidate();
            return Err(EnrollmentError::Unauthorized);
        }

        let text = response.text().await.map_err(transport_error)?;
        let payload = serde_json::from_str::<ErrorPayload>(&text).unwrap_or_else(|_| ErrorPayload {
            code: None,
            message: (!text.trim().is_empty()).then(|| text.trim().to_string()),
        });
        Err(classify_failure(status, payload, request))
    }
}

fn transport_error(err: reqwest::Error) -> EnrollmentError {
    if err.is_decode() {
        EnrollmentError::Decode(err.to_string())
    } else {
        EnrollmentError::Transport(err.to_string())
    }
}

/// Maps a non-success response onto the taxonomy. Recognised codes win over the status.
fn classify_failure(
    status: StatusCode,
    payload: ErrorPayload,
    request: Option<&NewEnrollment>,
) -> EnrollmentError {
    let message = payload
        .message
        .unwrap_or_else(|| status.canonical_reason().unwrap_or("error").to_string());

    match (payload.code.as_deref(), request) {
        (Some("CapacityExhausted"), Some(request)) => {
            return EnrollmentError::CapacityExhausted {
                section_id: request.section_id,
            }
        }
        (Some("DuplicateEnrollment"), Some(request)) => {
            return EnrollmentError::DuplicateEnrollment {
                student_id: request.student_id,
            }
        }
        (Some("NotFound"), _) => return EnrollmentError::NotFound(message),
        (Some("ValidationFailed"), _) => return EnrollmentError::Validation(message),
        _ => {}
    }

    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            EnrollmentError::Validation(message)
        }
        StatusCode::NOT_FOUND => EnrollmentError::NotFound(message),
        StatusCode::CONFLICT => EnrollmentError::Conflict(message),
        StatusCode::UNAUTHORIZED => EnrollmentError::Unauthorized,
        other => EnrollmentError::Backend {
            status: other.as_u16(),
            message,
        },
    }
}

impl EnrollmentGateway for RestGateway {
    async fn available_slots(
        &self,
        filter: &SlotFilter,
    ) -> Result<Vec<AcademicSection>, EnrollmentError> {
        self.get_json(SLOTS_AVAILABLE, &filter.query_pairs()).await
    }

    async fn candidate_slots(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<AcademicSection>, EnrollmentError> {
        let query = [("idEstudiante", student_id.to_string())];
        let slots: Option<Vec<AcademicSection>> = self.get_json(SLOTS_FOR_STUDENT, &query).await?;
        Ok(slots.unwrap_or_default())
    }

    async fn eligible_students(&self) -> Result<Vec<StudentOption>, EnrollmentError> {
        self.get_json(STUDENT_SELECTOR, &[]).await
    }

    async fn create_enrollment(
        &self,
        request: NewEnrollment,
    ) -> Result<Enrollment, EnrollmentError> {
        self.post_json(ENROLLMENT_CREATE, &request, Some(&request))
            .await
    }

    async fn enrollments(
        &self,
        period: Option<&AcademicPeriod>,
    ) -> Result<Vec<Enrollment>, EnrollmentError> {
        let query: Vec<(&str, String)> = period
            .map(|period| ("periodo", period.to_string()))
            .into_iter()
            .collect();
        self.get_json(ENROLLMENT_LIST, &query).await
    }

    async fn grade_options(&self) -> Result<Vec<SelectorOption>, EnrollmentError> {
        self.get_json(GRADE_SELECTOR, &[]).await
    }

    async fn section_options(&self) -> Result<Vec<SelectorOption>, EnrollmentError> {
        self.get_json(SECTION_SELECTOR, &[]).await
    }

    async fn academic_year_options(&self) -> Result<Vec<SelectorOption>, EnrollmentError> {
        self.get_json(YEAR_SELECTOR, &[]).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workflows::enrollment::domain::SectionId;

    fn request() -> NewEnrollment {
        NewEnrollment {
            student_id: StudentId(7),
            section_id: SectionId(12),
        }
    }

    fn payload(code: Option<&str>, message: Option<&str>) -> ErrorPayload {
        ErrorPayload {
            code: code.map(str::to_string),
            message: message.map(str::to_string),
        }
    }

    #[test]
    fn capacity_and_duplicate_codes_carry_request_ids() {
        let capacity = classify_failure(
            StatusCode::CONFLICT,
            payload(Some("CapacityExhausted"), Some("sin cupos")),
            Some(&request()),
        );
        assert_eq!(
            capacity,
            EnrollmentError::CapacityExhausted {
                section_id: SectionId(12)
            }
        );

        let duplicate = classify_failure(
            StatusCode::CONFLICT,
            payload(Some("DuplicateEnrollment"), None),
            Some(&request()),
        );
        assert_eq!(
            duplicate,
            EnrollmentError::DuplicateEnrollment {
                student_id: StudentId(7)
            }
        );
    }

    #[test]
    fn uncoded_conflict_is_not_guessed() {
        let error = classify_failure(
            StatusCode::CONFLICT,
            payload(None, Some("concurrency token mismatch")),
            Some(&request()),
        );
        assert_eq!(
            error,
            EnrollmentError::Conflict("concurrency token mismatch".to_string())
        );
    }

    #[test]
    fn status_fallbacks() {
        assert!(matches!(
            classify_failure(StatusCode::BAD_REQUEST, payload(None, None), None),
            EnrollmentError::Validation(_)
        ));
        assert!(matches!(
            classify_failure(StatusCode::NOT_FOUND, payload(None, None), None),
            EnrollmentError::NotFound(_)
        ));
        assert!(matches!(
            classify_failure(
                StatusCode::SERVICE_UNAVAILABLE,
                payload(None, Some("down")),
                None
            ),
            EnrollmentError::Backend { status: 503, .. }
        ));
    }

    #[test]
    fn coded_not_found_wins_over_status() {
        let error = classify_failure(
            StatusCode::BAD_REQUEST,
            payload(Some("NotFound"), Some("estudiante 7")),
            Some(&request()),
        );
        assert_eq!(error, EnrollmentError::NotFound("estudiante 7".to_string()));
    }
}
