use matricula::config::AppConfig;
use matricula::error::AppError;
use matricula::session::{LoginRequest, SessionHandle};
use matricula::workflows::enrollment::{
    AcademicPeriod, EnrollmentError, InMemoryEnrollmentStore, RestGateway, SectionId, SectionSeed,
    StudentId, StudentSeed,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tracing::info;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

/// Credentials supplied on the command line. They win over `APP_BACKEND_TOKEN`.
#[derive(Debug, Clone, Default)]
pub(crate) struct BackendAuth {
    pub(crate) token: Option<String>,
    pub(crate) username: Option<String>,
    pub(crate) password: Option<String>,
}

impl BackendAuth {
    fn session(&self, config: &AppConfig) -> SessionHandle {
        match self.token.as_ref().or(config.backend.token.as_ref()) {
            Some(token) => SessionHandle::with_token(token.clone()),
            None => SessionHandle::anonymous(),
        }
    }

    fn credentials(&self) -> Result<Option<LoginRequest>, EnrollmentError> {
        match (&self.username, &self.password) {
            (Some(username), Some(password)) => Ok(Some(LoginRequest {
                username: username.clone(),
                password: password.clone(),
            })),
            (None, None) => Ok(None),
            _ => Err(EnrollmentError::Validation(
                "--username and --password must be given together".to_string(),
            )),
        }
    }
}

/// Builds the REST gateway, logging in first when credentials were supplied.
pub(crate) async fn connect(
    config: &AppConfig,
    auth: &BackendAuth,
) -> Result<RestGateway, AppError> {
    let credentials = auth.credentials()?;
    let gateway = RestGateway::new(&config.backend, auth.session(config))?;

    if let Some(credentials) = credentials {
        let user = gateway.login(&credentials).await?;
        info!(username = %user.username, role = %user.role, "logged in to enrollment backend");
    }

    info!(
        backend = %config.backend.base_url,
        authenticated = gateway.session().is_authenticated(),
        "enrollment backend configured"
    );
    Ok(gateway)
}

pub(crate) fn parse_period(raw: &str) -> Result<AcademicPeriod, String> {
    AcademicPeriod::parse(raw).ok_or_else(|| format!("'{raw}' is not an academic period"))
}

pub(crate) const DEMO_LAST_SEAT: SectionId = SectionId(102);
pub(crate) const DEMO_FULL: SectionId = SectionId(101);
pub(crate) const DEMO_OPEN: SectionId = SectionId(103);

/// Demo school: one grade with a full section and a section with one seat left, plus a
/// second grade with room.
pub(crate) fn demo_store(
    period: &AcademicPeriod,
) -> Result<InMemoryEnrollmentStore, EnrollmentError> {
    let store = InMemoryEnrollmentStore::new(period.clone());
    store.add_grade(4, "4to de Básica");
    store.add_grade(5, "5to de Básica");
    store.add_paralelo(1, "A");
    store.add_paralelo(2, "B");
    store.add_academic_year(1, period.clone());

    for (id, grade_id, paralelo_id, capacity, occupied) in [
        (DEMO_FULL, 4, 1, 30, 30),
        (DEMO_LAST_SEAT, 4, 2, 30, 29),
        (DEMO_OPEN, 5, 1, 28, 12),
    ] {
        store.add_section(SectionSeed {
            id,
            grade_id,
            paralelo_id,
            academic_year_id: 1,
            capacity,
            occupied,
        })?;
    }

    for (id, name, grade_id) in [
        (1, "Elena Mora", 4),
        (2, "Esteban Vera", 4),
        (3, "Lucía Andrade", 5),
    ] {
        store.add_student(StudentSeed {
            id: StudentId(id),
            name: name.to_string(),
            grade_id: Some(grade_id),
        });
    }

    Ok(store)
}
