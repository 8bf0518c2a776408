use std::collections::{BTreeSet, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::Serialize;
use tracing::{debug, error};

use super::domain::{AcademicPeriod, Enrollment};
use super::error::EnrollmentError;
use super::gateway::EnrollmentGateway;
use crate::config::EnrollmentConfig;

pub const DEFAULT_PAGE_SIZE: usize = 10;
const MAX_PAGE_SIZE: usize = 100;

/// Audit listing request: period, free-text search and a zero-based page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentQuery {
    pub period: Option<AcademicPeriod>,
    pub search: Option<String>,
    pub page: usize,
    pub page_size: usize,
}

impl Default for EnrollmentQuery {
    fn default() -> Self {
        Self {
            period: None,
            search: None,
            page: 0,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EnrollmentPage {
    pub period: AcademicPeriod,
    pub items: Vec<Enrollment>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
}

/// Read side of enrollments, for display and audit only.
///
/// Results are cached per period until a commit invalidates them or a caller refreshes.
/// A fetch only fills the cache if no invalidation happened while it was in flight.
pub struct EnrollmentQueryService<G> {
    gateway: Arc<G>,
    configured_periods: Vec<AcademicPeriod>,
    current_period: AcademicPeriod,
    cache: Mutex<HashMap<AcademicPeriod, Vec<Enrollment>>>,
    epoch: AtomicU64,
}

impl<G> EnrollmentQueryService<G>
where
    G: EnrollmentGateway + 'static,
{
    pub fn new(gateway: Arc<G>, config: &EnrollmentConfig) -> Self {
        Self {
            gateway,
            configured_periods: config.periods.clone(),
            current_period: config.current_period(),
            cache: Mutex::new(HashMap::new()),
            epoch: AtomicU64::new(0),
        }
    }

    pub fn current_period(&self) -> &AcademicPeriod {
        &self.current_period
    }

    /// Enrollments of `period`, or of the most recent configured period when omitted.
    pub async fn list_enrollments(
        &self,
        period: Option<AcademicPeriod>,
    ) -> Result<Vec<Enrollment>, EnrollmentError> {
        let period = period.unwrap_or_else(|| self.current_period.clone());
        let cached = self.cache().get(&period).cloned();
        if let Some(cached) = cached {
            debug!(%period, count = cached.len(), "serving enrollments from cache");
            return Ok(cached);
        }

        self.refresh(period).await
    }

    /// Fetches `period` again regardless of the cache.
    pub async fn refresh(
        &self,
        period: AcademicPeriod,
    ) -> Result<Vec<Enrollment>, EnrollmentError> {
        let started_at = self.epoch.load(Ordering::Acquire);
        let enrollments = self
            .gateway
            .enrollments(Some(&period))
            .await
            .map_err(|err| {
                error!(%period, code = err.code(), error = %err, "loading enrollments failed");
                err
            })?;

        debug!(%period, count = enrollments.len(), "loaded enrollments");
        let mut cache = self.cache();
        if self.epoch.load(Ordering::Acquire) == started_at {
            cache.insert(period, enrollments.clone());
        } else {
            debug!(%period, "enrollments changed during the fetch; not caching");
        }
        Ok(enrollments)
    }

    pub async fn search(&self, query: EnrollmentQuery) -> Result<EnrollmentPage, EnrollmentError> {
        let period = query
            .period
            .unwrap_or_else(|| self.current_period.clone());
        let needle = query.search.unwrap_or_default();
        let page_size = query.page_size.clamp(1, MAX_PAGE_SIZE);

        let matching: Vec<Enrollment> = self
            .list_enrollments(Some(period.clone()))
            .await?
            .into_iter()
            .filter(|enrollment| enrollment.matches(&needle))
            .collect();

        let total = matching.len();
        let items = matching
            .into_iter()
            .skip(query.page.saturating_mul(page_size))
            .take(page_size)
            .collect();

        Ok(EnrollmentPage {
            period,
            items,
            total,
            page: query.page,
            page_size,
        })
    }

    /// Drops every cached period so the next read goes to the backend.
    pub fn invalidate(&self) {
        let mut cache = self.cache();
        self.epoch.fetch_add(1, Ordering::AcqRel);
        if !cache.is_empty() {
            debug!(periods = cache.len(), "invalidating enrollment cache");
        }
        cache.clear();
    }

    /// Configured periods plus any seen in loaded data, newest first.
    pub fn known_periods(&self) -> Vec<AcademicPeriod> {
        let cache = self.cache();
        let mut periods: BTreeSet<AcademicPeriod> =
            self.configured_periods.iter().cloned().collect();
        for (period, enrollments) in cache.iter() {
            periods.insert(period.clone());
            periods.extend(enrollments.iter().map(|enrollment| enrollment.period.clone()));
        }
        periods.into_iter().rev().collect()
    }

    fn cache(&self) -> MutexGuard<'_, HashMap<AcademicPeriod, Vec<Enrollment>>> {
        self.cache.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
