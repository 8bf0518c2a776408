//! Explicit session object shared by everything that talks to the backend.
//!
//! A session is established from a successful login (or a pre-issued token), torn down on
//! logout or when the backend answers `401`, and expires on its own once `expiresAt` passes.

use std::sync::{Arc, PoisonError, RwLock};

use chrono::{NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::timestamp::deserialize_optional_timestamp;

/// Credentials posted to the backend login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Payload returned by the backend after a successful login.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    #[serde(default, deserialize_with = "deserialize_optional_timestamp")]
    pub expires_at: Option<NaiveDateTime>,
    pub role: String,
    pub user_id: String,
    pub username: String,
}

/// The authenticated console user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub user_id: String,
    pub username: String,
    pub role: String,
}

#[derive(Debug, Clone)]
struct Session {
    token: String,
    user: Option<AuthUser>,
    expires_at: Option<NaiveDateTime>,
}

impl Session {
    fn expired_at(&self, now: NaiveDateTime) -> bool {
        self.expires_at.is_some_and(|expiry| now >= expiry)
    }
}

/// Cloneable handle to the single session of one console process.
#[derive(Debug, Clone, Default)]
pub struct SessionHandle {
    inner: Arc<RwLock<Option<Session>>>,
}

impl SessionHandle {
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Seeds the session with a token issued out of band (no user details, no expiry).
    pub fn with_token(token: impl Into<String>) -> Self {
        let handle = Self::default();
        *handle.write() = Some(Session {
            token: token.into(),
            user: None,
            expires_at: None,
        });
        handle
    }

    pub fn establish(&self, response: LoginResponse) -> AuthUser {
        let user = AuthUser {
            user_id: response.user_id,
            username: response.username,
            role: response.role,
        };
        info!(username = %user.username, role = %user.role, "session established");
        *self.write() = Some(Session {
            token: response.token,
            user: Some(user.clone()),
            expires_at: response.expires_at,
        });
        user
    }

    /// Drops the session. Returns whether one was active.
    pub fn invalidate(&self) -> bool {
        let previous = self.write().take();
        if previous.is_some() {
            info!("session invalidated");
        }
        previous.is_some()
    }

    pub fn bearer_token(&self) -> Option<String> {
        self.bearer_token_at(Utc::now().naive_utc())
    }

    /// Returns the token while the session is unexpired; an expired session is torn down.
    pub fn bearer_token_at(&self, now: NaiveDateTime) -> Option<String> {
        {
            let guard = self.read();
            match guard.as_ref() {
                None => return None,
                Some(session) if !session.expired_at(now) => return Some(session.token.clone()),
                Some(_) => {}
            }
        }

        self.clear_expired_at(now)
    }

    /// Re-checks expiry under the write lock, so a session established since the read is kept.
    fn clear_expired_at(&self, now: NaiveDateTime) -> Option<String> {
        let mut guard = self.write();
        match guard.as_ref() {
            Some(session) if !session.expired_at(now) => Some(session.token.clone()),
            Some(_) => {
                debug!("session expired; clearing token");
                guard.take();
                info!("session invalidated");
                None
            }
            None => None,
        }
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.read().as_ref().and_then(|session| session.user.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.bearer_token().is_some()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, Option<Session>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, Option<Session>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }
}
