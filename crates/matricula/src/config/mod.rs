use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

use reqwest::Url;

use crate::workflows::enrollment::AcademicPeriod;

const DEFAULT_BACKEND_URL: &str = "https://localhost:44349/api/";
const DEFAULT_ACADEMIC_PERIODS: &str = "2025-2026";

/// Distinguishes runtime behavior for different stages of the console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the console.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub backend: BackendConfig,
    pub enrollment: EnrollmentConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let base_url = BackendConfig::parse_base_url(
            &env::var("APP_BACKEND_URL").unwrap_or_else(|_| DEFAULT_BACKEND_URL.to_string()),
        )?;
        let token = env::var("APP_BACKEND_TOKEN")
            .ok()
            .map(|token| token.trim().to_string())
            .filter(|token| !token.is_empty());

        let enrollment = EnrollmentConfig::from_list(
            &env::var("APP_ACADEMIC_PERIODS")
                .unwrap_or_else(|_| DEFAULT_ACADEMIC_PERIODS.to_string()),
        )?;

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            backend: BackendConfig { base_url, token },
            enrollment,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Location of the school REST backend and an optional pre-issued bearer token.
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: Url,
    pub token: Option<String>,
}

impl BackendConfig {
    /// Parses the base URL, appending a trailing slash so relative endpoints join under it.
    pub fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
        let trimmed = raw.trim();
        let normalized = if trimmed.ends_with('/') {
            trimmed.to_string()
        } else {
            format!("{trimmed}/")
        };

        let url = Url::parse(&normalized).map_err(|err| ConfigError::InvalidBackendUrl {
            value: raw.to_string(),
            reason: err.to_string(),
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidBackendUrl {
                value: raw.to_string(),
                reason: format!("unsupported scheme '{}'", url.scheme()),
            });
        }

        Ok(url)
    }
}

/// Academic periods the console knows about; the greatest label is the current one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnrollmentConfig {
    pub periods: Vec<AcademicPeriod>,
}

impl EnrollmentConfig {
    pub fn from_list(raw: &str) -> Result<Self, ConfigError> {
        let mut periods: Vec<AcademicPeriod> = raw
            .split(',')
            .filter_map(AcademicPeriod::parse)
            .collect();
        periods.sort();
        periods.dedup();

        if periods.is_empty() {
            return Err(ConfigError::NoAcademicPeriods);
        }

        Ok(Self { periods })
    }

    pub fn current_period(&self) -> AcademicPeriod {
        self.periods
            .last()
            .cloned()
            .unwrap_or_else(|| AcademicPeriod::from(DEFAULT_ACADEMIC_PERIODS))
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost {
        source: std::net::AddrParseError,
    },
    InvalidBackendUrl {
        value: String,
        reason: String,
    },
    NoAcademicPeriods,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidBackendUrl { value, reason } => {
                write!(f, "APP_BACKEND_URL '{value}' is not a usable http(s) URL: {reason}")
            }
            ConfigError::NoAcademicPeriods => {
                write!(f, "APP_ACADEMIC_PERIODS must list at least one period label")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidBackendUrl { .. }
            | ConfigError::NoAcademicPeriods => None,
        }
    }
}

/// Serialises tests that touch process environment variables.
#[cfg(test)]
pub(crate) fn env_guard() -> &'static std::sync::Mutex<()> {
    static GUARD: std::sync::OnceLock<std::sync::Mutex<()>> = std::sync::OnceLock::new();
    GUARD.get_or_init(|| std::sync::Mutex::new(()))
}
