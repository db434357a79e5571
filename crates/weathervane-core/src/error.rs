//! Error types shared by the Weathervane crates.
//!
//! Each layer has its own enum. `AppError` gathers them at the binary edge,
//! where `user_message()` gives the one line shown to the operator while the
//! full chain goes to the log.

use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("provider unreachable: {0}")]
    Network(#[from] NetworkError),

    #[error("result store: {0}")]
    Database(#[from] DatabaseError),

    #[error("config: {0}")]
    Config(#[from] ConfigError),

    #[error("provider setup: {0}")]
    Weather(#[from] WeatherError),

    #[error("data directory: {0}")]
    Io(#[from] std::io::Error),

    /// Rejected submissions, unknown tasks or regions, failed tasks
    #[error("{0}")]
    Service(String),
}

impl AppError {
    pub fn user_message(&self) -> &'static str {
        match self {
            AppError::Network(e) => e.user_message(),
            AppError::Database(e) => e.user_message(),
            AppError::Config(e) => e.user_message(),
            AppError::Weather(e) => e.user_message(),
            AppError::Io(_) => "Could not read or write the data directory.",
            AppError::Service(_) => "The request could not be completed.",
        }
    }
}

/// Why a provider request produced no usable response.
#[derive(Debug, Clone, Error)]
pub enum NetworkError {
    #[error("could not connect: {0}")]
    Connect(String),

    #[error("request timed out")]
    Timeout,

    #[error("HTTP {status} {reason}")]
    Status { status: u16, reason: String },

    #[error("unreadable response body: {0}")]
    Body(String),

    #[error("malformed request: {0}")]
    Request(String),
}

impl NetworkError {
    pub fn from_status(status: StatusCode) -> Self {
        Self::Status {
            status: status.as_u16(),
            reason: status.canonical_reason().unwrap_or_default().to_string(),
        }
    }

    /// Another attempt may succeed: lost connections, timeouts, truncated
    /// bodies, and 5xx/408/429 answers.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connect(_) | Self::Timeout | Self::Body(_) => true,
            Self::Status { status, .. } => matches!(*status, 408 | 429 | 500..=599),
            Self::Request(_) => false,
        }
    }

    pub fn user_message(&self) -> &'static str {
        match self {
            Self::Connect(_) => "The weather provider could not be reached.",
            Self::Timeout => "The weather provider did not answer in time.",
            Self::Status { status, .. } if *status >= 500 => "The weather provider is failing.",
            Self::Status { .. } => "The weather provider refused the request.",
            Self::Body(_) => "The weather provider sent an unreadable answer.",
            Self::Request(_) => "The provider request could not be built.",
        }
    }
}

/// Result store failures.
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Cannot open, busy or locked
    #[error("database unavailable: {0}")]
    Unavailable(String),

    #[error("statement failed: {0}")]
    Query(String),

    #[error("database file is corrupt: {0}")]
    Corrupt(String),
}

impl DatabaseError {
    pub fn user_message(&self) -> &'static str {
        match self {
            DatabaseError::Unavailable(_) => "The result store is unreachable.",
            DatabaseError::Query(_) => "A result store operation failed.",
            DatabaseError::Corrupt(_) => "The result store is damaged.",
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot parse {path}: {reason}")]
    Malformed { path: String, reason: String },

    #[error("validation failed: {0}")]
    Invalid(String),
}

impl ConfigError {
    pub fn user_message(&self) -> &'static str {
        match self {
            ConfigError::Malformed { .. } => "The config file is not valid TOML.",
            ConfigError::Invalid(_) => "The configuration is incomplete or wrong.",
        }
    }
}

/// Provider client construction failures. These surface at startup, never
/// per city.
#[derive(Debug, Error)]
pub enum WeatherError {
    #[error("no API key configured (set API_KEY)")]
    MissingApiKey,

    #[error("bad provider URL {0}")]
    InvalidBaseUrl(String),

    #[error("HTTP client: {0}")]
    ClientSetup(String),
}

impl WeatherError {
    pub fn user_message(&self) -> &'static str {
        match self {
            WeatherError::MissingApiKey => "Weather API key is missing. Set API_KEY.",
            WeatherError::InvalidBaseUrl(_) => "Weather provider URL is invalid.",
            WeatherError::ClientSetup(_) => "Weather client could not be created.",
        }
    }
}

/// Classify a `reqwest` failure.
pub trait ReqwestErrorExt {
    fn into_network_error(self) -> NetworkError;
}

impl ReqwestErrorExt for reqwest::Error {
    fn into_network_error(self) -> NetworkError {
        if let Some(status) = self.status() {
            return NetworkError::from_status(status);
        }
        let detail = self.to_string();
        if self.is_timeout() {
            NetworkError::Timeout
        } else if self.is_builder() {
            NetworkError::Request(detail)
        } else if self.is_body() || self.is_decode() {
            NetworkError::Body(detail)
        } else {
            NetworkError::Connect(detail)
        }
    }
}

/// Classify a `rusqlite` failure.
pub trait RusqliteErrorExt {
    fn into_database_error(self) -> DatabaseError;
}

impl RusqliteErrorExt for rusqlite::Error {
    fn into_database_error(self) -> DatabaseError {
        use rusqlite::ErrorCode;

        let code = match &self {
            rusqlite::Error::SqliteFailure(err, _) => Some(err.code),
            _ => None,
        };
        match code {
            Some(ErrorCode::DatabaseCorrupt | ErrorCode::NotADatabase) => {
                DatabaseError::Corrupt(self.to_string())
            }
            Some(ErrorCode::CannotOpen | ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked) => {
                DatabaseError::Unavailable(self.to_string())
            }
            _ => DatabaseError::Query(self.to_string()),
        }
    }
}
