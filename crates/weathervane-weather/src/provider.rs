//! Weather provider client.
//!
//! One call to [`WeatherSource::fetch`] performs exactly one HTTP request and
//! translates the response into a [`WeatherRecord`]. Permanent outcomes (unknown
//! city, malformed payload) are records. Network failures, usage limits and a
//! rejected access key are returned as [`FetchError`]; the caller decides
//! whether to retry or to give up on the whole task. No retry happens here.

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::Deserialize;
use tracing::instrument;

use weathervane_core::{NetworkError, ProviderConfig, ReqwestErrorExt, WeatherError};

use crate::region::classify_region;
use crate::types::{temperature_in_range, WeatherRecord, WeatherReport};

const USER_AGENT: &str = concat!("weathervane/", env!("CARGO_PKG_VERSION"));

/// `success: false` code for a location the provider does not know
const UNKNOWN_LOCATION_CODE: i64 = 615;
const UNKNOWN_LOCATION_TYPE: &str = "request_failed";
/// Missing or invalid key, inactive account, endpoint not in the plan
const ACCESS_DENIED_CODES: &[i64] = &[101, 102, 105];
/// Monthly quota exhausted, request rate exceeded
const USAGE_LIMIT_CODES: &[i64] = &[104, 429];

/// Failure of a single fetch that did not produce a record.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FetchError {
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// The provider refused the configured access key. No city can succeed.
    #[error("provider rejected the API key (code {code}): {info}")]
    AccessDenied { code: i64, info: String },

    #[error("provider usage limit reached (code {code}): {info}")]
    UsageLimited { code: i64, info: String },
}

impl FetchError {
    /// Whether the executor should try this city again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(e) => e.is_retryable(),
            Self::AccessDenied { .. } => false,
            Self::UsageLimited { .. } => true,
        }
    }

    /// Whether the failure applies to the whole task rather than one city.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::AccessDenied { .. })
    }
}

/// Capability to resolve one city name to its current conditions.
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Perform a single lookup for the canonical city name.
    ///
    /// # Errors
    /// Returns `FetchError` when the provider could not be reached, answered
    /// with a transient status or usage limit, or rejected the access key.
    /// Unknown cities and bad payloads are `Ok` records.
    async fn fetch(&self, city: &str) -> Result<WeatherRecord, FetchError>;
}

/// Provider client for a weatherstack-style `current` endpoint.
#[derive(Debug, Clone)]
pub struct HttpWeatherProvider {
    client: Client,
    base_url: Url,
    api_key: String,
}

impl HttpWeatherProvider {
    /// Build a client from configuration.
    ///
    /// # Errors
    /// Fails with `WeatherError::MissingApiKey` when no key is configured.
    pub fn new(config: &ProviderConfig) -> Result<Self, WeatherError> {
        let api_key = config
            .api_key()
            .ok_or(WeatherError::MissingApiKey)?
            .to_string();

        let base_url = Url::parse(&config.base_url)
            .map_err(|e| WeatherError::InvalidBaseUrl(format!("{}: {}", config.base_url, e)))?;

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WeatherError::ClientSetup(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            api_key,
        })
    }
}

#[async_trait]
impl WeatherSource for HttpWeatherProvider {
    #[instrument(skip(self), level = "debug")]
    async fn fetch(&self, city: &str) -> Result<WeatherRecord, FetchError> {
        let response = self
            .client
            .get(self.base_url.clone())
            .query(&[("access_key", self.api_key.as_str()), ("query", city)])
            .send()
            .await
            .map_err(ReqwestErrorExt::into_network_error)?;

        let status = response.status();
        if status != StatusCode::OK {
            let err = NetworkError::from_status(status);
            if err.is_retryable() {
                tracing::debug!("Provider returned transient status {} for {}", status, city);
                return Err(err.into());
            }
            tracing::debug!("Provider returned {} for {}, recording as not found", status, city);
            return Ok(WeatherRecord::NotFound {
                city: city.to_string(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(ReqwestErrorExt::into_network_error)?;

        interpret_payload(city, &body)
    }
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    success: Option<bool>,
    error: Option<ApiError>,
    location: Option<ApiLocation>,
    current: Option<ApiCurrent>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    code: Option<i64>,
    #[serde(rename = "type")]
    kind: Option<String>,
    info: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiLocation {
    name: Option<String>,
    country: Option<String>,
    localtime: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiCurrent {
    temperature: Option<f64>,
    #[serde(default)]
    weather_descriptions: Vec<String>,
    humidity: Option<f64>,
}

fn invalid(city: &str, reason: &str) -> WeatherRecord {
    WeatherRecord::InvalidData {
        city: city.to_string(),
        reason: reason.to_string(),
    }
}

/// Classify a 200 body carrying `success: false`.
fn interpret_failure(city: &str, error: Option<ApiError>) -> Result<WeatherRecord, FetchError> {
    let (code, kind, info) = match error {
        Some(e) => (e.code, e.kind, e.info.unwrap_or_default()),
        None => (None, None, String::new()),
    };
    tracing::debug!(
        "Provider error for {}: code={:?} type={:?} info={:?}",
        city,
        code,
        kind,
        info
    );

    match code {
        Some(UNKNOWN_LOCATION_CODE) => Ok(WeatherRecord::NotFound {
            city: city.to_string(),
        }),
        Some(code) if ACCESS_DENIED_CODES.contains(&code) => {
            tracing::warn!("Provider rejected the access key (code {})", code);
            Err(FetchError::AccessDenied { code, info })
        }
        Some(code) if USAGE_LIMIT_CODES.contains(&code) => {
            Err(FetchError::UsageLimited { code, info })
        }
        None if kind.as_deref() == Some(UNKNOWN_LOCATION_TYPE) => Ok(WeatherRecord::NotFound {
            city: city.to_string(),
        }),
        _ => Ok(invalid(city, "Invalid data from API")),
    }
}

/// Translate a 200 response body for `city` into a terminal record.
///
/// # Errors
/// A `success: false` body naming a rejected key or an exhausted quota is
/// returned as `FetchError`; every other body yields a record.
pub fn interpret_payload(city: &str, body: &[u8]) -> Result<WeatherRecord, FetchError> {
    let payload: ApiResponse = match serde_json::from_slice(body) {
        Ok(p) => p,
        Err(e) => {
            tracing::debug!("Unparseable payload for {}: {}", city, e);
            return Ok(invalid(city, "Invalid data from API"));
        }
    };

    if payload.success == Some(false) {
        return interpret_failure(city, payload.error);
    }

    let (Some(location), Some(current)) = (payload.location, payload.current) else {
        return Ok(invalid(city, "Invalid data from API"));
    };

    let Some(name) = location.name.filter(|n| !n.trim().is_empty()) else {
        return Ok(invalid(city, "Missing location name"));
    };

    let Some(description) = current.weather_descriptions.into_iter().next() else {
        return Ok(invalid(city, "Missing weather description"));
    };

    let temperature = match current.temperature {
        Some(t) if temperature_in_range(t) => (t * 10.0).round() / 10.0,
        _ => return Ok(invalid(city, "Invalid temperature data")),
    };

    let humidity = current
        .humidity
        .filter(|h| (0.0..=100.0).contains(h))
        .map(|h| h.round() as u8);

    Ok(WeatherRecord::Resolved(WeatherReport {
        city: name,
        temperature,
        description,
        region: classify_region(city),
        country: location.country,
        localtime: location.localtime,
        humidity,
    }))
}
