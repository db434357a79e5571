use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Lowest temperature (°C) accepted from the provider
pub const MIN_TEMPERATURE: f64 = -50.0;
/// Highest temperature (°C) accepted from the provider
pub const MAX_TEMPERATURE: f64 = 50.0;

/// Coarse geographic grouping used to partition the archive
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Region {
    Europe,
    Asia,
    America,
    /// Cities missing from the classification table
    Other,
}

impl Region {
    pub const ALL: [Region; 4] = [Region::Europe, Region::Asia, Region::America, Region::Other];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Europe => "Europe",
            Self::Asia => "Asia",
            Self::America => "America",
            Self::Other => "Other",
        }
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("Unknown region: {0}")]
pub struct UnknownRegion(pub String);

impl FromStr for Region {
    type Err = UnknownRegion;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tag = s.trim();
        Region::ALL
            .into_iter()
            .find(|r| r.as_str().eq_ignore_ascii_case(tag))
            .ok_or_else(|| UnknownRegion(tag.to_string()))
    }
}

/// Current conditions for one successfully resolved city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    /// Location name as reported by the provider
    pub city: String,
    /// Degrees Celsius, rounded to one decimal
    pub temperature: f64,
    pub description: String,
    pub region: Region,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub localtime: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub humidity: Option<u8>,
}

/// Terminal outcome of resolving one city
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum WeatherRecord {
    Resolved(WeatherReport),
    NotFound { city: String },
    InvalidData { city: String, reason: String },
    TransientError { city: String, cause: String },
}

impl WeatherRecord {
    /// The city this record describes
    pub fn city(&self) -> &str {
        match self {
            Self::Resolved(report) => &report.city,
            Self::NotFound { city }
            | Self::InvalidData { city, .. }
            | Self::TransientError { city, .. } => city,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved(_))
    }

    pub fn as_report(&self) -> Option<&WeatherReport> {
        match self {
            Self::Resolved(report) => Some(report),
            _ => None,
        }
    }

    pub fn region(&self) -> Option<Region> {
        self.as_report().map(|r| r.region)
    }
}

/// True when `temperature` is a plausible surface reading
pub fn temperature_in_range(temperature: f64) -> bool {
    (MIN_TEMPERATURE..=MAX_TEMPERATURE).contains(&temperature)
}
