//! Submission intake: shape checks and normalization before a task exists.

use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;

use weathervane_core::AppError;
use weathervane_weather::CityQuery;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntakeError {
    #[error("Submission must contain a 'cities' field")]
    MissingCities,

    #[error("'cities' must be a list")]
    NotAList,

    #[error("'cities' must not be empty")]
    EmptyBatch,

    #[error("City at position {index} is not a string")]
    NonStringEntry { index: usize },

    #[error("No valid city names in submission")]
    NoValidCities,
}

impl From<IntakeError> for AppError {
    fn from(e: IntakeError) -> Self {
        AppError::Service(e.to_string())
    }
}

/// Validate a `{"cities": [...]}` submission body.
///
/// Any non-string entry rejects the whole submission. String entries that fail
/// name validation are dropped; if none survive the submission is rejected.
pub fn parse_submission(body: &Value) -> Result<Vec<CityQuery>, IntakeError> {
    let cities = body.get("cities").ok_or(IntakeError::MissingCities)?;
    let entries = cities.as_array().ok_or(IntakeError::NotAList)?;
    if entries.is_empty() {
        return Err(IntakeError::EmptyBatch);
    }

    let names = entries
        .iter()
        .enumerate()
        .map(|(index, entry)| entry.as_str().ok_or(IntakeError::NonStringEntry { index }))
        .collect::<Result<Vec<_>, _>>()?;

    normalize_batch(&names)
}

/// Normalize raw names, dropping invalid ones and repeated query strings.
pub fn normalize_batch<S: AsRef<str>>(names: &[S]) -> Result<Vec<CityQuery>, IntakeError> {
    if names.is_empty() {
        return Err(IntakeError::EmptyBatch);
    }

    let mut seen = HashSet::new();
    let mut queries = Vec::with_capacity(names.len());
    for name in names {
        let name = name.as_ref();
        match CityQuery::parse(name) {
            Some(query) => {
                if seen.insert(query.original.clone()) {
                    queries.push(query);
                }
            }
            None => tracing::warn!("Dropping invalid city name {:?}", name),
        }
    }

    if queries.is_empty() {
        return Err(IntakeError::NoValidCities);
    }
    Ok(queries)
}
