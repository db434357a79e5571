//! Task executor: resolves every city of a batch, then persists the outcome.
//!
//! Cities are fetched concurrently (bounded by `concurrency`) and each one is
//! retried on its own schedule. A city's terminal record is decided once, after
//! its retries are over, and one city's failure never touches another's record.
//! A task fails only when the provider rejects the access key or when
//! persistence fails.

use futures::stream::{self, StreamExt, TryStreamExt};
use std::sync::Arc;
use thiserror::Error;
use tracing::instrument;

use weathervane_core::ExecutorConfig;
use weathervane_weather::{CityQuery, FetchError, WeatherRecord, WeatherSource};

use crate::archive::RegionArchive;
use crate::result_store::{ResultStore, StoreError};
use crate::retry::{with_retry, RetryPolicy};
use crate::task::{TaskId, TaskResult};

/// Task-level failures.
#[derive(Debug, Error)]
pub enum TaskError {
    #[error("Provider refused the task: {0}")]
    Provider(#[from] FetchError),

    #[error("Failed to persist results: {0}")]
    Persistence(#[from] StoreError),

    #[error("Storage worker failed: {0}")]
    Worker(String),
}

pub struct TaskExecutor {
    source: Arc<dyn WeatherSource>,
    results: Arc<dyn ResultStore>,
    archive: Arc<dyn RegionArchive>,
    retry: RetryPolicy,
    concurrency: usize,
}

impl TaskExecutor {
    pub fn new(
        source: Arc<dyn WeatherSource>,
        results: Arc<dyn ResultStore>,
        archive: Arc<dyn RegionArchive>,
    ) -> Self {
        Self {
            source,
            results,
            archive,
            retry: RetryPolicy::default(),
            concurrency: ExecutorConfig::default().concurrency,
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Resolve `queries` and write the result to both sinks.
    ///
    /// # Errors
    /// Returns `TaskError::Provider` if the provider rejects the access key; no
    /// sink is written then. Returns `TaskError::Persistence` if the archive or
    /// the result store cannot be written. Either sink may already hold this
    /// task's data when that happens.
    #[instrument(skip(self, task_id, queries), fields(task_id = %task_id, cities = queries.len()))]
    pub async fn run(
        &self,
        task_id: &TaskId,
        queries: Vec<CityQuery>,
    ) -> Result<TaskResult, TaskError> {
        tracing::info!("Processing weather data");
        let result = self.resolve_all(queries).await?;
        self.persist(task_id, &result).await?;
        tracing::info!("Saved results for {} cities", result.len());
        Ok(result)
    }

    /// Resolve every query to its terminal record without persisting anything.
    ///
    /// Queries sharing the same original string collapse into one entry.
    /// Outstanding fetches are dropped as soon as one city hits a fatal error.
    pub async fn resolve_all(&self, queries: Vec<CityQuery>) -> Result<TaskResult, TaskError> {
        let entries = stream::iter(queries)
            .map(|query| async move {
                let record = self.resolve_city(&query).await?;
                Ok::<_, FetchError>((query.original, record))
            })
            .buffer_unordered(self.concurrency)
            .try_collect::<Vec<_>>()
            .await?;

        Ok(entries.into_iter().collect())
    }

    async fn resolve_city(&self, query: &CityQuery) -> Result<WeatherRecord, FetchError> {
        let city = query.canonical.as_str();
        let outcome = with_retry(&self.retry, |attempt| {
            tracing::debug!("Fetching {} (attempt {})", city, attempt);
            self.source.fetch(city)
        })
        .await;

        match outcome {
            Ok(record) => Ok(record),
            Err(e) if e.is_fatal() => {
                tracing::error!("Aborting task at {}: {}", city, e);
                Err(e)
            }
            Err(e) => Ok(WeatherRecord::TransientError {
                city: city.to_string(),
                cause: e.to_string(),
            }),
        }
    }

    /// Archive resolved reports per region, then store the full result.
    async fn persist(&self, task_id: &TaskId, result: &TaskResult) -> Result<(), TaskError> {
        let grouped = result.resolved_by_region();
        let archive = Arc::clone(&self.archive);
        let results = Arc::clone(&self.results);
        let task_id = task_id.clone();
        let result = result.clone();

        tokio::task::spawn_blocking(move || -> Result<(), StoreError> {
            for (region, reports) in &grouped {
                archive.append(*region, &task_id, reports)?;
            }
            results.put(&task_id, &result)
        })
        .await
        .map_err(|e| TaskError::Worker(e.to_string()))??;

        Ok(())
    }
}
