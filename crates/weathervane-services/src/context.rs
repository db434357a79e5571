//! Service wiring.
//!
//! `ServiceContext` is built once from a `Config` and owns the provider, both
//! sinks, the executor and the queue. Everything the outside world can do goes
//! through it: submit a batch, ask for a task report, read a region.

use anyhow::{Context, Result};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use weathervane_core::{AppError, Config};
use weathervane_weather::{HttpWeatherProvider, WeatherSource};

use crate::archive::{ArchiveEntry, FsRegionArchive, RegionArchive};
use crate::executor::TaskExecutor;
use crate::intake::{normalize_batch, parse_submission, IntakeError};
use crate::query::{self, QueryError, TaskReport};
use crate::queue::{QueueError, TaskQueue};
use crate::result_store::{ResultStore, SqliteResultStore};
use crate::retry::RetryPolicy;
use crate::task::{TaskId, TaskStatus};

/// Why a submission did not become a task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("Submission rejected: {0}")]
    Rejected(#[from] IntakeError),

    #[error(transparent)]
    Queue(#[from] QueueError),
}

impl From<SubmitError> for AppError {
    fn from(e: SubmitError) -> Self {
        AppError::Service(e.to_string())
    }
}

pub struct ServiceContext {
    config: Config,
    results: Arc<dyn ResultStore>,
    archive: Arc<dyn RegionArchive>,
    queue: TaskQueue,
}

impl ServiceContext {
    /// Build the production context: HTTP provider, SQLite result store and
    /// filesystem archive under the configured data directory.
    ///
    /// Fails if the provider has no API key or the result store is unreachable.
    pub fn from_config(config: Config) -> Result<Self> {
        let source = HttpWeatherProvider::new(&config.provider)
            .context("Failed to configure weather provider")?;

        let db_path = config.storage.results_db_path();
        let results = SqliteResultStore::open(&db_path)
            .with_context(|| format!("Failed to open result store at {}", db_path.display()))?;
        results.ping().context("Result store is not reachable")?;
        tracing::info!("Connected to result store at {}", db_path.display());

        let archive = FsRegionArchive::new(config.storage.archive_dir());
        tracing::info!("Region archive at {}", archive.root().display());

        Ok(Self::with_components(
            config,
            Arc::new(source),
            Arc::new(results),
            Arc::new(archive),
        ))
    }

    /// Build a context around caller-supplied components.
    pub fn with_components(
        config: Config,
        source: Arc<dyn WeatherSource>,
        results: Arc<dyn ResultStore>,
        archive: Arc<dyn RegionArchive>,
    ) -> Self {
        let executor = TaskExecutor::new(source, Arc::clone(&results), Arc::clone(&archive))
            .with_retry_policy(RetryPolicy::from_config(&config.retry))
            .with_concurrency(config.executor.concurrency);

        let queue =
            TaskQueue::new(Arc::new(executor)).with_retention(config.executor.retained_tasks);

        Self {
            config,
            results,
            archive,
            queue,
        }
    }

    /// Accept a `{"cities": [...]}` body and start a task for it.
    ///
    /// No task is created when the body is rejected or no runtime is running.
    pub fn submit(&self, body: &Value) -> Result<TaskId, SubmitError> {
        let queries = parse_submission(body)?;
        Ok(self.queue.submit(queries)?)
    }

    /// Start a task for a list of raw city names.
    pub fn submit_cities<S: AsRef<str>>(&self, cities: &[S]) -> Result<TaskId, SubmitError> {
        let queries = normalize_batch(cities)?;
        Ok(self.queue.submit(queries)?)
    }

    /// Wait for a task started by this context to finish.
    pub async fn wait(&self, task_id: &TaskId, poll_interval: Duration) -> Option<TaskStatus> {
        self.queue.wait(task_id, poll_interval).await
    }

    pub fn task_report(&self, task_id: &str) -> Result<TaskReport, QueryError> {
        query::task_report(&self.queue, self.results.as_ref(), task_id)
    }

    pub fn region_report(&self, region: &str) -> Result<Vec<ArchiveEntry>, QueryError> {
        query::region_report(self.archive.as_ref(), region)
    }

    pub fn queue(&self) -> &TaskQueue {
        &self.queue
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
