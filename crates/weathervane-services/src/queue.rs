//! In-process task queue.
//!
//! `submit` assigns the task id, records the task as pending and spawns the
//! executor on the current tokio runtime. The id is created exactly once here
//! and is passed unchanged to every write the task makes. Panics inside a task
//! are caught and reported as a failed state.
//!
//! Only the most recent finished tasks keep their status here; older ones are
//! evicted and remain readable through the result store.

use parking_lot::RwLock;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::runtime::Handle;

use weathervane_core::ExecutorConfig;
use weathervane_weather::CityQuery;

use crate::executor::TaskExecutor;
use crate::task::{TaskId, TaskStatus};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    #[error("Tasks can only be submitted from within a tokio runtime")]
    NoRuntime,
}

/// Task states, plus the order in which tasks finished.
#[derive(Default)]
struct TaskTable {
    statuses: HashMap<TaskId, TaskStatus>,
    finished: VecDeque<TaskId>,
}

impl TaskTable {
    fn set(&mut self, task_id: &TaskId, status: TaskStatus, retain: usize) {
        let finishing = status.is_terminal();
        let previous = self.statuses.insert(task_id.clone(), status);
        if !finishing || previous.is_some_and(|p| p.is_terminal()) {
            return;
        }

        self.finished.push_back(task_id.clone());
        while self.finished.len() > retain {
            if let Some(evicted) = self.finished.pop_front() {
                tracing::debug!("Evicting finished task {}", evicted);
                self.statuses.remove(&evicted);
            }
        }
    }
}

#[derive(Clone)]
pub struct TaskQueue {
    executor: Arc<TaskExecutor>,
    tasks: Arc<RwLock<TaskTable>>,
    retain: usize,
}

impl TaskQueue {
    pub fn new(executor: Arc<TaskExecutor>) -> Self {
        Self {
            executor,
            tasks: Arc::new(RwLock::new(TaskTable::default())),
            retain: ExecutorConfig::default().retained_tasks,
        }
    }

    /// Keep the status of at most `retain` finished tasks. Pending and
    /// running tasks are never evicted.
    pub fn with_retention(mut self, retain: usize) -> Self {
        self.retain = retain.max(1);
        self
    }

    /// Enqueue a batch and return its id.
    ///
    /// # Errors
    /// Returns `QueueError::NoRuntime` when called outside a tokio runtime; no
    /// task is recorded then.
    pub fn submit(&self, queries: Vec<CityQuery>) -> Result<TaskId, QueueError> {
        let runtime = Handle::try_current().map_err(|_| QueueError::NoRuntime)?;

        let task_id = TaskId::new();
        self.set_status(&task_id, TaskStatus::Pending);
        tracing::info!("Submitted task {} with {} cities", task_id, queries.len());

        let executor = Arc::clone(&self.executor);
        let queue = self.clone();
        let id = task_id.clone();
        let worker = runtime.clone();

        runtime.spawn(async move {
            queue.set_status(&id, TaskStatus::Running);

            let run = {
                let id = id.clone();
                worker.spawn(async move { executor.run(&id, queries).await })
            };

            let status = match run.await {
                Ok(Ok(_)) => TaskStatus::Succeeded,
                Ok(Err(e)) => {
                    tracing::error!("Task {} failed: {}", id, e);
                    TaskStatus::Failed {
                        cause: e.to_string(),
                    }
                }
                Err(e) => {
                    tracing::error!("Task {} aborted: {}", id, e);
                    TaskStatus::Failed {
                        cause: format!("Task aborted: {}", e),
                    }
                }
            };
            queue.set_status(&id, status);
        });

        Ok(task_id)
    }

    /// Current lifecycle state, or `None` for ids this queue never issued or
    /// has already evicted.
    pub fn status(&self, task_id: &TaskId) -> Option<TaskStatus> {
        self.tasks.read().statuses.get(task_id).cloned()
    }

    /// Poll until the task reaches a terminal state.
    ///
    /// Returns `None` for unknown or evicted ids.
    pub async fn wait(&self, task_id: &TaskId, poll_interval: Duration) -> Option<TaskStatus> {
        loop {
            let status = self.status(task_id)?;
            if status.is_terminal() {
                return Some(status);
            }
            tokio::time::sleep(poll_interval).await;
        }
    }

    /// Number of tasks whose status is still held.
    pub fn len(&self) -> usize {
        self.tasks.read().statuses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.read().statuses.is_empty()
    }

    fn set_status(&self, task_id: &TaskId, status: TaskStatus) {
        tracing::debug!("Task {} -> {:?}", task_id, status);
        self.tasks.write().set(task_id, status, self.retain);
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::archive::FsRegionArchive;
    use crate::result_store::{MemoryResultStore, ResultStore, StoreResult};
    use crate::retry::RetryPolicy;
    use crate::task::TaskResult;
    use async_trait::async_trait;
    use crate::query;
    use weathervane_weather::{FetchError, Region, WeatherRecord, WeatherReport, WeatherSource};

    const POLL: Duration = Duration::from_millis(5);

    struct EchoSource;

    #[async_trait]
    impl WeatherSource for EchoSource {
        async fn fetch(&self, city: &str) -> Result<WeatherRecord, FetchError> {
            if city == "Panicville" {
                panic!("provider blew up");
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
            if city == "Kyiv" {
                return Ok(WeatherRecord::Resolved(WeatherReport {
                    city: city.to_string(),
                    temperature: 8.0,
                    description: "Overcast".to_string(),
                    region: Region::Europe,
                    country: None,
                    localtime: None,
                    humidity: None,
                }));
            }
            Ok(WeatherRecord::NotFound {
                city: city.to_string(),
            })
        }
    }

    struct BrokenStore;

    impl ResultStore for BrokenStore {
        fn ping(&self) -> StoreResult<()> {
            Ok(())
        }

        fn put(&self, _: &TaskId, _: &TaskResult) -> StoreResult<()> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "connection refused").into())
        }

        fn get(&self, _: &TaskId) -> StoreResult<Option<TaskResult>> {
            Ok(None)
        }
    }

    fn queue_with(results: Arc<dyn ResultStore>, dir: &std::path::Path) -> TaskQueue {
        let executor = TaskExecutor::new(
            Arc::new(EchoSource),
            results,
            Arc::new(FsRegionArchive::new(dir)),
        )
        .with_retry_policy(RetryPolicy::new(3, Duration::ZERO));
        TaskQueue::new(Arc::new(executor))
    }

    fn batch(cities: &[&str]) -> Vec<CityQuery> {
        cities.iter().filter_map(|c| CityQuery::parse(c)).collect()
    }

    #[tokio::test]
    async fn test_submit_runs_to_success() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryResultStore::new());
        let queue = queue_with(store.clone(), dir.path());

        let id = queue.submit(batch(&["Kyiv", "Oslo"])).unwrap();
        assert!(matches!(
            queue.status(&id),
            Some(TaskStatus::Pending | TaskStatus::Running)
        ));

        assert_eq!(queue.wait(&id, POLL).await, Some(TaskStatus::Succeeded));
        assert_eq!(store.get(&id).unwrap().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_store_failure_reported_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_with(Arc::new(BrokenStore), dir.path());

        let id = queue.submit(batch(&["Kyiv"])).unwrap();

        let Some(TaskStatus::Failed { cause }) = queue.wait(&id, POLL).await else {
            panic!("expected failed task");
        };
        assert!(cause.contains("connection refused"));
    }

    #[tokio::test]
    async fn test_panic_reported_as_failed() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_with(Arc::new(MemoryResultStore::new()), dir.path());

        let id = queue.submit(batch(&["Panicville"])).unwrap();

        assert!(matches!(
            queue.wait(&id, POLL).await,
            Some(TaskStatus::Failed { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_task_has_no_status() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_with(Arc::new(MemoryResultStore::new()), dir.path());

        let id = TaskId::new();
        assert!(queue.status(&id).is_none());
        assert!(queue.wait(&id, POLL).await.is_none());
    }

    #[tokio::test]
    async fn test_each_submission_gets_its_own_id() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_with(Arc::new(MemoryResultStore::new()), dir.path());

        let first = queue.submit(batch(&["Kyiv"])).unwrap();
        let second = queue.submit(batch(&["Kyiv"])).unwrap();

        assert_ne!(first, second);
        assert_eq!(queue.len(), 2);
        queue.wait(&first, POLL).await;
        queue.wait(&second, POLL).await;
    }

    #[tokio::test]
    async fn test_archive_failure_reported_as_failed() {
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let store = Arc::new(MemoryResultStore::new());
        let queue = queue_with(store.clone(), blocker.path());

        let id = queue.submit(batch(&["Kyiv"])).unwrap();

        let Some(TaskStatus::Failed { cause }) = queue.wait(&id, POLL).await else {
            panic!("expected failed task");
        };
        assert!(cause.contains("persist"));
        assert!(store.get(&id).unwrap().is_none());
    }

    #[test]
    fn test_submit_outside_runtime_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_with(Arc::new(MemoryResultStore::new()), dir.path());

        assert_eq!(queue.submit(batch(&["Kyiv"])), Err(QueueError::NoRuntime));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_oldest_finished_task_evicted_but_still_queryable() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryResultStore::new());
        let queue = queue_with(store.clone(), dir.path()).with_retention(2);

        let mut ids = Vec::new();
        for _ in 0..3 {
            let id = queue.submit(batch(&["Oslo"])).unwrap();
            assert_eq!(queue.wait(&id, POLL).await, Some(TaskStatus::Succeeded));
            ids.push(id);
        }

        assert_eq!(queue.len(), 2);
        assert!(queue.status(&ids[0]).is_none());
        assert_eq!(queue.status(&ids[2]), Some(TaskStatus::Succeeded));

        let report = query::task_report(&queue, store.as_ref(), ids[0].as_str()).unwrap();
        assert_eq!(report.status, TaskStatus::Succeeded);
        assert!(report.result.is_some());
    }

    #[tokio::test]
    async fn test_unfinished_tasks_not_evicted() {
        let dir = tempfile::tempdir().unwrap();
        let queue = queue_with(Arc::new(MemoryResultStore::new()), dir.path()).with_retention(1);

        let first = queue.submit(batch(&["Oslo"])).unwrap();
        let second = queue.submit(batch(&["Oslo"])).unwrap();

        assert_eq!(queue.len(), 2);
        assert!(queue.status(&first).is_some());
        assert!(queue.status(&second).is_some());
    }
}
