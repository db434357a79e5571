//! Read side: task status reports and region history.

use serde::Serialize;
use thiserror::Error;

use weathervane_core::AppError;
use weathervane_weather::{Region, UnknownRegion};

use crate::archive::{ArchiveEntry, RegionArchive};
use crate::queue::TaskQueue;
use crate::result_store::{ResultStore, StoreError};
use crate::task::{InvalidTaskId, TaskId, TaskResult, TaskStatus};

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Task not found: {0}")]
    TaskNotFound(TaskId),

    #[error(transparent)]
    InvalidTaskId(#[from] InvalidTaskId),

    #[error(transparent)]
    UnknownRegion(#[from] UnknownRegion),

    #[error("No data found for region {0}")]
    RegionEmpty(Region),

    #[error("Task {0} succeeded but its result is missing from the store")]
    ResultMissing(TaskId),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl QueryError {
    /// Whether the query named something that does not exist
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::TaskNotFound(_) | Self::RegionEmpty(_))
    }
}

impl From<QueryError> for AppError {
    fn from(e: QueryError) -> Self {
        match e {
            QueryError::Store(e) => e.into(),
            other => AppError::Service(other.to_string()),
        }
    }
}

/// Status of one task, with its result once it has succeeded.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TaskReport {
    pub task_id: TaskId,
    #[serde(flatten)]
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<TaskResult>,
}

/// Build the report for `raw_id`.
///
/// Ids the queue does not know (a task from an earlier process, say) are
/// looked up in the result store and reported as succeeded when found there.
pub fn task_report(
    queue: &TaskQueue,
    results: &dyn ResultStore,
    raw_id: &str,
) -> Result<TaskReport, QueryError> {
    let task_id = TaskId::parse(raw_id)?;

    let status = match queue.status(&task_id) {
        Some(status) => status,
        None => {
            let result = results
                .get(&task_id)?
                .ok_or_else(|| QueryError::TaskNotFound(task_id.clone()))?;
            return Ok(TaskReport {
                task_id,
                status: TaskStatus::Succeeded,
                result: Some(result),
            });
        }
    };

    let result = match status {
        TaskStatus::Succeeded => Some(
            results
                .get(&task_id)?
                .ok_or_else(|| QueryError::ResultMissing(task_id.clone()))?,
        ),
        _ => None,
    };

    Ok(TaskReport {
        task_id,
        status,
        result,
    })
}

/// Every archived entry for the region named by `raw_region`.
pub fn region_report(
    archive: &dyn RegionArchive,
    raw_region: &str,
) -> Result<Vec<ArchiveEntry>, QueryError> {
    let region: Region = raw_region.parse()?;
    let entries = archive.list_all(region)?;
    if entries.is_empty() {
        return Err(QueryError::RegionEmpty(region));
    }
    tracing::debug!("Region {} has {} archived entries", region, entries.len());
    Ok(entries)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::panic)]
    use super::*;
    use crate::archive::FsRegionArchive;
    use crate::executor::TaskExecutor;
    use crate::result_store::MemoryResultStore;
    use async_trait::async_trait;
    use std::sync::Arc;
    use weathervane_weather::{FetchError, WeatherRecord, WeatherReport, WeatherSource};

    struct NoSource;

    #[async_trait]
    impl WeatherSource for NoSource {
        async fn fetch(&self, city: &str) -> Result<WeatherRecord, FetchError> {
            Ok(WeatherRecord::NotFound {
                city: city.to_string(),
            })
        }
    }

    fn idle_queue() -> TaskQueue {
        let executor = TaskExecutor::new(
            Arc::new(NoSource),
            Arc::new(MemoryResultStore::new()),
            Arc::new(FsRegionArchive::new(std::env::temp_dir())),
        );
        TaskQueue::new(Arc::new(executor))
    }

    #[test]
    fn test_invalid_id_rejected() {
        let err = task_report(&idle_queue(), &MemoryResultStore::new(), "nope").unwrap_err();
        assert!(matches!(err, QueryError::InvalidTaskId(_)));
    }

    #[test]
    fn test_unknown_id_not_found() {
        let id = TaskId::new();
        let err =
            task_report(&idle_queue(), &MemoryResultStore::new(), id.as_str()).unwrap_err();
        assert!(err.is_not_found());
    }

    #[test]
    fn test_falls_back_to_store() {
        let store = MemoryResultStore::new();
        let id = TaskId::new();
        store.put(&id, &TaskResult::new()).unwrap();

        let report = task_report(&idle_queue(), &store, id.as_str()).unwrap();
        assert_eq!(report.status, TaskStatus::Succeeded);
        assert!(report.result.is_some());
    }

    #[test]
    fn test_report_json_shape() {
        let report = TaskReport {
            task_id: TaskId::new(),
            status: TaskStatus::Failed {
                cause: "disk full".to_string(),
            },
            result: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["cause"], "disk full");
        assert!(json.get("result").is_none());
    }

    #[test]
    fn test_region_report() {
        let dir = tempfile::tempdir().unwrap();
        let archive = FsRegionArchive::new(dir.path());
        archive
            .append(
                Region::Asia,
                &TaskId::new(),
                &[WeatherReport {
                    city: "Tokyo".to_string(),
                    temperature: 21.0,
                    description: "Clear".to_string(),
                    region: Region::Asia,
                    country: None,
                    localtime: None,
                    humidity: None,
                }],
            )
            .unwrap();

        assert_eq!(region_report(&archive, "asia").unwrap().len(), 1);
        assert!(matches!(
            region_report(&archive, "Europe"),
            Err(QueryError::RegionEmpty(Region::Europe))
        ));
        assert!(matches!(
            region_report(&archive, "Atlantis"),
            Err(QueryError::UnknownRegion(_))
        ));
    }
}
