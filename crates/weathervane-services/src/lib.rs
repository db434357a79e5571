//! Task pipeline for Weathervane
//!
//! Batches of city names are accepted at intake, resolved concurrently by the
//! task executor and persisted to the result store and the region archive.
//! Callers poll the task queue and read results through the query surface.

pub mod archive;
pub mod context;
pub mod executor;
pub mod intake;
pub mod query;
pub mod queue;
pub mod result_store;
pub mod retry;
pub mod task;

pub use archive::{ArchiveEntry, FsRegionArchive, RegionArchive};
pub use context::{ServiceContext, SubmitError};
pub use executor::{TaskError, TaskExecutor};
pub use intake::{normalize_batch, parse_submission, IntakeError};
pub use query::{region_report, task_report, QueryError, TaskReport};
pub use queue::{QueueError, TaskQueue};
pub use result_store::{MemoryResultStore, ResultStore, SqliteResultStore, StoreError, StoreResult};
pub use retry::{with_retry, RetryDecision, RetryPolicy, Retryable};
pub use task::{InvalidTaskId, TaskId, TaskResult, TaskStatus};
