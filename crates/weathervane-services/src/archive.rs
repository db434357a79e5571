//! Region archive: append-only, region-partitioned history of resolved cities.
//!
//! Layout on disk is one directory per region holding one JSON file per task:
//! `<root>/<Region>/task_<task id>.json`. A task writes each of its files once;
//! repeating the write for the same task replaces the file with identical
//! content, so a retried task never duplicates entries.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use weathervane_weather::{Region, WeatherReport};

use crate::result_store::StoreResult;
use crate::task::TaskId;

const FILE_PREFIX: &str = "task_";
const FILE_SUFFIX: &str = ".json";

/// One archived report together with the task that produced it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveEntry {
    pub task_id: TaskId,
    #[serde(flatten)]
    pub report: WeatherReport,
}

/// Durable per-region store of resolved reports.
pub trait RegionArchive: Send + Sync {
    /// Record the reports one task resolved for `region`.
    ///
    /// Calling this again with the same task id replaces that task's entries.
    fn append(&self, region: Region, task_id: &TaskId, reports: &[WeatherReport])
        -> StoreResult<()>;

    /// Every entry archived for `region`, across all tasks.
    fn list_all(&self, region: Region) -> StoreResult<Vec<ArchiveEntry>>;
}

/// Filesystem-backed region archive.
#[derive(Debug, Clone)]
pub struct FsRegionArchive {
    root: PathBuf,
}

impl FsRegionArchive {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn region_dir(&self, region: Region) -> PathBuf {
        self.root.join(region.as_str())
    }

    fn task_file(&self, region: Region, task_id: &TaskId) -> PathBuf {
        self.region_dir(region)
            .join(format!("{}{}{}", FILE_PREFIX, task_id, FILE_SUFFIX))
    }

    /// Task id encoded in an archive file name, if it is one of ours
    fn task_id_from_file_name(name: &str) -> Option<TaskId> {
        let id = name.strip_prefix(FILE_PREFIX)?.strip_suffix(FILE_SUFFIX)?;
        TaskId::parse(id).ok()
    }

    fn read_task_file(path: &Path) -> StoreResult<Vec<WeatherReport>> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }
}

impl RegionArchive for FsRegionArchive {
    fn append(
        &self,
        region: Region,
        task_id: &TaskId,
        reports: &[WeatherReport],
    ) -> StoreResult<()> {
        if reports.is_empty() {
            return Ok(());
        }

        let dir = self.region_dir(region);
        fs::create_dir_all(&dir)?;

        let target = self.task_file(region, task_id);
        let staging = dir.join(format!(".{}{}{}.tmp", FILE_PREFIX, task_id, FILE_SUFFIX));

        let contents = serde_json::to_vec_pretty(reports)?;
        {
            let mut file = fs::File::create(&staging)?;
            file.write_all(&contents)?;
            file.sync_all()?;
        }
        fs::rename(&staging, &target)?;

        tracing::info!(
            "Archived {} report(s) for task {} under {}",
            reports.len(),
            task_id,
            region
        );
        Ok(())
    }

    fn list_all(&self, region: Region) -> StoreResult<Vec<ArchiveEntry>> {
        let dir = self.region_dir(region);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut files: Vec<(TaskId, PathBuf)> = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            let Some(task_id) = name.to_str().and_then(Self::task_id_from_file_name) else {
                continue;
            };
            files.push((task_id, entry.path()));
        }
        files.sort_by(|a, b| a.1.cmp(&b.1));

        let mut entries = Vec::new();
        for (task_id, path) in files {
            match Self::read_task_file(&path) {
                Ok(reports) => entries.extend(reports.into_iter().map(|report| ArchiveEntry {
                    task_id: task_id.clone(),
                    report,
                })),
                Err(e) => {
                    tracing::error!("Error reading archive file {}: {}", path.display(), e);
                }
            }
        }

        Ok(entries)
    }
}
