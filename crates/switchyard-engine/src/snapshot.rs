//! Persisted engine statistics
//!
//! Written as pretty JSON to a temporary sibling file and renamed into
//! place, so a crash mid-write leaves the previous snapshot intact.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use switchyard_health::ProviderHealthStatus;
use switchyard_ledger::CostRecord;
use switchyard_resilience::ExecutionAttempt;
use switchyard_routing::LearningSnapshot;

use crate::error::EngineError;

/// Format version written by this build
pub const SNAPSHOT_VERSION: u32 = 1;

/// Everything the engine carries across restarts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatisticsSnapshot {
    pub version: u32,
    pub exported_at_ms: u64,
    #[serde(default)]
    pub health: Vec<ProviderHealthStatus>,
    #[serde(default)]
    pub learning: LearningSnapshot,
    /// Most recent attempts, oldest first
    #[serde(default)]
    pub recent_attempts: Vec<ExecutionAttempt>,
    #[serde(default)]
    pub cost_records: Vec<CostRecord>,
}

impl StatisticsSnapshot {
    pub(crate) fn check_version(&self) -> Result<(), EngineError> {
        if self.version > SNAPSHOT_VERSION {
            return Err(EngineError::UnsupportedSnapshot { version: self.version });
        }
        Ok(())
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(".tmp");
    PathBuf::from(name)
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> EngineError + '_ {
    move |source| EngineError::SnapshotIo {
        path: path.to_path_buf(),
        source,
    }
}

pub(crate) async fn write(path: &Path, snapshot: &StatisticsSnapshot) -> Result<(), EngineError> {
    let body = serde_json::to_vec_pretty(snapshot)?;

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await.map_err(io_error(parent))?;
    }

    let tmp = temp_path(path);
    tokio::fs::write(&tmp, body).await.map_err(io_error(&tmp))?;
    tokio::fs::rename(&tmp, path).await.map_err(io_error(path))?;
    Ok(())
}

/// Read a snapshot, `None` when the file does not exist
pub(crate) async fn read(path: &Path) -> Result<Option<StatisticsSnapshot>, EngineError> {
    let body = match tokio::fs::read(path).await {
        Ok(body) => body,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_error(path)(e)),
    };

    let snapshot: StatisticsSnapshot = serde_json::from_slice(&body)?;
    snapshot.check_version()?;
    Ok(Some(snapshot))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty() -> StatisticsSnapshot {
        StatisticsSnapshot {
            version: SNAPSHOT_VERSION,
            exported_at_ms: 42,
            health: Vec::new(),
            learning: LearningSnapshot::default(),
            recent_attempts: Vec::new(),
            cost_records: Vec::new(),
        }
    }

    #[tokio::test]
    async fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stats.json");

        write(&path, &empty()).await.unwrap();
        assert!(!temp_path(&path).exists());

        let loaded = read(&path).await.unwrap().unwrap();
        assert_eq!(loaded, empty());
    }

    #[tokio::test]
    async fn missing_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read(&dir.path().join("absent.json")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn rejects_newer_versions_and_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stats.json");

        let newer = StatisticsSnapshot {
            version: SNAPSHOT_VERSION + 1,
            ..empty()
        };
        write(&path, &newer).await.unwrap();
        assert!(matches!(
            read(&path).await,
            Err(EngineError::UnsupportedSnapshot { .. })
        ));

        std::fs::write(&path, b"not json").unwrap();
        assert!(matches!(read(&path).await, Err(EngineError::SnapshotFormat(_))));
    }

    #[test]
    fn missing_sections_default() {
        let snapshot: StatisticsSnapshot = serde_json::from_str(r#"{"version":1,"exported_at_ms":7}"#).unwrap();
        assert!(snapshot.health.is_empty());
        assert!(snapshot.cost_records.is_empty());
    }
}
