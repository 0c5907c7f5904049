//! Local filesystem storage.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;

use crate::error::{AppError, Result};
use crate::models::{RunReport, TargetSummary, file_stem};
use crate::storage::{REPORT_KEY, SUMMARY_HEADER, SummaryStorage};

/// Local filesystem storage backend.
#[derive(Debug, Clone)]
pub struct LocalStorage {
    root_dir: PathBuf,
}

impl LocalStorage {
    /// Create a new LocalStorage rooted at the given directory.
    pub fn new(root_dir: impl Into<PathBuf>) -> Self {
        Self {
            root_dir: root_dir.into(),
        }
    }

    pub fn root_dir(&self) -> &Path {
        &self.root_dir
    }

    /// Key of a target's summary file.
    pub fn summary_key(target_name: &str) -> String {
        format!("{}.csv", file_stem(target_name))
    }

    fn path(&self, key: &str) -> PathBuf {
        self.root_dir.join(key)
    }

    async fn ensure_dir(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        Ok(())
    }

    /// Write bytes atomically (write to temp, then rename).
    async fn write_bytes(&self, key: &str, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path(key);
        self.ensure_dir(&path).await?;

        let tmp = path.with_extension("tmp");
        let mut file = tokio::fs::File::create(&tmp).await?;
        file.write_all(bytes).await?;
        file.flush().await?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await?;
        Ok(path)
    }

    /// Read bytes, returning None if file doesn't exist.
    async fn read_bytes(&self, key: &str) -> Result<Option<Vec<u8>>> {
        match tokio::fs::read(self.path(key)).await {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(AppError::Io(e)),
        }
    }
}

/// Header plus one data row, CSV-encoded.
fn encode_summary(summary: &TargetSummary) -> Result<Vec<u8>> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(SUMMARY_HEADER)?;
    writer.write_record([
        summary.target_name.clone(),
        summary.total_score.to_string(),
        summary.player_count.to_string(),
        summary.last_updated(),
    ])?;
    writer.into_inner().map_err(|e| AppError::Io(e.into_error()))
}

#[async_trait]
impl SummaryStorage for LocalStorage {
    async fn write_summary(&self, summary: &TargetSummary) -> Result<PathBuf> {
        let bytes = encode_summary(summary)?;
        let path = self
            .write_bytes(&Self::summary_key(&summary.target_name), &bytes)
            .await?;
        log::debug!("Wrote summary for {} to {}", summary.target_name, path.display());
        Ok(path)
    }

    async fn write_report(&self, report: &RunReport) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(report)?;
        self.write_bytes(REPORT_KEY, &bytes).await?;
        Ok(())
    }

    async fn load_report(&self) -> Result<Option<RunReport>> {
        match self.read_bytes(REPORT_KEY).await? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Local, TimeZone};
    use tempfile::TempDir;

    fn summary(name: &str) -> TargetSummary {
        TargetSummary {
            target_name: name.to_string(),
            total_score: 1290,
            player_count: 2,
            completed_at: Local.with_ymd_and_hms(2026, 3, 14, 9, 5, 7).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_write_summary_csv() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());

        let path = storage.write_summary(&summary("Corporeal Beast")).await.unwrap();
        assert_eq!(path, tmp.path().join("Corporeal_Beast.csv"));

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            content,
            "Boss Name,Total KC,Players,Last Updated\n\
             Corporeal Beast,1290,2,2026-03-14 09:05:07\n"
        );
        assert!(!tmp.path().join("Corporeal_Beast.tmp").exists());
    }

    #[tokio::test]
    async fn test_write_summary_replaces_previous() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path().join("out"));

        storage.write_summary(&summary("Zulrah")).await.unwrap();
        let mut newer = summary("Zulrah");
        newer.total_score = 5;
        let path = storage.write_summary(&newer).await.unwrap();

        let content = std::fs::read_to_string(path).unwrap();
        assert!(content.contains("Zulrah,5,2,"));
        assert_eq!(content.lines().count(), 2);
    }

    #[tokio::test]
    async fn test_report_round_trip() {
        let tmp = TempDir::new().unwrap();
        let storage = LocalStorage::new(tmp.path());
        assert!(storage.load_report().await.unwrap().is_none());

        let now = Local::now();
        let report = RunReport {
            started_at: now,
            finished_at: now,
            total_targets: 3,
            completed_pages: 12,
            successful: vec!["Zulrah".into()],
            failed: vec!["Obor".into()],
            interrupted: true,
        };
        storage.write_report(&report).await.unwrap();

        let loaded = storage.load_report().await.unwrap().unwrap();
        assert_eq!(loaded.total_targets, 3);
        assert_eq!(loaded.failed, vec!["Obor".to_string()]);
        assert!(loaded.interrupted);
    }
}
