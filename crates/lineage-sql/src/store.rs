//! Append-only JSONL store for extracted lineage records, keyed by pipeline,
//! job, and step.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lineage_types::Result;

use crate::SqlLineageRecord;

/// One stored extraction: where the script ran plus what it read and wrote.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SqlLineageEntry {
    pub pipeline: String,
    pub job: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub step: Option<String>,
    pub recorded_at: DateTime<Utc>,
    pub record: SqlLineageRecord,
}

impl SqlLineageEntry {
    pub fn new(
        pipeline: impl Into<String>,
        job: impl Into<String>,
        step: Option<&str>,
        record: SqlLineageRecord,
    ) -> Self {
        Self {
            pipeline: pipeline.into(),
            job: job.into(),
            step: step.map(str::to_string),
            recorded_at: Utc::now(),
            record,
        }
    }
}

/// One JSON object per line, appended on put. Corrupt lines are skipped on
/// read so a torn write never takes down the history behind it.
#[derive(Debug, Clone)]
pub struct SqlLineageStore {
    path: PathBuf,
}

impl SqlLineageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn put(&self, entry: &SqlLineageEntry) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        let line = serde_json::to_string(entry)?;
        writeln!(file, "{line}")?;
        Ok(())
    }

    pub fn load(&self) -> Result<Vec<SqlLineageEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let raw = std::fs::read_to_string(&self.path)?;
        let mut entries = Vec::new();
        for (lineno, line) in raw.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str(line) {
                Ok(entry) => entries.push(entry),
                Err(err) => {
                    tracing::warn!(path = %self.path.display(), line = lineno + 1, error = %err, "skipping corrupt store line");
                }
            }
        }
        Ok(entries)
    }

    pub fn by_pipeline(&self, pipeline: &str) -> Result<Vec<SqlLineageEntry>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|e| e.pipeline == pipeline)
            .collect())
    }

    pub fn by_job(&self, job: &str) -> Result<Vec<SqlLineageEntry>> {
        Ok(self.load()?.into_iter().filter(|e| e.job == job).collect())
    }

    /// Most recently recorded entry for one step of one pipeline.
    pub fn latest_for_step(&self, pipeline: &str, step: &str) -> Result<Option<SqlLineageEntry>> {
        Ok(self
            .load()?
            .into_iter()
            .filter(|e| e.pipeline == pipeline && e.step.as_deref() == Some(step))
            .max_by_key(|e| e.recorded_at))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeSet;

    use chrono::TimeZone;

    fn record(dest: &str) -> SqlLineageRecord {
        SqlLineageRecord {
            destination: Some(dest.to_string()),
            sources: BTreeSet::from(["raw".to_string()]),
            ..Default::default()
        }
        .finish()
    }

    fn store() -> (tempfile::TempDir, SqlLineageStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SqlLineageStore::new(dir.path().join("lineage.jsonl"));
        (dir, store)
    }

    #[test]
    fn put_then_load_round_trips_entries() {
        let (_dir, store) = store();
        store
            .put(&SqlLineageEntry::new("p1", "job-a", Some("Transform"), record("t1")))
            .unwrap();
        store
            .put(&SqlLineageEntry::new("p2", "job-b", None, record("t2")))
            .unwrap();

        let entries = store.load().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].record.destination.as_deref(), Some("t1"));
        assert_eq!(entries[1].step, None);
    }

    #[test]
    fn missing_file_loads_empty() {
        let (_dir, store) = store();
        assert!(store.load().unwrap().is_empty());
    }

    #[test]
    fn filters_by_pipeline_and_job() {
        let (_dir, store) = store();
        store
            .put(&SqlLineageEntry::new("p1", "job-a", None, record("t1")))
            .unwrap();
        store
            .put(&SqlLineageEntry::new("p1", "job-b", None, record("t2")))
            .unwrap();
        store
            .put(&SqlLineageEntry::new("p2", "job-a", None, record("t3")))
            .unwrap();

        assert_eq!(store.by_pipeline("p1").unwrap().len(), 2);
        assert_eq!(store.by_job("job-a").unwrap().len(), 2);
        assert!(store.by_pipeline("p3").unwrap().is_empty());
    }

    #[test]
    fn latest_for_step_picks_the_newest_entry() {
        let (_dir, store) = store();
        let mut old = SqlLineageEntry::new("p1", "job-a", Some("Transform"), record("t1"));
        old.recorded_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let mut new = SqlLineageEntry::new("p1", "job-b", Some("Transform"), record("t2"));
        new.recorded_at = Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap();
        store.put(&old).unwrap();
        store.put(&new).unwrap();

        let latest = store.latest_for_step("p1", "Transform").unwrap().unwrap();
        assert_eq!(latest.job, "job-b");
        assert!(store.latest_for_step("p1", "Missing").unwrap().is_none());
    }

    #[test]
    fn corrupt_lines_are_skipped_not_fatal() {
        let (_dir, store) = store();
        store
            .put(&SqlLineageEntry::new("p1", "job-a", None, record("t1")))
            .unwrap();
        std::fs::OpenOptions::new()
            .append(true)
            .open(store.path())
            .and_then(|mut f| writeln!(f, "{{not json"))
            .unwrap();
        store
            .put(&SqlLineageEntry::new("p1", "job-b", None, record("t2")))
            .unwrap();

        let entries = store.load().unwrap();
        assert_eq!(entries.len(), 2);
    }
}
