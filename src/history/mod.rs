// src/history/mod.rs

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::{
    fs::{self, File},
    io::{BufWriter, ErrorKind, Write},
    path::{Path, PathBuf},
    sync::Mutex,
};
use tracing::debug;

use crate::calculators::{BmiResult, BmiStatus, Units};

pub const DEFAULT_MAX_ENTRIES: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BmiRecord {
    pub recorded_at: DateTime<Utc>,
    pub weight: f64,
    pub height: f64,
    pub units: Units,
    pub bmi: f64,
    pub status: BmiStatus,
}

impl BmiRecord {
    pub fn new(weight: f64, height: f64, units: Units, result: BmiResult) -> Self {
        Self {
            recorded_at: Utc::now(),
            weight,
            height,
            units,
            bmi: result.bmi,
            status: result.status,
        }
    }
}

/// BMI readings kept in one JSON file, newest first and capped at
/// `max_entries`. Writes go through a `.tmp` file that is renamed into place.
pub struct BmiHistory {
    path: PathBuf,
    max_entries: usize,
    lock: Mutex<()>,
}

impl BmiHistory {
    pub fn new(path: impl Into<PathBuf>, max_entries: usize) -> Self {
        Self {
            path: path.into(),
            max_entries: max_entries.max(1),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All stored records, newest first. A missing file is an empty history.
    pub fn list(&self) -> Result<Vec<BmiRecord>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        self.read()
    }

    /// Prepend `record`, dropping the oldest entries beyond the cap.
    pub fn add(&self, record: BmiRecord) -> Result<Vec<BmiRecord>> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut records = self.read()?;
        records.insert(0, record);
        records.truncate(self.max_entries);
        self.write(&records)?;
        debug!(path = %self.path.display(), entries = records.len(), "bmi history updated");
        Ok(records)
    }

    pub fn clear(&self) -> Result<()> {
        let _guard = self.lock.lock().unwrap_or_else(|e| e.into_inner());
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("removing `{}`", self.path.display())),
        }
    }

    fn read(&self) -> Result<Vec<BmiRecord>> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e).with_context(|| format!("reading `{}`", self.path.display()))
            }
        };
        serde_json::from_slice(&data)
            .with_context(|| format!("history file `{}` is corrupt", self.path.display()))
    }

    fn write(&self, records: &[BmiRecord]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory `{}`", parent.display()))?;
        }
        let tmp_path = self.path.with_extension("json.tmp");
        let file = File::create(&tmp_path)
            .with_context(|| format!("could not create temporary file `{}`", tmp_path.display()))?;
        let mut writer = BufWriter::new(file);
        serde_json::to_writer_pretty(&mut writer, records)
            .with_context(|| format!("writing `{}`", tmp_path.display()))?;
        writer
            .flush()
            .with_context(|| format!("flushing `{}`", tmp_path.display()))?;
        writer
            .get_ref()
            .sync_all()
            .with_context(|| format!("syncing `{}`", tmp_path.display()))?;
        drop(writer);
        fs::rename(&tmp_path, &self.path).with_context(|| {
            format!(
                "failed to rename `{}` to `{}`",
                tmp_path.display(),
                self.path.display()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::calculators::bmi;
    use tempfile::tempdir;

    fn record(weight: f64) -> BmiRecord {
        let result = bmi(weight, 170.0, Units::Metric).unwrap();
        BmiRecord::new(weight, 170.0, Units::Metric, result)
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = tempdir().unwrap();
        let history = BmiHistory::new(dir.path().join("bmi.json"), 5);
        assert!(history.list().unwrap().is_empty());
        history.clear().unwrap();
    }

    #[test]
    fn newest_first_and_capped() {
        let dir = tempdir().unwrap();
        let history = BmiHistory::new(dir.path().join("nested/bmi.json"), 3);
        for w in [60.0, 65.0, 70.0, 75.0] {
            history.add(record(w)).unwrap();
        }
        let list = history.list().unwrap();
        let weights: Vec<f64> = list.iter().map(|r| r.weight).collect();
        assert_eq!(weights, vec![75.0, 70.0, 65.0]);
        assert_eq!(list[1].bmi, 24.2);

        history.clear().unwrap();
        assert!(history.list().unwrap().is_empty());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("bmi.json");
        fs::write(&path, b"{not json").unwrap();
        let history = BmiHistory::new(&path, 5);
        assert!(history.list().is_err());
        assert!(history.add(record(70.0)).is_err());
    }

    #[test]
    fn saved_file_is_complete_json() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("bmi.json");
        let history = BmiHistory::new(&path, DEFAULT_MAX_ENTRIES);
        for i in 0..DEFAULT_MAX_ENTRIES {
            history.add(record(50.0 + i as f64))?;
        }

        let on_disk: Vec<BmiRecord> = serde_json::from_slice(&fs::read(&path)?)?;
        assert_eq!(on_disk.len(), DEFAULT_MAX_ENTRIES);
        assert_eq!(on_disk, history.list()?);
        assert!(!path.with_extension("json.tmp").exists());
        Ok(())
    }
}
