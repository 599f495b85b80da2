use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::json_file;
use crate::models::SleepRecord;
use crate::store::SleepStore;

/// On-disk shape of the sleep log.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SleepLog {
    #[serde(default)]
    pub records: Vec<SleepRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_since: Option<DateTime<Utc>>,
}

impl SleepLog {
    fn finish(&mut self, record: &SleepRecord) {
        self.records.push(record.clone());
        self.active_since = None;
    }

    fn replace(&mut self, id: Uuid, record: &SleepRecord) -> bool {
        match self.records.iter_mut().find(|r| r.id == id) {
            Some(slot) => {
                *slot = SleepRecord {
                    id,
                    ..record.clone()
                };
                true
            }
            None => false,
        }
    }
}

/// Sleep log kept as a single JSON document. Every write replaces the file
/// atomically.
pub struct JsonSleepStore {
    path: PathBuf,
}

impl JsonSleepStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A missing file reads as an empty log.
    fn read(&self) -> Result<SleepLog> {
        json_file::read_or_default(&self.path, "sleep log")
    }

    fn write(&self, log: &SleepLog) -> Result<()> {
        json_file::write_atomic(&self.path, log, "sleep log")
    }

    fn update<T>(&self, f: impl FnOnce(&mut SleepLog) -> T) -> Result<T> {
        let mut log = self.read()?;
        let out = f(&mut log);
        self.write(&log)?;
        Ok(out)
    }
}

impl SleepStore for JsonSleepStore {
    fn load_sleep_records(&self) -> Result<Vec<SleepRecord>> {
        Ok(self.read()?.records)
    }

    fn replace_sleep_record(&self, id: Uuid, record: &SleepRecord) -> Result<bool> {
        let mut log = self.read()?;
        if !log.replace(id, record) {
            return Ok(false);
        }
        self.write(&log)?;
        Ok(true)
    }

    fn clear_sleep_records(&self) -> Result<()> {
        self.update(|log| log.records.clear())
    }

    fn load_active_session(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.read()?.active_since)
    }

    fn save_active_session(&self, started_at: Option<DateTime<Utc>>) -> Result<()> {
        self.update(|log| log.active_since = started_at)
    }

    fn finish_session(&self, record: &SleepRecord) -> Result<()> {
        self.update(|log| log.finish(record))
    }
}

/// Sleep log held in memory only.
#[derive(Default)]
pub struct MemorySleepStore {
    log: Mutex<SleepLog>,
}

impl MemorySleepStore {
    #[must_use]
    pub fn with_records(records: Vec<SleepRecord>) -> Self {
        Self {
            log: Mutex::new(SleepLog {
                records,
                active_since: None,
            }),
        }
    }

    fn with_log<T>(&self, f: impl FnOnce(&mut SleepLog) -> T) -> T {
        let mut log = self
            .log
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        f(&mut log)
    }
}

impl SleepStore for MemorySleepStore {
    fn load_sleep_records(&self) -> Result<Vec<SleepRecord>> {
        Ok(self.with_log(|log| log.records.clone()))
    }

    fn replace_sleep_record(&self, id: Uuid, record: &SleepRecord) -> Result<bool> {
        Ok(self.with_log(|log| log.replace(id, record)))
    }

    fn clear_sleep_records(&self) -> Result<()> {
        self.with_log(|log| log.records.clear());
        Ok(())
    }

    fn load_active_session(&self) -> Result<Option<DateTime<Utc>>> {
        Ok(self.with_log(|log| log.active_since))
    }

    fn save_active_session(&self, started_at: Option<DateTime<Utc>>) -> Result<()> {
        self.with_log(|log| log.active_since = started_at);
        Ok(())
    }

    fn finish_session(&self, record: &SleepRecord) -> Result<()> {
        self.with_log(|log| log.finish(record));
        Ok(())
    }
}
