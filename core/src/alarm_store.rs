use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;

use crate::json_file;
use crate::models::Alarm;
use crate::store::AlarmStore;

/// Alarms kept as a JSON array. Every save replaces the file atomically.
pub struct JsonAlarmStore {
    path: PathBuf,
}

impl JsonAlarmStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl AlarmStore for JsonAlarmStore {
    fn load_alarms(&self) -> Result<Vec<Alarm>> {
        json_file::read_or_default(&self.path, "alarm list")
    }

    fn save_alarms(&self, alarms: &[Alarm]) -> Result<()> {
        json_file::write_atomic(&self.path, &alarms, "alarm list")
    }
}

#[derive(Default)]
pub struct MemoryAlarmStore {
    alarms: Mutex<Vec<Alarm>>,
}

impl AlarmStore for MemoryAlarmStore {
    fn load_alarms(&self) -> Result<Vec<Alarm>> {
        Ok(self
            .alarms
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .clone())
    }

    fn save_alarms(&self, alarms: &[Alarm]) -> Result<()> {
        *self
            .alarms
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner) = alarms.to_vec();
        Ok(())
    }
}
