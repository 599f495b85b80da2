//! Wake-up alarm management. Ringing is up to whatever schedules
//! notifications; this keeps the list and answers when the next one is due.

use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveTime, Weekday};
use tracing::debug;
use uuid::Uuid;

use crate::clock::Clock;
use crate::models::{Alarm, normalize_weekdays};
use crate::store::AlarmStore;

pub struct AlarmManager<S> {
    store: S,
    clock: Arc<dyn Clock>,
    alarms: Vec<Alarm>,
}

impl<S: AlarmStore> AlarmManager<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Result<Self> {
        let alarms = store.load_alarms()?;
        Ok(Self {
            store,
            clock,
            alarms,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// All alarms ordered by time of day.
    pub fn alarms(&self) -> Vec<&Alarm> {
        let mut alarms: Vec<&Alarm> = self.alarms.iter().collect();
        alarms.sort_by_key(|a| a.time);
        alarms
    }

    pub fn alarm(&self, id: Uuid) -> Option<&Alarm> {
        self.alarms.iter().find(|a| a.id == id)
    }

    /// Persist `next` as the whole list, then adopt it.
    fn commit(&mut self, next: Vec<Alarm>) -> Result<()> {
        self.store.save_alarms(&next)?;
        self.alarms = next;
        Ok(())
    }

    fn position(&self, id: Uuid) -> Result<usize> {
        self.alarms
            .iter()
            .position(|a| a.id == id)
            .with_context(|| format!("Alarm not found: {id}"))
    }

    /// New alarms start enabled.
    pub fn add_alarm(
        &mut self,
        time: NaiveTime,
        description: &str,
        repeat_days: &[Weekday],
    ) -> Result<Alarm> {
        let alarm = Alarm::new(time, description, repeat_days);
        let mut next = self.alarms.clone();
        next.push(alarm.clone());
        self.commit(next)?;
        debug!(id = %alarm.id, time = %alarm.time, "alarm added");
        Ok(alarm)
    }

    /// Replace an alarm's settings, keeping its id. Editing an alarm turns it
    /// back on.
    pub fn update_alarm(
        &mut self,
        id: Uuid,
        time: NaiveTime,
        description: &str,
        repeat_days: &[Weekday],
    ) -> Result<Alarm> {
        let idx = self.position(id)?;
        let updated = Alarm {
            id,
            time,
            enabled: true,
            description: description.trim().to_string(),
            repeat_days: normalize_weekdays(repeat_days),
        };
        let mut next = self.alarms.clone();
        next[idx] = updated.clone();
        self.commit(next)?;
        debug!(%id, time = %updated.time, "alarm updated");
        Ok(updated)
    }

    pub fn set_enabled(&mut self, id: Uuid, enabled: bool) -> Result<Alarm> {
        let idx = self.position(id)?;
        let mut next = self.alarms.clone();
        next[idx].enabled = enabled;
        let alarm = next[idx].clone();
        self.commit(next)?;
        debug!(%id, enabled, "alarm switched");
        Ok(alarm)
    }

    pub fn toggle(&mut self, id: Uuid) -> Result<Alarm> {
        let enabled = self.alarm(id).map(|a| a.enabled);
        let enabled = enabled.with_context(|| format!("Alarm not found: {id}"))?;
        self.set_enabled(id, !enabled)
    }

    /// Returns `false` when no alarm had that id.
    pub fn delete_alarm(&mut self, id: Uuid) -> Result<bool> {
        let Ok(idx) = self.position(id) else {
            return Ok(false);
        };
        let mut next = self.alarms.clone();
        next.remove(idx);
        self.commit(next)?;
        debug!(%id, "alarm deleted");
        Ok(true)
    }

    /// Delete every alarm. Returns how many there were.
    pub fn clear(&mut self) -> Result<usize> {
        let count = self.alarms.len();
        self.commit(Vec::new())?;
        Ok(count)
    }

    /// The enabled alarm that rings soonest, with the instant it rings.
    pub fn next_alarm(&self) -> Option<(&Alarm, DateTime<Local>)> {
        let now = self.clock.now();
        self.alarms
            .iter()
            .filter_map(|a| a.next_ring(now).map(|at| (a, at)))
            .min_by_key(|(_, at)| *at)
    }
}
