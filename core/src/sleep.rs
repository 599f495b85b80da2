//! Sleep session tracking and day-anchored sleep rollups.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDate, TimeDelta, Utc};
use tokio::sync::watch;
use tracing::debug;
use uuid::Uuid;

use crate::clock::{Clock, start_of_day};
use crate::models::{DailySleep, SleepRecord, duration_hours};
use crate::store::SleepStore;

const WEEK_DAYS: u32 = 7;
const MONTH_DAYS: u32 = 30;

pub struct SleepTracker<S> {
    store: S,
    clock: Arc<dyn Clock>,
    records: Vec<SleepRecord>,
    sleep_start: Option<DateTime<Utc>>,
    changes: watch::Sender<u64>,
}

impl<S: SleepStore> SleepTracker<S> {
    /// Load the sleep history and any session left running by a previous
    /// process.
    pub fn new(store: S, clock: Arc<dyn Clock>) -> Result<Self> {
        let records = store.load_sleep_records()?;
        let sleep_start = store.load_active_session()?;
        let (changes, _) = watch::channel(0);
        Ok(Self {
            store,
            clock,
            records,
            sleep_start,
            changes,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.changes.borrow()
    }

    fn notify(&self) {
        self.changes.send_modify(|rev| *rev += 1);
    }

    // --- Session ---

    pub fn is_sleeping(&self) -> bool {
        self.sleep_start.is_some()
    }

    pub fn sleep_start_time(&self) -> Option<DateTime<Utc>> {
        self.sleep_start
    }

    /// Begin a session at the current instant. Returns `false` without
    /// touching anything when a session is already running.
    pub fn start_sleep(&mut self) -> Result<bool> {
        if self.sleep_start.is_some() {
            return Ok(false);
        }
        let now = self.clock.now().with_timezone(&Utc);
        self.store.save_active_session(Some(now))?;
        self.sleep_start = Some(now);
        debug!(started_at = %now, "sleep started");
        self.notify();
        Ok(true)
    }

    /// End the running session and record it. Returns `None` when no session
    /// was running.
    pub fn stop_sleep(&mut self) -> Result<Option<SleepRecord>> {
        let Some(start) = self.sleep_start else {
            return Ok(None);
        };
        let now = self.clock.now().with_timezone(&Utc);
        let record = SleepRecord::new(start, Some(now));
        self.store.finish_session(&record)?;

        self.records.push(record.clone());
        self.sleep_start = None;
        debug!(id = %record.id, hours = ?record.hours(), "sleep stopped");
        self.notify();
        Ok(Some(record))
    }

    // --- History ---

    /// All records, most recent start first.
    pub fn records(&self) -> Vec<&SleepRecord> {
        let mut records: Vec<&SleepRecord> = self.records.iter().collect();
        records.sort_by(|a, b| b.start_time.cmp(&a.start_time));
        records
    }

    pub fn record(&self, id: Uuid) -> Option<&SleepRecord> {
        self.records.iter().find(|r| r.id == id)
    }

    /// Replace a record's interval, keeping its id.
    pub fn edit_record(
        &mut self,
        id: Uuid,
        start_time: DateTime<Utc>,
        end_time: Option<DateTime<Utc>>,
    ) -> Result<SleepRecord> {
        if let Some(end) = end_time {
            if end < start_time {
                bail!("Sleep end {end} is before its start {start_time}");
            }
        }
        let edited = SleepRecord {
            id,
            start_time,
            end_time,
        };
        let slot = self
            .records
            .iter_mut()
            .find(|r| r.id == id)
            .with_context(|| format!("Sleep record not found: {id}"))?;
        if !self.store.replace_sleep_record(id, &edited)? {
            bail!("Sleep record not found in store: {id}");
        }
        *slot = edited.clone();
        self.notify();
        Ok(edited)
    }

    /// Drop every finished record. A running session is kept.
    pub fn clear_history(&mut self) -> Result<()> {
        self.store.clear_sleep_records()?;
        self.records.clear();
        self.notify();
        Ok(())
    }

    // --- Rollups ---

    /// Sleep of every record that ended between the start of the day
    /// `days - 1` days ago and now. Zero days is an empty window; a window
    /// reaching back past the oldest record covers all history.
    pub fn total_sleep(&self, days: u32) -> TimeDelta {
        if days == 0 {
            return TimeDelta::zero();
        }
        let now = self.clock.now();
        let from = TimeDelta::try_days(i64::from(days - 1))
            .and_then(|back| self.clock.today().checked_sub_signed(back))
            .filter(|first_day| self.oldest_end_day().is_some_and(|oldest| *first_day > oldest))
            .map(start_of_day);
        self.ended_within(from, now)
    }

    fn oldest_end_day(&self) -> Option<NaiveDate> {
        self.records
            .iter()
            .filter_map(|r| r.end_time)
            .min()
            .map(|end| end.with_timezone(&Local).date_naive())
    }

    fn ended_within(&self, from: Option<DateTime<Local>>, to: DateTime<Local>) -> TimeDelta {
        self.records
            .iter()
            .filter(|r| {
                r.end_time
                    .is_some_and(|end| from.is_none_or(|from| end >= from) && end <= to)
            })
            .filter_map(SleepRecord::duration)
            .fold(TimeDelta::zero(), |acc, d| acc + d)
    }

    pub fn daily_sleep(&self) -> TimeDelta {
        self.total_sleep(1)
    }

    pub fn weekly_sleep(&self) -> TimeDelta {
        self.total_sleep(WEEK_DAYS)
    }

    pub fn monthly_sleep(&self) -> TimeDelta {
        self.total_sleep(MONTH_DAYS)
    }

    /// Mean hours over all history, counting only records with a duration.
    #[allow(clippy::cast_precision_loss)]
    pub fn average_sleep(&self) -> f64 {
        let durations: Vec<TimeDelta> = self
            .records
            .iter()
            .filter_map(SleepRecord::duration)
            .collect();
        if durations.is_empty() {
            return 0.0;
        }
        let total = durations.iter().fold(TimeDelta::zero(), |acc, d| acc + *d);
        duration_hours(total) / durations.len() as f64
    }

    /// Longest single record in hours, 0 without finished records.
    pub fn best_sleep(&self) -> f64 {
        self.records
            .iter()
            .filter_map(SleepRecord::hours)
            .reduce(f64::max)
            .unwrap_or(0.0)
    }

    /// Shortest single record in hours, 0 without finished records.
    pub fn worst_sleep(&self) -> f64 {
        self.records
            .iter()
            .filter_map(SleepRecord::hours)
            .reduce(f64::min)
            .unwrap_or(0.0)
    }

    /// Hours slept per calendar day for the seven days ending today, oldest
    /// first. A record counts on the day its end falls on.
    pub fn last_week_sleep(&self) -> Vec<DailySleep> {
        let today = self.clock.today();
        (0..i64::from(WEEK_DAYS))
            .rev()
            .map(|offset| {
                let date = today - TimeDelta::days(offset);
                let hours = self
                    .records
                    .iter()
                    .filter(|r| {
                        r.end_time
                            .is_some_and(|end| end.with_timezone(&Local).date_naive() == date)
                    })
                    .filter_map(SleepRecord::hours)
                    .sum();
                DailySleep { date, hours }
            })
            .collect()
    }
}
