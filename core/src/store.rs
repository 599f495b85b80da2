//! Persistence seams consumed by the aggregators.
//!
//! [`crate::db::Database`] backs [`IntakeStore`]; [`crate::sleep_store`] and
//! [`crate::alarm_store`] have the file and memory implementations of the
//! others.

use anyhow::Result;
use chrono::{DateTime, NaiveDate, Utc};
use uuid::Uuid;

use crate::models::{Alarm, MealIntake, SleepRecord};

pub trait IntakeStore {
    /// Every intake ever recorded.
    fn load_intakes(&self) -> Result<Vec<MealIntake>>;

    /// Intakes whose date falls on `date` in local time.
    fn load_intakes_for_date(&self, date: NaiveDate) -> Result<Vec<MealIntake>>;

    fn insert_intake(
        &self,
        meal_type: &str,
        date: DateTime<Utc>,
        recipe_ids: &[i64],
    ) -> Result<MealIntake>;

    /// Append `recipe_id` unless already present. Returns `false` when the
    /// intake already held it.
    fn append_recipe_id(&self, intake_id: Uuid, recipe_id: i64) -> Result<bool>;

    /// Returns `false` when the intake did not hold `recipe_id`.
    fn remove_recipe_id(&self, intake_id: Uuid, recipe_id: i64) -> Result<bool>;
}

pub trait SleepStore {
    fn load_sleep_records(&self) -> Result<Vec<SleepRecord>>;

    /// Replace the record stored under `id`. Returns `false` when no such
    /// record exists.
    fn replace_sleep_record(&self, id: Uuid, record: &SleepRecord) -> Result<bool>;

    fn clear_sleep_records(&self) -> Result<()>;

    /// Start time of a session that has begun but not yet ended.
    fn load_active_session(&self) -> Result<Option<DateTime<Utc>>>;

    fn save_active_session(&self, started_at: Option<DateTime<Utc>>) -> Result<()>;

    /// Append `record` and clear the active session in one write. On error
    /// neither change is kept.
    fn finish_session(&self, record: &SleepRecord) -> Result<()>;
}

pub trait AlarmStore {
    fn load_alarms(&self) -> Result<Vec<Alarm>>;

    /// Replace the stored list with `alarms`.
    fn save_alarms(&self, alarms: &[Alarm]) -> Result<()>;
}
