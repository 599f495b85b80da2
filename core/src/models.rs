use std::collections::HashSet;
use std::ops::{Add, AddAssign};

use chrono::{Datelike, DateTime, Days, Local, NaiveDate, NaiveTime, TimeDelta, Utc, Weekday};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recipe {
    pub id: i64,
    pub title: String,
    pub calories: f64,
    pub protein: f64,
    pub fat: f64,
    pub carbs: f64,
}

impl Recipe {
    #[must_use]
    pub fn macros(&self) -> MacroTotals {
        MacroTotals {
            calories: self.calories,
            protein: self.protein,
            carbs: self.carbs,
            fat: self.fat,
        }
    }
}

/// A meal slot for one day, holding references into the recipe catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MealIntake {
    pub id: Uuid,
    pub meal_type: String,
    pub date: DateTime<Utc>,
    /// Never contains duplicates.
    pub recipe_ids: Vec<i64>,
}

impl MealIntake {
    #[must_use]
    pub fn contains(&self, recipe_id: i64) -> bool {
        self.recipe_ids.contains(&recipe_id)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SleepRecord {
    pub id: Uuid,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,
}

impl SleepRecord {
    #[must_use]
    pub fn new(start_time: DateTime<Utc>, end_time: Option<DateTime<Utc>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            start_time,
            end_time,
        }
    }

    /// Only defined for finished sessions whose end is not before their start.
    #[must_use]
    pub fn duration(&self) -> Option<TimeDelta> {
        let end = self.end_time?;
        (end >= self.start_time).then(|| end - self.start_time)
    }

    #[must_use]
    pub fn hours(&self) -> Option<f64> {
        self.duration().map(duration_hours)
    }
}

/// A wake-up alarm at a local wall-clock time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Alarm {
    pub id: Uuid,
    pub time: NaiveTime,
    pub enabled: bool,
    #[serde(default)]
    pub description: String,
    /// Monday first, no duplicates. Empty means the alarm rings once.
    #[serde(default)]
    pub repeat_days: Vec<Weekday>,
}

impl Alarm {
    #[must_use]
    pub fn new(time: NaiveTime, description: &str, repeat_days: &[Weekday]) -> Self {
        Self {
            id: Uuid::new_v4(),
            time,
            enabled: true,
            description: description.trim().to_string(),
            repeat_days: normalize_weekdays(repeat_days),
        }
    }

    #[must_use]
    pub fn rings_on(&self, day: Weekday) -> bool {
        self.repeat_days.is_empty() || self.repeat_days.contains(&day)
    }

    /// First instant strictly after `after` at which the alarm would ring.
    /// `None` when disabled.
    #[must_use]
    pub fn next_ring(&self, after: DateTime<Local>) -> Option<DateTime<Local>> {
        if !self.enabled {
            return None;
        }
        (0..=7)
            .filter_map(|offset| after.date_naive().checked_add_days(Days::new(offset)))
            .filter(|date| self.rings_on(date.weekday()))
            .filter_map(|date| date.and_time(self.time).and_local_timezone(Local).earliest())
            .find(|at| *at > after)
    }
}

/// Sort Monday first and drop repeats.
#[must_use]
pub fn normalize_weekdays(days: &[Weekday]) -> Vec<Weekday> {
    let mut days = days.to_vec();
    days.sort_by_key(Weekday::num_days_from_monday);
    days.dedup();
    days
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailyCalories {
    pub date: NaiveDate,
    pub calories: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DailySleep {
    pub date: NaiveDate,
    pub hours: f64,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct MacroTotals {
    pub calories: f64,
    pub protein: f64,
    pub carbs: f64,
    pub fat: f64,
}

impl Add for MacroTotals {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            calories: self.calories + rhs.calories,
            protein: self.protein + rhs.protein,
            carbs: self.carbs + rhs.carbs,
            fat: self.fat + rhs.fat,
        }
    }
}

impl AddAssign for MacroTotals {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl std::iter::Sum for MacroTotals {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

/// Which macronutrients are still short of their daily floor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NutrientDeficits {
    pub protein: bool,
    pub carbs: bool,
    pub fat: bool,
}

impl NutrientDeficits {
    #[must_use]
    pub fn any(&self) -> bool {
        self.protein || self.carbs || self.fat
    }
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn duration_hours(d: TimeDelta) -> f64 {
    d.num_milliseconds() as f64 / 3_600_000.0
}

/// Keep the first occurrence of every recipe id, preserving order.
pub fn dedup_recipes(recipes: &mut Vec<Recipe>) {
    let mut seen = HashSet::new();
    recipes.retain(|r| seen.insert(r.id));
}

/// Canonical meal slots, in the order they are shown and seeded each day.
pub const MEAL_TYPES: &[&str] = &["Breakfast", "Lunch", "Snack", "Dinner"];

/// Position of a meal type in [`MEAL_TYPES`]; unknown types sort last.
#[must_use]
pub fn meal_type_order(meal: &str) -> usize {
    MEAL_TYPES
        .iter()
        .position(|m| m.eq_ignore_ascii_case(meal))
        .unwrap_or(MEAL_TYPES.len())
}

pub fn validate_meal_type(meal: &str) -> anyhow::Result<String> {
    MEAL_TYPES
        .iter()
        .find(|m| m.eq_ignore_ascii_case(meal.trim()))
        .map(|m| (*m).to_string())
        .ok_or_else(|| {
            anyhow::anyhow!(
                "Invalid meal type '{meal}'. Must be one of: {}",
                MEAL_TYPES.join(", ")
            )
        })
}
