use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Local, NaiveDate, Utc};
use rusqlite::types::Type;
use rusqlite::{Connection, params};
use uuid::Uuid;

use crate::models::{MealIntake, Recipe};
use crate::profile::{ActivityLevel, Gender, Goal, UserProfile};
use crate::store::IntakeStore;

const PROFILE_WEIGHT: &str = "profile.weight_kg";
const PROFILE_HEIGHT: &str = "profile.height_cm";
const PROFILE_AGE: &str = "profile.age_years";
const PROFILE_GENDER: &str = "profile.gender";
const PROFILE_ACTIVITY: &str = "profile.activity_level";
const PROFILE_GOAL: &str = "profile.goal";
const BROWSE_OFFSET: &str = "catalog.browse_offset";

pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS recipes (
                    id INTEGER PRIMARY KEY,
                    title TEXT NOT NULL,
                    calories REAL NOT NULL,
                    protein REAL NOT NULL,
                    fat REAL NOT NULL,
                    carbs REAL NOT NULL,
                    cached_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS meal_intakes (
                    id TEXT PRIMARY KEY,
                    meal_type TEXT NOT NULL,
                    date TEXT NOT NULL,
                    day TEXT NOT NULL,
                    recipe_ids TEXT NOT NULL DEFAULT '[]',
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_meal_intakes_day ON meal_intakes(day);

                CREATE TABLE IF NOT EXISTS user_settings (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Recipe cache ---

    /// Store recipes that are not cached yet. Already-cached ids are left
    /// untouched. Returns how many rows were added.
    pub fn cache_recipes<'a, I>(&self, recipes: I) -> Result<usize>
    where
        I: IntoIterator<Item = &'a Recipe>,
    {
        let now = Local::now().to_rfc3339();
        let mut added = 0;
        for r in recipes {
            added += self.conn.execute(
                "INSERT OR IGNORE INTO recipes (id, title, calories, protein, fat, carbs, cached_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![r.id, r.title, r.calories, r.protein, r.fat, r.carbs, now],
            )?;
        }
        Ok(added)
    }

    pub fn load_cached_recipes(&self) -> Result<Vec<Recipe>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, title, calories, protein, fat, carbs FROM recipes ORDER BY id",
        )?;
        let recipes = stmt
            .query_map([], Self::recipe_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(recipes)
    }

    fn recipe_from_row(row: &rusqlite::Row) -> rusqlite::Result<Recipe> {
        Ok(Recipe {
            id: row.get(0)?,
            title: row.get(1)?,
            calories: row.get(2)?,
            protein: row.get(3)?,
            fat: row.get(4)?,
            carbs: row.get(5)?,
        })
    }

    // --- Meal intakes ---

    pub fn get_intake(&self, id: Uuid) -> Result<MealIntake> {
        self.conn
            .query_row(
                "SELECT id, meal_type, date, recipe_ids FROM meal_intakes WHERE id = ?1",
                params![id.to_string()],
                Self::intake_from_row,
            )
            .context("Meal intake not found")
    }

    fn write_recipe_ids(&self, intake_id: Uuid, ids: &[i64]) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "UPDATE meal_intakes SET recipe_ids = ?1, updated_at = ?2 WHERE id = ?3",
            params![serde_json::to_string(ids)?, now, intake_id.to_string()],
        )?;
        Ok(())
    }

    fn intake_from_row(row: &rusqlite::Row) -> rusqlite::Result<MealIntake> {
        let id_str: String = row.get(0)?;
        let id = Uuid::parse_str(&id_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
        let date_str: String = row.get(2)?;
        let date = DateTime::parse_from_rfc3339(&date_str)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(e)))?
            .with_timezone(&Utc);
        let ids_json: String = row.get(3)?;
        let recipe_ids: Vec<i64> = serde_json::from_str(&ids_json)
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(3, Type::Text, Box::new(e)))?;
        Ok(MealIntake {
            id,
            meal_type: row.get(1)?,
            date,
            recipe_ids,
        })
    }

    // --- User Settings ---

    pub fn set_setting(&self, key: &str, value: &str) -> Result<()> {
        let now = Local::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO user_settings (key, value, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, now],
        )?;
        Ok(())
    }

    pub fn get_setting(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM user_settings WHERE key = ?1")?;
        let mut rows = stmt.query(params![key])?;
        if let Some(row) = rows.next()? {
            Ok(Some(row.get(0)?))
        } else {
            Ok(None)
        }
    }

    pub fn delete_setting(&self, key: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM user_settings WHERE key = ?1", params![key])?;
        Ok(rows > 0)
    }

    fn put_optional_setting(&self, key: &str, value: Option<String>) -> Result<()> {
        match value {
            Some(v) => self.set_setting(key, &v),
            None => self.delete_setting(key).map(|_| ()),
        }
    }

    // --- Profile ---

    /// Unparseable numeric values are treated as missing.
    pub fn load_profile(&self) -> Result<UserProfile> {
        Ok(UserProfile {
            weight_kg: self
                .get_setting(PROFILE_WEIGHT)?
                .and_then(|v| v.parse().ok()),
            height_cm: self
                .get_setting(PROFILE_HEIGHT)?
                .and_then(|v| v.parse().ok()),
            age_years: self.get_setting(PROFILE_AGE)?.and_then(|v| v.parse().ok()),
            gender: self.get_setting(PROFILE_GENDER)?.map(|v| Gender::parse(&v)),
            activity_level: self
                .get_setting(PROFILE_ACTIVITY)?
                .map(|v| ActivityLevel::parse(&v)),
            goal: self.get_setting(PROFILE_GOAL)?.map(|v| Goal::parse(&v)),
        })
    }

    pub fn save_profile(&self, profile: &UserProfile) -> Result<()> {
        self.put_optional_setting(PROFILE_WEIGHT, profile.weight_kg.map(|v| v.to_string()))?;
        self.put_optional_setting(PROFILE_HEIGHT, profile.height_cm.map(|v| v.to_string()))?;
        self.put_optional_setting(PROFILE_AGE, profile.age_years.map(|v| v.to_string()))?;
        self.put_optional_setting(
            PROFILE_GENDER,
            profile.gender.map(|g| g.as_str().to_string()),
        )?;
        self.put_optional_setting(
            PROFILE_ACTIVITY,
            profile.activity_level.map(|a| a.as_str().to_string()),
        )?;
        self.put_optional_setting(PROFILE_GOAL, profile.goal.map(|g| g.as_str().to_string()))?;
        Ok(())
    }

    // --- Catalog browsing ---

    /// Offset of the next catalog page to fetch. Missing or unparseable
    /// values start from the beginning.
    pub fn browse_offset(&self) -> Result<u32> {
        Ok(self
            .get_setting(BROWSE_OFFSET)?
            .and_then(|v| v.parse().ok())
            .unwrap_or(0))
    }

    pub fn set_browse_offset(&self, offset: u32) -> Result<()> {
        self.set_setting(BROWSE_OFFSET, &offset.to_string())
    }
}

impl IntakeStore for Database {
    fn load_intakes(&self) -> Result<Vec<MealIntake>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, meal_type, date, recipe_ids FROM meal_intakes ORDER BY date, created_at",
        )?;
        let intakes = stmt
            .query_map([], Self::intake_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(intakes)
    }

    fn load_intakes_for_date(&self, date: NaiveDate) -> Result<Vec<MealIntake>> {
        let day = date.format("%Y-%m-%d").to_string();
        let mut stmt = self.conn.prepare(
            "SELECT id, meal_type, date, recipe_ids FROM meal_intakes
             WHERE day = ?1
             ORDER BY date, created_at",
        )?;
        let intakes = stmt
            .query_map(params![day], Self::intake_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(intakes)
    }

    fn insert_intake(
        &self,
        meal_type: &str,
        date: DateTime<Utc>,
        recipe_ids: &[i64],
    ) -> Result<MealIntake> {
        let now = Local::now().to_rfc3339();
        let id = Uuid::new_v4();
        let day = date
            .with_timezone(&Local)
            .date_naive()
            .format("%Y-%m-%d")
            .to_string();

        let mut unique: Vec<i64> = Vec::with_capacity(recipe_ids.len());
        for rid in recipe_ids {
            if !unique.contains(rid) {
                unique.push(*rid);
            }
        }

        self.conn.execute(
            "INSERT INTO meal_intakes (id, meal_type, date, day, recipe_ids, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                id.to_string(),
                meal_type,
                date.to_rfc3339(),
                day,
                serde_json::to_string(&unique)?,
                now,
                now,
            ],
        )?;
        self.get_intake(id)
    }

    fn append_recipe_id(&self, intake_id: Uuid, recipe_id: i64) -> Result<bool> {
        let mut intake = self.get_intake(intake_id)?;
        if intake.contains(recipe_id) {
            return Ok(false);
        }
        intake.recipe_ids.push(recipe_id);
        self.write_recipe_ids(intake_id, &intake.recipe_ids)?;
        Ok(true)
    }

    fn remove_recipe_id(&self, intake_id: Uuid, recipe_id: i64) -> Result<bool> {
        let mut intake = self.get_intake(intake_id)?;
        let before = intake.recipe_ids.len();
        intake.recipe_ids.retain(|id| *id != recipe_id);
        if intake.recipe_ids.len() == before {
            return Ok(false);
        }
        self.write_recipe_ids(intake_id, &intake.recipe_ids)?;
        Ok(true)
    }
}
