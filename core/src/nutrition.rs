//! Nutrition aggregation: daily and weekly rollups over meal intakes, recipe
//! search, and the debounced recommendation refresh.

use std::collections::hash_map::Entry;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Local, NaiveDate, TimeDelta, Utc};
use futures_util::future::join_all;
use serde::Serialize;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::clock::{Clock, start_of_day};
use crate::models::{
    DailyCalories, MEAL_TYPES, MacroTotals, MealIntake, NutrientDeficits, Recipe, dedup_recipes,
    meal_type_order,
};
use crate::profile::{Goal, UserProfile};
use crate::source::RecipeSource;
use crate::store::IntakeStore;

/// Minimum time between two recommendation refreshes.
pub const RECOMMENDATION_REFRESH_INTERVAL_SECS: i64 = 60;

/// Daily protein below this asks for protein-rich recommendations.
pub const PROTEIN_FLOOR_G: f64 = 100.0;
/// Daily carbs below this asks for carb-rich recommendations.
pub const CARBS_FLOOR_G: f64 = 200.0;
/// Daily fat below this asks for fat-rich recommendations.
pub const FAT_FLOOR_G: f64 = 50.0;

/// Recipes requested per catalog page.
pub const CATALOG_PAGE_SIZE: u32 = 100;
/// Catalog browsing stops once the offset reaches this many recipes.
pub const CATALOG_BROWSE_LIMIT: u32 = 500;

/// How many of today's recipes seed the similar-recipe lookup.
pub const MAX_SIMILAR_SEEDS: usize = 5;

const WEEK_DAYS: i64 = 7;

/// Result of one remote fetch, as merged into the aggregator.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum FetchOutcome {
    /// No request was made; the result list was emptied.
    Cleared,
    Updated { count: usize },
    /// No request was made; catalog browsing already reached its limit.
    Exhausted,
    Failed { error: String },
}

impl FetchOutcome {
    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SimilarOutcome {
    pub recipe_id: i64,
    pub outcome: FetchOutcome,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshReport {
    pub goal_based: FetchOutcome,
    pub nutrition_balance: FetchOutcome,
    pub similar: Vec<SimilarOutcome>,
}

/// In-memory view over the recipe catalog and meal intakes.
///
/// Every rollup is recomputed from the current snapshot on each call. State
/// changes bump a revision counter observable through [`Self::subscribe`].
pub struct NutritionAggregator<S> {
    store: S,
    clock: Arc<dyn Clock>,
    profile: UserProfile,
    all_recipes: HashMap<i64, Recipe>,
    all_meal_intakes: Vec<MealIntake>,
    searched_recipes: Vec<Recipe>,
    browse_offset: u32,
    similar_recipes: Vec<Recipe>,
    goal_based_recommendations: Vec<Recipe>,
    nutrition_balance_recommendations: Vec<Recipe>,
    last_recommendation_update: Option<DateTime<Local>>,
    changes: watch::Sender<u64>,
}

impl<S: IntakeStore> NutritionAggregator<S> {
    pub fn new(store: S, clock: Arc<dyn Clock>, profile: UserProfile) -> Result<Self> {
        let all_meal_intakes = store.load_intakes()?;
        let (changes, _) = watch::channel(0);
        Ok(Self {
            store,
            clock,
            profile,
            all_recipes: HashMap::new(),
            all_meal_intakes,
            searched_recipes: Vec::new(),
            browse_offset: 0,
            similar_recipes: Vec::new(),
            goal_based_recommendations: Vec::new(),
            nutrition_balance_recommendations: Vec::new(),
            last_recommendation_update: None,
            changes,
        })
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    /// Create any canonical meal slot missing for today, dated at the start
    /// of the day. Returns how many were created.
    pub fn ensure_today_intakes(&mut self) -> Result<usize> {
        let today = self.clock.today();
        let missing: Vec<&str> = MEAL_TYPES
            .iter()
            .copied()
            .filter(|meal| {
                !self
                    .intakes_on(today)
                    .any(|i| i.meal_type.eq_ignore_ascii_case(meal))
            })
            .collect();
        if missing.is_empty() {
            return Ok(0);
        }

        let day_start = start_of_day(today).with_timezone(&Utc);
        for meal in &missing {
            let intake = self.store.insert_intake(meal, day_start, &[])?;
            self.all_meal_intakes.push(intake);
        }
        debug!(count = missing.len(), %today, "created meal intakes");
        self.notify();
        Ok(missing.len())
    }

    // --- Change notification ---

    /// Receiver that observes a revision number bumped on every state change.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    pub fn revision(&self) -> u64 {
        *self.changes.borrow()
    }

    fn notify(&self) {
        self.changes.send_modify(|rev| *rev += 1);
    }

    // --- Profile ---

    pub fn profile(&self) -> &UserProfile {
        &self.profile
    }

    pub fn set_profile(&mut self, profile: UserProfile) {
        self.profile = profile;
        self.notify();
    }

    // --- Catalog ---

    /// Merge recipes into the catalog. Ids already present keep their
    /// existing record. Returns how many ids were new.
    pub fn extend_catalog<I>(&mut self, recipes: I) -> usize
    where
        I: IntoIterator<Item = Recipe>,
    {
        let mut added = 0;
        for recipe in recipes {
            if let Entry::Vacant(slot) = self.all_recipes.entry(recipe.id) {
                slot.insert(recipe);
                added += 1;
            }
        }
        if added > 0 {
            self.notify();
        }
        added
    }

    pub fn all_recipes(&self) -> &HashMap<i64, Recipe> {
        &self.all_recipes
    }

    pub fn recipe(&self, id: i64) -> Option<&Recipe> {
        self.all_recipes.get(&id)
    }

    // --- Intakes ---

    pub fn all_meal_intakes(&self) -> &[MealIntake] {
        &self.all_meal_intakes
    }

    pub fn intake(&self, id: Uuid) -> Option<&MealIntake> {
        self.all_meal_intakes.iter().find(|i| i.id == id)
    }

    fn intakes_on(&self, day: NaiveDate) -> impl Iterator<Item = &MealIntake> {
        self.all_meal_intakes
            .iter()
            .filter(move |i| i.date.with_timezone(&Local).date_naive() == day)
    }

    /// Today's intakes in canonical meal order.
    pub fn today_meal_intakes(&self) -> Vec<&MealIntake> {
        let mut today: Vec<&MealIntake> = self.intakes_on(self.clock.today()).collect();
        today.sort_by_key(|i| meal_type_order(&i.meal_type));
        today
    }

    pub fn today_intake(&self, meal_type: &str) -> Option<&MealIntake> {
        self.intakes_on(self.clock.today())
            .find(|i| i.meal_type.eq_ignore_ascii_case(meal_type))
    }

    /// Catalog recipes referenced by `intake`, in intake order. Ids the
    /// catalog has not seen yet are skipped.
    pub fn meal_intake_recipes(&self, intake: &MealIntake) -> Vec<&Recipe> {
        intake
            .recipe_ids
            .iter()
            .filter_map(|id| self.all_recipes.get(id))
            .collect()
    }

    fn intake_totals(&self, intake: &MealIntake) -> MacroTotals {
        self.meal_intake_recipes(intake)
            .into_iter()
            .map(Recipe::macros)
            .sum()
    }

    fn totals_on(&self, day: NaiveDate) -> MacroTotals {
        self.intakes_on(day).map(|i| self.intake_totals(i)).sum()
    }

    pub fn add_recipe_to_meal_intake(&mut self, recipe: &Recipe, intake_id: Uuid) -> Result<bool> {
        let appended = self.store.append_recipe_id(intake_id, recipe.id)?;
        match self.all_meal_intakes.iter_mut().find(|i| i.id == intake_id) {
            Some(local) => {
                if !local.contains(recipe.id) {
                    local.recipe_ids.push(recipe.id);
                }
            }
            None => self.all_meal_intakes = self.store.load_intakes()?,
        }
        self.extend_catalog([recipe.clone()]);
        if appended {
            debug!(recipe_id = recipe.id, %intake_id, "recipe added to intake");
            self.notify();
        }
        Ok(appended)
    }

    pub fn remove_recipe_from_meal_intake(&mut self, recipe_id: i64, intake_id: Uuid) -> Result<bool> {
        let removed = self.store.remove_recipe_id(intake_id, recipe_id)?;
        match self.all_meal_intakes.iter_mut().find(|i| i.id == intake_id) {
            Some(local) => local.recipe_ids.retain(|id| *id != recipe_id),
            None => self.all_meal_intakes = self.store.load_intakes()?,
        }
        if removed {
            debug!(recipe_id, %intake_id, "recipe removed from intake");
            self.notify();
        }
        Ok(removed)
    }

    // --- Daily rollups ---

    pub fn today_totals(&self) -> MacroTotals {
        self.totals_on(self.clock.today())
    }

    pub fn today_calories(&self) -> f64 {
        self.today_totals().calories
    }

    pub fn daily_protein(&self) -> f64 {
        self.today_totals().protein
    }

    pub fn daily_carbs(&self) -> f64 {
        self.today_totals().carbs
    }

    pub fn daily_fat(&self) -> f64 {
        self.today_totals().fat
    }

    pub fn target_calories(&self) -> f64 {
        self.profile.target_calories()
    }

    /// Share of the daily target eaten so far. The target is always positive,
    /// so the ratio is always finite.
    pub fn calories_ratio(&self) -> f64 {
        self.today_calories() / self.target_calories()
    }

    // --- Weekly rollups ---

    /// Calories for the seven calendar days ending today, oldest first.
    /// Days without intakes are present with zero calories.
    pub fn last_week_calories(&self) -> Vec<DailyCalories> {
        let today = self.clock.today();
        let mut week: Vec<DailyCalories> = (0..WEEK_DAYS)
            .map(|offset| {
                let date = today - TimeDelta::days(offset);
                DailyCalories {
                    date,
                    calories: self.totals_on(date).calories,
                }
            })
            .collect();
        week.sort_by_key(|d| d.date);
        week
    }

    /// Always divides by seven: empty days pull the average down.
    #[allow(clippy::cast_precision_loss)]
    pub fn average_calories(&self) -> f64 {
        let total: f64 = self.last_week_calories().iter().map(|d| d.calories).sum();
        total / WEEK_DAYS as f64
    }

    pub fn max_calories(&self) -> f64 {
        self.last_week_calories()
            .iter()
            .map(|d| d.calories)
            .fold(f64::NEG_INFINITY, f64::max)
    }

    pub fn min_calories(&self) -> f64 {
        self.last_week_calories()
            .iter()
            .map(|d| d.calories)
            .fold(f64::INFINITY, f64::min)
    }

    // --- Search ---

    pub fn searched_recipes(&self) -> &[Recipe] {
        &self.searched_recipes
    }

    /// Search the remote catalog. An empty query clears the results without
    /// a request. Found recipes replace the search results and are merged
    /// into the catalog; a failure empties the search results only.
    pub async fn search_recipes<P: RecipeSource>(&mut self, source: &P, query: &str) -> FetchOutcome {
        let query = query.trim();
        if query.is_empty() {
            self.searched_recipes.clear();
            self.notify();
            return FetchOutcome::Cleared;
        }

        match source.fetch_recipes_by_query(query).await {
            Ok(mut recipes) => {
                dedup_recipes(&mut recipes);
                let count = recipes.len();
                let added = self.extend_catalog(recipes.iter().cloned());
                debug!(query, count, added, "recipe search merged");
                self.searched_recipes = recipes;
                self.notify();
                FetchOutcome::Updated { count }
            }
            Err(e) => {
                let error = format!("{e:#}");
                warn!(query, %error, "recipe search failed");
                self.searched_recipes.clear();
                self.notify();
                FetchOutcome::Failed { error }
            }
        }
    }

    // --- Catalog browsing ---

    /// Offset of the next page [`Self::load_more_recipes`] will request.
    pub fn browse_offset(&self) -> u32 {
        self.browse_offset
    }

    /// Continue browsing from a previously saved offset.
    pub fn resume_browsing(&mut self, offset: u32) {
        self.browse_offset = offset.min(CATALOG_BROWSE_LIMIT);
    }

    pub fn can_load_more(&self) -> bool {
        self.browse_offset < CATALOG_BROWSE_LIMIT
    }

    /// Fetch the next catalog page and merge it into the catalog.
    ///
    /// The offset only advances on success, so a failed page is requested
    /// again next time. An empty page ends browsing.
    pub async fn load_more_recipes<P: RecipeSource>(&mut self, source: &P) -> FetchOutcome {
        if !self.can_load_more() {
            return FetchOutcome::Exhausted;
        }

        let offset = self.browse_offset;
        match source.fetch_recipe_page(offset, CATALOG_PAGE_SIZE).await {
            Ok(mut page) => {
                dedup_recipes(&mut page);
                let count = page.len();
                let added = self.extend_catalog(page);
                self.browse_offset = if count == 0 {
                    CATALOG_BROWSE_LIMIT
                } else {
                    offset.saturating_add(CATALOG_PAGE_SIZE).min(CATALOG_BROWSE_LIMIT)
                };
                debug!(offset, count, added, next = self.browse_offset, "catalog page merged");
                self.notify();
                FetchOutcome::Updated { count }
            }
            Err(e) => {
                let error = format!("{e:#}");
                warn!(offset, %error, "catalog page failed");
                FetchOutcome::Failed { error }
            }
        }
    }

    // --- Recommendations ---

    pub fn similar_recipes(&self) -> &[Recipe] {
        &self.similar_recipes
    }

    pub fn goal_based_recommendations(&self) -> &[Recipe] {
        &self.goal_based_recommendations
    }

    pub fn nutrition_balance_recommendations(&self) -> &[Recipe] {
        &self.nutrition_balance_recommendations
    }

    pub fn last_recommendation_update(&self) -> Option<DateTime<Local>> {
        self.last_recommendation_update
    }

    /// Debounce gate for [`Self::refresh_all_recommendations`].
    ///
    /// Returns `true` and stamps the current time when no refresh has run yet
    /// or at least [`RECOMMENDATION_REFRESH_INTERVAL_SECS`] have passed since
    /// the last one. This coalesces repeated triggers; it does not serialize
    /// concurrent refreshes.
    pub fn should_update_recommendations(&mut self) -> bool {
        let now = self.clock.now();
        let interval = TimeDelta::seconds(RECOMMENDATION_REFRESH_INTERVAL_SECS);
        let due = self
            .last_recommendation_update
            .is_none_or(|last| now - last >= interval);
        if due {
            self.last_recommendation_update = Some(now);
        } else {
            debug!("recommendation refresh debounced");
        }
        due
    }

    /// Which macros are still below their daily floor today.
    pub fn nutrient_deficits(&self) -> NutrientDeficits {
        let totals = self.today_totals();
        NutrientDeficits {
            protein: totals.protein < PROTEIN_FLOOR_G,
            carbs: totals.carbs < CARBS_FLOOR_G,
            fat: totals.fat < FAT_FLOOR_G,
        }
    }

    /// First [`MAX_SIMILAR_SEEDS`] distinct recipe ids eaten today, in meal
    /// order.
    pub fn similar_seed_ids(&self) -> Vec<i64> {
        let mut seen = HashSet::new();
        self.today_meal_intakes()
            .into_iter()
            .flat_map(|i| i.recipe_ids.iter().copied())
            .filter(|id| seen.insert(*id))
            .take(MAX_SIMILAR_SEEDS)
            .collect()
    }

    /// Refresh goal-based, nutrition-balance, and similar-recipe
    /// recommendations concurrently.
    ///
    /// Returns `None` when debounced. Each category merges independently: a
    /// failure clears only that category's list (a failed similar-recipe
    /// lookup leaves the accumulated list untouched).
    pub async fn refresh_all_recommendations<P: RecipeSource>(
        &mut self,
        source: &P,
    ) -> Option<RefreshReport> {
        if !self.should_update_recommendations() {
            return None;
        }

        let goal = self.profile.goal.unwrap_or(Goal::Maintain);
        let deficits = self.nutrient_deficits();
        let seeds = self.similar_seed_ids();
        debug!(goal = goal.as_str(), ?deficits, ?seeds, "refreshing recommendations");

        let similar_fetches = join_all(
            seeds
                .iter()
                .map(|&id| async move { (id, source.fetch_similar_recipes(id).await) }),
        );
        let (goal_result, balance_result, similar_results) = tokio::join!(
            source.fetch_goal_based_recommendations(goal),
            source.fetch_balance_recommendations(deficits),
            similar_fetches,
        );

        let goal_based = self.merge_goal_based(goal_result);
        let nutrition_balance = self.merge_nutrition_balance(balance_result);
        let similar: Vec<SimilarOutcome> = similar_results
            .into_iter()
            .map(|(recipe_id, result)| SimilarOutcome {
                recipe_id,
                outcome: self.merge_similar_batch(recipe_id, result),
            })
            .collect();

        info!(
            goal_based = self.goal_based_recommendations.len(),
            nutrition_balance = self.nutrition_balance_recommendations.len(),
            similar = self.similar_recipes.len(),
            "recommendations refreshed"
        );

        Some(RefreshReport {
            goal_based,
            nutrition_balance,
            similar,
        })
    }

    fn merge_goal_based(&mut self, result: Result<Vec<Recipe>>) -> FetchOutcome {
        let outcome = match result {
            Ok(mut recipes) => {
                dedup_recipes(&mut recipes);
                self.extend_catalog(recipes.iter().cloned());
                let count = recipes.len();
                self.goal_based_recommendations = recipes;
                FetchOutcome::Updated { count }
            }
            Err(e) => {
                let error = format!("{e:#}");
                warn!(%error, "goal-based recommendations failed");
                self.goal_based_recommendations.clear();
                FetchOutcome::Failed { error }
            }
        };
        self.notify();
        outcome
    }

    fn merge_nutrition_balance(&mut self, result: Result<Vec<Recipe>>) -> FetchOutcome {
        let outcome = match result {
            Ok(mut recipes) => {
                dedup_recipes(&mut recipes);
                self.extend_catalog(recipes.iter().cloned());
                let count = recipes.len();
                self.nutrition_balance_recommendations = recipes;
                FetchOutcome::Updated { count }
            }
            Err(e) => {
                let error = format!("{e:#}");
                warn!(%error, "nutrition-balance recommendations failed");
                self.nutrition_balance_recommendations.clear();
                FetchOutcome::Failed { error }
            }
        };
        self.notify();
        outcome
    }

    /// Append one similar-recipe batch and deduplicate the accumulated list.
    /// The resulting set of ids does not depend on batch arrival order.
    fn merge_similar_batch(&mut self, recipe_id: i64, result: Result<Vec<Recipe>>) -> FetchOutcome {
        match result {
            Ok(batch) => {
                let count = batch.len();
                self.extend_catalog(batch.iter().cloned());
                self.similar_recipes.extend(batch);
                dedup_recipes(&mut self.similar_recipes);
                self.notify();
                FetchOutcome::Updated { count }
            }
            Err(e) => {
                let error = format!("{e:#}");
                warn!(recipe_id, %error, "similar recipes failed");
                FetchOutcome::Failed { error }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use anyhow::anyhow;
    use chrono::TimeZone;

    use super::*;
    use crate::clock::ManualClock;
    use crate::db::Database;
    use crate::profile::{ActivityLevel, FALLBACK_TARGET_CALORIES, Gender};

    fn recipe(id: i64, calories: f64) -> Recipe {
        Recipe {
            id,
            title: format!("Recipe {id}"),
            calories,
            protein: 10.0,
            fat: 5.0,
            carbs: 20.0,
        }
    }

    fn now() -> DateTime<Local> {
        Local.with_ymd_and_hms(2025, 4, 27, 12, 0, 0).unwrap()
    }

    fn days_ago(days: i64) -> DateTime<Utc> {
        (now() - TimeDelta::days(days)).with_timezone(&Utc)
    }

    fn aggregator(db: Database) -> (NutritionAggregator<Database>, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(now()));
        let agg = NutritionAggregator::new(db, clock.clone(), UserProfile::default()).unwrap();
        (agg, clock)
    }

    #[derive(Default)]
    struct MockSource {
        query_results: Option<Vec<Recipe>>,
        pages: HashMap<u32, Vec<Recipe>>,
        goal_results: Option<Vec<Recipe>>,
        balance_results: Option<Vec<Recipe>>,
        similar_results: HashMap<i64, Vec<Recipe>>,
        query_calls: AtomicUsize,
        page_calls: Mutex<Vec<u32>>,
        goal_calls: AtomicUsize,
        balance_calls: AtomicUsize,
        similar_calls: Mutex<Vec<i64>>,
        last_deficits: Mutex<Option<NutrientDeficits>>,
        last_goal: Mutex<Option<Goal>>,
    }

    impl RecipeSource for MockSource {
        async fn fetch_recipes_by_query(&self, _query: &str) -> Result<Vec<Recipe>> {
            self.query_calls.fetch_add(1, Ordering::SeqCst);
            self.query_results
                .clone()
                .ok_or_else(|| anyhow!("search unavailable"))
        }

        async fn fetch_recipe_page(&self, offset: u32, number: u32) -> Result<Vec<Recipe>> {
            assert_eq!(number, CATALOG_PAGE_SIZE);
            self.page_calls.lock().unwrap().push(offset);
            self.pages
                .get(&offset)
                .cloned()
                .ok_or_else(|| anyhow!("no page at offset {offset}"))
        }

        async fn fetch_similar_recipes(&self, recipe_id: i64) -> Result<Vec<Recipe>> {
            self.similar_calls.lock().unwrap().push(recipe_id);
            self.similar_results
                .get(&recipe_id)
                .cloned()
                .ok_or_else(|| anyhow!("no similar recipes for {recipe_id}"))
        }

        async fn fetch_goal_based_recommendations(&self, goal: Goal) -> Result<Vec<Recipe>> {
            self.goal_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_goal.lock().unwrap() = Some(goal);
            self.goal_results
                .clone()
                .ok_or_else(|| anyhow!("goal endpoint down"))
        }

        async fn fetch_balance_recommendations(
            &self,
            deficits: NutrientDeficits,
        ) -> Result<Vec<Recipe>> {
            self.balance_calls.fetch_add(1, Ordering::SeqCst);
            *self.last_deficits.lock().unwrap() = Some(deficits);
            self.balance_results
                .clone()
                .ok_or_else(|| anyhow!("balance endpoint down"))
        }
    }

    #[test]
    fn test_today_calories_skips_unresolved_ids() {
        let db = Database::open_in_memory().unwrap();
        db.insert_intake("Breakfast", days_ago(0), &[1, 2]).unwrap();
        db.insert_intake("Lunch", days_ago(0), &[3, 99]).unwrap();
        let (mut agg, _) = aggregator(db);
        agg.extend_catalog([recipe(1, 300.0), recipe(2, 150.0), recipe(3, 500.0)]);

        assert!((agg.today_calories() - 950.0).abs() < 1e-9);
        assert!((agg.daily_protein() - 30.0).abs() < 1e-9);
        assert!((agg.daily_carbs() - 60.0).abs() < 1e-9);
        assert!((agg.daily_fat() - 15.0).abs() < 1e-9);

        // Resolving the missing id later adds exactly its own calories
        agg.extend_catalog([recipe(99, 50.0)]);
        assert!((agg.today_calories() - 1000.0).abs() < 1e-9);
    }

    #[test]
    fn test_meal_intake_recipes_follow_intake_order() {
        let db = Database::open_in_memory().unwrap();
        let intake = db.insert_intake("Dinner", days_ago(0), &[3, 1, 2]).unwrap();
        let (mut agg, _) = aggregator(db);
        agg.extend_catalog([recipe(1, 1.0), recipe(3, 3.0)]);

        let ids: Vec<i64> = agg
            .meal_intake_recipes(&intake)
            .iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec![3, 1]);
    }

    #[test]
    fn test_other_days_do_not_count_today() {
        let db = Database::open_in_memory().unwrap();
        db.insert_intake("Dinner", days_ago(1), &[1]).unwrap();
        let (mut agg, _) = aggregator(db);
        agg.extend_catalog([recipe(1, 700.0)]);

        assert!(agg.today_calories().abs() < f64::EPSILON);
        assert!(agg.today_meal_intakes().is_empty());
    }

    #[test]
    fn test_last_week_calories_sparse_history() {
        let db = Database::open_in_memory().unwrap();
        db.insert_intake("Lunch", days_ago(0), &[1]).unwrap();
        db.insert_intake("Dinner", days_ago(2), &[2]).unwrap();
        db.insert_intake("Dinner", days_ago(2), &[1]).unwrap();
        // Outside the window
        db.insert_intake("Dinner", days_ago(7), &[2]).unwrap();
        let (mut agg, _) = aggregator(db);
        agg.extend_catalog([recipe(1, 400.0), recipe(2, 1000.0)]);

        let week = agg.last_week_calories();
        assert_eq!(week.len(), 7);
        assert!(week.windows(2).all(|w| w[0].date < w[1].date));
        assert_eq!(week[6].date, now().date_naive());
        assert_eq!(week[0].date, now().date_naive() - TimeDelta::days(6));

        assert!((week[6].calories - 400.0).abs() < 1e-9);
        assert!((week[4].calories - 1400.0).abs() < 1e-9);
        assert!(week[0].calories.abs() < f64::EPSILON);

        // Empty days still count towards the average
        assert!((agg.average_calories() - 1800.0 / 7.0).abs() < 1e-9);
        assert!((agg.max_calories() - 1400.0).abs() < 1e-9);
        assert!(agg.min_calories().abs() < f64::EPSILON);
    }

    #[test]
    fn test_last_week_calories_empty_history() {
        let (agg, _) = aggregator(Database::open_in_memory().unwrap());
        let week = agg.last_week_calories();
        assert_eq!(week.len(), 7);
        assert!(week.iter().all(|d| d.calories.abs() < f64::EPSILON));
        assert!(agg.average_calories().abs() < f64::EPSILON);
    }

    #[test]
    fn test_target_and_ratio() {
        let db = Database::open_in_memory().unwrap();
        db.insert_intake("Lunch", days_ago(0), &[1]).unwrap();
        let (mut agg, _) = aggregator(db);
        agg.extend_catalog([recipe(1, 500.0)]);

        assert!((agg.target_calories() - FALLBACK_TARGET_CALORIES).abs() < f64::EPSILON);
        assert!((agg.calories_ratio() - 0.25).abs() < 1e-9);

        agg.set_profile(UserProfile {
            weight_kg: Some(70.0),
            height_cm: Some(175.0),
            age_years: Some(30),
            gender: Some(Gender::Male),
            activity_level: Some(ActivityLevel::Moderate),
            goal: Some(Goal::Maintain),
        });
        assert!((agg.target_calories() - 2555.5625).abs() < 1e-9);
        assert!((agg.calories_ratio() - 500.0 / 2555.5625).abs() < 1e-9);
    }

    #[test]
    fn test_add_recipe_is_idempotent() {
        let db = Database::open_in_memory().unwrap();
        let intake = db.insert_intake("Breakfast", days_ago(0), &[]).unwrap();
        let (mut agg, _) = aggregator(db);
        let oats = recipe(7, 350.0);

        assert!(agg.add_recipe_to_meal_intake(&oats, intake.id).unwrap());
        assert!(!agg.add_recipe_to_meal_intake(&oats, intake.id).unwrap());

        assert_eq!(agg.intake(intake.id).unwrap().recipe_ids, vec![7]);
        assert_eq!(agg.store().get_intake(intake.id).unwrap().recipe_ids, vec![7]);
        // The added recipe resolves immediately
        assert!((agg.today_calories() - 350.0).abs() < 1e-9);
    }

    #[test]
    fn test_remove_recipe_from_intake() {
        let db = Database::open_in_memory().unwrap();
        let intake = db.insert_intake("Snack", days_ago(0), &[1, 2]).unwrap();
        let (mut agg, _) = aggregator(db);

        assert!(agg.remove_recipe_from_meal_intake(1, intake.id).unwrap());
        assert!(!agg.remove_recipe_from_meal_intake(1, intake.id).unwrap());
        assert_eq!(agg.intake(intake.id).unwrap().recipe_ids, vec![2]);
        assert_eq!(agg.store().get_intake(intake.id).unwrap().recipe_ids, vec![2]);
    }

    #[test]
    fn test_add_to_unknown_intake_errors() {
        let (mut agg, _) = aggregator(Database::open_in_memory().unwrap());
        assert!(
            agg.add_recipe_to_meal_intake(&recipe(1, 1.0), Uuid::new_v4())
                .is_err()
        );
    }

    #[test]
    fn test_ensure_today_intakes() {
        let db = Database::open_in_memory().unwrap();
        db.insert_intake("Lunch", days_ago(0), &[4]).unwrap();
        db.insert_intake("Breakfast", days_ago(1), &[]).unwrap();
        let (mut agg, clock) = aggregator(db);

        assert_eq!(agg.ensure_today_intakes().unwrap(), 3);
        assert_eq!(agg.ensure_today_intakes().unwrap(), 0);

        let types: Vec<&str> = agg
            .today_meal_intakes()
            .iter()
            .map(|i| i.meal_type.as_str())
            .collect();
        assert_eq!(types, vec!["Breakfast", "Lunch", "Snack", "Dinner"]);
        assert_eq!(agg.today_intake("lunch").unwrap().recipe_ids, vec![4]);

        // Next day gets a fresh set
        clock.advance(TimeDelta::days(1));
        assert!(agg.today_meal_intakes().is_empty());
        assert_eq!(agg.ensure_today_intakes().unwrap(), 4);
        assert_eq!(agg.store().load_intakes().unwrap().len(), 9);
    }

    #[test]
    fn test_should_update_recommendations_debounce() {
        let (mut agg, clock) = aggregator(Database::open_in_memory().unwrap());
        assert!(agg.last_recommendation_update().is_none());

        assert!(agg.should_update_recommendations());
        assert_eq!(agg.last_recommendation_update(), Some(now()));

        clock.advance(TimeDelta::seconds(30));
        assert!(!agg.should_update_recommendations());
        clock.advance(TimeDelta::seconds(29));
        assert!(!agg.should_update_recommendations());

        clock.advance(TimeDelta::seconds(1));
        assert!(agg.should_update_recommendations());
        assert!(!agg.should_update_recommendations());
    }

    #[tokio::test]
    async fn test_refresh_is_debounced() {
        let (mut agg, clock) = aggregator(Database::open_in_memory().unwrap());
        let source = MockSource {
            goal_results: Some(vec![recipe(10, 400.0)]),
            balance_results: Some(vec![]),
            ..Default::default()
        };

        assert!(agg.refresh_all_recommendations(&source).await.is_some());
        assert!(agg.refresh_all_recommendations(&source).await.is_none());
        assert_eq!(source.goal_calls.load(Ordering::SeqCst), 1);
        assert_eq!(source.balance_calls.load(Ordering::SeqCst), 1);

        clock.advance(TimeDelta::seconds(RECOMMENDATION_REFRESH_INTERVAL_SECS));
        assert!(agg.refresh_all_recommendations(&source).await.is_some());
        assert_eq!(source.goal_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_refresh_failures_are_isolated() {
        let db = Database::open_in_memory().unwrap();
        db.insert_intake("Lunch", days_ago(0), &[1, 2]).unwrap();
        let (mut agg, clock) = aggregator(db);

        let healthy = MockSource {
            goal_results: Some(vec![recipe(10, 400.0)]),
            balance_results: Some(vec![recipe(20, 600.0)]),
            similar_results: HashMap::from([(1, vec![recipe(30, 300.0)])]),
            ..Default::default()
        };
        agg.refresh_all_recommendations(&healthy).await.unwrap();
        assert_eq!(agg.goal_based_recommendations().len(), 1);

        // Goal endpoint fails, similar for id 2 fails, balance still succeeds
        clock.advance(TimeDelta::minutes(5));
        let flaky = MockSource {
            goal_results: None,
            balance_results: Some(vec![recipe(21, 650.0), recipe(22, 700.0)]),
            similar_results: HashMap::from([(1, vec![recipe(31, 310.0)])]),
            ..Default::default()
        };
        let report = agg.refresh_all_recommendations(&flaky).await.unwrap();

        assert!(report.goal_based.is_failure());
        assert_eq!(report.nutrition_balance, FetchOutcome::Updated { count: 2 });
        assert_eq!(report.similar.len(), 2);
        assert_eq!(report.similar[0].outcome, FetchOutcome::Updated { count: 1 });
        assert!(report.similar[1].outcome.is_failure());

        assert!(agg.goal_based_recommendations().is_empty());
        assert_eq!(agg.nutrition_balance_recommendations().len(), 2);
        // Similar recipes accumulate across refreshes
        let similar: Vec<i64> = agg.similar_recipes().iter().map(|r| r.id).collect();
        assert_eq!(similar, vec![30, 31]);
        // Everything fetched is resolvable through the catalog
        assert!(agg.recipe(10).is_some());
        assert!(agg.recipe(22).is_some());
    }

    #[tokio::test]
    async fn test_similar_recipes_are_deduplicated() {
        let db = Database::open_in_memory().unwrap();
        db.insert_intake("Breakfast", days_ago(0), &[1]).unwrap();
        db.insert_intake("Dinner", days_ago(0), &[2]).unwrap();
        let (mut agg, _) = aggregator(db);

        let source = MockSource {
            goal_results: Some(vec![]),
            balance_results: Some(vec![]),
            similar_results: HashMap::from([
                (1, vec![recipe(100, 1.0), recipe(101, 1.0)]),
                (2, vec![recipe(101, 1.0), recipe(102, 1.0), recipe(100, 1.0)]),
            ]),
            ..Default::default()
        };
        agg.refresh_all_recommendations(&source).await.unwrap();

        let mut ids: Vec<i64> = agg.similar_recipes().iter().map(|r| r.id).collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![100, 101, 102]);
    }

    #[tokio::test]
    async fn test_similar_seeds_limited_to_five_distinct() {
        let db = Database::open_in_memory().unwrap();
        db.insert_intake("Dinner", days_ago(0), &[6, 7]).unwrap();
        db.insert_intake("Breakfast", days_ago(0), &[1, 2, 3]).unwrap();
        db.insert_intake("Lunch", days_ago(0), &[3, 4, 5]).unwrap();
        let (mut agg, _) = aggregator(db);

        assert_eq!(agg.similar_seed_ids(), vec![1, 2, 3, 4, 5]);

        let source = MockSource {
            goal_results: Some(vec![]),
            balance_results: Some(vec![]),
            ..Default::default()
        };
        agg.refresh_all_recommendations(&source).await.unwrap();
        let mut called = source.similar_calls.lock().unwrap().clone();
        called.sort_unstable();
        assert_eq!(called, vec![1, 2, 3, 4, 5]);
    }

    #[tokio::test]
    async fn test_refresh_passes_deficits_and_goal() {
        let db = Database::open_in_memory().unwrap();
        db.insert_intake("Lunch", days_ago(0), &[1]).unwrap();
        let (mut agg, _) = aggregator(db);
        agg.extend_catalog([Recipe {
            id: 1,
            title: "Steak".to_string(),
            calories: 900.0,
            protein: 120.0,
            fat: 60.0,
            carbs: 10.0,
        }]);
        agg.set_profile(UserProfile {
            goal: Some(Goal::Gain),
            ..UserProfile::default()
        });

        let source = MockSource {
            goal_results: Some(vec![]),
            balance_results: Some(vec![]),
            similar_results: HashMap::from([(1, vec![])]),
            ..Default::default()
        };
        agg.refresh_all_recommendations(&source).await.unwrap();

        assert_eq!(
            *source.last_deficits.lock().unwrap(),
            Some(NutrientDeficits {
                protein: false,
                carbs: true,
                fat: false,
            })
        );
        assert_eq!(*source.last_goal.lock().unwrap(), Some(Goal::Gain));
    }

    #[tokio::test]
    async fn test_missing_goal_defaults_to_maintain() {
        let (mut agg, _) = aggregator(Database::open_in_memory().unwrap());
        let source = MockSource::default();
        let report = agg.refresh_all_recommendations(&source).await.unwrap();

        assert_eq!(*source.last_goal.lock().unwrap(), Some(Goal::Maintain));
        // Nothing eaten: every macro is short
        assert_eq!(
            *source.last_deficits.lock().unwrap(),
            Some(NutrientDeficits {
                protein: true,
                carbs: true,
                fat: true,
            })
        );
        assert!(report.similar.is_empty());
    }

    #[tokio::test]
    async fn test_search_empty_query_makes_no_request() {
        let (mut agg, _) = aggregator(Database::open_in_memory().unwrap());
        let source = MockSource {
            query_results: Some(vec![recipe(1, 1.0)]),
            ..Default::default()
        };
        agg.search_recipes(&source, "pasta").await;
        assert_eq!(agg.searched_recipes().len(), 1);

        let outcome = agg.search_recipes(&source, "   ").await;
        assert_eq!(outcome, FetchOutcome::Cleared);
        assert!(agg.searched_recipes().is_empty());
        assert_eq!(source.query_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_search_merges_new_ids_into_catalog() {
        let (mut agg, _) = aggregator(Database::open_in_memory().unwrap());
        let mut known = recipe(1, 100.0);
        known.title = "Known".to_string();
        agg.extend_catalog([known]);

        let source = MockSource {
            query_results: Some(vec![recipe(1, 999.0), recipe(2, 200.0)]),
            ..Default::default()
        };
        let outcome = agg.search_recipes(&source, "soup").await;

        assert_eq!(outcome, FetchOutcome::Updated { count: 2 });
        assert_eq!(agg.searched_recipes().len(), 2);
        assert_eq!(agg.all_recipes().len(), 2);
        // Existing catalog entries are not overwritten
        assert_eq!(agg.recipe(1).unwrap().title, "Known");
    }

    #[tokio::test]
    async fn test_search_failure_clears_results_only() {
        let (mut agg, _) = aggregator(Database::open_in_memory().unwrap());
        let ok = MockSource {
            query_results: Some(vec![recipe(1, 1.0)]),
            ..Default::default()
        };
        agg.search_recipes(&ok, "pasta").await;

        let failing = MockSource::default();
        let outcome = agg.search_recipes(&failing, "pasta").await;

        assert!(outcome.is_failure());
        assert!(agg.searched_recipes().is_empty());
        assert!(agg.recipe(1).is_some());
    }

    #[tokio::test]
    async fn test_load_more_merges_pages_without_duplicates() {
        let (mut agg, _) = aggregator(Database::open_in_memory().unwrap());
        let mut known = recipe(2, 100.0);
        known.title = "Known".to_string();
        agg.extend_catalog([known]);

        let source = MockSource {
            pages: HashMap::from([
                (0, vec![recipe(1, 100.0), recipe(2, 999.0), recipe(3, 300.0)]),
                // Remote pages can overlap when the catalog shifts
                (100, vec![recipe(3, 300.0), recipe(4, 400.0), recipe(4, 400.0)]),
            ]),
            ..Default::default()
        };

        assert_eq!(agg.load_more_recipes(&source).await, FetchOutcome::Updated { count: 3 });
        assert_eq!(agg.browse_offset(), CATALOG_PAGE_SIZE);
        assert_eq!(agg.load_more_recipes(&source).await, FetchOutcome::Updated { count: 2 });
        assert_eq!(agg.browse_offset(), 2 * CATALOG_PAGE_SIZE);

        let mut ids: Vec<i64> = agg.all_recipes().keys().copied().collect();
        ids.sort_unstable();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert_eq!(agg.recipe(2).unwrap().title, "Known");
        assert_eq!(*source.page_calls.lock().unwrap(), vec![0, CATALOG_PAGE_SIZE]);
    }

    #[tokio::test]
    async fn test_failed_page_is_retried_at_same_offset() {
        let (mut agg, _) = aggregator(Database::open_in_memory().unwrap());
        agg.resume_browsing(200);
        let failing = MockSource::default();

        assert!(agg.load_more_recipes(&failing).await.is_failure());
        assert_eq!(agg.browse_offset(), 200);
        assert!(agg.all_recipes().is_empty());

        let source = MockSource {
            pages: HashMap::from([(200, vec![recipe(7, 70.0)])]),
            ..Default::default()
        };
        assert_eq!(agg.load_more_recipes(&source).await, FetchOutcome::Updated { count: 1 });
        assert_eq!(agg.browse_offset(), 300);
        assert!(agg.recipe(7).is_some());
    }

    #[tokio::test]
    async fn test_browsing_stops_at_limit_or_empty_page() {
        let (mut agg, _) = aggregator(Database::open_in_memory().unwrap());
        let source = MockSource {
            pages: HashMap::from([(0, vec![])]),
            ..Default::default()
        };
        assert_eq!(agg.load_more_recipes(&source).await, FetchOutcome::Updated { count: 0 });
        assert!(!agg.can_load_more());
        assert_eq!(agg.load_more_recipes(&source).await, FetchOutcome::Exhausted);
        assert_eq!(source.page_calls.lock().unwrap().len(), 1);

        agg.resume_browsing(u32::MAX);
        assert_eq!(agg.browse_offset(), CATALOG_BROWSE_LIMIT);
        assert_eq!(agg.load_more_recipes(&source).await, FetchOutcome::Exhausted);
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let (mut agg, _) = aggregator(Database::open_in_memory().unwrap());
        let mut rx = agg.subscribe();
        let before = agg.revision();

        agg.extend_catalog([recipe(1, 1.0)]);
        assert!(rx.has_changed().unwrap());
        assert!(*rx.borrow_and_update() > before);

        // Re-adding a known id is not a change
        agg.extend_catalog([recipe(1, 1.0)]);
        assert!(!rx.has_changed().unwrap());
    }
}
