use std::future::Future;

use anyhow::Result;

use crate::models::{NutrientDeficits, Recipe};
use crate::profile::Goal;

/// Remote recipe catalog.
///
/// The CLI implements this over HTTP with reqwest; tests use canned
/// responses. Every call may fail, and callers treat a failure as transient.
pub trait RecipeSource: Send + Sync {
    fn fetch_recipes_by_query(
        &self,
        query: &str,
    ) -> impl Future<Output = Result<Vec<Recipe>>> + Send;

    /// One page of the unfiltered catalog, starting at `offset`.
    fn fetch_recipe_page(
        &self,
        offset: u32,
        number: u32,
    ) -> impl Future<Output = Result<Vec<Recipe>>> + Send;

    fn fetch_similar_recipes(
        &self,
        recipe_id: i64,
    ) -> impl Future<Output = Result<Vec<Recipe>>> + Send;

    fn fetch_goal_based_recommendations(
        &self,
        goal: Goal,
    ) -> impl Future<Output = Result<Vec<Recipe>>> + Send;

    fn fetch_balance_recommendations(
        &self,
        deficits: NutrientDeficits,
    ) -> impl Future<Output = Result<Vec<Recipe>>> + Send;
}
