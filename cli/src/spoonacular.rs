use std::time::Duration;

use anyhow::{Context, Result};
use tracing::debug;

use pulse_core::models::{NutrientDeficits, Recipe};
use pulse_core::profile::Goal;
use pulse_core::source::RecipeSource;
use pulse_core::spoonacular::{
    ComplexSearchResponse, PAGE_SIZE, RecipeData, SimilarRecipe, balance_query_params,
    goal_query_params, recipe_from_data,
};

const BASE_URL: &str = "https://api.spoonacular.com/recipes";

pub struct SpoonacularClient {
    client: reqwest::Client,
    api_key: String,
}

impl SpoonacularClient {
    pub fn new(api_key: String) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(format!("pulse/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(5))
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { client, api_key })
    }

    async fn get<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = format!("{BASE_URL}/{path}");
        let resp = self
            .client
            .get(&url)
            .query(&[("apiKey", self.api_key.as_str())])
            .query(params)
            .send()
            .await
            .context("Failed to reach Spoonacular API")?
            .error_for_status()
            .with_context(|| format!("Spoonacular request failed: {path}"))?;

        resp.json()
            .await
            .with_context(|| format!("Failed to parse Spoonacular response: {path}"))
    }

    async fn complex_search(
        &self,
        number: u32,
        extra: Vec<(&'static str, String)>,
    ) -> Result<Vec<Recipe>> {
        let mut params = vec![
            ("addRecipeNutrition", "true".to_string()),
            ("number", number.to_string()),
        ];
        params.extend(extra);

        let data: ComplexSearchResponse = self.get("complexSearch", &params).await?;
        debug!(total = ?data.total_results, returned = data.results.len(), "complexSearch");
        Ok(data
            .results
            .into_iter()
            .filter_map(recipe_from_data)
            .collect())
    }
}

impl RecipeSource for SpoonacularClient {
    async fn fetch_recipes_by_query(&self, query: &str) -> Result<Vec<Recipe>> {
        self.complex_search(PAGE_SIZE, vec![("query", query.to_string())])
            .await
    }

    async fn fetch_recipe_page(&self, offset: u32, number: u32) -> Result<Vec<Recipe>> {
        self.complex_search(number, vec![("offset", offset.to_string())])
            .await
    }

    /// `/similar` returns bare ids, so nutrition is filled in with a second
    /// `informationBulk` call.
    async fn fetch_similar_recipes(&self, recipe_id: i64) -> Result<Vec<Recipe>> {
        let similar: Vec<SimilarRecipe> = self
            .get(
                &format!("{recipe_id}/similar"),
                &[("number", PAGE_SIZE.to_string())],
            )
            .await?;
        if similar.is_empty() {
            return Ok(Vec::new());
        }

        let ids = similar
            .iter()
            .map(|s| s.id.to_string())
            .collect::<Vec<_>>()
            .join(",");
        let bulk: Vec<RecipeData> = self
            .get(
                "informationBulk",
                &[("ids", ids), ("includeNutrition", "true".to_string())],
            )
            .await?;
        Ok(bulk.into_iter().filter_map(recipe_from_data).collect())
    }

    async fn fetch_goal_based_recommendations(&self, goal: Goal) -> Result<Vec<Recipe>> {
        self.complex_search(PAGE_SIZE, goal_query_params(goal)).await
    }

    async fn fetch_balance_recommendations(
        &self,
        deficits: NutrientDeficits,
    ) -> Result<Vec<Recipe>> {
        self.complex_search(PAGE_SIZE, balance_query_params(deficits))
            .await
    }
}
