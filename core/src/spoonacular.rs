use serde::Deserialize;

use crate::models::{NutrientDeficits, Recipe};
use crate::profile::Goal;

/// Number of recipes requested per search.
pub const PAGE_SIZE: u32 = 20;

#[derive(Debug, Deserialize)]
pub struct ComplexSearchResponse {
    pub results: Vec<RecipeData>,
    #[serde(rename = "totalResults")]
    pub total_results: Option<u32>,
}

/// Entry from `/recipes/{id}/similar`. Carries no nutrition.
#[derive(Debug, Deserialize)]
pub struct SimilarRecipe {
    pub id: i64,
}

/// Recipe as returned by `complexSearch` and `informationBulk` when nutrition
/// is requested.
#[derive(Debug, Deserialize)]
pub struct RecipeData {
    pub id: i64,
    pub title: Option<String>,
    pub nutrition: Option<Nutrition>,
}

#[derive(Debug, Deserialize)]
pub struct Nutrition {
    #[serde(default)]
    pub nutrients: Vec<Nutrient>,
}

#[derive(Debug, Deserialize)]
pub struct Nutrient {
    pub name: String,
    pub amount: f64,
}

impl Nutrition {
    fn amount(&self, name: &str) -> Option<f64> {
        self.nutrients
            .iter()
            .find(|n| n.name.eq_ignore_ascii_case(name))
            .map(|n| n.amount)
    }
}

/// Convert an API recipe into a catalog [`Recipe`]. Recipes without a title
/// or a calorie figure are dropped; missing macros count as zero.
#[must_use]
pub fn recipe_from_data(data: RecipeData) -> Option<Recipe> {
    let title = data.title.filter(|t| !t.trim().is_empty())?;
    let nutrition = data.nutrition?;
    let calories = nutrition.amount("Calories")?;

    Some(Recipe {
        id: data.id,
        title,
        calories,
        protein: nutrition.amount("Protein").unwrap_or(0.0),
        fat: nutrition.amount("Fat").unwrap_or(0.0),
        carbs: nutrition.amount("Carbohydrates").unwrap_or(0.0),
    })
}

/// Extra `complexSearch` parameters used for goal-based recommendations.
#[must_use]
pub fn goal_query_params(goal: Goal) -> Vec<(&'static str, String)> {
    let mut params = vec![("sort", "healthiness".to_string())];
    match goal {
        Goal::Lose => params.push(("maxCalories", "500".to_string())),
        Goal::Gain => params.push(("minCalories", "600".to_string())),
        Goal::Maintain => {}
    }
    params
}

/// Extra `complexSearch` parameters used for nutrition-balance
/// recommendations.
#[must_use]
pub fn balance_query_params(deficits: NutrientDeficits) -> Vec<(&'static str, String)> {
    let mut params = vec![("sort", "healthiness".to_string())];
    if deficits.protein {
        params.push(("minProtein", "25".to_string()));
    }
    if deficits.carbs {
        params.push(("minCarbs", "50".to_string()));
    }
    if deficits.fat {
        params.push(("minFat", "15".to_string()));
    }
    params
}

#[cfg(test)]
mod tests {
    use super::*;

    const SEARCH_JSON: &str = r#"{
        "results": [
            {
                "id": 716429,
                "title": "Pasta with Garlic, Scallions, Cauliflower & Breadcrumbs",
                "nutrition": {
                    "nutrients": [
                        {"name": "Calories", "amount": 584.46, "unit": "kcal"},
                        {"name": "Fat", "amount": 19.95, "unit": "g"},
                        {"name": "Carbohydrates", "amount": 83.98, "unit": "g"},
                        {"name": "Protein", "amount": 19.41, "unit": "g"}
                    ]
                }
            },
            {
                "id": 1,
                "title": "No nutrition"
            }
        ],
        "offset": 0,
        "number": 2,
        "totalResults": 5222
    }"#;

    #[test]
    fn test_parse_complex_search() {
        let resp: ComplexSearchResponse = serde_json::from_str(SEARCH_JSON).unwrap();
        assert_eq!(resp.total_results, Some(5222));

        let recipes: Vec<Recipe> = resp.results.into_iter().filter_map(recipe_from_data).collect();
        assert_eq!(recipes.len(), 1);
        let r = &recipes[0];
        assert_eq!(r.id, 716_429);
        assert!((r.calories - 584.46).abs() < 1e-9);
        assert!((r.protein - 19.41).abs() < 1e-9);
        assert!((r.fat - 19.95).abs() < 1e-9);
        assert!((r.carbs - 83.98).abs() < 1e-9);
    }

    #[test]
    fn test_parse_similar() {
        let json = r#"[{"id": 209128, "title": "Dinner Tonight: Grilled Romesco-Style Pork", "readyInMinutes": 45}]"#;
        let similar: Vec<SimilarRecipe> = serde_json::from_str(json).unwrap();
        assert_eq!(similar.len(), 1);
        assert_eq!(similar[0].id, 209_128);
    }

    #[test]
    fn test_recipe_missing_calories_is_dropped() {
        let data = RecipeData {
            id: 3,
            title: Some("Salad".to_string()),
            nutrition: Some(Nutrition {
                nutrients: vec![Nutrient {
                    name: "Protein".to_string(),
                    amount: 4.0,
                }],
            }),
        };
        assert!(recipe_from_data(data).is_none());
    }

    #[test]
    fn test_recipe_missing_macros_default_to_zero() {
        let data = RecipeData {
            id: 4,
            title: Some("Black coffee".to_string()),
            nutrition: Some(Nutrition {
                nutrients: vec![Nutrient {
                    name: "calories".to_string(),
                    amount: 2.0,
                }],
            }),
        };
        let r = recipe_from_data(data).unwrap();
        assert!((r.calories - 2.0).abs() < f64::EPSILON);
        assert!(r.protein.abs() < f64::EPSILON);
        assert!(r.fat.abs() < f64::EPSILON);
        assert!(r.carbs.abs() < f64::EPSILON);
    }

    #[test]
    fn test_recipe_blank_title_is_dropped() {
        let data = RecipeData {
            id: 5,
            title: Some("   ".to_string()),
            nutrition: Some(Nutrition { nutrients: vec![] }),
        };
        assert!(recipe_from_data(data).is_none());
    }

    #[test]
    fn test_goal_query_params() {
        let lose = goal_query_params(Goal::Lose);
        assert!(lose.contains(&("maxCalories", "500".to_string())));
        let gain = goal_query_params(Goal::Gain);
        assert!(gain.contains(&("minCalories", "600".to_string())));
        assert_eq!(goal_query_params(Goal::Maintain).len(), 1);
    }

    #[test]
    fn test_balance_query_params() {
        let params = balance_query_params(NutrientDeficits {
            protein: true,
            carbs: false,
            fat: true,
        });
        assert!(params.contains(&("minProtein", "25".to_string())));
        assert!(params.contains(&("minFat", "15".to_string())));
        assert!(!params.iter().any(|(k, _)| *k == "minCarbs"));
    }
}
