use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};
use uuid::Uuid;

use pulse_core::db::Database;
use pulse_core::models::{DailyCalories, MacroTotals, MealIntake, Recipe, validate_meal_type};
use pulse_core::nutrition::NutritionAggregator;

use super::helpers::{no_neg_zero, truncate};
use super::load_nutrition;

#[derive(Serialize)]
struct MealReport<'a> {
    id: Uuid,
    meal_type: &'a str,
    calories: f64,
    recipes: Vec<&'a Recipe>,
    unresolved_recipe_ids: Vec<i64>,
}

#[derive(Serialize)]
struct TodayReport<'a> {
    date: NaiveDate,
    meals: Vec<MealReport<'a>>,
    totals: MacroTotals,
    target_calories: f64,
    calories_ratio: f64,
}

fn meal_report<'a>(
    nutrition: &'a NutritionAggregator<Database>,
    intake: &'a MealIntake,
) -> MealReport<'a> {
    let recipes = nutrition.meal_intake_recipes(intake);
    MealReport {
        id: intake.id,
        meal_type: &intake.meal_type,
        calories: recipes.iter().map(|r| r.calories).sum(),
        unresolved_recipe_ids: intake
            .recipe_ids
            .iter()
            .copied()
            .filter(|id| nutrition.recipe(*id).is_none())
            .collect(),
        recipes,
    }
}

pub(crate) fn cmd_today(db: Database, json: bool) -> Result<()> {
    let nutrition = load_nutrition(db)?;
    let report = TodayReport {
        date: chrono::Local::now().date_naive(),
        meals: nutrition
            .today_meal_intakes()
            .into_iter()
            .map(|intake| meal_report(&nutrition, intake))
            .collect(),
        totals: nutrition.today_totals(),
        target_calories: nutrition.target_calories(),
        calories_ratio: nutrition.calories_ratio(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.meals.iter().all(|m| m.recipes.is_empty()) {
        let date = report.date;
        eprintln!("Nothing logged for {date}");
        process::exit(2);
    }

    let date = report.date;
    println!("=== {date} ===\n");

    for meal in &report.meals {
        let label = meal.meal_type.to_uppercase();
        let cal = meal.calories;
        println!("  {label} ({cal:.0} kcal)");
        for r in &meal.recipes {
            let id = r.id;
            let title = truncate(&r.title, 50);
            println!(
                "    [{id}] {title}: {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
                r.calories, r.protein, r.carbs, r.fat
            );
        }
        for id in &meal.unresolved_recipe_ids {
            println!("    [{id}] (not cached)");
        }
        println!();
    }

    let t = &report.totals;
    println!(
        "  TOTAL: {:.0} kcal | P:{:.0}g C:{:.0}g F:{:.0}g",
        t.calories, t.protein, t.carbs, t.fat
    );
    let target = report.target_calories;
    let pct = report.calories_ratio * 100.0;
    let remaining = no_neg_zero(target - t.calories);
    println!("  TARGET: {target:.0} kcal ({pct:.0}% eaten)");
    println!("  REMAINING: {remaining:.0} kcal");

    Ok(())
}

#[derive(Serialize)]
struct WeekReport {
    days: Vec<DailyCalories>,
    average_calories: f64,
    max_calories: f64,
    min_calories: f64,
    target_calories: f64,
}

pub(crate) fn cmd_week(db: Database, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct WeekRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Target")]
        ratio: String,
    }

    let nutrition = load_nutrition(db)?;
    let report = WeekReport {
        days: nutrition.last_week_calories(),
        average_calories: nutrition.average_calories(),
        max_calories: nutrition.max_calories(),
        min_calories: nutrition.min_calories(),
        target_calories: nutrition.target_calories(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    if report.days.iter().all(|d| d.calories.abs() < f64::EPSILON) {
        eprintln!("Nothing logged in the last 7 days");
        process::exit(2);
    }

    let rows: Vec<WeekRow> = report
        .days
        .iter()
        .map(|d| {
            let cal = no_neg_zero(d.calories);
            let pct = cal / report.target_calories * 100.0;
            WeekRow {
                date: d.date.format("%a %Y-%m-%d").to_string(),
                calories: format!("{cal:.0}"),
                ratio: format!("{pct:.0}%"),
            }
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!(
        "  AVERAGE: {:.0} kcal | MAX: {:.0} kcal | MIN: {:.0} kcal",
        report.average_calories, report.max_calories, report.min_calories
    );

    Ok(())
}

#[derive(Serialize)]
struct LogResult<'a> {
    changed: bool,
    recipe: Option<&'a Recipe>,
    intake: &'a MealIntake,
}

/// Today's intake id for a meal name.
fn today_intake_id(
    nutrition: &NutritionAggregator<Database>,
    meal: &str,
) -> Result<(Uuid, String)> {
    let meal = validate_meal_type(meal)?;
    let intake = nutrition
        .today_intake(&meal)
        .with_context(|| format!("No {meal} intake for today"))?;
    Ok((intake.id, meal))
}

pub(crate) fn cmd_log(db: Database, recipe_id: i64, meal: &str, json: bool) -> Result<()> {
    let mut nutrition = load_nutrition(db)?;
    let (intake_id, meal) = today_intake_id(&nutrition, meal)?;
    let recipe = nutrition
        .recipe(recipe_id)
        .cloned()
        .with_context(|| {
            format!("Recipe {recipe_id} is not cached. Find it with `pulse search` first")
        })?;

    let added = nutrition.add_recipe_to_meal_intake(&recipe, intake_id)?;

    if json {
        let intake = nutrition
            .intake(intake_id)
            .context("Meal intake disappeared")?;
        let out = LogResult {
            changed: added,
            recipe: Some(&recipe),
            intake,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else if added {
        let title = &recipe.title;
        let cal = recipe.calories;
        println!("Logged {title} to {meal} ({cal:.0} kcal)");
    } else {
        let title = &recipe.title;
        println!("{title} is already in {meal}");
    }

    Ok(())
}

pub(crate) fn cmd_unlog(db: Database, recipe_id: i64, meal: &str, json: bool) -> Result<()> {
    let mut nutrition = load_nutrition(db)?;
    let (intake_id, meal) = today_intake_id(&nutrition, meal)?;

    let removed = nutrition.remove_recipe_from_meal_intake(recipe_id, intake_id)?;

    if json {
        let intake = nutrition
            .intake(intake_id)
            .context("Meal intake disappeared")?;
        let out = LogResult {
            changed: removed,
            recipe: nutrition.recipe(recipe_id),
            intake,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    if !removed {
        eprintln!("Recipe {recipe_id} is not in today's {meal}");
        process::exit(2);
    }
    let name = nutrition
        .recipe(recipe_id)
        .map_or_else(|| recipe_id.to_string(), |r| r.title.clone());
    println!("Removed {name} from {meal}");

    Ok(())
}
