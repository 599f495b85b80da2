use anyhow::{Result, bail};
use serde::Serialize;
use std::process;

use pulse_core::db::Database;
use pulse_core::models::{NutrientDeficits, Recipe};
use pulse_core::nutrition::{FetchOutcome, RefreshReport};
use pulse_core::profile::Goal;
use pulse_core::source::RecipeSource;

use super::helpers::print_recipe_table;
use super::{load_nutrition, save_catalog};

#[derive(Serialize)]
struct Recommendations<'a> {
    deficits: NutrientDeficits,
    goal_based: &'a [Recipe],
    nutrition_balance: &'a [Recipe],
    similar: &'a [Recipe],
    report: &'a RefreshReport,
}

fn print_section(title: &str, recipes: &[Recipe], outcome: Option<&FetchOutcome>) {
    println!("{title}");
    if let Some(FetchOutcome::Failed { error }) = outcome {
        println!("  unavailable: {error}\n");
        return;
    }
    if recipes.is_empty() {
        println!("  nothing to suggest\n");
        return;
    }
    let refs: Vec<&Recipe> = recipes.iter().collect();
    print_recipe_table(&refs);
    println!();
}

pub(crate) async fn cmd_recommend<P: RecipeSource>(
    db: Database,
    source: &P,
    json: bool,
) -> Result<()> {
    let mut nutrition = load_nutrition(db)?;
    let deficits = nutrition.nutrient_deficits();

    let Some(report) = nutrition.refresh_all_recommendations(source).await else {
        eprintln!("Recommendations were refreshed less than a minute ago");
        process::exit(2);
    };
    save_catalog(&nutrition)?;

    let all_failed = report.goal_based.is_failure()
        && report.nutrition_balance.is_failure()
        && report.similar.iter().all(|s| s.outcome.is_failure());
    if all_failed {
        if let FetchOutcome::Failed { error } = &report.goal_based {
            bail!("Could not fetch recommendations: {error}");
        }
    }

    if json {
        let out = Recommendations {
            deficits,
            goal_based: nutrition.goal_based_recommendations(),
            nutrition_balance: nutrition.nutrition_balance_recommendations(),
            similar: nutrition.similar_recipes(),
            report: &report,
        };
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    let goal = nutrition.profile().goal.map_or("maintain", Goal::as_str);
    print_section(
        &format!("FOR YOUR GOAL ({goal})"),
        nutrition.goal_based_recommendations(),
        Some(&report.goal_based),
    );

    let mut short: Vec<&str> = Vec::new();
    if deficits.protein {
        short.push("protein");
    }
    if deficits.carbs {
        short.push("carbs");
    }
    if deficits.fat {
        short.push("fat");
    }
    let balance_title = if short.is_empty() {
        "TO BALANCE TODAY".to_string()
    } else {
        format!("TO BALANCE TODAY (low on {})", short.join(", "))
    };
    print_section(
        &balance_title,
        nutrition.nutrition_balance_recommendations(),
        Some(&report.nutrition_balance),
    );

    if !report.similar.is_empty() {
        print_section("SIMILAR TO WHAT YOU ATE", nutrition.similar_recipes(), None);
    }

    Ok(())
}
