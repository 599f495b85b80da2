use anyhow::{Result, bail};
use std::collections::HashSet;
use std::process;

use pulse_core::db::Database;
use pulse_core::models::Recipe;
use pulse_core::nutrition::FetchOutcome;
use pulse_core::source::RecipeSource;

use super::helpers::print_recipe_table;
use super::{load_nutrition, save_catalog};

pub(crate) async fn cmd_search<P: RecipeSource>(
    db: Database,
    source: &P,
    query: &str,
    json: bool,
) -> Result<()> {
    let mut nutrition = load_nutrition(db)?;

    if let FetchOutcome::Failed { error } = nutrition.search_recipes(source, query).await {
        bail!("Search failed: {error}");
    }
    save_catalog(&nutrition)?;

    let results = nutrition.searched_recipes();
    if results.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No results found for '{query}'");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(results)?);
    } else {
        let refs: Vec<&Recipe> = results.iter().collect();
        print_recipe_table(&refs);
    }

    Ok(())
}

/// Pull the next catalog pages into the local cache, resuming where the last
/// run stopped.
pub(crate) async fn cmd_browse<P: RecipeSource>(
    db: Database,
    source: &P,
    pages: u32,
    restart: bool,
    json: bool,
) -> Result<()> {
    let mut nutrition = load_nutrition(db)?;
    let offset = if restart {
        0
    } else {
        nutrition.store().browse_offset()?
    };
    nutrition.resume_browsing(offset);
    let known: HashSet<i64> = nutrition.all_recipes().keys().copied().collect();

    let mut failure = None;
    for _ in 0..pages.max(1) {
        match nutrition.load_more_recipes(source).await {
            FetchOutcome::Failed { error } => {
                failure = Some(error);
                break;
            }
            FetchOutcome::Exhausted => break,
            FetchOutcome::Updated { .. } | FetchOutcome::Cleared => {}
        }
    }

    // Keep whatever pages arrived before a failure
    save_catalog(&nutrition)?;
    nutrition
        .store()
        .set_browse_offset(nutrition.browse_offset())?;
    if let Some(error) = failure {
        bail!("Browsing failed: {error}");
    }

    let mut added: Vec<&Recipe> = nutrition
        .all_recipes()
        .values()
        .filter(|r| !known.contains(&r.id))
        .collect();
    added.sort_by_key(|r| r.id);

    if added.is_empty() {
        if json {
            println!("[]");
        } else if nutrition.can_load_more() {
            eprintln!("No new recipes");
        } else {
            eprintln!("Catalog fully browsed. Re-run with --restart to start over");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&added)?);
    } else {
        print_recipe_table(&added);
        let count = added.len();
        let next = nutrition.browse_offset();
        println!("  {count} new recipes cached (next offset: {next})");
    }

    Ok(())
}
