mod alarm;
mod helpers;
mod nutrition;
mod profile;
mod recommend;
mod search;
mod sleep;

use std::sync::Arc;

use anyhow::Result;
use tracing::debug;

use pulse_core::clock::SystemClock;
use pulse_core::db::Database;
use pulse_core::nutrition::NutritionAggregator;

pub(crate) use alarm::{
    AlarmEdit, cmd_alarm_add, cmd_alarm_clear, cmd_alarm_delete, cmd_alarm_edit, cmd_alarm_list,
    cmd_alarm_toggle,
};
pub(crate) use nutrition::{cmd_log, cmd_today, cmd_unlog, cmd_week};
pub(crate) use profile::{ProfileUpdate, cmd_profile_set, cmd_profile_show};
pub(crate) use recommend::cmd_recommend;
pub(crate) use search::{cmd_browse, cmd_search};
pub(crate) use sleep::{
    cmd_sleep_clear, cmd_sleep_edit, cmd_sleep_history, cmd_sleep_start, cmd_sleep_stats,
    cmd_sleep_status, cmd_sleep_stop,
};

/// Nutrition view over the local database: stored profile, every cached
/// recipe resolvable, and today's meal slots in place.
pub(super) fn load_nutrition(db: Database) -> Result<NutritionAggregator<Database>> {
    let profile = db.load_profile()?;
    let cached = db.load_cached_recipes()?;
    let mut nutrition = NutritionAggregator::new(db, Arc::new(SystemClock), profile)?;
    nutrition.extend_catalog(cached);
    nutrition.ensure_today_intakes()?;
    Ok(nutrition)
}

/// Write recipes fetched this run back to the cache.
pub(super) fn save_catalog(nutrition: &NutritionAggregator<Database>) -> Result<()> {
    let added = nutrition
        .store()
        .cache_recipes(nutrition.all_recipes().values())?;
    debug!(added, "recipe cache updated");
    Ok(())
}
