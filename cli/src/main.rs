mod commands;
mod config;
mod spoonacular;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::process;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::filter::LevelFilter;

use crate::commands::{
    AlarmEdit, cmd_alarm_add, cmd_alarm_clear, cmd_alarm_delete, cmd_alarm_edit, cmd_alarm_list,
    cmd_alarm_toggle, cmd_browse, cmd_log, cmd_profile_set, cmd_profile_show, cmd_recommend,
    cmd_search, cmd_sleep_clear, cmd_sleep_edit, cmd_sleep_history, cmd_sleep_start,
    cmd_sleep_stats, cmd_sleep_status, cmd_sleep_stop, cmd_today, cmd_unlog, cmd_week,
};
use crate::config::Config;
use crate::spoonacular::SpoonacularClient;
use pulse_core::alarm::AlarmManager;
use pulse_core::alarm_store::JsonAlarmStore;
use pulse_core::clock::SystemClock;
use pulse_core::db::Database;
use pulse_core::sleep::SleepTracker;
use pulse_core::sleep_store::JsonSleepStore;

#[derive(Parser)]
#[command(
    name = "pulse",
    version,
    about = "Track what you eat and how you sleep",
    long_about = "Track what you eat and how you sleep.\n\n\
        Recipes come from the Spoonacular API (set SPOONACULAR_API_KEY).\n\
        Everything else stays on this machine."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search Spoonacular for recipes
    Search {
        /// Search query
        query: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Page through the Spoonacular catalog into the local recipe cache
    Browse {
        /// Number of pages of 100 recipes to fetch
        #[arg(short, long, default_value_t = 1)]
        pages: u32,
        /// Start again from the first page
        #[arg(long)]
        restart: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show today's meals, totals and calorie target
    Today {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show calories for the last 7 days
    Week {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Add a cached recipe to one of today's meals
    Log {
        /// Recipe ID (from `pulse search`)
        recipe_id: i64,
        /// Meal: breakfast, lunch, snack, dinner
        #[arg(short, long, default_value = "snack")]
        meal: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a recipe from one of today's meals
    Unlog {
        /// Recipe ID
        recipe_id: i64,
        /// Meal: breakfast, lunch, snack, dinner
        #[arg(short, long, default_value = "snack")]
        meal: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Suggest recipes for your goal, today's macros, and what you already ate
    Recommend {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Manage the profile the calorie target is derived from
    Profile {
        #[command(subcommand)]
        command: ProfileCommands,
    },
    /// Track sleep sessions
    Sleep {
        #[command(subcommand)]
        command: SleepCommands,
    },
    /// Manage wake-up alarms
    Alarm {
        #[command(subcommand)]
        command: AlarmCommands,
    },
}

#[derive(Subcommand)]
enum ProfileCommands {
    /// Update profile fields (fields not given are kept)
    Set {
        /// Body weight in kg
        #[arg(long)]
        weight: Option<f64>,
        /// Height in cm
        #[arg(long)]
        height: Option<f64>,
        /// Age in years
        #[arg(long)]
        age: Option<u32>,
        /// male, female, other
        #[arg(long)]
        gender: Option<String>,
        /// sedentary, light, moderate, active, very-active
        #[arg(long)]
        activity: Option<String>,
        /// lose, maintain, gain
        #[arg(long)]
        goal: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show the profile and the resulting calorie target
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SleepCommands {
    /// Start a sleep session now
    Start {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// End the running sleep session
    Stop {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show whether a session is running and today's total
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List recorded sessions, newest first
    History {
        /// Number of sessions to show (default: all)
        #[arg(short = 'n', long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Daily, weekly and monthly totals plus the last 7 days
    Stats {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change the start and end of a recorded session
    Edit {
        /// Session ID (from `pulse sleep history`)
        id: uuid::Uuid,
        /// New start ("YYYY-MM-DD HH:MM", "HH:MM", or RFC 3339)
        #[arg(long)]
        start: String,
        /// New end (same formats as --start)
        #[arg(long)]
        end: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all recorded sessions
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum AlarmCommands {
    /// Add an alarm (enabled)
    Add {
        /// Time of day ("HH:MM")
        time: String,
        /// Label shown with the alarm
        #[arg(short, long)]
        description: Option<String>,
        /// Days to repeat on: mon..sun, daily, weekdays, weekends (default: once)
        #[arg(short, long, value_delimiter = ',')]
        repeat: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List alarms and when the next one rings
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Change an alarm (fields not given are kept; the alarm is re-enabled)
    Edit {
        /// Alarm ID (from `pulse alarm list`)
        id: uuid::Uuid,
        /// New time of day ("HH:MM")
        #[arg(long)]
        time: Option<String>,
        /// New label
        #[arg(short, long)]
        description: Option<String>,
        /// New repeat days
        #[arg(short, long, value_delimiter = ',')]
        repeat: Vec<String>,
        /// Ring once instead of repeating
        #[arg(long)]
        once: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Switch an alarm on or off
    Toggle {
        /// Alarm ID
        id: uuid::Uuid,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete an alarm
    Delete {
        /// Alarm ID
        id: uuid::Uuid,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete all alarms
    Clear {
        /// Confirm deletion
        #[arg(long)]
        yes: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

fn recipe_source(config: &Config) -> Result<SpoonacularClient> {
    SpoonacularClient::new(config.spoonacular_key()?)
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    match cli.command {
        Commands::Search { query, json } => {
            let source = recipe_source(&config)?;
            cmd_search(Database::open(&config.db_path)?, &source, &query, json).await
        }
        Commands::Browse {
            pages,
            restart,
            json,
        } => {
            let source = recipe_source(&config)?;
            cmd_browse(
                Database::open(&config.db_path)?,
                &source,
                pages,
                restart,
                json,
            )
            .await
        }
        Commands::Today { json } => cmd_today(Database::open(&config.db_path)?, json),
        Commands::Week { json } => cmd_week(Database::open(&config.db_path)?, json),
        Commands::Log {
            recipe_id,
            meal,
            json,
        } => cmd_log(Database::open(&config.db_path)?, recipe_id, &meal, json),
        Commands::Unlog {
            recipe_id,
            meal,
            json,
        } => cmd_unlog(Database::open(&config.db_path)?, recipe_id, &meal, json),
        Commands::Recommend { json } => {
            let source = recipe_source(&config)?;
            cmd_recommend(Database::open(&config.db_path)?, &source, json).await
        }
        Commands::Profile { command } => {
            let db = Database::open(&config.db_path)?;
            match command {
                ProfileCommands::Set {
                    weight,
                    height,
                    age,
                    gender,
                    activity,
                    goal,
                    json,
                } => cmd_profile_set(
                    &db,
                    commands::ProfileUpdate {
                        weight,
                        height,
                        age,
                        gender,
                        activity,
                        goal,
                    },
                    json,
                ),
                ProfileCommands::Show { json } => cmd_profile_show(&db, json),
            }
        }
        Commands::Sleep { command } => {
            let store = JsonSleepStore::new(&config.sleep_path);
            let mut tracker = SleepTracker::new(store, Arc::new(SystemClock))?;
            match command {
                SleepCommands::Start { json } => cmd_sleep_start(&mut tracker, json),
                SleepCommands::Stop { json } => cmd_sleep_stop(&mut tracker, json),
                SleepCommands::Status { json } => cmd_sleep_status(&tracker, json),
                SleepCommands::History { limit, json } => {
                    cmd_sleep_history(&tracker, limit, json)
                }
                SleepCommands::Stats { json } => cmd_sleep_stats(&tracker, json),
                SleepCommands::Edit {
                    id,
                    start,
                    end,
                    json,
                } => cmd_sleep_edit(&mut tracker, id, &start, end.as_deref(), json),
                SleepCommands::Clear { yes, json } => cmd_sleep_clear(&mut tracker, yes, json),
            }
        }
        Commands::Alarm { command } => {
            let store = JsonAlarmStore::new(&config.alarm_path);
            let mut alarms = AlarmManager::new(store, Arc::new(SystemClock))?;
            match command {
                AlarmCommands::Add {
                    time,
                    description,
                    repeat,
                    json,
                } => cmd_alarm_add(&mut alarms, &time, description.as_deref(), &repeat, json),
                AlarmCommands::List { json } => cmd_alarm_list(&alarms, json),
                AlarmCommands::Edit {
                    id,
                    time,
                    description,
                    repeat,
                    once,
                    json,
                } => cmd_alarm_edit(
                    &mut alarms,
                    id,
                    AlarmEdit {
                        time,
                        description,
                        repeat,
                        once,
                    },
                    json,
                ),
                AlarmCommands::Toggle { id, json } => cmd_alarm_toggle(&mut alarms, id, json),
                AlarmCommands::Delete { id, json } => cmd_alarm_delete(&mut alarms, id, json),
                AlarmCommands::Clear { yes, json } => cmd_alarm_clear(&mut alarms, yes, json),
            }
        }
    }
}
