use anyhow::{Result, bail};
use chrono::{DateTime, TimeDelta, Utc};
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};
use uuid::Uuid;

use pulse_core::models::{DailySleep, SleepRecord, duration_hours};
use pulse_core::sleep::SleepTracker;
use pulse_core::store::SleepStore;

use super::helpers::{format_duration, format_local, parse_local_datetime};

pub(crate) fn cmd_sleep_start<S: SleepStore>(tracker: &mut SleepTracker<S>, json: bool) -> Result<()> {
    if !tracker.start_sleep()? {
        if let Some(since) = tracker.sleep_start_time() {
            let since = format_local(since);
            eprintln!("Already sleeping since {since}");
        }
        process::exit(2);
    }

    if json {
        println!(
            "{}",
            serde_json::json!({ "sleeping": true, "since": tracker.sleep_start_time() })
        );
    } else if let Some(since) = tracker.sleep_start_time() {
        let since = format_local(since);
        println!("Sleep started at {since}");
    }
    Ok(())
}

pub(crate) fn cmd_sleep_stop<S: SleepStore>(tracker: &mut SleepTracker<S>, json: bool) -> Result<()> {
    let Some(record) = tracker.stop_sleep()? else {
        eprintln!("Not currently sleeping");
        process::exit(2);
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        let slept = record.duration().map_or_else(|| "-".to_string(), format_duration);
        let id = record.id;
        println!("Slept {slept} (id: {id})");
    }
    Ok(())
}

#[derive(Serialize)]
struct SleepStatus {
    sleeping: bool,
    since: Option<DateTime<Utc>>,
    elapsed_hours: Option<f64>,
    today_hours: f64,
}

pub(crate) fn cmd_sleep_status<S: SleepStore>(tracker: &SleepTracker<S>, json: bool) -> Result<()> {
    let since = tracker.sleep_start_time();
    let elapsed = since.map(|s| (Utc::now() - s).max(TimeDelta::zero()));
    let status = SleepStatus {
        sleeping: tracker.is_sleeping(),
        since,
        elapsed_hours: elapsed.map(duration_hours),
        today_hours: duration_hours(tracker.daily_sleep()),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    match (since, elapsed) {
        (Some(since), Some(elapsed)) => {
            let since = format_local(since);
            let elapsed = format_duration(elapsed);
            println!("Sleeping since {since} ({elapsed} so far)");
        }
        _ => println!("Awake"),
    }
    let today = format_duration(tracker.daily_sleep());
    println!("Slept today: {today}");
    Ok(())
}

pub(crate) fn cmd_sleep_history<S: SleepStore>(
    tracker: &SleepTracker<S>,
    limit: Option<usize>,
    json: bool,
) -> Result<()> {
    #[derive(Tabled)]
    struct SleepRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Start")]
        start: String,
        #[tabled(rename = "End")]
        end: String,
        #[tabled(rename = "Duration")]
        duration: String,
    }

    let records: Vec<&SleepRecord> = tracker
        .records()
        .into_iter()
        .take(limit.unwrap_or(usize::MAX))
        .collect();

    if records.is_empty() {
        if json {
            println!("[]");
        } else {
            eprintln!("No sleep recorded");
        }
        process::exit(2);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }

    let rows: Vec<SleepRow> = records
        .iter()
        .map(|r| SleepRow {
            id: r.id.to_string(),
            start: format_local(r.start_time),
            end: r.end_time.map_or_else(|| "-".to_string(), format_local),
            duration: r.duration().map_or_else(|| "-".to_string(), format_duration),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(3..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    Ok(())
}

#[derive(Serialize)]
struct SleepStats {
    daily_hours: f64,
    weekly_hours: f64,
    monthly_hours: f64,
    average_hours: f64,
    best_hours: f64,
    worst_hours: f64,
    last_week: Vec<DailySleep>,
}

fn sleep_stats<S: SleepStore>(tracker: &SleepTracker<S>) -> SleepStats {
    SleepStats {
        daily_hours: duration_hours(tracker.daily_sleep()),
        weekly_hours: duration_hours(tracker.weekly_sleep()),
        monthly_hours: duration_hours(tracker.monthly_sleep()),
        average_hours: tracker.average_sleep(),
        best_hours: tracker.best_sleep(),
        worst_hours: tracker.worst_sleep(),
        last_week: tracker.last_week_sleep(),
    }
}

pub(crate) fn cmd_sleep_stats<S: SleepStore>(tracker: &SleepTracker<S>, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct DayRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Hours")]
        hours: String,
    }

    let stats = sleep_stats(tracker);

    if json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
        return Ok(());
    }

    if tracker.records().is_empty() {
        eprintln!("No sleep recorded");
        process::exit(2);
    }

    let rows: Vec<DayRow> = stats
        .last_week
        .iter()
        .map(|d| DayRow {
            date: d.date.format("%a %Y-%m-%d").to_string(),
            hours: format!("{:.1}", d.hours),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    println!(
        "  TODAY: {:.1}h | 7 DAYS: {:.1}h | 30 DAYS: {:.1}h",
        stats.daily_hours, stats.weekly_hours, stats.monthly_hours
    );
    println!(
        "  AVERAGE: {:.1}h | BEST: {:.1}h | WORST: {:.1}h",
        stats.average_hours, stats.best_hours, stats.worst_hours
    );
    Ok(())
}

pub(crate) fn cmd_sleep_edit<S: SleepStore>(
    tracker: &mut SleepTracker<S>,
    id: Uuid,
    start: &str,
    end: Option<&str>,
    json: bool,
) -> Result<()> {
    let start = parse_local_datetime(start)?;
    let end = end.map(parse_local_datetime).transpose()?;
    let record = tracker.edit_record(id, start, end)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        let slept = record.duration().map_or_else(|| "-".to_string(), format_duration);
        println!("Updated sleep {id}: {slept}");
    }
    Ok(())
}

pub(crate) fn cmd_sleep_clear<S: SleepStore>(
    tracker: &mut SleepTracker<S>,
    yes: bool,
    json: bool,
) -> Result<()> {
    if !yes {
        bail!("This deletes all sleep history. Re-run with --yes to confirm");
    }
    let count = tracker.records().len();
    tracker.clear_history()?;

    if json {
        println!("{}", serde_json::json!({ "cleared": count }));
    } else {
        println!("Cleared {count} sleep records");
    }
    Ok(())
}
