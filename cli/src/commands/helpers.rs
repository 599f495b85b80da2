use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDateTime, NaiveTime, TimeDelta, TimeZone, Utc, Weekday};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use pulse_core::models::Recipe;

pub(crate) fn print_recipe_table(recipes: &[&Recipe]) {
    #[derive(Tabled)]
    struct RecipeRow {
        #[tabled(rename = "ID")]
        id: i64,
        #[tabled(rename = "Title")]
        title: String,
        #[tabled(rename = "Calories")]
        calories: String,
        #[tabled(rename = "Protein")]
        protein: String,
        #[tabled(rename = "Carbs")]
        carbs: String,
        #[tabled(rename = "Fat")]
        fat: String,
    }

    let rows: Vec<RecipeRow> = recipes
        .iter()
        .map(|r| RecipeRow {
            id: r.id,
            title: truncate(&r.title, 45),
            calories: format!("{:.0}", r.calories),
            protein: format!("{:.1}g", r.protein),
            carbs: format!("{:.1}g", r.carbs),
            fat: format!("{:.1}g", r.fat),
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(2..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

/// Parse a local timestamp: RFC 3339, `YYYY-MM-DD HH:MM`, or a bare `HH:MM`
/// meaning today.
pub(crate) fn parse_local_datetime(s: &str) -> Result<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    let naive = if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M") {
        dt
    } else if let Ok(time) = chrono::NaiveTime::parse_from_str(s, "%H:%M") {
        Local::now().date_naive().and_time(time)
    } else {
        bail!("Invalid time '{s}'. Use 'YYYY-MM-DD HH:MM', 'HH:MM', or RFC 3339");
    };

    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("'{s}' does not exist in the local timezone"))
}

/// Parse a wall-clock time: `HH:MM` or `HH:MM:SS`.
pub(crate) fn parse_time_of_day(s: &str) -> Result<NaiveTime> {
    let s = s.trim();
    NaiveTime::parse_from_str(s, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
        .with_context(|| format!("Invalid time '{s}'. Use 'HH:MM'"))
}

/// Parse repeat days: weekday names (`mon`, `Tuesday`, ...) plus the
/// shorthands `daily`, `weekdays` and `weekends`.
pub(crate) fn parse_weekdays(values: &[String]) -> Result<Vec<Weekday>> {
    const WORK_WEEK: [Weekday; 5] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
    ];

    let mut days = Vec::new();
    for value in values {
        let value = value.trim();
        match value.to_lowercase().as_str() {
            "" => {}
            "daily" => {
                days.extend(WORK_WEEK);
                days.extend([Weekday::Sat, Weekday::Sun]);
            }
            "weekdays" => days.extend(WORK_WEEK),
            "weekends" => days.extend([Weekday::Sat, Weekday::Sun]),
            _ => days.push(value.parse::<Weekday>().with_context(|| {
                format!("Invalid day '{value}'. Use mon..sun, daily, weekdays or weekends")
            })?),
        }
    }
    Ok(days)
}

pub(crate) fn format_weekdays(days: &[Weekday]) -> String {
    if days.is_empty() {
        return "once".to_string();
    }
    days.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

pub(crate) fn format_local(dt: DateTime<Utc>) -> String {
    dt.with_timezone(&Local).format("%Y-%m-%d %H:%M").to_string()
}

pub(crate) fn format_duration(d: TimeDelta) -> String {
    let minutes = d.num_minutes();
    format!("{}h {:02}m", minutes / 60, minutes % 60)
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

pub(crate) fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let end = s.char_indices().nth(max - 3).map_or(s.len(), |(i, _)| i);
        format!("{}...", &s[..end])
    }
}
