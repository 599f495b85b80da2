use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::process;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};
use uuid::Uuid;

use pulse_core::alarm::AlarmManager;
use pulse_core::models::Alarm;
use pulse_core::store::AlarmStore;

use super::helpers::{format_weekdays, parse_time_of_day, parse_weekdays, truncate};

/// Fields given to `pulse alarm edit`. Anything left `None` keeps its value.
pub(crate) struct AlarmEdit {
    pub time: Option<String>,
    pub description: Option<String>,
    pub repeat: Vec<String>,
    pub once: bool,
}

fn print_alarm(verb: &str, alarm: &Alarm) {
    let time = alarm.time.format("%H:%M");
    let days = format_weekdays(&alarm.repeat_days);
    let id = alarm.id;
    let state = if alarm.enabled { "on" } else { "off" };
    println!("{verb} alarm {time} ({days}, {state}) id: {id}");
}

pub(crate) fn cmd_alarm_add<S: AlarmStore>(
    alarms: &mut AlarmManager<S>,
    time: &str,
    description: Option<&str>,
    repeat: &[String],
    json: bool,
) -> Result<()> {
    let time = parse_time_of_day(time)?;
    let days = parse_weekdays(repeat)?;
    let alarm = alarms.add_alarm(time, description.unwrap_or_default(), &days)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&alarm)?);
    } else {
        print_alarm("Added", &alarm);
    }
    Ok(())
}

#[derive(Serialize)]
struct AlarmListing<'a> {
    alarms: Vec<&'a Alarm>,
    next: Option<NextAlarm>,
}

#[derive(Serialize)]
struct NextAlarm {
    id: Uuid,
    at: DateTime<Local>,
}

pub(crate) fn cmd_alarm_list<S: AlarmStore>(alarms: &AlarmManager<S>, json: bool) -> Result<()> {
    #[derive(Tabled)]
    struct AlarmRow {
        #[tabled(rename = "ID")]
        id: String,
        #[tabled(rename = "Time")]
        time: String,
        #[tabled(rename = "Repeat")]
        repeat: String,
        #[tabled(rename = "On")]
        enabled: String,
        #[tabled(rename = "Description")]
        description: String,
    }

    let listing = AlarmListing {
        alarms: alarms.alarms(),
        next: alarms
            .next_alarm()
            .map(|(alarm, at)| NextAlarm { id: alarm.id, at }),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&listing)?);
        return Ok(());
    }

    if listing.alarms.is_empty() {
        eprintln!("No alarms set");
        process::exit(2);
    }

    let rows: Vec<AlarmRow> = listing
        .alarms
        .iter()
        .map(|a| AlarmRow {
            id: a.id.to_string(),
            time: a.time.format("%H:%M").to_string(),
            repeat: format_weekdays(&a.repeat_days),
            enabled: if a.enabled { "yes" } else { "no" }.to_string(),
            description: truncate(&a.description, 30),
        })
        .collect();
    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..2)).with(Alignment::right()))
        .to_string();
    println!("{table}");

    match listing.next {
        Some(next) => {
            let at = next.at.format("%a %Y-%m-%d %H:%M");
            println!("  NEXT: {at}");
        }
        None => println!("  NEXT: none (all alarms off)"),
    }
    Ok(())
}

pub(crate) fn cmd_alarm_edit<S: AlarmStore>(
    alarms: &mut AlarmManager<S>,
    id: Uuid,
    edit: AlarmEdit,
    json: bool,
) -> Result<()> {
    if edit.once && !edit.repeat.is_empty() {
        bail!("--once and --repeat cannot be combined");
    }
    let current = alarms
        .alarm(id)
        .cloned()
        .with_context(|| format!("Alarm not found: {id}"))?;

    let time = match edit.time {
        Some(t) => parse_time_of_day(&t)?,
        None => current.time,
    };
    let description = edit.description.unwrap_or(current.description);
    let days = if edit.once {
        Vec::new()
    } else if edit.repeat.is_empty() {
        current.repeat_days
    } else {
        parse_weekdays(&edit.repeat)?
    };

    let alarm = alarms.update_alarm(id, time, &description, &days)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&alarm)?);
    } else {
        print_alarm("Updated", &alarm);
    }
    Ok(())
}

pub(crate) fn cmd_alarm_toggle<S: AlarmStore>(
    alarms: &mut AlarmManager<S>,
    id: Uuid,
    json: bool,
) -> Result<()> {
    let alarm = alarms.toggle(id)?;
    if json {
        println!("{}", serde_json::to_string_pretty(&alarm)?);
    } else {
        let verb = if alarm.enabled { "Enabled" } else { "Disabled" };
        print_alarm(verb, &alarm);
    }
    Ok(())
}

pub(crate) fn cmd_alarm_delete<S: AlarmStore>(
    alarms: &mut AlarmManager<S>,
    id: Uuid,
    json: bool,
) -> Result<()> {
    if !alarms.delete_alarm(id)? {
        bail!("Alarm not found: {id}");
    }
    if json {
        println!("{}", serde_json::json!({ "deleted": id }));
    } else {
        println!("Deleted alarm {id}");
    }
    Ok(())
}

pub(crate) fn cmd_alarm_clear<S: AlarmStore>(
    alarms: &mut AlarmManager<S>,
    yes: bool,
    json: bool,
) -> Result<()> {
    if !yes {
        bail!("This deletes all alarms. Re-run with --yes to confirm");
    }
    let count = alarms.clear()?;
    if json {
        println!("{}", serde_json::json!({ "cleared": count }));
    } else {
        println!("Cleared {count} alarms");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{NaiveTime, Weekday};
    use pulse_core::alarm_store::MemoryAlarmStore;
    use pulse_core::clock::SystemClock;

    use super::*;

    fn manager() -> AlarmManager<MemoryAlarmStore> {
        AlarmManager::new(MemoryAlarmStore::default(), Arc::new(SystemClock)).unwrap()
    }

    fn no_change() -> AlarmEdit {
        AlarmEdit {
            time: None,
            description: None,
            repeat: Vec::new(),
            once: false,
        }
    }

    #[test]
    fn test_add_parses_time_and_days() {
        let mut alarms = manager();
        cmd_alarm_add(
            &mut alarms,
            "06:30",
            Some("run"),
            &["sat".to_string(), "sun".to_string()],
            true,
        )
        .unwrap();

        let alarm = alarms.alarms()[0];
        assert_eq!(alarm.time, NaiveTime::from_hms_opt(6, 30, 0).unwrap());
        assert_eq!(alarm.repeat_days, vec![Weekday::Sat, Weekday::Sun]);
        assert_eq!(alarm.description, "run");
    }

    #[test]
    fn test_add_rejects_bad_input() {
        let mut alarms = manager();
        assert!(cmd_alarm_add(&mut alarms, "6.30", None, &[], true).is_err());
        assert!(cmd_alarm_add(&mut alarms, "06:30", None, &["soon".to_string()], true).is_err());
        assert!(alarms.alarms().is_empty());
    }

    #[test]
    fn test_edit_keeps_fields_not_given() {
        let mut alarms = manager();
        let time = NaiveTime::from_hms_opt(7, 0, 0).unwrap();
        let original = alarms.add_alarm(time, "work", &[Weekday::Mon]).unwrap();
        alarms.set_enabled(original.id, false).unwrap();

        let edit = AlarmEdit {
            time: Some("07:15".to_string()),
            ..no_change()
        };
        cmd_alarm_edit(&mut alarms, original.id, edit, true).unwrap();

        let edited = alarms.alarm(original.id).unwrap();
        assert_eq!(edited.time, NaiveTime::from_hms_opt(7, 15, 0).unwrap());
        assert_eq!(edited.description, "work");
        assert_eq!(edited.repeat_days, vec![Weekday::Mon]);
        assert!(edited.enabled);
    }

    #[test]
    fn test_edit_once_clears_repeat() {
        let mut alarms = manager();
        let time = NaiveTime::from_hms_opt(7, 0, 0).unwrap();
        let original = alarms.add_alarm(time, "", &[Weekday::Mon]).unwrap();

        let conflicting = AlarmEdit {
            repeat: vec!["tue".to_string()],
            once: true,
            ..no_change()
        };
        assert!(cmd_alarm_edit(&mut alarms, original.id, conflicting, true).is_err());

        let once = AlarmEdit {
            once: true,
            ..no_change()
        };
        cmd_alarm_edit(&mut alarms, original.id, once, true).unwrap();
        assert!(alarms.alarm(original.id).unwrap().repeat_days.is_empty());
    }

    #[test]
    fn test_delete_unknown_alarm_errors() {
        let mut alarms = manager();
        assert!(cmd_alarm_delete(&mut alarms, Uuid::new_v4(), true).is_err());
    }

    #[test]
    fn test_clear_requires_confirmation() {
        let mut alarms = manager();
        let time = NaiveTime::from_hms_opt(7, 0, 0).unwrap();
        alarms.add_alarm(time, "", &[]).unwrap();

        assert!(cmd_alarm_clear(&mut alarms, false, true).is_err());
        assert_eq!(alarms.alarms().len(), 1);
        cmd_alarm_clear(&mut alarms, true, true).unwrap();
        assert!(alarms.alarms().is_empty());
    }
}
