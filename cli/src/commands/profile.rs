use anyhow::{Result, bail};
use serde::Serialize;

use pulse_core::db::Database;
use pulse_core::profile::{ActivityLevel, Gender, Goal, UserProfile};

pub(crate) struct ProfileUpdate {
    pub weight: Option<f64>,
    pub height: Option<f64>,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub activity: Option<String>,
    pub goal: Option<String>,
}

impl ProfileUpdate {
    fn is_empty(&self) -> bool {
        self.weight.is_none()
            && self.height.is_none()
            && self.age.is_none()
            && self.gender.is_none()
            && self.activity.is_none()
            && self.goal.is_none()
    }

    fn apply(self, profile: &mut UserProfile) -> Result<()> {
        if let Some(w) = self.weight {
            if w <= 0.0 {
                bail!("Weight must be greater than 0");
            }
            profile.weight_kg = Some(w);
        }
        if let Some(h) = self.height {
            if h <= 0.0 {
                bail!("Height must be greater than 0");
            }
            profile.height_cm = Some(h);
        }
        if let Some(a) = self.age {
            profile.age_years = Some(a);
        }
        if let Some(g) = self.gender {
            profile.gender = Some(Gender::parse(&g));
        }
        if let Some(a) = self.activity {
            profile.activity_level = Some(ActivityLevel::parse(&a));
        }
        if let Some(g) = self.goal {
            profile.goal = Some(Goal::parse(&g));
        }
        Ok(())
    }
}

#[derive(Serialize)]
struct ProfileReport<'a> {
    #[serde(flatten)]
    profile: &'a UserProfile,
    complete: bool,
    bmr: Option<f64>,
    tdee: Option<f64>,
    target_calories: f64,
}

fn print_profile(profile: &UserProfile, json: bool) -> Result<()> {
    let report = ProfileReport {
        profile,
        complete: profile.is_complete(),
        bmr: profile.bmr(),
        tdee: profile.tdee(),
        target_calories: profile.target_calories(),
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    let missing = || "-".to_string();
    let weight = profile.weight_kg.map_or_else(missing, |v| format!("{v} kg"));
    let height = profile.height_cm.map_or_else(missing, |v| format!("{v} cm"));
    let age = profile.age_years.map_or_else(missing, |v| v.to_string());
    let gender = profile.gender.map_or("-", Gender::as_str);
    let activity = profile.activity_level.map_or("-", ActivityLevel::as_str);
    let goal = profile.goal.map_or("-", Goal::as_str);

    println!("  Weight:   {weight}");
    println!("  Height:   {height}");
    println!("  Age:      {age}");
    println!("  Gender:   {gender}");
    println!("  Activity: {activity}");
    println!("  Goal:     {goal}");
    println!();
    if let (Some(bmr), Some(tdee)) = (report.bmr, report.tdee) {
        println!("  BMR:  {bmr:.0} kcal");
        println!("  TDEE: {tdee:.0} kcal");
    }
    let target = report.target_calories;
    if report.complete {
        println!("  TARGET: {target:.0} kcal");
    } else {
        println!("  TARGET: {target:.0} kcal (default, profile incomplete)");
    }

    Ok(())
}

pub(crate) fn cmd_profile_set(db: &Database, update: ProfileUpdate, json: bool) -> Result<()> {
    if update.is_empty() {
        bail!("Nothing to update. Pass at least one of --weight, --height, --age, --gender, --activity, --goal");
    }
    let mut profile = db.load_profile()?;
    update.apply(&mut profile)?;
    db.save_profile(&profile)?;
    print_profile(&profile, json)
}

pub(crate) fn cmd_profile_show(db: &Database, json: bool) -> Result<()> {
    print_profile(&db.load_profile()?, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_update() -> ProfileUpdate {
        ProfileUpdate {
            weight: None,
            height: None,
            age: None,
            gender: None,
            activity: None,
            goal: None,
        }
    }

    #[test]
    fn test_update_merges_into_existing() {
        let db = Database::open_in_memory().unwrap();
        db.save_profile(&UserProfile {
            weight_kg: Some(80.0),
            goal: Some(Goal::Lose),
            ..UserProfile::default()
        })
        .unwrap();

        cmd_profile_set(
            &db,
            ProfileUpdate {
                activity: Some("very active".to_string()),
                ..empty_update()
            },
            true,
        )
        .unwrap();

        let profile = db.load_profile().unwrap();
        assert_eq!(profile.weight_kg, Some(80.0));
        assert_eq!(profile.goal, Some(Goal::Lose));
        assert_eq!(profile.activity_level, Some(ActivityLevel::VeryActive));
    }

    #[test]
    fn test_empty_update_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        assert!(cmd_profile_set(&db, empty_update(), true).is_err());
    }

    #[test]
    fn test_non_positive_weight_is_rejected() {
        let mut profile = UserProfile::default();
        let update = ProfileUpdate {
            weight: Some(0.0),
            ..empty_update()
        };
        assert!(update.apply(&mut profile).is_err());
        assert!(profile.weight_kg.is_none());
    }
}
