use serde::{Deserialize, Serialize};

/// Daily calorie target used whenever the profile is incomplete or yields a
/// non-positive estimate.
pub const FALLBACK_TARGET_CALORIES: f64 = 2000.0;

/// Calorie offset applied for a weight-loss or weight-gain goal.
pub const GOAL_CALORIE_DELTA: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    /// Unrecognised values become [`Gender::Other`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "male" | "m" => Self::Male,
            "female" | "f" => Self::Female,
            _ => Self::Other,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Male => "male",
            Self::Female => "female",
            Self::Other => "other",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
    Unknown,
}

impl ActivityLevel {
    /// Unrecognised values become [`ActivityLevel::Unknown`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();
        match normalized.as_str() {
            "sedentary" => Self::Sedentary,
            "light" => Self::Light,
            "moderate" => Self::Moderate,
            "active" => Self::Active,
            "veryactive" => Self::VeryActive,
            _ => Self::Unknown,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Sedentary => "sedentary",
            Self::Light => "light",
            Self::Moderate => "moderate",
            Self::Active => "active",
            Self::VeryActive => "very_active",
            Self::Unknown => "unknown",
        }
    }

    /// TDEE multiplier applied to BMR.
    #[must_use]
    pub fn multiplier(self) -> f64 {
        match self {
            Self::Sedentary => 1.2,
            Self::Light => 1.375,
            Self::Moderate | Self::Unknown => 1.55,
            Self::Active => 1.725,
            Self::VeryActive => 1.9,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Goal {
    Lose,
    Maintain,
    Gain,
}

impl Goal {
    /// Unrecognised values become [`Goal::Maintain`].
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "lose" => Self::Lose,
            "gain" => Self::Gain,
            _ => Self::Maintain,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lose => "lose",
            Self::Maintain => "maintain",
            Self::Gain => "gain",
        }
    }

    #[must_use]
    pub fn adjust(self, tdee: f64) -> f64 {
        match self {
            Self::Lose => tdee - GOAL_CALORIE_DELTA,
            Self::Gain => tdee + GOAL_CALORIE_DELTA,
            Self::Maintain => tdee,
        }
    }
}

/// Body and lifestyle data the calorie target is derived from. Every field is
/// optional because onboarding may not have collected it yet.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub weight_kg: Option<f64>,
    pub height_cm: Option<f64>,
    pub age_years: Option<u32>,
    pub gender: Option<Gender>,
    pub activity_level: Option<ActivityLevel>,
    pub goal: Option<Goal>,
}

impl UserProfile {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.weight_kg.is_some()
            && self.height_cm.is_some()
            && self.age_years.is_some()
            && self.gender.is_some()
            && self.activity_level.is_some()
            && self.goal.is_some()
    }

    /// Mifflin-St Jeor basal metabolic rate in kcal/day.
    #[must_use]
    pub fn bmr(&self) -> Option<f64> {
        let weight = self.weight_kg?;
        let height = self.height_cm?;
        let age = f64::from(self.age_years?);
        let base = 10.0 * weight + 6.25 * height - 5.0 * age;
        Some(match self.gender? {
            Gender::Male => base + 5.0,
            Gender::Female | Gender::Other => base - 161.0,
        })
    }

    #[must_use]
    pub fn tdee(&self) -> Option<f64> {
        Some(self.bmr()? * self.activity_level?.multiplier())
    }

    /// Goal-adjusted daily calorie target.
    ///
    /// Falls back to [`FALLBACK_TARGET_CALORIES`] when any field is missing or
    /// the estimate is not a positive finite number.
    #[must_use]
    pub fn target_calories(&self) -> f64 {
        if !self.is_complete() {
            return FALLBACK_TARGET_CALORIES;
        }
        match (self.tdee(), self.goal) {
            (Some(tdee), Some(goal)) => {
                let target = goal.adjust(tdee);
                if target.is_finite() && target > 0.0 {
                    target
                } else {
                    FALLBACK_TARGET_CALORIES
                }
            }
            _ => FALLBACK_TARGET_CALORIES,
        }
    }
}
