use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::{formula_sex, require_positive};
use crate::normalize::Gender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActivityLevel {
    Sedentary,
    Light,
    Moderate,
    Active,
    VeryActive,
}

impl ActivityLevel {
    pub fn multiplier(&self) -> f64 {
        match self {
            ActivityLevel::Sedentary => 1.2,
            ActivityLevel::Light => 1.375,
            ActivityLevel::Moderate => 1.55,
            ActivityLevel::Active => 1.725,
            ActivityLevel::VeryActive => 1.9,
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "sedentary" => Some(ActivityLevel::Sedentary),
            "light" => Some(ActivityLevel::Light),
            "moderate" => Some(ActivityLevel::Moderate),
            "active" => Some(ActivityLevel::Active),
            "very_active" | "veryactive" => Some(ActivityLevel::VeryActive),
            _ => None,
        }
    }
}

fn check(weight_kg: f64, height_cm: f64, age: u32) -> Result<()> {
    require_positive("weight", weight_kg)?;
    require_positive("height", height_cm)?;
    if age == 0 || age > 120 {
        bail!("age must be between 1 and 120, got {}", age);
    }
    Ok(())
}

/// Mifflin–St Jeor basal metabolic rate in kcal/day.
pub fn bmr(weight_kg: f64, height_cm: f64, age: u32, gender: Gender) -> Result<f64> {
    check(weight_kg, height_cm, age)?;
    let base = 10.0 * weight_kg + 6.25 * height_cm - 5.0 * f64::from(age);
    Ok(match formula_sex(gender)? {
        Gender::Male => base + 5.0,
        _ => base - 161.0,
    })
}

/// Revised Harris–Benedict (Roza & Shizgal) in kcal/day.
pub fn harris_benedict(weight_kg: f64, height_cm: f64, age: u32, gender: Gender) -> Result<f64> {
    check(weight_kg, height_cm, age)?;
    let age = f64::from(age);
    Ok(match formula_sex(gender)? {
        Gender::Male => 88.362 + 13.397 * weight_kg + 4.799 * height_cm - 5.677 * age,
        _ => 447.593 + 9.247 * weight_kg + 3.098 * height_cm - 4.330 * age,
    })
}

/// Total daily energy expenditure.
pub fn tdee(bmr: f64, activity: ActivityLevel) -> f64 {
    bmr * activity.multiplier()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mifflin_st_jeor() {
        assert_eq!(bmr(70.0, 170.0, 30, Gender::Male).unwrap(), 1617.5);
        assert_eq!(bmr(60.0, 165.0, 25, Gender::Female).unwrap(), 1345.25);
    }

    #[test]
    fn harris_benedict_male() {
        let v = harris_benedict(70.0, 170.0, 30, Gender::Male).unwrap();
        assert!((v - 1671.672).abs() < 1e-6);
    }

    #[test]
    fn tdee_scales_by_activity() {
        assert_eq!(tdee(1000.0, ActivityLevel::Sedentary), 1200.0);
        assert_eq!(tdee(1000.0, ActivityLevel::VeryActive), 1900.0);
        assert_eq!(ActivityLevel::from_str("very-active"), Some(ActivityLevel::VeryActive));
    }

    #[test]
    fn rejects_bad_input() {
        assert!(bmr(70.0, 170.0, 0, Gender::Male).is_err());
        assert!(bmr(70.0, 170.0, 30, Gender::Other).is_err());
        assert!(harris_benedict(-1.0, 170.0, 30, Gender::Female).is_err());
    }
}
