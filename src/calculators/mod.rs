//! Health calculators: BMI, BMR/TDEE, blood alcohol and running pace.

pub mod bac;
pub mod bmi;
pub mod bmr;
pub mod pace;

pub use bac::{bac, BacResult, BacStatus};
pub use bmi::{bmi, BmiResult, BmiStatus};
pub use bmr::{bmr, harris_benedict, tdee, ActivityLevel};
pub use pace::{pace, predict_time, DistanceUnit, PaceResult};

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::normalize::Gender;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Units {
    /// kilograms and centimetres
    #[default]
    Metric,
    /// pounds and inches
    Imperial,
}

impl Units {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "metric" | "si" | "kg" => Some(Units::Metric),
            "imperial" | "us" | "lb" => Some(Units::Imperial),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Units::Metric => "metric",
            Units::Imperial => "imperial",
        }
    }
}

impl fmt::Display for Units {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sex used by the physiological formulas. Only male and female constants
/// exist for them.
pub fn formula_sex(gender: Gender) -> Result<Gender> {
    match gender {
        Gender::Male | Gender::Female => Ok(gender),
        Gender::Other => bail!("this formula needs gender male or female"),
    }
}

pub(crate) fn require_positive(name: &str, value: f64) -> Result<f64> {
    if !value.is_finite() || value <= 0.0 {
        bail!("{} must be a positive number, got {}", name, value);
    }
    Ok(value)
}

pub(crate) fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
