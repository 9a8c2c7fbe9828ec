use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::{require_positive, round_to, Units};

const IMPERIAL_FACTOR: f64 = 703.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BmiStatus {
    Underweight,
    Normal,
    Overweight,
    Obese,
}

impl BmiStatus {
    pub fn from_bmi(bmi: f64) -> Self {
        if bmi < 18.5 {
            BmiStatus::Underweight
        } else if bmi < 25.0 {
            BmiStatus::Normal
        } else if bmi < 30.0 {
            BmiStatus::Overweight
        } else {
            BmiStatus::Obese
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BmiStatus::Underweight => "Underweight",
            BmiStatus::Normal => "Normal",
            BmiStatus::Overweight => "Overweight",
            BmiStatus::Obese => "Obese",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BmiResult {
    /// rounded to one decimal
    pub bmi: f64,
    pub status: BmiStatus,
}

/// Metric: kg and cm, `kg / m²`. Imperial: lb and in, `703 · lb / in²`.
/// The status band is taken from the rounded value.
pub fn bmi(weight: f64, height: f64, units: Units) -> Result<BmiResult> {
    let weight = require_positive("weight", weight)?;
    let height = require_positive("height", height)?;
    let raw = match units {
        Units::Metric => {
            let metres = height / 100.0;
            weight / (metres * metres)
        }
        Units::Imperial => IMPERIAL_FACTOR * weight / (height * height),
    };
    let bmi = round_to(raw, 1);
    Ok(BmiResult {
        bmi,
        status: BmiStatus::from_bmi(bmi),
    })
}
