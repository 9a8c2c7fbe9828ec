use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use super::{formula_sex, require_positive};
use crate::normalize::Gender;

/// Grams of alcohol in one standard drink.
pub const GRAMS_PER_DRINK: f64 = 14.0;
/// Percentage points eliminated per hour.
pub const ELIMINATION_RATE: f64 = 0.015;
const MALE_DISTRIBUTION: f64 = 0.68;
const FEMALE_DISTRIBUTION: f64 = 0.55;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BacStatus {
    Sober,
    MildImpairment,
    Impaired,
    LegallyIntoxicated,
    SeverelyIntoxicated,
}

impl BacStatus {
    pub fn from_bac(bac: f64) -> Self {
        if bac <= 0.0 {
            BacStatus::Sober
        } else if bac < 0.05 {
            BacStatus::MildImpairment
        } else if bac < 0.08 {
            BacStatus::Impaired
        } else if bac < 0.15 {
            BacStatus::LegallyIntoxicated
        } else {
            BacStatus::SeverelyIntoxicated
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BacStatus::Sober => "Sober",
            BacStatus::MildImpairment => "Mild impairment",
            BacStatus::Impaired => "Impaired",
            BacStatus::LegallyIntoxicated => "Legally intoxicated",
            BacStatus::SeverelyIntoxicated => "Severely intoxicated",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BacResult {
    /// blood alcohol concentration in percent, never negative
    pub bac: f64,
    pub status: BacStatus,
    pub hours_until_sober: f64,
}

/// Widmark estimate: `(drinks·14 g) / (body weight g · r) · 100 − 0.015 · hours`,
/// with `r` = 0.68 for men and 0.55 for women, clamped at zero.
pub fn bac(weight_kg: f64, gender: Gender, drinks: f64, hours: f64) -> Result<BacResult> {
    let weight_kg = require_positive("weight", weight_kg)?;
    if !drinks.is_finite() || drinks < 0.0 {
        bail!("drinks must be zero or more, got {}", drinks);
    }
    if !hours.is_finite() || hours < 0.0 {
        bail!("hours must be zero or more, got {}", hours);
    }
    let r = match formula_sex(gender)? {
        Gender::Male => MALE_DISTRIBUTION,
        _ => FEMALE_DISTRIBUTION,
    };

    let alcohol_g = drinks * GRAMS_PER_DRINK;
    let body_g = weight_kg * 1000.0;
    let bac = (alcohol_g / (body_g * r) * 100.0 - ELIMINATION_RATE * hours).max(0.0);

    Ok(BacResult {
        bac,
        status: BacStatus::from_bac(bac),
        hours_until_sober: bac / ELIMINATION_RATE,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn widmark_reference_case() {
        let r = bac(70.0, Gender::Male, 2.0, 1.0).unwrap();
        let expected = (2.0 * 14.0) / (70_000.0 * 0.68) * 100.0 - 0.015;
        assert!((r.bac - expected).abs() < 1e-12);
        assert!((r.bac - 0.0438).abs() < 1e-4);
        assert_eq!(r.status, BacStatus::MildImpairment);
        assert!((r.hours_until_sober - expected / 0.015).abs() < 1e-9);
    }

    #[test]
    fn clamps_at_zero() {
        let r = bac(90.0, Gender::Female, 1.0, 10.0).unwrap();
        assert_eq!(r.bac, 0.0);
        assert_eq!(r.status, BacStatus::Sober);
        assert_eq!(r.hours_until_sober, 0.0);
    }

    #[test]
    fn women_reach_higher_concentration() {
        let m = bac(70.0, Gender::Male, 3.0, 0.0).unwrap();
        let f = bac(70.0, Gender::Female, 3.0, 0.0).unwrap();
        assert!(f.bac > m.bac);
    }

    #[test]
    fn rejects_bad_input() {
        assert!(bac(0.0, Gender::Male, 1.0, 1.0).is_err());
        assert!(bac(70.0, Gender::Male, -1.0, 1.0).is_err());
        assert!(bac(70.0, Gender::Male, 1.0, f64::INFINITY).is_err());
    }
}
