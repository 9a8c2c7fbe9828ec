use anyhow::{anyhow, bail, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::require_positive;

pub const KM_PER_MILE: f64 = 1.609_344;
/// Riegel fatigue exponent.
const RIEGEL_EXPONENT: f64 = 1.06;

static DURATION_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(?:(\d+):)?(\d{1,2}):(\d{1,2}(?:\.\d+)?)$").expect("duration regex")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    Kilometers,
    Miles,
}

impl DistanceUnit {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "km" | "kilometer" | "kilometers" | "kilometre" | "kilometres" => {
                Some(DistanceUnit::Kilometers)
            }
            "mi" | "mile" | "miles" => Some(DistanceUnit::Miles),
            _ => None,
        }
    }

    pub fn to_km(&self, distance: f64) -> f64 {
        match self {
            DistanceUnit::Kilometers => distance,
            DistanceUnit::Miles => distance * KM_PER_MILE,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PaceResult {
    pub distance_km: f64,
    pub total_seconds: f64,
    pub seconds_per_km: f64,
    pub seconds_per_mile: f64,
    /// `M:SS` per km
    pub pace_per_km: String,
    pub pace_per_mile: String,
    pub speed_kmh: f64,
    pub speed_mph: f64,
}

/// Parse `H:MM:SS`, `MM:SS` (seconds may carry a fraction).
pub fn parse_duration(s: &str) -> Result<Duration> {
    let caps = DURATION_RE
        .captures(s.trim())
        .ok_or_else(|| anyhow!("invalid duration `{}` (use H:MM:SS or MM:SS)", s))?;
    let hours: u64 = caps.get(1).map_or(Ok(0), |m| m.as_str().parse())?;
    let minutes: u64 = caps[2].parse()?;
    let seconds: f64 = caps[3].parse()?;
    if caps.get(1).is_some() && minutes >= 60 {
        bail!("minutes must be below 60 in `{}`", s);
    }
    if seconds >= 60.0 {
        bail!("seconds must be below 60 in `{}`", s);
    }
    let whole = hours
        .checked_mul(3600)
        .and_then(|h| h.checked_add(minutes * 60))
        .ok_or_else(|| anyhow!("duration `{}` is too long", s))?;
    let total = whole as f64 + seconds;
    if total <= 0.0 {
        bail!("duration must be longer than zero");
    }
    seconds_to_duration(total)
}

/// Render seconds as `H:MM:SS`, or `M:SS` under an hour.
pub fn format_duration(total_seconds: f64) -> String {
    let secs = total_seconds.round() as u64;
    let (h, m, s) = (secs / 3600, (secs % 3600) / 60, secs % 60);
    if h > 0 {
        format!("{}:{:02}:{:02}", h, m, s)
    } else {
        format!("{}:{:02}", m, s)
    }
}

pub fn pace(distance: f64, unit: DistanceUnit, duration: Duration) -> Result<PaceResult> {
    let distance = require_positive("distance", distance)?;
    let total_seconds = require_positive("duration", duration.as_secs_f64())?;
    let km = unit.to_km(distance);
    let miles = km / KM_PER_MILE;
    let seconds_per_km = total_seconds / km;
    let seconds_per_mile = total_seconds / miles;
    let hours = total_seconds / 3600.0;

    Ok(PaceResult {
        distance_km: km,
        total_seconds,
        seconds_per_km,
        seconds_per_mile,
        pace_per_km: format_duration(seconds_per_km),
        pace_per_mile: format_duration(seconds_per_mile),
        speed_kmh: km / hours,
        speed_mph: miles / hours,
    })
}

/// Riegel race-time prediction: `t2 = t1 · (d2/d1)^1.06`.
pub fn predict_time(known_km: f64, known: Duration, target_km: f64) -> Result<Duration> {
    let known_km = require_positive("known distance", known_km)?;
    let target_km = require_positive("target distance", target_km)?;
    let t1 = require_positive("known time", known.as_secs_f64())?;
    seconds_to_duration(t1 * (target_km / known_km).powf(RIEGEL_EXPONENT))
}

fn seconds_to_duration(secs: f64) -> Result<Duration> {
    Duration::try_from_secs_f64(secs)
        .map_err(|_| anyhow!("{} seconds is out of range for a duration", secs))
}
