use serde::Serialize;
use std::collections::HashMap;
use tracing::debug;

use super::AnalysisSettings;
use crate::normalize::NormalizedRow;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Low,
    Medium,
    High,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalyKind {
    PriceOutlier,
    OutOfStock,
    LowStock,
    PrescriberConcentration,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Anomaly {
    pub kind: AnomalyKind,
    pub severity: Severity,
    /// index into the analyzed rows; `None` for prescriber-level flags
    pub row: Option<usize>,
    pub subject: Option<String>,
    pub value: f64,
    pub message: String,
}

/// Population mean and standard deviation; `None` for an empty slice.
pub fn mean_std(values: &[f64]) -> Option<(f64, f64)> {
    if values.is_empty() {
        return None;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    Some((mean, var.sqrt()))
}

/// Rows whose amount lies more than `z_threshold` standard deviations from
/// the mean. Nothing is flagged when the deviation is zero.
pub fn price_outliers(rows: &[&NormalizedRow], z_threshold: f64) -> Vec<Anomaly> {
    let priced: Vec<(usize, f64)> = rows
        .iter()
        .enumerate()
        .filter_map(|(i, r)| r.amount.map(|a| (i, a)))
        .collect();
    if priced.len() < 2 {
        return Vec::new();
    }
    let amounts: Vec<f64> = priced.iter().map(|(_, a)| *a).collect();
    let Some((mean, std)) = mean_std(&amounts) else {
        return Vec::new();
    };
    if std == 0.0 {
        return Vec::new();
    }
    debug!(mean, std, n = amounts.len(), "price distribution");

    priced
        .into_iter()
        .filter_map(|(i, amount)| {
            let z = (amount - mean) / std;
            (z.abs() > z_threshold).then(|| Anomaly {
                kind: AnomalyKind::PriceOutlier,
                severity: Severity::High,
                row: Some(i),
                subject: rows[i].medicine_name.clone(),
                value: amount,
                message: format!(
                    "price {:.2} is {:.1} standard deviations from the mean {:.2}",
                    amount,
                    z.abs(),
                    mean
                ),
            })
        })
        .collect()
}

/// `stock == 0` is high severity, `0 < stock <= threshold` medium.
pub fn stock_alerts(rows: &[&NormalizedRow], threshold: u64) -> Vec<Anomaly> {
    rows.iter()
        .enumerate()
        .filter_map(|(i, r)| {
            let stock = r.stock?;
            let name = r.medicine_name.as_deref().unwrap_or("unnamed item");
            let (kind, severity, message) = if stock == 0 {
                (
                    AnomalyKind::OutOfStock,
                    Severity::High,
                    format!("{} is out of stock", name),
                )
            } else if stock <= threshold {
                (
                    AnomalyKind::LowStock,
                    Severity::Medium,
                    format!("{} is low on stock ({} left)", name, stock),
                )
            } else {
                return None;
            };
            Some(Anomaly {
                kind,
                severity,
                row: Some(i),
                subject: r.medicine_name.clone(),
                value: stock as f64,
                message,
            })
        })
        .collect()
}

/// Doctors with at least `min_prescriptions` rows whose most prescribed
/// medicine makes up more than `threshold` of them.
pub fn prescriber_concentration(
    rows: &[&NormalizedRow],
    threshold: f64,
    min_prescriptions: usize,
) -> Vec<Anomaly> {
    let mut by_doctor: HashMap<&str, HashMap<&str, usize>> = HashMap::new();
    for row in rows {
        if let (Some(doctor), Some(medicine)) =
            (row.doctor.as_deref(), row.medicine_name.as_deref())
        {
            *by_doctor
                .entry(doctor)
                .or_default()
                .entry(medicine)
                .or_default() += 1;
        }
    }

    let mut flagged: Vec<Anomaly> = by_doctor
        .into_iter()
        .filter_map(|(doctor, medicines)| {
            let total: usize = medicines.values().sum();
            if total < min_prescriptions {
                return None;
            }
            let (top, top_count) = medicines
                .into_iter()
                .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(a.0)))?;
            let share = top_count as f64 / total as f64;
            (share > threshold).then(|| Anomaly {
                kind: AnomalyKind::PrescriberConcentration,
                severity: Severity::Medium,
                row: None,
                subject: Some(doctor.to_string()),
                value: share,
                message: format!(
                    "{} prescribed {} in {:.0}% of {} prescriptions",
                    doctor,
                    top,
                    share * 100.0,
                    total
                ),
            })
        })
        .collect();
    flagged.sort_by(|a, b| a.subject.cmp(&b.subject));
    flagged
}

/// All anomaly checks, most severe first (stable within a severity).
pub fn detect_anomalies(rows: &[&NormalizedRow], settings: &AnalysisSettings) -> Vec<Anomaly> {
    let mut all = price_outliers(rows, settings.z_score_threshold);
    all.extend(stock_alerts(rows, settings.low_stock_threshold));
    all.extend(prescriber_concentration(
        rows,
        settings.concentration_threshold,
        settings.min_prescriptions,
    ));
    all.sort_by(|a, b| b.severity.cmp(&a.severity));
    all
}
