//! Dashboard analysis: aggregate views, next-quarter forecast, anomaly
//! flags and the insights built on top of them. Everything is recomputed
//! from the filtered rows on each call.

pub mod aggregate;
pub mod anomaly;
pub mod forecast;
pub mod insights;

pub use aggregate::{LowStockItem, MedicineStat, MonthlyRevenue, NamedCount, Summary};
pub use anomaly::{detect_anomalies, Anomaly, AnomalyKind, Severity};
pub use forecast::{forecast_next_quarter, Forecast, Trend};
pub use insights::{generate_insights, Insight};

use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{info, instrument};

use crate::normalize::NormalizedRow;

/// Tunables for aggregation and anomaly detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisSettings {
    pub top_n: usize,
    pub low_stock_threshold: u64,
    pub z_score_threshold: f64,
    pub concentration_threshold: f64,
    pub min_prescriptions: usize,
}

impl Default for AnalysisSettings {
    fn default() -> Self {
        Self {
            top_n: 10,
            low_stock_threshold: 5,
            z_score_threshold: 3.0,
            concentration_threshold: 0.7,
            min_prescriptions: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AnalysisResult {
    pub summary: Summary,
    pub top_medicines: Vec<MedicineStat>,
    pub monthly_revenue: Vec<MonthlyRevenue>,
    pub low_stock: Vec<LowStockItem>,
    pub prescriber_frequency: Vec<NamedCount>,
    pub age_histogram: Vec<NamedCount>,
    pub gender_histogram: Vec<NamedCount>,
    pub location_histogram: Vec<NamedCount>,
    pub country_histogram: Vec<NamedCount>,
    pub payment_methods: Vec<NamedCount>,
    pub drug_categories: Vec<NamedCount>,
}

#[instrument(level = "info", skip_all, fields(rows = rows.len()))]
pub fn analyze(rows: &[&NormalizedRow], settings: &AnalysisSettings) -> AnalysisResult {
    let start = Instant::now();

    let mut prescriber_frequency =
        aggregate::count_by(rows.iter().filter_map(|r| r.doctor.as_deref()));
    prescriber_frequency.truncate(settings.top_n);

    let result = AnalysisResult {
        summary: aggregate::summary(rows),
        top_medicines: aggregate::top_medicines(rows, settings.top_n),
        monthly_revenue: aggregate::monthly_revenue(rows),
        low_stock: aggregate::low_stock(rows, settings.low_stock_threshold),
        prescriber_frequency,
        age_histogram: aggregate::age_histogram(rows),
        gender_histogram: aggregate::count_by(
            rows.iter().filter_map(|r| r.gender.map(|g| g.as_str())),
        ),
        location_histogram: aggregate::count_by(
            rows.iter().filter_map(|r| r.location.as_deref()),
        ),
        country_histogram: aggregate::count_by(rows.iter().filter_map(|r| r.country.as_deref())),
        payment_methods: aggregate::count_by(
            rows.iter().filter_map(|r| r.payment_method.as_deref()),
        ),
        drug_categories: aggregate::count_by(
            rows.iter().filter_map(|r| r.drug_category.as_deref()),
        ),
    };

    info!(elapsed = ?start.elapsed(), "analysis complete");
    result
}

/// Everything the dashboard shows for one filtered row set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub analysis: AnalysisResult,
    pub forecast: Option<Forecast>,
    pub anomalies: Vec<Anomaly>,
    pub insights: Vec<Insight>,
}

pub fn build_report(rows: &[&NormalizedRow], settings: &AnalysisSettings) -> Report {
    let analysis = analyze(rows, settings);
    let forecast = forecast_next_quarter(&analysis.monthly_revenue);
    let anomalies = detect_anomalies(rows, settings);
    let insights = generate_insights(&analysis, forecast.as_ref(), &anomalies);
    Report {
        analysis,
        forecast,
        anomalies,
        insights,
    }
}
