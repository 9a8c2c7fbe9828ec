//! Rule-based dashboard insights built from the computed views.

use serde::Serialize;

use super::{
    anomaly::{Anomaly, AnomalyKind, Severity},
    forecast::{Forecast, Trend},
    AnalysisResult,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InsightCategory {
    Trend,
    Sales,
    Inventory,
    Pricing,
    Prescribing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Insight {
    pub category: InsightCategory,
    pub severity: Severity,
    pub title: String,
    pub message: String,
}

/// Share of all prescriptions above which the top medicine gets called out.
const DOMINANT_SHARE: f64 = 0.3;

pub fn generate_insights(
    result: &AnalysisResult,
    forecast: Option<&Forecast>,
    anomalies: &[Anomaly],
) -> Vec<Insight> {
    let mut out = Vec::new();

    if let Some(f) = forecast {
        let pct = (f.average_growth - 1.0) * 100.0;
        let severity = match f.trend {
            Trend::Decreasing => Severity::Medium,
            _ => Severity::Low,
        };
        out.push(Insight {
            category: InsightCategory::Trend,
            severity,
            title: format!("Sales trend is {}", f.trend.as_str()),
            message: format!(
                "Average monthly growth of {:+.1}% over {}; next quarter projected at {:.2}",
                pct,
                f.basis.join(", "),
                f.next_quarter_total
            ),
        });
    }

    let total = result.summary.total_records;
    if let Some(top) = result.top_medicines.first() {
        if total > 0 {
            let share = top.count as f64 / total as f64;
            if share >= DOMINANT_SHARE {
                out.push(Insight {
                    category: InsightCategory::Sales,
                    severity: Severity::Low,
                    title: format!("{} dominates sales", top.name),
                    message: format!(
                        "{} accounts for {:.0}% of records ({} of {})",
                        top.name,
                        share * 100.0,
                        top.count,
                        total
                    ),
                });
            }
        }
    }

    let count = |kind: AnomalyKind| anomalies.iter().filter(|a| a.kind == kind).count();

    let out_of_stock = count(AnomalyKind::OutOfStock);
    let low = count(AnomalyKind::LowStock);
    if out_of_stock + low > 0 {
        out.push(Insight {
            category: InsightCategory::Inventory,
            severity: if out_of_stock > 0 {
                Severity::High
            } else {
                Severity::Medium
            },
            title: "Stock needs attention".to_string(),
            message: format!(
                "{} item(s) out of stock and {} running low",
                out_of_stock, low
            ),
        });
    }

    let outliers = count(AnomalyKind::PriceOutlier);
    if outliers > 0 {
        out.push(Insight {
            category: InsightCategory::Pricing,
            severity: Severity::High,
            title: "Unusual prices detected".to_string(),
            message: format!("{} record(s) priced far outside the norm", outliers),
        });
    }

    for a in anomalies
        .iter()
        .filter(|a| a.kind == AnomalyKind::PrescriberConcentration)
    {
        out.push(Insight {
            category: InsightCategory::Prescribing,
            severity: a.severity,
            title: format!(
                "Concentrated prescribing by {}",
                a.subject.as_deref().unwrap_or("a prescriber")
            ),
            message: a.message.clone(),
        });
    }

    out
}
