use serde::Serialize;
use tracing::debug;

use super::aggregate::MonthlyRevenue;

const INCREASING_ABOVE: f64 = 1.05;
const DECREASING_BELOW: f64 = 0.95;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trend {
    Increasing,
    Stable,
    Decreasing,
}

impl Trend {
    pub fn from_growth(growth: f64) -> Self {
        if growth > INCREASING_ABOVE {
            Trend::Increasing
        } else if growth < DECREASING_BELOW {
            Trend::Decreasing
        } else {
            Trend::Stable
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Trend::Increasing => "increasing",
            Trend::Stable => "stable",
            Trend::Decreasing => "decreasing",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectedMonth {
    pub month: String,
    pub revenue: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Forecast {
    /// the three observed months the projection is based on
    pub basis: Vec<String>,
    pub average_growth: f64,
    pub trend: Trend,
    pub projected: Vec<ProjectedMonth>,
    pub next_quarter_total: f64,
}

/// Project the next three months from the last three observed ones.
///
/// Growth ratios `m2/m1` and `m3/m2` are averaged; a ratio whose denominator
/// is zero is left out. Month `k` of the projection is `m3 * g^k`. Returns
/// `None` with fewer than three months or no usable ratio.
pub fn forecast_next_quarter(monthly: &[MonthlyRevenue]) -> Option<Forecast> {
    if monthly.len() < 3 {
        debug!(months = monthly.len(), "not enough history to forecast");
        return None;
    }
    let last = &monthly[monthly.len() - 3..];
    let (m1, m2, m3) = (last[0].revenue, last[1].revenue, last[2].revenue);

    let ratios: Vec<f64> = [(m2, m1), (m3, m2)]
        .into_iter()
        .filter(|(_, denom)| *denom != 0.0)
        .map(|(num, denom)| num / denom)
        .collect();
    if ratios.is_empty() {
        debug!("all basis months are zero; no forecast");
        return None;
    }
    let growth = ratios.iter().sum::<f64>() / ratios.len() as f64;

    let mut period = last[2].period;
    let mut value = m3;
    let projected: Vec<ProjectedMonth> = (0..3)
        .map(|_| {
            period = period.next();
            value *= growth;
            ProjectedMonth {
                month: period.label(),
                revenue: value,
            }
        })
        .collect();
    let next_quarter_total = projected.iter().map(|p| p.revenue).sum();

    Some(Forecast {
        basis: last.iter().map(|m| m.month.clone()).collect(),
        average_growth: growth,
        trend: Trend::from_growth(growth),
        projected,
        next_quarter_total,
    })
}
