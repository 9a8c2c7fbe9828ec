use chrono::{Datelike, NaiveDate};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

use crate::normalize::NormalizedRow;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NamedCount {
    pub name: String,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MedicineStat {
    pub name: String,
    pub count: usize,
    pub revenue: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct YearMonth {
    pub year: i32,
    pub month: u32,
}

impl YearMonth {
    pub fn of(date: NaiveDate) -> Self {
        Self {
            year: date.year(),
            month: date.month(),
        }
    }

    pub fn next(&self) -> Self {
        if self.month == 12 {
            Self {
                year: self.year + 1,
                month: 1,
            }
        } else {
            Self {
                year: self.year,
                month: self.month + 1,
            }
        }
    }

    pub fn label(&self) -> String {
        format!("{:04}-{:02}", self.year, self.month)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MonthlyRevenue {
    pub month: String,
    #[serde(skip)]
    pub period: YearMonth,
    pub revenue: f64,
    pub count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LowStockItem {
    pub medicine: String,
    pub stock: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Summary {
    pub total_records: usize,
    pub total_revenue: f64,
    pub average_amount: Option<f64>,
    pub unique_medicines: usize,
    pub unique_doctors: usize,
    pub unique_patients: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
}

pub fn summary(rows: &[&NormalizedRow]) -> Summary {
    let amounts: Vec<f64> = rows.iter().filter_map(|r| r.amount).collect();
    let total_revenue: f64 = amounts.iter().sum();
    Summary {
        total_records: rows.len(),
        total_revenue,
        average_amount: (!amounts.is_empty()).then(|| total_revenue / amounts.len() as f64),
        unique_medicines: distinct(rows, |r| r.medicine_name.as_deref()),
        unique_doctors: distinct(rows, |r| r.doctor.as_deref()),
        unique_patients: distinct(rows, |r| r.patient.as_deref()),
        first_date: rows.iter().filter_map(|r| r.date).min(),
        last_date: rows.iter().filter_map(|r| r.date).max(),
    }
}

fn distinct<'a>(
    rows: &[&'a NormalizedRow],
    field: impl Fn(&'a NormalizedRow) -> Option<&'a str>,
) -> usize {
    rows.iter()
        .filter_map(|r| field(*r))
        .collect::<HashSet<_>>()
        .len()
}

/// Most prescribed medicines; ties by revenue, then name.
pub fn top_medicines(rows: &[&NormalizedRow], limit: usize) -> Vec<MedicineStat> {
    let mut by_name: HashMap<&str, (usize, f64)> = HashMap::new();
    for row in rows {
        if let Some(name) = row.medicine_name.as_deref() {
            let entry = by_name.entry(name).or_default();
            entry.0 += 1;
            entry.1 += row.amount.unwrap_or(0.0);
        }
    }
    let mut stats: Vec<MedicineStat> = by_name
        .into_iter()
        .map(|(name, (count, revenue))| MedicineStat {
            name: name.to_string(),
            count,
            revenue,
        })
        .collect();
    stats.sort_by(|a, b| {
        b.count
            .cmp(&a.count)
            .then_with(|| b.revenue.total_cmp(&a.revenue))
            .then_with(|| a.name.cmp(&b.name))
    });
    stats.truncate(limit);
    stats
}

/// Revenue per calendar month, oldest first. Undated rows are skipped;
/// dated rows without an amount still count as a transaction.
pub fn monthly_revenue(rows: &[&NormalizedRow]) -> Vec<MonthlyRevenue> {
    let mut months: BTreeMap<YearMonth, (f64, usize)> = BTreeMap::new();
    for row in rows {
        if let Some(date) = row.date {
            let entry = months.entry(YearMonth::of(date)).or_default();
            entry.0 += row.amount.unwrap_or(0.0);
            entry.1 += 1;
        }
    }
    months
        .into_iter()
        .map(|(period, (revenue, count))| MonthlyRevenue {
            month: period.label(),
            period,
            revenue,
            count,
        })
        .collect()
}

/// Medicines at or below `threshold`, lowest stock first. A medicine listed
/// on several rows appears once with its lowest stock.
pub fn low_stock(rows: &[&NormalizedRow], threshold: u64) -> Vec<LowStockItem> {
    let mut lowest: HashMap<&str, u64> = HashMap::new();
    for row in rows {
        if let (Some(name), Some(stock)) = (row.medicine_name.as_deref(), row.stock) {
            if stock <= threshold {
                let entry = lowest.entry(name).or_insert(stock);
                *entry = (*entry).min(stock);
            }
        }
    }
    let mut items: Vec<LowStockItem> = lowest
        .into_iter()
        .map(|(medicine, stock)| LowStockItem {
            medicine: medicine.to_string(),
            stock,
        })
        .collect();
    items.sort_by(|a, b| a.stock.cmp(&b.stock).then_with(|| a.medicine.cmp(&b.medicine)));
    items
}

pub const AGE_BUCKETS: &[(&str, u32, u32)] = &[
    ("0-17", 0, 17),
    ("18-30", 18, 30),
    ("31-45", 31, 45),
    ("46-60", 46, 60),
    ("61-75", 61, 75),
    ("76+", 76, u32::MAX),
];

/// Fixed buckets in order, empty ones included.
pub fn age_histogram(rows: &[&NormalizedRow]) -> Vec<NamedCount> {
    let mut counts = vec![0usize; AGE_BUCKETS.len()];
    for age in rows.iter().filter_map(|r| r.age) {
        if let Some(i) = AGE_BUCKETS
            .iter()
            .position(|(_, lo, hi)| (*lo..=*hi).contains(&age))
        {
            counts[i] += 1;
        }
    }
    AGE_BUCKETS
        .iter()
        .zip(counts)
        .map(|((label, _, _), count)| NamedCount {
            name: label.to_string(),
            count,
        })
        .collect()
}

/// Frequency table, most common first then alphabetical.
pub fn count_by<'a, I>(values: I) -> Vec<NamedCount>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for v in values {
        *counts.entry(v).or_default() += 1;
    }
    let mut out: Vec<NamedCount> = counts
        .into_iter()
        .map(|(name, count)| NamedCount {
            name: name.to_string(),
            count,
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sale(name: &str, date: &str, amount: f64) -> NormalizedRow {
        NormalizedRow {
            medicine_name: Some(name.into()),
            date: NaiveDate::parse_from_str(date, "%Y-%m-%d").ok(),
            amount: Some(amount),
            ..Default::default()
        }
    }

    #[test]
    fn ranks_medicines_by_count_then_revenue() {
        let rows = vec![
            sale("B", "2024-01-01", 5.0),
            sale("A", "2024-01-02", 1.0),
            sale("A", "2024-01-03", 1.0),
            sale("C", "2024-01-04", 9.0),
        ];
        let refs: Vec<&NormalizedRow> = rows.iter().collect();
        let top = top_medicines(&refs, 2);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].name, "A");
        assert_eq!(top[0].count, 2);
        assert_eq!(top[1].name, "C");
    }

    #[test]
    fn groups_revenue_by_month() {
        let rows = vec![
            sale("A", "2024-02-10", 10.0),
            sale("A", "2024-01-05", 2.5),
            sale("B", "2024-02-11", 5.0),
            NormalizedRow::default(),
        ];
        let refs: Vec<&NormalizedRow> = rows.iter().collect();
        let months = monthly_revenue(&refs);
        assert_eq!(months.len(), 2);
        assert_eq!(months[0].month, "2024-01");
        assert_eq!(months[1].month, "2024-02");
        assert_eq!(months[1].revenue, 15.0);
        assert_eq!(months[1].count, 2);
    }

    #[test]
    fn low_stock_keeps_lowest_per_medicine() {
        let mut rows = Vec::new();
        for (name, stock) in [("A", 4), ("A", 1), ("B", 0), ("C", 9)] {
            rows.push(NormalizedRow {
                medicine_name: Some(name.into()),
                stock: Some(stock),
                ..Default::default()
            });
        }
        let refs: Vec<&NormalizedRow> = rows.iter().collect();
        let items = low_stock(&refs, 5);
        assert_eq!(
            items,
            vec![
                LowStockItem { medicine: "B".into(), stock: 0 },
                LowStockItem { medicine: "A".into(), stock: 1 },
            ]
        );
    }

    #[test]
    fn age_buckets_include_empty_ones() {
        let rows: Vec<NormalizedRow> = [5, 18, 30, 80]
            .into_iter()
            .map(|a| NormalizedRow {
                age: Some(a),
                ..Default::default()
            })
            .collect();
        let refs: Vec<&NormalizedRow> = rows.iter().collect();
        let hist = age_histogram(&refs);
        let counts: Vec<usize> = hist.iter().map(|b| b.count).collect();
        assert_eq!(counts, vec![1, 2, 0, 0, 0, 1]);
        assert_eq!(hist[5].name, "76+");
    }

    #[test]
    fn summary_ignores_missing_fields() {
        let mut rows = vec![sale("A", "2024-01-01", 10.0), sale("B", "2024-03-01", 20.0)];
        rows.push(NormalizedRow {
            doctor: Some("Dr. Rao".into()),
            ..Default::default()
        });
        let refs: Vec<&NormalizedRow> = rows.iter().collect();
        let s = summary(&refs);
        assert_eq!(s.total_records, 3);
        assert_eq!(s.total_revenue, 30.0);
        assert_eq!(s.average_amount, Some(15.0));
        assert_eq!(s.unique_medicines, 2);
        assert_eq!(s.unique_doctors, 1);
        assert_eq!(s.unique_patients, 0);
        assert_eq!(s.first_date, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(s.last_date, NaiveDate::from_ymd_opt(2024, 3, 1));
    }

    #[test]
    fn year_month_rolls_over() {
        let dec = YearMonth { year: 2024, month: 12 };
        assert_eq!(dec.next(), YearMonth { year: 2025, month: 1 });
        assert_eq!(dec.next().label(), "2025-01");
    }
}
