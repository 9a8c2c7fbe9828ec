pub mod region;

pub use region::{detect_regions, Region, RegionCount};

use anyhow::{bail, Result};
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use std::fmt;
use tracing::debug;

use crate::normalize::NormalizedRow;

/// Widest accepted window, ten thousand 365-day years.
pub const MAX_WINDOW_DAYS: u32 = 3_650_000;

/// Rolling window ending at a caller-supplied reference date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
pub enum TimeWindow {
    #[default]
    All,
    Days(u32),
}

impl TimeWindow {
    /// `all`, `<n>d`, `<n>w`, `<n>m` (30-day months, `6m` is 182 days) or
    /// `<n>y` (365-day years).
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim().to_ascii_lowercase();
        if s.is_empty() || s == "all" {
            return Ok(TimeWindow::All);
        }
        let split = s.char_indices().last().map_or(0, |(i, _)| i);
        let (num, unit) = s.split_at(split);
        let n: u32 = match num.parse() {
            Ok(n) if n > 0 => n,
            _ => bail!("invalid time window `{}`", s),
        };
        let days = match unit {
            "d" => Some(n),
            "w" => n.checked_mul(7),
            "m" if n == 6 => Some(182),
            "m" => n.checked_mul(30),
            "y" => n.checked_mul(365),
            _ => bail!("invalid time window unit in `{}` (use d, w, m or y)", s),
        };
        match days {
            Some(days) if days <= MAX_WINDOW_DAYS => Ok(TimeWindow::Days(days)),
            _ => bail!("time window `{}` is longer than {} days", s, MAX_WINDOW_DAYS),
        }
    }

    /// Inclusive `[reference - n days, reference]`. Undated rows never fall
    /// inside a bounded window.
    pub fn contains(&self, date: Option<NaiveDate>, reference: NaiveDate) -> bool {
        match self {
            TimeWindow::All => true,
            TimeWindow::Days(n) => match date {
                Some(d) => {
                    d <= reference
                        && reference
                            .checked_sub_signed(Duration::days(i64::from(*n)))
                            .map_or(true, |start| d >= start)
                }
                None => false,
            },
        }
    }
}

impl fmt::Display for TimeWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimeWindow::All => f.write_str("all"),
            TimeWindow::Days(n) => write!(f, "{}d", n),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FilterOptions {
    pub search: Option<String>,
    pub region: Option<Region>,
    pub window: TimeWindow,
}

impl FilterOptions {
    pub fn matches(&self, row: &NormalizedRow, reference: NaiveDate) -> bool {
        matches_search(row, self.search.as_deref())
            && self.region.map_or(true, |r| r.matches(row))
            && self.window.contains(row.date, reference)
    }
}

/// Case-insensitive substring search over every raw value. A blank query
/// matches everything.
pub fn matches_search(row: &NormalizedRow, query: Option<&str>) -> bool {
    let needle = match query.map(str::trim) {
        Some(q) if !q.is_empty() => q.to_lowercase(),
        _ => return true,
    };
    row.raw_texts().any(|v| v.to_lowercase().contains(&needle))
}

/// Rows passing every filter, in their original order.
pub fn apply<'a>(
    rows: &'a [NormalizedRow],
    opts: &FilterOptions,
    reference: NaiveDate,
) -> Vec<&'a NormalizedRow> {
    let kept: Vec<&NormalizedRow> = rows.iter().filter(|r| opts.matches(r, reference)).collect();
    debug!(
        total = rows.len(),
        kept = kept.len(),
        window = %opts.window,
        "applied filters"
    );
    kept
}
