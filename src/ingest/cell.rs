use serde::{Deserialize, Serialize};
use std::fmt;

/// A single decoded cell. Uploaded files carry no schema, so every value is
/// one of these four shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum Scalar {
    Number(f64),
    Bool(bool),
    Text(String),
    #[default]
    Empty,
}

impl Scalar {
    /// Type a raw text cell: empty → `Empty`, numeric → `Number`,
    /// `true`/`false` → `Bool`, anything else → `Text`.
    pub fn from_text(raw: &str) -> Self {
        let cleaned = clean_str(raw);
        if cleaned.is_empty() {
            return Scalar::Empty;
        }
        if let Some(n) = parse_number(&cleaned) {
            return Scalar::Number(n);
        }
        match cleaned.to_ascii_lowercase().as_str() {
            "true" => Scalar::Bool(true),
            "false" => Scalar::Bool(false),
            _ => Scalar::Text(cleaned),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            Scalar::Empty => true,
            Scalar::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Scalar::Number(n) if n.is_finite() => Some(*n),
            Scalar::Text(s) => parse_number(s),
            _ => None,
        }
    }

    /// Text rendering used for search, keyword matching and text fields.
    /// `None` for empty cells.
    pub fn as_text(&self) -> Option<String> {
        match self {
            Scalar::Empty => None,
            Scalar::Text(s) => {
                let t = s.trim();
                if t.is_empty() {
                    None
                } else {
                    Some(t.to_string())
                }
            }
            other => Some(other.to_string()),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => write!(f, "{}", *n as i64),
            Scalar::Number(n) => write!(f, "{}", n),
            Scalar::Bool(b) => write!(f, "{}", b),
            Scalar::Text(s) => f.write_str(s),
            Scalar::Empty => Ok(()),
        }
    }
}

/// Trim whitespace + strip outer quotes if present.
pub fn clean_str(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.len() >= 2 && trimmed.starts_with('"') && trimmed.ends_with('"') {
        trimmed[1..trimmed.len() - 1].trim().to_string()
    } else {
        trimmed.to_string()
    }
}

const CURRENCY_PREFIXES: &[char] = &['$', '€', '£', '₹', '¥'];

/// Lenient numeric parse: tolerates one leading currency symbol and `,`
/// thousands separators. Rejects NaN/inf and anything with letters.
pub fn parse_number(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    let (negative, s) = match s.strip_prefix('-') {
        Some(rest) => (true, rest.trim_start()),
        None => (false, s),
    };
    let s = s.trim_start_matches(CURRENCY_PREFIXES).trim_start();
    if s.is_empty() || !s.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    let digits: String = if s.contains(',') {
        // only treat commas as thousands separators when grouped by three
        let int_part = s.split('.').next().unwrap_or(s);
        let groups: Vec<&str> = int_part.split(',').collect();
        let grouped = groups.len() > 1
            && !groups[0].is_empty()
            && groups[0].len() <= 3
            && groups[1..].iter().all(|g| g.len() == 3);
        if !grouped {
            return None;
        }
        s.replace(',', "")
    } else {
        s.to_string()
    };
    let n: f64 = digits.parse().ok()?;
    if !n.is_finite() {
        return None;
    }
    Some(if negative { -n } else { n })
}
