use anyhow::{Context, Result};
use csv::ReaderBuilder;
use std::io::Cursor;
use tracing::warn;

use super::{Dataset, RawRow, Scalar};

/// Decode delimited text. The first record is the header row; records with a
/// different field count are accepted (padded or truncated).
pub fn decode_delimited(name: &str, bytes: &[u8], delimiter: u8) -> Result<Dataset> {
    let text = String::from_utf8_lossy(bytes);
    // spreadsheet exports often lead with a BOM
    let text = text.trim_start_matches('\u{feff}');

    let mut rdr = ReaderBuilder::new()
        .has_headers(false)
        .delimiter(delimiter)
        .flexible(true)
        .from_reader(Cursor::new(text.as_bytes()));

    let mut records = rdr.records();
    let headers: Vec<String> = match records.next() {
        Some(first) => first
            .with_context(|| format!("CSV parse error in {} at header", name))?
            .iter()
            .map(str::to_string)
            .collect(),
        None => return Ok(Dataset::new(name, Vec::new(), Vec::new())),
    };

    let width = headers.len();
    let mut rows = Vec::new();
    let mut overlong = 0usize;
    for (idx, result) in records.enumerate() {
        let record =
            result.with_context(|| format!("CSV parse error in {} at record {}", name, idx + 1))?;
        if record.len() > width {
            overlong += 1;
        }
        let cells: Vec<Scalar> = record.iter().take(width).map(Scalar::from_text).collect();
        rows.push(RawRow(cells));
    }
    if overlong > 0 {
        warn!(
            name,
            overlong, width, "some records have more cells than headers; extras dropped"
        );
    }

    Ok(Dataset::new(name, headers, rows))
}
