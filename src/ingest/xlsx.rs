use anyhow::{anyhow, Context, Result};
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use std::io::Cursor;
use tracing::debug;

use super::{Dataset, RawRow, Scalar};
use crate::normalize::date_parser::excel_serial_to_date;

/// Decode the first worksheet of a workbook. The first non-empty row is the
/// header row.
pub fn decode_workbook(name: &str, bytes: Vec<u8>) -> Result<Dataset> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .with_context(|| format!("opening workbook {}", name))?;

    let sheet_names = workbook.sheet_names().to_vec();
    let first = sheet_names
        .first()
        .ok_or_else(|| anyhow!("workbook `{}` contains no sheets", name))?;
    debug!(name, sheet = %first, sheets = sheet_names.len(), "reading first sheet");

    let range = workbook
        .worksheet_range(first)
        .with_context(|| format!("reading sheet `{}` of {}", first, name))?;

    let mut rows = range
        .rows()
        .map(|r| r.iter().map(cell_to_scalar).collect::<Vec<_>>())
        .skip_while(|cells| cells.iter().all(Scalar::is_empty));

    let headers: Vec<String> = match rows.next() {
        Some(cells) => cells.iter().map(|c| c.to_string()).collect(),
        None => return Ok(Dataset::new(name, Vec::new(), Vec::new())),
    };
    let data = rows.map(RawRow).collect();

    Ok(Dataset::new(name, headers, data))
}

fn cell_to_scalar(cell: &Data) -> Scalar {
    match cell {
        Data::Empty | Data::Error(_) => Scalar::Empty,
        Data::Float(f) => Scalar::Number(*f),
        Data::Int(i) => Scalar::Number(*i as f64),
        Data::Bool(b) => Scalar::Bool(*b),
        Data::String(s) => Scalar::from_text(s),
        Data::DateTime(dt) => excel_serial_to_date(dt.as_f64())
            .map(|d| Scalar::Text(d.format("%Y-%m-%d").to_string()))
            .unwrap_or(Scalar::Number(dt.as_f64())),
        Data::DateTimeIso(s) | Data::DurationIso(s) => Scalar::Text(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_cells() {
        assert_eq!(cell_to_scalar(&Data::Int(4)), Scalar::Number(4.0));
        assert_eq!(cell_to_scalar(&Data::Empty), Scalar::Empty);
        assert_eq!(
            cell_to_scalar(&Data::String(" 12 ".into())),
            Scalar::Number(12.0)
        );
        assert_eq!(
            cell_to_scalar(&Data::DateTimeIso("2024-03-01T00:00:00".into())),
            Scalar::Text("2024-03-01T00:00:00".into())
        );
    }

    #[test]
    fn decodes_first_sheet_of_a_workbook() -> Result<()> {
        let bytes = include_bytes!("testdata/medicine_sales.xlsx").to_vec();
        let ds = decode_workbook("medicine_sales.xlsx", bytes)?;

        // the whitespace-only first row is skipped when picking the header row
        assert_eq!(ds.headers, vec!["Medicine Name", "Date", "Amount", "Stock"]);
        assert_eq!(ds.rows.len(), 2);

        let first = &ds.rows[0];
        assert_eq!(first.get(0), &Scalar::Text("Paracetamol".into()));
        assert_eq!(first.get(1), &Scalar::Text("2024-01-15".into()));
        assert_eq!(first.get(2), &Scalar::Number(12.5));
        assert_eq!(first.get(3), &Scalar::Number(40.0));

        let second = &ds.rows[1];
        assert_eq!(second.get(1), &Scalar::Text("2024-02-15".into()));
        assert_eq!(second.get(2), &Scalar::Number(8.0));
        assert_eq!(second.get(3), &Scalar::Number(0.0));
        Ok(())
    }

    #[test]
    fn workbook_rows_normalize_like_csv() -> Result<()> {
        let bytes = include_bytes!("testdata/medicine_sales.xlsx").to_vec();
        let ds = crate::ingest::decode_bytes("medicine_sales.xlsx", bytes)?;
        let (_, rows) = crate::normalize::normalize(&ds);
        assert_eq!(rows[0].date, chrono::NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(rows[0].amount, Some(12.5));
        assert_eq!(rows[1].stock, Some(0));
        Ok(())
    }

    #[test]
    fn garbage_is_not_a_workbook() {
        assert!(decode_workbook("x.xlsx", b"not a zip".to_vec()).is_err());
    }
}
