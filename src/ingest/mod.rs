//! File decoding: turns an uploaded CSV / TSV / spreadsheet / JSON file into a
//! [`Dataset`] of untyped rows.

pub mod cell;
pub mod csv_reader;
pub mod json;
pub mod xlsx;

pub use cell::{clean_str, parse_number, Scalar};

use anyhow::{anyhow, bail, Context, Result};
use rayon::prelude::*;
use serde::Serialize;
use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{debug, info, instrument};

/// One decoded record. Cells are aligned with [`Dataset::headers`]; a record
/// shorter than the header row is padded with `Scalar::Empty`.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct RawRow(pub Vec<Scalar>);

impl RawRow {
    pub fn get(&self, idx: usize) -> &Scalar {
        const EMPTY: &Scalar = &Scalar::Empty;
        self.0.get(idx).unwrap_or(EMPTY)
    }

    pub fn values(&self) -> impl Iterator<Item = &Scalar> {
        self.0.iter()
    }

    fn is_blank(&self) -> bool {
        self.0.iter().all(Scalar::is_empty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dataset {
    /// File name the rows came from.
    pub source: String,
    pub headers: Vec<String>,
    pub rows: Vec<RawRow>,
}

impl Dataset {
    /// Build a dataset, cleaning headers and dropping blank rows.
    pub fn new(source: impl Into<String>, headers: Vec<String>, rows: Vec<RawRow>) -> Self {
        let headers = dedupe_headers(headers);
        let width = headers.len();
        let rows = rows
            .into_iter()
            .filter(|r| !r.is_blank())
            .map(|mut r| {
                r.0.resize(width, Scalar::Empty);
                r
            })
            .collect();
        Self {
            source: source.into(),
            headers,
            rows,
        }
    }
}

/// Supported upload formats, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Csv,
    Tsv,
    Spreadsheet,
    Json,
}

impl Format {
    pub fn from_name(name: &str) -> Option<Self> {
        let ext = Path::new(name)
            .extension()
            .and_then(|e| e.to_str())?
            .to_ascii_lowercase();
        match ext.as_str() {
            "csv" => Some(Format::Csv),
            "tsv" | "txt" => Some(Format::Tsv),
            "xlsx" | "xls" | "xlsm" | "xlsb" | "ods" => Some(Format::Spreadsheet),
            "json" => Some(Format::Json),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Format::Csv => "CSV",
            Format::Tsv => "TSV",
            Format::Spreadsheet => "Spreadsheet",
            Format::Json => "JSON",
        }
    }
}

/// Read and decode a file from disk.
#[instrument(level = "info", skip(path), fields(path = %path.as_ref().display()))]
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<Dataset> {
    let path = path.as_ref();
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| anyhow!("path {:?} has no usable file name", path))?;
    let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
    decode_bytes(name, bytes)
}

/// Decode an in-memory upload. `name` only selects the format and labels the
/// dataset.
pub fn decode_bytes(name: &str, bytes: Vec<u8>) -> Result<Dataset> {
    let format = Format::from_name(name)
        .ok_or_else(|| anyhow!("unsupported file type for `{}`", name))?;
    let start = Instant::now();
    debug!(name, format = format.as_str(), size = bytes.len(), "decoding");

    let dataset = match format {
        Format::Csv => csv_reader::decode_delimited(name, &bytes, b',')?,
        Format::Tsv => csv_reader::decode_delimited(name, &bytes, b'\t')?,
        Format::Spreadsheet => xlsx::decode_workbook(name, bytes)?,
        Format::Json => json::decode_json(name, &bytes)?,
    };

    if dataset.rows.is_empty() {
        bail!("`{}` contains no rows", name);
    }
    info!(
        name,
        rows = dataset.rows.len(),
        columns = dataset.headers.len(),
        elapsed = ?start.elapsed(),
        "decoded"
    );
    Ok(dataset)
}

/// Decode several files in parallel, returning them in input order.
pub fn decode_files(paths: &[PathBuf]) -> Result<Vec<Dataset>> {
    paths.par_iter().map(decode_file).collect()
}

/// Trim headers, name blank ones `column_<n>` and suffix duplicates
/// `_2`, `_3`, ... skipping any suffixed name already in use.
fn dedupe_headers(headers: Vec<String>) -> Vec<String> {
    let mut taken: HashSet<String> = HashSet::new();
    headers
        .into_iter()
        .enumerate()
        .map(|(i, h)| {
            let cleaned = clean_str(&h);
            let base = if cleaned.is_empty() {
                format!("column_{}", i + 1)
            } else {
                cleaned
            };
            let mut name = base.clone();
            let mut n = 1;
            while taken.contains(&name) {
                n += 1;
                name = format!("{}_{}", base, n);
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn dedupes_and_names_headers() {
        let ds = Dataset::new(
            "t.csv",
            vec!["a".into(), " a ".into(), "".into(), "\"b\"".into()],
            vec![RawRow(vec![Scalar::Number(1.0)])],
        );
        assert_eq!(ds.headers, vec!["a", "a_2", "column_3", "b"]);
        assert_eq!(ds.rows[0].0.len(), 4);
        assert_eq!(ds.rows[0].get(3), &Scalar::Empty);
    }

    #[test]
    fn suffixed_duplicates_never_collide() {
        let headers = |names: &[&str]| -> Vec<String> {
            let ds = Dataset::new(
                "t.csv",
                names.iter().map(|s| s.to_string()).collect(),
                vec![RawRow(vec![Scalar::Number(1.0)])],
            );
            ds.headers
        };
        assert_eq!(headers(&["a", "a_2", "a"]), vec!["a", "a_2", "a_3"]);
        assert_eq!(headers(&["a", "a", "a_2"]), vec!["a", "a_2", "a_2_2"]);
        assert_eq!(headers(&["a", "a", "a"]), vec!["a", "a_2", "a_3"]);
        assert_eq!(
            headers(&["", "column_1", "x"]),
            vec!["column_1", "column_1_2", "x"]
        );
    }

    #[test]
    fn format_from_extension() {
        assert_eq!(Format::from_name("Sales.CSV"), Some(Format::Csv));
        assert_eq!(Format::from_name("x.xlsx"), Some(Format::Spreadsheet));
        assert_eq!(Format::from_name("x.json"), Some(Format::Json));
        assert_eq!(Format::from_name("x.pdf"), None);
        assert_eq!(Format::from_name("noext"), None);
    }

    #[test]
    fn rejects_unknown_and_empty() {
        assert!(decode_bytes("notes.pdf", b"abc".to_vec()).is_err());
        assert!(decode_bytes("empty.csv", b"a,b\n".to_vec()).is_err());
        assert!(decode_bytes("empty.json", b"[]".to_vec()).is_err());
    }

    #[test]
    fn decodes_files_in_order() -> Result<()> {
        let mut first = tempfile::Builder::new().suffix(".csv").tempfile()?;
        writeln!(first, "drug,price\nA,1\nB,2")?;
        let mut second = tempfile::Builder::new().suffix(".json").tempfile()?;
        write!(second, r#"[{{"drug":"C","price":3}}]"#)?;

        let paths = vec![first.path().to_path_buf(), second.path().to_path_buf()];
        let sets = decode_files(&paths)?;
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[0].rows.len(), 2);
        assert_eq!(sets[1].rows[0].get(0), &Scalar::Text("C".into()));
        Ok(())
    }

    #[test]
    fn missing_file_is_an_error() {
        let tmp = NamedTempFile::new().unwrap();
        let path = tmp.path().with_extension("csv");
        assert!(decode_file(&path).is_err());
    }
}
