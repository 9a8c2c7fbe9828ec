// src/export.rs

use anyhow::{Context, Result};
use arrow::{
    array::{ArrayRef, Date32Array, Float64Array, StringArray, UInt32Array, UInt64Array},
    datatypes::{DataType, Field, Schema},
    record_batch::RecordBatch,
};
use chrono::{DateTime, Datelike, NaiveDate, Utc};
use parquet::{arrow::ArrowWriter, basic::Compression, file::properties::WriterProperties};
use serde::Serialize;
use std::{
    fs::{self, File},
    io::{BufWriter, Write},
    path::Path,
    sync::Arc,
};
use tracing::{info, instrument};

use crate::analysis::Report;
use crate::normalize::{ColumnMapping, NormalizedRow};

/// Days from 0001-01-01 (CE day 1) to 1970-01-01.
const UNIX_EPOCH_DAYS_FROM_CE: i32 = 719_163;

fn date32(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - UNIX_EPOCH_DAYS_FROM_CE
}

pub fn rows_schema() -> Schema {
    Schema::new(vec![
        Field::new("medicine_name", DataType::Utf8, true),
        Field::new("date", DataType::Date32, true),
        Field::new("amount", DataType::Float64, true),
        Field::new("stock", DataType::UInt64, true),
        Field::new("doctor", DataType::Utf8, true),
        Field::new("patient", DataType::Utf8, true),
        Field::new("age", DataType::UInt32, true),
        Field::new("gender", DataType::Utf8, true),
        Field::new("location", DataType::Utf8, true),
        Field::new("country", DataType::Utf8, true),
        Field::new("payment_method", DataType::Utf8, true),
        Field::new("drug_category", DataType::Utf8, true),
    ])
}

fn text_column<'a>(
    rows: &[&'a NormalizedRow],
    field: impl Fn(&'a NormalizedRow) -> Option<&'a str>,
) -> ArrayRef {
    Arc::new(StringArray::from(
        rows.iter().map(|r| field(*r)).collect::<Vec<_>>(),
    ))
}

/// Canonical fields of `rows` as one Arrow batch.
pub fn rows_to_batch(rows: &[&NormalizedRow]) -> Result<RecordBatch> {
    let columns: Vec<ArrayRef> = vec![
        text_column(rows, |r| r.medicine_name.as_deref()),
        Arc::new(Date32Array::from(
            rows.iter().map(|r| r.date.map(date32)).collect::<Vec<_>>(),
        )),
        Arc::new(Float64Array::from(
            rows.iter().map(|r| r.amount).collect::<Vec<_>>(),
        )),
        Arc::new(UInt64Array::from(
            rows.iter().map(|r| r.stock).collect::<Vec<_>>(),
        )),
        text_column(rows, |r| r.doctor.as_deref()),
        text_column(rows, |r| r.patient.as_deref()),
        Arc::new(UInt32Array::from(
            rows.iter().map(|r| r.age).collect::<Vec<_>>(),
        )),
        text_column(rows, |r| r.gender.as_ref().map(|g| g.as_str())),
        text_column(rows, |r| r.location.as_deref()),
        text_column(rows, |r| r.country.as_deref()),
        text_column(rows, |r| r.payment_method.as_deref()),
        text_column(rows, |r| r.drug_category.as_deref()),
    ];
    RecordBatch::try_new(Arc::new(rows_schema()), columns).context("building record batch")
}

/// Write normalized rows to a Snappy-compressed Parquet file.
#[instrument(skip(rows), fields(rows = rows.len()))]
pub fn write_rows_parquet(rows: &[&NormalizedRow], path: &Path) -> Result<()> {
    let batch = rows_to_batch(rows)?;
    create_parent(path)?;
    let file = File::create(path)
        .with_context(|| format!("could not create `{}`", path.display()))?;

    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(file, batch.schema(), Some(props))
        .context("creating parquet writer")?;
    writer.write(&batch).context("writing batch to parquet")?;
    writer.close().context("closing parquet writer")?;

    info!(path = %path.display(), rows = rows.len(), "wrote parquet");
    Ok(())
}

#[derive(Debug, Serialize)]
pub struct SourceMapping<'a> {
    pub source: &'a str,
    pub mapping: &'a ColumnMapping,
}

/// The JSON document written for one analysis run.
#[derive(Debug, Serialize)]
pub struct ReportDocument<'a> {
    pub generated_at: DateTime<Utc>,
    pub rows: usize,
    pub sources: Vec<SourceMapping<'a>>,
    #[serde(flatten)]
    pub report: &'a Report,
}

#[instrument(skip(document))]
pub fn write_report_json(document: &ReportDocument<'_>, path: &Path) -> Result<()> {
    create_parent(path)?;
    let file = File::create(path)
        .with_context(|| format!("could not create `{}`", path.display()))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, document)
        .with_context(|| format!("writing `{}`", path.display()))?;
    writer
        .flush()
        .with_context(|| format!("flushing `{}`", path.display()))?;
    info!(path = %path.display(), "wrote report");
    Ok(())
}

fn create_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory `{}`", parent.display()))?;
    }
    Ok(())
}
