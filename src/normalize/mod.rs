//! Column normalization: maps a [`Dataset`]'s heterogeneous headers onto the
//! canonical row shape used by filtering and analysis.

pub mod date_parser;
pub mod mapping;

pub use mapping::{classify_header, CanonicalField, ColumnMapping, MappingConflict};

use chrono::NaiveDate;
use serde::Serialize;
use std::fmt;
use tracing::{info, instrument};

use crate::ingest::{Dataset, RawRow, Scalar};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "Male",
            Gender::Female => "Female",
            Gender::Other => "Other",
        }
    }

    /// Free-text gender cell. Any non-empty value that is not recognisably
    /// male or female is `Other`.
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "" => None,
            "m" | "male" | "man" | "boy" => Some(Gender::Male),
            "f" | "female" | "woman" | "girl" => Some(Gender::Female),
            _ => Some(Gender::Other),
        }
    }
}

impl fmt::Display for Gender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A raw row plus the canonical fields inferred from its headers. A field is
/// `None` when no header mapped to it or the cell could not be read as that
/// field; no placeholder values are ever filled in.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct NormalizedRow {
    pub medicine_name: Option<String>,
    pub date: Option<NaiveDate>,
    pub amount: Option<f64>,
    pub stock: Option<u64>,
    pub doctor: Option<String>,
    pub patient: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    pub location: Option<String>,
    pub country: Option<String>,
    pub payment_method: Option<String>,
    pub drug_category: Option<String>,
    #[serde(skip)]
    pub raw: RawRow,
}

impl NormalizedRow {
    /// Every raw value as text, for search and keyword matching.
    pub fn raw_texts(&self) -> impl Iterator<Item = String> + '_ {
        self.raw.values().filter_map(Scalar::as_text)
    }
}

const MAX_AGE: f64 = 130.0;

/// Infer the column mapping for `dataset` and convert every row.
#[instrument(level = "info", skip(dataset), fields(source = %dataset.source))]
pub fn normalize(dataset: &Dataset) -> (ColumnMapping, Vec<NormalizedRow>) {
    let mapping = ColumnMapping::infer(&dataset.headers);
    let rows: Vec<NormalizedRow> = dataset
        .rows
        .iter()
        .map(|raw| normalize_row(&mapping, raw))
        .collect();
    info!(
        rows = rows.len(),
        mapped = mapping.mapped().count(),
        conflicts = mapping.conflicts().len(),
        "normalized"
    );
    (mapping, rows)
}

pub fn normalize_row(mapping: &ColumnMapping, raw: &RawRow) -> NormalizedRow {
    let cell = |field| mapping.index_of(field).map(|idx| raw.get(idx));
    let text = |field| cell(field).and_then(Scalar::as_text);

    NormalizedRow {
        medicine_name: text(CanonicalField::MedicineName),
        date: cell(CanonicalField::Date).and_then(date_parser::parse_scalar_date),
        amount: cell(CanonicalField::Amount).and_then(Scalar::as_f64),
        stock: cell(CanonicalField::Stock)
            .and_then(Scalar::as_f64)
            .filter(|n| *n >= 0.0 && n.fract() == 0.0)
            .map(|n| n as u64),
        doctor: text(CanonicalField::Doctor),
        patient: text(CanonicalField::Patient),
        age: cell(CanonicalField::Age)
            .and_then(Scalar::as_f64)
            .filter(|n| (0.0..=MAX_AGE).contains(n))
            .map(|n| n.floor() as u32),
        gender: text(CanonicalField::Gender).and_then(|s| Gender::from_str(&s)),
        location: text(CanonicalField::Location),
        country: text(CanonicalField::Country),
        payment_method: text(CanonicalField::PaymentMethod),
        drug_category: text(CanonicalField::DrugCategory),
        raw: raw.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::csv_reader::decode_delimited;
    use anyhow::Result;

    #[test]
    fn normalizes_sales_export() -> Result<()> {
        let csv = "Medication,Sale Date,Price,Stock,Prescriber,Patient Age,Sex,City,Country,Payment Mode,Drug Class\n\
Amoxicillin,2024-01-15,$12.50,3,Dr. Rao,34,F,Pune,India,UPI,Antibiotic\n\
Ibuprofen,,,,,,,,,,\n";
        let ds = decode_delimited("x.csv", csv.as_bytes(), b',')?;
        let (mapping, rows) = normalize(&ds);

        assert!(mapping.conflicts().is_empty());
        assert_eq!(rows.len(), 2);
        let r = &rows[0];
        assert_eq!(r.medicine_name.as_deref(), Some("Amoxicillin"));
        assert_eq!(r.date, NaiveDate::from_ymd_opt(2024, 1, 15));
        assert_eq!(r.amount, Some(12.5));
        assert_eq!(r.stock, Some(3));
        assert_eq!(r.doctor.as_deref(), Some("Dr. Rao"));
        assert_eq!(r.age, Some(34));
        assert_eq!(r.gender, Some(Gender::Female));
        assert_eq!(r.location.as_deref(), Some("Pune"));
        assert_eq!(r.country.as_deref(), Some("India"));
        assert_eq!(r.payment_method.as_deref(), Some("UPI"));
        assert_eq!(r.drug_category.as_deref(), Some("Antibiotic"));

        let blank = &rows[1];
        assert_eq!(blank.medicine_name.as_deref(), Some("Ibuprofen"));
        assert_eq!(blank.amount, None);
        assert_eq!(blank.stock, None);
        assert_eq!(blank.date, None);
        assert_eq!(blank.gender, None);
        Ok(())
    }

    #[test]
    fn unmapped_fields_stay_absent() -> Result<()> {
        let ds = decode_delimited("x.csv", b"drug,notes\nAspirin,ok\n", b',')?;
        let (_, rows) = normalize(&ds);
        assert_eq!(rows[0].medicine_name.as_deref(), Some("Aspirin"));
        assert_eq!(rows[0].amount, None);
        assert_eq!(rows[0].stock, None);
        assert_eq!(rows[0].doctor, None);
        Ok(())
    }

    #[test]
    fn rejects_out_of_range_numbers() -> Result<()> {
        let ds = decode_delimited("x.csv", b"drug,stock,age\nA,-2,200\nB,2.5,abc\n", b',')?;
        let (_, rows) = normalize(&ds);
        assert_eq!(rows[0].stock, None);
        assert_eq!(rows[0].age, None);
        assert_eq!(rows[1].stock, None);
        assert_eq!(rows[1].age, None);
        Ok(())
    }

    #[test]
    fn gender_words() {
        assert_eq!(Gender::from_str(" Male "), Some(Gender::Male));
        assert_eq!(Gender::from_str("f"), Some(Gender::Female));
        assert_eq!(Gender::from_str("non-binary"), Some(Gender::Other));
        assert_eq!(Gender::from_str(""), None);
    }
}
