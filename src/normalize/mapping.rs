//! Header → canonical field inference.
//!
//! Every canonical field owns a keyword list, and the fields are tried in a
//! fixed order: the first field with a keyword matching the header wins.
//! Most keywords match as substrings; short ones (`dr`, `age`, `qty`, ...)
//! only match a whole `_`-separated token. Identifier and birth-date headers
//! are never mapped.
//! When two headers resolve to the same field the earlier header (file order)
//! keeps it and the later one is reported as a [`MappingConflict`].

use serde::Serialize;
use std::{collections::BTreeMap, fmt};
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CanonicalField {
    MedicineName,
    Date,
    Amount,
    Stock,
    Doctor,
    Patient,
    Age,
    Gender,
    Location,
    Country,
    PaymentMethod,
    DrugCategory,
}

impl CanonicalField {
    pub const ALL: [CanonicalField; 12] = [
        CanonicalField::MedicineName,
        CanonicalField::Date,
        CanonicalField::Amount,
        CanonicalField::Stock,
        CanonicalField::Doctor,
        CanonicalField::Patient,
        CanonicalField::Age,
        CanonicalField::Gender,
        CanonicalField::Location,
        CanonicalField::Country,
        CanonicalField::PaymentMethod,
        CanonicalField::DrugCategory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            CanonicalField::MedicineName => "medicine_name",
            CanonicalField::Date => "date",
            CanonicalField::Amount => "amount",
            CanonicalField::Stock => "stock",
            CanonicalField::Doctor => "doctor",
            CanonicalField::Patient => "patient",
            CanonicalField::Age => "age",
            CanonicalField::Gender => "gender",
            CanonicalField::Location => "location",
            CanonicalField::Country => "country",
            CanonicalField::PaymentMethod => "payment_method",
            CanonicalField::DrugCategory => "drug_category",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        let s = s.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|f| f.as_str() == s)
    }
}

impl fmt::Display for CanonicalField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a keyword is compared against a normalized header.
#[derive(Debug, Clone, Copy)]
enum Match {
    /// keyword appears anywhere in the header
    Substring(&'static str),
    /// keyword equals one `_`-separated token of the header
    Token(&'static str),
}

impl Match {
    fn matches(&self, header: &str) -> bool {
        match self {
            Match::Substring(k) => header.contains(k),
            Match::Token(k) => header.split('_').any(|t| t == *k),
        }
    }
}

use Match::{Substring as Sub, Token as Tok};

/// Headers carrying one of these never map: identifiers and birth dates
/// share keywords with real fields (`medicine_id`, `date_of_birth`).
const EXCLUDED: &[Match] = &[Tok("id"), Tok("dob"), Sub("birth")];

/// Precedence order matters: more specific fields come before the fields
/// whose keywords they contain (`drug_category` before `drug`,
/// `payment_method` before `amount`, `patient_age` resolves to age).
/// Quantity keywords sit ahead of amount so `sales_qty` is stock.
const MAPPING_TABLE: &[(CanonicalField, &[Match])] = &[
    (
        CanonicalField::DrugCategory,
        &[
            Sub("category"),
            Sub("class"),
            Sub("drug_type"),
            Sub("medicine_type"),
            Sub("medication_type"),
        ],
    ),
    (
        CanonicalField::PaymentMethod,
        &[Sub("payment"), Sub("pay_mode"), Tok("method")],
    ),
    (
        CanonicalField::MedicineName,
        &[
            Sub("medicine"),
            Sub("drug"),
            Sub("medication"),
            Sub("product"),
            Tok("item"),
            Tok("items"),
        ],
    ),
    (
        CanonicalField::Date,
        &[Sub("date"), Tok("time"), Tok("timestamp"), Tok("month"), Tok("day")],
    ),
    (CanonicalField::Stock, &[Tok("qty"), Sub("quantity")]),
    (
        CanonicalField::Amount,
        &[
            Sub("amount"),
            Sub("price"),
            Sub("revenue"),
            Sub("sales"),
            Sub("total"),
            Sub("cost"),
            Tok("value"),
        ],
    ),
    (CanonicalField::Stock, &[Sub("stock"), Sub("inventory")]),
    (
        CanonicalField::Doctor,
        &[Sub("doctor"), Sub("prescriber"), Sub("physician"), Tok("dr")],
    ),
    (CanonicalField::Age, &[Tok("age")]),
    (CanonicalField::Gender, &[Sub("gender"), Tok("sex")]),
    (
        CanonicalField::Patient,
        &[Sub("patient"), Sub("customer"), Sub("client")],
    ),
    (CanonicalField::Country, &[Sub("country"), Sub("nation")]),
    (
        CanonicalField::Location,
        &[
            Sub("location"),
            Sub("city"),
            Tok("region"),
            Tok("state"),
            Sub("address"),
            Tok("area"),
        ],
    ),
];

/// Lower-case and fold separators so `Medicine Name`, `medicine-name` and
/// `MedicineName`-style camel case compare the same.
pub fn normalize_header(header: &str) -> String {
    let mut out = String::with_capacity(header.len() + 4);
    let mut prev_lower = false;
    for c in header.trim().chars() {
        if c.is_uppercase() && prev_lower {
            out.push('_');
        }
        prev_lower = c.is_lowercase() || c.is_ascii_digit();
        match c {
            ' ' | '-' | '.' | '/' => out.push('_'),
            c => out.extend(c.to_lowercase()),
        }
    }
    out
}

/// Resolve a single header against the table, ignoring conflicts.
pub fn classify_header(header: &str) -> Option<CanonicalField> {
    let norm = normalize_header(header);
    if EXCLUDED.iter().any(|k| k.matches(&norm)) {
        return None;
    }
    MAPPING_TABLE
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| k.matches(&norm)))
        .map(|(field, _)| *field)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MappingConflict {
    pub field: CanonicalField,
    /// header that kept the field
    pub kept: String,
    /// header that also matched and was ignored
    pub ignored: String,
}

/// Resolved header ↔ field mapping for one dataset.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ColumnMapping {
    /// field → (header, column index)
    fields: BTreeMap<CanonicalField, (String, usize)>,
    conflicts: Vec<MappingConflict>,
    unmapped: Vec<String>,
}

impl ColumnMapping {
    pub fn infer(headers: &[String]) -> Self {
        let mut mapping = ColumnMapping::default();
        for (idx, header) in headers.iter().enumerate() {
            let Some(field) = classify_header(header) else {
                mapping.unmapped.push(header.clone());
                continue;
            };
            if let Some((kept, _)) = mapping.fields.get(&field) {
                warn!(
                    field = field.as_str(),
                    kept = %kept,
                    ignored = %header,
                    "two columns map to the same field; keeping the first"
                );
                mapping.conflicts.push(MappingConflict {
                    field,
                    kept: kept.clone(),
                    ignored: header.clone(),
                });
                continue;
            }
            debug!(header = %header, field = field.as_str(), "mapped column");
            mapping.fields.insert(field, (header.clone(), idx));
        }
        mapping
    }

    /// Column index feeding `field`, if any header mapped to it.
    pub fn index_of(&self, field: CanonicalField) -> Option<usize> {
        self.fields.get(&field).map(|(_, idx)| *idx)
    }

    pub fn header_for(&self, field: CanonicalField) -> Option<&str> {
        self.fields.get(&field).map(|(h, _)| h.as_str())
    }

    pub fn field_for(&self, header: &str) -> Option<CanonicalField> {
        self.fields
            .iter()
            .find(|(_, (h, _))| h == header)
            .map(|(f, _)| *f)
    }

    pub fn mapped(&self) -> impl Iterator<Item = (CanonicalField, &str)> {
        self.fields.iter().map(|(f, (h, _))| (*f, h.as_str()))
    }

    pub fn conflicts(&self) -> &[MappingConflict] {
        &self.conflicts
    }

    pub fn unmapped(&self) -> &[String] {
        &self.unmapped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn drug_and_medication_map_to_medicine_name() {
        for h in ["drug", "Drug", "DRUG_NAME", "Medication", "medication name", "MedicationName"] {
            assert_eq!(
                classify_header(h),
                Some(CanonicalField::MedicineName),
                "header {h}"
            );
        }
    }

    #[test]
    fn precedence_resolves_overlapping_keywords() {
        assert_eq!(
            classify_header("Drug Category"),
            Some(CanonicalField::DrugCategory)
        );
        assert_eq!(
            classify_header("payment_method"),
            Some(CanonicalField::PaymentMethod)
        );
        assert_eq!(classify_header("Patient Age"), Some(CanonicalField::Age));
        assert_eq!(classify_header("patient_name"), Some(CanonicalField::Patient));
        assert_eq!(classify_header("Sale Date"), Some(CanonicalField::Date));
        assert_eq!(classify_header("Unit Price"), Some(CanonicalField::Amount));
        assert_eq!(classify_header("Stock Qty"), Some(CanonicalField::Stock));
        assert_eq!(classify_header("Dr"), Some(CanonicalField::Doctor));
    }

    #[test]
    fn token_keywords_do_not_match_inside_words() {
        assert_eq!(classify_header("dosage"), None);
        assert_eq!(classify_header("Address"), Some(CanonicalField::Location));
        assert_eq!(classify_header("statement"), None);
        assert_eq!(classify_header("Items"), Some(CanonicalField::MedicineName));
        assert_eq!(classify_header("subtotal"), Some(CanonicalField::Amount));
        assert_eq!(classify_header("Timestamp"), Some(CanonicalField::Date));
        assert_eq!(classify_header("Sex"), Some(CanonicalField::Gender));
        assert_eq!(classify_header("Sussex"), None);
    }

    #[test]
    fn lookalike_headers_are_not_misfiled() {
        assert_eq!(
            classify_header("Payment Type"),
            Some(CanonicalField::PaymentMethod)
        );
        assert_eq!(classify_header("Transaction Type"), None);
        assert_eq!(classify_header("Type"), None);
        assert_eq!(classify_header("Drug Type"), Some(CanonicalField::DrugCategory));
        assert_eq!(classify_header("Date of Birth"), None);
        assert_eq!(classify_header("DOB"), None);
        assert_eq!(classify_header("BirthDate"), None);
        assert_eq!(classify_header("Sales Qty"), Some(CanonicalField::Stock));
        assert_eq!(classify_header("Total Quantity"), Some(CanonicalField::Stock));
        assert_eq!(classify_header("Sales"), Some(CanonicalField::Amount));
        assert_eq!(classify_header("Medicine ID"), None);
        assert_eq!(classify_header("PatientId"), None);
    }

    #[test]
    fn identifier_column_does_not_take_the_name_slot() {
        let m = ColumnMapping::infer(&headers(&[
            "Medicine ID",
            "Medicine Name",
            "Date of Birth",
            "Date",
        ]));
        assert_eq!(m.header_for(CanonicalField::MedicineName), Some("Medicine Name"));
        assert_eq!(m.header_for(CanonicalField::Date), Some("Date"));
        assert!(m.conflicts().is_empty());
        assert_eq!(
            m.unmapped(),
            &["Medicine ID".to_string(), "Date of Birth".to_string()]
        );
    }

    #[test]
    fn conflicts_keep_first_header() {
        let m = ColumnMapping::infer(&headers(&["Drug", "Medicine", "Notes", "price"]));
        assert_eq!(m.header_for(CanonicalField::MedicineName), Some("Drug"));
        assert_eq!(m.index_of(CanonicalField::Amount), Some(3));
        assert_eq!(m.field_for("price"), Some(CanonicalField::Amount));
        assert_eq!(m.field_for("Medicine"), None);
        assert_eq!(
            m.conflicts(),
            &[MappingConflict {
                field: CanonicalField::MedicineName,
                kept: "Drug".into(),
                ignored: "Medicine".into(),
            }]
        );
        assert_eq!(m.unmapped(), &["Notes".to_string()]);
    }

    #[test]
    fn field_names_round_trip() {
        for f in CanonicalField::ALL {
            assert_eq!(CanonicalField::from_str(f.as_str()), Some(f));
        }
        assert_eq!(CanonicalField::from_str("nope"), None);
    }
}
