use anyhow::Result;
use chrono::{NaiveDate, Utc};
use medidash::{
    analysis::{build_report, AnalysisSettings, AnomalyKind, Severity, Trend},
    export::{self, ReportDocument, SourceMapping},
    filter::{self, detect_regions, FilterOptions, Region, TimeWindow},
    ingest,
    normalize::{self, CanonicalField, NormalizedRow},
};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use std::fs::{self, File};
use tempfile::tempdir;

const SALES_CSV: &str = "\
Medicine Name,Date,Amount,Stock,Doctor,Patient,Age,Gender,Country,Payment Method
Paracetamol,2024-01-05,100,50,Dr. Rao,A,34,F,India,UPI
Ibuprofen,2024-01-20,100,0,Dr. Rao,B,45,M,India,Cash
Paracetamol,2024-02-10,110,40,Dr. Shah,C,29,F,India,Card
Amoxicillin,2024-02-18,110,3,Dr. Shah,D,61,M,India,UPI
Paracetamol,2024-03-02,121,30,Dr. Rao,E,38,F,India,Cash
Cetirizine,2024-03-15,121,20,Dr. Lee,F,52,M,India,Card
Aspirin,2024-03-20,999,20,Dr. Smith,G,40,M,United States,Card
";

fn reference() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 31).unwrap()
}

#[test]
fn csv_to_report_and_exports() -> Result<()> {
    let dataset = ingest::decode_bytes("sales.csv", SALES_CSV.as_bytes().to_vec())?;
    assert_eq!(dataset.rows.len(), 7);

    let (mapping, rows) = normalize::normalize(&dataset);
    assert_eq!(mapping.header_for(CanonicalField::MedicineName), Some("Medicine Name"));
    assert_eq!(mapping.header_for(CanonicalField::PaymentMethod), Some("Payment Method"));
    assert!(mapping.conflicts().is_empty());

    let regions = detect_regions(&rows);
    assert_eq!(regions[0].region, Region::India);
    assert_eq!(regions[0].rows, 6);

    let opts = FilterOptions {
        region: Some(Region::India),
        ..FilterOptions::default()
    };
    let filtered = filter::apply(&rows, &opts, reference());
    assert_eq!(filtered.len(), 6);

    let report = build_report(&filtered, &AnalysisSettings::default());
    assert_eq!(report.analysis.summary.total_records, 6);
    assert_eq!(report.analysis.top_medicines[0].name, "Paracetamol");
    assert_eq!(report.analysis.top_medicines[0].count, 3);

    let months: Vec<&str> = report
        .analysis
        .monthly_revenue
        .iter()
        .map(|m| m.month.as_str())
        .collect();
    assert_eq!(months, vec!["2024-01", "2024-02", "2024-03"]);

    let forecast = report.forecast.as_ref().expect("three months of revenue");
    assert!((forecast.average_growth - 1.1).abs() < 1e-9);
    assert_eq!(forecast.trend, Trend::Increasing);
    assert!((forecast.projected[0].revenue - 266.2).abs() < 1e-6);

    let kinds: Vec<(AnomalyKind, Severity)> =
        report.anomalies.iter().map(|a| (a.kind, a.severity)).collect();
    assert!(kinds.contains(&(AnomalyKind::OutOfStock, Severity::High)));
    assert!(kinds.contains(&(AnomalyKind::LowStock, Severity::Medium)));
    assert!(!kinds.iter().any(|(k, _)| *k == AnomalyKind::PriceOutlier));
    assert!(!report.insights.is_empty());

    let dir = tempdir()?;
    let parquet_path = dir.path().join("rows.parquet");
    let json_path = dir.path().join("report.json");
    export::write_rows_parquet(&filtered, &parquet_path)?;
    export::write_report_json(
        &ReportDocument {
            generated_at: Utc::now(),
            rows: filtered.len(),
            sources: vec![SourceMapping {
                source: &dataset.source,
                mapping: &mapping,
            }],
            report: &report,
        },
        &json_path,
    )?;

    let reader = ParquetRecordBatchReaderBuilder::try_new(File::open(&parquet_path)?)?.build()?;
    let rows_written: usize = reader.map(|b| b.map(|b| b.num_rows())).sum::<Result<usize, _>>()?;
    assert_eq!(rows_written, 6);

    let json: serde_json::Value = serde_json::from_slice(&fs::read(&json_path)?)?;
    assert_eq!(json["rows"], 6);
    assert_eq!(json["forecast"]["trend"], "increasing");
    Ok(())
}

#[test]
fn window_and_search_narrow_rows() -> Result<()> {
    let dataset = ingest::decode_bytes("sales.csv", SALES_CSV.as_bytes().to_vec())?;
    let (_, rows) = normalize::normalize(&dataset);

    let last_month = FilterOptions {
        window: TimeWindow::parse("30d")?,
        ..FilterOptions::default()
    };
    let kept: Vec<&NormalizedRow> = filter::apply(&rows, &last_month, reference());
    assert_eq!(kept.len(), 3);

    let search = FilterOptions {
        search: Some("dr. rao".into()),
        region: Some(Region::India),
        window: TimeWindow::All,
    };
    assert_eq!(filter::apply(&rows, &search, reference()).len(), 3);

    // fewer than three months: no forecast
    let report = build_report(&kept, &AnalysisSettings::default());
    assert!(report.forecast.is_none());
    Ok(())
}

#[test]
fn json_upload_takes_the_same_path() -> Result<()> {
    let body = r#"{"data": [
        {"drug": "Metformin", "sale_date": "03/15/2024", "price": "$1,250.00", "qty": 2},
        {"drug": "Metformin", "sale_date": "2024-03-20", "price": 80, "qty": 0}
    ]}"#;
    let dataset = ingest::decode_bytes("upload.json", body.as_bytes().to_vec())?;
    let (_, rows) = normalize::normalize(&dataset);
    assert_eq!(rows[0].medicine_name.as_deref(), Some("Metformin"));
    assert_eq!(rows[0].date, NaiveDate::from_ymd_opt(2024, 3, 15));
    assert_eq!(rows[0].amount, Some(1250.0));
    assert_eq!(rows[1].stock, Some(0));

    let refs: Vec<&NormalizedRow> = rows.iter().collect();
    let report = build_report(&refs, &AnalysisSettings::default());
    assert_eq!(report.analysis.summary.total_revenue, 1330.0);
    assert_eq!(report.anomalies[0].kind, AnomalyKind::OutOfStock);
    Ok(())
}
