use anyhow::{anyhow, bail, Context, Result};
use chrono::{Local, NaiveDate, Utc};
use clap::{Parser, Subcommand};
use glob::glob;
use medidash::{
    analysis::{build_report, Report},
    calculators::{self, pace::parse_duration, ActivityLevel, DistanceUnit, Units},
    chat::ChatSession,
    client::{ApiClient, RetryPolicy},
    config::Config,
    export::{self, ReportDocument, SourceMapping},
    eye_test::EyeTest,
    filter::{self, detect_regions, FilterOptions, Region, TimeWindow},
    history::{BmiHistory, BmiRecord},
    ingest::{self, Dataset},
    normalize::{self, date_parser::parse_date, ColumnMapping, Gender, NormalizedRow},
};
use serde::Serialize;
use serde_json::json;
use std::{
    path::{Path, PathBuf},
    time::Instant,
};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "medidash", version)]
#[command(about = "Medical data dashboard pipeline and health calculators", long_about = None)]
struct Cli {
    /// YAML config file (falls back to MEDIDASH_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Single-line JSON instead of pretty output
    #[arg(long, global = true)]
    compact: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Decode, filter and analyze one or more data files
    Analyze {
        /// Files or glob patterns (.csv, .tsv, .xlsx, .xls, .ods, .json)
        #[arg(required = true)]
        files: Vec<String>,

        /// Case-insensitive text search over every cell
        #[arg(long)]
        search: Option<String>,

        /// Country filter, e.g. "India" or "us"
        #[arg(long)]
        region: Option<String>,

        /// Rolling window: all, 30d, 12w, 6m, 1y
        #[arg(long, default_value = "all")]
        window: String,

        /// End of the time window (defaults to today)
        #[arg(long)]
        reference_date: Option<String>,

        /// Also write the report as JSON
        #[arg(long)]
        json: Option<PathBuf>,

        /// Also write the filtered rows as Parquet
        #[arg(long)]
        parquet: Option<PathBuf>,

        /// Print a short text summary instead of the JSON report
        #[arg(long)]
        table: bool,
    },
    /// Countries detected in the data, most frequent first
    Regions {
        #[arg(required = true)]
        files: Vec<String>,
    },
    /// Show how a file's headers map onto canonical fields
    Columns { file: PathBuf },
    /// Body mass index
    Bmi {
        #[arg(long)]
        weight: f64,
        #[arg(long)]
        height: f64,
        /// metric (kg, cm) or imperial (lb, in)
        #[arg(long, default_value = "metric")]
        units: String,
        /// Record the result in the BMI history
        #[arg(long)]
        save: bool,
    },
    /// Basal metabolic rate (Mifflin-St Jeor) and daily energy needs
    Bmr {
        #[arg(long)]
        weight: f64,
        #[arg(long)]
        height: f64,
        #[arg(long)]
        age: u32,
        #[arg(long)]
        gender: String,
        /// sedentary, light, moderate, active, very-active
        #[arg(long, default_value = "sedentary")]
        activity: String,
    },
    /// Blood alcohol concentration (Widmark)
    Bac {
        #[arg(long)]
        weight: f64,
        #[arg(long)]
        gender: String,
        #[arg(long)]
        drinks: f64,
        #[arg(long, default_value_t = 0.0)]
        hours: f64,
    },
    /// Running pace and speed
    Pace {
        #[arg(long)]
        distance: f64,
        #[arg(long, default_value = "km")]
        unit: String,
        /// H:MM:SS or MM:SS
        #[arg(long)]
        time: String,
        /// Predict the finish time for another distance (same unit)
        #[arg(long)]
        predict: Option<f64>,
    },
    /// Colour-vision quiz; without answers the plates are listed
    EyeTest {
        #[arg(long, value_delimiter = ',')]
        answers: Vec<String>,
    },
    /// Stored BMI readings
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Ask the herbal-remedy assistant
    Chat {
        #[arg(required = true)]
        message: Vec<String>,
    },
    /// Look up a herb
    Herb { name: String },
    /// Translate text through the backend
    Translate {
        text: String,
        #[arg(long)]
        to: String,
    },
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
enum HistoryAction {
    List,
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let env = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt::Subscriber::builder()
        .with_env_filter(env)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = Config::load(cli.config.as_deref())?;
    let out = Output {
        compact: cli.compact,
    };

    match cli.command {
        Command::Analyze {
            files,
            search,
            region,
            window,
            reference_date,
            json,
            parquet,
            table,
        } => {
            let region = match region {
                Some(r) => Some(
                    Region::from_str(&r).ok_or_else(|| anyhow!("unknown region `{}`", r))?,
                ),
                None => None,
            };
            let reference = match reference_date {
                Some(s) => parse_date(&s).ok_or_else(|| anyhow!("invalid reference date `{}`", s))?,
                None => Local::now().date_naive(),
            };
            let opts = FilterOptions {
                search,
                region,
                window: TimeWindow::parse(&window)?,
            };
            let paths = expand_files(&files)?;
            let settings = config.analysis.clone();

            let report = tokio::task::spawn_blocking(move || {
                run_analysis(&paths, &opts, reference, &settings, json.as_deref(), parquet.as_deref())
            })
            .await??;

            if table {
                print!("{}", summary_table(&report));
            } else {
                out.print(&report)?;
            }
        }
        Command::Regions { files } => {
            let paths = expand_files(&files)?;
            let regions = tokio::task::spawn_blocking(move || -> Result<_> {
                let rows = load_rows(&paths)?.into_iter().flat_map(|(_, _, rows)| rows);
                let rows: Vec<NormalizedRow> = rows.collect();
                Ok(detect_regions(&rows))
            })
            .await??;
            out.print(&regions)?;
        }
        Command::Columns { file } => {
            let dataset = ingest::decode_file(&file)?;
            let mapping = ColumnMapping::infer(&dataset.headers);
            out.print(&json!({
                "source": dataset.source,
                "rows": dataset.rows.len(),
                "mapping": mapping,
            }))?;
        }
        Command::Bmi {
            weight,
            height,
            units,
            save,
        } => {
            let units = Units::from_str(&units)
                .ok_or_else(|| anyhow!("units must be metric or imperial, got `{}`", units))?;
            let result = calculators::bmi(weight, height, units)?;
            if save {
                let history = bmi_history(&config);
                history.add(BmiRecord::new(weight, height, units, result))?;
                info!(path = %history.path().display(), "saved to history");
            }
            out.print(&json!({
                "bmi": result.bmi,
                "status": result.status.as_str(),
            }))?;
        }
        Command::Bmr {
            weight,
            height,
            age,
            gender,
            activity,
        } => {
            let gender = parse_gender(&gender)?;
            let activity = ActivityLevel::from_str(&activity)
                .ok_or_else(|| anyhow!("unknown activity level `{}`", activity))?;
            let bmr = calculators::bmr(weight, height, age, gender)?;
            let harris = calculators::harris_benedict(weight, height, age, gender)?;
            out.print(&json!({
                "bmr": bmr,
                "harris_benedict": harris,
                "activity": activity,
                "tdee": calculators::tdee(bmr, activity),
            }))?;
        }
        Command::Bac {
            weight,
            gender,
            drinks,
            hours,
        } => {
            let result = calculators::bac(weight, parse_gender(&gender)?, drinks, hours)?;
            out.print(&json!({
                "bac": result.bac,
                "status": result.status.as_str(),
                "hours_until_sober": result.hours_until_sober,
            }))?;
        }
        Command::Pace {
            distance,
            unit,
            time,
            predict,
        } => {
            let unit = DistanceUnit::from_str(&unit)
                .ok_or_else(|| anyhow!("unit must be km or mi, got `{}`", unit))?;
            let duration = parse_duration(&time)?;
            let result = calculators::pace(distance, unit, duration)?;
            let prediction = match predict {
                Some(target) => {
                    let t = calculators::predict_time(
                        unit.to_km(distance),
                        duration,
                        unit.to_km(target),
                    )?;
                    Some(calculators::pace::format_duration(t.as_secs_f64()))
                }
                None => None,
            };
            out.print(&json!({ "pace": result, "predicted_time": prediction }))?;
        }
        Command::EyeTest { answers } => {
            let test = EyeTest::default();
            if answers.is_empty() {
                out.print(&test.plates())?;
            } else {
                out.print(&test.score(&answers))?;
            }
        }
        Command::History { action } => {
            let history = bmi_history(&config);
            match action {
                HistoryAction::List => out.print(&history.list()?)?,
                HistoryAction::Clear => {
                    history.clear()?;
                    info!(path = %history.path().display(), "history cleared");
                }
            }
        }
        Command::Chat { message } => {
            let mut session = ChatSession::new(api_client(&config)?);
            let reply = session.send(&message.join(" ")).await?;
            println!("{}", reply);
        }
        Command::Herb { name } => {
            let info = api_client(&config)?.herb_info(&name).await?;
            out.print(&info)?;
        }
        Command::Translate { text, to } => {
            let translated = api_client(&config)?.translate(&text, &to).await?;
            println!("{}", translated);
        }
    }

    Ok(())
}

struct Output {
    compact: bool,
}

impl Output {
    fn print<T: Serialize + ?Sized>(&self, value: &T) -> Result<()> {
        let text = if self.compact {
            serde_json::to_string(value)?
        } else {
            serde_json::to_string_pretty(value)?
        };
        println!("{}", text);
        Ok(())
    }
}

fn api_client(config: &Config) -> Result<ApiClient> {
    ApiClient::new(&config.api, RetryPolicy::from(&config.retry))
}

fn bmi_history(config: &Config) -> BmiHistory {
    BmiHistory::new(&config.history.path, config.history.max_entries)
}

/// Gender for the calculators; they only have male and female constants.
fn parse_gender(s: &str) -> Result<Gender> {
    match Gender::from_str(s) {
        Some(g @ (Gender::Male | Gender::Female)) => Ok(g),
        _ => bail!("gender must be male or female, got `{}`", s),
    }
}

/// Expand glob patterns; a pattern that is an existing path is taken as is.
fn expand_files(patterns: &[String]) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for pattern in patterns {
        if Path::new(pattern).is_file() {
            paths.push(PathBuf::from(pattern));
            continue;
        }
        let before = paths.len();
        for entry in glob(pattern).with_context(|| format!("invalid glob pattern `{}`", pattern))? {
            match entry {
                Ok(p) if p.is_file() => paths.push(p),
                Ok(_) => {}
                Err(e) => warn!("cannot read glob entry: {}", e),
            }
        }
        if paths.len() == before {
            bail!("no files match `{}`", pattern);
        }
    }
    Ok(paths)
}

fn load_rows(paths: &[PathBuf]) -> Result<Vec<(Dataset, ColumnMapping, Vec<NormalizedRow>)>> {
    Ok(ingest::decode_files(paths)?
        .into_iter()
        .map(|dataset| {
            let (mapping, rows) = normalize::normalize(&dataset);
            (dataset, mapping, rows)
        })
        .collect())
}

fn run_analysis(
    paths: &[PathBuf],
    opts: &FilterOptions,
    reference: NaiveDate,
    settings: &medidash::analysis::AnalysisSettings,
    json_out: Option<&Path>,
    parquet_out: Option<&Path>,
) -> Result<Report> {
    let start = Instant::now();
    let loaded = load_rows(paths)?;

    let all_rows: Vec<NormalizedRow> = loaded
        .iter()
        .flat_map(|(_, _, rows)| rows.iter().cloned())
        .collect();
    let filtered = filter::apply(&all_rows, opts, reference);
    info!(
        files = loaded.len(),
        total = all_rows.len(),
        kept = filtered.len(),
        "rows ready for analysis"
    );

    let report = build_report(&filtered, settings);

    if let Some(path) = parquet_out {
        export::write_rows_parquet(&filtered, path)?;
    }
    if let Some(path) = json_out {
        let document = ReportDocument {
            generated_at: Utc::now(),
            rows: filtered.len(),
            sources: loaded
                .iter()
                .map(|(dataset, mapping, _)| SourceMapping {
                    source: &dataset.source,
                    mapping,
                })
                .collect(),
            report: &report,
        };
        export::write_report_json(&document, path)?;
    }

    info!(elapsed = ?start.elapsed(), "analysis finished");
    Ok(report)
}

fn summary_table(report: &Report) -> String {
    let s = &report.analysis.summary;
    let mut out = String::new();
    out.push_str(&format!("records        {}\n", s.total_records));
    out.push_str(&format!("revenue        {:.2}\n", s.total_revenue));
    out.push_str(&format!("medicines      {}\n", s.unique_medicines));
    out.push_str(&format!("doctors        {}\n", s.unique_doctors));
    if let (Some(first), Some(last)) = (s.first_date, s.last_date) {
        out.push_str(&format!("period         {} .. {}\n", first, last));
    }
    if let Some(f) = &report.forecast {
        out.push_str(&format!(
            "next quarter   {:.2} ({})\n",
            f.next_quarter_total,
            f.trend.as_str()
        ));
    }
    out.push_str(&format!("anomalies      {}\n", report.anomalies.len()));
    for medicine in report.analysis.top_medicines.iter().take(5) {
        out.push_str(&format!("  {:<24} {:>6}\n", medicine.name, medicine.count));
    }
    for insight in &report.insights {
        out.push_str(&format!("* {}: {}\n", insight.title, insight.message));
    }
    out
}
