use clap::{Parser, Subcommand};
use hemo_core::keys::KeyKind;
use hemo_core::validation::{validate, FieldRule};
use hemo_core::*;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "hemo")]
#[command(about = "Hemodynamics workshop recorder", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Override data directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Log at debug level unless RUST_LOG says otherwise
    #[arg(long, short, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Record calculator results for a study and save them
    Record {
        /// Patient identifier
        #[arg(long, required_unless_present = "quick")]
        patient: Option<String>,

        /// Study identifier
        #[arg(long, required_unless_present = "quick")]
        study: Option<String>,

        /// Calculator result as TYPE:key=value,key=value (repeatable)
        #[arg(long = "entry", required = true)]
        entries: Vec<String>,

        /// Quick mode - compute the consolidated view without saving
        #[arg(long, conflicts_with_all = ["patient", "study"])]
        quick: bool,
    },

    /// Print a saved study as JSON
    Show {
        #[arg(long)]
        study: String,
    },

    /// Show metric trends and insights across a patient's studies
    Trends {
        #[arg(long)]
        patient: String,

        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },

    /// Export a patient's studies to CSV
    Export {
        #[arg(long)]
        patient: String,

        #[arg(long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    if cli.verbose {
        hemo_core::logging::init_with_level("debug");
    } else {
        hemo_core::logging::init();
    }

    let mut config = Config::load()?;
    if let Some(data_dir) = cli.data_dir {
        config.data.data_dir = data_dir;
    }
    let store = JsonStudyStore::new(config.data.studies_dir());

    match cli.command {
        Commands::Record {
            patient,
            study,
            entries,
            quick,
        } => {
            let context = match (patient, study) {
                (Some(patient), Some(study)) if !quick => {
                    Some(WorkshopSessionContext::patient_study(patient, study))
                }
                _ => None,
            };
            cmd_record(store, &config, context, &entries).await
        }
        Commands::Show { study } => cmd_show(&store, &study),
        Commands::Trends { patient, json } => cmd_trends(&store, &config, &patient, json),
        Commands::Export { patient, out } => cmd_export(&store, &patient, &out),
    }
}

async fn cmd_record(
    store: JsonStudyStore,
    config: &Config,
    context: Option<WorkshopSessionContext>,
    entries: &[String],
) -> Result<()> {
    let now = chrono::Utc::now().timestamp_millis();
    let parsed = entries
        .iter()
        .zip(now..)
        .map(|(spec, ts)| parse_entry(spec, ts))
        .collect::<Result<Vec<_>>>()?;

    let session = WorkshopSession::new(Arc::new(store), config);
    match context {
        Some(context) => session.begin_patient_study(context.started_at(now)),
        None => session.begin_quick(),
    }

    for entry in parsed {
        session.publish(entry);
    }

    let saved = session.flush_now().await;
    let missing = session.missing_calculators();
    let snapshot = session.ledger().snapshot();
    session.shutdown().await;

    match saved? {
        Some(row) => {
            println!("✓ Saved study {}", row.study_id);
            display_row(&row);
        }
        None => {
            println!("[Quick mode - results not saved]");
            let context = WorkshopSessionContext::quick();
            let row = consolidate::consolidate(
                &snapshot,
                &context,
                "quick",
                session.gate().required(),
                None,
                now,
            );
            display_row(&row);
        }
    }

    if missing.is_empty() {
        println!("\n✓ Workshop complete");
    } else {
        let names: Vec<_> = missing.iter().map(|t| t.as_str()).collect();
        println!("\nMissing calculators: {}", names.join(", "));
    }

    Ok(())
}

/// Parse `TYPE:key=value,key=value` into a calculator entry
fn parse_entry(spec: &str, timestamp_millis: i64) -> Result<CalcEntry> {
    let (calc_type, pairs) = spec
        .split_once(':')
        .ok_or_else(|| Error::InvalidEntry(format!("expected TYPE:key=value, got {:?}", spec)))?;
    let calc_type: CalcType = calc_type.parse()?;

    let mut entry = CalcEntry::new(calc_type, timestamp_millis, calc_type.as_str().to_uppercase());
    for pair in pairs.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| Error::InvalidEntry(format!("expected key=value, got {:?}", pair)))?;
        let key: CanonicalKey = key.parse()?;
        let value = value.trim();

        if key.kind() == KeyKind::Numeric {
            if let Some(rule) = FieldRule::for_key(key) {
                let check = validate(value, &rule);
                if check.is_error() {
                    return Err(Error::InvalidEntry(format!(
                        "{}={}: {}",
                        key,
                        value,
                        check.message.unwrap_or_default()
                    )));
                }
            }
        }

        entry = entry.output(LineItem::keyed(key, value));
    }

    Ok(entry)
}

fn display_row(row: &ConsolidatedSnapshotRow) {
    println!();
    for key in CanonicalKey::ALL {
        if let Some(value) = row.display(key) {
            println!(
                "  {:<12} {} {}",
                key.as_str(),
                value,
                ConsolidatedSnapshotRow::unit_label(key)
            );
        }
    }
}

fn cmd_show(store: &JsonStudyStore, study_id: &str) -> Result<()> {
    let row = store
        .get_by_study_id(study_id)?
        .ok_or_else(|| Error::Storage(format!("no saved study {:?}", study_id)))?;
    println!("{}", serde_json::to_string_pretty(&row)?);
    Ok(())
}

fn cmd_trends(store: &JsonStudyStore, config: &Config, patient_id: &str, json: bool) -> Result<()> {
    let rows = load_patient_history(store, patient_id)?;
    let summary = summarize(&rows, config.trend.epsilon);

    if json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
        return Ok(());
    }

    println!("Trends for patient {} ({} studies)", patient_id, rows.len());
    println!();
    for (metric, trend) in &summary.metrics {
        match (trend.first, trend.last, trend.delta) {
            (Some(first), Some(last), Some(delta)) => println!(
                "  {:<6} {:<12} {} → {} ({}{})",
                metric.label(),
                trend.direction.as_str(),
                units::format_value(first, 2),
                units::format_value(last, 2),
                if delta >= 0.0 { "+" } else { "" },
                units::format_value(delta, 2)
            ),
            _ => println!("  {:<6} {}", metric.label(), trend.direction.as_str()),
        }
    }

    println!();
    println!("Insights:");
    for insight in &summary.insights {
        println!("  • {}", insight.describe());
    }

    Ok(())
}

fn cmd_export(store: &JsonStudyStore, patient_id: &str, out: &Path) -> Result<()> {
    let rows = load_patient_history(store, patient_id)?;
    let count = export_history_csv(&rows, out)?;

    println!("✓ Exported {} studies to CSV", count);
    println!("  CSV: {}", out.display());
    Ok(())
}
