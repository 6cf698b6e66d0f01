use std::{env, fs, path::PathBuf};

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use serde::Serialize;
use stockscope::prelude::*;
use time::macros::format_description;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

const NO_DATA: &str = "No data available for the selected date range and ticker.";

#[derive(Parser)]
#[command(name = "stockscope")]
#[command(about = "Stock anomaly dashboard data core", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// JSON config file; defaults apply to every field it omits
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory that relative data paths are resolved against
    #[arg(short, long)]
    root: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Annotate the reference anomalies with one `{label}_match` column per candidate
    Enrich {
        /// Reference anomaly table
        #[arg(long)]
        reference: Option<PathBuf>,

        /// Candidate table as `label=path`; repeatable, replaces configured candidates
        #[arg(long = "candidate", value_parser = parse_candidate)]
        candidates: Vec<(ModelLabel, PathBuf)>,

        /// Output file
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List tickers, the date bounds and the selectable models
    Tickers,

    /// Print the adjusted close line of a ticker
    Prices {
        #[command(flatten)]
        selection: SelectionArgs,
    },

    /// Print every ticker's adjusted close line over a range of years
    Overview {
        /// First year, inclusive (defaults to the earliest price year)
        #[arg(long)]
        start_year: Option<i32>,

        /// Last year, inclusive (defaults to the latest price year)
        #[arg(long)]
        end_year: Option<i32>,
    },

    /// Compare the anomalies two models flag for a ticker
    Compare {
        #[command(flatten)]
        selection: SelectionArgs,

        /// First model (defaults to the first configured model)
        #[arg(short = 'a', long)]
        model_a: Option<ModelLabel>,

        /// Second model (defaults to the second configured model)
        #[arg(short = 'b', long)]
        model_b: Option<ModelLabel>,
    },
}

#[derive(clap::Args)]
struct SelectionArgs {
    /// Ticker symbol (defaults to the first ticker in the price table)
    #[arg(short, long)]
    ticker: Option<Ticker>,

    /// First day, inclusive (defaults to the earliest price date)
    #[arg(short, long)]
    start: Option<NaiveDate>,

    /// Last day, inclusive (defaults to the latest price date)
    #[arg(short, long)]
    end: Option<NaiveDate>,
}

#[derive(Serialize)]
struct TickerListing {
    tickers: Vec<Ticker>,
    date_bounds: Option<DateRange>,
    models: Vec<ModelLabel>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let _guard = init_tracing()?;

    let mut cfg = match &cli.config {
        Some(path) => DashboardConfig::from_json_file(path)
            .with_context(|| format!("Failed to read config {}", path.display()))?,
        None => DashboardConfig::default(),
    };
    if let Some(root) = &cli.root {
        cfg = cfg.with_root(root);
    }

    match cli.command {
        Commands::Enrich {
            reference,
            candidates,
            output,
        } => {
            let mut enrich = cfg.enrich;
            if let Some(path) = reference {
                enrich = enrich.with_reference(path);
            }
            if !candidates.is_empty() {
                enrich = enrich.with_candidates(candidates.into_iter().collect());
            }
            if let Some(path) = output {
                enrich = enrich.with_output(path);
            }

            let enriched = enrich_files(&enrich).context("Failed to enrich anomaly table")?;
            println!(
                "Wrote {} rows with {} to {}",
                enriched.len(),
                enriched.match_columns().join(", "),
                enrich.output.display()
            );
        }
        Commands::Tickers => {
            let session = Session::open(&cfg)?;
            print_json(&TickerListing {
                tickers: session.tickers()?,
                date_bounds: session.date_bounds()?,
                models: session.models().to_vec(),
            })?;
        }
        Commands::Prices { selection } => {
            let session = Session::open(&cfg)?;
            let Some(selection) = resolve(&session, selection)? else {
                println!("{NO_DATA}");
                return Ok(());
            };

            let view = session.price_view(&selection)?;
            if view.is_empty() {
                println!("{NO_DATA}");
            } else {
                print_json(&view)?;
            }
        }
        Commands::Overview {
            start_year,
            end_year,
        } => {
            let session = Session::open(&cfg)?;
            let bounds = session.year_bounds()?;
            let start = start_year.or_else(|| bounds.map(|b| b.start()));
            let end = end_year.or_else(|| bounds.map(|b| b.end()));
            let (Some(start), Some(end)) = (start, end) else {
                println!("{NO_DATA}");
                return Ok(());
            };

            let overview = session.overview(YearRange::new(start, end)?)?;
            if overview.is_empty() {
                println!("{NO_DATA}");
            } else {
                print_json(&overview)?;
            }
        }
        Commands::Compare {
            selection,
            model_a,
            model_b,
        } => {
            let session = Session::open(&cfg)?;
            let Some(selection) = resolve(&session, selection)? else {
                println!("{NO_DATA}");
                return Ok(());
            };

            let (model_a, model_b) = match (model_a, model_b, session.default_models()) {
                (Some(a), Some(b), _) => (a, b),
                (a, b, Some((da, db))) => (a.unwrap_or(da), b.unwrap_or(db)),
                _ => bail!("Two models are required; configure at least two or pass --model-a and --model-b"),
            };

            let comparison = session.compare(&selection, &model_a, &model_b)?;
            if comparison.is_empty() {
                println!("{NO_DATA}");
            } else {
                print_json(&comparison)?;
            }
        }
    }

    Ok(())
}

/// Fills omitted selection fields from the session's defaults. `None` if
/// the price table is empty and a field had no explicit value.
fn resolve(session: &Session, args: SelectionArgs) -> Result<Option<Selection>> {
    let default = session.default_selection()?;

    let ticker = args
        .ticker
        .or_else(|| default.as_ref().map(|s| s.ticker.clone()));
    let start = args
        .start
        .or_else(|| default.as_ref().map(|s| s.range.start()));
    let end = args.end.or_else(|| default.as_ref().map(|s| s.range.end()));

    match (ticker, start, end) {
        (Some(ticker), Some(start), Some(end)) => Ok(Some(Selection::new(ticker, start, end)?)),
        _ => Ok(None),
    }
}

fn parse_candidate(raw: &str) -> std::result::Result<(ModelLabel, PathBuf), String> {
    let (label, path) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected `label=path`, got `{raw}`"))?;
    let label = ModelLabel::new(label.trim()).map_err(|e| e.to_string())?;
    Ok((label, PathBuf::from(path.trim())))
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ================================================================================================
// Tracing Configuration
// ================================================================================================

fn init_tracing() -> Result<Option<WorkerGuard>> {
    let app_name = "stockscope";

    let in_container =
        env::var("CONTAINER").is_ok() || std::path::Path::new("/.dockerenv").exists();

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    if in_container {
        // stdout is reserved for command output
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(std::io::stderr)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::NONE)
            .with_current_span(true)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .init();

        info!("Logging to stderr (container mode)");
        Ok(None)
    } else {
        let log_dir = dirs::state_dir()
            .or_else(|| dirs::home_dir().map(|home| home.join(".local/state")))
            .map(|p| p.join(app_name).join("logs"))
            .context("Failed to find a state or home directory")?;
        fs::create_dir_all(&log_dir)?;

        let timestamp = time::OffsetDateTime::now_utc()
            .format(&format_description!(
                "[year][month][day]-[hour][minute][second]"
            ))
            .context("Failed to format timestamp")?;
        let file_name = format!("{app_name}-{timestamp}.log");
        let file_path = log_dir.join(&file_name);

        let file_appender = tracing_appender::rolling::never(&log_dir, &file_name);
        let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

        tracing_subscriber::fmt()
            .json()
            .with_env_filter(env_filter)
            .with_writer(non_blocking)
            .with_span_events(tracing_subscriber::fmt::format::FmtSpan::NONE)
            .with_current_span(true)
            .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
            .init();

        info!(log_file = %file_path.display(), "Logging to file (local mode)");
        Ok(Some(guard))
    }
}
