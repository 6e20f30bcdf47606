//! riskwatch - local disease-risk estimation with a persisted history
//!
//! Command-line front end: estimates risk from parameters, records outcomes,
//! and lists, charts and summarizes the prediction history.

use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use riskwatch::config::DATA_DIR_ENV;
use riskwatch::history::parse_assignment;
use riskwatch::{
    Category, Config, Estimator, HeuristicEstimator, HistoryStore, Parameters, PredictionRecord,
    RecordId, RestoreOutcome, RiskwatchError,
};

#[derive(Parser)]
#[command(name = "riskwatch")]
#[command(version = "0.1.0")]
#[command(about = "Estimate disease risk locally and keep a history of results", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Data directory holding the history and riskwatch.toml
    #[arg(short, long, global = true, env = DATA_DIR_ENV)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Estimate risk from parameters and record the result
    Predict {
        /// Category: heart, diabetes, liver, or kidney
        category: String,

        /// Input parameter, e.g. -p age=54 (repeatable)
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Record a result computed elsewhere
    Record {
        /// Category: heart, diabetes, liver, or kidney
        category: String,

        /// Probability between 0 and 1
        #[arg(long)]
        probability: f64,

        /// Flag the result as at risk
        #[arg(long)]
        at_risk: bool,

        /// Input parameter, e.g. -p glucose=140 (repeatable)
        #[arg(short = 'p', long = "param", value_name = "KEY=VALUE")]
        params: Vec<String>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// List past predictions, newest first
    History {
        /// Only show one category
        #[arg(short, long)]
        category: Option<String>,

        /// Show at most N predictions
        #[arg(short, long)]
        limit: Option<usize>,

        /// Show input parameters
        #[arg(long)]
        detailed: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one prediction in full
    Show {
        /// Prediction ID
        id: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the risk trend of recent predictions for a category
    Trend {
        /// Category: heart, diabetes, liver, or kidney
        category: String,

        /// Number of recent predictions (defaults to the configured window)
        #[arg(short, long)]
        window: Option<usize>,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show per-category statistics
    Summary {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete all prediction history
    Clear {
        /// Skip confirmation prompt
        #[arg(short, long)]
        force: bool,
    },

    /// Show configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration and storage paths
    Paths,
}

fn main() {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose {
        "riskwatch=debug,warn"
    } else {
        "warn"
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr);
    if cli.log_json {
        subscriber.json().init();
    } else {
        subscriber.init();
    }

    if let Err(e) = run(cli) {
        eprintln!("{} {:#}", "Error:".red().bold(), e);
        let code = e
            .downcast_ref::<RiskwatchError>()
            .map_or(1, RiskwatchError::exit_code);
        std::process::exit(code);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    let data_dir = cli.data_dir.unwrap_or_else(Config::default_data_dir);
    let config = Config::load(&data_dir)?;

    match cli.command {
        Commands::Predict {
            category,
            params,
            json,
        } => {
            let category: Category = category.parse()?;
            let parameters = parse_params(&params)?;
            let estimate = HeuristicEstimator.estimate(category, &parameters);

            let store = open_store(&data_dir, &config);
            report_added(
                store.add(category, estimate.at_risk, estimate.probability, parameters),
                json,
            )?;
        }

        Commands::Record {
            category,
            probability,
            at_risk,
            params,
            json,
        } => {
            let parameters = parse_params(&params)?;
            let store = open_store(&data_dir, &config);
            report_added(
                store.add_named(&category, at_risk, probability, parameters),
                json,
            )?;
        }

        Commands::History {
            category,
            limit,
            detailed,
            json,
        } => {
            let filter = category.map(|c| c.parse::<Category>()).transpose()?;
            let store = open_store(&data_dir, &config);

            let records = match filter {
                Some(category) => store.by_category(category),
                None => store.history(),
            };
            let limit = limit.or(config.history_limit).unwrap_or(records.len());
            let shown: Vec<&PredictionRecord> = records.iter().take(limit).collect();

            if json {
                println!("{}", serde_json::to_string_pretty(&shown)?);
            } else if shown.is_empty() {
                match filter {
                    Some(category) => println!(
                        "No {} predictions yet.",
                        category.display_name().to_lowercase()
                    ),
                    None => println!("No predictions yet."),
                }
            } else {
                println!("\n{} Prediction History", "History:".cyan().bold());
                println!("{}", "─".repeat(60));
                for record in &shown {
                    print_record(record, detailed);
                }
                if shown.len() < records.len() {
                    println!("   ... {} more", records.len() - shown.len());
                }
            }
        }

        Commands::Show { id, json } => {
            let id: RecordId = id
                .parse()
                .map_err(|e| anyhow::anyhow!("Invalid prediction ID '{id}': {e}"))?;
            let store = open_store(&data_dir, &config);
            let record = store
                .get(&id)
                .ok_or_else(|| anyhow::anyhow!("No prediction with ID {id}"))?;

            if json {
                println!("{}", serde_json::to_string_pretty(&record)?);
            } else {
                print_record(&record, true);
            }
        }

        Commands::Trend {
            category,
            window,
            json,
        } => {
            let category: Category = category.parse()?;
            let window = window.unwrap_or(config.trend_window);
            let store = open_store(&data_dir, &config);
            let points = store.trend(category, window);

            if json {
                println!("{}", serde_json::to_string_pretty(&points)?);
            } else if points.is_empty() {
                println!(
                    "No {} predictions yet.",
                    category.display_name().to_lowercase()
                );
            } else {
                println!(
                    "\n{} {} Risk Trend",
                    "Trend:".cyan().bold(),
                    category.display_name()
                );
                println!("{}", "─".repeat(60));
                for point in &points {
                    let bar = "█".repeat((point.probability_percent / 5.0).round() as usize);
                    let bar = if point.at_risk { bar.red() } else { bar.green() };
                    println!(
                        "   #{:<3} {:>5.1}% {}",
                        point.index, point.probability_percent, bar
                    );
                }
            }
        }

        Commands::Summary { json } => {
            let store = open_store(&data_dir, &config);
            let summaries = store.summary();

            if json {
                println!("{}", serde_json::to_string_pretty(&summaries)?);
            } else {
                println!("\n{} Prediction Summary", "Summary:".cyan().bold());
                println!("{}", "─".repeat(60));
                for summary in &summaries {
                    let average = summary
                        .average_probability
                        .map_or_else(|| "-".to_string(), |p| format!("{:.0}%", p * 100.0));
                    println!(
                        "   {:<15} total: {:<4} at risk: {:<4} average: {}",
                        summary.category.display_name(),
                        summary.total,
                        summary.at_risk,
                        average
                    );
                }
            }
        }

        Commands::Clear { force } => {
            if !force {
                eprintln!(
                    "{} This will delete all prediction history. Use --force to confirm.",
                    "Warning:".yellow().bold()
                );
                std::process::exit(1);
            }

            let store = open_store(&data_dir, &config);
            store.clear()?;
            println!("{} Prediction history cleared", "OK".green().bold());
        }

        Commands::Config { action } => match action {
            ConfigAction::Show { json } => {
                if json {
                    println!("{}", serde_json::to_string_pretty(&config)?);
                } else {
                    println!("\n{} Configuration", "Config:".cyan().bold());
                    println!("{}", "─".repeat(40));
                    print!("{}", config.to_toml()?);
                }
            }

            ConfigAction::Paths => {
                println!("\n{} Paths", "Config:".cyan().bold());
                println!("{}", "─".repeat(40));
                println!("   Data directory: {}", data_dir.display());
                println!("   Config file: {}", Config::config_path(&data_dir).display());
                println!(
                    "   History: {}",
                    config.storage(&data_dir).snapshot_path().display()
                );
            }
        },
    }

    Ok(())
}

/// Open the history store, telling the user if stored history was unreadable.
fn open_store(data_dir: &Path, config: &Config) -> HistoryStore {
    let store = HistoryStore::restore(Arc::new(config.storage(data_dir)));
    if let RestoreOutcome::Recovered {
        reason,
        preserved_at,
    } = store.restore_outcome()
    {
        eprintln!(
            "{} Stored history could not be read ({}); starting with empty history.",
            "Warning:".yellow().bold(),
            reason
        );
        if let Some(path) = preserved_at {
            eprintln!("   The unreadable file was kept at {path}");
        }
    }
    store
}

fn parse_params(raw: &[String]) -> riskwatch::Result<Parameters> {
    raw.iter().map(|p| parse_assignment(p)).collect()
}

/// Print a newly added record; a failed write still shows the result.
fn report_added(result: riskwatch::Result<PredictionRecord>, json: bool) -> anyhow::Result<()> {
    let (record, failure) = match result {
        Ok(record) => (record, None),
        Err(e) => match e.applied_record().cloned() {
            Some(record) => (record, Some(e)),
            None => return Err(e.into()),
        },
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&record)?);
    } else {
        let outcome = if record.at_risk {
            record.risk_label().red().bold()
        } else {
            record.risk_label().green().bold()
        };
        println!(
            "{} {}: {} ({:.0}%)",
            "Result:".cyan().bold(),
            record.category.display_name(),
            outcome,
            record.probability_percent()
        );
        println!("   ID: {}", record.id);
    }

    match failure {
        Some(e) => {
            eprintln!(
                "{} The result was not saved and will not appear after a restart.",
                "Warning:".yellow().bold()
            );
            Err(e.into())
        }
        None => Ok(()),
    }
}

fn print_record(record: &PredictionRecord, detailed: bool) {
    let outcome = if record.at_risk {
        record.risk_label().red()
    } else {
        record.risk_label().green()
    };
    println!(
        "   {}  {:<15} {:>3.0}%  {}",
        record.created_at.format("%Y-%m-%d %H:%M"),
        record.category.display_name(),
        record.probability_percent(),
        outcome
    );

    if detailed {
        println!("      ID: {}", record.id.to_string().dimmed());
        for (key, value) in &record.parameters {
            println!("      {key}: {value}");
        }
    }
}
