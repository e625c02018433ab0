mod commands;
mod config;
mod providers;
mod server;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use std::process;
use tracing_subscriber::EnvFilter;

use crate::commands::{
    cmd_delete, cmd_log, cmd_resolve, cmd_show, cmd_suggest, cmd_update, cmd_weekly,
};
use crate::config::Config;
use thali_core::models::UpdateFoodLog;
use thali_core::providers::ProviderChain;
use thali_core::service::ThaliService;

#[derive(Parser)]
#[command(
    name = "thali",
    version,
    about = "A food log that knows what a katori of dal weighs"
)]
struct Cli {
    /// Log debug output to stderr (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Log a portion of a food
    Log {
        /// Food name, e.g. "masala dosa"
        food: String,
        /// Number of units
        quantity: f64,
        /// Unit: g, cup, bowl, piece, glass, katori
        #[arg(short, long, default_value = "g")]
        unit: String,
        /// Meal: breakfast, morning snack, lunch, evening snack, dinner
        #[arg(short, long)]
        meal: String,
        /// Date to log for (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Suggest catalog foods matching a partial name
    Suggest {
        /// Partial food name
        query: String,
        /// Maximum number of suggestions (1-50)
        #[arg(short, long)]
        limit: Option<usize>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Resolve a food name and show its stored nutrition record
    Resolve {
        /// Food name
        food: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show logged entries and totals for a day (defaults to today)
    Show {
        /// Date to show (YYYY-MM-DD or today/yesterday/tomorrow)
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show calories for the last 7 days
    Weekly {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Edit a log entry; grams and macros are recomputed
    Update {
        /// Entry ID to update
        entry_id: i64,
        /// New quantity
        #[arg(short, long)]
        quantity: Option<f64>,
        /// New unit
        #[arg(short, long)]
        unit: Option<String>,
        /// New meal
        #[arg(short, long)]
        meal: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete a log entry by ID
    Delete {
        /// Entry ID to delete
        entry_id: i64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
    },
}

fn init_tracing(verbose: bool, serving: bool) {
    let default = match (verbose, serving) {
        (true, _) => "debug",
        (false, true) => "info",
        (false, false) => "warn",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose, matches!(cli.command, Commands::Serve { .. }));

    if let Err(e) = run(cli).await {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;
    let chain = providers::build_chain(&config)?;

    match cli.command {
        Commands::Serve { port, bind } => {
            server::start_server(config.db_path, config.dataset_path, chain, port, &bind).await
        }
        // Provider clients block on the runtime, so commands run off the
        // async threads.
        command => tokio::task::spawn_blocking(move || dispatch(command, &config, &chain))
            .await
            .context("command task failed")?,
    }
}

fn dispatch(command: Commands, config: &Config, chain: &ProviderChain) -> Result<()> {
    let service = ThaliService::new(&config.db_path, &config.dataset_path)?;
    let user = config.user_id.as_str();
    match command {
        Commands::Log {
            food,
            quantity,
            unit,
            meal,
            date,
            json,
        } => cmd_log(
            &service,
            chain,
            user,
            &food,
            quantity,
            &unit,
            &meal,
            date.as_deref(),
            json,
        ),
        Commands::Suggest { query, limit, json } => cmd_suggest(&service, &query, limit, json),
        Commands::Resolve { food, json } => cmd_resolve(&service, chain, &food, json),
        Commands::Show { date, json } => cmd_show(&service, user, date.as_deref(), json),
        Commands::Weekly { json } => cmd_weekly(&service, user, json),
        Commands::Update {
            entry_id,
            quantity,
            unit,
            meal,
            json,
        } => cmd_update(
            &service,
            user,
            entry_id,
            &UpdateFoodLog {
                quantity,
                unit,
                meal_type: meal,
            },
            json,
        ),
        Commands::Delete { entry_id, json } => cmd_delete(&service, user, entry_id, json),
        Commands::Serve { .. } => bail!("serve does not run as a one-shot command"),
    }
}
