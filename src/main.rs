use anyhow::Context;
use clap::Parser;
use gmail_processor::auth::{Authenticator, RingStorage};
use gmail_processor::config::Config;
use gmail_processor::db::Database;
use gmail_processor::gmail::GmailClient;
use gmail_processor::pipeline::{self, RunOptions};
use gmail_processor::report::TracingReporter;
use gmail_processor::rules::RuleEngine;
use std::io::IsTerminal;
use std::path::PathBuf;

/// Fetch Gmail messages, store them locally and apply label rules.
#[derive(Parser, Debug)]
#[command(name = "gmail-processor", version)]
struct Cli {
    /// Number of days to look back for emails
    #[arg(long, value_name = "DAYS", value_parser = clap::value_parser!(u32).range(1..), conflicts_with = "all")]
    look_back: Option<u32>,

    /// Fetch every message instead of a look-back window
    #[arg(long)]
    all: bool,

    /// Settings file (defaults to $GMAIL_PROCESSOR_CONFIG or settings.toml)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Rule file, overrides the configured one
    #[arg(long, value_name = "PATH")]
    rules: Option<PathBuf>,

    /// SQLite database URL, overrides the configured one
    #[arg(long, value_name = "URL")]
    db: Option<String>,

    /// Evaluate rules and log the label changes without applying them
    #[arg(long)]
    dry_run: bool,

    /// Forget the stored OAuth token and exit
    #[arg(long)]
    reset_token: bool,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };

    let log_level = match cli.verbose {
        0 => config.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level);

    if cli.reset_token {
        RingStorage.clear_token().await?;
        println!("Token cleared. Run again without --reset-token to re-authenticate.");
        return Ok(());
    }

    let db_url = cli.db.clone().unwrap_or_else(|| config.database_url.clone());
    let db = Database::new(&db_url)
        .await
        .with_context(|| format!("Failed to open database {db_url}"))?;

    let rules_path = cli.rules.clone().unwrap_or_else(|| config.rules_path.clone());
    let engine = RuleEngine::from_file(&rules_path);

    let hub = Authenticator::connect(&config.credentials_path).await?;
    let client =
        GmailClient::new(hub, config.page_size).with_progress(std::io::stderr().is_terminal());

    let options = RunOptions {
        look_back_days: if cli.all {
            None
        } else {
            Some(cli.look_back.unwrap_or(config.look_back_days))
        },
        dry_run: cli.dry_run,
    };

    let summary = pipeline::run(&client, &client, &db, &engine, &TracingReporter, options)
        .await
        .context("Processing run failed")?;

    println!(
        "Fetched {}, evaluated {}, modified {}, unchanged {}, failed {}",
        summary.fetched, summary.evaluated, summary.modified, summary.unchanged, summary.failed
    );
    Ok(())
}

/// Set up tracing on stderr, honoring `RUST_LOG` when set.
fn setup_logging(level: &str) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
