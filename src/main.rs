use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use inbox_rules::auth::RingStorage;
use inbox_rules::config::Settings;
use inbox_rules::db::Database;
use inbox_rules::gmail::GmailClient;
use inbox_rules::ingest::Ingestor;
use inbox_rules::rules::{self, engine::RuleEngine};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Fetch Gmail messages into a local database and apply rules to them.
#[derive(Parser, Debug)]
#[command(name = "inbox-rules", version, about, long_about = None)]
struct Cli {
    /// Settings file (defaults to ./settings.toml when present).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging.
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fetch messages from the inbox into the local database.
    Fetch {
        /// Database URL, e.g. sqlite:emails.db
        #[arg(long)]
        db: Option<String>,
        /// Maximum number of messages to fetch.
        #[arg(long = "max")]
        max_results: Option<u32>,
    },
    /// Evaluate rules against stored messages and apply their actions.
    Apply {
        /// Database URL, e.g. sqlite:emails.db
        #[arg(long)]
        db: Option<String>,
        /// JSON rules file.
        #[arg(long)]
        rules: Option<PathBuf>,
    },
    /// Forget the stored Gmail token.
    ResetToken,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.debug { "info,inbox_rules=debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Fetch { db, max_results } => {
            let db_url = db.unwrap_or_else(|| settings.database_url.clone());
            fetch(&settings, &db_url, max_results.unwrap_or(settings.max_results)).await
        }
        Commands::Apply { db, rules } => {
            let db_url = db.unwrap_or_else(|| settings.database_url.clone());
            let rules_path = rules.unwrap_or_else(|| settings.rules_path.clone());
            apply(&settings, &db_url, &rules_path).await
        }
        Commands::ResetToken => {
            RingStorage.clear_token().await?;
            println!("Token cleared. The next command will ask you to sign in again.");
            Ok(())
        }
    }
}

async fn open_database(database_url: &str) -> Result<Database> {
    let db = Database::new(database_url)
        .await
        .with_context(|| format!("Failed to open database {}", database_url))?;
    db.run_migrations()
        .await
        .context("Failed to initialize database schema")?;
    Ok(db)
}

async fn fetch(settings: &Settings, database_url: &str, max_results: u32) -> Result<()> {
    let db = open_database(database_url).await?;
    let session = GmailClient::connect(settings).await?;

    Ingestor::new(&db, &session, &settings.inbox_label)
        .fetch_and_store(max_results)
        .await?;

    info!("{} messages in local store", db.count().await?);
    Ok(())
}

async fn apply(settings: &Settings, database_url: &str, rules_path: &Path) -> Result<()> {
    let db = open_database(database_url).await?;
    let rules = rules::load_rules(rules_path)?;
    info!("Loaded {} rules from {}", rules.len(), rules_path.display());

    let session = GmailClient::connect(settings).await?;
    RuleEngine::new(&db, &session, &settings.inbox_label)
        .run(&rules)
        .await?;
    Ok(())
}
