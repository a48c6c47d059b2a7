use clap::Parser;
use inbox_rules::config::Settings;
use inbox_rules::db::Database;
use std::path::PathBuf;

/// Print a stored message by id, or the newest one whose sender or subject matches.
#[derive(Parser, Debug)]
#[command(name = "inspect_db")]
struct Args {
    /// Message id or search term.
    query: String,

    /// Path to settings.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Database url; defaults to the one in settings
    #[arg(long)]
    db: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let url = match args.db {
        Some(url) => url,
        None => Settings::load(args.config.as_deref())?.database_url,
    };

    // Read-only tool: never create a database that isn't there.
    let db = Database::open_existing(&url)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to open database {}: {}", url, e))?;

    let found = match db.get(&args.query).await? {
        Some(record) => Some(record),
        None => db.find_latest(&args.query).await?,
    };

    if let Some(record) = found {
        println!("Found Message:");
        println!("ID: {}", record.message_id);
        println!("Thread: {}", record.thread_id);
        println!("From: {}", record.sender);
        println!("To: {}", record.recipient);
        println!("Subject: {}", record.subject);
        match record.received_at {
            Some(ts) => println!("Received: {}", ts.to_rfc3339()),
            None => println!("Received: (unknown)"),
        }
        println!("Read: {}", record.is_read);
        println!(
            "--------------------------------------------------------------------------------"
        );
        println!("{}", record.snippet);
    } else {
        println!("No messages found matching '{}'", args.query);
    }

    Ok(())
}
