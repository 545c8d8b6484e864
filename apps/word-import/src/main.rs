use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use db_infra::bootstrap_db;
use db_infra::db::{DbKind, DbSettings};
use db_infra::infra::db::sanitize_db_url;
use sketch_backend::words::normalize_words;
use sketch_backend::words::sea::import_words;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "word-import")]
#[command(about = "Load a newline-delimited word list into the word database")]
struct Args {
    /// Word list, one word per line
    input: PathBuf,

    /// Target database
    #[arg(long, env = "DATABASE_URL")]
    database_url: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_writer(std::io::stdout)
        .without_time()
        .with_target(false)
        .with_env_filter("word_import=info,sketch_backend=info,migration=info,sqlx=warn")
        .init();

    let args = Args::parse();
    match run(&args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(message) => {
            error!("{message}");
            ExitCode::FAILURE
        }
    }
}

async fn run(args: &Args) -> Result<(), String> {
    let settings = DbSettings::from_url(args.database_url.clone()).map_err(|e| e.to_string())?;
    if settings.kind == DbKind::SqliteMemory {
        return Err("in-memory SQLite is discarded on exit; import into a file or Postgres".into());
    }

    let raw = std::fs::read_to_string(&args.input)
        .map_err(|e| format!("reading {}: {e}", args.input.display()))?;
    let words = normalize_words(&raw);
    info!(path = %args.input.display(), words = words.len(), "Read word list");

    let db = bootstrap_db(&settings).await.map_err(|e| e.to_string())?;
    info!(database = %sanitize_db_url(&settings.url), "Connected");

    let inserted = import_words(&db, &words).await.map_err(|e| e.to_string())?;
    info!(
        inserted,
        skipped = words.len() as u64 - inserted,
        "Import finished"
    );
    Ok(())
}
