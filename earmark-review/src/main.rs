//! earmark - headless review driver
//!
//! Imports the given paths, waits for every import to settle, applies an
//! optional line query and prints the exposed rows page by page.

use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use clap::Parser;
use earmark_common::config::{load_config, LoggingConfig};
use earmark_review::{MountTable, Session};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for earmark
#[derive(Parser, Debug)]
#[command(name = "earmark")]
#[command(about = "Review audio collections and their metadata")]
#[command(version)]
struct Args {
    /// Directory, database file or audio file to import
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Line query applied after import, e.g. "snr:>10 score:desc"
    #[arg(short, long)]
    query: Option<String>,

    /// Import every path as `database` or `audio`
    #[arg(long)]
    force_as: Option<String>,

    /// Phraselist merged into the table after import
    #[arg(long)]
    phraselist: Option<PathBuf>,

    /// Number of pages to print
    #[arg(long, default_value = "1")]
    pages: usize,

    /// Print rows as JSON lines
    #[arg(long)]
    json: bool,

    /// Config file (overrides EARMARK_CONFIG)
    #[arg(short, long, env = "EARMARK_CONFIG")]
    config: Option<PathBuf>,
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&logging.level))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    match &logging.file {
        Some(path) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .with_context(|| format!("Failed to open log file {}", path.display()))?;
            registry
                .with(
                    tracing_subscriber::fmt::layer()
                        .with_ansi(false)
                        .with_writer(Mutex::new(file)),
                )
                .init();
        }
        None => {
            registry
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref());
    init_tracing(&config.logging)?;

    info!("Starting earmark with {} input(s)", args.paths.len());

    let resolver = Arc::new(MountTable::load());
    let mut session = Session::new(&config, resolver);

    for path in &args.paths {
        let source = session.import(path, args.force_as.as_deref());
        info!("Queued import of {:?}", source);
    }
    session.settle().await;

    if let Some(phraselist) = &args.phraselist {
        session.import_phraselist(phraselist);
        session.settle().await;
    }

    if let Some(query) = &args.query {
        for reason in session.apply_query(query) {
            warn!("Query problem: {}", reason);
        }
    }

    // one page is exposed by load or query; fill up to the requested count
    let page_size = session.engine().page_size();
    while session.model().materialized().len() < args.pages * page_size {
        if session.next_page() == 0 {
            break;
        }
    }

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    let limit = args.pages * page_size;
    for (_, row) in session.model().materialized_rows().take(limit) {
        if args.json {
            let line = serde_json::to_string(row).context("Failed to serialize row")?;
            writeln!(out, "{}", line)?;
        } else {
            writeln!(
                out,
                "{}\t{}\t{}\t{}\t{}\t{}",
                row.order, row.filename, row.key, row.score, row.skip, row.flag
            )?;
        }
    }

    info!(
        "{} of {} rows visible, {} printed",
        session.engine().visible_count(),
        session.model().len(),
        session.model().materialized().len().min(limit)
    );

    session.shutdown().await;
    Ok(())
}
