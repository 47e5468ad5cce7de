//! `jobtrack` - job-search tracker
//!
//! Serves the HTTP API and pages, and offers a few reports over the synced
//! email store from the command line.

#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod report;
mod server;

use std::io;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jobtrack_core::{ConfigStore, Database, DbConfig, EmailRepository};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use server::{AppState, Stores};

#[derive(Parser, Debug)]
#[command(name = "jobtrack", version, about = "Job-search tracker")]
struct Cli {
    /// Configuration file.
    #[arg(long, global = true, default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the HTTP server (the default).
    Serve {
        /// Address to listen on.
        #[arg(long, default_value = "127.0.0.1")]
        host: IpAddr,
        /// Port to listen on.
        #[arg(long, default_value_t = 3001)]
        port: u16,
        /// Directory holding the HTML pages.
        #[arg(long, default_value = "public")]
        public_dir: PathBuf,
    },
    /// Email count, date bounds and one month's emails.
    Stats {
        /// Month as YYYY-MM; defaults to the current month.
        #[arg(long)]
        month: Option<String>,
    },
    /// Emails sent between two dates, inclusive.
    Range {
        /// First day, YYYY-MM-DD.
        start: String,
        /// Last day, YYYY-MM-DD.
        end: String,
    },
    /// All emails, oldest first.
    List,
    /// Merge a JSON array of emails from FILE (or stdin) into the store.
    Import {
        /// Input file; `-` or nothing reads stdin.
        file: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "jobtrack=debug,jobtrack_core=debug,jobtrack_fetch=debug".into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(io::stderr))
        .init();

    let cli = Cli::parse();
    let config = Arc::new(ConfigStore::open(&cli.config));
    let snapshot = config.snapshot();

    match cli.command.unwrap_or(Command::Serve {
        host: IpAddr::from([127, 0, 0, 1]),
        port: 3001,
        public_dir: PathBuf::from("public"),
    }) {
        Command::Serve {
            host,
            port,
            public_dir,
        } => {
            info!("Starting jobtrack");
            let stores = Stores::open(&snapshot.db).await;
            let state = AppState::new(config, stores, public_dir);
            server::serve(state, SocketAddr::new(host, port)).await
        }
        Command::Stats { month } => {
            let month = match month {
                Some(month) => report::parse_month(&month)?,
                None => chrono::Local::now().format("%Y-%m").to_string(),
            };
            let repo = open_emails(&snapshot.db).await?;
            report::stats(&repo, &month, &mut io::stdout().lock()).await
        }
        Command::Range { start, end } => {
            let range = report::parse_range(&start, &end)?;
            let repo = open_emails(&snapshot.db).await?;
            report::range(&repo, &range, &mut io::stdout().lock()).await
        }
        Command::List => {
            let repo = open_emails(&snapshot.db).await?;
            report::list(&repo, &mut io::stdout().lock()).await
        }
        Command::Import { file } => {
            let repo = open_emails(&snapshot.db).await?;
            let mut out = io::stdout().lock();
            match file.filter(|path| path.as_os_str() != "-") {
                Some(path) => {
                    let input = std::fs::File::open(&path)
                        .with_context(|| format!("cannot open {}", path.display()))?;
                    report::import(&repo, io::BufReader::new(input), &mut out).await
                }
                None => report::import(&repo, io::stdin().lock(), &mut out).await,
            }
        }
    }
}

async fn open_emails(db: &DbConfig) -> Result<EmailRepository> {
    let dir = db.resolved_data_dir();
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("cannot create data directory {}", dir.display()))?;
    let path = db.database_path(Database::Emails);
    EmailRepository::new(&path.to_string_lossy())
        .await
        .with_context(|| format!("cannot open {}", path.display()))
}
