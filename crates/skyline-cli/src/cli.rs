use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::config::{LogFormat, Overrides};

#[derive(Parser)]
#[command(
    name = "skyline",
    about = "Skyline -- a feed generator fed by the AT Protocol firehose",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Configuration file (TOML)
    #[arg(short, long, global = true, env = "SKYLINE_CONFIG")]
    pub config: Option<PathBuf>,

    /// HTTP bind address
    #[arg(long, global = true)]
    pub bind: Option<SocketAddr>,

    /// SQLite database path
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// Relay host or subscribeRepos URL
    #[arg(long, global = true)]
    pub relay: Option<String>,

    #[arg(long, global = true)]
    pub log_format: Option<LogFormat>,

    #[arg(short, long, global = true)]
    pub verbose: bool,
}

impl Cli {
    pub fn overrides(&self) -> Overrides {
        Overrides {
            bind: self.bind,
            db: self.db.clone(),
            relay: self.relay.clone(),
            log_format: self.log_format,
        }
    }
}

#[derive(Subcommand)]
pub enum Command {
    /// Ingest the firehose and serve the feed until Ctrl-C
    Run(IngestArgs),
    /// Ingest the firehose only
    Ingest(IngestArgs),
    /// Serve the feed only
    Serve,
    /// Create or upgrade the database schema
    Migrate,
    /// Print the most recently indexed posts
    Latest(LatestArgs),
    /// Print the effective configuration
    Config,
}

#[derive(Args)]
pub struct IngestArgs {
    /// Resume after this sequence number
    #[arg(long)]
    pub cursor: Option<i64>,
}

#[derive(Args)]
pub struct LatestArgs {
    #[arg(short = 'n', long, default_value = "10")]
    pub limit: usize,
}
