//! # Command-Line Configuration
//!
//! Every option can also come from the environment, so the service runs
//! unchanged under a process manager or in a container.

use clap::{Args, Parser, Subcommand};
use portfolio_core::DEFAULT_SEED_FILES;
use std::net::SocketAddr;
use std::num::NonZeroU32;
use std::path::PathBuf;

/// Portfolio service: REST API for projects, partitions and dev-server ports.
#[derive(Parser, Debug)]
#[command(name = "portfolio", version, about)]
pub struct Cli {
    /// SQLite database file.
    #[arg(
        short,
        long,
        env = "PORTFOLIO_DB",
        default_value = "portfolio.db",
        global = true
    )]
    pub database: PathBuf,

    /// Seed files tried in order when the database has no content.
    #[arg(long, env = "PORTFOLIO_SEED", value_delimiter = ',', global = true)]
    pub seed: Vec<PathBuf>,

    #[command(flatten)]
    pub serve: ServeArgs,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run the HTTP server (default).
    Serve,
    /// Create the schema and seed default data.
    Init {
        /// Replace an existing database.
        #[arg(long)]
        force: bool,
    },
    /// Show row counts for every table.
    Status {
        #[arg(long)]
        json: bool,
    },
    /// Report whether a port is reserved or has a listener.
    CheckPort {
        #[arg(id = "port_number", value_name = "PORT")]
        port: i64,
        #[arg(long)]
        json: bool,
    },
}

/// Options for the HTTP server.
#[derive(Args, Debug, Clone)]
pub struct ServeArgs {
    /// Port to listen on.
    #[arg(short, long, env = "PORT", default_value_t = 3000, global = true)]
    pub port: u16,

    /// Address to bind.
    #[arg(long, env = "HOST", default_value = "127.0.0.1", global = true)]
    pub host: String,

    /// Comma-separated origins allowed by CORS.
    #[arg(
        long,
        env = "FRONTEND_URL",
        default_value = "http://localhost:5173",
        global = true
    )]
    pub frontend_url: String,

    /// Directory holding `screenshots/`.
    #[arg(long, env = "PORTFOLIO_PUBLIC_DIR", default_value = "public", global = true)]
    pub public_dir: PathBuf,

    /// Require this key on mutating requests.
    #[arg(long, env = "PORTFOLIO_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Global request limit per second.
    #[arg(long, env = "PORTFOLIO_RATE_LIMIT", global = true)]
    pub rate_limit: Option<NonZeroU32>,
}

impl ServeArgs {
    /// CORS origins parsed from `frontend_url`.
    #[must_use]
    pub fn cors_origins(&self) -> Vec<String> {
        self.frontend_url
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn socket_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        format!("{}:{}", self.host, self.port).parse()
    }
}

impl Cli {
    /// Seed candidates, falling back to `seed.json` then `seed_p_1.json`.
    #[must_use]
    pub fn seed_candidates(&self) -> Vec<PathBuf> {
        if self.seed.is_empty() {
            DEFAULT_SEED_FILES.iter().map(PathBuf::from).collect()
        } else {
            self.seed.clone()
        }
    }

    /// The subcommand to run; `serve` when none is given.
    #[must_use]
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Serve)
    }
}
