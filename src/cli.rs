use clap::{Args, Parser, Subcommand};

use crate::photos::{DEFAULT_MARS_ENDPOINT, DEFAULT_PICSUM_ENDPOINT};
use crate::types::LogLevel;

#[derive(Parser, Debug)]
#[command(
    name = "photoroll",
    about = "Roll random Mars and Picsum photos and save your favourite pair"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    #[command(flatten)]
    pub remote: RemoteArgs,

    /// Log level (RUST_LOG overrides this)
    #[arg(long, value_enum, default_value = "warn", global = true)]
    pub log_level: LogLevel,
}

/// Endpoints and credentials shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct RemoteArgs {
    /// Firebase Realtime Database URL, e.g. https://<project>-default-rtdb.firebaseio.com
    #[arg(long, env = "PHOTOROLL_DATABASE_URL", global = true)]
    pub database_url: Option<String>,

    /// Database secret or ID token sent as the `auth` query parameter.
    /// Prefer the PHOTOROLL_AUTH_TOKEN environment variable.
    #[arg(long, env = "PHOTOROLL_AUTH_TOKEN", global = true, hide_env_values = true)]
    pub auth_token: Option<String>,

    /// Mars photo list endpoint
    #[arg(long, default_value = DEFAULT_MARS_ENDPOINT, global = true)]
    pub mars_endpoint: String,

    /// Picsum photo list endpoint
    #[arg(long, default_value = DEFAULT_PICSUM_ENDPOINT, global = true)]
    pub picsum_endpoint: String,

    /// HTTP timeout in seconds (transport default when omitted)
    #[arg(long, global = true)]
    pub timeout_secs: Option<u64>,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Interactive session: roll, filter, save and load photo pairs (default)
    Interactive,

    /// Fetch one pair, count the roll, and print it
    Roll(RollArgs),

    /// Print the most recently saved pair
    Last,

    /// Print the roll counter
    Rolls,
}

#[derive(Args, Debug, Clone, Default)]
pub struct RollArgs {
    /// Save the rolled pair
    #[arg(long)]
    pub save: bool,

    /// Apply the grayscale filter before printing/saving
    #[arg(long)]
    pub grayscale: bool,

    /// Apply the blur filter before printing/saving
    #[arg(long)]
    pub blur: bool,
}

impl Cli {
    pub fn effective_command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Interactive)
    }
}
