use clap::{Parser, Subcommand};

/// Daily customer login statistics service
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the configuration file
    #[arg(long, short, global = true, default_value = "config.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
    /// Install the schema if needed and serve the HTTP API (default)
    Serve,
    /// Create or update the database schema, then exit
    Install,
    /// Drop the stats table and all user login markers, then exit
    Uninstall,
}
