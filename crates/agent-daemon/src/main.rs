//! Agent Search Daemon
//!
//! Semantic search over on-chain agent registrations.
//!
//! # Usage
//!
//! ```bash
//! agent-search start [--no-schedule] [--workers N]
//! agent-search sync [--chain ID]...
//! agent-search search "defi trading bot" [--limit N] [--chains all|ID[,ID...]]
//! agent-search admin sync-log | sync-state | clear-state
//! ```
//!
//! # Configuration
//!
//! Configuration is loaded in order (later sources override earlier):
//! 1. Built-in defaults
//! 2. Config file (~/.config/agent-search/config.toml)
//! 3. `--config` file
//! 4. Environment variables (AGENT_SEARCH_*)
//! 5. CLI flags

use anyhow::Result;
use clap::Parser;

use agent_daemon::{
    handle_admin, run_search, run_sync, start_daemon, Cli, Commands, GlobalOptions,
};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let opts = GlobalOptions::from(&cli);

    match cli.command {
        Commands::Start {
            no_schedule,
            workers,
        } => {
            start_daemon(&opts, no_schedule, workers).await?;
        }
        Commands::Sync { chains } => {
            run_sync(&opts, &chains).await?;
        }
        Commands::Search(args) => {
            run_search(&opts, &args).await?;
        }
        Commands::Admin { command } => {
            handle_admin(&opts, command).await?;
        }
    }

    Ok(())
}
