//! CLI argument parsing for the agent search daemon.
//!
//! CLI flags override every other configuration source.

use clap::{Args, Parser, Subcommand};

use agent_types::ChainSelection;

/// Agent registry semantic search daemon
///
/// Keeps a vector index of on-chain agent registrations in sync with their
/// subgraphs and answers semantic search queries against it.
#[derive(Parser, Debug)]
#[command(name = "agent-search")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default ~/.config/agent-search/config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<String>,

    /// Set log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    pub log_level: Option<String>,

    /// Override database path
    #[arg(long, global = true)]
    pub db_path: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the scheduler and the sync consumers until interrupted
    Start {
        /// Consume queued syncs but do not register the cron job
        #[arg(long)]
        no_schedule: bool,

        /// Override the number of sync workers
        #[arg(short, long)]
        workers: Option<usize>,
    },

    /// Run one sync now and wait for it to finish
    Sync {
        /// Sync only this chain (repeatable; default: every configured chain)
        #[arg(long = "chain")]
        chains: Vec<u64>,
    },

    /// Standard search against the local index; prints the JSON response
    Search(SearchArgs),

    /// Inspect or reset sync bookkeeping
    Admin {
        #[command(subcommand)]
        command: AdminCommands,
    },
}

/// Flags of the `search` command.
#[derive(Args, Debug, Clone, Default)]
pub struct SearchArgs {
    /// Query text (ignored with --request)
    #[arg(required_unless_present = "request")]
    pub query: Option<String>,

    /// Read the whole request body from a JSON file
    #[arg(long, conflicts_with_all = ["limit", "offset", "cursor", "filters"])]
    pub request: Option<String>,

    #[arg(long)]
    pub limit: Option<usize>,

    #[arg(long)]
    pub offset: Option<usize>,

    #[arg(long)]
    pub cursor: Option<String>,

    #[arg(long)]
    pub min_score: Option<f32>,

    /// Case-insensitive substring of the agent name
    #[arg(long)]
    pub name: Option<String>,

    /// "all", one chain id or a comma-separated list
    #[arg(long, value_parser = parse_chains)]
    pub chains: Option<ChainSelection>,

    /// Standard filters as JSON, e.g. '{"equals":{"chainId":84532}}'
    #[arg(long)]
    pub filters: Option<String>,

    /// Sort key `field:asc|desc` (repeatable, in priority order)
    #[arg(long)]
    pub sort: Vec<String>,

    /// Leave metadata out of the results
    #[arg(long)]
    pub no_metadata: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum AdminCommands {
    /// Show recent sync runs, or one run with its events
    SyncLog {
        /// Show this run and its events
        #[arg(long)]
        id: Option<u64>,

        #[arg(short = 'n', long, default_value = "10")]
        limit: usize,
    },

    /// Show persisted per-chain sync state
    SyncState {
        #[arg(long)]
        chain: Option<u64>,

        /// Include per-agent content hashes
        #[arg(long)]
        hashes: bool,
    },

    /// Delete all persisted sync state; the next sync reindexes everything
    ClearState,
}

/// Parse the `--chains` flag.
pub fn parse_chains(value: &str) -> Result<ChainSelection, String> {
    let value = value.trim();
    if value.eq_ignore_ascii_case("all") {
        return Ok(ChainSelection::All);
    }

    let ids = value
        .split(',')
        .map(|part| {
            part.trim()
                .parse::<u64>()
                .map_err(|_| format!("invalid chain id '{}'", part.trim()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    match ids.as_slice() {
        [id] => Ok(ChainSelection::One(*id)),
        _ => Ok(ChainSelection::Many(ids)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_start() {
        let cli = Cli::parse_from(["agent-search", "start", "--workers", "4"]);
        match cli.command {
            Commands::Start {
                no_schedule,
                workers,
            } => {
                assert!(!no_schedule);
                assert_eq!(workers, Some(4));
            }
            _ => panic!("Expected Start command"),
        }
    }

    #[test]
    fn test_cli_global_flags() {
        let cli = Cli::parse_from([
            "agent-search",
            "--config",
            "/etc/agent-search.toml",
            "sync",
            "--log-level",
            "debug",
            "--db-path",
            "/tmp/db",
        ]);
        assert_eq!(cli.config.as_deref(), Some("/etc/agent-search.toml"));
        assert_eq!(cli.log_level.as_deref(), Some("debug"));
        assert_eq!(cli.db_path.as_deref(), Some("/tmp/db"));
    }

    #[test]
    fn test_cli_sync_chains() {
        let cli = Cli::parse_from(["agent-search", "sync", "--chain", "84532", "--chain", "11155111"]);
        match cli.command {
            Commands::Sync { chains } => assert_eq!(chains, vec![84532, 11155111]),
            _ => panic!("Expected Sync command"),
        }
    }

    #[test]
    fn test_cli_search_flags() {
        let cli = Cli::parse_from([
            "agent-search",
            "search",
            "defi trading bot",
            "--limit",
            "5",
            "--chains",
            "84532,11155111",
            "--sort",
            "name:asc",
        ]);
        match cli.command {
            Commands::Search(args) => {
                assert_eq!(args.query.as_deref(), Some("defi trading bot"));
                assert_eq!(args.limit, Some(5));
                assert_eq!(args.chains, Some(ChainSelection::Many(vec![84532, 11155111])));
                assert_eq!(args.sort, vec!["name:asc"]);
            }
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_search_requires_query_or_request() {
        assert!(Cli::try_parse_from(["agent-search", "search"]).is_err());
        let cli = Cli::parse_from(["agent-search", "search", "--request", "body.json"]);
        match cli.command {
            Commands::Search(args) => assert_eq!(args.request.as_deref(), Some("body.json")),
            _ => panic!("Expected Search command"),
        }
    }

    #[test]
    fn test_cli_admin_sync_log() {
        let cli = Cli::parse_from(["agent-search", "admin", "sync-log", "--id", "7"]);
        match cli.command {
            Commands::Admin {
                command: AdminCommands::SyncLog { id, limit },
            } => {
                assert_eq!(id, Some(7));
                assert_eq!(limit, 10);
            }
            _ => panic!("Expected Admin SyncLog command"),
        }
    }

    #[test]
    fn test_cli_admin_clear_state() {
        let cli = Cli::parse_from(["agent-search", "admin", "clear-state"]);
        assert!(matches!(
            cli.command,
            Commands::Admin {
                command: AdminCommands::ClearState
            }
        ));
    }

    #[test]
    fn test_parse_chains() {
        assert_eq!(parse_chains("all"), Ok(ChainSelection::All));
        assert_eq!(parse_chains("ALL"), Ok(ChainSelection::All));
        assert_eq!(parse_chains("84532"), Ok(ChainSelection::One(84532)));
        assert_eq!(
            parse_chains("1, 2"),
            Ok(ChainSelection::Many(vec![1, 2]))
        );
        assert!(parse_chains("mainnet").is_err());
        assert!(parse_chains("1,,2").is_err());
    }
}
