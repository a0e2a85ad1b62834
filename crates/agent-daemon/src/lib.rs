//! Agent search daemon library exports.
//!
//! # Modules
//!
//! - `cli`: Command-line argument parsing with clap
//! - `commands`: Command implementations (start, sync, search, admin)
//! - `runtime`: Construction of storage, index and sync pipeline

pub mod cli;
pub mod commands;
pub mod runtime;

pub use cli::{AdminCommands, Cli, Commands, SearchArgs};
pub use commands::{
    build_request, handle_admin, load_settings, run_search, run_sync, start_daemon, GlobalOptions,
};
pub use runtime::{open_search_manager, open_storage, subgraph_client, SyncPipeline};
