//! Command implementations for the agent search daemon.
//!
//! Handles:
//! - start: scheduler plus sync consumers until SIGINT/SIGTERM
//! - sync: one sync run, waiting for every chain to finish
//! - search: standard search against the local index
//! - admin: sync log and sync state inspection

use std::fs;

use anyhow::{bail, Context, Result};
use serde_json::{json, Map, Value};
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use agent_scheduler::{create_sync_job, SchedulerConfig, SchedulerService, SyncJobConfig};
use agent_search::{parse_request, SearchError};
use agent_storage::{RocksSyncStateStore, SyncLogger, SyncStateStore};
use agent_types::{
    ChainSyncState, ProviderInfo, Settings, StandardFilters, StandardSearchRequest, SyncState,
    SyncStatus,
};

use crate::cli::{AdminCommands, Cli, SearchArgs};
use crate::runtime::{open_search_manager, open_storage, SyncPipeline};

/// Flags shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalOptions {
    pub config: Option<String>,
    pub log_level: Option<String>,
    pub db_path: Option<String>,
}

impl From<&Cli> for GlobalOptions {
    fn from(cli: &Cli) -> Self {
        Self {
            config: cli.config.clone(),
            log_level: cli.log_level.clone(),
            db_path: cli.db_path.clone(),
        }
    }
}

/// Load configuration (defaults -> file -> env) and apply CLI overrides.
pub fn load_settings(opts: &GlobalOptions) -> Result<Settings> {
    let mut settings =
        Settings::load(opts.config.as_deref()).context("Failed to load configuration")?;

    if let Some(db_path) = &opts.db_path {
        settings.db_path = db_path.clone();
    }
    if let Some(log_level) = &opts.log_level {
        settings.log_level = log_level.clone();
    }
    Ok(settings)
}

/// Install the global subscriber. Logs go to stderr so command output on
/// stdout stays machine readable.
fn init_logging(settings: &Settings) -> Result<()> {
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&settings.log_level)),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;
    Ok(())
}

fn print_json(value: &impl serde::Serialize) -> Result<()> {
    println!(
        "{}",
        serde_json::to_string_pretty(value).context("Failed to serialize output")?
    );
    Ok(())
}

async fn shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())
        .context("Failed to install SIGTERM handler")?;

    #[cfg(unix)]
    let terminated = terminate.recv();
    #[cfg(not(unix))]
    let terminated = std::future::pending::<Option<()>>();

    tokio::select! {
        res = signal::ctrl_c() => {
            res.context("Failed to install Ctrl+C handler")?;
            info!("Received Ctrl+C, shutting down...");
        }
        _ = terminated => {
            info!("Received SIGTERM, shutting down...");
        }
    }
    Ok(())
}

/// Start the daemon.
///
/// 1. Load configuration and install logging
/// 2. Open storage, vector index and the sync pipeline
/// 3. Start the consumer pool and register the sync cron job
/// 4. On SIGINT/SIGTERM stop the scheduler, drain workers and flush the index
pub async fn start_daemon(
    opts: &GlobalOptions,
    no_schedule: bool,
    workers_override: Option<usize>,
) -> Result<()> {
    let mut settings = load_settings(opts)?;
    if let Some(workers) = workers_override {
        settings.sync.workers = workers;
    }
    init_logging(&settings)?;

    info!("Agent search daemon starting...");
    info!("Configuration:");
    info!("  Database path: {}", settings.db_path);
    info!("  Vector index: {}", settings.vector_index_path);
    info!("  Chains: {:?}", settings.sync.chain_ids());
    info!("  Sync schedule: {} ({})", settings.sync.cron, settings.sync.timezone);
    info!("  Log level: {}", settings.log_level);

    let mut pipeline = SyncPipeline::open(&settings)?;
    let cancel = CancellationToken::new();
    let pool = pipeline.start_consumers(settings.sync.workers, cancel.clone())?;

    let mut scheduler = SchedulerService::new(SchedulerConfig::from(&settings.scheduler))
        .await
        .context("Failed to create scheduler")?;

    if no_schedule {
        info!("Scheduling disabled by --no-schedule");
    } else if !settings.sync.enabled {
        info!("Scheduled sync disabled in configuration");
    } else if settings.sync.chains.is_empty() {
        warn!("No chains configured; scheduled sync not registered");
    } else {
        create_sync_job(
            &scheduler,
            pipeline.trigger.clone(),
            SyncJobConfig::from(&settings.sync),
        )
        .await
        .context("Failed to register sync job")?;
    }
    scheduler.start().await.context("Failed to start scheduler")?;

    let result = shutdown_signal().await;

    if let Err(e) = scheduler.shutdown().await {
        warn!(error = %e, "Scheduler shutdown failed");
    }
    pool.shutdown().await;
    pipeline.persist().await;
    info!("Agent search daemon stopped");

    result
}

/// Run one sync now: enqueue, let the workers drain the queue, report.
pub async fn run_sync(opts: &GlobalOptions, chains: &[u64]) -> Result<()> {
    let settings = load_settings(opts)?;
    init_logging(&settings)?;

    let mut pipeline = SyncPipeline::open(&settings)?;
    let cancel = CancellationToken::new();
    let pool = pipeline.start_consumers(settings.sync.workers, cancel)?;

    let triggered = if chains.is_empty() {
        pipeline.trigger.run().await
    } else {
        pipeline.trigger.run_for(chains).await
    };
    let log_id = match triggered {
        Ok(id) => id,
        Err(e) => {
            pool.shutdown().await;
            return Err(e).context("Sync could not be started");
        }
    };

    pipeline.trigger.queue().wait_idle().await;
    pool.shutdown().await;
    pipeline.persist().await;

    let entry = pipeline
        .logger
        .get(log_id)
        .context("Failed to read sync log")?
        .with_context(|| format!("Sync log entry {} missing", log_id))?;
    print_json(&entry)?;

    if entry.status == SyncStatus::Error {
        bail!(
            "Sync run {} failed: {}",
            log_id,
            entry.error_message.unwrap_or_default()
        );
    }
    Ok(())
}

/// Build the request from `--request <file>` or from the individual flags.
pub fn build_request(args: &SearchArgs, max_request_bytes: usize) -> Result<StandardSearchRequest> {
    if let Some(path) = &args.request {
        let body = fs::read(path).with_context(|| format!("Failed to read {}", path))?;
        let mut request = parse_request(&body, max_request_bytes)?;
        if let Some(min_score) = args.min_score {
            request.min_score = Some(min_score);
        }
        if args.no_metadata {
            request.include_metadata = false;
        }
        return Ok(request);
    }

    let query = args
        .query
        .clone()
        .context("A query or --request is required")?;
    let mut request = StandardSearchRequest::new(query);
    request.limit = args.limit;
    request.offset = args.offset;
    request.cursor = args.cursor.clone();
    request.min_score = args.min_score;
    request.name = args.name.clone();
    request.chains = args.chains.clone();
    request.sort = args.sort.clone();
    request.include_metadata = !args.no_metadata;

    if let Some(raw) = &args.filters {
        let filters: StandardFilters =
            serde_json::from_str(raw).context("--filters is not a valid filter object")?;
        request.filters = Some(filters);
    }
    Ok(request)
}

/// Run a standard search and print the response envelope.
///
/// Validation failures print `{"error": {code, field, message}}`.
pub async fn run_search(opts: &GlobalOptions, args: &SearchArgs) -> Result<()> {
    let settings = load_settings(opts)?;
    init_logging(&settings)?;

    let request = build_request(args, settings.search.max_request_bytes)?;
    let manager = open_search_manager(&settings)?;
    let provider = ProviderInfo::new(
        settings.search.provider_name.clone(),
        settings.search.provider_version.clone(),
    );
    let chains = settings.search_chains();

    match manager
        .search_agents_v1(&request, &provider, Some(&chains))
        .await
    {
        Ok(response) => print_json(&response),
        Err(SearchError::Validation(err)) => {
            print_json(&json!({ "error": err }))?;
            bail!("Invalid search request: {}", err);
        }
        Err(e) => Err(e).context("Search failed"),
    }
}

/// Summarise one chain's state; hashes are large, so they are opt-in.
pub fn chain_state_summary(state: &ChainSyncState, hashes: bool) -> Result<Value> {
    if hashes {
        return serde_json::to_value(state).context("Failed to serialize sync state");
    }
    Ok(json!({
        "lastUpdatedAt": state.last_updated_at,
        "agents": state.agent_count(),
    }))
}

fn sync_state_summary(state: &SyncState, hashes: bool) -> Result<Value> {
    let mut out = Map::new();
    for (chain_id, chain) in state {
        out.insert(chain_id.to_string(), chain_state_summary(chain, hashes)?);
    }
    Ok(Value::Object(out))
}

/// Handle admin commands. These only touch the sync database.
pub async fn handle_admin(opts: &GlobalOptions, command: AdminCommands) -> Result<()> {
    let settings = load_settings(opts)?;
    init_logging(&settings)?;
    let storage = open_storage(&settings)?;

    match command {
        AdminCommands::SyncLog { id: Some(id), .. } => {
            let logger = SyncLogger::new(storage);
            let entry = logger
                .get(id)
                .context("Failed to read sync log")?
                .with_context(|| format!("No sync run with id {}", id))?;
            let events = logger.events(id).context("Failed to read sync events")?;
            print_json(&json!({ "entry": entry, "events": events }))
        }
        AdminCommands::SyncLog { id: None, limit } => {
            let logger = SyncLogger::new(storage);
            let entries = logger.recent(limit).context("Failed to read sync log")?;
            print_json(&entries)
        }
        AdminCommands::SyncState { chain, hashes } => {
            let store = RocksSyncStateStore::new(storage);
            let state: SyncState = match chain {
                Some(chain_id) => store
                    .load_chain(chain_id)
                    .await
                    .map(|state| (chain_id, state))
                    .into_iter()
                    .collect(),
                None => store.load().await.unwrap_or_default(),
            };
            let summary = sync_state_summary(&state, hashes)?;
            print_json(&summary)
        }
        AdminCommands::ClearState => {
            let store = RocksSyncStateStore::new(storage);
            store.clear().await.context("Failed to clear sync state")?;
            println!("Sync state cleared; the next sync reindexes every agent");
            Ok(())
        }
    }
}
