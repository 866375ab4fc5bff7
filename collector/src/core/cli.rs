use clap::{Parser, Subcommand};

use std::path::PathBuf;

use super::config::DatabaseBackend;
use super::constants::{
    ENV_CAPTURE_ASYNC, ENV_CAPTURE_ENABLED, ENV_CONFIG, ENV_DATABASE_BACKEND, ENV_HOST,
    ENV_IGNORED_ROUTES, ENV_MERGE_INTERVAL_MINUTES, ENV_MOUNT_PATH, ENV_PORT, ENV_POSTGRES_URL,
    ENV_SQLITE_PATH, ENV_TRACKER_QUEUE_CAPACITY, ENV_TRACKER_WORKERS,
};

#[derive(Parser)]
#[command(name = "pulse")]
#[command(version, about = "In-process performance telemetry collector", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Server host address
    #[arg(long, short = 'H', global = true, env = ENV_HOST)]
    pub host: Option<String>,

    /// Server port
    #[arg(long, short = 'p', global = true, env = ENV_PORT)]
    pub port: Option<u16>,

    /// Path to config file
    #[arg(long, short = 'c', global = true, env = ENV_CONFIG)]
    pub config: Option<PathBuf>,

    /// Enable or disable capture
    #[arg(long, global = true, env = ENV_CAPTURE_ENABLED)]
    pub enabled: Option<bool>,

    /// Persist captured payloads on a background queue (false = inline)
    #[arg(long = "async", global = true, env = ENV_CAPTURE_ASYNC)]
    pub async_mode: Option<bool>,

    /// Mount path of the collector's own routes
    #[arg(long, global = true, env = ENV_MOUNT_PATH)]
    pub mount_path: Option<String>,

    /// Additional ignored routes: exact "METHOD path" / path, or re:<regex>
    #[arg(long = "ignore-route", global = true, env = ENV_IGNORED_ROUTES, value_delimiter = ',')]
    pub ignored_routes: Vec<String>,

    /// Bounded queue capacity for async persistence
    #[arg(long, global = true, env = ENV_TRACKER_QUEUE_CAPACITY)]
    pub queue_capacity: Option<usize>,

    /// Number of concurrent persistence workers
    #[arg(long, global = true, env = ENV_TRACKER_WORKERS)]
    pub workers: Option<usize>,

    /// Query merge interval in minutes (0 = disabled)
    #[arg(long, global = true, env = ENV_MERGE_INTERVAL_MINUTES)]
    pub merge_interval_minutes: Option<u64>,

    // Database options
    /// Storage backend (sqlite or postgres)
    #[arg(long, global = true, env = ENV_DATABASE_BACKEND, value_parser = parse_database_backend)]
    pub database_backend: Option<DatabaseBackend>,

    /// SQLite database file (when using sqlite backend)
    #[arg(long, global = true, env = ENV_SQLITE_PATH)]
    pub sqlite_path: Option<PathBuf>,

    /// PostgreSQL connection URL (when using postgres backend)
    #[arg(long, global = true, env = ENV_POSTGRES_URL)]
    pub postgres_url: Option<String>,
}

/// Parse database backend from CLI/env string
fn parse_database_backend(s: &str) -> Result<DatabaseBackend, String> {
    match s.to_lowercase().as_str() {
        "sqlite" => Ok(DatabaseBackend::Sqlite),
        "postgres" | "postgresql" => Ok(DatabaseBackend::Postgres),
        _ => Err(format!(
            "Invalid database backend '{}'. Valid options: sqlite, postgres",
            s
        )),
    }
}

#[derive(Subcommand, Clone, Debug)]
pub enum Commands {
    /// Start the collector (default command)
    Start,
    /// Storage maintenance commands
    Maintenance {
        #[command(subcommand)]
        command: MaintenanceCommands,
    },
}

#[derive(Subcommand, Clone, Debug)]
pub enum MaintenanceCommands {
    /// Collapse query rows that share a normalized statement, then exit
    MergeQueries,
}

/// Configuration derived from CLI arguments
#[derive(Debug, Clone, Default)]
pub struct CliConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
    pub config: Option<PathBuf>,
    pub enabled: Option<bool>,
    pub async_mode: Option<bool>,
    pub mount_path: Option<String>,
    pub ignored_routes: Vec<String>,
    pub queue_capacity: Option<usize>,
    pub workers: Option<usize>,
    pub merge_interval_minutes: Option<u64>,
    pub database_backend: Option<DatabaseBackend>,
    pub sqlite_path: Option<PathBuf>,
    pub postgres_url: Option<String>,
}

/// Parse CLI arguments and return config with command
pub fn parse() -> (CliConfig, Option<Commands>) {
    let cli = Cli::parse();
    let config = CliConfig {
        host: cli.host,
        port: cli.port,
        config: cli.config,
        enabled: cli.enabled,
        async_mode: cli.async_mode,
        mount_path: cli.mount_path,
        ignored_routes: cli.ignored_routes,
        queue_capacity: cli.queue_capacity,
        workers: cli.workers,
        merge_interval_minutes: cli.merge_interval_minutes,
        database_backend: cli.database_backend,
        sqlite_path: cli.sqlite_path,
        postgres_url: cli.postgres_url,
    };
    (config, cli.command)
}
