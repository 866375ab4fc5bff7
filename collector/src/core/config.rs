use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::capture::IgnoreRule;
use crate::utils::file::expand_path;
use crate::utils::retry::RetryPolicy;

use super::cli::CliConfig;
use super::constants::{
    APP_DOT_FOLDER, CONFIG_FILE_NAME, DEFAULT_HOST, DEFAULT_MERGE_INTERVAL_MINUTES,
    DEFAULT_MOUNT_PATH, DEFAULT_PERSIST_MAX_ATTEMPTS, DEFAULT_PERSIST_RETRY_BASE_DELAY_MS,
    DEFAULT_PORT, DEFAULT_TRACKER_QUEUE_CAPACITY, DEFAULT_TRACKER_SHUTDOWN_TIMEOUT_SECS,
    DEFAULT_TRACKER_WORKERS, POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS,
    POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS, POSTGRES_DEFAULT_MAX_CONNECTIONS,
    POSTGRES_DEFAULT_MAX_LIFETIME_SECS, POSTGRES_DEFAULT_MIN_CONNECTIONS,
    POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS,
};

// =============================================================================
// Database Backend Enum (SQLite or PostgreSQL)
// =============================================================================

/// Storage backend for captured telemetry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseBackend {
    #[default]
    Sqlite,
    Postgres,
}

impl fmt::Display for DatabaseBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DatabaseBackend::Sqlite => write!(f, "sqlite"),
            DatabaseBackend::Postgres => write!(f, "postgres"),
        }
    }
}

// =============================================================================
// File Config Structs (JSON deserialization)
// =============================================================================

/// Server configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct ServerFileConfig {
    pub host: Option<String>,
    pub port: Option<u16>,
}

/// Capture configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct CaptureFileConfig {
    pub enabled: Option<bool>,
    #[serde(rename = "async")]
    pub async_mode: Option<bool>,
    pub ignored_routes: Option<Vec<String>>,
    pub mount_path: Option<String>,
}

/// Tracker configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TrackerFileConfig {
    pub queue_capacity: Option<usize>,
    pub workers: Option<usize>,
    pub max_attempts: Option<u32>,
    pub retry_base_delay_ms: Option<u64>,
    pub shutdown_timeout_secs: Option<u64>,
}

/// SQLite configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct SqliteFileConfig {
    /// Database file (default: `<data dir>/sqlite/pulse.db`)
    pub path: Option<String>,
}

/// PostgreSQL configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct PostgresFileConfig {
    /// PostgreSQL connection URL (or use PULSE_POSTGRES_URL env var)
    pub url: Option<String>,
    /// Maximum number of connections in the pool (default: 20)
    pub max_connections: Option<u32>,
    /// Minimum number of connections to keep warm (default: 2)
    pub min_connections: Option<u32>,
    /// Connection acquire timeout in seconds (default: 30)
    pub acquire_timeout_secs: Option<u64>,
    /// Idle connection timeout in seconds (default: 600)
    pub idle_timeout_secs: Option<u64>,
    /// Max connection lifetime in seconds (default: 1800)
    pub max_lifetime_secs: Option<u64>,
    /// Statement timeout in seconds, 0 to disable (default: 60)
    pub statement_timeout_secs: Option<u64>,
}

/// Database configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatabaseFileConfig {
    /// Backend: sqlite (default) or postgres
    pub backend: Option<DatabaseBackend>,
    pub sqlite: Option<SqliteFileConfig>,
    pub postgres: Option<PostgresFileConfig>,
}

/// Maintenance configuration section
#[derive(Debug, Default, Clone, Deserialize)]
pub struct MaintenanceFileConfig {
    pub merge_interval_minutes: Option<u64>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub server: Option<ServerFileConfig>,
    pub capture: Option<CaptureFileConfig>,
    pub tracker: Option<TrackerFileConfig>,
    pub database: Option<DatabaseFileConfig>,
    pub maintenance: Option<MaintenanceFileConfig>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

/// Overwrite `$target` with `$value` when the overlay sets it
macro_rules! merge_field {
    ($target:expr, $value:expr, $name:literal) => {
        if $value.is_some() {
            tracing::trace!(field = $name, value = ?$value, "Merging config field");
            $target = $value;
        }
    };
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(server) = other.server {
            let current = self.server.get_or_insert_with(ServerFileConfig::default);
            merge_field!(current.host, server.host, "server.host");
            merge_field!(current.port, server.port, "server.port");
        }

        if let Some(capture) = other.capture {
            let current = self.capture.get_or_insert_with(CaptureFileConfig::default);
            merge_field!(current.enabled, capture.enabled, "capture.enabled");
            merge_field!(current.async_mode, capture.async_mode, "capture.async");
            merge_field!(
                current.ignored_routes,
                capture.ignored_routes,
                "capture.ignored_routes"
            );
            merge_field!(current.mount_path, capture.mount_path, "capture.mount_path");
        }

        if let Some(tracker) = other.tracker {
            let current = self.tracker.get_or_insert_with(TrackerFileConfig::default);
            merge_field!(
                current.queue_capacity,
                tracker.queue_capacity,
                "tracker.queue_capacity"
            );
            merge_field!(current.workers, tracker.workers, "tracker.workers");
            merge_field!(current.max_attempts, tracker.max_attempts, "tracker.max_attempts");
            merge_field!(
                current.retry_base_delay_ms,
                tracker.retry_base_delay_ms,
                "tracker.retry_base_delay_ms"
            );
            merge_field!(
                current.shutdown_timeout_secs,
                tracker.shutdown_timeout_secs,
                "tracker.shutdown_timeout_secs"
            );
        }

        if let Some(database) = other.database {
            let current = self.database.get_or_insert_with(DatabaseFileConfig::default);
            merge_field!(current.backend, database.backend, "database.backend");

            if let Some(sqlite) = database.sqlite {
                let current_sqlite = current.sqlite.get_or_insert_with(SqliteFileConfig::default);
                merge_field!(current_sqlite.path, sqlite.path, "database.sqlite.path");
            }

            if let Some(pg) = database.postgres {
                let current_pg = current
                    .postgres
                    .get_or_insert_with(PostgresFileConfig::default);
                merge_field!(current_pg.url, pg.url, "database.postgres.url");
                merge_field!(
                    current_pg.max_connections,
                    pg.max_connections,
                    "database.postgres.max_connections"
                );
                merge_field!(
                    current_pg.min_connections,
                    pg.min_connections,
                    "database.postgres.min_connections"
                );
                merge_field!(
                    current_pg.acquire_timeout_secs,
                    pg.acquire_timeout_secs,
                    "database.postgres.acquire_timeout_secs"
                );
                merge_field!(
                    current_pg.idle_timeout_secs,
                    pg.idle_timeout_secs,
                    "database.postgres.idle_timeout_secs"
                );
                merge_field!(
                    current_pg.max_lifetime_secs,
                    pg.max_lifetime_secs,
                    "database.postgres.max_lifetime_secs"
                );
                merge_field!(
                    current_pg.statement_timeout_secs,
                    pg.statement_timeout_secs,
                    "database.postgres.statement_timeout_secs"
                );
            }
        }

        if let Some(maintenance) = other.maintenance {
            let current = self
                .maintenance
                .get_or_insert_with(MaintenanceFileConfig::default);
            merge_field!(
                current.merge_interval_minutes,
                maintenance.merge_interval_minutes,
                "maintenance.merge_interval_minutes"
            );
        }
    }
}

// =============================================================================
// Runtime Config Structs (final merged configuration)
// =============================================================================

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
        }
    }
}

/// Capture configuration (final/runtime)
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Master switch; when off, wrappers run the handler untouched
    pub enabled: bool,
    /// Persist on the background queue (true) or inline (false)
    pub async_mode: bool,
    /// Exact `"METHOD path"` / path strings, or `re:` prefixed regex patterns
    pub ignored_routes: Vec<String>,
    /// Mount path of the collector's own routes, normalized to `/segment`
    pub mount_path: String,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            async_mode: true,
            ignored_routes: Vec::new(),
            mount_path: DEFAULT_MOUNT_PATH.to_string(),
        }
    }
}

/// Tracker configuration (final/runtime)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerConfig {
    pub queue_capacity: usize,
    pub workers: usize,
    pub max_attempts: u32,
    pub retry_base_delay_ms: u64,
    pub shutdown_timeout_secs: u64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            queue_capacity: DEFAULT_TRACKER_QUEUE_CAPACITY,
            workers: DEFAULT_TRACKER_WORKERS,
            max_attempts: DEFAULT_PERSIST_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_PERSIST_RETRY_BASE_DELAY_MS,
            shutdown_timeout_secs: DEFAULT_TRACKER_SHUTDOWN_TIMEOUT_SECS,
        }
    }
}

impl TrackerConfig {
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_base_delay_ms)
    }
}

/// SQLite configuration (final/runtime)
#[derive(Debug, Clone, Default)]
pub struct SqliteConfig {
    /// Explicit database file; `None` uses the data directory
    pub path: Option<PathBuf>,
}

/// PostgreSQL configuration (final/runtime)
#[derive(Debug, Clone, Default)]
pub struct PostgresConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    pub max_connections: u32,
    /// Minimum number of connections to keep warm
    pub min_connections: u32,
    /// Connection acquire timeout in seconds
    pub acquire_timeout_secs: u64,
    /// Idle connection timeout in seconds
    pub idle_timeout_secs: u64,
    /// Max connection lifetime in seconds
    pub max_lifetime_secs: u64,
    /// Statement timeout in seconds (0 = disabled)
    pub statement_timeout_secs: u64,
}

/// Database configuration (final/runtime)
#[derive(Debug, Clone, Default)]
pub struct DatabaseConfig {
    pub backend: DatabaseBackend,
    pub sqlite: SqliteConfig,
    /// Only set when backend = postgres
    pub postgres: Option<PostgresConfig>,
}

/// Maintenance configuration (final/runtime)
#[derive(Debug, Clone, Default)]
pub struct MaintenanceConfig {
    /// Interval of the background query merge (0 = disabled)
    pub merge_interval_minutes: u64,
}

/// Final merged application configuration
#[derive(Debug, Clone, Default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub capture: CaptureConfig,
    pub tracker: TrackerConfig,
    pub database: DatabaseConfig,
    pub maintenance: MaintenanceConfig,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Profile directory config (~/.pulse/pulse.json)
    /// 3. Local directory config OR CLI-specified config path
    /// 4. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();
        let mut found_configs: Vec<String> = Vec::new();

        // 1. Load from profile dir (~/.pulse/pulse.json) - skip if not exists
        if let Some(profile_path) = get_profile_config_path()
            && profile_path.exists()
        {
            let profile_config = FileConfig::load_from_file(&profile_path)?;
            profile_config.warn_unknown_fields();
            file_config.merge(profile_config);
            found_configs.push(profile_path.display().to_string());
        }

        // 2. Load from CLI-specified path OR local directory
        let overlay_path = if let Some(ref path) = cli.config {
            let expanded = expand_path(&path.to_string_lossy());
            if !expanded.exists() {
                anyhow::bail!("Config file not found: {}", expanded.display());
            }
            Some(expanded)
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            found_configs.push(path.display().to_string());
        }

        tracing::debug!(configs = ?found_configs, "Config files loaded");

        let config = Self::layer(cli, file_config);
        config.validate()?;

        tracing::debug!(
            host = %config.server.host,
            port = config.server.port,
            capture_enabled = config.capture.enabled,
            async_mode = config.capture.async_mode,
            mount_path = %config.capture.mount_path,
            ignored_routes = config.capture.ignored_routes.len(),
            queue_capacity = config.tracker.queue_capacity,
            workers = config.tracker.workers,
            max_attempts = config.tracker.max_attempts,
            database_backend = %config.database.backend,
            merge_interval_minutes = config.maintenance.merge_interval_minutes,
            "Configuration loaded"
        );

        Ok(config)
    }

    /// Layer configs: defaults -> file config -> CLI/env overrides
    fn layer(cli: &CliConfig, file_config: FileConfig) -> Self {
        let file_server = file_config.server.unwrap_or_default();
        let file_capture = file_config.capture.unwrap_or_default();
        let file_tracker = file_config.tracker.unwrap_or_default();
        let file_database = file_config.database.unwrap_or_default();
        let file_maintenance = file_config.maintenance.unwrap_or_default();

        let server = ServerConfig {
            host: cli
                .host
                .clone()
                .or(file_server.host)
                .unwrap_or_else(|| DEFAULT_HOST.to_string()),
            port: cli.port.or(file_server.port).unwrap_or(DEFAULT_PORT),
        };

        // CLI ignore rules extend the file list rather than replacing it
        let mut ignored_routes = file_capture.ignored_routes.unwrap_or_default();
        ignored_routes.extend(
            cli.ignored_routes
                .iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
        );

        let capture = CaptureConfig {
            enabled: cli.enabled.or(file_capture.enabled).unwrap_or(true),
            async_mode: cli.async_mode.or(file_capture.async_mode).unwrap_or(true),
            ignored_routes,
            mount_path: normalize_mount_path(
                cli.mount_path
                    .as_deref()
                    .or(file_capture.mount_path.as_deref())
                    .unwrap_or(DEFAULT_MOUNT_PATH),
            ),
        };

        let tracker = TrackerConfig {
            queue_capacity: cli
                .queue_capacity
                .or(file_tracker.queue_capacity)
                .unwrap_or(DEFAULT_TRACKER_QUEUE_CAPACITY),
            workers: cli
                .workers
                .or(file_tracker.workers)
                .unwrap_or(DEFAULT_TRACKER_WORKERS),
            max_attempts: file_tracker
                .max_attempts
                .unwrap_or(DEFAULT_PERSIST_MAX_ATTEMPTS),
            retry_base_delay_ms: file_tracker
                .retry_base_delay_ms
                .unwrap_or(DEFAULT_PERSIST_RETRY_BASE_DELAY_MS),
            shutdown_timeout_secs: file_tracker
                .shutdown_timeout_secs
                .unwrap_or(DEFAULT_TRACKER_SHUTDOWN_TIMEOUT_SECS),
        };

        let backend = cli
            .database_backend
            .or(file_database.backend)
            .unwrap_or_default();

        let sqlite = SqliteConfig {
            path: cli.sqlite_path.clone().or_else(|| {
                file_database
                    .sqlite
                    .and_then(|s| s.path)
                    .map(|p| expand_path(&p))
            }),
        };

        // postgres config is only materialized for the postgres backend
        let postgres = (backend == DatabaseBackend::Postgres).then(|| {
            let file_pg = file_database.postgres.unwrap_or_default();
            PostgresConfig {
                url: cli.postgres_url.clone().or(file_pg.url).unwrap_or_default(),
                max_connections: file_pg
                    .max_connections
                    .unwrap_or(POSTGRES_DEFAULT_MAX_CONNECTIONS),
                min_connections: file_pg
                    .min_connections
                    .unwrap_or(POSTGRES_DEFAULT_MIN_CONNECTIONS),
                acquire_timeout_secs: file_pg
                    .acquire_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS),
                idle_timeout_secs: file_pg
                    .idle_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS),
                max_lifetime_secs: file_pg
                    .max_lifetime_secs
                    .unwrap_or(POSTGRES_DEFAULT_MAX_LIFETIME_SECS),
                statement_timeout_secs: file_pg
                    .statement_timeout_secs
                    .unwrap_or(POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS),
            }
        });

        let maintenance = MaintenanceConfig {
            merge_interval_minutes: cli
                .merge_interval_minutes
                .or(file_maintenance.merge_interval_minutes)
                .unwrap_or(DEFAULT_MERGE_INTERVAL_MINUTES),
        };

        Self {
            server,
            capture,
            tracker,
            database: DatabaseConfig {
                backend,
                sqlite,
                postgres,
            },
            maintenance,
        }
    }

    /// Validate the configuration for consistency and correctness
    pub fn validate(&self) -> Result<()> {
        if self.server.host.is_empty() {
            anyhow::bail!("Configuration error: server.host must not be empty");
        }
        if self.server.port == 0 {
            anyhow::bail!("Configuration error: server.port must be greater than 0");
        }

        // "/" would make every route the collector's own and ignore everything
        if self.capture.mount_path == "/" {
            anyhow::bail!("Configuration error: capture.mount_path must not be \"/\"");
        }

        for rule in &self.capture.ignored_routes {
            IgnoreRule::parse(rule).with_context(|| {
                format!("Configuration error: invalid capture.ignored_routes entry {rule:?}")
            })?;
        }

        if self.tracker.queue_capacity == 0 {
            anyhow::bail!("Configuration error: tracker.queue_capacity must be greater than 0");
        }
        if self.tracker.workers == 0 {
            anyhow::bail!("Configuration error: tracker.workers must be greater than 0");
        }
        if self.tracker.max_attempts == 0 {
            anyhow::bail!("Configuration error: tracker.max_attempts must be at least 1");
        }

        if self.database.backend == DatabaseBackend::Postgres {
            let url = self
                .database
                .postgres
                .as_ref()
                .map(|pg| pg.url.as_str())
                .unwrap_or_default();
            if url.is_empty() {
                anyhow::bail!(
                    "Configuration error: database.postgres.url is required for the postgres backend"
                );
            }
        }

        Ok(())
    }
}

/// Normalize a mount path to a leading slash and no trailing slash
fn normalize_mount_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_end_matches('/');
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.starts_with('/') {
        trimmed.to_string()
    } else {
        format!("/{trimmed}")
    }
}

/// Get the profile config path (~/.pulse/pulse.json)
fn get_profile_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|h| h.join(APP_DOT_FOLDER).join(CONFIG_FILE_NAME))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(json: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(json.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_database_backend_serde() {
        let backend: DatabaseBackend = serde_json::from_str(r#""postgres""#).unwrap();
        assert_eq!(backend, DatabaseBackend::Postgres);
        assert_eq!(DatabaseBackend::Sqlite.to_string(), "sqlite");
    }

    #[test]
    fn test_file_config_parse_full() {
        let json = r#"{
            "server": { "host": "0.0.0.0", "port": 8080 },
            "capture": {
                "enabled": true,
                "async": false,
                "ignored_routes": ["GET /up", "re:^/assets/"],
                "mount_path": "/perf"
            },
            "tracker": { "queue_capacity": 64, "workers": 4 },
            "database": { "backend": "postgres", "postgres": { "url": "postgres://localhost/pulse" } },
            "maintenance": { "merge_interval_minutes": 60 }
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        let capture = config.capture.as_ref().unwrap();
        assert_eq!(capture.async_mode, Some(false));
        assert_eq!(capture.ignored_routes.as_ref().unwrap().len(), 2);
        assert_eq!(config.tracker.as_ref().unwrap().workers, Some(4));
        assert_eq!(
            config.database.as_ref().unwrap().backend,
            Some(DatabaseBackend::Postgres)
        );
        assert_eq!(
            config.maintenance.as_ref().unwrap().merge_interval_minutes,
            Some(60)
        );
    }

    #[test]
    fn test_file_config_parse_extra_fields() {
        let json = r#"{ "server": { "host": "localhost" }, "captrue": {} }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();
        assert!(config.extra.get("captrue").is_some());
        assert!(config.capture.is_none());
    }

    #[test]
    fn test_file_config_merge() {
        let mut base = FileConfig {
            server: Some(ServerFileConfig {
                host: Some("base.host".into()),
                port: Some(1000),
            }),
            capture: Some(CaptureFileConfig {
                enabled: Some(true),
                async_mode: Some(true),
                ignored_routes: Some(vec!["/up".into()]),
                mount_path: None,
            }),
            ..Default::default()
        };
        let overlay = FileConfig {
            server: Some(ServerFileConfig {
                host: None,
                port: Some(2000),
            }),
            capture: Some(CaptureFileConfig {
                async_mode: Some(false),
                ..Default::default()
            }),
            database: Some(DatabaseFileConfig {
                backend: Some(DatabaseBackend::Postgres),
                ..Default::default()
            }),
            ..Default::default()
        };

        base.merge(overlay);

        let server = base.server.unwrap();
        assert_eq!(server.host.as_deref(), Some("base.host"));
        assert_eq!(server.port, Some(2000));
        let capture = base.capture.unwrap();
        assert_eq!(capture.enabled, Some(true));
        assert_eq!(capture.async_mode, Some(false));
        assert_eq!(capture.ignored_routes, Some(vec!["/up".to_string()]));
        assert_eq!(base.database.unwrap().backend, Some(DatabaseBackend::Postgres));
    }

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::layer(&CliConfig::default(), FileConfig::default());
        config.validate().unwrap();

        assert_eq!(config.server.host, DEFAULT_HOST);
        assert_eq!(config.server.port, DEFAULT_PORT);
        assert!(config.capture.enabled);
        assert!(config.capture.async_mode);
        assert_eq!(config.capture.mount_path, DEFAULT_MOUNT_PATH);
        assert_eq!(config.tracker, TrackerConfig::default());
        assert_eq!(config.database.backend, DatabaseBackend::Sqlite);
        assert!(config.database.postgres.is_none());
        assert_eq!(config.maintenance.merge_interval_minutes, 0);
    }

    #[test]
    fn test_app_config_cli_overrides_file() {
        let file = write_config(
            r#"{
                "server": { "port": 7000 },
                "capture": { "async": true, "ignored_routes": ["GET /up"], "mount_path": "perf/" },
                "tracker": { "workers": 8, "max_attempts": 5 }
            }"#,
        );
        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            port: Some(7100),
            async_mode: Some(false),
            ignored_routes: vec!["re:^/assets/".into()],
            workers: Some(3),
            ..Default::default()
        };

        let config = AppConfig::load(&cli).unwrap();
        assert_eq!(config.server.port, 7100);
        assert!(!config.capture.async_mode);
        assert_eq!(config.capture.mount_path, "/perf");
        assert_eq!(config.capture.ignored_routes, vec!["GET /up", "re:^/assets/"]);
        assert_eq!(config.tracker.workers, 3);
        assert_eq!(config.tracker.max_attempts, 5);
        assert_eq!(config.tracker.retry_policy().max_attempts, 5);
    }

    #[test]
    fn test_app_config_missing_file_errors() {
        let cli = CliConfig {
            config: Some(PathBuf::from("/nonexistent/pulse.json")),
            ..Default::default()
        };
        let err = AppConfig::load(&cli).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_app_config_invalid_json_errors() {
        let file = write_config("{ not json");
        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let err = AppConfig::load(&cli).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_validation_postgres_requires_url() {
        let cli = CliConfig {
            database_backend: Some(DatabaseBackend::Postgres),
            ..Default::default()
        };
        let config = AppConfig::layer(&cli, FileConfig::default());
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("database.postgres.url"));

        let cli = CliConfig {
            database_backend: Some(DatabaseBackend::Postgres),
            postgres_url: Some("postgres://localhost/pulse".into()),
            ..Default::default()
        };
        let config = AppConfig::layer(&cli, FileConfig::default());
        config.validate().unwrap();
        let pg = config.database.postgres.unwrap();
        assert_eq!(pg.max_connections, POSTGRES_DEFAULT_MAX_CONNECTIONS);
    }

    #[test]
    fn test_validation_rejects_bad_ignore_pattern() {
        let cli = CliConfig {
            ignored_routes: vec!["re:([unclosed".into()],
            ..Default::default()
        };
        let config = AppConfig::layer(&cli, FileConfig::default());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validation_rejects_root_mount_and_zero_workers() {
        let cli = CliConfig {
            mount_path: Some("/".into()),
            ..Default::default()
        };
        assert!(AppConfig::layer(&cli, FileConfig::default()).validate().is_err());

        let cli = CliConfig {
            workers: Some(0),
            ..Default::default()
        };
        assert!(AppConfig::layer(&cli, FileConfig::default()).validate().is_err());
    }

    #[test]
    fn test_normalize_mount_path() {
        assert_eq!(normalize_mount_path("/pulse"), "/pulse");
        assert_eq!(normalize_mount_path("pulse/"), "/pulse");
        assert_eq!(normalize_mount_path(" /a/b/ "), "/a/b");
        assert_eq!(normalize_mount_path(""), "/");
    }
}
