// =============================================================================
// Application Identity
// =============================================================================

/// Application name in title case (for display and platform directories)
pub const APP_NAME: &str = "Pulse";

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "pulse";

/// Unix-style dotfile folder name
pub const APP_DOT_FOLDER: &str = ".pulse";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "pulse.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "PULSE_CONFIG";

// =============================================================================
// Environment Variables - Server
// =============================================================================

/// Environment variable for server host
pub const ENV_HOST: &str = "PULSE_HOST";

/// Environment variable for server port
pub const ENV_PORT: &str = "PULSE_PORT";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "PULSE_LOG";

// =============================================================================
// Server Defaults
// =============================================================================

/// Default server host
pub const DEFAULT_HOST: &str = "127.0.0.1";

/// Default server port
pub const DEFAULT_PORT: u16 = 5390;

// =============================================================================
// Environment Variables - Storage
// =============================================================================

/// Environment variable to override data directory
pub const ENV_DATA_DIR: &str = "PULSE_DATA_DIR";

// =============================================================================
// Capture
// =============================================================================

/// Environment variable to enable or disable capture
pub const ENV_CAPTURE_ENABLED: &str = "PULSE_ENABLED";

/// Environment variable to switch between async and inline persistence
pub const ENV_CAPTURE_ASYNC: &str = "PULSE_ASYNC";

/// Environment variable for comma-separated ignored routes
pub const ENV_IGNORED_ROUTES: &str = "PULSE_IGNORED_ROUTES";

/// Environment variable for the collector's own mount path
pub const ENV_MOUNT_PATH: &str = "PULSE_MOUNT_PATH";

/// Default mount path of the collector's own routes (always ignored by capture)
pub const DEFAULT_MOUNT_PATH: &str = "/pulse";

/// Inbound header carrying the host's request id
pub const REQUEST_ID_HEADER: &str = "x-request-id";

// =============================================================================
// Tracker
// =============================================================================

/// Environment variable for the async queue capacity
pub const ENV_TRACKER_QUEUE_CAPACITY: &str = "PULSE_TRACKER_QUEUE_CAPACITY";

/// Environment variable for the number of persistence workers
pub const ENV_TRACKER_WORKERS: &str = "PULSE_TRACKER_WORKERS";

/// Default bounded queue capacity for async persistence
pub const DEFAULT_TRACKER_QUEUE_CAPACITY: usize = 1024;

/// Default number of concurrent persistence workers
pub const DEFAULT_TRACKER_WORKERS: usize = 2;

/// Default persistence attempts (first try + 2 retries)
pub const DEFAULT_PERSIST_MAX_ATTEMPTS: u32 = 3;

/// Default retry backoff base in milliseconds
pub const DEFAULT_PERSIST_RETRY_BASE_DELAY_MS: u64 = 100;

/// Default time allowed for draining queued payloads on shutdown
pub const DEFAULT_TRACKER_SHUTDOWN_TIMEOUT_SECS: u64 = 10;

/// Preferred rows per multi-row operation insert (capped by the bind limit)
pub const OPERATION_INSERT_BATCH_ROWS: usize = 100;

/// Timeout for the storage liveness probe
pub const HEALTH_CHECK_TIMEOUT_SECS: u64 = 5;

// =============================================================================
// Maintenance
// =============================================================================

/// Environment variable for the query merge interval in minutes
pub const ENV_MERGE_INTERVAL_MINUTES: &str = "PULSE_MERGE_INTERVAL_MINUTES";

/// Default query merge interval (0 = disabled)
pub const DEFAULT_MERGE_INTERVAL_MINUTES: u64 = 0;

// =============================================================================
// SQLite Database
// =============================================================================

/// SQLite database filename
pub const SQLITE_DB_FILENAME: &str = "pulse.db";

/// Environment variable for the SQLite database path
pub const ENV_SQLITE_PATH: &str = "PULSE_SQLITE_PATH";

/// SQLite connection pool max connections
pub const SQLITE_MAX_CONNECTIONS: u32 = 5;

/// SQLite busy timeout in seconds
pub const SQLITE_BUSY_TIMEOUT_SECS: u64 = 30;

/// SQLite cache size (negative = KB, so -64000 = 64MB)
pub const SQLITE_CACHE_SIZE: &str = "-64000";

/// SQLite WAL auto-checkpoint threshold (pages, ~4MB at 1000)
pub const SQLITE_WAL_AUTOCHECKPOINT: &str = "1000";

/// WAL checkpoint interval in seconds (5 minutes)
pub const SQLITE_CHECKPOINT_INTERVAL_SECS: u64 = 300;

// =============================================================================
// Database Backends
// =============================================================================

/// Environment variable for the storage backend (sqlite or postgres)
pub const ENV_DATABASE_BACKEND: &str = "PULSE_DATABASE_BACKEND";

/// Environment variable for PostgreSQL connection URL
pub const ENV_POSTGRES_URL: &str = "PULSE_POSTGRES_URL";

// =============================================================================
// PostgreSQL Database
// =============================================================================

/// Default max connections in pool
pub const POSTGRES_DEFAULT_MAX_CONNECTIONS: u32 = 20;

/// Default min connections kept warm
pub const POSTGRES_DEFAULT_MIN_CONNECTIONS: u32 = 2;

/// Default connection acquire timeout in seconds
pub const POSTGRES_DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;

/// Default idle connection timeout in seconds (10 minutes)
pub const POSTGRES_DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Default max connection lifetime in seconds (30 minutes)
pub const POSTGRES_DEFAULT_MAX_LIFETIME_SECS: u64 = 1800;

/// Default statement timeout in seconds
pub const POSTGRES_DEFAULT_STATEMENT_TIMEOUT_SECS: u64 = 60;

/// Background health check interval in seconds
pub const POSTGRES_HEALTH_CHECK_INTERVAL_SECS: u64 = 60;

// =============================================================================
// Shutdown
// =============================================================================

/// Maximum time to wait for background tasks during shutdown
pub const SHUTDOWN_TIMEOUT_SECS: u64 = 30;
