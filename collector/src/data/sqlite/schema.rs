//! SQLite schema definitions
//!
//! Timestamps are INTEGER milliseconds since the Unix epoch. Durations are
//! REAL milliseconds.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema SQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at INTEGER NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at INTEGER NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms INTEGER,
    success INTEGER NOT NULL DEFAULT 1
);

-- =============================================================================
-- 1. Routes: one row per (method, path)
-- =============================================================================
CREATE TABLE IF NOT EXISTS routes (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    method TEXT NOT NULL CHECK(length(method) >= 1),
    path TEXT NOT NULL CHECK(length(path) >= 1),
    created_at INTEGER NOT NULL,
    UNIQUE(method, path)
);

-- =============================================================================
-- 2. Requests (references routes)
-- =============================================================================
CREATE TABLE IF NOT EXISTS requests (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    route_id INTEGER NOT NULL REFERENCES routes(id) ON DELETE CASCADE,
    request_uuid TEXT NOT NULL UNIQUE,
    method TEXT NOT NULL,
    path TEXT NOT NULL,
    duration_ms REAL NOT NULL CHECK(duration_ms >= 0),
    status INTEGER NOT NULL,
    is_error INTEGER NOT NULL DEFAULT 0 CHECK(is_error IN (0, 1)),
    label TEXT,
    occurred_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_requests_route_occurred ON requests(route_id, occurred_at);
CREATE INDEX IF NOT EXISTS idx_requests_occurred ON requests(occurred_at);

-- =============================================================================
-- 3. Jobs: one row per (name, queue), absent queue stored as ''
-- =============================================================================
CREATE TABLE IF NOT EXISTS jobs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    name TEXT NOT NULL CHECK(length(name) >= 1),
    queue TEXT NOT NULL DEFAULT '',
    created_at INTEGER NOT NULL,
    UNIQUE(name, queue)
);

-- =============================================================================
-- 4. Job runs (references jobs)
-- =============================================================================
CREATE TABLE IF NOT EXISTS job_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    job_id INTEGER NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
    run_id TEXT NOT NULL UNIQUE,
    duration_ms REAL NOT NULL CHECK(duration_ms >= 0),
    status TEXT NOT NULL CHECK(status IN ('success', 'failed', 'retried', 'discarded')),
    error_class TEXT,
    error_message TEXT,
    attempts INTEGER NOT NULL DEFAULT 1 CHECK(attempts >= 0),
    enqueued_at INTEGER,
    occurred_at INTEGER NOT NULL,
    adapter TEXT
);

CREATE INDEX IF NOT EXISTS idx_job_runs_job_occurred ON job_runs(job_id, occurred_at);

-- =============================================================================
-- 5. Queries: fingerprint dimension for SQL operations
-- =============================================================================
CREATE TABLE IF NOT EXISTS queries (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    normalized_sql TEXT NOT NULL,
    hashed_sql TEXT NOT NULL UNIQUE,
    created_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_queries_normalized ON queries(normalized_sql);

-- =============================================================================
-- 6. Operations: owned by exactly one request or job run
-- =============================================================================
CREATE TABLE IF NOT EXISTS operations (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    request_id INTEGER REFERENCES requests(id) ON DELETE CASCADE,
    job_run_id INTEGER REFERENCES job_runs(id) ON DELETE CASCADE,
    query_id INTEGER REFERENCES queries(id) ON DELETE SET NULL,
    position INTEGER NOT NULL CHECK(position >= 0),
    operation_type TEXT NOT NULL CHECK(operation_type IN (
        'sql', 'controller', 'template', 'partial', 'layout', 'collection',
        'cache_read', 'cache_write', 'http', 'job', 'mailer', 'storage'
    )),
    label TEXT NOT NULL,
    duration_ms REAL NOT NULL CHECK(duration_ms >= 0),
    codebase_location TEXT,
    occurred_at INTEGER NOT NULL,
    CHECK ((request_id IS NULL) <> (job_run_id IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_operations_request ON operations(request_id, position);
CREATE INDEX IF NOT EXISTS idx_operations_job_run ON operations(job_run_id, position);
CREATE INDEX IF NOT EXISTS idx_operations_query ON operations(query_id);
"#;
