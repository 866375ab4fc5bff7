//! PostgreSQL schema definitions
//!
//! Mirrors the SQLite schema: BIGINT millisecond timestamps, DOUBLE PRECISION
//! millisecond durations.

/// Current schema version
pub const SCHEMA_VERSION: i32 = 1;

/// Complete schema SQL for PostgreSQL
pub const SCHEMA: &str = r#"
-- =============================================================================
-- Infrastructure: Schema version tracking
-- =============================================================================
CREATE TABLE IF NOT EXISTS schema_version (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    version INTEGER NOT NULL,
    applied_at BIGINT NOT NULL,
    description TEXT
);

CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    name TEXT NOT NULL,
    applied_at BIGINT NOT NULL,
    checksum TEXT NOT NULL,
    execution_time_ms BIGINT,
    success BOOLEAN NOT NULL DEFAULT TRUE
);

-- =============================================================================
-- 1. Routes: one row per (method, path)
-- =============================================================================
CREATE TABLE IF NOT EXISTS routes (
    id BIGSERIAL PRIMARY KEY,
    method TEXT NOT NULL CHECK(length(method) >= 1),
    path TEXT NOT NULL CHECK(length(path) >= 1),
    created_at BIGINT NOT NULL,
    UNIQUE(method, path)
);

-- =============================================================================
-- 2. Requests (references routes)
-- =============================================================================
CREATE TABLE IF NOT EXISTS requests (
    id BIGSERIAL PRIMARY KEY,
    route_id BIGINT NOT NULL REFERENCES routes(id) ON DELETE CASCADE,
    request_uuid TEXT NOT NULL UNIQUE,
    method TEXT NOT NULL,
    path TEXT NOT NULL,
    duration_ms DOUBLE PRECISION NOT NULL CHECK(duration_ms >= 0),
    status INTEGER NOT NULL,
    is_error BOOLEAN NOT NULL DEFAULT FALSE,
    label TEXT,
    occurred_at BIGINT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_requests_route_occurred ON requests(route_id, occurred_at);
CREATE INDEX IF NOT EXISTS idx_requests_occurred ON requests(occurred_at);

-- =============================================================================
-- 3. Jobs: one row per (name, queue), absent queue stored as ''
-- =============================================================================
CREATE TABLE IF NOT EXISTS jobs (
    id BIGSERIAL PRIMARY KEY,
    name TEXT NOT NULL CHECK(length(name) >= 1),
    queue TEXT NOT NULL DEFAULT '',
    created_at BIGINT NOT NULL,
    UNIQUE(name, queue)
);

-- =============================================================================
-- 4. Job runs (references jobs)
-- =============================================================================
CREATE TABLE IF NOT EXISTS job_runs (
    id BIGSERIAL PRIMARY KEY,
    job_id BIGINT NOT NULL REFERENCES jobs(id) ON DELETE CASCADE,
    run_id TEXT NOT NULL UNIQUE,
    duration_ms DOUBLE PRECISION NOT NULL CHECK(duration_ms >= 0),
    status TEXT NOT NULL CHECK(status IN ('success', 'failed', 'retried', 'discarded')),
    error_class TEXT,
    error_message TEXT,
    attempts INTEGER NOT NULL DEFAULT 1 CHECK(attempts >= 0),
    enqueued_at BIGINT,
    occurred_at BIGINT NOT NULL,
    adapter TEXT
);

CREATE INDEX IF NOT EXISTS idx_job_runs_job_occurred ON job_runs(job_id, occurred_at);

-- =============================================================================
-- 5. Queries: fingerprint dimension for SQL operations
-- =============================================================================
CREATE TABLE IF NOT EXISTS queries (
    id BIGSERIAL PRIMARY KEY,
    normalized_sql TEXT NOT NULL,
    hashed_sql TEXT NOT NULL UNIQUE,
    created_at BIGINT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_queries_normalized ON queries(normalized_sql);

-- =============================================================================
-- 6. Operations: owned by exactly one request or job run
-- =============================================================================
CREATE TABLE IF NOT EXISTS operations (
    id BIGSERIAL PRIMARY KEY,
    request_id BIGINT REFERENCES requests(id) ON DELETE CASCADE,
    job_run_id BIGINT REFERENCES job_runs(id) ON DELETE CASCADE,
    query_id BIGINT REFERENCES queries(id) ON DELETE SET NULL,
    position INTEGER NOT NULL CHECK(position >= 0),
    operation_type TEXT NOT NULL CHECK(operation_type IN (
        'sql', 'controller', 'template', 'partial', 'layout', 'collection',
        'cache_read', 'cache_write', 'http', 'job', 'mailer', 'storage'
    )),
    label TEXT NOT NULL,
    duration_ms DOUBLE PRECISION NOT NULL CHECK(duration_ms >= 0),
    codebase_location TEXT,
    occurred_at BIGINT NOT NULL,
    CONSTRAINT operations_single_owner CHECK ((request_id IS NULL) <> (job_run_id IS NULL))
);

CREATE INDEX IF NOT EXISTS idx_operations_request ON operations(request_id, position);
CREATE INDEX IF NOT EXISTS idx_operations_job_run ON operations(job_run_id, position);
CREATE INDEX IF NOT EXISTS idx_operations_query ON operations(query_id);
"#;
