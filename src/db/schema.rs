//! SQL DDL for initializing the database schema.
//! SQLite-first design; can be adapted for other RDBMS.

/// SQLite schema includes:
/// - `users` / `pins` reference tables (created for compatibility, read-only here)
/// - `analyses` (one relayed verdict per session id)
/// - `user_feedback` (ratings left on the results page)
/// - `mobile_app_api_log` (one row per master server call)
pub const SQLITE_INIT: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY NOT NULL,
    username TEXT NOT NULL UNIQUE,
    email TEXT NULL,
    created_at TEXT NOT NULL -- RFC3339
);

CREATE TABLE IF NOT EXISTS pins (
    id INTEGER PRIMARY KEY NOT NULL,
    pin_id TEXT NOT NULL UNIQUE,
    name TEXT NOT NULL,
    series TEXT NULL,
    created_at TEXT NOT NULL -- RFC3339
);

-- ---------------------------------------------------------------------------
-- Relayed analysis results
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS analyses (
    id INTEGER PRIMARY KEY NOT NULL,
    session_id TEXT NOT NULL UNIQUE,
    authentic INTEGER NULL,
    authenticity_rating REAL NULL,
    result_json TEXT NOT NULL,
    source TEXT NOT NULL, -- 'upstream' | 'mock'
    created_at TEXT NOT NULL -- RFC3339
);

CREATE TABLE IF NOT EXISTS user_feedback (
    id INTEGER PRIMARY KEY NOT NULL,
    session_id TEXT NOT NULL,
    rating INTEGER NOT NULL,
    comment TEXT NULL,
    created_at TEXT NOT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_user_feedback_session ON user_feedback(session_id);

-- ---------------------------------------------------------------------------
-- Outbound call log
-- ---------------------------------------------------------------------------
CREATE TABLE IF NOT EXISTS mobile_app_api_log (
    id INTEGER PRIMARY KEY NOT NULL,
    session_id TEXT NULL,
    endpoint TEXT NOT NULL,
    transport TEXT NOT NULL,
    status_code INTEGER NOT NULL,
    latency_ms INTEGER NOT NULL,
    error TEXT NULL,
    created_at TEXT NOT NULL -- RFC3339
);

CREATE INDEX IF NOT EXISTS idx_mobile_app_api_log_created ON mobile_app_api_log(created_at);
"#;
