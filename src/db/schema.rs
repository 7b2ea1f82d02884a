//! Database schema initialization

use sqlx::SqlitePool;

use crate::error::Result;

/// Initialize the database schema
pub async fn initialize_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(SCHEMA_SQL).execute(pool).await?;

    Ok(())
}

const SCHEMA_SQL: &str = r#"
-- Users table (subjects that keys and sessions are bound to)
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT NOT NULL UNIQUE,
    active INTEGER NOT NULL DEFAULT 1,
    can_generate_pdf INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Single-use access keys
-- At most one live key per (script, user_id, instance); creation deletes
-- any prior key for the tuple before inserting.
CREATE TABLE IF NOT EXISTS access_keys (
    value TEXT PRIMARY KEY,
    script TEXT NOT NULL,
    user_id INTEGER NOT NULL,
    instance INTEGER NOT NULL,
    ip_restriction TEXT,
    valid_until INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_access_keys_tuple ON access_keys(script, user_id, instance);
CREATE INDEX IF NOT EXISTS idx_access_keys_valid_until ON access_keys(valid_until);

-- Sessions established by key login; terminated = row deleted.
-- valid_until bounds the lifetime of any session that escapes explicit
-- teardown, e.g. one inserted by a login still in flight when its
-- conversion was already cleaned up.
CREATE TABLE IF NOT EXISTS sessions (
    id TEXT PRIMARY KEY,
    user_id INTEGER NOT NULL,
    instance INTEGER NOT NULL,
    key_login INTEGER NOT NULL DEFAULT 1,
    valid_until INTEGER NOT NULL,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE INDEX IF NOT EXISTS idx_sessions_instance ON sessions(instance);
CREATE INDEX IF NOT EXISTS idx_sessions_valid_until ON sessions(valid_until);
"#;
