use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

/// Latest schema version this build knows how to create.
pub const SCHEMA_VERSION: i64 = 2;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch("CREATE TABLE IF NOT EXISTS schema_version (version INTEGER NOT NULL);")?;

    let version = current_version(conn)?;

    if version < 1 {
        info!("Running migration v1 (initial schema)");
        conn.execute_batch(
            "
            BEGIN;

            CREATE TABLE users (
                id              TEXT PRIMARY KEY,
                email           TEXT NOT NULL UNIQUE,
                password_hash   TEXT NOT NULL,
                created_at      INTEGER NOT NULL
            );

            CREATE TABLE sessions (
                token_hash  TEXT PRIMARY KEY,
                user_id     TEXT NOT NULL REFERENCES users(id),
                created_at  INTEGER NOT NULL,
                expires_at  INTEGER NOT NULL
            );

            CREATE TABLE contents (
                id                  TEXT PRIMARY KEY,
                kind                TEXT NOT NULL CHECK (kind IN ('text', 'file')),
                text_content        TEXT,
                original_name       TEXT,
                file_size           INTEGER,
                file_mime           TEXT,
                password_hash       TEXT,
                one_time            INTEGER NOT NULL DEFAULT 0,
                view_count          INTEGER NOT NULL DEFAULT 0 CHECK (view_count >= 0),
                max_views           INTEGER CHECK (max_views IS NULL OR max_views >= 1),
                created_at          INTEGER NOT NULL,
                expires_at          INTEGER NOT NULL,
                owner_id            TEXT,
                delete_token_hash   TEXT NOT NULL,
                CHECK (expires_at > created_at),
                CHECK ((kind = 'text') = (text_content IS NOT NULL))
            );

            CREATE INDEX idx_contents_expires ON contents(expires_at);
            CREATE INDEX idx_sessions_expires ON sessions(expires_at);

            INSERT INTO schema_version (version) VALUES (1);

            COMMIT;
            ",
        )?;
    }

    if version < 2 {
        info!("Running migration v2 (owner listing index)");
        conn.execute_batch(
            "
            BEGIN;
            CREATE INDEX idx_contents_owner ON contents(owner_id, created_at);
            INSERT INTO schema_version (version) VALUES (2);
            COMMIT;
            ",
        )?;
    }

    info!("Database migrations complete (schema v{})", SCHEMA_VERSION);
    Ok(())
}

pub fn current_version(conn: &Connection) -> Result<i64> {
    let version =
        conn.query_row("SELECT COALESCE(MAX(version), 0) FROM schema_version", [], |r| {
            r.get(0)
        })?;
    Ok(version)
}
