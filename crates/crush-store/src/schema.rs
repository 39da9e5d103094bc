use rusqlite::Connection;

use crate::error::Result;

/// Apply all migrations. Forward-only `CREATE TABLE IF NOT EXISTS`
/// statements, run inside one transaction so a crash mid-migration never
/// leaves a half-applied schema. Safe to call on every process start.
pub fn init_db(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "BEGIN;
        CREATE TABLE IF NOT EXISTS sessions (
            id                TEXT PRIMARY KEY,
            title             TEXT NOT NULL,
            parent_id         TEXT,
            prompt_tokens     INTEGER NOT NULL DEFAULT 0,
            completion_tokens INTEGER NOT NULL DEFAULT 0,
            cost_cents_micro  INTEGER NOT NULL DEFAULT 0,
            created_at        INTEGER NOT NULL,
            updated_at        INTEGER NOT NULL
        );
        CREATE INDEX IF NOT EXISTS idx_sessions_updated ON sessions(updated_at DESC);
        CREATE INDEX IF NOT EXISTS idx_sessions_parent ON sessions(parent_id);

        CREATE TABLE IF NOT EXISTS todos (
            session_id  TEXT NOT NULL,
            id          TEXT NOT NULL,
            content     TEXT NOT NULL,
            active_form TEXT,
            status      TEXT NOT NULL,
            position    INTEGER NOT NULL,
            PRIMARY KEY (session_id, id)
        );

        CREATE TABLE IF NOT EXISTS messages (
            id            TEXT PRIMARY KEY,
            session_id    TEXT NOT NULL,
            role          TEXT NOT NULL,
            parts_json    TEXT NOT NULL,
            created_at    INTEGER NOT NULL,
            finished      INTEGER NOT NULL DEFAULT 0,
            finish_reason TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_messages_session ON messages(session_id, created_at);

        CREATE TABLE IF NOT EXISTS message_part_fingerprints (
            message_id  TEXT NOT NULL,
            fingerprint TEXT NOT NULL,
            PRIMARY KEY (message_id, fingerprint)
        );

        CREATE TABLE IF NOT EXISTS file_history (
            session_id TEXT NOT NULL,
            path       TEXT NOT NULL,
            version    INTEGER NOT NULL,
            content    BLOB NOT NULL,
            created_at INTEGER NOT NULL,
            PRIMARY KEY (session_id, path, version)
        );

        CREATE TABLE IF NOT EXISTS file_reads (
            session_id    TEXT NOT NULL,
            path          TEXT NOT NULL,
            last_read_at  INTEGER NOT NULL,
            PRIMARY KEY (session_id, path)
        );
        COMMIT;",
    )?;
    Ok(())
}
