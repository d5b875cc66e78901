//! Embedded SQL migrations and runner.
//!
//! Migrations are `&str` constants applied in order; `schema_migrations`
//! records which versions have run.

use rusqlite::Connection;
use smm_core::{Error, Result};

/// V1: accounts, course records, course artifacts, stars.
const V1_INITIAL: &str = r#"
CREATE TABLE accounts (
    id          TEXT PRIMARY KEY,
    username    TEXT UNIQUE NOT NULL,
    api_key     TEXT UNIQUE NOT NULL,
    permissions INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE TABLE courses (
    id               TEXT PRIMARY KEY,
    owner            TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    title            TEXT NOT NULL,
    maker            TEXT NOT NULL,
    nintendo_id      TEXT,
    video_id         TEXT,
    description      TEXT,
    difficulty       INTEGER NOT NULL DEFAULT 1,
    uploaded         INTEGER NOT NULL,
    lastmodified     INTEGER NOT NULL,
    game_style       INTEGER NOT NULL,
    course_theme     INTEGER NOT NULL,
    course_theme_sub INTEGER NOT NULL,
    time             INTEGER NOT NULL,
    auto_scroll      INTEGER NOT NULL,
    auto_scroll_sub  INTEGER NOT NULL,
    width            INTEGER NOT NULL,
    width_sub        INTEGER NOT NULL,
    v_full           INTEGER NOT NULL DEFAULT 0,
    v_prev           INTEGER NOT NULL DEFAULT 0,
    stars            INTEGER NOT NULL DEFAULT 0
);
CREATE INDEX idx_courses_owner ON courses(owner);
CREATE INDEX idx_courses_lastmodified ON courses(lastmodified);
CREATE INDEX idx_courses_stars ON courses(stars);

CREATE TABLE course_data (
    course_id              TEXT PRIMARY KEY REFERENCES courses(id) ON DELETE CASCADE,
    course_data            BLOB NOT NULL,
    course_data_gz         BLOB NOT NULL,
    thumbnail              BLOB NOT NULL,
    thumbnail_preview      BLOB NOT NULL,
    thumbnail_webp         BLOB NOT NULL,
    thumbnail_preview_webp BLOB NOT NULL
);

CREATE TABLE stars (
    course_id  TEXT NOT NULL REFERENCES courses(id) ON DELETE CASCADE,
    account_id TEXT NOT NULL REFERENCES accounts(id) ON DELETE CASCADE,
    created_at TEXT NOT NULL,
    PRIMARY KEY (course_id, account_id)
);
CREATE INDEX idx_stars_account ON stars(account_id);
"#;

/// Ordered list of (version, sql) pairs.
const MIGRATIONS: &[(i64, &str)] = &[(1, V1_INITIAL)];

/// Apply every migration not yet recorded in `schema_migrations`, each in
/// its own transaction.
pub fn run_migrations(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version    INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        )",
    )
    .map_err(|e| Error::database(format!("Failed to create schema_migrations: {e}")))?;

    let current: i64 = conn
        .query_row(
            "SELECT COALESCE(MAX(version), 0) FROM schema_migrations",
            [],
            |row| row.get(0),
        )
        .map_err(|e| Error::database(e.to_string()))?;

    for &(version, sql) in MIGRATIONS.iter().filter(|(v, _)| *v > current) {
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;
        tx.execute_batch(sql)
            .map_err(|e| Error::database(format!("Migration V{version} failed: {e}")))?;
        tx.execute("INSERT INTO schema_migrations (version) VALUES (?1)", [version])
            .map_err(|e| Error::database(e.to_string()))?;
        tx.commit().map_err(|e| Error::database(e.to_string()))?;
        tracing::debug!(version, "Applied migration");
    }

    Ok(())
}
