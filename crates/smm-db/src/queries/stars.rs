//! Star (vote) bookkeeping.
//!
//! `courses.stars` is only ever written by [`recount`], which derives it
//! from the `stars` relation.

use chrono::Utc;
use rusqlite::Connection;
use smm_core::{AccountId, CourseId, Error, Result};

/// Whether `account_id` has starred `course_id`.
pub fn is_starred(conn: &Connection, course_id: CourseId, account_id: AccountId) -> Result<bool> {
    conn.query_row(
        "SELECT COUNT(*) > 0 FROM stars WHERE course_id = ?1 AND account_id = ?2",
        rusqlite::params![course_id.to_string(), account_id.to_string()],
        |row| row.get(0),
    )
    .map_err(|e| Error::database(e.to_string()))
}

/// Recompute `courses.stars` from the relation and return the new count.
pub fn recount(conn: &Connection, course_id: CourseId) -> Result<i64> {
    let id = course_id.to_string();
    let count: i64 = conn
        .query_row("SELECT COUNT(*) FROM stars WHERE course_id = ?1", [&id], |row| row.get(0))
        .map_err(|e| Error::database(e.to_string()))?;
    conn.execute("UPDATE courses SET stars = ?1 WHERE id = ?2", rusqlite::params![count, id])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(count)
}

/// Toggle the (course, account) pair and recount, in one transaction.
///
/// Returns `(stars, starred)` after the toggle.
pub fn toggle_star(conn: &Connection, course_id: CourseId, account_id: AccountId) -> Result<(i64, bool)> {
    let tx = conn
        .unchecked_transaction()
        .map_err(|e| Error::database(e.to_string()))?;

    let removed = tx
        .execute(
            "DELETE FROM stars WHERE course_id = ?1 AND account_id = ?2",
            rusqlite::params![course_id.to_string(), account_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    let starred = if removed == 0 {
        tx.execute(
            "INSERT INTO stars (course_id, account_id, created_at) VALUES (?1, ?2, ?3)",
            rusqlite::params![course_id.to_string(), account_id.to_string(), Utc::now().to_rfc3339()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
        true
    } else {
        false
    };

    let stars = recount(&tx, course_id)?;
    tx.commit().map_err(|e| Error::database(e.to_string()))?;
    Ok((stars, starred))
}
