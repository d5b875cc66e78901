//! Account lookups and creation.

use chrono::Utc;
use rand::RngCore;
use rusqlite::Connection;
use smm_core::{AccountId, Error, Result};

use crate::models::Account;

const COLS: &str = "id, username, api_key, permissions, created_at";

/// Generate a random 32-byte hex API key.
fn generate_api_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Create an account with a freshly generated API key.
pub fn create_account(conn: &Connection, username: &str, permissions: i64) -> Result<Account> {
    let id = AccountId::new();
    let api_key = generate_api_key();
    let created_at = Utc::now().to_rfc3339();

    conn.execute(
        "INSERT INTO accounts (id, username, api_key, permissions, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        rusqlite::params![id.to_string(), username, &api_key, permissions, &created_at],
    )
    .map_err(|e| {
        if e.to_string().contains("UNIQUE constraint failed") {
            Error::Conflict(format!("Username '{username}' already exists"))
        } else {
            Error::database(e.to_string())
        }
    })?;

    Ok(Account {
        id,
        username: username.to_string(),
        api_key,
        permissions,
        created_at,
    })
}

fn get_one(conn: &Connection, column: &str, value: &str) -> Result<Option<Account>> {
    let q = format!("SELECT {COLS} FROM accounts WHERE {column} = ?1");
    match conn.query_row(&q, [value], Account::from_row) {
        Ok(a) => Ok(Some(a)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

pub fn get_account(conn: &Connection, id: AccountId) -> Result<Option<Account>> {
    get_one(conn, "id", &id.to_string())
}

/// Resolve an API key to its account.
pub fn get_account_by_api_key(conn: &Connection, api_key: &str) -> Result<Option<Account>> {
    get_one(conn, "api_key", api_key)
}

pub fn get_account_by_username(conn: &Connection, username: &str) -> Result<Option<Account>> {
    get_one(conn, "username", username)
}
