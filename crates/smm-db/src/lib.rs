//! smm-db: persistence for accounts, course records, course artifacts and
//! stars.
//!
//! SQLite behind an r2d2 pool, embedded migrations, typed models and one
//! query module per table. Query functions take a `&Connection` so callers
//! can run several of them inside one transaction.

pub mod migrations;
pub mod models;
pub mod pool;
pub mod queries;

pub use pool::{get_conn, init_memory_pool, init_pool, DbPool, PooledConnection};
