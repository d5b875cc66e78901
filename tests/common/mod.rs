//! Shared test harness for integration tests.
//!
//! Provides [`TestHarness`] which creates an in-memory DB, default config and
//! a full [`AppContext`]. The [`TestHarness::with_server`] constructor starts
//! Axum on a random port for HTTP-level testing.

#![allow(dead_code)]

use std::net::SocketAddr;

use smm_core::config::Config;
use smm_db::models::Account;
use smm_db::{get_conn, init_memory_pool, DbPool, PooledConnection};
use smm_server::context::AppContext;
use smm_server::router::build_router;
use tokio_util::sync::CancellationToken;

/// Test harness wrapping a fully-constructed [`AppContext`] backed by an
/// in-memory database.
pub struct TestHarness {
    pub ctx: AppContext,
    pub db: DbPool,
    pub shutdown: CancellationToken,
}

impl TestHarness {
    /// Create a new harness with default configuration and in-memory DB.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Create a new harness with a custom configuration and in-memory DB.
    pub fn with_config(config: Config) -> Self {
        let db = init_memory_pool().expect("failed to create in-memory pool");
        let shutdown = CancellationToken::new();
        let ctx = AppContext::new(db.clone(), config, shutdown.clone());
        Self { ctx, db, shutdown }
    }

    /// Start an Axum server on a random port and return the harness together
    /// with the bound socket address.
    pub async fn with_server() -> (Self, SocketAddr) {
        Self::with_server_config(Config::default()).await
    }

    /// Start an Axum server with custom config on a random port.
    pub async fn with_server_config(config: Config) -> (Self, SocketAddr) {
        let harness = Self::with_config(config);
        let app = build_router(harness.ctx.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("failed to bind random port");
        let addr = listener.local_addr().expect("failed to get local addr");

        tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        (harness, addr)
    }

    /// Get a database connection from the pool.
    pub fn conn(&self) -> PooledConnection {
        get_conn(&self.db).expect("failed to get db connection")
    }

    /// Create a regular account.
    pub fn create_account(&self, username: &str) -> Account {
        smm_db::queries::accounts::create_account(&self.conn(), username, 0)
            .expect("failed to create account")
    }

    /// Create an administrator account.
    pub fn create_admin(&self, username: &str) -> Account {
        smm_db::queries::accounts::create_account(&self.conn(), username, Account::ADMIN)
            .expect("failed to create admin")
    }
}

/// `Authorization` header value for `account`.
pub fn api_key(account: &Account) -> String {
    format!("APIKEY {}", account.api_key)
}

/// POST a course upload and return the raw response.
pub async fn upload(addr: SocketAddr, account: &Account, body: Vec<u8>) -> reqwest::Response {
    reqwest::Client::new()
        .post(format!("http://{addr}/api/courses"))
        .header("authorization", api_key(account))
        .body(body)
        .send()
        .await
        .unwrap()
}

/// Upload `body` and return the first created course as JSON.
pub async fn upload_one(addr: SocketAddr, account: &Account, body: Vec<u8>) -> serde_json::Value {
    let resp = upload(addr, account, body).await;
    if resp.status() != 200 {
        panic!("upload failed ({}): {}", resp.status(), resp.text().await.unwrap());
    }
    let mut courses: Vec<serde_json::Value> = resp.json().await.unwrap();
    assert!(!courses.is_empty());
    courses.swap_remove(0)
}
