//! API-key authentication.
//!
//! Clients send `Authorization: APIKEY <key>`. [`auth_middleware`] guards the
//! write routes and injects the resolved [`Account`] into request
//! extensions; [`viewer_middleware`] runs on the read routes and injects a
//! [`Viewer`] so listings can report per-account star state.

use axum::extract::State;
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;
use smm_core::{Error, Result};
use smm_db::models::Account;
use smm_db::queries::accounts;
use smm_db::{get_conn, DbPool};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::request_id::RequestId;

/// Authorization scheme expected in front of the key.
pub const APIKEY_SCHEME: &str = "APIKEY";

/// The caller of a public route, if they sent a key.
#[derive(Debug, Clone, Default)]
pub struct Viewer(pub Option<Account>);

/// Pull the key out of an `Authorization` header value. The scheme is
/// matched case-insensitively; anything else is treated as no key.
pub fn extract_api_key(authorization: &str) -> Option<&str> {
    let (scheme, key) = authorization.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case(APIKEY_SCHEME) {
        return None;
    }
    let key = key.trim();
    (!key.is_empty()).then_some(key)
}

/// Resolve an `Authorization` header to an account.
///
/// `Ok(None)` means no usable key was sent. A key that matches no account is
/// a client error.
pub async fn resolve_account(db: &DbPool, authorization: Option<&str>) -> Result<Option<Account>> {
    let Some(key) = authorization.and_then(extract_api_key) else {
        return Ok(None);
    };
    let key = key.to_string();
    let db = db.clone();
    let account = tokio::task::spawn_blocking(move || {
        let conn = get_conn(&db)?;
        accounts::get_account_by_api_key(&conn, &key)
    })
    .await
    .map_err(|e| Error::Internal(format!("spawn_blocking join error: {e}")))??;

    match account {
        Some(account) => Ok(Some(account)),
        None => Err(Error::Validation("Account with API key not found".into())),
    }
}

fn authorization_header(request: &Request<axum::body::Body>) -> Option<String> {
    request
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_owned())
}

fn rejection(request: &Request<axum::body::Body>, err: Error) -> AppError {
    let err = AppError::new(err);
    match request.extensions().get::<RequestId>() {
        Some(RequestId(id)) => err.with_request_id(id.clone()),
        None => err,
    }
}

/// Authentication middleware. Applied to write routes only.
///
/// On success, inserts the resolved [`Account`] into request extensions.
pub async fn auth_middleware(
    State(ctx): State<AppContext>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> std::result::Result<Response, AppError> {
    let authorization = authorization_header(&request);

    match resolve_account(&ctx.db, authorization.as_deref()).await {
        Ok(Some(account)) => {
            tracing::debug!(account = %account.username, "Authenticated");
            request.extensions_mut().insert(account);
            Ok(next.run(request).await)
        }
        Ok(None) => Err(rejection(
            &request,
            Error::Unauthorized(format!("{APIKEY_SCHEME} authorization header required")),
        )),
        Err(e) => Err(rejection(&request, e)),
    }
}

/// Optional authentication for read routes. Always inserts a [`Viewer`];
/// an unknown key is still rejected.
pub async fn viewer_middleware(
    State(ctx): State<AppContext>,
    mut request: Request<axum::body::Body>,
    next: Next,
) -> std::result::Result<Response, AppError> {
    let authorization = authorization_header(&request);

    match resolve_account(&ctx.db, authorization.as_deref()).await {
        Ok(account) => {
            request.extensions_mut().insert(Viewer(account));
            Ok(next.run(request).await)
        }
        Err(e) => Err(rejection(&request, e)),
    }
}
