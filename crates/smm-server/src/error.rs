//! Error-to-HTTP response conversion.
//!
//! Route handlers return `Result<T, AppError>`; `?` on any
//! [`smm_core::Error`] converts automatically.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Wrapper so we can implement `IntoResponse` for an external type.
#[derive(Debug)]
pub struct AppError {
    inner: smm_core::Error,
    request_id: Option<String>,
}

impl AppError {
    pub fn new(inner: smm_core::Error) -> Self {
        Self {
            inner,
            request_id: None,
        }
    }

    pub fn with_request_id(mut self, id: String) -> Self {
        self.request_id = Some(id);
        self
    }

    pub fn inner(&self) -> &smm_core::Error {
        &self.inner
    }
}

impl From<smm_core::Error> for AppError {
    fn from(e: smm_core::Error) -> Self {
        Self::new(e)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.inner.http_status())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        if status.is_server_error() {
            tracing::error!(
                status = %status,
                error = %self.inner,
                "Server error in API handler"
            );
        }

        let body = json!({
            "error": self.inner.to_string(),
            "code": self.inner.code(),
            "request_id": self.request_id,
        });

        let mut response = (status, axum::Json(body)).into_response();
        if let smm_core::Error::UnsatisfiableRange { length } = self.inner {
            if let Ok(value) = format!("bytes */{length}").parse() {
                response
                    .headers_mut()
                    .insert(axum::http::header::CONTENT_RANGE, value);
            }
        }
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use smm_core::Error;

    #[test]
    fn not_found_produces_404() {
        let err = AppError::new(Error::not_found("course", "abc"));
        assert_eq!(err.into_response().status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn unauthorized_produces_401() {
        let err = AppError::new(Error::Unauthorized("no key".into()));
        assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn unsatisfiable_range_reports_length() {
        let response = AppError::new(Error::UnsatisfiableRange { length: 42 }).into_response();
        assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(
            response.headers().get("content-range").and_then(|v| v.to_str().ok()),
            Some("bytes */42")
        );
    }

    #[test]
    fn server_fault_is_500() {
        let err = AppError::new(Error::ServerFault("zip writer failed".into()));
        assert_eq!(err.into_response().status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn with_request_id() {
        let err = AppError::new(Error::Internal("oops".into())).with_request_id("req-123".into());
        assert_eq!(err.request_id.as_deref(), Some("req-123"));
    }
}
