//! Course downloads and thumbnail images.

use axum::body::Body;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Response;
use serde::Deserialize;
use smm_core::{Error, ThumbnailKind};
use smm_ingest::{Delivery, DeliveryBody, Representation};
use tokio_util::io::ReaderStream;

use crate::context::AppContext;
use crate::error::AppError;
use crate::routes::parse_course_id;

#[derive(Debug, Deserialize)]
pub struct DownloadQuery {
    /// `zip`, `json` or `3ds`; anything else serves the raw gzipped course.
    #[serde(rename = "type")]
    pub kind: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ThumbnailQuery {
    pub format: Option<String>,
}

/// GET /api/courses/{id}/download
pub async fn download_course(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
    Query(params): Query<DownloadQuery>,
    headers: HeaderMap,
) -> Result<Response, AppError> {
    let id = parse_course_id(&id)?;
    let representation = Representation::from_query(params.kind.as_deref());
    let range = headers
        .get(header::RANGE)
        .and_then(|v| v.to_str().ok())
        .map(String::from);

    let mut delivery = ctx.responder.download(id, representation, range).await?;
    if representation == Representation::N3ds {
        delivery.headers.push(("accept-ranges", "bytes".to_string()));
    }
    into_response(delivery).await
}

/// GET /api/courses/{id}/thumbnail/{kind}
pub async fn get_thumbnail(
    State(ctx): State<AppContext>,
    Path((id, kind)): Path<(String, String)>,
    Query(params): Query<ThumbnailQuery>,
) -> Result<Response, AppError> {
    let id = parse_course_id(&id)?;
    let kind = ThumbnailKind::from_segment(&kind)
        .ok_or_else(|| Error::Validation(format!("Unknown thumbnail kind: {kind}")))?;
    let webp = params
        .format
        .as_deref()
        .is_some_and(|f| f.eq_ignore_ascii_case("webp"));

    let delivery = ctx.responder.thumbnail(id, kind, webp).await?;
    into_response(delivery).await
}

/// Turn a prepared [`Delivery`] into an HTTP response, streaming file bodies
/// from disk.
pub(crate) async fn into_response(delivery: Delivery) -> Result<Response, AppError> {
    let status = StatusCode::from_u16(delivery.status)
        .map_err(|e| Error::Internal(format!("invalid delivery status: {e}")))?;

    let mut builder = Response::builder().status(status);
    for (name, value) in &delivery.headers {
        builder = builder.header(*name, value.as_str());
    }

    let body = match delivery.body {
        DeliveryBody::Bytes(buf) => {
            builder = builder.header(header::CONTENT_LENGTH, buf.len());
            Body::from(buf)
        }
        DeliveryBody::File(path) => {
            let file = tokio::fs::File::open(&path).await.map_err(Error::from)?;
            if let Ok(meta) = file.metadata().await {
                builder = builder.header(header::CONTENT_LENGTH, meta.len());
            }
            Body::from_stream(ReaderStream::new(file))
        }
    };

    builder
        .body(body)
        .map_err(|e| Error::Internal(format!("response build error: {e}")).into())
}
