//! Course upload, edit, listing and star handlers.

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::HeaderMap;
use axum::{Extension, Json};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use smm_core::{AccountId, AutoScroll, CourseTheme, Error, GameStyle, ThumbnailKind};
use smm_db::models::Account;
use smm_db::queries::courses::{CourseFilter, CourseOrder, Range, SortDir};
use smm_ingest::{CourseSummary, CourseUpdate};

use crate::context::AppContext;
use crate::error::AppError;
use crate::middleware::auth::Viewer;
use crate::routes::parse_course_id;

/// Header naming the course a reupload or thumbnail targets.
pub const COURSE_ID_HEADER: &str = "course-id";

// ---------------------------------------------------------------------------
// Query types
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
pub struct ListCoursesQuery {
    /// Comma-separated course IDs.
    pub ids: Option<String>,
    pub owner: Option<String>,
    pub uploader: Option<String>,
    pub title: Option<String>,
    pub maker: Option<String>,
    #[serde(alias = "difficultyfrom")]
    pub difficulty_from: Option<i64>,
    #[serde(alias = "difficultyto")]
    pub difficulty_to: Option<i64>,
    #[serde(alias = "uploadedfrom")]
    pub uploaded_from: Option<i64>,
    #[serde(alias = "uploadedto")]
    pub uploaded_to: Option<i64>,
    #[serde(alias = "lastmodifiedfrom")]
    pub lastmodified_from: Option<i64>,
    #[serde(alias = "lastmodifiedto")]
    pub lastmodified_to: Option<i64>,
    #[serde(alias = "gamestyle")]
    pub game_style: Option<String>,
    #[serde(alias = "coursetheme")]
    pub course_theme: Option<String>,
    #[serde(alias = "coursethemesub")]
    pub course_theme_sub: Option<String>,
    #[serde(alias = "timefrom")]
    pub time_from: Option<i64>,
    #[serde(alias = "timeto")]
    pub time_to: Option<i64>,
    #[serde(alias = "autoscroll")]
    pub auto_scroll: Option<String>,
    #[serde(alias = "autoscrollsub")]
    pub auto_scroll_sub: Option<String>,
    #[serde(alias = "widthfrom")]
    pub width_from: Option<i64>,
    #[serde(alias = "widthto")]
    pub width_to: Option<i64>,
    #[serde(alias = "widthsubfrom")]
    pub width_sub_from: Option<i64>,
    #[serde(alias = "widthsubto")]
    pub width_sub_to: Option<i64>,
    pub order: Option<CourseOrder>,
    pub dir: Option<SortDir>,
    /// `1` shuffles the result.
    pub random: Option<String>,
    pub start: Option<i64>,
    pub limit: Option<i64>,
}

impl ListCoursesQuery {
    fn into_filter(self) -> Result<CourseFilter, Error> {
        let owner = match non_empty(self.owner) {
            Some(raw) => Some(
                raw.parse::<AccountId>()
                    .map_err(|_| Error::Validation(format!("Invalid owner ID: {raw}")))?,
            ),
            None => None,
        };
        let ids = match non_empty(self.ids) {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(parse_course_id)
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };
        Ok(CourseFilter {
            ids,
            owner,
            uploader: non_empty(self.uploader),
            title: non_empty(self.title),
            maker: non_empty(self.maker),
            difficulty: Range::new(self.difficulty_from, self.difficulty_to),
            uploaded: Range::new(self.uploaded_from, self.uploaded_to),
            lastmodified: Range::new(self.lastmodified_from, self.lastmodified_to),
            game_style: parse_enum("gamestyle", self.game_style, GameStyle::from_byte)?,
            course_theme: parse_enum("coursetheme", self.course_theme, CourseTheme::from_byte)?,
            course_theme_sub: parse_enum("coursethemesub", self.course_theme_sub, CourseTheme::from_byte)?,
            time: Range::new(self.time_from, self.time_to),
            auto_scroll: parse_enum("autoscroll", self.auto_scroll, AutoScroll::from_byte)?,
            auto_scroll_sub: parse_enum("autoscrollsub", self.auto_scroll_sub, AutoScroll::from_byte)?,
            width: Range::new(self.width_from, self.width_to),
            width_sub: Range::new(self.width_sub_from, self.width_sub_to),
            order: self.order.unwrap_or_default(),
            dir: self.dir.unwrap_or_default(),
            random: self.random.as_deref() == Some("1"),
            start: self.start.unwrap_or(0).max(0),
            limit: self.limit.unwrap_or(0),
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

/// Accept either the numeric byte value or the snake_case name.
fn parse_enum<T: DeserializeOwned>(
    field: &str,
    raw: Option<String>,
    from_byte: fn(u8) -> Option<T>,
) -> Result<Option<T>, Error> {
    let Some(raw) = non_empty(raw) else {
        return Ok(None);
    };
    let parsed = match raw.trim().parse::<u8>() {
        Ok(b) => from_byte(b),
        Err(_) => serde_json::from_value(serde_json::Value::String(raw.trim().to_lowercase())).ok(),
    };
    parsed
        .map(Some)
        .ok_or_else(|| Error::Validation(format!("Invalid {field}: {raw}")))
}

fn header_course_id(headers: &HeaderMap) -> Result<smm_core::CourseId, Error> {
    let raw = headers
        .get(COURSE_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| {
            Error::Validation(format!(
                "No course ID found. Please set a \"{COURSE_ID_HEADER}\" HTTP header"
            ))
        })?;
    parse_course_id(raw)
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/courses
pub async fn list_courses(
    State(ctx): State<AppContext>,
    Extension(Viewer(viewer)): Extension<Viewer>,
    Query(params): Query<ListCoursesQuery>,
) -> Result<Json<Vec<CourseSummary>>, AppError> {
    let filter = params.into_filter()?;
    let courses = ctx.ingestor.list(filter, viewer).await?;
    Ok(Json(courses))
}

/// GET /api/courses/{id}
pub async fn get_course(
    State(ctx): State<AppContext>,
    Extension(Viewer(viewer)): Extension<Viewer>,
    Path(id): Path<String>,
) -> Result<Json<CourseSummary>, AppError> {
    let id = parse_course_id(&id)?;
    Ok(Json(ctx.ingestor.get(id, viewer).await?))
}

/// POST /api/courses -- body is a course archive or a 3DS course file.
pub async fn upload_courses(
    State(ctx): State<AppContext>,
    Extension(account): Extension<Account>,
    body: Bytes,
) -> Result<Json<Vec<CourseSummary>>, AppError> {
    tracing::info!(account = %account.username, bytes = body.len(), "Course upload");
    let courses = ctx.ingestor.create(body.to_vec(), account).await?;
    Ok(Json(courses))
}

/// POST /api/courses/reupload
pub async fn reupload_course(
    State(ctx): State<AppContext>,
    Extension(account): Extension<Account>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CourseSummary>, AppError> {
    let id = header_course_id(&headers)?;
    let course = ctx.ingestor.reupload(id, body.to_vec(), account).await?;
    Ok(Json(course))
}

/// POST /api/courses/thumbnail/{kind}
pub async fn upload_thumbnail(
    State(ctx): State<AppContext>,
    Extension(account): Extension<Account>,
    Path(kind): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<CourseSummary>, AppError> {
    let kind = ThumbnailKind::from_segment(&kind)
        .ok_or_else(|| Error::Validation(format!("Unknown thumbnail kind: {kind}")))?;
    let id = header_course_id(&headers)?;
    // Only the 4:3 preview is cropped to fit; wide images are scaled.
    let clip = kind == ThumbnailKind::Preview;
    let course = ctx
        .ingestor
        .set_thumbnail(id, body.to_vec(), kind, clip, account)
        .await?;
    Ok(Json(course))
}

/// POST /api/courses/{id}
pub async fn update_course(
    State(ctx): State<AppContext>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
    Json(update): Json<CourseUpdate>,
) -> Result<Json<CourseSummary>, AppError> {
    let id = parse_course_id(&id)?;
    Ok(Json(ctx.ingestor.update(id, update, account).await?))
}

/// DELETE /api/courses/{id}
pub async fn delete_course(
    State(ctx): State<AppContext>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> Result<&'static str, AppError> {
    let id = parse_course_id(&id)?;
    ctx.ingestor.delete(id, account).await?;
    Ok("OK")
}

/// POST /api/courses/{id}/star -- toggles the caller's star.
pub async fn star_course(
    State(ctx): State<AppContext>,
    Extension(account): Extension<Account>,
    Path(id): Path<String>,
) -> Result<Json<CourseSummary>, AppError> {
    let id = parse_course_id(&id)?;
    Ok(Json(ctx.ingestor.star(id, account).await?))
}
