//! Upload ingestion and course edits.
//!
//! Every mutation follows the same shape: load and authorize the stored
//! record, decode the stored canonical buffer, apply changes through the
//! codec, then write the record and the re-derived buffers in one
//! transaction so metadata and binaries never disagree.

use std::path::PathBuf;
use std::sync::{Arc, LazyLock};

use chrono::Utc;
use regex::Regex;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use smm_codec::artifacts::{self, DerivedArtifacts};
use smm_codec::sniff::{guess_mime, is_image};
use smm_codec::{archive, sniff, Course, Sniffed, ThumbnailTranscoder};
use smm_core::config::Config;
use smm_core::{CourseId, Error, Result, ThumbnailKind};
use smm_db::models::{Account, Course as CourseRecord, CourseArtifacts};
use smm_db::queries::courses::CourseFilter;
use smm_db::queries::{course_data, courses, stars};
use smm_db::{get_conn, DbPool};

use crate::blocking;
use crate::events::CourseEvents;

static NINTENDO_ID: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9A-Z]{4}-[0-9A-Z]{4}-[0-9A-Z]{4}-[0-9A-Z]{4}$").expect("nintendo id pattern is valid")
});
static VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9 ._-]+$").expect("video id pattern is valid"));

/// Difficulty assigned to every fresh upload.
const DEFAULT_DIFFICULTY: u8 = 1;
const MAX_DIFFICULTY: i64 = 3;

#[derive(Debug, Clone, Default)]
pub struct IngestConfig {
    /// Where original upload bodies are archived, if anywhere.
    pub uploads_dir: Option<PathBuf>,
}

impl IngestConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            uploads_dir: config.storage.uploads_dir.clone(),
        }
    }
}

/// A stored course as returned to API clients.
#[derive(Debug, Clone, Serialize)]
pub struct CourseSummary {
    #[serde(flatten)]
    pub course: CourseRecord,
    /// Whether the requesting account has starred the course. Absent for
    /// anonymous requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub starred: Option<bool>,
}

/// Fields a client may change on an existing course. Invalid values are
/// dropped individually; the remaining fields still apply.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CourseUpdate {
    pub title: Option<String>,
    pub maker: Option<String>,
    #[serde(alias = "nintendoid")]
    pub nintendo_id: Option<String>,
    #[serde(alias = "videoid")]
    pub video_id: Option<String>,
    pub difficulty: Option<i64>,
    pub description: Option<String>,
}

/// Entry point for everything that writes courses.
#[derive(Clone)]
pub struct Ingestor {
    db: DbPool,
    transcoder: Option<Arc<dyn ThumbnailTranscoder>>,
    events: Arc<dyn CourseEvents>,
    config: IngestConfig,
}

impl Ingestor {
    pub fn new(
        db: DbPool,
        transcoder: Option<Arc<dyn ThumbnailTranscoder>>,
        events: Arc<dyn CourseEvents>,
        config: IngestConfig,
    ) -> Self {
        Self {
            db,
            transcoder,
            events,
            config,
        }
    }

    // -----------------------------------------------------------------------
    // Async surface
    // -----------------------------------------------------------------------

    /// Store every course found in `buffer` under `owner`.
    pub async fn create(&self, buffer: Vec<u8>, owner: Account) -> Result<Vec<CourseSummary>> {
        let this = self.clone();
        blocking(move || this.create_blocking(&buffer, &owner)).await
    }

    /// Replace the level of an existing course with the one in `buffer`.
    pub async fn reupload(&self, id: CourseId, buffer: Vec<u8>, caller: Account) -> Result<CourseSummary> {
        let this = self.clone();
        blocking(move || this.reupload_blocking(id, &buffer, &caller)).await
    }

    pub async fn update(&self, id: CourseId, update: CourseUpdate, caller: Account) -> Result<CourseSummary> {
        let this = self.clone();
        blocking(move || this.update_blocking(id, update, &caller)).await
    }

    /// Replace one thumbnail from an uploaded image.
    pub async fn set_thumbnail(
        &self,
        id: CourseId,
        buffer: Vec<u8>,
        kind: ThumbnailKind,
        clip: bool,
        caller: Account,
    ) -> Result<CourseSummary> {
        let this = self.clone();
        blocking(move || this.set_thumbnail_blocking(id, &buffer, kind, clip, &caller)).await
    }

    pub async fn delete(&self, id: CourseId, caller: Account) -> Result<()> {
        let this = self.clone();
        blocking(move || this.delete_blocking(id, &caller)).await
    }

    /// Toggle `voter`'s star on a course.
    pub async fn star(&self, id: CourseId, voter: Account) -> Result<CourseSummary> {
        let this = self.clone();
        blocking(move || this.star_blocking(id, &voter)).await
    }

    pub async fn get(&self, id: CourseId, viewer: Option<Account>) -> Result<CourseSummary> {
        let db = self.db.clone();
        blocking(move || {
            let conn = get_conn(&db)?;
            let record = load(&conn, id)?;
            summarize(&conn, record, viewer.as_ref())
        })
        .await
    }

    pub async fn list(&self, filter: CourseFilter, viewer: Option<Account>) -> Result<Vec<CourseSummary>> {
        let db = self.db.clone();
        blocking(move || {
            let conn = get_conn(&db)?;
            courses::list_courses(&conn, &filter)?
                .into_iter()
                .map(|record| summarize(&conn, record, viewer.as_ref()))
                .collect()
        })
        .await
    }

    // -----------------------------------------------------------------------
    // Blocking implementations
    // -----------------------------------------------------------------------

    fn create_blocking(&self, buffer: &[u8], owner: &Account) -> Result<Vec<CourseSummary>> {
        let decoded = decode_upload(buffer)?;
        if decoded.is_empty() {
            return Err(Error::NoCourseFound);
        }

        let uploaded = Utc::now().timestamp();
        let mut staged = Vec::with_capacity(decoded.len());
        for mut course in decoded {
            if course.maker().is_empty() {
                course.set_maker(&owner.username);
            }
            let record = CourseRecord {
                id: CourseId::new(),
                owner: owner.id,
                title: course.title().to_string(),
                maker: course.maker().to_string(),
                nintendo_id: None,
                video_id: None,
                description: None,
                difficulty: DEFAULT_DIFFICULTY,
                uploaded,
                lastmodified: course.modified(),
                gameplay: course.gameplay,
                v_full: 0,
                v_prev: 0,
                stars: 0,
            };
            let derived = artifacts::build(&course, self.transcoder.as_deref())?;
            tracing::debug!(course_id = %record.id, title = %record.title, "Course decoded");
            staged.push((record, derived));
        }

        let conn = get_conn(&self.db)?;
        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;
        for (record, derived) in &staged {
            courses::insert_course(&tx, record)?;
            course_data::insert_artifacts(&tx, &stored_artifacts(record.id, derived))?;
        }
        tx.commit().map_err(|e| Error::database(e.to_string()))?;
        metrics::counter!("smmdb_uploads_total").increment(staged.len() as u64);

        self.archive_upload(staged[0].0.id, buffer);
        for (record, _) in &staged {
            self.events.uploaded(record.id, owner.id, &record.title);
        }
        tracing::info!(owner = %owner.username, count = staged.len(), "Upload stored");

        Ok(staged
            .into_iter()
            .map(|(course, _)| CourseSummary { course, starred: None })
            .collect())
    }

    fn reupload_blocking(&self, id: CourseId, buffer: &[u8], caller: &Account) -> Result<CourseSummary> {
        let conn = get_conn(&self.db)?;
        let mut record = load(&conn, id)?;
        authorize(caller, &record)?;

        let mut decoded = decode_upload(buffer)?;
        if decoded.len() != 1 {
            return Err(Error::WrongCourseCount { found: decoded.len() });
        }
        let Some(mut course) = decoded.pop() else {
            return Err(Error::WrongCourseCount { found: 0 });
        };

        // The new level brings its own title and maker; the stored ones only
        // fill in what it lacks.
        if course.title().trim().is_empty() {
            course.set_title(&record.title)?;
        }
        if course.maker().trim().is_empty() {
            course.set_maker(&record.maker);
        }
        record.title = course.title().to_string();
        record.maker = course.maker().to_string();

        let fresh_thumbnails = !course.is_thumbnail_broken();
        if !fresh_thumbnails {
            let stored = decode_stored(&conn, id)?;
            course.copy_thumbnails_from(&stored);
            tracing::warn!(course_id = %id, "Reupload carries broken thumbnails, keeping the stored ones");
        }

        record.gameplay = course.gameplay;
        record.lastmodified = course.modified();
        if fresh_thumbnails {
            record.v_full += 1;
            record.v_prev += 1;
        }

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;
        courses::update_course(&tx, &record)?;
        if fresh_thumbnails {
            let derived = artifacts::build(&course, self.transcoder.as_deref())?;
            course_data::update_course_data(&tx, id, &derived.course_data, &derived.course_data_gz)?;
            course_data::update_thumbnail(&tx, id, ThumbnailKind::Full, &derived.thumbnail, &derived.thumbnail_webp)?;
            course_data::update_thumbnail(
                &tx,
                id,
                ThumbnailKind::Preview,
                &derived.thumbnail_preview,
                &derived.thumbnail_preview_webp,
            )?;
        } else {
            let encoded = artifacts::encode_course(&course)?;
            course_data::update_course_data(&tx, id, &encoded.course_data, &encoded.course_data_gz)?;
        }
        tx.commit().map_err(|e| Error::database(e.to_string()))?;

        self.archive_upload(id, buffer);
        self.events.updated(id);
        summarize(&conn, record, Some(caller))
    }

    fn update_blocking(&self, id: CourseId, update: CourseUpdate, caller: &Account) -> Result<CourseSummary> {
        let conn = get_conn(&self.db)?;
        let mut record = load(&conn, id)?;
        authorize(caller, &record)?;
        let mut course = decode_stored(&conn, id)?;

        if let Some(title) = update.title {
            match course.set_title(&title) {
                Ok(()) => record.title = course.title().to_string(),
                Err(_) => tracing::warn!(course_id = %id, "Dropping empty title"),
            }
        }
        if let Some(maker) = update.maker {
            if maker.trim().is_empty() {
                tracing::warn!(course_id = %id, "Dropping empty maker");
            } else {
                course.set_maker(&maker);
                record.maker = course.maker().to_string();
            }
        }
        if let Some(nintendo_id) = update.nintendo_id {
            if nintendo_id.is_empty() {
                record.nintendo_id = None;
            } else if NINTENDO_ID.is_match(&nintendo_id) {
                record.nintendo_id = Some(nintendo_id);
            } else {
                tracing::warn!(course_id = %id, nintendo_id, "Dropping malformed nintendo id");
            }
        }
        if let Some(video_id) = update.video_id {
            if video_id.is_empty() {
                record.video_id = None;
            } else if VIDEO_ID.is_match(&video_id) {
                record.video_id = Some(video_id);
            } else {
                tracing::warn!(course_id = %id, video_id, "Dropping malformed video id");
            }
        }
        if let Some(difficulty) = update.difficulty {
            match u8::try_from(difficulty) {
                Ok(d) if difficulty <= MAX_DIFFICULTY => record.difficulty = d,
                _ => tracing::warn!(course_id = %id, difficulty, "Dropping out-of-range difficulty"),
            }
        }
        if let Some(description) = update.description {
            record.description = (!description.is_empty()).then_some(description);
        }

        let now = Utc::now().timestamp();
        course.set_modified(now);
        record.lastmodified = now;
        let encoded = artifacts::encode_course(&course)?;

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;
        courses::update_course(&tx, &record)?;
        course_data::update_course_data(&tx, id, &encoded.course_data, &encoded.course_data_gz)?;
        tx.commit().map_err(|e| Error::database(e.to_string()))?;

        self.events.updated(id);
        summarize(&conn, record, Some(caller))
    }

    fn set_thumbnail_blocking(
        &self,
        id: CourseId,
        buffer: &[u8],
        kind: ThumbnailKind,
        clip: bool,
        caller: &Account,
    ) -> Result<CourseSummary> {
        if !is_image(buffer) {
            return Err(Error::WrongMimeType {
                mime: guess_mime(buffer).map(str::to_string),
            });
        }

        let conn = get_conn(&self.db)?;
        let mut record = load(&conn, id)?;
        authorize(caller, &record)?;
        let mut course = decode_stored(&conn, id)?;

        course.set_thumbnail(buffer, kind, clip)?;
        let now = Utc::now().timestamp();
        course.set_modified(now);
        record.lastmodified = now;
        match kind {
            ThumbnailKind::Full => record.v_full += 1,
            ThumbnailKind::Preview => record.v_prev += 1,
        }

        let encoded = artifacts::encode_course(&course)?;
        let pair = artifacts::thumbnail_pair(&course, kind, self.transcoder.as_deref());

        let tx = conn
            .unchecked_transaction()
            .map_err(|e| Error::database(e.to_string()))?;
        courses::update_course(&tx, &record)?;
        course_data::update_course_data(&tx, id, &encoded.course_data, &encoded.course_data_gz)?;
        course_data::update_thumbnail(&tx, id, kind, &pair.jpeg, &pair.transcoded)?;
        tx.commit().map_err(|e| Error::database(e.to_string()))?;

        self.events.updated(id);
        summarize(&conn, record, Some(caller))
    }

    fn delete_blocking(&self, id: CourseId, caller: &Account) -> Result<()> {
        let conn = get_conn(&self.db)?;
        let record = load(&conn, id)?;
        authorize(caller, &record)?;
        courses::delete_course(&conn, id)?;
        self.events.deleted(id);
        Ok(())
    }

    fn star_blocking(&self, id: CourseId, voter: &Account) -> Result<CourseSummary> {
        let conn = get_conn(&self.db)?;
        load(&conn, id)?;
        let (count, starred) = stars::toggle_star(&conn, id, voter.id)?;
        tracing::debug!(course_id = %id, account = %voter.username, starred, count, "Star toggled");
        let course = load(&conn, id)?;
        Ok(CourseSummary {
            course,
            starred: Some(starred),
        })
    }

    /// Keep the original upload body next to the database. Failure here
    /// never undoes a committed upload.
    fn archive_upload(&self, first: CourseId, buffer: &[u8]) {
        let Some(dir) = &self.config.uploads_dir else {
            return;
        };
        let path = dir.join(first.to_string());
        let result = std::fs::create_dir_all(dir).and_then(|()| std::fs::write(&path, buffer));
        if let Err(e) = result {
            tracing::warn!(path = %path.display(), "Failed to archive upload: {e}");
        }
    }
}

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

/// Decode every course in an upload.
///
/// A single 3DS binary that fails to decode is the client's fault; anything
/// going wrong inside an archive is reported as a server fault.
fn decode_upload(buffer: &[u8]) -> Result<Vec<Course>> {
    match sniff(buffer) {
        Sniffed::Unrecognized { mime } => Err(Error::UnsupportedFormat {
            mime: mime.map(str::to_string),
        }),
        Sniffed::SingleBinary => match Course::from_3ds(buffer) {
            Ok(course) => Ok(vec![course]),
            Err(e) => {
                tracing::warn!(bytes = buffer.len(), error = %e, "Rejected 3DS course upload");
                Err(e)
            }
        },
        Sniffed::Archive(kind) => {
            let saves = archive::extract_courses(buffer, kind).map_err(Error::server_fault)?;
            tracing::debug!(archive = kind.mime(), courses = saves.len(), "Archive extracted");
            saves
                .iter()
                .map(|save| Course::from_wiiu(save).map_err(Error::server_fault))
                .collect()
        }
    }
}

fn load(conn: &Connection, id: CourseId) -> Result<CourseRecord> {
    courses::get_course(conn, id)?.ok_or_else(|| Error::not_found("course", id))
}

/// Decode the stored canonical buffer of a course.
fn decode_stored(conn: &Connection, id: CourseId) -> Result<Course> {
    let raw = course_data::get_course_data(conn, id)?
        .ok_or_else(|| Error::server_fault(format!("course data for {id} is missing")))?;
    Course::decode(&raw).map_err(Error::server_fault)
}

fn authorize(caller: &Account, record: &CourseRecord) -> Result<()> {
    if record.owner == caller.id || caller.is_admin() {
        Ok(())
    } else {
        Err(Error::Forbidden(format!(
            "course {} is not owned by {}",
            record.id, caller.username
        )))
    }
}

fn summarize(conn: &Connection, course: CourseRecord, viewer: Option<&Account>) -> Result<CourseSummary> {
    let starred = match viewer {
        Some(account) => Some(stars::is_starred(conn, course.id, account.id)?),
        None => None,
    };
    Ok(CourseSummary { course, starred })
}

fn stored_artifacts(course_id: CourseId, derived: &DerivedArtifacts) -> CourseArtifacts {
    CourseArtifacts {
        course_id,
        course_data: derived.course_data.clone(),
        course_data_gz: derived.course_data_gz.clone(),
        thumbnail: derived.thumbnail.clone(),
        thumbnail_preview: derived.thumbnail_preview.clone(),
        thumbnail_webp: derived.thumbnail_webp.clone(),
        thumbnail_preview_webp: derived.thumbnail_preview_webp.clone(),
    }
}
