//! Serving stored courses.
//!
//! [`Responder`] produces transport-neutral [`Delivery`] values; the HTTP
//! layer only copies status, headers and body onto the response.

use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use smm_codec::{Course, CourseView};
use smm_core::{CourseId, Error, Result, ThumbnailKind};
use smm_db::queries::{course_data, courses};
use smm_db::{get_conn, DbPool};
use tempfile::TempDir;
use walkdir::WalkDir;
use zip::write::SimpleFileOptions;
use zip::ZipWriter;

use crate::cleanup::DeferredCleanup;
use crate::{blocking, range};

/// Folder name of the course inside a zip download.
const ZIP_COURSE_DIR: &str = "course000";

/// How a course should be delivered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Representation {
    /// The stored gzip buffer, sent with `Content-Encoding: gzip`.
    #[default]
    Raw,
    /// A zipped Wii U save folder.
    Zip,
    /// The decoded course as JSON.
    Json,
    /// A 3DS course file.
    N3ds,
}

impl Representation {
    /// Parse the `type` query value. Unknown values select [`Representation::Raw`].
    pub fn from_query(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("zip") => Self::Zip,
            Some("json") => Self::Json,
            Some("3ds") => Self::N3ds,
            _ => Self::Raw,
        }
    }

    fn counter(self) -> &'static str {
        match self {
            Self::Raw => "smmdb_downloads_proto_total",
            Self::Zip => "smmdb_downloads_wiiu_total",
            Self::Json => "smmdb_downloads_json_total",
            Self::N3ds => "smmdb_downloads_3ds_total",
        }
    }
}

#[derive(Debug)]
pub enum DeliveryBody {
    Bytes(Vec<u8>),
    /// A file to stream. It stays on disk until its cleanup fires.
    File(PathBuf),
}

/// A ready-to-send response.
#[derive(Debug)]
pub struct Delivery {
    pub status: u16,
    pub headers: Vec<(&'static str, String)>,
    pub body: DeliveryBody,
}

impl Delivery {
    fn bytes(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            headers: vec![("content-type", content_type.to_string())],
            body: DeliveryBody::Bytes(body),
        }
    }

    fn header(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.headers.push((name, value.into()));
        self
    }

    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Builds downloads and thumbnail responses.
#[derive(Clone)]
pub struct Responder {
    db: DbPool,
    cleanup: DeferredCleanup,
}

/// What the blocking half of a download hands back.
enum Prepared {
    Ready(Delivery),
    Staged { dir: TempDir, zip: PathBuf },
}

impl Responder {
    pub fn new(db: DbPool, cleanup: DeferredCleanup) -> Self {
        Self { db, cleanup }
    }

    /// Deliver a course in `representation`. `range` only applies to 3DS.
    pub async fn download(
        &self,
        id: CourseId,
        representation: Representation,
        range: Option<String>,
    ) -> Result<Delivery> {
        let db = self.db.clone();
        let prepared = blocking(move || {
            let conn = get_conn(&db)?;
            let record = courses::get_course(&conn, id)?.ok_or_else(|| Error::not_found("course", id))?;
            match representation {
                Representation::Raw => {
                    let gz = course_data::get_course_data_gz(&conn, id)?.ok_or_else(|| missing_data(id))?;
                    Ok(Prepared::Ready(
                        Delivery::bytes("application/wiiu", gz).header("content-encoding", "gzip"),
                    ))
                }
                Representation::Json => {
                    let course = stored_course(&conn, id)?;
                    let body = serde_json::to_vec(&CourseView::from(&course)).map_err(Error::server_fault)?;
                    Ok(Prepared::Ready(Delivery::bytes("application/json", body)))
                }
                Representation::N3ds => {
                    let course = stored_course(&conn, id)?;
                    let buf = course.to_3ds().map_err(Error::server_fault)?;
                    Ok(Prepared::Ready(three_ds(&record.title, buf, range.as_deref())?))
                }
                Representation::Zip => {
                    let raw = course_data::get_course_data(&conn, id)?.ok_or_else(|| missing_data(id))?;
                    drop(conn);
                    let (dir, zip) = stage_zip(&record.title, &raw).map_err(|e| match e {
                        Error::ServerFault(_) => e,
                        other => Error::server_fault(other),
                    })?;
                    Ok(Prepared::Staged { dir, zip })
                }
            }
        })
        .await?;

        let delivery = match prepared {
            Prepared::Ready(delivery) => delivery,
            Prepared::Staged { dir, zip } => {
                let name = zip
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| format!("{ZIP_COURSE_DIR}.zip"));
                self.cleanup.schedule(dir);
                Delivery {
                    status: 200,
                    headers: vec![
                        ("content-type", "application/zip".to_string()),
                        ("content-disposition", format!("attachment; filename=\"{name}\"")),
                    ],
                    body: DeliveryBody::File(zip),
                }
            }
        };

        metrics::counter!("smmdb_downloads_total").increment(1);
        metrics::counter!(representation.counter()).increment(1);
        tracing::debug!(course_id = %id, ?representation, "Course delivered");
        Ok(delivery)
    }

    /// Serve one stored thumbnail. WebP falls back to JPEG when no
    /// transcoded twin exists.
    pub async fn thumbnail(&self, id: CourseId, kind: ThumbnailKind, webp: bool) -> Result<Delivery> {
        let db = self.db.clone();
        blocking(move || {
            let conn = get_conn(&db)?;
            if webp {
                if let Some(buf) = course_data::get_thumbnail(&conn, id, kind, true)?.filter(|b| !b.is_empty()) {
                    return Ok(Delivery::bytes("image/webp", buf));
                }
            }
            let jpeg = course_data::get_thumbnail(&conn, id, kind, false)?
                .ok_or_else(|| Error::not_found("course", id))?;
            Ok(Delivery::bytes("image/jpeg", jpeg))
        })
        .await
    }
}

fn missing_data(id: CourseId) -> Error {
    Error::server_fault(format!("course data for {id} is missing"))
}

fn stored_course(conn: &rusqlite::Connection, id: CourseId) -> Result<Course> {
    let raw = course_data::get_course_data(conn, id)?.ok_or_else(|| missing_data(id))?;
    Course::decode(&raw).map_err(Error::server_fault)
}

fn three_ds(title: &str, buf: Vec<u8>, range: Option<&str>) -> Result<Delivery> {
    match range {
        Some(header) => {
            let total = buf.len();
            let ranges = range::parse(header, total as u64)?;
            let body = range::slice(&buf, header)?;
            let mut delivery = Delivery::bytes("application/3ds", body);
            delivery.status = 206;
            if let [only] = ranges.as_slice() {
                delivery = delivery.header("content-range", format!("bytes {}-{}/{total}", only.start, only.end));
            }
            Ok(delivery)
        }
        None => Ok(Delivery::bytes("application/3ds", buf).header(
            "content-disposition",
            format!("attachment;filename={}.3ds", encode_filename(title)),
        )),
    }
}

/// Write the course as a Wii U save folder and zip it, inside a fresh
/// staging directory.
fn stage_zip(title: &str, raw: &[u8]) -> Result<(TempDir, PathBuf)> {
    let save = Course::decode(raw)?.to_wiiu()?;
    let dir = tempfile::Builder::new().prefix("smmdb-download-").tempdir()?;
    let course_dir = dir.path().join(ZIP_COURSE_DIR);
    save.write_dir(&course_dir)?;

    let zip_path = dir.path().join(format!("{}.zip", sanitize_title(title)));
    zip_folder(&course_dir, &zip_path)?;
    Ok((dir, zip_path))
}

fn zip_folder(folder: &Path, out: &Path) -> Result<()> {
    let mut writer = ZipWriter::new(File::create(out)?);
    let options = SimpleFileOptions::default();
    let base = folder.parent().unwrap_or(folder);

    for entry in WalkDir::new(folder).sort_by_file_name() {
        let entry = entry.map_err(|e| Error::server_fault(format!("walk {}: {e}", folder.display())))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry
            .path()
            .strip_prefix(base)
            .map_err(Error::server_fault)?
            .to_string_lossy()
            .replace('\\', "/");
        writer
            .start_file(name, options)
            .map_err(|e| Error::server_fault(format!("zip entry: {e}")))?;
        writer.write_all(&std::fs::read(entry.path())?)?;
    }
    writer
        .finish()
        .map_err(|e| Error::server_fault(format!("zip finish: {e}")))?;
    Ok(())
}

/// A filesystem-safe version of a course title.
fn sanitize_title(title: &str) -> String {
    let cleaned: String = title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_matches(|c: char| c == '.' || c.is_whitespace());
    if cleaned.is_empty() {
        ZIP_COURSE_DIR.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Percent-encode a title for use in a header value.
fn encode_filename(title: &str) -> String {
    let mut out = String::with_capacity(title.len());
    for b in title.bytes() {
        if b.is_ascii_alphanumeric() || b"-_.~".contains(&b) {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{b:02X}"));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::sync::Arc;
    use std::time::Duration;

    use smm_codec::fixtures;
    use smm_db::models::Account;
    use smm_db::queries::accounts;
    use tokio_util::sync::CancellationToken;

    use crate::events::CourseEventBus;
    use crate::ingest::{IngestConfig, Ingestor};

    struct Setup {
        responder: Responder,
        id: CourseId,
        course: Course,
        shutdown: CancellationToken,
    }

    async fn setup(title: &str) -> Setup {
        let db = smm_db::init_memory_pool().unwrap();
        let owner: Account = {
            let conn = db.get().unwrap();
            accounts::create_account(&conn, "owner", 0).unwrap()
        };
        let ingestor = Ingestor::new(
            db.clone(),
            None,
            Arc::new(CourseEventBus::default()),
            IngestConfig::default(),
        );
        let course = fixtures::sample_course(title, "maker");
        let id = ingestor.create(course.to_3ds().unwrap(), owner).await.unwrap()[0].course.id;
        let shutdown = CancellationToken::new();
        let responder = Responder::new(db, DeferredCleanup::new(Duration::from_secs(60), shutdown.clone()));
        Setup {
            responder,
            id,
            course,
            shutdown,
        }
    }

    fn bytes(delivery: Delivery) -> Vec<u8> {
        match delivery.body {
            DeliveryBody::Bytes(b) => b,
            DeliveryBody::File(p) => panic!("expected bytes, got file {}", p.display()),
        }
    }

    #[test]
    fn representation_from_query() {
        assert_eq!(Representation::from_query(Some("zip")), Representation::Zip);
        assert_eq!(Representation::from_query(Some("3DS")), Representation::N3ds);
        assert_eq!(Representation::from_query(Some("json")), Representation::Json);
        assert_eq!(Representation::from_query(Some("proto")), Representation::Raw);
        assert_eq!(Representation::from_query(None), Representation::Raw);
    }

    #[test]
    fn titles_become_safe_names() {
        assert_eq!(sanitize_title("Bowser's Castle"), "Bowser_s Castle");
        assert_eq!(sanitize_title("../../etc/passwd"), "_.._etc_passwd");
        assert_eq!(sanitize_title("///"), "___");
        assert_eq!(sanitize_title(" .. "), ZIP_COURSE_DIR);
        assert_eq!(encode_filename("A b/ü"), "A%20b%2F%C3%BC");
    }

    #[tokio::test]
    async fn raw_download_is_gzip() {
        let s = setup("Raw").await;
        let delivery = s.responder.download(s.id, Representation::Raw, None).await.unwrap();
        assert_eq!(delivery.header_value("Content-Encoding"), Some("gzip"));
        assert_eq!(delivery.header_value("content-type"), Some("application/wiiu"));
        let body = bytes(delivery);
        assert_eq!(&body[..2], &[0x1F, 0x8B]);
        assert_eq!(Course::decode(&body).unwrap().title(), "Raw");
    }

    #[tokio::test]
    async fn json_download_is_a_view() {
        let s = setup("Json").await;
        let delivery = s.responder.download(s.id, Representation::Json, None).await.unwrap();
        let value: serde_json::Value = serde_json::from_slice(&bytes(delivery)).unwrap();
        assert_eq!(value["title"], "Json");
        assert_eq!(value["tiles"].as_array().unwrap().len(), s.course.level.tiles.len());
    }

    #[tokio::test]
    async fn three_ds_download_with_and_without_range() {
        let s = setup("Hand held").await;
        let full = s.responder.download(s.id, Representation::N3ds, None).await.unwrap();
        assert_eq!(
            full.header_value("content-disposition"),
            Some("attachment;filename=Hand%20held.3ds")
        );
        let full = bytes(full);
        assert!(Course::from_3ds(&full).is_ok());

        let head = s
            .responder
            .download(s.id, Representation::N3ds, Some("bytes=0-15".into()))
            .await
            .unwrap();
        assert_eq!(head.status, 206);
        assert_eq!(head.header_value("content-range"), Some(format!("bytes 0-15/{}", full.len()).as_str()));
        assert_eq!(bytes(head), full[..16].to_vec());

        let pieces = s
            .responder
            .download(s.id, Representation::N3ds, Some("bytes=16-19,0-3".into()))
            .await
            .unwrap();
        assert!(pieces.header_value("content-range").is_none());
        let mut expected = full[16..20].to_vec();
        expected.extend_from_slice(&full[..4]);
        assert_eq!(bytes(pieces), expected);

        let err = s
            .responder
            .download(s.id, Representation::N3ds, Some(format!("bytes=0-{}", full.len())))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 416);
    }

    #[tokio::test]
    async fn zip_download_holds_a_save_folder_until_cleanup() {
        let s = setup("Zipped/Up").await;
        let delivery = s.responder.download(s.id, Representation::Zip, None).await.unwrap();
        assert_eq!(
            delivery.header_value("content-disposition"),
            Some("attachment; filename=\"Zipped_Up.zip\"")
        );
        let DeliveryBody::File(path) = delivery.body else {
            panic!("zip downloads stream a file");
        };
        assert!(path.exists());

        let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
        let mut cdt = Vec::new();
        archive
            .by_name("course000/course_data.cdt")
            .unwrap()
            .read_to_end(&mut cdt)
            .unwrap();
        assert_eq!(cdt, s.course.to_wiiu().unwrap().course_data);
        assert_eq!(archive.len(), 4);

        s.shutdown.cancel();
        for _ in 0..100 {
            if !path.exists() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn unknown_course_is_not_found() {
        let s = setup("Any").await;
        let err = s
            .responder
            .download(CourseId::new(), Representation::Json, None)
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[tokio::test]
    async fn thumbnails_fall_back_to_jpeg() {
        let s = setup("Thumbs").await;
        let delivery = s.responder.thumbnail(s.id, ThumbnailKind::Full, true).await.unwrap();
        assert_eq!(delivery.header_value("content-type"), Some("image/jpeg"));
        assert_eq!(bytes(delivery), s.course.thumbnail(ThumbnailKind::Full));

        let preview = s.responder.thumbnail(s.id, ThumbnailKind::Preview, false).await.unwrap();
        assert_eq!(bytes(preview), s.course.thumbnail(ThumbnailKind::Preview));
    }
}
