//! Course artifact storage (binaries and thumbnails).

use rusqlite::{Connection, OptionalExtension};
use smm_core::{CourseId, Error, Result, ThumbnailKind};

use crate::models::CourseArtifacts;

const COLS: &str = "course_id, course_data, course_data_gz, thumbnail, thumbnail_preview,
    thumbnail_webp, thumbnail_preview_webp";

/// Insert the artifact row for a course. The course record must exist.
pub fn insert_artifacts(conn: &Connection, artifacts: &CourseArtifacts) -> Result<()> {
    conn.execute(
        "INSERT INTO course_data (course_id, course_data, course_data_gz, thumbnail,
            thumbnail_preview, thumbnail_webp, thumbnail_preview_webp)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            artifacts.course_id.to_string(),
            artifacts.course_data,
            artifacts.course_data_gz,
            artifacts.thumbnail,
            artifacts.thumbnail_preview,
            artifacts.thumbnail_webp,
            artifacts.thumbnail_preview_webp,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

pub fn get_artifacts(conn: &Connection, course_id: CourseId) -> Result<Option<CourseArtifacts>> {
    let q = format!("SELECT {COLS} FROM course_data WHERE course_id = ?1");
    match conn.query_row(&q, [course_id.to_string()], CourseArtifacts::from_row) {
        Ok(a) => Ok(Some(a)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

fn get_blob(conn: &Connection, column: &str, course_id: CourseId) -> Result<Option<Vec<u8>>> {
    let q = format!("SELECT {column} FROM course_data WHERE course_id = ?1");
    conn.query_row(&q, [course_id.to_string()], |row| row.get(0))
        .optional()
        .map_err(|e| Error::database(e.to_string()))
}

/// The canonical course buffer.
pub fn get_course_data(conn: &Connection, course_id: CourseId) -> Result<Option<Vec<u8>>> {
    get_blob(conn, "course_data", course_id)
}

/// The gzip alternate of the canonical buffer.
pub fn get_course_data_gz(conn: &Connection, course_id: CourseId) -> Result<Option<Vec<u8>>> {
    get_blob(conn, "course_data_gz", course_id)
}

/// One stored thumbnail, as JPEG or as its transcoded twin.
pub fn get_thumbnail(
    conn: &Connection,
    course_id: CourseId,
    kind: ThumbnailKind,
    transcoded: bool,
) -> Result<Option<Vec<u8>>> {
    get_blob(conn, thumbnail_column(kind, transcoded), course_id)
}

fn thumbnail_column(kind: ThumbnailKind, transcoded: bool) -> &'static str {
    match (kind, transcoded) {
        (ThumbnailKind::Full, false) => "thumbnail",
        (ThumbnailKind::Full, true) => "thumbnail_webp",
        (ThumbnailKind::Preview, false) => "thumbnail_preview",
        (ThumbnailKind::Preview, true) => "thumbnail_preview_webp",
    }
}

/// Rewrite the canonical and gzip buffers.
pub fn update_course_data(
    conn: &Connection,
    course_id: CourseId,
    course_data: &[u8],
    course_data_gz: &[u8],
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE course_data SET course_data = ?1, course_data_gz = ?2 WHERE course_id = ?3",
            rusqlite::params![course_data, course_data_gz, course_id.to_string()],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Rewrite one thumbnail slot (JPEG and transcoded twin together).
pub fn update_thumbnail(
    conn: &Connection,
    course_id: CourseId,
    kind: ThumbnailKind,
    jpeg: &[u8],
    transcoded: &[u8],
) -> Result<bool> {
    let q = format!(
        "UPDATE course_data SET {} = ?1, {} = ?2 WHERE course_id = ?3",
        thumbnail_column(kind, false),
        thumbnail_column(kind, true)
    );
    let n = conn
        .execute(&q, rusqlite::params![jpeg, transcoded, course_id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Course;
    use crate::pool::init_memory_pool;
    use crate::queries::{accounts, courses};
    use smm_core::Gameplay;

    fn setup() -> (crate::PooledConnection, CourseId) {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let owner = accounts::create_account(&conn, "owner", 0).unwrap().id;
        let course = Course {
            id: CourseId::new(),
            owner,
            title: "T".into(),
            maker: "M".into(),
            nintendo_id: None,
            video_id: None,
            description: None,
            difficulty: 1,
            uploaded: 0,
            lastmodified: 0,
            gameplay: Gameplay::default(),
            v_full: 0,
            v_prev: 0,
            stars: 0,
        };
        courses::insert_course(&conn, &course).unwrap();
        insert_artifacts(
            &conn,
            &CourseArtifacts {
                course_id: course.id,
                course_data: b"raw".to_vec(),
                course_data_gz: b"gz".to_vec(),
                thumbnail: b"full".to_vec(),
                thumbnail_preview: b"prev".to_vec(),
                thumbnail_webp: b"full-webp".to_vec(),
                thumbnail_preview_webp: b"prev-webp".to_vec(),
            },
        )
        .unwrap();
        (conn, course.id)
    }

    #[test]
    fn read_individual_blobs() {
        let (conn, id) = setup();
        assert_eq!(get_course_data(&conn, id).unwrap().unwrap(), b"raw");
        assert_eq!(get_course_data_gz(&conn, id).unwrap().unwrap(), b"gz");
        assert_eq!(
            get_thumbnail(&conn, id, ThumbnailKind::Preview, true).unwrap().unwrap(),
            b"prev-webp"
        );
        assert!(get_course_data(&conn, CourseId::new()).unwrap().is_none());
    }

    #[test]
    fn update_thumbnail_touches_one_slot() {
        let (conn, id) = setup();
        assert!(update_thumbnail(&conn, id, ThumbnailKind::Full, b"new", b"new-webp").unwrap());
        let a = get_artifacts(&conn, id).unwrap().unwrap();
        assert_eq!(a.thumbnail, b"new");
        assert_eq!(a.thumbnail_webp, b"new-webp");
        assert_eq!(a.thumbnail_preview, b"prev");
        assert_eq!(a.course_data, b"raw");
    }

    #[test]
    fn update_course_data_keeps_thumbnails() {
        let (conn, id) = setup();
        assert!(update_course_data(&conn, id, b"raw2", b"gz2").unwrap());
        let a = get_artifacts(&conn, id).unwrap().unwrap();
        assert_eq!(a.course_data, b"raw2");
        assert_eq!(a.thumbnail, b"full");
    }

    #[test]
    fn artifacts_cascade_with_course() {
        let (conn, id) = setup();
        courses::delete_course(&conn, id).unwrap();
        assert!(get_artifacts(&conn, id).unwrap().is_none());
    }
}
