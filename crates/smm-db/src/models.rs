//! Rust structs mapping to database tables.
//!
//! Each model implements `from_row` for the column order of its query
//! module's `COLS` constant.

use rusqlite::types::Type;
use serde::Serialize;
use smm_core::{AccountId, AutoScroll, CourseId, CourseTheme, GameStyle, Gameplay};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// helpers
// ---------------------------------------------------------------------------

fn conversion_error(idx: usize, ty: Type, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, ty, msg.into())
}

/// Parse a UUID-based ID from a text column.
fn parse_id<T: From<Uuid>>(row: &rusqlite::Row, idx: usize) -> rusqlite::Result<T> {
    let s: String = row.get(idx)?;
    Uuid::parse_str(&s)
        .map(T::from)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

/// Parse a one-byte enum stored as an integer column.
fn parse_enum<T>(row: &rusqlite::Row, idx: usize, from_byte: fn(u8) -> Option<T>) -> rusqlite::Result<T> {
    let v: u8 = row.get(idx)?;
    from_byte(v).ok_or_else(|| conversion_error(idx, Type::Integer, format!("unknown value {v}")))
}

// ---------------------------------------------------------------------------
// Account
// ---------------------------------------------------------------------------

/// An authenticated uploader / voter.
#[derive(Debug, Clone, Serialize)]
pub struct Account {
    pub id: AccountId,
    pub username: String,
    #[serde(skip_serializing)]
    pub api_key: String,
    /// `1` marks an administrator.
    pub permissions: i64,
    pub created_at: String,
}

impl Account {
    pub const ADMIN: i64 = 1;

    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            username: row.get(1)?,
            api_key: row.get(2)?,
            permissions: row.get(3)?,
            created_at: row.get(4)?,
        })
    }

    pub fn is_admin(&self) -> bool {
        self.permissions == Self::ADMIN
    }
}

// ---------------------------------------------------------------------------
// Course
// ---------------------------------------------------------------------------

/// Persisted course metadata. Level payloads and binaries live elsewhere.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Course {
    pub id: CourseId,
    pub owner: AccountId,
    pub title: String,
    pub maker: String,
    pub nintendo_id: Option<String>,
    pub video_id: Option<String>,
    pub description: Option<String>,
    pub difficulty: u8,
    /// Unix seconds.
    pub uploaded: i64,
    /// Unix seconds.
    pub lastmodified: i64,
    #[serde(flatten)]
    pub gameplay: Gameplay,
    pub v_full: i64,
    pub v_prev: i64,
    pub stars: i64,
}

impl Course {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            id: parse_id(row, 0)?,
            owner: parse_id(row, 1)?,
            title: row.get(2)?,
            maker: row.get(3)?,
            nintendo_id: row.get(4)?,
            video_id: row.get(5)?,
            description: row.get(6)?,
            difficulty: row.get(7)?,
            uploaded: row.get(8)?,
            lastmodified: row.get(9)?,
            gameplay: Gameplay {
                game_style: parse_enum(row, 10, GameStyle::from_byte)?,
                course_theme: parse_enum(row, 11, CourseTheme::from_byte)?,
                course_theme_sub: parse_enum(row, 12, CourseTheme::from_byte)?,
                time: row.get(13)?,
                auto_scroll: parse_enum(row, 14, AutoScroll::from_byte)?,
                auto_scroll_sub: parse_enum(row, 15, AutoScroll::from_byte)?,
                width: row.get(16)?,
                width_sub: row.get(17)?,
            },
            v_full: row.get(18)?,
            v_prev: row.get(19)?,
            stars: row.get(20)?,
        })
    }
}

// ---------------------------------------------------------------------------
// CourseArtifacts
// ---------------------------------------------------------------------------

/// Binary artifacts of one course, keyed by the course id.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CourseArtifacts {
    pub course_id: CourseId,
    pub course_data: Vec<u8>,
    pub course_data_gz: Vec<u8>,
    pub thumbnail: Vec<u8>,
    pub thumbnail_preview: Vec<u8>,
    pub thumbnail_webp: Vec<u8>,
    pub thumbnail_preview_webp: Vec<u8>,
}

impl CourseArtifacts {
    pub fn from_row(row: &rusqlite::Row) -> rusqlite::Result<Self> {
        Ok(Self {
            course_id: parse_id(row, 0)?,
            course_data: row.get(1)?,
            course_data_gz: row.get(2)?,
            thumbnail: row.get(3)?,
            thumbnail_preview: row.get(4)?,
            thumbnail_webp: row.get(5)?,
            thumbnail_preview_webp: row.get(6)?,
        })
    }
}
