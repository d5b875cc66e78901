//! The decoded course and its canonical binary encoding.
//!
//! The canonical form is `SMMC` + a big-endian u16 format version + a
//! bincode body. It is what the database stores as `course_data`; the Wii U
//! and 3DS formats are produced from it on demand.

use std::io::{Read, Write};

use bincode::Options;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};
use smm_core::{Error, Gameplay, Result, ThumbnailKind};

use crate::thumbnail;

const CANONICAL_MAGIC: &[u8; 4] = b"SMMC";
const CANONICAL_VERSION: u16 = 1;
const CANONICAL_HEADER_LEN: usize = 6;
const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Upper bound on a canonical body; a full course with both thumbnails is
/// well under 1 MiB.
const MAX_CANONICAL_BODY: u64 = 4 * 1024 * 1024;

/// Maximum title length in UTF-16 code units.
pub const MAX_TITLE_LEN: usize = 32;
/// Maximum maker name length in UTF-16 code units.
pub const MAX_MAKER_LEN: usize = 10;

/// One placed object in a course area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Tile {
    pub x: u32,
    pub z: u32,
    pub y: i16,
    pub width: i8,
    pub height: i8,
    pub flags: u32,
    pub child_flags: u32,
    pub extended_data: u32,
    pub kind: i8,
    pub child_kind: i8,
    pub link_id: i16,
    pub effect_index: i16,
    pub transform_id: i8,
    pub child_transform_id: i8,
}

/// One placed sound effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sound {
    pub kind: u8,
    pub x: u8,
    pub y: u8,
    pub variation: u8,
}

/// Level payloads. Carried through the codec, never stored as metadata.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LevelData {
    pub tiles: Vec<Tile>,
    pub tiles_sub: Vec<Tile>,
    pub sounds: Vec<Sound>,
    pub sounds_sub: Vec<Sound>,
}

/// A fully decoded course.
///
/// Title, maker, timestamp and thumbnails are only reachable through
/// methods that keep them within the limits the binary formats impose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    title: String,
    maker: String,
    modified: i64,
    pub gameplay: Gameplay,
    thumbnail: Vec<u8>,
    thumbnail_preview: Vec<u8>,
    pub level: LevelData,
}

fn canonical_options() -> impl Options {
    bincode::DefaultOptions::new().with_limit(MAX_CANONICAL_BODY)
}

/// Cut `s` to at most `max_units` UTF-16 code units without splitting a
/// character.
pub(crate) fn truncate_utf16(s: &str, max_units: usize) -> String {
    let mut units = 0;
    s.chars()
        .take_while(|c| {
            units += c.len_utf16();
            units <= max_units
        })
        .collect()
}

impl Course {
    /// Create an empty course with the given identity.
    pub fn new(title: &str, maker: &str, gameplay: Gameplay) -> Result<Self> {
        let mut course = Self {
            title: String::new(),
            maker: String::new(),
            modified: 0,
            gameplay,
            thumbnail: Vec::new(),
            thumbnail_preview: Vec::new(),
            level: LevelData::default(),
        };
        course.set_title(title)?;
        course.set_maker(maker);
        Ok(course)
    }

    /// Assemble a course from already-validated parts (format readers).
    pub(crate) fn from_parts(
        title: &str,
        maker: &str,
        modified: i64,
        gameplay: Gameplay,
        thumbnail: Vec<u8>,
        thumbnail_preview: Vec<u8>,
        level: LevelData,
    ) -> Self {
        Self {
            title: truncate_utf16(title, MAX_TITLE_LEN),
            maker: truncate_utf16(maker, MAX_MAKER_LEN),
            modified,
            gameplay,
            thumbnail,
            thumbnail_preview,
            level,
        }
    }

    // -----------------------------------------------------------------------
    // Canonical encoding
    // -----------------------------------------------------------------------

    /// Decode canonical bytes, or gzip-wrapped canonical bytes.
    pub fn decode(raw: &[u8]) -> Result<Self> {
        if raw.starts_with(&GZIP_MAGIC) {
            let inflated = inflate(raw)?;
            return Self::decode_canonical(&inflated);
        }
        Self::decode_canonical(raw)
    }

    fn decode_canonical(raw: &[u8]) -> Result<Self> {
        if raw.len() < CANONICAL_HEADER_LEN || &raw[..4] != CANONICAL_MAGIC {
            return Err(Error::malformed("not a canonical course buffer"));
        }
        let version = u16::from_be_bytes([raw[4], raw[5]]);
        if version != CANONICAL_VERSION {
            return Err(Error::malformed(format!(
                "unsupported canonical course version {version}"
            )));
        }

        let course: Course = canonical_options()
            .deserialize(&raw[CANONICAL_HEADER_LEN..])
            .map_err(|e| Error::malformed(format!("course body: {e}")))?;

        if course.title.encode_utf16().count() > MAX_TITLE_LEN {
            return Err(Error::malformed("title exceeds 32 characters"));
        }
        if course.maker.encode_utf16().count() > MAX_MAKER_LEN {
            return Err(Error::malformed("maker exceeds 10 characters"));
        }
        Ok(course)
    }

    /// Serialize to the canonical binary form.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(CANONICAL_HEADER_LEN + self.thumbnail.len() * 2);
        out.extend_from_slice(CANONICAL_MAGIC);
        out.extend_from_slice(&CANONICAL_VERSION.to_be_bytes());
        canonical_options()
            .serialize_into(&mut out, self)
            .map_err(|e| Error::Internal(format!("course encode failed: {e}")))?;
        Ok(out)
    }

    /// Gzip of [`Course::encode`]; [`Course::decode`] reads it back.
    pub fn encode_compressed(&self) -> Result<Vec<u8>> {
        let raw = self.encode()?;
        let mut encoder = GzEncoder::new(Vec::with_capacity(raw.len() / 2), Compression::default());
        encoder.write_all(&raw)?;
        Ok(encoder.finish()?)
    }

    // -----------------------------------------------------------------------
    // Accessors and mutators
    // -----------------------------------------------------------------------

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn maker(&self) -> &str {
        &self.maker
    }

    /// Last modification time (Unix seconds).
    pub fn modified(&self) -> i64 {
        self.modified
    }

    /// Set the title, truncating to 32 characters. Empty titles are rejected.
    pub fn set_title(&mut self, title: &str) -> Result<()> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Error::Validation("title must not be empty".into()));
        }
        self.title = truncate_utf16(title, MAX_TITLE_LEN);
        Ok(())
    }

    /// Set the maker name, truncating to 10 characters.
    pub fn set_maker(&mut self, maker: &str) {
        self.maker = truncate_utf16(maker.trim(), MAX_MAKER_LEN);
    }

    pub fn set_modified(&mut self, unix_secs: i64) {
        self.modified = unix_secs;
    }

    /// Stored JPEG for `kind` (may be empty or undecodable).
    pub fn thumbnail(&self, kind: ThumbnailKind) -> &[u8] {
        match kind {
            ThumbnailKind::Full => &self.thumbnail,
            ThumbnailKind::Preview => &self.thumbnail_preview,
        }
    }

    /// Replace one thumbnail with a normalized re-encoding of `image`.
    ///
    /// The course is left untouched when `image` cannot be decoded. Returns
    /// the JPEG now stored in the slot.
    pub fn set_thumbnail(&mut self, image: &[u8], kind: ThumbnailKind, clip: bool) -> Result<Vec<u8>> {
        let jpeg = thumbnail::normalize(image, kind, clip)?;
        match kind {
            ThumbnailKind::Full => self.thumbnail = jpeg.clone(),
            ThumbnailKind::Preview => self.thumbnail_preview = jpeg.clone(),
        }
        Ok(jpeg)
    }

    /// Take both thumbnails from `other` verbatim.
    pub fn copy_thumbnails_from(&mut self, other: &Course) {
        self.thumbnail = other.thumbnail.clone();
        self.thumbnail_preview = other.thumbnail_preview.clone();
    }

    /// True when either thumbnail is missing or cannot be decoded.
    pub fn is_thumbnail_broken(&self) -> bool {
        !thumbnail::is_decodable(&self.thumbnail) || !thumbnail::is_decodable(&self.thumbnail_preview)
    }
}

fn inflate(gz: &[u8]) -> Result<Vec<u8>> {
    let limit = MAX_CANONICAL_BODY + CANONICAL_HEADER_LEN as u64;
    let mut out = Vec::new();
    GzDecoder::new(gz)
        .take(limit + 1)
        .read_to_end(&mut out)
        .map_err(|e| Error::malformed(format!("gzip: {e}")))?;
    if out.len() as u64 > limit {
        return Err(Error::malformed("inflated course exceeds size limit"));
    }
    Ok(out)
}
