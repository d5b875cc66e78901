//! Derived artifact construction.
//!
//! A stored course is the canonical buffer plus everything that can be
//! derived from it: a gzip re-encoding and the two thumbnails in JPEG and
//! (optionally) a secondary format.

use smm_core::{Result, ThumbnailKind};

use crate::course::Course;
use crate::thumbnail::ThumbnailTranscoder;

/// Every derived buffer for one course.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DerivedArtifacts {
    pub course_data: Vec<u8>,
    pub course_data_gz: Vec<u8>,
    pub thumbnail: Vec<u8>,
    pub thumbnail_preview: Vec<u8>,
    pub thumbnail_webp: Vec<u8>,
    pub thumbnail_preview_webp: Vec<u8>,
}

/// Canonical and gzip encodings of a course.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedCourse {
    pub course_data: Vec<u8>,
    pub course_data_gz: Vec<u8>,
}

/// A JPEG thumbnail and its transcoded twin (empty when no transcoder).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThumbnailPair {
    pub jpeg: Vec<u8>,
    pub transcoded: Vec<u8>,
}

pub fn encode_course(course: &Course) -> Result<EncodedCourse> {
    Ok(EncodedCourse {
        course_data: course.encode()?,
        course_data_gz: course.encode_compressed()?,
    })
}

/// Build the pair for one slot. Undecodable thumbnails get an empty
/// transcoded buffer instead of failing the whole course.
pub fn thumbnail_pair(
    course: &Course,
    kind: ThumbnailKind,
    transcoder: Option<&dyn ThumbnailTranscoder>,
) -> ThumbnailPair {
    let jpeg = course.thumbnail(kind).to_vec();
    let transcoded = match transcoder {
        Some(t) if !jpeg.is_empty() => t.transcode(&jpeg).unwrap_or_else(|e| {
            tracing::warn!(title = course.title(), slot = %kind, "Thumbnail transcode failed: {e}");
            Vec::new()
        }),
        _ => Vec::new(),
    };
    ThumbnailPair { jpeg, transcoded }
}

/// Build the complete artifact set for `course`.
pub fn build(course: &Course, transcoder: Option<&dyn ThumbnailTranscoder>) -> Result<DerivedArtifacts> {
    let encoded = encode_course(course)?;
    let full = thumbnail_pair(course, ThumbnailKind::Full, transcoder);
    let preview = thumbnail_pair(course, ThumbnailKind::Preview, transcoder);
    Ok(DerivedArtifacts {
        course_data: encoded.course_data,
        course_data_gz: encoded.course_data_gz,
        thumbnail: full.jpeg,
        thumbnail_preview: preview.jpeg,
        thumbnail_webp: full.transcoded,
        thumbnail_preview_webp: preview.transcoded,
    })
}
