//! Route handlers for the HTTP API.

pub mod courses;
pub mod download;
pub mod events;
pub mod health;
pub mod metrics;

use smm_core::{CourseId, Error};

/// Parse a course id from a path segment or header value.
pub(crate) fn parse_course_id(raw: &str) -> Result<CourseId, Error> {
    raw.trim()
        .parse()
        .map_err(|_| Error::Validation(format!("Invalid course ID: {raw}")))
}
