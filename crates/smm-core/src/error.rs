//! Unified error type for smmdb.
//!
//! All crates funnel their failures into [`Error`], which carries enough context
//! for API handlers to derive an HTTP status code via [`Error::http_status`].
//! Codec-level variants ([`Error::MalformedCourseData`], [`Error::Archive`],
//! [`Error::BrokenThumbnail`]) are produced by `smm-codec`; the ingestion layer
//! translates them into user errors or [`Error::ServerFault`] before they reach
//! the transport.

use std::fmt;

/// The 12-byte signature found at offset 4 of every 3DS course file.
pub const N3DS_MAGIC: [u8; 12] = [
    0x04, 0x30, 0x04, 0x00, 0x7D, 0x00, 0x00, 0x00, 0xDD, 0xBA, 0xFE, 0xCA,
];

/// Archive MIME types accepted for Wii U course uploads.
pub const SUPPORTED_ARCHIVE_MIMES: [&str; 4] = [
    "application/zip",
    "application/x-7z-compressed",
    "application/x-tar",
    "application/x-rar-compressed",
];

/// Unified error type covering all failure modes in smmdb.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The uploaded buffer is neither a supported archive nor a 3DS course.
    #[error(
        "Wrong mime type: {}\n\nSupported mime types are:\n{} for Wii U and\nheader of {} for 3DS",
        .mime.as_deref().unwrap_or("undefined"),
        SUPPORTED_ARCHIVE_MIMES.join(", "),
        magic_list()
    )]
    UnsupportedFormat {
        /// Best-effort MIME type of the rejected buffer.
        mime: Option<String>,
    },

    /// An archive was uploaded but holds no course folder.
    #[error(
        "A compressed file was uploaded, but no course was found. Compressed files are assumed to contain Wii U courses.\n\nPlease try adding your courses to sub folders called course000, course001 etc inside your compressed file."
    )]
    NoCourseFound,

    /// A reupload archive must contain exactly one course.
    #[error(
        "A compressed file was uploaded, but {found} courses were found instead of exactly one. Compressed files are assumed to contain Wii U courses.\n\nPlease try adding your course to a sub folder called course000 inside your compressed file."
    )]
    WrongCourseCount {
        /// Number of course folders found in the archive.
        found: usize,
    },

    /// Course bytes passed sniffing but failed structural checks.
    #[error("Malformed course data: {0}")]
    MalformedCourseData(String),

    /// A supplied thumbnail image could not be interpreted.
    #[error("Broken thumbnail: {0}")]
    BrokenThumbnail(String),

    /// An upload that must be an image was something else.
    #[error("Wrong mime type: {}", .mime.as_deref().unwrap_or("undefined"))]
    WrongMimeType {
        /// Best-effort MIME type of the rejected buffer.
        mime: Option<String>,
    },

    /// The `Range` header could not be parsed.
    #[error("Malformed header string")]
    MalformedRange,

    /// A requested byte range lies outside the representation.
    #[error("Unsatisfiable range")]
    UnsatisfiableRange {
        /// Length of the representation the range was checked against.
        length: u64,
    },

    /// The `Range` header used a unit other than `bytes`.
    #[error("Unknown range type: {0}")]
    UnknownRangeType(String),

    /// An archive container could not be unpacked.
    #[error("Archive error: {0}")]
    Archive(String),

    /// Unexpected failure during ingestion or delivery.
    #[error("An internal server error occurred:\n\n{0}\n\nPlease report this error to the webmaster.")]
    ServerFault(String),

    /// The requested entity could not be found.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of entity (e.g. "course", "account").
        entity: String,
        /// The identifier that was looked up.
        id: String,
    },

    /// The caller is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// The caller lacks permission for the requested action.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Request data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// A uniqueness constraint was violated.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// A database operation failed.
    #[error("Database error: {source}")]
    Database {
        /// The underlying database error.
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

fn magic_list() -> String {
    N3DS_MAGIC
        .iter()
        .map(|b| format!("0x{b:02X}"))
        .collect::<Vec<_>>()
        .join(", ")
}

impl Error {
    /// Map this error to an appropriate HTTP status code.
    pub fn http_status(&self) -> u16 {
        match self {
            Error::UnsupportedFormat { .. } => 400,
            Error::NoCourseFound => 400,
            Error::WrongCourseCount { .. } => 400,
            Error::MalformedCourseData(_) => 400,
            Error::BrokenThumbnail(_) => 400,
            Error::WrongMimeType { .. } => 400,
            Error::MalformedRange => 400,
            Error::UnsatisfiableRange { .. } => 416,
            Error::UnknownRangeType(_) => 400,
            Error::Archive(_) => 500,
            Error::ServerFault(_) => 500,
            Error::NotFound { .. } => 404,
            Error::Unauthorized(_) => 401,
            Error::Forbidden(_) => 403,
            Error::Validation(_) => 400,
            Error::Conflict(_) => 409,
            Error::Database { .. } => 500,
            Error::Io { .. } => 500,
            Error::Internal(_) => 500,
        }
    }

    /// Stable machine-readable code for API bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Error::UnsupportedFormat { .. } => "unsupported_format",
            Error::NoCourseFound => "no_course_found",
            Error::WrongCourseCount { .. } => "wrong_course_count",
            Error::MalformedCourseData(_) => "malformed_course_data",
            Error::BrokenThumbnail(_) => "broken_thumbnail",
            Error::WrongMimeType { .. } => "wrong_mime_type",
            Error::MalformedRange => "malformed_range",
            Error::UnsatisfiableRange { .. } => "unsatisfiable_range",
            Error::UnknownRangeType(_) => "unknown_range_type",
            Error::Archive(_) => "archive_error",
            Error::ServerFault(_) => "server_fault",
            Error::NotFound { .. } => "not_found",
            Error::Unauthorized(_) => "unauthorized",
            Error::Forbidden(_) => "forbidden",
            Error::Validation(_) => "validation_error",
            Error::Conflict(_) => "conflict",
            Error::Database { .. } => "database_error",
            Error::Io { .. } => "io_error",
            Error::Internal(_) => "internal_error",
        }
    }

    /// Whether the caller caused this error (4xx) rather than the server.
    pub fn is_user_error(&self) -> bool {
        (400..500).contains(&self.http_status())
    }

    /// Convenience constructor for [`Error::NotFound`].
    pub fn not_found(entity: impl Into<String>, id: impl fmt::Display) -> Self {
        Error::NotFound {
            entity: entity.into(),
            id: id.to_string(),
        }
    }

    /// Convenience constructor for [`Error::Database`].
    pub fn database(source: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Error::Database {
            source: source.into(),
        }
    }

    /// Convenience constructor for [`Error::MalformedCourseData`].
    pub fn malformed(message: impl Into<String>) -> Self {
        Error::MalformedCourseData(message.into())
    }

    /// Wrap any error as a [`Error::ServerFault`], keeping its message for
    /// operator diagnosis.
    pub fn server_fault(cause: impl fmt::Display) -> Self {
        Error::ServerFault(cause.to_string())
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
