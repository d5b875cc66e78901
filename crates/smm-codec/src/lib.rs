//! smm-codec: course container formats.
//!
//! Upload bytes flow through [`sniff`] (what is it?), [`archive`] (unpack
//! Wii U save folders), and the [`Course`] codecs (canonical, Wii U, 3DS).
//! [`artifacts`] derives everything the database stores for a course.

pub mod archive;
pub mod artifacts;
pub mod course;
pub mod n3ds;
pub mod sniff;
pub mod thumbnail;
pub mod view;
pub mod wiiu;

#[cfg(any(test, feature = "fixtures"))]
pub mod fixtures;

pub use artifacts::{DerivedArtifacts, EncodedCourse, ThumbnailPair};
pub use course::{Course, LevelData, Sound, Tile};
pub use sniff::{sniff, ArchiveKind, Sniffed};
pub use thumbnail::{ThumbnailTranscoder, WebpTranscoder};
pub use view::CourseView;
pub use wiiu::WiiuSave;
