//! Single-file 3DS course format.
//!
//! Layout: CRC32 (big-endian, over everything from 0x10) at 0x00, the
//! 12-byte magic at 0x04, then the main and sub area bodies (a course data
//! file without its 0x10-byte header), then the preview and wide thumbnail
//! containers.

use byteorder::{BigEndian, ByteOrder};
use smm_core::error::N3DS_MAGIC;
use smm_core::{Error, Result, ThumbnailKind};

use crate::course::Course;
use crate::wiiu::{self, COURSE_DATA_LEN, HEADER_LEN, THUMBNAIL_LEN};

const AREA_BODY_LEN: usize = COURSE_DATA_LEN - HEADER_LEN;
const OFF_MAIN: usize = 0x10;
const OFF_SUB: usize = OFF_MAIN + AREA_BODY_LEN;
const OFF_PREVIEW: usize = OFF_SUB + AREA_BODY_LEN;
const OFF_FULL: usize = OFF_PREVIEW + THUMBNAIL_LEN;

/// Total size of a 3DS course file.
pub const N3DS_COURSE_LEN: usize = OFF_FULL + THUMBNAIL_LEN;

fn area_from_body(body: &[u8]) -> Result<wiiu::Area> {
    let mut cdt = vec![0u8; HEADER_LEN];
    cdt.extend_from_slice(body);
    wiiu::parse_area(&cdt)
}

impl Course {
    /// Decode a 3DS course file.
    pub fn from_3ds(buf: &[u8]) -> Result<Self> {
        if buf.len() != N3DS_COURSE_LEN {
            return Err(Error::malformed(format!(
                "3DS course is {:#x} bytes, expected {N3DS_COURSE_LEN:#x}",
                buf.len()
            )));
        }
        if buf[4..16] != N3DS_MAGIC {
            return Err(Error::malformed("missing 3DS course header"));
        }
        let stored = BigEndian::read_u32(&buf[0..4]);
        let actual = crc32fast::hash(&buf[OFF_MAIN..]);
        if stored != actual {
            return Err(Error::malformed(format!(
                "3DS checksum mismatch (stored {stored:#010x}, computed {actual:#010x})"
            )));
        }

        let main = area_from_body(&buf[OFF_MAIN..OFF_SUB])?;
        let sub = area_from_body(&buf[OFF_SUB..OFF_PREVIEW])?;
        let preview = wiiu::read_tnl(&buf[OFF_PREVIEW..OFF_FULL])?;
        let full = wiiu::read_tnl(&buf[OFF_FULL..])?;
        tracing::debug!(title = %main.title, objects = main.tiles.len(), "Decoded 3DS course");
        Ok(Self::from_areas(main, sub, full, preview))
    }

    /// Encode as a 3DS course file.
    pub fn to_3ds(&self) -> Result<Vec<u8>> {
        let (main, sub) = self.to_areas();
        let mut buf = Vec::with_capacity(N3DS_COURSE_LEN);
        buf.extend_from_slice(&[0u8; 4]);
        buf.extend_from_slice(&N3DS_MAGIC);
        buf.extend_from_slice(&wiiu::write_area(&main)?[HEADER_LEN..]);
        buf.extend_from_slice(&wiiu::write_area(&sub)?[HEADER_LEN..]);
        buf.extend_from_slice(&wiiu::write_tnl(self.thumbnail(ThumbnailKind::Preview))?);
        buf.extend_from_slice(&wiiu::write_tnl(self.thumbnail(ThumbnailKind::Full))?);
        let crc = crc32fast::hash(&buf[OFF_MAIN..]);
        BigEndian::write_u32(&mut buf[0..4], crc);
        Ok(buf)
    }
}
