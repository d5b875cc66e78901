//! Container detection from leading bytes.
//!
//! [`sniff`] never fails: anything it cannot place is [`Sniffed::Unrecognized`],
//! carrying a best-effort MIME guess for error reporting.

use smm_core::error::N3DS_MAGIC;

/// Archive containers that may hold Wii U course folders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Zip,
    SevenZip,
    Tar,
    Rar,
}

impl ArchiveKind {
    pub fn mime(self) -> &'static str {
        match self {
            Self::Zip => "application/zip",
            Self::SevenZip => "application/x-7z-compressed",
            Self::Tar => "application/x-tar",
            Self::Rar => "application/x-rar-compressed",
        }
    }
}

/// Result of classifying an upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Sniffed {
    Archive(ArchiveKind),
    /// A single 3DS course file.
    SingleBinary,
    Unrecognized { mime: Option<&'static str> },
}

const TAR_MAGIC_OFFSET: usize = 257;

/// Classify `buf` by its signature bytes.
pub fn sniff(buf: &[u8]) -> Sniffed {
    if let Some(kind) = archive_kind(buf) {
        return Sniffed::Archive(kind);
    }
    if is_3ds_course(buf) {
        return Sniffed::SingleBinary;
    }
    Sniffed::Unrecognized { mime: guess_mime(buf) }
}

/// Whether `buf` carries the 3DS course magic at offset 4.
pub fn is_3ds_course(buf: &[u8]) -> bool {
    buf.get(4..4 + N3DS_MAGIC.len()) == Some(&N3DS_MAGIC[..])
}

fn archive_kind(buf: &[u8]) -> Option<ArchiveKind> {
    if buf.starts_with(b"PK\x03\x04") || buf.starts_with(b"PK\x05\x06") || buf.starts_with(b"PK\x07\x08") {
        return Some(ArchiveKind::Zip);
    }
    if buf.starts_with(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C]) {
        return Some(ArchiveKind::SevenZip);
    }
    if buf.starts_with(b"Rar!\x1A\x07") {
        return Some(ArchiveKind::Rar);
    }
    if buf.get(TAR_MAGIC_OFFSET..TAR_MAGIC_OFFSET + 5) == Some(&b"ustar"[..]) {
        return Some(ArchiveKind::Tar);
    }
    None
}

/// Best-effort MIME detection for common non-course payloads.
///
/// Archives are reported too, so callers checking image uploads can use the
/// same table.
pub fn guess_mime(buf: &[u8]) -> Option<&'static str> {
    if let Some(kind) = archive_kind(buf) {
        return Some(kind.mime());
    }
    let table: &[(&[u8], &str)] = &[
        (&b"\x89PNG\r\n\x1a\n"[..], "image/png"),
        (&b"\xFF\xD8\xFF"[..], "image/jpeg"),
        (&b"GIF87a"[..], "image/gif"),
        (&b"GIF89a"[..], "image/gif"),
        (&b"BM"[..], "image/bmp"),
        (&b"\x1F\x8B"[..], "application/gzip"),
        (&b"%PDF-"[..], "application/pdf"),
        (&b"BZh"[..], "application/x-bzip2"),
        (&b"\xFD7zXZ\x00"[..], "application/x-xz"),
    ];
    for (magic, mime) in table {
        if buf.starts_with(magic) {
            return Some(*mime);
        }
    }
    if buf.len() >= 12 && &buf[0..4] == b"RIFF" && &buf[8..12] == b"WEBP" {
        return Some("image/webp");
    }
    None
}

/// Whether `buf` looks like an image the thumbnail path can decode.
pub fn is_image(buf: &[u8]) -> bool {
    guess_mime(buf).is_some_and(|m| m.starts_with("image/"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tar_header() -> Vec<u8> {
        let mut buf = vec![0u8; 512];
        buf[257..262].copy_from_slice(b"ustar");
        buf
    }

    #[test]
    fn detects_archives() {
        assert_eq!(sniff(b"PK\x03\x04rest"), Sniffed::Archive(ArchiveKind::Zip));
        assert_eq!(sniff(b"PK\x05\x06"), Sniffed::Archive(ArchiveKind::Zip));
        assert_eq!(
            sniff(&[0x37, 0x7A, 0xBC, 0xAF, 0x27, 0x1C, 0, 4]),
            Sniffed::Archive(ArchiveKind::SevenZip)
        );
        assert_eq!(sniff(b"Rar!\x1A\x07\x00"), Sniffed::Archive(ArchiveKind::Rar));
        assert_eq!(sniff(&tar_header()), Sniffed::Archive(ArchiveKind::Tar));
    }

    #[test]
    fn detects_3ds_magic() {
        let mut buf = vec![0xAAu8; 4];
        buf.extend_from_slice(&N3DS_MAGIC);
        buf.extend_from_slice(&[0; 32]);
        assert_eq!(sniff(&buf), Sniffed::SingleBinary);
    }

    #[test]
    fn magic_at_wrong_offset_is_unrecognized() {
        let mut buf = N3DS_MAGIC.to_vec();
        buf.extend_from_slice(&[0; 32]);
        assert!(matches!(sniff(&buf), Sniffed::Unrecognized { .. }));
    }

    #[test]
    fn short_and_empty_buffers() {
        assert_eq!(sniff(&[]), Sniffed::Unrecognized { mime: None });
        assert_eq!(sniff(b"PK"), Sniffed::Unrecognized { mime: None });
        assert_eq!(sniff(&[0, 0, 0, 0, 0x04, 0x30]), Sniffed::Unrecognized { mime: None });
    }

    #[test]
    fn unrecognized_reports_mime() {
        assert_eq!(
            sniff(b"\x89PNG\r\n\x1a\n...."),
            Sniffed::Unrecognized { mime: Some("image/png") }
        );
        assert_eq!(
            sniff(b"RIFF\x00\x00\x00\x00WEBPVP8 "),
            Sniffed::Unrecognized { mime: Some("image/webp") }
        );
    }

    #[test]
    fn image_check() {
        assert!(is_image(b"\xFF\xD8\xFF\xE0"));
        assert!(!is_image(b"PK\x03\x04"));
        assert!(!is_image(b"hello"));
    }

    #[test]
    fn mimes_match_supported_list() {
        for kind in [ArchiveKind::Zip, ArchiveKind::SevenZip, ArchiveKind::Tar, ArchiveKind::Rar] {
            assert!(smm_core::error::SUPPORTED_ARCHIVE_MIMES.contains(&kind.mime()));
        }
    }
}
