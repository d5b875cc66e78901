//! Archive unpacking and course folder discovery.

use std::fs::{self, File};
use std::io::{self, Cursor, Read};
use std::path::{Component, Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use smm_core::{Error, Result};
use walkdir::WalkDir;

use crate::sniff::ArchiveKind;
use crate::wiiu::{WiiuSave, COURSE_DATA_FILE};

static COURSE_DIR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^course\d{3}$").expect("course folder pattern is valid"));

/// Caps on what a single upload may unpack to.
///
/// A full Wii U save (120 course folders) unpacks to roughly 33 MiB in
/// about 600 entries.
#[derive(Debug, Clone, Copy)]
pub struct ExtractLimits {
    pub max_entries: usize,
    pub max_bytes: u64,
}

impl Default for ExtractLimits {
    fn default() -> Self {
        Self {
            max_entries: 4096,
            max_bytes: 128 * 1024 * 1024,
        }
    }
}

/// Unpack `buf` and return every course folder in it, ordered by name.
///
/// Extraction happens in a temporary directory that is removed before this
/// function returns, whatever the outcome. An archive without course folders
/// yields an empty list.
pub fn extract_courses(buf: &[u8], kind: ArchiveKind) -> Result<Vec<WiiuSave>> {
    extract_courses_with(buf, kind, ExtractLimits::default())
}

/// [`extract_courses`] with explicit limits. Exceeding either limit aborts
/// extraction with [`Error::Archive`].
pub fn extract_courses_with(buf: &[u8], kind: ArchiveKind, limits: ExtractLimits) -> Result<Vec<WiiuSave>> {
    let staging = tempfile::Builder::new()
        .prefix("smmdb-extract-")
        .tempdir()?;
    unpack(buf, kind, staging.path(), &mut Budget::new(limits))?;

    let dirs = course_dirs(staging.path());
    tracing::debug!(archive = kind.mime(), folders = dirs.len(), "Unpacked upload");

    dirs.iter().map(|dir| WiiuSave::read_dir(dir)).collect()
}

/// Running totals checked against [`ExtractLimits`].
struct Budget {
    limits: ExtractLimits,
    entries: usize,
    bytes: u64,
}

impl Budget {
    fn new(limits: ExtractLimits) -> Self {
        Self {
            limits,
            entries: 0,
            bytes: 0,
        }
    }

    fn entry(&mut self) -> Result<()> {
        self.entries += 1;
        if self.entries > self.limits.max_entries {
            return Err(Error::Archive(format!(
                "archive holds more than {} entries",
                self.limits.max_entries
            )));
        }
        Ok(())
    }

    fn remaining(&self) -> u64 {
        self.limits.max_bytes.saturating_sub(self.bytes)
    }

    fn claim(&mut self, n: u64) -> Result<()> {
        self.bytes = self.bytes.saturating_add(n);
        if self.bytes > self.limits.max_bytes {
            return Err(Error::Archive(format!(
                "archive unpacks to more than {} bytes",
                self.limits.max_bytes
            )));
        }
        Ok(())
    }
}

fn unpack(buf: &[u8], kind: ArchiveKind, dest: &Path, budget: &mut Budget) -> Result<()> {
    match kind {
        ArchiveKind::Zip => unpack_zip(buf, dest, budget),
        ArchiveKind::Tar => unpack_tar(buf, dest, budget),
        ArchiveKind::SevenZip => unpack_7z(buf, dest, budget),
        ArchiveKind::Rar => Err(Error::Archive(
            "rar archives are recognized but cannot be unpacked".into(),
        )),
    }
}

fn unpack_zip(buf: &[u8], dest: &Path, budget: &mut Budget) -> Result<()> {
    let zip_err = |e: zip::result::ZipError| Error::Archive(format!("zip: {e}"));
    let mut archive = zip::ZipArchive::new(Cursor::new(buf)).map_err(zip_err)?;
    for i in 0..archive.len() {
        budget.entry()?;
        let mut entry = archive.by_index(i).map_err(zip_err)?;
        let Some(name) = entry.enclosed_name() else {
            continue;
        };
        let path = dest.join(name);
        if entry.is_dir() {
            fs::create_dir_all(&path)?;
            continue;
        }
        // Declared sizes can lie; the copy below is bounded regardless.
        if entry.size() > budget.remaining() {
            return budget.claim(entry.size());
        }
        copy_bounded(&mut entry, &path, budget)?;
    }
    Ok(())
}

fn unpack_tar(buf: &[u8], dest: &Path, budget: &mut Budget) -> Result<()> {
    let tar_err = |e: io::Error| Error::Archive(format!("tar: {e}"));
    let mut archive = tar::Archive::new(Cursor::new(buf));
    for entry in archive.entries().map_err(tar_err)? {
        let mut entry = entry.map_err(tar_err)?;
        budget.entry()?;
        budget.claim(entry.size())?;
        entry.unpack_in(dest).map_err(tar_err)?;
    }
    Ok(())
}

fn unpack_7z(buf: &[u8], dest: &Path, budget: &mut Budget) -> Result<()> {
    sevenz_rust::decompress_with_extract_fn(Cursor::new(buf), dest, |entry, reader, path| {
        if !is_contained(dest, path) {
            return Ok(false);
        }
        extract_7z_entry(entry.is_directory(), reader, path, budget)
            .map_err(|e| sevenz_rust::Error::from(io::Error::other(e.to_string())))?;
        Ok(true)
    })
    .map_err(|e| Error::Archive(format!("7z: {e}")))
}

fn extract_7z_entry(is_dir: bool, reader: &mut dyn Read, path: &Path, budget: &mut Budget) -> Result<()> {
    budget.entry()?;
    if is_dir {
        fs::create_dir_all(path)?;
        return Ok(());
    }
    copy_bounded(reader, path, budget)
}

/// Whether `path` stays below `root` without climbing out through `..`.
fn is_contained(root: &Path, path: &Path) -> bool {
    path.strip_prefix(root).is_ok_and(|rel| {
        rel.components()
            .all(|c| matches!(c, Component::Normal(_) | Component::CurDir))
    })
}

/// Write one entry to `path`, charging the bytes against `budget`.
fn copy_bounded(reader: &mut dyn Read, path: &Path, budget: &mut Budget) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut out = File::create(path)?;
    let mut limited = Read::take(reader, budget.remaining() + 1);
    let written = io::copy(&mut limited, &mut out)?;
    budget.claim(written)
}

/// Directories named `courseNNN` that contain a course data file.
fn course_dirs(root: &Path) -> Vec<PathBuf> {
    let mut dirs: Vec<PathBuf> = WalkDir::new(root)
        .min_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_dir())
        .filter(|e| e.file_name().to_str().is_some_and(|n| COURSE_DIR.is_match(n)))
        .filter(|e| e.path().join(COURSE_DATA_FILE).is_file())
        .map(|e| e.into_path())
        .collect();
    dirs.sort_by(|a, b| a.file_name().cmp(&b.file_name()).then_with(|| a.cmp(b)));
    dirs
}
