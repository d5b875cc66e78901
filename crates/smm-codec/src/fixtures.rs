//! Synthetic course files for tests.
//!
//! Everything here is deterministic so tests can compare bytes.

use std::io::{Cursor, Write};

use image::{DynamicImage, ImageFormat, Rgb, RgbImage};
use smm_core::{Gameplay, ThumbnailKind};

use crate::course::{Course, Sound, Tile};
use crate::thumbnail::encode_jpeg;
use crate::wiiu::{COURSE_DATA_FILE, COURSE_DATA_SUB_FILE, THUMBNAIL0_FILE, THUMBNAIL1_FILE};

/// Minute-aligned timestamp used for every sample course (2017-07-14 02:40 UTC).
pub const SAMPLE_MODIFIED: i64 = 1_500_000_000;

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x * 255 / width.max(1)) as u8, (y * 255 / height.max(1)) as u8, 0x80])
    })
}

/// A gradient JPEG of the given size.
pub fn sample_jpeg(width: u32, height: u32) -> Vec<u8> {
    encode_jpeg(&DynamicImage::ImageRgb8(gradient(width, height))).expect("jpeg encode")
}

/// A gradient PNG of the given size.
pub fn sample_png(width: u32, height: u32) -> Vec<u8> {
    let mut out = Vec::new();
    DynamicImage::ImageRgb8(gradient(width, height))
        .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
        .expect("png encode");
    out
}

/// A course with a handful of objects, sounds and valid thumbnails.
pub fn sample_course(title: &str, maker: &str) -> Course {
    let mut course = Course::new(title, maker, Gameplay::default()).expect("sample title");
    course.set_modified(SAMPLE_MODIFIED);
    course.level.tiles = (0..8)
        .map(|i| Tile {
            x: i * 160,
            z: 0,
            y: 80,
            width: 1,
            height: 1,
            flags: 0x0600_0040,
            child_flags: 0x0600_0040,
            extended_data: 0,
            kind: (i % 4) as i8,
            child_kind: -1,
            link_id: -1,
            effect_index: -1,
            transform_id: -1,
            child_transform_id: -1,
        })
        .collect();
    course.level.tiles_sub = course.level.tiles[..2].to_vec();
    course.level.sounds = vec![Sound {
        kind: 3,
        x: 10,
        y: 4,
        variation: 0,
    }];
    course
        .set_thumbnail(&sample_jpeg(720, 81), ThumbnailKind::Full, false)
        .expect("full thumbnail");
    course
        .set_thumbnail(&sample_jpeg(320, 240), ThumbnailKind::Preview, true)
        .expect("preview thumbnail");
    course
}

/// A sample course whose thumbnails cannot be decoded.
pub fn broken_thumbnail_course(title: &str, maker: &str) -> Course {
    let mut course = Course::new(title, maker, Gameplay::default()).expect("sample title");
    course.set_modified(SAMPLE_MODIFIED);
    course
}

/// A sample course encoded as a 3DS file.
pub fn sample_3ds(title: &str, maker: &str) -> Vec<u8> {
    sample_course(title, maker).to_3ds().expect("3ds encode")
}

/// A zip with the given paths and contents.
pub fn zip_of(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::SimpleFileOptions::default();
    for (name, data) in entries {
        writer.start_file(*name, options).expect("zip entry");
        writer.write_all(data).expect("zip write");
    }
    writer.finish().expect("zip finish").into_inner()
}

fn course_entries(titles: &[&str]) -> Vec<(String, Vec<u8>)> {
    titles
        .iter()
        .enumerate()
        .flat_map(|(i, title)| {
            let save = sample_course(title, "fixture").to_wiiu().expect("wiiu encode");
            let dir = format!("course{i:03}");
            [
                (format!("{dir}/{COURSE_DATA_FILE}"), save.course_data),
                (format!("{dir}/{COURSE_DATA_SUB_FILE}"), save.course_data_sub),
                (format!("{dir}/{THUMBNAIL0_FILE}"), save.thumbnail0),
                (format!("{dir}/{THUMBNAIL1_FILE}"), save.thumbnail1),
            ]
        })
        .collect()
}

/// A zip holding one `courseNNN` folder per title.
pub fn wiiu_zip(titles: &[&str]) -> Vec<u8> {
    let entries = course_entries(titles);
    let borrowed: Vec<(&str, Vec<u8>)> = entries
        .iter()
        .map(|(name, data)| (name.as_str(), data.clone()))
        .collect();
    zip_of(&borrowed)
}

/// A tar holding one `courseNNN` folder per title.
pub fn wiiu_tar(titles: &[&str]) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, data) in course_entries(titles) {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder
            .append_data(&mut header, name, data.as_slice())
            .expect("tar entry");
    }
    builder.into_inner().expect("tar finish")
}

/// A 7z archive holding one `courseNNN` folder per title.
pub fn wiiu_7z(titles: &[&str]) -> Vec<u8> {
    let src = tempfile::tempdir().expect("7z source dir");
    for (name, data) in course_entries(titles) {
        let path = src.path().join(name);
        std::fs::create_dir_all(path.parent().expect("entry has a folder")).expect("7z folder");
        std::fs::write(path, data).expect("7z entry");
    }
    let out = tempfile::tempdir().expect("7z output dir");
    let archive = out.path().join("courses.7z");
    sevenz_rust::compress_to_path(src.path(), &archive).expect("7z compress");
    std::fs::read(archive).expect("7z read")
}
