//! Wii U save folder format (`courseNNN/`).
//!
//! A save folder holds two fixed-size course files (`course_data.cdt` for the
//! main area, `course_data_sub.cdt` for the sub area) and two `.tnl`
//! thumbnail containers. Every file carries a CRC32 of its payload.

use std::path::Path;

use byteorder::{BigEndian, ByteOrder};
use chrono::{DateTime, Datelike, NaiveDate, Timelike};
use smm_core::{AutoScroll, CourseTheme, Error, GameStyle, Gameplay, Result, ThumbnailKind};

use crate::course::{Course, LevelData, Sound, Tile, MAX_MAKER_LEN, MAX_TITLE_LEN};

pub const COURSE_DATA_FILE: &str = "course_data.cdt";
pub const COURSE_DATA_SUB_FILE: &str = "course_data_sub.cdt";
/// 320x240 preview thumbnail.
pub const THUMBNAIL0_FILE: &str = "thumbnail0.tnl";
/// 720x81 wide thumbnail.
pub const THUMBNAIL1_FILE: &str = "thumbnail1.tnl";

pub const COURSE_DATA_LEN: usize = 0x15000;
pub const THUMBNAIL_LEN: usize = 0xC800;
pub(crate) const HEADER_LEN: usize = 0x10;

const FORMAT_VERSION: u64 = 0x0B;

const OFF_VERSION: usize = 0x00;
const OFF_CRC: usize = 0x08;
const OFF_YEAR: usize = 0x10;
const OFF_MONTH: usize = 0x12;
const OFF_DAY: usize = 0x13;
const OFF_HOUR: usize = 0x14;
const OFF_MINUTE: usize = 0x15;
const OFF_TITLE: usize = 0x28;
const TITLE_BYTES: usize = MAX_TITLE_LEN * 2;
const OFF_GAME_STYLE: usize = 0x6A;
const OFF_THEME: usize = 0x6D;
const OFF_TIME: usize = 0x70;
const OFF_AUTO_SCROLL: usize = 0x72;
const OFF_WIDTH: usize = 0x74;
const OFF_MAKER: usize = 0x92;
const MAKER_BYTES: usize = MAX_MAKER_LEN * 2;
const OFF_OBJECT_COUNT: usize = 0xEC;
const OFF_OBJECTS: usize = 0xF0;
const OBJECT_LEN: usize = 0x20;
pub const MAX_OBJECTS: usize = 2600;
const OFF_SOUNDS: usize = 0x145F0;
const SOUND_LEN: usize = 8;
pub const MAX_SOUNDS: usize = 300;
const EMPTY_SOUND: u8 = 0xFF;

const TNL_OFF_CRC: usize = 0x00;
const TNL_OFF_LEN: usize = 0x04;
const TNL_OFF_JPEG: usize = 0x08;

/// Raw files of one Wii U course folder. Missing optional files are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WiiuSave {
    pub course_data: Vec<u8>,
    pub course_data_sub: Vec<u8>,
    /// Preview thumbnail container.
    pub thumbnail0: Vec<u8>,
    /// Wide thumbnail container.
    pub thumbnail1: Vec<u8>,
}

impl WiiuSave {
    /// Read a course folder. Only `course_data.cdt` is required.
    pub fn read_dir(dir: &Path) -> Result<Self> {
        let read_optional = |name: &str| -> Result<Vec<u8>> {
            match std::fs::read(dir.join(name)) {
                Ok(buf) => Ok(buf),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
                Err(e) => Err(e.into()),
            }
        };
        Ok(Self {
            course_data: std::fs::read(dir.join(COURSE_DATA_FILE))?,
            course_data_sub: read_optional(COURSE_DATA_SUB_FILE)?,
            thumbnail0: read_optional(THUMBNAIL0_FILE)?,
            thumbnail1: read_optional(THUMBNAIL1_FILE)?,
        })
    }

    /// Write all four files into `dir`, creating it if needed.
    pub fn write_dir(&self, dir: &Path) -> Result<()> {
        std::fs::create_dir_all(dir)?;
        std::fs::write(dir.join(COURSE_DATA_FILE), &self.course_data)?;
        std::fs::write(dir.join(COURSE_DATA_SUB_FILE), &self.course_data_sub)?;
        std::fs::write(dir.join(THUMBNAIL0_FILE), &self.thumbnail0)?;
        std::fs::write(dir.join(THUMBNAIL1_FILE), &self.thumbnail1)?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Area (one .cdt file)
// ---------------------------------------------------------------------------

/// Contents of one course data file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Area {
    pub title: String,
    pub maker: String,
    pub modified: i64,
    pub game_style: GameStyle,
    pub theme: CourseTheme,
    pub time: u16,
    pub auto_scroll: AutoScroll,
    pub width: u16,
    pub tiles: Vec<Tile>,
    pub sounds: Vec<Sound>,
}

/// Parse a full-length course data buffer. The CRC is not checked here.
pub(crate) fn parse_area(buf: &[u8]) -> Result<Area> {
    if buf.len() != COURSE_DATA_LEN {
        return Err(Error::malformed(format!(
            "course data is {:#x} bytes, expected {COURSE_DATA_LEN:#x}",
            buf.len()
        )));
    }

    let game_style = GameStyle::from_code(&buf[OFF_GAME_STYLE..OFF_GAME_STYLE + 2])
        .ok_or_else(|| Error::malformed("unknown game style"))?;
    let theme = CourseTheme::from_byte(buf[OFF_THEME])
        .ok_or_else(|| Error::malformed(format!("unknown course theme {}", buf[OFF_THEME])))?;
    let auto_scroll = AutoScroll::from_byte(buf[OFF_AUTO_SCROLL])
        .ok_or_else(|| Error::malformed(format!("unknown auto scroll {}", buf[OFF_AUTO_SCROLL])))?;

    let object_count = BigEndian::read_u32(&buf[OFF_OBJECT_COUNT..]) as usize;
    if object_count > MAX_OBJECTS {
        return Err(Error::malformed(format!(
            "object count {object_count} exceeds {MAX_OBJECTS}"
        )));
    }
    let tiles = (0..object_count)
        .map(|i| read_tile(&buf[OFF_OBJECTS + i * OBJECT_LEN..]))
        .collect();
    let sounds = (0..MAX_SOUNDS)
        .map(|i| &buf[OFF_SOUNDS + i * SOUND_LEN..OFF_SOUNDS + (i + 1) * SOUND_LEN])
        .take_while(|s| s[0] != EMPTY_SOUND)
        .map(|s| Sound {
            kind: s[0],
            x: s[1],
            y: s[2],
            variation: s[3],
        })
        .collect();

    Ok(Area {
        title: read_utf16(&buf[OFF_TITLE..OFF_TITLE + TITLE_BYTES]),
        maker: read_utf16(&buf[OFF_MAKER..OFF_MAKER + MAKER_BYTES]),
        modified: read_timestamp(buf)?,
        game_style,
        theme,
        time: BigEndian::read_u16(&buf[OFF_TIME..]),
        auto_scroll,
        width: BigEndian::read_u16(&buf[OFF_WIDTH..]),
        tiles,
        sounds,
    })
}

/// Serialize an area to a full-length course data buffer, CRC included.
pub(crate) fn write_area(area: &Area) -> Result<Vec<u8>> {
    if area.tiles.len() > MAX_OBJECTS {
        return Err(Error::Internal(format!(
            "{} objects do not fit a course file",
            area.tiles.len()
        )));
    }
    if area.sounds.len() > MAX_SOUNDS {
        return Err(Error::Internal(format!(
            "{} sounds do not fit a course file",
            area.sounds.len()
        )));
    }

    let mut buf = vec![0u8; COURSE_DATA_LEN];
    BigEndian::write_u64(&mut buf[OFF_VERSION..], FORMAT_VERSION);
    write_timestamp(&mut buf, area.modified);
    write_utf16(&mut buf[OFF_TITLE..OFF_TITLE + TITLE_BYTES], &area.title);
    write_utf16(&mut buf[OFF_MAKER..OFF_MAKER + MAKER_BYTES], &area.maker);
    buf[OFF_GAME_STYLE..OFF_GAME_STYLE + 2].copy_from_slice(area.game_style.code());
    buf[OFF_THEME] = area.theme.as_byte();
    BigEndian::write_u16(&mut buf[OFF_TIME..], area.time);
    buf[OFF_AUTO_SCROLL] = area.auto_scroll.as_byte();
    BigEndian::write_u16(&mut buf[OFF_WIDTH..], area.width);

    BigEndian::write_u32(&mut buf[OFF_OBJECT_COUNT..], area.tiles.len() as u32);
    for (i, tile) in area.tiles.iter().enumerate() {
        write_tile(&mut buf[OFF_OBJECTS + i * OBJECT_LEN..], tile);
    }
    for i in 0..MAX_SOUNDS {
        let slot = &mut buf[OFF_SOUNDS + i * SOUND_LEN..OFF_SOUNDS + (i + 1) * SOUND_LEN];
        match area.sounds.get(i) {
            Some(s) => slot[..4].copy_from_slice(&[s.kind, s.x, s.y, s.variation]),
            None => slot.fill(EMPTY_SOUND),
        }
    }

    let crc = crc32fast::hash(&buf[HEADER_LEN..]);
    BigEndian::write_u32(&mut buf[OFF_CRC..], crc);
    Ok(buf)
}

fn read_cdt(buf: &[u8], name: &str) -> Result<Area> {
    if buf.len() != COURSE_DATA_LEN {
        return Err(Error::malformed(format!(
            "{name} is {:#x} bytes, expected {COURSE_DATA_LEN:#x}",
            buf.len()
        )));
    }
    let stored = BigEndian::read_u32(&buf[OFF_CRC..]);
    let actual = crc32fast::hash(&buf[HEADER_LEN..]);
    if stored != actual {
        return Err(Error::malformed(format!(
            "{name} checksum mismatch (stored {stored:#010x}, computed {actual:#010x})"
        )));
    }
    parse_area(buf)
}

fn read_tile(rec: &[u8]) -> Tile {
    Tile {
        x: BigEndian::read_u32(&rec[0x00..]),
        z: BigEndian::read_u32(&rec[0x04..]),
        y: BigEndian::read_i16(&rec[0x08..]),
        width: rec[0x0A] as i8,
        height: rec[0x0B] as i8,
        flags: BigEndian::read_u32(&rec[0x0C..]),
        child_flags: BigEndian::read_u32(&rec[0x10..]),
        extended_data: BigEndian::read_u32(&rec[0x14..]),
        kind: rec[0x18] as i8,
        child_kind: rec[0x19] as i8,
        link_id: BigEndian::read_i16(&rec[0x1A..]),
        effect_index: BigEndian::read_i16(&rec[0x1C..]),
        transform_id: rec[0x1E] as i8,
        child_transform_id: rec[0x1F] as i8,
    }
}

fn write_tile(rec: &mut [u8], tile: &Tile) {
    BigEndian::write_u32(&mut rec[0x00..], tile.x);
    BigEndian::write_u32(&mut rec[0x04..], tile.z);
    BigEndian::write_i16(&mut rec[0x08..], tile.y);
    rec[0x0A] = tile.width as u8;
    rec[0x0B] = tile.height as u8;
    BigEndian::write_u32(&mut rec[0x0C..], tile.flags);
    BigEndian::write_u32(&mut rec[0x10..], tile.child_flags);
    BigEndian::write_u32(&mut rec[0x14..], tile.extended_data);
    rec[0x18] = tile.kind as u8;
    rec[0x19] = tile.child_kind as u8;
    BigEndian::write_i16(&mut rec[0x1A..], tile.link_id);
    BigEndian::write_i16(&mut rec[0x1C..], tile.effect_index);
    rec[0x1E] = tile.transform_id as u8;
    rec[0x1F] = tile.child_transform_id as u8;
}

fn read_utf16(field: &[u8]) -> String {
    let units: Vec<u16> = field
        .chunks_exact(2)
        .map(BigEndian::read_u16)
        .take_while(|&u| u != 0)
        .collect();
    String::from_utf16_lossy(&units)
}

fn write_utf16(field: &mut [u8], s: &str) {
    field.fill(0);
    for (slot, unit) in field.chunks_exact_mut(2).zip(s.encode_utf16()) {
        BigEndian::write_u16(slot, unit);
    }
}

fn read_timestamp(buf: &[u8]) -> Result<i64> {
    let year = BigEndian::read_u16(&buf[OFF_YEAR..]);
    if year == 0 {
        return Ok(0);
    }
    let (month, day, hour, minute) = (buf[OFF_MONTH], buf[OFF_DAY], buf[OFF_HOUR], buf[OFF_MINUTE]);
    NaiveDate::from_ymd_opt(i32::from(year), u32::from(month), u32::from(day))
        .and_then(|d| d.and_hms_opt(u32::from(hour), u32::from(minute), 0))
        .map(|dt| dt.and_utc().timestamp())
        .ok_or_else(|| {
            Error::malformed(format!(
                "invalid timestamp {year:04}-{month:02}-{day:02} {hour:02}:{minute:02}"
            ))
        })
}

fn write_timestamp(buf: &mut [u8], unix_secs: i64) {
    let Some(dt) = DateTime::from_timestamp(unix_secs, 0).filter(|_| unix_secs > 0) else {
        return;
    };
    let Ok(year) = u16::try_from(dt.year()) else {
        return;
    };
    BigEndian::write_u16(&mut buf[OFF_YEAR..], year);
    buf[OFF_MONTH] = dt.month() as u8;
    buf[OFF_DAY] = dt.day() as u8;
    buf[OFF_HOUR] = dt.hour() as u8;
    buf[OFF_MINUTE] = dt.minute() as u8;
}

// ---------------------------------------------------------------------------
// Thumbnail containers
// ---------------------------------------------------------------------------

/// Extract the JPEG from a `.tnl` container. An empty input yields an empty
/// thumbnail.
pub(crate) fn read_tnl(buf: &[u8]) -> Result<Vec<u8>> {
    if buf.is_empty() {
        return Ok(Vec::new());
    }
    if buf.len() != THUMBNAIL_LEN {
        return Err(Error::malformed(format!(
            "thumbnail is {:#x} bytes, expected {THUMBNAIL_LEN:#x}",
            buf.len()
        )));
    }
    let stored = BigEndian::read_u32(&buf[TNL_OFF_CRC..]);
    if stored != crc32fast::hash(&buf[TNL_OFF_LEN..]) {
        return Err(Error::malformed("thumbnail checksum mismatch"));
    }
    let len = BigEndian::read_u32(&buf[TNL_OFF_LEN..]) as usize;
    if len > THUMBNAIL_LEN - TNL_OFF_JPEG {
        return Err(Error::malformed(format!("thumbnail length {len} out of bounds")));
    }
    Ok(buf[TNL_OFF_JPEG..TNL_OFF_JPEG + len].to_vec())
}

/// Wrap a JPEG into a `.tnl` container.
pub(crate) fn write_tnl(jpeg: &[u8]) -> Result<Vec<u8>> {
    if jpeg.len() > THUMBNAIL_LEN - TNL_OFF_JPEG {
        return Err(Error::Internal(format!(
            "thumbnail of {} bytes does not fit a thumbnail container",
            jpeg.len()
        )));
    }
    let mut buf = vec![0u8; THUMBNAIL_LEN];
    BigEndian::write_u32(&mut buf[TNL_OFF_LEN..], jpeg.len() as u32);
    buf[TNL_OFF_JPEG..TNL_OFF_JPEG + jpeg.len()].copy_from_slice(jpeg);
    let crc = crc32fast::hash(&buf[TNL_OFF_LEN..]);
    BigEndian::write_u32(&mut buf[TNL_OFF_CRC..], crc);
    Ok(buf)
}

// ---------------------------------------------------------------------------
// Course <-> areas
// ---------------------------------------------------------------------------

impl Course {
    /// Build a course from its main and sub areas plus thumbnails.
    pub(crate) fn from_areas(main: Area, sub: Area, thumbnail: Vec<u8>, thumbnail_preview: Vec<u8>) -> Self {
        let gameplay = Gameplay {
            game_style: main.game_style,
            course_theme: main.theme,
            course_theme_sub: sub.theme,
            time: main.time,
            auto_scroll: main.auto_scroll,
            auto_scroll_sub: sub.auto_scroll,
            width: main.width,
            width_sub: sub.width,
        };
        let level = LevelData {
            tiles: main.tiles,
            tiles_sub: sub.tiles,
            sounds: main.sounds,
            sounds_sub: sub.sounds,
        };
        Course::from_parts(
            &main.title,
            &main.maker,
            main.modified,
            gameplay,
            thumbnail,
            thumbnail_preview,
            level,
        )
    }

    /// Split into (main, sub) areas.
    pub(crate) fn to_areas(&self) -> (Area, Area) {
        let g = &self.gameplay;
        let base = |theme, auto_scroll, width, tiles: &[Tile], sounds: &[Sound]| Area {
            title: self.title().to_string(),
            maker: self.maker().to_string(),
            modified: self.modified(),
            game_style: g.game_style,
            theme,
            time: g.time,
            auto_scroll,
            width,
            tiles: tiles.to_vec(),
            sounds: sounds.to_vec(),
        };
        (
            base(g.course_theme, g.auto_scroll, g.width, &self.level.tiles, &self.level.sounds),
            base(
                g.course_theme_sub,
                g.auto_scroll_sub,
                g.width_sub,
                &self.level.tiles_sub,
                &self.level.sounds_sub,
            ),
        )
    }

    /// Decode a Wii U save folder.
    pub fn from_wiiu(save: &WiiuSave) -> Result<Self> {
        let main = read_cdt(&save.course_data, COURSE_DATA_FILE)?;
        let sub = if save.course_data_sub.is_empty() {
            Area {
                theme: CourseTheme::Underground,
                auto_scroll: AutoScroll::None,
                tiles: Vec::new(),
                sounds: Vec::new(),
                ..main.clone()
            }
        } else {
            read_cdt(&save.course_data_sub, COURSE_DATA_SUB_FILE)?
        };
        let preview = read_tnl(&save.thumbnail0)?;
        let full = read_tnl(&save.thumbnail1)?;
        tracing::debug!(
            title = %main.title,
            objects = main.tiles.len(),
            sub_objects = sub.tiles.len(),
            "Decoded Wii U course"
        );
        Ok(Self::from_areas(main, sub, full, preview))
    }

    /// Encode as a Wii U save folder.
    pub fn to_wiiu(&self) -> Result<WiiuSave> {
        let (main, sub) = self.to_areas();
        Ok(WiiuSave {
            course_data: write_area(&main)?,
            course_data_sub: write_area(&sub)?,
            thumbnail0: write_tnl(self.thumbnail(ThumbnailKind::Preview))?,
            thumbnail1: write_tnl(self.thumbnail(ThumbnailKind::Full))?,
        })
    }
}
