//! Course-domain enums shared by the codec, the database and the API.
//!
//! Every enum maps to the single byte it occupies in the course binaries
//! (`from_byte` / `as_byte`) and serializes in snake_case for JSON.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// GameStyle
// ---------------------------------------------------------------------------

/// Which game's look and physics a course uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameStyle {
    #[default]
    SuperMarioBros,
    SuperMarioBros3,
    SuperMarioWorld,
    NewSuperMarioBrosU,
}

impl GameStyle {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::SuperMarioBros),
            1 => Some(Self::SuperMarioBros3),
            2 => Some(Self::SuperMarioWorld),
            3 => Some(Self::NewSuperMarioBrosU),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }

    /// Two-letter code stored in Wii U course files.
    pub fn code(self) -> &'static [u8; 2] {
        match self {
            Self::SuperMarioBros => b"M1",
            Self::SuperMarioBros3 => b"M3",
            Self::SuperMarioWorld => b"MW",
            Self::NewSuperMarioBrosU => b"WU",
        }
    }

    pub fn from_code(code: &[u8]) -> Option<Self> {
        match code {
            b"M1" => Some(Self::SuperMarioBros),
            b"M3" => Some(Self::SuperMarioBros3),
            b"MW" => Some(Self::SuperMarioWorld),
            b"WU" => Some(Self::NewSuperMarioBrosU),
            _ => None,
        }
    }
}

impl fmt::Display for GameStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SuperMarioBros => write!(f, "super_mario_bros"),
            Self::SuperMarioBros3 => write!(f, "super_mario_bros_3"),
            Self::SuperMarioWorld => write!(f, "super_mario_world"),
            Self::NewSuperMarioBrosU => write!(f, "new_super_mario_bros_u"),
        }
    }
}

// ---------------------------------------------------------------------------
// CourseTheme
// ---------------------------------------------------------------------------

/// Background theme of a course area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CourseTheme {
    #[default]
    Ground,
    Underground,
    Castle,
    Airship,
    Underwater,
    GhostHouse,
}

impl CourseTheme {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::Ground),
            1 => Some(Self::Underground),
            2 => Some(Self::Castle),
            3 => Some(Self::Airship),
            4 => Some(Self::Underwater),
            5 => Some(Self::GhostHouse),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for CourseTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ground => write!(f, "ground"),
            Self::Underground => write!(f, "underground"),
            Self::Castle => write!(f, "castle"),
            Self::Airship => write!(f, "airship"),
            Self::Underwater => write!(f, "underwater"),
            Self::GhostHouse => write!(f, "ghost_house"),
        }
    }
}

// ---------------------------------------------------------------------------
// AutoScroll
// ---------------------------------------------------------------------------

/// Auto-scroll speed of a course area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutoScroll {
    #[default]
    None,
    Slow,
    Medium,
    Fast,
}

impl AutoScroll {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            0 => Some(Self::None),
            1 => Some(Self::Slow),
            2 => Some(Self::Medium),
            3 => Some(Self::Fast),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        self as u8
    }
}

impl fmt::Display for AutoScroll {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::Slow => write!(f, "slow"),
            Self::Medium => write!(f, "medium"),
            Self::Fast => write!(f, "fast"),
        }
    }
}

// ---------------------------------------------------------------------------
// ThumbnailKind
// ---------------------------------------------------------------------------

/// The two thumbnail slots of a course.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThumbnailKind {
    /// Wide 720x81 strip ("full").
    Full,
    /// 320x240 preview ("prev").
    Preview,
}

impl ThumbnailKind {
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::Full => (720, 81),
            Self::Preview => (320, 240),
        }
    }

    /// Parse the URL segment used by the API (`full` / `prev`).
    pub fn from_segment(s: &str) -> Option<Self> {
        match s {
            "full" => Some(Self::Full),
            "prev" | "preview" => Some(Self::Preview),
            _ => None,
        }
    }
}

impl fmt::Display for ThumbnailKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => write!(f, "full"),
            Self::Preview => write!(f, "prev"),
        }
    }
}

// ---------------------------------------------------------------------------
// Gameplay
// ---------------------------------------------------------------------------

/// Gameplay metadata carried from course binaries into the metadata record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Gameplay {
    pub game_style: GameStyle,
    pub course_theme: CourseTheme,
    pub course_theme_sub: CourseTheme,
    /// Time limit in seconds.
    pub time: u16,
    pub auto_scroll: AutoScroll,
    pub auto_scroll_sub: AutoScroll,
    /// Area width in blocks.
    pub width: u16,
    pub width_sub: u16,
}

impl Default for Gameplay {
    fn default() -> Self {
        Self {
            game_style: GameStyle::default(),
            course_theme: CourseTheme::Ground,
            course_theme_sub: CourseTheme::Underground,
            time: 300,
            auto_scroll: AutoScroll::None,
            auto_scroll_sub: AutoScroll::None,
            width: 240,
            width_sub: 240,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn game_style_codes() {
        for b in 0..4 {
            let style = GameStyle::from_byte(b).unwrap();
            assert_eq!(style.as_byte(), b);
            assert_eq!(GameStyle::from_code(style.code()), Some(style));
        }
        assert_eq!(GameStyle::from_byte(4), None);
        assert_eq!(GameStyle::from_code(b"XX"), None);
    }

    #[test]
    fn theme_bytes() {
        assert_eq!(CourseTheme::from_byte(5), Some(CourseTheme::GhostHouse));
        assert_eq!(CourseTheme::from_byte(6), None);
        assert_eq!(CourseTheme::Airship.as_byte(), 3);
    }

    #[test]
    fn auto_scroll_bytes() {
        assert_eq!(AutoScroll::from_byte(3), Some(AutoScroll::Fast));
        assert_eq!(AutoScroll::from_byte(9), None);
    }

    #[test]
    fn thumbnail_segments() {
        assert_eq!(ThumbnailKind::from_segment("full"), Some(ThumbnailKind::Full));
        assert_eq!(ThumbnailKind::from_segment("prev"), Some(ThumbnailKind::Preview));
        assert_eq!(ThumbnailKind::from_segment("tiny"), None);
        assert_eq!(ThumbnailKind::Full.dimensions(), (720, 81));
        assert_eq!(ThumbnailKind::Preview.to_string(), "prev");
    }

    #[test]
    fn serde_snake_case() {
        let json = serde_json::to_string(&GameStyle::NewSuperMarioBrosU).unwrap();
        assert_eq!(json, "\"new_super_mario_bros_u\"");
        let back: CourseTheme = serde_json::from_str("\"ghost_house\"").unwrap();
        assert_eq!(back, CourseTheme::GhostHouse);
    }
}
