//! Plain structured view of a course for JSON delivery.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;
use smm_core::{Gameplay, ThumbnailKind};

use crate::course::{Course, Sound, Tile};

/// JSON-friendly rendering of every decoded field. Thumbnails are base64.
#[derive(Debug, Clone, Serialize)]
pub struct CourseView {
    pub title: String,
    pub maker: String,
    pub modified: i64,
    #[serde(flatten)]
    pub gameplay: Gameplay,
    pub thumbnail: String,
    pub thumbnail_preview: String,
    pub tiles: Vec<Tile>,
    pub tiles_sub: Vec<Tile>,
    pub sounds: Vec<Sound>,
    pub sounds_sub: Vec<Sound>,
}

impl From<&Course> for CourseView {
    fn from(course: &Course) -> Self {
        Self {
            title: course.title().to_string(),
            maker: course.maker().to_string(),
            modified: course.modified(),
            gameplay: course.gameplay,
            thumbnail: STANDARD.encode(course.thumbnail(ThumbnailKind::Full)),
            thumbnail_preview: STANDARD.encode(course.thumbnail(ThumbnailKind::Preview)),
            tiles: course.level.tiles.clone(),
            tiles_sub: course.level.tiles_sub.clone(),
            sounds: course.level.sounds.clone(),
            sounds_sub: course.level.sounds_sub.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;

    #[test]
    fn view_flattens_gameplay() {
        let course = fixtures::sample_course("View", "maker");
        let json = serde_json::to_value(CourseView::from(&course)).unwrap();
        assert_eq!(json["title"], "View");
        assert_eq!(json["game_style"], "super_mario_bros");
        assert_eq!(json["time"], 300);
        assert!(json["tiles"].as_array().unwrap().len() > 0);
        let thumb = STANDARD.decode(json["thumbnail"].as_str().unwrap()).unwrap();
        assert_eq!(thumb, course.thumbnail(ThumbnailKind::Full));
    }
}
