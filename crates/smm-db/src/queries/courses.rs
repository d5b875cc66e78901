//! Course record CRUD and listing.

use rusqlite::Connection;
use serde::Deserialize;
use smm_core::{AccountId, AutoScroll, CourseId, CourseTheme, Error, GameStyle, Result};

use crate::models::Course;

/// Column list used in SELECT statements.
const COLS: &str = "id, owner, title, maker, nintendo_id, video_id, description,
    difficulty, uploaded, lastmodified, game_style, course_theme, course_theme_sub,
    time, auto_scroll, auto_scroll_sub, width, width_sub, v_full, v_prev, stars";

/// Hard cap on page size for [`list_courses`].
pub const MAX_LIMIT: i64 = 120;

/// Sort key for course listings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseOrder {
    #[default]
    LastModified,
    Uploaded,
    Title,
    Stars,
}

impl CourseOrder {
    fn column(self) -> &'static str {
        match self {
            Self::LastModified => "lastmodified",
            Self::Uploaded => "uploaded",
            Self::Title => "title COLLATE NOCASE",
            Self::Stars => "stars",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDir {
    Asc,
    #[default]
    Desc,
}

/// Inclusive bounds; either side may be open.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Range {
    pub from: Option<i64>,
    pub to: Option<i64>,
}

impl Range {
    pub fn new(from: Option<i64>, to: Option<i64>) -> Self {
        Self { from, to }
    }
}

/// Filters and paging for [`list_courses`].
#[derive(Debug, Clone, Default)]
pub struct CourseFilter {
    /// Restrict to these courses. Empty means no restriction.
    pub ids: Vec<CourseId>,
    pub owner: Option<AccountId>,
    /// Username of the owner, matched case-insensitively. An unknown name
    /// matches nothing.
    pub uploader: Option<String>,
    /// Case-insensitive substring match.
    pub title: Option<String>,
    /// Case-insensitive substring match.
    pub maker: Option<String>,
    pub difficulty: Range,
    pub uploaded: Range,
    pub lastmodified: Range,
    pub game_style: Option<GameStyle>,
    pub course_theme: Option<CourseTheme>,
    pub course_theme_sub: Option<CourseTheme>,
    pub time: Range,
    pub auto_scroll: Option<AutoScroll>,
    pub auto_scroll_sub: Option<AutoScroll>,
    pub width: Range,
    pub width_sub: Range,
    pub order: CourseOrder,
    pub dir: SortDir,
    /// Shuffle the matches instead of sorting them.
    pub random: bool,
    pub start: i64,
    /// Clamped to `1..=MAX_LIMIT`; 0 means the maximum.
    pub limit: i64,
}

/// WHERE clause builder with numbered parameters.
struct Clauses {
    sql: String,
    params: Vec<Box<dyn rusqlite::types::ToSql>>,
}

impl Clauses {
    fn push(&mut self, fragment: &str, value: impl rusqlite::types::ToSql + 'static) {
        self.params.push(Box::new(value));
        self.sql.push_str(&fragment.replace('?', &format!("?{}", self.params.len())));
    }

    fn eq(&mut self, column: &str, value: Option<u8>) {
        if let Some(v) = value {
            self.push(&format!(" AND {column} = ?"), v);
        }
    }

    fn range(&mut self, column: &str, range: Range) {
        if let Some(from) = range.from {
            self.push(&format!(" AND {column} >= ?"), from);
        }
        if let Some(to) = range.to {
            self.push(&format!(" AND {column} <= ?"), to);
        }
    }
}

/// Insert a new course record.
pub fn insert_course(conn: &Connection, course: &Course) -> Result<()> {
    let g = &course.gameplay;
    conn.execute(
        "INSERT INTO courses (id, owner, title, maker, nintendo_id, video_id, description,
            difficulty, uploaded, lastmodified, game_style, course_theme, course_theme_sub,
            time, auto_scroll, auto_scroll_sub, width, width_sub, v_full, v_prev, stars)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21)",
        rusqlite::params![
            course.id.to_string(),
            course.owner.to_string(),
            course.title,
            course.maker,
            course.nintendo_id,
            course.video_id,
            course.description,
            course.difficulty,
            course.uploaded,
            course.lastmodified,
            g.game_style.as_byte(),
            g.course_theme.as_byte(),
            g.course_theme_sub.as_byte(),
            g.time,
            g.auto_scroll.as_byte(),
            g.auto_scroll_sub.as_byte(),
            g.width,
            g.width_sub,
            course.v_full,
            course.v_prev,
            course.stars,
        ],
    )
    .map_err(|e| Error::database(e.to_string()))?;
    Ok(())
}

/// Get a course record by ID.
pub fn get_course(conn: &Connection, id: CourseId) -> Result<Option<Course>> {
    let q = format!("SELECT {COLS} FROM courses WHERE id = ?1");
    match conn.query_row(&q, [id.to_string()], Course::from_row) {
        Ok(c) => Ok(Some(c)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(Error::database(e.to_string())),
    }
}

/// Overwrite the mutable metadata of a course. `owner`, `uploaded` and
/// `stars` are never touched here.
pub fn update_course(conn: &Connection, course: &Course) -> Result<bool> {
    let g = &course.gameplay;
    let n = conn
        .execute(
            "UPDATE courses SET title=?1, maker=?2, nintendo_id=?3, video_id=?4,
                description=?5, difficulty=?6, lastmodified=?7, game_style=?8,
                course_theme=?9, course_theme_sub=?10, time=?11, auto_scroll=?12,
                auto_scroll_sub=?13, width=?14, width_sub=?15, v_full=?16, v_prev=?17
             WHERE id=?18",
            rusqlite::params![
                course.title,
                course.maker,
                course.nintendo_id,
                course.video_id,
                course.description,
                course.difficulty,
                course.lastmodified,
                g.game_style.as_byte(),
                g.course_theme.as_byte(),
                g.course_theme_sub.as_byte(),
                g.time,
                g.auto_scroll.as_byte(),
                g.auto_scroll_sub.as_byte(),
                g.width,
                g.width_sub,
                course.v_full,
                course.v_prev,
                course.id.to_string(),
            ],
        )
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// Delete a course. Artifacts and stars cascade.
pub fn delete_course(conn: &Connection, id: CourseId) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM courses WHERE id = ?1", [id.to_string()])
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(n > 0)
}

/// List courses matching `filter`.
pub fn list_courses(conn: &Connection, filter: &CourseFilter) -> Result<Vec<Course>> {
    let mut w = Clauses {
        sql: format!("SELECT {COLS} FROM courses WHERE 1=1"),
        params: Vec::new(),
    };

    if !filter.ids.is_empty() {
        let mut list = Vec::with_capacity(filter.ids.len());
        for id in &filter.ids {
            w.params.push(Box::new(id.to_string()));
            list.push(format!("?{}", w.params.len()));
        }
        w.sql.push_str(&format!(" AND id IN ({})", list.join(",")));
    }
    if let Some(owner) = filter.owner {
        w.push(" AND owner = ?", owner.to_string());
    }
    if let Some(ref uploader) = filter.uploader {
        w.push(
            " AND owner IN (SELECT id FROM accounts WHERE username = ? COLLATE NOCASE)",
            uploader.clone(),
        );
    }
    if let Some(ref title) = filter.title {
        w.push(" AND title LIKE ? ESCAPE '\\'", format!("%{}%", escape_like(title)));
    }
    if let Some(ref maker) = filter.maker {
        w.push(" AND maker LIKE ? ESCAPE '\\'", format!("%{}%", escape_like(maker)));
    }
    w.range("difficulty", filter.difficulty);
    w.range("uploaded", filter.uploaded);
    w.range("lastmodified", filter.lastmodified);
    w.eq("game_style", filter.game_style.map(GameStyle::as_byte));
    w.eq("course_theme", filter.course_theme.map(CourseTheme::as_byte));
    w.eq("course_theme_sub", filter.course_theme_sub.map(CourseTheme::as_byte));
    w.range("time", filter.time);
    w.eq("auto_scroll", filter.auto_scroll.map(AutoScroll::as_byte));
    w.eq("auto_scroll_sub", filter.auto_scroll_sub.map(AutoScroll::as_byte));
    w.range("width", filter.width);
    w.range("width_sub", filter.width_sub);

    let limit = if filter.limit <= 0 {
        MAX_LIMIT
    } else {
        filter.limit.min(MAX_LIMIT)
    };
    if filter.random {
        w.sql.push_str(" ORDER BY RANDOM()");
    } else {
        let dir = match filter.dir {
            SortDir::Asc => "ASC",
            SortDir::Desc => "DESC",
        };
        w.sql.push_str(&format!(" ORDER BY {} {dir}, id ASC", filter.order.column()));
    }
    w.push(" LIMIT ?", limit);
    w.push(" OFFSET ?", filter.start.max(0));

    let params_refs: Vec<&dyn rusqlite::types::ToSql> = w.params.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&w.sql).map_err(|e| Error::database(e.to_string()))?;
    let rows = stmt
        .query_map(params_refs.as_slice(), Course::from_row)
        .map_err(|e| Error::database(e.to_string()))?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::database(e.to_string()))?;
    Ok(rows)
}

fn escape_like(s: &str) -> String {
    s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::init_memory_pool;
    use crate::queries::accounts;
    use smm_core::Gameplay;

    fn sample(owner: AccountId, title: &str, difficulty: u8, lastmodified: i64) -> Course {
        Course {
            id: CourseId::new(),
            owner,
            title: title.to_string(),
            maker: "maker".into(),
            nintendo_id: None,
            video_id: None,
            description: None,
            difficulty,
            uploaded: 1_600_000_000,
            lastmodified,
            gameplay: Gameplay::default(),
            v_full: 0,
            v_prev: 0,
            stars: 0,
        }
    }

    fn setup() -> (crate::PooledConnection, AccountId) {
        let pool = init_memory_pool().unwrap();
        let conn = pool.get().unwrap();
        let owner = accounts::create_account(&conn, "owner", 0).unwrap().id;
        (conn, owner)
    }

    #[test]
    fn insert_get_update_delete() {
        let (conn, owner) = setup();
        let mut course = sample(owner, "Original", 1, 100);
        insert_course(&conn, &course).unwrap();
        assert_eq!(get_course(&conn, course.id).unwrap().unwrap(), course);

        course.title = "Renamed".into();
        course.nintendo_id = Some("ABCD-0000-1111-2222".into());
        course.v_full = 2;
        assert!(update_course(&conn, &course).unwrap());
        let stored = get_course(&conn, course.id).unwrap().unwrap();
        assert_eq!(stored.title, "Renamed");
        assert_eq!(stored.v_full, 2);

        assert!(delete_course(&conn, course.id).unwrap());
        assert!(get_course(&conn, course.id).unwrap().is_none());
        assert!(!delete_course(&conn, course.id).unwrap());
    }

    #[test]
    fn update_missing_course() {
        let (conn, owner) = setup();
        assert!(!update_course(&conn, &sample(owner, "Ghost", 1, 0)).unwrap());
    }

    #[test]
    fn list_filters_and_orders() {
        let (conn, owner) = setup();
        let other = accounts::create_account(&conn, "other", 0).unwrap().id;
        insert_course(&conn, &sample(owner, "Castle Run", 0, 300)).unwrap();
        insert_course(&conn, &sample(owner, "Sky Castle", 2, 100)).unwrap();
        insert_course(&conn, &sample(other, "Underwater", 3, 200)).unwrap();

        let all = list_courses(&conn, &CourseFilter::default()).unwrap();
        let titles: Vec<_> = all.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, ["Castle Run", "Underwater", "Sky Castle"]);

        let castles = list_courses(
            &conn,
            &CourseFilter {
                title: Some("castle".into()),
                order: CourseOrder::Title,
                dir: SortDir::Asc,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(castles.len(), 2);
        assert_eq!(castles[0].title, "Castle Run");

        let mine = list_courses(
            &conn,
            &CourseFilter {
                owner: Some(other),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(mine.len(), 1);

        let hard = list_courses(
            &conn,
            &CourseFilter {
                difficulty: Range::new(Some(2), Some(3)),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(hard.len(), 2);
    }

    #[test]
    fn list_filters_on_gameplay_and_identity() {
        let (conn, owner) = setup();
        let other = accounts::create_account(&conn, "Luigi", 0).unwrap().id;

        let mut castle = sample(owner, "Castle", 1, 100);
        castle.gameplay.game_style = GameStyle::SuperMarioWorld;
        castle.gameplay.course_theme = CourseTheme::Castle;
        castle.gameplay.time = 500;
        castle.gameplay.auto_scroll = AutoScroll::Fast;
        castle.uploaded = 1_700_000_000;
        let mut airship = sample(other, "Airship", 2, 200);
        airship.gameplay.course_theme_sub = CourseTheme::Airship;
        airship.gameplay.width = 100;
        airship.gameplay.width_sub = 50;
        let plain = sample(owner, "Plain", 1, 300);
        for course in [&castle, &airship, &plain] {
            insert_course(&conn, course).unwrap();
        }

        let titles = |filter: CourseFilter| -> Vec<String> {
            let mut found: Vec<String> = list_courses(&conn, &filter)
                .unwrap()
                .into_iter()
                .map(|c| c.title)
                .collect();
            found.sort();
            found
        };

        assert_eq!(
            titles(CourseFilter {
                uploader: Some("luigi".into()),
                ..Default::default()
            }),
            ["Airship"]
        );
        assert!(titles(CourseFilter {
            uploader: Some("nobody".into()),
            ..Default::default()
        })
        .is_empty());
        assert_eq!(
            titles(CourseFilter {
                ids: vec![castle.id, plain.id],
                ..Default::default()
            }),
            ["Castle", "Plain"]
        );
        assert_eq!(
            titles(CourseFilter {
                game_style: Some(GameStyle::SuperMarioWorld),
                course_theme: Some(CourseTheme::Castle),
                auto_scroll: Some(AutoScroll::Fast),
                ..Default::default()
            }),
            ["Castle"]
        );
        assert_eq!(
            titles(CourseFilter {
                course_theme_sub: Some(CourseTheme::Airship),
                ..Default::default()
            }),
            ["Airship"]
        );
        assert_eq!(
            titles(CourseFilter {
                time: Range::new(Some(400), None),
                ..Default::default()
            }),
            ["Castle"]
        );
        assert_eq!(
            titles(CourseFilter {
                width: Range::new(None, Some(150)),
                width_sub: Range::new(Some(50), Some(50)),
                ..Default::default()
            }),
            ["Airship"]
        );
        assert_eq!(
            titles(CourseFilter {
                lastmodified: Range::new(Some(150), Some(300)),
                ..Default::default()
            }),
            ["Airship", "Plain"]
        );
        assert_eq!(
            titles(CourseFilter {
                uploaded: Range::new(Some(1_650_000_000), None),
                ..Default::default()
            }),
            ["Castle"]
        );
        assert_eq!(
            titles(CourseFilter {
                random: true,
                ..Default::default()
            }),
            ["Airship", "Castle", "Plain"]
        );
    }

    #[test]
    fn list_paging_is_capped() {
        let (conn, owner) = setup();
        for i in 0..5 {
            insert_course(&conn, &sample(owner, &format!("C{i}"), 1, i)).unwrap();
        }
        let page = list_courses(
            &conn,
            &CourseFilter {
                start: 1,
                limit: 2,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].title, "C3");

        let huge = list_courses(
            &conn,
            &CourseFilter {
                limit: 10_000,
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(huge.len(), 5);
    }

    #[test]
    fn like_wildcards_are_literal() {
        let (conn, owner) = setup();
        insert_course(&conn, &sample(owner, "100% run", 1, 0)).unwrap();
        insert_course(&conn, &sample(owner, "1000 coins", 1, 0)).unwrap();
        let hits = list_courses(
            &conn,
            &CourseFilter {
                title: Some("100%".into()),
                ..Default::default()
            },
        )
        .unwrap();
        assert_eq!(hits.len(), 1);
    }
}
