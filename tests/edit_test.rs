//! Integration tests for reupload, metadata edits, thumbnails, deletion and
//! stars.

mod common;

use std::io::Read;

use common::{api_key, upload_one, TestHarness};
use smm_codec::{fixtures, Course};

fn client() -> reqwest::Client {
    reqwest::Client::new()
}

#[tokio::test]
async fn reupload_replaces_title_in_record_and_binary() {
    let (h, addr) = TestHarness::with_server().await;
    let account = h.create_account("reuploader");
    let course = upload_one(addr, &account, fixtures::sample_3ds("OldTitle", "")).await;
    let id = course["id"].as_str().unwrap();

    let resp = client()
        .post(format!("http://{addr}/api/courses/reupload"))
        .header("authorization", api_key(&account))
        .header("course-id", id)
        .body(fixtures::sample_3ds("NewTitle", ""))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(updated["id"], id);
    assert_eq!(updated["title"], "NewTitle");
    assert_eq!(updated["maker"], "reuploader");
    assert_eq!(updated["v_full"], 1);
    assert_eq!(updated["v_prev"], 1);

    let gz = client()
        .get(format!("http://{addr}/api/courses/{id}/download"))
        .send()
        .await
        .unwrap()
        .bytes()
        .await
        .unwrap();
    let mut raw = Vec::new();
    flate2::read::GzDecoder::new(&gz[..]).read_to_end(&mut raw).unwrap();
    let stored = Course::decode(&raw).unwrap();
    assert_eq!(stored.title(), "NewTitle");
    assert_eq!(stored.maker(), "reuploader");
}

#[tokio::test]
async fn reupload_requires_course_id_header() {
    let (h, addr) = TestHarness::with_server().await;
    let account = h.create_account("headless");

    let resp = client()
        .post(format!("http://{addr}/api/courses/reupload"))
        .header("authorization", api_key(&account))
        .body(fixtures::sample_3ds("Whatever", ""))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert!(json["error"].as_str().unwrap().contains("course-id"));
}

#[tokio::test]
async fn reupload_rejects_multi_course_archive() {
    let (h, addr) = TestHarness::with_server().await;
    let account = h.create_account("multi");
    let course = upload_one(addr, &account, fixtures::sample_3ds("Single", "")).await;

    let resp = client()
        .post(format!("http://{addr}/api/courses/reupload"))
        .header("authorization", api_key(&account))
        .header("course-id", course["id"].as_str().unwrap())
        .body(fixtures::wiiu_zip(&["A", "B"]))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 400);
    let json: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(json["code"], "wrong_course_count");
}

#[tokio::test]
async fn update_applies_valid_fields_only() {
    let (h, addr) = TestHarness::with_server().await;
    let account = h.create_account("editor");
    let course = upload_one(addr, &account, fixtures::sample_3ds("Draft", "")).await;
    let id = course["id"].as_str().unwrap();

    let resp = client()
        .post(format!("http://{addr}/api/courses/{id}"))
        .header("authorization", api_key(&account))
        .json(&serde_json::json!({
            "title": "Final",
            "nintendoid": "ABCD-1234-EFGH-5678",
            "videoid": "bad/id?",
            "difficulty": 7,
            "description": "Jump!",
        }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    let updated: serde_json::Value = resp.json().await.unwrap();
    assert_eq!(updated["title"], "Final");
    assert_eq!(updated["nintendo_id"], "ABCD-1234-EFGH-5678");
    assert!(updated["video_id"].is_null());
    assert_eq!(updated["difficulty"], 1);
    assert_eq!(updated["description"], "Jump!");

    let view: serde_json::Value = client()
        .get(format!("http://{addr}/api/courses/{id}/download?type=json"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(view["title"], "Final");
}

#[tokio::test]
async fn thumbnail_uploads_bump_counters() {
    let (h, addr) = TestHarness::with_server().await;
    let account = h.create_account("artist");
    let course = upload_one(addr, &account, fixtures::sample_3ds("Pretty", "")).await;
    let id = course["id"].as_str().unwrap();

    let post = |kind: &'static str, body: Vec<u8>| {
        client()
            .post(format!("http://{addr}/api/courses/thumbnail/{kind}"))
            .header("authorization", api_key(&account))
            .header("course-id", id)
            .body(body)
            .send()
    };

    for _ in 0..3 {
        assert_eq!(post("full", fixtures::sample_png(1280, 144)).await.unwrap().status(), 200);
    }
    for _ in 0..2 {
        assert_eq!(post("prev", fixtures::sample_jpeg(640, 480)).await.unwrap().status(), 200);
    }

    let stored: serde_json::Value = client()
        .get(format!("http://{addr}/api/courses/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(stored["v_full"], 3);
    assert_eq!(stored["v_prev"], 2);

    let bad = post("full", b"definitely not an image".to_vec()).await.unwrap();
    assert_eq!(bad.status(), 400);
    let json: serde_json::Value = bad.json().await.unwrap();
    assert_eq!(json["code"], "wrong_mime_type");

    let unknown_kind = post("huge", fixtures::sample_png(8, 8)).await.unwrap();
    assert_eq!(unknown_kind.status(), 400);
}

#[tokio::test]
async fn only_owner_or_admin_may_edit() {
    let (h, addr) = TestHarness::with_server().await;
    let owner = h.create_account("owner");
    let stranger = h.create_account("stranger");
    let admin = h.create_admin("admin");
    let course = upload_one(addr, &owner, fixtures::sample_3ds("Mine", "")).await;
    let id = course["id"].as_str().unwrap();

    let resp = client()
        .post(format!("http://{addr}/api/courses/{id}"))
        .header("authorization", api_key(&stranger))
        .json(&serde_json::json!({ "title": "Stolen" }))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client()
        .delete(format!("http://{addr}/api/courses/{id}"))
        .header("authorization", api_key(&stranger))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 403);

    let resp = client()
        .delete(format!("http://{addr}/api/courses/{id}"))
        .header("authorization", api_key(&admin))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 200);
    assert_eq!(resp.text().await.unwrap(), "OK");

    let resp = client()
        .get(format!("http://{addr}/api/courses/{id}"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), 404);
}

#[tokio::test]
async fn star_toggles_and_counts() {
    let (h, addr) = TestHarness::with_server().await;
    let owner = h.create_account("maker");
    let fan = h.create_account("fan");
    let course = upload_one(addr, &owner, fixtures::sample_3ds("Starry", "")).await;
    let id = course["id"].as_str().unwrap();

    let star = || {
        client()
            .post(format!("http://{addr}/api/courses/{id}/star"))
            .header("authorization", api_key(&fan))
            .send()
    };

    let first: serde_json::Value = star().await.unwrap().json().await.unwrap();
    assert_eq!(first["stars"], 1);
    assert_eq!(first["starred"], true);

    let viewed: serde_json::Value = client()
        .get(format!("http://{addr}/api/courses/{id}"))
        .header("authorization", api_key(&fan))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(viewed["starred"], true);

    let second: serde_json::Value = star().await.unwrap().json().await.unwrap();
    assert_eq!(second["stars"], 0);
    assert_eq!(second["starred"], false);

    let anonymous: serde_json::Value = client()
        .get(format!("http://{addr}/api/courses/{id}"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert!(anonymous.get("starred").is_none());
}

#[tokio::test]
async fn list_filters_and_orders() {
    let (h, addr) = TestHarness::with_server().await;
    let alice = h.create_account("alice");
    let bob = h.create_account("bob");
    upload_one(addr, &alice, fixtures::sample_3ds("Banana Bridge", "")).await;
    upload_one(addr, &alice, fixtures::sample_3ds("Apple Airship", "")).await;
    upload_one(addr, &bob, fixtures::sample_3ds("Cherry Castle", "")).await;

    let by_title: Vec<serde_json::Value> = client()
        .get(format!("http://{addr}/api/courses?order=title&dir=asc"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    let titles: Vec<&str> = by_title.iter().map(|c| c["title"].as_str().unwrap()).collect();
    assert_eq!(titles, ["Apple Airship", "Banana Bridge", "Cherry Castle"]);

    let alices: Vec<serde_json::Value> = client()
        .get(format!("http://{addr}/api/courses?owner={}", alice.id))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(alices.len(), 2);

    let castles: Vec<serde_json::Value> = client()
        .get(format!("http://{addr}/api/courses?title=castle"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(castles.len(), 1);
    assert_eq!(castles[0]["maker"], "bob");

    let page: Vec<serde_json::Value> = client()
        .get(format!("http://{addr}/api/courses?order=title&dir=asc&start=1&limit=1"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(page.len(), 1);
    assert_eq!(page[0]["title"], "Banana Bridge");
}

#[tokio::test]
async fn list_filters_by_uploader_ids_and_gameplay() {
    let (h, addr) = TestHarness::with_server().await;
    let alice = h.create_account("alice");
    let bob = h.create_account("bob");
    let first = upload_one(addr, &alice, fixtures::sample_3ds("First", "")).await;
    upload_one(addr, &alice, fixtures::sample_3ds("Second", "")).await;
    let third = upload_one(addr, &bob, fixtures::sample_3ds("Third", "")).await;

    let list = |query: String| async move {
        let resp = client()
            .get(format!("http://{addr}/api/courses?{query}"))
            .send()
            .await
            .unwrap();
        (resp.status(), resp.json::<serde_json::Value>().await.unwrap())
    };

    let (status, by_uploader) = list("uploader=ALICE".into()).await;
    assert_eq!(status, 200);
    assert_eq!(by_uploader.as_array().unwrap().len(), 2);

    let (_, nobody) = list("uploader=nobody".into()).await;
    assert!(nobody.as_array().unwrap().is_empty());

    let ids = format!(
        "ids={},{}",
        first["id"].as_str().unwrap(),
        third["id"].as_str().unwrap()
    );
    let (_, picked) = list(ids).await;
    assert_eq!(picked.as_array().unwrap().len(), 2);

    let (_, classic) = list("gamestyle=0&timefrom=100".into()).await;
    assert_eq!(classic.as_array().unwrap().len(), 3);
    let (_, world) = list("gamestyle=super_mario_world".into()).await;
    assert!(world.as_array().unwrap().is_empty());

    let (_, shuffled) = list("random=1".into()).await;
    assert_eq!(shuffled.as_array().unwrap().len(), 3);

    let (status, body) = list("coursetheme=lava".into()).await;
    assert_eq!(status, 400);
    assert_eq!(body["code"], "validation_error");
}
