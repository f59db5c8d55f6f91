#![cfg(feature = "inmem-store")]

use actix_web::http::Method;
use actix_web::{test, App};
use adwall::repo::inmem::InMemRepo;
use adwall::routes::{config, AppState};
use adwall::storage::{MediaStore, MediaStoreError};
use async_trait::async_trait;
use serial_test::serial;
use std::sync::{Arc, Mutex};

// Tests use their own mock media store: records every put, never fails.
#[derive(Default)]
struct MockMediaStore {
    uploads: Mutex<Vec<(String, String, usize)>>,
}

#[async_trait]
impl MediaStore for MockMediaStore {
    async fn put(&self, key: &str, content_type: &str, bytes: &[u8]) -> Result<(), MediaStoreError> {
        self.uploads
            .lock()
            .unwrap()
            .push((key.to_string(), content_type.to_string(), bytes.len()));
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("https://cdn.test/projects/acct/bucket/{key}")
    }
}

// Unique temp data dir per test so inmem snapshots never leak between runs.
// Callers hold the returned guard so the dir lives for the whole test.
fn setup_env() -> tempfile::TempDir {
    let tmp = tempfile::tempdir().unwrap();
    std::env::set_var("ADWALL_DATA_DIR", tmp.path());
    tmp
}

fn state() -> (AppState, Arc<MockMediaStore>) {
    let media = Arc::new(MockMediaStore::default());
    let state = AppState {
        repo: Arc::new(InMemRepo::new()),
        media: media.clone(),
    };
    (state, media)
}

fn ad_body() -> serde_json::Value {
    serde_json::json!({
        "fileData": "aGVsbG8=",
        "fileName": "x.jpg",
        "fileType": "image/jpeg",
        "title": "T",
        "description": "D"
    })
}

#[actix_web::test]
#[serial]
async fn preflight_answers_with_cors_headers() {
    let _tmp = setup_env();
    let (state, _) = state();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(state))
            .configure(config),
    )
    .await;

    let req = test::TestRequest::default()
        .method(Method::OPTIONS)
        .uri("/api/v1/ads")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let headers = resp.headers().clone();
    assert_eq!(headers.get("access-control-allow-origin").unwrap(), "*");
    assert_eq!(
        headers.get("access-control-allow-methods").unwrap(),
        "GET, POST, PUT, DELETE, OPTIONS"
    );
    assert_eq!(
        headers.get("access-control-allow-headers").unwrap(),
        "Content-Type, X-User-Id"
    );
    let body = test::read_body(resp).await;
    assert!(body.is_empty());
}

#[actix_web::test]
#[serial]
async fn unsupported_method_is_rejected() {
    let _tmp = setup_env();
    let (state, _) = state();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(state))
            .configure(config),
    )
    .await;

    let req = test::TestRequest::patch().uri("/api/v1/ads").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 405);
    let v: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(v["error"], "Method not allowed");
}

#[actix_web::test]
#[serial]
async fn create_rejects_missing_fields_without_side_effects() {
    let _tmp = setup_env();
    let (state, media) = state();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(state))
            .configure(config),
    )
    .await;

    let mut body = ad_body();
    body["description"] = serde_json::json!("");
    let req = test::TestRequest::post()
        .uri("/api/v1/ads")
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let v: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(v["error"], "Missing required fields");

    // an absent field behaves like an empty one
    let mut body = ad_body();
    body.as_object_mut().unwrap().remove("fileName");
    let req = test::TestRequest::post()
        .uri("/api/v1/ads")
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    // nothing reached the blob store or the table
    assert!(media.uploads.lock().unwrap().is_empty());
    let req = test::TestRequest::get().uri("/api/v1/ads").to_request();
    let resp = test::call_service(&app, req).await;
    let ads: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(ads.as_array().unwrap().len(), 0);
}

#[actix_web::test]
#[serial]
async fn create_uploads_then_inserts() {
    let _tmp = setup_env();
    let (state, media) = state();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(state))
            .configure(config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/ads")
        .set_json(&ad_body())
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let ad: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();

    assert!(ad["id"].as_i64().unwrap() > 0);
    assert_eq!(ad["type"], "photo");
    assert_eq!(ad["views"], 0);
    assert_eq!(ad["likes"], 0);

    // url points at the CDN and keeps the original name behind the timestamp
    let url = ad["url"].as_str().unwrap();
    assert!(url.starts_with("https://cdn.test/projects/acct/bucket/ads/"));
    assert!(url.ends_with("x.jpg"));

    // the decoded payload ("hello", 5 bytes) hit the store with its MIME type
    let uploads = media.uploads.lock().unwrap();
    assert_eq!(uploads.len(), 1);
    let (key, content_type, size) = &uploads[0];
    assert!(key.starts_with("ads/"));
    assert!(key.ends_with("_x.jpg"));
    assert_eq!(content_type, "image/jpeg");
    assert_eq!(*size, 5);
}

#[actix_web::test]
#[serial]
async fn create_classifies_video_mime() {
    let _tmp = setup_env();
    let (state, _) = state();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(state))
            .configure(config),
    )
    .await;

    let mut body = ad_body();
    body["fileName"] = serde_json::json!("clip.mp4");
    body["fileType"] = serde_json::json!("video/mp4");
    let req = test::TestRequest::post()
        .uri("/api/v1/ads")
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 201);
    let ad: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(ad["type"], "video");
}

#[actix_web::test]
#[serial]
async fn create_rejects_malformed_base64() {
    let _tmp = setup_env();
    let (state, media) = state();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(state))
            .configure(config),
    )
    .await;

    let mut body = ad_body();
    body["fileData"] = serde_json::json!("!!not-base64!!");
    let req = test::TestRequest::post()
        .uri("/api/v1/ads")
        .set_json(&body)
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    assert!(media.uploads.lock().unwrap().is_empty());
}

#[actix_web::test]
#[serial]
async fn like_toggles_through_put() {
    let _tmp = setup_env();
    let (state, _) = state();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(state))
            .configure(config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/ads")
        .set_json(&ad_body())
        .to_request();
    let ad: serde_json::Value =
        serde_json::from_slice(&test::read_body(test::call_service(&app, req).await).await).unwrap();
    let id = ad["id"].as_i64().unwrap();

    let like = || {
        test::TestRequest::put()
            .uri(&format!("/api/v1/ads?action=like&id={id}"))
            .insert_header(("X-User-Id", "u1"))
            .to_request()
    };
    let resp = test::call_service(&app, like()).await;
    assert_eq!(resp.status(), 200);
    let liked: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(liked["likes"], 1);

    // identical call flips it back
    let resp = test::call_service(&app, like()).await;
    let unliked: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(unliked["likes"], 0);

    // list for u1 shows no residual flag
    let req = test::TestRequest::get()
        .uri("/api/v1/ads")
        .insert_header(("X-User-Id", "u1"))
        .to_request();
    let ads: serde_json::Value =
        serde_json::from_slice(&test::read_body(test::call_service(&app, req).await).await).unwrap();
    assert_eq!(ads[0]["user_liked"], false);
}

#[actix_web::test]
#[serial]
async fn view_records_once_per_user() {
    let _tmp = setup_env();
    let (state, _) = state();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(state))
            .configure(config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/ads")
        .set_json(&ad_body())
        .to_request();
    let ad: serde_json::Value =
        serde_json::from_slice(&test::read_body(test::call_service(&app, req).await).await).unwrap();
    let id = ad["id"].as_i64().unwrap();

    for _ in 0..2 {
        let req = test::TestRequest::put()
            .uri(&format!("/api/v1/ads?action=view&id={id}"))
            .insert_header(("X-User-Id", "u1"))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
        let viewed: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
        assert_eq!(viewed["views"], 1);
    }
}

#[actix_web::test]
#[serial]
async fn update_validates_id_and_unknown_action() {
    let _tmp = setup_env();
    let (state, _) = state();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(state))
            .configure(config),
    )
    .await;

    // id is mandatory
    let req = test::TestRequest::put()
        .uri("/api/v1/ads?action=like")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);
    let v: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(v["error"], "Missing ad id");

    // an unrecognized action mutates nothing and returns the current row
    let req = test::TestRequest::post()
        .uri("/api/v1/ads")
        .set_json(&ad_body())
        .to_request();
    let ad: serde_json::Value =
        serde_json::from_slice(&test::read_body(test::call_service(&app, req).await).await).unwrap();
    let id = ad["id"].as_i64().unwrap();

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/ads?action=boost&id={id}"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let same: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(same["likes"], 0);
    assert_eq!(same["views"], 0);
}

// Hardened from the source behavior, which answered 200 with a null body
// for an unknown id; see DESIGN.md.
#[actix_web::test]
#[serial]
async fn update_unknown_ad_is_not_found() {
    let _tmp = setup_env();
    let (state, _) = state();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(state))
            .configure(config),
    )
    .await;

    let req = test::TestRequest::put()
        .uri("/api/v1/ads?action=like&id=999")
        .insert_header(("X-User-Id", "u1"))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 404);
}

#[actix_web::test]
#[serial]
async fn delete_requires_id_but_not_existence() {
    let _tmp = setup_env();
    let (state, _) = state();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(state))
            .configure(config),
    )
    .await;

    let req = test::TestRequest::delete().uri("/api/v1/ads").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 400);

    // acknowledged even though nothing existed under that id
    let req = test::TestRequest::delete()
        .uri("/api/v1/ads?id=12345")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status(), 200);
    let v: serde_json::Value = serde_json::from_slice(&test::read_body(resp).await).unwrap();
    assert_eq!(v["success"], true);
}

#[actix_web::test]
#[serial]
async fn list_without_user_header_shows_no_flags() {
    let _tmp = setup_env();
    let (state, _) = state();
    let app = test::init_service(
        App::new()
            .app_data(actix_web::web::Data::new(state))
            .configure(config),
    )
    .await;

    let req = test::TestRequest::post()
        .uri("/api/v1/ads")
        .set_json(&ad_body())
        .to_request();
    let ad: serde_json::Value =
        serde_json::from_slice(&test::read_body(test::call_service(&app, req).await).await).unwrap();
    let id = ad["id"].as_i64().unwrap();

    let req = test::TestRequest::put()
        .uri(&format!("/api/v1/ads?action=like&id={id}"))
        .insert_header(("X-User-Id", "u1"))
        .to_request();
    test::call_service(&app, req).await;

    // anonymous listing: counters visible, per-user flags all false
    let req = test::TestRequest::get().uri("/api/v1/ads").to_request();
    let ads: serde_json::Value =
        serde_json::from_slice(&test::read_body(test::call_service(&app, req).await).await).unwrap();
    assert_eq!(ads[0]["likes"], 1);
    assert_eq!(ads[0]["user_liked"], false);
    assert_eq!(ads[0]["user_viewed"], false);
}
