//! End-to-end tests driving the router: authentication, the permission
//! matrix, and the catalog/blob coordination visible through the HTTP
//! surface.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use bucket_api::{
    routes::routes::routes,
    services::{key_registry::KeyRegistry, storage_service::StorageService},
    state::AppState,
};
use http_body_util::BodyExt;
use sqlx::sqlite::SqlitePoolOptions;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

const OWNER_KEY: &str = "fc68ccbb-086d-4e0f-8f65-3a4294f5a7b0";
const VIEWER_KEY: &str = "a47eba90-eca4-4a73-9bf1-d5461b28e3f0";
const BOUNDARY: &str = "test-boundary-7f9a";

async fn app() -> (Router, TempDir) {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .unwrap();
    for stmt in include_str!("../migrations/0001_init.sql")
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
    {
        sqlx::query(stmt).execute(&pool).await.unwrap();
    }

    let keys = serde_json::from_str(&format!(
        r#"[
            {{"key": "{OWNER_KEY}", "owner": "Owner", "active": true,
              "buckets": [{{"name": "oreka", "all": true}}]}},
            {{"key": "{VIEWER_KEY}", "owner": "Viewer", "active": true,
              "buckets": [{{"name": "oreka", "view": true}}]}}
        ]"#
    ))
    .unwrap();

    let dir = tempfile::tempdir().unwrap();
    let state = AppState {
        storage: StorageService::new(Arc::new(pool), dir.path()),
        keys: Arc::new(KeyRegistry::from_keys(keys)),
    };
    (routes().with_state(state), dir)
}

fn multipart_body(files: &[(&str, &[u8])]) -> Vec<u8> {
    let mut body = Vec::new();
    for (name, content) in files {
        body.extend_from_slice(
            format!(
                "--{BOUNDARY}\r\nContent-Disposition: form-data; \
                 name=\"files\"; filename=\"{name}\"\r\n\
                 Content-Type: application/octet-stream\r\n\r\n"
            )
            .as_bytes(),
        );
        body.extend_from_slice(content);
        body.extend_from_slice(b"\r\n");
    }
    body.extend_from_slice(format!("--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn multipart_request(method: &str, uri: &str, key: &str, files: &[(&str, &[u8])]) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("x-api-key", key)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(multipart_body(files)))
        .unwrap()
}

fn json_request(method: &str, uri: &str, key: Option<&str>, body: serde_json::Value) -> Request<Body> {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json");
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::from(body.to_string())).unwrap()
}

fn bare_request(method: &str, uri: &str, key: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(key) = key {
        builder = builder.header("x-api-key", key);
    }
    builder.body(Body::empty()).unwrap()
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Vec<u8>) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body.to_vec())
}

async fn send_json(app: &Router, request: Request<Body>) -> (StatusCode, serde_json::Value) {
    let (status, body) = send(app, request).await;
    let value = serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null);
    (status, value)
}

async fn create_bucket(app: &Router, id: &str) {
    let (status, _) = send(app, bare_request("POST", &format!("/bucket/{id}"), None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn bucket_create_conflicts_on_duplicate() {
    let (app, _dir) = app().await;
    create_bucket(&app, "oreka").await;

    let (status, body) = send_json(&app, bare_request("POST", "/bucket/oreka", None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert!(body["message"].is_string());
}

#[tokio::test]
async fn missing_and_invalid_keys_are_unauthorized() {
    let (app, _dir) = app().await;
    create_bucket(&app, "oreka").await;

    let (status, body) = send_json(
        &app,
        multipart_request("POST", "/storage/oreka/upload", "", &[("a.txt", b"x")]),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or missing API key");

    let (status, body) = send_json(
        &app,
        multipart_request("POST", "/storage/oreka/upload", "bogus", &[("a.txt", b"x")]),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["message"], "Invalid or inactive API key");
}

#[tokio::test]
async fn unknown_bucket_is_not_found_before_permission_and_payload_checks() {
    let (app, _dir) = app().await;

    // The owner key has no grant on `ghost` either, but existence is
    // evaluated first, and no payload validation runs at all.
    let (status, _) = send_json(
        &app,
        multipart_request("POST", "/storage/ghost/upload", OWNER_KEY, &[]),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, bare_request("DELETE", "/storage/ghost", Some(OWNER_KEY))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send_json(&app, bare_request("GET", "/bucket/ghost", Some(OWNER_KEY))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn view_only_key_is_forbidden_everything_but_view() {
    let (app, _dir) = app().await;
    create_bucket(&app, "oreka").await;

    let (status, _) = send_json(&app, bare_request("GET", "/bucket/oreka", Some(VIEWER_KEY))).await;
    assert_eq!(status, StatusCode::OK);

    let forbidden = [
        multipart_request("POST", "/storage/oreka/upload", VIEWER_KEY, &[("a.txt", b"x")]),
        multipart_request("PUT", "/storage/oreka/some-file", VIEWER_KEY, &[("a.txt", b"x")]),
        json_request(
            "DELETE",
            "/storage/oreka",
            Some(VIEWER_KEY),
            serde_json::json!({"filenames": ["f"]}),
        ),
        json_request(
            "PUT",
            "/bucket/oreka",
            Some(VIEWER_KEY),
            serde_json::json!({"newId": "oreka2"}),
        ),
        bare_request("DELETE", "/bucket/oreka", Some(VIEWER_KEY)),
    ];
    for request in forbidden {
        let uri = request.uri().clone();
        let method = request.method().clone();
        let (status, body) = send_json(&app, request).await;
        assert_eq!(status, StatusCode::FORBIDDEN, "{method} {uri}");
        assert!(
            body["message"]
                .as_str()
                .unwrap()
                .starts_with("Access denied"),
            "{method} {uri}: {body}"
        );
    }
}

#[tokio::test]
async fn upload_then_fetch_returns_identical_bytes() {
    let (app, _dir) = app().await;
    create_bucket(&app, "oreka").await;

    let (status, body) = send_json(
        &app,
        multipart_request(
            "POST",
            "/storage/oreka/upload",
            OWNER_KEY,
            &[("a.txt", b"first file"), ("b.bin", &[0u8, 1, 2, 255])],
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Uploaded 2 files to bucket");

    let files = body["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    let uri_a = files[0]["uri"].as_str().unwrap();
    let uri_b = files[1]["uri"].as_str().unwrap();
    assert_ne!(uri_a, uri_b, "generated storage names must be distinct");
    assert_eq!(files[0]["original"], "a.txt");
    assert_eq!(files[0]["size"], 10);

    let (status, bytes) = send(&app, bare_request("GET", uri_a, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"first file");

    let (status, bytes) = send(&app, bare_request("GET", uri_b, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, vec![0u8, 1, 2, 255]);
}

#[tokio::test]
async fn upload_with_no_files_is_bad_request() {
    let (app, _dir) = app().await;
    create_bucket(&app, "oreka").await;

    let (status, body) = send_json(
        &app,
        multipart_request("POST", "/storage/oreka/upload", OWNER_KEY, &[]),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No files were sent");
}

#[tokio::test]
async fn update_moves_the_uri_and_retires_the_old_one() {
    let (app, _dir) = app().await;
    create_bucket(&app, "oreka").await;

    let (_, body) = send_json(
        &app,
        multipart_request("POST", "/storage/oreka/upload", OWNER_KEY, &[("a.txt", b"old")]),
    )
    .await;
    let old_uri = body["files"][0]["uri"].as_str().unwrap().to_string();

    let (status, body) = send_json(
        &app,
        multipart_request("PUT", &old_uri, OWNER_KEY, &[("a2.txt", b"new content")]),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let new_uri = body["uri"].as_str().unwrap().to_string();
    assert_ne!(new_uri, old_uri);
    assert_eq!(body["size"], 11);

    let (status, bytes) = send(&app, bare_request("GET", &new_uri, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"new content");

    let (status, _) = send(&app, bare_request("GET", &old_uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_of_unknown_file_is_not_found() {
    let (app, _dir) = app().await;
    create_bucket(&app, "oreka").await;

    let (status, body) = send_json(
        &app,
        multipart_request("PUT", "/storage/oreka/nope.txt", OWNER_KEY, &[("a.txt", b"x")]),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["message"], "Requested file does not exist");
}

#[tokio::test]
async fn delete_batch_aborts_when_any_file_is_missing() {
    let (app, _dir) = app().await;
    create_bucket(&app, "oreka").await;

    let (_, body) = send_json(
        &app,
        multipart_request(
            "POST",
            "/storage/oreka/upload",
            OWNER_KEY,
            &[("a.txt", b"a"), ("b.txt", b"b")],
        ),
    )
    .await;
    let uri_a = body["files"][0]["uri"].as_str().unwrap().to_string();
    let name_a = uri_a.rsplit('/').next().unwrap().to_string();

    let (status, body) = send_json(
        &app,
        json_request(
            "DELETE",
            "/storage/oreka",
            Some(OWNER_KEY),
            serde_json::json!({"filenames": [name_a, "ghost"]}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "File not found: ghost");

    // Nothing was deleted.
    let (status, _) = send(&app, bare_request("GET", &uri_a, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn delete_batch_removes_files_and_reports_them() {
    let (app, _dir) = app().await;
    create_bucket(&app, "oreka").await;

    let (_, body) = send_json(
        &app,
        multipart_request(
            "POST",
            "/storage/oreka/upload",
            OWNER_KEY,
            &[("a.txt", b"a"), ("b.txt", b"b")],
        ),
    )
    .await;
    let names: Vec<String> = body["files"]
        .as_array()
        .unwrap()
        .iter()
        .map(|f| {
            f["uri"]
                .as_str()
                .unwrap()
                .rsplit('/')
                .next()
                .unwrap()
                .to_string()
        })
        .collect();

    let (status, body) = send_json(
        &app,
        json_request(
            "DELETE",
            "/storage/oreka",
            Some(OWNER_KEY),
            serde_json::json!({"filenames": names}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["deleted"].as_array().unwrap().len(), 2);

    for name in body["deleted"].as_array().unwrap() {
        let uri = format!("/storage/oreka/{}", name.as_str().unwrap());
        let (status, _) = send(&app, bare_request("GET", &uri, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
}

#[tokio::test]
async fn delete_without_filenames_is_bad_request() {
    let (app, _dir) = app().await;
    create_bucket(&app, "oreka").await;

    let (status, body) =
        send_json(&app, bare_request("DELETE", "/storage/oreka", Some(OWNER_KEY))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "No filenames provided");
}

#[tokio::test]
async fn stats_report_on_disk_listing() {
    let (app, _dir) = app().await;
    create_bucket(&app, "oreka").await;

    // Before any upload the directory does not exist yet; the bucket
    // still reads as empty rather than erroring.
    let (status, body) = send_json(&app, bare_request("GET", "/bucket/oreka", Some(OWNER_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["fileCount"], 0);
    assert_eq!(body["totalSize"], 0);

    send_json(
        &app,
        multipart_request(
            "POST",
            "/storage/oreka/upload",
            OWNER_KEY,
            &[("a.txt", b"aaa"), ("b.txt", b"bb")],
        ),
    )
    .await;

    let (status, body) = send_json(&app, bare_request("GET", "/bucket/oreka", Some(OWNER_KEY))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bucketId"], "oreka");
    assert_eq!(body["fileCount"], 2);
    assert_eq!(body["totalSize"], 5);
    assert_eq!(body["files"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn rename_relocates_objects_and_retires_the_old_id() {
    let (app, _dir) = app().await;
    create_bucket(&app, "oreka").await;

    let (_, body) = send_json(
        &app,
        multipart_request("POST", "/storage/oreka/upload", OWNER_KEY, &[("a.txt", b"abc")]),
    )
    .await;
    let old_uri = body["files"][0]["uri"].as_str().unwrap().to_string();
    let filename = old_uri.rsplit('/').next().unwrap().to_string();

    let (status, body) = send_json(
        &app,
        json_request(
            "PUT",
            "/bucket/oreka",
            Some(OWNER_KEY),
            serde_json::json!({"newId": "pantry"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["bucketId"], "pantry");

    let (status, bytes) = send(
        &app,
        bare_request("GET", &format!("/storage/pantry/{filename}"), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(bytes, b"abc");

    // The old identifier no longer resolves anywhere.
    let (status, _) = send(&app, bare_request("GET", &old_uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send_json(&app, bare_request("GET", "/bucket/oreka", Some(OWNER_KEY))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn rename_requires_new_id_and_a_free_target() {
    let (app, _dir) = app().await;
    create_bucket(&app, "oreka").await;
    create_bucket(&app, "pantry").await;

    let (status, body) = send_json(
        &app,
        json_request("PUT", "/bucket/oreka", Some(OWNER_KEY), serde_json::json!({})),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["message"], "newId is required");

    let (status, _) = send_json(
        &app,
        json_request(
            "PUT",
            "/bucket/oreka",
            Some(OWNER_KEY),
            serde_json::json!({"newId": "pantry"}),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn drop_removes_bucket_and_objects() {
    let (app, _dir) = app().await;
    create_bucket(&app, "oreka").await;

    let (_, body) = send_json(
        &app,
        multipart_request("POST", "/storage/oreka/upload", OWNER_KEY, &[("a.txt", b"abc")]),
    )
    .await;
    let uri = body["files"][0]["uri"].as_str().unwrap().to_string();

    let (status, _) = send_json(&app, bare_request("DELETE", "/bucket/oreka", Some(OWNER_KEY))).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, bare_request("GET", &uri, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send_json(&app, bare_request("DELETE", "/bucket/oreka", Some(OWNER_KEY))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn traversal_attempts_stay_inside_the_storage_root() {
    let (app, dir) = app().await;
    create_bucket(&app, "oreka").await;
    send_json(
        &app,
        multipart_request("POST", "/storage/oreka/upload", OWNER_KEY, &[("a.txt", b"x")]),
    )
    .await;

    // A bucket id full of traversal characters sanitizes to a plain
    // identifier; nothing outside the root is ever addressed.
    let (status, _) = send(
        &app,
        bare_request("GET", "/storage/..%2F..%2Foreka/whatever", None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let escaped = dir.path().parent().unwrap().join("escaped");
    assert!(!escaped.exists());
}

#[tokio::test]
async fn health_endpoints_respond() {
    let (app, _dir) = app().await;

    let (status, _) = send(&app, bare_request("GET", "/healthz", None)).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send_json(&app, bare_request("GET", "/readyz", None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
