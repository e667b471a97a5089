//! Web API File Tests
//!
//! Integration tests for upload, download, delete, list and details.

mod common;

use std::sync::atomic::Ordering;

use axum::http::header::{AUTHORIZATION, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::StatusCode;
use axum_test::multipart::{MultipartForm, Part};
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use serde_json::Value;

use common::{bearer, create_test_app, login, TestApp};
use megagate::{FileRecord, NodeAttributes, NodeKind};

async fn app_with_token() -> (TestApp, String) {
    let app = create_test_app();
    let token = login(&app.server).await;
    (app, token)
}

fn text_file(name: &str, content: &str) -> MultipartForm {
    MultipartForm::new().add_part(
        "file",
        Part::bytes(content.as_bytes().to_vec())
            .file_name(name)
            .mime_type("text/plain"),
    )
}

fn staging_is_empty(app: &TestApp) -> bool {
    std::fs::read_dir(app.staging.path())
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(true)
}

// ============================================================================
// List
// ============================================================================

#[tokio::test]
async fn test_list_empty() {
    let (app, token) = app_with_token().await;

    let response = app
        .server
        .get("/list")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_list_files_and_folders() {
    let (app, token) = app_with_token().await;
    let encoded = URL_SAFE_NO_PAD.encode(br#"MEGA{"n":"Encoded folder"}"#);

    app.storage
        .insert("f1", FileRecord::file("b-report.pdf", 1234), b"pdf");
    app.storage.insert("d1", FileRecord::folder("a-docs"), b"");
    app.storage.insert(
        "d2",
        FileRecord {
            attributes: NodeAttributes::Encoded(encoded),
            size: None,
            kind: NodeKind::Folder,
        },
        b"",
    );
    // Provider-internal nodes and unnamed nodes are not listed
    app.storage.insert(
        "root",
        FileRecord {
            attributes: NodeAttributes::default(),
            size: None,
            kind: NodeKind::Other(2),
        },
        b"",
    );
    app.storage.insert(
        "bad",
        FileRecord {
            attributes: NodeAttributes::Encoded("@@corrupt@@".to_string()),
            size: Some(1),
            kind: NodeKind::File,
        },
        b"",
    );

    let response = app
        .server
        .get("/list")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let files = body["data"].as_array().unwrap();
    assert_eq!(files.len(), 3);

    assert_eq!(files[0]["key"], "d2");
    assert_eq!(files[0]["name"], "Encoded folder");
    assert_eq!(files[0]["type"], "Folder");

    assert_eq!(files[1]["key"], "d1");
    assert_eq!(files[1]["name"], "a-docs");
    assert_eq!(files[1]["size"], Value::Null);

    assert_eq!(files[2]["key"], "f1");
    assert_eq!(files[2]["name"], "b-report.pdf");
    assert_eq!(files[2]["size"], 1234);
    assert_eq!(files[2]["type"], "File");
}

#[tokio::test]
async fn test_list_always_asks_remote_and_leaves_cache_alone() {
    let (app, token) = app_with_token().await;
    app.storage.insert("f1", FileRecord::file("a.txt", 1), b"a");

    for _ in 0..2 {
        app.server
            .get("/list")
            .add_header(AUTHORIZATION, bearer(&token))
            .await
            .assert_status_ok();
    }

    assert_eq!(app.storage.list_calls(), 2);
    assert_eq!(app.state.cache.lookup("f1").await, None);
}

#[tokio::test]
async fn test_list_remote_failure() {
    let (app, token) = app_with_token().await;
    app.storage.fail_list.store(true, Ordering::SeqCst);

    let response = app
        .server
        .get("/list")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    assert!(!body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("remote unavailable"));
}

// ============================================================================
// Download
// ============================================================================

#[tokio::test]
async fn test_download_file() {
    let (app, token) = app_with_token().await;
    app.storage
        .insert("f1", FileRecord::file("hello.txt", 11), b"hello world");

    let response = app
        .server
        .get("/download/f1")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status_ok();
    assert_eq!(response.as_bytes().as_ref(), b"hello world");
    assert!(response
        .header(CONTENT_TYPE)
        .to_str()
        .unwrap()
        .starts_with("text/plain"));
    assert_eq!(
        response.header(CONTENT_DISPOSITION),
        "attachment; filename=\"hello.txt\""
    );
}

#[tokio::test]
async fn test_download_large_file_and_cleanup() {
    let (app, token) = app_with_token().await;
    let data: Vec<u8> = (0..3 * 1024 * 1024).map(|i| (i % 251) as u8).collect();
    app.storage
        .insert("big", FileRecord::file("video.bin", data.len() as u64), &data);

    let response = app
        .server
        .get("/download/big")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status_ok();
    assert_eq!(response.header(CONTENT_LENGTH), data.len().to_string().as_str());
    assert_eq!(response.as_bytes().as_ref(), data.as_slice());

    // The temporary download directory goes away with the response body
    let dirs = app.storage.download_dirs.lock().unwrap().clone();
    assert_eq!(dirs.len(), 1);
    assert!(!dirs[0].exists());
}

#[tokio::test]
async fn test_download_refreshes_only_on_miss() {
    let (app, token) = app_with_token().await;
    app.storage.insert("f1", FileRecord::file("a.bin", 3), b"abc");

    for _ in 0..3 {
        app.server
            .get("/download/f1")
            .add_header(AUTHORIZATION, bearer(&token))
            .await
            .assert_status_ok();
    }

    assert_eq!(app.storage.list_calls(), 1);
}

#[tokio::test]
async fn test_download_unknown_file() {
    let (app, token) = app_with_token().await;

    let response = app
        .server
        .get("/download/missing")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    assert_eq!(app.storage.list_calls(), 1);
}

#[tokio::test]
async fn test_download_remote_failure() {
    let (app, token) = app_with_token().await;
    app.storage.insert("f1", FileRecord::file("a.bin", 3), b"abc");
    app.storage.fail_download.store(true, Ordering::SeqCst);

    let response = app
        .server
        .get("/download/f1")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}

// ============================================================================
// Delete
// ============================================================================

#[tokio::test]
async fn test_delete_unknown_file_refreshes_once() {
    let (app, token) = app_with_token().await;

    let response = app
        .server
        .delete("/delete/nope")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status(StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["error"]["code"], "NOT_FOUND");
    assert_eq!(app.storage.list_calls(), 1);
}

#[tokio::test]
async fn test_delete_file() {
    let (app, token) = app_with_token().await;
    app.storage.insert("f1", FileRecord::file("a.txt", 1), b"a");

    let response = app
        .server
        .delete("/delete/f1")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["message"], "File deleted successfully");
    assert!(!app.storage.contains("f1"));
    assert_eq!(app.state.cache.lookup("f1").await, None);

    // A second delete no longer finds it
    app.server
        .delete("/delete/f1")
        .add_header(AUTHORIZATION, bearer(&token))
        .await
        .assert_status(StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_remote_failure_during_refresh() {
    let (app, token) = app_with_token().await;
    app.storage.fail_list.store(true, Ordering::SeqCst);

    let response = app
        .server
        .delete("/delete/f1")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
}

// ============================================================================
// Upload
// ============================================================================

#[tokio::test]
async fn test_upload_file() {
    let (app, token) = app_with_token().await;

    let response = app
        .server
        .post("/upload")
        .add_header(AUTHORIZATION, bearer(&token))
        .multipart(text_file("notes.txt", "remember the milk"))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    let file_key = body["data"]["file_key"].as_str().unwrap().to_string();
    assert_eq!(body["data"]["message"], "File uploaded successfully");

    assert_eq!(
        app.storage.content(&file_key).as_deref(),
        Some(b"remember the milk".as_slice())
    );
    // Cache was refreshed with the new node
    let cached = app.state.cache.lookup(&file_key).await.unwrap();
    assert_eq!(cached.display_name().as_deref(), Some("notes.txt"));
    assert!(staging_is_empty(&app));
}

#[tokio::test]
async fn test_uploaded_file_downloadable_without_extra_refresh() {
    let (app, token) = app_with_token().await;

    let response = app
        .server
        .post("/upload")
        .add_header(AUTHORIZATION, bearer(&token))
        .multipart(text_file("data.csv", "a,b\n1,2\n"))
        .await;
    response.assert_status_ok();
    let file_key = response.json::<Value>()["data"]["file_key"]
        .as_str()
        .unwrap()
        .to_string();
    let calls_after_upload = app.storage.list_calls();

    let download = app
        .server
        .get(&format!("/download/{}", file_key))
        .add_header(AUTHORIZATION, bearer(&token))
        .await;

    download.assert_status_ok();
    assert_eq!(download.as_bytes().as_ref(), b"a,b\n1,2\n");
    assert_eq!(app.storage.list_calls(), calls_after_upload);

    let list = app
        .server
        .get("/list")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;
    let body: Value = list.json();
    assert!(body["data"]
        .as_array()
        .unwrap()
        .iter()
        .any(|entry| entry["key"] == file_key.as_str()));
}

#[tokio::test]
async fn test_upload_sanitizes_filename() {
    let (app, token) = app_with_token().await;

    app.server
        .post("/upload")
        .add_header(AUTHORIZATION, bearer(&token))
        .multipart(text_file("../../my report.txt", "x"))
        .await
        .assert_status_ok();

    let paths = app.storage.uploaded_paths.lock().unwrap().clone();
    assert_eq!(paths.len(), 1);
    assert_eq!(paths[0].file_name().unwrap(), "my_report.txt");
    assert!(paths[0].starts_with(app.staging.path()));
}

#[tokio::test]
async fn test_upload_without_file_part() {
    let (app, token) = app_with_token().await;

    let response = app
        .server
        .post("/upload")
        .add_header(AUTHORIZATION, bearer(&token))
        .multipart(MultipartForm::new().add_text("description", "no file here"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["error"]["message"], "No file part");
}

#[tokio::test]
async fn test_upload_with_empty_filename() {
    let (app, token) = app_with_token().await;

    let response = app
        .server
        .post("/upload")
        .add_header(AUTHORIZATION, bearer(&token))
        .multipart(text_file("", "content"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(app.storage.uploaded_paths.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_upload_with_unusable_filename() {
    let (app, token) = app_with_token().await;

    let response = app
        .server
        .post("/upload")
        .add_header(AUTHORIZATION, bearer(&token))
        .multipart(text_file("..", "content"))
        .await;

    response.assert_status(StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_upload_remote_failure_cleans_staging() {
    let (app, token) = app_with_token().await;
    app.storage.fail_upload.store(true, Ordering::SeqCst);

    let response = app
        .server
        .post("/upload")
        .add_header(AUTHORIZATION, bearer(&token))
        .multipart(text_file("notes.txt", "content"))
        .await;

    response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(app.storage.uploaded_paths.lock().unwrap().len(), 1);
    assert!(staging_is_empty(&app));
}

#[tokio::test]
async fn test_upload_succeeds_when_refresh_fails() {
    let (app, token) = app_with_token().await;
    app.storage.fail_list.store(true, Ordering::SeqCst);

    let response = app
        .server
        .post("/upload")
        .add_header(AUTHORIZATION, bearer(&token))
        .multipart(text_file("notes.txt", "content"))
        .await;

    response.assert_status_ok();
    let file_key = response.json::<Value>()["data"]["file_key"]
        .as_str()
        .unwrap()
        .to_string();
    assert_eq!(app.state.cache.lookup(&file_key).await, None);
}

// ============================================================================
// Details
// ============================================================================

#[tokio::test]
async fn test_details() {
    let (app, token) = app_with_token().await;

    let response = app
        .server
        .get("/details")
        .add_header(AUTHORIZATION, bearer(&token))
        .await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["data"]["details"]["Account e-mail"], "me@example.com");
    assert_eq!(body["data"]["quota"], 20480);
    assert_eq!(body["data"]["space"]["used"], 2);
    assert_eq!(body["data"]["space"]["total"], 20971520);
}
