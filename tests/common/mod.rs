//! Test helpers for Web API integration tests.
//!
//! Provides an in-memory [`RemoteStorage`] and a router factory wired to it.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_test::TestServer;
use serde_json::{json, Value};
use tempfile::TempDir;

use megagate::config::Config;
use megagate::storage::{StorageSpace, UploadResponse, UploadedNode};
use megagate::web::handlers::AppState;
use megagate::web::middleware::{JwtState, RateLimitState};
use megagate::web::router::create_router;
use megagate::{FileRecord, RemoteStorage, StorageError};

pub const USERNAME: &str = "admin";
pub const PASSWORD: &str = "correct-horse";
pub const JWT_SECRET: &str = "test-secret-key-for-testing-only";

/// In-memory remote account with call counters and failure switches.
#[derive(Default)]
pub struct FakeStorage {
    nodes: Mutex<HashMap<String, FileRecord>>,
    contents: Mutex<HashMap<String, Vec<u8>>>,
    next_id: AtomicUsize,
    pub list_calls: AtomicUsize,
    pub fail_list: AtomicBool,
    pub fail_upload: AtomicBool,
    pub fail_download: AtomicBool,
    /// Local paths handed to `upload`.
    pub uploaded_paths: Mutex<Vec<PathBuf>>,
    /// Destination directories handed to `download`.
    pub download_dirs: Mutex<Vec<PathBuf>>,
}

impl FakeStorage {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Add a node directly on the "remote" side, bypassing the proxy.
    pub fn insert(&self, id: &str, record: FileRecord, content: &[u8]) {
        self.nodes.lock().unwrap().insert(id.to_string(), record);
        self.contents
            .lock()
            .unwrap()
            .insert(id.to_string(), content.to_vec());
    }

    pub fn contains(&self, id: &str) -> bool {
        self.nodes.lock().unwrap().contains_key(id)
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn content(&self, id: &str) -> Option<Vec<u8>> {
        self.contents.lock().unwrap().get(id).cloned()
    }

    fn failure(operation: &str) -> StorageError {
        StorageError::Failed {
            command: operation.to_string(),
            message: "remote unavailable".to_string(),
        }
    }
}

#[async_trait]
impl RemoteStorage for FakeStorage {
    async fn list(&self) -> Result<HashMap<String, FileRecord>, StorageError> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_list.load(Ordering::SeqCst) {
            return Err(Self::failure("list"));
        }
        Ok(self.nodes.lock().unwrap().clone())
    }

    async fn upload(&self, path: &Path) -> Result<UploadResponse, StorageError> {
        self.uploaded_paths.lock().unwrap().push(path.to_path_buf());
        if self.fail_upload.load(Ordering::SeqCst) {
            return Err(Self::failure("upload"));
        }

        let content = tokio::fs::read(path).await?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let id = format!("up{:04}", self.next_id.fetch_add(1, Ordering::SeqCst));

        self.insert(&id, FileRecord::file(name, content.len() as u64), &content);

        Ok(UploadResponse {
            nodes: vec![UploadedNode { handle: id }],
        })
    }

    async fn download(
        &self,
        id: &str,
        record: &FileRecord,
        dest_dir: &Path,
    ) -> Result<PathBuf, StorageError> {
        self.download_dirs
            .lock()
            .unwrap()
            .push(dest_dir.to_path_buf());
        if self.fail_download.load(Ordering::SeqCst) {
            return Err(Self::failure("download"));
        }
        let content = self.content(id).ok_or_else(|| Self::failure("download"))?;
        let path = dest_dir.join(record.display_name().unwrap_or_else(|| id.to_string()));
        tokio::fs::write(&path, content).await?;
        Ok(path)
    }

    async fn delete(&self, id: &str) -> Result<(), StorageError> {
        self.nodes
            .lock()
            .unwrap()
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Self::failure("delete"))
    }

    async fn get_user(&self) -> Result<serde_json::Value, StorageError> {
        Ok(json!({"Account e-mail": "me@example.com"}))
    }

    async fn get_quota(&self) -> Result<u64, StorageError> {
        Ok(20480)
    }

    async fn get_storage_space(&self) -> Result<StorageSpace, StorageError> {
        Ok(StorageSpace {
            used: 2,
            total: 20971520,
        })
    }
}

/// Configuration used by the test servers.
pub fn test_config(staging: &Path) -> Config {
    let mut config = Config::default();
    config.server.host = "127.0.0.1".to_string();
    config.server.port = 0;
    config.auth.jwt_secret = JWT_SECRET.to_string();
    config.auth.username = USERNAME.to_string();
    config.auth.password = PASSWORD.to_string();
    config.auth.login_rate_limit = 1000;
    config.upload.staging_path = staging.to_string_lossy().into_owned();
    config.upload.max_upload_size_mb = 1;
    config.mega.email = "me@example.com".to_string();
    config
}

/// Running test server with handles to its collaborators.
pub struct TestApp {
    pub server: TestServer,
    pub storage: Arc<FakeStorage>,
    pub state: Arc<AppState>,
    pub staging: TempDir,
}

/// Create a test server backed by a fresh [`FakeStorage`].
pub fn create_test_app() -> TestApp {
    create_test_app_with(FakeStorage::new(), |_| {})
}

/// Create a test server with a prepared storage and config tweaks.
pub fn create_test_app_with(storage: Arc<FakeStorage>, tweak: impl FnOnce(&mut Config)) -> TestApp {
    let staging = tempfile::tempdir().expect("Failed to create staging directory");
    let mut config = test_config(staging.path());
    tweak(&mut config);

    let state = Arc::new(AppState::new(
        storage.clone(),
        &config.auth,
        &config.upload.staging_path,
    ));
    let jwt_state = Arc::new(JwtState::new(&config.auth.jwt_secret));
    let rate_limit = Arc::new(RateLimitState::new(
        config.auth.login_rate_limit,
        config.server.trust_forwarded_headers,
    ));

    let router = create_router(state.clone(), jwt_state, rate_limit, &config);
    let server = TestServer::new(router).expect("Failed to create test server");

    TestApp {
        server,
        storage,
        state,
        staging,
    }
}

/// Log in with the configured credentials and return the access token.
pub async fn login(server: &TestServer) -> String {
    let response = server
        .post("/login")
        .json(&json!({"username": USERNAME, "password": PASSWORD}))
        .await;
    response.assert_status_ok();

    response.json::<Value>()["data"]["access_token"]
        .as_str()
        .expect("login response has no access token")
        .to_string()
}

/// Authorization header value for a token.
pub fn bearer(token: &str) -> String {
    format!("Bearer {}", token)
}
