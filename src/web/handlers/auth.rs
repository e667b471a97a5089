//! Authentication handlers and shared application state.

use axum::{extract::State, Json};
use jsonwebtoken::{encode, EncodingKey, Header};
use std::path::PathBuf;
use std::sync::Arc;

use crate::cache::FileMappingCache;
use crate::config::AuthConfig;
use crate::storage::SharedStorage;
use crate::web::dto::{ApiResponse, LoginRequest, LoginResponse};
use crate::web::error::ApiError;
use crate::web::middleware::JwtClaims;

/// Application state shared across handlers.
pub struct AppState {
    /// Identifier to metadata cache (owns the remote storage handle).
    pub cache: FileMappingCache,
    /// JWT encoding key.
    pub encoding_key: EncodingKey,
    /// Access token expiry in seconds.
    pub access_token_expiry: u64,
    /// Username accepted by the login endpoint.
    login_username: String,
    /// Password accepted by the login endpoint.
    login_password: String,
    /// Directory where uploads are staged.
    pub staging_dir: PathBuf,
}

impl AppState {
    /// Create a new application state.
    pub fn new(storage: SharedStorage, auth: &AuthConfig, staging_dir: impl Into<PathBuf>) -> Self {
        Self {
            cache: FileMappingCache::new(storage),
            encoding_key: EncodingKey::from_secret(auth.jwt_secret.as_bytes()),
            access_token_expiry: auth.token_expiry_secs,
            login_username: auth.username.clone(),
            login_password: auth.password.clone(),
            staging_dir: staging_dir.into(),
        }
    }

    /// Remote storage client.
    pub fn storage(&self) -> &SharedStorage {
        self.cache.storage()
    }

    /// Check a username/password pair against the configured login.
    pub fn check_credentials(&self, username: &str, password: &str) -> bool {
        // Both comparisons always run
        let username_ok = username == self.login_username;
        let password_ok = password == self.login_password;
        username_ok & password_ok
    }

    /// Generate an access token for the given subject.
    pub fn generate_access_token(&self, subject: &str) -> Result<String, ApiError> {
        let now = chrono::Utc::now().timestamp() as u64;
        let claims = JwtClaims {
            sub: subject.to_string(),
            iat: now,
            exp: now + self.access_token_expiry,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode JWT: {}", e);
            ApiError::internal("Failed to generate token")
        })
    }
}

/// POST /login - Exchange the configured credentials for an access token.
///
/// Missing or empty fields are treated as wrong credentials.
pub async fn login(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    if !state.check_credentials(&req.username, &req.password) {
        tracing::info!(username = %req.username, "Rejected login");
        return Err(ApiError::unauthorized("Invalid username or password"));
    }

    let access_token = state.generate_access_token(&req.username)?;
    tracing::info!(username = %req.username, "Issued access token");

    Ok(Json(ApiResponse::new(LoginResponse {
        access_token,
        token_type: "Bearer",
        expires_in: state.access_token_expiry,
    })))
}
