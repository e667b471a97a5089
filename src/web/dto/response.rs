//! Response DTOs for the Web API.

use serde::Serialize;

use crate::storage::StorageSpace;

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Login response.
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    /// Access token (JWT).
    pub access_token: String,
    /// Token type, always `Bearer`.
    pub token_type: &'static str,
    /// Access token lifetime in seconds.
    pub expires_in: u64,
}

/// Plain acknowledgement.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

/// Upload result.
#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub message: String,
    /// Identifier of the uploaded file.
    pub file_key: String,
}

/// One entry of `GET /list`.
#[derive(Debug, Serialize)]
pub struct FileEntryResponse {
    /// Remote identifier.
    pub key: String,
    /// Display name.
    pub name: String,
    /// Size in bytes, when reported.
    pub size: Option<u64>,
    /// `File` or `Folder`.
    #[serde(rename = "type")]
    pub kind: &'static str,
}

/// Account information returned by `GET /details`.
#[derive(Debug, Serialize)]
pub struct DetailsResponse {
    /// Account holder information as reported by the provider.
    pub details: serde_json::Value,
    /// Total quota in megabytes.
    pub quota: u64,
    /// Used and total space in kilobytes.
    pub space: StorageSpace,
}
