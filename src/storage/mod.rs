//! Remote storage client abstraction.
//!
//! The proxy never talks to the storage provider's wire protocol directly.
//! Every remote operation goes through the [`RemoteStorage`] trait, which is
//! implemented by [`MegaCmdStorage`] for a real account and by in-memory
//! fakes in tests.

pub mod attributes;
pub mod megacmd;
pub mod types;

pub use attributes::{decode_attributes, decode_name, AttributeError};
pub use megacmd::MegaCmdStorage;
pub use types::{FileRecord, NodeAttributes, NodeKind, StorageSpace, UploadResponse, UploadedNode};

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

/// Errors reported by a remote storage client.
#[derive(Error, Debug)]
pub enum StorageError {
    /// The client executable could not be started.
    #[error("failed to execute {command}: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    /// The client ran but reported a failure.
    #[error("{command} failed: {message}")]
    Failed { command: String, message: String },

    /// The client output could not be understood.
    #[error("unexpected output: {0}")]
    Parse(String),

    /// Local I/O error while staging a transfer.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Operations the proxy needs from a remote storage account.
///
/// Identifiers are opaque keys assigned by the provider.
#[async_trait]
pub trait RemoteStorage: Send + Sync {
    /// List every node of the account, keyed by identifier.
    async fn list(&self) -> Result<HashMap<String, FileRecord>, StorageError>;

    /// Upload a local file to the root folder of the account.
    async fn upload(&self, path: &Path) -> Result<UploadResponse, StorageError>;

    /// Download a node into `dest_dir`, returning the local file path.
    async fn download(
        &self,
        id: &str,
        record: &FileRecord,
        dest_dir: &Path,
    ) -> Result<PathBuf, StorageError>;

    /// Delete a node.
    async fn delete(&self, id: &str) -> Result<(), StorageError>;

    /// Account holder information, in the provider's own shape.
    async fn get_user(&self) -> Result<serde_json::Value, StorageError>;

    /// Total account quota in megabytes.
    async fn get_quota(&self) -> Result<u64, StorageError>;

    /// Used and total storage space in kilobytes.
    async fn get_storage_space(&self) -> Result<StorageSpace, StorageError>;
}

/// Shared handle to a remote storage client.
pub type SharedStorage = Arc<dyn RemoteStorage>;
