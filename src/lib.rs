//! megagate - token-gated HTTP proxy for a MEGA cloud-storage account.
//!
//! Exposes login, upload, download, delete, list and account-details
//! endpoints. Remote work is delegated to a [`storage::RemoteStorage`]
//! client; identifiers are resolved through an in-memory
//! [`cache::FileMappingCache`] that refreshes itself on a miss.

pub mod cache;
pub mod config;
pub mod error;
pub mod logging;
pub mod storage;
pub mod web;

pub use cache::FileMappingCache;
pub use config::Config;
pub use error::{GateError, Result};
pub use storage::{
    decode_attributes, decode_name, FileRecord, MegaCmdStorage, NodeAttributes, NodeKind,
    RemoteStorage, SharedStorage, StorageError,
};
pub use web::WebServer;
