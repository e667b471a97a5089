//! Web API module.
//!
//! Routes are thin: they authenticate the caller, resolve identifiers
//! through the file mapping cache and hand the actual work to the remote
//! storage client.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use router::create_router;
pub use server::WebServer;
