//! API handlers.

pub mod account;
pub mod auth;
pub mod file;

pub use account::*;
pub use auth::*;
pub use file::*;
