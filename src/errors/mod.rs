//! Centralized error handling for the playlist proxy
//!
//! Request-level failures are expressed as [`AppError`] and mapped to HTTP
//! status codes in `web::responses`. Per-fragment problems found while
//! rewriting a document never become errors; the rewriters emit the original
//! text instead.
//!
//! # Error Categories
//!
//! - **Configuration Errors**: unreadable or invalid configuration file
//! - **Not Found Errors**: unknown source, or guide requested without an EPG URL
//! - **Source Errors**: upstream returned a non-success status or unusable body
//! - **External Service Errors**: upstream could not be reached at all
//!
//! # Usage
//!
//! ```rust
//! use playlist_proxy::errors::{AppError, AppResult};
//!
//! fn lookup(name: &str) -> AppResult<()> {
//!     Err(AppError::not_found("source", name))
//! }
//! ```

pub mod types;

pub use types::*;

/// Convenience type alias for Results using AppError
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for Source Results
pub type SourceResult<T> = Result<T, SourceError>;
