//! littex-common — Shared error type and HTTP client used across all littex crates.

pub mod error;
pub mod http;

pub use error::{LittexError, Result};
pub use http::{HttpSettings, PoliteClient};
