//! Adapters layer: Concrete implementations of ports.
//!
//! - `sqlite`: SQLite-backed [`Store`](crate::ports::Store)
//! - `sanitize`: redaction of personal data in log output

pub mod sanitize;
pub mod sqlite;

pub use sqlite::{SqliteStore, StoreError};
