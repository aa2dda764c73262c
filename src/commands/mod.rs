//! Library operations over the SQLite pool. The desktop shell wraps each of
//! these in a Tauri command; everything here also runs headless in tests.

pub mod annotation;
pub mod backup;
pub mod book;
pub mod collection;
pub mod import;
pub mod session;
pub mod settings;
pub mod stats;

pub use annotation::*;
pub use backup::*;
pub use book::*;
pub use collection::*;
pub use import::*;
pub use session::*;
pub use settings::*;
pub use stats::*;

/// Current unix time in seconds
pub(crate) fn unix_now() -> i64 {
    chrono::Utc::now().timestamp()
}
