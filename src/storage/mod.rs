pub mod cache;
pub mod extensions;
pub mod models;
mod queries;
mod sqlite;

pub use queries::now_ms;
pub use sqlite::{Catalog, COMMIT_DIR_INTERVAL, COMMIT_TIME_INTERVAL};
