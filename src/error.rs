use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Watcher error: {0}")]
    Watcher(#[from] notify::Error),

    #[error("another scan is already active: {0}")]
    LockRefused(String),

    #[error("{0}")]
    Other(String),
}
