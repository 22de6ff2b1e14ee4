pub mod alias;
pub mod checkpoint;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod hasher;
pub mod integrity;
pub mod lock;
pub mod orchestrator;
pub mod pathutil;
pub mod platform;
pub mod scanner;
pub mod storage;
pub mod watcher;

pub use alias::{CanonicalPath, DriveAliasResolver};
pub use config::AppConfig;
pub use coordinator::CatalogHandle;
pub use error::Error;
pub use integrity::{IntegrityChecker, IntegrityReport};
pub use lock::{ScanLockCoordinator, ScanType};
pub use orchestrator::{ExitStatus, Orchestrator};
pub use scanner::{ScanOutcome, Scanner};
