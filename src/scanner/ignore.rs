//! Ignore rules shared by the scanner and the event handler.
//!
//! Three layers: directory prefixes (OS system trees, recycle bin, shadow
//! copies, matched case-insensitively relative to any drive root, plus
//! user-configured absolute prefixes), exact file paths (the catalog file
//! and its sidecars, the config file, the log), and, for the event handler
//! only, filename suffixes and special basenames.

use crate::config::AppConfig;
use crate::pathutil;

/// Root-relative system trees skipped on every drive.
const ROOT_RELATIVE_IGNORES: &[&str] = &[
    "$recycle.bin",
    "system volume information",
    "recovery",
    "config.msi",
    "windows/temp",
    "windows/csc",
    "windows/softwaredistribution/download",
    "programdata/microsoft/search",
];

/// Suffixes whose events are never worth catalog writes. Includes the
/// catalog's own WAL sidecars so the handler cannot feed back on itself.
const IGNORED_SUFFIXES: &[&str] = &[
    ".tmp",
    ".temp",
    ".swp",
    ".crdownload",
    ".partial",
    ".lock",
    ".log",
    "-wal",
    "-shm",
    "-journal",
];

const IGNORED_BASENAMES: &[&str] = &["desktop.ini", "thumbs.db", ".ds_store"];

fn absolutize(path: &str) -> String {
    let normalized = pathutil::normalize(path);
    let is_absolute =
        normalized.starts_with('/') || normalized.as_bytes().get(1) == Some(&b':');
    if is_absolute {
        return normalized.to_lowercase();
    }
    let cwd = std::env::current_dir().unwrap_or_default();
    pathutil::normalize_path(&cwd.join(&normalized)).to_lowercase()
}

#[derive(Debug, Clone, Default)]
pub struct IgnoreRules {
    /// Lowercased absolute prefixes from configuration.
    extra_prefixes: Vec<String>,
    /// Lowercased exact paths (runtime artifacts).
    exact_paths: Vec<String>,
}

impl IgnoreRules {
    pub fn from_config(config: &AppConfig) -> Self {
        let extra_prefixes = config
            .ignore_prefixes
            .iter()
            .map(|p| pathutil::normalize(p).to_lowercase())
            .collect();

        // The catalog and its journal sidecars, plus the project's own
        // config and log files, must never index themselves. Relative
        // paths are resolved against the working directory once, here.
        let db = absolutize(&config.db_path);
        let exact_paths = vec![
            format!("{}-wal", db),
            format!("{}-shm", db),
            db,
            absolutize("Config.toml"),
            absolutize(&config.log_path),
        ];

        Self {
            extra_prefixes,
            exact_paths,
        }
    }

    /// Whether an entire directory subtree is skipped.
    pub fn is_ignored_dir(&self, full_path: &str) -> bool {
        let lower = full_path.to_lowercase();
        if self
            .extra_prefixes
            .iter()
            .any(|p| pathutil::is_same_or_under(&lower, p))
        {
            return true;
        }
        // drive_of uppercases the letter; the comparison side is lowercased.
        let drive = pathutil::drive_of(&lower).to_lowercase();
        ROOT_RELATIVE_IGNORES.iter().any(|suffix| {
            let prefix = pathutil::join(&drive, suffix);
            pathutil::is_same_or_under(&lower, &prefix)
        })
    }

    /// Whether a single file path is a runtime artifact the scanner skips.
    pub fn is_ignored_file(&self, full_path: &str) -> bool {
        let lower = full_path.to_lowercase();
        self.exact_paths.iter().any(|p| &lower == p)
    }

    /// Full event-side filter: exact paths, special basenames, temp/journal
    /// suffixes, and the shared directory prefixes.
    pub fn is_ignored_event_path(&self, full_path: &str) -> bool {
        let lower = full_path.to_lowercase();
        if self.is_ignored_file(&lower) || self.is_ignored_dir(&lower) {
            return true;
        }
        let base = pathutil::leaf_of(&lower);
        if IGNORED_BASENAMES.contains(&base) {
            return true;
        }
        IGNORED_SUFFIXES.iter().any(|s| base.ends_with(s))
    }
}
