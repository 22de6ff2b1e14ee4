use config::{Config, ConfigError, File as ConfigFile};
use serde::Deserialize;

/// A scheduled scan entry, matched against the wall clock by the
/// orchestrator's schedule poll.
#[derive(Debug, Clone, Deserialize)]
pub struct ScheduledScan {
    pub scan_type: ScheduledScanType,
    pub path: Option<String>,
    /// Wall-clock time, "HH:MM".
    pub time: String,
    pub enabled: bool,
    #[serde(default)]
    pub restart: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduledScanType {
    Drive,
    Full,
    Integrity,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Global content-hashing flag.
    #[serde(default)]
    pub hashing: bool,
    /// Absolute path prefixes that are always hashed regardless of the
    /// global flag.
    #[serde(default)]
    pub hash_directories: Vec<String>,
    /// Default for interactive scans: resume from the last checkpoint when
    /// one exists.
    #[serde(default = "default_true")]
    pub resume_scan: bool,
    #[serde(default)]
    pub scheduled_scans: Vec<ScheduledScan>,
    /// Extra ignore prefixes on top of the built-in set.
    #[serde(default)]
    pub ignore_prefixes: Vec<String>,
    #[serde(default = "default_db_path")]
    pub db_path: String,
    /// Log file location; also excluded from indexing.
    #[serde(default = "default_log_path")]
    pub log_path: String,
}

fn default_true() -> bool {
    true
}

fn default_db_path() -> String {
    "drivecat.db".to_string()
}

fn default_log_path() -> String {
    "logs/drivecat.log".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            hashing: false,
            hash_directories: Vec::new(),
            resume_scan: true,
            scheduled_scans: Vec::new(),
            ignore_prefixes: Vec::new(),
            db_path: default_db_path(),
            log_path: default_log_path(),
        }
    }
}

pub fn load_configuration() -> Result<AppConfig, ConfigError> {
    let builder = Config::builder()
        .add_source(ConfigFile::with_name("Config").required(false))
        .build()?;
    builder.try_deserialize::<AppConfig>()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert!(!cfg.hashing);
        assert!(cfg.resume_scan);
        assert!(cfg.scheduled_scans.is_empty());
        assert_eq!(cfg.db_path, "drivecat.db");
        assert_eq!(cfg.log_path, "logs/drivecat.log");
    }

    #[test]
    fn test_scheduled_scan_type_parse() {
        let entry: ScheduledScan = serde_json::from_str(
            r#"{"scan_type":"integrity","path":null,"time":"03:30","enabled":true}"#,
        )
        .unwrap();
        assert_eq!(entry.scan_type, ScheduledScanType::Integrity);
        assert!(!entry.restart);
        assert_eq!(entry.time, "03:30");
    }
}
