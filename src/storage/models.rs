/// A volume known to the catalog.
#[derive(Debug, Clone)]
pub struct Drive {
    pub id: i64,
    pub name: String,
}

/// A filename suffix and its classification.
#[derive(Debug, Clone)]
pub struct Extension {
    pub id: i64,
    pub name: String,
    pub category: String,
    pub is_binary: bool,
    pub mime: Option<String>,
}

/// A directory row. `full_path` is normalized and unique per drive.
#[derive(Debug, Clone)]
pub struct DirectoryRow {
    pub id: i64,
    pub drive_id: i64,
    pub parent_id: Option<i64>,
    pub full_path: String,
    pub name: String,
    pub depth: i64,
}

/// A file row. `name` is the stem; the suffix lives in the extensions table.
#[derive(Debug, Clone)]
pub struct FileRow {
    pub id: i64,
    pub directory_id: i64,
    pub extension_id: i64,
    pub name: String,
    pub size: i64,
    pub hash: Option<String>,
    pub created_ms: Option<i64>,
    pub modified_ms: Option<i64>,
}

/// One pending file upsert, as collected by the scanner or event handler.
#[derive(Debug, Clone)]
pub struct FileUpsert {
    pub directory_id: i64,
    /// Full filename including any extension.
    pub full_name: String,
    pub size: i64,
    pub hash: Option<String>,
    pub created_ms: Option<i64>,
    pub modified_ms: Option<i64>,
}

/// Resume checkpoint for a drive; absence means no scan in progress.
#[derive(Debug, Clone)]
pub struct ScanProgressRow {
    pub drive_id: i64,
    pub drive_name: String,
    pub last_path: String,
    pub updated_ms: i64,
}

/// One scan session in the append-only lock log.
#[derive(Debug, Clone)]
pub struct ScanLockRow {
    pub id: i64,
    pub scan_type: String,
    pub started_ms: i64,
    pub pid: i64,
    pub hostname: String,
    pub is_active: bool,
}

/// A file row joined with its directory path and extension name, as the
/// integrity checker consumes it.
#[derive(Debug, Clone)]
pub struct FileWithPath {
    pub id: i64,
    pub directory_id: i64,
    pub directory_path: String,
    pub name: String,
    pub extension: String,
    pub size: i64,
    pub hash: Option<String>,
}

/// Per-drive aggregate counts for status displays.
#[derive(Debug, Clone)]
pub struct DriveSummary {
    pub drive_id: i64,
    pub drive_name: String,
    pub directory_count: i64,
    pub file_count: i64,
    pub total_bytes: i64,
}
