//! Fixed extension classification table.
//!
//! The extensions table is seeded with this set at schema creation; any
//! suffix first seen at scan time is classified by the same lookup and
//! inserted on the fly. Extensions are never deleted.

use crate::pathutil::NO_EXTENSION;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExtensionInfo {
    pub category: &'static str,
    pub is_binary: bool,
    pub mime: Option<&'static str>,
}

/// Seeded extension set: (name, category, is_binary, mime).
pub const SEED: &[(&str, &str, bool, Option<&str>)] = &[
    (NO_EXTENSION, "other", true, None),
    // documents
    (".txt", "document", false, Some("text/plain")),
    (".md", "document", false, Some("text/markdown")),
    (".rtf", "document", false, Some("application/rtf")),
    (".pdf", "document", true, Some("application/pdf")),
    (".doc", "document", true, Some("application/msword")),
    (".docx", "document", true, Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document")),
    (".xls", "document", true, Some("application/vnd.ms-excel")),
    (".xlsx", "document", true, Some("application/vnd.openxmlformats-officedocument.spreadsheetml.sheet")),
    (".ppt", "document", true, Some("application/vnd.ms-powerpoint")),
    (".pptx", "document", true, Some("application/vnd.openxmlformats-officedocument.presentationml.presentation")),
    (".odt", "document", true, Some("application/vnd.oasis.opendocument.text")),
    (".csv", "document", false, Some("text/csv")),
    (".log", "document", false, Some("text/plain")),
    // images
    (".jpg", "image", true, Some("image/jpeg")),
    (".jpeg", "image", true, Some("image/jpeg")),
    (".png", "image", true, Some("image/png")),
    (".gif", "image", true, Some("image/gif")),
    (".bmp", "image", true, Some("image/bmp")),
    (".webp", "image", true, Some("image/webp")),
    (".tif", "image", true, Some("image/tiff")),
    (".tiff", "image", true, Some("image/tiff")),
    (".svg", "image", false, Some("image/svg+xml")),
    (".ico", "image", true, Some("image/x-icon")),
    (".heic", "image", true, Some("image/heic")),
    (".raw", "image", true, None),
    (".cr2", "image", true, None),
    (".nef", "image", true, None),
    // video
    (".mp4", "video", true, Some("video/mp4")),
    (".mkv", "video", true, Some("video/x-matroska")),
    (".avi", "video", true, Some("video/x-msvideo")),
    (".mov", "video", true, Some("video/quicktime")),
    (".wmv", "video", true, Some("video/x-ms-wmv")),
    (".webm", "video", true, Some("video/webm")),
    (".m4v", "video", true, Some("video/x-m4v")),
    (".mpg", "video", true, Some("video/mpeg")),
    (".mpeg", "video", true, Some("video/mpeg")),
    (".flv", "video", true, Some("video/x-flv")),
    // audio
    (".mp3", "audio", true, Some("audio/mpeg")),
    (".flac", "audio", true, Some("audio/flac")),
    (".wav", "audio", true, Some("audio/wav")),
    (".ogg", "audio", true, Some("audio/ogg")),
    (".m4a", "audio", true, Some("audio/mp4")),
    (".aac", "audio", true, Some("audio/aac")),
    (".wma", "audio", true, Some("audio/x-ms-wma")),
    (".opus", "audio", true, Some("audio/opus")),
    (".mid", "audio", true, Some("audio/midi")),
    // archives
    (".zip", "archive", true, Some("application/zip")),
    (".rar", "archive", true, Some("application/vnd.rar")),
    (".7z", "archive", true, Some("application/x-7z-compressed")),
    (".tar", "archive", true, Some("application/x-tar")),
    (".gz", "archive", true, Some("application/gzip")),
    (".bz2", "archive", true, Some("application/x-bzip2")),
    (".xz", "archive", true, Some("application/x-xz")),
    (".iso", "archive", true, Some("application/x-iso9660-image")),
    (".cab", "archive", true, None),
    // executables
    (".exe", "executable", true, Some("application/vnd.microsoft.portable-executable")),
    (".dll", "executable", true, None),
    (".msi", "executable", true, None),
    (".bat", "executable", false, None),
    (".cmd", "executable", false, None),
    (".com", "executable", true, None),
    (".scr", "executable", true, None),
    (".sys", "executable", true, None),
    (".so", "executable", true, None),
    (".bin", "executable", true, Some("application/octet-stream")),
    // code
    (".rs", "code", false, Some("text/x-rust")),
    (".c", "code", false, Some("text/x-c")),
    (".h", "code", false, Some("text/x-c")),
    (".cpp", "code", false, Some("text/x-c++")),
    (".cs", "code", false, None),
    (".py", "code", false, Some("text/x-python")),
    (".js", "code", false, Some("text/javascript")),
    (".ts", "code", false, None),
    (".java", "code", false, Some("text/x-java-source")),
    (".go", "code", false, None),
    (".rb", "code", false, None),
    (".php", "code", false, None),
    (".sh", "code", false, Some("application/x-sh")),
    (".ps1", "code", false, None),
    (".sql", "code", false, Some("application/sql")),
    (".html", "code", false, Some("text/html")),
    (".htm", "code", false, Some("text/html")),
    (".css", "code", false, Some("text/css")),
    (".xml", "code", false, Some("application/xml")),
    (".json", "code", false, Some("application/json")),
    (".yaml", "code", false, None),
    (".yml", "code", false, None),
    (".toml", "code", false, None),
    (".ini", "code", false, None),
];

/// Classify a (lowercased, dot-prefixed) extension name. Unknown suffixes
/// land in "other" as binary with no MIME hint.
pub fn classify(name: &str) -> ExtensionInfo {
    for (seed_name, category, is_binary, mime) in SEED {
        if *seed_name == name {
            return ExtensionInfo {
                category,
                is_binary: *is_binary,
                mime: *mime,
            };
        }
    }
    ExtensionInfo {
        category: "other",
        is_binary: true,
        mime: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_known() {
        let info = classify(".mp3");
        assert_eq!(info.category, "audio");
        assert!(info.is_binary);
        assert_eq!(info.mime, Some("audio/mpeg"));
    }

    #[test]
    fn test_classify_unknown() {
        let info = classify(".zzz9");
        assert_eq!(info.category, "other");
        assert!(info.is_binary);
        assert_eq!(info.mime, None);
    }

    #[test]
    fn test_classify_sentinel() {
        let info = classify(NO_EXTENSION);
        assert_eq!(info.category, "other");
    }
}
