//! Path normalization used throughout the catalog.
//!
//! Every path stored in the catalog is normalized: forward slashes only, no
//! duplicate separators, no trailing slash (except the drive root itself),
//! and an uppercased drive letter on Windows-style paths. All comparisons on
//! catalog paths operate on this normalized form.

use std::path::Path;

/// Sentinel extension name for files without a suffix.
pub const NO_EXTENSION: &str = "[none]";

/// Normalize a path string to the catalog's canonical form.
pub fn normalize(path: &str) -> String {
    let mut out = String::with_capacity(path.len());
    let mut last_was_sep = false;
    for ch in path.chars() {
        let c = if ch == '\\' { '/' } else { ch };
        if c == '/' {
            if last_was_sep {
                continue;
            }
            last_was_sep = true;
        } else {
            last_was_sep = false;
        }
        out.push(c);
    }

    // Uppercase a leading drive letter.
    let bytes = out.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' && bytes[0].is_ascii_lowercase() {
        out.replace_range(0..1, &out[0..1].to_ascii_uppercase());
    }

    // "C:" alone means the drive root.
    if out.len() == 2 && out.ends_with(':') {
        out.push('/');
    }

    // Strip a trailing slash unless this is a root ("/" or "C:/").
    while out.len() > 1 && out.ends_with('/') && !is_drive_root(&out) {
        out.pop();
    }

    out
}

/// Normalize a `Path` via its lossy string form.
pub fn normalize_path(path: &Path) -> String {
    normalize(&path.to_string_lossy())
}

fn is_drive_root(path: &str) -> bool {
    path == "/" || (path.len() == 3 && path.as_bytes()[1] == b':' && path.ends_with('/'))
}

/// The drive name of a normalized path: `"C:/"` for Windows-style paths,
/// `"/"` for rooted POSIX paths. Relative paths fall back to `"/"`.
pub fn drive_of(path: &str) -> String {
    let bytes = path.as_bytes();
    if bytes.len() >= 2 && bytes[1] == b':' {
        let letter = (bytes[0] as char).to_ascii_uppercase();
        return format!("{}:/", letter);
    }
    "/".to_string()
}

/// True when `child` equals `parent` or lives somewhere underneath it.
/// Both arguments must already be normalized.
pub fn is_same_or_under(child: &str, parent: &str) -> bool {
    if child == parent {
        return true;
    }
    if parent.ends_with('/') {
        child.starts_with(parent)
    } else {
        child.len() > parent.len()
            && child.starts_with(parent)
            && child.as_bytes()[parent.len()] == b'/'
    }
}

/// Case-insensitive variant of [`is_same_or_under`], for ignore rules.
pub fn is_same_or_under_ci(child: &str, parent: &str) -> bool {
    is_same_or_under(&child.to_lowercase(), &parent.to_lowercase())
}

/// Parent path of a normalized path; `None` at the drive root.
pub fn parent_of(path: &str) -> Option<String> {
    let drive = drive_of(path);
    if path == drive {
        return None;
    }
    match path.rfind('/') {
        Some(0) => Some("/".to_string()),
        Some(idx) => {
            let parent = &path[..idx];
            // "C:" needs its root slash back.
            if parent.len() == 2 && parent.ends_with(':') {
                Some(format!("{}/", parent))
            } else {
                Some(parent.to_string())
            }
        }
        None => None,
    }
}

/// Final component of a normalized path. The drive root's leaf is the drive
/// name itself.
pub fn leaf_of(path: &str) -> &str {
    let drive_len = if path.len() >= 3 && path.as_bytes()[1] == b':' {
        3
    } else {
        1
    };
    if path.len() <= drive_len {
        return path;
    }
    match path.rfind('/') {
        Some(idx) => &path[idx + 1..],
        None => path,
    }
}

/// Depth of a normalized path below its drive root (root itself is 0).
pub fn depth_of(path: &str) -> i64 {
    let drive = drive_of(path);
    if path == drive {
        return 0;
    }
    let rest = &path[drive.len()..];
    rest.split('/').filter(|s| !s.is_empty()).count() as i64
}

/// Split a full filename into (stem, extension). The extension includes its
/// dot and is lowercased; files without one get the `[none]` sentinel. A
/// leading dot alone ("`.bashrc`") does not count as an extension.
pub fn split_filename(name: &str) -> (String, String) {
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && !ext.is_empty() => {
            (stem.to_string(), format!(".{}", ext.to_lowercase()))
        }
        _ => (name.to_string(), NO_EXTENSION.to_string()),
    }
}

/// Rebuild a full filename from catalog (stem, extension) columns.
pub fn join_filename(stem: &str, ext: &str) -> String {
    if ext == NO_EXTENSION {
        stem.to_string()
    } else {
        format!("{}{}", stem, ext)
    }
}

/// Join a normalized directory path and a child name.
pub fn join(dir: &str, child: &str) -> String {
    if dir.ends_with('/') {
        format!("{}{}", dir, child)
    } else {
        format!("{}/{}", dir, child)
    }
}
