//! Streaming content hashing and the policy that decides when to apply it.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use tracing::warn;

use crate::config::AppConfig;
use crate::pathutil;

const CHUNK_SIZE: usize = 64 * 1024;

/// When to hash: globally, or for files under configured prefixes.
#[derive(Debug, Clone, Default)]
pub struct HashPolicy {
    pub enabled: bool,
    pub always_prefixes: Vec<String>,
}

impl HashPolicy {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            enabled: config.hashing,
            always_prefixes: config
                .hash_directories
                .iter()
                .map(|p| pathutil::normalize(p))
                .collect(),
        }
    }

    /// Whether files in `dir_path` (normalized) should be hashed.
    pub fn should_hash(&self, dir_path: &str) -> bool {
        if self.enabled {
            return true;
        }
        self.always_prefixes
            .iter()
            .any(|prefix| pathutil::is_same_or_under_ci(dir_path, prefix))
    }
}

/// Blake3 digest of a file's contents, read in bounded chunks. Returns
/// `None` on any read error; callers tolerate missing hashes.
pub fn hash_file(path: &Path) -> Option<String> {
    match hash_file_inner(path) {
        Ok(hex) => Some(hex),
        Err(err) => {
            warn!("Hashing {} failed: {}", path.display(), err);
            None
        }
    }
}

fn hash_file_inner(path: &Path) -> std::io::Result<String> {
    let mut file = File::open(path)?;
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; CHUNK_SIZE];
    loop {
        let read = file.read(&mut buffer)?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_policy_global_flag() {
        let policy = HashPolicy {
            enabled: true,
            always_prefixes: vec![],
        };
        assert!(policy.should_hash("C:/anywhere"));
    }

    #[test]
    fn test_policy_prefixes() {
        let policy = HashPolicy {
            enabled: false,
            always_prefixes: vec!["C:/photos".to_string()],
        };
        assert!(policy.should_hash("C:/photos/2024"));
        assert!(policy.should_hash("c:/Photos"));
        assert!(!policy.should_hash("C:/docs"));
    }

    #[test]
    fn test_hash_file_stable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.bin");
        let mut f = File::create(&path).unwrap();
        f.write_all(b"hello world").unwrap();
        drop(f);

        let a = hash_file(&path).unwrap();
        let b = hash_file(&path).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 64);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_hash_missing_file_is_none() {
        assert!(hash_file(Path::new("/no/such/file-xyz")).is_none());
    }
}
