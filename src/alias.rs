//! Drive-alias resolution.
//!
//! A volume can be visible under several names: a SUBST'd letter pointing at
//! a real directory, or a mapped network drive. Indexing both names would
//! double every row, so the scanner, event handler and orchestrator all push
//! paths through this resolver before admitting them.

use std::collections::HashMap;

use tracing::info;

use crate::pathutil;
use crate::platform;

/// The canonical form of a path, after alias splicing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalPath {
    pub path: String,
    pub is_alias: bool,
    /// Drive name the caller supplied.
    pub original_drive: String,
    /// Drive name of the canonical path.
    pub real_drive: String,
}

pub struct DriveAliasResolver {
    /// alias drive name ("T:/") → real path ("C:/mount/t").
    mappings: HashMap<String, String>,
    volumes: Vec<String>,
}

impl DriveAliasResolver {
    /// Discover mappings from the OS, cached for the process lifetime.
    pub fn discover() -> Self {
        let raw = platform::drive_mappings();
        let mut mappings = HashMap::new();
        for (alias, real) in raw {
            mappings.insert(pathutil::normalize(&alias), pathutil::normalize(&real));
        }
        if !mappings.is_empty() {
            info!("Drive aliases detected: {:?}", mappings);
        }
        Self {
            mappings,
            volumes: platform::list_volumes(),
        }
    }

    /// Test constructor with explicit mapping and volume tables.
    pub fn with_mappings(mappings: HashMap<String, String>, volumes: Vec<String>) -> Self {
        let mappings = mappings
            .into_iter()
            .map(|(a, r)| (pathutil::normalize(&a), pathutil::normalize(&r)))
            .collect();
        Self { mappings, volumes }
    }

    pub fn mappings(&self) -> &HashMap<String, String> {
        &self.mappings
    }

    pub fn is_alias_drive(&self, drive: &str) -> bool {
        self.mappings.contains_key(&pathutil::normalize(drive))
    }

    /// Canonicalize a path: normalize, and if its drive is an alias, splice
    /// the real path over the drive portion. Idempotent.
    pub fn canonicalize(&self, path: &str) -> CanonicalPath {
        let normalized = pathutil::normalize(path);
        let original_drive = pathutil::drive_of(&normalized);

        match self.mappings.get(&original_drive) {
            Some(real_root) => {
                let rest = &normalized[original_drive.len()..];
                let spliced = if rest.is_empty() {
                    real_root.clone()
                } else {
                    pathutil::join(real_root, rest)
                };
                let spliced = pathutil::normalize(&spliced);
                let real_drive = pathutil::drive_of(&spliced);
                CanonicalPath {
                    path: spliced,
                    is_alias: true,
                    original_drive,
                    real_drive,
                }
            }
            None => CanonicalPath {
                real_drive: original_drive.clone(),
                original_drive,
                is_alias: false,
                path: normalized,
            },
        }
    }

    /// Visible volumes minus every alias drive.
    pub fn canonical_drive_list(&self) -> Vec<String> {
        self.volumes
            .iter()
            .map(|v| pathutil::normalize(v))
            .filter(|v| !self.mappings.contains_key(v))
            .collect()
    }

    pub fn same_physical_location(&self, a: &str, b: &str) -> bool {
        self.canonicalize(a).path == self.canonicalize(b).path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> DriveAliasResolver {
        let mut mappings = HashMap::new();
        mappings.insert("T:/".to_string(), "C:/mount/t".to_string());
        DriveAliasResolver::with_mappings(
            mappings,
            vec!["C:/".to_string(), "D:/".to_string(), "T:/".to_string()],
        )
    }

    #[test]
    fn test_canonicalize_splices_alias() {
        let r = resolver();
        let c = r.canonicalize("T:/photos/a.jpg");
        assert_eq!(c.path, "C:/mount/t/photos/a.jpg");
        assert!(c.is_alias);
        assert_eq!(c.original_drive, "T:/");
        assert_eq!(c.real_drive, "C:/");
    }

    #[test]
    fn test_canonicalize_alias_root() {
        let r = resolver();
        assert_eq!(r.canonicalize("T:/").path, "C:/mount/t");
    }

    #[test]
    fn test_canonicalize_idempotent() {
        let r = resolver();
        let once = r.canonicalize("T:/x/y");
        let twice = r.canonicalize(&once.path);
        assert_eq!(once.path, twice.path);
        assert!(!twice.is_alias);
    }

    #[test]
    fn test_canonical_drive_list_excludes_aliases() {
        let r = resolver();
        let drives = r.canonical_drive_list();
        assert_eq!(drives, vec!["C:/".to_string(), "D:/".to_string()]);
    }

    #[test]
    fn test_same_physical_location() {
        let r = resolver();
        assert!(r.same_physical_location("T:/a", "C:/mount/t/a"));
        assert!(!r.same_physical_location("T:/a", "C:/mount/t/b"));
    }
}
