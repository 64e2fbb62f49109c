use std::cmp::Ordering;
use std::time::SystemTime;

use log::warn;

use crate::errors::RuntimeError;
use crate::file_utils::Resource;

/// A direct child of a collection
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Entry {
    /// File name of the entry
    pub name: String,

    /// Decoded href, see [`Resource::href`]
    pub href: String,

    pub is_dir: bool,

    /// Size in bytes. Only available for files
    pub size: Option<u64>,

    /// Last modification date
    pub last_modified: Option<SystemTime>,
}

impl Entry {
    pub fn from_metadata(name: String, href: String, metadata: &std::fs::Metadata) -> Self {
        Entry {
            name,
            href,
            is_dir: metadata.is_dir(),
            size: metadata.is_file().then(|| metadata.len()),
            last_modified: metadata.modified().ok(),
        }
    }
}

/// Natural, case-insensitive ordering by name
fn compare_names(a: &Entry, b: &Entry) -> Ordering {
    alphanumeric_sort::compare_str(a.name.to_lowercase(), b.name.to_lowercase())
}

/// Read the direct children of the collection `dir`, sorted by name.
///
/// Entries whose metadata can't be read (dangling symlinks, races with deletion) are
/// skipped.
pub async fn read_entries(dir: &Resource) -> Result<Vec<Entry>, RuntimeError> {
    let mut read_dir = tokio::fs::read_dir(&dir.path).await.map_err(|e| {
        RuntimeError::IoError(format!("Failed to list {}", dir.path.display()), e)
    })?;

    let mut entries = Vec::new();
    loop {
        let child = match read_dir.next_entry().await {
            Ok(Some(child)) => child,
            Ok(None) => break,
            Err(e) => {
                return Err(RuntimeError::IoError(
                    format!("Failed to list {}", dir.path.display()),
                    e,
                ));
            }
        };

        let Ok(name) = child.file_name().into_string() else {
            warn!(target: "fs", "Skipping non UTF-8 file name in {}", dir.path.display());
            continue;
        };
        match tokio::fs::metadata(child.path()).await {
            Ok(metadata) => {
                let href = dir.child_href(&name);
                entries.push(Entry::from_metadata(name, href, &metadata));
            }
            Err(e) => warn!(target: "fs", "Skipping {}: {e}", child.path().display()),
        }
    }

    entries.sort_by(compare_names);
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file_utils::resolve_path;
    use pretty_assertions::assert_eq;

    #[actix_web::test]
    async fn entries_are_sorted_naturally() {
        let tmp = tempfile::tempdir().unwrap();
        for name in ["file10.txt", "File2.txt", "file1.txt"] {
            std::fs::write(tmp.path().join(name), "x").unwrap();
        }
        std::fs::create_dir(tmp.path().join("sub")).unwrap();

        let root = resolve_path(tmp.path(), "/").unwrap();
        let entries = read_entries(&root).await.unwrap();
        let names = entries.iter().map(|e| e.name.as_str()).collect::<Vec<_>>();

        assert_eq!(names, vec!["file1.txt", "File2.txt", "file10.txt", "sub"]);
        assert_eq!(entries[0].href, "/file1.txt");
        assert_eq!(entries[0].size, Some(1));
        assert!(entries[3].is_dir);
        assert_eq!(entries[3].size, None);
    }

    #[actix_web::test]
    async fn child_hrefs_below_subdirectory() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("a/b")).unwrap();

        let dir = resolve_path(tmp.path(), "/a").unwrap();
        let entries = read_entries(&dir).await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].href, "/a/b");
    }
}
