//! Directory listings for the side-by-side browser.
//!
//! Local and remote listings are deliberately separate code paths: the local
//! side reads the filesystem directly, the remote side runs one `ls -la` over
//! an exec channel because a browse click needs a single round trip, not an
//! SFTP stat per entry. The transfer walk (sftp module) keeps using SFTP,
//! which has typed entries and streaming file handles.

pub mod local;
pub mod remote;

use serde::{Deserialize, Serialize};

/// One row in a directory listing. Always a fresh snapshot, never cached.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    pub is_dir: bool,
    pub size: u64,
}

/// A resolved directory path with its entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Listing {
    pub path: String,
    pub files: Vec<FileEntry>,
}

/// Directories first, then case-insensitive by name.
pub(crate) fn sort_entries(entries: &mut [FileEntry]) {
    entries.sort_by(|a, b| {
        if a.is_dir != b.is_dir {
            return b.is_dir.cmp(&a.is_dir);
        }
        a.name.to_lowercase().cmp(&b.name.to_lowercase())
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn directories_sort_before_files() {
        let mut entries = vec![
            FileEntry { name: "zeta.txt".into(), is_dir: false, size: 1 },
            FileEntry { name: "Alpha".into(), is_dir: true, size: 0 },
            FileEntry { name: "beta.txt".into(), is_dir: false, size: 2 },
            FileEntry { name: "gamma".into(), is_dir: true, size: 0 },
        ];
        sort_entries(&mut entries);
        let names: Vec<_> = entries.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["Alpha", "gamma", "beta.txt", "zeta.txt"]);
    }
}
