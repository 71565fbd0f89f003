//! Local directory listing.

use std::io;
use std::path::PathBuf;

use tokio::fs;

use super::{sort_entries, FileEntry, Listing};

/// List a local directory, defaulting to the user's home when `path` is
/// empty. Dot-files are skipped, as are entries that fail to stat.
pub async fn list_local(path: Option<&str>) -> io::Result<Listing> {
    let dir: PathBuf = match path {
        Some(p) if !p.is_empty() => PathBuf::from(p),
        _ => dirs::home_dir().ok_or_else(|| {
            io::Error::new(io::ErrorKind::NotFound, "Could not determine home directory")
        })?,
    };

    let mut read_dir = fs::read_dir(&dir).await?;
    let mut files = Vec::new();

    while let Some(entry) = read_dir.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.starts_with('.') {
            continue;
        }
        // Follows symlinks, like the remote side's ls does for sizes.
        let metadata = match fs::metadata(entry.path()).await {
            Ok(m) => m,
            Err(_) => continue,
        };
        files.push(FileEntry {
            name,
            is_dir: metadata.is_dir(),
            size: metadata.len(),
        });
    }

    sort_entries(&mut files);
    Ok(Listing {
        path: dir.to_string_lossy().into_owned(),
        files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_entries_skipping_dot_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.txt"), b"hello").unwrap();
        std::fs::write(dir.path().join(".hidden"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("sub")).unwrap();

        let listing = list_local(Some(dir.path().to_str().unwrap())).await.unwrap();

        assert_eq!(listing.path, dir.path().to_string_lossy());
        let names: Vec<_> = listing.files.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["sub", "b.txt"]);
        assert!(listing.files[0].is_dir);
        assert_eq!(listing.files[1].size, 5);
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let gone = dir.path().join("nope");
        assert!(list_local(Some(gone.to_str().unwrap())).await.is_err());
    }
}
