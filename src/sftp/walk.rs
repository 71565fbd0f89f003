//! Recursive transfer walks.
//!
//! Upload and download are symmetric state machines: stat the root, create
//! the destination directory for a directory root, transfer the directory's
//! files, then recurse into its sub-directories, all in raw readdir order and
//! skipping dot-files. Only regular files and directories are handled;
//! symlinks and special files are silently skipped.
//!
//! The walk is not transactional: if file N of M fails, files 1..N-1 stay
//! transferred and the error aborts the remainder. That trade-off is
//! deliberate for an interactive tool — the user retries the visible leftover.

use std::path::Path;

use tokio::fs;
use tracing::debug;

use super::error::SftpError;
use super::path_utils::{join_remote_path, remote_basename};
use super::session::SftpSession;
use super::transfer::{TransferControl, TransferDirection};
use crate::progress::{ProgressBroadcaster, ProgressEvent};

pub struct TransferWalk<'a> {
    sftp: &'a SftpSession,
    progress: &'a ProgressBroadcaster,
    control: &'a TransferControl,
    direction: TransferDirection,
}

impl<'a> TransferWalk<'a> {
    pub fn new(
        sftp: &'a SftpSession,
        progress: &'a ProgressBroadcaster,
        control: &'a TransferControl,
        direction: TransferDirection,
    ) -> Self {
        Self {
            sftp,
            progress,
            control,
            direction,
        }
    }

    /// Upload `local_path` into the existing remote directory `remote_dir`.
    ///
    /// A file lands at `remote_dir/basename`; a directory becomes
    /// `remote_dir/basename/` with its tree underneath.
    pub async fn upload(&self, local_path: &str, remote_dir: &str) -> Result<(), SftpError> {
        let metadata = fs::metadata(local_path).await?;
        if metadata.is_dir() {
            self.upload_dir(Path::new(local_path), remote_dir).await
        } else if metadata.is_file() {
            self.upload_file(Path::new(local_path), remote_dir).await
        } else {
            debug!("Skipping special file {}", local_path);
            Ok(())
        }
    }

    async fn upload_dir(&self, local: &Path, remote_dir: &str) -> Result<(), SftpError> {
        let dir_name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let next_remote = if dir_name.is_empty() {
            remote_dir.to_string()
        } else {
            join_remote_path(remote_dir, &dir_name)
        };

        self.sftp.create_dir_all_idempotent(&next_remote).await;

        // Files first, then sub-directories, each in readdir order.
        let mut subdirs = Vec::new();
        let mut read_dir = fs::read_dir(local).await?;
        while let Some(entry) = read_dir.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with('.') {
                continue;
            }
            // Dirent type, unfollowed: symlinked children are skipped.
            let file_type = entry.file_type().await?;
            if file_type.is_dir() {
                subdirs.push(entry.path());
            } else if file_type.is_file() {
                self.upload_file(&entry.path(), &next_remote).await?;
            }
        }
        for subdir in subdirs {
            Box::pin(self.upload_dir(&subdir, &next_remote)).await?;
        }
        Ok(())
    }

    async fn upload_file(&self, local: &Path, remote_dir: &str) -> Result<(), SftpError> {
        let file_name = local
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                SftpError::ProtocolError(format!("Path {:?} has no file name", local))
            })?;
        let remote_path = join_remote_path(remote_dir, &file_name);

        let progress = self.progress;
        let direction = self.direction;
        let tag = remote_path.clone();
        self.sftp
            .upload_file(local, &remote_path, self.control, &mut |transferred, total| {
                progress.emit(ProgressEvent::new(direction, &tag, transferred, total));
            })
            .await
    }

    /// Download `remote_path` into the existing local directory `local_dir`.
    pub async fn download(&self, remote_path: &str, local_dir: &str) -> Result<(), SftpError> {
        let attrs = self.sftp.metadata(remote_path).await?;
        if attrs.is_dir() {
            self.download_dir(remote_path, Path::new(local_dir)).await
        } else {
            self.download_file(remote_path, Path::new(local_dir)).await
        }
    }

    async fn download_dir(&self, remote: &str, local_dir: &Path) -> Result<(), SftpError> {
        let next_local = local_dir.join(remote_basename(remote));
        fs::create_dir_all(&next_local).await?;

        // Files first, then sub-directories, each in readdir order.
        let mut subdirs = Vec::new();
        for (name, attrs) in self.sftp.read_dir(remote).await? {
            if name == "." || name == ".." || name.starts_with('.') {
                continue;
            }
            let child = join_remote_path(remote.trim_end_matches('/'), &name);
            if attrs.is_dir() {
                subdirs.push(child);
            } else if attrs.is_regular() {
                self.download_file(&child, &next_local).await?;
            } else {
                debug!("Skipping non-regular remote entry {}", child);
            }
        }
        for subdir in subdirs {
            Box::pin(self.download_dir(&subdir, &next_local)).await?;
        }
        Ok(())
    }

    async fn download_file(&self, remote: &str, local_dir: &Path) -> Result<(), SftpError> {
        let final_local = local_dir.join(remote_basename(remote));

        let progress = self.progress;
        let direction = self.direction;
        // Download events are tagged with the remote source path.
        self.sftp
            .download_file(remote, &final_local, self.control, &mut |transferred, total| {
                progress.emit(ProgressEvent::new(direction, remote, transferred, total));
            })
            .await
    }
}
