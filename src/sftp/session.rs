//! SFTP session over an authenticated SSH connection.
//!
//! One session per transfer request; the walk owns it exclusively and it is
//! closed on every exit path when the surrounding [`SshSession`] drops.

use std::path::Path;

use russh_sftp::client::SftpSession as RusshSftpSession;
use russh_sftp::protocol::FileAttributes;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::debug;

use super::error::SftpError;
use super::path_utils::path_prefixes;
use super::transfer::TransferControl;
use crate::ssh::SshSession;

/// Copy granularity for file transfers; also the progress tick granularity.
const CHUNK_SIZE: usize = 64 * 1024;

/// Per-chunk progress callback: `(bytes_transferred_so_far, total_bytes)`.
pub type StepFn<'a> = &'a mut (dyn FnMut(u64, u64) + Send);

pub struct SftpSession {
    sftp: RusshSftpSession,
}

impl SftpSession {
    /// Open the SFTP subsystem on a fresh channel of `session`.
    pub async fn open(session: &SshSession) -> Result<Self, SftpError> {
        let channel = session
            .open_channel()
            .await
            .map_err(|e| SftpError::ChannelError(e.to_string()))?;

        channel.request_subsystem(true, "sftp").await.map_err(|e| {
            SftpError::SubsystemNotAvailable(format!("Failed to request SFTP subsystem: {}", e))
        })?;

        let sftp = RusshSftpSession::new(channel.into_stream())
            .await
            .map_err(|e| SftpError::SubsystemNotAvailable(e.to_string()))?;

        debug!("SFTP subsystem opened");
        Ok(Self { sftp })
    }

    /// Stat a remote path (follows symlinks).
    pub async fn metadata(&self, path: &str) -> Result<FileAttributes, SftpError> {
        self.sftp
            .metadata(path)
            .await
            .map_err(|e| SftpError::ProtocolError(e.to_string()))
    }

    /// Read a remote directory into `(name, attributes)` pairs, in whatever
    /// order the server returns them.
    pub async fn read_dir(&self, path: &str) -> Result<Vec<(String, FileAttributes)>, SftpError> {
        let entries = self
            .sftp
            .read_dir(path)
            .await
            .map_err(|e| SftpError::ProtocolError(e.to_string()))?;

        Ok(entries
            .into_iter()
            .map(|entry| (entry.file_name(), entry.metadata()))
            .collect())
    }

    /// Create a remote directory and any missing parents, ignoring failures.
    /// An already-existing component is the common case; a genuinely
    /// unreachable path surfaces on the first file write into it.
    pub async fn create_dir_all_idempotent(&self, path: &str) {
        for prefix in path_prefixes(path) {
            if let Err(e) = self.sftp.create_dir(&prefix).await {
                debug!("mkdir {} ignored: {}", prefix, e);
            }
        }
    }

    /// Upload one local file to an exact remote path, reporting progress per
    /// chunk. Every remote chunk operation is raced against cancellation, so
    /// a cancel interrupts even an in-flight write to a stalled remote.
    pub async fn upload_file(
        &self,
        local_path: &Path,
        remote_path: &str,
        control: &TransferControl,
        step: StepFn<'_>,
    ) -> Result<(), SftpError> {
        let total = tokio::fs::metadata(local_path).await?.len();

        let mut local_file = tokio::fs::File::open(local_path).await?;
        let mut remote_file = self
            .sftp
            .create(remote_path)
            .await
            .map_err(|e| SftpError::ProtocolError(e.to_string()))?;

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut transferred = 0u64;

        loop {
            if control.is_cancelled() {
                debug!("Upload of {} cancelled at {} bytes", remote_path, transferred);
                return Err(SftpError::TransferCancelled);
            }

            let bytes_read = local_file.read(&mut buffer).await?;
            if bytes_read == 0 {
                break;
            }

            // Race the remote write against cancellation. A stalled remote
            // never yields a chunk boundary, so the flag alone is not enough.
            tokio::select! {
                biased;
                _ = control.cancelled() => {
                    debug!("Upload of {} cancelled mid-write at {} bytes", remote_path, transferred);
                    return Err(SftpError::TransferCancelled);
                }
                written = remote_file.write_all(&buffer[..bytes_read]) => {
                    written.map_err(|e| SftpError::ProtocolError(e.to_string()))?;
                }
            }

            transferred += bytes_read as u64;
            step(transferred, total);
        }

        tokio::select! {
            biased;
            _ = control.cancelled() => return Err(SftpError::TransferCancelled),
            flushed = remote_file.flush() => {
                flushed.map_err(|e| SftpError::ProtocolError(e.to_string()))?;
            }
        }

        // An empty file produced no chunks; still report it complete.
        if total == 0 {
            step(0, 0);
        }

        debug!("Uploaded {} ({} bytes)", remote_path, transferred);
        Ok(())
    }

    /// Download one remote file to an exact local path; same progress and
    /// cancellation contract as [`Self::upload_file`].
    pub async fn download_file(
        &self,
        remote_path: &str,
        local_path: &Path,
        control: &TransferControl,
        step: StepFn<'_>,
    ) -> Result<(), SftpError> {
        let total = self.metadata(remote_path).await?.size.unwrap_or(0);

        let mut remote_file = self
            .sftp
            .open(remote_path)
            .await
            .map_err(|e| SftpError::ProtocolError(e.to_string()))?;
        let mut local_file = tokio::fs::File::create(local_path).await?;

        let mut buffer = vec![0u8; CHUNK_SIZE];
        let mut transferred = 0u64;

        loop {
            if control.is_cancelled() {
                debug!("Download of {} cancelled at {} bytes", remote_path, transferred);
                return Err(SftpError::TransferCancelled);
            }

            // Same race as the upload side: a remote that stops answering
            // reads must still observe cancellation.
            let bytes_read = tokio::select! {
                biased;
                _ = control.cancelled() => {
                    debug!("Download of {} cancelled mid-read at {} bytes", remote_path, transferred);
                    return Err(SftpError::TransferCancelled);
                }
                read = remote_file.read(&mut buffer) => {
                    read.map_err(|e| SftpError::ProtocolError(e.to_string()))?
                }
            };
            if bytes_read == 0 {
                break;
            }

            local_file.write_all(&buffer[..bytes_read]).await?;

            transferred += bytes_read as u64;
            step(transferred, total);
        }

        local_file.flush().await?;

        if total == 0 {
            step(0, 0);
        }

        debug!("Downloaded {} ({} bytes)", remote_path, transferred);
        Ok(())
    }
}
