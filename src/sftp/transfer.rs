//! Transfer orchestration and cooperative cancellation.
//!
//! One `TransferRequest` maps to one SSH connection, one SFTP session and one
//! walk. Cancellation is a watch-channel flag; each remote chunk operation is
//! raced against it, so even a stalled remote stops when the flag is set.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info};

use super::error::SftpError;
use super::session::SftpSession;
use super::walk::TransferWalk;
use crate::progress::ProgressBroadcaster;
use crate::registry::ServerProfile;
use crate::ssh::{SshClient, SshError};

/// Which way the bytes flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransferDirection {
    Upload,
    Download,
}

/// Body of `POST /api/transfer`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub server: String,
    pub direction: TransferDirection,
    pub local_path: String,
    pub remote_path: String,
}

/// Everything that can end a transfer early.
#[derive(Error, Debug)]
pub enum TransferError {
    #[error(transparent)]
    Connect(#[from] SshError),

    #[error(transparent)]
    Sftp(#[from] SftpError),

    #[error("Transfer canceled by user")]
    Canceled,
}

/// Shared cancellation flag for one transfer.
#[derive(Debug, Clone)]
pub struct TransferControl {
    cancel_tx: watch::Sender<bool>,
    cancel_rx: watch::Receiver<bool>,
}

impl TransferControl {
    pub fn new() -> Self {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        Self { cancel_tx, cancel_rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.cancel_rx.borrow()
    }

    /// Resolves when the transfer is cancelled; immediately if it already
    /// was. Raced against chunk I/O so a stalled remote cannot pin a
    /// cancelled transfer until the next chunk boundary.
    pub async fn cancelled(&self) {
        let mut rx = self.cancel_rx.clone();
        loop {
            if *rx.borrow() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone without a cancel; nothing left to wait for.
                std::future::pending::<()>().await;
            }
        }
    }

    pub fn cancel(&self) {
        let _ = self.cancel_tx.send(true);
    }

    /// RAII guard that cancels this control when dropped. The HTTP handler
    /// holds one so a client disconnect (which drops the handler future)
    /// stops the spawned walk at its next chunk boundary.
    pub fn cancel_guard(&self) -> CancelGuard {
        CancelGuard {
            control: self.clone(),
        }
    }
}

impl Default for TransferControl {
    fn default() -> Self {
        Self::new()
    }
}

pub struct CancelGuard {
    control: TransferControl,
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        // Cancelling an already-finished transfer is a no-op.
        self.control.cancel();
    }
}

/// Run a complete transfer: connect, open SFTP, walk, close.
///
/// The connection is closed on every exit path — success, walk error and
/// cancellation. Errors observed while the control is cancelled are reported
/// as [`TransferError::Canceled`] rather than whatever the interrupted I/O
/// happened to say.
pub async fn run_transfer(
    profile: ServerProfile,
    request: TransferRequest,
    progress: ProgressBroadcaster,
    control: TransferControl,
) -> Result<(), TransferError> {
    info!(
        server = %profile.name,
        direction = ?request.direction,
        local = %request.local_path,
        remote = %request.remote_path,
        "starting transfer"
    );

    let session = SshClient::new(profile).connect().await?;
    let result = walk(&session, &request, &progress, &control).await;
    session.disconnect().await;

    match result {
        Ok(()) => {
            info!("transfer complete");
            Ok(())
        }
        Err(SftpError::TransferCancelled) => Err(TransferError::Canceled),
        Err(_) if control.is_cancelled() => {
            debug!("suppressing I/O error observed after cancellation");
            Err(TransferError::Canceled)
        }
        Err(e) => Err(e.into()),
    }
}

async fn walk(
    session: &crate::ssh::SshSession,
    request: &TransferRequest,
    progress: &ProgressBroadcaster,
    control: &TransferControl,
) -> Result<(), SftpError> {
    let sftp = SftpSession::open(session).await?;
    let walk = TransferWalk::new(&sftp, progress, control, request.direction);

    match request.direction {
        TransferDirection::Upload => walk.upload(&request.local_path, &request.remote_path).await,
        TransferDirection::Download => {
            walk.download(&request.remote_path, &request.local_path).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn control_starts_uncancelled() {
        let control = TransferControl::new();
        assert!(!control.is_cancelled());
        control.cancel();
        assert!(control.is_cancelled());
    }

    #[test]
    fn clones_share_the_flag() {
        let control = TransferControl::new();
        let clone = control.clone();
        control.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn guard_cancels_on_drop() {
        let control = TransferControl::new();
        {
            let _guard = control.cancel_guard();
            assert!(!control.is_cancelled());
        }
        assert!(control.is_cancelled());
    }

    #[tokio::test]
    async fn cancelled_resolves_immediately_when_already_set() {
        let control = TransferControl::new();
        control.cancel();
        tokio::time::timeout(std::time::Duration::from_secs(1), control.cancelled())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn cancel_interrupts_a_stalled_chunk_operation() {
        // Shape of the per-chunk race in SftpSession: the chunk I/O never
        // completes, cancellation from another task must win the select.
        let control = TransferControl::new();
        let canceller = control.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            canceller.cancel();
        });

        let outcome: Result<(), SftpError> = tokio::select! {
            biased;
            _ = control.cancelled() => Err(SftpError::TransferCancelled),
            _ = std::future::pending::<()>() => Ok(()),
        };
        assert!(matches!(outcome, Err(SftpError::TransferCancelled)));
    }

    #[test]
    fn canceled_error_has_the_user_facing_message() {
        assert_eq!(TransferError::Canceled.to_string(), "Transfer canceled by user");
        assert_eq!(
            TransferError::from(SftpError::TransferCancelled).to_string(),
            "Transfer canceled by user"
        );
    }

    #[test]
    fn request_accepts_camel_case_wire_names() {
        let req: TransferRequest = serde_json::from_str(
            r#"{"server":"demo","direction":"upload",
                "localPath":"/tmp/src","remotePath":"/home/u/dst"}"#,
        )
        .unwrap();
        assert_eq!(req.direction, TransferDirection::Upload);
        assert_eq!(req.local_path, "/tmp/src");
        assert_eq!(req.remote_path, "/home/u/dst");
    }
}
