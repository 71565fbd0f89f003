//! A live, authenticated SSH connection.

use russh::client::{self, Handle};
use russh::{Channel, Disconnect};
use tracing::debug;

use super::client::ClientHandler;
use super::error::SshError;

/// Owns the russh handle for the duration of one transfer or listing request.
/// Dropping the session closes the connection; [`SshSession::disconnect`]
/// does it politely.
pub struct SshSession {
    handle: Handle<ClientHandler>,
}

impl std::fmt::Debug for SshSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SshSession").finish_non_exhaustive()
    }
}

impl SshSession {
    pub(crate) fn new(handle: Handle<ClientHandler>) -> Self {
        Self { handle }
    }

    /// Open a fresh session channel (for an exec command or a subsystem).
    pub async fn open_channel(&self) -> Result<Channel<client::Msg>, SshError> {
        self.handle
            .channel_open_session()
            .await
            .map_err(|e| SshError::ChannelError(e.to_string()))
    }

    /// Best-effort clean shutdown.
    pub async fn disconnect(self) {
        debug!("Disconnecting SSH session");
        let _ = self
            .handle
            .disconnect(Disconnect::ByApplication, "", "English")
            .await;
    }
}
