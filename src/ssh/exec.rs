//! One-shot remote command execution over an exec channel.
//!
//! Used by the browse listing: a single `cd && pwd && ls -la` round trip is
//! cheaper than an SFTP stat+readdir per entry. Captures stdout, stderr and
//! the exit status.

use std::time::Duration;

use russh::ChannelMsg;
use tracing::debug;

use super::error::SshError;
use super::session::SshSession;

/// How long a browse command may run before the channel is abandoned.
const EXEC_TIMEOUT: Duration = Duration::from_secs(30);

/// Captured output of a remote command.
#[derive(Debug)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<u32>,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

impl SshSession {
    /// Run `command` on the remote host and drain the channel to completion.
    pub async fn exec(&self, command: &str) -> Result<ExecOutput, SshError> {
        debug!("exec: {}", command);

        let mut channel = self.open_channel().await?;
        channel
            .exec(true, command)
            .await
            .map_err(|e| SshError::ChannelError(format!("Failed to exec command: {}", e)))?;

        let mut stdout: Vec<u8> = Vec::new();
        let mut stderr: Vec<u8> = Vec::new();
        let mut exit_code: Option<u32> = None;

        let drained = tokio::time::timeout(EXEC_TIMEOUT, async {
            loop {
                match channel.wait().await {
                    Some(ChannelMsg::Data { ref data }) => stdout.extend_from_slice(data),
                    Some(ChannelMsg::ExtendedData { ref data, ext: 1 }) => {
                        stderr.extend_from_slice(data)
                    }
                    Some(ChannelMsg::ExitStatus { exit_status }) => {
                        exit_code = Some(exit_status);
                    }
                    Some(ChannelMsg::Eof) | Some(ChannelMsg::Close) | None => break,
                    _ => {}
                }
            }
        })
        .await;

        if drained.is_err() {
            let _ = channel.close().await;
            return Err(SshError::Timeout(format!(
                "Remote command did not complete within {:?}",
                EXEC_TIMEOUT
            )));
        }

        Ok(ExecOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code,
        })
    }
}
