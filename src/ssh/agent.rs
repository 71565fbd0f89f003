//! SSH Agent integration
//!
//! Two concerns live here: authenticating against the system agent via
//! russh's [`AgentClient`], and best-effort loading of an encrypted identity
//! file into the agent by spawning `ssh-add` (interactively, so the user can
//! type the passphrase on the controlling terminal).

use std::future::Future;
use std::path::Path;
use std::process::Stdio;

use russh::client::Handle;
use russh::keys::agent::client::{AgentClient, AgentStream};
use russh::keys::ssh_key;
use russh::{AgentAuthError, CryptoVec, Signer};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::client::ClientHandler;
use super::error::SshError;

/// Outcome of trying to get an identity file into the running agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentLoadStatus {
    Added,
    AlreadyLoaded,
    SkippedNoAgent,
    Failed,
}

impl AgentLoadStatus {
    /// Whether the key is now usable through the agent.
    pub fn is_loaded(&self) -> bool {
        matches!(self, AgentLoadStatus::Added | AgentLoadStatus::AlreadyLoaded)
    }
}

/// Make sure the given private key is loaded into the running ssh-agent.
///
/// Checks `ssh-add -T <key>.pub` first to avoid prompting when the key is
/// already usable, then runs `ssh-add <key>` with inherited stdio so the
/// passphrase prompt reaches the user.
pub async fn ensure_identity_in_agent(private_key_path: &str) -> AgentLoadStatus {
    if std::env::var("SSH_AUTH_SOCK").is_err() {
        return AgentLoadStatus::SkippedNoAgent;
    }

    let public_key_path = format!("{}.pub", private_key_path);
    if Path::new(&public_key_path).exists() {
        // Best-effort optimization only; a failed probe just means we go on
        // to adding the key.
        match Command::new("ssh-add")
            .arg("-T")
            .arg(&public_key_path)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
        {
            Ok(out) if out.status.success() => {
                debug!("Key {} already loaded in agent", private_key_path);
                return AgentLoadStatus::AlreadyLoaded;
            }
            Ok(_) => {}
            Err(e) => debug!("ssh-add -T probe failed: {}", e),
        }
    }

    info!("Loading {} into ssh-agent (may prompt for a passphrase)", private_key_path);
    match Command::new("ssh-add")
        .arg(private_key_path)
        .stdin(Stdio::inherit())
        .stdout(Stdio::inherit())
        .stderr(Stdio::inherit())
        .status()
        .await
    {
        Ok(status) if status.success() => AgentLoadStatus::Added,
        Ok(_) | Err(_) => AgentLoadStatus::Failed,
    }
}

/// Check if an SSH Agent socket appears to be present in the environment.
pub fn is_agent_available() -> bool {
    std::env::var("SSH_AUTH_SOCK").is_ok()
}

/// Send-safe wrapper around [`AgentClient`] implementing the [`Signer`] trait.
///
/// russh's built-in `impl Signer for AgentClient` borrows the public key
/// across an `.await`, which the compiler cannot prove `Send` through RPITIT.
/// Cloning the key into the async block sidesteps that; the clone is cheap.
struct AgentSigner<'a> {
    agent: &'a mut AgentClient<Box<dyn AgentStream + Send + Unpin + 'static>>,
}

impl Signer for AgentSigner<'_> {
    type Error = AgentAuthError;

    fn auth_publickey_sign(
        &mut self,
        key: &ssh_key::PublicKey,
        hash_alg: Option<ssh_key::HashAlg>,
        to_sign: CryptoVec,
    ) -> impl Future<Output = Result<CryptoVec, Self::Error>> + Send {
        let key_owned = key.clone();
        async move {
            self.agent
                .sign_request(&key_owned, hash_alg, to_sign)
                .await
                .map_err(Into::into)
        }
    }
}

/// Client for authenticating through the system SSH Agent.
pub struct SshAgentClient {
    agent: AgentClient<Box<dyn AgentStream + Send + Unpin + 'static>>,
}

impl SshAgentClient {
    /// Connect to the agent socket named by `SSH_AUTH_SOCK`.
    pub async fn connect() -> Result<Self, SshError> {
        let agent = AgentClient::connect_env().await.map_err(|e| {
            SshError::AgentNotAvailable(format!(
                "Failed to connect to SSH Agent: {}. \
                 Make sure SSH_AUTH_SOCK is set and ssh-agent is running.",
                e
            ))
        })?;
        debug!("Connected to SSH Agent via SSH_AUTH_SOCK");
        Ok(Self {
            agent: agent.dynamic(),
        })
    }

    /// Try each agent-held key against the server until one is accepted.
    pub async fn authenticate(
        &mut self,
        handle: &mut Handle<ClientHandler>,
        username: &str,
    ) -> Result<(), SshError> {
        let keys = self
            .agent
            .request_identities()
            .await
            .map_err(|e| SshError::AgentError(format!("Failed to list agent keys: {}", e)))?;

        if keys.is_empty() {
            return Err(SshError::AgentError(
                "SSH Agent has no keys loaded. Add keys with: ssh-add".to_string(),
            ));
        }

        debug!("SSH Agent reports {} key(s)", keys.len());

        let mut last_error: Option<String> = None;
        for key in &keys {
            match handle
                .authenticate_publickey_with(
                    username,
                    key.clone(),
                    None,
                    &mut AgentSigner {
                        agent: &mut self.agent,
                    },
                )
                .await
            {
                Ok(result) if result.success() => {
                    info!("SSH Agent authentication succeeded with key: {}", key.comment());
                    return Ok(());
                }
                Ok(_rejected) => {
                    debug!("Key rejected by server: {}", key.comment());
                }
                Err(e) => {
                    warn!("Agent signing error for key {}: {}", key.comment(), e);
                    last_error = Some(e.to_string());
                }
            }
        }

        Err(SshError::AgentError(format!(
            "No agent key was accepted by the server (tried {} key(s)){}",
            keys.len(),
            last_error
                .map(|e| format!(". Last error: {}", e))
                .unwrap_or_default()
        )))
    }
}
