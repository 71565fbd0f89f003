//! SSH client built on russh
//!
//! Resolves a [`ServerProfile`]'s auth mode into an authenticated connection.
//! The identity-file path carries a one-shot fallback: if the key turns out to
//! be encrypted, the key is loaded into the running ssh-agent (interactively)
//! and authentication is retried over the same handle using the agent.

use std::net::ToSocketAddrs;
use std::sync::Arc;
use std::time::Duration;

use russh::client;
use russh::keys::key::PrivateKeyWithHashAlg;
use russh::keys::PublicKey;
use tracing::{debug, info};

use super::agent::{self, SshAgentClient};
use super::error::SshError;
use super::session::SshSession;
use crate::registry::{AuthMode, ServerProfile};

/// Connection establishment timeout.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// True when key loading failed because the key is passphrase-protected.
fn is_encrypted_key_error(err: &russh::keys::Error) -> bool {
    let msg = err.to_string().to_lowercase();
    msg.contains("encrypted") || msg.contains("passphrase") || msg.contains("could not be parsed")
}

pub struct SshClient {
    profile: ServerProfile,
}

impl SshClient {
    pub fn new(profile: ServerProfile) -> Self {
        Self { profile }
    }

    /// Connect and authenticate, returning a live session.
    pub async fn connect(self) -> Result<SshSession, SshError> {
        let profile = &self.profile;

        if profile.auth_mode == AuthMode::Password {
            return Err(SshError::PasswordAuthUnsupported);
        }

        let addr = format!("{}:{}", profile.host, profile.port);
        info!("Connecting to {} as {}", addr, profile.user);

        let socket_addr = addr
            .to_socket_addrs()
            .map_err(|e| SshError::ConnectionFailed(format!("Failed to resolve address: {}", e)))?
            .next()
            .ok_or_else(|| SshError::ConnectionFailed(format!("No address found for {}", addr)))?;

        let ssh_config = client::Config {
            keepalive_interval: Some(Duration::from_secs(30)),
            keepalive_max: 3,
            ..Default::default()
        };

        let handler = ClientHandler::new(profile.host.clone(), profile.port);

        let mut handle = tokio::time::timeout(
            CONNECT_TIMEOUT,
            client::connect(Arc::new(ssh_config), socket_addr, handler),
        )
        .await
        .map_err(|_| SshError::Timeout("Connection timed out".to_string()))?
        .map_err(|e| SshError::ConnectionFailed(e.to_string()))?;

        debug!("SSH handshake completed with {}", addr);

        let authenticated = match profile.auth_mode {
            AuthMode::IdentityFile => {
                let key_path = profile.identity_file.as_deref().ok_or_else(|| {
                    SshError::KeyError(format!(
                        "Server \"{}\" is missing identity file",
                        profile.name
                    ))
                })?;

                match russh::keys::load_secret_key(key_path, None) {
                    Ok(key) => {
                        let key_with_hash = PrivateKeyWithHashAlg::new(Arc::new(key), None);
                        handle
                            .authenticate_publickey(&profile.user, key_with_hash)
                            .await
                            .map_err(|e| SshError::AuthenticationFailed(e.to_string()))?
                    }
                    Err(e) if is_encrypted_key_error(&e) => {
                        info!("Encrypted key at {}, falling back to ssh-agent", key_path);
                        let status = agent::ensure_identity_in_agent(key_path).await;
                        if !agent::is_agent_available() || !status.is_loaded() {
                            return Err(SshError::KeyError(format!(
                                "Encrypted key detected at {}. Could not load it into \
                                 ssh-agent automatically; run `ssh-add {}` and retry.",
                                key_path, key_path
                            )));
                        }

                        let mut agent = SshAgentClient::connect().await?;
                        agent.authenticate(&mut handle, &profile.user).await?;
                        client::AuthResult::Success
                    }
                    Err(e) => return Err(SshError::KeyError(e.to_string())),
                }
            }
            AuthMode::SshAgent => {
                if !agent::is_agent_available() {
                    return Err(SshError::AgentNotAvailable(
                        "SSH_AUTH_SOCK is not set. Start an ssh-agent or use identity_file \
                         auth mode."
                            .to_string(),
                    ));
                }
                let mut agent = SshAgentClient::connect().await?;
                agent.authenticate(&mut handle, &profile.user).await?;
                client::AuthResult::Success
            }
            AuthMode::Password => return Err(SshError::PasswordAuthUnsupported),
        };

        if !authenticated.success() {
            return Err(SshError::AuthenticationFailed(
                "Authentication rejected by server".to_string(),
            ));
        }

        info!("SSH authentication successful for {}", addr);
        Ok(SshSession::new(handle))
    }
}

/// russh callback handler.
///
/// Host keys are accepted on first use without persistence, the same trust
/// model as `StrictHostKeyChecking=accept-new`; the fingerprint is logged so
/// a suspicious host can be spotted.
pub struct ClientHandler {
    host: String,
    port: u16,
}

impl ClientHandler {
    pub fn new(host: String, port: u16) -> Self {
        Self { host, port }
    }
}

impl client::Handler for ClientHandler {
    type Error = SshError;

    async fn check_server_key(
        &mut self,
        server_public_key: &PublicKey,
    ) -> Result<bool, Self::Error> {
        info!(
            "Accepting host key for {}:{} (fingerprint: {})",
            self.host,
            self.port,
            server_public_key.fingerprint(Default::default())
        );
        Ok(true)
    }
}
