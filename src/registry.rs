//! Server profile registry
//!
//! Reads the server list maintained by the bookkeeping CLI from
//! `~/.skiff/servers.json`. The transfer engine only ever reads profiles;
//! add/update/delete live elsewhere.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tokio::fs;
use tracing::warn;

/// How a server authenticates an SSH connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuthMode {
    IdentityFile,
    SshAgent,
    Password,
}

/// A configured remote server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerProfile {
    pub name: String,
    pub host: String,
    pub port: u16,
    pub user: String,
    pub auth_mode: AuthMode,
    /// Private key path; required when `auth_mode` is `identity_file`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_file: Option<String>,
}

/// On-disk shape of the servers file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct ServersFile {
    #[serde(default)]
    servers: Vec<ServerProfile>,
}

/// Read-only view over the servers file.
#[derive(Debug, Clone)]
pub struct ServerRegistry {
    path: PathBuf,
}

impl ServerRegistry {
    /// Registry at the default location, `~/.skiff/servers.json`.
    pub fn new() -> Option<Self> {
        dirs::home_dir().map(|home| Self {
            path: home.join(".skiff").join("servers.json"),
        })
    }

    /// Registry backed by an explicit file path.
    pub fn with_path(path: PathBuf) -> Self {
        Self { path }
    }

    /// Load all profiles. A missing or unparsable file yields an empty list;
    /// the bookkeeping CLI owns repairing it.
    pub async fn load(&self) -> Vec<ServerProfile> {
        let contents = match fs::read_to_string(&self.path).await {
            Ok(c) => c,
            Err(_) => return Vec::new(),
        };

        match serde_json::from_str::<ServersFile>(&contents) {
            Ok(file) => file.servers,
            Err(e) => {
                warn!("Servers file {:?} is unparsable: {}", self.path, e);
                Vec::new()
            }
        }
    }

    /// Look up a single profile by name.
    pub async fn get(&self, name: &str) -> Option<ServerProfile> {
        self.load().await.into_iter().find(|s| s.name == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_json() -> &'static str {
        r#"{
            "servers": [
                {"name": "demo", "host": "demo.example.com", "port": 22,
                 "user": "deploy", "authMode": "identity_file",
                 "identityFile": "/home/me/.ssh/demo"},
                {"name": "agenty", "host": "10.0.0.5", "port": 2222,
                 "user": "ops", "authMode": "ssh_agent"}
            ]
        }"#
    }

    #[tokio::test]
    async fn missing_file_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let registry = ServerRegistry::with_path(dir.path().join("servers.json"));
        assert!(registry.load().await.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_yields_empty_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(&path, "{not json").unwrap();
        let registry = ServerRegistry::with_path(path);
        assert!(registry.load().await.is_empty());
    }

    #[tokio::test]
    async fn loads_profiles_and_looks_up_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("servers.json");
        std::fs::write(&path, sample_json()).unwrap();
        let registry = ServerRegistry::with_path(path);

        let servers = registry.load().await;
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].auth_mode, AuthMode::IdentityFile);
        assert_eq!(servers[0].identity_file.as_deref(), Some("/home/me/.ssh/demo"));

        let agenty = registry.get("agenty").await.unwrap();
        assert_eq!(agenty.port, 2222);
        assert_eq!(agenty.auth_mode, AuthMode::SshAgent);
        assert!(agenty.identity_file.is_none());

        assert!(registry.get("ghost").await.is_none());
    }
}
