//! Remote directory listing over an exec channel.
//!
//! Runs `cd <path> && pwd && ls -la` in one shot; the `pwd` line canonicalizes
//! `~`/relative input server-side and becomes the path returned to the caller.

use tracing::debug;

use super::{sort_entries, FileEntry, Listing};
use crate::registry::ServerProfile;
use crate::ssh::{SshClient, SshError};

/// List a remote directory for browsing. An empty `path` means the remote
/// home directory.
pub async fn list_remote(profile: &ServerProfile, path: &str) -> Result<Listing, SshError> {
    // `cd "~"` does not expand in a shell; the bare tilde must stay unquoted.
    let command = if path.is_empty() {
        "cd ~ && pwd && ls -la".to_string()
    } else {
        format!("cd \"{}\" && pwd && ls -la", path)
    };

    let session = SshClient::new(profile.clone()).connect().await?;
    let output = session.exec(&command).await;
    session.disconnect().await;
    let output = output?;

    if !output.success() {
        let stderr = output.stderr.trim();
        let message = if stderr.is_empty() {
            match output.exit_code {
                Some(code) => format!("Remote listing failed with exit code {}", code),
                None => "Remote listing failed".to_string(),
            }
        } else {
            stderr.to_string()
        };
        return Err(SshError::CommandFailed(message));
    }

    let listing = parse_listing(&output.stdout, path);
    debug!("Listed {} remote entries in {}", listing.files.len(), listing.path);
    Ok(listing)
}

/// Parse `pwd` + `ls -la` output. The first line is the resolved path, the
/// second is `ls`'s `total` line; each remaining line is
/// `perms links owner group size month day time name...`.
pub(crate) fn parse_listing(stdout: &str, requested_path: &str) -> Listing {
    let lines: Vec<&str> = stdout.lines().filter(|l| !l.trim().is_empty()).collect();

    let resolved_path = lines
        .first()
        .map(|l| l.trim())
        .filter(|l| !l.is_empty())
        .unwrap_or(requested_path)
        .to_string();

    let mut files = Vec::new();
    for line in lines.iter().skip(2) {
        let columns: Vec<&str> = line.split_whitespace().collect();
        if columns.len() < 9 {
            continue;
        }
        let name = columns[8..].join(" ");
        if name == "." || name == ".." || name.starts_with('.') {
            continue;
        }
        files.push(FileEntry {
            is_dir: columns[0].starts_with('d'),
            size: columns[4].parse().unwrap_or(0),
            name,
        });
    }

    sort_entries(&mut files);
    Listing {
        path: resolved_path,
        files,
    }
}
