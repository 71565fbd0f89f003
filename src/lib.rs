//! skiff — a small local web tool for moving files between the local
//! filesystem and a remote host over SFTP.
//!
//! The embedded HTTP server exposes directory listings, a transfer endpoint
//! and a Server-Sent Events progress stream; the browser UI is a thin client
//! on top of that API.

pub mod listing;
pub mod progress;
pub mod registry;
pub mod server;
pub mod sftp;
pub mod ssh;

pub use progress::{ProgressBroadcaster, ProgressEvent};
pub use registry::{AuthMode, ServerProfile, ServerRegistry};
pub use sftp::{run_transfer, TransferControl, TransferDirection, TransferError, TransferRequest};
pub use ssh::SshError;
