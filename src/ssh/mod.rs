//! SSH connection layer: client, agent auth, exec channel.

pub mod agent;
pub mod client;
pub mod error;
pub mod exec;
pub mod session;

pub use client::{ClientHandler, SshClient};
pub use error::SshError;
pub use exec::ExecOutput;
pub use session::SshSession;
