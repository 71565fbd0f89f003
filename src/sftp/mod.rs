//! SFTP transfer engine: session, recursive walkers, cancellation.

pub mod error;
pub mod path_utils;
pub mod session;
pub mod transfer;
pub mod walk;

pub use error::SftpError;
pub use session::SftpSession;
pub use transfer::{
    run_transfer, CancelGuard, TransferControl, TransferDirection, TransferError, TransferRequest,
};
pub use walk::TransferWalk;
