//! SFTP error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SftpError {
    #[error("Channel error: {0}")]
    ChannelError(String),

    #[error("SFTP subsystem not available: {0}")]
    SubsystemNotAvailable(String),

    #[error("SFTP protocol error: {0}")]
    ProtocolError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Transfer canceled by user")]
    TransferCancelled,
}
