//! HTTP listener binding with port fallback.
//!
//! The preferred port may be held by a previous instance; walk upward a
//! bounded number of times before giving up. Any error other than
//! "address in use" is fatal immediately.

use std::io;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Default HTTP port for the transfer UI.
pub const DEFAULT_PORT: u16 = 3847;

/// Default number of consecutive ports to try.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 10;

#[derive(Error, Debug)]
pub enum BindError {
    #[error("Failed to bind {addr}: {source}")]
    Fatal {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("Unable to bind a port starting at {start} after {attempts} attempts: {last}")]
    Exhausted {
        start: u16,
        attempts: u32,
        #[source]
        last: io::Error,
    },
}

/// Bind `host:preferred`, incrementing the port on "address in use" up to
/// `max_attempts` total attempts.
pub async fn bind_with_fallback(
    host: &str,
    preferred: u16,
    max_attempts: u32,
) -> Result<TcpListener, BindError> {
    let mut port = preferred;
    let mut last: Option<io::Error> = None;

    for _ in 0..max_attempts {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => {
                if port != preferred {
                    info!("Preferred port {} was taken, bound {} instead", preferred, port);
                }
                return Ok(listener);
            }
            Err(e) if e.kind() == io::ErrorKind::AddrInUse => {
                warn!("Port {} is in use, trying {}", port, port.saturating_add(1));
                last = Some(e);
                match port.checked_add(1) {
                    Some(next) => port = next,
                    None => break,
                }
            }
            Err(e) => {
                return Err(BindError::Fatal {
                    addr: format!("{}:{}", host, port),
                    source: e,
                })
            }
        }
    }

    Err(BindError::Exhausted {
        start: preferred,
        attempts: max_attempts,
        last: last.unwrap_or_else(|| {
            io::Error::new(io::ErrorKind::AddrInUse, "no bind attempts were made")
        }),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn falls_back_past_an_occupied_port() {
        let occupied = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let taken = occupied.local_addr().unwrap().port();

        let listener = bind_with_fallback("127.0.0.1", taken, 5).await.unwrap();
        let bound = listener.local_addr().unwrap().port();
        assert_ne!(bound, taken);
        assert!(bound > taken);
    }

    #[tokio::test]
    async fn exhausts_after_the_attempt_budget() {
        let occupied = TcpListener::bind(("127.0.0.1", 0)).await.unwrap();
        let taken = occupied.local_addr().unwrap().port();

        let err = bind_with_fallback("127.0.0.1", taken, 1).await.unwrap_err();
        match err {
            BindError::Exhausted { start, attempts, .. } => {
                assert_eq!(start, taken);
                assert_eq!(attempts, 1);
            }
            other => panic!("expected Exhausted, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn zero_attempts_is_exhausted_immediately() {
        let err = bind_with_fallback("127.0.0.1", 0, 0).await.unwrap_err();
        assert!(matches!(err, BindError::Exhausted { .. }));
    }
}
