use std::io;

/// Why the control channel could not be opened or stopped working.
///
/// Carried inside `ConnectionState::Failed`; never returned as `Err` from
/// the connection manager.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConnectionError {
    #[error("connection refused")]
    Refused,

    #[error("host unreachable")]
    Unreachable,

    #[error("connection reset by robot")]
    Reset,

    /// A write did not complete within the write timeout.
    #[error("robot stopped reading commands")]
    Stalled,

    #[error("{0}")]
    Io(String),
}

impl From<io::Error> for ConnectionError {
    fn from(err: io::Error) -> Self {
        match err.kind() {
            io::ErrorKind::ConnectionRefused => ConnectionError::Refused,
            io::ErrorKind::HostUnreachable | io::ErrorKind::NetworkUnreachable => {
                ConnectionError::Unreachable
            }
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::BrokenPipe => ConnectionError::Reset,
            // Platforms report an expired socket timeout as either kind.
            io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut => ConnectionError::Stalled,
            _ => ConnectionError::Io(err.to_string()),
        }
    }
}
