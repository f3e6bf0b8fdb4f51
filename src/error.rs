use std::io;

use thiserror::Error;

/// Errors that end a session (or stop it before it starts).
#[derive(Debug, Error)]
pub enum PingError {
    #[error("cannot resolve {host}: {reason}")]
    Resolution { host: String, reason: String },
    #[error("raw ICMP socket requires root or CAP_NET_RAW: {0}")]
    Permission(#[source] io::Error),
    #[error("failed to configure socket: {0}")]
    SocketConfig(#[source] io::Error),
    #[error("failed to open raw ICMP socket: {0}")]
    Socket(#[source] io::Error),
    #[error("sendto failed: {0}")]
    Send(#[source] io::Error),
    #[error("failed to install signal handler: {0}")]
    Signal(#[source] io::Error),
    #[error("invalid configuration: {0}")]
    Config(String),
}

impl PingError {
    /// Classifies a socket(2) failure, keeping privilege problems distinct.
    pub fn from_open(err: io::Error) -> Self {
        let denied = err.kind() == io::ErrorKind::PermissionDenied
            || matches!(err.raw_os_error(), Some(libc::EPERM) | Some(libc::EACCES));
        if denied {
            PingError::Permission(err)
        } else {
            PingError::Socket(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eperm_maps_to_permission() {
        let err = PingError::from_open(io::Error::from_raw_os_error(libc::EPERM));
        assert!(matches!(err, PingError::Permission(_)));
        assert!(err.to_string().contains("CAP_NET_RAW"));
    }

    #[test]
    fn other_open_errors_stay_generic() {
        let err = PingError::from_open(io::Error::from_raw_os_error(libc::EMFILE));
        assert!(matches!(err, PingError::Socket(_)));
    }
}
