//! Error definitions

use std::io;

use serde::{Deserialize, Serialize};

use crate::client::{Endpoint, OpenMode};

/// Result type returned by remote primitives.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Explicit failure signal reported by a remote primitive.
///
/// End-of-file and short reads/writes are never reported through this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RemoteError {
    /// The endpoint could not be reached, or refused the connection.
    Unreachable,

    /// The connection or file handle is unknown to the remote.
    ///
    /// This is what a remote reports for a handle that has already been released.
    InvalidHandle,

    /// The path does not exist on the remote.
    NotFound,

    /// An offset lies beyond the end of the file.
    OutOfRange,

    /// The operation is not supported for this handle's mode or this path's kind.
    Unsupported,

    /// Any other failure reported by the remote.
    Io(String),
}

impl std::error::Error for RemoteError {}

impl std::fmt::Display for RemoteError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RemoteError::Unreachable => write!(f, "remote unreachable"),
            RemoteError::InvalidHandle => write!(f, "invalid handle"),
            RemoteError::NotFound => write!(f, "no such file or directory"),
            RemoteError::OutOfRange => write!(f, "offset out of range"),
            RemoteError::Unsupported => write!(f, "operation not supported"),
            RemoteError::Io(msg) => write!(f, "remote io error: {}", msg),
        }
    }
}

impl From<io::Error> for RemoteError {
    fn from(e: io::Error) -> Self {
        match e.kind() {
            io::ErrorKind::NotFound => Self::NotFound,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionReset
            | io::ErrorKind::NotConnected => Self::Unreachable,
            io::ErrorKind::Unsupported | io::ErrorKind::PermissionDenied => Self::Unsupported,
            io::ErrorKind::UnexpectedEof => Self::OutOfRange,
            _ => Self::Io(e.to_string()),
        }
    }
}

/// Errors surfaced by remote file operations.
#[derive(Debug, Clone, PartialEq)]
pub enum HfsError {
    /// Unable to establish a connection with the endpoint.
    Connection {
        endpoint: Endpoint,
        source: RemoteError,
    },

    /// The path could not be opened in the requested mode.
    Open {
        path: String,
        mode: OpenMode,
        source: RemoteError,
    },

    /// A read primitive reported a failure.
    Read(RemoteError),

    /// A write primitive reported a failure.
    Write(RemoteError),

    /// Moving the sequential cursor failed.
    Seek { position: u64, source: RemoteError },

    /// Querying the sequential cursor failed.
    Tell(RemoteError),

    /// Flushing buffered writes failed.
    Flush(RemoteError),

    /// Releasing the file handle or the connection failed.
    Close(RemoteError),

    /// Fetching metadata failed.
    Stat(RemoteError),

    /// The path vanished while the file was open.
    NotFound(String),

    /// The operation is not legal for the mode the file was opened in.
    InvalidMode {
        operation: &'static str,
        mode: OpenMode,
    },

    /// The file has already been closed.
    Closed,

    /// A whole-file read was attempted while the sequential cursor was not at the start.
    CursorNotAtStart(u64),

    /// Line reads need a chunk length of at least one byte.
    InvalidChunkLength,
}

impl std::error::Error for HfsError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HfsError::Connection { source, .. }
            | HfsError::Open { source, .. }
            | HfsError::Seek { source, .. } => Some(source),
            HfsError::Read(e)
            | HfsError::Write(e)
            | HfsError::Tell(e)
            | HfsError::Flush(e)
            | HfsError::Close(e)
            | HfsError::Stat(e) => Some(e),
            _ => None,
        }
    }
}

impl std::fmt::Display for HfsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HfsError::Connection { endpoint, source } => {
                write!(f, "failed connecting to {}: {}", endpoint, source)
            }
            HfsError::Open { path, mode, source } => {
                write!(f, "failed opening <{}> in mode '{}': {}", path, mode, source)
            }
            HfsError::Read(e) => write!(f, "read failure: {}", e),
            HfsError::Write(e) => write!(f, "write failure: {}", e),
            HfsError::Seek { position, source } => {
                write!(f, "failed seeking to {}: {}", position, source)
            }
            HfsError::Tell(e) => write!(f, "tell failure: {}", e),
            HfsError::Flush(e) => write!(f, "flush failure: {}", e),
            HfsError::Close(e) => write!(f, "close failure: {}", e),
            HfsError::Stat(e) => write!(f, "stat failure: {}", e),
            HfsError::NotFound(path) => write!(f, "<{}> no longer exists", path),
            HfsError::InvalidMode { operation, mode } => {
                write!(f, "{} is not allowed on a file opened in mode '{}'", operation, mode)
            }
            HfsError::Closed => write!(f, "file is closed"),
            HfsError::CursorNotAtStart(pos) => write!(
                f,
                "whole-file read requires the sequential cursor at 0, found {}",
                pos
            ),
            HfsError::InvalidChunkLength => write!(f, "chunk length must be non-zero"),
        }
    }
}

impl From<HfsError> for io::Error {
    fn from(e: HfsError) -> Self {
        let kind = match &e {
            HfsError::Connection { .. } => io::ErrorKind::ConnectionRefused,
            HfsError::Open {
                source: RemoteError::NotFound,
                ..
            }
            | HfsError::NotFound(_) => io::ErrorKind::NotFound,
            HfsError::InvalidMode { .. } => io::ErrorKind::Unsupported,
            HfsError::CursorNotAtStart(_) | HfsError::InvalidChunkLength => {
                io::ErrorKind::InvalidInput
            }
            HfsError::Closed => io::ErrorKind::NotConnected,
            _ => io::ErrorKind::Other,
        };

        io::Error::new(kind, e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_mapping() {
        let e = RemoteError::from(io::Error::new(io::ErrorKind::NotFound, "gone"));
        assert_eq!(e, RemoteError::NotFound);

        let e = RemoteError::from(io::Error::new(io::ErrorKind::Other, "disk on fire"));
        assert!(matches!(e, RemoteError::Io(msg) if msg.contains("disk on fire")));
    }

    #[test]
    fn test_hfs_error_into_io() {
        let e = HfsError::Open {
            path: "/missing".to_owned(),
            mode: OpenMode::Read,
            source: RemoteError::NotFound,
        };
        let io_err: io::Error = e.into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotFound);

        let io_err: io::Error = HfsError::Closed.into();
        assert_eq!(io_err.kind(), io::ErrorKind::NotConnected);
    }

    #[test]
    fn test_error_source() {
        use std::error::Error;

        let e = HfsError::Read(RemoteError::InvalidHandle);
        assert_eq!(
            e.source().map(|s| s.to_string()),
            Some(RemoteError::InvalidHandle.to_string())
        );
        assert!(HfsError::Closed.source().is_none());
    }
}
