//! The remote client contract.
//!
//! All traits here use [`async_trait`] and contain only async functions.

use std::{fmt::Display, str::FromStr};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RemoteResult;
use crate::stat::FileStat;

/// Address of a remote store (host, port).
///
/// A host of `"default"` with port `0` refers to the store configured on the client side.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
}

impl Endpoint {
    pub fn new<H: Into<String>>(host: H, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

impl FromStr for Endpoint {
    type Err = String;

    /// Parses `host:port`. A bare host gets port `0`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once(':') {
            Some((host, port)) => {
                let port = port
                    .parse::<u16>()
                    .map_err(|e| format!("invalid port '{}': {}", port, e))?;
                Ok(Self::new(host, port))
            }
            None => Ok(Self::new(s, 0)),
        }
    }
}

/// Mode a remote file is opened in.
///
/// Write mode creates the file, or truncates it if it already exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OpenMode {
    #[default]
    Read,
    Write,
}

impl Display for OpenMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OpenMode::Read => write!(f, "r"),
            OpenMode::Write => write!(f, "w"),
        }
    }
}

/// Tuning hints passed through to the remote on open.
///
/// A value of `0` means "use the remote's configured default".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OpenHints {
    pub buffer_size: u32,
    pub replication: u16,
    pub block_size: u64,
}

/// Opaque handle to one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnHandle(u64);

/// Opaque handle to one open file on a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(u64);

macro_rules! raw_handle {
    ($($handle: ident),+) => {
        $(impl $handle {
            pub fn from_raw(id: u64) -> Self {
                Self(id)
            }

            pub fn as_raw(&self) -> u64 {
                self.0
            }
        }

        impl Display for $handle {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "#{}", self.0)
            }
        })+
    };
}

raw_handle!(ConnHandle, FileHandle);

/// Primitive operations exposed by a remote store.
///
/// Implementors are assumed correct; every failure is reported as an explicit [`RemoteError`](crate::RemoteError).
/// Absence of a path is an ordinary result ([`None`] / `false`), not an error.
#[async_trait]
pub trait RemoteClient: Send + Sync {
    /// Establish a new connection to the endpoint.
    async fn connect(&self, endpoint: &Endpoint) -> RemoteResult<ConnHandle>;

    /// Tear down a connection. Handles opened on it become invalid.
    async fn disconnect(&self, conn: ConnHandle) -> RemoteResult<()>;

    /// Open a path in the given mode.
    async fn open_file(
        &self,
        conn: ConnHandle,
        path: &str,
        mode: OpenMode,
        hints: OpenHints,
    ) -> RemoteResult<FileHandle>;

    /// Release a file handle.
    async fn close_file(&self, conn: ConnHandle, file: FileHandle) -> RemoteResult<()>;

    /// Move the sequential cursor. Only legal on handles opened for reading.
    async fn seek(&self, conn: ConnHandle, file: FileHandle, offset: u64) -> RemoteResult<()>;

    /// Current offset of the sequential cursor.
    async fn tell(&self, conn: ConnHandle, file: FileHandle) -> RemoteResult<u64>;

    /// Read up to `len` bytes from the sequential cursor, advancing it.
    async fn read(&self, conn: ConnHandle, file: FileHandle, len: usize) -> RemoteResult<Vec<u8>>;

    /// Write bytes at the sequential cursor, returning how many were written.
    async fn write(&self, conn: ConnHandle, file: FileHandle, bytes: &[u8]) -> RemoteResult<usize>;

    /// Read up to `len` bytes starting at `position`.
    ///
    /// Does not depend on or move the sequential cursor.
    async fn pread(
        &self,
        conn: ConnHandle,
        file: FileHandle,
        position: u64,
        len: usize,
    ) -> RemoteResult<Vec<u8>>;

    /// Flush buffered writes to the remote.
    async fn flush(&self, conn: ConnHandle, file: FileHandle) -> RemoteResult<()>;

    /// Fetch metadata for a path, [`None`] if it does not exist.
    async fn stat(&self, conn: ConnHandle, path: &str) -> RemoteResult<Option<FileStat>>;

    /// Check if a path exists.
    async fn exists(&self, conn: ConnHandle, path: &str) -> RemoteResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_parse() {
        let e: Endpoint = "namenode.local:8020".parse().unwrap();
        assert_eq!(e, Endpoint::new("namenode.local", 8020));
        assert_eq!(e.to_string(), "namenode.local:8020");

        let e: Endpoint = "default".parse().unwrap();
        assert_eq!(e.port, 0);

        assert!("host:notaport".parse::<Endpoint>().is_err());
    }
}
