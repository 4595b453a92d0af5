//! Buffered, line-oriented access to files on a block-replicated remote store.
//!
//! The remote is reached through the primitives of [RemoteClient]. A [RemoteFile](fs::RemoteFile)
//! owns one connection and one file handle, and rebuilds newline-delimited records on top of
//! positional reads.

pub mod fs;

pub use hfs_core::{
    local, mem, ConnHandle, Endpoint, FileHandle, FileStat, HfsError, ObjectKind, OpenHints,
    OpenMode, Permissions, RemoteClient, RemoteError, RemoteResult,
};

/// Default constants used between a client and the remote.
pub mod defaults {

    /// Host name that selects the remote configured on the client side
    pub const DEFAULT_HOST: &str = "default";
    /// The default port used by the remote
    pub const DEFAULT_PORT: u16 = 8020;
    /// Number of bytes fetched per round trip when reading lines
    pub const DEFAULT_CHUNK_LEN: usize = 100;

    pub use hfs_core::{DEFAULT_BLOCK_SIZE, DEFAULT_REPLICATION};
}
