//! Remote file metadata

use std::{fmt::Display, time::SystemTime};

use serde::{Deserialize, Serialize};

/// Replication factor used when the open hint is `0`.
pub const DEFAULT_REPLICATION: u16 = 3;

/// Block size used when the open hint is `0`.
pub const DEFAULT_BLOCK_SIZE: u64 = 64 * 1024 * 1024;

/// Kind of object residing at a remote path
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ObjectKind {
    File,
    Directory,
}

/// Permission bits (rwx for owner, group, others)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions(u16);

impl Permissions {
    pub fn from_mode(mode: u16) -> Self {
        Self(mode & 0o777)
    }

    pub fn mode(&self) -> u16 {
        self.0
    }
}

impl Display for Permissions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for shift in [6, 3, 0] {
            let bits = (self.0 >> shift) & 0o7;
            let r = if bits & 0o4 != 0 { 'r' } else { '-' };
            let w = if bits & 0o2 != 0 { 'w' } else { '-' };
            let x = if bits & 0o1 != 0 { 'x' } else { '-' };
            write!(f, "{}{}{}", r, w, x)?;
        }

        Ok(())
    }
}

/// Snapshot of remote metadata for one path.
///
/// Fetched fresh on every call; two snapshots of the same path may disagree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileStat {
    pub kind: ObjectKind,
    /// Path the snapshot was taken for
    pub name: String,
    /// Size in bytes
    pub size: u64,
    pub last_modified: SystemTime,
    pub last_access: SystemTime,
    /// Number of block replicas
    pub replication: u16,
    pub block_size: u64,
    pub owner: String,
    pub group: String,
    pub permissions: Permissions,
}

impl FileStat {
    pub fn is_file(&self) -> bool {
        self.kind == ObjectKind::File
    }

    pub fn is_dir(&self) -> bool {
        self.kind == ObjectKind::Directory
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permissions_display() {
        assert_eq!(Permissions::from_mode(0o755).to_string(), "rwxr-xr-x");
        assert_eq!(Permissions::from_mode(0o640).to_string(), "rw-r-----");
        // file type bits are dropped
        assert_eq!(Permissions::from_mode(0o100644).mode(), 0o644);
    }
}
