//! In-process remote store.
//!
//! [`MemStore`] keeps an entire namespace in memory. Clones share the same namespace,
//! so a writer and a reader created from the same store see each other's data.
//! Live connections and handles are tracked so resource leaks can be asserted on.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
    time::SystemTime,
};

use async_trait::async_trait;
use futures::lock::Mutex;
use rand::Rng;

use crate::{
    client::{ConnHandle, Endpoint, FileHandle, OpenHints, OpenMode, RemoteClient},
    error::{RemoteError, RemoteResult},
    stat::{FileStat, ObjectKind, Permissions, DEFAULT_BLOCK_SIZE, DEFAULT_REPLICATION},
};

const OWNER: &str = "hfs";
const GROUP: &str = "supergroup";

/// Remote store held entirely in memory.
#[derive(Clone, Debug, Default)]
pub struct MemStore {
    inner: Arc<Mutex<Namespace>>,

    /// Reads are cut short every 1 in `frac` calls on average.
    short_read_frac: Option<u32>,

    /// Writes accept only part of their bytes every 1 in `frac` calls on average.
    short_write_frac: Option<u32>,

    /// Every `close_file` is rejected.
    failing_close: bool,
}

#[derive(Debug, Default)]
struct Namespace {
    /// Endpoints that accept connections
    endpoints: HashSet<Endpoint>,
    entries: HashMap<String, Entry>,
    connections: HashMap<ConnHandle, Endpoint>,
    handles: HashMap<FileHandle, OpenEntry>,
    next_id: u64,
    /// Number of `write` calls received
    writes: usize,
}

#[derive(Debug, Clone)]
struct Entry {
    kind: ObjectKind,
    data: Vec<u8>,
    modified: SystemTime,
    accessed: SystemTime,
    replication: u16,
    block_size: u64,
    permissions: u16,
}

#[derive(Debug)]
struct OpenEntry {
    conn: ConnHandle,
    path: String,
    mode: OpenMode,
    /// Sequential cursor
    cursor: u64,
}

impl Entry {
    fn new(kind: ObjectKind, hints: OpenHints) -> Self {
        let now = SystemTime::now();

        Self {
            kind,
            data: Vec::new(),
            modified: now,
            accessed: now,
            replication: match hints.replication {
                0 => DEFAULT_REPLICATION,
                r => r,
            },
            block_size: match hints.block_size {
                0 => DEFAULT_BLOCK_SIZE,
                b => b,
            },
            permissions: match kind {
                ObjectKind::File => 0o644,
                ObjectKind::Directory => 0o755,
            },
        }
    }

    fn stat(&self, path: &str) -> FileStat {
        FileStat {
            kind: self.kind,
            name: path.to_owned(),
            size: self.data.len() as u64,
            last_modified: self.modified,
            last_access: self.accessed,
            replication: self.replication,
            block_size: self.block_size,
            owner: OWNER.to_owned(),
            group: GROUP.to_owned(),
            permissions: Permissions::from_mode(self.permissions),
        }
    }
}

impl MemStore {
    /// Create an empty store that accepts connections on the given endpoints.
    pub fn new<I: IntoIterator<Item = Endpoint>>(endpoints: I) -> Self {
        Self {
            inner: Arc::new(Mutex::new(Namespace {
                endpoints: endpoints.into_iter().collect(),
                ..Default::default()
            })),
            short_read_frac: None,
            short_write_frac: None,
            failing_close: false,
        }
    }

    /// Simulate short reads: on average 1 in `frac` reads returns only a (non-empty) prefix
    /// of the bytes available.
    pub fn with_short_reads(mut self, frac: u32) -> Self {
        self.short_read_frac = Some(frac.max(1));

        self
    }

    /// Simulate short writes: on average 1 in `frac` writes accepts only a (non-empty) prefix
    /// of the bytes given.
    pub fn with_short_writes(mut self, frac: u32) -> Self {
        self.short_write_frac = Some(frac.max(1));

        self
    }

    /// Reject every `close_file` call. The handle stays open until its connection is dropped.
    pub fn with_failing_close(mut self) -> Self {
        self.failing_close = true;

        self
    }

    /// Create or replace a file with the given contents.
    pub async fn put_file<P: Into<String>>(&self, path: P, contents: &[u8]) {
        let mut entry = Entry::new(ObjectKind::File, OpenHints::default());
        entry.data = contents.to_vec();

        self.inner.lock().await.entries.insert(path.into(), entry);
    }

    /// Create a directory entry.
    pub async fn mkdir<P: Into<String>>(&self, path: P) {
        let entry = Entry::new(ObjectKind::Directory, OpenHints::default());

        self.inner.lock().await.entries.insert(path.into(), entry);
    }

    /// Contents of a file, if it exists.
    pub async fn contents(&self, path: &str) -> Option<Vec<u8>> {
        self.inner
            .lock()
            .await
            .entries
            .get(path)
            .filter(|e| e.kind == ObjectKind::File)
            .map(|e| e.data.clone())
    }

    /// Number of connections that have not been disconnected.
    pub async fn live_connections(&self) -> usize {
        self.inner.lock().await.connections.len()
    }

    /// Number of file handles that have not been closed.
    pub async fn open_handles(&self) -> usize {
        self.inner.lock().await.handles.len()
    }

    /// Number of `write` calls received so far, across all connections.
    pub async fn writes_issued(&self) -> usize {
        self.inner.lock().await.writes
    }

    /// Number of bytes to hand out for a read of `available` bytes.
    fn read_len(&self, available: usize) -> usize {
        partial_len(self.short_read_frac, available, "read")
    }

    /// Number of bytes to accept from a write of `available` bytes.
    fn write_len(&self, available: usize) -> usize {
        partial_len(self.short_write_frac, available, "write")
    }
}

/// Either `available`, or a random non-empty part of it with a chance of 1 in `frac`.
fn partial_len(frac: Option<u32>, available: usize, op: &str) -> usize {
    match frac {
        Some(frac) if available > 1 && probability_frac(frac) => {
            let len = rand::thread_rng().gen_range(1..available);
            log::debug!("short {}: {} of {} bytes", op, len, available);
            len
        }
        _ => available,
    }
}

/// Returns the outcome of the probability of getting `1` in `frac`.
fn probability_frac(frac: u32) -> bool {
    let rand_num: u64 = rand::random();
    let threshold = u64::MAX / frac as u64;

    rand_num < threshold
}

impl Namespace {
    fn next_id(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }

    fn check_conn(&self, conn: ConnHandle) -> RemoteResult<()> {
        match self.connections.contains_key(&conn) {
            true => Ok(()),
            false => Err(RemoteError::InvalidHandle),
        }
    }

    /// Look up an open handle belonging to `conn`, along with the entry it refers to.
    fn handle_mut(
        &mut self,
        conn: ConnHandle,
        file: FileHandle,
    ) -> RemoteResult<(&mut OpenEntry, &mut Entry)> {
        self.check_conn(conn)?;

        let handle = match self.handles.get_mut(&file) {
            Some(h) if h.conn == conn => h,
            _ => return Err(RemoteError::InvalidHandle),
        };

        // the entry can be replaced or removed behind an open handle
        let entry = self
            .entries
            .get_mut(&handle.path)
            .ok_or(RemoteError::NotFound)?;

        Ok((handle, entry))
    }

    fn open(
        &mut self,
        conn: ConnHandle,
        path: &str,
        mode: OpenMode,
        hints: OpenHints,
    ) -> RemoteResult<FileHandle> {
        self.check_conn(conn)?;

        let existing = self.entries.get(path).map(|e| e.kind);

        match (mode, existing) {
            (_, Some(ObjectKind::Directory)) => return Err(RemoteError::Unsupported),
            (OpenMode::Read, None) => return Err(RemoteError::NotFound),
            (OpenMode::Read, Some(_)) => (),
            (OpenMode::Write, _) => {
                self.entries
                    .insert(path.to_owned(), Entry::new(ObjectKind::File, hints));
            }
        }

        let file = FileHandle::from_raw(self.next_id());
        self.handles.insert(
            file,
            OpenEntry {
                conn,
                path: path.to_owned(),
                mode,
                cursor: 0,
            },
        );

        Ok(file)
    }
}

#[async_trait]
impl RemoteClient for MemStore {
    async fn connect(&self, endpoint: &Endpoint) -> RemoteResult<ConnHandle> {
        let mut ns = self.inner.lock().await;

        if !ns.endpoints.contains(endpoint) {
            log::debug!("connection to {} refused", endpoint);
            return Err(RemoteError::Unreachable);
        }

        let conn = ConnHandle::from_raw(ns.next_id());
        ns.connections.insert(conn, endpoint.clone());
        log::debug!("connection {} established with {}", conn, endpoint);

        Ok(conn)
    }

    async fn disconnect(&self, conn: ConnHandle) -> RemoteResult<()> {
        let mut ns = self.inner.lock().await;

        ns.connections
            .remove(&conn)
            .ok_or(RemoteError::InvalidHandle)?;
        ns.handles.retain(|_, h| h.conn != conn);
        log::debug!("connection {} closed", conn);

        Ok(())
    }

    async fn open_file(
        &self,
        conn: ConnHandle,
        path: &str,
        mode: OpenMode,
        hints: OpenHints,
    ) -> RemoteResult<FileHandle> {
        self.inner.lock().await.open(conn, path, mode, hints)
    }

    async fn close_file(&self, conn: ConnHandle, file: FileHandle) -> RemoteResult<()> {
        let mut ns = self.inner.lock().await;
        ns.check_conn(conn)?;

        match ns.handles.get(&file) {
            Some(h) if h.conn == conn => (),
            _ => return Err(RemoteError::InvalidHandle),
        }

        if self.failing_close {
            log::debug!("close of {} on connection {} rejected", file, conn);
            return Err(RemoteError::Io(format!("failed to close {}", file)));
        }

        ns.handles.remove(&file);
        Ok(())
    }

    async fn seek(&self, conn: ConnHandle, file: FileHandle, offset: u64) -> RemoteResult<()> {
        let mut ns = self.inner.lock().await;
        let (handle, entry) = ns.handle_mut(conn, file)?;

        if handle.mode != OpenMode::Read {
            return Err(RemoteError::Unsupported);
        }
        if offset > entry.data.len() as u64 {
            return Err(RemoteError::OutOfRange);
        }

        handle.cursor = offset;
        Ok(())
    }

    async fn tell(&self, conn: ConnHandle, file: FileHandle) -> RemoteResult<u64> {
        let mut ns = self.inner.lock().await;
        let (handle, _) = ns.handle_mut(conn, file)?;

        Ok(handle.cursor)
    }

    async fn read(&self, conn: ConnHandle, file: FileHandle, len: usize) -> RemoteResult<Vec<u8>> {
        let mut ns = self.inner.lock().await;
        let (handle, entry) = ns.handle_mut(conn, file)?;

        if handle.mode != OpenMode::Read {
            return Err(RemoteError::Unsupported);
        }

        let start = (handle.cursor as usize).min(entry.data.len());
        let available = (entry.data.len() - start).min(len);
        let end = start + self.read_len(available);

        handle.cursor = end as u64;
        entry.accessed = SystemTime::now();

        Ok(entry.data[start..end].to_vec())
    }

    async fn write(&self, conn: ConnHandle, file: FileHandle, bytes: &[u8]) -> RemoteResult<usize> {
        let accepted = self.write_len(bytes.len());

        let mut ns = self.inner.lock().await;
        ns.writes += 1;
        let (handle, entry) = ns.handle_mut(conn, file)?;

        if handle.mode != OpenMode::Write {
            return Err(RemoteError::Unsupported);
        }

        entry.data.truncate(handle.cursor as usize);
        entry.data.extend_from_slice(&bytes[..accepted]);
        entry.modified = SystemTime::now();
        handle.cursor += accepted as u64;

        Ok(accepted)
    }

    async fn pread(
        &self,
        conn: ConnHandle,
        file: FileHandle,
        position: u64,
        len: usize,
    ) -> RemoteResult<Vec<u8>> {
        let mut ns = self.inner.lock().await;
        let (handle, entry) = ns.handle_mut(conn, file)?;

        if handle.mode != OpenMode::Read {
            return Err(RemoteError::Unsupported);
        }
        if position >= entry.data.len() as u64 {
            return Ok(Vec::new());
        }

        let start = position as usize;
        let available = (entry.data.len() - start).min(len);
        let end = start + self.read_len(available);
        entry.accessed = SystemTime::now();

        Ok(entry.data[start..end].to_vec())
    }

    async fn flush(&self, conn: ConnHandle, file: FileHandle) -> RemoteResult<()> {
        let mut ns = self.inner.lock().await;
        let (handle, _) = ns.handle_mut(conn, file)?;

        match handle.mode {
            OpenMode::Write => Ok(()),
            OpenMode::Read => Err(RemoteError::Unsupported),
        }
    }

    async fn stat(&self, conn: ConnHandle, path: &str) -> RemoteResult<Option<FileStat>> {
        let ns = self.inner.lock().await;
        ns.check_conn(conn)?;

        Ok(ns.entries.get(path).map(|e| e.stat(path)))
    }

    async fn exists(&self, conn: ConnHandle, path: &str) -> RemoteResult<bool> {
        let ns = self.inner.lock().await;
        ns.check_conn(conn)?;

        Ok(ns.entries.contains_key(path))
    }
}
