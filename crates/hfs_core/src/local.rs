//! Local filesystem backend.
//!
//! Remote paths are resolved under a base directory, which stands in for the remote namespace.
//! This mirrors connecting to the "local" filesystem instead of a cluster.

use std::{
    collections::HashMap,
    io::SeekFrom,
    path::{Path, PathBuf},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use futures::lock::Mutex;
use tokio::{
    fs::{self, File, OpenOptions},
    io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt},
};

use crate::{
    client::{ConnHandle, Endpoint, FileHandle, OpenHints, OpenMode, RemoteClient},
    error::{RemoteError, RemoteResult},
    stat::{FileStat, ObjectKind, Permissions, DEFAULT_BLOCK_SIZE},
};

/// Remote client backed by a local directory.
#[derive(Clone, Debug)]
pub struct LocalFs {
    /// Starting directory for the backend.
    ///
    /// Paths outside this directory cannot be reached.
    base: PathBuf,

    state: Arc<Mutex<LocalState>>,
}

#[derive(Debug, Default)]
struct LocalState {
    connections: HashMap<ConnHandle, Endpoint>,
    files: HashMap<FileHandle, LocalHandle>,
    next_id: u64,
}

#[derive(Debug)]
struct LocalHandle {
    conn: ConnHandle,
    file: File,
    mode: OpenMode,
}

impl LocalState {
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

    fn handle_mut(&mut self, conn: ConnHandle, file: FileHandle) -> RemoteResult<&mut LocalHandle> {
        self.check_conn(conn)?;

        match self.files.get_mut(&file) {
            Some(h) if h.conn == conn => Ok(h),
            _ => Err(RemoteError::InvalidHandle),
        }
    }

    fn reader_mut(&mut self, conn: ConnHandle, file: FileHandle) -> RemoteResult<&mut File> {
        let handle = self.handle_mut(conn, file)?;

        match handle.mode {
            OpenMode::Read => Ok(&mut handle.file),
            OpenMode::Write => Err(RemoteError::Unsupported),
        }
    }

    fn writer_mut(&mut self, conn: ConnHandle, file: FileHandle) -> RemoteResult<&mut File> {
        let handle = self.handle_mut(conn, file)?;

        match handle.mode {
            OpenMode::Write => Ok(&mut handle.file),
            OpenMode::Read => Err(RemoteError::Unsupported),
        }
    }
}

impl LocalFs {
    pub fn new<P: AsRef<Path>>(base: P) -> Self {
        Self {
            base: base.as_ref().to_path_buf(),
            state: Default::default(),
        }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Checks if a provided path contains prev-dir path segments `..`.
    /// Paths are not resolved at the OS-level, as they might not exist yet.
    fn contains_backdir<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().components().any(|segment| segment.as_os_str() == "..")
    }

    /// Resolve a remote path to a path under the base directory.
    ///
    /// Absolute remote paths are taken relative to the base.
    /// Paths with 'backdirs' are not resolved.
    fn resolve_path(&self, path: &str) -> RemoteResult<PathBuf> {
        let relative = path.trim_start_matches('/');

        match Self::contains_backdir(relative) {
            true => Err(RemoteError::NotFound),
            false => Ok(self.base.join(relative)),
        }
    }
}

fn system_time_or_epoch(t: std::io::Result<SystemTime>) -> SystemTime {
    t.unwrap_or(UNIX_EPOCH)
}

#[cfg(unix)]
fn ownership(meta: &std::fs::Metadata) -> (String, String, u16) {
    use std::os::unix::fs::MetadataExt;

    (
        meta.uid().to_string(),
        meta.gid().to_string(),
        (meta.mode() & 0o777) as u16,
    )
}

#[cfg(not(unix))]
fn ownership(meta: &std::fs::Metadata) -> (String, String, u16) {
    let mode = match meta.permissions().readonly() {
        true => 0o444,
        false => 0o644,
    };

    (String::new(), String::new(), mode)
}

#[async_trait]
impl RemoteClient for LocalFs {
    async fn connect(&self, endpoint: &Endpoint) -> RemoteResult<ConnHandle> {
        let reachable = fs::metadata(&self.base)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false);

        if !reachable {
            log::debug!("base directory {:?} unavailable", self.base);
            return Err(RemoteError::Unreachable);
        }

        let mut state = self.state.lock().await;
        let conn = ConnHandle::from_raw(state.next_id());
        state.connections.insert(conn, endpoint.clone());
        log::debug!("connection {} to {} rooted at {:?}", conn, endpoint, self.base);

        Ok(conn)
    }

    async fn disconnect(&self, conn: ConnHandle) -> RemoteResult<()> {
        let mut state = self.state.lock().await;

        state
            .connections
            .remove(&conn)
            .ok_or(RemoteError::InvalidHandle)?;
        state.files.retain(|_, h| h.conn != conn);

        Ok(())
    }

    async fn open_file(
        &self,
        conn: ConnHandle,
        path: &str,
        mode: OpenMode,
        hints: OpenHints,
    ) -> RemoteResult<FileHandle> {
        let full_path = self.resolve_path(path)?;
        let mut state = self.state.lock().await;
        state.check_conn(conn)?;

        log::debug!("opening {:?} in mode '{}' ({:?})", full_path, mode, hints);

        let file = match mode {
            OpenMode::Read => {
                let meta = fs::metadata(&full_path).await?;
                if !meta.is_file() {
                    return Err(RemoteError::Unsupported);
                }
                OpenOptions::new().read(true).open(&full_path).await?
            }
            OpenMode::Write => {
                OpenOptions::new()
                    .write(true)
                    .create(true)
                    .truncate(true)
                    .open(&full_path)
                    .await?
            }
        };

        let handle = FileHandle::from_raw(state.next_id());
        state.files.insert(handle, LocalHandle { conn, file, mode });

        Ok(handle)
    }

    async fn close_file(&self, conn: ConnHandle, file: FileHandle) -> RemoteResult<()> {
        let mut state = self.state.lock().await;
        state.handle_mut(conn, file)?;

        if let Some(mut h) = state.files.remove(&file) {
            if h.mode == OpenMode::Write {
                h.file.flush().await?;
            }
        }

        Ok(())
    }

    async fn seek(&self, conn: ConnHandle, file: FileHandle, offset: u64) -> RemoteResult<()> {
        let mut state = self.state.lock().await;
        let f = state.reader_mut(conn, file)?;

        if offset > f.metadata().await?.len() {
            return Err(RemoteError::OutOfRange);
        }

        f.seek(SeekFrom::Start(offset)).await?;
        Ok(())
    }

    async fn tell(&self, conn: ConnHandle, file: FileHandle) -> RemoteResult<u64> {
        let mut state = self.state.lock().await;
        let f = &mut state.handle_mut(conn, file)?.file;

        Ok(f.seek(SeekFrom::Current(0)).await?)
    }

    async fn read(&self, conn: ConnHandle, file: FileHandle, len: usize) -> RemoteResult<Vec<u8>> {
        let mut state = self.state.lock().await;
        let f = state.reader_mut(conn, file)?;

        let mut buf = Vec::new();
        (&mut *f).take(len as u64).read_to_end(&mut buf).await?;

        Ok(buf)
    }

    async fn write(&self, conn: ConnHandle, file: FileHandle, bytes: &[u8]) -> RemoteResult<usize> {
        let mut state = self.state.lock().await;
        let f = state.writer_mut(conn, file)?;

        // a local file never accepts less than everything
        f.write_all(bytes).await?;
        Ok(bytes.len())
    }

    async fn pread(
        &self,
        conn: ConnHandle,
        file: FileHandle,
        position: u64,
        len: usize,
    ) -> RemoteResult<Vec<u8>> {
        let mut state = self.state.lock().await;
        let f = state.reader_mut(conn, file)?;

        // the sequential cursor is restored afterwards
        let saved = f.seek(SeekFrom::Current(0)).await?;
        f.seek(SeekFrom::Start(position)).await?;

        let mut buf = Vec::new();
        let read_res = (&mut *f).take(len as u64).read_to_end(&mut buf).await;
        f.seek(SeekFrom::Start(saved)).await?;

        read_res?;
        Ok(buf)
    }

    async fn flush(&self, conn: ConnHandle, file: FileHandle) -> RemoteResult<()> {
        let mut state = self.state.lock().await;
        let f = state.writer_mut(conn, file)?;

        Ok(f.flush().await?)
    }

    async fn stat(&self, conn: ConnHandle, path: &str) -> RemoteResult<Option<FileStat>> {
        self.state.lock().await.check_conn(conn)?;

        let full_path = match self.resolve_path(path) {
            Ok(p) => p,
            Err(RemoteError::NotFound) => return Ok(None),
            Err(e) => return Err(e),
        };

        let meta = match fs::metadata(&full_path).await {
            Ok(m) => m,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let (owner, group, mode) = ownership(&meta);

        Ok(Some(FileStat {
            kind: match meta.is_dir() {
                true => ObjectKind::Directory,
                false => ObjectKind::File,
            },
            name: path.to_owned(),
            size: meta.len(),
            last_modified: system_time_or_epoch(meta.modified()),
            last_access: system_time_or_epoch(meta.accessed()),
            replication: 1,
            block_size: DEFAULT_BLOCK_SIZE,
            owner,
            group,
            permissions: Permissions::from_mode(mode),
        }))
    }

    async fn exists(&self, conn: ConnHandle, path: &str) -> RemoteResult<bool> {
        Ok(self.stat(conn, path).await?.is_some())
    }
}
