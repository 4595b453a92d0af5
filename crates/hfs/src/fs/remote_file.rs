//! Remote file and related definitions

use std::fmt::Debug;

use hfs_core::{
    ConnHandle, Endpoint, FileHandle, FileStat, HfsError, OpenHints, OpenMode, RemoteClient,
    RemoteError,
};

use super::LineCursor;

/// Handles owned by an open [RemoteFile]. Released together on close.
#[derive(Clone, Copy, Debug)]
struct OpenHandles {
    conn: ConnHandle,
    file: FileHandle,
}

/// A file that resides on the remote store.
///
/// Every remote file owns a dedicated connection and exactly one file handle
/// for its whole lifetime. Both are released by [RemoteFile::close].
///
/// Two cursors exist side by side:
/// - the sequential cursor of the remote handle, moved by [RemoteFile::seek],
///   [RemoteFile::read_all] and [RemoteFile::write], and reported by [RemoteFile::tell];
/// - the [LineCursor], moved only by [RemoteFile::read_line].
///
/// They are never reconciled. `tell` says nothing about how much was consumed line by line.
pub struct RemoteFile<C: RemoteClient> {
    client: C,
    endpoint: Endpoint,
    path: String,
    mode: OpenMode,

    /// `None` once the file is closed
    handles: Option<OpenHandles>,

    pub(super) line_cursor: LineCursor,
}

/// Options for opening a remote file.
///
/// Attempts to mirror [std::fs::OpenOptions].
#[derive(Clone, Copy, Debug, Default)]
pub struct RemoteOpenOptions {
    mode: OpenMode,
    hints: OpenHints,
}

impl RemoteOpenOptions {
    /// Options for reading, with every hint left to the remote's defaults.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mode(&mut self, mode: OpenMode) -> &mut Self {
        self.mode = mode;

        self
    }

    /// Size of the read/write buffer on the remote side.
    pub fn buffer_size(&mut self, buffer_size: u32) -> &mut Self {
        self.hints.buffer_size = buffer_size;

        self
    }

    /// Block replication of a newly written file.
    pub fn replication(&mut self, replication: u16) -> &mut Self {
        self.hints.replication = replication;

        self
    }

    /// Block size of a newly written file.
    pub fn block_size(&mut self, block_size: u64) -> &mut Self {
        self.hints.block_size = block_size;

        self
    }

    /// Connect to `endpoint` and open `path` with these options.
    ///
    /// Either both the connection and the file handle are acquired, or neither is:
    /// if the open fails, the connection is released before the error is returned.
    pub async fn open<C, P>(&self, client: C, endpoint: Endpoint, path: P) -> Result<RemoteFile<C>, HfsError>
    where
        C: RemoteClient,
        P: AsRef<str>,
    {
        let path = path.as_ref();

        log::info!("connecting to {}", endpoint);
        let conn = client
            .connect(&endpoint)
            .await
            .map_err(|source| HfsError::Connection {
                endpoint: endpoint.clone(),
                source,
            })?;

        let file = match client.open_file(conn, path, self.mode, self.hints).await {
            Ok(f) => f,
            Err(source) => {
                if let Err(e) = client.disconnect(conn).await {
                    log::warn!("failed releasing connection {} to {}: {}", conn, endpoint, e);
                }

                return Err(HfsError::Open {
                    path: path.to_owned(),
                    mode: self.mode,
                    source,
                });
            }
        };

        log::info!("opened <{}> in mode '{}'", path, self.mode);

        Ok(RemoteFile {
            client,
            endpoint,
            path: path.to_owned(),
            mode: self.mode,
            handles: Some(OpenHandles { conn, file }),
            line_cursor: LineCursor::default(),
        })
    }
}

impl<C> RemoteFile<C>
where
    C: RemoteClient,
{
    /// Open an existing file in read-only mode.
    ///
    /// Attempts to mirror [std::fs::File::open]
    pub async fn open<P: AsRef<str>>(client: C, endpoint: Endpoint, path: P) -> Result<Self, HfsError> {
        RemoteOpenOptions::new().open(client, endpoint, path).await
    }

    /// Create a file in write-only mode, truncating it if it exists.
    ///
    /// Attempts to mirror [std::fs::File::create]
    pub async fn create<P: AsRef<str>>(client: C, endpoint: Endpoint, path: P) -> Result<Self, HfsError> {
        RemoteOpenOptions::new()
            .mode(OpenMode::Write)
            .open(client, endpoint, path)
            .await
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn is_open(&self) -> bool {
        self.handles.is_some()
    }

    /// Offset the next [RemoteFile::read_line] starts from.
    pub fn line_position(&self) -> u64 {
        self.line_cursor.offset()
    }

    /// Release the file handle, then the connection.
    ///
    /// Closing an already closed file is a no-op; the stale handles are never sent to the remote.
    /// The connection is released even if closing the file handle fails.
    pub async fn close(&mut self) -> Result<(), HfsError> {
        let OpenHandles { conn, file } = match self.handles.take() {
            Some(h) => h,
            None => {
                log::debug!("<{}> already closed", self.path);
                return Ok(());
            }
        };

        let closed = self.client.close_file(conn, file).await;
        let disconnected = self.client.disconnect(conn).await;
        log::info!("closed <{}> on {}", self.path, self.endpoint);

        closed.and(disconnected).map_err(HfsError::Close)
    }

    /// Move the sequential cursor. Only legal in read mode.
    ///
    /// The line cursor is not affected.
    pub async fn seek(&mut self, position: u64) -> Result<(), HfsError> {
        let h = self.require(OpenMode::Read, "seek")?;

        self.client
            .seek(h.conn, h.file, position)
            .await
            .map_err(|source| HfsError::Seek { position, source })
    }

    /// Current offset of the sequential cursor.
    ///
    /// This does not reflect anything consumed through [RemoteFile::read_line].
    pub async fn tell(&mut self) -> Result<u64, HfsError> {
        let h = self.handles()?;

        self.client
            .tell(h.conn, h.file)
            .await
            .map_err(HfsError::Tell)
    }

    /// Issue a single write of `bytes`, returning the number of bytes the remote accepted.
    ///
    /// There is no retry: a short write is returned as-is and the caller must compare the
    /// count against `bytes.len()`.
    pub async fn write(&mut self, bytes: &[u8]) -> Result<usize, HfsError> {
        let h = self.require(OpenMode::Write, "write")?;

        let written = self
            .client
            .write(h.conn, h.file, bytes)
            .await
            .map_err(HfsError::Write)?;

        if written < bytes.len() {
            log::debug!("short write to <{}>: {} of {} bytes", self.path, written, bytes.len());
        }

        Ok(written)
    }

    /// Flush buffered writes to the remote.
    pub async fn flush(&mut self) -> Result<(), HfsError> {
        let h = self.require(OpenMode::Write, "flush")?;

        self.client
            .flush(h.conn, h.file)
            .await
            .map_err(HfsError::Flush)
    }

    /// Read the whole file with one sequential read sized to the current file size.
    ///
    /// The sequential cursor must be at offset 0, i.e. right after opening or after `seek(0)`.
    /// Otherwise this fails with [HfsError::CursorNotAtStart] instead of returning an offset slice.
    ///
    /// A single read is issued; if the remote returns fewer bytes than the file size,
    /// the short result is returned as-is.
    pub async fn read_all(&mut self) -> Result<Vec<u8>, HfsError> {
        let h = self.require(OpenMode::Read, "read_all")?;

        let position = self.tell().await?;
        if position != 0 {
            return Err(HfsError::CursorNotAtStart(position));
        }

        let size = self.file_size().await?;
        let len = usize::try_from(size).map_err(|_| HfsError::Read(RemoteError::OutOfRange))?;

        let data = self
            .client
            .read(h.conn, h.file, len)
            .await
            .map_err(HfsError::Read)?;

        log::debug!("read {} of {} bytes from <{}>", data.len(), size, self.path);

        Ok(data)
    }

    /// Positional read of up to `len` bytes starting at `position`.
    ///
    /// Returns [None] (end of file) if `position` is at or beyond the file size, as reported by
    /// a fresh stat; the remote is not asked for data in that case.
    /// Otherwise returns exactly what the remote produced, which may be fewer than `len` bytes.
    pub async fn pread_at(&mut self, position: u64, len: usize) -> Result<Option<Vec<u8>>, HfsError> {
        let h = self.require(OpenMode::Read, "pread_at")?;

        if position >= self.file_size().await? {
            return Ok(None);
        }

        let data = self
            .client
            .pread(h.conn, h.file, position, len)
            .await
            .map_err(HfsError::Read)?;

        Ok(Some(data))
    }

    /// Fetch metadata of this file's path. Never cached.
    pub async fn stat(&mut self) -> Result<Option<FileStat>, HfsError> {
        let h = self.handles()?;

        self.client
            .stat(h.conn, &self.path)
            .await
            .map_err(HfsError::Stat)
    }

    /// Check if this file's path still exists on the remote.
    pub async fn exists(&mut self) -> Result<bool, HfsError> {
        let h = self.handles()?;

        self.client
            .exists(h.conn, &self.path)
            .await
            .map_err(HfsError::Stat)
    }

    async fn file_size(&mut self) -> Result<u64, HfsError> {
        match self.stat().await? {
            Some(st) => Ok(st.size),
            None => Err(HfsError::NotFound(self.path.clone())),
        }
    }

    fn handles(&self) -> Result<OpenHandles, HfsError> {
        self.handles.ok_or(HfsError::Closed)
    }

    /// Handles of an open file, if it was opened in `mode`.
    fn require(&self, mode: OpenMode, operation: &'static str) -> Result<OpenHandles, HfsError> {
        let h = self.handles()?;

        match self.mode == mode {
            true => Ok(h),
            false => Err(HfsError::InvalidMode {
                operation,
                mode: self.mode,
            }),
        }
    }
}

impl<C> Debug for RemoteFile<C>
where
    C: RemoteClient,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteFile")
            .field("endpoint", &self.endpoint)
            .field("path", &self.path)
            .field("mode", &self.mode)
            .field("handles", &self.handles)
            .field("line_cursor", &self.line_cursor)
            .finish()
    }
}

impl<C> Drop for RemoteFile<C>
where
    C: RemoteClient,
{
    fn drop(&mut self) {
        if let Some(h) = self.handles {
            log::warn!(
                "<{}> dropped without close, connection {} to {} is leaked",
                self.path,
                h.conn,
                self.endpoint
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hfs_core::mem::MemStore;

    fn endpoint() -> Endpoint {
        Endpoint::new("namenode", 8020)
    }

    async fn store_with(path: &str, contents: &[u8]) -> MemStore {
        let store = MemStore::new([endpoint()]);
        store.put_file(path, contents).await;

        store
    }

    #[tokio::test]
    async fn test_open_unreachable() {
        let store = MemStore::default();

        let res = RemoteFile::open(store.clone(), endpoint(), "/f").await;
        assert!(matches!(
            res,
            Err(HfsError::Connection {
                source: RemoteError::Unreachable,
                ..
            })
        ));
        assert_eq!(store.live_connections().await, 0);
    }

    #[tokio::test]
    async fn test_open_missing_releases_connection() {
        let store = MemStore::new([endpoint()]);

        let res = RemoteFile::open(store.clone(), endpoint(), "/missing").await;
        assert!(matches!(
            res,
            Err(HfsError::Open {
                mode: OpenMode::Read,
                source: RemoteError::NotFound,
                ..
            })
        ));
        assert_eq!(store.live_connections().await, 0);
        assert_eq!(store.open_handles().await, 0);
    }

    #[tokio::test]
    async fn test_double_close() {
        let store = store_with("/f", b"data").await;

        let mut file = RemoteFile::open(store.clone(), endpoint(), "/f").await.unwrap();
        assert_eq!(store.live_connections().await, 1);
        assert!(file.is_open());

        file.close().await.unwrap();
        assert!(!file.is_open());
        assert_eq!(store.live_connections().await, 0);
        assert_eq!(store.open_handles().await, 0);

        // no-op, stale handles are not sent to the remote
        file.close().await.unwrap();

        assert_eq!(file.tell().await, Err(HfsError::Closed));
        assert_eq!(file.read_line().await, Err(HfsError::Closed));
    }

    #[tokio::test]
    async fn test_close_failure_still_disconnects() {
        let store = MemStore::new([endpoint()]).with_failing_close();
        store.put_file("/f", b"data").await;

        let mut file = RemoteFile::open(store.clone(), endpoint(), "/f").await.unwrap();

        assert!(matches!(
            file.close().await,
            Err(HfsError::Close(RemoteError::Io(_)))
        ));
        assert!(!file.is_open());
        assert_eq!(store.live_connections().await, 0);
        assert_eq!(store.open_handles().await, 0);

        file.close().await.unwrap();
        assert_eq!(file.tell().await, Err(HfsError::Closed));
    }

    #[tokio::test]
    async fn test_short_write_not_retried() {
        let store = MemStore::new([endpoint()]).with_short_writes(1);
        let data = b"the remote takes what it can";

        let mut file = RemoteFile::create(store.clone(), endpoint(), "/f").await.unwrap();
        let written = file.write(data).await.unwrap();
        file.close().await.unwrap();

        assert!(written > 0 && written < data.len());
        assert_eq!(store.writes_issued().await, 1);
        assert_eq!(store.contents("/f").await.unwrap(), &data[..written]);
    }

    #[tokio::test]
    async fn test_seek_tell() {
        let store = store_with("/f", b"read write test").await;
        let mut file = RemoteFile::open(store, endpoint(), "/f").await.unwrap();

        file.seek(10).await.unwrap();
        assert_eq!(file.tell().await, Ok(10));

        assert!(matches!(
            file.seek(100).await,
            Err(HfsError::Seek {
                position: 100,
                source: RemoteError::OutOfRange
            })
        ));

        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_read_all_requires_cursor_at_start() {
        let store = store_with("/f", b"read write test").await;
        let mut file = RemoteFile::open(store, endpoint(), "/f").await.unwrap();

        file.seek(10).await.unwrap();
        assert_eq!(file.read_all().await, Err(HfsError::CursorNotAtStart(10)));

        file.seek(0).await.unwrap();
        assert_eq!(file.read_all().await.unwrap(), b"read write test");

        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_mode_enforcement() {
        let store = MemStore::new([endpoint()]);

        let mut writer = RemoteFile::create(store.clone(), endpoint(), "/f").await.unwrap();
        assert_eq!(
            writer.seek(0).await,
            Err(HfsError::InvalidMode {
                operation: "seek",
                mode: OpenMode::Write
            })
        );
        assert!(matches!(writer.read_all().await, Err(HfsError::InvalidMode { .. })));
        assert!(matches!(writer.read_line().await, Err(HfsError::InvalidMode { .. })));
        writer.flush().await.unwrap();
        writer.close().await.unwrap();

        let mut reader = RemoteFile::open(store, endpoint(), "/f").await.unwrap();
        assert!(matches!(reader.write(b"x").await, Err(HfsError::InvalidMode { .. })));
        assert!(matches!(reader.flush().await, Err(HfsError::InvalidMode { .. })));
        reader.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_pread_at_eof_sentinel() {
        let store = store_with("/f", b"0123456789").await;
        let mut file = RemoteFile::open(store, endpoint(), "/f").await.unwrap();

        assert_eq!(file.pread_at(3, 4).await.unwrap(), Some(b"3456".to_vec()));
        assert_eq!(file.pread_at(8, 100).await.unwrap(), Some(b"89".to_vec()));

        for len in [0, 1, 10, 4096] {
            assert_eq!(file.pread_at(10, len).await.unwrap(), None);
            assert_eq!(file.pread_at(11, len).await.unwrap(), None);
        }

        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_open_options_hints() {
        let store = MemStore::new([endpoint()]);

        let mut file = RemoteOpenOptions::new()
            .mode(OpenMode::Write)
            .replication(2)
            .block_size(1024)
            .open(store, endpoint(), "/hinted")
            .await
            .unwrap();

        let st = file.stat().await.unwrap().unwrap();
        assert_eq!(st.replication, 2);
        assert_eq!(st.block_size, 1024);
        assert!(file.exists().await.unwrap());

        file.close().await.unwrap();
    }
}
