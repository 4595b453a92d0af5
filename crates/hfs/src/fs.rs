//! Remote file module

mod lines;
mod remote_file;

use std::io;

use futures::TryStreamExt;
use hfs_core::{Endpoint, FileStat, HfsError, RemoteClient};
pub use lines::*;
pub use remote_file::*;

/// Close `file`, then hand back `res`.
///
/// An error in `res` takes precedence over a close error.
async fn close_after<C, T>(mut file: RemoteFile<C>, res: Result<T, HfsError>) -> Result<T, HfsError>
where
    C: RemoteClient,
{
    let closed = file.close().await;
    let value = res?;
    closed?;

    Ok(value)
}

/// Read the entire contents of a remote file.
///
/// This can be used in place of opening a file, reading and then closing it.
pub async fn read<C, P>(client: C, endpoint: Endpoint, path: P) -> Result<Vec<u8>, HfsError>
where
    C: RemoteClient,
    P: AsRef<str>,
{
    let mut file = RemoteFile::open(client, endpoint, path).await?;
    let res = file.read_all().await;

    close_after(file, res).await
}

/// Read the contents of a remote file to a string.
///
/// Unlike its siblings this returns an [io::Result], mirroring [std::fs::read_to_string]:
/// invalid UTF-8 is an [io::ErrorKind::InvalidData] error, which has no [HfsError] counterpart.
/// Remote failures are converted into [io::Error], keeping the [HfsError] as the inner error.
pub async fn read_to_string<C, P>(client: C, endpoint: Endpoint, path: P) -> io::Result<String>
where
    C: RemoteClient,
    P: AsRef<str>,
{
    let contents = read(client, endpoint, path).await?;

    String::from_utf8(contents).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Read every line of a remote file.
pub async fn read_lines<C, P>(
    client: C,
    endpoint: Endpoint,
    path: P,
    chunk_len: usize,
) -> Result<Vec<Vec<u8>>, HfsError>
where
    C: RemoteClient,
    P: AsRef<str>,
{
    let mut file = RemoteFile::open(client, endpoint, path).await?;
    let res: Result<Vec<Vec<u8>>, HfsError> = file.lines_with(chunk_len).try_collect().await;

    close_after(file, res).await
}

/// Create (or truncate) a remote file and write `contents` into it.
///
/// Returns the number of bytes the remote accepted, which may be less than `contents.len()`.
pub async fn write<C, P>(client: C, endpoint: Endpoint, path: P, contents: &[u8]) -> Result<usize, HfsError>
where
    C: RemoteClient,
    P: AsRef<str>,
{
    let mut file = RemoteFile::create(client, endpoint, path).await?;
    let res = file.write(contents).await;

    close_after(file, res).await
}

/// Fetch metadata for a remote path on a dedicated connection.
pub async fn stat<C, P>(client: C, endpoint: Endpoint, path: P) -> Result<Option<FileStat>, HfsError>
where
    C: RemoteClient,
    P: AsRef<str>,
{
    let conn = client
        .connect(&endpoint)
        .await
        .map_err(|source| HfsError::Connection {
            endpoint: endpoint.clone(),
            source,
        })?;

    let res = client.stat(conn, path.as_ref()).await.map_err(HfsError::Stat);
    let disconnected = client.disconnect(conn).await.map_err(HfsError::Close);

    let st = res?;
    disconnected?;

    Ok(st)
}

/// Check if a remote path exists.
pub async fn exists<C, P>(client: C, endpoint: Endpoint, path: P) -> Result<bool, HfsError>
where
    C: RemoteClient,
    P: AsRef<str>,
{
    Ok(stat(client, endpoint, path).await?.is_some())
}

#[cfg(test)]
mod tests {
    use hfs_core::{mem::MemStore, RemoteError};

    use super::*;

    fn endpoint() -> Endpoint {
        Endpoint::new("namenode", 8020)
    }

    #[tokio::test]
    async fn test_write_read_round_trip() {
        let store = MemStore::new([endpoint()]);

        let written = write(store.clone(), endpoint(), "/motd", b"welcome\nto the cluster\n")
            .await
            .unwrap();
        assert_eq!(written, 23);

        let contents = read_to_string(store.clone(), endpoint(), "/motd").await.unwrap();
        assert_eq!(contents, "welcome\nto the cluster\n");

        let lines = read_lines(store.clone(), endpoint(), "/motd", 4).await.unwrap();
        assert_eq!(lines.concat(), contents.as_bytes());
        assert_eq!(lines.len(), 2);

        assert_eq!(store.live_connections().await, 0);
    }

    #[tokio::test]
    async fn test_stat_exists() {
        let store = MemStore::new([endpoint()]);
        store.put_file("/a", b"12345").await;

        let st = stat(store.clone(), endpoint(), "/a").await.unwrap().unwrap();
        assert_eq!(st.size, 5);

        assert!(exists(store.clone(), endpoint(), "/a").await.unwrap());
        assert!(!exists(store.clone(), endpoint(), "/b").await.unwrap());

        let res = exists(store.clone(), Endpoint::new("down", 1), "/a").await;
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
    async fn test_read_invalid_utf8() {
        let store = MemStore::new([endpoint()]);
        store.put_file("/bin", &[0xff, 0xfe, 0x00]).await;

        let err = read_to_string(store, endpoint(), "/bin").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[tokio::test]
    async fn test_read_to_string_keeps_remote_error() {
        let store = MemStore::new([endpoint()]);

        let err = read_to_string(store.clone(), endpoint(), "/missing").await.unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);

        let inner = err.get_ref().and_then(|e| e.downcast_ref::<HfsError>());
        assert!(matches!(
            inner,
            Some(HfsError::Open {
                source: RemoteError::NotFound,
                ..
            })
        ));
        assert_eq!(store.live_connections().await, 0);
    }
}
