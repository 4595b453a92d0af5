//! Line iteration over positional reads.
//!
//! The remote only offers fixed-length positional reads, so lines are rebuilt chunk by chunk.
//! End of file is detected through the sentinel of [RemoteFile::pread_at], never through a
//! short read.

use futures::{Stream, TryStreamExt};
use hfs_core::{HfsError, RemoteClient, RemoteError};

use super::RemoteFile;
use crate::defaults::DEFAULT_CHUNK_LEN;

/// Line delimiter
const NEWLINE: u8 = b'\n';

/// Byte offset used only for line iteration.
///
/// Independent of the remote handle's sequential cursor.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineCursor {
    offset: u64,
}

impl LineCursor {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    fn advance(&mut self, num_bytes: usize) {
        self.offset += num_bytes as u64;
    }
}

impl<C> RemoteFile<C>
where
    C: RemoteClient,
{
    /// Read the next line, fetching [DEFAULT_CHUNK_LEN] bytes per round trip.
    ///
    /// See [RemoteFile::read_line_with].
    pub async fn read_line(&mut self) -> Result<Vec<u8>, HfsError> {
        self.read_line_with(DEFAULT_CHUNK_LEN).await
    }

    /// Read the next line, fetching up to `chunk_len` bytes per round trip.
    ///
    /// The returned line includes its trailing `\n`. The final line of a file without a
    /// trailing delimiter is returned without one. An empty result means there is nothing
    /// left to read.
    ///
    /// Small chunks mean many round trips per line; large chunks waste transfer on short lines.
    pub async fn read_line_with(&mut self, chunk_len: usize) -> Result<Vec<u8>, HfsError> {
        if chunk_len == 0 {
            return Err(HfsError::InvalidChunkLength);
        }

        let mut line = Vec::new();

        loop {
            let position = self.line_cursor.offset();

            let chunk = match self.pread_at(position, chunk_len).await? {
                Some(c) => c,
                None => return Ok(line),
            };

            // nothing before eof, asking again would spin
            if chunk.is_empty() {
                return Err(HfsError::Read(RemoteError::Io(format!(
                    "no data returned at offset {} before end of file",
                    position
                ))));
            }

            match chunk.iter().position(|&b| b == NEWLINE) {
                Some(idx) => {
                    self.line_cursor.advance(idx + 1);
                    line.extend_from_slice(&chunk[..=idx]);

                    return Ok(line);
                }
                None => {
                    self.line_cursor.advance(chunk.len());
                    line.extend(chunk);
                }
            }
        }
    }

    /// Stream of the remaining lines, using [DEFAULT_CHUNK_LEN].
    pub fn lines(&mut self) -> impl Stream<Item = Result<Vec<u8>, HfsError>> + '_ {
        self.lines_with(DEFAULT_CHUNK_LEN)
    }

    /// Stream of the remaining lines.
    ///
    /// The stream ends at the first empty result of [RemoteFile::read_line_with].
    pub fn lines_with(
        &mut self,
        chunk_len: usize,
    ) -> impl Stream<Item = Result<Vec<u8>, HfsError>> + '_ {
        futures::stream::try_unfold(self, move |file| async move {
            let line = file.read_line_with(chunk_len).await?;

            match line.is_empty() {
                true => Ok::<_, HfsError>(None),
                false => Ok(Some((line, file))),
            }
        })
    }

    /// Collect every remaining line.
    pub async fn read_all_lines(&mut self) -> Result<Vec<Vec<u8>>, HfsError> {
        self.lines().try_collect().await
    }
}
