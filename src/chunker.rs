//! Fixed-size chunking of an input byte stream.

use std::io;
use tokio::io::{AsyncRead, AsyncReadExt};

/// Default chunk size: 7 MiB, safely under the backend attachment limit.
pub const CHUNK_SIZE: usize = 7 * 1024 * 1024;

/// Splits an async byte stream into ordered chunks of at most `chunk_size`
/// bytes. Every chunk is full-size except possibly the last; a stream whose
/// length is an exact multiple of the chunk size ends with a full chunk,
/// never an empty one. Holds no more than one chunk in memory.
pub struct Chunker<R> {
    reader: R,
    chunk_size: usize,
}

impl<R: AsyncRead + Unpin> Chunker<R> {
    pub fn new(reader: R, chunk_size: usize) -> Self {
        debug_assert!(chunk_size > 0);
        Self { reader, chunk_size }
    }

    /// Read the next chunk, or `None` once the stream is exhausted.
    pub async fn next_chunk(&mut self) -> io::Result<Option<Vec<u8>>> {
        let mut buf = vec![0u8; self.chunk_size];
        let mut filled = 0;

        // Short reads are normal for network streams; keep filling
        // until the chunk is full or the stream ends.
        while filled < self.chunk_size {
            let n = self.reader.read(&mut buf[filled..]).await?;
            if n == 0 {
                break;
            }
            filled += n;
        }

        if filled == 0 {
            return Ok(None);
        }
        buf.truncate(filled);
        Ok(Some(buf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    async fn collect(data: &[u8], chunk_size: usize) -> Vec<Vec<u8>> {
        let mut chunker = Chunker::new(Cursor::new(data.to_vec()), chunk_size);
        let mut out = Vec::new();
        while let Some(chunk) = chunker.next_chunk().await.unwrap() {
            out.push(chunk);
        }
        out
    }

    #[tokio::test]
    async fn empty_input_yields_no_chunks() {
        assert!(collect(b"", 8).await.is_empty());
    }

    #[tokio::test]
    async fn short_input_yields_single_partial_chunk() {
        let chunks = collect(b"abc", 8).await;
        assert_eq!(chunks, vec![b"abc".to_vec()]);
    }

    #[tokio::test]
    async fn exact_multiple_yields_full_final_chunk() {
        let data = vec![7u8; 24];
        let chunks = collect(&data, 8).await;
        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.len() == 8));
    }

    #[tokio::test]
    async fn trailing_remainder_becomes_last_chunk() {
        let data: Vec<u8> = (0..=19).collect();
        let chunks = collect(&data, 8).await;
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[0].len(), 8);
        assert_eq!(chunks[1].len(), 8);
        assert_eq!(chunks[2].len(), 4);
        // Order and content preserved
        let rejoined: Vec<u8> = chunks.concat();
        assert_eq!(rejoined, data);
    }

    #[tokio::test]
    async fn chunk_count_matches_ceiling_division() {
        for n in [1usize, 7, 8, 9, 43] {
            let data = vec![0u8; n];
            let chunks = collect(&data, 8).await;
            assert_eq!(chunks.len(), n.div_ceil(8), "n = {}", n);
        }
    }
}
