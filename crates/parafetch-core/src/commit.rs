//! Commit pipeline: a single task that owns the output file handle and
//! writes chunks to disk in the order it receives them.
//!
//! Grounded on the reference downloader's commit thread: one writer drains a
//! queue of buffers, a short write (the OS accepting fewer bytes than asked)
//! is treated as unrecoverable rather than retried, and the file is closed
//! once the writer has seen both the "last chunk" marker and an empty queue.
//! Ordering is the caller's responsibility — this task writes whatever
//! arrives, in arrival order; the download coordinator is what guarantees
//! chunks arrive here in ascending offset order.

use tokio::fs::File;
use tokio::io::AsyncWriteExt;
use tokio::sync::mpsc;

use crate::types::{EngineError, Result};

/// One unit of work for the commit pipeline.
pub enum CommitMessage {
    /// A chunk's bytes, plus whether this is the last chunk of the download.
    Chunk { data: Vec<u8>, is_last: bool },
}

/// Run the commit loop until the channel closes or the last chunk has been
/// written. Returns `Ok(())` on a clean finish, or the first fatal I/O error.
pub async fn run(mut file: File, mut rx: mpsc::Receiver<CommitMessage>) -> Result<()> {
    while let Some(CommitMessage::Chunk { data, is_last }) = rx.recv().await {
        let expected = data.len();
        let actual = file.write(&data).await.map_err(EngineError::Io)?;
        tracing::trace!(bytes = actual, "wrote chunk to disk");
        if actual != expected {
            tracing::debug!(expected, actual, "short write");
            return Err(EngineError::WriteShort { expected, actual });
        }

        if is_last && rx.is_empty() {
            break;
        }
    }

    file.flush().await.map_err(EngineError::Io)?;
    tracing::debug!("commit pipeline finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn writes_chunks_in_arrival_order() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::create(tmp.path()).await.unwrap();
        let (tx, rx) = mpsc::channel(8);

        tx.send(CommitMessage::Chunk { data: b"hello ".to_vec(), is_last: false }).await.unwrap();
        tx.send(CommitMessage::Chunk { data: b"world".to_vec(), is_last: true }).await.unwrap();
        drop(tx);

        run(file, rx).await.unwrap();
        let written = tokio::fs::read(tmp.path()).await.unwrap();
        assert_eq!(written, b"hello world");
    }

    #[tokio::test]
    async fn stops_after_last_chunk_even_if_channel_stays_open() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::create(tmp.path()).await.unwrap();
        let (tx, rx) = mpsc::channel(8);

        tx.send(CommitMessage::Chunk { data: b"only".to_vec(), is_last: true }).await.unwrap();

        run(file, rx).await.unwrap();
        let written = tokio::fs::read(tmp.path()).await.unwrap();
        assert_eq!(written, b"only");
        // tx is still alive here (not dropped) — run() returned anyway.
        drop(tx);
    }

    #[tokio::test]
    async fn empty_channel_closes_cleanly() {
        let tmp = NamedTempFile::new().unwrap();
        let file = File::create(tmp.path()).await.unwrap();
        let (tx, rx) = mpsc::channel(8);
        drop(tx);

        run(file, rx).await.unwrap();
        let written = tokio::fs::read(tmp.path()).await.unwrap();
        assert!(written.is_empty());
    }
}
