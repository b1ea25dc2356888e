//! Streams a response body to disk with progress and cooperative cancellation.

use std::path::Path;

use futures_util::{Stream, StreamExt};
use tokio::fs::OpenOptions;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument};

use super::constants::CHUNK_SIZE;
use super::error::DownloadError;
use super::task::TransferOutcome;
use crate::progress::{ProgressSink, TaskId};

/// Copies `stream` into a new file at `path`.
///
/// The file is created with create-new semantics, so an existing path fails
/// the copy with [`DownloadError::DestinationExists`]. Data is written in
/// slices of at most [`CHUNK_SIZE`] bytes, each flushed before progress is
/// reported. The token is checked before every slice and raced against every
/// network read. A cancel that lands while the file is being created removes
/// the empty file again; later, the bytes already written stay on disk and [`TransferOutcome::Cancelled`] is returned.
///
/// `total` is forwarded to the sink before the first write; `None` renders
/// indeterminate progress.
#[instrument(skip_all, fields(path = %path.display(), task = task.get()))]
pub async fn copy_stream<S, B>(
    stream: S,
    path: &Path,
    total: Option<u64>,
    progress: &dyn ProgressSink,
    task: TaskId,
    cancel: &CancellationToken,
) -> TransferOutcome
where
    S: Stream<Item = Result<B, DownloadError>>,
    B: AsRef<[u8]>,
{
    if cancel.is_cancelled() {
        progress.remove_task(task);
        return TransferOutcome::Cancelled;
    }

    let mut file = match OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await
    {
        Ok(file) => file,
        Err(e) => {
            progress.remove_task(task);
            return TransferOutcome::failed(DownloadError::io(path, e));
        }
    };
    if cancel.is_cancelled() {
        drop(file);
        if let Err(e) = tokio::fs::remove_file(path).await {
            debug!(error = %e, "could not remove empty file after cancellation");
        }
        progress.remove_task(task);
        return TransferOutcome::Cancelled;
    }

    progress.update(task, total, 0);
    progress.start(task);

    let result = pump(stream, &mut file, path, progress, task, cancel).await;
    let flushed = file
        .flush()
        .await
        .map_err(|e| DownloadError::io(path, e));
    progress.remove_task(task);

    match (result, flushed) {
        (Err(e), _) | (Ok(_), Err(e)) => {
            debug!(error = %e, "copy failed");
            TransferOutcome::failed(e)
        }
        (Ok(Pumped::Cancelled(bytes)), Ok(())) => {
            debug!(bytes, "copy cancelled, partial file left in place");
            TransferOutcome::Cancelled
        }
        (Ok(Pumped::Finished(bytes)), Ok(())) => {
            debug!(bytes, "copy finished");
            TransferOutcome::Success {
                bytes_written: bytes,
                path: path.to_path_buf(),
            }
        }
    }
}

enum Pumped {
    Finished(u64),
    Cancelled(u64),
}

async fn pump<S, B, W>(
    stream: S,
    writer: &mut W,
    path: &Path,
    progress: &dyn ProgressSink,
    task: TaskId,
    cancel: &CancellationToken,
) -> Result<Pumped, DownloadError>
where
    S: Stream<Item = Result<B, DownloadError>>,
    B: AsRef<[u8]>,
    W: AsyncWrite + Unpin,
{
    let mut stream = std::pin::pin!(stream);
    let mut written: u64 = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = cancel.cancelled() => return Ok(Pumped::Cancelled(written)),
            next = stream.next() => next,
        };
        let Some(data) = next else {
            return Ok(Pumped::Finished(written));
        };
        let data = data?;

        for slice in data.as_ref().chunks(CHUNK_SIZE) {
            if cancel.is_cancelled() {
                return Ok(Pumped::Cancelled(written));
            }
            writer
                .write_all(slice)
                .await
                .map_err(|e| DownloadError::io(path, e))?;
            writer
                .flush()
                .await
                .map_err(|e| DownloadError::io(path, e))?;
            let len = slice.len() as u64;
            written += len;
            progress.update(task, None, len);
        }
    }
}
