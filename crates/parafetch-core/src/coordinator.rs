//! Download coordinator: ties probing, range planning, the worker pool, and
//! the commit pipeline into one download from a single URL.
//!
//! The overall sequence — probe, then set up the output file (handling
//! resume/truncate), then plan ranges, then seed the pool, then forward
//! finished chunks to the commit pipeline in ascending offset order — follows
//! the reference downloader's `start()`/`setupFile()`/`createRanges()`/
//! `download()`/`saveChunk()` chain.
//!
//! One simplification versus that chain: `saveChunk()` there only forwards
//! one ready chunk per completion event unless every chunk has finished, so a
//! chunk that becomes ready out of order can sit buffered in memory longer
//! than necessary. This coordinator instead drains every contiguous ready
//! prefix of the staging map on each completion, which is both simpler and
//! forwards chunks to the writer as early as correctness allows.
//!
//! Known limitation: there is no `ETag`/`Last-Modified` check on resume, so
//! resuming against a URL whose content changed since the partial file was
//! written silently produces a corrupt file. The origin is trusted to serve
//! stable content for a given URL.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::commit::{self, CommitMessage};
use crate::fetch::TaskEvent;
use crate::planner::{self, SizingPolicy};
use crate::pool::WorkerPool;
use crate::probe;
use crate::types::{EngineError, Range, Result};

#[derive(Debug)]
pub enum DownloadEvent {
    Probed { final_url: url::Url, total: u64, resumable: bool, mime_type: Option<String> },
    Planned { output_path: PathBuf, chunk_count: usize, conns: u32, offset: u64 },
    ChunkStarted { num: u32 },
    ChunkProgress { num: u32, received: u64, total: Option<u64> },
    ChunkFinished { num: u32, range: Range },
    ChunkFailed { num: u32, range: Range, http_code: Option<u16>, error: String },
    Finished { output_path: PathBuf, bytes_written: u64 },
    Failed { error: String },
}

/// An interactive y/N prompt, invoked with the message to display. Kept as a
/// boxed closure rather than a trait so the CLI can supply a real stdin
/// prompt while the engine stays free of direct terminal I/O.
pub type ConfirmPrompt = Box<dyn FnMut(&str) -> bool + Send>;

pub struct CoordinatorOptions {
    pub output_dir: PathBuf,
    pub output_path: Option<PathBuf>,
    pub conns: u32,
    pub policy: SizingPolicy,
    pub resume: bool,
    pub confirm_redirect: bool,
    pub confirm_truncate: bool,
    pub show_http_headers: bool,
    /// Interactive prompt used for both the redirect-confirm and the
    /// truncate-confirm decisions. `None` means "never ask" — redirect
    /// confirmation is then simply skipped (as if un-set) and truncate
    /// confirmation fails closed (see `setup_output_file`).
    pub confirm_prompt: Option<ConfirmPrompt>,
}

/// Run one download to completion, reporting progress through `events`.
/// Returns `Err` only for failures that happen before any chunk is started
/// (probe, file setup, planning); per-chunk failures are reported as
/// `DownloadEvent::ChunkFailed`/`Failed` and also surface as the `Err`
/// returned here, since this engine aborts the whole download on the first
/// chunk failure rather than retrying.
#[tracing::instrument(skip(opts, events, cancel), fields(url = %start_url))]
pub async fn download(
    start_url: url::Url,
    mut opts: CoordinatorOptions,
    events: mpsc::UnboundedSender<DownloadEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let client = probe::build_client()?;
    let (bare_url, credentials) = probe::extract_embedded_credentials(&start_url);

    let mut confirm_prompt = opts.confirm_prompt.take();
    let probe_result = {
        let on_confirm = || {
            confirm_prompt
                .as_mut()
                .map(|ask| ask("Do you want to continue? [y/N] "))
                .unwrap_or(false)
        };
        probe::probe(
            &client,
            &bare_url,
            credentials.as_ref(),
            opts.confirm_redirect,
            opts.show_http_headers,
            on_confirm,
        )
        .await?
    };
    tracing::debug!(total = probe_result.total_size, resumable = probe_result.resumable, "probed");

    if opts.resume && !probe_result.resumable {
        return Err(EngineError::Policy(
            "cannot resume: server did not advertise range support".into(),
        ));
    }

    let _ = events.send(DownloadEvent::Probed {
        final_url: probe_result.final_url.clone(),
        total: probe_result.total_size,
        resumable: probe_result.resumable,
        mime_type: probe_result.mime_type.clone(),
    });

    let output_path = resolve_output_path(&opts.output_dir, opts.output_path.as_deref(), &probe_result.final_url);

    let ask_truncate = || {
        confirm_prompt
            .as_mut()
            .map(|ask| ask("Do you want to truncate file and continue? [y/N] "))
            .unwrap_or(false)
    };
    let (file, offset) = setup_output_file(
        &output_path,
        probe_result.total_size,
        opts.resume,
        opts.confirm_truncate,
        ask_truncate,
    )
    .await?;

    let (ranges, conns) = planner::plan(probe_result.total_size, offset, opts.conns, opts.policy)?;
    let chunk_count = ranges.len();
    let numbered: Vec<(u32, Range)> =
        ranges.into_iter().enumerate().map(|(i, r)| (i as u32 + 1, r)).collect();
    tracing::debug!(chunk_count, conns, offset, "planned ranges");

    let _ = events.send(DownloadEvent::Planned {
        output_path: output_path.clone(),
        chunk_count,
        conns,
        offset,
    });

    if chunk_count == 0 {
        let _ = events.send(DownloadEvent::Finished { output_path, bytes_written: 0 });
        return Ok(());
    }

    let (commit_tx, commit_rx) = mpsc::channel(chunk_count.min(64).max(1));
    let commit_handle = tokio::spawn(commit::run(file, commit_rx));

    let (task_tx, mut task_rx) = mpsc::unbounded_channel();
    let pool = WorkerPool::with_header_logging(numbered, conns, cancel.clone(), opts.show_http_headers);

    let pool_handle = tokio::spawn({
        let client = client.clone();
        let url = probe_result.final_url.clone();
        async move { pool.run(client, url, credentials, task_tx).await }
    });

    let total = probe_result.total_size;
    let mut staging: BTreeMap<u64, Vec<u8>> = BTreeMap::new();
    let mut next_offset = offset;
    let mut bytes_written = 0u64;
    let mut failure: Option<EngineError> = None;

    while let Some(event) = task_rx.recv().await {
        match event {
            TaskEvent::Started { num } => {
                let _ = events.send(DownloadEvent::ChunkStarted { num });
            }
            TaskEvent::Progress { num, received, total } => {
                let _ = events.send(DownloadEvent::ChunkProgress { num, received, total });
            }
            TaskEvent::Finished { num, range, data } => {
                let _ = events.send(DownloadEvent::ChunkFinished { num, range });
                staging.insert(range.start, data);

                while let Some(data) = staging.remove(&next_offset) {
                    let chunk_end = next_offset + data.len() as u64;
                    let is_last = chunk_end >= total;
                    bytes_written += data.len() as u64;
                    next_offset = chunk_end;
                    if commit_tx.send(CommitMessage::Chunk { data, is_last }).await.is_err() {
                        break;
                    }
                }
            }
            TaskEvent::Failed { num, range, http_code, error } => {
                tracing::debug!(chunk = num, %error, "chunk failed, cancelling download");
                let _ = events.send(DownloadEvent::ChunkFailed {
                    num,
                    range,
                    http_code,
                    error: error.to_string(),
                });
                failure.get_or_insert(error);
                cancel.cancel();
            }
        }
    }

    drop(commit_tx);
    let _ = pool_handle.await;
    let commit_result = commit_handle.await.map_err(|e| EngineError::Policy(e.to_string()))?;

    if let Some(err) = failure {
        let _ = events.send(DownloadEvent::Failed { error: err.to_string() });
        return Err(err);
    }
    commit_result?;

    tracing::debug!(bytes_written, "download finished");
    let _ = events.send(DownloadEvent::Finished { output_path, bytes_written });
    Ok(())
}

fn resolve_output_path(output_dir: &Path, explicit: Option<&Path>, final_url: &url::Url) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    output_dir.join(probe::filename_from_url(final_url))
}

/// Open (or create/truncate/resume) the output file, returning the handle
/// and the byte offset downloading should resume from.
async fn setup_output_file(
    path: &Path,
    total: u64,
    resume: bool,
    confirm_truncate: bool,
    mut ask_truncate: impl FnMut() -> bool,
) -> Result<(tokio::fs::File, u64)> {
    let existing_size = match tokio::fs::metadata(path).await {
        Ok(meta) => Some(meta.len()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => return Err(EngineError::Io(e)),
    };

    let mut resume = resume;
    let mut offset = 0u64;

    if let Some(size) = existing_size {
        if resume {
            if size == total {
                // Already complete: nothing left to fetch, nothing to
                // truncate. Opened in append mode so the existing bytes are
                // left untouched; the planner sees offset == total and
                // produces an empty range queue.
                offset = total;
            } else if size > total {
                if !confirm_truncate || !ask_truncate() {
                    return Err(EngineError::Policy(format!(
                        "cannot resume: existing file ({size} bytes) is larger than the remote file ({total} bytes)"
                    )));
                }
                resume = false;
            } else if size > 0 {
                offset = size;
            }
        } else {
            tokio::fs::remove_file(path).await.map_err(EngineError::Io)?;
        }
    }

    let mut open_opts = tokio::fs::OpenOptions::new();
    open_opts.write(true).create(true);
    if resume {
        open_opts.append(true);
    } else {
        open_opts.truncate(true);
    }

    let file = open_opts.open(path).await.map_err(EngineError::Io)?;
    Ok((file, offset))
}
