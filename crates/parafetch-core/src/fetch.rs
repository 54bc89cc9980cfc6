//! Fetch Task: performs one ranged GET for a single chunk and reports its
//! outcome as a sequence of typed events.
//!
//! The request shape and `started`/`progress`/terminal event ordering follow
//! the reference downloader's per-chunk task, re-expressed as an async
//! function driving an `mpsc` channel instead of a signal-emitting worker
//! thread.

use futures_util::StreamExt;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::probe::Credentials;
use crate::types::{EngineError, Range, TransportKind};

/// Events a fetch task emits, in order: exactly one `Started`, zero or more
/// `Progress`, then exactly one of `Finished`/`Failed`.
#[derive(Debug)]
pub enum TaskEvent {
    Started { num: u32 },
    Progress { num: u32, received: u64, total: Option<u64> },
    Finished { num: u32, range: Range, data: Vec<u8> },
    Failed { num: u32, range: Range, http_code: Option<u16>, error: EngineError },
}

/// Execute one ranged GET and report its outcome through `events`.
///
/// On cancellation the task emits `Failed` with `TransportKind::Cancelled`
/// rather than silently vanishing, so the coordinator always sees a terminal
/// event for every chunk it started.
#[tracing::instrument(skip(client, url, credentials, cancel, events), fields(chunk = num, start = range.start, end = range.end))]
pub async fn run(
    client: reqwest::Client,
    url: url::Url,
    range: Range,
    num: u32,
    credentials: Option<Credentials>,
    cancel: CancellationToken,
    show_headers: bool,
    events: mpsc::UnboundedSender<TaskEvent>,
) {
    tracing::debug!("chunk started");
    let _ = events.send(TaskEvent::Started { num });

    let mut req = client.get(url).header("Accept-Encoding", "identity");
    if !(range.start == 0 && range.end == 0) {
        req = req.header(
            "Range",
            format!("bytes={}-{}", range.start, range.inclusive_end()),
        );
    }
    if let Some(creds) = &credentials {
        req = req.header("Authorization", creds.basic_auth_header());
    }

    let send_fut = req.send();
    tokio::pin!(send_fut);

    let resp = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            let _ = events.send(TaskEvent::Failed {
                num, range, http_code: None,
                error: EngineError::Transport(TransportKind::Cancelled),
            });
            return;
        }
        result = &mut send_fut => result,
    };

    let resp = match resp {
        Ok(r) => r,
        Err(e) => {
            tracing::debug!(error = %e, "chunk request failed");
            let _ = events.send(TaskEvent::Failed {
                num,
                range,
                http_code: None,
                error: EngineError::from(e),
            });
            return;
        }
    };

    let status = resp.status();
    let code = status.as_u16();

    if show_headers {
        for (name, value) in resp.headers().iter() {
            tracing::debug!(
                chunk = num,
                status = code,
                header = %name,
                value = value.to_str().unwrap_or("<binary>"),
                "response header"
            );
        }
    }

    if status != reqwest::StatusCode::OK && status != reqwest::StatusCode::PARTIAL_CONTENT {
        tracing::debug!(http_code = code, "chunk rejected by server");
        let _ = events.send(TaskEvent::Failed {
            num,
            range,
            http_code: Some(code),
            error: classify_status(status),
        });
        return;
    }

    let total_expected = resp.content_length();
    let mut buf = Vec::with_capacity(range.len() as usize);
    let mut stream = resp.bytes_stream();

    loop {
        let next_fut = stream.next();
        tokio::pin!(next_fut);
        let chunk = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                let _ = events.send(TaskEvent::Failed {
                    num, range, http_code: Some(code),
                    error: EngineError::Transport(TransportKind::Cancelled),
                });
                return;
            }
            item = &mut next_fut => item,
        };

        match chunk {
            Some(Ok(bytes)) => {
                buf.extend_from_slice(&bytes);
                let _ = events.send(TaskEvent::Progress {
                    num,
                    received: buf.len() as u64,
                    total: total_expected,
                });
            }
            Some(Err(e)) => {
                let _ = events.send(TaskEvent::Failed {
                    num,
                    range,
                    http_code: Some(code),
                    error: EngineError::from(e),
                });
                return;
            }
            None => break,
        }
    }

    tracing::debug!(bytes = buf.len(), "chunk finished");
    let _ = events.send(TaskEvent::Finished { num, range, data: buf });
}

fn classify_status(status: reqwest::StatusCode) -> EngineError {
    let code = status.as_u16();
    if status.is_client_error() {
        EngineError::ClientError(code)
    } else if status.is_server_error() {
        EngineError::ServerError(code)
    } else {
        EngineError::Malformed(format!("unexpected status {code}"))
    }
}
