//! Queue manager: runs a list of downloads one at a time, aborting the whole
//! queue on the first chunk failure rather than skipping ahead.
//!
//! Grounded on the reference download manager's `next()` loop (dequeue one
//! downloader, run it to completion, dequeue the next) and its
//! `onChunkFailed` handler, which tears the whole process down on the first
//! failure instead of continuing with the remaining queue. Per-connection
//! progress aggregation (`connsMap`/`updateProgress`) is a rendering concern
//! and lives in the CLI crate instead of here.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::coordinator::{self, CoordinatorOptions, DownloadEvent};
use crate::types::Result;

#[derive(Debug)]
pub enum QueueEvent {
    JobStarted { index: usize, total_jobs: usize, url: url::Url },
    Download { index: usize, event: DownloadEvent },
    JobFinished { index: usize },
    AllFinished,
}

/// Run every `(url, options)` job in `jobs` in order. Returns the error from
/// the first job that fails; jobs after it never start.
pub async fn run(
    jobs: Vec<(url::Url, CoordinatorOptions)>,
    events: mpsc::UnboundedSender<QueueEvent>,
    cancel: CancellationToken,
) -> Result<()> {
    let total_jobs = jobs.len();

    for (index, (url, opts)) in jobs.into_iter().enumerate() {
        tracing::info!(job = index, total_jobs, %url, "starting job");
        let _ = events.send(QueueEvent::JobStarted { index, total_jobs, url: url.clone() });

        let (job_tx, mut job_rx) = mpsc::unbounded_channel();
        let job_cancel = cancel.clone();
        let handle = tokio::spawn(coordinator::download(url, opts, job_tx, job_cancel));

        while let Some(event) = job_rx.recv().await {
            let _ = events.send(QueueEvent::Download { index, event });
        }

        match handle.await {
            Ok(Ok(())) => {
                let _ = events.send(QueueEvent::JobFinished { index });
            }
            Ok(Err(err)) => return Err(err),
            Err(join_err) => {
                return Err(crate::types::EngineError::Policy(join_err.to_string()));
            }
        }
    }

    let _ = events.send(QueueEvent::AllFinished);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::SizingPolicy;
    use tempfile::tempdir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn opts(dir: &std::path::Path) -> CoordinatorOptions {
        CoordinatorOptions {
            output_dir: dir.to_path_buf(),
            output_path: None,
            conns: 2,
            policy: SizingPolicy::default(),
            resume: false,
            confirm_redirect: false,
            confirm_truncate: false,
            show_http_headers: false,
            confirm_prompt: None,
        }
    }

    #[tokio::test]
    async fn runs_all_jobs_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/a.bin"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Length", "4")
                    .insert_header("Content-Range", "bytes 0-3/4")
                    .insert_header("Accept-Ranges", "bytes")
                    .set_body_bytes(vec![1u8; 4]),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/b.bin"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Length", "4")
                    .insert_header("Content-Range", "bytes 0-3/4")
                    .insert_header("Accept-Ranges", "bytes")
                    .set_body_bytes(vec![2u8; 4]),
            )
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let jobs = vec![
            (url::Url::parse(&format!("{}/a.bin", server.uri())).unwrap(), opts(dir.path())),
            (url::Url::parse(&format!("{}/b.bin", server.uri())).unwrap(), opts(dir.path())),
        ];

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(jobs, tx, CancellationToken::new()));

        let mut finished_jobs = Vec::new();
        while let Some(ev) = rx.recv().await {
            if let QueueEvent::JobFinished { index } = ev {
                finished_jobs.push(index);
            }
        }
        handle.await.unwrap().unwrap();
        assert_eq!(finished_jobs, vec![0, 1]);
    }

    #[tokio::test]
    async fn aborts_queue_on_first_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/bad.bin"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let jobs = vec![
            (url::Url::parse(&format!("{}/bad.bin", server.uri())).unwrap(), opts(dir.path())),
            (url::Url::parse(&format!("{}/never-reached.bin", server.uri())).unwrap(), opts(dir.path())),
        ];

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(jobs, tx, CancellationToken::new()));
        while rx.recv().await.is_some() {}
        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, crate::types::EngineError::ClientError(404)));
    }

    /// spec.md §8 scenario 6: the first of two queued URLs completes, the
    /// second fails; the queue aborts and the first download's file is left
    /// intact on disk.
    #[tokio::test]
    async fn scenario_6_first_file_intact_after_second_job_fails() {
        let server = MockServer::start().await;
        let body = vec![7u8; 4];
        Mock::given(method("GET"))
            .and(path("/good.bin"))
            .respond_with(
                ResponseTemplate::new(206)
                    .insert_header("Content-Length", "4")
                    .insert_header("Content-Range", "bytes 0-3/4")
                    .insert_header("Accept-Ranges", "bytes")
                    .set_body_bytes(body.clone()),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/bad.bin"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let dir = tempdir().unwrap();
        let jobs = vec![
            (url::Url::parse(&format!("{}/good.bin", server.uri())).unwrap(), opts(dir.path())),
            (url::Url::parse(&format!("{}/bad.bin", server.uri())).unwrap(), opts(dir.path())),
        ];

        let (tx, mut rx) = mpsc::unbounded_channel();
        let handle = tokio::spawn(run(jobs, tx, CancellationToken::new()));

        let mut first_output_path = None;
        while let Some(ev) = rx.recv().await {
            if let QueueEvent::Download {
                index: 0,
                event: DownloadEvent::Finished { output_path, .. },
            } = ev
            {
                first_output_path = Some(output_path);
            }
        }

        let err = handle.await.unwrap().unwrap_err();
        assert!(matches!(err, crate::types::EngineError::ServerError(500)));

        let written = tokio::fs::read(first_output_path.unwrap()).await.unwrap();
        assert_eq!(written, body);
    }
}
