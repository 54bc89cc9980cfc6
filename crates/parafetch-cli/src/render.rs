//! Progress rendering for one or more downloads.
//!
//! What to show — overall percent/rate/ETA, a "chunk N: x%" line per
//! connection under `--show-conn-progress` — follows the reference
//! downloader's `updateProgress`/`formatSize`/`formatTime` output. How it's
//! drawn uses `indicatif` (the pack's terminal-progress idiom, e.g.
//! `ngdp-client`'s `commands/install.rs`) instead of the original's raw ANSI
//! cursor control.

use std::collections::BTreeMap;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use parafetch_core::coordinator::DownloadEvent;
use parafetch_core::queue::QueueEvent;

const OVERALL_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:32.cyan/blue}] {bytes}/{total_bytes} ({binary_bytes_per_sec}, {eta})";
const CHUNK_TEMPLATE: &str = "  chunk {prefix}: [{bar:24.yellow/blue}] {bytes}/{total_bytes}";

/// Renders a queue of downloads to the terminal. `quiet` suppresses bars
/// (final summary lines are still printed by the caller); `show_conn_progress`
/// adds one extra bar per in-flight chunk.
pub struct Renderer {
    quiet: bool,
    show_conn_progress: bool,
    multi: MultiProgress,
    overall: Option<ProgressBar>,
    chunks: BTreeMap<u32, ProgressBar>,
    chunk_received: BTreeMap<u32, u64>,
}

impl Renderer {
    pub fn new(quiet: bool, show_conn_progress: bool) -> Self {
        Self {
            quiet,
            show_conn_progress,
            multi: MultiProgress::new(),
            overall: None,
            chunks: BTreeMap::new(),
            chunk_received: BTreeMap::new(),
        }
    }

    pub fn handle_queue_event(&mut self, event: &QueueEvent) {
        match event {
            QueueEvent::JobStarted { index, total_jobs, url } => {
                if !self.quiet {
                    eprintln!("[{}/{}] {}", index + 1, total_jobs, url);
                }
            }
            QueueEvent::Download { event, .. } => self.handle_download_event(event),
            QueueEvent::JobFinished { .. } => self.finish_job(),
            QueueEvent::AllFinished => {}
        }
    }

    pub fn handle_download_event(&mut self, event: &DownloadEvent) {
        if self.quiet {
            return;
        }

        match event {
            DownloadEvent::Planned { chunk_count, offset, .. } => {
                let _ = chunk_count;
                let _ = offset;
            }
            DownloadEvent::Probed { total, .. } => {
                let bar = self.multi.add(ProgressBar::new(*total));
                if let Ok(style) = ProgressStyle::default_bar().template(OVERALL_TEMPLATE) {
                    bar.set_style(style.progress_chars("#>-"));
                }
                self.overall = Some(bar);
            }
            DownloadEvent::ChunkStarted { num } => {
                if self.show_conn_progress {
                    let bar = self.multi.add(ProgressBar::new(0));
                    if let Ok(style) = ProgressStyle::default_bar().template(CHUNK_TEMPLATE) {
                        bar.set_style(style.progress_chars("#>-"));
                    }
                    bar.set_prefix(num.to_string());
                    self.chunks.insert(*num, bar);
                }
            }
            DownloadEvent::ChunkProgress { num, received, total } => {
                self.chunk_received.insert(*num, *received);
                if let Some(bar) = self.overall.as_ref() {
                    bar.set_position(self.chunk_received.values().sum());
                }
                if let (true, Some(bar)) = (self.show_conn_progress, self.chunks.get(num)) {
                    if let Some(total) = total {
                        bar.set_length(*total);
                    }
                    bar.set_position(*received);
                }
            }
            DownloadEvent::ChunkFinished { num, .. } => {
                if let Some(bar) = self.chunks.remove(num) {
                    bar.finish_and_clear();
                }
                // Keep the chunk's final byte count in the overall sum; only
                // drop it once its bytes are committed (`Finished`/next job).
            }
            DownloadEvent::ChunkFailed { num, error, .. } => {
                if let Some(bar) = self.chunks.remove(num) {
                    bar.abandon();
                }
                eprintln!("chunk {num} failed: {error}");
            }
            DownloadEvent::Finished { output_path, bytes_written } => {
                if let Some(bar) = self.overall.take() {
                    bar.finish_and_clear();
                }
                eprintln!("saved {} ({bytes_written} bytes)", output_path.display());
            }
            DownloadEvent::Failed { error } => {
                if let Some(bar) = self.overall.take() {
                    bar.abandon();
                }
                eprintln!("download failed: {error}");
            }
        }
    }

    fn finish_job(&mut self) {
        self.chunk_received.clear();
        for (_, bar) in self.chunks.split_off(&0) {
            bar.finish_and_clear();
        }
        if let Some(bar) = self.overall.take() {
            bar.finish_and_clear();
        }
    }
}
