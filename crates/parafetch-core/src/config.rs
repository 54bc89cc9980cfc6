//! Engine-wide and per-job configuration, validated at construction time.
//!
//! There is no persisted config file here — unlike the teacher's `AppConfig`,
//! which is loaded from and saved back to disk, a run of this engine is a
//! one-shot process and its entire configuration surface is whatever the
//! caller passes in. Validation follows the shape of the teacher's
//! `AppConfig::validate` (one check per field, a descriptive message per
//! violation) but rejects invalid input outright instead of silently
//! clamping it — there's no settings UI here for a clamp to quietly "fix".

use std::path::PathBuf;

use crate::planner::SizingPolicy;
use crate::types::{EngineError, Result};

/// Settings shared across every URL in one invocation.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    pub output_dir: PathBuf,
    pub conns: u32,
    pub policy: SizingPolicy,
    pub resume: bool,
    pub confirm: bool,
    pub http_user: Option<String>,
    pub http_pass: Option<String>,
    pub verbose: bool,
    pub show_http_headers: bool,
    pub dry_run: bool,
    pub show_conn_progress: bool,
    pub quiet: bool,
}

impl EngineOptions {
    /// Reject combinations that can never produce a sensible download rather
    /// than silently coercing them.
    pub fn validate(&self) -> Result<()> {
        if self.conns == 0 {
            return Err(EngineError::Policy("--conns must be greater than 0".into()));
        }

        if self.policy.chunks.is_some() && self.policy.chunk_size.is_some() {
            return Err(EngineError::Policy(
                "--chunks and --chunk-size are mutually exclusive".into(),
            ));
        }

        if self.http_user.is_some() != self.http_pass.is_some() {
            return Err(EngineError::Policy(
                "--http-user and --http-pass must be given together".into(),
            ));
        }

        if !self.output_dir.exists() {
            return Err(EngineError::Policy(format!(
                "output directory does not exist: {}",
                self.output_dir.display()
            )));
        }
        if !self.output_dir.is_dir() {
            return Err(EngineError::Policy(format!(
                "output path is not a directory: {}",
                self.output_dir.display()
            )));
        }

        Ok(())
    }
}

/// Resolved settings for a single URL, derived from `EngineOptions` plus the
/// URL itself (and, for `--verify`, the expected checksum).
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub url: url::Url,
    pub output_path: Option<PathBuf>,
    pub options: EngineOptions,
}

impl JobConfig {
    /// Build this job's `CoordinatorOptions`. `confirm_prompt` is supplied by
    /// the caller rather than constructed here, since interactive stdin I/O
    /// is a CLI-boundary concern this library crate does not perform itself.
    pub fn into_coordinator_options(
        self,
        confirm_prompt: Option<crate::coordinator::ConfirmPrompt>,
    ) -> crate::coordinator::CoordinatorOptions {
        crate::coordinator::CoordinatorOptions {
            output_dir: self.options.output_dir,
            output_path: self.output_path,
            conns: self.options.conns,
            policy: self.options.policy,
            resume: self.options.resume,
            confirm_redirect: self.options.confirm,
            confirm_truncate: self.options.confirm,
            show_http_headers: self.options.show_http_headers,
            confirm_prompt,
        }
    }
}
