//! Remote analysis: upload the staged drawing, wait for it, ask the model once.
//!
//! This module drives a [`RemoteModel`] through the three remote steps and
//! returns the model's reply untouched. All prompt text lives in
//! [`crate::prompts`]; parsing the reply is [`super::normalize`]'s job.
//!
//! ## No retries
//!
//! Each remote call is made once. A failed upload, a failed status check, a
//! `FAILED` processing state or a failed generation ends the run with the
//! matching [`EstimatorError`]; the user re-runs if they want another try.
//! A `FAILED` file is never sent to the model.

use crate::config::EstimatorConfig;
use crate::error::EstimatorError;
use crate::pipeline::intake::StagedBlueprint;
use crate::pipeline::poll::{wait_until_terminal, PollPolicy, Sleeper};
use crate::prompts::estimation_prompt;
use crate::remote::{FileState, RemoteFile, RemoteModel};
use std::time::Instant;
use tracing::{debug, info, warn};

/// What the remote steps produced.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    /// The model's reply, verbatim.
    pub raw_text: String,
    /// Final handle of the uploaded file.
    pub file: RemoteFile,
    pub polls: u32,
    pub upload_duration_ms: u64,
    pub processing_duration_ms: u64,
    pub generation_duration_ms: u64,
}

/// Upload `staged`, poll until it leaves `PROCESSING`, then issue exactly one
/// generation request with the estimation prompt.
pub async fn analyze(
    remote: &dyn RemoteModel,
    staged: &StagedBlueprint,
    config: &EstimatorConfig,
    sleeper: &dyn Sleeper,
) -> Result<AnalysisOutcome, EstimatorError> {
    let progress = config.progress_callback.as_ref();

    // ── Upload ───────────────────────────────────────────────────────────
    let upload_start = Instant::now();
    if let Some(cb) = progress {
        cb.on_upload_start(staged.file_name(), staged.len());
    }
    info!(
        "Uploading '{}' ({} bytes, {})",
        staged.file_name(),
        staged.len(),
        staged.media_type()
    );
    let uploaded = remote
        .upload_file(
            staged.path(),
            staged.media_type().mime(),
            &config.display_name,
        )
        .await?;
    let upload_duration_ms = upload_start.elapsed().as_millis() as u64;
    if let Some(cb) = progress {
        cb.on_upload_complete(&uploaded.name, uploaded.state);
    }

    // ── Wait for processing ──────────────────────────────────────────────
    let processing_start = Instant::now();
    let outcome = wait_until_terminal(
        remote,
        uploaded,
        PollPolicy::from_config(config),
        sleeper,
        progress,
    )
    .await?;
    let processing_duration_ms = processing_start.elapsed().as_millis() as u64;

    if outcome.file.state == FileState::Failed {
        warn!("Remote processing failed for {}", outcome.file.name);
        return Err(EstimatorError::RemoteProcessingFailed {
            name: outcome.file.name,
        });
    }
    debug!(
        "{} is {} after {} status checks",
        outcome.file.name, outcome.file.state, outcome.polls
    );

    // ── Generate ─────────────────────────────────────────────────────────
    let generation_start = Instant::now();
    if let Some(cb) = progress {
        cb.on_generation_start(&config.model);
    }
    info!("Requesting estimate from {}", config.model);
    let raw_text = remote
        .generate(&outcome.file, estimation_prompt(config))
        .await?;
    let generation_duration_ms = generation_start.elapsed().as_millis() as u64;
    if let Some(cb) = progress {
        cb.on_generation_complete(raw_text.len());
    }
    debug!("Model replied with {} bytes", raw_text.len());

    Ok(AnalysisOutcome {
        raw_text,
        file: outcome.file,
        polls: outcome.polls,
        upload_duration_ms,
        processing_duration_ms,
        generation_duration_ms,
    })
}
