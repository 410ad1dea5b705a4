//! Estimation entry points.
//!
//! Every entry point funnels into [`estimate_with`], which runs the pipeline
//! against any [`RemoteModel`]. The public wrappers differ only in where the
//! drawing comes from and where the result goes.

use crate::config::EstimatorConfig;
use crate::error::EstimatorError;
use crate::gemini::GeminiClient;
use crate::output::{Estimate, EstimateStats};
use crate::pipeline::analysis::analyze;
use crate::pipeline::export::write_xlsx_file;
use crate::pipeline::intake::{stage_bytes, stage_path, StagedBlueprint};
use crate::pipeline::normalize::normalize;
use crate::pipeline::poll::{Sleeper, TokioSleeper};
use crate::remote::{ModelInfo, RemoteModel};
use std::path::Path;
use std::time::Instant;
use tracing::{info, warn};

/// Estimate quantities for a drawing on disk.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `path`   — PDF, PNG or JPEG file
/// * `config` — Estimation configuration, credential included
///
/// # Errors
/// [`EstimatorError::MissingCredential`] is returned before the file is read
/// or any request is sent. A reply that is not a JSON array of objects is
/// [`EstimatorError::MalformedResponse`], which carries the raw text.
///
/// # Example
/// ```rust,no_run
/// use blueprint_estimator::{estimate, Credential, EstimatorConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let config = EstimatorConfig::builder()
///     .credential(Credential::from_env())
///     .build()?;
/// let estimate = estimate("denah.pdf", &config).await?;
/// for item in &estimate.items {
///     println!("{:?} {:?}", item.item(), item.estimated_quantity());
/// }
/// # Ok(())
/// # }
/// ```
pub async fn estimate(
    path: impl AsRef<Path>,
    config: &EstimatorConfig,
) -> Result<Estimate, EstimatorError> {
    let client = reported(GeminiClient::new(config), config)?;
    let staged = reported(stage_path(path.as_ref()), config)?;
    estimate_with(&client, staged, config, &TokioSleeper).await
}

/// Estimate quantities for an in-memory upload.
///
/// `file_name` decides the media type and the staged file's extension, the
/// same way a browser upload's name does.
pub async fn estimate_from_bytes(
    bytes: &[u8],
    file_name: &str,
    config: &EstimatorConfig,
) -> Result<Estimate, EstimatorError> {
    let client = reported(GeminiClient::new(config), config)?;
    let staged = reported(stage_bytes(bytes, file_name), config)?;
    estimate_with(&client, staged, config, &TokioSleeper).await
}

/// Run the pipeline on an already-staged drawing against `remote`.
///
/// The staged file is removed before this returns, whatever the outcome.
pub async fn estimate_with(
    remote: &dyn RemoteModel,
    staged: StagedBlueprint,
    config: &EstimatorConfig,
    sleeper: &dyn Sleeper,
) -> Result<Estimate, EstimatorError> {
    let total_start = Instant::now();

    let result = run(remote, &staged, config, sleeper, total_start).await;
    staged.cleanup();
    reported(result, config)
}

/// Log a failure and pass it to the progress callback before returning it.
fn reported<T>(
    result: Result<T, EstimatorError>,
    config: &EstimatorConfig,
) -> Result<T, EstimatorError> {
    if let Err(ref e) = result {
        warn!("Estimation failed: {}", e);
        if let Some(ref cb) = config.progress_callback {
            cb.on_error(&e.to_string());
        }
    }
    result
}

async fn run(
    remote: &dyn RemoteModel,
    staged: &StagedBlueprint,
    config: &EstimatorConfig,
    sleeper: &dyn Sleeper,
    total_start: Instant,
) -> Result<Estimate, EstimatorError> {
    // Nothing is sent without a key.
    config.credential.expose()?;

    let outcome = analyze(remote, staged, config, sleeper).await?;
    let items = normalize(&outcome.raw_text)?;

    let stats = EstimateStats {
        poll_count: outcome.polls,
        upload_duration_ms: outcome.upload_duration_ms,
        processing_duration_ms: outcome.processing_duration_ms,
        generation_duration_ms: outcome.generation_duration_ms,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
    };
    info!(
        "Estimate complete: {} line items, {} status checks, {}ms total",
        items.len(),
        stats.poll_count,
        stats.total_duration_ms
    );

    Ok(Estimate {
        items,
        raw_text: outcome.raw_text,
        file: outcome.file,
        stats,
    })
}

/// Estimate a drawing and write the spreadsheet to `output_path`.
///
/// The spreadsheet is written atomically; the full [`Estimate`] is returned
/// so the caller can still show the table.
pub async fn estimate_to_file(
    path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &EstimatorConfig,
) -> Result<Estimate, EstimatorError> {
    let estimate = estimate(path, config).await?;
    write_xlsx_file(&estimate.items, output_path.as_ref()).await?;
    Ok(estimate)
}

/// Synchronous wrapper around [`estimate`].
///
/// Creates a temporary tokio runtime internally.
pub fn estimate_sync(
    path: impl AsRef<Path>,
    config: &EstimatorConfig,
) -> Result<Estimate, EstimatorError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| EstimatorError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(estimate(path, config))
}

/// Models the configured credential may call `generateContent` on.
pub async fn list_models(config: &EstimatorConfig) -> Result<Vec<ModelInfo>, EstimatorError> {
    let client = GeminiClient::new(config)?;
    list_models_with(&client).await
}

/// [`list_models`] against any [`RemoteModel`].
pub async fn list_models_with(remote: &dyn RemoteModel) -> Result<Vec<ModelInfo>, EstimatorError> {
    let models = remote.list_models().await?;
    Ok(models
        .into_iter()
        .filter(ModelInfo::supports_generate_content)
        .collect())
}
