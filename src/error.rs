//! Error types for the blueprint-estimator library.
//!
//! A single fatal error type, [`EstimatorError`], covers every way an
//! estimation run can stop. The pipeline has exactly one request in flight
//! and no partial results worth keeping, so there is no page-level or
//! item-level error: either the model's bill of quantities comes back and
//! parses, or the caller gets one of these.
//!
//! Nothing here is retried automatically. The only recovery path is a
//! user-initiated re-run.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the blueprint-estimator library.
#[derive(Debug, Error)]
pub enum EstimatorError {
    // ── Credential / config ───────────────────────────────────────────────
    /// No API key was supplied. Raised before any network call.
    #[error(
        "No API key configured.\n\
Set GOOGLE_API_KEY, pass --api-key, or enter a Google AI Studio key in the form."
    )]
    MissingCredential,

    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Blueprint file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// The file extension is not one of pdf, png, jpg, jpeg.
    #[error("Unsupported file type '{file_name}'. Upload a PDF, PNG or JPEG drawing.")]
    UnsupportedFileType { file_name: String },

    /// Staging or writing a local file failed.
    #[error("{context}: {source}")]
    LocalIo {
        context: String,
        #[source]
        source: std::io::Error,
    },

    // ── Remote service errors ─────────────────────────────────────────────
    /// The upload to the remote file store failed.
    #[error("Failed to upload blueprint to the AI service: {reason}")]
    UploadFailed { reason: String },

    /// A status poll for an uploaded file failed.
    #[error("Failed to check processing status of '{name}': {reason}")]
    PollFailed { name: String, reason: String },

    /// The remote service finished processing the file with state `FAILED`.
    #[error("The AI service failed to process the uploaded file '{name}'.")]
    RemoteProcessingFailed { name: String },

    /// The configured poll bound was exhausted while still `PROCESSING`.
    #[error("File '{name}' was still processing after {attempts} status checks")]
    PollTimeout { name: String, attempts: u32 },

    /// The generation call failed or returned no text.
    #[error("Model generation failed: {reason}")]
    GenerationFailed { reason: String },

    /// Listing the models available to the credential failed.
    #[error("Failed to list models: {reason}")]
    ModelListFailed { reason: String },

    // ── Response errors ───────────────────────────────────────────────────
    /// The model's reply is not a JSON array of objects.
    ///
    /// `raw` holds the unmodified reply so it can be shown to the user.
    #[error(
        "Could not read the estimate returned by the model ({detail}).\n\
Try again or use a clearer drawing."
    )]
    MalformedResponse { detail: String, raw: String },

    // ── Export errors ─────────────────────────────────────────────────────
    /// Packaging the spreadsheet failed.
    #[error("Failed to build spreadsheet: {reason}")]
    ExportFailed { reason: String },

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl EstimatorError {
    /// Wrap an I/O error with a short description of what was being done.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        EstimatorError::LocalIo {
            context: context.into(),
            source,
        }
    }

    /// The model's raw reply, when the error is [`EstimatorError::MalformedResponse`].
    pub fn raw_response(&self) -> Option<&str> {
        match self {
            EstimatorError::MalformedResponse { raw, .. } => Some(raw),
            _ => None,
        }
    }

    /// True when the user can fix the problem by changing their input
    /// (credential, file type, path, settings) rather than retrying.
    pub fn is_user_error(&self) -> bool {
        matches!(
            self,
            EstimatorError::MissingCredential
                | EstimatorError::InvalidConfig(_)
                | EstimatorError::FileNotFound { .. }
                | EstimatorError::UnsupportedFileType { .. }
        )
    }

    /// True for failures reported by, or while talking to, the remote service.
    pub fn is_remote_error(&self) -> bool {
        matches!(
            self,
            EstimatorError::UploadFailed { .. }
                | EstimatorError::PollFailed { .. }
                | EstimatorError::RemoteProcessingFailed { .. }
                | EstimatorError::PollTimeout { .. }
                | EstimatorError::GenerationFailed { .. }
                | EstimatorError::ModelListFailed { .. }
                | EstimatorError::MalformedResponse { .. }
        )
    }
}
