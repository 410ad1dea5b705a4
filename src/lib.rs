//! # blueprint-estimator
//!
//! Quantity takeoff from construction drawings using a multimodal LLM.
//!
//! A PDF or image of a blueprint is uploaded to the Gemini API, the model is
//! asked once for a bill of quantities as JSON, and the reply is turned into a
//! table and an `.xlsx` workbook. Nothing is computed locally: the numbers are
//! the model's estimates, shown as they came back.
//!
//! ## Pipeline Overview
//!
//! ```text
//! drawing (PDF / PNG / JPEG)
//!  │
//!  ├─ 1. Intake     check type, stage bytes in a temp file
//!  ├─ 2. Upload     resumable upload to the Files API
//!  ├─ 3. Poll       wait until the file leaves PROCESSING
//!  ├─ 4. Generate   one generateContent call with the QS prompt
//!  ├─ 5. Normalize  strip code fences, parse the JSON array
//!  └─ 6. Output     text / HTML table + Rekapitulasi_Estimasi_Biaya.xlsx
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use blueprint_estimator::{estimate, write_xlsx, Credential, EstimatorConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Key from GOOGLE_API_KEY
//!     let config = EstimatorConfig::builder()
//!         .credential(Credential::from_env())
//!         .build()?;
//!     let estimate = estimate("denah.pdf", &config).await?;
//!     println!("{} line items", estimate.items.len());
//!     std::fs::write("Rekapitulasi_Estimasi_Biaya.xlsx", write_xlsx(&estimate.items)?)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `estimator` binary (clap + anyhow + indicatif + tracing-subscriber) |
//! | `server` | on      | Enables the browser front-end (axum + tower-http) |
//!
//! Disable both when using only the library:
//! ```toml
//! blueprint-estimator = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod estimate;
pub mod gemini;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod remote;
#[cfg(feature = "server")]
pub mod server;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{Credential, CredentialSource, EstimatorConfig, EstimatorConfigBuilder};
pub use error::EstimatorError;
pub use estimate::{
    estimate, estimate_from_bytes, estimate_sync, estimate_to_file, estimate_with, list_models,
    list_models_with,
};
pub use gemini::GeminiClient;
pub use output::{Columns, Estimate, EstimateStats, LineItem};
pub use pipeline::export::{write_xlsx, write_xlsx_file, EXPORT_FILE_NAME, XLSX_MIME};
pub use pipeline::intake::{stage_bytes, stage_path, MediaType, StagedBlueprint};
pub use pipeline::normalize::{normalize, strip_code_fences};
pub use pipeline::poll::{Sleeper, TokioSleeper};
pub use progress::{AnalysisProgressCallback, NoopProgressCallback, ProgressCallback};
pub use remote::{FileState, ModelInfo, RemoteFile, RemoteModel};
