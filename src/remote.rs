//! The seam between the pipeline and the remote multimodal model.
//!
//! [`RemoteModel`] is the one trait the pipeline talks to. The production
//! implementation is [`crate::gemini::GeminiClient`]; tests script their own.
//! The types here mirror the service's file resource closely enough to be
//! deserialised straight from its JSON.

use crate::error::EstimatorError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Processing state of an uploaded file, as reported by the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileState {
    /// Still being ingested; poll again.
    Processing,
    /// Ready to be referenced in a generation request.
    Active,
    /// Ingestion failed; the file cannot be used.
    Failed,
    /// Missing or unrecognised state string.
    #[default]
    #[serde(rename = "STATE_UNSPECIFIED", other)]
    Unspecified,
}

impl FileState {
    /// Every state other than `PROCESSING` ends the poll loop.
    pub fn is_terminal(self) -> bool {
        self != FileState::Processing
    }
}

impl fmt::Display for FileState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FileState::Processing => "PROCESSING",
            FileState::Active => "ACTIVE",
            FileState::Failed => "FAILED",
            FileState::Unspecified => "STATE_UNSPECIFIED",
        })
    }
}

/// Service-side handle for an uploaded drawing.
///
/// Referenced locally only by `name` (e.g. `files/abc-123`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub mime_type: String,
    #[serde(default)]
    pub uri: String,
    #[serde(default)]
    pub state: FileState,
}

/// A model the credential may call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    /// Fully-qualified name, e.g. `models/gemini-1.5-flash`.
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelInfo {
    /// Whether the model accepts `generateContent`, the only call the pipeline makes.
    pub fn supports_generate_content(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }
}

/// Operations the pipeline needs from the remote AI service.
#[async_trait]
pub trait RemoteModel: Send + Sync {
    /// Upload a local file and return its handle in whatever state the service reports.
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, EstimatorError>;

    /// Fetch the current state of a previously uploaded file.
    async fn get_file(&self, name: &str) -> Result<RemoteFile, EstimatorError>;

    /// One generation call over `file` plus `prompt`; returns the reply text verbatim.
    async fn generate(&self, file: &RemoteFile, prompt: &str) -> Result<String, EstimatorError>;

    /// Models available to the credential.
    async fn list_models(&self) -> Result<Vec<ModelInfo>, EstimatorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_processing_is_non_terminal() {
        assert!(!FileState::Processing.is_terminal());
        assert!(FileState::Active.is_terminal());
        assert!(FileState::Failed.is_terminal());
        assert!(FileState::Unspecified.is_terminal());
    }

    #[test]
    fn deserialise_file_resource() {
        let json = r#"{
            "name": "files/abc-123",
            "displayName": "Gambar Kerja",
            "mimeType": "application/pdf",
            "sizeBytes": "2048",
            "uri": "https://generativelanguage.googleapis.com/v1beta/files/abc-123",
            "state": "PROCESSING"
        }"#;
        let f: RemoteFile = serde_json::from_str(json).unwrap();
        assert_eq!(f.name, "files/abc-123");
        assert_eq!(f.display_name.as_deref(), Some("Gambar Kerja"));
        assert_eq!(f.state, FileState::Processing);
    }

    #[test]
    fn unknown_or_missing_state_is_unspecified() {
        let f: RemoteFile = serde_json::from_str(r#"{"name":"files/x","state":"ARCHIVED"}"#).unwrap();
        assert_eq!(f.state, FileState::Unspecified);
        let f: RemoteFile = serde_json::from_str(r#"{"name":"files/x"}"#).unwrap();
        assert_eq!(f.state, FileState::Unspecified);
    }

    #[test]
    fn state_display_matches_wire_format() {
        for state in [
            FileState::Processing,
            FileState::Active,
            FileState::Failed,
            FileState::Unspecified,
        ] {
            let wire = serde_json::to_string(&state).unwrap();
            assert_eq!(wire.trim_matches('"'), state.to_string());
        }
    }

    #[test]
    fn model_generate_support() {
        let m: ModelInfo = serde_json::from_str(
            r#"{"name":"models/gemini-1.5-flash","supportedGenerationMethods":["generateContent","countTokens"]}"#,
        )
        .unwrap();
        assert!(m.supports_generate_content());
        let e: ModelInfo = serde_json::from_str(
            r#"{"name":"models/text-embedding-004","supportedGenerationMethods":["embedContent"]}"#,
        )
        .unwrap();
        assert!(!e.supports_generate_content());
    }
}
