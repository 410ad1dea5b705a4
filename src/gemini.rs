//! [`RemoteModel`] over the Gemini REST API (`generativelanguage.googleapis.com`).
//!
//! Five calls are made:
//!
//! | Call | Endpoint |
//! |------|----------|
//! | upload (start)    | `POST /upload/v1beta/files` with `X-Goog-Upload-Command: start` |
//! | upload (finalize) | `POST <X-Goog-Upload-URL>` with `X-Goog-Upload-Command: upload, finalize` |
//! | poll              | `GET /v1beta/{name}` |
//! | generate          | `POST /v1beta/models/{model}:generateContent` |
//! | list models       | `GET /v1beta/models` |
//!
//! The key is sent in the `x-goog-api-key` header rather than the query
//! string so it never shows up in request logs.

use crate::config::EstimatorConfig;
use crate::error::EstimatorError;
use crate::remote::{ModelInfo, RemoteFile, RemoteModel};
use async_trait::async_trait;
use reqwest::header::HeaderMap;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";
const UPLOAD_URL_HEADER: &str = "x-goog-upload-url";

/// HTTP client for the Gemini API, bound to one credential and one model.
#[derive(Clone)]
pub struct GeminiClient {
    http: Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Build a client from the config.
    ///
    /// Fails with [`EstimatorError::MissingCredential`] before anything touches
    /// the network when the config carries no key.
    pub fn new(config: &EstimatorConfig) -> Result<Self, EstimatorError> {
        let api_key = config.credential.expose()?.to_string();

        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| EstimatorError::Internal(format!("Failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key,
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

#[async_trait]
impl RemoteModel for GeminiClient {
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        display_name: &str,
    ) -> Result<RemoteFile, EstimatorError> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| EstimatorError::io(format!("Failed to read '{}'", path.display()), e))?;
        let upload_failed = |reason: String| EstimatorError::UploadFailed { reason };

        debug!("Starting resumable upload: {} bytes, {}", bytes.len(), mime_type);

        let start = self
            .http
            .post(self.url("upload/v1beta/files"))
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&UploadStartRequest {
                file: UploadMetadata { display_name },
            })
            .send()
            .await
            .map_err(|e| upload_failed(e.to_string()))?;
        let start = ensure_success(start).await.map_err(upload_failed)?;

        let upload_url = upload_url(start.headers())
            .ok_or_else(|| upload_failed("service did not return an upload URL".into()))?;

        let finished = self
            .http
            .post(upload_url)
            .header(API_KEY_HEADER, &self.api_key)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await
            .map_err(|e| upload_failed(e.to_string()))?;
        let finished = ensure_success(finished).await.map_err(upload_failed)?;

        let envelope: FileEnvelope = finished
            .json()
            .await
            .map_err(|e| upload_failed(format!("unexpected upload response: {e}")))?;

        info!(
            "Uploaded as {} (state {})",
            envelope.file.name, envelope.file.state
        );
        Ok(envelope.file)
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, EstimatorError> {
        let poll_failed = |reason: String| EstimatorError::PollFailed {
            name: name.to_string(),
            reason,
        };

        let resp = self
            .http
            .get(self.url(&format!("v1beta/{name}")))
            .header(API_KEY_HEADER, &self.api_key)
            .send()
            .await
            .map_err(|e| poll_failed(e.to_string()))?;
        let resp = ensure_success(resp).await.map_err(poll_failed)?;

        resp.json::<RemoteFile>()
            .await
            .map_err(|e| poll_failed(format!("unexpected status response: {e}")))
    }

    async fn generate(&self, file: &RemoteFile, prompt: &str) -> Result<String, EstimatorError> {
        let generation_failed = |reason: String| EstimatorError::GenerationFailed { reason };

        let body = GenerateRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![
                    Part::FileData {
                        file_data: FileData {
                            mime_type: &file.mime_type,
                            file_uri: &file.uri,
                        },
                    },
                    Part::Text { text: prompt },
                ],
            }],
        };

        let resp = self
            .http
            .post(self.url(&format!("v1beta/models/{}:generateContent", self.model)))
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| generation_failed(e.to_string()))?;
        let resp = ensure_success(resp).await.map_err(generation_failed)?;

        let reply: GenerateResponse = resp
            .json()
            .await
            .map_err(|e| generation_failed(format!("unexpected generation response: {e}")))?;

        reply.text().map_err(generation_failed)
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, EstimatorError> {
        let list_failed = |reason: String| EstimatorError::ModelListFailed { reason };
        let mut models = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut req = self
                .http
                .get(self.url("v1beta/models"))
                .header(API_KEY_HEADER, &self.api_key)
                .query(&[("pageSize", "1000")]);
            if let Some(ref token) = page_token {
                req = req.query(&[("pageToken", token.as_str())]);
            }

            let resp = req.send().await.map_err(|e| list_failed(e.to_string()))?;
            let resp = ensure_success(resp).await.map_err(list_failed)?;
            let page: ModelPage = resp
                .json()
                .await
                .map_err(|e| list_failed(format!("unexpected model list response: {e}")))?;

            models.extend(page.models);
            match page.next_page_token {
                Some(token) if !token.is_empty() => page_token = Some(token),
                _ => break,
            }
        }

        debug!("Listed {} models", models.len());
        Ok(models)
    }
}

// ── Wire types ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct UploadStartRequest<'a> {
    file: UploadMetadata<'a>,
}

#[derive(Serialize)]
struct UploadMetadata<'a> {
    display_name: &'a str,
}

#[derive(Deserialize)]
struct FileEnvelope {
    file: RemoteFile,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
#[serde(untagged)]
enum Part<'a> {
    FileData { file_data: FileData<'a> },
    Text { text: &'a str },
}

#[derive(Serialize)]
struct FileData<'a> {
    mime_type: &'a str,
    file_uri: &'a str,
}

#[derive(Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ReplyPart>,
}

#[derive(Deserialize)]
struct ReplyPart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

impl GenerateResponse {
    /// Concatenated text parts of the first candidate.
    fn text(self) -> Result<String, String> {
        let Some(candidate) = self.candidates.into_iter().next() else {
            let reason = self
                .prompt_feedback
                .and_then(|f| f.block_reason)
                .map(|r| format!("prompt blocked ({r})"))
                .unwrap_or_else(|| "response contained no candidates".to_string());
            return Err(reason);
        };

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
            .unwrap_or_default();

        if text.is_empty() {
            let finish = candidate.finish_reason.unwrap_or_else(|| "unknown".into());
            return Err(format!("response contained no text (finish reason {finish})"));
        }
        Ok(text)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ModelPage {
    #[serde(default)]
    models: Vec<ModelInfo>,
    #[serde(default)]
    next_page_token: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ApiError,
}

#[derive(Deserialize)]
struct ApiError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: Option<String>,
}

// ── Helpers ──────────────────────────────────────────────────────────────

fn upload_url(headers: &HeaderMap) -> Option<String> {
    headers
        .get(UPLOAD_URL_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

/// Pass 2xx responses through; turn anything else into a readable reason.
async fn ensure_success(resp: Response) -> Result<Response, String> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }

    let body = resp.text().await.unwrap_or_default();
    let reason = match serde_json::from_str::<ErrorEnvelope>(&body) {
        Ok(envelope) => match envelope.error.status {
            Some(s) => format!("HTTP {status} {s}: {}", envelope.error.message),
            None => format!("HTTP {status}: {}", envelope.error.message),
        },
        Err(_) if body.trim().is_empty() => format!("HTTP {status}"),
        Err(_) => format!("HTTP {status}: {}", body.trim()),
    };
    warn!("Gemini request failed: {}", reason);
    Err(reason)
}
