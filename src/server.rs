//! Browser front-end: an upload form, the estimate as an HTML table, and the
//! spreadsheet as a download link.
//!
//! Routes:
//!
//! | Method | Path       | Answer |
//! |--------|------------|--------|
//! | GET    | `/`        | upload form (`file`, optional `api_key`) |
//! | POST   | `/analyze` | result page, or an error page |
//! | GET    | `/models`  | models the server key can use |
//! | POST   | `/models`  | same, with the form's key taking precedence |
//! | GET    | `/health`  | `ok` |
//!
//! The server keeps no per-request state: each POST stages its own temp file,
//! runs one estimate, and embeds the workbook in the page as a `data:` URI.

use crate::config::{Credential, EstimatorConfig};
use crate::error::EstimatorError;
use crate::estimate::{estimate_from_bytes, list_models};
use crate::output::Estimate;
use crate::pipeline::export::{write_xlsx, xlsx_data_uri, EXPORT_FILE_NAME};
use crate::pipeline::table::{escape_html, render_html};
use axum::{
    extract::{DefaultBodyLimit, Multipart, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
    routing::{get, post},
    Router,
};
use std::fmt::Write as _;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing::{debug, info, warn};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Shared, read-only server state.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Base configuration. Its credential is the server-side secret, used
    /// when the form's key field is left blank.
    pub config: Arc<EstimatorConfig>,
}

impl AppState {
    pub fn new(config: EstimatorConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }
}

/// Build the router with all routes.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/analyze", post(analyze))
        .route("/models", get(models_with_server_key).post(models_with_form_key))
        .route("/health", get(health))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `addr` and serve until the process exits.
pub async fn start_server(addr: &str, state: AppState) -> Result<(), std::io::Error> {
    info!("Starting estimator on http://{}", addr);

    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app).await
}

// ── Handlers ─────────────────────────────────────────────────────────────

async fn health() -> &'static str {
    "ok"
}

async fn index(State(state): State<AppState>) -> Html<String> {
    let key_hint = if state.config.credential.is_present() {
        "A server key is configured. Leave blank to use it."
    } else {
        "No server key is configured. Paste your Google AI Studio key."
    };

    let body = format!(
        r#"<form action="/analyze" method="post" enctype="multipart/form-data">
<p><label>Blueprint (PDF, PNG, JPG)<br><input type="file" name="file" accept=".pdf,.png,.jpg,.jpeg" required></label></p>
<p><label>API key<br><input type="password" name="api_key" autocomplete="off"></label><br><small>{}</small></p>
<p><button type="submit">Analyze</button> <button type="submit" formaction="/models" formnovalidate>Check available models</button></p>
</form>
<p><small>Model: {}</small></p>"#,
        escape_html(key_hint),
        escape_html(&state.config.model),
    );
    page("AI Blueprint Estimator", &body)
}

/// Fields of the upload form. Either may be missing.
#[derive(Default)]
struct UploadForm {
    upload: Option<(String, Vec<u8>)>,
    api_key: String,
}

async fn read_form(mut multipart: Multipart) -> Result<UploadForm, AppError> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadForm(format!("Failed to parse multipart data: {e}")))?
    {
        let field_name = field.name().unwrap_or("").to_string();
        match field_name.as_str() {
            "file" => {
                let file_name = field.file_name().unwrap_or("").to_string();
                let bytes = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::BadForm(format!("Failed to read upload: {e}")))?;
                // Browsers send an empty part when no file was chosen.
                if !file_name.is_empty() {
                    form.upload = Some((file_name, bytes.to_vec()));
                }
            }
            "api_key" => {
                form.api_key = field
                    .text()
                    .await
                    .map_err(|e| AppError::BadForm(format!("Failed to read API key: {e}")))?;
            }
            other => debug!("Ignoring form field '{}'", other),
        }
    }
    Ok(form)
}

/// The server config with the form's key, when one was typed, in place of the secret.
fn config_for_key(state: &AppState, form_key: String) -> EstimatorConfig {
    let credential = Credential::manual(form_key).or(state.config.credential.clone());
    if let Some(source) = credential.source() {
        debug!("Using {:?} credential", source);
    }
    state.config.with_credential(credential)
}

async fn analyze(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Html<String>, AppError> {
    let form = read_form(multipart).await?;
    let (file_name, bytes) = form
        .upload
        .ok_or_else(|| AppError::BadForm("Choose a blueprint file to upload.".into()))?;
    let config = config_for_key(&state, form.api_key);

    info!("Analyzing upload '{}' ({} bytes)", file_name, bytes.len());
    let estimate = estimate_from_bytes(&bytes, &file_name, &config).await?;
    let workbook = write_xlsx(&estimate.items)?;

    Ok(page("Estimate", &result_body(&file_name, &estimate, &workbook)))
}

async fn models_with_server_key(State(state): State<AppState>) -> Result<Html<String>, AppError> {
    models_page(&state.config).await
}

async fn models_with_form_key(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Html<String>, AppError> {
    let form = read_form(multipart).await?;
    models_page(&config_for_key(&state, form.api_key)).await
}

async fn models_page(config: &EstimatorConfig) -> Result<Html<String>, AppError> {
    let models = list_models(config).await?;

    let mut body = format!(
        "<p>{} models support <code>generateContent</code>.</p>\n<ul>\n",
        models.len()
    );
    for m in &models {
        let name = m.name.strip_prefix("models/").unwrap_or(&m.name);
        let _ = match &m.display_name {
            Some(d) => writeln!(body, "<li><code>{}</code> {}</li>", escape_html(name), escape_html(d)),
            None => writeln!(body, "<li><code>{}</code></li>", escape_html(name)),
        };
    }
    body.push_str("</ul>\n<p><a href=\"/\">Back</a></p>");
    Ok(page("Available models", &body))
}

fn result_body(file_name: &str, estimate: &Estimate, workbook: &[u8]) -> String {
    let mut body = String::new();
    let _ = write!(
        body,
        "<p>{} line items from <b>{}</b>.</p>\n",
        estimate.items.len(),
        escape_html(file_name)
    );
    body.push_str(&render_html(&estimate.items));
    let _ = write!(
        body,
        r#"<p><a class="download" href="{}" download="{}">Download {}</a></p>"#,
        xlsx_data_uri(workbook),
        EXPORT_FILE_NAME,
        EXPORT_FILE_NAME
    );
    let _ = write!(
        body,
        "\n<details><summary>Model reply</summary><pre>{}</pre></details>\n<p><a href=\"/\">Analyze another drawing</a></p>",
        escape_html(&estimate.raw_text)
    );
    body
}

fn page(title: &str, body: &str) -> Html<String> {
    Html(format!(
        r#"<!doctype html>
<html lang="id">
<head><meta charset="utf-8"><title>{title}</title>
<style>
body {{ font-family: sans-serif; margin: 2rem; }}
table.estimate {{ border-collapse: collapse; }}
table.estimate th, table.estimate td {{ border: 1px solid #ccc; padding: 4px 8px; text-align: left; }}
pre {{ white-space: pre-wrap; background: #f6f6f6; padding: 1rem; }}
.error {{ color: #a00; }}
</style></head>
<body>
<h1>{title}</h1>
{body}
</body>
</html>
"#,
        title = escape_html(title),
        body = body
    ))
}

// ── Errors ───────────────────────────────────────────────────────────────

/// Everything a form route can fail with.
#[derive(Debug)]
enum AppError {
    BadForm(String),
    Estimator(EstimatorError),
}

impl From<EstimatorError> for AppError {
    fn from(e: EstimatorError) -> Self {
        AppError::Estimator(e)
    }
}

/// HTTP status for a pipeline error.
fn status_for(e: &EstimatorError) -> StatusCode {
    if e.is_user_error() {
        StatusCode::BAD_REQUEST
    } else if e.is_remote_error() {
        StatusCode::BAD_GATEWAY
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, mut body) = match &self {
            AppError::BadForm(msg) => (
                StatusCode::BAD_REQUEST,
                format!(r#"<p class="error">{}</p>"#, escape_html(msg)),
            ),
            AppError::Estimator(EstimatorError::MissingCredential) => (
                StatusCode::BAD_REQUEST,
                format!(
                    r#"<p class="error">No API key was supplied. Enter your Google AI Studio key in the form, or start the server with <code>{}</code> set.</p>"#,
                    crate::config::API_KEY_ENV
                ),
            ),
            AppError::Estimator(e) => (
                status_for(e),
                format!(r#"<p class="error">{}</p>"#, escape_html(&e.to_string())),
            ),
        };

        if let AppError::Estimator(e) = &self {
            if let Some(raw) = e.raw_response() {
                let _ = write!(
                    body,
                    "\n<p>The model replied with:</p>\n<pre>{}</pre>",
                    escape_html(raw)
                );
            }
        }
        body.push_str("\n<p><a href=\"/\">Back</a></p>");

        warn!("Request failed with {}", status);
        (status, page("Analysis failed", &body)).into_response()
    }
}
