//! Configuration types for blueprint estimation.
//!
//! Every knob lives in [`EstimatorConfig`], built through
//! [`EstimatorConfigBuilder`]. The API credential is part of the config and is
//! resolved exactly once, by whoever builds it (CLI flags, environment, web
//! form), then handed to the remote client at construction.

use crate::error::EstimatorError;
use crate::progress::ProgressCallback;
use std::fmt;
use std::time::Duration;

/// Environment variable holding the Google AI Studio key.
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";

/// Public endpoint of the Gemini REST API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Model used when none is configured.
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// Display name attached to every uploaded drawing.
pub const DEFAULT_DISPLAY_NAME: &str = "Gambar Kerja";

/// Where a [`Credential`] came from. Shown to the user, never the key itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialSource {
    /// Read from the `GOOGLE_API_KEY` secret.
    Environment,
    /// Typed in by the user (flag or form field).
    Manual,
}

/// An API key, or the absence of one.
///
/// Blank strings count as absent. `Debug` never prints the key.
#[derive(Clone, Default)]
pub struct Credential {
    key: Option<String>,
    source: Option<CredentialSource>,
}

impl Credential {
    /// A key entered by the user.
    pub fn manual(key: impl Into<String>) -> Self {
        Self::with_source(key.into(), CredentialSource::Manual)
    }

    /// No key at all.
    pub fn none() -> Self {
        Self::default()
    }

    /// Read the key from `GOOGLE_API_KEY`; absent if unset or blank.
    pub fn from_env() -> Self {
        match std::env::var(API_KEY_ENV) {
            Ok(key) => Self::with_source(key, CredentialSource::Environment),
            Err(_) => Self::none(),
        }
    }

    fn with_source(key: String, source: CredentialSource) -> Self {
        let key = key.trim().to_string();
        if key.is_empty() {
            Self::none()
        } else {
            Self {
                key: Some(key),
                source: Some(source),
            }
        }
    }

    /// Use `self` when present, otherwise `fallback`.
    pub fn or(self, fallback: Credential) -> Self {
        if self.is_present() {
            self
        } else {
            fallback
        }
    }

    pub fn is_present(&self) -> bool {
        self.key.is_some()
    }

    pub fn source(&self) -> Option<CredentialSource> {
        self.source
    }

    /// The key, or [`EstimatorError::MissingCredential`].
    pub fn expose(&self) -> Result<&str, EstimatorError> {
        self.key.as_deref().ok_or(EstimatorError::MissingCredential)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.source {
            Some(source) => write!(f, "Credential(<redacted>, {source:?})"),
            None => f.write_str("Credential(<none>)"),
        }
    }
}

/// Configuration for one estimation run.
///
/// Built via [`EstimatorConfig::builder()`] or [`EstimatorConfig::default()`]
/// (which carries no credential).
///
/// # Example
/// ```rust
/// use blueprint_estimator::{Credential, EstimatorConfig};
///
/// let config = EstimatorConfig::builder()
///     .credential(Credential::manual("my-key"))
///     .model("gemini-1.5-pro")
///     .max_poll_attempts(90)
///     .build()
///     .unwrap();
/// assert_eq!(config.model, "gemini-1.5-pro");
/// ```
#[derive(Clone)]
pub struct EstimatorConfig {
    /// API key for the remote service.
    pub credential: Credential,

    /// Model identifier, without the `models/` prefix. Default: `gemini-1.5-flash`.
    pub model: String,

    /// Service root. Default: the public Gemini endpoint. Tests point this at a mock server.
    pub base_url: String,

    /// Delay between status checks while the upload is `PROCESSING`. Default: 2 s.
    pub poll_interval: Duration,

    /// Upper bound on status checks. Default: `None` (wait as long as it takes).
    pub max_poll_attempts: Option<u32>,

    /// Per-HTTP-request timeout in seconds. Default: 120.
    ///
    /// Applies to each upload, poll and generation request individually,
    /// not to the poll loop as a whole.
    pub request_timeout_secs: u64,

    /// Display name sent with the upload. Default: `Gambar Kerja`.
    pub display_name: String,

    /// Custom instruction prompt. If None, uses the built-in estimation prompt.
    pub prompt: Option<String>,

    /// Optional progress events sink.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        Self {
            credential: Credential::none(),
            model: DEFAULT_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            poll_interval: Duration::from_secs(2),
            max_poll_attempts: None,
            request_timeout_secs: 120,
            display_name: DEFAULT_DISPLAY_NAME.to_string(),
            prompt: None,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for EstimatorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstimatorConfig")
            .field("credential", &self.credential)
            .field("model", &self.model)
            .field("base_url", &self.base_url)
            .field("poll_interval", &self.poll_interval)
            .field("max_poll_attempts", &self.max_poll_attempts)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("display_name", &self.display_name)
            .field("prompt", &self.prompt.as_ref().map(|p| p.len()))
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn AnalysisProgressCallback>"),
            )
            .finish()
    }
}

impl EstimatorConfig {
    /// Create a new builder for `EstimatorConfig`.
    pub fn builder() -> EstimatorConfigBuilder {
        EstimatorConfigBuilder {
            config: Self::default(),
        }
    }

    /// Same config with a different credential.
    ///
    /// Used by the web front-end when the form carries its own key.
    pub fn with_credential(&self, credential: Credential) -> Self {
        Self {
            credential,
            ..self.clone()
        }
    }
}

/// Builder for [`EstimatorConfig`].
pub struct EstimatorConfigBuilder {
    config: EstimatorConfig,
}

impl fmt::Debug for EstimatorConfigBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EstimatorConfigBuilder")
            .field("config", &self.config)
            .finish()
    }
}

impl EstimatorConfigBuilder {
    pub fn credential(mut self, credential: Credential) -> Self {
        self.config.credential = credential;
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        let model = model.into();
        // Accept the fully-qualified form printed by `estimator models`.
        self.config.model = model
            .strip_prefix("models/")
            .map(str::to_string)
            .unwrap_or(model);
        self
    }

    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.config.poll_interval = interval;
        self
    }

    pub fn max_poll_attempts(mut self, n: u32) -> Self {
        self.config.max_poll_attempts = Some(n);
        self
    }

    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs.max(1);
        self
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.config.display_name = name.into();
        self
    }

    pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt = Some(prompt.into());
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    ///
    /// A missing credential is not a build error: the client reports
    /// [`EstimatorError::MissingCredential`] when it is constructed, which is
    /// where the user is asked for one.
    pub fn build(self) -> Result<EstimatorConfig, EstimatorError> {
        let c = &self.config;
        if c.model.trim().is_empty() {
            return Err(EstimatorError::InvalidConfig("Model must not be empty".into()));
        }
        if !(c.base_url.starts_with("http://") || c.base_url.starts_with("https://")) {
            return Err(EstimatorError::InvalidConfig(format!(
                "Base URL must be http(s), got '{}'",
                c.base_url
            )));
        }
        if c.poll_interval.is_zero() {
            return Err(EstimatorError::InvalidConfig(
                "Poll interval must be greater than zero".into(),
            ));
        }
        if c.max_poll_attempts == Some(0) {
            return Err(EstimatorError::InvalidConfig(
                "Max poll attempts must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
