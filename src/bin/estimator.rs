//! CLI binary for blueprint-estimator.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `EstimatorConfig` and prints results.

use anyhow::{Context, Result};
use blueprint_estimator::config::API_KEY_ENV;
use blueprint_estimator::pipeline::table::render_text;
use blueprint_estimator::{
    estimate, list_models, write_xlsx_file, AnalysisProgressCallback, Credential,
    CredentialSource, EstimatorConfig, EstimatorError, FileState, ProgressCallback,
    EXPORT_FILE_NAME,
};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal spinner that follows the upload, the status checks and the
/// generation request.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);

        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self { bar })
    }
}

impl AnalysisProgressCallback for CliProgressCallback {
    fn on_upload_start(&self, file_name: &str, bytes: u64) {
        self.bar.set_prefix("Uploading");
        self.bar
            .set_message(format!("{file_name} {}", dim(&format!("({bytes} bytes)"))));
    }

    fn on_upload_complete(&self, remote_name: &str, state: FileState) {
        self.bar.println(format!(
            "  {} Uploaded as {}  {}",
            green("✓"),
            remote_name,
            dim(&state.to_string())
        ));
        self.bar.set_prefix("Processing");
        self.bar.set_message("waiting for the file to become ACTIVE");
    }

    fn on_poll(&self, attempt: u32, state: FileState) {
        self.bar
            .set_message(format!("status check {attempt}: {state}"));
    }

    fn on_generation_start(&self, model: &str) {
        self.bar.set_prefix("Analyzing");
        self.bar.set_message(format!("asking {model} for a bill of quantities"));
    }

    fn on_generation_complete(&self, text_len: usize) {
        self.bar.finish_and_clear();
        eprintln!(
            "{} Model replied  {}",
            green("✔"),
            dim(&format!("{text_len} chars"))
        );
    }

    fn on_error(&self, error: &str) {
        self.bar.finish_and_clear();
        eprintln!("{} {}", red("✘"), error);
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Estimate a drawing; table on stdout, workbook in the current directory
  estimator analyze denah.pdf

  # Choose where the workbook goes
  estimator analyze tampak.png -o out/estimasi.xlsx

  # Structured JSON (items, raw reply, stats) instead of a table
  estimator analyze denah.pdf --json > estimate.json

  # Which models can this key use?
  estimator models

  # Browser front-end
  estimator serve --addr 0.0.0.0:8080

ENVIRONMENT VARIABLES:
  GOOGLE_API_KEY          Google AI Studio key (used when --api-key is absent)
  ESTIMATOR_MODEL         Override model ID
  ESTIMATOR_BASE_URL      Override the Gemini API root
  RUST_LOG                Override log filter (e.g. blueprint_estimator=debug)
"#;

/// Estimate construction quantities from blueprints with Gemini.
#[derive(Parser, Debug)]
#[command(
    name = "estimator",
    version,
    about = "Estimate construction quantities from blueprints with Gemini",
    long_about = "Upload a blueprint (PDF, PNG or JPEG) to Google Gemini, ask for a bill of \
quantities, and get it back as a table and an .xlsx workbook.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Google AI Studio API key. Falls back to GOOGLE_API_KEY.
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Gemini model ID (e.g. gemini-1.5-flash, gemini-1.5-pro).
    #[arg(long, global = true, env = "ESTIMATOR_MODEL", default_value = blueprint_estimator::config::DEFAULT_MODEL)]
    model: String,

    /// Gemini API root.
    #[arg(long, global = true, env = "ESTIMATOR_BASE_URL", default_value = blueprint_estimator::config::DEFAULT_BASE_URL)]
    base_url: String,

    /// Seconds between status checks while the upload is processing.
    #[arg(long, global = true, env = "ESTIMATOR_POLL_INTERVAL", default_value_t = 2)]
    poll_interval: u64,

    /// Give up after this many status checks (default: wait indefinitely).
    #[arg(long, global = true, env = "ESTIMATOR_MAX_POLLS")]
    max_polls: Option<u32>,

    /// Per-request HTTP timeout in seconds.
    #[arg(long, global = true, env = "ESTIMATOR_TIMEOUT", default_value_t = 120)]
    timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "ESTIMATOR_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "ESTIMATOR_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Estimate quantities for one drawing.
    Analyze {
        /// PDF, PNG or JPEG file.
        file: PathBuf,

        /// Where to write the workbook.
        #[arg(short, long, default_value = EXPORT_FILE_NAME)]
        output: PathBuf,

        /// Skip writing the workbook.
        #[arg(long)]
        no_export: bool,

        /// Print the full estimate as JSON instead of a table.
        #[arg(long)]
        json: bool,

        /// Path to a text file containing a custom prompt.
        #[arg(long, env = "ESTIMATOR_PROMPT_FILE")]
        prompt_file: Option<PathBuf>,

        /// Display name attached to the upload.
        #[arg(long)]
        display_name: Option<String>,

        /// Disable the spinner.
        #[arg(long)]
        no_progress: bool,
    },

    /// List models the key can use for generation.
    Models,

    /// Serve the browser front-end.
    #[cfg(feature = "server")]
    Serve {
        /// Address to bind.
        #[arg(long, env = "ESTIMATOR_ADDR", default_value = "127.0.0.1:8080")]
        addr: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers INFO-level milestones for `analyze`.
    let spinner_active = matches!(
        cli.command,
        Command::Analyze { json: false, no_progress: false, .. }
    ) && !cli.quiet;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || spinner_active {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let credential = resolve_credential(&cli);
    if !cli.quiet {
        match credential.source() {
            Some(CredentialSource::Manual) => eprintln!("{}", dim("Using API key from --api-key")),
            Some(CredentialSource::Environment) => {
                eprintln!("{}", dim(&format!("Using API key from {API_KEY_ENV}")))
            }
            None => {}
        }
    }

    match cli.command {
        Command::Analyze {
            ref file,
            ref output,
            no_export,
            json,
            ref prompt_file,
            ref display_name,
            no_progress: _,
        } => {
            let progress: Option<ProgressCallback> = if spinner_active {
                Some(CliProgressCallback::new() as Arc<dyn AnalysisProgressCallback>)
            } else {
                None
            };
            let config = build_config(
                &cli,
                credential,
                prompt_file.as_ref(),
                display_name.as_deref(),
                progress,
            )
            .await?;
            run_analyze(&config, file, (!no_export).then_some(output), json, cli.quiet).await
        }
        Command::Models => {
            let config = build_config(&cli, credential, None, None, None).await?;
            let models = list_models(&config)
                .await
                .map_err(explain)
                .context("Failed to list models")?;
            for m in &models {
                let name = m.name.strip_prefix("models/").unwrap_or(&m.name);
                match &m.display_name {
                    Some(d) => println!("{name:<40} {}", dim(d)),
                    None => println!("{name}"),
                }
            }
            if !cli.quiet {
                eprintln!("{} models support generateContent", bold(&models.len().to_string()));
            }
            Ok(())
        }
        #[cfg(feature = "server")]
        Command::Serve { ref addr } => {
            let config = build_config(&cli, credential, None, None, None).await?;
            if !config.credential.is_present() && !cli.quiet {
                eprintln!(
                    "{} No server key; users must paste one into the form",
                    cyan("⚠")
                );
            }
            let state = blueprint_estimator::server::AppState::new(config);
            blueprint_estimator::server::start_server(addr, state)
                .await
                .with_context(|| format!("Server on {addr} stopped"))
        }
    }
}

async fn run_analyze(
    config: &EstimatorConfig,
    file: &PathBuf,
    output: Option<&PathBuf>,
    json: bool,
    quiet: bool,
) -> Result<()> {
    let result = estimate(file, config).await;

    let estimate = match result {
        Ok(estimate) => estimate,
        Err(e) => {
            // Show what the model actually said so the user can judge it.
            if let Some(raw) = e.raw_response() {
                eprintln!("{}", bold("Raw model reply:"));
                println!("{raw}");
            }
            return Err(explain(e)).context("Estimation failed");
        }
    };

    if json {
        let out = serde_json::to_string_pretty(&estimate).context("Failed to serialise estimate")?;
        println!("{out}");
    } else {
        print!("{}", render_text(&estimate.items));
    }

    if let Some(path) = output {
        write_xlsx_file(&estimate.items, path)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    if !quiet {
        let s = &estimate.stats;
        eprintln!(
            "{}  {} line items  {} status checks  {}ms{}",
            green("✔"),
            estimate.items.len(),
            s.poll_count,
            s.total_duration_ms,
            output
                .map(|p| format!("  →  {}", bold(&p.display().to_string())))
                .unwrap_or_default(),
        );
    }
    Ok(())
}

/// `--api-key` wins over `GOOGLE_API_KEY`.
fn resolve_credential(cli: &Cli) -> Credential {
    cli.api_key
        .clone()
        .map(Credential::manual)
        .unwrap_or_default()
        .or(Credential::from_env())
}

/// Map CLI args to `EstimatorConfig`.
async fn build_config(
    cli: &Cli,
    credential: Credential,
    prompt_file: Option<&PathBuf>,
    display_name: Option<&str>,
    progress: Option<ProgressCallback>,
) -> Result<EstimatorConfig> {
    let mut builder = EstimatorConfig::builder()
        .credential(credential)
        .model(cli.model.clone())
        .base_url(cli.base_url.clone())
        .poll_interval(Duration::from_secs(cli.poll_interval))
        .request_timeout_secs(cli.timeout);

    if let Some(n) = cli.max_polls {
        builder = builder.max_poll_attempts(n);
    }
    if let Some(name) = display_name {
        builder = builder.display_name(name);
    }
    if let Some(path) = prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.prompt(prompt);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// Attach a hint for the errors a user can act on.
fn explain(e: EstimatorError) -> anyhow::Error {
    match e {
        EstimatorError::MissingCredential => anyhow::Error::new(e).context(format!(
            "Pass --api-key or set {API_KEY_ENV} (get a key at https://aistudio.google.com/apikey)"
        )),
        other => anyhow::Error::new(other),
    }
}
