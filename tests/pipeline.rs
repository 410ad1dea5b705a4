//! Pipeline integration tests against a scripted in-process remote.
//!
//! No network: `ScriptedRemote` replays a fixed sequence of file states and a
//! canned reply, and records every call so the tests can check what was (and
//! was not) sent.

use async_trait::async_trait;
use blueprint_estimator::pipeline::table::render_text;
use blueprint_estimator::{
    estimate_with, list_models_with, stage_bytes, write_xlsx, AnalysisProgressCallback,
    Credential, EstimatorConfig, EstimatorError, FileState, ModelInfo, RemoteFile, RemoteModel,
    Sleeper,
};
use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use std::collections::VecDeque;
use std::io::Cursor;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

// ── Test helpers ─────────────────────────────────────────────────────────────

const SAMPLE_REPLY: &str = r#"[{"kategori":"Arsitektur","item":"Dinding Bata Merah","satuan":"m2","estimasi_volume":150,"catatan":"Asumsi tinggi 3m"}]"#;

#[derive(Debug, Clone, PartialEq)]
enum Call {
    Upload { mime: String, staged: PathBuf },
    GetFile(String),
    Generate(String),
    ListModels,
}

struct ScriptedRemote {
    upload_state: FileState,
    poll_states: Mutex<VecDeque<FileState>>,
    reply: String,
    calls: Mutex<Vec<Call>>,
}

impl ScriptedRemote {
    fn new(upload_state: FileState, poll_states: &[FileState], reply: &str) -> Self {
        Self {
            upload_state,
            poll_states: Mutex::new(poll_states.iter().copied().collect()),
            reply: reply.to_string(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn handle(&self, state: FileState) -> RemoteFile {
        RemoteFile {
            name: "files/denah-1".into(),
            display_name: Some("Gambar Kerja".into()),
            mime_type: "application/pdf".into(),
            uri: "https://generativelanguage.googleapis.com/v1beta/files/denah-1".into(),
            state,
        }
    }
}

#[async_trait]
impl RemoteModel for ScriptedRemote {
    async fn upload_file(
        &self,
        path: &Path,
        mime_type: &str,
        _display_name: &str,
    ) -> Result<RemoteFile, EstimatorError> {
        self.calls.lock().unwrap().push(Call::Upload {
            mime: mime_type.to_string(),
            staged: path.to_path_buf(),
        });
        Ok(self.handle(self.upload_state))
    }

    async fn get_file(&self, name: &str) -> Result<RemoteFile, EstimatorError> {
        self.calls.lock().unwrap().push(Call::GetFile(name.to_string()));
        let state = self
            .poll_states
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(FileState::Processing);
        Ok(self.handle(state))
    }

    async fn generate(&self, file: &RemoteFile, _prompt: &str) -> Result<String, EstimatorError> {
        self.calls.lock().unwrap().push(Call::Generate(file.name.clone()));
        Ok(self.reply.clone())
    }

    async fn list_models(&self) -> Result<Vec<ModelInfo>, EstimatorError> {
        self.calls.lock().unwrap().push(Call::ListModels);
        Ok(vec![
            ModelInfo {
                name: "models/gemini-1.5-flash".into(),
                display_name: Some("Gemini 1.5 Flash".into()),
                supported_generation_methods: vec!["generateContent".into(), "countTokens".into()],
            },
            ModelInfo {
                name: "models/text-embedding-004".into(),
                display_name: None,
                supported_generation_methods: vec!["embedContent".into()],
            },
        ])
    }
}

#[derive(Default)]
struct RecordingSleeper {
    slept: Mutex<Vec<Duration>>,
}

#[async_trait]
impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        self.slept.lock().unwrap().push(duration);
    }
}

#[derive(Default)]
struct EventLog {
    events: Mutex<Vec<String>>,
}

impl AnalysisProgressCallback for EventLog {
    fn on_upload_start(&self, file_name: &str, _bytes: u64) {
        self.events.lock().unwrap().push(format!("upload {file_name}"));
    }
    fn on_poll(&self, attempt: u32, state: FileState) {
        self.events.lock().unwrap().push(format!("poll {attempt} {state}"));
    }
    fn on_generation_start(&self, _model: &str) {
        self.events.lock().unwrap().push("generate".into());
    }
    fn on_error(&self, _error: &str) {
        self.events.lock().unwrap().push("error".into());
    }
}

/// `RUST_LOG=blueprint_estimator=debug cargo test --test pipeline -- --nocapture`
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

fn keyed_config() -> EstimatorConfig {
    EstimatorConfig::builder()
        .credential(Credential::manual("test-key"))
        .build()
        .unwrap()
}

fn one_page_pdf() -> &'static [u8] {
    b"%PDF-1.4\n1 0 obj << /Type /Catalog >> endobj\ntrailer << /Root 1 0 R >>\n%%EOF\n"
}

// ── End-to-end ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn processing_processing_active_yields_one_row() {
    init_tracing();
    let remote = ScriptedRemote::new(
        FileState::Processing,
        &[FileState::Processing, FileState::Active],
        SAMPLE_REPLY,
    );
    let sleeper = RecordingSleeper::default();
    let staged = stage_bytes(one_page_pdf(), "denah.pdf").unwrap();

    let estimate = estimate_with(&remote, staged, &keyed_config(), &sleeper)
        .await
        .unwrap();

    // Table: header, rule, one row.
    let table = render_text(&estimate.items);
    assert_eq!(table.lines().count(), 3);
    assert!(table.lines().nth(2).unwrap().contains("Dinding Bata Merah"));

    // Spreadsheet: header + one row with the five fields.
    let mut wb: Xlsx<_> =
        open_workbook_from_rs(Cursor::new(write_xlsx(&estimate.items).unwrap())).unwrap();
    let range = wb.worksheet_range("Sheet1").unwrap();
    assert_eq!(range.get_size(), (2, 5));
    assert_eq!(range.get_value((1, 0)), Some(&Data::String("Arsitektur".into())));
    assert_eq!(range.get_value((1, 1)), Some(&Data::String("Dinding Bata Merah".into())));
    assert_eq!(range.get_value((1, 2)), Some(&Data::String("m2".into())));
    assert_eq!(range.get_value((1, 3)), Some(&Data::Float(150.0)));
    assert_eq!(range.get_value((1, 4)), Some(&Data::String("Asumsi tinggi 3m".into())));

    // One sleep per status check, exactly one generation.
    assert_eq!(estimate.stats.poll_count, 2);
    assert_eq!(sleeper.slept.lock().unwrap().len(), 2);
    let generations = remote
        .calls()
        .into_iter()
        .filter(|c| matches!(c, Call::Generate(_)))
        .count();
    assert_eq!(generations, 1);
    assert_eq!(estimate.raw_text, SAMPLE_REPLY);
    assert_eq!(estimate.file.state, FileState::Active);
}

#[tokio::test]
async fn missing_credential_sends_nothing() {
    let remote = ScriptedRemote::new(FileState::Active, &[], SAMPLE_REPLY);
    let staged = stage_bytes(one_page_pdf(), "denah.pdf").unwrap();
    let staged_path = staged.path().to_path_buf();

    let err = estimate_with(
        &remote,
        staged,
        &EstimatorConfig::default(),
        &RecordingSleeper::default(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, EstimatorError::MissingCredential));
    assert!(remote.calls().is_empty(), "got {:?}", remote.calls());
    assert!(!staged_path.exists());
}

#[tokio::test]
async fn failed_processing_skips_generation() {
    let remote = ScriptedRemote::new(FileState::Processing, &[FileState::Failed], SAMPLE_REPLY);
    let staged = stage_bytes(b"\x89PNG\r\n\x1a\n", "tampak.png").unwrap();

    let err = estimate_with(&remote, staged, &keyed_config(), &RecordingSleeper::default())
        .await
        .unwrap_err();

    assert!(matches!(err, EstimatorError::RemoteProcessingFailed { .. }));
    assert!(!remote
        .calls()
        .iter()
        .any(|c| matches!(c, Call::Generate(_))));
}

#[tokio::test]
async fn malformed_reply_keeps_raw_text() {
    let reply = "Maaf, gambar kurang jelas.";
    let remote = ScriptedRemote::new(FileState::Active, &[], reply);
    let staged = stage_bytes(one_page_pdf(), "denah.pdf").unwrap();

    let err = estimate_with(&remote, staged, &keyed_config(), &RecordingSleeper::default())
        .await
        .unwrap_err();

    assert_eq!(err.raw_response(), Some(reply));
}

#[tokio::test]
async fn fenced_reply_is_accepted() {
    let reply = format!("```json\n{SAMPLE_REPLY}\n```");
    let remote = ScriptedRemote::new(FileState::Active, &[], &reply);
    let staged = stage_bytes(one_page_pdf(), "denah.pdf").unwrap();

    let estimate = estimate_with(&remote, staged, &keyed_config(), &RecordingSleeper::default())
        .await
        .unwrap();

    assert_eq!(estimate.items.len(), 1);
    assert_eq!(estimate.items[0].unit(), Some("m2"));
    assert_eq!(estimate.stats.poll_count, 0);
}

#[tokio::test]
async fn poll_bound_stops_a_stuck_upload() {
    let remote = ScriptedRemote::new(FileState::Processing, &[], SAMPLE_REPLY);
    let staged = stage_bytes(one_page_pdf(), "denah.pdf").unwrap();
    let config = EstimatorConfig::builder()
        .credential(Credential::manual("k"))
        .max_poll_attempts(4)
        .build()
        .unwrap();

    let err = estimate_with(&remote, staged, &config, &RecordingSleeper::default())
        .await
        .unwrap_err();

    assert!(matches!(err, EstimatorError::PollTimeout { attempts: 4, .. }));
}

// ── Staging ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn staged_file_keeps_extension_and_is_removed_after_success() {
    for (name, mime) in [
        ("denah.pdf", "application/pdf"),
        ("tampak.PNG", "image/png"),
        ("potongan.jpg", "image/jpeg"),
        ("detail.jpeg", "image/jpeg"),
    ] {
        let remote = ScriptedRemote::new(FileState::Active, &[], SAMPLE_REPLY);
        let staged = stage_bytes(b"data", name).unwrap();
        let ext = name.rsplit_once('.').unwrap().1;
        assert_eq!(
            staged.path().extension().unwrap().to_string_lossy(),
            ext,
            "{name}"
        );

        estimate_with(&remote, staged, &keyed_config(), &RecordingSleeper::default())
            .await
            .unwrap();

        let calls = remote.calls();
        let Call::Upload { mime: sent, staged } = &calls[0] else {
            panic!("first call must be the upload");
        };
        assert_eq!(sent, mime);
        assert!(!staged.exists(), "{name} staged copy left behind");
    }
}

#[tokio::test]
async fn staged_file_is_removed_after_failure() {
    let remote = ScriptedRemote::new(FileState::Active, &[], "not json");
    let staged = stage_bytes(one_page_pdf(), "denah.pdf").unwrap();
    let staged_path = staged.path().to_path_buf();

    assert!(estimate_with(&remote, staged, &keyed_config(), &RecordingSleeper::default())
        .await
        .is_err());
    assert!(!staged_path.exists());
}

#[test]
fn unsupported_upload_is_rejected_before_staging() {
    let err = stage_bytes(b"AC1032", "denah.dwg").unwrap_err();
    assert!(matches!(err, EstimatorError::UnsupportedFileType { .. }));
}

// ── Progress & models ───────────────────────────────────────────────────────

#[tokio::test]
async fn progress_events_follow_the_run() {
    let log = Arc::new(EventLog::default());
    let config = EstimatorConfig::builder()
        .credential(Credential::manual("k"))
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let remote = ScriptedRemote::new(FileState::Processing, &[FileState::Active], SAMPLE_REPLY);
    let staged = stage_bytes(one_page_pdf(), "denah.pdf").unwrap();

    estimate_with(&remote, staged, &config, &RecordingSleeper::default())
        .await
        .unwrap();

    assert_eq!(
        *log.events.lock().unwrap(),
        vec!["upload denah.pdf", "poll 1 ACTIVE", "generate"]
    );
}

#[tokio::test]
async fn progress_reports_errors() {
    let log = Arc::new(EventLog::default());
    let config = EstimatorConfig::builder()
        .credential(Credential::manual("k"))
        .progress_callback(log.clone())
        .build()
        .unwrap();
    let remote = ScriptedRemote::new(FileState::Active, &[], "[1, 2]");
    let staged = stage_bytes(one_page_pdf(), "denah.pdf").unwrap();

    let _ = estimate_with(&remote, staged, &config, &RecordingSleeper::default()).await;

    assert_eq!(log.events.lock().unwrap().last().map(String::as_str), Some("error"));
}

#[tokio::test]
async fn model_listing_keeps_generation_models_only() {
    let remote = ScriptedRemote::new(FileState::Active, &[], "");
    let models = list_models_with(&remote).await.unwrap();
    assert_eq!(models.len(), 1);
    assert_eq!(models[0].name, "models/gemini-1.5-flash");
    assert_eq!(remote.calls(), vec![Call::ListModels]);
}
