//! File intake: stage an uploaded drawing on disk for the remote client.
//!
//! ## Why stage at all?
//!
//! The upload call streams from a file-system path, and the web front-end
//! receives the drawing as an in-memory multipart field. Every input, whether
//! it came from the browser or the CLI, is copied into a
//! [`tempfile::NamedTempFile`] owned by a [`StagedBlueprint`]. The copy is
//! removed when that value is dropped, so cleanup happens on success, on
//! error and on panic alike.
//!
//! The temp file keeps the original extension: the remote service and
//! anyone debugging `/tmp` both rely on it.

use crate::error::EstimatorError;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Document types accepted for analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaType {
    Pdf,
    Png,
    Jpeg,
}

impl MediaType {
    /// Look up the media type from a file name's extension (case-insensitive).
    pub fn from_file_name(file_name: &str) -> Result<Self, EstimatorError> {
        let unsupported = || EstimatorError::UnsupportedFileType {
            file_name: file_name.to_string(),
        };
        let ext = extension(file_name).ok_or_else(unsupported)?;
        match ext.to_ascii_lowercase().as_str() {
            "pdf" => Ok(MediaType::Pdf),
            "png" => Ok(MediaType::Png),
            "jpg" | "jpeg" => Ok(MediaType::Jpeg),
            _ => Err(unsupported()),
        }
    }

    pub fn mime(self) -> &'static str {
        match self {
            MediaType::Pdf => "application/pdf",
            MediaType::Png => "image/png",
            MediaType::Jpeg => "image/jpeg",
        }
    }

    /// Whether `bytes` start with this type's signature.
    fn matches_magic(self, bytes: &[u8]) -> bool {
        match self {
            MediaType::Pdf => bytes.starts_with(b"%PDF"),
            MediaType::Png => bytes.starts_with(b"\x89PNG"),
            MediaType::Jpeg => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mime())
    }
}

/// A drawing copied to a private temp file for the duration of one run.
pub struct StagedBlueprint {
    file: NamedTempFile,
    file_name: String,
    media_type: MediaType,
    len: u64,
}

impl StagedBlueprint {
    /// Path of the staged copy.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    /// Name of the original upload.
    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn media_type(&self) -> MediaType {
        self.media_type
    }

    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Delete the staged copy now.
    ///
    /// Best effort: a failure (file already gone, permissions) is logged and
    /// otherwise ignored. Dropping the value has the same effect silently.
    pub fn cleanup(self) {
        let path = self.file.path().to_path_buf();
        match self.file.close() {
            Ok(()) => debug!("Removed staged file {}", path.display()),
            Err(e) => warn!("Could not remove staged file {}: {}", path.display(), e),
        }
    }
}

impl fmt::Debug for StagedBlueprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StagedBlueprint")
            .field("path", &self.file.path())
            .field("file_name", &self.file_name)
            .field("media_type", &self.media_type)
            .field("len", &self.len)
            .finish()
    }
}

/// Stage an uploaded byte buffer under a temp name ending in the upload's extension.
pub fn stage_bytes(bytes: &[u8], file_name: &str) -> Result<StagedBlueprint, EstimatorError> {
    let media_type = MediaType::from_file_name(file_name)?;
    let suffix = extension(file_name)
        .map(|ext| format!(".{ext}"))
        .unwrap_or_default();

    if !media_type.matches_magic(bytes) {
        warn!(
            "'{}' does not look like {} (first bytes {:02X?}); uploading anyway",
            file_name,
            media_type,
            &bytes[..bytes.len().min(4)]
        );
    }

    let mut file = tempfile::Builder::new()
        .prefix("blueprint-")
        .suffix(&suffix)
        .tempfile()
        .map_err(|e| EstimatorError::io("Failed to create temp file", e))?;
    file.write_all(bytes)
        .and_then(|()| file.flush())
        .map_err(|e| EstimatorError::io("Failed to write temp file", e))?;

    debug!(
        "Staged '{}' ({} bytes) at {}",
        file_name,
        bytes.len(),
        file.path().display()
    );

    Ok(StagedBlueprint {
        file,
        file_name: file_name.to_string(),
        media_type,
        len: bytes.len() as u64,
    })
}

/// Stage a local file, validating it exists and is readable.
pub fn stage_path(path: &Path) -> Result<StagedBlueprint, EstimatorError> {
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    // Reject the type before reading a possibly large file.
    MediaType::from_file_name(&file_name)?;

    let bytes = match std::fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(EstimatorError::FileNotFound {
                path: PathBuf::from(path),
            });
        }
        Err(e) => {
            return Err(EstimatorError::io(
                format!("Failed to read '{}'", path.display()),
                e,
            ));
        }
    };

    stage_bytes(&bytes, &file_name)
}

/// Text after the last `.`, if there is one and it is non-empty.
fn extension(file_name: &str) -> Option<&str> {
    file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty())
}
