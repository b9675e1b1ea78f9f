//! Per-endpoint services.
//!
//! Each service maps typed requests onto a path and verb and runs them
//! through the shared [`RequestExecutor`](crate::executor::RequestExecutor).

pub mod agents;
pub mod assistant;
pub mod audio;
pub mod files;
pub mod videos;

pub use agents::AgentsService;
pub use assistant::AssistantService;
pub use audio::AudioService;
pub use files::FilesService;
pub use videos::VideosService;

use reqwest::multipart::{Form, Part};
use std::path::Path;

use crate::error::{ClientError, ValidationError};

/// Fail unless `value` holds non-blank text.
pub(crate) fn require_text(field: &'static str, value: Option<&str>) -> Result<(), ValidationError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(()),
        _ => Err(ValidationError::required(field)),
    }
}

/// Fail unless `id` can stand as a single URL path segment.
pub(crate) fn require_id(field: &'static str, id: &str) -> Result<(), ValidationError> {
    require_text(field, Some(id))?;
    if matches!(id.trim(), "." | "..") {
        return Err(ValidationError {
            field,
            reason: "is not a valid identifier",
        });
    }
    Ok(())
}

/// Fail unless `path` is set and points at an existing file.
pub(crate) fn require_file(field: &'static str, path: Option<&Path>) -> Result<(), ValidationError> {
    match path {
        None => Err(ValidationError::required(field)),
        Some(p) if p.as_os_str().is_empty() => Err(ValidationError::required(field)),
        Some(p) if !p.is_file() => Err(ValidationError {
            field,
            reason: "file does not exist",
        }),
        Some(_) => Ok(()),
    }
}

/// Add a text field to a form, skipping empty values.
pub(crate) fn text_field(form: Form, name: &'static str, value: Option<&str>) -> Form {
    match value {
        Some(v) if !v.is_empty() => form.text(name, v.to_string()),
        _ => form,
    }
}

/// Read a file into a multipart part named after the file.
pub(crate) async fn file_part(path: &Path, mime: &str) -> Result<Part, ClientError> {
    let data = tokio::fs::read(path).await?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "file".to_string());
    Ok(Part::bytes(data).file_name(name).mime_str(mime)?)
}

/// Content type of an audio file, judged by its extension.
pub(crate) fn audio_mime(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase())
        .unwrap_or_default();
    match ext.as_str() {
        "mp3" => "audio/mpeg",
        "wav" => "audio/wav",
        "m4a" => "audio/mp4",
        "aac" => "audio/aac",
        "ogg" => "audio/ogg",
        "flac" => "audio/flac",
        "wma" => "audio/x-ms-wma",
        _ => "audio/mpeg",
    }
}
