//! File storage.

use bytes::Bytes;
use reqwest::multipart::Form;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

use crate::error::ClientError;
use crate::executor::{Envelope, RequestExecutor};
use crate::services::{file_part, require_file, require_id};

const FILES_PATH: &str = "/files";

/// What an uploaded file will be used for.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "kebab-case")]
pub enum FilePurpose {
    Batch,
    FileExtract,
    CodeInterpreter,
    Agent,
    VoiceCloneInput,
}

impl FilePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Batch => "batch",
            Self::FileExtract => "file-extract",
            Self::CodeInterpreter => "code-interpreter",
            Self::Agent => "agent",
            Self::VoiceCloneInput => "voice-clone-input",
        }
    }
}

impl fmt::Display for FilePurpose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default)]
pub struct FileUploadParams {
    pub purpose: Option<String>,
    pub file_path: Option<PathBuf>,
    /// Additional form fields; strings are sent verbatim, other values as JSON text.
    pub extra: Map<String, Value>,
}

impl FileUploadParams {
    pub fn new(purpose: FilePurpose, file_path: impl Into<PathBuf>) -> Self {
        Self {
            purpose: Some(purpose.to_string()),
            file_path: Some(file_path.into()),
            extra: Map::new(),
        }
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    async fn into_form(self) -> Result<Form, ClientError> {
        let mut form = Form::new();
        if let Some(path) = &self.file_path {
            form = form.part("file", file_part(path, "application/octet-stream").await?);
        }
        form = form.text("purpose", self.purpose.unwrap_or_default());

        for (key, value) in self.extra {
            let text = match value {
                Value::String(s) => s,
                other => other.to_string(),
            };
            form = form.text(key, text);
        }
        Ok(form)
    }
}

/// Filters for listing files.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileListParams {
    /// Cursor: list files after this id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub after: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub purpose: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FileInfo {
    pub id: Option<String>,
    pub object: Option<String>,
    pub bytes: Option<i64>,
    pub created_at: Option<i64>,
    pub filename: Option<String>,
    pub purpose: Option<String>,
    pub status: Option<String>,
    pub status_details: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct QueryFileResult {
    pub object: Option<String>,
    pub data: Vec<FileInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileDeleted {
    pub id: Option<String>,
    #[serde(default)]
    pub deleted: bool,
    #[serde(default = "file_object")]
    pub object: String,
}

fn file_object() -> String {
    "file".to_string()
}

/// File endpoints.
#[derive(Debug, Clone)]
pub struct FilesService {
    executor: RequestExecutor,
}

impl FilesService {
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    pub async fn upload(&self, params: FileUploadParams) -> Result<Envelope<FileInfo>, ClientError> {
        require_file("file_path", params.file_path.as_deref())?;
        let form = params.into_form().await?;

        Ok(self
            .executor
            .execute_request(form, |t, form| async move {
                t.send_json(t.request(Method::POST, FILES_PATH).multipart(form))
                    .await
            })
            .await)
    }

    pub async fn list(&self, params: FileListParams) -> Envelope<QueryFileResult> {
        self.executor
            .execute_request(params, |t, params| async move {
                t.send_json(t.request(Method::GET, FILES_PATH).query(&params))
                    .await
            })
            .await
    }

    pub async fn delete(&self, file_id: &str) -> Result<Envelope<FileDeleted>, ClientError> {
        require_id("file_id", file_id)?;

        Ok(self
            .executor
            .execute_request(file_id, |t, file_id| async move {
                let url = t.resource_url(FILES_PATH, &[file_id])?;
                t.send_json(t.request_url(Method::DELETE, url)).await
            })
            .await)
    }

    /// Raw content of a stored file.
    pub async fn content(&self, file_id: &str) -> Result<Envelope<Bytes>, ClientError> {
        require_id("file_id", file_id)?;

        Ok(self
            .executor
            .execute_request(file_id, |t, file_id| async move {
                let url = t.resource_url(FILES_PATH, &[file_id, "content"])?;
                t.send_bytes(t.request_url(Method::GET, url)).await
            })
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_purpose_wire_names() {
        assert_eq!(FilePurpose::FileExtract.to_string(), "file-extract");
        assert_eq!(
            serde_json::to_value(FilePurpose::VoiceCloneInput).unwrap(),
            json!("voice-clone-input")
        );
    }

    #[test]
    fn test_list_params_as_query() {
        let params = FileListParams {
            purpose: Some("batch".to_string()),
            limit: Some(10),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({"purpose": "batch", "limit": 10})
        );
    }

    #[test]
    fn test_file_deleted_defaults() {
        let deleted: FileDeleted = serde_json::from_str(r#"{"id":"file-1"}"#).unwrap();
        assert_eq!(deleted.object, "file");
        assert!(!deleted.deleted);
    }

    #[tokio::test]
    async fn test_form_built_from_readable_file() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let params = FileUploadParams::new(FilePurpose::Batch, file.path())
            .with_extra("knowledge_id", json!(42));
        let form = params.into_form().await.unwrap();
        assert!(!form.boundary().is_empty());
    }
}
