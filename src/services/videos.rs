//! Asynchronous video generation.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ClientError;
use crate::executor::{Envelope, RequestExecutor};
use crate::model::{SensitiveWordCheck, TaskStatus};
use crate::services::{require_id, require_text};

const GENERATIONS_PATH: &str = "/videos/generations";
const ASYNC_RESULT_PATH: &str = "/async-result";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct VideoCreateParams {
    pub model: String,

    pub prompt: String,

    /// An image URL, base64 data, or a list of either.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub quality: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub with_audio: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub style: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub movement_amplitude: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub aspect_ratio: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark_enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub off_peak: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitive_word_check: Option<SensitiveWordCheck>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl VideoCreateParams {
    pub fn new(model: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            prompt: prompt.into(),
            ..Self::default()
        }
    }

    pub fn with_image_url(mut self, image_url: impl Into<String>) -> Self {
        self.image_url = Some(Value::String(image_url.into()));
        self
    }

    pub fn with_quality(mut self, quality: impl Into<String>) -> Self {
        self.quality = Some(quality.into());
        self
    }

    pub fn with_audio(mut self, with_audio: bool) -> Self {
        self.with_audio = Some(with_audio);
        self
    }

    pub fn with_size(mut self, size: impl Into<String>) -> Self {
        self.size = Some(size.into());
        self
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = Some(fps);
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct VideoResult {
    pub url: String,
    pub cover_image_url: String,
}

/// A video generation task and, once finished, its results.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct VideoObject {
    pub id: Option<String>,
    pub model: Option<String>,
    pub request_id: Option<String>,
    pub task_status: Option<TaskStatus>,
    pub video_result: Vec<VideoResult>,
}

impl VideoObject {
    pub fn is_finished(&self) -> bool {
        matches!(
            self.task_status,
            Some(TaskStatus::Success) | Some(TaskStatus::Fail)
        )
    }
}

/// Video endpoints.
#[derive(Debug, Clone)]
pub struct VideosService {
    executor: RequestExecutor,
}

impl VideosService {
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    /// Submit a generation task. Poll [`generations_result`](Self::generations_result)
    /// with the returned id until the task finishes.
    pub async fn generations(
        &self,
        request: VideoCreateParams,
    ) -> Result<Envelope<VideoObject>, ClientError> {
        require_text("model", Some(request.model.as_str()))?;
        require_text("prompt", Some(request.prompt.as_str()))?;

        Ok(self
            .executor
            .execute_request(request, |t, req| async move {
                t.send_json(t.request(Method::POST, GENERATIONS_PATH).json(&req))
                    .await
            })
            .await)
    }

    pub async fn generations_result(
        &self,
        task_id: &str,
    ) -> Result<Envelope<VideoObject>, ClientError> {
        require_id("task_id", task_id)?;

        Ok(self
            .executor
            .execute_request(task_id, |t, task_id| async move {
                let url = t.resource_url(ASYNC_RESULT_PATH, &[task_id])?;
                t.send_json(t.request_url(Method::GET, url)).await
            })
            .await)
    }
}
