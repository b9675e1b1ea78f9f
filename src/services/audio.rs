//! Speech synthesis, voice cloning and transcription.

use bytes::Bytes;
use reqwest::multipart::Form;
use reqwest::Method;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ClientError;
use crate::executor::{Envelope, RequestExecutor};
use crate::model::{Choice, Segment, SensitiveWordCheck};
use crate::services::{audio_mime, file_part, require_file, require_text, text_field};

const SPEECH_PATH: &str = "/audio/speech";
const CUSTOMIZATION_PATH: &str = "/audio/customization";
const TRANSCRIPTION_PATH: &str = "/audio/transcriptions";

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AudioSpeechRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub voice: Option<String>,

    /// Container of the returned audio, e.g. `wav` or `mp3`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_format: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitive_word_check: Option<SensitiveWordCheck>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub watermark_enabled: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl AudioSpeechRequest {
    pub fn new(model: impl Into<String>, input: impl Into<String>) -> Self {
        Self {
            model: Some(model.into()),
            input: Some(input.into()),
            ..Self::default()
        }
    }

    pub fn with_voice(mut self, voice: impl Into<String>) -> Self {
        self.voice = Some(voice.into());
        self
    }

    pub fn with_response_format(mut self, format: impl Into<String>) -> Self {
        self.response_format = Some(format.into());
        self
    }
}

/// Synthesize `input` in the voice of a reference recording.
#[derive(Debug, Clone, Default)]
pub struct AudioCustomizationRequest {
    pub model: Option<String>,
    pub input: Option<String>,
    /// Transcript of the reference recording.
    pub voice_text: Option<String>,
    pub voice_data: Option<PathBuf>,
    pub response_format: Option<String>,
    pub sensitive_word_check: Option<SensitiveWordCheck>,
    pub request_id: Option<String>,
    pub user_id: Option<String>,
}

impl AudioCustomizationRequest {
    pub fn new(
        model: impl Into<String>,
        input: impl Into<String>,
        voice_data: impl Into<PathBuf>,
    ) -> Self {
        Self {
            model: Some(model.into()),
            input: Some(input.into()),
            voice_data: Some(voice_data.into()),
            ..Self::default()
        }
    }

    pub fn with_voice_text(mut self, text: impl Into<String>) -> Self {
        self.voice_text = Some(text.into());
        self
    }

    fn validate(&self) -> Result<(), ClientError> {
        require_text("model", self.model.as_deref())?;
        require_text("input", self.input.as_deref())?;
        require_file("voice_data", self.voice_data.as_deref())?;
        Ok(())
    }

    async fn into_form(self) -> Result<Form, ClientError> {
        let mut form = Form::new();
        form = text_field(form, "input", self.input.as_deref());
        form = text_field(form, "model", self.model.as_deref());
        form = text_field(form, "voice_text", self.voice_text.as_deref());
        form = text_field(form, "response_format", self.response_format.as_deref());
        form = text_field(form, "request_id", self.request_id.as_deref());
        form = text_field(form, "user_id", self.user_id.as_deref());

        if let Some(check) = &self.sensitive_word_check {
            let part = reqwest::multipart::Part::text(serde_json::to_string(check)?)
                .mime_str("application/json")?;
            form = form.part("sensitive_word_check", part);
        }

        if let Some(path) = self.voice_data {
            form = form.part("voice_data", file_part(&path, audio_mime(&path)).await?);
        }
        Ok(form)
    }
}

#[derive(Debug, Clone, Default)]
pub struct AudioTranscriptionRequest {
    pub model: Option<String>,
    pub file: Option<PathBuf>,
    pub stream: Option<bool>,
    pub temperature: Option<f32>,
    pub request_id: Option<String>,
    pub user_id: Option<String>,
}

impl AudioTranscriptionRequest {
    pub fn new(model: impl Into<String>, file: impl Into<PathBuf>) -> Self {
        Self {
            model: Some(model.into()),
            file: Some(file.into()),
            ..Self::default()
        }
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    fn validate(&self) -> Result<(), ClientError> {
        require_text("model", self.model.as_deref())?;
        require_file("file", self.file.as_deref())?;
        Ok(())
    }

    async fn into_form(self) -> Result<Form, ClientError> {
        let mut form = Form::new();
        form = text_field(form, "model", self.model.as_deref());
        if let Some(stream) = self.stream {
            form = form.text("stream", stream.to_string());
        }
        form = text_field(form, "request_id", self.request_id.as_deref());
        form = text_field(form, "user_id", self.user_id.as_deref());
        if let Some(temperature) = self.temperature {
            form = form.text("temperature", temperature.to_string());
        }

        if let Some(path) = self.file {
            form = form.part("file", file_part(&path, audio_mime(&path)).await?);
        }
        Ok(form)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AudioTranscriptionResult {
    pub request_id: Option<String>,
    pub created: Option<i64>,
    pub model: Option<String>,
    pub id: Option<String>,
    pub text: Option<String>,
    pub segments: Vec<Segment>,
}

/// One event of a streamed transcription.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AudioTranscriptionChunk {
    pub choices: Vec<Choice>,
    pub created: Option<i64>,
    pub model: Option<String>,
    pub id: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub delta: Option<String>,
}

/// Audio endpoints.
#[derive(Debug, Clone)]
pub struct AudioService {
    executor: RequestExecutor,
}

impl AudioService {
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    /// Synthesize speech; `data` holds the encoded audio.
    pub async fn speech(&self, request: AudioSpeechRequest) -> Result<Envelope<Bytes>, ClientError> {
        require_text("model", request.model.as_deref())?;
        require_text("input", request.input.as_deref())?;

        Ok(self
            .executor
            .execute_request(request, |t, req| async move {
                t.send_bytes(t.request(Method::POST, SPEECH_PATH).json(&req))
                    .await
            })
            .await)
    }

    /// Clone a voice from `voice_data`; `data` holds the encoded audio.
    pub async fn customization(
        &self,
        request: AudioCustomizationRequest,
    ) -> Result<Envelope<Bytes>, ClientError> {
        request.validate()?;
        let form = request.into_form().await?;

        Ok(self
            .executor
            .execute_request(form, |t, form| async move {
                t.send_bytes(t.request(Method::POST, CUSTOMIZATION_PATH).multipart(form))
                    .await
            })
            .await)
    }

    /// Transcribe an audio file, streamed as [`AudioTranscriptionChunk`]s when
    /// `stream` is set.
    pub async fn transcription(
        &self,
        request: AudioTranscriptionRequest,
    ) -> Result<Envelope<AudioTranscriptionResult, AudioTranscriptionChunk>, ClientError> {
        request.validate()?;
        let streaming = request.stream == Some(true);
        let form = request.into_form().await?;

        if streaming {
            return Ok(self
                .executor
                .execute_streaming_request(form, |t, form| async move {
                    t.send_stream(
                        t.streaming_request(Method::POST, TRANSCRIPTION_PATH)
                            .multipart(form),
                    )
                    .await
                })
                .await);
        }

        let envelope: Envelope<AudioTranscriptionResult> = self
            .executor
            .execute_request(form, |t, form| async move {
                t.send_json(t.request(Method::POST, TRANSCRIPTION_PATH).multipart(form))
                    .await
            })
            .await;
        Ok(envelope.with_stream_type())
    }
}
