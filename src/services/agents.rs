//! Agent completions.

use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{ClientError, ValidationError};
use crate::executor::{Envelope, RequestExecutor};
use crate::model::{ModelData, SensitiveWordCheck};
use crate::services::require_text;

const COMPLETION_PATH: &str = "/v1/agents";
const ASYNC_RESULT_PATH: &str = "/v1/agents/async-result";

/// A typed part of an agent message.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentContent {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub object: Option<Value>,
}

impl AgentContent {
    fn of_kind(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            text: None,
            image_url: None,
            video_url: None,
            object: None,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::of_kind("text")
        }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self {
            image_url: Some(url.into()),
            ..Self::of_kind("image_url")
        }
    }

    pub fn video_url(url: impl Into<String>) -> Self {
        Self {
            video_url: Some(url.into()),
            ..Self::of_kind("video_url")
        }
    }

    pub fn object(object: Value) -> Self {
        Self {
            object: Some(object),
            ..Self::of_kind("object")
        }
    }
}

/// Message content: plain text or a list of typed parts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AgentMessageContent {
    Text(String),
    Parts(Vec<AgentContent>),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AgentMessage {
    pub role: String,
    pub content: AgentMessageContent,
}

impl AgentMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: AgentMessageContent::Text(content.into()),
        }
    }

    pub fn user_parts(parts: Vec<AgentContent>) -> Self {
        Self {
            role: "user".to_string(),
            content: AgentMessageContent::Parts(parts),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentsCompletionRequest {
    pub agent_id: String,

    pub messages: Vec<AgentMessage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sensitive_word_check: Option<SensitiveWordCheck>,

    /// Variables substituted into the agent's prompt template.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub custom_variables: Option<Map<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AgentsCompletionRequest {
    pub fn new(agent_id: impl Into<String>, messages: Vec<AgentMessage>) -> Self {
        Self {
            agent_id: agent_id.into(),
            messages,
            ..Self::default()
        }
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = Some(stream);
        self
    }

    pub fn with_custom_variable(mut self, key: impl Into<String>, value: Value) -> Self {
        self.custom_variables
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn with_sensitive_word_check(mut self, check: SensitiveWordCheck) -> Self {
        self.sensitive_word_check = Some(check);
        self
    }

    fn validate(&self) -> Result<(), ClientError> {
        require_text("agent_id", Some(self.agent_id.as_str()))?;
        if self.messages.is_empty() {
            return Err(ValidationError::required("messages").into());
        }
        Ok(())
    }
}

/// Poll for the result of an asynchronous agent run.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AgentAsyncResultRequest {
    pub task_id: String,

    pub agent_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl AgentAsyncResultRequest {
    pub fn new(agent_id: impl Into<String>, task_id: impl Into<String>) -> Self {
        Self {
            agent_id: agent_id.into(),
            task_id: task_id.into(),
            request_id: None,
        }
    }
}

/// Agent completion endpoints.
#[derive(Debug, Clone)]
pub struct AgentsService {
    executor: RequestExecutor,
}

impl AgentsService {
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    /// Run an agent. With `stream` set the envelope carries an event stream,
    /// otherwise the full response in `data`.
    pub async fn completion(
        &self,
        request: AgentsCompletionRequest,
    ) -> Result<Envelope<ModelData>, ClientError> {
        request.validate()?;

        let envelope: Envelope<ModelData> = if request.stream == Some(true) {
            self.executor
                .execute_streaming_request(request, |t, req| async move {
                    t.send_stream(t.streaming_request(Method::POST, COMPLETION_PATH).json(&req))
                        .await
                })
                .await
        } else {
            self.executor
                .execute_request(request, |t, req| async move {
                    t.send_json(t.request(Method::POST, COMPLETION_PATH).json(&req))
                        .await
                })
                .await
        };
        Ok(envelope)
    }

    pub async fn async_result(
        &self,
        request: AgentAsyncResultRequest,
    ) -> Result<Envelope<ModelData>, ClientError> {
        require_text("task_id", Some(request.task_id.as_str()))?;
        require_text("agent_id", Some(request.agent_id.as_str()))?;

        Ok(self
            .executor
            .execute_request(request, |t, req| async move {
                t.send_json(t.request(Method::POST, ASYNC_RESULT_PATH).json(&req))
                    .await
            })
            .await)
    }
}
