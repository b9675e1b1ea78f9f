//! Wire models shared by several endpoints.
//!
//! Response types are lenient: every field is optional and unknown fields
//! are ignored, so new server-side additions never break decoding.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Status of an asynchronous task.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Processing,
    Success,
    Fail,
    #[serde(other)]
    Unknown,
}

/// Completion payload returned by chat-style endpoints, both as a whole
/// response and as individual stream chunks.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ModelData {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<i64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<Choice>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_status: Option<TaskStatus>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub agent_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    /// Identifier to poll when the agent answers asynchronously.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub async_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub web_search: Vec<WebSearchResult>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<Segment>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<String>,
}

impl ModelData {
    /// Concatenated text of every choice's message or delta.
    pub fn content(&self) -> String {
        self.choices
            .iter()
            .filter_map(|choice| {
                choice
                    .delta
                    .as_ref()
                    .and_then(|d| d.content.clone())
                    .or_else(|| choice.message.as_ref().and_then(ChatMessage::text))
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Choice {
    pub index: i64,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<ChatMessage>,

    /// Agent responses carry a list of messages instead of a single one.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<AgentReply>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<Delta>,
}

/// A message produced by an agent.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AgentReply {
    pub role: String,
    pub content: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ChatMessage {
    pub role: String,

    /// Plain text, or a list of typed content parts.
    pub content: Value,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioData>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    pub fn text(&self) -> Option<String> {
        self.content.as_str().map(str::to_string)
    }
}

/// Incremental message update in a stream chunk.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioData>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct ToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<FunctionCall>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub mcp: Option<McpToolCall>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct FunctionCall {
    pub name: String,
    /// Arguments as sent by the model; usually a JSON-encoded string.
    pub arguments: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct McpToolCall {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub server_label: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<McpToolDefinition>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(skip_serializing_if = "Value::is_null")]
    pub output: Value,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct McpToolDefinition {
    pub name: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(skip_serializing_if = "Value::is_null")]
    pub annotations: Value,

    #[serde(skip_serializing_if = "Value::is_null")]
    pub input_schema: Value,
}

/// Token usage information.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_calls: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_tokens_details: Option<PromptTokensDetails>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub completion_tokens_details: Option<CompletionTokensDetails>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct PromptTokensDetails {
    pub cached_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct CompletionTokensDetails {
    pub reasoning_tokens: u32,
}

/// Audio attached to a generated message.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AudioData {
    pub id: String,
    /// Base64-encoded audio.
    pub data: String,
    pub expires_at: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct WebSearchResult {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refer: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub publish_date: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// A timed span of transcribed audio.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
#[serde(default)]
pub struct Segment {
    pub id: i64,
    pub start: f64,
    pub end: f64,
    pub text: String,
}

/// Sensitive-word filtering options accepted by several endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct SensitiveWordCheck {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completion_response_deserialization() {
        let json = r#"{
            "id": "chatcmpl-1",
            "created": 1700000000,
            "model": "glm-4",
            "request_id": "req-1",
            "choices": [{
                "index": 0,
                "finish_reason": "stop",
                "message": {"role": "assistant", "content": "Hello there"}
            }],
            "usage": {"prompt_tokens": 5, "completion_tokens": 2, "total_tokens": 7},
            "brand_new_field": true
        }"#;

        let data: ModelData = serde_json::from_str(json).unwrap();
        assert_eq!(data.id.as_deref(), Some("chatcmpl-1"));
        assert_eq!(data.content(), "Hello there");
        assert_eq!(data.usage.unwrap().total_tokens, 7);
        assert!(data.task_status.is_none());
    }

    #[test]
    fn test_stream_chunk_deserialization() {
        let json = r#"{"id":"1","choices":[{"index":0,"delta":{"role":"assistant","content":"Hel"}}]}"#;
        let data: ModelData = serde_json::from_str(json).unwrap();
        assert_eq!(data.content(), "Hel");
    }

    #[test]
    fn test_agent_reply_deserialization() {
        let json = r#"{
            "agent_id": "translator",
            "status": "success",
            "choices": [{"index": 0, "messages": [{"role": "assistant", "content": {"type": "text", "text": "Bonjour"}}]}]
        }"#;

        let data: ModelData = serde_json::from_str(json).unwrap();
        assert_eq!(data.agent_id.as_deref(), Some("translator"));
        assert_eq!(data.choices[0].messages[0].content["text"], "Bonjour");
    }

    #[test]
    fn test_task_status_values() {
        let status: TaskStatus = serde_json::from_str("\"PROCESSING\"").unwrap();
        assert_eq!(status, TaskStatus::Processing);
        let status: TaskStatus = serde_json::from_str("\"QUEUED\"").unwrap();
        assert_eq!(status, TaskStatus::Unknown);
    }

    #[test]
    fn test_tool_call_deserialization() {
        let json = r#"{"id":"call_1","type":"function","function":{"name":"get_weather","arguments":"{\"city\":\"Beijing\"}"}}"#;
        let call: ToolCall = serde_json::from_str(json).unwrap();
        let function = call.function.unwrap();
        assert_eq!(function.name, "get_weather");
        assert_eq!(function.arguments, "{\"city\":\"Beijing\"}");
    }

    #[test]
    fn test_sensitive_word_check_serialization() {
        let check = SensitiveWordCheck {
            kind: Some("ALL".to_string()),
            status: Some("DISABLE".to_string()),
        };
        assert_eq!(
            serde_json::to_value(&check).unwrap(),
            serde_json::json!({"type": "ALL", "status": "DISABLE"})
        );
    }
}
