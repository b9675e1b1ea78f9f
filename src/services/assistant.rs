//! Assistant conversations.
//!
//! Streamed assistant deltas are polymorphic: a delta either carries text or
//! a list of tool invocations, and each tool invocation has its own shape.
//! Both are decoded from raw JSON by inspecting the payload, with an
//! [`AssistantToolCall::Unknown`] fallback that keeps the raw object.

use reqwest::Method;
use serde::de::Error as DeError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::{json, Map, Value};
use std::collections::HashMap;

use crate::error::ClientError;
use crate::executor::{Envelope, RequestExecutor};
use crate::services::require_text;

const COMPLETION_PATH: &str = "/assistant";
const QUERY_SUPPORT_PATH: &str = "/assistant/list";
const CONVERSATION_USAGE_PATH: &str = "/assistant/conversation/list";

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AssistantTextContent {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AssistantConversationMessage {
    pub role: String,
    pub content: Vec<AssistantTextContent>,
}

impl AssistantConversationMessage {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: vec![AssistantTextContent {
                kind: "text".to_string(),
                text: text.into(),
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AssistantAttachment {
    pub file_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AssistantTranslateParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AssistantExtraParameters {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub translate: Option<AssistantTranslateParameters>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AssistantParameters {
    pub assistant_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stream: Option<bool>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub messages: Vec<AssistantConversationMessage>,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<AssistantAttachment>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub extra_parameters: Option<AssistantExtraParameters>,
}

impl AssistantParameters {
    pub fn new(assistant_id: impl Into<String>, messages: Vec<AssistantConversationMessage>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            messages,
            ..Self::default()
        }
    }

    pub fn with_conversation_id(mut self, conversation_id: impl Into<String>) -> Self {
        self.conversation_id = Some(conversation_id.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_attachment(mut self, file_id: impl Into<String>) -> Self {
        self.attachments.push(AssistantAttachment {
            file_id: file_id.into(),
        });
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct AssistantFunction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arguments: Option<String>,
}

/// A tool invocation reported by the assistant.
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantToolCall {
    WebBrowser {
        url: Option<String>,
    },
    Retrieval,
    Function {
        function: Option<AssistantFunction>,
    },
    CodeInterpreter {
        code: Option<String>,
        input: Option<String>,
        output: Option<String>,
    },
    DrawingTool {
        prompt: Option<String>,
    },
    /// A tool kind this SDK does not model; `raw` holds the original object.
    Unknown {
        kind: Option<String>,
        raw: Value,
    },
}

impl AssistantToolCall {
    /// Decode a tool call, inferring its kind from its fields when `type` is absent.
    pub fn from_value(value: Value) -> Self {
        let Value::Object(map) = &value else {
            return Self::Unknown {
                kind: None,
                raw: value,
            };
        };

        match resolve_tool_kind(map).as_deref() {
            Some("web_browser") => Self::WebBrowser {
                url: string_field(map, "url"),
            },
            Some("retrieval") => Self::Retrieval,
            Some("function") => Self::Function {
                function: map.get("function").and_then(|f| {
                    f.as_object().map(|f| AssistantFunction {
                        name: string_field(f, "name"),
                        arguments: string_field(f, "arguments"),
                    })
                }),
            },
            Some("code_interpreter") => Self::CodeInterpreter {
                code: string_field(map, "code"),
                input: string_field(map, "input"),
                output: string_field(map, "output"),
            },
            Some("drawing_tool") => Self::DrawingTool {
                prompt: string_field(map, "prompt"),
            },
            other => Self::Unknown {
                kind: other.map(str::to_string),
                raw: value.clone(),
            },
        }
    }

    /// Wire name of the tool kind.
    pub fn kind(&self) -> Option<&str> {
        match self {
            Self::WebBrowser { .. } => Some("web_browser"),
            Self::Retrieval => Some("retrieval"),
            Self::Function { .. } => Some("function"),
            Self::CodeInterpreter { .. } => Some("code_interpreter"),
            Self::DrawingTool { .. } => Some("drawing_tool"),
            Self::Unknown { kind, .. } => kind.as_deref(),
        }
    }

    fn to_value(&self) -> Value {
        match self {
            Self::WebBrowser { url } => json!({"type": "web_browser", "url": url}),
            Self::Retrieval => json!({"type": "retrieval"}),
            Self::Function { function } => json!({"type": "function", "function": function}),
            Self::CodeInterpreter {
                code,
                input,
                output,
            } => json!({"type": "code_interpreter", "code": code, "input": input, "output": output}),
            Self::DrawingTool { prompt } => json!({"type": "drawing_tool", "prompt": prompt}),
            Self::Unknown { raw, .. } => raw.clone(),
        }
    }
}

fn resolve_tool_kind(map: &Map<String, Value>) -> Option<String> {
    if let Some(kind) = map.get("type").and_then(Value::as_str) {
        return Some(kind.to_string());
    }
    let has = |key: &str| map.contains_key(key);
    if has("function") {
        Some("function".to_string())
    } else if has("url") {
        Some("web_browser".to_string())
    } else if has("code") || has("input") || has("output") {
        Some("code_interpreter".to_string())
    } else if has("prompt") {
        Some("drawing_tool".to_string())
    } else {
        None
    }
}

/// String value of `key`; non-string values are rendered as JSON text.
fn string_field(map: &Map<String, Value>, key: &str) -> Option<String> {
    match map.get(key) {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(other) => Some(other.to_string()),
    }
}

impl<'de> Deserialize<'de> for AssistantToolCall {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(Self::from_value(Value::deserialize(deserializer)?))
    }
}

impl Serialize for AssistantToolCall {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_value().serialize(serializer)
    }
}

/// Content of an assistant delta.
#[derive(Debug, Clone, PartialEq)]
pub enum AssistantMessageContent {
    Text {
        role: String,
        content: Option<String>,
    },
    Tools {
        role: String,
        tool_calls: Vec<AssistantToolCall>,
    },
}

impl<'de> Deserialize<'de> for AssistantMessageContent {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let Value::Object(map) = value else {
            return Err(<D::Error as DeError>::custom(
                "assistant message content must be a JSON object",
            ));
        };
        let role = map.get("role").and_then(Value::as_str).map(str::to_string);

        if let Some(calls) = map.get("tool_calls") {
            let tool_calls = match calls {
                Value::Array(items) => items
                    .iter()
                    .cloned()
                    .map(AssistantToolCall::from_value)
                    .collect(),
                Value::Object(_) => vec![AssistantToolCall::from_value(calls.clone())],
                _ => Vec::new(),
            };
            return Ok(Self::Tools {
                role: role.unwrap_or_else(|| "tool".to_string()),
                tool_calls,
            });
        }

        Ok(Self::Text {
            role: role.unwrap_or_else(|| "assistant".to_string()),
            content: string_field(&map, "content"),
        })
    }
}

impl Serialize for AssistantMessageContent {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let value = match self {
            Self::Text { role, content } => json!({"role": role, "content": content}),
            Self::Tools { role, tool_calls } => json!({"role": role, "tool_calls": tool_calls}),
        };
        value.serialize(serializer)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AssistantChoice {
    pub index: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delta: Option<AssistantMessageContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<HashMap<String, Value>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(default)]
pub struct AssistantUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AssistantErrorInfo {
    pub code: Option<String>,
    pub message: Option<String>,
}

/// A whole assistant answer, or one stream chunk of it.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AssistantCompletion {
    pub id: Option<String>,
    pub conversation_id: Option<String>,
    pub assistant_id: Option<String>,
    pub created: Option<i64>,
    pub status: Option<String>,
    pub last_error: Option<AssistantErrorInfo>,
    pub choices: Vec<AssistantChoice>,
    pub metadata: Option<HashMap<String, Value>>,
    pub usage: Option<AssistantUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AssistantQuerySupportParams {
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub assistant_id_list: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AssistantSupport {
    pub assistant_id: Option<String>,
    pub created_at: Option<String>,
    pub updated_at: Option<String>,
    pub name: Option<String>,
    pub avatar: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub tools: Vec<String>,
    pub starter_prompts: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AssistantSupportStatus {
    pub code: i64,
    pub msg: Option<String>,
    pub data: Vec<AssistantSupport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AssistantConversationParameters {
    pub assistant_id: String,
    pub page: u32,
    pub page_size: u32,
}

impl AssistantConversationParameters {
    pub fn new(assistant_id: impl Into<String>) -> Self {
        Self {
            assistant_id: assistant_id.into(),
            page: 1,
            page_size: 10,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AssistantConversationUsage {
    pub id: Option<String>,
    pub assistant_id: Option<String>,
    pub create_time: Option<String>,
    pub update_time: Option<String>,
    pub usage: Option<AssistantUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AssistantConversationUsageList {
    pub assistant_id: Option<String>,
    pub has_more: bool,
    pub conversation_list: Vec<AssistantConversationUsage>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AssistantConversationUsageListStatus {
    pub code: i64,
    pub msg: Option<String>,
    pub data: Option<AssistantConversationUsageList>,
}

/// Assistant endpoints.
#[derive(Debug, Clone)]
pub struct AssistantService {
    executor: RequestExecutor,
}

impl AssistantService {
    pub fn new(executor: RequestExecutor) -> Self {
        Self { executor }
    }

    pub async fn completion(
        &self,
        mut request: AssistantParameters,
    ) -> Result<Envelope<AssistantCompletion>, ClientError> {
        require_text("assistant_id", Some(request.assistant_id.as_str()))?;
        request.stream = Some(false);

        Ok(self
            .executor
            .execute_request(request, |t, req| async move {
                t.send_json(t.request(Method::POST, COMPLETION_PATH).json(&req))
                    .await
            })
            .await)
    }

    pub async fn completion_stream(
        &self,
        mut request: AssistantParameters,
    ) -> Result<Envelope<AssistantCompletion>, ClientError> {
        require_text("assistant_id", Some(request.assistant_id.as_str()))?;
        request.stream = Some(true);

        Ok(self
            .executor
            .execute_streaming_request(request, |t, req| async move {
                t.send_stream(t.streaming_request(Method::POST, COMPLETION_PATH).json(&req))
                    .await
            })
            .await)
    }

    pub async fn query_support(
        &self,
        request: AssistantQuerySupportParams,
    ) -> Envelope<AssistantSupportStatus> {
        self.executor
            .execute_request(request, |t, req| async move {
                t.send_json(t.request(Method::POST, QUERY_SUPPORT_PATH).json(&req))
                    .await
            })
            .await
    }

    pub async fn conversation_usage(
        &self,
        request: AssistantConversationParameters,
    ) -> Result<Envelope<AssistantConversationUsageListStatus>, ClientError> {
        require_text("assistant_id", Some(request.assistant_id.as_str()))?;

        Ok(self
            .executor
            .execute_request(request, |t, req| async move {
                t.send_json(t.request(Method::POST, CONVERSATION_USAGE_PATH).json(&req))
                    .await
            })
            .await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delta(json: &str) -> AssistantMessageContent {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_text_delta() {
        assert_eq!(
            delta(r#"{"role":"assistant","content":"Hi"}"#),
            AssistantMessageContent::Text {
                role: "assistant".to_string(),
                content: Some("Hi".to_string()),
            }
        );
    }

    #[test]
    fn test_text_delta_defaults_role_and_renders_structured_content() {
        match delta(r#"{"content":[{"a":1}]}"#) {
            AssistantMessageContent::Text { role, content } => {
                assert_eq!(role, "assistant");
                assert_eq!(content.as_deref(), Some(r#"[{"a":1}]"#));
            }
            other => panic!("expected text, got {:?}", other),
        }
    }

    #[test]
    fn test_tools_delta_with_explicit_types() {
        let content = delta(
            r#"{"role":"tool","tool_calls":[
                {"type":"web_browser","url":"https://z.ai"},
                {"type":"function","function":{"name":"f","arguments":"{}"}},
                {"type":"retrieval"}
            ]}"#,
        );

        let AssistantMessageContent::Tools { role, tool_calls } = content else {
            panic!("expected tools");
        };
        assert_eq!(role, "tool");
        assert_eq!(
            tool_calls,
            vec![
                AssistantToolCall::WebBrowser {
                    url: Some("https://z.ai".to_string())
                },
                AssistantToolCall::Function {
                    function: Some(AssistantFunction {
                        name: Some("f".to_string()),
                        arguments: Some("{}".to_string()),
                    })
                },
                AssistantToolCall::Retrieval,
            ]
        );
    }

    #[test]
    fn test_tool_kind_inferred_from_shape() {
        let kinds: Vec<Option<String>> = [
            r#"{"function":{"name":"f"}}"#,
            r#"{"url":"https://z.ai"}"#,
            r#"{"output":"42"}"#,
            r#"{"prompt":"a cat"}"#,
            r#"{"something":"else"}"#,
        ]
        .iter()
        .map(|json| {
            let call: AssistantToolCall = serde_json::from_str(json).unwrap();
            call.kind().map(str::to_string)
        })
        .collect();

        assert_eq!(
            kinds,
            vec![
                Some("function".to_string()),
                Some("web_browser".to_string()),
                Some("code_interpreter".to_string()),
                Some("drawing_tool".to_string()),
                None,
            ]
        );
    }

    #[test]
    fn test_unknown_tool_keeps_raw_object() {
        let raw = serde_json::json!({"type": "quantum_oracle", "answer": 42});
        let call = AssistantToolCall::from_value(raw.clone());
        assert_eq!(
            call,
            AssistantToolCall::Unknown {
                kind: Some("quantum_oracle".to_string()),
                raw: raw.clone(),
            }
        );
        assert_eq!(serde_json::to_value(&call).unwrap(), raw);
    }

    #[test]
    fn test_single_tool_object_is_accepted() {
        let content = delta(r#"{"tool_calls":{"type":"drawing_tool","prompt":"sunset"}}"#);
        assert_eq!(
            content,
            AssistantMessageContent::Tools {
                role: "tool".to_string(),
                tool_calls: vec![AssistantToolCall::DrawingTool {
                    prompt: Some("sunset".to_string())
                }],
            }
        );
    }

    #[test]
    fn test_non_object_delta_is_rejected() {
        assert!(serde_json::from_str::<AssistantMessageContent>("\"text\"").is_err());
    }

    #[test]
    fn test_completion_chunk_with_null_delta() {
        let chunk: AssistantCompletion = serde_json::from_str(
            r#"{"id":"1","status":"in_progress","choices":[{"index":0,"delta":null}]}"#,
        )
        .unwrap();
        assert!(chunk.choices[0].delta.is_none());
    }

    #[test]
    fn test_parameters_serialization() {
        let params = AssistantParameters::new(
            "659e54b1b8006379b4b2abd6",
            vec![AssistantConversationMessage::user("hello")],
        )
        .with_attachment("file-1");

        assert_eq!(
            serde_json::to_value(&params).unwrap(),
            json!({
                "assistant_id": "659e54b1b8006379b4b2abd6",
                "messages": [{"role": "user", "content": [{"type": "text", "text": "hello"}]}],
                "attachments": [{"file_id": "file-1"}]
            })
        );
    }
}
