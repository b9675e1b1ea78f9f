//! Uniform execution of remote calls.
//!
//! Every service method funnels through [`RequestExecutor`], which runs the
//! call and folds the outcome into an [`Envelope`]. Transport failures never
//! escape as `Err`; they become a failed envelope with an [`ErrorInfo`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{ClientError, TransportError};
use crate::http::AuthTransport;
use crate::sse::EventStream;

pub const MESSAGE_SUCCESS: &str = "Call Successful";
pub const MESSAGE_STREAM_OPENED: &str = "Stream initialized successfully";
pub const MESSAGE_FAILED: &str = "Call Failed";

/// Error details of a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorInfo {
    pub code: Option<i64>,
    pub message: String,
}

impl From<&TransportError> for ErrorInfo {
    fn from(err: &TransportError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

/// Outcome of a remote call.
///
/// `T` is the single-response payload and `S` the stream item. Exactly one
/// of `error` and a success payload is meaningful: `error.is_some()` holds
/// iff `success` is false.
pub struct Envelope<T, S = T> {
    pub status_code: u16,
    pub message: String,
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<ErrorInfo>,
    pub stream: Option<EventStream<S>>,
}

impl<T, S> Default for Envelope<T, S> {
    fn default() -> Self {
        Self {
            status_code: 0,
            message: String::new(),
            success: false,
            data: None,
            error: None,
            stream: None,
        }
    }
}

impl<T: std::fmt::Debug, S> std::fmt::Debug for Envelope<T, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Envelope")
            .field("status_code", &self.status_code)
            .field("message", &self.message)
            .field("success", &self.success)
            .field("data", &self.data)
            .field("error", &self.error)
            .field("stream", &self.stream.as_ref().map(|_| "EventStream"))
            .finish()
    }
}

impl<T, S> Envelope<T, S> {
    pub fn succeeded(data: T) -> Self {
        Self {
            status_code: 200,
            message: MESSAGE_SUCCESS.to_string(),
            success: true,
            data: Some(data),
            ..Self::default()
        }
    }

    pub fn stream_opened(stream: EventStream<S>) -> Self {
        Self {
            status_code: 200,
            message: MESSAGE_STREAM_OPENED.to_string(),
            success: true,
            stream: Some(stream),
            ..Self::default()
        }
    }

    /// Failed envelope; the status is the remote one, or 500 when there is none.
    pub fn failed(err: &TransportError) -> Self {
        Self {
            status_code: err.status().map(|s| s.as_u16()).unwrap_or(500),
            message: MESSAGE_FAILED.to_string(),
            success: false,
            error: Some(ErrorInfo::from(err)),
            ..Self::default()
        }
    }

    /// Reinterpret a single-response envelope as one whose stream items are `S2`.
    pub(crate) fn with_stream_type<S2>(self) -> Envelope<T, S2> {
        Envelope {
            status_code: self.status_code,
            message: self.message,
            success: self.success,
            data: self.data,
            error: self.error,
            stream: None,
        }
    }

    pub fn is_success(&self) -> bool {
        self.success
    }

    /// Take the payload, or the error details of a failed call.
    pub fn into_result(self) -> Result<T, ErrorInfo> {
        match (self.data, self.error) {
            (Some(data), _) => Ok(data),
            (None, Some(error)) => Err(error),
            (None, None) => Err(ErrorInfo {
                code: None,
                message: self.message,
            }),
        }
    }
}

/// Runs remote calls against an [`AuthTransport`] and wraps their outcome.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    transport: Arc<AuthTransport>,
    deadline: Option<Duration>,
}

impl RequestExecutor {
    /// Executor whose single-response calls are bounded by the configured request timeout.
    pub fn new(transport: Arc<AuthTransport>) -> Self {
        let deadline = Some(transport.config().resolved_request_timeout());
        Self {
            transport,
            deadline,
        }
    }

    pub fn with_deadline(mut self, deadline: Option<Duration>) -> Self {
        self.deadline = deadline;
        self
    }

    pub fn transport(&self) -> &AuthTransport {
        &self.transport
    }

    /// Run a single-response call.
    ///
    /// `call` receives the transport and the request and performs the remote
    /// call. A call that outlives the deadline fails with a timeout.
    pub async fn execute_request<'a, Req, T, F, Fut>(&'a self, request: Req, call: F) -> Envelope<T>
    where
        F: FnOnce(&'a AuthTransport, Req) -> Fut,
        Fut: Future<Output = Result<T, ClientError>> + 'a,
    {
        let fut = call(&self.transport, request);
        let outcome = match self.deadline {
            Some(deadline) => tokio::time::timeout(deadline, fut)
                .await
                .unwrap_or_else(|_| Err(TransportError::Timeout.into())),
            None => fut.await,
        };

        match outcome {
            Ok(data) => {
                debug!("call succeeded");
                Envelope::succeeded(data)
            }
            Err(err) => Self::fail(err),
        }
    }

    /// Open a streamed call.
    ///
    /// Returns as soon as the stream is open; items are decoded lazily as the
    /// caller polls [`Envelope::stream`].
    pub async fn execute_streaming_request<'a, Req, T, S, F, Fut>(
        &'a self,
        request: Req,
        call: F,
    ) -> Envelope<T, S>
    where
        F: FnOnce(&'a AuthTransport, Req) -> Fut,
        Fut: Future<Output = Result<EventStream<S>, ClientError>> + 'a,
    {
        match call(&self.transport, request).await {
            Ok(stream) => {
                debug!("stream opened");
                Envelope::stream_opened(stream)
            }
            Err(err) => Self::fail(err),
        }
    }

    fn fail<T, S>(err: ClientError) -> Envelope<T, S> {
        let err = TransportError::from(err);
        warn!(marker = %err.marker(), error = %err, "API request failed");
        Envelope::failed(&err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::{EnvSource, ZaiConfig};
    use crate::sse::decode_events;
    use crate::token::TokenManager;
    use futures::stream::{self, StreamExt};
    use reqwest::Method;
    use serde::Deserialize;
    use std::collections::HashMap;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[derive(Debug, Deserialize, PartialEq)]
    struct Item {
        x: i32,
    }

    fn executor(base_url: &str) -> RequestExecutor {
        let config = ZaiConfig::new()
            .with_env(EnvSource::from_map(HashMap::new()))
            .with_api_key("id.secret")
            .with_base_url(base_url);
        let transport = AuthTransport::new(config, Arc::new(TokenManager::default())).unwrap();
        RequestExecutor::new(Arc::new(transport))
    }

    #[test]
    fn test_default_envelope_is_empty() {
        let envelope: Envelope<Item, String> = Envelope::default();
        assert_eq!(envelope.status_code, 0);
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        assert!(envelope.error.is_none());
        assert!(envelope.stream.is_none());
    }

    #[tokio::test]
    async fn test_success_envelope() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/item"))
            .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"x":7}"#))
            .mount(&server)
            .await;

        let executor = executor(&server.uri());
        let envelope: Envelope<Item> = executor
            .execute_request((), |t, ()| t.send_json(t.request(Method::GET, "/item")))
            .await;

        assert_eq!(envelope.status_code, 200);
        assert_eq!(envelope.message, "Call Successful");
        assert!(envelope.success);
        assert!(envelope.error.is_none());
        assert_eq!(envelope.data, Some(Item { x: 7 }));
    }

    #[tokio::test]
    async fn test_remote_status_is_kept() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404).set_body_string("not here"))
            .mount(&server)
            .await;

        let executor = executor(&server.uri());
        let envelope: Envelope<Item> = executor
            .execute_request((), |t, ()| t.send_json(t.request(Method::GET, "/missing")))
            .await;

        assert_eq!(envelope.status_code, 404);
        assert_eq!(envelope.message, "Call Failed");
        assert!(!envelope.success);
        assert!(envelope.data.is_none());
        let error = envelope.error.unwrap();
        assert_eq!(error.code, Some(404));
        assert!(error.message.contains("not here"));
    }

    #[tokio::test]
    async fn test_business_error_code() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"error":{"code":"1214","message":"messages parameter is invalid"}}"#,
            ))
            .mount(&server)
            .await;

        let executor = executor(&server.uri());
        let envelope: Envelope<Item> = executor
            .execute_request((), |t, ()| t.send_json(t.request(Method::POST, "/x")))
            .await;

        assert_eq!(envelope.status_code, 400);
        assert_eq!(
            envelope.error,
            Some(ErrorInfo {
                code: Some(1214),
                message: "messages parameter is invalid".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_connection_failure_is_enveloped() {
        // Port 9 (discard) on localhost is expected to refuse connections.
        let executor = executor("http://127.0.0.1:9");
        let envelope: Envelope<Item> = executor
            .execute_request((), |t, ()| t.send_json(t.request(Method::GET, "/x")))
            .await;

        assert_eq!(envelope.status_code, 500);
        assert!(!envelope.success);
        assert!(envelope.error.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline_yields_timeout() {
        let executor = executor("http://localhost").with_deadline(Some(Duration::from_secs(1)));
        let envelope: Envelope<i32> = executor
            .execute_request((), |_, ()| async {
                tokio::time::sleep(Duration::from_secs(10)).await;
                Ok(1)
            })
            .await;

        assert_eq!(envelope.status_code, 500);
        assert_eq!(envelope.message, "Call Failed");
        let error = envelope.error.unwrap();
        assert_eq!(error.code, None);
        assert_eq!(error.message, "Request timed out");
    }

    #[tokio::test]
    async fn test_request_is_passed_to_call() {
        let executor = executor("http://localhost");
        let envelope: Envelope<String> = executor
            .execute_request("payload".to_string(), |_, req| async move {
                Ok(req.to_uppercase())
            })
            .await;

        assert_eq!(envelope.into_result(), Ok("PAYLOAD".to_string()));
    }

    #[tokio::test]
    async fn test_streaming_envelope() {
        let executor = executor("http://localhost");
        let envelope: Envelope<(), Item> = executor
            .execute_streaming_request((), |_, ()| async {
                let bytes: Vec<Result<Vec<u8>, TransportError>> = vec![Ok(
                    b"data: {\"x\":1}\n\ndata: {\"x\":2}\n\ndata: [DONE]\n\n".to_vec(),
                )];
                Ok(decode_events::<Item, _, _, _>(stream::iter(bytes)))
            })
            .await;

        assert_eq!(envelope.status_code, 200);
        assert_eq!(envelope.message, "Stream initialized successfully");
        assert!(envelope.success);
        assert!(envelope.data.is_none());

        let items: Vec<Item> = envelope
            .stream
            .unwrap()
            .map(|r| r.unwrap())
            .collect()
            .await;
        assert_eq!(items, vec![Item { x: 1 }, Item { x: 2 }]);
    }

    #[tokio::test]
    async fn test_streaming_open_failure() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let executor = executor(&server.uri());
        let envelope: Envelope<(), Item> = executor
            .execute_streaming_request((), |t, ()| {
                t.send_stream(t.streaming_request(Method::POST, "/stream"))
            })
            .await;

        assert_eq!(envelope.status_code, 503);
        assert_eq!(envelope.message, "Call Failed");
        assert!(envelope.stream.is_none());
        assert!(envelope.error.is_some());
    }
}
