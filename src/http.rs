//! Authenticating HTTP transport.
//!
//! [`AuthTransport`] owns the configured reqwest clients and stamps every
//! outgoing request with the bearer token and the SDK's fixed headers just
//! before dispatch.

use bytes::Bytes;
use reqwest::header::{
    HeaderMap, HeaderName, HeaderValue, ACCEPT, ACCEPT_LANGUAGE, AUTHORIZATION,
};
use reqwest::{Client, Method, Request, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

use crate::error::{ClientError, ConfigError, TransportError};
use crate::options::ZaiConfig;
use crate::sse::{decode_events, EventStream};
use crate::token::TokenManager;

/// Version reported in the `Zai-SDK-Ver` header.
pub const SDK_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Overall deadline of the client used for streaming calls.
pub const STREAM_TIMEOUT: Duration = Duration::from_secs(30 * 60);

const SOURCE_CHANNEL_HEADER: &str = "x-source-channel";
const SDK_VERSION_HEADER: &str = "zai-sdk-ver";

/// Build a configured HTTP client with the given overall timeout.
pub fn build_http_client(config: &ZaiConfig, timeout: Duration) -> Result<Client, ConfigError> {
    Client::builder()
        .timeout(timeout)
        .connect_timeout(config.resolved_connect_timeout())
        .read_timeout(config.resolved_read_timeout())
        .pool_max_idle_per_host(config.resolved_pool_max_idle())
        .pool_idle_timeout(config.resolved_pool_keep_alive())
        .build()
        .map_err(|e| ConfigError::HttpClient(e.to_string()))
}

/// Validate custom headers into a header map.
pub fn build_custom_headers(headers: &BTreeMap<String, String>) -> Result<HeaderMap, ConfigError> {
    let mut map = HeaderMap::with_capacity(headers.len());
    for (key, value) in headers {
        let name = HeaderName::from_bytes(key.as_bytes()).map_err(|e| ConfigError::InvalidHeader {
            name: key.clone(),
            reason: e.to_string(),
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| ConfigError::InvalidHeader {
            name: key.clone(),
            reason: e.to_string(),
        })?;
        map.insert(name, value);
    }
    Ok(map)
}

/// HTTP transport that authenticates every request it sends.
pub struct AuthTransport {
    client: Client,
    stream_client: Client,
    config: Arc<ZaiConfig>,
    tokens: Arc<TokenManager>,
    base_url: Url,
    source_channel: HeaderValue,
    custom_headers: HeaderMap,
}

impl std::fmt::Debug for AuthTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthTransport")
            .field("base_url", &self.base_url.as_str())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl AuthTransport {
    /// Create a transport, validating the configuration up front.
    pub fn new(config: ZaiConfig, tokens: Arc<TokenManager>) -> Result<Self, ConfigError> {
        if config.resolved_api_key().is_none() {
            return Err(ConfigError::MissingApiKey);
        }
        let credentials = config.credentials()?;
        if !config.resolved_disable_token_cache() {
            TokenManager::ensure_supported(&credentials.algorithm)?;
        }

        let raw_base = config.resolved_base_url();
        let base_url = Url::parse(&raw_base).map_err(|e| ConfigError::InvalidBaseUrl {
            url: raw_base.clone(),
            reason: e.to_string(),
        })?;

        let channel = config.resolved_source_channel();
        let source_channel =
            HeaderValue::from_str(&channel).map_err(|e| ConfigError::InvalidHeader {
                name: SOURCE_CHANNEL_HEADER.to_string(),
                reason: e.to_string(),
            })?;
        let custom_headers = build_custom_headers(&config.custom_headers)?;

        // reqwest exposes no per-write deadline; the overall timeout bounds uploads.
        debug!(
            write_timeout = ?config.resolved_write_timeout(),
            "write timeout is covered by the request timeout"
        );

        let client = build_http_client(&config, config.resolved_request_timeout())?;
        let stream_client = build_http_client(&config, STREAM_TIMEOUT)?;

        Ok(Self {
            client,
            stream_client,
            config: Arc::new(config),
            tokens,
            base_url,
            source_channel,
            custom_headers,
        })
    }

    pub fn config(&self) -> &ZaiConfig {
        &self.config
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_str()
    }

    /// Absolute URL for an API path.
    pub fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// URL for `path` followed by `segments`, each percent-encoded as a
    /// single path segment.
    pub fn resource_url(&self, path: &str, segments: &[&str]) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.url(path))
            .map_err(|e| TransportError::Unknown(format!("invalid request URL: {}", e)))?;
        url.path_segments_mut()
            .map_err(|_| TransportError::Unknown("base URL cannot carry a path".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Start a single-response request.
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.client.request(method, self.url(path))
    }

    /// Start a single-response request to a prepared URL.
    pub fn request_url(&self, method: Method, url: Url) -> RequestBuilder {
        self.client.request(method, url)
    }

    /// Start a request whose response is an event stream.
    pub fn streaming_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.stream_client
            .request(method, self.url(path))
            .header(ACCEPT, "text/event-stream")
    }

    /// Bearer credential for the next request.
    ///
    /// With the token cache disabled the raw API key is sent as is.
    pub async fn access_token(&self) -> Result<String, ConfigError> {
        let api_key = self
            .config
            .resolved_api_key()
            .ok_or(ConfigError::MissingApiKey)?;
        if self.config.resolved_disable_token_cache() {
            return Ok(api_key.expose_secret().to_string());
        }

        let credentials = self.config.credentials()?;
        self.tokens
            .get_token(credentials, self.config.resolved_expire_millis())
            .await
    }

    /// Stamp authentication and SDK headers onto `request`.
    ///
    /// Custom headers are applied last and replace any header of the same name.
    pub async fn authorize(&self, request: &mut Request) -> Result<(), ConfigError> {
        let token = self.access_token().await?;
        let bearer = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
            ConfigError::InvalidHeader {
                name: AUTHORIZATION.to_string(),
                reason: e.to_string(),
            }
        })?;

        let headers = request.headers_mut();
        headers.insert(AUTHORIZATION, bearer);
        headers.insert(SOURCE_CHANNEL_HEADER, self.source_channel.clone());
        headers.insert(SDK_VERSION_HEADER, HeaderValue::from_static(SDK_VERSION));
        headers.insert(ACCEPT_LANGUAGE, HeaderValue::from_static("en-US,en"));
        for (name, value) in &self.custom_headers {
            headers.insert(name.clone(), value.clone());
        }
        Ok(())
    }

    /// Send an authenticated copy of `request`; the caller's request is left untouched.
    pub async fn execute(&self, request: &Request) -> Result<Response, ClientError> {
        let copy = request.try_clone().ok_or_else(|| {
            TransportError::Unknown("request body cannot be cloned".to_string())
        })?;
        self.dispatch(&self.client, copy).await
    }

    /// Build and send a request, authenticating it on the way out.
    pub async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let (client, request) = builder.build_split();
        let request = request.map_err(TransportError::from)?;
        self.dispatch(&client, request).await
    }

    /// Send and decode a JSON response body.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        builder: RequestBuilder,
    ) -> Result<T, ClientError> {
        let response = self.send(builder).await?;
        let body = response.bytes().await.map_err(TransportError::from)?;
        Ok(serde_json::from_slice(&body)?)
    }

    /// Send and return the raw response body.
    pub async fn send_bytes(&self, builder: RequestBuilder) -> Result<Bytes, ClientError> {
        let response = self.send(builder).await?;
        Ok(response.bytes().await.map_err(TransportError::from)?)
    }

    /// Send and decode the response as a stream of events.
    pub async fn send_stream<T>(&self, builder: RequestBuilder) -> Result<EventStream<T>, ClientError>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let response = self.send(builder).await?;
        Ok(decode_events(response.bytes_stream()))
    }

    async fn dispatch(&self, client: &Client, mut request: Request) -> Result<Response, ClientError> {
        self.authorize(&mut request).await?;
        debug!(method = %request.method(), url = %request.url(), "dispatching request");

        let response = client
            .execute(request)
            .await
            .map_err(TransportError::from)?;
        ensure_success(response).await
    }
}

/// Turn a non-2xx response into a [`TransportError`] carrying the remote error body.
pub async fn ensure_success(response: Response) -> Result<Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(TransportError::from_response(status, &body).into())
}
