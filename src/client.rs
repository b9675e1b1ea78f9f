//! Client entry point and its builder.

use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::cache::TokenCache;
use crate::error::ConfigError;
use crate::executor::RequestExecutor;
use crate::http::AuthTransport;
use crate::options::{EnvSource, SecretString, ZaiConfig, ZAI_BASE_URL, ZHIPU_BASE_URL};
use crate::services::{AgentsService, AssistantService, AudioService, FilesService, VideosService};
use crate::token::TokenManager;

/// Entry point to the platform's endpoints.
///
/// A client owns one authenticating transport and hands out cheap service
/// handles sharing it. Cloning the client shares the transport too.
///
/// # Example
/// ```rust,ignore
/// let client = ZaiClient::zai("your-id.your-secret")?;
/// let envelope = client
///     .videos()
///     .generations(VideoCreateParams::new("cogvideox-3", "a cat playing piano"))
///     .await?;
/// ```
#[derive(Debug, Clone)]
pub struct ZaiClient {
    executor: RequestExecutor,
}

impl ZaiClient {
    pub fn builder() -> ZaiClientBuilder {
        ZaiClientBuilder::default()
    }

    /// Client for the international platform.
    pub fn zai(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        Self::builder()
            .base_url(ZAI_BASE_URL)
            .api_key(api_key)
            .build()
    }

    /// Client for the mainland China platform.
    pub fn zhipu(api_key: impl Into<String>) -> Result<Self, ConfigError> {
        Self::builder()
            .base_url(ZHIPU_BASE_URL)
            .api_key(api_key)
            .build()
    }

    /// Client over a fully prepared configuration.
    pub fn from_config(config: ZaiConfig) -> Result<Self, ConfigError> {
        Self::builder().config(config).build()
    }

    pub fn agents(&self) -> AgentsService {
        AgentsService::new(self.executor.clone())
    }

    pub fn assistants(&self) -> AssistantService {
        AssistantService::new(self.executor.clone())
    }

    pub fn audio(&self) -> AudioService {
        AudioService::new(self.executor.clone())
    }

    pub fn files(&self) -> FilesService {
        FilesService::new(self.executor.clone())
    }

    pub fn videos(&self) -> VideosService {
        VideosService::new(self.executor.clone())
    }

    pub fn executor(&self) -> &RequestExecutor {
        &self.executor
    }

    pub fn config(&self) -> &ZaiConfig {
        self.executor.transport().config()
    }
}

/// Builder for [`ZaiClient`]. Unset options fall back to the environment,
/// then to defaults.
#[derive(Debug, Default)]
pub struct ZaiClientBuilder {
    config: ZaiConfig,
    tokens: Option<Arc<TokenManager>>,
}

impl ZaiClientBuilder {
    /// Replace the whole configuration gathered so far.
    pub fn config(mut self, config: ZaiConfig) -> Self {
        self.config = config;
        self
    }

    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config = self.config.with_base_url(base_url);
        self
    }

    /// Key in `<id>.<secret>` form.
    pub fn api_key(mut self, api_key: impl Into<String>) -> Self {
        self.config = self.config.with_api_key(SecretString::new(api_key.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config = self.config.with_header(name, value);
        self
    }

    pub fn custom_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.config = self.config.with_custom_headers(headers);
        self
    }

    /// Send the raw API key instead of signed tokens.
    pub fn disable_token_cache(mut self, disable: bool) -> Self {
        self.config = self.config.with_disable_token_cache(disable);
        self
    }

    /// Lifetime of signed tokens.
    pub fn token_ttl(mut self, ttl: Duration) -> Self {
        let millis = u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX);
        self.config = self.config.with_expire_millis(millis);
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_request_timeout(timeout);
        self
    }

    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_connect_timeout(timeout);
        self
    }

    pub fn read_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_read_timeout(timeout);
        self
    }

    pub fn write_timeout(mut self, timeout: Duration) -> Self {
        self.config = self.config.with_write_timeout(timeout);
        self
    }

    pub fn connection_pool(mut self, max_idle: usize, keep_alive_minutes: u64) -> Self {
        self.config = self
            .config
            .with_connection_pool_max_idle(max_idle)
            .with_connection_pool_keep_alive(keep_alive_minutes);
        self
    }

    pub fn source_channel(mut self, channel: impl Into<String>) -> Self {
        self.config = self.config.with_source_channel(channel);
        self
    }

    pub fn env(mut self, env: EnvSource) -> Self {
        self.config = self.config.with_env(env);
        self
    }

    /// Share a token manager with other clients, e.g. [`TokenManager::global`].
    /// Defaults to a manager owned by this client.
    pub fn token_manager(mut self, tokens: Arc<TokenManager>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Keep this client's tokens in `cache` instead of a fresh [`LocalCache`](crate::cache::LocalCache).
    pub fn token_cache(self, cache: Arc<dyn TokenCache>) -> Self {
        self.token_manager(Arc::new(TokenManager::new(cache)))
    }

    pub fn build(self) -> Result<ZaiClient, ConfigError> {
        let tokens = self.tokens.unwrap_or_default();
        let transport = AuthTransport::new(self.config, tokens)?;
        info!(
            base_url = %transport.base_url(),
            token_cache = !transport.config().resolved_disable_token_cache(),
            "Z.AI client initialized"
        );

        Ok(ZaiClient {
            executor: RequestExecutor::new(Arc::new(transport)),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::LocalCache;
    use std::collections::HashMap;

    fn no_env() -> EnvSource {
        EnvSource::from_map(HashMap::new())
    }

    #[test]
    fn test_zai_and_zhipu_base_urls() {
        let client = ZaiClient::builder()
            .env(no_env())
            .base_url(ZAI_BASE_URL)
            .api_key("id.secret")
            .build()
            .unwrap();
        assert_eq!(client.config().resolved_base_url(), ZAI_BASE_URL);

        let client = ZaiClient::zhipu("id.secret").unwrap();
        assert_eq!(client.config().resolved_base_url(), ZHIPU_BASE_URL);
    }

    #[test]
    fn test_missing_key_fails_to_build() {
        let result = ZaiClient::builder().env(no_env()).build();
        assert!(matches!(result, Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn test_api_key_falls_back_to_environment() {
        let env = EnvSource::from_map(HashMap::from([(
            "ZAI_API_KEY".to_string(),
            "env-id.env-secret".to_string(),
        )]));
        let client = ZaiClient::builder().env(env).build().unwrap();
        assert_eq!(
            client.config().credentials().unwrap().api_id,
            "env-id"
        );
    }

    #[test]
    fn test_builder_options_reach_config() {
        let client = ZaiClient::builder()
            .env(no_env())
            .api_key("id.secret")
            .token_ttl(Duration::from_secs(60))
            .request_timeout(Duration::from_secs(5))
            .connection_pool(8, 2)
            .source_channel("integration")
            .header("X-Trace", "abc")
            .token_cache(Arc::new(LocalCache::new()))
            .build()
            .unwrap();

        let config = client.config();
        assert_eq!(config.resolved_expire_millis(), 60_000);
        assert_eq!(config.resolved_request_timeout(), Duration::from_secs(5));
        assert_eq!(config.resolved_pool_max_idle(), 8);
        assert_eq!(config.resolved_pool_keep_alive(), Duration::from_secs(120));
        assert_eq!(config.resolved_source_channel(), "integration");
    }
}
