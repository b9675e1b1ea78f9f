//! Client configuration: explicit values, environment fallbacks and defaults.

use itertools::Itertools;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use crate::error::ConfigError;

/// Default endpoint of the Z.AI open platform.
pub const ZAI_BASE_URL: &str = "https://api.z.ai/api/paas/v4";

/// Endpoint of the ZhipuAI open platform (mainland China).
pub const ZHIPU_BASE_URL: &str = "https://open.bigmodel.cn/api/paas/v4";

pub const DEFAULT_EXPIRE_MILLIS: u64 = 30 * 60 * 1000;
pub const DEFAULT_ALGORITHM: &str = "HS256";
pub const DEFAULT_POOL_MAX_IDLE: usize = 5;
pub const DEFAULT_POOL_KEEP_ALIVE_MINUTES: u64 = 1;
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(300);
pub const DEFAULT_IO_TIMEOUT: Duration = Duration::from_secs(100);
pub const DEFAULT_SOURCE_CHANNEL: &str = "rust-sdk";

pub const ENV_BASE_URL: &str = "ZAI_BASE_URL";
pub const ENV_API_KEY: &str = "ZAI_API_KEY";
pub const ENV_EXPIRE_MILLIS: &str = "ZAI_EXPIRE_MILLIS";
pub const ENV_ALG: &str = "ZAI_ALG";
pub const ENV_DISABLE_TOKEN_CACHE: &str = "ZAI_DISABLE_TOKEN_CACHE";
pub const ENV_POOL_MAX_IDLE: &str = "ZAI_CONNECTION_POOL_MAX_IDLE";
pub const ENV_POOL_KEEP_ALIVE: &str = "ZAI_CONNECTION_POOL_KEEP_ALIVE";
pub const ENV_REQUEST_TIMEOUT: &str = "ZAI_REQUEST_TIMEOUT";
pub const ENV_CONNECT_TIMEOUT: &str = "ZAI_CONNECT_TIMEOUT";
pub const ENV_READ_TIMEOUT: &str = "ZAI_READ_TIMEOUT";
pub const ENV_WRITE_TIMEOUT: &str = "ZAI_WRITE_TIMEOUT";

/// A secret string type for sensitive data like API keys.
/// Prevents accidental logging or display of secrets.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretString(String);

impl SecretString {
    pub fn new(s: String) -> Self {
        Self(s)
    }

    pub fn expose_secret(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretString([REDACTED])")
    }
}

impl From<String> for SecretString {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

impl From<&str> for SecretString {
    fn from(s: &str) -> Self {
        Self::new(s.to_string())
    }
}

/// Source of environment variables consulted when a field is not set explicitly.
#[derive(Clone)]
pub struct EnvSource(Arc<dyn Fn(&str) -> Option<String> + Send + Sync>);

impl EnvSource {
    /// Look variables up with a custom function instead of the process environment.
    pub fn from_fn(f: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self(Arc::new(f))
    }

    /// Look variables up in a fixed map.
    pub fn from_map(vars: HashMap<String, String>) -> Self {
        Self::from_fn(move |name| vars.get(name).cloned())
    }

    fn get(&self, name: &str) -> Option<String> {
        (self.0)(name)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }
}

impl Default for EnvSource {
    fn default() -> Self {
        Self::from_fn(|name| std::env::var(name).ok())
    }
}

impl std::fmt::Debug for EnvSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("EnvSource")
    }
}

/// Signing identity derived from an `{api_id}.{api_secret}` key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub api_id: String,
    pub api_secret: SecretString,
    pub algorithm: String,
}

impl Credentials {
    /// Split an API key into id and secret.
    ///
    /// The key must contain exactly one `.` with a non-empty part on each side.
    pub fn parse(api_key: &str, algorithm: impl Into<String>) -> Result<Self, ConfigError> {
        let (api_id, api_secret) = api_key
            .split('.')
            .collect_tuple()
            .filter(|(id, secret): &(&str, &str)| !id.is_empty() && !secret.is_empty())
            .ok_or(ConfigError::InvalidApiKey)?;

        Ok(Self {
            api_id: api_id.to_string(),
            api_secret: SecretString::from(api_secret),
            algorithm: algorithm.into(),
        })
    }
}

/// Client configuration.
///
/// Every getter resolves its value as: explicitly set field, then the
/// matching `ZAI_*` environment variable, then the built-in default.
/// Unparseable environment values are ignored.
#[derive(Debug, Clone, Default)]
pub struct ZaiConfig {
    pub base_url: Option<String>,
    pub api_key: Option<SecretString>,
    pub expire_millis: Option<u64>,
    pub alg: Option<String>,
    pub disable_token_cache: Option<bool>,
    pub connection_pool_max_idle: Option<usize>,
    /// Minutes an idle pooled connection is kept.
    pub connection_pool_keep_alive: Option<u64>,
    pub request_timeout: Option<Duration>,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
    pub source_channel: Option<String>,
    /// Extra headers keyed by lowercased name.
    pub custom_headers: BTreeMap<String, String>,
    env: EnvSource,
    credentials: OnceLock<Credentials>,
}

impl ZaiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with an API key set explicitly.
    pub fn with_api_key(mut self, api_key: impl Into<SecretString>) -> Self {
        self.api_key = Some(api_key.into());
        self.credentials = OnceLock::new();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_expire_millis(mut self, millis: u64) -> Self {
        self.expire_millis = Some(millis);
        self
    }

    pub fn with_alg(mut self, alg: impl Into<String>) -> Self {
        self.alg = Some(alg.into());
        self.credentials = OnceLock::new();
        self
    }

    pub fn with_disable_token_cache(mut self, disable: bool) -> Self {
        self.disable_token_cache = Some(disable);
        self
    }

    pub fn with_connection_pool_max_idle(mut self, max_idle: usize) -> Self {
        self.connection_pool_max_idle = Some(max_idle);
        self
    }

    pub fn with_connection_pool_keep_alive(mut self, minutes: u64) -> Self {
        self.connection_pool_keep_alive = Some(minutes);
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = Some(timeout);
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = Some(timeout);
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = Some(timeout);
        self
    }

    pub fn with_source_channel(mut self, channel: impl Into<String>) -> Self {
        self.source_channel = Some(channel.into());
        self
    }

    /// Replace the custom headers.
    ///
    /// Names are case-insensitive; among names that differ only in case the
    /// one yielded last by `headers` wins.
    pub fn with_custom_headers<K, V>(mut self, headers: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.custom_headers.clear();
        for (key, value) in headers {
            self = self.with_header(key, value);
        }
        self
    }

    /// Add a single custom header, replacing any earlier one of the same name.
    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.custom_headers
            .insert(key.into().to_ascii_lowercase(), value.into());
        self
    }

    /// Use a different environment source for fallbacks.
    pub fn with_env(mut self, env: EnvSource) -> Self {
        self.env = env;
        self.credentials = OnceLock::new();
        self
    }

    pub fn resolved_base_url(&self) -> String {
        self.base_url
            .clone()
            .or_else(|| self.env.get(ENV_BASE_URL))
            .unwrap_or_else(|| ZAI_BASE_URL.to_string())
    }

    pub fn resolved_api_key(&self) -> Option<SecretString> {
        self.api_key
            .clone()
            .or_else(|| self.env.get(ENV_API_KEY).map(SecretString::from))
    }

    pub fn resolved_expire_millis(&self) -> u64 {
        self.expire_millis
            .or_else(|| self.env_parse(ENV_EXPIRE_MILLIS))
            .unwrap_or(DEFAULT_EXPIRE_MILLIS)
    }

    pub fn resolved_alg(&self) -> String {
        self.alg
            .clone()
            .or_else(|| self.env.get(ENV_ALG))
            .unwrap_or_else(|| DEFAULT_ALGORITHM.to_string())
    }

    pub fn resolved_disable_token_cache(&self) -> bool {
        self.disable_token_cache
            .or_else(|| self.env.get(ENV_DISABLE_TOKEN_CACHE).and_then(|v| parse_bool(&v)))
            .unwrap_or(false)
    }

    pub fn resolved_pool_max_idle(&self) -> usize {
        self.connection_pool_max_idle
            .or_else(|| self.env_parse(ENV_POOL_MAX_IDLE))
            .unwrap_or(DEFAULT_POOL_MAX_IDLE)
    }

    pub fn resolved_pool_keep_alive(&self) -> Duration {
        let minutes = self
            .connection_pool_keep_alive
            .or_else(|| self.env_parse(ENV_POOL_KEEP_ALIVE))
            .unwrap_or(DEFAULT_POOL_KEEP_ALIVE_MINUTES);
        Duration::from_secs(minutes * 60)
    }

    pub fn resolved_request_timeout(&self) -> Duration {
        self.request_timeout
            .or_else(|| self.env_seconds(ENV_REQUEST_TIMEOUT))
            .unwrap_or(DEFAULT_REQUEST_TIMEOUT)
    }

    pub fn resolved_connect_timeout(&self) -> Duration {
        self.connect_timeout
            .or_else(|| self.env_seconds(ENV_CONNECT_TIMEOUT))
            .unwrap_or(DEFAULT_IO_TIMEOUT)
    }

    pub fn resolved_read_timeout(&self) -> Duration {
        self.read_timeout
            .or_else(|| self.env_seconds(ENV_READ_TIMEOUT))
            .unwrap_or(DEFAULT_IO_TIMEOUT)
    }

    pub fn resolved_write_timeout(&self) -> Duration {
        self.write_timeout
            .or_else(|| self.env_seconds(ENV_WRITE_TIMEOUT))
            .unwrap_or(DEFAULT_IO_TIMEOUT)
    }

    pub fn resolved_source_channel(&self) -> String {
        self.source_channel
            .clone()
            .unwrap_or_else(|| DEFAULT_SOURCE_CHANNEL.to_string())
    }

    /// Credentials split from the resolved API key, computed once per config.
    pub fn credentials(&self) -> Result<&Credentials, ConfigError> {
        if let Some(credentials) = self.credentials.get() {
            return Ok(credentials);
        }

        let api_key = self.resolved_api_key().ok_or(ConfigError::MissingApiKey)?;
        let parsed = Credentials::parse(api_key.expose_secret(), self.resolved_alg())?;
        // A concurrent caller may have won the race; both parsed the same key.
        let _ = self.credentials.set(parsed);
        self.credentials.get().ok_or(ConfigError::InvalidApiKey)
    }

    fn env_parse<T: std::str::FromStr>(&self, name: &str) -> Option<T> {
        self.env.get(name).and_then(|v| v.parse().ok())
    }

    fn env_seconds(&self, name: &str) -> Option<Duration> {
        self.env_parse::<u64>(name).map(Duration::from_secs)
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env(pairs: &[(&str, &str)]) -> EnvSource {
        EnvSource::from_map(
            pairs
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
        )
    }

    #[test]
    fn test_defaults_without_env() {
        let config = ZaiConfig::new().with_env(env(&[]));

        assert_eq!(config.resolved_base_url(), ZAI_BASE_URL);
        assert!(config.resolved_api_key().is_none());
        assert_eq!(config.resolved_expire_millis(), 1_800_000);
        assert_eq!(config.resolved_alg(), "HS256");
        assert!(!config.resolved_disable_token_cache());
        assert_eq!(config.resolved_pool_max_idle(), 5);
        assert_eq!(config.resolved_pool_keep_alive(), Duration::from_secs(60));
        assert_eq!(config.resolved_request_timeout(), Duration::from_secs(300));
        assert_eq!(config.resolved_connect_timeout(), Duration::from_secs(100));
        assert_eq!(config.resolved_read_timeout(), Duration::from_secs(100));
        assert_eq!(config.resolved_write_timeout(), Duration::from_secs(100));
        assert_eq!(config.resolved_source_channel(), "rust-sdk");
    }

    #[test]
    fn test_env_overrides_default() {
        let config = ZaiConfig::new().with_env(env(&[
            (ENV_BASE_URL, ZHIPU_BASE_URL),
            (ENV_EXPIRE_MILLIS, "60000"),
            (ENV_DISABLE_TOKEN_CACHE, "TRUE"),
            (ENV_REQUEST_TIMEOUT, "12"),
            (ENV_POOL_KEEP_ALIVE, "3"),
        ]));

        assert_eq!(config.resolved_base_url(), ZHIPU_BASE_URL);
        assert_eq!(config.resolved_expire_millis(), 60_000);
        assert!(config.resolved_disable_token_cache());
        assert_eq!(config.resolved_request_timeout(), Duration::from_secs(12));
        assert_eq!(config.resolved_pool_keep_alive(), Duration::from_secs(180));
    }

    #[test]
    fn test_explicit_overrides_env() {
        let config = ZaiConfig::new()
            .with_env(env(&[(ENV_API_KEY, "env.key"), (ENV_EXPIRE_MILLIS, "60000")]))
            .with_api_key("explicit.key")
            .with_expire_millis(1000);

        assert_eq!(
            config.resolved_api_key().map(|k| k.expose_secret().to_string()),
            Some("explicit.key".to_string())
        );
        assert_eq!(config.resolved_expire_millis(), 1000);
    }

    #[test]
    fn test_unparseable_env_falls_back_to_default() {
        let config = ZaiConfig::new().with_env(env(&[
            (ENV_EXPIRE_MILLIS, "soon"),
            (ENV_POOL_MAX_IDLE, "-1"),
        ]));

        assert_eq!(config.resolved_expire_millis(), DEFAULT_EXPIRE_MILLIS);
        assert_eq!(config.resolved_pool_max_idle(), DEFAULT_POOL_MAX_IDLE);
    }

    #[test]
    fn test_credentials_parse() {
        let creds = Credentials::parse("abc.def", "HS256").unwrap();
        assert_eq!(creds.api_id, "abc");
        assert_eq!(creds.api_secret.expose_secret(), "def");
        assert_eq!(
            format!("{}.{}", creds.api_id, creds.api_secret.expose_secret()),
            "abc.def"
        );
    }

    #[test]
    fn test_credentials_reject_malformed_keys() {
        for key in ["abcdef", "a.b.c", ".secret", "id.", ""] {
            assert_eq!(
                Credentials::parse(key, "HS256"),
                Err(ConfigError::InvalidApiKey),
                "key {:?} should be rejected",
                key
            );
        }
    }

    #[test]
    fn test_credentials_memoised_and_reset_on_key_change() {
        let config = ZaiConfig::new().with_env(env(&[])).with_api_key("one.secret");
        let first = config.credentials().unwrap().clone();
        assert_eq!(first.api_id, "one");
        assert!(std::ptr::eq(
            config.credentials().unwrap(),
            config.credentials().unwrap()
        ));

        let config = config.with_api_key("two.secret");
        assert_eq!(config.credentials().unwrap().api_id, "two");
    }

    #[test]
    fn test_missing_api_key() {
        let config = ZaiConfig::new().with_env(env(&[]));
        assert_eq!(config.credentials(), Err(ConfigError::MissingApiKey));
    }

    #[test]
    fn test_secret_string_redacts_debug() {
        let config = ZaiConfig::new().with_api_key("id.very-secret");
        let debug = format!("{:?}", config);
        assert!(!debug.contains("very-secret"));
        assert!(debug.contains("REDACTED"));
    }
}
