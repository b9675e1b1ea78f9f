//! Signing and caching of short-lived bearer tokens.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use jsonwebtoken::{Algorithm, EncodingKey};
use serde::Serialize;
use std::sync::{Arc, OnceLock};
use tracing::debug;

use crate::cache::{LocalCache, TokenCache};
use crate::error::ConfigError;
use crate::options::Credentials;

const TOKEN_KEY_PREFIX: &str = "zai_oapi_token";

/// Added to the token's `exp` claim on top of the configured TTL.
const EXPIRE_MARGIN_MILLIS: i64 = 5 * 60 * 1000;

static GLOBAL: OnceLock<Arc<TokenManager>> = OnceLock::new();

/// Source of the current time, in epoch milliseconds, for token claims.
pub type Clock = Arc<dyn Fn() -> i64 + Send + Sync>;

fn system_clock() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[derive(Serialize)]
struct TokenHeader {
    alg: &'static str,
    sign_type: &'static str,
}

#[derive(Serialize)]
struct TokenClaims<'a> {
    api_key: &'a str,
    exp: i64,
    timestamp: i64,
}

/// Issues bearer tokens, reusing cached ones until they expire.
///
/// Each client owns one manager by default. Clients that should share a
/// cache can be handed the same `Arc<TokenManager>`, or use [`TokenManager::global`].
pub struct TokenManager {
    cache: Arc<dyn TokenCache>,
    clock: Clock,
}

impl std::fmt::Debug for TokenManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenManager").finish_non_exhaustive()
    }
}

impl Default for TokenManager {
    fn default() -> Self {
        Self::new(Arc::new(LocalCache::new()))
    }
}

impl TokenManager {
    pub fn new(cache: Arc<dyn TokenCache>) -> Self {
        Self {
            cache,
            clock: Arc::new(system_clock),
        }
    }

    /// Stamp token claims with `clock` instead of the system time.
    pub fn with_clock(mut self, clock: impl Fn() -> i64 + Send + Sync + 'static) -> Self {
        self.clock = Arc::new(clock);
        self
    }

    /// Install the process-wide manager. Fails if one is already installed.
    pub fn install_global(manager: Arc<TokenManager>) -> Result<(), Arc<TokenManager>> {
        GLOBAL.set(manager)
    }

    /// The process-wide manager, created with a [`LocalCache`] on first use
    /// unless one was installed before.
    pub fn global() -> Arc<TokenManager> {
        Arc::clone(GLOBAL.get_or_init(|| Arc::new(TokenManager::default())))
    }

    /// Cache key for a given API id. The secret never appears in it.
    pub fn cache_key(api_id: &str) -> String {
        format!("{}-{}", TOKEN_KEY_PREFIX, api_id)
    }

    /// Return a valid token for `credentials`, signing a new one on a cache miss.
    ///
    /// Fresh tokens are cached for `ttl_millis / 1000` whole seconds. Concurrent
    /// misses may both sign; the later write wins.
    pub async fn get_token(
        &self,
        credentials: &Credentials,
        ttl_millis: u64,
    ) -> Result<String, ConfigError> {
        let key = Self::cache_key(&credentials.api_id);

        if let Some(token) = self.cache.get(&key).await.filter(|t| !t.is_empty()) {
            debug!(api_id = %credentials.api_id, "token cache hit");
            return Ok(token);
        }

        debug!(api_id = %credentials.api_id, "token cache miss, signing new token");
        let token = Self::create_token_at(credentials, ttl_millis, (self.clock)())?;
        self.cache.set(&key, token.clone(), ttl_millis / 1000).await;
        Ok(token)
    }

    /// Reject signing algorithms other than HS256.
    pub fn ensure_supported(algorithm: &str) -> Result<(), ConfigError> {
        if algorithm != "HS256" {
            return Err(ConfigError::UnsupportedAlgorithm(algorithm.to_string()));
        }
        Ok(())
    }

    /// Sign a compact HS256 token for `credentials`, issued now.
    pub fn create_token(credentials: &Credentials, ttl_millis: u64) -> Result<String, ConfigError> {
        Self::create_token_at(credentials, ttl_millis, system_clock())
    }

    /// Sign a token issued at `now` epoch milliseconds.
    pub fn create_token_at(
        credentials: &Credentials,
        ttl_millis: u64,
        now: i64,
    ) -> Result<String, ConfigError> {
        Self::ensure_supported(&credentials.algorithm)?;

        let ttl = i64::try_from(ttl_millis).unwrap_or(i64::MAX);
        let header = TokenHeader {
            alg: "HS256",
            sign_type: "SIGN",
        };
        let claims = TokenClaims {
            api_key: &credentials.api_id,
            exp: now.saturating_add(ttl).saturating_add(EXPIRE_MARGIN_MILLIS),
            timestamp: now,
        };

        let message = format!(
            "{}.{}",
            encode_segment(&header)?,
            encode_segment(&claims)?
        );
        let key = EncodingKey::from_secret(credentials.api_secret.expose_secret().as_bytes());
        let signature = jsonwebtoken::crypto::sign(message.as_bytes(), &key, Algorithm::HS256)
            .map_err(|e| ConfigError::Signing(e.to_string()))?;

        Ok(format!("{}.{}", message, signature))
    }
}

fn encode_segment<T: Serialize>(value: &T) -> Result<String, ConfigError> {
    let json = serde_json::to_vec(value).map_err(|e| ConfigError::Signing(e.to_string()))?;
    Ok(URL_SAFE_NO_PAD.encode(json))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use jsonwebtoken::{DecodingKey, Validation};
    use serde_json::Value;
    use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
    use std::sync::Mutex;

    fn creds() -> Credentials {
        Credentials::parse("my-id.my-secret", "HS256").unwrap()
    }

    fn decode_segment(segment: &str) -> Value {
        serde_json::from_slice(&URL_SAFE_NO_PAD.decode(segment).unwrap()).unwrap()
    }

    /// Records every `set` so tests can assert on keys and TTLs.
    #[derive(Default)]
    struct RecordingCache {
        inner: LocalCache,
        sets: Mutex<Vec<(String, u64)>>,
        gets: AtomicUsize,
    }

    #[async_trait]
    impl TokenCache for RecordingCache {
        async fn get(&self, key: &str) -> Option<String> {
            self.gets.fetch_add(1, Ordering::SeqCst);
            self.inner.get(key).await
        }

        async fn set(&self, key: &str, value: String, ttl_seconds: u64) {
            self.sets.lock().unwrap().push((key.to_string(), ttl_seconds));
            self.inner.set(key, value, ttl_seconds).await;
        }
    }

    #[test]
    fn test_token_shape() {
        let before = chrono::Utc::now().timestamp_millis();
        let token = TokenManager::create_token(&creds(), 1_800_000).unwrap();
        let after = chrono::Utc::now().timestamp_millis();

        let parts: Vec<&str> = token.split('.').collect();
        assert_eq!(parts.len(), 3);

        let header = decode_segment(parts[0]);
        assert_eq!(header["alg"], "HS256");
        assert_eq!(header["sign_type"], "SIGN");

        let claims = decode_segment(parts[1]);
        assert_eq!(claims["api_key"], "my-id");
        let timestamp = claims["timestamp"].as_i64().unwrap();
        let exp = claims["exp"].as_i64().unwrap();
        assert!(timestamp >= before && timestamp <= after);
        assert_eq!(exp - timestamp, 1_800_000 + 300_000);
    }

    #[test]
    fn test_signature_verifies_with_secret() {
        let token = TokenManager::create_token(&creds(), 60_000).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let decoded = jsonwebtoken::decode::<Value>(
            &token,
            &DecodingKey::from_secret(b"my-secret"),
            &validation,
        );
        assert!(decoded.is_ok());

        let wrong = jsonwebtoken::decode::<Value>(
            &token,
            &DecodingKey::from_secret(b"other-secret"),
            &validation,
        );
        assert!(wrong.is_err());
    }

    #[test]
    fn test_unsupported_algorithm() {
        let creds = Credentials::parse("id.secret", "RS256").unwrap();
        assert_eq!(
            TokenManager::create_token(&creds, 1000),
            Err(ConfigError::UnsupportedAlgorithm("RS256".to_string()))
        );
    }

    #[tokio::test]
    async fn test_get_token_caches_under_api_id() {
        let cache = Arc::new(RecordingCache::default());
        let manager = TokenManager::new(cache.clone());

        let first = manager.get_token(&creds(), 1_800_999).await.unwrap();
        let second = manager.get_token(&creds(), 1_800_999).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(cache.gets.load(Ordering::SeqCst), 2);
        let sets = cache.sets.lock().unwrap();
        assert_eq!(sets.as_slice(), &[("zai_oapi_token-my-id".to_string(), 1800)]);
        assert!(!sets[0].0.contains("my-secret"));
    }

    #[tokio::test]
    async fn test_get_token_fails_fast_on_unsupported_algorithm() {
        let cache = Arc::new(RecordingCache::default());
        let manager = TokenManager::new(cache.clone());
        let creds = Credentials::parse("id.secret", "none").unwrap();

        let result = manager.get_token(&creds, 1000).await;
        assert!(matches!(result, Err(ConfigError::UnsupportedAlgorithm(_))));
        assert!(cache.sets.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_expired_token_is_resigned() {
        let cache = Arc::new(RecordingCache::default());
        let now = Arc::new(AtomicI64::new(1_700_000_000_000));
        let clock = Arc::clone(&now);
        let manager =
            TokenManager::new(cache.clone()).with_clock(move || clock.load(Ordering::SeqCst));

        let first = manager.get_token(&creds(), 2000).await.unwrap();
        tokio::time::advance(std::time::Duration::from_secs(3)).await;
        now.fetch_add(3000, Ordering::SeqCst);
        let second = manager.get_token(&creds(), 2000).await.unwrap();

        assert_ne!(first, second);
        assert_eq!(cache.sets.lock().unwrap().len(), 2);

        let claims = |token: &str| decode_segment(token.split('.').nth(1).unwrap());
        let (a, b) = (claims(&first), claims(&second));
        assert_eq!(a["timestamp"].as_i64().unwrap(), 1_700_000_000_000);
        assert_eq!(b["timestamp"].as_i64().unwrap() - a["timestamp"].as_i64().unwrap(), 3000);
        assert_eq!(b["exp"].as_i64().unwrap() - a["exp"].as_i64().unwrap(), 3000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cached_token_is_reused_before_expiry() {
        let now = Arc::new(AtomicI64::new(1_700_000_000_000));
        let clock = Arc::clone(&now);
        let manager = TokenManager::new(Arc::new(LocalCache::new()))
            .with_clock(move || clock.load(Ordering::SeqCst));

        let first = manager.get_token(&creds(), 5000).await.unwrap();
        tokio::time::advance(std::time::Duration::from_secs(1)).await;
        now.fetch_add(1000, Ordering::SeqCst);
        let second = manager.get_token(&creds(), 5000).await.unwrap();

        assert_eq!(first, second);
    }

    #[test]
    fn test_global_is_single_assignment() {
        let installed = TokenManager::global();
        let again = TokenManager::global();
        assert!(Arc::ptr_eq(&installed, &again));
        assert!(TokenManager::install_global(Arc::new(TokenManager::default())).is_err());
    }
}
