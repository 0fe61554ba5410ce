//! JWKS (JSON Web Key Set) caching.

use std::sync::Arc;
use std::time::{Duration, Instant};

use jsonwebtoken::{Algorithm, DecodingKey};
use serde::Deserialize;
use tokio::sync::{Mutex, RwLock};

use crate::error::{Result, SsoError};
use crate::transport::{HttpRequest, HttpTransport};

/// When a cached key set is considered stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    /// Keep the first fetched key set until [`JwksCache::invalidate`] is called.
    #[default]
    Never,
    /// Refetch once the key set is older than the interval.
    Interval(Duration),
}

/// Cached signing keys of the SSO server.
///
/// The key set is fetched on first use. Concurrent callers on a cold (or
/// stale) cache wait for a single fetch instead of each issuing their own.
/// A failed fetch leaves the cache untouched.
pub struct JwksCache {
    /// JWKS endpoint URL.
    jwks_uri: String,
    transport: Arc<dyn HttpTransport>,
    policy: RefreshPolicy,
    state: RwLock<Option<CachedKeys>>,
    /// Serializes fetches.
    fetch_lock: Mutex<()>,
}

struct CachedKeys {
    keys: Arc<Vec<Jwk>>,
    fetched_at: Instant,
}

impl JwksCache {
    /// Create a new JWKS cache.
    pub fn new(jwks_uri: impl Into<String>, transport: Arc<dyn HttpTransport>) -> Self {
        Self {
            jwks_uri: jwks_uri.into(),
            transport,
            policy: RefreshPolicy::Never,
            state: RwLock::new(None),
            fetch_lock: Mutex::new(()),
        }
    }

    /// Create with a custom refresh policy.
    pub fn with_refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn jwks_uri(&self) -> &str {
        &self.jwks_uri
    }

    /// Find the single key whose `kid` matches.
    ///
    /// Fetches the key set if the cache is empty or stale.
    pub async fn resolve(&self, kid: &str) -> Result<Jwk> {
        let keys = self.keys().await?;

        let mut matches = keys.iter().filter(|key| key.kid.as_deref() == Some(kid));
        match (matches.next(), matches.count()) {
            (Some(key), 0) => Ok(key.clone()),
            (None, _) => Err(SsoError::KeyNotFound(kid.to_string())),
            (Some(_), others) => {
                Err(SsoError::AmbiguousKey { kid: kid.to_string(), count: others + 1 })
            }
        }
    }

    /// Current key set, fetching it if needed.
    pub async fn keys(&self) -> Result<Arc<Vec<Jwk>>> {
        if let Some(keys) = self.fresh_keys().await {
            return Ok(keys);
        }

        let _guard = self.fetch_lock.lock().await;

        // Another caller may have fetched while we waited for the lock.
        if let Some(keys) = self.fresh_keys().await {
            return Ok(keys);
        }

        let keys = Arc::new(self.fetch().await?);
        *self.state.write().await =
            Some(CachedKeys { keys: Arc::clone(&keys), fetched_at: Instant::now() });
        tracing::debug!("JWKS cache refreshed with {} keys", keys.len());

        Ok(keys)
    }

    /// Drop the cached key set; the next lookup fetches it again.
    pub async fn invalidate(&self) {
        *self.state.write().await = None;
        tracing::debug!("JWKS cache for {} invalidated", self.jwks_uri);
    }

    /// Get the number of cached keys.
    pub async fn len(&self) -> usize {
        self.state.read().await.as_ref().map_or(0, |cached| cached.keys.len())
    }

    /// Check if cache is empty.
    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn fresh_keys(&self) -> Option<Arc<Vec<Jwk>>> {
        let state = self.state.read().await;
        let cached = state.as_ref()?;
        let stale = match self.policy {
            RefreshPolicy::Never => false,
            RefreshPolicy::Interval(interval) => cached.fetched_at.elapsed() >= interval,
        };
        (!stale).then(|| Arc::clone(&cached.keys))
    }

    async fn fetch(&self) -> Result<Vec<Jwk>> {
        tracing::debug!("Fetching JWKS from {}", self.jwks_uri);

        let request = HttpRequest::get(&self.jwks_uri).header("Accept", "application/json");
        let response = self
            .transport
            .send(request)
            .await
            .map_err(|e| SsoError::JwksFetch(e.to_string()))?;

        if !response.is_success() {
            return Err(SsoError::JwksFetch(format!(
                "{} returned HTTP {}",
                self.jwks_uri, response.status
            )));
        }

        let jwks: Jwks = serde_json::from_slice(&response.body)
            .map_err(|e| SsoError::JwksParse(e.to_string()))?;
        if jwks.keys.is_empty() {
            return Err(SsoError::JwksParse("key set contains no keys".into()));
        }

        Ok(jwks.keys)
    }
}

impl std::fmt::Debug for JwksCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwksCache")
            .field("jwks_uri", &self.jwks_uri)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// JWKS response structure.
#[derive(Debug, Deserialize)]
struct Jwks {
    keys: Vec<Jwk>,
}

/// Individual JWK (JSON Web Key).
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Jwk {
    /// Key type (RSA, EC, etc.)
    pub kty: String,
    /// Key ID
    pub kid: Option<String>,
    /// Algorithm
    pub alg: Option<String>,
    /// Key use (sig, enc)
    #[serde(rename = "use")]
    pub use_: Option<String>,
    /// RSA modulus
    n: Option<String>,
    /// RSA exponent
    e: Option<String>,
    /// EC x coordinate
    x: Option<String>,
    /// EC y coordinate
    y: Option<String>,
    /// EC curve
    crv: Option<String>,
}

impl Jwk {
    /// Algorithm the key is restricted to, if it declares one.
    pub fn algorithm(&self) -> Result<Option<Algorithm>> {
        self.alg
            .as_deref()
            .map(|alg| {
                alg.parse::<Algorithm>()
                    .map_err(|_| SsoError::UnsupportedAlgorithm(alg.to_string()))
            })
            .transpose()
    }

    /// Convert the raw key material into a verification key.
    pub fn to_decoding_key(&self) -> Result<DecodingKey> {
        match self.kty.as_str() {
            "RSA" => {
                let n = self
                    .n
                    .as_ref()
                    .ok_or_else(|| SsoError::InvalidKey("Missing 'n' in RSA key".into()))?;
                let e = self
                    .e
                    .as_ref()
                    .ok_or_else(|| SsoError::InvalidKey("Missing 'e' in RSA key".into()))?;
                DecodingKey::from_rsa_components(n, e)
                    .map_err(|e| SsoError::InvalidKey(e.to_string()))
            }
            "EC" => {
                if let Some(crv) = self.crv.as_deref() {
                    if !matches!(crv, "P-256" | "P-384") {
                        return Err(SsoError::InvalidKey(format!("Unsupported EC curve '{}'", crv)));
                    }
                }
                let x = self
                    .x
                    .as_ref()
                    .ok_or_else(|| SsoError::InvalidKey("Missing 'x' in EC key".into()))?;
                let y = self
                    .y
                    .as_ref()
                    .ok_or_else(|| SsoError::InvalidKey("Missing 'y' in EC key".into()))?;
                DecodingKey::from_ec_components(x, y)
                    .map_err(|e| SsoError::InvalidKey(e.to_string()))
            }
            _ => Err(SsoError::UnsupportedAlgorithm(self.kty.clone())),
        }
    }
}
