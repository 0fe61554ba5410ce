//! Token verifier trait and JWT implementation.

use std::sync::Arc;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, Validation};
use serde_json::{Map, Value};

use crate::claims::CharacterIdentity;
use crate::error::{Result, SsoError};
use crate::jwks::JwksCache;

/// Largest accepted clock skew tolerance, one day.
pub const MAX_LEEWAY_SECS: u64 = 86_400;

/// Turns an access token into a verified character identity.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    /// Verify a token and extract the identity it asserts.
    async fn verify(&self, token: &str) -> Result<CharacterIdentity>;
}

/// JWT verifier with JWKS-based signature verification.
///
/// Signature checking always happens before any claim is read. Issuer,
/// audience and expiry checks are opt-in; by default only the signature
/// and the shape of the identity claims are enforced, and the expiry is
/// reported back through [`CharacterIdentity::expires_at`].
#[derive(Debug)]
pub struct JwtVerifier {
    jwks_cache: Arc<JwksCache>,
    /// Allowed algorithms.
    algorithms: Vec<Algorithm>,
    issuers: Vec<String>,
    audience: Option<String>,
    validate_expiry: bool,
    leeway: u64,
}

impl JwtVerifier {
    /// Create a new builder.
    pub fn builder() -> JwtVerifierBuilder {
        JwtVerifierBuilder::default()
    }

    /// Key cache backing this verifier.
    pub fn jwks_cache(&self) -> &Arc<JwksCache> {
        &self.jwks_cache
    }

    fn validation(&self, algorithm: Algorithm) -> Validation {
        let mut validation = Validation::new(algorithm);
        // Claim presence is reported by the identity decoder, per field.
        validation.required_spec_claims.clear();
        validation.validate_exp = self.validate_expiry;
        validation.validate_nbf = false;
        validation.leeway = self.leeway;
        if !self.issuers.is_empty() {
            validation.set_issuer(&self.issuers);
        }
        match &self.audience {
            Some(aud) => validation.set_audience(&[aud]),
            None => validation.validate_aud = false,
        }
        validation
    }

    /// Algorithm to verify with; must be allowed and match the key.
    fn algorithm_for(
        &self,
        header: &jsonwebtoken::Header,
        declared: Option<Algorithm>,
    ) -> Result<Algorithm> {
        if !self.algorithms.contains(&header.alg) {
            return Err(SsoError::UnsupportedAlgorithm(format!(
                "{:?} is not allowed",
                header.alg
            )));
        }
        match declared {
            Some(alg) if alg != header.alg => Err(SsoError::UnsupportedAlgorithm(format!(
                "token uses {:?} but key is restricted to {:?}",
                header.alg, alg
            ))),
            _ => Ok(header.alg),
        }
    }
}

#[async_trait]
impl TokenVerifier for JwtVerifier {
    async fn verify(&self, token: &str) -> Result<CharacterIdentity> {
        let kid = key_id(token)?;
        let header = jsonwebtoken::decode_header(token)?;

        let jwk = self.jwks_cache.resolve(&kid).await?;
        let algorithm = self.algorithm_for(&header, jwk.algorithm()?)?;
        let key = jwk.to_decoding_key()?;

        let validation = self.validation(algorithm);
        let token_data = jsonwebtoken::decode::<Map<String, Value>>(token, &key, &validation)?;

        CharacterIdentity::from_claims(&token_data.claims)
    }
}

/// Read the `kid` field from the token's header segment.
fn key_id(token: &str) -> Result<String> {
    let segment = token
        .split('.')
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| SsoError::Malformed("missing header segment".into()))?;
    let bytes = URL_SAFE_NO_PAD
        .decode(segment.trim_end_matches('='))
        .map_err(|e| SsoError::Malformed(format!("header is not base64url: {}", e)))?;
    let header: Map<String, Value> = serde_json::from_slice(&bytes)
        .map_err(|e| SsoError::Malformed(format!("header is not a JSON object: {}", e)))?;

    match header.get("kid") {
        None | Some(Value::Null) => Err(SsoError::MissingKeyId),
        Some(Value::String(kid)) => Ok(kid.clone()),
        Some(_) => Err(SsoError::invalid_claim("kid", "expected a string")),
    }
}

/// Builder for [`JwtVerifier`].
#[derive(Default)]
pub struct JwtVerifierBuilder {
    jwks_cache: Option<Arc<JwksCache>>,
    algorithms: Vec<Algorithm>,
    issuers: Vec<String>,
    audience: Option<String>,
    validate_expiry: bool,
    leeway: u64,
}

impl JwtVerifierBuilder {
    /// Set the key cache used to resolve signing keys.
    pub fn jwks_cache(mut self, cache: Arc<JwksCache>) -> Self {
        self.jwks_cache = Some(cache);
        self
    }

    /// Add an allowed algorithm. Defaults to RS256 only.
    pub fn algorithm(mut self, alg: Algorithm) -> Self {
        self.algorithms.push(alg);
        self
    }

    /// Accept tokens from this issuer. Can be called more than once.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuers.push(issuer.into());
        self
    }

    /// Require the audience to contain this value.
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Reject expired tokens.
    pub fn validate_expiry(mut self, validate: bool) -> Self {
        self.validate_expiry = validate;
        self
    }

    /// Clock skew tolerance in seconds for expiry checks.
    ///
    /// At most [`MAX_LEEWAY_SECS`]; larger values are rejected by
    /// [`build`](Self::build).
    pub fn leeway(mut self, seconds: u64) -> Self {
        self.leeway = seconds;
        self
    }

    /// Build the verifier.
    pub fn build(self) -> Result<JwtVerifier> {
        let jwks_cache =
            self.jwks_cache.ok_or_else(|| SsoError::Config("jwks_cache is required".into()))?;

        let algorithms =
            if self.algorithms.is_empty() { vec![Algorithm::RS256] } else { self.algorithms };
        if let Some(alg) = algorithms.iter().find(|alg| is_symmetric(**alg)) {
            return Err(SsoError::Config(format!("{:?} cannot be verified with a public key", alg)));
        }
        if self.leeway > MAX_LEEWAY_SECS {
            return Err(SsoError::Config(format!(
                "leeway of {}s exceeds the maximum of {}s",
                self.leeway, MAX_LEEWAY_SECS
            )));
        }

        Ok(JwtVerifier {
            jwks_cache,
            algorithms,
            issuers: self.issuers,
            audience: self.audience,
            validate_expiry: self.validate_expiry,
            leeway: self.leeway,
        })
    }
}

fn is_symmetric(alg: Algorithm) -> bool {
    matches!(alg, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512)
}
