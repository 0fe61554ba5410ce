//! The SSO client: redirect URLs, token exchange and token verification.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use jsonwebtoken::Algorithm;

use crate::claims::CharacterIdentity;
use crate::config::{Credentials, JWKS_PATH, SsoVersion, VERIFY_PATH};
use crate::error::{Result, SsoError};
use crate::jwks::{JwksCache, RefreshPolicy};
use crate::transport::{HttpRequest, HttpTransport};
use crate::types::{Grant, TokenResponse, VerifyResponse};
use crate::validator::{JwtVerifier, TokenVerifier};

/// A configured relationship with the EVE Online SSO service.
///
/// Cheap to share behind an `Arc`; every method takes `&self`.
pub struct SingleSignOn {
    credentials: Credentials,
    version: SsoVersion,
    transport: Arc<dyn HttpTransport>,
    jwks_cache: Arc<JwksCache>,
    verifier: Arc<dyn TokenVerifier>,
}

impl SingleSignOn {
    /// Create a new builder.
    pub fn builder(credentials: Credentials) -> SingleSignOnBuilder {
        SingleSignOnBuilder::new(credentials)
    }

    /// Create a v2 client using the default `reqwest` transport.
    #[cfg(feature = "reqwest")]
    pub fn new(credentials: Credentials) -> Result<Self> {
        Self::builder(credentials).build()
    }

    pub fn credentials(&self) -> &Credentials {
        &self.credentials
    }

    pub fn version(&self) -> SsoVersion {
        self.version
    }

    /// Key cache used for local token verification.
    pub fn jwks_cache(&self) -> &Arc<JwksCache> {
        &self.jwks_cache
    }

    /// Verifier used by [`Self::access_token`].
    ///
    /// Useful to re-check an access token stored by the caller.
    pub fn verifier(&self) -> &Arc<dyn TokenVerifier> {
        &self.verifier
    }

    /// URL to send the user's browser to for logging in.
    ///
    /// `state` is echoed back on the redirect URI and should be checked by
    /// the caller. `scope` is a space separated list of scopes.
    pub fn redirect_url(&self, state: &str, scope: Option<&str>) -> String {
        let mut query = url::form_urlencoded::Serializer::new(String::new());
        query
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.credentials.client_id)
            .append_pair("redirect_uri", &self.credentials.redirect_uri)
            .append_pair("state", state);
        if let Some(scope) = scope {
            query.append_pair("scope", scope);
        }

        format!("{}?{}", self.endpoint(self.version.authorize_path()), query.finish())
    }

    /// Exchange an authorization code or refresh token for tokens.
    ///
    /// # Errors
    ///
    /// Fails with [`SsoError::Provider`] when the response carries an OAuth
    /// error, whatever the HTTP status, and with [`SsoError::Decode`] when it
    /// carries neither an error nor an access token.
    pub async fn exchange_token(&self, grant: Grant) -> Result<TokenResponse> {
        let fields = grant.form_fields()?;
        let url = self.endpoint(self.version.token_path());
        tracing::debug!(grant_type = grant.grant_type(), "requesting token from {}", url);

        let request = HttpRequest::post(url)
            .header("Authorization", format!("Basic {}", self.basic_auth()))
            .header("Accept", "application/json")
            .form(fields);
        let response: TokenResponse = self.transport.send(request).await?.json()?;
        response.check()?;

        Ok(response)
    }

    /// Exchange a grant and verify the returned access token locally.
    ///
    /// Only available for [`SsoVersion::V2`]. Fails as a whole if the token
    /// cannot be verified.
    pub async fn access_token(&self, grant: Grant) -> Result<(TokenResponse, CharacterIdentity)> {
        self.require(SsoVersion::V2, "access_token")?;

        let response = self.exchange_token(grant).await?;
        let identity = self.verifier.verify(&response.access_token).await?;
        tracing::debug!(
            character_id = identity.character_id(),
            "verified access token, expires at {}",
            identity.expires_at()
        );

        Ok((response, identity))
    }

    /// Use a refresh token to obtain a new, verified access token.
    pub async fn refresh_token(
        &self,
        refresh_token: impl Into<String>,
    ) -> Result<(TokenResponse, CharacterIdentity)> {
        self.access_token(Grant::RefreshToken(refresh_token.into())).await
    }

    /// Ask the SSO server who an access token belongs to.
    ///
    /// Only available for [`SsoVersion::V1`].
    pub async fn verify_token(&self, access_token: &str) -> Result<VerifyResponse> {
        self.require(SsoVersion::V1, "verify_token")?;
        if access_token.trim().is_empty() {
            return Err(SsoError::InvalidRequest("access token must not be empty".into()));
        }

        let url = self.endpoint(VERIFY_PATH);
        tracing::debug!("verifying token against {}", url);

        let request = HttpRequest::get(url)
            .header("Authorization", format!("Bearer {}", access_token))
            .header("Accept", "application/json");
        let response: VerifyResponse = self.transport.send(request).await?.json()?;
        response.check()?;

        Ok(response)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.credentials.base_url(), path)
    }

    fn basic_auth(&self) -> String {
        STANDARD.encode(format!("{}:{}", self.credentials.client_id, self.credentials.secret_key))
    }

    fn require(&self, version: SsoVersion, operation: &'static str) -> Result<()> {
        if self.version == version {
            Ok(())
        } else {
            Err(SsoError::UnsupportedVersion { operation, version: self.version.as_str() })
        }
    }
}

impl std::fmt::Debug for SingleSignOn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SingleSignOn")
            .field("credentials", &self.credentials)
            .field("version", &self.version)
            .field("jwks_cache", &self.jwks_cache)
            .finish_non_exhaustive()
    }
}

/// Builder for [`SingleSignOn`].
pub struct SingleSignOnBuilder {
    credentials: Credentials,
    version: SsoVersion,
    transport: Option<Arc<dyn HttpTransport>>,
    jwks_uri: Option<String>,
    refresh_policy: RefreshPolicy,
    verifier: Option<Arc<dyn TokenVerifier>>,
    issuers: Vec<String>,
    audience: Option<String>,
    algorithms: Vec<Algorithm>,
    validate_expiry: bool,
    leeway: u64,
}

impl SingleSignOnBuilder {
    fn new(credentials: Credentials) -> Self {
        Self {
            credentials,
            version: SsoVersion::default(),
            transport: None,
            jwks_uri: None,
            refresh_policy: RefreshPolicy::default(),
            verifier: None,
            issuers: Vec::new(),
            audience: None,
            algorithms: Vec::new(),
            validate_expiry: false,
            leeway: 0,
        }
    }

    /// Protocol version to speak. Defaults to v2.
    pub fn version(mut self, version: SsoVersion) -> Self {
        self.version = version;
        self
    }

    /// HTTP transport for all outbound calls.
    ///
    /// Required when the `reqwest` feature is disabled.
    pub fn transport(mut self, transport: Arc<dyn HttpTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    /// Key set URL. Defaults to `{server}/oauth/jwks`.
    pub fn jwks_uri(mut self, uri: impl Into<String>) -> Self {
        self.jwks_uri = Some(uri.into());
        self
    }

    /// When cached signing keys are refetched. Defaults to never.
    pub fn refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    /// Replace the JWT verifier used by [`SingleSignOn::access_token`].
    pub fn verifier(mut self, verifier: Arc<dyn TokenVerifier>) -> Self {
        self.verifier = Some(verifier);
        self
    }

    /// Only accept tokens issued by `issuer`.
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuers.push(issuer.into());
        self
    }

    /// Require the token audience to contain `audience`, typically the client id.
    pub fn audience(mut self, audience: impl Into<String>) -> Self {
        self.audience = Some(audience.into());
        self
    }

    /// Allow an access token signing algorithm. Defaults to RS256 only.
    pub fn algorithm(mut self, alg: Algorithm) -> Self {
        self.algorithms.push(alg);
        self
    }

    /// Reject expired access tokens during verification.
    pub fn validate_expiry(mut self, validate: bool) -> Self {
        self.validate_expiry = validate;
        self
    }

    /// Clock skew tolerance in seconds for the expiry check.
    pub fn leeway(mut self, seconds: u64) -> Self {
        self.leeway = seconds;
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns [`SsoError::Config`] if the credentials are invalid or no
    /// transport is available.
    pub fn build(self) -> Result<SingleSignOn> {
        self.credentials.validate()?;

        let transport = match self.transport {
            Some(transport) => transport,
            None => default_transport()?,
        };

        let jwks_uri = self
            .jwks_uri
            .unwrap_or_else(|| format!("{}{}", self.credentials.base_url(), JWKS_PATH));
        let jwks_cache = Arc::new(
            JwksCache::new(jwks_uri, Arc::clone(&transport))
                .with_refresh_policy(self.refresh_policy),
        );

        let verifier = match self.verifier {
            Some(verifier) => verifier,
            None => {
                let mut builder = JwtVerifier::builder()
                    .jwks_cache(Arc::clone(&jwks_cache))
                    .validate_expiry(self.validate_expiry)
                    .leeway(self.leeway);
                for alg in self.algorithms {
                    builder = builder.algorithm(alg);
                }
                for issuer in self.issuers {
                    builder = builder.issuer(issuer);
                }
                if let Some(audience) = self.audience {
                    builder = builder.audience(audience);
                }
                Arc::new(builder.build()?) as Arc<dyn TokenVerifier>
            }
        };

        Ok(SingleSignOn {
            credentials: self.credentials,
            version: self.version,
            transport,
            jwks_cache,
            verifier,
        })
    }
}

#[cfg(feature = "reqwest")]
fn default_transport() -> Result<Arc<dyn HttpTransport>> {
    Ok(Arc::new(crate::transport::ReqwestTransport::new()))
}

#[cfg(not(feature = "reqwest"))]
fn default_transport() -> Result<Arc<dyn HttpTransport>> {
    Err(SsoError::Config(
        "no HTTP transport configured and the `reqwest` feature is disabled".into(),
    ))
}
