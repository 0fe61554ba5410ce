//! Credentials, server endpoints and protocol versions.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SsoError};

/// Base URL of the EVE Online live (Tranquility) SSO server.
pub const LIVE_SERVER: &str = "https://login.eveonline.com";

/// Base URL of the EVE Online test (Singularity) SSO server.
pub const TEST_SERVER: &str = "https://sisilogin.testeveonline.com";

/// Application credentials registered with the SSO service.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub client_id: String,
    pub secret_key: String,
    pub redirect_uri: String,
    /// Base URL of the SSO server, without a trailing path.
    #[serde(default = "default_server")]
    pub server: String,
}

fn default_server() -> String {
    LIVE_SERVER.to_string()
}

impl Credentials {
    /// Credentials against the live server.
    pub fn new(
        client_id: impl Into<String>,
        secret_key: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            secret_key: secret_key.into(),
            redirect_uri: redirect_uri.into(),
            server: default_server(),
        }
    }

    /// Point the credentials at another server, e.g. [`TEST_SERVER`].
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = server.into();
        self
    }

    /// Check that every field is usable.
    ///
    /// # Errors
    ///
    /// Returns [`SsoError::Config`] if the client id or redirect URI is empty,
    /// or the server is not an absolute `http(s)` URL.
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(SsoError::Config("client_id must not be empty".to_string()));
        }
        if self.redirect_uri.trim().is_empty() {
            return Err(SsoError::Config("redirect_uri must not be empty".to_string()));
        }
        let server = url::Url::parse(&self.server)
            .map_err(|e| SsoError::Config(format!("invalid server URL '{}': {}", self.server, e)))?;
        if !matches!(server.scheme(), "http" | "https") {
            return Err(SsoError::Config(format!(
                "server URL must use http or https, got '{}'",
                server.scheme()
            )));
        }
        Ok(())
    }

    /// Server base URL without trailing slashes.
    pub(crate) fn base_url(&self) -> &str {
        self.server.trim_end_matches('/')
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("client_id", &self.client_id)
            .field("secret_key", &"<redacted>")
            .field("redirect_uri", &self.redirect_uri)
            .field("server", &self.server)
            .finish()
    }
}

/// SSO protocol version a client speaks.
///
/// The versions differ in endpoint paths and in how a token is turned into
/// an identity: v1 asks the remote verify endpoint, v2 verifies the JWT
/// access token locally against the published key set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SsoVersion {
    V1,
    #[default]
    V2,
}

impl SsoVersion {
    pub fn as_str(&self) -> &'static str {
        match self {
            SsoVersion::V1 => "v1",
            SsoVersion::V2 => "v2",
        }
    }

    pub(crate) fn authorize_path(&self) -> &'static str {
        match self {
            SsoVersion::V1 => "/oauth/authorize",
            SsoVersion::V2 => "/v2/oauth/authorize",
        }
    }

    pub(crate) fn token_path(&self) -> &'static str {
        match self {
            SsoVersion::V1 => "/oauth/token",
            SsoVersion::V2 => "/v2/oauth/token",
        }
    }
}

pub(crate) const VERIFY_PATH: &str = "/oauth/verify";
pub(crate) const JWKS_PATH: &str = "/oauth/jwks";

impl fmt::Display for SsoVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
