//! Request and response types of the SSO endpoints.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SsoError};

/// Error fields every OAuth endpoint may return.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OAuthError {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
}

impl OAuthError {
    /// Fail with [`SsoError::Provider`] if a nonempty error code is present.
    pub fn check(&self) -> Result<()> {
        match self.error.as_deref() {
            Some(code) if !code.is_empty() => {
                let description = self
                    .error_description
                    .clone()
                    .filter(|d| !d.is_empty())
                    .unwrap_or_else(|| code.to_string());
                Err(SsoError::Provider { error: code.to_string(), description })
            }
            _ => Ok(()),
        }
    }
}

/// Response of the token endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenResponse {
    #[serde(flatten)]
    pub oauth: OAuthError,

    #[serde(default)]
    pub access_token: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,

    /// Lifetime of the access token in seconds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_in: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    /// Fail on a provider error, or on a response that carries no access token.
    pub fn check(&self) -> Result<()> {
        self.oauth.check()?;
        if self.access_token.is_empty() {
            return Err(SsoError::Decode("token response has no access_token".into()));
        }
        Ok(())
    }
}

/// Response of the v1 verify endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct VerifyResponse {
    #[serde(flatten)]
    pub oauth: OAuthError,

    #[serde(rename = "CharacterID", default)]
    pub character_id: i64,

    #[serde(default)]
    pub character_name: String,

    /// Expiry as sent by the server, e.g. `2016-07-20T12:34:56`.
    #[serde(default)]
    pub expires_on: String,

    /// Space separated list of granted scopes.
    #[serde(default)]
    pub scopes: String,

    #[serde(default)]
    pub token_type: String,

    #[serde(default)]
    pub character_owner_hash: String,
}

impl VerifyResponse {
    /// Fail on a provider error, or on a response that names no character.
    pub fn check(&self) -> Result<()> {
        self.oauth.check()?;
        if self.character_id <= 0 {
            return Err(SsoError::Decode("verify response has no CharacterID".into()));
        }
        if self.character_name.is_empty() {
            return Err(SsoError::Decode("verify response has no CharacterName".into()));
        }
        Ok(())
    }

    /// Parse [`Self::expires_on`] as a UTC timestamp.
    ///
    /// The server omits the offset; the value is always UTC.
    pub fn expires_at(&self) -> Result<DateTime<Utc>> {
        let value = self.expires_on.trim_end_matches('Z');
        NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
            .map(|naive| naive.and_utc())
            .map_err(|e| {
                SsoError::Decode(format!("invalid ExpiresOn '{}': {}", self.expires_on, e))
            })
    }

    /// Granted scopes as a list.
    pub fn scopes(&self) -> Vec<&str> {
        self.scopes.split_whitespace().collect()
    }
}

/// What to exchange at the token endpoint.
#[derive(Clone, PartialEq, Eq)]
pub enum Grant {
    /// Code received on the redirect URI after the user logged in.
    AuthorizationCode(String),
    /// Refresh token from an earlier exchange.
    RefreshToken(String),
}

impl Grant {
    /// Value of the `grant_type` form field.
    pub fn grant_type(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode(_) => "authorization_code",
            Grant::RefreshToken(_) => "refresh_token",
        }
    }

    /// Name of the form field carrying the code or token.
    fn value_field(&self) -> &'static str {
        match self {
            Grant::AuthorizationCode(_) => "code",
            Grant::RefreshToken(_) => "refresh_token",
        }
    }

    fn value(&self) -> &str {
        match self {
            Grant::AuthorizationCode(code) => code,
            Grant::RefreshToken(token) => token,
        }
    }

    /// Form fields sent to the token endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`SsoError::InvalidRequest`] if the code or token is empty.
    pub(crate) fn form_fields(&self) -> Result<[(&str, &str); 2]> {
        if self.value().trim().is_empty() {
            return Err(SsoError::InvalidRequest(format!(
                "{} must not be empty",
                self.value_field()
            )));
        }
        Ok([("grant_type", self.grant_type()), (self.value_field(), self.value())])
    }
}

impl std::fmt::Debug for Grant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple(self.grant_type()).field(&"<redacted>").finish()
    }
}
