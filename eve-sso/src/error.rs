//! Error types for the `eve-sso` crate.

use thiserror::Error;

/// Errors that can occur while talking to the SSO service or verifying its tokens.
#[derive(Debug, Error)]
pub enum SsoError {
    /// The HTTP request could not be completed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// A response body did not match the expected JSON shape.
    #[error("Decoding error: {0}")]
    Decode(String),

    /// The SSO service answered with an OAuth error.
    ///
    /// Displays as the provider's human readable description.
    #[error("{description}")]
    Provider {
        /// OAuth error code, e.g. `invalid_grant`.
        error: String,
        /// Description sent by the provider (the error code if none was sent).
        description: String,
    },

    /// The token header carries no `kid`.
    #[error("Token header has no key id")]
    MissingKeyId,

    /// No key in the key set matches the token's `kid`.
    #[error("Key not found: kid={0}")]
    KeyNotFound(String),

    /// More than one key in the key set matches the token's `kid`.
    #[error("Ambiguous key: kid={kid} matches {count} keys")]
    AmbiguousKey { kid: String, count: usize },

    /// Failed to fetch the key set.
    #[error("JWKS fetch error: {0}")]
    JwksFetch(String),

    /// Failed to parse the key set.
    #[error("JWKS parse error: {0}")]
    JwksParse(String),

    /// Key material could not be converted into a verification key.
    #[error("Invalid key: {0}")]
    InvalidKey(String),

    /// Invalid token signature.
    #[error("Invalid signature")]
    InvalidSignature,

    /// Token is structurally invalid (segments, encoding, header).
    #[error("Malformed token: {0}")]
    Malformed(String),

    /// Algorithm not allowed or not matching the key.
    #[error("Unsupported algorithm: {0}")]
    UnsupportedAlgorithm(String),

    /// Token has expired. Only reported when expiry validation is enabled.
    #[error("Token expired")]
    Expired,

    /// Token issuer is not one of the expected issuers.
    #[error("Invalid issuer")]
    InvalidIssuer,

    /// Token audience does not contain the expected audience.
    #[error("Invalid audience")]
    InvalidAudience,

    /// Required claim is missing.
    #[error("Missing required claim: {0}")]
    MissingClaim(&'static str),

    /// Claim is present but has the wrong shape.
    #[error("Invalid claim '{claim}': {reason}")]
    InvalidClaim { claim: &'static str, reason: String },

    /// The caller supplied unusable input.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Client configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The operation does not exist for the configured protocol version.
    #[error("{operation} is not available for SSO {version}")]
    UnsupportedVersion { operation: &'static str, version: &'static str },
}

impl SsoError {
    /// Whether this error came from resolving the signing key.
    pub fn is_key_resolution(&self) -> bool {
        matches!(
            self,
            SsoError::MissingKeyId
                | SsoError::KeyNotFound(_)
                | SsoError::AmbiguousKey { .. }
                | SsoError::JwksFetch(_)
                | SsoError::JwksParse(_)
                | SsoError::InvalidKey(_)
        )
    }

    pub(crate) fn invalid_claim(claim: &'static str, reason: impl Into<String>) -> Self {
        SsoError::InvalidClaim { claim, reason: reason.into() }
    }
}

/// A convenience result type for SSO operations.
pub type Result<T> = std::result::Result<T, SsoError>;

impl From<jsonwebtoken::errors::Error> for SsoError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        use jsonwebtoken::errors::ErrorKind;
        match err.kind() {
            ErrorKind::InvalidSignature => SsoError::InvalidSignature,
            ErrorKind::ExpiredSignature => SsoError::Expired,
            ErrorKind::InvalidIssuer => SsoError::InvalidIssuer,
            ErrorKind::InvalidAudience => SsoError::InvalidAudience,
            ErrorKind::InvalidAlgorithm | ErrorKind::InvalidAlgorithmName => {
                SsoError::UnsupportedAlgorithm(err.to_string())
            }
            ErrorKind::InvalidRsaKey(_)
            | ErrorKind::InvalidEcdsaKey
            | ErrorKind::InvalidKeyFormat => SsoError::InvalidKey(err.to_string()),
            ErrorKind::MissingRequiredClaim(claim) => match registered_claim(claim) {
                Some(claim) => SsoError::MissingClaim(claim),
                None => SsoError::Malformed(err.to_string()),
            },
            ErrorKind::InvalidClaimFormat(claim) => match registered_claim(claim) {
                Some(claim) => SsoError::invalid_claim(claim, "unexpected JSON type"),
                None => SsoError::Malformed(err.to_string()),
            },
            _ => SsoError::Malformed(err.to_string()),
        }
    }
}

/// Registered claims `jsonwebtoken` validates itself.
fn registered_claim(claim: &str) -> Option<&'static str> {
    ["exp", "nbf", "iss", "aud", "sub"].into_iter().find(|known| *known == claim)
}

#[cfg(feature = "reqwest")]
impl From<reqwest::Error> for SsoError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            SsoError::Decode(err.to_string())
        } else {
            SsoError::Transport(err.to_string())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_error_displays_description() {
        let err = SsoError::Provider {
            error: "invalid_grant".into(),
            description: "Authorization code is invalid.".into(),
        };
        assert_eq!(err.to_string(), "Authorization code is invalid.");
    }

    #[test]
    fn test_key_resolution_classification() {
        assert!(SsoError::KeyNotFound("JWT-Signature-Key".into()).is_key_resolution());
        assert!(SsoError::AmbiguousKey { kid: "k".into(), count: 2 }.is_key_resolution());
        assert!(SsoError::MissingKeyId.is_key_resolution());
        assert!(!SsoError::InvalidSignature.is_key_resolution());
        assert!(!SsoError::MissingClaim("sub").is_key_resolution());
    }

    #[test]
    fn test_jsonwebtoken_signature_error_maps_to_invalid_signature() {
        let err: SsoError =
            jsonwebtoken::errors::Error::from(jsonwebtoken::errors::ErrorKind::InvalidSignature)
                .into();
        assert!(matches!(err, SsoError::InvalidSignature));
    }

    #[test]
    fn test_jsonwebtoken_claim_format_maps_to_invalid_claim() {
        use jsonwebtoken::errors::{Error, ErrorKind};

        let err: SsoError = Error::from(ErrorKind::InvalidClaimFormat("exp".into())).into();
        assert!(matches!(err, SsoError::InvalidClaim { claim: "exp", .. }));

        let err: SsoError = Error::from(ErrorKind::InvalidClaimFormat("custom".into())).into();
        assert!(matches!(err, SsoError::Malformed(_)));

        let err: SsoError = Error::from(ErrorKind::MissingRequiredClaim("iss".into())).into();
        assert!(matches!(err, SsoError::MissingClaim("iss")));
    }
}
