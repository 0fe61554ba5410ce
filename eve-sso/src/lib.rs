//! OAuth2 authorization code client for the EVE Online SSO service.
//!
//! This crate builds login redirect URLs, exchanges authorization codes and
//! refresh tokens, and verifies the returned JWT access tokens against the
//! server's published signing keys.
//!
//! # Features
//!
//! - `reqwest` (default): ships [`ReqwestTransport`] and makes it the
//!   transport used by [`SingleSignOn::new`]. Without it, supply your own
//!   [`HttpTransport`] through [`SingleSignOnBuilder::transport`].
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use eve_sso::{Credentials, Grant, SingleSignOn};
//!
//! let sso = SingleSignOn::new(Credentials::new(
//!     "client-id",
//!     "secret-key",
//!     "https://example.com/callback",
//! ))?;
//!
//! // Send the user here, then read `code` from the callback.
//! let url = sso.redirect_url("random-state", Some("publicData"));
//!
//! let (tokens, character) = sso.access_token(Grant::AuthorizationCode(code)).await?;
//! println!("{} ({})", character.character_name(), character.character_id());
//! ```
//!
//! Storing tokens and scheduling refreshes is left to the caller.

mod claims;
mod client;
mod config;
mod error;
mod jwks;
mod transport;
mod types;
mod validator;

pub use claims::{CharacterIdentity, parse_character_id};
pub use client::{SingleSignOn, SingleSignOnBuilder};
pub use config::{Credentials, LIVE_SERVER, SsoVersion, TEST_SERVER};
pub use error::{Result, SsoError};
pub use jwks::{Jwk, JwksCache, RefreshPolicy};
#[cfg(feature = "reqwest")]
pub use transport::ReqwestTransport;
pub use transport::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
pub use types::{Grant, OAuthError, TokenResponse, VerifyResponse};
pub use validator::{JwtVerifier, JwtVerifierBuilder, MAX_LEEWAY_SECS, TokenVerifier};

/// Re-exported so callers can configure allowed algorithms.
pub use jsonwebtoken::Algorithm;
