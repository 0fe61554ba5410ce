//! Shared fixtures for the integration tests: a scripted transport and
//! RSA keys to sign tokens with.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use eve_sso::{HttpRequest, HttpResponse, HttpTransport, SsoError};
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde_json::{Value, json};

pub const SERVER: &str = "https://sso.test";
pub const JWKS_URI: &str = "https://sso.test/oauth/jwks";
pub const TOKEN_URI: &str = "https://sso.test/v2/oauth/token";
pub const KID: &str = "JWT-Signature-Key";

const SIGNING_KEY_PEM: &str = include_str!("../fixtures/signing_key.pem");
const SIGNING_KEY_N: &str = include_str!("../fixtures/signing_key.n");
const ROGUE_KEY_PEM: &str = include_str!("../fixtures/rogue_key.pem");

/// Transport answering from a fixed table of URLs and recording every request.
#[derive(Default)]
pub struct MockTransport {
    routes: Mutex<HashMap<String, HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
    delay: Option<Duration>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer requests to `url` with `status` and a JSON body.
    pub fn route(self, url: &str, status: u16, body: Value) -> Self {
        self.set_route(url, status, body);
        self
    }

    /// Sleep before answering, to widen race windows.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn set_route(&self, url: &str, status: u16, body: Value) {
        let body = serde_json::to_vec(&body).unwrap();
        self.routes.lock().unwrap().insert(url.to_string(), HttpResponse::new(status, body));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, url: &str) -> usize {
        self.requests.lock().unwrap().iter().filter(|r| r.url == url).count()
    }
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> eve_sso::Result<HttpResponse> {
        let url = request.url.clone();
        self.requests.lock().unwrap().push(request);

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.routes
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .ok_or_else(|| SsoError::Transport(format!("connection refused: {}", url)))
    }
}

/// Key set published by the test server.
pub fn jwks() -> Value {
    json!({
        "keys": [
            {
                "alg": "RS256",
                "e": "AQAB",
                "kid": KID,
                "kty": "RSA",
                "n": SIGNING_KEY_N,
                "use": "sig"
            },
            {
                "alg": "ES256",
                "crv": "P-256",
                "kid": "8878a23f-b40e-4dd8-9cd2-a2e8d0c8f8a6",
                "kty": "EC",
                "use": "sig",
                "x": "PatNnoTm1Y9B9RUKlLSgRKnnjChjfJGtY5SdBbL4Mkw",
                "y": "u7cpX5WjUe6AoYgAeTi3bglzy0ojP9Aeqk4wRTQCuCg"
            }
        ],
        "SkipUnresolvedJsonWebKeys": true
    })
}

/// Claims as issued by the SSO server for a character login.
pub fn character_claims() -> Value {
    json!({
        "scp": ["esi-skills.read_skills.v1", "esi-skills.read_skillqueue.v1"],
        "jti": "998e12c7-3241-43c5-8355-2c48822e0a1b",
        "kid": KID,
        "sub": "CHARACTER:EVE:95465499",
        "azp": "my3rdpartyclientid",
        "tenant": "tranquility",
        "tier": "live",
        "region": "world",
        "aud": ["my3rdpartyclientid", "EVE Online"],
        "name": "CCP Bartender",
        "owner": "8PmzCeTKb4VFUDrHLc/AeZXDSWM=",
        "exp": 1700000000,
        "iat": 1699998800,
        "iss": "https://login.eveonline.com"
    })
}

/// Sign `claims` with the published key.
pub fn sign(claims: &Value) -> String {
    sign_with(claims, SIGNING_KEY_PEM, Some(KID))
}

/// Sign `claims` with a key the server never published, under the published kid.
pub fn sign_rogue(claims: &Value) -> String {
    sign_with(claims, ROGUE_KEY_PEM, Some(KID))
}

pub fn sign_with(claims: &Value, pem: &str, kid: Option<&str>) -> String {
    let mut header = Header::new(Algorithm::RS256);
    header.kid = kid.map(str::to_string);
    let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
    jsonwebtoken::encode(&header, claims, &key).unwrap()
}

pub fn signing_key_pem() -> &'static str {
    SIGNING_KEY_PEM
}

/// Successful token endpoint response carrying `access_token`.
pub fn token_response(access_token: &str) -> Value {
    json!({
        "access_token": access_token,
        "expires_in": 1199,
        "token_type": "Bearer",
        "refresh_token": "gEy...fM0"
    })
}
