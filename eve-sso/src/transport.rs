//! HTTP transport used for every outbound call.
//!
//! The client never talks to the network directly; it hands a [`HttpRequest`]
//! to an [`HttpTransport`] and decodes the returned [`HttpResponse`]. The
//! default implementation is [`ReqwestTransport`] (behind the `reqwest`
//! feature). Tests and hosts with their own HTTP stack can plug in another
//! implementation.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{Result, SsoError};

/// HTTP method of an outbound request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl std::fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An outbound HTTP request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// Already encoded body, if any.
    pub body: Option<String>,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: HttpMethod::Get, url: url.into(), headers: Vec::new(), body: None }
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self { method: HttpMethod::Post, url: url.into(), headers: Vec::new(), body: None }
    }

    /// Add a header.
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Set an `application/x-www-form-urlencoded` body built from `fields`.
    pub fn form<'a>(self, fields: impl IntoIterator<Item = (&'a str, &'a str)>) -> Self {
        let body = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(fields)
            .finish();
        let mut request = self.header("Content-Type", "application/x-www-form-urlencoded");
        request.body = Some(body);
        request
    }

    /// First value of the header `name`, compared case-insensitively.
    pub fn header_value(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Status and raw body of a completed HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self { status, body: body.into() }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Decode the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            SsoError::Decode(format!("HTTP {} response is not valid JSON: {}", self.status, e))
        })
    }
}

/// Executes HTTP requests on behalf of the SSO client and key cache.
///
/// Implementations must not retry; a failed exchange is reported as
/// [`SsoError::Transport`]. Non-2xx responses are *not* errors at this layer.
#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[cfg(feature = "reqwest")]
pub use self::reqwest_transport::ReqwestTransport;

#[cfg(feature = "reqwest")]
mod reqwest_transport {
    use std::time::Duration;

    use async_trait::async_trait;

    use super::{HttpMethod, HttpRequest, HttpResponse, HttpTransport};
    use crate::error::{Result, SsoError};

    /// [`HttpTransport`] backed by a `reqwest::Client`.
    #[derive(Debug, Clone, Default)]
    pub struct ReqwestTransport {
        client: reqwest::Client,
    }

    impl ReqwestTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Use a preconfigured client (proxies, timeouts, user agent).
        pub fn with_client(client: reqwest::Client) -> Self {
            Self { client }
        }

        /// Build a client with a total request timeout.
        pub fn with_timeout(timeout: Duration) -> Result<Self> {
            let client = reqwest::Client::builder()
                .timeout(timeout)
                .build()
                .map_err(|e| SsoError::Config(format!("Failed to build HTTP client: {}", e)))?;
            Ok(Self { client })
        }
    }

    #[async_trait]
    impl HttpTransport for ReqwestTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
            tracing::debug!(method = request.method.as_str(), "sending request to {}", request.url);

            let method = match request.method {
                HttpMethod::Get => reqwest::Method::GET,
                HttpMethod::Post => reqwest::Method::POST,
            };

            let mut builder = self.client.request(method, &request.url);
            for (name, value) in &request.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = request.body {
                builder = builder.body(body);
            }

            let response = builder.send().await?;
            let status = response.status().as_u16();
            let body = response.bytes().await?;

            Ok(HttpResponse { status, body: body.to_vec() })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_form_sets_body_and_content_type() {
        let request = HttpRequest::post("https://login.eveonline.com/v2/oauth/token")
            .form([("grant_type", "authorization_code"), ("code", "a b&c")]);

        assert_eq!(request.body.as_deref(), Some("grant_type=authorization_code&code=a+b%26c"));
        assert_eq!(
            request.header_value("content-type"),
            Some("application/x-www-form-urlencoded")
        );
    }

    #[test]
    fn test_method_names() {
        assert_eq!(HttpRequest::get("https://sso.test").method.as_str(), "GET");
        assert_eq!(HttpMethod::Post.to_string(), "POST");
    }

    #[test]
    fn test_json_decode_failure_is_decode_error() {
        let response = HttpResponse::new(502, "<html>Bad Gateway</html>");
        let err = response.json::<serde_json::Value>().unwrap_err();
        assert!(matches!(err, SsoError::Decode(_)));
        assert!(!response.is_success());
    }
}
