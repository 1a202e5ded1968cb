//! Unary request contract.
//!
//! Every non-streaming call to the REST API goes through
//! [`RequestPerformer::perform`]: one request, the raw response body back, and
//! the service's status codes translated into [`ClientError`] variants.

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderValue};
use reqwest::{Method, StatusCode};
use tracing::debug;
use url::Url;
use zeroize::Zeroizing;

use crate::core::query::{QueryModifier, apply_modifiers};
use crate::errors::{ApiError, ClientError, ClientResult, ValidationError};

/// Default REST base URL.
pub const DEFAULT_BASE_URL: &str = "https://api.elevenlabs.io/v1";

/// Performs one unary request against the REST API.
#[async_trait]
pub trait RequestPerformer: Send + Sync {
    /// Sends `method path` with an optional body and returns the response body
    /// of a 200 response.
    ///
    /// # Errors
    /// - `Api` for 400/401 responses
    /// - `Validation` for 422 responses
    /// - `HttpStatus` for any other non-200 response
    /// - `Timeout`/`ConnectionFailed`/`Http` when no response was received
    async fn perform(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        content_type: &str,
        query: &[QueryModifier],
    ) -> ClientResult<Bytes>;
}

/// [`RequestPerformer`] backed by `reqwest`.
#[derive(Clone)]
pub struct HttpTransport {
    http: reqwest::Client,
    base_url: Url,
    api_key: Option<Zeroizing<String>>,
}

impl std::fmt::Debug for HttpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpTransport")
            .field("base_url", &self.base_url.as_str())
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl HttpTransport {
    pub fn new(
        base_url: Url,
        api_key: Option<Zeroizing<String>>,
        request_timeout: Duration,
    ) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(request_timeout)
            .build()
            .map_err(|e| {
                ClientError::InvalidConfiguration(format!("Failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            http,
            base_url,
            api_key,
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Joins `path` onto the base URL and appends the query modifiers.
    pub fn endpoint(&self, path: &str, query: &[QueryModifier]) -> ClientResult<Url> {
        let joined = format!(
            "{}/{}",
            self.base_url.as_str().trim_end_matches('/'),
            path.trim_start_matches('/')
        );
        let mut url = Url::parse(&joined)
            .map_err(|e| ClientError::InvalidConfiguration(format!("invalid path {path}: {e}")))?;
        apply_modifiers(&mut url, query)?;
        Ok(url)
    }

    fn headers(&self, content_type: &str) -> ClientResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(
            CONTENT_TYPE,
            HeaderValue::from_str(content_type).map_err(|_| {
                ClientError::InvalidConfiguration(format!("invalid content type: {content_type}"))
            })?,
        );
        if let Some(key) = self.api_key.as_ref().filter(|key| !key.is_empty()) {
            let mut value = HeaderValue::from_str(key).map_err(|_| {
                ClientError::InvalidConfiguration(
                    "API key contains invalid header characters".to_string(),
                )
            })?;
            value.set_sensitive(true);
            headers.insert("xi-api-key", value);
        }
        Ok(headers)
    }
}

#[async_trait]
impl RequestPerformer for HttpTransport {
    async fn perform(
        &self,
        method: Method,
        path: &str,
        body: Option<Bytes>,
        content_type: &str,
        query: &[QueryModifier],
    ) -> ClientResult<Bytes> {
        let url = self.endpoint(path, query)?;
        debug!(method = %method, path = url.path(), "Sending request");

        let mut request = self
            .http
            .request(method, url)
            .headers(self.headers(content_type)?);
        if let Some(body) = body {
            request = request.body(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.bytes().await?;
        debug!(status = status.as_u16(), bytes = body.len(), "Response received");

        map_response(status, body)
    }
}

/// Translates a response into the body or the matching error.
pub fn map_response(status: StatusCode, body: Bytes) -> ClientResult<Bytes> {
    match status {
        StatusCode::OK => Ok(body),
        StatusCode::BAD_REQUEST | StatusCode::UNAUTHORIZED => {
            match serde_json::from_slice::<ApiError>(&body) {
                Ok(err) => Err(ClientError::Api(err)),
                Err(_) => Err(status_error(status)),
            }
        }
        StatusCode::UNPROCESSABLE_ENTITY => match serde_json::from_slice::<ValidationError>(&body) {
            Ok(err) => Err(ClientError::Validation(err)),
            Err(_) => Err(status_error(status)),
        },
        _ => Err(status_error(status)),
    }
}

fn status_error(status: StatusCode) -> ClientError {
    ClientError::HttpStatus {
        status: status.as_u16(),
        reason: status.canonical_reason().unwrap_or("Unknown").to_string(),
    }
}
