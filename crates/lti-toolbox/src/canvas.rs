// crates/lti-toolbox/src/canvas.rs
// ============================================================================
// Module: Canvas API Client
// Description: Blocking Canvas REST client implementing the LMS API seam.
// Purpose: Issue bearer-authenticated calls and decode JSON responses.
// Dependencies: reqwest, serde_json, url, lti-toolbox-core
// ============================================================================

//! ## Overview
//! [`CanvasClient`] talks to `<canvas url>/api/v1/<path>`. GET and DELETE
//! parameters travel in the query string; POST and PUT parameters are sent
//! form-encoded. Responses are read under a size limit and decoded as JSON;
//! a non-success status surfaces as [`ApiError::Status`] carrying the parsed
//! body so callers can inspect Canvas' error payload. Redirects are not
//! followed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Read;
use std::time::Duration;

use lti_toolbox_core::ApiError;
use lti_toolbox_core::CanvasCredentials;
use lti_toolbox_core::ConfigurationError;
use lti_toolbox_core::HttpMethod;
use lti_toolbox_core::LmsApi;
use reqwest::blocking::Client;
use reqwest::blocking::Response;
use reqwest::header::CONTENT_TYPE;
use reqwest::redirect::Policy;
use serde_json::Value;
use url::Url;
use url::form_urlencoded;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Canvas client limits.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanvasClientConfig {
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size, in bytes.
    pub max_response_bytes: usize,
    /// User agent for outbound requests.
    pub user_agent: String,
}

impl Default for CanvasClientConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 10_000,
            max_response_bytes: 4 * 1024 * 1024,
            user_agent: "lti-toolbox/0.1".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Client
// ============================================================================

/// Canvas REST API client.
pub struct CanvasClient {
    /// API base, always ending in `/api/v1/`.
    base: Url,
    /// Bearer token.
    token: String,
    /// Client limits.
    config: CanvasClientConfig,
    /// HTTP client.
    client: Client,
}

impl std::fmt::Debug for CanvasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasClient")
            .field("base", &self.base.as_str())
            .field("token", &"<redacted>")
            .finish_non_exhaustive()
    }
}

impl CanvasClient {
    /// Creates a client from cached credentials.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError::InvalidCanvasCredentials`] when the URL
    /// or token is blank, the URL is malformed, or the HTTP client cannot be
    /// built.
    pub fn new(
        credentials: &CanvasCredentials,
        config: CanvasClientConfig,
    ) -> Result<Self, ConfigurationError> {
        let api_base = credentials.api_base()?;
        let base = Url::parse(&format!("{api_base}/"))
            .map_err(|err| ConfigurationError::InvalidCanvasCredentials(format!("url: {err}")))?;
        let client = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .user_agent(config.user_agent.clone())
            .redirect(Policy::none())
            .build()
            .map_err(|_| {
                ConfigurationError::InvalidCanvasCredentials("http client build failed".to_string())
            })?;
        Ok(Self {
            base,
            token: credentials.token.trim().to_string(),
            config,
            client,
        })
    }

    /// Returns the API base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Resolves `path` under the API base.
    fn endpoint(&self, path: &str) -> Result<Url, ApiError> {
        self.base
            .join(path.trim_start_matches('/'))
            .map_err(|err| ApiError::Transport(format!("invalid api path {path}: {err}")))
    }
}

impl LmsApi for CanvasClient {
    fn request(
        &self,
        method: HttpMethod,
        path: &str,
        params: &[(String, String)],
        headers: &[(String, String)],
    ) -> Result<Value, ApiError> {
        let mut url = self.endpoint(path)?;
        let mut builder = match method {
            HttpMethod::Get | HttpMethod::Delete => {
                if !params.is_empty() {
                    url.query_pairs_mut().extend_pairs(params);
                }
                if method == HttpMethod::Get {
                    self.client.get(url)
                } else {
                    self.client.delete(url)
                }
            }
            HttpMethod::Post | HttpMethod::Put => {
                let body = form_urlencoded::Serializer::new(String::new())
                    .extend_pairs(params)
                    .finish();
                let builder = if method == HttpMethod::Post {
                    self.client.post(url)
                } else {
                    self.client.put(url)
                };
                builder.header(CONTENT_TYPE, "application/x-www-form-urlencoded").body(body)
            }
        };
        builder = builder.bearer_auth(&self.token);
        for (name, value) in headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        let mut response = builder
            .send()
            .map_err(|err| ApiError::Transport(format!("{} {path}: {err}", method.as_str())))?;
        let status = response.status();
        let body = read_response_limited(&mut response, self.config.max_response_bytes)?;
        let parsed = decode_body(&body);
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                body: parsed.ok(),
            });
        }
        parsed
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Reads a response body, failing when it exceeds `max_bytes`.
fn read_response_limited(response: &mut Response, max_bytes: usize) -> Result<Vec<u8>, ApiError> {
    let max_bytes_u64 = u64::try_from(max_bytes)
        .map_err(|_| ApiError::Decode("response size limit exceeds u64".to_string()))?;
    if let Some(expected) = response.content_length()
        && expected > max_bytes_u64
    {
        return Err(ApiError::Decode("response exceeds size limit".to_string()));
    }
    let mut buf = Vec::new();
    response
        .take(max_bytes_u64.saturating_add(1))
        .read_to_end(&mut buf)
        .map_err(|err| ApiError::Transport(format!("failed to read response: {err}")))?;
    if buf.len() > max_bytes {
        return Err(ApiError::Decode("response exceeds size limit".to_string()));
    }
    Ok(buf)
}

/// Decodes a JSON body; an empty body decodes to null.
fn decode_body(body: &[u8]) -> Result<Value, ApiError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    serde_json::from_slice(body).map_err(|err| ApiError::Decode(err.to_string()))
}
