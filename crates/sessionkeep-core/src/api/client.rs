//! HTTP client for the identity service and authorized API calls.
//!
//! Credential endpoints (`/register`, `/login`) are sent without a bearer
//! token. Every other request built through [`ApiClient::request`] reads the
//! current session at build time and attaches `Authorization: Bearer <token>`
//! only while authenticated, and only to the origin of the configured base URL.

use std::time::Duration;

use anyhow::Result;
use reqwest::{header, Client, Method, RequestBuilder, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{SessionHandle, Token};
use crate::config::Config;

use super::ApiError;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay for rate limiting.
const INITIAL_BACKOFF: Duration = Duration::from_millis(1000);

const REGISTER_PATH: &str = "register";
const LOGIN_PATH: &str = "login";

#[derive(Serialize)]
struct CredentialsBody<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    token: Option<String>,
}

/// API client bound to one session.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Debug, Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    session: SessionHandle,
    initial_backoff: Duration,
}

impl ApiClient {
    pub fn new(config: &Config, session: SessionHandle) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            session,
            initial_backoff: INITIAL_BACKOFF,
        })
    }

    /// Override the first rate-limit backoff delay (doubles on each retry).
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    /// Whether `url` shares scheme, host and port with the base URL.
    fn is_same_origin(&self, url: &str) -> bool {
        match (Url::parse(&self.base_url), Url::parse(url)) {
            (Ok(base), Ok(target)) => base.origin() == target.origin(),
            _ => false,
        }
    }

    // ===== Identity service =====

    /// Ask the identity service to create an account. Returns the response body.
    pub async fn register(
        &self,
        email: &str,
        password: &str,
    ) -> Result<serde_json::Value, ApiError> {
        let response = self.send_credentials(REGISTER_PATH, email, password).await?;
        let text = response.text().await?;
        if text.trim().is_empty() {
            return Ok(serde_json::Value::Null);
        }
        Ok(serde_json::from_str(&text).unwrap_or(serde_json::Value::String(text)))
    }

    /// Exchange email/password for a bearer token.
    pub async fn login(&self, email: &str, password: &str) -> Result<Token, ApiError> {
        let response = self.send_credentials(LOGIN_PATH, email, password).await?;
        let text = response.text().await?;
        let body: LoginResponse = serde_json::from_str(&text).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse login response: {}", e))
        })?;
        let token = body
            .token
            .and_then(Token::new)
            .ok_or_else(|| ApiError::InvalidResponse("Login response has no token".to_string()))?;
        // A token that cannot be sent back is useless; reject it before it is stored
        Self::bearer_header(&token)?;
        Ok(token)
    }

    async fn send_credentials(
        &self,
        path: &str,
        email: &str,
        password: &str,
    ) -> Result<reqwest::Response, ApiError> {
        let url = self.url(path);
        debug!(url = %url, "Sending credentials request");
        let response = self
            .client
            .post(&url)
            .header(header::ACCEPT, "application/json")
            .json(&CredentialsBody { email, password })
            .send()
            .await?;
        Self::check_response(response).await
    }

    // ===== Authorized requests =====

    /// The `Authorization` value the next request would carry.
    pub fn authorization(&self) -> Option<String> {
        self.session.token().map(|t| t.bearer())
    }

    fn bearer_header(token: &Token) -> Result<header::HeaderValue, ApiError> {
        let mut value = header::HeaderValue::from_str(&token.bearer()).map_err(|_| {
            ApiError::InvalidResponse("Token is not a valid header value".to_string())
        })?;
        value.set_sensitive(true);
        Ok(value)
    }

    fn auth_headers(&self) -> Result<header::HeaderMap, ApiError> {
        let mut headers = header::HeaderMap::new();
        if let Some(token) = self.session.token() {
            headers.insert(header::AUTHORIZATION, Self::bearer_header(&token)?);
        }
        Ok(headers)
    }

    /// Start a request with the current credential attached.
    ///
    /// Absolute URLs on another origin are sent without the credential.
    pub fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ApiError> {
        let url = self.url(path);
        if !self.is_same_origin(&url) {
            debug!(url = %url, "Foreign origin, sending without credential");
            return Ok(self.client.request(method, url));
        }
        Ok(self
            .client
            .request(method, url)
            .headers(self.auth_headers()?))
    }

    /// Check if response is successful, returning an error with body if not.
    /// Returns Ok(Some(response)) for success, Ok(None) for rate limit (should retry),
    /// or Err for other errors.
    async fn check_response_for_retry(
        response: reqwest::Response,
    ) -> Result<Option<reqwest::Response>, ApiError> {
        if response.status().as_u16() == 429 {
            Ok(None)
        } else {
            Self::check_response(response).await.map(Some)
        }
    }

    /// Check if response is successful, returning an error with body if not.
    async fn check_response(response: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body))
        }
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
    ) -> Result<T, ApiError> {
        let mut retries = 0;
        let mut backoff = self.initial_backoff;

        loop {
            // Rebuilt each attempt so a login/logout between retries is honored
            let mut request = self.request(method.clone(), path)?;
            if let Some(body) = body {
                request = request.json(body);
            }
            let response = request.send().await?;

            match Self::check_response_for_retry(response).await? {
                Some(response) => {
                    return response.json().await.map_err(|e| {
                        let msg = format!("Failed to parse JSON from {}: {}", path, e);
                        ApiError::InvalidResponse(msg)
                    });
                }
                None => {
                    retries += 1;
                    if retries > MAX_RATE_LIMIT_RETRIES {
                        return Err(ApiError::RateLimited);
                    }
                    warn!(
                        path,
                        retry = retries,
                        backoff_ms = backoff.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                }
            }
        }
    }

    /// Authorized GET returning JSON
    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send_json(Method::GET, path, None).await
    }

    /// Authorized POST with a JSON body returning JSON
    pub async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_value(body).map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to encode request body: {}", e))
        })?;
        self.send_json(Method::POST, path, Some(&body)).await
    }
}
