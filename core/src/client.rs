//! Request/response pipeline shared by every API call.
//!
//! # Design
//! `NalogClient` owns the configuration, a shared `Transport` handle and an
//! optional access token. Every operation goes through the same three steps:
//!
//! 1. `new_request` resolves the path against the base URL, serializes the
//!    body and applies the fixed default headers.
//! 2. `bare_do` checks the context, attaches the bearer header to a copy of
//!    the request, runs the transport and turns non-2xx statuses into
//!    `ApiError`.
//! 3. `send` / `send_raw` decode the successful body.
//!
//! Resource groups (`auth`, `users`, `income`, `receipt`) are thin services
//! that borrow the client read-only; the client itself holds no mutable state
//! and can be shared across threads.

use std::fmt;
use std::io::Write;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Serialize;
use url::Url;

use crate::auth::{AccessToken, AuthService};
use crate::config::ClientConfig;
use crate::context::Context;
use crate::error::{ApiError, NalogError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::income::IncomeService;
use crate::receipt::ReceiptService;
use crate::transport::{Transport, UreqTransport};
use crate::users::UsersService;

pub const HEADER_ACCEPT: &str = "application/json, text/plain, */*";
pub const HEADER_ACCEPT_LANGUAGE: &str = "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7";
pub const CONTENT_TYPE_JSON: &str = "application/json";

/// Client for the Moy Nalog API.
pub struct NalogClient {
    config: ClientConfig,
    transport: Mutex<Arc<dyn Transport>>,
    access_token: Option<Arc<AccessToken>>,
}

impl NalogClient {
    pub fn new(config: ClientConfig, transport: Arc<dyn Transport>) -> Self {
        Self {
            config,
            transport: Mutex::new(transport),
            access_token: None,
        }
    }

    /// Client over the default blocking HTTP transport.
    pub fn from_config(config: ClientConfig) -> Self {
        Self::new(config, Arc::new(UreqTransport::new()))
    }

    /// A new client sharing this one's configuration and transport that
    /// authenticates every request with `token`.
    pub fn with_access_token(&self, token: impl Into<Arc<AccessToken>>) -> Self {
        Self {
            config: self.config.clone(),
            transport: Mutex::new(self.transport()),
            access_token: Some(token.into()),
        }
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn access_token(&self) -> Option<&AccessToken> {
        self.access_token.as_deref()
    }

    /// A handle to the shared transport.
    pub fn transport(&self) -> Arc<dyn Transport> {
        let guard = self
            .transport
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        Arc::clone(&guard)
    }

    pub fn auth(&self) -> AuthService<'_> {
        AuthService::new(self)
    }

    pub fn users(&self) -> UsersService<'_> {
        UsersService::new(self)
    }

    pub fn income(&self) -> IncomeService<'_> {
        IncomeService::new(self)
    }

    pub fn receipt(&self) -> ReceiptService<'_> {
        ReceiptService::new(self)
    }

    /// Build a request for `path`, relative to the configured base URL.
    ///
    /// The body, when present, is written as JSON without any HTML or
    /// unicode escaping so Cyrillic text reaches the API verbatim.
    pub fn new_request<T>(&self, method: HttpMethod, path: &str, body: Option<&T>) -> Result<HttpRequest>
    where
        T: Serialize + ?Sized,
    {
        let url = self.config.endpoint(path)?;
        let mut request = HttpRequest::new(method, url.as_str());

        if let Some(body) = body {
            let json = serde_json::to_string(body).map_err(|e| NalogError::Serialization(e.to_string()))?;
            request.body = Some(json);
            request.set_header("Content-Type", CONTENT_TYPE_JSON);
        }

        request.set_header("Accept", HEADER_ACCEPT);
        request.set_header("Accept-Language", HEADER_ACCEPT_LANGUAGE);
        if !self.config.user_agent.is_empty() {
            request.set_header("User-Agent", &self.config.user_agent);
        }

        Ok(request)
    }

    /// Send `request` and return the raw response when its status is 2xx.
    ///
    /// A missing context is rejected before anything is sent. When the
    /// context is done before the call or while it runs, the cancellation is
    /// reported instead of the response or transport error.
    pub fn bare_do(&self, ctx: Option<&Context>, request: &HttpRequest) -> Result<HttpResponse> {
        let ctx = ctx.ok_or(NalogError::Context)?;
        if let Some(reason) = ctx.err() {
            return Err(NalogError::Cancelled(reason));
        }

        let request = match &self.access_token {
            Some(token) => request.with_header("Authorization", &format!("Bearer {}", token.token)),
            None => request.clone(),
        };

        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let outcome = self.transport().send(&request, self.call_timeout(ctx));

        // A context that ended during the call overrides its outcome.
        if let Some(reason) = ctx.err() {
            tracing::debug!(url = %request.url, %reason, "context ended during request");
            return Err(NalogError::Cancelled(reason));
        }
        let response = outcome.map_err(|err| NalogError::Transport {
            url: sanitize_url(&err.url),
            message: err.message,
        })?;

        tracing::debug!(status = response.status, bytes = response.body.len(), "received response");
        check_response(&request, response)
    }

    /// Send `request` and decode a successful JSON body into `T`.
    ///
    /// An empty body decodes to `T::default()`.
    pub fn send<T>(&self, ctx: &Context, request: &HttpRequest) -> Result<T>
    where
        T: DeserializeOwned + Default,
    {
        let response = self.bare_do(Some(ctx), request)?;
        decode_body(&response.body)
    }

    /// Send `request` and copy a successful body into `sink` byte for byte.
    pub fn send_raw<W>(&self, ctx: &Context, request: &HttpRequest, sink: &mut W) -> Result<u64>
    where
        W: Write + ?Sized,
    {
        let response = self.bare_do(Some(ctx), request)?;
        sink.write_all(&response.body)?;
        sink.flush()?;
        Ok(response.body.len() as u64)
    }

    fn call_timeout(&self, ctx: &Context) -> Option<Duration> {
        match (self.config.timeout, ctx.remaining()) {
            (Some(configured), Some(remaining)) => Some(configured.min(remaining)),
            (configured, remaining) => configured.or(remaining),
        }
    }
}

impl Clone for NalogClient {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            transport: Mutex::new(self.transport()),
            access_token: self.access_token.clone(),
        }
    }
}

impl Default for NalogClient {
    fn default() -> Self {
        Self::from_config(ClientConfig::default())
    }
}

impl fmt::Debug for NalogClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NalogClient")
            .field("base_url", &self.config.base_url.as_str())
            .field("authenticated", &self.access_token.is_some())
            .finish()
    }
}

/// Map a non-2xx response to `ApiError`; pass 2xx through untouched.
fn check_response(request: &HttpRequest, response: HttpResponse) -> Result<HttpResponse> {
    if response.is_success() {
        return Ok(response);
    }
    tracing::warn!(
        method = %request.method,
        url = %request.url,
        status = response.status,
        "API returned an error status"
    );
    Err(ApiError::from_body(request.method.as_str(), &request.url, response.status, &response.body).into())
}

fn decode_body<T>(body: &[u8]) -> Result<T>
where
    T: DeserializeOwned + Default,
{
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(T::default());
    }
    serde_json::from_slice(body).map_err(|e| NalogError::Deserialization(e.to_string()))
}

/// Re-parse a URL reported by the transport so it is printed in canonical form.
fn sanitize_url(raw: &str) -> String {
    Url::parse(raw)
        .map(|url| url.to_string())
        .unwrap_or_else(|_| raw.to_string())
}
