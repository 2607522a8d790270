//! HTTP transport seam.
//!
//! # Design
//! The client never opens sockets itself. It hands a fully built
//! `HttpRequest` to a `Transport` and gets back an `HttpResponse` whose body
//! has already been read to the end, so no response stream outlives the call.
//! `UreqTransport` is the default implementation; tests substitute an
//! in-memory one.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// A network level failure: DNS, connect, TLS, timeout, or a broken body read.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TransportError {
    /// URL the request was sent to, as reported by the underlying client.
    pub url: String,
    pub message: String,
}

/// Executes one HTTP round-trip.
///
/// Implementations must be safe to share between threads and must return
/// non-2xx responses as `Ok`, leaving status interpretation to the client.
pub trait Transport: Send + Sync + fmt::Debug {
    fn send(&self, request: &HttpRequest, timeout: Option<Duration>) -> Result<HttpResponse, TransportError>;
}

/// Blocking transport over a pooled `ureq::Agent`.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        // Status interpretation is the client's job, so 4xx/5xx come back as data.
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    pub fn from_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest, timeout: Option<Duration>) -> Result<HttpResponse, TransportError> {
        let fail = |e: ureq::Error| TransportError {
            url: request.url.clone(),
            message: e.to_string(),
        };

        let result = match request.method {
            HttpMethod::Get => {
                let mut builder = self.agent.get(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.config().timeout_global(timeout).build().call()
            }
            HttpMethod::Post => {
                let mut builder = self.agent.post(&request.url);
                for (name, value) in &request.headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                let builder = builder.config().timeout_global(timeout).build();
                match &request.body {
                    Some(body) => builder.send(body.as_bytes()),
                    None => builder.send_empty(),
                }
            }
        };

        let mut response = result.map_err(fail)?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response.body_mut().read_to_vec().map_err(fail)?;

        Ok(HttpResponse { status, headers, body })
    }
}
