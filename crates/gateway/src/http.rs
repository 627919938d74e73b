//! HTTP control plane gateway.
//!
//! Resources are addressed by their canonical identity appended to the
//! endpoint, ARM style:
//!
//! ```text
//! GET    {endpoint}{identity}?api-version={version}
//! PUT    {endpoint}{identity}?api-version={version}   {"properties": {...}}
//! DELETE {endpoint}{identity}?api-version={version}
//! ```
//!
//! A 404 is absence, never an error. Status codes map onto
//! [`GatewayError`] so the caller's retry policy can tell transient failures
//! from rejections.

use crate::wire;
use reconcile::{
    BackendGateway, GatewayError, OperationContext, ResourceIdentity, ResourceRecord,
};
use serde_json::{Value, json};
use std::time::Duration;
use ureq::http::Response;
use ureq::{Agent, Body};

/// Maximum response size accepted from the control plane.
const MAX_BODY_SIZE: u64 = 10 * 1024 * 1024;

/// Settings for [`HttpGateway`].
#[derive(Debug, Clone)]
pub struct HttpConfig {
    /// Base URL, without trailing slash
    pub endpoint: String,
    /// Value of the `api-version` query parameter, if the backend wants one
    pub api_version: Option<String>,
    /// Bearer token sent with every request
    pub token: Option<String>,
    /// Timeout for a whole request
    pub timeout: Duration,
}

impl HttpConfig {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            api_version: None,
            token: None,
            timeout: Duration::from_secs(60),
        }
    }
}

/// Gateway speaking JSON over HTTP.
///
/// # Example
///
/// ```no_run
/// use gateway::{HttpConfig, HttpGateway};
///
/// let mut config = HttpConfig::new("https://management.example.com");
/// config.api_version = Some("2022-08-01".into());
/// let gateway = HttpGateway::new(config);
/// ```
pub struct HttpGateway {
    agent: Agent,
    config: HttpConfig,
}

impl HttpGateway {
    #[must_use]
    pub fn new(config: HttpConfig) -> Self {
        let agent: Agent = Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(Some(config.timeout))
            .build()
            .into();
        Self { agent, config }
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    /// URL of a resource.
    pub fn url(&self, id: &ResourceIdentity) -> String {
        let path = id.format();
        let separator = if path.starts_with('/') { "" } else { "/" };
        match &self.config.api_version {
            Some(version) => format!(
                "{}{separator}{path}?api-version={version}",
                self.config.endpoint
            ),
            None => format!("{}{separator}{path}", self.config.endpoint),
        }
    }

    fn authorization(&self) -> Option<String> {
        self.config.token.as_ref().map(|t| format!("Bearer {t}"))
    }

    /// Turn a response body into a record, canonicalizing the echoed id.
    fn decode(
        &self,
        requested: &ResourceIdentity,
        mut response: Response<Body>,
    ) -> Result<ResourceRecord, GatewayError> {
        let etag = response
            .headers()
            .get("etag")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let body: Value = response
            .body_mut()
            .with_config()
            .limit(MAX_BODY_SIZE)
            .read_json()
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let identity = match body.get("id").and_then(Value::as_str) {
            Some(echoed) => requested.reparse(echoed).unwrap_or_else(|e| {
                log::warn!("ignoring unrecognized id in response: {e}");
                requested.clone()
            }),
            None => requested.clone(),
        };

        let mut fields = body
            .get("properties")
            .and_then(Value::as_object)
            .map(wire::json_to_fields)
            .unwrap_or_default();
        let etag = etag.or_else(|| body.get("etag").and_then(Value::as_str).map(str::to_string));
        if let Some(etag) = etag {
            fields.insert("etag".to_string(), etag.into());
        }

        Ok(ResourceRecord::with_fields(identity, fields))
    }
}

impl BackendGateway for HttpGateway {
    fn fetch(
        &self,
        ctx: &OperationContext,
        id: &ResourceIdentity,
    ) -> Result<Option<ResourceRecord>, GatewayError> {
        ctx.check()?;
        let url = self.url(id);
        log::debug!("GET {url}");

        let mut request = self.agent.get(&url).header("Accept", "application/json");
        if let Some(auth) = self.authorization() {
            request = request.header("Authorization", auth);
        }
        let response = request.call().map_err(transport_error)?;

        match response.status().as_u16() {
            404 => Ok(None),
            200..=299 => self.decode(id, response).map(Some),
            status => Err(status_error(status, response)),
        }
    }

    fn put(
        &self,
        ctx: &OperationContext,
        id: &ResourceIdentity,
        desired: &ResourceRecord,
    ) -> Result<ResourceRecord, GatewayError> {
        ctx.check()?;
        let url = self.url(id);
        log::debug!("PUT {url}");

        let body = json!({ "properties": wire::fields_to_json(desired.fields()) });
        let mut request = self.agent.put(&url).header("Accept", "application/json");
        if let Some(auth) = self.authorization() {
            request = request.header("Authorization", auth);
        }
        let response = request.send_json(&body).map_err(transport_error)?;

        match response.status().as_u16() {
            200..=299 => self.decode(id, response),
            status => Err(status_error(status, response)),
        }
    }

    fn remove(&self, ctx: &OperationContext, id: &ResourceIdentity) -> Result<bool, GatewayError> {
        ctx.check()?;
        let url = self.url(id);
        log::debug!("DELETE {url}");

        let mut request = self.agent.delete(&url);
        if let Some(auth) = self.authorization() {
            request = request.header("Authorization", auth);
        }
        let response = request.call().map_err(transport_error)?;

        // 204 is how ARM-style planes answer a delete of nothing
        match response.status().as_u16() {
            204 | 404 => Ok(false),
            200..=299 => Ok(true),
            status => Err(status_error(status, response)),
        }
    }
}

fn transport_error(err: ureq::Error) -> GatewayError {
    match err {
        ureq::Error::Timeout(_) => GatewayError::transport(format!("request timed out: {err}")),
        other => GatewayError::transport(other.to_string()),
    }
}

/// Map a non-success status onto the gateway error taxonomy.
fn status_error(status: u16, mut response: Response<Body>) -> GatewayError {
    let text = response
        .body_mut()
        .with_config()
        .limit(MAX_BODY_SIZE)
        .read_to_string()
        .unwrap_or_default();
    classify_status(status, &text)
}

fn classify_status(status: u16, body: &str) -> GatewayError {
    let message = error_message(body).unwrap_or_else(|| format!("HTTP {status}"));
    match status {
        401 | 403 => GatewayError::Auth { message },
        408 | 429 | 500..=599 => GatewayError::Transport {
            message: format!("HTTP {status}: {message}"),
        },
        _ => GatewayError::Remote { status, message },
    }
}

/// Pull `error.message` (or `message`) out of a JSON error body.
fn error_message(body: &str) -> Option<String> {
    let value: Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .or_else(|| value.get("message"))
        .and_then(Value::as_str)
        .map(str::to_string)
}
