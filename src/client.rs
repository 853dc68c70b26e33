//! Blocking HTTP client for the remote API.
//!
//! Every request carries the namespace (`X-Namespace`) and, when one is
//! available, the bearer credential. Responses are decoded as JSON.

use std::time::Duration;

use serde_json::Value;
use thiserror::Error;

use crate::config::{EffectiveConfig, KEY_API, KEY_NAMESPACE};

/// User-Agent header sent with every request
const USER_AGENT: &str = concat!("bosun/", env!("CARGO_PKG_VERSION"));

/// Per-request timeout
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur while talking to the API.
#[derive(Debug, Error)]
pub enum TransportError {
    /// No API URL configured
    #[error("no api url configured (use --api, BOSUN_API or 'api' in the config file)")]
    MissingApi,

    /// Credential is invalid or expired (401 Unauthorized)
    #[error("unauthorized: the server returned 401")]
    Unauthorized,

    /// Credential lacks required permissions (403 Forbidden)
    #[error("forbidden: the server returned 403")]
    Forbidden,

    /// Any other non-success status
    #[error("HTTP {code}: {body}")]
    Status { code: u16, body: String },

    /// Network or other transport failure
    #[error("request failed: {0}")]
    Request(String),

    /// Failed to parse response
    #[error("failed to parse response: {0}")]
    Parse(String),
}

/// Client bound to one API base URL.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base: String,
    namespace: Option<String>,
    token: Option<String>,
    agent: ureq::Agent,
}

impl ApiClient {
    pub fn new(base: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(USER_AGENT)
            .build();
        Self {
            base: base.trim_end_matches('/').to_string(),
            namespace: None,
            token: None,
            agent,
        }
    }

    /// Build a client from `api` and `namespace` in the effective config.
    pub fn from_config(
        config: &EffectiveConfig,
        credential: Option<&str>,
    ) -> Result<Self, TransportError> {
        let api = config.get_str(KEY_API).ok_or(TransportError::MissingApi)?;
        Ok(Self::new(&api)
            .with_namespace(config.get_str(KEY_NAMESPACE))
            .with_token(credential.map(str::to_string)))
    }

    pub fn with_namespace(mut self, namespace: Option<String>) -> Self {
        self.namespace = namespace.filter(|n| !n.is_empty());
        self
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.token = token.filter(|t| !t.is_empty());
        self
    }

    pub fn base(&self) -> &str {
        &self.base
    }

    /// Join a path onto the base URL.
    pub fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base, path.trim_start_matches('/'))
    }

    pub fn get_json(&self, path: &str) -> Result<Value, TransportError> {
        handle_response(self.request("GET", path).call())
    }

    pub fn post_json(&self, path: &str, body: &Value) -> Result<Value, TransportError> {
        handle_response(self.request("POST", path).send_json(body))
    }

    fn request(&self, method: &str, path: &str) -> ureq::Request {
        let mut request = self
            .agent
            .request(method, &self.url(path))
            .set("Accept", "application/json");
        if let Some(ref namespace) = self.namespace {
            request = request.set("X-Namespace", namespace);
        }
        if let Some(ref token) = self.token {
            request = request.set("Authorization", &format!("Bearer {}", token));
        }
        request
    }
}

fn handle_response(response: Result<ureq::Response, ureq::Error>) -> Result<Value, TransportError> {
    match response {
        Ok(resp) => {
            let body = resp
                .into_string()
                .map_err(|e| TransportError::Parse(e.to_string()))?;
            if body.trim().is_empty() {
                return Ok(Value::Null);
            }
            serde_json::from_str(&body).map_err(|e| TransportError::Parse(e.to_string()))
        }
        Err(ureq::Error::Status(401, _)) => Err(TransportError::Unauthorized),
        Err(ureq::Error::Status(403, _)) => Err(TransportError::Forbidden),
        Err(ureq::Error::Status(code, resp)) => {
            let body = resp.into_string().unwrap_or_default();
            Err(TransportError::Status { code, body })
        }
        Err(e) => Err(TransportError::Request(e.to_string())),
    }
}
