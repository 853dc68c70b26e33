//! Credential exchange against the API's issue endpoint.
//!
//! ```text
//! POST <api>/issue
//! {"sourceType": "LDAP", "sourceName": "corp", "sourceNamespace": "/acme",
//!  "inputLDAP": {"username": "alice", "password": "..."}}
//! ```
//!
//! The response is a JSON object whose `token` field holds the new credential.

use serde_json::{Map, Value, json};
use tracing::debug;

use super::{AuthError, AuthMethod};
use crate::client::{ApiClient, TransportError};
use crate::config::{
    EffectiveConfig, KEY_API, KEY_AUTOAUTH_AUDIENCE, KEY_AUTOAUTH_VALIDITY, KEY_NAMESPACE,
};

/// Path of the token issuing endpoint.
pub const ISSUE_PATH: &str = "/issue";

/// Performs an authentication exchange. Implemented over HTTP by
/// [`HttpAuthenticator`]; tests substitute their own.
pub trait Authenticator {
    /// Exchange the request's credentials for a new token.
    fn authenticate(&self, request: &ExchangeRequest) -> Result<String, AuthError>;
}

/// Method-specific credentials.
#[derive(Clone, PartialEq, Eq)]
pub enum MethodInput {
    /// Username and password (`ldap`, `http`)
    Credentials { user: String, pass: String },
    /// An existing token (`identity`)
    Token(String),
}

impl std::fmt::Debug for MethodInput {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MethodInput::Credentials { user, .. } => f
                .debug_struct("Credentials")
                .field("user", user)
                .field("pass", &"<redacted>")
                .finish(),
            MethodInput::Token(_) => f.debug_tuple("Token").field(&"<redacted>").finish(),
        }
    }
}

/// Everything needed to perform one exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExchangeRequest {
    pub method: AuthMethod,
    pub api: String,
    pub namespace: Option<String>,
    pub source_name: Option<String>,
    pub source_namespace: Option<String>,
    pub validity: Option<String>,
    pub audience: Vec<String>,
    pub input: MethodInput,
}

impl ExchangeRequest {
    /// Build a request from the `autoauth.<method>` settings.
    pub fn from_config(method: AuthMethod, config: &EffectiveConfig) -> Result<Self, AuthError> {
        let api = config.get_str(KEY_API).ok_or(TransportError::MissingApi)?;
        let prefix = method.config_prefix();
        let setting = |name: &str| config.get_str(&format!("{}.{}", prefix, name));
        let required = |name: &str| {
            setting(name).ok_or_else(|| AuthError::MissingSetting {
                method,
                key: format!("{}.{}", prefix, name),
            })
        };

        let input = match method {
            AuthMethod::Ldap | AuthMethod::Http => MethodInput::Credentials {
                user: required("user")?,
                pass: required("pass")?,
            },
            AuthMethod::Identity => MethodInput::Token(required("token")?),
        };

        Ok(Self {
            method,
            api,
            namespace: config.get_str(KEY_NAMESPACE),
            source_name: setting("source.name"),
            source_namespace: setting("source.namespace"),
            validity: config.get_str(KEY_AUTOAUTH_VALIDITY),
            audience: config.get_list(KEY_AUTOAUTH_AUDIENCE),
            input,
        })
    }

    /// JSON body for the issue endpoint.
    pub fn body(&self) -> Value {
        let mut body = Map::new();
        body.insert("sourceType".into(), json!(self.method.source_type()));
        if let Some(ref name) = self.source_name {
            body.insert("sourceName".into(), json!(name));
        }
        if let Some(ref namespace) = self.source_namespace {
            body.insert("sourceNamespace".into(), json!(namespace));
        }
        if let Some(ref validity) = self.validity {
            body.insert("validity".into(), json!(validity));
        }
        if !self.audience.is_empty() {
            body.insert("audience".into(), json!(self.audience));
        }

        let (field, input) = match (&self.method, &self.input) {
            (AuthMethod::Identity, MethodInput::Token(token)) => {
                ("inputA3S", json!({ "token": token }))
            }
            (_, MethodInput::Token(token)) => ("inputToken", json!({ "token": token })),
            (method, MethodInput::Credentials { user, pass }) => {
                let field = match method {
                    AuthMethod::Ldap => "inputLDAP",
                    _ => "inputHTTP",
                };
                (field, json!({ "username": user, "password": pass }))
            }
        };
        body.insert(field.into(), input);

        Value::Object(body)
    }
}

/// Exchange over HTTP using [`ApiClient`].
#[derive(Debug, Clone, Default)]
pub struct HttpAuthenticator;

impl HttpAuthenticator {
    pub fn new() -> Self {
        Self
    }
}

impl Authenticator for HttpAuthenticator {
    fn authenticate(&self, request: &ExchangeRequest) -> Result<String, AuthError> {
        debug!(method = %request.method, api = %request.api, "requesting token");
        let client = ApiClient::new(&request.api).with_namespace(request.namespace.clone());
        let response = client.post_json(ISSUE_PATH, &request.body())?;

        match response.get("token").and_then(Value::as_str) {
            Some(token) if !token.is_empty() => Ok(token.to_string()),
            _ => Err(AuthError::EmptyToken),
        }
    }
}
