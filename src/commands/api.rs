//! `bosun api` command bodies.

use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::CommandResult;
use crate::client::ApiClient;
use crate::config::EffectiveConfig;
use crate::{Error, Result};

/// Body returned by the API plus the path it came from.
#[derive(Debug, Clone, Serialize)]
pub struct ApiResponse {
    pub path: String,
    pub body: Value,
}

impl CommandResult for ApiResponse {
    fn to_json(&self) -> String {
        serde_json::to_string(&self.body).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        match &self.body {
            Value::Array(items) if items.is_empty() => format!("No objects at {}.", self.path),
            Value::Array(items) => {
                let mut lines = vec![format!("{} object(s) at {}:", items.len(), self.path)];
                for item in items {
                    lines.push(format!("  {}", summarize(item)));
                }
                lines.join("\n")
            }
            Value::Null => format!("{}: empty response", self.path),
            other => serde_json::to_string_pretty(other).unwrap_or_default(),
        }
    }
}

/// One-line summary of an object: its ID and name when it has them.
fn summarize(item: &Value) -> String {
    let field = |name: &str| item.get(name).and_then(Value::as_str);
    match (field("ID").or(field("id")), field("name")) {
        (Some(id), Some(name)) => format!("{}  {}", id, name),
        (Some(id), None) => id.to_string(),
        (None, Some(name)) => name.to_string(),
        (None, None) => item.to_string(),
    }
}

fn validate_segment(kind: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() || value.contains('/') {
        return Err(Error::InvalidInput(format!(
            "{} must be a non-empty name without '/': '{}'",
            kind, value
        )));
    }
    Ok(())
}

/// `GET <api>/<resource>`
pub fn list(config: &EffectiveConfig, credential: Option<&str>, resource: &str) -> Result<ApiResponse> {
    validate_segment("resource", resource)?;
    let client = ApiClient::from_config(config, credential)?;
    let path = format!("/{}", resource);
    debug!(url = %client.url(&path), "listing");
    let body = client.get_json(&path)?;
    Ok(ApiResponse { path, body })
}

/// `GET <api>/<resource>/<id>`
pub fn get(
    config: &EffectiveConfig,
    credential: Option<&str>,
    resource: &str,
    id: &str,
) -> Result<ApiResponse> {
    validate_segment("resource", resource)?;
    validate_segment("id", id)?;
    let client = ApiClient::from_config(config, credential)?;
    let path = format!("/{}/{}", resource, id);
    debug!(url = %client.url(&path), "getting");
    let body = client.get_json(&path)?;
    Ok(ApiResponse { path, body })
}
