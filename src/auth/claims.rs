//! Best-effort JWT claim decoding.
//!
//! Signatures are not verified; claims are only used to decide whether a
//! cached token has expired and to display what a token says about itself.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};

/// Decoded payload of a JWT.
#[derive(Debug, Clone, PartialEq)]
pub struct Claims(Map<String, Value>);

impl Claims {
    /// Expiration time from the `exp` claim.
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        let exp = self.0.get("exp")?;
        let secs = exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64))?;
        DateTime::from_timestamp(secs, 0)
    }

    /// Subject from the `sub` claim.
    pub fn subject(&self) -> Option<&str> {
        self.0.get("sub").and_then(Value::as_str)
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// True when `exp` is present and not after `now`.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at().is_some_and(|exp| exp <= now)
    }
}

/// Decode the payload of a JWT. Returns `None` for anything that is not a
/// three-part token with a JSON object payload.
pub fn decode(token: &str) -> Option<Claims> {
    let mut parts = token.split('.');
    let (_header, payload, _signature) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    match serde_json::from_slice(&bytes).ok()? {
        Value::Object(map) => Some(Claims(map)),
        _ => None,
    }
}

/// Build an unsigned JWT with the given claims.
#[cfg(test)]
pub(crate) fn fake_jwt(claims: &Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{}.{}.sig", header, payload)
}
