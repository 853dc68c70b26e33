//! Authentication: methods, token exchange and the auto-auth gate.
//!
//! - [`AuthMethod`] - how to authenticate (`ldap`, `http`, `identity`)
//! - [`Authenticator`] - performs an exchange against the remote API
//! - [`AutoAuthGate`] - pre-run hook logic that obtains or reuses a cached token
//! - [`claims`] - best-effort JWT claim decoding for expiry checks

pub mod claims;
pub mod exchange;
pub mod gate;

pub use exchange::{Authenticator, ExchangeRequest, HttpAuthenticator, MethodInput};
pub use gate::AutoAuthGate;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::client::TransportError;

/// Errors raised while choosing a method or exchanging credentials.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Method name is not one bosun knows how to perform
    #[error("unknown auth method '{0}' (expected one of: ldap, http, identity)")]
    UnknownMethod(String),

    /// No method given by flag or config
    #[error("no auth method configured (use --auto-auth-method or autoauth.enable)")]
    NoMethod,

    /// A setting the method needs is absent
    #[error("missing setting '{key}' for auth method {method}")]
    MissingSetting { method: AuthMethod, key: String },

    /// The server accepted the request but returned no token
    #[error("the server returned an empty token")]
    EmptyToken,

    /// The credential cache could not be updated
    #[error("credential cache error: {0}")]
    Cache(String),

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// How to authenticate against the API.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthMethod {
    /// Username and password checked against an LDAP source
    Ldap,
    /// Username and password checked by a remote HTTP source
    Http,
    /// An existing identity token traded for a new one
    Identity,
}

impl AuthMethod {
    pub const ALL: [AuthMethod; 3] = [AuthMethod::Ldap, AuthMethod::Http, AuthMethod::Identity];

    /// Parse a method name, case-insensitive.
    pub fn parse(s: &str) -> Result<Self, AuthError> {
        match s.trim().to_lowercase().as_str() {
            "ldap" => Ok(AuthMethod::Ldap),
            "http" => Ok(AuthMethod::Http),
            "identity" => Ok(AuthMethod::Identity),
            _ => Err(AuthError::UnknownMethod(s.to_string())),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Ldap => "ldap",
            AuthMethod::Http => "http",
            AuthMethod::Identity => "identity",
        }
    }

    /// `sourceType` sent to the issue endpoint.
    pub fn source_type(&self) -> &'static str {
        match self {
            AuthMethod::Ldap => "LDAP",
            AuthMethod::Http => "HTTP",
            AuthMethod::Identity => "A3S",
        }
    }

    /// Config prefix holding this method's settings (`autoauth.ldap`).
    pub fn config_prefix(&self) -> String {
        format!("autoauth.{}", self.as_str())
    }
}

impl std::fmt::Display for AuthMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for AuthMethod {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Mask a credential for display, keeping the first and last four characters.
/// Short credentials are fully hidden.
pub fn mask_token(token: &str) -> String {
    let chars: Vec<char> = token.chars().collect();
    if chars.len() <= 12 {
        return "...".to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_methods() {
        assert_eq!(AuthMethod::parse("ldap").unwrap(), AuthMethod::Ldap);
        assert_eq!(AuthMethod::parse("HTTP").unwrap(), AuthMethod::Http);
        assert_eq!(" identity ".parse::<AuthMethod>().unwrap(), AuthMethod::Identity);
    }

    #[test]
    fn test_parse_unknown_method() {
        let err = AuthMethod::parse("kerberos").unwrap_err();
        assert!(matches!(err, AuthError::UnknownMethod(ref m) if m == "kerberos"));
        assert!(err.to_string().contains("kerberos"));
    }

    #[test]
    fn test_display_round_trips_all() {
        for method in AuthMethod::ALL {
            assert_eq!(AuthMethod::parse(&method.to_string()).unwrap(), method);
        }
    }

    #[test]
    fn test_source_types() {
        assert_eq!(AuthMethod::Ldap.source_type(), "LDAP");
        assert_eq!(AuthMethod::Http.source_type(), "HTTP");
        assert_eq!(AuthMethod::Identity.source_type(), "A3S");
        assert_eq!(AuthMethod::Ldap.config_prefix(), "autoauth.ldap");
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("abcdefghijklmnopqrstuvwxyz"), "abcd...wxyz");
        assert_eq!(mask_token("abcdefghijklm"), "abcd...jklm");
        assert_eq!(mask_token("abcdefghijkl"), "...");
        assert_eq!(mask_token("short"), "...");
        assert_eq!(mask_token(""), "...");
    }
}
