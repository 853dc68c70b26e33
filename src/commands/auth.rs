//! `bosun auth` command bodies.
//!
//! These run without the auto-auth gate: they manage the same cache the gate
//! reads and would otherwise be unable to recover from a broken credential.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use tracing::warn;

use super::CommandResult;
use crate::auth::{AuthError, AuthMethod, Authenticator, AutoAuthGate, ExchangeRequest, claims, mask_token};
use crate::cache::{CacheKey, CredentialCache};
use crate::config::{EffectiveConfig, KEY_TOKEN};
use crate::{Error, Result};

fn require_method(config: &EffectiveConfig, method_override: Option<&str>) -> Result<AuthMethod> {
    AutoAuthGate::effective_method(config, method_override)?.ok_or(Error::Auth(AuthError::NoMethod))
}

// ==================== issue ====================

/// Result of `bosun auth issue`.
#[derive(Debug, Serialize)]
pub struct IssueResult {
    pub method: AuthMethod,
    pub token: String,
    pub cached: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl CommandResult for IssueResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let mut lines = vec![self.token.clone()];
        let mut info = format!("issued via {}", self.method);
        if let Some(exp) = self.expires_at {
            info.push_str(&format!(", expires {}", exp.format("%Y-%m-%d %H:%M:%S UTC")));
        }
        if !self.cached {
            info.push_str(" (not cached)");
        }
        lines.push(info);
        lines.join("\n")
    }
}

/// Exchange credentials for a new token, caching it unless `no_cache`.
pub fn issue(
    config: &EffectiveConfig,
    method_override: Option<&str>,
    cache: &dyn CredentialCache,
    authenticator: &dyn Authenticator,
    no_cache: bool,
) -> Result<IssueResult> {
    let method = require_method(config, method_override)?;
    let request = ExchangeRequest::from_config(method, config)?;
    let token = authenticator.authenticate(&request)?;

    let cached = if no_cache {
        false
    } else {
        match cache.put(&CacheKey::for_config(method, config), &token) {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "unable to cache token");
                false
            }
        }
    };

    let expires_at = claims::decode(&token).and_then(|c| c.expires_at());
    Ok(IssueResult {
        method,
        token,
        cached,
        expires_at,
    })
}

// ==================== check ====================

/// Where the inspected credential came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CredentialOrigin {
    /// `--token`, `BOSUN_TOKEN` or `token` in the config file
    Config,
    Cache,
}

/// Result of `bosun auth check`.
#[derive(Debug, Serialize)]
pub struct CheckResult {
    pub authenticated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub origin: Option<CredentialOrigin>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<AuthMethod>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    pub expired: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub claims: Option<Map<String, Value>>,
}

impl CheckResult {
    fn none(method: Option<AuthMethod>) -> Self {
        Self {
            authenticated: false,
            origin: None,
            method,
            token: None,
            subject: None,
            expires_at: None,
            expired: false,
            claims: None,
        }
    }

    fn from_token(origin: CredentialOrigin, method: Option<AuthMethod>, token: &str) -> Self {
        let decoded = claims::decode(token);
        let expires_at = decoded.as_ref().and_then(|c| c.expires_at());
        let expired = decoded.as_ref().is_some_and(|c| c.is_expired(Utc::now()));
        Self {
            authenticated: !expired,
            origin: Some(origin),
            method,
            token: Some(mask_token(token)),
            subject: decoded.as_ref().and_then(|c| c.subject().map(str::to_string)),
            expires_at,
            expired,
            claims: decoded.map(|c| c.as_map().clone()),
        }
    }
}

impl CommandResult for CheckResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        let Some(ref token) = self.token else {
            return match self.method {
                Some(method) => format!("No cached token for {}.", method),
                None => "No token configured and auto-auth is disabled.".to_string(),
            };
        };

        let origin = match self.origin {
            Some(CredentialOrigin::Config) => "config".to_string(),
            Some(CredentialOrigin::Cache) => match self.method {
                Some(method) => format!("cache ({})", method),
                None => "cache".to_string(),
            },
            None => "unknown".to_string(),
        };
        let mut lines = vec![format!("Token: {} (from {})", token, origin)];
        if let Some(ref sub) = self.subject {
            lines.push(format!("Subject: {}", sub));
        }
        match self.expires_at {
            Some(exp) if self.expired => {
                lines.push(format!("Expired: {}", exp.format("%Y-%m-%d %H:%M:%S UTC")))
            }
            Some(exp) => lines.push(format!("Expires: {}", exp.format("%Y-%m-%d %H:%M:%S UTC"))),
            None => lines.push("Expires: unknown".to_string()),
        }
        lines.join("\n")
    }
}

/// Inspect the credential an API command would use, without exchanging.
pub fn check(
    config: &EffectiveConfig,
    method_override: Option<&str>,
    cache: &dyn CredentialCache,
) -> Result<CheckResult> {
    let method = AutoAuthGate::effective_method(config, method_override)?;

    if let Some(token) = config.get_str(KEY_TOKEN) {
        return Ok(CheckResult::from_token(CredentialOrigin::Config, method, &token));
    }

    let Some(method) = method else {
        return Ok(CheckResult::none(None));
    };

    match cache.get(&CacheKey::for_config(method, config))? {
        Some(cached) => Ok(CheckResult::from_token(
            CredentialOrigin::Cache,
            Some(method),
            &cached.token,
        )),
        None => Ok(CheckResult::none(Some(method))),
    }
}

// ==================== clear ====================

/// Result of `bosun auth clear`.
#[derive(Debug, Serialize)]
pub struct ClearResult {
    pub removed: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<AuthMethod>,
}

impl CommandResult for ClearResult {
    fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    fn to_human(&self) -> String {
        match (self.removed, self.method) {
            (0, _) => "No cached tokens to remove.".to_string(),
            (1, Some(method)) => format!("Removed cached {} token.", method),
            (n, _) => format!("Removed {} cached token(s).", n),
        }
    }
}

/// Remove the cached token for the effective method, or every token.
pub fn clear(
    config: &EffectiveConfig,
    method_override: Option<&str>,
    cache: &dyn CredentialCache,
    all: bool,
) -> Result<ClearResult> {
    if all {
        let removed = cache.clear()?;
        return Ok(ClearResult {
            removed,
            method: None,
        });
    }

    let method = require_method(config, method_override)?;
    let removed = cache.invalidate(&CacheKey::for_config(method, config))?;
    Ok(ClearResult {
        removed: usize::from(removed),
        method: Some(method),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::claims::fake_jwt;
    use crate::cache::MemoryCredentialCache;
    use crate::config::ValueSource;
    use chrono::Duration;
    use serde_json::json;
    use std::cell::Cell;

    struct StaticAuthenticator {
        token: String,
        calls: Cell<usize>,
    }

    impl StaticAuthenticator {
        fn new(token: &str) -> Self {
            Self {
                token: token.to_string(),
                calls: Cell::new(0),
            }
        }
    }

    impl Authenticator for StaticAuthenticator {
        fn authenticate(&self, _request: &ExchangeRequest) -> std::result::Result<String, AuthError> {
            self.calls.set(self.calls.get() + 1);
            Ok(self.token.clone())
        }
    }

    fn config_from(yaml: &str) -> EffectiveConfig {
        let mut config = EffectiveConfig::with_defaults();
        config.merge_yaml(
            &serde_yaml::from_str(yaml).unwrap(),
            &ValueSource::File("/c.yaml".into()),
        );
        config
    }

    fn ldap_config() -> EffectiveConfig {
        config_from("api: https://api\nautoauth:\n  enable: ldap\n  ldap: {user: a, pass: b}")
    }

    fn ldap_key() -> CacheKey {
        CacheKey::new(AuthMethod::Ldap, "https://api#")
    }

    // ==================== issue ====================

    #[test]
    fn test_issue_caches_token() {
        let cache = MemoryCredentialCache::new();
        let auth = StaticAuthenticator::new("new-token");

        let result = issue(&ldap_config(), None, &cache, &auth, false).unwrap();

        assert_eq!(result.token, "new-token");
        assert!(result.cached);
        assert_eq!(cache.get(&ldap_key()).unwrap().unwrap().token, "new-token");
    }

    #[test]
    fn test_issue_no_cache() {
        let cache = MemoryCredentialCache::new();
        let auth = StaticAuthenticator::new("new-token");

        let result = issue(&ldap_config(), None, &cache, &auth, true).unwrap();

        assert!(!result.cached);
        assert!(cache.get(&ldap_key()).unwrap().is_none());
        assert!(result.to_human().contains("(not cached)"));
    }

    #[test]
    fn test_issue_without_method() {
        let cache = MemoryCredentialCache::new();
        let auth = StaticAuthenticator::new("t");

        let err = issue(&config_from("api: https://api"), None, &cache, &auth, false).unwrap_err();

        assert!(matches!(err, Error::Auth(AuthError::NoMethod)));
        assert_eq!(auth.calls.get(), 0);
    }

    #[test]
    fn test_issue_reports_jwt_expiry() {
        let exp = (Utc::now() + Duration::hours(1)).timestamp();
        let cache = MemoryCredentialCache::new();
        let auth = StaticAuthenticator::new(&fake_jwt(&json!({"exp": exp})));

        let result = issue(&ldap_config(), None, &cache, &auth, false).unwrap();

        assert_eq!(result.expires_at.unwrap().timestamp(), exp);
    }

    // ==================== check ====================

    #[test]
    fn test_check_disabled() {
        let cache = MemoryCredentialCache::new();
        let result = check(&config_from("api: https://api"), None, &cache).unwrap();
        assert!(!result.authenticated);
        assert_eq!(result.to_json(), r#"{"authenticated":false,"expired":false}"#);
    }

    #[test]
    fn test_check_cached_jwt() {
        let cache = MemoryCredentialCache::new();
        let token = fake_jwt(&json!({"sub": "alice", "exp": 4_000_000_000i64}));
        cache.put(&ldap_key(), &token).unwrap();

        let result = check(&ldap_config(), None, &cache).unwrap();

        assert!(result.authenticated);
        assert_eq!(result.origin, Some(CredentialOrigin::Cache));
        assert_eq!(result.subject.as_deref(), Some("alice"));
        assert_ne!(result.token.as_deref(), Some(token.as_str()));
        assert!(result.to_human().contains("Subject: alice"));
    }

    #[test]
    fn test_check_expired_cached_token() {
        let cache = MemoryCredentialCache::new();
        let token = fake_jwt(&json!({"exp": (Utc::now() - Duration::minutes(1)).timestamp()}));
        cache.put(&ldap_key(), &token).unwrap();

        let result = check(&ldap_config(), None, &cache).unwrap();

        assert!(!result.authenticated);
        assert!(result.expired);
        assert!(result.to_human().contains("Expired:"));
    }

    #[test]
    fn test_check_prefers_configured_token() {
        let cache = MemoryCredentialCache::new();
        cache.put(&ldap_key(), "cached-token-value").unwrap();
        let mut config = ldap_config();
        config.layer(KEY_TOKEN, "explicit-token-value".into(), ValueSource::CliFlag);

        let result = check(&config, None, &cache).unwrap();

        assert_eq!(result.origin, Some(CredentialOrigin::Config));
        assert_eq!(result.token.as_deref(), Some("expl...alue"));
    }

    #[test]
    fn test_check_miss() {
        let cache = MemoryCredentialCache::new();
        let result = check(&ldap_config(), None, &cache).unwrap();
        assert!(!result.authenticated);
        assert_eq!(result.to_human(), "No cached token for ldap.");
    }

    // ==================== clear ====================

    #[test]
    fn test_clear_current_method() {
        let cache = MemoryCredentialCache::new();
        cache.put(&ldap_key(), "t").unwrap();
        let http_key = CacheKey::new(AuthMethod::Http, "https://api#");
        cache.put(&http_key, "t2").unwrap();

        let result = clear(&ldap_config(), None, &cache, false).unwrap();

        assert_eq!(result.removed, 1);
        assert!(cache.get(&ldap_key()).unwrap().is_none());
        assert!(cache.get(&http_key).unwrap().is_some());
        assert_eq!(result.to_human(), "Removed cached ldap token.");
    }

    #[test]
    fn test_clear_all() {
        let cache = MemoryCredentialCache::new();
        cache.put(&ldap_key(), "t").unwrap();
        cache.put(&CacheKey::new(AuthMethod::Http, "x"), "t2").unwrap();

        let result = clear(&config_from("{}"), None, &cache, true).unwrap();

        assert_eq!(result.removed, 2);
        assert_eq!(result.to_json(), r#"{"removed":2}"#);
    }

    #[test]
    fn test_clear_without_method() {
        let cache = MemoryCredentialCache::new();
        let err = clear(&config_from("{}"), None, &cache, false).unwrap_err();
        assert!(matches!(err, Error::Auth(AuthError::NoMethod)));
    }
}
