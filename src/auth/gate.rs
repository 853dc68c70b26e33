//! The auto-auth gate run before every API command.
//!
//! Decision sequence:
//!
//! 1. Method: `--auto-auth-method` if set, else `autoauth.enable`. Neither set
//!    means auto-auth is disabled and the gate does nothing.
//! 2. An explicitly configured `token` is used as-is.
//! 3. `--refresh-cached-token` invalidates the cache entry before any read.
//! 4. A cached, unexpired token short-circuits.
//! 5. Otherwise one exchange is performed and its token cached.
//!
//! Failures are returned as [`Error::AutoAuth`] and are never retried.

use chrono::Utc;
use tracing::{debug, info, warn};

use super::exchange::{Authenticator, ExchangeRequest};
use super::{AuthError, AuthMethod};
use crate::cache::{CacheKey, CredentialCache};
use crate::config::{EffectiveConfig, KEY_AUTOAUTH_ENABLE, KEY_TOKEN};
use crate::{Error, Result};

/// Gate over a credential cache and an exchange capability.
pub struct AutoAuthGate<'a> {
    cache: &'a dyn CredentialCache,
    authenticator: &'a dyn Authenticator,
}

impl<'a> AutoAuthGate<'a> {
    pub fn new(cache: &'a dyn CredentialCache, authenticator: &'a dyn Authenticator) -> Self {
        Self {
            cache,
            authenticator,
        }
    }

    /// Method in effect: the override replaces the configured default entirely.
    pub fn effective_method(
        config: &EffectiveConfig,
        method_override: Option<&str>,
    ) -> std::result::Result<Option<AuthMethod>, AuthError> {
        let name = method_override
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(str::to_string)
            .or_else(|| config.get_str(KEY_AUTOAUTH_ENABLE));

        name.map(|n| AuthMethod::parse(&n)).transpose()
    }

    /// Make sure a credential is available for the command about to run.
    ///
    /// Returns the credential, or `None` when auto-auth is disabled.
    pub fn ensure_authenticated(
        &self,
        config: &EffectiveConfig,
        method_override: Option<&str>,
        force_refresh: bool,
    ) -> Result<Option<String>> {
        let Some(method) = Self::effective_method(config, method_override).map_err(Error::AutoAuth)?
        else {
            debug!("auto-auth disabled");
            return Ok(None);
        };

        if let Some(token) = config.get_str(KEY_TOKEN) {
            debug!(method = %method, "explicit token configured, skipping auto-auth");
            return Ok(Some(token));
        }

        let key = CacheKey::for_config(method, config);

        if force_refresh {
            self.cache
                .invalidate(&key)
                .map_err(|e| Error::AutoAuth(AuthError::Cache(e.to_string())))?;
        }

        match self.cache.get(&key) {
            Ok(Some(cached)) if !cached.is_expired(Utc::now()) => {
                debug!(method = %method, token = %cached.masked(), "using cached token");
                return Ok(Some(cached.token));
            }
            Ok(Some(_)) => debug!(method = %method, "cached token expired"),
            Ok(None) => debug!(method = %method, "no cached token"),
            Err(e) => warn!(error = %e, "unable to read credential cache"),
        }

        let request = ExchangeRequest::from_config(method, config).map_err(Error::AutoAuth)?;
        let token = self
            .authenticator
            .authenticate(&request)
            .map_err(Error::AutoAuth)?;
        info!(method = %method, "obtained new token");

        if let Err(e) = self.cache.put(&key, &token) {
            warn!(error = %e, "unable to cache token");
        }

        Ok(Some(token))
    }
}
