//! Snapshot of the process environment used during configuration resolution.
//!
//! Resolution never reads `std::env` directly; it works from an
//! [`Environment`] captured once in `main`, which keeps the resolver
//! testable without mutating the process environment.

use std::collections::HashMap;
use std::path::PathBuf;

/// Prefix shared by every environment variable bosun reads.
pub const ENV_PREFIX: &str = "BOSUN";

/// Explicit config file path.
pub const CONFIG_PATH_ENV: &str = "BOSUN_CONFIG";

/// Profile name looked up on the search path.
pub const CONFIG_NAME_ENV: &str = "BOSUN_CONFIG_NAME";

/// Overrides the per-user config directory (`$HOME/.config/bosun`).
pub const CONFIG_DIR_ENV: &str = "BOSUN_CONFIG_DIR";

/// Map a config key to its environment variable name.
///
/// `auto-auth-method` becomes `BOSUN_AUTO_AUTH_METHOD` and `autoauth.enable`
/// becomes `BOSUN_AUTOAUTH_ENABLE`.
pub fn env_key(key: &str) -> String {
    format!(
        "{}_{}",
        ENV_PREFIX,
        key.to_uppercase().replace(['-', '.'], "_")
    )
}

/// Immutable view of environment variables.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    vars: HashMap<String, String>,
}

impl Environment {
    /// Capture the current process environment. Non-UTF-8 entries are skipped.
    pub fn capture() -> Self {
        let vars = std::env::vars_os()
            .filter_map(|(k, v)| Some((k.into_string().ok()?, v.into_string().ok()?)))
            .collect();
        Self { vars }
    }

    /// Build an environment from explicit pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            vars: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Get a variable. Empty values count as unset.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars
            .get(name)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }

    /// Look up the environment binding for a config key.
    ///
    /// Returns the variable name alongside its value.
    pub fn lookup_key(&self, key: &str) -> Option<(String, &str)> {
        let name = env_key(key);
        let value = self.get(&name)?;
        Some((name, value))
    }

    /// Explicit config file path from `BOSUN_CONFIG`.
    pub fn config_path(&self) -> Option<PathBuf> {
        self.get(CONFIG_PATH_ENV).map(PathBuf::from)
    }

    /// Profile name from `BOSUN_CONFIG_NAME`.
    pub fn config_name(&self) -> Option<String> {
        self.get(CONFIG_NAME_ENV).map(str::to_string)
    }

    /// Per-user config directory override from `BOSUN_CONFIG_DIR`.
    pub fn config_dir(&self) -> Option<PathBuf> {
        self.get(CONFIG_DIR_ENV).map(PathBuf::from)
    }
}
