//! Config file selection and loading.
//!
//! ## File precedence (first match wins, lower rules are skipped)
//!
//! 1. `--config <path>` (must exist)
//! 2. `BOSUN_CONFIG` (must exist)
//! 3. Profile `<name>.yaml` / `<name>.yml` on the search path, where the name
//!    comes from `--config-name`, then `BOSUN_CONFIG_NAME`, then `default`
//!
//! ## Search path
//!
//! 1. `$HOME/.config/bosun` (or `BOSUN_CONFIG_DIR`)
//! 2. `/usr/local/etc/bosun`
//! 3. `/etc/bosun`
//!
//! ## Value precedence (highest to lowest)
//!
//! 1. CLI flags (bound by the root pre-run hook)
//! 2. `BOSUN_*` environment variables
//! 3. The selected config file
//! 4. Built-in defaults

use std::fs;
use std::path::{Path, PathBuf};

use serde_yaml::Value;
use tracing::{debug, warn};

use super::env::Environment;
use super::schema::{ConfigLocation, EffectiveConfig, ValueSource};
use crate::{Error, Result};

/// Profile name used when neither flag nor environment names one.
pub const DEFAULT_PROFILE: &str = "default";

/// Extensions tried, in order, for a profile name.
pub const PROFILE_EXTENSIONS: &[&str] = &["yaml", "yml"];

/// Directory name under `$HOME/.config`.
pub const APP_DIR: &str = "bosun";

pub const LOCAL_SYSTEM_CONFIG_DIR: &str = "/usr/local/etc/bosun";
pub const SYSTEM_CONFIG_DIR: &str = "/etc/bosun";

/// Ordered list of directories searched for profile files.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchPaths(Vec<PathBuf>);

impl SearchPaths {
    pub fn new(dirs: Vec<PathBuf>) -> Self {
        Self(dirs)
    }

    /// User directory, then the local system directory, then the system directory.
    pub fn standard(user_dir: &Path) -> Self {
        Self(vec![
            user_dir.to_path_buf(),
            PathBuf::from(LOCAL_SYSTEM_CONFIG_DIR),
            PathBuf::from(SYSTEM_CONFIG_DIR),
        ])
    }

    /// Find the first file for a profile name.
    pub fn find(&self, name: &str) -> Option<PathBuf> {
        self.0.iter().find_map(|dir| {
            PROFILE_EXTENSIONS
                .iter()
                .map(|ext| dir.join(format!("{}.{}", name, ext)))
                .find(|path| path.is_file())
        })
    }
}

impl std::fmt::Display for SearchPaths {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let dirs: Vec<String> = self.0.iter().map(|d| d.display().to_string()).collect();
        write!(f, "{}", dirs.join(", "))
    }
}

/// Every input that can select the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigSources {
    /// Path from `--config`
    pub explicit_path: Option<PathBuf>,
    /// Profile name from `--config-name`
    pub explicit_name: Option<String>,
    /// Path from `BOSUN_CONFIG`
    pub env_path: Option<PathBuf>,
    /// Profile name from `BOSUN_CONFIG_NAME`
    pub env_name: Option<String>,
    /// Directories searched for profile files
    pub search_paths: SearchPaths,
}

impl ConfigSources {
    pub fn new(search_paths: SearchPaths) -> Self {
        Self {
            search_paths,
            ..Default::default()
        }
    }

    /// Set the `--config` path. Empty paths count as unset.
    pub fn with_explicit_path(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_path = path.filter(|p| !p.as_os_str().is_empty());
        self
    }

    /// Set the `--config-name` profile. Empty names count as unset.
    pub fn with_explicit_name(mut self, name: Option<String>) -> Self {
        self.explicit_name = name.filter(|n| !n.is_empty());
        self
    }

    /// Pick up `BOSUN_CONFIG` and `BOSUN_CONFIG_NAME`.
    pub fn with_env(mut self, env: &Environment) -> Self {
        self.env_path = env.config_path();
        self.env_name = env.config_name();
        self
    }
}

/// Decide which single config file is authoritative.
pub fn locate(sources: &ConfigSources) -> Result<ConfigLocation> {
    let explicit = match (&sources.explicit_path, &sources.env_path) {
        (Some(path), _) => Some((path.clone(), false)),
        (None, Some(path)) => Some((path.clone(), true)),
        (None, None) => None,
    };

    if let Some((path, from_env)) = explicit {
        if !path.exists() {
            return Err(Error::ConfigFileMissing(path));
        }
        debug!(path = %path.display(), from_env, "using config file");
        return Ok(ConfigLocation::ExplicitFile { path, from_env });
    }

    let name = match sources.explicit_name.as_deref().or(sources.env_name.as_deref()) {
        Some(name) => {
            debug!(name, "using config name");
            name
        }
        None => {
            debug!("using default config name");
            DEFAULT_PROFILE
        }
    };

    match sources.search_paths.find(name) {
        Some(path) => Ok(ConfigLocation::Profile {
            name: name.to_string(),
            path,
        }),
        None => Err(Error::ProfileNotFound {
            name: name.to_string(),
            searched: sources.search_paths.to_string(),
        }),
    }
}

/// Read and parse the YAML document at a location.
pub fn load(location: &ConfigLocation) -> Result<Value> {
    let path = location.path();
    let content = fs::read_to_string(path).map_err(|source| Error::ConfigRead {
        path: path.to_path_buf(),
        source,
    })?;

    let document: Value = serde_yaml::from_str(&content).map_err(|source| Error::ConfigParse {
        path: path.to_path_buf(),
        source,
    })?;

    match document {
        Value::Null => Ok(Value::Mapping(Default::default())),
        Value::Mapping(_) => Ok(document),
        _ => Err(Error::ConfigNotMapping(path.to_path_buf())),
    }
}

/// Locate, load and layer the configuration.
pub fn resolve(sources: &ConfigSources, env: &Environment) -> Result<EffectiveConfig> {
    let location = locate(sources)?;
    let document = load(&location)?;

    let mut config = EffectiveConfig::with_defaults();
    config.merge_yaml(&document, &ValueSource::File(location.path().to_path_buf()));
    config.overlay_env(env);

    debug!(location = %location, keys = config.len(), "loaded config");
    config.set_location(location);
    Ok(config)
}

/// Config selection flags as given on the command line.
#[derive(Debug, Clone, Default)]
pub struct ConfigFlags {
    pub config: Option<PathBuf>,
    pub config_name: Option<String>,
}

/// Outcome of process-start configuration.
#[derive(Debug, Clone)]
pub struct Bootstrap {
    /// The effective configuration before flag binding
    pub config: EffectiveConfig,
    /// Per-user config directory (home of the credential cache)
    pub config_dir: PathBuf,
    /// True when the config directory could not be created and no file was loaded
    pub degraded: bool,
}

/// Per-user config directory: `BOSUN_CONFIG_DIR`, else `$HOME/.config/bosun`.
pub fn user_config_dir(home: Option<&Path>, env: &Environment) -> Result<PathBuf> {
    if let Some(dir) = env.config_dir() {
        return Ok(dir);
    }
    let home = home.ok_or(Error::HomeDirUnavailable)?;
    Ok(home.join(".config").join(APP_DIR))
}

/// Run the full start-up sequence.
///
/// Fatal failures are returned as errors. Failure to create the per-user
/// config directory is not fatal: it is logged and the returned config holds
/// only defaults and environment values.
pub fn bootstrap(flags: &ConfigFlags, env: &Environment, home: Option<&Path>) -> Result<Bootstrap> {
    let config_dir = user_config_dir(home, env)?;

    if !config_dir.exists() {
        if let Err(err) = fs::create_dir_all(&config_dir) {
            warn!(path = %config_dir.display(), error = %err, "failed to create config directory");
            let mut config = EffectiveConfig::with_defaults();
            config.overlay_env(env);
            return Ok(Bootstrap {
                config,
                config_dir,
                degraded: true,
            });
        }
        debug!(path = %config_dir.display(), "created config directory");
    }

    let sources = ConfigSources::new(SearchPaths::standard(&config_dir))
        .with_explicit_path(flags.config.clone())
        .with_explicit_name(flags.config_name.clone())
        .with_env(env);

    let config = resolve(&sources, env)?;
    Ok(Bootstrap {
        config,
        config_dir,
        degraded: false,
    })
}
