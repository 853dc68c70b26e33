//! Configuration resolution for Bosun.
//!
//! The effective configuration of one invocation is assembled from layers:
//!
//! - **Defaults** built into the binary (`log-level: warn`)
//! - **File**: exactly one YAML file, chosen by [`resolver::locate`]
//! - **Environment**: `BOSUN_*` variables, keys uppercased with `-`/`.` as `_`
//! - **Flags**: bound into the config by the root pre-run hook
//!
//! Files live in `$HOME/.config/bosun`, `/usr/local/etc/bosun` or
//! `/etc/bosun` and are selected by profile name, unless `--config` or
//! `BOSUN_CONFIG` names one directly.
//!
//! Use [`bootstrap`] at process start; it creates the per-user directory and
//! returns the resolved [`EffectiveConfig`].

pub mod env;
pub mod resolver;
pub mod schema;

pub use env::{CONFIG_DIR_ENV, CONFIG_NAME_ENV, CONFIG_PATH_ENV, ENV_PREFIX, Environment, env_key};
pub use resolver::{
    Bootstrap, ConfigFlags, ConfigSources, DEFAULT_PROFILE, SearchPaths, bootstrap, load, locate,
    resolve, user_config_dir,
};
pub use schema::{
    ConfigLocation, EffectiveConfig, KEY_API, KEY_AUTO_AUTH_METHOD, KEY_AUTOAUTH_AUDIENCE,
    KEY_AUTOAUTH_ENABLE, KEY_AUTOAUTH_VALIDITY, KEY_CONFIG, KEY_CONFIG_NAME, KEY_LOG_LEVEL,
    KEY_NAMESPACE, KEY_REFRESH_CACHED_TOKEN, KEY_TOKEN, Resolved, ValueSource,
};
