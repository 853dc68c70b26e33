//! Effective configuration store and the keys bosun understands.
//!
//! [`EffectiveConfig`] is a flat, ordered map from dotted lowercase keys
//! (`autoauth.ldap.user`) to YAML values. Every entry remembers the layer it
//! came from, and a write from a lower-ranked layer never replaces a value
//! from a higher-ranked one:
//!
//! `Default < File < EnvVar < CliFlag`
//!
//! ```yaml
//! api: https://api.example.com
//! namespace: /acme
//! autoauth:
//!   enable: ldap
//!   ldap:
//!     user: alice
//!     pass: secret
//!     source:
//!       name: corp
//!       namespace: /acme
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde_yaml::Value;

use super::env::Environment;

pub const KEY_CONFIG: &str = "config";
pub const KEY_CONFIG_NAME: &str = "config-name";
pub const KEY_LOG_LEVEL: &str = "log-level";
pub const KEY_REFRESH_CACHED_TOKEN: &str = "refresh-cached-token";
pub const KEY_AUTO_AUTH_METHOD: &str = "auto-auth-method";
pub const KEY_API: &str = "api";
pub const KEY_NAMESPACE: &str = "namespace";
pub const KEY_TOKEN: &str = "token";
pub const KEY_AUTOAUTH_ENABLE: &str = "autoauth.enable";
pub const KEY_AUTOAUTH_VALIDITY: &str = "autoauth.validity";
pub const KEY_AUTOAUTH_AUDIENCE: &str = "autoauth.audience";

/// Keys that may be supplied from the environment even when the config file
/// does not mention them.
pub const ENV_BOUND_KEYS: &[&str] = &[
    KEY_LOG_LEVEL,
    KEY_REFRESH_CACHED_TOKEN,
    KEY_AUTO_AUTH_METHOD,
    KEY_API,
    KEY_NAMESPACE,
    KEY_TOKEN,
    KEY_AUTOAUTH_ENABLE,
    KEY_AUTOAUTH_VALIDITY,
    KEY_AUTOAUTH_AUDIENCE,
    "autoauth.ldap.user",
    "autoauth.ldap.pass",
    "autoauth.ldap.source.name",
    "autoauth.ldap.source.namespace",
    "autoauth.http.user",
    "autoauth.http.pass",
    "autoauth.http.source.name",
    "autoauth.http.source.namespace",
    "autoauth.identity.token",
    "autoauth.identity.source.name",
    "autoauth.identity.source.namespace",
];

/// Built-in defaults, used when no layer provides the key.
pub const DEFAULTS: &[(&str, &str)] = &[(KEY_LOG_LEVEL, "warn")];

/// Tracks where a resolved value came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Built-in default value
    Default,
    /// Value from the loaded config file
    File(PathBuf),
    /// Value from environment variable
    EnvVar(String),
    /// Value from CLI flag
    CliFlag,
}

impl ValueSource {
    /// Layer rank. Higher ranks win.
    pub fn rank(&self) -> u8 {
        match self {
            ValueSource::Default => 0,
            ValueSource::File(_) => 1,
            ValueSource::EnvVar(_) => 2,
            ValueSource::CliFlag => 3,
        }
    }
}

impl std::fmt::Display for ValueSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValueSource::Default => write!(f, "default"),
            ValueSource::File(path) => write!(f, "file:{}", path.display()),
            ValueSource::EnvVar(name) => write!(f, "env:{}", name),
            ValueSource::CliFlag => write!(f, "cli"),
        }
    }
}

/// A resolved value with its source.
#[derive(Debug, Clone, PartialEq)]
pub struct Resolved<T> {
    /// The resolved value
    pub value: T,
    /// Where the value came from
    pub source: ValueSource,
}

impl<T> Resolved<T> {
    /// Create a new resolved value.
    pub fn new(value: T, source: ValueSource) -> Self {
        Self { value, source }
    }
}

/// Which file the configuration was loaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigLocation {
    /// A path given by `--config` or `BOSUN_CONFIG`
    ExplicitFile { path: PathBuf, from_env: bool },
    /// A named profile found on the search path
    Profile { name: String, path: PathBuf },
}

impl ConfigLocation {
    /// Path of the file backing this location.
    pub fn path(&self) -> &Path {
        match self {
            ConfigLocation::ExplicitFile { path, .. } => path,
            ConfigLocation::Profile { path, .. } => path,
        }
    }
}

impl std::fmt::Display for ConfigLocation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigLocation::ExplicitFile { path, from_env } => {
                let via = if *from_env { "env" } else { "flag" };
                write!(f, "{} ({})", path.display(), via)
            }
            ConfigLocation::Profile { name, path } => {
                write!(f, "{} (profile {})", path.display(), name)
            }
        }
    }
}

/// Final merged configuration for one invocation.
#[derive(Debug, Clone, Default)]
pub struct EffectiveConfig {
    entries: BTreeMap<String, Resolved<Value>>,
    location: Option<ConfigLocation>,
}

impl EffectiveConfig {
    /// Create an empty config with no values set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a config holding only the built-in defaults.
    pub fn with_defaults() -> Self {
        let mut config = Self::new();
        for (key, value) in DEFAULTS {
            config.layer(key, Value::String((*value).to_string()), ValueSource::Default);
        }
        config
    }

    /// Write a value unless a higher-ranked layer already owns the key.
    ///
    /// Returns true if the value was stored.
    pub fn layer(&mut self, key: &str, value: Value, source: ValueSource) -> bool {
        let key = key.to_lowercase();
        if let Some(existing) = self.entries.get(&key) {
            if existing.source.rank() > source.rank() {
                return false;
            }
        }
        self.entries.insert(key, Resolved::new(value, source));
        true
    }

    /// Flatten a YAML document into dotted keys and layer it in.
    pub fn merge_yaml(&mut self, document: &Value, source: &ValueSource) {
        let mut flat = Vec::new();
        flatten_into(String::new(), document, &mut flat);
        for (key, value) in flat {
            self.layer(&key, value, source.clone());
        }
    }

    /// Layer `BOSUN_*` environment bindings for every known key and every key
    /// already present.
    pub fn overlay_env(&mut self, env: &Environment) {
        let mut keys: Vec<String> = self.entries.keys().cloned().collect();
        keys.extend(ENV_BOUND_KEYS.iter().map(|k| k.to_string()));
        keys.sort();
        keys.dedup();

        for key in keys {
            if let Some((name, value)) = env.lookup_key(&key) {
                self.layer(
                    &key,
                    Value::String(value.to_string()),
                    ValueSource::EnvVar(name),
                );
            }
        }
    }

    /// Record the file this config was loaded from.
    pub fn set_location(&mut self, location: ConfigLocation) {
        self.location = Some(location);
    }

    /// File this config was loaded from, if any.
    pub fn location(&self) -> Option<&ConfigLocation> {
        self.location.as_ref()
    }

    /// Raw value for a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(&key.to_lowercase()).map(|r| &r.value)
    }

    /// Where the value for a key came from.
    pub fn source(&self, key: &str) -> Option<&ValueSource> {
        self.entries.get(&key.to_lowercase()).map(|r| &r.source)
    }

    /// Scalar value rendered as a string. Empty strings count as unset.
    pub fn get_str(&self, key: &str) -> Option<String> {
        let s = match self.get(key)? {
            Value::String(s) => s.clone(),
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            _ => return None,
        };
        if s.is_empty() { None } else { Some(s) }
    }

    /// Boolean value. Strings use the usual truthy spellings; anything else is false.
    pub fn get_bool(&self, key: &str) -> bool {
        match self.get(key) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => parse_bool(s),
            Some(Value::Number(n)) => n.as_i64().is_some_and(|i| i != 0),
            _ => false,
        }
    }

    /// List value. A scalar string is split on commas.
    pub fn get_list(&self, key: &str) -> Vec<String> {
        match self.get(key) {
            Some(Value::Sequence(items)) => items
                .iter()
                .filter_map(|item| match item {
                    Value::String(s) => Some(s.clone()),
                    Value::Number(n) => Some(n.to_string()),
                    Value::Bool(b) => Some(b.to_string()),
                    _ => None,
                })
                .collect(),
            Some(Value::String(s)) => s
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            _ => Vec::new(),
        }
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.contains_key(&key.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn parse_bool(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "1" | "t" | "true" | "y" | "yes" | "on"
    )
}

fn flatten_into(prefix: String, value: &Value, out: &mut Vec<(String, Value)>) {
    match value {
        Value::Mapping(map) => {
            for (k, v) in map {
                let segment = match k {
                    Value::String(s) => s.clone(),
                    Value::Number(n) => n.to_string(),
                    Value::Bool(b) => b.to_string(),
                    _ => continue,
                };
                let key = if prefix.is_empty() {
                    segment
                } else {
                    format!("{}.{}", prefix, segment)
                };
                flatten_into(key, v, out);
            }
        }
        Value::Tagged(tagged) => flatten_into(prefix, &tagged.value, out),
        _ if prefix.is_empty() => {}
        _ => out.push((prefix, value.clone())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file_source() -> ValueSource {
        ValueSource::File(PathBuf::from("/tmp/default.yaml"))
    }

    fn yaml(s: &str) -> Value {
        serde_yaml::from_str(s).unwrap()
    }

    #[test]
    fn test_value_source_display() {
        assert_eq!(format!("{}", ValueSource::Default), "default");
        assert_eq!(format!("{}", file_source()), "file:/tmp/default.yaml");
        assert_eq!(
            format!("{}", ValueSource::EnvVar("BOSUN_API".to_string())),
            "env:BOSUN_API"
        );
        assert_eq!(format!("{}", ValueSource::CliFlag), "cli");
    }

    #[test]
    fn test_defaults_present() {
        let config = EffectiveConfig::with_defaults();
        assert_eq!(config.get_str(KEY_LOG_LEVEL).as_deref(), Some("warn"));
        assert_eq!(config.source(KEY_LOG_LEVEL), Some(&ValueSource::Default));
    }

    #[test]
    fn test_higher_layer_overrides_lower() {
        let mut config = EffectiveConfig::with_defaults();
        config.merge_yaml(&yaml("log-level: info"), &file_source());
        assert_eq!(config.get_str(KEY_LOG_LEVEL).as_deref(), Some("info"));

        assert!(config.layer(KEY_LOG_LEVEL, Value::String("debug".into()), ValueSource::CliFlag));
        assert_eq!(config.get_str(KEY_LOG_LEVEL).as_deref(), Some("debug"));
        assert_eq!(config.source(KEY_LOG_LEVEL), Some(&ValueSource::CliFlag));
    }

    #[test]
    fn test_lower_layer_never_replaces_higher() {
        let mut config = EffectiveConfig::new();
        config.layer(KEY_API, Value::String("https://flag".into()), ValueSource::CliFlag);

        assert!(!config.layer(KEY_API, Value::String("https://default".into()), ValueSource::Default));
        config.merge_yaml(&yaml("api: https://file"), &file_source());

        assert_eq!(config.get_str(KEY_API).as_deref(), Some("https://flag"));
        assert_eq!(config.source(KEY_API), Some(&ValueSource::CliFlag));
    }

    #[test]
    fn test_merge_yaml_flattens_nested_mappings() {
        let mut config = EffectiveConfig::new();
        config.merge_yaml(
            &yaml(
                r#"
api: https://api.example.com
autoauth:
  enable: ldap
  ldap:
    user: alice
    source:
      name: corp
"#,
            ),
            &file_source(),
        );

        assert_eq!(config.get_str("autoauth.enable").as_deref(), Some("ldap"));
        assert_eq!(config.get_str("autoauth.ldap.user").as_deref(), Some("alice"));
        assert_eq!(config.get_str("autoauth.ldap.source.name").as_deref(), Some("corp"));
        assert!(!config.contains_key("autoauth"));
    }

    #[test]
    fn test_keys_are_case_insensitive() {
        let mut config = EffectiveConfig::new();
        config.merge_yaml(&yaml("AutoAuth:\n  Enable: http"), &file_source());
        assert_eq!(config.get_str("autoauth.enable").as_deref(), Some("http"));
    }

    #[test]
    fn test_overlay_env_known_and_present_keys() {
        let mut config = EffectiveConfig::new();
        config.merge_yaml(&yaml("custom-key: file\napi: https://file"), &file_source());

        let env = Environment::from_pairs([
            ("BOSUN_CUSTOM_KEY", "env"),
            ("BOSUN_AUTOAUTH_ENABLE", "identity"),
            ("BOSUN_UNRELATED", "ignored"),
        ]);
        config.overlay_env(&env);

        assert_eq!(config.get_str("custom-key").as_deref(), Some("env"));
        assert_eq!(config.get_str(KEY_AUTOAUTH_ENABLE).as_deref(), Some("identity"));
        assert_eq!(
            config.source(KEY_AUTOAUTH_ENABLE),
            Some(&ValueSource::EnvVar("BOSUN_AUTOAUTH_ENABLE".to_string()))
        );
        assert_eq!(config.get_str(KEY_API).as_deref(), Some("https://file"));
        assert!(!config.contains_key("unrelated"));
    }

    #[test]
    fn test_get_bool_spellings() {
        let mut config = EffectiveConfig::new();
        for (key, value) in [("a", "true"), ("b", "1"), ("c", "no"), ("d", "")] {
            config.layer(key, Value::String(value.into()), ValueSource::Default);
        }
        config.layer("e", Value::Bool(true), ValueSource::Default);

        assert!(config.get_bool("a"));
        assert!(config.get_bool("b"));
        assert!(!config.get_bool("c"));
        assert!(!config.get_bool("d"));
        assert!(config.get_bool("e"));
        assert!(!config.get_bool("missing"));
    }

    #[test]
    fn test_get_list_from_sequence_or_csv() {
        let mut config = EffectiveConfig::new();
        config.merge_yaml(&yaml("aud:\n  - one\n  - two"), &file_source());
        config.layer("csv", Value::String("a, b,,c".into()), ValueSource::Default);

        assert_eq!(config.get_list("aud"), vec!["one", "two"]);
        assert_eq!(config.get_list("csv"), vec!["a", "b", "c"]);
        assert!(config.get_list("missing").is_empty());
    }

    #[test]
    fn test_get_str_treats_empty_as_unset() {
        let mut config = EffectiveConfig::new();
        config.merge_yaml(&yaml("token: ''\nport: 443"), &file_source());
        assert!(config.get_str(KEY_TOKEN).is_none());
        assert_eq!(config.get_str("port").as_deref(), Some("443"));
    }
}
