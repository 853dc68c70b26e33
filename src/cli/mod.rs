//! CLI argument definitions for Bosun.

use std::path::PathBuf;

use clap::builder::BoolishValueParser;
use clap::parser::ValueSource as ClapSource;
use clap::error::ErrorKind;
use clap::{ArgAction, ArgMatches, Parser, Subcommand};
use serde_yaml::Value;
use tracing::debug;

use crate::config::{
    EffectiveConfig, KEY_API, KEY_AUTO_AUTH_METHOD, KEY_CONFIG, KEY_CONFIG_NAME, KEY_LOG_LEVEL,
    KEY_NAMESPACE, KEY_REFRESH_CACHED_TOKEN, KEY_TOKEN, ValueSource, env_key,
};
use crate::logging::LogLevel;

/// Version string shown by `bosun --version`.
pub const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("BOSUN_GIT_COMMIT"),
    " ",
    env!("BOSUN_BUILD_TIMESTAMP"),
    ")"
);

/// Bosun - a command-line client for a remote API.
///
/// Configuration comes from a YAML profile, `BOSUN_*` environment variables
/// and flags. API commands authenticate automatically when `autoauth.enable`
/// or `--auto-auth-method` names a method.
#[derive(Parser, Debug)]
#[command(name = "bosun")]
#[command(author, version = VERSION, about = "Command-line client with layered config and automatic authentication", long_about = None)]
pub struct Cli {
    /// Path to a configuration file (skips profile lookup).
    /// Can also be set via BOSUN_CONFIG.
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Name of the configuration profile to load (default: "default").
    /// Can also be set via BOSUN_CONFIG_NAME.
    #[arg(long = "config-name", global = true, value_name = "NAME")]
    pub config_name: Option<String>,

    /// Diagnostic log level
    #[arg(
        long = "log-level",
        global = true,
        env = "BOSUN_LOG_LEVEL",
        value_enum,
        default_value_t = LogLevel::Warn
    )]
    pub log_level: LogLevel,

    /// Discard any cached token and authenticate again
    #[arg(
        long = "refresh-cached-token",
        global = true,
        env = "BOSUN_REFRESH_CACHED_TOKEN",
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub refresh_cached_token: bool,

    /// Auto-auth method to use instead of autoauth.enable (ldap, http, identity)
    #[arg(
        long = "auto-auth-method",
        global = true,
        env = "BOSUN_AUTO_AUTH_METHOD",
        value_name = "METHOD"
    )]
    pub auto_auth_method: Option<String>,

    /// Output in human-readable format instead of JSON
    #[arg(short = 'H', long = "human", global = true)]
    pub human_readable: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Call the remote API (authenticates automatically when enabled)
    Api {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[command(subcommand)]
        command: ApiCommands,
    },

    /// Manage authentication and cached tokens
    Auth {
        #[command(flatten)]
        connection: ConnectionArgs,

        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Print a shell completion script
    Completion {
        /// Target shell
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

/// Where and as whom to connect.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ConnectionArgs {
    /// Base URL of the API
    #[arg(long, global = true, env = "BOSUN_API", value_name = "URL")]
    pub api: Option<String>,

    /// Namespace to operate in
    #[arg(short = 'n', long, global = true, env = "BOSUN_NAMESPACE")]
    pub namespace: Option<String>,

    /// Use this token instead of authenticating
    #[arg(long, global = true, env = "BOSUN_TOKEN", hide_env_values = true)]
    pub token: Option<String>,
}

/// API commands
#[derive(Subcommand, Debug)]
pub enum ApiCommands {
    /// List objects of a resource (e.g. `namespaces`)
    List {
        /// Resource name
        resource: String,
    },

    /// Get one object by ID
    Get {
        /// Resource name
        resource: String,

        /// Object ID
        id: String,
    },
}

/// Auth commands
#[derive(Subcommand, Debug)]
pub enum AuthCommands {
    /// Exchange credentials for a new token and print it
    Issue {
        /// Do not store the new token in the cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Show the current token and its claims
    Check,

    /// Remove cached tokens
    Clear {
        /// Remove every cached token, not only the current method's
        #[arg(long)]
        all: bool,
    },
}

/// Whether a parse error is a request for help or version output rather
/// than a usage mistake.
pub fn is_informational(err: &clap::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::DisplayHelp
            | ErrorKind::DisplayVersion
            | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
    )
}

/// First line of a clap error, without clap's `error: ` prefix.
pub fn usage_error_message(err: &clap::Error) -> String {
    let rendered = err.to_string();
    let first = rendered.lines().next().unwrap_or_default().trim();
    first.strip_prefix("error:").unwrap_or(first).trim().to_string()
}

/// How a flag's value is rendered into the config.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FlagKind {
    Str,
    Bool,
}

/// Flags mirrored into the effective config: (clap id, config key, kind).
const FLAG_BINDINGS: &[(&str, &str, FlagKind)] = &[
    ("config", KEY_CONFIG, FlagKind::Str),
    ("config_name", KEY_CONFIG_NAME, FlagKind::Str),
    ("log_level", KEY_LOG_LEVEL, FlagKind::Str),
    ("refresh_cached_token", KEY_REFRESH_CACHED_TOKEN, FlagKind::Bool),
    ("auto_auth_method", KEY_AUTO_AUTH_METHOD, FlagKind::Str),
    ("api", KEY_API, FlagKind::Str),
    ("namespace", KEY_NAMESPACE, FlagKind::Str),
    ("token", KEY_TOKEN, FlagKind::Str),
];

/// Layer every bound flag present in `matches` into the config.
///
/// Values typed on the command line outrank everything; values clap read from
/// the environment rank as environment; clap defaults rank as defaults.
/// Returns how many values were stored.
pub fn bind_flags(config: &mut EffectiveConfig, matches: &ArgMatches) -> usize {
    let mut bound = 0;
    for &(id, key, kind) in FLAG_BINDINGS {
        // Connection flags only exist under `api` and `auth`.
        if !matches.ids().any(|present| present.as_str() == id) {
            continue;
        }
        let Some(source) = matches.value_source(id) else {
            continue;
        };
        let source = match source {
            ClapSource::CommandLine => ValueSource::CliFlag,
            ClapSource::EnvVariable => ValueSource::EnvVar(env_key(key)),
            _ => ValueSource::Default,
        };

        let value = match kind {
            FlagKind::Bool => match matches.try_get_one::<bool>(id) {
                Ok(Some(b)) => Value::Bool(*b),
                _ => continue,
            },
            FlagKind::Str => match matches.try_get_raw(id) {
                Ok(Some(mut raw)) => match raw.next() {
                    Some(v) => Value::String(v.to_string_lossy().into_owned()),
                    None => continue,
                },
                _ => continue,
            },
        };

        if config.layer(key, value, source.clone()) {
            debug!(key, source = %source, "bound flag");
            bound += 1;
        }
    }
    bound
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    fn matches(args: &[&str]) -> ArgMatches {
        Cli::command().try_get_matches_from(args).unwrap()
    }

    fn leaf(matches: &ArgMatches) -> &ArgMatches {
        crate::tree::leaf_matches(matches)
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_api_list() {
        let cli = Cli::try_parse_from([
            "bosun",
            "--config-name",
            "staging",
            "api",
            "--api",
            "https://api",
            "-n",
            "/acme",
            "list",
            "namespaces",
        ])
        .unwrap();

        assert_eq!(cli.config_name.as_deref(), Some("staging"));
        match cli.command {
            Commands::Api {
                connection,
                command: ApiCommands::List { resource },
            } => {
                assert_eq!(connection.api.as_deref(), Some("https://api"));
                assert_eq!(connection.namespace.as_deref(), Some("/acme"));
                assert_eq!(resource, "namespaces");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "bosun",
            "auth",
            "clear",
            "--all",
            "--refresh-cached-token",
            "--log-level",
            "debug",
        ])
        .unwrap();
        assert!(cli.refresh_cached_token);
        assert_eq!(cli.log_level, LogLevel::Debug);
    }

    #[test]
    fn test_invalid_log_level_rejected() {
        assert!(Cli::try_parse_from(["bosun", "--log-level", "loud", "auth", "check"]).is_err());
    }

    #[test]
    fn test_usage_error_message_is_one_line() {
        let err = Cli::command()
            .try_get_matches_from(["bosun", "bogus"])
            .unwrap_err();
        assert!(!is_informational(&err));
        assert_eq!(usage_error_message(&err), "unrecognized subcommand 'bogus'");

        let err = Cli::command()
            .try_get_matches_from(["bosun", "--log-level", "loud", "auth", "check"])
            .unwrap_err();
        let message = usage_error_message(&err);
        assert!(message.starts_with("invalid value 'loud'"), "{message}");
        assert!(!message.contains('\n'));
    }

    #[test]
    fn test_help_and_version_are_informational() {
        for args in [&["bosun", "--help"][..], &["bosun", "--version"][..], &["bosun"][..]] {
            let err = Cli::command().try_get_matches_from(args).unwrap_err();
            assert!(is_informational(&err), "{:?}", args);
        }
    }

    #[test]
    fn test_bind_flags_marks_cli_source() {
        let m = matches(&[
            "bosun",
            "--auto-auth-method",
            "http",
            "--refresh-cached-token",
            "api",
            "--api",
            "https://api",
            "list",
            "namespaces",
        ]);
        let mut config = EffectiveConfig::with_defaults();
        bind_flags(&mut config, leaf(&m));

        assert_eq!(config.get_str(KEY_AUTO_AUTH_METHOD).as_deref(), Some("http"));
        assert_eq!(config.source(KEY_AUTO_AUTH_METHOD), Some(&ValueSource::CliFlag));
        assert!(config.get_bool(KEY_REFRESH_CACHED_TOKEN));
        assert_eq!(config.get_str(KEY_API).as_deref(), Some("https://api"));
    }

    #[test]
    fn test_flag_overrides_file_value() {
        let m = matches(&["bosun", "api", "--api", "https://flag", "list", "x"]);
        let mut config = EffectiveConfig::with_defaults();
        config.layer(KEY_API, "https://file".into(), ValueSource::File("/c.yaml".into()));

        bind_flags(&mut config, leaf(&m));

        assert_eq!(config.get_str(KEY_API).as_deref(), Some("https://flag"));
    }

    #[test]
    fn test_defaults_do_not_override_file() {
        let m = matches(&["bosun", "auth", "check"]);
        let mut config = EffectiveConfig::with_defaults();
        let file = ValueSource::File("/c.yaml".into());
        config.layer(KEY_LOG_LEVEL, "debug".into(), file.clone());
        config.layer(KEY_REFRESH_CACHED_TOKEN, Value::Bool(true), file);

        bind_flags(&mut config, leaf(&m));

        assert_eq!(config.get_str(KEY_LOG_LEVEL).as_deref(), Some("debug"));
        assert!(config.get_bool(KEY_REFRESH_CACHED_TOKEN));
    }

    #[test]
    fn test_absent_flags_are_not_bound() {
        let m = matches(&["bosun", "completion", "bash"]);
        let mut config = EffectiveConfig::new();

        bind_flags(&mut config, leaf(&m));

        assert!(!config.contains_key(KEY_API));
        assert!(!config.contains_key(KEY_TOKEN));
        assert!(!config.contains_key(KEY_AUTO_AUTH_METHOD));
        assert_eq!(config.source(KEY_LOG_LEVEL), Some(&ValueSource::Default));
    }
}
