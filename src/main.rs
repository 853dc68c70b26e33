//! Bosun CLI - command-line client with layered config and automatic authentication.

use std::io;
use std::process;

use bosun::auth::{Authenticator, AutoAuthGate, HttpAuthenticator};
use bosun::cache::{CredentialCache, FileCredentialCache, MemoryCredentialCache};
use bosun::cli::{self, ApiCommands, AuthCommands, Cli, Commands};
use bosun::commands::{self, output};
use bosun::config::{self, ConfigFlags, Environment, KEY_AUTO_AUTH_METHOD, KEY_TOKEN};
use bosun::logging;
use bosun::tree::{self, Invocation};
use clap::{ArgMatches, CommandFactory, FromArgMatches};
use tracing::debug;

fn main() {
    let matches = match Cli::command().try_get_matches() {
        Ok(matches) => matches,
        Err(e) => exit_on_parse_error(e),
    };
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(e) => exit_on_parse_error(e),
    };

    logging::init(cli.log_level);

    if let Err(e) = run(&cli, &matches) {
        fail(&e.to_string());
    }
}

/// Help and version go through clap; usage mistakes become one error line.
fn exit_on_parse_error(e: clap::Error) -> ! {
    if cli::is_informational(&e) {
        e.exit();
    }
    fail(&cli::usage_error_message(&e))
}

fn fail(message: &str) -> ! {
    eprintln!("error: {}", message);
    process::exit(1);
}

/// Bootstrap, run the pre-run chain, then the command body.
fn run(cli: &Cli, matches: &ArgMatches) -> bosun::Result<()> {
    let env = Environment::capture();
    let flags = ConfigFlags {
        config: cli.config.clone(),
        config_name: cli.config_name.clone(),
    };
    let boot = config::bootstrap(&flags, &env, dirs::home_dir().as_deref())?;

    // Without a usable config directory tokens only live for this process.
    let file_cache;
    let memory_cache;
    let cache: &dyn CredentialCache = if boot.degraded {
        memory_cache = MemoryCredentialCache::new();
        &memory_cache
    } else {
        file_cache = FileCredentialCache::in_config_dir(&boot.config_dir);
        &file_cache
    };

    let authenticator = HttpAuthenticator::new();
    let gate = AutoAuthGate::new(cache, &authenticator);
    let root = tree::assemble(&Cli::command(), &gate)?;

    let path = tree::command_path(matches);
    let mut inv = Invocation::new(matches, boot.config);
    root.run_pre_run(&path, &mut inv)?;
    debug!(command = %path.join(" "), "running command");

    dispatch(cli, &inv, cache, &authenticator)
}

fn dispatch(
    cli: &Cli,
    inv: &Invocation<'_>,
    cache: &dyn CredentialCache,
    authenticator: &dyn Authenticator,
) -> bosun::Result<()> {
    let human = cli.human_readable;
    let config = &inv.config;
    let method = config.get_str(KEY_AUTO_AUTH_METHOD);

    match &cli.command {
        Commands::Api { command, .. } => {
            let credential = inv.credential.clone().or_else(|| config.get_str(KEY_TOKEN));
            match command {
                ApiCommands::List { resource } => {
                    let result = commands::api::list(config, credential.as_deref(), resource)?;
                    output(&result, human);
                }
                ApiCommands::Get { resource, id } => {
                    let result = commands::api::get(config, credential.as_deref(), resource, id)?;
                    output(&result, human);
                }
            }
        }

        Commands::Auth { command, .. } => match command {
            AuthCommands::Issue { no_cache } => {
                let result = commands::auth::issue(
                    config,
                    method.as_deref(),
                    cache,
                    authenticator,
                    *no_cache,
                )?;
                output(&result, human);
            }
            AuthCommands::Check => {
                let result = commands::auth::check(config, method.as_deref(), cache)?;
                output(&result, human);
            }
            AuthCommands::Clear { all } => {
                let result = commands::auth::clear(config, method.as_deref(), cache, *all)?;
                output(&result, human);
            }
        },

        Commands::Completion { shell } => {
            commands::completion::generate(*shell, &mut io::stdout());
        }
    }

    Ok(())
}
