//! Command tree with per-node pre-run hooks.
//!
//! Each node mirrors a clap (sub)command and owns an ordered list of hooks.
//! For an invocation of `bosun api list namespaces` the hooks of `bosun`,
//! `api` and `list` run in that order, stopping at the first error. The
//! root binds flags into the config; `api` runs the auto-auth gate, so flag
//! binding always happens before authentication.

use clap::ArgMatches;
use tracing::debug;

use crate::auth::AutoAuthGate;
use crate::cli::bind_flags;
use crate::config::{EffectiveConfig, KEY_AUTO_AUTH_METHOD, KEY_REFRESH_CACHED_TOKEN};
use crate::{Error, Result};

pub const API_COMMAND: &str = "api";
pub const AUTH_COMMAND: &str = "auth";
pub const COMPLETION_COMMAND: &str = "completion";

/// State passed through the pre-run chain and on to the command body.
#[derive(Debug)]
pub struct Invocation<'m> {
    /// Matches for the whole command line
    pub matches: &'m ArgMatches,
    pub config: EffectiveConfig,
    /// Credential produced by the gate, if it ran
    pub credential: Option<String>,
}

impl<'m> Invocation<'m> {
    pub fn new(matches: &'m ArgMatches, config: EffectiveConfig) -> Self {
        Self {
            matches,
            config,
            credential: None,
        }
    }
}

/// A hook run before the command body.
pub type PreRunHook<'a> = Box<dyn Fn(&mut Invocation<'_>) -> Result<()> + 'a>;

/// One command in the tree.
pub struct CommandNode<'a> {
    name: String,
    pre_run: Vec<PreRunHook<'a>>,
    children: Vec<CommandNode<'a>>,
}

impl std::fmt::Debug for CommandNode<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandNode")
            .field("name", &self.name)
            .field("pre_run", &self.pre_run.len())
            .field("children", &self.children)
            .finish()
    }
}

impl<'a> CommandNode<'a> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            pre_run: Vec::new(),
            children: Vec::new(),
        }
    }

    /// Mirror a clap command and all of its subcommands, without hooks.
    pub fn from_command(command: &clap::Command) -> Self {
        let mut node = Self::new(command.get_name());
        for sub in command.get_subcommands() {
            node.add_child(Self::from_command(sub));
        }
        node
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn children(&self) -> &[CommandNode<'a>] {
        &self.children
    }

    pub fn child(&self, name: &str) -> Option<&CommandNode<'a>> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut CommandNode<'a>> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    pub fn add_child(&mut self, child: CommandNode<'a>) {
        self.children.push(child);
    }

    /// Append a hook. Hooks on one node run in the order they were added.
    pub fn add_pre_run<F>(&mut self, hook: F)
    where
        F: Fn(&mut Invocation<'_>) -> Result<()> + 'a,
    {
        self.pre_run.push(Box::new(hook));
    }

    pub fn hook_count(&self) -> usize {
        self.pre_run.len()
    }

    /// Nodes from this one down to the end of `path`.
    pub fn resolve_path(&self, path: &[String]) -> Result<Vec<&CommandNode<'a>>> {
        let mut chain = vec![self];
        let mut current = self;
        for name in path {
            current = current
                .child(name)
                .ok_or_else(|| Error::InvalidInput(format!("unknown command '{}'", name)))?;
            chain.push(current);
        }
        Ok(chain)
    }

    /// Run every hook from this node down to the end of `path`.
    pub fn run_pre_run(&self, path: &[String], inv: &mut Invocation<'_>) -> Result<()> {
        for node in self.resolve_path(path)? {
            for hook in &node.pre_run {
                hook(inv)?;
            }
            if !node.pre_run.is_empty() {
                debug!(command = %node.name, "pre-run complete");
            }
        }
        Ok(())
    }
}

/// Names of the subcommands invoked, outermost first.
pub fn command_path(matches: &ArgMatches) -> Vec<String> {
    let mut path = Vec::new();
    let mut current = matches;
    while let Some((name, sub)) = current.subcommand() {
        path.push(name.to_string());
        current = sub;
    }
    path
}

/// Matches of the innermost invoked subcommand.
pub fn leaf_matches(matches: &ArgMatches) -> &ArgMatches {
    let mut current = matches;
    while let Some((_, sub)) = current.subcommand() {
        current = sub;
    }
    current
}

/// Build the command tree for `command` and attach the standard hooks.
pub fn assemble<'a>(command: &clap::Command, gate: &'a AutoAuthGate<'a>) -> Result<CommandNode<'a>> {
    let mut root = CommandNode::from_command(command);

    root.add_pre_run(|inv: &mut Invocation<'_>| {
        let bound = bind_flags(&mut inv.config, leaf_matches(inv.matches));
        debug!(bound, "flags bound");
        Ok(())
    });

    let api = root
        .child_mut(API_COMMAND)
        .ok_or_else(|| Error::Other(format!("command tree has no '{}' command", API_COMMAND)))?;
    api.add_pre_run(move |inv: &mut Invocation<'_>| {
        let method = inv.config.get_str(KEY_AUTO_AUTH_METHOD);
        let refresh = inv.config.get_bool(KEY_REFRESH_CACHED_TOKEN);
        inv.credential = gate.ensure_authenticated(&inv.config, method.as_deref(), refresh)?;
        Ok(())
    });

    Ok(root)
}
