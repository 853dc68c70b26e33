//! Command implementations for the Bosun CLI.
//!
//! Bodies run after the pre-run chain and receive the effective config plus
//! the credential the gate produced, if any:
//! - `api` - calls against the remote API
//! - `auth` - token issue, inspection and cache management
//! - `completion` - shell completion scripts

pub mod api;
pub mod auth;
pub mod completion;

/// Command results that can be serialized to JSON or formatted for humans.
pub trait CommandResult {
    /// Serialize to JSON string.
    fn to_json(&self) -> String;

    /// Format for human-readable output.
    fn to_human(&self) -> String;
}

/// Print a result in JSON or human-readable format.
pub fn output<T: CommandResult>(result: &T, human: bool) {
    if human {
        println!("{}", result.to_human());
    } else {
        println!("{}", result.to_json());
    }
}
