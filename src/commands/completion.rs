//! `bosun completion <shell>`

use std::io::Write;

use clap::CommandFactory;
use clap_complete::Shell;

use crate::cli::Cli;

/// Binary name completions are generated for.
pub const BIN_NAME: &str = "bosun";

/// Write the completion script for `shell` to `out`.
pub fn generate(shell: Shell, out: &mut dyn Write) {
    let mut command = Cli::command();
    clap_complete::generate(shell, &mut command, BIN_NAME, out);
}
