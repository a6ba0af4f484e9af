//! The short notice shown once at the top of an interactive session.
//! Never gates execution — see `cli::run`, which proceeds regardless of
//! TTY state.

use std::io::IsTerminal;

pub const DISCLAIMER: &str = "CaretForge can read, write, and run commands in this directory on \
your behalf. Review tool calls before approving writes or shell commands.";

/// Print the disclaimer to stderr, but only when stdin is a real terminal —
/// a piped/scripted invocation shouldn't have it mixed into its output.
pub fn print_if_interactive() {
    if std::io::stdin().is_terminal() {
        eprintln!("{DISCLAIMER}\n");
    }
}
