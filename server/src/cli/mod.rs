// server/src/cli/mod.rs

// Command-line parsing and the serve/show-config commands.

pub mod cli;
pub mod signals;

pub use cli::{start_cli, CliArgs, Commands};
