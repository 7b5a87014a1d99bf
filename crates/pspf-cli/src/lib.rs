//! PSPF CLI library.
//!
//! Exposes the command implementations, configuration and formatters behind
//! the `pspf` binary so they can be tested without spawning a process.

pub mod cli;
pub mod commands;
pub mod config;
pub mod formatters;

pub use cli::{CliError, ExitCode, LogFormat, OutputFormat};
