//! Shell completion generation command.
//!
//! Generates shell completion scripts for bash, zsh, fish, and `PowerShell`.

use crate::cli::ExitCode;
use anyhow::Result;
use clap::Command;
use clap_complete::{Shell, generate};
use std::io;
use tracing::info;

/// Writes the completion script for `shell` to stdout.
pub fn generate_completions(shell: Shell, cmd: &mut Command) {
    info!("Generating {} completions", shell);
    let name = cmd.get_name().to_string();
    generate(shell, cmd, name, &mut io::stdout());
}

/// Runs the completions command.
///
/// # Errors
///
/// Never fails; the `Result` keeps the signature uniform with other commands.
pub fn run(shell: Shell, cmd: &mut Command) -> Result<ExitCode> {
    generate_completions(shell, cmd);
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_completions_bash() {
        let mut cmd = Command::new("pspf");
        generate_completions(Shell::Bash, &mut cmd);
    }

    #[test]
    fn test_generate_completions_zsh() {
        let mut cmd = Command::new("pspf");
        generate_completions(Shell::Zsh, &mut cmd);
    }

    #[test]
    fn test_run_fish() {
        let mut cmd = Command::new("pspf");
        assert_eq!(run(Shell::Fish, &mut cmd).unwrap(), ExitCode::SUCCESS);
    }
}
