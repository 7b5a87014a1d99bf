//! Command implementations for the `pspf` CLI.
//!
//! Each command module runs its operation, formats the result according to
//! the requested output format and returns an exit code. Failures propagate
//! as `anyhow` errors whose chain carries the package error.

pub mod build;
pub mod completions;
pub mod extract;
pub mod info;
pub mod keygen;
pub mod verify;
