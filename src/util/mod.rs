//! Filesystem and display helpers for the CLI.

pub mod atomic;
pub mod diff;
