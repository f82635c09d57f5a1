//! gridharness command-line interface.
//!
//! The binary in `main.rs` parses arguments, initializes logging and
//! dispatches to one handler per subcommand in [`commands`].

pub mod cli;
pub mod commands;
pub mod error;
pub mod output;
