//! CUA-Claw application: CLI, session runner and terminal prompts.

pub mod cli;
pub mod prompt;
pub mod repl;
pub mod session;
