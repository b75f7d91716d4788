//! Shell Library
//!
//! Connection, command execution, output formatting and the REPL.

pub mod client;
pub mod commands;
pub mod completer;
pub mod config;
pub mod executor;
pub mod hinter;
pub mod meta;
pub mod output;
pub mod parser;
pub mod reply;
pub mod repl;
pub mod runner;
