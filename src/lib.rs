//! redis-shell
//!
//! Interactive client for Redis-protocol servers: command execution with
//! repeat and delay, key-scanning meta-commands, and result formatting.

pub mod cli;
pub mod error;
