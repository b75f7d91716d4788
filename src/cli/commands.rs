//! CLI Commands
//!
//! Commands handled by the shell itself and the help screen.

use std::io::{self, Write};

use colored::Colorize;

use super::completer::FLAGS;
use super::meta;

/// Print help message
pub fn print_help() {
    println!("{}", "redis-shell commands:".bold().green());
    println!();

    println!("  {}", "Meta-commands:".yellow());
    for m in meta::all() {
        println!("    {:<10} {:<38} - {}", m.name(), m.usage(), m.description());
    }
    println!();

    println!("  {}", "Command flags (anywhere on the line):".yellow());
    for (flag, desc) in FLAGS {
        println!("    {:<12} {}", flag, desc);
    }
    println!();

    println!("  {}", "Shell:".yellow());
    println!("    help [command] - Show this help, or a command's syntax");
    println!("    clear          - Clear screen");
    println!("    quit/exit      - Exit");
    println!();

    println!("  {}", "Keys:".yellow());
    println!("    Ctrl+C twice   - Exit");
    println!("    Ctrl+C         - Cancel a running command");
    println!("    Esc            - Clear line");
    println!("    Tab            - Auto-complete");
    println!();
    println!("Anything else is sent to the server as-is.");
}

/// Clear the terminal screen
pub fn clear_screen() {
    print!("\x1b[2J\x1b[H");
    io::stdout().flush().ok();
}
