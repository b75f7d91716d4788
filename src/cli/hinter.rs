//! Command Hints
//!
//! Provides inline hints as the user types.

use rustyline::hint::{Hint, Hinter};
use rustyline::Context;

use super::completer::all_commands;

/// Command hinter - shows usage hints inline
pub struct CommandHinter;

impl CommandHinter {
    fn hint_for(line: &str) -> Option<CommandHint> {
        let words: Vec<&str> = line.split_whitespace().collect();
        let first = words.first()?;
        let cmd = first.to_uppercase();

        if let Some((_, args, _)) = all_commands().find(|(c, _, _)| *c == cmd) {
            let provided = positional_count(&words[1..]);
            let remaining: Vec<&str> = args.split_whitespace().skip(provided).collect();
            if remaining.is_empty() {
                return None;
            }
            let sep = if line.ends_with(' ') { "" } else { " " };
            return Some(CommandHint {
                text: format!("{}{}", sep, remaining.join(" ")),
                complete_up_to: 0,
            });
        }

        // Partial command match for completion hint
        if words.len() == 1 && !line.ends_with(' ') {
            let (command, args, _) = all_commands().find(|(c, _, _)| c.starts_with(&cmd))?;
            let rest = command[cmd.len()..].to_string();
            return Some(CommandHint {
                complete_up_to: rest.len(),
                text: format!("{} {}", rest, args),
            });
        }

        None
    }
}

/// Count arguments, skipping command flags and their values
fn positional_count(words: &[&str]) -> usize {
    let mut count = 0;
    let mut iter = words.iter();
    while let Some(word) = iter.next() {
        match *word {
            "-f" | "--format" | "-r" | "--repeat" | "-d" | "--delay" => {
                iter.next();
            }
            w if w.starts_with("--") => {}
            _ => count += 1,
        }
    }
    count
}

impl Hinter for CommandHinter {
    type Hint = CommandHint;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<Self::Hint> {
        if line.is_empty() || pos < line.len() {
            return None;
        }
        Self::hint_for(line)
    }
}

/// A hint with display text
pub struct CommandHint {
    text: String,
    complete_up_to: usize,
}

impl Hint for CommandHint {
    fn display(&self) -> &str {
        &self.text
    }

    fn completion(&self) -> Option<&str> {
        if self.complete_up_to > 0 {
            Some(&self.text[..self.complete_up_to])
        } else {
            None
        }
    }
}
