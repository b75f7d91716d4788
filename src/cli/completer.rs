//! Command Completion
//!
//! Tab completion for command names, meta-commands and command flags.

use rustyline::completion::{Completer, Pair};
use rustyline::Context;

use super::meta;

/// Common server commands with their syntax
pub static COMMANDS: &[(&str, &str, &str)] = &[
    // Strings
    ("APPEND", "key value", "Append value to key"),
    ("DECR", "key", "Decrement key"),
    ("GET", "key", "Get value of key"),
    ("INCR", "key", "Increment key"),
    ("INCRBY", "key increment", "Increment key by value"),
    ("MGET", "key [key ...]", "Get multiple keys"),
    ("MSET", "key value [key value ...]", "Set multiple keys"),
    ("SET", "key value [EX seconds] [PX ms] [NX|XX]", "Set key value"),
    ("STRLEN", "key", "Get string length"),
    // Lists
    ("LINDEX", "key index", "Get element by index"),
    ("LLEN", "key", "Get list length"),
    ("LPOP", "key [count]", "Remove and get first elements"),
    ("LPUSH", "key value [value ...]", "Prepend values"),
    ("LRANGE", "key start stop", "Get range of elements"),
    ("RPOP", "key [count]", "Remove and get last elements"),
    ("RPUSH", "key value [value ...]", "Append values"),
    // Hashes
    ("HDEL", "key field [field ...]", "Delete fields"),
    ("HGET", "key field", "Get field value"),
    ("HGETALL", "key", "Get all fields and values"),
    ("HKEYS", "key", "Get all field names"),
    ("HLEN", "key", "Get number of fields"),
    ("HMGET", "key field [field ...]", "Get multiple fields"),
    ("HSET", "key field value [field value ...]", "Set field(s)"),
    ("HVALS", "key", "Get all values"),
    // Sets and sorted sets
    ("SADD", "key member [member ...]", "Add members"),
    ("SCARD", "key", "Get set size"),
    ("SMEMBERS", "key", "Get all members"),
    ("SREM", "key member [member ...]", "Remove members"),
    ("ZADD", "key score member [score member ...]", "Add members"),
    ("ZRANGE", "key start stop [WITHSCORES]", "Get range of members"),
    ("ZSCORE", "key member", "Get member score"),
    // Keys
    ("DEL", "key [key ...]", "Delete keys"),
    ("EXISTS", "key [key ...]", "Check keys exist"),
    ("EXPIRE", "key seconds", "Set key timeout"),
    ("KEYS", "pattern", "Find keys (blocking)"),
    ("SCAN", "cursor [MATCH pattern] [COUNT count]", "Incrementally iterate keys"),
    ("TTL", "key", "Get key time to live"),
    ("TYPE", "key", "Get key type"),
    // Server
    ("DBSIZE", "", "Number of keys"),
    ("ECHO", "message", "Echo message"),
    ("INFO", "[section]", "Server information"),
    ("PING", "[message]", "Test connection"),
    ("SELECT", "index", "Change database"),
];

/// Command flags understood by the shell itself
pub static FLAGS: &[(&str, &str)] = &[
    ("-f", "format: json, normal, raw"),
    ("-r", "repeat count"),
    ("-d", "delay between repeats, seconds"),
    ("--no-color", "plain output"),
];

/// Server commands followed by meta-commands, as `(NAME, args, description)`
pub fn all_commands() -> impl Iterator<Item = (String, &'static str, &'static str)> {
    COMMANDS
        .iter()
        .map(|(c, a, d)| (c.to_string(), *a, *d))
        .chain(
            meta::all()
                .iter()
                .map(|m| (m.name().to_uppercase(), m.usage(), m.description())),
        )
}

/// Command completer
pub struct CommandCompleter;

impl CommandCompleter {
    fn candidates(line_up_to_cursor: &str) -> (usize, Vec<Pair>) {
        let start = line_up_to_cursor.rfind(' ').map(|i| i + 1).unwrap_or(0);
        let word = &line_up_to_cursor[start..];

        if word.starts_with('-') {
            let matches = FLAGS
                .iter()
                .filter(|(flag, _)| flag.starts_with(word))
                .map(|(flag, desc)| Pair {
                    display: format!("{:<12} # {}", flag, desc),
                    replacement: format!("{} ", flag),
                })
                .collect();
            return (start, matches);
        }

        let words: Vec<&str> = line_up_to_cursor.split_whitespace().collect();
        if words.is_empty() || (words.len() == 1 && !line_up_to_cursor.ends_with(' ')) {
            let prefix = word.to_uppercase();
            let matches = all_commands()
                .filter(|(cmd, _, _)| cmd.starts_with(&prefix))
                .map(|(cmd, args, desc)| Pair {
                    display: format!("{:<12} {:<40} # {}", cmd, args, desc),
                    replacement: format!("{} ", cmd),
                })
                .collect();
            return (start, matches);
        }

        (line_up_to_cursor.len(), Vec::new())
    }
}

impl Completer for CommandCompleter {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        Ok(Self::candidates(&line[..pos]))
    }
}

/// Get command help text
pub fn get_command_help(cmd: &str) -> Option<String> {
    let cmd_upper = cmd.to_uppercase();
    all_commands()
        .find(|(c, _, _)| *c == cmd_upper)
        .map(|(cmd, args, desc)| format!("{} {} - {}", cmd, args, desc))
}
