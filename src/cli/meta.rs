//! Meta-commands
//!
//! Reserved command names that run a composite operation built from
//! primitive calls instead of being forwarded to the server.

use tracing::debug;

use super::client::StoreClient;
use super::executor::Command;
use super::reply::Reply;
use crate::error::{CliError, Result};

/// Batch size when the key count cannot be determined
const FALLBACK_BATCH: u64 = 5000;
const MIN_BATCH: u64 = 1000;
const MAX_BATCH: u64 = 10000;
/// Keys per DEL call outside cluster mode
const DEL_BATCH: usize = 100;

/// A reserved command handler
pub trait MetaCommand: Sync {
    fn name(&self) -> &'static str;

    fn usage(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn run(&self, client: &mut dyn StoreClient, command: &Command) -> Result<Reply>;
}

pub struct ScanAll;
pub struct GetMatch;
pub struct DelAll;

static META_COMMANDS: &[&dyn MetaCommand] = &[&ScanAll, &GetMatch, &DelAll];

/// Find the handler for a lower-cased command name
pub fn lookup(name: &str) -> Option<&'static dyn MetaCommand> {
    META_COMMANDS.iter().copied().find(|m| m.name() == name)
}

/// All reserved handlers, for help and completion
pub fn all() -> &'static [&'static dyn MetaCommand] {
    META_COMMANDS
}

/// Arguments shared by every meta-command: a glob and an optional batch size
#[derive(Debug, Clone, PartialEq)]
struct MatchArgs {
    pattern: String,
    count: Option<u64>,
}

impl MatchArgs {
    fn parse(command: &Command, name: &str) -> Result<Self> {
        let args = &command.args;
        if args.len() < 2 {
            return Err(CliError::argument(format!("{} argument incorrect: missing pattern", name)));
        }

        let mut count = None;
        if let Some(ix) = position_of(args, "COUNT") {
            let raw = &args[ix + 1];
            let n: i64 = raw
                .parse()
                .map_err(|_| CliError::argument(format!("{} invalid COUNT: {}", name, raw)))?;
            count = (n > 0).then_some(n as u64);
        }

        let pattern = match position_of(args, "MATCH") {
            Some(ix) => args[ix + 1].clone(),
            None => args[1].clone(),
        };

        Ok(MatchArgs { pattern, count })
    }
}

/// Index of a `TOKEN value` pair, case-insensitive
fn position_of(args: &[String], token: &str) -> Option<usize> {
    args.iter()
        .enumerate()
        .skip(1)
        .find(|(ix, a)| a.eq_ignore_ascii_case(token) && ix + 1 < args.len())
        .map(|(ix, _)| ix)
}

/// Batch size derived from the key count
fn default_batch(dbsize: Result<i64>) -> Option<u64> {
    match dbsize {
        Ok(0) => None,
        Ok(n) => Some((n.max(0) as u64 / 10).clamp(MIN_BATCH, MAX_BATCH)),
        Err(e) => {
            debug!(error = %e, "dbsize unavailable, using fallback batch");
            Some(FALLBACK_BATCH)
        }
    }
}

/// Collect every key matching the glob with cursor-based SCAN
fn scan_keys(client: &mut dyn StoreClient, args: &MatchArgs) -> Result<Vec<Vec<u8>>> {
    let count = match args.count {
        Some(n) => n,
        None => match default_batch(client.dbsize()) {
            Some(n) => n,
            None => return Ok(Vec::new()),
        },
    };

    let mut keys = Vec::new();
    let mut cursor = 0u64;
    loop {
        let (next, page) = client.scan(cursor, &args.pattern, count)?;
        keys.extend(page);
        if next == 0 {
            break;
        }
        cursor = next;
    }
    debug!(pattern = %args.pattern, count, matched = keys.len(), "scan complete");
    Ok(keys)
}

impl MetaCommand for ScanAll {
    fn name(&self) -> &'static str {
        "scanall"
    }

    fn usage(&self) -> &'static str {
        "pattern [MATCH pattern] [COUNT count]"
    }

    fn description(&self) -> &'static str {
        "List every key matching a pattern"
    }

    fn run(&self, client: &mut dyn StoreClient, command: &Command) -> Result<Reply> {
        let args = MatchArgs::parse(command, "ScanAll")?;
        Ok(Reply::from(scan_keys(client, &args)?))
    }
}

impl MetaCommand for GetMatch {
    fn name(&self) -> &'static str {
        "getmatch"
    }

    fn usage(&self) -> &'static str {
        "pattern [COUNT count]"
    }

    fn description(&self) -> &'static str {
        "Fetch the value of every key matching a pattern"
    }

    fn run(&self, client: &mut dyn StoreClient, command: &Command) -> Result<Reply> {
        let args = MatchArgs::parse(command, "GetMatch")?;
        let keys = scan_keys(client, &args)?;

        let mut values = Vec::with_capacity(keys.len());
        for key in keys {
            let kind = client.key_type(&key)?;
            let value = match kind.as_str() {
                "hash" => Reply::Map(
                    client
                        .hgetall(&key)?
                        .into_iter()
                        .map(|(f, v)| (String::from_utf8_lossy(&f).into_owned(), Reply::bytes(&v)))
                        .collect(),
                ),
                "list" => Reply::from(client.lrange_all(&key)?),
                "string" => client.get(&key)?.map(|v| Reply::bytes(&v)).unwrap_or(Reply::Null),
                _ => Reply::Text(kind),
            };
            values.push((String::from_utf8_lossy(&key).into_owned(), value));
        }
        Ok(Reply::Map(values))
    }
}

impl MetaCommand for DelAll {
    fn name(&self) -> &'static str {
        "delall"
    }

    fn usage(&self) -> &'static str {
        "pattern [COUNT count]"
    }

    fn description(&self) -> &'static str {
        "Delete every key matching a pattern"
    }

    fn run(&self, client: &mut dyn StoreClient, command: &Command) -> Result<Reply> {
        let args = MatchArgs::parse(command, "DelAll")?;
        let keys = scan_keys(client, &args)?;

        // Keys of one batch may live on different shards.
        let batch = if command.options.cluster { 1 } else { DEL_BATCH };
        let mut deleted = 0;
        for chunk in keys.chunks(batch) {
            deleted += client.del(chunk)?;
        }
        debug!(targeted = keys.len(), deleted, cluster = command.options.cluster, "delall");
        Ok(Reply::from(keys))
    }
}
