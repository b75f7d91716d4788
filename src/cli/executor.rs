//! Command Executor
//!
//! Runs one logical command against the connection, honoring repeat and
//! delay, and routes reserved names to meta-commands.

use std::fmt;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use tracing::{debug, trace};

use super::client::StoreClient;
use super::config::ConnectionOptions;
use super::meta;
use super::reply::Reply;
use crate::error::CliError;

/// How a successful reply is rendered
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FormatType {
    #[default]
    Normal,
    Json,
    Raw,
}

impl FormatType {
    /// Lenient parse; anything unrecognized is `Normal`
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "1" | "json" => FormatType::Json,
            "2" | "raw" | "rawstring" => FormatType::Raw,
            _ => FormatType::Normal,
        }
    }
}

impl fmt::Display for FormatType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatType::Normal => write!(f, "normal"),
            FormatType::Json => write!(f, "json"),
            FormatType::Raw => write!(f, "raw"),
        }
    }
}

/// Per-invocation options parsed from command flags
#[derive(Debug, Clone, PartialEq)]
pub struct CommandOptions {
    pub format: FormatType,
    pub repeat: u32,
    /// Seconds between repeats
    pub delay: f64,
    pub cluster: bool,
    pub no_color: bool,
}

impl Default for CommandOptions {
    fn default() -> Self {
        CommandOptions {
            format: FormatType::Normal,
            repeat: 1,
            delay: 0.0,
            cluster: false,
            no_color: false,
        }
    }
}

/// A command line: `args[0]` is the command name
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub args: Vec<String>,
    pub options: CommandOptions,
}

impl Command {
    pub fn new(args: Vec<String>, options: CommandOptions) -> Self {
        Command { args, options }
    }

    /// Lower-cased command name, used only for dispatch decisions
    pub fn name(&self) -> String {
        self.args.first().map(|s| s.to_lowercase()).unwrap_or_default()
    }
}

/// Outcome of one iteration of a command
#[derive(Debug)]
pub struct ExecutionResult {
    pub outcome: Result<Reply, CliError>,
    pub host: Arc<ConnectionOptions>,
    pub command: Arc<Command>,
}

impl ExecutionResult {
    pub fn value(&self) -> Option<&Reply> {
        self.outcome.as_ref().ok()
    }

    pub fn error(&self) -> Option<&CliError> {
        self.outcome.as_ref().err()
    }
}

/// Receiver of results produced by [`Executor::execute`].
pub trait ResultSink {
    /// Hand over one result. Returning `false` abandons remaining iterations.
    fn publish(&mut self, result: ExecutionResult) -> bool;

    /// Wait `delay` between iterations. Returning `false` means the consumer
    /// went away during the wait and remaining iterations are abandoned.
    fn pause(&mut self, delay: Duration) -> bool {
        thread::sleep(delay);
        true
    }

    /// End-of-sequence marker, called exactly once
    fn finish(&mut self);
}

impl ResultSink for Vec<ExecutionResult> {
    fn publish(&mut self, result: ExecutionResult) -> bool {
        self.push(result);
        true
    }

    fn finish(&mut self) {}
}

/// Owns the connection and runs commands one at a time
pub struct Executor {
    options: Arc<ConnectionOptions>,
    client: Box<dyn StoreClient + Send>,
}

impl Executor {
    pub fn new(options: ConnectionOptions, client: Box<dyn StoreClient + Send>) -> Self {
        Executor {
            options: Arc::new(options),
            client,
        }
    }

    /// Run `command` `repeat` times, publishing one result per iteration.
    pub fn execute(&mut self, mut command: Command, sink: &mut dyn ResultSink) {
        if command.args.is_empty() {
            sink.finish();
            return;
        }

        let name = command.name();
        if name == "info" {
            command.options.format = FormatType::Raw;
        }
        command.options.cluster |= self.options.cluster;

        let count = command.options.repeat.max(1);
        let delay = if count > 1 && command.options.delay > 0.0 {
            Duration::from_millis((command.options.delay * 1000.0) as u64)
        } else {
            Duration::ZERO
        };

        debug!(command = %name, repeat = count, delay_ms = delay.as_millis() as u64, "execute");

        let command = Arc::new(command);
        for iteration in 1..=count {
            let outcome = self.dispatch(&name, &command);
            trace!(iteration, ok = outcome.is_ok(), "iteration done");

            let result = ExecutionResult {
                outcome,
                host: Arc::clone(&self.options),
                command: Arc::clone(&command),
            };
            if !sink.publish(result) {
                debug!(iteration, "consumer gone, abandoning repeats");
                break;
            }
            if iteration < count && !delay.is_zero() && !sink.pause(delay) {
                debug!(iteration, "consumer gone during delay");
                break;
            }
        }
        sink.finish();
    }

    fn dispatch(&mut self, name: &str, command: &Command) -> Result<Reply, CliError> {
        match meta::lookup(name) {
            Some(handler) => handler.run(self.client.as_mut(), command),
            None => self.pass_through(name, command),
        }
    }

    fn pass_through(&mut self, name: &str, command: &Command) -> Result<Reply, CliError> {
        let reply = self.client.command(&command.args)?;
        Ok(match name {
            "hgetall" => reply.into_pairs(),
            _ => reply,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cli::client::mock::MemoryStore;
    use std::time::Instant;

    fn executor(store: MemoryStore) -> Executor {
        Executor::new(ConnectionOptions::default(), Box::new(store))
    }

    fn command(args: &[&str]) -> Command {
        Command::new(args.iter().map(|s| s.to_string()).collect(), CommandOptions::default())
    }

    #[test]
    fn test_format_type_parse() {
        assert_eq!(FormatType::parse("JSON"), FormatType::Json);
        assert_eq!(FormatType::parse("1"), FormatType::Json);
        assert_eq!(FormatType::parse("rawstring"), FormatType::Raw);
        assert_eq!(FormatType::parse("2"), FormatType::Raw);
        assert_eq!(FormatType::parse("whatever"), FormatType::Normal);
    }

    #[test]
    fn test_pass_through_preserves_case() {
        let store = MemoryStore::new();
        let log = store.calls();
        let mut exec = executor(store);
        let mut results = Vec::new();
        exec.execute(command(&["SET", "Key", "Value"]), &mut results);

        assert_eq!(results.len(), 1);
        assert_eq!(results[0].value(), Some(&Reply::text("OK")));
        assert_eq!(log.lock()[0], vec!["SET", "Key", "Value"]);
    }

    #[test]
    fn test_nil_is_not_an_error() {
        let mut exec = executor(MemoryStore::new());
        let mut results = Vec::new();
        exec.execute(command(&["get", "missing"]), &mut results);
        assert_eq!(results[0].value(), Some(&Reply::Null));
    }

    #[test]
    fn test_server_error_is_captured() {
        let mut exec = executor(MemoryStore::new());
        let mut results = Vec::new();
        exec.execute(command(&["bogus"]), &mut results);
        assert!(matches!(results[0].error(), Some(CliError::Transport(_))));
    }

    #[test]
    fn test_info_forces_raw() {
        let mut exec = executor(MemoryStore::new());
        let mut cmd = command(&["INFO"]);
        cmd.options.format = FormatType::Json;
        let mut results = Vec::new();
        exec.execute(cmd, &mut results);
        assert_eq!(results[0].command.options.format, FormatType::Raw);
    }

    #[test]
    fn test_hgetall_rewinds_pairs() {
        let mut store = MemoryStore::new();
        store.insert_hash("h", &[("f2", "v2"), ("f1", "v1")]);
        let mut exec = executor(store);
        let mut results = Vec::new();
        exec.execute(command(&["HGETALL", "h"]), &mut results);

        match results[0].value() {
            Some(Reply::Map(pairs)) => {
                let mut keys: Vec<&str> = pairs.iter().map(|(k, _)| k.as_str()).collect();
                keys.sort();
                assert_eq!(keys, vec!["f1", "f2"]);
            }
            other => panic!("expected map, got {:?}", other),
        }
    }

    #[test]
    fn test_repeat_with_delay() {
        let mut exec = executor(MemoryStore::new());
        let mut cmd = command(&["ping"]);
        cmd.options.repeat = 3;
        cmd.options.delay = 0.1;

        let start = Instant::now();
        let mut results = Vec::new();
        exec.execute(cmd, &mut results);
        let elapsed = start.elapsed();

        assert_eq!(results.len(), 3);
        assert!(elapsed >= Duration::from_millis(200));
        assert!(elapsed < Duration::from_millis(300 + 250));
    }

    #[test]
    fn test_single_run_never_sleeps() {
        let mut exec = executor(MemoryStore::new());
        let mut cmd = command(&["ping"]);
        cmd.options.delay = 5.0;

        let start = Instant::now();
        let mut results = Vec::new();
        exec.execute(cmd, &mut results);
        assert_eq!(results.len(), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    struct StopAfter {
        limit: usize,
        seen: usize,
        finished: bool,
    }

    impl ResultSink for StopAfter {
        fn publish(&mut self, _result: ExecutionResult) -> bool {
            self.seen += 1;
            self.seen < self.limit
        }

        fn finish(&mut self) {
            self.finished = true;
        }
    }

    #[test]
    fn test_sink_can_abandon_repeats() {
        let store = MemoryStore::new();
        let log = store.calls();
        let mut exec = executor(store);
        let mut cmd = command(&["ping"]);
        cmd.options.repeat = 5;

        let mut sink = StopAfter { limit: 2, seen: 0, finished: false };
        exec.execute(cmd, &mut sink);
        assert_eq!(sink.seen, 2);
        assert!(sink.finished);
        assert_eq!(log.lock().len(), 2);
    }

    struct LeaveDuringDelay {
        seen: usize,
        paused: Vec<Duration>,
    }

    impl ResultSink for LeaveDuringDelay {
        fn publish(&mut self, _result: ExecutionResult) -> bool {
            self.seen += 1;
            true
        }

        fn pause(&mut self, delay: Duration) -> bool {
            self.paused.push(delay);
            false
        }

        fn finish(&mut self) {}
    }

    #[test]
    fn test_interrupted_delay_stops_repeats() {
        let store = MemoryStore::new();
        let log = store.calls();
        let mut exec = executor(store);
        let mut cmd = command(&["ping"]);
        cmd.options.repeat = 4;
        cmd.options.delay = 30.0;

        let start = Instant::now();
        let mut sink = LeaveDuringDelay { seen: 0, paused: Vec::new() };
        exec.execute(cmd, &mut sink);

        assert!(start.elapsed() < Duration::from_secs(1));
        assert_eq!(sink.seen, 1);
        assert_eq!(sink.paused, vec![Duration::from_secs(30)]);
        assert_eq!(log.lock().len(), 1);
    }

    #[test]
    fn test_results_carry_context() {
        let mut exec = executor(MemoryStore::new());
        let mut results = Vec::new();
        exec.execute(command(&["ping"]), &mut results);
        assert_eq!(results[0].host.address(), "localhost:6379");
        assert_eq!(results[0].command.args, vec!["ping"]);
    }
}
