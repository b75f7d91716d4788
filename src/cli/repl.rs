//! Interactive Shell
//!
//! Line editing, history, completion and hints around the runner. Also the
//! one-shot path used when a command is given on the command line.

use std::fs;
use std::io::{self, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use colored::Colorize;
use rustyline::error::ReadlineError;
use rustyline::history::DefaultHistory;
use rustyline::{
    Cmd, CompletionType, Config, EditMode, Editor, EventHandler, KeyCode, KeyEvent, Modifiers,
    Movement,
};
use rustyline::{Completer, Helper, Highlighter, Hinter, Validator};
use tokio::runtime::Runtime;
use tracing::{debug, warn};

use super::commands::{clear_screen, print_help};
use super::completer::{get_command_help, CommandCompleter};
use super::config::{ConnectionOptions, FileConfig};
use super::executor::{Command, CommandOptions, ExecutionResult};
use super::hinter::CommandHinter;
use super::output::format_reply;
use super::parser::{is_cli_command, parse_command, split_command_options};
use super::runner::{ResultStream, Runner, CLEAR_LINE};
use crate::error::{CliError, Result};

/// Combined helper for rustyline
#[derive(Completer, Helper, Highlighter, Hinter, Validator)]
pub struct CliHelper {
    #[rustyline(Completer)]
    completer: CommandCompleter,
    #[rustyline(Hinter)]
    hinter: CommandHinter,
}

impl CliHelper {
    pub fn new() -> Self {
        CliHelper {
            completer: CommandCompleter,
            hinter: CommandHinter,
        }
    }
}

impl Default for CliHelper {
    fn default() -> Self {
        Self::new()
    }
}

/// Ctrl-C while a command runs. A background task listens for the signal
/// and raises the flag; each command gets a fresh predicate over it.
struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    fn install(runtime: &Runtime) -> Self {
        let flag = Arc::new(AtomicBool::new(false));
        let raised = Arc::clone(&flag);
        runtime.spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                raised.store(true, Ordering::SeqCst);
            }
        });
        Interrupt { flag }
    }

    /// Clear any stale signal and hand out the cancel predicate
    fn arm(&self) -> impl Fn() -> bool + Send + 'static {
        self.flag.store(false, Ordering::SeqCst);
        let flag = Arc::clone(&self.flag);
        move || {
            if flag.swap(false, Ordering::SeqCst) {
                println!("{}Cancel", CLEAR_LINE);
                true
            } else {
                false
            }
        }
    }
}

/// Print every result of a running command, in order
pub async fn drain(mut stream: ResultStream) -> io::Result<()> {
    while let Some(result) = stream.next().await {
        print_result(&result)?;
    }
    Ok(())
}

fn print_result(result: &ExecutionResult) -> io::Result<()> {
    let stdout = io::stdout();
    let mut out = stdout.lock();
    match &result.outcome {
        Ok(reply) => format_reply(Some(reply), result.command.options.format, &mut out)?,
        Err(e) => {
            debug!(
                address = %result.host.address(),
                command = %result.command.name(),
                error = %e,
                "command failed"
            );
            write_error(&mut out, e, result.command.options.no_color)?;
        }
    }
    out.flush()
}

fn write_error(out: &mut dyn Write, e: &CliError, no_color: bool) -> io::Result<()> {
    let message = format!("(error) {}", e);
    if no_color {
        writeln!(out, "{}", message)
    } else {
        writeln!(out, "{}", message.red())
    }
}

/// Split flags and run the command to completion. A malformed flag is
/// printed, not returned.
fn execute_tokens<F>(
    runtime: &Runtime,
    runner: &Runner,
    tokens: Vec<String>,
    defaults: &CommandOptions,
    cancel: F,
) -> io::Result<()>
where
    F: Fn() -> bool + Send + 'static,
{
    let (options, args) = match split_command_options(tokens, defaults.clone()) {
        Ok(split) => split,
        Err(e) => return write_error(&mut io::stdout(), &e, defaults.no_color),
    };
    if args.is_empty() {
        return Ok(());
    }

    let command = Command::new(args, options);
    runtime.block_on(async move { drain(runner.start(command, cancel)).await })
}

/// Run a single command given on the command line. All repeats run.
pub fn run_command(
    runtime: &Runtime,
    runner: &Runner,
    tokens: Vec<String>,
    defaults: &CommandOptions,
) -> Result<()> {
    execute_tokens(runtime, runner, tokens, defaults, || false)?;
    Ok(())
}

/// Run the interactive shell until quit, Ctrl-D, or a double Ctrl-C
pub fn run_interactive(
    runtime: &Runtime,
    runner: &Runner,
    opts: &ConnectionOptions,
    file: &FileConfig,
    defaults: &CommandOptions,
) -> Result<()> {
    let config = Config::builder()
        .history_ignore_space(true)
        .completion_type(CompletionType::List)
        .edit_mode(EditMode::Emacs)
        .max_history_size(file.repl.history_size)?
        .build();

    let mut rl: Editor<CliHelper, DefaultHistory> = Editor::with_config(config)?;
    rl.set_helper(Some(CliHelper::new()));
    rl.bind_sequence(
        KeyEvent(KeyCode::Esc, Modifiers::NONE),
        EventHandler::Simple(Cmd::Kill(Movement::WholeLine)),
    );

    let history = file.history_path();
    if let Some(path) = &history {
        if let Some(parent) = path.parent() {
            let _ = fs::create_dir_all(parent);
        }
        if let Err(e) = rl.load_history(path) {
            debug!(path = %path.display(), error = %e, "no history loaded");
        }
    }

    let interrupt = Interrupt::install(runtime);
    let prompt = format!("{}> ", opts.address());
    let mut exit_armed = false;

    loop {
        match rl.readline(&prompt) {
            Ok(line) => {
                exit_armed = false;
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = rl.add_history_entry(input);

                let tokens = parse_command(input);
                let Some(first) = tokens.first() else {
                    continue;
                };

                if is_cli_command(first) {
                    match first.to_lowercase().as_str() {
                        "quit" | "exit" => break,
                        "clear" => clear_screen(),
                        _ => match tokens.get(1) {
                            Some(cmd) => match get_command_help(cmd) {
                                Some(help) => println!("{}", help.cyan()),
                                None => println!("{}", format!("Unknown command: {}", cmd).red()),
                            },
                            None => print_help(),
                        },
                    }
                    continue;
                }

                execute_tokens(runtime, runner, tokens, defaults, interrupt.arm())?;
            }
            Err(ReadlineError::Interrupted) => {
                if exit_armed {
                    println!("Exit, bye.");
                    break;
                }
                println!("To exit, press Ctrl + C again.");
                exit_armed = true;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e.into()),
        }
    }

    if let Some(path) = &history {
        if let Err(e) = rl.save_history(path) {
            warn!(path = %path.display(), error = %e, "could not save history");
        }
    }
    Ok(())
}
