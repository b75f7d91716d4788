//! redis-shell - Main Entry Point

use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use colored::Colorize;
use parking_lot::Mutex;
use tracing_subscriber::EnvFilter;

use redis_shell::cli::client::{RedisClient, StoreClient};
use redis_shell::cli::config::{CliArgs, ConnectionOptions, FileConfig};
use redis_shell::cli::executor::{CommandOptions, Executor};
use redis_shell::cli::repl::{run_command, run_interactive};
use redis_shell::cli::runner::Runner;
use redis_shell::error::{CliError, Result};

fn main() -> anyhow::Result<()> {
    let args = CliArgs::parse();
    let file = FileConfig::load(args.config.as_deref())?;

    init_logging(&args.log_level(&file));
    if !file.output.color {
        colored::control::set_override(false);
    }

    let opts = args.connection_options(&file);
    let client = match connect(&opts) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("{}", e.to_string().red());
            std::process::exit(1);
        }
    };

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    let defaults = CommandOptions {
        format: file.default_format(),
        cluster: opts.cluster,
        no_color: !file.output.color,
        ..CommandOptions::default()
    };
    let executor = Executor::new(opts.clone(), Box::new(client));
    let runner = Runner::new(Arc::new(Mutex::new(executor)));

    if args.command.is_empty() {
        run_interactive(&runtime, &runner, &opts, &file, &defaults)?;
    } else {
        run_command(&runtime, &runner, args.command.clone(), &defaults)?;
    }
    Ok(())
}

/// Open the connection and make sure the server answers PING
fn connect(opts: &ConnectionOptions) -> Result<RedisClient> {
    let mut client = RedisClient::connect(opts)?;
    let unreachable = |reason: String| CliError::Connection {
        address: opts.address(),
        reason,
    };
    match client.ping() {
        Ok(pong) if pong == "PONG" => Ok(client),
        Ok(other) => Err(unreachable(format!("unexpected PING reply: {}", other))),
        Err(e) => Err(unreachable(e.to_string())),
    }
}

fn init_logging(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact()
        .init();
}
