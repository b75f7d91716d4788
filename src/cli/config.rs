//! CLI Configuration and Arguments
//!
//! Command-line argument parsing, the optional TOML config file, and the
//! connection options derived from both.

use std::fs;
use std::path::{Path, PathBuf};

use clap::Parser;
use serde::Deserialize;

use crate::cli::executor::FormatType;
use crate::error::{CliError, Result};

pub const DEFAULT_PORT: i64 = 6379;

/// redis-shell - interactive client for Redis-protocol servers
#[derive(Parser, Debug, Clone)]
#[command(name = "redis-shell")]
#[command(version)]
#[command(about = "Interactive CLI for Redis-protocol key-value stores", long_about = None)]
#[command(disable_help_flag = true)]
pub struct CliArgs {
    /// Server hostname
    #[arg(short = 'h', long)]
    pub host: Option<String>,

    /// Server port
    #[arg(short, long)]
    pub port: Option<i64>,

    /// Unix socket file (takes precedence over host/port)
    #[arg(long)]
    pub socket: Option<PathBuf>,

    /// Password for authentication
    #[arg(short = 'a', long)]
    pub password: Option<String>,

    /// Database number
    #[arg(short = 'n', long)]
    pub database: Option<i64>,

    /// Enable TLS
    #[arg(long)]
    pub ssl: bool,

    /// TLS server name (not applied: the name is always taken from --host)
    #[arg(long)]
    pub ssl_host: Option<String>,

    /// Cluster mode (delete keys one at a time)
    #[arg(short = 'c', long)]
    pub cluster: bool,

    /// Enable debug logging
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Path to a TOML config file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print help
    #[arg(long, action = clap::ArgAction::Help)]
    pub help: Option<bool>,

    /// Command and its arguments; starts the REPL when omitted
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// Where and how to reach the server. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionOptions {
    pub host: String,
    pub port: i64,
    pub socket: Option<PathBuf>,
    pub password: Option<String>,
    pub database: i64,
    pub tls: bool,
    pub tls_host: Option<String>,
    pub cluster: bool,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl ConnectionOptions {
    /// Effective port; anything not positive falls back to the default
    pub fn port(&self) -> u16 {
        if self.port <= 0 || self.port > u16::MAX as i64 {
            DEFAULT_PORT as u16
        } else {
            self.port as u16
        }
    }

    /// Human-readable address, used for the prompt and error messages
    pub fn address(&self) -> String {
        match &self.socket {
            Some(path) => path.display().to_string(),
            None => format!("{}:{}", self.host, self.port()),
        }
    }
}

impl Default for ConnectionOptions {
    fn default() -> Self {
        ConnectionOptions {
            host: default_host(),
            port: DEFAULT_PORT,
            socket: None,
            password: None,
            database: 0,
            tls: false,
            tls_host: None,
            cluster: false,
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

/// Config file structure
#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub repl: ReplConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: i64,
    #[serde(default)]
    pub database: i64,
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_secs: u64,
    #[serde(default = "default_read_timeout")]
    pub read_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_format")]
    pub format: String,
    #[serde(default = "default_color")]
    pub color: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplConfig {
    #[serde(default = "default_history_size")]
    pub history_size: usize,
    #[serde(default)]
    pub history_file: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> i64 {
    DEFAULT_PORT
}

fn default_connect_timeout() -> u64 {
    5
}

fn default_read_timeout() -> u64 {
    10
}

fn default_format() -> String {
    "normal".to_string()
}

fn default_color() -> bool {
    true
}

fn default_history_size() -> usize {
    10000
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        ConnectionConfig {
            host: default_host(),
            port: default_port(),
            database: 0,
            connect_timeout_secs: default_connect_timeout(),
            read_timeout_secs: default_read_timeout(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            format: default_format(),
            color: default_color(),
        }
    }
}

impl Default for ReplConfig {
    fn default() -> Self {
        ReplConfig {
            history_size: default_history_size(),
            history_file: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
        }
    }
}

impl FileConfig {
    /// Load from an explicit path; the file must exist
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::Config {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    /// Load the explicit path if given, else the default location if present
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        match explicit {
            Some(path) => Self::from_file(path),
            None => match default_config_path() {
                Some(path) if path.exists() => Self::from_file(path),
                _ => Ok(FileConfig::default()),
            },
        }
    }

    pub fn default_format(&self) -> FormatType {
        FormatType::parse(&self.output.format)
    }

    pub fn history_path(&self) -> Option<PathBuf> {
        self.repl
            .history_file
            .clone()
            .or_else(|| dirs::data_dir().map(|p| p.join("redis-shell").join("history")))
    }
}

fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("redis-shell").join("config.toml"))
}

impl CliArgs {
    /// Merge flags over the file config; flags win
    pub fn connection_options(&self, file: &FileConfig) -> ConnectionOptions {
        ConnectionOptions {
            host: self.host.clone().unwrap_or_else(|| file.connection.host.clone()),
            port: self.port.unwrap_or(file.connection.port),
            socket: self.socket.clone().filter(|p| !p.as_os_str().is_empty()),
            password: self.password.clone().filter(|p| !p.is_empty()),
            database: self.database.unwrap_or(file.connection.database),
            tls: self.ssl,
            tls_host: self.ssl_host.clone().filter(|h| !h.is_empty()),
            cluster: self.cluster,
            connect_timeout_secs: file.connection.connect_timeout_secs,
            read_timeout_secs: file.connection.read_timeout_secs,
        }
    }

    /// Log filter directive for the subscriber
    pub fn log_level(&self, file: &FileConfig) -> String {
        if self.verbose {
            "debug".to_string()
        } else {
            file.logging.level.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_parse_connection_flags() {
        let args = CliArgs::parse_from([
            "redis-shell", "-h", "10.0.0.1", "-p", "7000", "-a", "secret", "-n", "3", "--ssl", "-c",
            "get", "key", "-f", "json",
        ]);
        let opts = args.connection_options(&FileConfig::default());
        assert_eq!(opts.host, "10.0.0.1");
        assert_eq!(opts.port(), 7000);
        assert_eq!(opts.password.as_deref(), Some("secret"));
        assert_eq!(opts.database, 3);
        assert!(opts.tls);
        assert!(opts.cluster);
        assert_eq!(args.command, vec!["get", "key", "-f", "json"]);
    }

    #[test]
    fn test_defaults() {
        let args = CliArgs::parse_from(["redis-shell"]);
        let opts = args.connection_options(&FileConfig::default());
        assert_eq!(opts.address(), "localhost:6379");
        assert!(args.command.is_empty());
    }

    #[test]
    fn test_non_positive_port_falls_back() {
        let opts = ConnectionOptions {
            port: 0,
            ..ConnectionOptions::default()
        };
        assert_eq!(opts.port(), 6379);
    }

    #[test]
    fn test_socket_address() {
        let args = CliArgs::parse_from(["redis-shell", "--socket", "/tmp/redis.sock"]);
        let opts = args.connection_options(&FileConfig::default());
        assert_eq!(opts.address(), "/tmp/redis.sock");
    }

    #[test]
    fn test_file_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(
            file,
            "[connection]\nhost = \"cache.local\"\nport = 6380\n\n[output]\nformat = \"json\"\n\n[logging]\nlevel = \"info\""
        )
        .unwrap();

        let config = FileConfig::from_file(file.path()).unwrap();
        assert_eq!(config.connection.host, "cache.local");
        assert_eq!(config.connection.read_timeout_secs, 10);
        assert_eq!(config.default_format(), FormatType::Json);
        assert_eq!(config.repl.history_size, 10000);

        // Flags override the file
        let args = CliArgs::parse_from(["redis-shell", "-p", "7001", "-v"]);
        let opts = args.connection_options(&config);
        assert_eq!(opts.host, "cache.local");
        assert_eq!(opts.port(), 7001);
        assert_eq!(args.log_level(&config), "debug");
    }

    #[test]
    fn test_invalid_file_config() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[connection\nport = ").unwrap();
        let err = FileConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, CliError::Config { .. }));
    }
}
