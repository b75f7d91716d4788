//! Store Client
//!
//! The connection seam the executor talks to, and its `redis`-backed
//! implementation.

use std::time::Duration;

use redis::{ConnectionAddr, ConnectionInfo, RedisConnectionInfo};
use tracing::{debug, info, warn};

use super::config::ConnectionOptions;
use super::reply::Reply;
use crate::error::{CliError, Result};

/// Primitive operations the shell needs from a server connection.
///
/// Keys and values are raw bytes; the server does not require UTF-8.
pub trait StoreClient {
    /// Send a raw argument list as one command
    fn command(&mut self, args: &[String]) -> Result<Reply>;

    fn ping(&mut self) -> Result<String>;

    fn dbsize(&mut self) -> Result<i64>;

    /// One page of a cursor-based key scan: `(next_cursor, keys)`
    fn scan(&mut self, cursor: u64, pattern: &str, count: u64) -> Result<(u64, Vec<Vec<u8>>)>;

    fn key_type(&mut self, key: &[u8]) -> Result<String>;

    /// Field/value pairs in server order
    fn hgetall(&mut self, key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    fn lrange_all(&mut self, key: &[u8]) -> Result<Vec<Vec<u8>>>;

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    fn del(&mut self, keys: &[Vec<u8>]) -> Result<i64>;
}

/// Connection backed by the `redis` crate
pub struct RedisClient {
    con: redis::Connection,
}

impl RedisClient {
    /// Connect to a server using the given options
    pub fn connect(opts: &ConnectionOptions) -> Result<Self> {
        let conn_err = |e: redis::RedisError| CliError::Connection {
            address: opts.address(),
            reason: e.to_string(),
        };

        if let (true, Some(name)) = (opts.tls, &opts.tls_host) {
            warn!(
                server_name = %name,
                host = %opts.host,
                "TLS server name override is not supported; verifying against the host"
            );
        }

        let client = redis::Client::open(connection_info(opts)).map_err(conn_err)?;
        let con = client
            .get_connection_with_timeout(Duration::from_secs(opts.connect_timeout_secs))
            .map_err(conn_err)?;
        con.set_read_timeout(Some(Duration::from_secs(opts.read_timeout_secs)))
            .map_err(conn_err)?;

        info!(address = %opts.address(), tls = opts.tls, db = opts.database, "connected");
        Ok(RedisClient { con })
    }
}

/// Build the `redis` connection info. A socket path wins over host/port.
fn connection_info(opts: &ConnectionOptions) -> ConnectionInfo {
    let addr = match &opts.socket {
        Some(path) => ConnectionAddr::Unix(path.clone()),
        // SNI is taken from the dialed host.
        None if opts.tls => ConnectionAddr::TcpTls {
            host: opts.host.clone(),
            port: opts.port(),
            insecure: false,
            tls_params: None,
        },
        None => ConnectionAddr::Tcp(opts.host.clone(), opts.port()),
    };

    ConnectionInfo {
        addr,
        redis: RedisConnectionInfo {
            db: opts.database,
            password: opts.password.clone(),
            ..Default::default()
        },
    }
}

impl StoreClient for RedisClient {
    fn command(&mut self, args: &[String]) -> Result<Reply> {
        let (name, rest) = args
            .split_first()
            .ok_or_else(|| CliError::argument("empty command"))?;
        debug!(command = %name, args = rest.len(), "pass-through");

        let mut cmd = redis::cmd(name);
        for arg in rest {
            cmd.arg(arg);
        }
        let value: redis::Value = cmd.query(&mut self.con)?;
        Ok(Reply::from(value))
    }

    fn ping(&mut self) -> Result<String> {
        Ok(redis::cmd("PING").query(&mut self.con)?)
    }

    fn dbsize(&mut self) -> Result<i64> {
        Ok(redis::cmd("DBSIZE").query(&mut self.con)?)
    }

    fn scan(&mut self, cursor: u64, pattern: &str, count: u64) -> Result<(u64, Vec<Vec<u8>>)> {
        Ok(redis::cmd("SCAN")
            .arg(cursor)
            .arg("MATCH")
            .arg(pattern)
            .arg("COUNT")
            .arg(count)
            .query(&mut self.con)?)
    }

    fn key_type(&mut self, key: &[u8]) -> Result<String> {
        Ok(redis::cmd("TYPE").arg(key).query(&mut self.con)?)
    }

    fn hgetall(&mut self, key: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let flat: Vec<Vec<u8>> = redis::cmd("HGETALL").arg(key).query(&mut self.con)?;
        Ok(pairs(flat))
    }

    fn lrange_all(&mut self, key: &[u8]) -> Result<Vec<Vec<u8>>> {
        Ok(redis::cmd("LRANGE").arg(key).arg(0).arg(-1).query(&mut self.con)?)
    }

    fn get(&mut self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(redis::cmd("GET").arg(key).query(&mut self.con)?)
    }

    fn del(&mut self, keys: &[Vec<u8>]) -> Result<i64> {
        let mut cmd = redis::cmd("DEL");
        for key in keys {
            cmd.arg(key);
        }
        Ok(cmd.query(&mut self.con)?)
    }
}

/// Group a flat `[f1, v1, f2, v2, ...]` reply; a dangling field is dropped
fn pairs(flat: Vec<Vec<u8>>) -> Vec<(Vec<u8>, Vec<u8>)> {
    let mut out = Vec::with_capacity(flat.len() / 2);
    let mut iter = flat.into_iter();
    while let (Some(field), Some(value)) = (iter.next(), iter.next()) {
        out.push((field, value));
    }
    out
}
