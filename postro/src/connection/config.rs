//! Postgres configuration.
use std::{borrow::Cow, env::var, fmt};

use crate::{common::ByteStr, phase::StartupConfig};

/// Postgres connection config.
#[derive(Clone, Debug)]
pub struct Config {
    pub(crate) user: ByteStr,
    pub(crate) pass: ByteStr,
    pub(crate) host: ByteStr,
    pub(crate) port: u16,
    pub(crate) dbname: ByteStr,
}

impl Config {
    /// Retrieve configuration from environment variable.
    ///
    /// It reads:
    /// - `PGUSER`
    /// - `PGPASS`
    /// - `PGHOST`
    /// - `PGDATABASE`
    /// - `PGPORT`
    ///
    /// Additionally, it also reads `DATABASE_URL` to provide missing values
    /// before falling back to the default value.
    pub fn from_env() -> Config {
        let url = var("DATABASE_URL").ok().and_then(|e| Config::parse_inner(e.into()).ok());

        macro_rules! env {
            ($name:literal,$or:ident,$def:expr) => {
                match (var($name), url.as_ref()) {
                    (Ok(ok), _) => ok.into(),
                    (Err(_), Some(e)) => e.$or.clone(),
                    (Err(_), None) => $def.into(),
                }
            };
        }

        let user = env!("PGUSER", user, "postgres");
        let pass = env!("PGPASS", pass, "");
        let host = env!("PGHOST", host, "localhost");
        let dbname = env!("PGDATABASE", dbname, user.clone());

        let port = match (var("PGPORT"), url.as_ref()) {
            (Ok(ok), _) => ok.parse().unwrap_or(5432),
            (Err(_), Some(e)) => e.port,
            (Err(_), None) => 5432,
        };

        Self { user, pass, host, port, dbname }
    }

    /// Parse config from a connection string.
    ///
    /// The connection string is a sequence of `key=value` pairs separated by
    /// `;`, keys matched case-insensitively. Unknown keys are ignored.
    ///
    /// | key | aliases | default |
    /// |---|---|---|
    /// | `host` | `server` | `localhost` |
    /// | `port` | | `5432` |
    /// | `database` | `db` | empty |
    /// | `username` | `user`, `uid` | empty |
    /// | `password` | `pwd` | empty |
    pub fn parse(conn_str: &str) -> Result<Config, ParseError> {
        Self::parse_inner(ByteStr::copy_from_str(conn_str))
    }

    /// Parse config from a static connection string.
    ///
    /// This is for micro optimization, see [`Bytes::from_static`][1].
    ///
    /// [1]: bytes::Bytes::from_static
    pub fn parse_static(conn_str: &'static str) -> Result<Config, ParseError> {
        Self::parse_inner(ByteStr::from_static(conn_str))
    }

    fn parse_inner(conn_str: ByteStr) -> Result<Self, ParseError> {
        let mut host = None;
        let mut port = None;
        let mut dbname = None;
        let mut user = None;
        let mut pass = None;

        for pair in conn_str.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }

            let Some((key, value)) = pair.split_once('=') else {
                return Err(ParseError { reason: format!("malformed key=value pair: {pair:?}").into() });
            };
            let value = value.trim();

            match key.trim().to_ascii_lowercase().as_str() {
                "host" | "server" => host = Some(conn_str.slice_ref(value)),
                "port" => port = Some(
                    value.parse().map_err(|_| ParseError { reason: "invalid port".into() })?
                ),
                "database" | "db" => dbname = Some(conn_str.slice_ref(value)),
                "username" | "user" | "uid" => user = Some(conn_str.slice_ref(value)),
                "password" | "pwd" => pass = Some(conn_str.slice_ref(value)),
                // unknown keys ignored
                _ => {},
            }
        }

        Ok(Self {
            user: user.unwrap_or_default(),
            pass: pass.unwrap_or_default(),
            host: host.unwrap_or_else(|| ByteStr::from_static("localhost")),
            port: port.unwrap_or(5432),
            dbname: dbname.unwrap_or_default(),
        })
    }
}

impl<'a> From<&'a Config> for StartupConfig<'a> {
    fn from(me: &'a Config) -> StartupConfig<'a> {
        StartupConfig {
            user: me.user.as_ref().into(),
            database: Some(me.dbname.as_ref().into()),
            password: Some(me.pass.as_ref().into()),
            replication: None,
        }
    }
}

impl std::str::FromStr for Config {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Error when parsing url.
pub struct ParseError {
    pub(crate) reason: Cow<'static, str>,
}

impl std::error::Error for ParseError {}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if f.alternate() {
            return f.write_str(&self.reason);
        }
        write!(f, "failed to parse url: {}", self.reason)
    }
}

impl fmt::Debug for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
