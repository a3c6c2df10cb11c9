//! Shadow MySQL credentials used by doublers.

use crate::error::{ChxError, ChxResult};
use serde_json::{Map, Value};

pub const DEFAULT_MYSQL_PORT: u16 = 3306;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MySqlCredentials {
    pub database: String,
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
}

impl MySqlCredentials {
    /// Reads the raw `shadow_source` settings section.
    ///
    /// `database`, `host`, `username` and `password` must be non-empty; `port`
    /// may be a number or a numeric string and defaults to 3306.
    pub fn from_config(config: &Map<String, Value>) -> ChxResult<Self> {
        let required = |key: &str| -> ChxResult<String> {
            match config.get(key) {
                Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
                Some(Value::Number(n)) => Ok(n.to_string()),
                _ => Err(ChxError::MissingCredentials(key.to_string())),
            }
        };

        let database = required("database")?;
        let host = required("host")?;
        let username = required("username")?;
        let password = required("password")?;

        let port = match config.get("port") {
            None | Some(Value::Null) => DEFAULT_MYSQL_PORT,
            Some(Value::Number(n)) => n
                .as_u64()
                .and_then(|p| u16::try_from(p).ok())
                .ok_or_else(|| ChxError::Config(format!("invalid MySQL port {n}")))?,
            Some(Value::String(s)) => s
                .parse()
                .map_err(|_| ChxError::Config(format!("invalid MySQL port '{s}'")))?,
            Some(other) => {
                return Err(ChxError::Config(format!("invalid MySQL port {other}")));
            }
        };

        Ok(Self {
            database,
            host,
            port,
            username,
            password,
        })
    }
}
