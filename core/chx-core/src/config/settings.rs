//! Process settings
//!
//! Loaded from a JSON document; a few keys can be overridden from the environment.

use crate::error::{ChxError, ChxResult};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Web 요청 타임아웃
pub const INTERACTIVE_TIMEOUT: Duration = Duration::from_secs(150);

/// 배치/CLI 타임아웃
pub const BATCH_TIMEOUT: Duration = Duration::from_secs(1500);

/// Connection profile for one logical server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProfileConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub database: String,
    pub https: bool,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8123,
            username: "default".to_string(),
            password: String::new(),
            database: "default".to_string(),
            https: false,
        }
    }
}

impl ProfileConfig {
    pub fn with_database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }
}

/// Interactive requests and batch jobs get different connection timeouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConnectionMode {
    #[default]
    Interactive,
    Batch,
}

impl ConnectionMode {
    pub fn timeout(&self) -> Duration {
        match self {
            ConnectionMode::Interactive => INTERACTIVE_TIMEOUT,
            ConnectionMode::Batch => BATCH_TIMEOUT,
        }
    }

    pub fn parse_mode(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "interactive" | "web" => Some(ConnectionMode::Interactive),
            "batch" | "cli" => Some(ConnectionMode::Batch),
            _ => None,
        }
    }
}

/// How an existing doubler's DDL is compared with the expected one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DdlComparison {
    /// Byte-for-byte
    #[default]
    Exact,
    /// Runs of whitespace compare equal
    IgnoreWhitespace,
}

impl DdlComparison {
    pub fn matches(&self, expected: &str, actual: &str) -> bool {
        match self {
            DdlComparison::Exact => expected == actual,
            DdlComparison::IgnoreWhitespace => expected
                .split_whitespace()
                .eq(actual.split_whitespace()),
        }
    }
}

fn default_temp_table_prefix() -> String {
    "temp".to_string()
}

fn default_staging_dir() -> PathBuf {
    env::temp_dir()
}

fn default_mutations_check_interval_ms() -> u64 {
    1000
}

fn default_schema_cache_capacity() -> usize {
    256
}

/// 전체 설정
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// `default` profile
    #[serde(default)]
    pub server: ProfileConfig,

    /// Every other profile (`writer`, `temp`, ...)
    #[serde(default)]
    pub writers: BTreeMap<String, ProfileConfig>,

    /// Raw shadow MySQL credentials used by doublers
    #[serde(default)]
    pub shadow_source: Map<String, Value>,

    #[serde(default)]
    pub use_doublers: bool,

    #[serde(default)]
    pub test_mode: bool,

    /// JSON file of persisted feature flags, applied over `use_doublers`/`test_mode`
    #[serde(default)]
    pub feature_flags_path: Option<PathBuf>,

    #[serde(default = "default_temp_table_prefix")]
    pub temp_table_prefix: String,

    /// Root of the bulk transaction staging area
    #[serde(default = "default_staging_dir")]
    pub staging_dir: PathBuf,

    #[serde(default)]
    pub connection_mode: ConnectionMode,

    #[serde(default = "default_mutations_check_interval_ms")]
    pub mutations_check_interval_ms: u64,

    #[serde(default)]
    pub ddl_comparison: DdlComparison,

    #[serde(default = "default_schema_cache_capacity")]
    pub schema_cache_capacity: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ProfileConfig::default(),
            writers: BTreeMap::new(),
            shadow_source: Map::new(),
            use_doublers: false,
            test_mode: false,
            feature_flags_path: None,
            temp_table_prefix: default_temp_table_prefix(),
            staging_dir: default_staging_dir(),
            connection_mode: ConnectionMode::default(),
            mutations_check_interval_ms: default_mutations_check_interval_ms(),
            ddl_comparison: DdlComparison::default(),
            schema_cache_capacity: default_schema_cache_capacity(),
        }
    }
}

impl Settings {
    /// JSON 파일에서 로드
    pub fn from_file(path: impl AsRef<Path>) -> ChxResult<Self> {
        let json = fs::read_to_string(path.as_ref())?;
        Self::from_json(&json)
    }

    pub fn from_json(json: &str) -> ChxResult<Self> {
        let settings: Settings = serde_json::from_str(json)?;
        if settings.temp_table_prefix.is_empty() {
            return Err(ChxError::Config(
                "temp_table_prefix must not be empty".to_string(),
            ));
        }
        Ok(settings)
    }

    /// `CHX_*` 환경 변수 적용
    pub fn apply_env(mut self) -> ChxResult<Self> {
        if let Ok(prefix) = env::var("CHX_TEMP_TABLE_PREFIX")
            && !prefix.is_empty()
        {
            self.temp_table_prefix = prefix;
        }
        if let Ok(dir) = env::var("CHX_STAGING_DIR")
            && !dir.is_empty()
        {
            self.staging_dir = PathBuf::from(dir);
        }
        if let Ok(mode) = env::var("CHX_CONNECTION_MODE") {
            self.connection_mode = ConnectionMode::parse_mode(&mode)
                .ok_or_else(|| ChxError::Config(format!("unknown connection mode '{mode}'")))?;
        }
        Ok(self)
    }

    /// Profile lookup: `default` is the server section, anything else a writer.
    pub fn profile(&self, name: &str) -> ChxResult<&ProfileConfig> {
        if name == "default" {
            return Ok(&self.server);
        }
        self.writers
            .get(name)
            .ok_or_else(|| ChxError::ProfileNotConfigured(name.to_string()))
    }

    pub fn with_writer(mut self, name: &str, config: ProfileConfig) -> Self {
        self.writers.insert(name.to_string(), config);
        self
    }

    pub fn timeout(&self) -> Duration {
        self.connection_mode.timeout()
    }

    pub fn mutations_check_interval(&self) -> Duration {
        Duration::from_millis(self.mutations_check_interval_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_document() {
        let settings = Settings::from_json("{}").unwrap();
        assert_eq!(settings.temp_table_prefix, "temp");
        assert_eq!(settings.connection_mode, ConnectionMode::Interactive);
        assert_eq!(settings.timeout(), Duration::from_secs(150));
        assert_eq!(settings.ddl_comparison, DdlComparison::Exact);
        assert!(!settings.use_doublers);
        assert!(settings.feature_flags_path.is_none());
    }

    #[test]
    fn test_profile_lookup() {
        let settings = Settings::from_json(
            r#"{
                "server": {"host": "ch-reader", "database": "analytics"},
                "writers": {"writer": {"host": "ch-writer", "database": "analytics"}},
                "connection_mode": "batch"
            }"#,
        )
        .unwrap();

        assert_eq!(settings.profile("default").unwrap().host, "ch-reader");
        assert_eq!(settings.profile("writer").unwrap().port, 8123);
        assert!(matches!(
            settings.profile("ssdNode"),
            Err(ChxError::ProfileNotConfigured(name)) if name == "ssdNode"
        ));
        assert_eq!(settings.timeout(), Duration::from_secs(1500));
    }

    #[test]
    fn test_empty_prefix_rejected() {
        let result = Settings::from_json(r#"{"temp_table_prefix": ""}"#);
        assert!(matches!(result, Err(ChxError::Config(_))));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("chx.json");
        fs::write(&path, r#"{"use_doublers": true, "ddl_comparison": "ignore_whitespace"}"#)
            .unwrap();

        let settings = Settings::from_file(&path).unwrap();
        assert!(settings.use_doublers);
        assert_eq!(settings.ddl_comparison, DdlComparison::IgnoreWhitespace);
    }

    #[test]
    fn test_ddl_comparison() {
        assert!(DdlComparison::Exact.matches("A  B", "A  B"));
        assert!(!DdlComparison::Exact.matches("A  B", "A B"));
        assert!(DdlComparison::IgnoreWhitespace.matches("A  B\n", "A B"));
        assert!(!DdlComparison::IgnoreWhitespace.matches("A B", "A C"));
    }

    #[test]
    fn test_connection_mode_parse() {
        assert_eq!(ConnectionMode::parse_mode("CLI"), Some(ConnectionMode::Batch));
        assert_eq!(ConnectionMode::parse_mode("web"), Some(ConnectionMode::Interactive));
        assert_eq!(ConnectionMode::parse_mode("other"), None);
    }
}
