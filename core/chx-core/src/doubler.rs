//! Doublers — 외부 소스(MySQL) 테이블의 shadow 복제본
//!
//! A doubler is a table or dictionary with the same shape as the original
//! external-source table, created next to it and pointed at the shadow MySQL
//! credentials. It is recreated only when its DDL differs from the expected one.

use crate::config::DdlComparison;
use crate::connection::Connection;
use crate::credentials::MySqlCredentials;
use crate::error::{ChxError, ChxResult};
use crate::identity::SourceKind;
use regex::{NoExpand, Regex};
use std::sync::LazyLock;
use tracing::{debug, info, instrument};

// ════════════════════════════════════════════
// DDL rewriters
// ════════════════════════════════════════════

/// DDL rewriter of one external-source kind.
pub trait ExternalSource: Send + Sync {
    fn kind(&self) -> SourceKind;

    /// Expected doubler DDL derived from the original DDL.
    fn make_create_doubler_statement(
        &self,
        original: &str,
        doubler_full_name: &str,
        credentials: &MySqlCredentials,
    ) -> ChxResult<String>;

    fn make_drop_doubler_statement(&self, doubler_full_name: &str) -> String;
}

fn pattern(re: &str) -> Regex {
    Regex::new(re).unwrap_or_else(|e| panic!("invalid DDL pattern {re}: {e}"))
}

static DICT_HOST: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)HOST '[^']+'"));
static DICT_PORT: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)PORT \d+"));
static DICT_USER: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)USER '[^']+'"));
static DICT_PASSWORD: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)PASSWORD '[^']+'"));
static DICT_DB: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)DB '[^']+'"));
static DICT_CREATE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)CREATE DICTIONARY [\w.]+"));

static MYSQL_ENGINE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)MySQL\([^)]+\)"));
static CREATE_TABLE: LazyLock<Regex> = LazyLock::new(|| pattern(r"(?i)CREATE TABLE [\w.]+"));

/// Replaces the first match of each pattern, in order; every pattern must match.
fn replace_each_once(statement: &str, replacements: &[(&Regex, String)]) -> ChxResult<String> {
    let mut result = statement.to_string();
    for (re, replacement) in replacements {
        if !re.is_match(&result) {
            return Err(ChxError::DdlRewrite(format!(
                "pattern {} not found in DDL",
                re.as_str()
            )));
        }
        result = re.replacen(&result, 1, NoExpand(replacement)).into_owned();
    }
    Ok(result)
}

/// Dictionary over a MySQL source
#[derive(Debug, Clone, Copy, Default)]
pub struct DictionarySource;

impl ExternalSource for DictionarySource {
    fn kind(&self) -> SourceKind {
        SourceKind::MySqlDictionary
    }

    fn make_create_doubler_statement(
        &self,
        original: &str,
        doubler_full_name: &str,
        credentials: &MySqlCredentials,
    ) -> ChxResult<String> {
        replace_each_once(
            original,
            &[
                (&DICT_HOST, format!("HOST '{}'", credentials.host)),
                (&DICT_PORT, format!("PORT {}", credentials.port)),
                (&DICT_USER, format!("USER '{}'", credentials.username)),
                (&DICT_PASSWORD, format!("PASSWORD '{}'", credentials.password)),
                (&DICT_DB, format!("DB '{}'", credentials.database)),
                (&DICT_CREATE, format!("CREATE DICTIONARY {doubler_full_name}")),
            ],
        )
    }

    fn make_drop_doubler_statement(&self, doubler_full_name: &str) -> String {
        format!("DROP DICTIONARY IF EXISTS {doubler_full_name}")
    }
}

/// Table on the `MySQL(...)` engine
#[derive(Debug, Clone, Copy, Default)]
pub struct MySqlEngineSource;

impl ExternalSource for MySqlEngineSource {
    fn kind(&self) -> SourceKind {
        SourceKind::MySqlEngine
    }

    fn make_create_doubler_statement(
        &self,
        original: &str,
        doubler_full_name: &str,
        credentials: &MySqlCredentials,
    ) -> ChxResult<String> {
        let not_mysql = || ChxError::DdlRewrite("table source is not MySQL".to_string());

        let engine = MYSQL_ENGINE.find(original).ok_or_else(not_mysql)?;
        let source_table = engine
            .as_str()
            .split(", ")
            .nth(2)
            .ok_or_else(not_mysql)?
            .trim_matches('\'');

        replace_each_once(
            original,
            &[
                (
                    &MYSQL_ENGINE,
                    format!(
                        "MySQL('{}:{}', '{}', '{}', '{}', '{}')",
                        credentials.host,
                        credentials.port,
                        credentials.database,
                        source_table,
                        credentials.username,
                        credentials.password
                    ),
                ),
                (&CREATE_TABLE, format!("CREATE TABLE {doubler_full_name}")),
            ],
        )
    }

    fn make_drop_doubler_statement(&self, doubler_full_name: &str) -> String {
        format!("DROP TABLE IF EXISTS {doubler_full_name}")
    }
}

// ════════════════════════════════════════════
// Init / refresh
// ════════════════════════════════════════════

/// `FakeDb-name_` → `fake_db_name_`
pub fn underscore(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 4);
    let mut prev_word = false;
    for c in value.chars() {
        let c = if c == '-' { '_' } else { c };
        if c.is_ascii_uppercase() && prev_word {
            out.push('_');
        }
        out.extend(c.to_lowercase());
        prev_word = c.is_ascii_alphanumeric() || c == '_';
    }
    out
}

/// Doubler bare name for `original` under the shadow database.
pub fn doubler_name(credentials: &MySqlCredentials, original: &str) -> String {
    format!("{}{original}", underscore(&format!("{}_", credentials.database)))
}

/// Makes sure the doubler of `original` exists with the expected DDL and returns its bare name.
///
/// Nothing is written when the existing doubler already matches.
#[instrument(skip(reader, source, credentials), fields(profile = reader.profile()))]
pub fn ensure_doubler(
    reader: &Connection,
    source: &dyn ExternalSource,
    original: &str,
    credentials: &MySqlCredentials,
    comparison: DdlComparison,
) -> ChxResult<String> {
    let database = reader.database();
    if database.is_empty() {
        return Err(ChxError::Config(format!(
            "cannot resolve the database of profile '{}'",
            reader.profile()
        )));
    }

    let name = doubler_name(credentials, original);
    let full_name = format!("{database}.{name}");

    let original_ddl = reader.create_table_statement(&format!("{database}.{original}"))?;
    let expected = source.make_create_doubler_statement(&original_ddl, &full_name, credentials)?;

    let current = if reader.table_exists(&full_name)? {
        Some(reader.create_table_statement(&full_name)?)
    } else {
        None
    };

    match current {
        Some(existing) if comparison.matches(&expected, &existing) => {
            debug!(doubler = %full_name, "doubler is up to date");
        }
        current => {
            info!(
                doubler = %full_name,
                existed = current.is_some(),
                "recreating {:?} doubler",
                source.kind()
            );
            let bindings = crate::client::Bindings::new();
            reader.write(&source.make_drop_doubler_statement(&full_name), &bindings)?;
            reader.write(&expected, &bindings)?;
        }
    }

    Ok(name)
}
