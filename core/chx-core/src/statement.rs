//! Dictionary DDL helpers: read and swap the MySQL source options.

use crate::error::{ChxError, ChxResult};
use regex::Regex;
use std::collections::BTreeMap;
use std::sync::LazyLock;

static MYSQL_SOURCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)SOURCE\s*\(\s*MYSQL\s*\(\s*(?P<options>.+?)\s*\)\s*\)")
        .unwrap_or_else(|e| panic!("invalid MySQL source pattern: {e}"))
});

static OPTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<key>\w+)\s+(?P<value>\w+|'[^']+')\s*")
        .unwrap_or_else(|e| panic!("invalid option pattern: {e}"))
});

/// `SOURCE(MYSQL(host 'h' port 3306 ...))` → `{"host": "h", "port": "3306", ...}`
///
/// Keys are lower-cased and quotes are trimmed. Parsing stops at the first
/// token that is not a `key value` pair.
pub fn extract_credentials(statement: &str) -> ChxResult<BTreeMap<String, String>> {
    let captures = MYSQL_SOURCE.captures(statement).ok_or_else(|| {
        ChxError::InvalidArguments("not a CREATE DICTIONARY statement over MySQL".to_string())
    })?;
    let options = captures.name("options").map_or("", |m| m.as_str());

    let mut result = BTreeMap::new();
    let mut rest = options;
    while !rest.is_empty() {
        let Some(option) = OPTION.captures(rest) else {
            break;
        };
        let key = option.name("key").map_or("", |m| m.as_str());
        let value = option.name("value").map_or("", |m| m.as_str());
        result.insert(key.to_lowercase(), value.trim_matches('\'').to_string());

        let consumed = option.get(0).map_or(rest.len(), |m| m.end());
        rest = &rest[consumed..];
    }
    Ok(result)
}

/// Plain-text replacement where the total number of occurrences must equal the
/// number of pairs.
pub fn replace_credentials(statement: &str, replacements: &[(&str, &str)]) -> ChxResult<String> {
    let occurrences: usize = replacements
        .iter()
        .map(|(from, _)| statement.matches(from).count())
        .sum();
    if occurrences != replacements.len() {
        return Err(ChxError::DdlRewrite(format!(
            "expected {} replacements, found {occurrences}",
            replacements.len()
        )));
    }

    Ok(replacements
        .iter()
        .fold(statement.to_string(), |acc, (from, to)| acc.replace(from, to)))
}
