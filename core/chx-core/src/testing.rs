//! In-memory scripted client for tests
//!
//! `RecordingClient` keeps a tiny catalog (DDL, columns and rows per table), answers
//! the catalog queries the access layer issues (`DESCRIBE`, `SHOW CREATE TABLE`,
//! `EXISTS TABLE`) and records every statement. Anything else returns the canned
//! response registered for a matching SQL fragment, or an empty result.
//!
//! Clones share state, and the client doubles as a [`ClientFactory`] whose clients
//! report the database of the profile they were created for. Table names are
//! stored without the database prefix.

use crate::client::{Bindings, Client, ClientFactory, Row, RowSet, render};
use crate::config::ProfileConfig;
use crate::error::{ChxError, ChxResult};
use parking_lot::Mutex;
use regex::Regex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

fn pattern(re: &str) -> Regex {
    Regex::new(re).unwrap_or_else(|e| panic!("invalid statement pattern {re}: {e}"))
}

static CREATE: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)^\s*CREATE\s+(?:TABLE|DICTIONARY)\s+(?:IF\s+NOT\s+EXISTS\s+)?([\w.]+)")
});
static DROP: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"(?i)^\s*DROP\s+(?:TABLE|DICTIONARY)\s+(?:IF\s+EXISTS\s+)?([\w.]+)")
});
static TRUNCATE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)^\s*TRUNCATE\s+TABLE\s+(?:IF\s+EXISTS\s+)?([\w.]+)"));
static DESCRIBE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)^\s*DESCRIBE\s+(?:TABLE\s+)?([\w.]+)\s*$"));
static SHOW_CREATE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)^\s*SHOW\s+CREATE\s+(?:TABLE|DICTIONARY)\s+([\w.]+)\s*$"));
static EXISTS: LazyLock<Regex> =
    LazyLock::new(|| pattern(r"(?i)^\s*EXISTS\s+(?:TABLE|DICTIONARY)\s+([\w.]+)\s*$"));

/// `db.name` → `name`
fn bare(name: &str) -> String {
    name.rsplit('.').next().unwrap_or(name).to_string()
}

fn normalize(sql: &str) -> String {
    sql.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn captured(re: &Regex, sql: &str) -> Option<String> {
    re.captures(sql)
        .and_then(|c| c.get(1))
        .map(|m| bare(m.as_str()))
}

/// Columns of the first parenthesised list of a `CREATE` statement.
fn parse_columns(ddl: &str) -> Vec<(String, String)> {
    let Some(start) = ddl.find('(') else {
        return Vec::new();
    };

    let mut depth = 0usize;
    let mut pieces = Vec::new();
    let mut current = String::new();
    for c in ddl[start + 1..].chars() {
        match c {
            '(' => {
                depth += 1;
                current.push(c);
            }
            ')' if depth == 0 => break,
            ')' => {
                depth -= 1;
                current.push(c);
            }
            ',' if depth == 0 => pieces.push(std::mem::take(&mut current)),
            _ => current.push(c),
        }
    }
    pieces.push(current);

    pieces
        .iter()
        .filter_map(|piece| {
            let piece = piece.trim();
            let (name, data_type) = if let Some(rest) = piece.strip_prefix('`') {
                let end = rest.find('`')?;
                (&rest[..end], rest[end + 1..].trim())
            } else {
                let (name, data_type) = piece.split_once(char::is_whitespace)?;
                (name, data_type.trim())
            };
            let keyword = name.to_ascii_uppercase();
            if name.is_empty() || ["INDEX", "CONSTRAINT", "PROJECTION"].contains(&keyword.as_str()) {
                return None;
            }
            Some((name.to_string(), data_type.to_string()))
        })
        .collect()
}

#[derive(Debug, Clone, Default)]
struct TableState {
    ddl: String,
    columns: Vec<(String, String)>,
    rows: Vec<Row>,
}

/// One `insert_bulk_from_file` call
#[derive(Debug, Clone, PartialEq)]
pub struct BulkLoad {
    pub table: String,
    pub files: Vec<PathBuf>,
    pub columns: Vec<String>,
    pub format: String,
}

#[derive(Default)]
struct State {
    tables: HashMap<String, TableState>,
    responses: Vec<(String, VecDeque<RowSet>)>,
    selects: Vec<String>,
    writes: Vec<String>,
    bulk_loads: Vec<BulkLoad>,
    bulk_failures: VecDeque<String>,
}

/// Scripted in-memory [`Client`]
#[derive(Clone)]
pub struct RecordingClient {
    database: String,
    state: Arc<Mutex<State>>,
}

impl RecordingClient {
    pub fn new(database: &str) -> Self {
        Self {
            database: database.to_string(),
            state: Arc::new(Mutex::new(State::default())),
        }
    }

    // ════════════════════════════════════════════
    // Scripting
    // ════════════════════════════════════════════

    /// Registers a table with a MergeTree DDL built from `columns`.
    pub fn create_table(&self, name: &str, columns: &[(&str, &str)]) {
        let body = columns
            .iter()
            .map(|(n, t)| format!("    `{n}` {t}"))
            .collect::<Vec<_>>()
            .join(",\n");
        let ddl = format!(
            "CREATE TABLE {}.{}\n(\n{body}\n)\nENGINE = MergeTree\nORDER BY tuple()",
            self.database,
            bare(name)
        );
        self.set_ddl(name, &ddl);
    }

    /// Registers (or replaces) a table or dictionary by its DDL.
    pub fn set_ddl(&self, name: &str, ddl: &str) {
        let mut state = self.state.lock();
        let table = state.tables.entry(bare(name)).or_default();
        table.ddl = ddl.to_string();
        table.columns = parse_columns(ddl);
    }

    /// Result of the next select containing `fragment` (whitespace-normalized).
    ///
    /// Registering the same fragment again queues another result; the last one sticks.
    pub fn respond(&self, fragment: &str, rows: Vec<Value>) {
        let rows: Vec<Row> = rows
            .into_iter()
            .filter_map(|v| v.as_object().cloned())
            .collect();
        let fragment = normalize(fragment);
        let mut state = self.state.lock();
        match state.responses.iter_mut().find(|(f, _)| *f == fragment) {
            Some((_, queue)) => queue.push_back(RowSet::new(rows)),
            None => state
                .responses
                .push((fragment, VecDeque::from([RowSet::new(rows)]))),
        }
    }

    /// Next bulk load fails with `message`.
    pub fn fail_next_bulk(&self, message: &str) {
        self.state.lock().bulk_failures.push_back(message.to_string());
    }

    // ════════════════════════════════════════════
    // Inspection
    // ════════════════════════════════════════════

    pub fn has_table(&self, name: &str) -> bool {
        self.state.lock().tables.contains_key(&bare(name))
    }

    pub fn ddl(&self, name: &str) -> Option<String> {
        self.state.lock().tables.get(&bare(name)).map(|t| t.ddl.clone())
    }

    pub fn describe(&self, name: &str) -> Vec<(String, String)> {
        self.state
            .lock()
            .tables
            .get(&bare(name))
            .map(|t| t.columns.clone())
            .unwrap_or_default()
    }

    pub fn rows(&self, name: &str) -> Vec<Row> {
        self.state
            .lock()
            .tables
            .get(&bare(name))
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Rendered, whitespace-normalized selects
    pub fn selects(&self) -> Vec<String> {
        self.state.lock().selects.clone()
    }

    /// Rendered, whitespace-normalized writes
    pub fn writes(&self) -> Vec<String> {
        self.state.lock().writes.clone()
    }

    pub fn selects_matching(&self, fragment: &str) -> usize {
        let fragment = normalize(fragment);
        self.state
            .lock()
            .selects
            .iter()
            .filter(|s| s.contains(&fragment))
            .count()
    }

    pub fn writes_matching(&self, fragment: &str) -> usize {
        let fragment = normalize(fragment);
        self.state
            .lock()
            .writes
            .iter()
            .filter(|s| s.contains(&fragment))
            .count()
    }

    pub fn bulk_loads(&self) -> Vec<BulkLoad> {
        self.state.lock().bulk_loads.clone()
    }

    /// Forgets recorded statements, keeps the catalog.
    pub fn clear_log(&self) {
        let mut state = self.state.lock();
        state.selects.clear();
        state.writes.clear();
        state.bulk_loads.clear();
    }

    fn missing(name: &str) -> ChxError {
        ChxError::backend(format!("Table {name} doesn't exist"))
    }
}

impl Client for RecordingClient {
    fn database(&self) -> String {
        self.database.clone()
    }

    fn select(&self, sql: &str, bindings: &Bindings) -> ChxResult<RowSet> {
        let rendered = normalize(&render(sql, bindings));
        let mut state = self.state.lock();
        state.selects.push(rendered.clone());

        if let Some((_, queue)) = state
            .responses
            .iter_mut()
            .find(|(fragment, _)| rendered.contains(fragment.as_str()))
        {
            let next = if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            };
            return Ok(next.unwrap_or_default());
        }

        if let Some(name) = captured(&DESCRIBE, &rendered) {
            let rows = state
                .tables
                .get(&name)
                .map(|t| {
                    t.columns
                        .iter()
                        .filter_map(|(n, ty)| {
                            serde_json::json!({"name": n, "type": ty}).as_object().cloned()
                        })
                        .collect()
                })
                .unwrap_or_default();
            return Ok(RowSet::new(rows));
        }

        if let Some(name) = captured(&SHOW_CREATE, &rendered) {
            let table = state.tables.get(&name).ok_or_else(|| Self::missing(&name))?;
            let row = serde_json::json!({"statement": table.ddl});
            return Ok(RowSet::new(row.as_object().cloned().into_iter().collect()));
        }

        if let Some(name) = captured(&EXISTS, &rendered) {
            let exists = u8::from(state.tables.contains_key(&name));
            let row = serde_json::json!({"result": exists});
            return Ok(RowSet::new(row.as_object().cloned().into_iter().collect()));
        }

        Ok(RowSet::empty())
    }

    fn write(&self, sql: &str, bindings: &Bindings) -> ChxResult<RowSet> {
        let raw = render(sql, bindings);
        let rendered = normalize(&raw);
        let mut state = self.state.lock();
        state.writes.push(rendered.clone());

        if let Some(name) = captured(&CREATE, &rendered) {
            let table = state.tables.entry(name).or_default();
            if table.ddl.is_empty() {
                table.ddl = raw.trim().to_string();
                table.columns = parse_columns(&raw);
            }
        } else if let Some(name) = captured(&DROP, &rendered) {
            state.tables.remove(&name);
        } else if let Some(name) = captured(&TRUNCATE, &rendered) {
            state
                .tables
                .get_mut(&name)
                .ok_or_else(|| Self::missing(&name))?
                .rows
                .clear();
        }
        Ok(RowSet::empty())
    }

    fn insert_rows(&self, table: &str, rows: &[Row]) -> ChxResult<RowSet> {
        let name = bare(table);
        let mut state = self.state.lock();
        state
            .tables
            .get_mut(&name)
            .ok_or_else(|| Self::missing(&name))?
            .rows
            .extend(rows.iter().cloned());
        Ok(RowSet::empty())
    }

    fn insert_bulk_from_file(
        &self,
        table: &str,
        files: &[PathBuf],
        columns: &[String],
        format: &str,
    ) -> ChxResult<Vec<RowSet>> {
        let name = bare(table);
        let mut state = self.state.lock();
        state.bulk_loads.push(BulkLoad {
            table: name.clone(),
            files: files.to_vec(),
            columns: columns.to_vec(),
            format: format.to_string(),
        });

        if let Some(message) = state.bulk_failures.pop_front() {
            return Err(ChxError::backend(message));
        }

        let mut loaded = Vec::new();
        for file in files {
            for line in fs::read_to_string(file)?.lines().filter(|l| !l.is_empty()) {
                if let Value::Object(row) = serde_json::from_str(line)? {
                    loaded.push(row);
                }
            }
        }
        state
            .tables
            .get_mut(&name)
            .ok_or_else(|| Self::missing(&name))?
            .rows
            .extend(loaded);

        Ok(files.iter().map(|_| RowSet::empty()).collect())
    }

    fn ping(&self) -> bool {
        true
    }
}

impl ClientFactory for RecordingClient {
    fn create(
        &self,
        _profile: &str,
        config: &ProfileConfig,
        _timeout: Duration,
    ) -> ChxResult<Arc<dyn Client>> {
        Ok(Arc::new(Self {
            database: config.database.clone(),
            state: Arc::clone(&self.state),
        }))
    }
}
