//! Query bindings — 템플릿 파라미터 치환
//!
//! 두 종류의 placeholder 지원:
//! - Value: `:name` → SQL 리터럴 (`'abc'`, `42`, `'2024-01-31'`)
//! - Identifier: `{name}` → 원문 그대로 (테이블/컬럼 이름)
//!
//! Quoted string literals are copied untouched and `::` casts are not placeholders.

use chrono::NaiveDate;
use std::collections::BTreeMap;

/// 쿼리 파라미터 값
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Int64(i64),
    UInt64(u64),
    Float64(f64),
    Utf8(String),
    Boolean(bool),
    Date(NaiveDate),
    Array(Vec<ScalarValue>),
}

impl ScalarValue {
    /// SQL 리터럴 문자열로 변환 (placeholder 치환용)
    pub fn to_sql_literal(&self) -> String {
        match self {
            ScalarValue::Null => "NULL".to_string(),
            ScalarValue::Int64(v) => v.to_string(),
            ScalarValue::UInt64(v) => v.to_string(),
            ScalarValue::Float64(v) => format!("{v}"),
            ScalarValue::Utf8(v) => format!("'{}'", escape(v)),
            ScalarValue::Boolean(v) => {
                if *v {
                    "1".to_string()
                } else {
                    "0".to_string()
                }
            }
            ScalarValue::Date(d) => format!("'{}'", d.format("%Y-%m-%d")),
            ScalarValue::Array(items) => {
                let inner: Vec<String> = items.iter().map(ScalarValue::to_sql_literal).collect();
                format!("[{}]", inner.join(", "))
            }
        }
    }

    /// `{name}` 치환용: 문자열은 따옴표 없이 그대로
    pub fn to_identifier(&self) -> String {
        match self {
            ScalarValue::Utf8(v) => v.clone(),
            other => other.to_sql_literal(),
        }
    }
}

// ClickHouse string literals escape with backslashes
fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

/// 파라미터 변환 trait
pub trait IntoParam {
    fn into_scalar(self) -> ScalarValue;
}

impl IntoParam for ScalarValue {
    fn into_scalar(self) -> ScalarValue {
        self
    }
}

impl IntoParam for i32 {
    fn into_scalar(self) -> ScalarValue {
        ScalarValue::Int64(self as i64)
    }
}

impl IntoParam for i64 {
    fn into_scalar(self) -> ScalarValue {
        ScalarValue::Int64(self)
    }
}

impl IntoParam for u32 {
    fn into_scalar(self) -> ScalarValue {
        ScalarValue::UInt64(self as u64)
    }
}

impl IntoParam for u64 {
    fn into_scalar(self) -> ScalarValue {
        ScalarValue::UInt64(self)
    }
}

impl IntoParam for usize {
    fn into_scalar(self) -> ScalarValue {
        ScalarValue::UInt64(self as u64)
    }
}

impl IntoParam for f64 {
    fn into_scalar(self) -> ScalarValue {
        ScalarValue::Float64(self)
    }
}

impl IntoParam for &str {
    fn into_scalar(self) -> ScalarValue {
        ScalarValue::Utf8(self.to_string())
    }
}

impl IntoParam for String {
    fn into_scalar(self) -> ScalarValue {
        ScalarValue::Utf8(self)
    }
}

impl IntoParam for &String {
    fn into_scalar(self) -> ScalarValue {
        ScalarValue::Utf8(self.clone())
    }
}

impl IntoParam for bool {
    fn into_scalar(self) -> ScalarValue {
        ScalarValue::Boolean(self)
    }
}

impl IntoParam for NaiveDate {
    fn into_scalar(self) -> ScalarValue {
        ScalarValue::Date(self)
    }
}

impl<T: IntoParam> IntoParam for Option<T> {
    fn into_scalar(self) -> ScalarValue {
        match self {
            Some(v) => v.into_scalar(),
            None => ScalarValue::Null,
        }
    }
}

impl<T: IntoParam> IntoParam for Vec<T> {
    fn into_scalar(self) -> ScalarValue {
        ScalarValue::Array(self.into_iter().map(IntoParam::into_scalar).collect())
    }
}

/// Named 파라미터 집합
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Bindings {
    values: BTreeMap<String, ScalarValue>,
}

impl Bindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder 스타일 바인딩
    pub fn with<V: IntoParam>(mut self, name: &str, value: V) -> Self {
        self.insert(name, value);
        self
    }

    pub fn insert<V: IntoParam>(&mut self, name: &str, value: V) {
        self.values.insert(name.to_string(), value.into_scalar());
    }

    pub fn get(&self, name: &str) -> Option<&ScalarValue> {
        self.values.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Adds every value of `defaults` whose name is not bound yet.
    pub fn merge(mut self, defaults: Bindings) -> Self {
        for (name, value) in defaults.values {
            self.values.entry(name).or_insert(value);
        }
        self
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn take_ident(chars: &[char], start: usize) -> Option<(String, usize)> {
    if start >= chars.len() || !is_ident_start(chars[start]) {
        return None;
    }
    let mut end = start;
    while end < chars.len() && is_ident_char(chars[end]) {
        end += 1;
    }
    Some((chars[start..end].iter().collect(), end))
}

/// 템플릿 SQL에 바인딩 적용
///
/// Unbound placeholders are left as written.
pub fn render(sql: &str, bindings: &Bindings) -> String {
    if bindings.is_empty() {
        return sql.to_string();
    }

    let chars: Vec<char> = sql.chars().collect();
    let mut out = String::with_capacity(sql.len());
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];
        match c {
            '\'' => {
                out.push(c);
                i += 1;
                while i < chars.len() {
                    let s = chars[i];
                    out.push(s);
                    i += 1;
                    if s == '\\' && i < chars.len() {
                        out.push(chars[i]);
                        i += 1;
                    } else if s == '\'' {
                        break;
                    }
                }
            }
            ':' if chars.get(i + 1) == Some(&':') => {
                out.push_str("::");
                i += 2;
            }
            ':' => match take_ident(&chars, i + 1) {
                Some((name, end)) if bindings.contains(&name) => {
                    if let Some(value) = bindings.get(&name) {
                        out.push_str(&value.to_sql_literal());
                    }
                    i = end;
                }
                _ => {
                    out.push(c);
                    i += 1;
                }
            },
            '{' => match take_ident(&chars, i + 1) {
                Some((name, end)) if chars.get(end) == Some(&'}') && bindings.contains(&name) => {
                    if let Some(value) = bindings.get(&name) {
                        out.push_str(&value.to_identifier());
                    }
                    i = end + 1;
                }
                _ => {
                    out.push(c);
                    i += 1;
                }
            },
            _ => {
                out.push(c);
                i += 1;
            }
        }
    }

    out
}
