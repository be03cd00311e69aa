//! Schema-free attribute bags.
//!
//! Governance rules are data-driven, so credential attributes are looked up
//! by dotted path and yield an optional typed scalar. Nested objects are
//! walked; arrays, objects and `null` at the leaf are not comparable and
//! read as absent.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// A comparable scalar produced by an attribute lookup or a literal.
#[derive(Debug, Clone, PartialEq)]
pub enum AttrValue {
    /// UTF-8 string.
    Str(String),
    /// Finite number.
    Num(f64),
    /// Boolean.
    Bool(bool),
    /// Instant in time.
    Time(DateTime<Utc>),
}

impl AttrValue {
    /// Numeric view: numbers, and strings that parse as finite numbers.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Str(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            Self::Bool(_) | Self::Time(_) => None,
        }
    }

    /// Timestamp view: instants, RFC 3339 / `YYYY-MM-DD` strings, and
    /// numbers read as unix seconds.
    pub fn as_timestamp(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Time(t) => Some(*t),
            Self::Str(s) => parse_timestamp(s),
            Self::Num(n) => {
                if !n.is_finite() {
                    return None;
                }
                let secs = n.floor();
                let nanos = ((n - secs) * 1_000_000_000.0).round() as u32;
                DateTime::<Utc>::from_timestamp(secs as i64, nanos.min(999_999_999))
            }
            Self::Bool(_) => None,
        }
    }

    /// Canonical string form used when no typed comparison applies.
    pub fn canonical_string(&self) -> String {
        match self {
            Self::Str(s) => s.clone(),
            Self::Num(n) => format_number(*n),
            Self::Bool(b) => b.to_string(),
            Self::Time(t) => t.to_rfc3339(),
        }
    }

    /// Convert a JSON leaf. Non-scalars yield `None`.
    pub fn from_json(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::Str(s.clone())),
            Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).map(Self::Num),
            Value::Bool(b) => Some(Self::Bool(*b)),
            Value::Null | Value::Array(_) | Value::Object(_) => None,
        }
    }
}

impl fmt::Display for AttrValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Str(s) => write!(f, "\"{}\"", s),
            other => f.write_str(&other.canonical_string()),
        }
    }
}

fn format_number(n: f64) -> String {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

fn parse_timestamp(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(t) = DateTime::parse_from_rfc3339(s) {
        return Some(t.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Capability: look up a scalar by dotted path.
pub trait AttributeLookup {
    /// Resolve `path` (already split on `.`) to a scalar.
    fn lookup(&self, path: &[String]) -> Option<AttrValue>;
}

impl AttributeLookup for Value {
    fn lookup(&self, path: &[String]) -> Option<AttrValue> {
        let mut current = self;
        for segment in path {
            current = current.as_object()?.get(segment)?;
        }
        AttrValue::from_json(current)
    }
}

/// Owned attribute bag for one namespace of an evaluation context.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(Map<String, Value>);

impl Attributes {
    /// Empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON value; non-objects yield an empty bag.
    pub fn from_value(value: Value) -> Self {
        match value {
            Value::Object(map) => Self(map),
            _ => Self::default(),
        }
    }

    /// Insert or replace a top-level attribute.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a timestamp as an RFC 3339 string.
    pub fn with_timestamp(self, key: impl Into<String>, at: DateTime<Utc>) -> Self {
        self.with(key, at.to_rfc3339())
    }

    /// Raw top-level value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Number of top-level attributes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the bag is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl AttributeLookup for Attributes {
    fn lookup(&self, path: &[String]) -> Option<AttrValue> {
        let (first, rest) = path.split_first()?;
        let mut current = self.0.get(first)?;
        for segment in rest {
            current = current.as_object()?.get(segment)?;
        }
        AttrValue::from_json(current)
    }
}

impl From<Map<String, Value>> for Attributes {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    fn path(p: &str) -> Vec<String> {
        p.split('.').map(str::to_string).collect()
    }

    #[test]
    fn test_nested_lookup() {
        let attrs = Attributes::from_value(json!({"lei": {"country": "US", "tier": 2}}));
        assert_eq!(attrs.lookup(&path("lei.country")), Some(AttrValue::Str("US".into())));
        assert_eq!(attrs.lookup(&path("lei.tier")), Some(AttrValue::Num(2.0)));
        assert_eq!(attrs.lookup(&path("lei.missing")), None);
        assert_eq!(attrs.lookup(&path("lei")), None);
    }

    #[test]
    fn test_json_value_lookup() {
        let value = json!({"a": {"b": true}});
        assert_eq!(value.lookup(&path("a.b")), Some(AttrValue::Bool(true)));
        assert_eq!(value.lookup(&path("a.b.c")), None);
    }

    #[test]
    fn test_numeric_coercion() {
        assert_eq!(AttrValue::Str(" 42 ".into()).as_number(), Some(42.0));
        assert_eq!(AttrValue::Str("abc".into()).as_number(), None);
        assert_eq!(AttrValue::Bool(true).as_number(), None);
    }

    #[test]
    fn test_timestamp_coercion() {
        let expected = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(AttrValue::Str("2030-01-01T00:00:00Z".into()).as_timestamp(), Some(expected));
        assert_eq!(AttrValue::Str("2030-01-01".into()).as_timestamp(), Some(expected));
        assert_eq!(
            AttrValue::Num(expected.timestamp() as f64).as_timestamp(),
            Some(expected)
        );
        assert_eq!(AttrValue::Str("soon".into()).as_timestamp(), None);
    }

    #[test]
    fn test_canonical_string() {
        assert_eq!(AttrValue::Num(3.0).canonical_string(), "3");
        assert_eq!(AttrValue::Num(2.5).canonical_string(), "2.5");
        assert_eq!(AttrValue::Bool(false).canonical_string(), "false");
    }
}
