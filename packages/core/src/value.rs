//! Argument values accepted by [`Client::call`](crate::Client::call).
//!
//! Callers hand the client a bag of named [`Value`]s; the encoder checks them
//! against the action schema and flattens them into wire fields. The closed
//! set of variants mirrors what the wire format can carry: scalars, UTC
//! datetimes, ordered lists, key/value mappings, and nested structures.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

/// A single argument value.
///
/// Scalar variants convert from the obvious Rust types via [`From`], so
/// arguments are usually built with [`Arguments::with`]:
///
/// ```rust,ignore
/// let args = Arguments::new()
///     .with("query", "tag:web")
///     .with("limit", 50)
///     .with("with_hardware", true);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// A UTC instant. Formatted as `YYYY-MM-DDTHH:MM:SSZ` on the wire;
    /// non-UTC datetimes are unrepresentable by construction.
    Date(DateTime<Utc>),
    List(Vec<Value>),
    /// Ordered key/value pairs for `mapping`-typed parameters.
    Map(Vec<(Value, Value)>),
    /// Named fields for `structure`-typed parameters.
    Struct(BTreeMap<String, Value>),
}

impl Value {
    /// Build a [`Value::Map`] from key/value pairs.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<Value>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Build a [`Value::Struct`] from named fields.
    pub fn structure<K, V, I>(fields: I) -> Self
    where
        K: Into<String>,
        V: Into<Value>,
        I: IntoIterator<Item = (K, V)>,
    {
        Value::Struct(
            fields
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Human-readable name of the variant, for error messages.
    pub(crate) fn kind_name(&self) -> &'static str {
        match self {
            Value::Bool(_) => "boolean",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Str(_) => "string",
            Value::Date(_) => "date",
            Value::List(_) => "list",
            Value::Map(_) => "mapping",
            Value::Struct(_) => "structure",
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Date(v)
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(v: Vec<T>) -> Self {
        Value::List(v.into_iter().map(Into::into).collect())
    }
}

/// Named arguments for one action call.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    entries: BTreeMap<String, Value>,
}

impl Arguments {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an argument, replacing any previous value under the same name.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.entries.insert(name.into(), value.into());
    }

    /// Builder-style [`set`](Self::set).
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(name, value);
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove and return an argument. The encoder consumes arguments this
    /// way so that anything left over is known to be unexpected.
    pub(crate) fn take(&mut self, name: &str) -> Option<Value> {
        self.entries.remove(name)
    }

    /// Names still present, in lexicographic order.
    pub(crate) fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

/// Wire timestamp format: `YYYY-MM-DDTHH:MM:SSZ`, always UTC.
pub(crate) fn format_utc(dt: &DateTime<Utc>) -> String {
    dt.format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

/// Whether a supplied value equals a schema-declared JSON default.
///
/// Used for default suppression: a match means the key is not emitted at
/// all. A `null` default never matches, so optional parameters defaulting
/// to null are suppressed only when omitted.
pub(crate) fn matches_default(value: &Value, default: &serde_json::Value) -> bool {
    use serde_json::Value as Json;
    match (value, default) {
        (Value::Bool(v), Json::Bool(d)) => v == d,
        (Value::Int(v), Json::Number(d)) => {
            d.as_i64() == Some(*v) || d.as_f64() == Some(*v as f64)
        }
        (Value::Float(v), Json::Number(d)) => d.as_f64() == Some(*v),
        (Value::Str(v), Json::String(d)) => v == d,
        (Value::List(items), Json::Array(defaults)) => {
            items.len() == defaults.len()
                && items
                    .iter()
                    .zip(defaults)
                    .all(|(item, d)| matches_default(item, d))
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn conversions_cover_scalars_and_lists() {
        assert_eq!(Value::from(true), Value::Bool(true));
        assert_eq!(Value::from(42), Value::Int(42));
        assert_eq!(Value::from(1.5), Value::Float(1.5));
        assert_eq!(Value::from("web"), Value::Str("web".into()));
        assert_eq!(
            Value::from(vec!["a", "b"]),
            Value::List(vec![Value::Str("a".into()), Value::Str("b".into())])
        );
    }

    #[test]
    fn map_and_structure_builders() {
        let map = Value::map([(1, "web")]);
        assert_eq!(
            map,
            Value::Map(vec![(Value::Int(1), Value::Str("web".into()))])
        );

        let st = Value::structure([("rule", "depends")]);
        match st {
            Value::Struct(fields) => {
                assert_eq!(fields.get("rule"), Some(&Value::Str("depends".into())));
            }
            other => panic!("expected a struct, got {other:?}"),
        }
    }

    #[test]
    fn format_utc_matches_wire_layout() {
        let dt = Utc.with_ymd_and_hms(2011, 8, 1, 12, 0, 0).unwrap();
        assert_eq!(format_utc(&dt), "2011-08-01T12:00:00Z");
    }

    #[test]
    fn default_matching_is_type_strict() {
        assert!(matches_default(&Value::Int(1000), &json!(1000)));
        assert!(matches_default(&Value::Str("".into()), &json!("")));
        assert!(matches_default(&Value::Bool(false), &json!(false)));
        assert!(!matches_default(&Value::Str("1000".into()), &json!(1000)));
        assert!(!matches_default(&Value::Int(0), &json!(null)));
        assert!(matches_default(
            &Value::from(vec!["a"]),
            &json!(["a"])
        ));
        assert!(!matches_default(&Value::from(vec!["a"]), &json!(["a", "b"])));
    }

    #[test]
    fn take_consumes_and_names_reports_leftovers() {
        let mut args = Arguments::new().with("query", "tag:web").with("bogus", 1);
        assert_eq!(args.take("query"), Some(Value::Str("tag:web".into())));
        assert_eq!(args.take("query"), None);
        let left: Vec<&str> = args.names().collect();
        assert_eq!(left, vec!["bogus"]);
    }
}
