//! Reply Values
//!
//! Dynamically shaped values returned by the server and by meta-commands.

use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

/// A single reply, discovered at runtime
#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Null,
    Bool(bool),
    Int(i64),
    Double(f64),
    Text(String),
    List(Vec<Reply>),
    Map(Vec<(String, Reply)>),
}

impl Reply {
    pub fn text(s: impl Into<String>) -> Self {
        Reply::Text(s.into())
    }

    /// Binary-safe text; invalid UTF-8 is replaced, not rejected
    pub fn bytes(b: &[u8]) -> Self {
        Reply::Text(String::from_utf8_lossy(b).into_owned())
    }

    /// Rewind a flat `[k1, v1, k2, v2, ...]` list into a map.
    ///
    /// Anything that is not a list is returned untouched. A trailing key with
    /// no value maps to `Null`.
    pub fn into_pairs(self) -> Reply {
        match self {
            Reply::List(items) => {
                let mut map = Vec::with_capacity(items.len() / 2);
                let mut iter = items.into_iter();
                while let Some(key) = iter.next() {
                    let value = iter.next().unwrap_or(Reply::Null);
                    map.push((key.to_key(), value));
                }
                Reply::Map(map)
            }
            other => other,
        }
    }

    /// Render as a map key
    fn to_key(&self) -> String {
        match self {
            Reply::Text(s) => s.clone(),
            Reply::Int(n) => n.to_string(),
            Reply::Double(d) => d.to_string(),
            Reply::Bool(b) => b.to_string(),
            Reply::Null => String::new(),
            other => serde_json::to_string(other).unwrap_or_default(),
        }
    }
}

impl From<redis::Value> for Reply {
    fn from(value: redis::Value) -> Self {
        use redis::Value;

        match value {
            Value::Nil => Reply::Null,
            Value::Int(n) => Reply::Int(n),
            Value::BulkString(bytes) => Reply::bytes(&bytes),
            Value::SimpleString(s) => Reply::Text(s),
            Value::Okay => Reply::text("OK"),
            Value::Array(items) | Value::Set(items) => {
                Reply::List(items.into_iter().map(Reply::from).collect())
            }
            Value::Map(pairs) => Reply::Map(
                pairs
                    .into_iter()
                    .map(|(k, v)| (Reply::from(k).to_key(), Reply::from(v)))
                    .collect(),
            ),
            Value::Double(d) => Reply::Double(d),
            Value::Boolean(b) => Reply::Bool(b),
            Value::VerbatimString { text, .. } => Reply::Text(text),
            Value::Push { data, .. } => Reply::List(data.into_iter().map(Reply::from).collect()),
            Value::Attribute { data, .. } => Reply::from(*data),
            other => Reply::Text(format!("{:?}", other)),
        }
    }
}

impl From<Vec<Vec<u8>>> for Reply {
    fn from(items: Vec<Vec<u8>>) -> Self {
        Reply::List(items.iter().map(|b| Reply::bytes(b)).collect())
    }
}

// Maps serialize with sorted keys so JSON output is deterministic.
impl Serialize for Reply {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Reply::Null => serializer.serialize_unit(),
            Reply::Bool(b) => serializer.serialize_bool(*b),
            Reply::Int(n) => serializer.serialize_i64(*n),
            Reply::Double(d) => serializer.serialize_f64(*d),
            Reply::Text(s) => serializer.serialize_str(s),
            Reply::List(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Reply::Map(pairs) => {
                let mut sorted: Vec<&(String, Reply)> = pairs.iter().collect();
                sorted.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
                let mut map = serializer.serialize_map(Some(sorted.len()))?;
                for (k, v) in sorted {
                    map.serialize_entry(k, v)?;
                }
                map.end()
            }
        }
    }
}
