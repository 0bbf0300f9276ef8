//! Raw catalog records, as deserialized from a Mesu property list or a Pallas response

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One entry of a catalog's `Assets` array, before any interpretation
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    fields: BTreeMap<String, Value>,
}

impl RawRecord {
    /// Create a new empty record
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a field, replacing any previous value
    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.fields.insert(key.into(), value);
    }

    /// Builder-style variant of [`RawRecord::insert`]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value.into());
        self
    }

    /// Get a field by key
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Remove a field, returning its value
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.fields.remove(key)
    }

    /// Check whether a field is present
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(key)
    }

    /// Get the number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Check if the record has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over the fields in key order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields.iter()
    }

    /// Get a string field
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Get an integer field. Strings holding an integer are accepted too,
    /// since older catalogs store sizes as strings.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    /// Get a boolean field
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Get a nested dictionary
    pub fn get_dict(&self, key: &str) -> Option<&RawRecord> {
        match self.get(key) {
            Some(Value::Dictionary(record)) => Some(record),
            _ => None,
        }
    }

    /// Get an array of strings. Non-string members are skipped.
    pub fn get_str_array(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key) {
            Some(Value::Array(items)) => Some(
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            ),
            _ => None,
        }
    }
}

impl FromIterator<(String, Value)> for RawRecord {
    fn from_iter<I: IntoIterator<Item = (String, Value)>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// A field value with its wire type preserved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Value {
    /// String value
    String(String),
    /// Integer value
    Integer(i64),
    /// Floating-point value
    Real(f64),
    /// Boolean value
    Boolean(bool),
    /// Date, kept in its textual form
    Date(String),
    /// Binary blob (property lists only)
    Data(Vec<u8>),
    /// Nested dictionary
    Dictionary(RawRecord),
    /// Array of values
    Array(Vec<Value>),
    /// JSON null
    Null,
}

impl Value {
    /// Borrow the value as a string, if it is one
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) | Value::Date(s) => Some(s),
            _ => None,
        }
    }

    /// Read the value as an integer
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            Value::Real(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Read the value as a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Boolean(b) => Some(*b),
            _ => None,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<RawRecord> for Value {
    fn from(record: RawRecord) -> Self {
        Value::Dictionary(record)
    }
}

impl From<Vec<&str>> for Value {
    fn from(items: Vec<&str>) -> Self {
        Value::Array(items.into_iter().map(Value::from).collect())
    }
}

impl From<plist::Value> for Value {
    fn from(value: plist::Value) -> Self {
        match value {
            plist::Value::String(s) => Value::String(s),
            plist::Value::Integer(i) => match i.as_signed() {
                Some(i) => Value::Integer(i),
                None => Value::Real(i.as_unsigned().unwrap_or_default() as f64),
            },
            plist::Value::Real(f) => Value::Real(f),
            plist::Value::Boolean(b) => Value::Boolean(b),
            plist::Value::Date(d) => Value::Date(d.to_xml_format()),
            plist::Value::Data(bytes) => Value::Data(bytes),
            plist::Value::Dictionary(dict) => Value::Dictionary(
                dict.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
            plist::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            _ => Value::Null,
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Boolean(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Integer(i),
                None => Value::Real(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(map) => Value::Dictionary(
                map.into_iter()
                    .map(|(k, v)| (k, Value::from(v)))
                    .collect(),
            ),
        }
    }
}
