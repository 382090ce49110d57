//! Scalar values and the flat records that carry them.
//!
//! A record is produced by an external decoder as a flat mapping from key
//! name to scalar. Key order is preserved: the first record inserted into a
//! store decides the column order of its table.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{
  Deserialize, Deserializer, Serialize, Serializer,
  de::{self, MapAccess, Visitor},
  ser::SerializeMap,
};

/// Text form used when a timestamp is stored or compared.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// ─── Value ───────────────────────────────────────────────────────────────────

/// A single scalar attribute value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
  Null,
  Text(String),
  Integer(i64),
  Float(f64),
  /// Stored as text in [`TIMESTAMP_FORMAT`].
  Timestamp(NaiveDateTime),
}

/// The concrete type of a [`Value`], used to look up its storage type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueKind {
  Null,
  Text,
  Integer,
  Float,
  Timestamp,
}

impl fmt::Display for ValueKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::Null => "null",
      Self::Text => "text",
      Self::Integer => "integer",
      Self::Float => "float",
      Self::Timestamp => "timestamp",
    })
  }
}

impl Value {
  pub fn kind(&self) -> ValueKind {
    match self {
      Self::Null => ValueKind::Null,
      Self::Text(_) => ValueKind::Text,
      Self::Integer(_) => ValueKind::Integer,
      Self::Float(_) => ValueKind::Float,
      Self::Timestamp(_) => ValueKind::Timestamp,
    }
  }

  pub fn is_null(&self) -> bool { matches!(self, Self::Null) }

  pub fn as_str(&self) -> Option<&str> {
    match self {
      Self::Text(s) => Some(s),
      _ => None,
    }
  }
}

impl fmt::Display for Value {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Null => f.write_str("null"),
      Self::Text(s) => f.write_str(s),
      Self::Integer(i) => write!(f, "{i}"),
      Self::Float(x) => write!(f, "{x}"),
      Self::Timestamp(ts) => write!(f, "{}", ts.format(TIMESTAMP_FORMAT)),
    }
  }
}

impl From<&str> for Value {
  fn from(s: &str) -> Self { Self::Text(s.to_owned()) }
}

impl From<String> for Value {
  fn from(s: String) -> Self { Self::Text(s) }
}

impl From<i64> for Value {
  fn from(i: i64) -> Self { Self::Integer(i) }
}

impl From<i32> for Value {
  fn from(i: i32) -> Self { Self::Integer(i64::from(i)) }
}

impl From<f64> for Value {
  fn from(x: f64) -> Self { Self::Float(x) }
}

impl From<NaiveDateTime> for Value {
  fn from(ts: NaiveDateTime) -> Self { Self::Timestamp(ts) }
}

impl Serialize for Value {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    match self {
      Self::Null => serializer.serialize_unit(),
      Self::Text(s) => serializer.serialize_str(s),
      Self::Integer(i) => serializer.serialize_i64(*i),
      Self::Float(x) => serializer.serialize_f64(*x),
      Self::Timestamp(ts) => {
        serializer.serialize_str(&ts.format(TIMESTAMP_FORMAT).to_string())
      }
    }
  }
}

struct ValueVisitor;

impl<'de> Visitor<'de> for ValueVisitor {
  type Value = Value;

  fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("a string, a number or null")
  }

  fn visit_unit<E: de::Error>(self) -> Result<Value, E> { Ok(Value::Null) }

  fn visit_none<E: de::Error>(self) -> Result<Value, E> { Ok(Value::Null) }

  fn visit_some<D: Deserializer<'de>>(self, d: D) -> Result<Value, D::Error> {
    d.deserialize_any(ValueVisitor)
  }

  fn visit_str<E: de::Error>(self, s: &str) -> Result<Value, E> {
    Ok(Value::Text(s.to_owned()))
  }

  fn visit_string<E: de::Error>(self, s: String) -> Result<Value, E> {
    Ok(Value::Text(s))
  }

  fn visit_i64<E: de::Error>(self, i: i64) -> Result<Value, E> {
    Ok(Value::Integer(i))
  }

  fn visit_u64<E: de::Error>(self, u: u64) -> Result<Value, E> {
    i64::try_from(u)
      .map(Value::Integer)
      .map_err(|_| E::custom(format!("integer {u} does not fit in 64 bits")))
  }

  fn visit_f64<E: de::Error>(self, x: f64) -> Result<Value, E> {
    Ok(Value::Float(x))
  }
}

impl<'de> Deserialize<'de> for Value {
  fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    d.deserialize_any(ValueVisitor)
  }
}

// ─── SqlType ─────────────────────────────────────────────────────────────────

/// The storage type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SqlType {
  Text,
  Integer,
  Float,
}

impl SqlType {
  /// Fixed registry from value types to storage types. `None` means the
  /// value type cannot define a column.
  pub fn for_kind(kind: ValueKind) -> Option<Self> {
    match kind {
      ValueKind::Text | ValueKind::Timestamp => Some(Self::Text),
      ValueKind::Integer => Some(Self::Integer),
      ValueKind::Float => Some(Self::Float),
      ValueKind::Null => None,
    }
  }

  /// Declared column type, as written in `CREATE TABLE`.
  pub fn declared(self) -> &'static str {
    match self {
      Self::Text => "TEXT",
      Self::Integer => "INTEGER",
      Self::Float => "FLOAT",
    }
  }

  /// Inverse of [`SqlType::declared`]; also accepts `REAL`.
  pub fn from_declared(s: &str) -> Option<Self> {
    match s.to_ascii_uppercase().as_str() {
      "TEXT" => Some(Self::Text),
      "INTEGER" => Some(Self::Integer),
      "FLOAT" | "REAL" => Some(Self::Float),
      _ => None,
    }
  }
}

impl fmt::Display for SqlType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.declared())
  }
}

// ─── Record ──────────────────────────────────────────────────────────────────

/// A flat, insertion-ordered mapping from key name to [`Value`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
  fields: Vec<(String, Value)>,
}

impl Record {
  pub fn new() -> Self { Self::default() }

  /// Set `key` to `value`, keeping the key's original position if present.
  pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
    let key = key.into();
    let value = value.into();
    match self.fields.iter_mut().find(|(k, _)| *k == key) {
      Some((_, slot)) => *slot = value,
      None => self.fields.push((key, value)),
    }
  }

  /// Builder form of [`Record::insert`].
  pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.insert(key, value);
    self
  }

  pub fn get(&self, key: &str) -> Option<&Value> {
    self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
  }

  pub fn contains_key(&self, key: &str) -> bool { self.get(key).is_some() }

  pub fn keys(&self) -> impl Iterator<Item = &str> {
    self.fields.iter().map(|(k, _)| k.as_str())
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
    self.fields.iter().map(|(k, v)| (k.as_str(), v))
  }

  pub fn len(&self) -> usize { self.fields.len() }

  pub fn is_empty(&self) -> bool { self.fields.is_empty() }

  /// Parse a record from a JSON object, keeping the object's key order.
  pub fn from_json(s: &str) -> crate::Result<Self> { Ok(serde_json::from_str(s)?) }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Record {
  fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
    let mut record = Self::new();
    for (k, v) in iter {
      record.insert(k, v);
    }
    record
  }
}

impl Serialize for Record {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    let mut map = serializer.serialize_map(Some(self.fields.len()))?;
    for (k, v) in &self.fields {
      map.serialize_entry(k, v)?;
    }
    map.end()
  }
}

struct RecordVisitor;

impl<'de> Visitor<'de> for RecordVisitor {
  type Value = Record;

  fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str("a flat map of scalar values")
  }

  fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Record, A::Error> {
    let mut record = Record::new();
    while let Some((key, value)) = access.next_entry::<String, Value>()? {
      record.insert(key, value);
    }
    Ok(record)
  }
}

impl<'de> Deserialize<'de> for Record {
  fn deserialize<D: Deserializer<'de>>(d: D) -> Result<Self, D::Error> {
    d.deserialize_map(RecordVisitor)
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  #[test]
  fn record_from_json_keeps_key_order() {
    let record =
      Record::from_json(r#"{"_path":"f1","step":6,"param":"tp","mean":1.5}"#)
        .unwrap();
    let keys: Vec<_> = record.keys().collect();
    assert_eq!(keys, ["_path", "step", "param", "mean"]);
    assert_eq!(record.get("step"), Some(&Value::Integer(6)));
    assert_eq!(record.get("mean"), Some(&Value::Float(1.5)));
  }

  #[test]
  fn record_from_json_rejects_nested_values() {
    assert!(Record::from_json(r#"{"a":[1,2]}"#).is_err());
    assert!(Record::from_json(r#"{"a":true}"#).is_err());
  }

  #[test]
  fn null_parses_to_null() {
    let record = Record::from_json(r#"{"a":null}"#).unwrap();
    assert!(record.get("a").unwrap().is_null());
  }

  #[test]
  fn insert_replaces_in_place() {
    let record = Record::new().with("a", 1).with("b", 2).with("a", 3);
    assert_eq!(record.len(), 2);
    assert_eq!(record.keys().collect::<Vec<_>>(), ["a", "b"]);
    assert_eq!(record.get("a"), Some(&Value::Integer(3)));
  }

  #[test]
  fn storage_type_registry() {
    assert_eq!(SqlType::for_kind(ValueKind::Text), Some(SqlType::Text));
    assert_eq!(SqlType::for_kind(ValueKind::Timestamp), Some(SqlType::Text));
    assert_eq!(SqlType::for_kind(ValueKind::Integer), Some(SqlType::Integer));
    assert_eq!(SqlType::for_kind(ValueKind::Float), Some(SqlType::Float));
    assert_eq!(SqlType::for_kind(ValueKind::Null), None);
    assert_eq!(SqlType::from_declared("real"), Some(SqlType::Float));
  }

  #[test]
  fn timestamp_displays_as_text() {
    let ts = NaiveDate::from_ymd_opt(2020, 1, 2)
      .unwrap()
      .and_hms_opt(12, 0, 0)
      .unwrap();
    assert_eq!(Value::from(ts).to_string(), "2020-01-02 12:00:00");
  }
}
