//! Conversions between [`sift_core::Value`] and SQLite values, plus
//! identifier quoting for dynamically named columns.

use rusqlite::types::{Value as SqlValue, ValueRef};
use sift_core::Value;

pub fn to_sql(value: &Value) -> SqlValue {
  match value {
    Value::Null => SqlValue::Null,
    Value::Text(s) => SqlValue::Text(s.clone()),
    Value::Integer(i) => SqlValue::Integer(*i),
    Value::Float(x) => SqlValue::Real(*x),
    ts @ Value::Timestamp(_) => SqlValue::Text(ts.to_string()),
  }
}

pub fn from_sql(value: ValueRef<'_>) -> Value {
  match value {
    ValueRef::Null => Value::Null,
    ValueRef::Integer(i) => Value::Integer(i),
    ValueRef::Real(x) => Value::Float(x),
    ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
      Value::Text(String::from_utf8_lossy(bytes).into_owned())
    }
  }
}

/// Double-quote `name` as a SQL identifier.
pub fn ident(name: &str) -> String { format!("\"{}\"", name.replace('"', "\"\"")) }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn identifiers_are_quoted() {
    assert_eq!(ident("mars_param"), "\"mars_param\"");
    assert_eq!(ident("a\"b"), "\"a\"\"b\"");
  }

  #[test]
  fn text_reads_back_as_text() {
    assert_eq!(from_sql(ValueRef::Text(b"tp")), Value::Text("tp".into()));
    assert_eq!(from_sql(ValueRef::Real(1.5)), Value::Float(1.5));
  }
}
