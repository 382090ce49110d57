//! Schema entries: logical key names, their storage columns and types.
//!
//! Keys fall into three disjoint groups, each with its own column naming
//! convention. The convention is applied once, when the table is created;
//! [`KeyGroup::logical_name`] inverts it when an existing table is read back.

use crate::{
  Error, Result,
  value::{SqlType, Value},
};

/// Keys locating a record inside a file.
pub const FILE_LOCATION_KEYS: &[&str] = &["_path", "_offset", "_length"];

/// Keys holding statistics derived from the record payload.
pub const STATISTICS_KEYS: &[&str] =
  &["mean", "std", "min", "max", "md5_grid_section"];

/// Column prefix for domain attribute keys.
pub const ATTRIBUTE_PREFIX: &str = "mars_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyGroup {
  /// `_path`, `_offset`, `_length`: stored without the leading underscore.
  FileLocation,
  /// Derived statistics: stored under their own name.
  Statistics,
  /// Everything else: stored with the `mars_` prefix.
  Attribute,
}

impl KeyGroup {
  pub fn of(name: &str) -> Self {
    if FILE_LOCATION_KEYS.contains(&name) {
      Self::FileLocation
    } else if STATISTICS_KEYS.contains(&name) {
      Self::Statistics
    } else {
      Self::Attribute
    }
  }

  /// Storage column for the logical key `name`.
  pub fn column_name(name: &str) -> String {
    match Self::of(name) {
      Self::FileLocation => name.trim_start_matches('_').to_owned(),
      Self::Statistics => name.to_owned(),
      Self::Attribute => format!("{ATTRIBUTE_PREFIX}{name}"),
    }
  }

  /// Logical key for the storage column `column`.
  pub fn logical_name(column: &str) -> String {
    if let Some(name) = column.strip_prefix(ATTRIBUTE_PREFIX) {
      return name.to_owned();
    }
    FILE_LOCATION_KEYS
      .iter()
      .find(|k| k.trim_start_matches('_') == column)
      .map(|k| (*k).to_owned())
      .unwrap_or_else(|| column.to_owned())
  }
}

// ─── DbKey ───────────────────────────────────────────────────────────────────

/// One schema entry: a logical key bound to a typed storage column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DbKey {
  name:     String,
  column:   String,
  sql_type: SqlType,
  group:    KeyGroup,
}

impl DbKey {
  pub fn new(name: impl Into<String>, sql_type: SqlType) -> Self {
    let name = name.into();
    Self {
      column: KeyGroup::column_name(&name),
      group: KeyGroup::of(&name),
      name,
      sql_type,
    }
  }

  /// Rebuild an entry from an existing column.
  pub fn from_column(column: &str, sql_type: SqlType) -> Self {
    Self::new(KeyGroup::logical_name(column), sql_type)
  }

  /// Build the entry for the first observed `value` of key `name`.
  pub fn infer(name: &str, value: &Value) -> Result<Self> {
    let sql_type =
      SqlType::for_kind(value.kind()).ok_or_else(|| Error::UnmappedType {
        key:  name.to_owned(),
        kind: value.kind(),
      })?;
    Ok(Self::new(name, sql_type))
  }

  pub fn name(&self) -> &str { &self.name }

  pub fn column(&self) -> &str { &self.column }

  pub fn sql_type(&self) -> SqlType { self.sql_type }

  pub fn group(&self) -> KeyGroup { self.group }

  /// Map `value` to the comparable form stored in this key's column.
  /// `Null` passes through.
  pub fn normalize(&self, value: &Value) -> Result<Value> {
    let fail = || Error::Normalize {
      key:      self.name.clone(),
      value:    value.to_string(),
      expected: self.sql_type,
    };

    let normalized = match (self.sql_type, value) {
      (_, Value::Null) => Value::Null,

      (SqlType::Text, v) => Value::Text(v.to_string()),

      (SqlType::Integer, Value::Integer(i)) => Value::Integer(*i),
      // `i64::MAX as f64` rounds up to 2^63, which is out of range.
      (SqlType::Integer, Value::Float(x))
        if x.fract() == 0.0 && *x >= i64::MIN as f64 && *x < i64::MAX as f64 =>
      {
        Value::Integer(*x as i64)
      }
      (SqlType::Integer, Value::Text(s)) => {
        Value::Integer(s.trim().parse().map_err(|_| fail())?)
      }
      (SqlType::Integer, _) => return Err(fail()),

      (SqlType::Float, Value::Float(x)) if x.is_finite() => Value::Float(*x),
      (SqlType::Float, Value::Integer(i)) => Value::Float(*i as f64),
      (SqlType::Float, Value::Text(s)) => {
        let x: f64 = s.trim().parse().map_err(|_| fail())?;
        if !x.is_finite() {
          return Err(fail());
        }
        Value::Float(x)
      }
      (SqlType::Float, _) => return Err(fail()),
    };
    Ok(normalized)
  }

  /// Render `value` as a SQL literal for this column.
  pub fn sql_literal(&self, value: &Value) -> Result<String> {
    Ok(match self.normalize(value)? {
      Value::Null => "NULL".to_owned(),
      Value::Integer(i) => i.to_string(),
      Value::Float(x) => format!("{x:?}"),
      other => quote_text(&other.to_string()),
    })
  }
}

/// Single-quote `s` as a SQL string literal.
pub fn quote_text(s: &str) -> String { format!("'{}'", s.replace('\'', "''")) }

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn column_names_follow_group_convention() {
    assert_eq!(KeyGroup::column_name("_path"), "path");
    assert_eq!(KeyGroup::column_name("_offset"), "offset");
    assert_eq!(KeyGroup::column_name("mean"), "mean");
    assert_eq!(KeyGroup::column_name("param"), "mars_param");
    // Only the listed file-location keys lose their underscore.
    assert_eq!(KeyGroup::column_name("_param_id"), "mars__param_id");
  }

  #[test]
  fn logical_names_invert_column_names() {
    for name in ["_path", "_length", "std", "param", "_param_id"] {
      let column = KeyGroup::column_name(name);
      assert_eq!(KeyGroup::logical_name(&column), name);
    }
  }

  #[test]
  fn infer_rejects_null() {
    let err = DbKey::infer("param", &Value::Null).unwrap_err();
    assert!(matches!(err, Error::UnmappedType { .. }));
  }

  #[test]
  fn normalize_integer_key() {
    let key = DbKey::new("step", SqlType::Integer);
    assert_eq!(key.normalize(&"6".into()).unwrap(), Value::Integer(6));
    assert_eq!(key.normalize(&Value::Float(6.0)).unwrap(), Value::Integer(6));
    assert!(key.normalize(&Value::Float(6.5)).is_err());
    assert!(key.normalize(&"six".into()).is_err());
  }

  #[test]
  fn integer_key_rejects_out_of_range_floats() {
    let key = DbKey::new("step", SqlType::Integer);
    for x in [1e20, -1e20, 9_223_372_036_854_775_808.0, f64::INFINITY, f64::NAN] {
      assert!(matches!(key.normalize(&Value::Float(x)), Err(Error::Normalize { .. })));
    }
    assert_eq!(
      key.normalize(&Value::Float(-9_223_372_036_854_775_808.0)).unwrap(),
      Value::Integer(i64::MIN)
    );
    assert!(key.sql_literal(&Value::Float(1e20)).is_err());
  }

  #[test]
  fn normalize_text_and_float_keys() {
    let text = DbKey::new("levelist", SqlType::Text);
    assert_eq!(text.normalize(&Value::Integer(500)).unwrap(), "500".into());

    let float = DbKey::new("mean", SqlType::Float);
    assert_eq!(float.normalize(&Value::Integer(2)).unwrap(), Value::Float(2.0));
    assert!(float.normalize(&"nan".into()).is_err());
  }

  #[test]
  fn literals_are_typed_and_escaped() {
    let text = DbKey::new("param", SqlType::Text);
    assert_eq!(text.sql_literal(&"o'clock".into()).unwrap(), "'o''clock'");

    let int = DbKey::new("step", SqlType::Integer);
    assert_eq!(int.sql_literal(&"12".into()).unwrap(), "12");

    let float = DbKey::new("mean", SqlType::Float);
    assert_eq!(float.sql_literal(&Value::Integer(1)).unwrap(), "1.0");
  }
}
