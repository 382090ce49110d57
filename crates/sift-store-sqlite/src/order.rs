//! Compiles an [`Order`] filter into an `ORDER BY` clause.
//!
//! Plain orderings become column terms. An explicit value list becomes a
//! call to a two-argument SQL function, `userorder_<hash>(key, column)`,
//! registered on the connection and backed by a [`RankTable`]. The function
//! name carries the hash of the view it serves, so independently derived
//! views never share a function.

use std::collections::HashMap;

use rusqlite::{
  Connection,
  functions::{Context, FunctionFlags},
  types::ValueRef,
};
use sift_core::{DbKey, Order, OrderBy, Value, key::quote_text};
use tracing::debug;

use crate::{Result, encode::ident};

pub const FUNCTION_PREFIX: &str = "userorder_";

// ─── RankTable ───────────────────────────────────────────────────────────────

/// Hashable form of a normalized value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum RankKey {
  Null,
  Text(String),
  Integer(i64),
  Float(u64),
}

impl RankKey {
  fn float(x: f64) -> Self {
    // -0.0 and 0.0 compare equal in SQL.
    Self::Float(if x == 0.0 { 0.0f64.to_bits() } else { x.to_bits() })
  }

  fn from_value(value: &Value) -> Self {
    match value {
      Value::Null => Self::Null,
      Value::Integer(i) => Self::Integer(*i),
      Value::Float(x) => Self::float(*x),
      other => Self::Text(other.to_string()),
    }
  }

  fn from_sql(value: ValueRef<'_>) -> Self {
    match value {
      ValueRef::Null => Self::Null,
      ValueRef::Integer(i) => Self::Integer(i),
      ValueRef::Real(x) => Self::float(x),
      ValueRef::Text(b) | ValueRef::Blob(b) => {
        Self::Text(String::from_utf8_lossy(b).into_owned())
      }
    }
  }
}

/// Positions of the listed values for one key.
#[derive(Debug, Default)]
struct KeyRanks {
  listed:   HashMap<RankKey, i64>,
  /// Rank of any value not in the list: the list length.
  unlisted: i64,
}

/// Per-key map from normalized value to its position in the explicit list.
#[derive(Debug, Default)]
pub struct RankTable {
  ranks: HashMap<String, KeyRanks>,
}

impl RankTable {
  fn add_key(&mut self, key: &str, values: &[Value]) {
    let mut listed = HashMap::with_capacity(values.len());
    for (i, value) in values.iter().enumerate() {
      // First occurrence wins when a value is listed twice.
      listed.entry(RankKey::from_value(value)).or_insert(i as i64);
    }
    self.ranks.insert(key.to_owned(), KeyRanks {
      listed,
      unlisted: values.len() as i64,
    });
  }

  pub fn is_empty(&self) -> bool { self.ranks.is_empty() }

  /// Rank of `value` for `key`. Values missing from the list rank after
  /// every listed value.
  pub fn rank(&self, key: &str, value: ValueRef<'_>) -> i64 {
    match self.ranks.get(key) {
      Some(key_ranks) => key_ranks
        .listed
        .get(&RankKey::from_sql(value))
        .copied()
        .unwrap_or(key_ranks.unlisted),
      None => i64::MAX,
    }
  }
}

// ─── OrderClause ─────────────────────────────────────────────────────────────

/// A compiled ordering: the `ORDER BY` terms and the rank table backing any
/// explicit-list terms.
#[derive(Debug)]
pub struct OrderClause {
  function: String,
  terms:    Vec<String>,
  ranks:    RankTable,
}

impl OrderClause {
  /// An empty clause: no terms, no function.
  pub fn none() -> Self {
    Self {
      function: String::new(),
      terms:    Vec::new(),
      ranks:    RankTable::default(),
    }
  }

  /// Compile `order` for the view whose hash segment is `view_hash`.
  /// `lookup` resolves a logical key to its schema entry.
  pub fn compile<'a>(
    order: &Order,
    view_hash: &str,
    lookup: impl Fn(&str) -> Result<&'a DbKey>,
  ) -> Result<Self> {
    let mut clause = Self::none();
    clause.function = format!("{FUNCTION_PREFIX}{view_hash}");

    for (name, order_by) in order.iter() {
      let key = lookup(name)?;
      let column = ident(key.column());
      let term = match order_by {
        OrderBy::Natural => column,
        OrderBy::Ascending => format!("{column} ASC"),
        OrderBy::Descending => format!("{column} DESC"),
        OrderBy::Explicit(values) => {
          let normalized = values
            .iter()
            .map(|v| key.normalize(v))
            .collect::<sift_core::Result<Vec<_>>>()?;
          clause.ranks.add_key(name, &normalized);
          format!("{}({}, {column})", clause.function, quote_text(name))
        }
      };
      clause.terms.push(term);
    }
    Ok(clause)
  }

  /// `ORDER BY ...`, or an empty string when there is nothing to order by.
  pub fn statement(&self) -> String {
    if self.terms.is_empty() {
      return String::new();
    }
    format!("ORDER BY {}", self.terms.join(", "))
  }

  /// Register the rank function on `conn` if any explicit list was used.
  pub fn register(self, conn: &Connection) -> Result<()> {
    if self.ranks.is_empty() {
      return Ok(());
    }
    debug!("registering ordering function {}", self.function);
    let ranks = self.ranks;
    conn.create_scalar_function(
      self.function.as_str(),
      2,
      FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
      move |ctx: &Context<'_>| {
        let key: String = ctx.get(0)?;
        Ok(ranks.rank(&key, ctx.get_raw(1)))
      },
    )?;
    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use sift_core::{Error as CoreError, SqlType};

  use super::*;
  use crate::Error;

  fn keys() -> Vec<DbKey> {
    vec![DbKey::new("param", SqlType::Text), DbKey::new("step", SqlType::Integer)]
  }

  fn compile(order: &Order, keys: &[DbKey]) -> Result<OrderClause> {
    OrderClause::compile(order, "abc", |name| {
      keys
        .iter()
        .find(|k| k.name() == name)
        .ok_or_else(|| CoreError::UnknownKey(name.to_owned()).into())
    })
  }

  #[test]
  fn empty_order_has_no_clause() {
    let keys = keys();
    let clause = compile(&Order::new(), &keys).unwrap();
    assert_eq!(clause.statement(), "");
    assert!(clause.ranks.is_empty());
  }

  #[test]
  fn plain_and_explicit_terms_mix() {
    let keys = keys();
    let order = Order::new()
      .with("step", "descending")
      .with("param", OrderBy::explicit(["tp", "2t"]));
    let clause = compile(&order, &keys).unwrap();
    assert_eq!(
      clause.statement(),
      "ORDER BY \"mars_step\" DESC, userorder_abc('param', \"mars_param\")"
    );
    assert_eq!(clause.ranks.rank("param", ValueRef::Text(b"2t")), 1);
  }

  #[test]
  fn explicit_values_are_normalized() {
    let keys = keys();
    let order = Order::new().with("step", OrderBy::explicit(["12", "6"]));
    let clause = compile(&order, &keys).unwrap();
    assert_eq!(clause.ranks.rank("step", ValueRef::Integer(6)), 1);
    // Unlisted values sort last.
    assert_eq!(clause.ranks.rank("step", ValueRef::Integer(0)), 2);
  }

  #[test]
  fn repeated_values_keep_first_rank() {
    let keys = keys();
    let order = Order::new().with("param", OrderBy::explicit(["tp", "tp", "msl"]));
    let clause = compile(&order, &keys).unwrap();
    assert_eq!(clause.ranks.rank("param", ValueRef::Text(b"tp")), 0);
    assert_eq!(clause.ranks.rank("param", ValueRef::Text(b"msl")), 2);
    // Unlisted values rank by list length, not by distinct entries.
    assert_eq!(clause.ranks.rank("param", ValueRef::Text(b"2t")), 3);
    assert_eq!(clause.ranks.rank("levtype", ValueRef::Text(b"sfc")), i64::MAX);
  }

  #[test]
  fn unknown_key_fails() {
    let keys = keys();
    let order = Order::new().with("levtype", OrderBy::Natural);
    let err = compile(&order, &keys).unwrap_err();
    assert!(matches!(err, Error::Core(CoreError::UnknownKey(k)) if k == "levtype"));
  }
}
