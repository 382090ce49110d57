//! Selection and order filters.
//!
//! A filter is pure data: it names keys and the constraint or sort order to
//! apply to each. Backends turn a filter into a derived view whose name is a
//! content hash of the filter and the view it derives from, see
//! [`Filter::stable_hash`].

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::value::Value;

/// Length of the hex digest used in derived view names.
pub const HASH_LEN: usize = 16;

// ─── Selection ───────────────────────────────────────────────────────────────

/// The constraint placed on a single key by a [`Selection`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
  /// Wildcard: no constraint is emitted for the key.
  All,
  Eq(Value),
  In(Vec<Value>),
}

impl Constraint {
  /// Whether this constraint restricts rows at all.
  pub fn is_wildcard(&self) -> bool {
    matches!(self, Self::All | Self::Eq(Value::Null))
  }
}

impl From<Value> for Constraint {
  fn from(v: Value) -> Self { Self::Eq(v) }
}

impl From<&str> for Constraint {
  fn from(s: &str) -> Self { Self::Eq(s.into()) }
}

impl From<String> for Constraint {
  fn from(s: String) -> Self { Self::Eq(s.into()) }
}

impl From<i64> for Constraint {
  fn from(i: i64) -> Self { Self::Eq(i.into()) }
}

impl From<i32> for Constraint {
  fn from(i: i32) -> Self { Self::Eq(i.into()) }
}

impl From<f64> for Constraint {
  fn from(x: f64) -> Self { Self::Eq(x.into()) }
}

impl From<Vec<Value>> for Constraint {
  fn from(values: Vec<Value>) -> Self { Self::In(values) }
}

impl<T: Into<Value>> FromIterator<T> for Constraint {
  fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
    Self::In(iter.into_iter().map(Into::into).collect())
  }
}

/// Per-key equality or membership constraints, combined with AND.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Selection {
  constraints: Vec<(String, Constraint)>,
}

impl Selection {
  pub fn new() -> Self { Self::default() }

  /// Constrain `key`, replacing any earlier constraint on it.
  pub fn insert(&mut self, key: impl Into<String>, constraint: impl Into<Constraint>) {
    let key = key.into();
    let constraint = constraint.into();
    match self.constraints.iter_mut().find(|(k, _)| *k == key) {
      Some((_, slot)) => *slot = constraint,
      None => self.constraints.push((key, constraint)),
    }
  }

  pub fn with(mut self, key: impl Into<String>, constraint: impl Into<Constraint>) -> Self {
    self.insert(key, constraint);
    self
  }

  /// Constrain `key` to any of `values`.
  pub fn with_any<T: Into<Value>>(
    self,
    key: impl Into<String>,
    values: impl IntoIterator<Item = T>,
  ) -> Self {
    self.with(key, values.into_iter().collect::<Constraint>())
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &Constraint)> {
    self.constraints.iter().map(|(k, c)| (k.as_str(), c))
  }

  /// True when no key is actually constrained.
  pub fn is_empty(&self) -> bool {
    self.constraints.iter().all(|(_, c)| c.is_wildcard())
  }
}

// ─── Order ───────────────────────────────────────────────────────────────────

/// Sort order for a single key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderBy {
  /// The column's natural collation order.
  Natural,
  Ascending,
  Descending,
  /// Rows sort by the position of their value in this list.
  Explicit(Vec<Value>),
}

impl OrderBy {
  pub fn explicit<T: Into<Value>>(values: impl IntoIterator<Item = T>) -> Self {
    Self::Explicit(values.into_iter().map(Into::into).collect())
  }
}

/// The literal tags `"ascending"` and `"descending"` select plain ordering;
/// any other scalar is a one-element explicit order.
impl From<Value> for OrderBy {
  fn from(v: Value) -> Self {
    match v.as_str() {
      Some("ascending") => Self::Ascending,
      Some("descending") => Self::Descending,
      _ if v.is_null() => Self::Natural,
      _ => Self::Explicit(vec![v]),
    }
  }
}

impl From<&str> for OrderBy {
  fn from(s: &str) -> Self { Value::from(s).into() }
}

/// Multi-key sort order; keys compose left to right.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Order {
  keys: Vec<(String, OrderBy)>,
}

impl Order {
  pub fn new() -> Self { Self::default() }

  pub fn insert(&mut self, key: impl Into<String>, order: impl Into<OrderBy>) {
    let key = key.into();
    let order = order.into();
    match self.keys.iter_mut().find(|(k, _)| *k == key) {
      Some((_, slot)) => *slot = order,
      None => self.keys.push((key, order)),
    }
  }

  pub fn with(mut self, key: impl Into<String>, order: impl Into<OrderBy>) -> Self {
    self.insert(key, order);
    self
  }

  pub fn iter(&self) -> impl Iterator<Item = (&str, &OrderBy)> {
    self.keys.iter().map(|(k, o)| (k.as_str(), o))
  }

  pub fn is_empty(&self) -> bool { self.keys.is_empty() }
}

// ─── Filter ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "spec", rename_all = "snake_case")]
pub enum Filter {
  Selection(Selection),
  Order(Order),
}

impl Filter {
  /// Every key the filter references, wildcards included.
  pub fn keys(&self) -> Vec<&str> {
    match self {
      Self::Selection(s) => s.iter().map(|(k, _)| k).collect(),
      Self::Order(o) => o.iter().map(|(k, _)| k).collect(),
    }
  }

  /// Content hash of this filter applied on top of `parent_view`.
  ///
  /// Equal filters on the same parent always hash equal, so a repeated
  /// chain of filters resolves to the same view names.
  pub fn stable_hash(&self, parent_view: &str) -> crate::Result<String> {
    let mut hasher = Sha256::new();
    hasher.update(parent_view.as_bytes());
    hasher.update([0u8]);
    hasher.update(serde_json::to_vec(self)?);
    let mut digest = hex::encode(hasher.finalize());
    digest.truncate(HASH_LEN);
    Ok(digest)
  }
}

impl From<Selection> for Filter {
  fn from(s: Selection) -> Self { Self::Selection(s) }
}

impl From<Order> for Filter {
  fn from(o: Order) -> Self { Self::Order(o) }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn hash_is_stable_and_parent_sensitive() {
    let f: Filter = Selection::new().with("param", "tp").into();
    let a = f.stable_hash("entries").unwrap();
    let b = f.clone().stable_hash("entries").unwrap();
    assert_eq!(a, b);
    assert_eq!(a.len(), HASH_LEN);
    assert_ne!(a, f.stable_hash("entries_0123456789abcdef").unwrap());
  }

  #[test]
  fn hash_distinguishes_filter_kinds() {
    let sel: Filter = Selection::new().with("step", 6).into();
    let ord: Filter = Order::new().with("step", OrderBy::explicit([6])).into();
    assert_ne!(sel.stable_hash("entries").unwrap(), ord.stable_hash("entries").unwrap());
  }

  #[test]
  fn wildcard_only_selection_is_empty() {
    let sel = Selection::new()
      .with("param", Constraint::All)
      .with("step", Value::Null);
    assert!(sel.is_empty());
    assert!(!sel.with("levtype", "sfc").is_empty());
  }

  #[test]
  fn membership_constraint_from_list() {
    let sel = Selection::new().with_any("param", ["2t", "tp"]);
    let (_, c) = sel.iter().next().unwrap();
    assert_eq!(c, &Constraint::In(vec!["2t".into(), "tp".into()]));
  }

  #[test]
  fn order_tags() {
    assert_eq!(OrderBy::from("ascending"), OrderBy::Ascending);
    assert_eq!(OrderBy::from("descending"), OrderBy::Descending);
    assert_eq!(OrderBy::from(Value::Null), OrderBy::Natural);
    assert_eq!(OrderBy::from("tp"), OrderBy::Explicit(vec!["tp".into()]));
  }

  #[test]
  fn order_keeps_key_order() {
    let order = Order::new().with("step", "descending").with("param", OrderBy::Natural);
    let keys: Vec<_> = order.iter().map(|(k, _)| k).collect();
    assert_eq!(keys, ["step", "param"]);
  }
}
