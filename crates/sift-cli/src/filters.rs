//! Parsing of `--sel` and `--order` flags into store filters.

use anyhow::{Context as _, Result, bail};
use clap::Args;
use sift_core::{Constraint, Order, OrderBy, Selection, Value};
use sift_store_sqlite::SqliteStore;

#[derive(Args, Debug, Default)]
pub struct FilterArgs {
  /// Constrain a key: `key=v`, `key=v1,v2` or `key=*`. Repeatable.
  #[arg(long = "sel", value_name = "KEY=VALUES")]
  pub selection: Vec<String>,

  /// Order by a key: `key`, `key=asc`, `key=desc` or `key=v1,v2,...`.
  /// Repeatable; flags compose left to right, and a repeated key keeps its
  /// first position with the last value given.
  #[arg(long = "order", value_name = "KEY[=HOW]")]
  pub order: Vec<String>,
}

impl FilterArgs {
  /// `store` with the selection, then the order, applied.
  pub fn apply(&self, store: &SqliteStore) -> Result<SqliteStore> {
    let mut store = store.clone();
    if !self.selection.is_empty() {
      store = store.filter(parse_selection(&self.selection)?);
    }
    if !self.order.is_empty() {
      store = store.filter(parse_order(&self.order)?);
    }
    Ok(store)
  }
}

/// Integer, then float, otherwise text.
pub fn parse_scalar(s: &str) -> Value {
  if let Ok(i) = s.parse::<i64>() {
    return Value::Integer(i);
  }
  match s.parse::<f64>() {
    Ok(x) if x.is_finite() => Value::Float(x),
    _ => Value::Text(s.to_owned()),
  }
}

fn split_list(s: &str) -> Vec<Value> { s.split(',').map(|v| parse_scalar(v.trim())).collect() }

pub fn parse_selection(args: &[String]) -> Result<Selection> {
  let mut selection = Selection::new();
  for arg in args {
    let (key, values) = arg
      .split_once('=')
      .with_context(|| format!("selection `{arg}` is not of the form key=value"))?;
    let key = key.trim();
    if key.is_empty() {
      bail!("selection `{arg}` has no key");
    }
    let constraint = match values.trim() {
      "*" => Constraint::All,
      v if v.contains(',') => Constraint::In(split_list(v)),
      v => Constraint::Eq(parse_scalar(v)),
    };
    selection.insert(key, constraint);
  }
  Ok(selection)
}

pub fn parse_order(args: &[String]) -> Result<Order> {
  let mut order = Order::new();
  for arg in args {
    let (key, how) = match arg.split_once('=') {
      Some((key, how)) => (key.trim(), Some(how.trim())),
      None => (arg.trim(), None),
    };
    if key.is_empty() {
      bail!("order `{arg}` has no key");
    }
    let order_by = match how {
      None | Some("") => OrderBy::Natural,
      Some("asc" | "ascending") => OrderBy::Ascending,
      Some("desc" | "descending") => OrderBy::Descending,
      Some(list) => OrderBy::Explicit(split_list(list)),
    };
    order.insert(key, order_by);
  }
  Ok(order)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn args(list: &[&str]) -> Vec<String> { list.iter().map(|s| (*s).to_owned()).collect() }

  #[test]
  fn scalars_prefer_integers() {
    assert_eq!(parse_scalar("6"), Value::Integer(6));
    assert_eq!(parse_scalar("-0.5"), Value::Float(-0.5));
    assert_eq!(parse_scalar("2t"), Value::Text("2t".into()));
    assert_eq!(parse_scalar("inf"), Value::Text("inf".into()));
  }

  #[test]
  fn selection_forms() {
    let sel = parse_selection(&args(&["param=2t,tp", "step=6", "levtype=*"])).unwrap();
    let parsed: Vec<_> = sel.iter().map(|(k, c)| (k.to_owned(), c.clone())).collect();
    assert_eq!(parsed, [
      ("param".to_owned(), Constraint::In(vec!["2t".into(), "tp".into()])),
      ("step".to_owned(), Constraint::Eq(Value::Integer(6))),
      ("levtype".to_owned(), Constraint::All),
    ]);
  }

  #[test]
  fn selection_requires_a_value() {
    assert!(parse_selection(&args(&["param"])).is_err());
    assert!(parse_selection(&args(&["=2t"])).is_err());
  }

  #[test]
  fn order_forms() {
    let order = parse_order(&args(&["step=desc", "param=tp,2t", "date", "time=asc"])).unwrap();
    let parsed: Vec<_> = order.iter().map(|(k, o)| (k.to_owned(), o.clone())).collect();
    assert_eq!(parsed, [
      ("step".to_owned(), OrderBy::Descending),
      ("param".to_owned(), OrderBy::explicit(["tp", "2t"])),
      ("date".to_owned(), OrderBy::Natural),
      ("time".to_owned(), OrderBy::Ascending),
    ]);
  }

  #[test]
  fn repeated_order_key_keeps_position_takes_last_value() {
    let order = parse_order(&args(&["step=asc", "param", "step=desc"])).unwrap();
    let parsed: Vec<_> = order.iter().map(|(k, o)| (k.to_owned(), o.clone())).collect();
    assert_eq!(parsed, [
      ("step".to_owned(), OrderBy::Descending),
      ("param".to_owned(), OrderBy::Natural),
    ]);
  }

  #[test]
  fn single_order_value_is_an_explicit_list() {
    let order = parse_order(&args(&["param=tp"])).unwrap();
    let (_, by) = order.iter().next().unwrap();
    assert_eq!(*by, OrderBy::explicit(["tp"]));
  }
}
