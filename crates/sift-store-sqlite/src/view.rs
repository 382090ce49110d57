//! Derived views: one temporary view per applied filter.
//!
//! A view is named `<parent>_<hash>` where the hash covers the parent name
//! and the filter content. Names are therefore content addresses: applying
//! the same filter chain twice on one connection resolves to views that
//! already exist, and [`ViewArena`] short-circuits them.

use std::collections::HashMap;

use rusqlite::Connection;
use sift_core::{Constraint, Filter, Selection};
use tracing::{debug, warn};

use crate::{
  Result,
  encode::ident,
  order::OrderClause,
  schema::{EntriesTable, TABLE_NAME},
};

/// Definition of a view created on this connection.
#[derive(Debug, Clone)]
pub struct ViewNode {
  pub parent:    String,
  pub statement: String,
}

/// Views created on one connection, indexed by name.
#[derive(Debug, Default)]
pub struct ViewArena {
  views: HashMap<String, ViewNode>,
}

impl ViewArena {
  pub fn contains(&self, name: &str) -> bool {
    name == TABLE_NAME || self.views.contains_key(name)
  }

  /// The definitions leading from the base table to `name`, base first.
  pub fn chain(&self, name: &str) -> Vec<&ViewNode> {
    let mut chain = Vec::new();
    let mut current = name;
    while let Some(node) = self.views.get(current) {
      chain.push(node);
      current = &node.parent;
    }
    chain.reverse();
    chain
  }

  /// Derive a view from `parent` by applying `filter`; returns its name.
  ///
  /// Every key the filter names is resolved against `entries` before any
  /// SQL is built.
  pub fn apply(
    &mut self,
    conn: &Connection,
    entries: &EntriesTable,
    parent: &str,
    filter: &Filter,
  ) -> Result<String> {
    for key in filter.keys() {
      entries.key(key)?;
    }

    let hash = filter.stable_hash(parent)?;
    let name = format!("{parent}_{hash}");
    if self.views.contains_key(&name) {
      return Ok(name);
    }

    let (conditions, order) = match filter {
      Filter::Selection(selection) => (conditions(selection, entries)?, OrderClause::none()),
      Filter::Order(order) => (
        String::new(),
        OrderClause::compile(order, &hash, |k| entries.key(k))?,
      ),
    };

    let statement = format!(
      "CREATE TEMP VIEW IF NOT EXISTS {name} AS SELECT * FROM {parent}{conditions} {}",
      order.statement()
    );
    let statement = statement.trim_end().to_owned();

    order.register(conn)?;
    debug!("{statement}");
    let mut stmt = conn.prepare(&statement)?;
    let mut rows = stmt.query([])?;
    if rows.next()?.is_some() {
      warn!("creating view {name} returned rows");
    }

    self.views.insert(name.clone(), ViewNode {
      parent: parent.to_owned(),
      statement,
    });
    Ok(name)
  }

  /// Fold `filters` over the base table, creating any missing views.
  pub fn resolve(
    &mut self,
    conn: &Connection,
    entries: &EntriesTable,
    filters: &[Filter],
  ) -> Result<String> {
    filters.iter().try_fold(TABLE_NAME.to_owned(), |parent, filter| {
      self.apply(conn, entries, &parent, filter)
    })
  }
}

/// ` WHERE ...` for `selection`, or an empty string when nothing is
/// constrained.
pub fn conditions(selection: &Selection, entries: &EntriesTable) -> Result<String> {
  let mut conds = Vec::new();
  for (name, constraint) in selection.iter() {
    if constraint.is_wildcard() {
      continue;
    }
    let key = entries.key(name)?;
    let column = ident(key.column());
    match constraint {
      Constraint::Eq(value) => {
        conds.push(format!("{column} = {}", key.sql_literal(value)?));
      }
      Constraint::In(values) => {
        let literals = values
          .iter()
          .map(|v| key.sql_literal(v))
          .collect::<sift_core::Result<Vec<_>>>()?;
        conds.push(format!("{column} IN ({})", literals.join(", ")));
      }
      Constraint::All => {}
    }
  }

  if conds.is_empty() {
    return Ok(String::new());
  }
  Ok(format!(" WHERE {}", conds.join(" AND ")))
}

#[cfg(test)]
mod tests {
  use sift_core::{Record, Value};

  use super::*;

  fn entries(conn: &Connection) -> EntriesTable {
    let mut table = EntriesTable::default();
    let record = Record::new().with("_path", "f1").with("param", "2t").with("step", 0);
    table.create_from_record(conn, &record).unwrap();
    table
  }

  #[test]
  fn selection_conditions() {
    let conn = Connection::open_in_memory().unwrap();
    let entries = entries(&conn);

    let sel = Selection::new()
      .with("param", "tp")
      .with_any("step", [0, 6])
      .with("_path", Constraint::All);
    assert_eq!(
      conditions(&sel, &entries).unwrap(),
      " WHERE \"mars_param\" = 'tp' AND \"mars_step\" IN (0, 6)"
    );
  }

  #[test]
  fn empty_selection_has_no_where() {
    let conn = Connection::open_in_memory().unwrap();
    let entries = entries(&conn);
    let sel = Selection::new().with("param", Value::Null);
    assert_eq!(conditions(&sel, &entries).unwrap(), "");
  }

  #[test]
  fn reapplying_a_filter_is_a_no_op() {
    let conn = Connection::open_in_memory().unwrap();
    let entries = entries(&conn);
    let mut arena = ViewArena::default();
    let filter: Filter = Selection::new().with("param", "2t").into();

    let first = arena.apply(&conn, &entries, TABLE_NAME, &filter).unwrap();
    let second = arena.apply(&conn, &entries, TABLE_NAME, &filter).unwrap();
    assert_eq!(first, second);
    assert_eq!(arena.views.len(), 1);
    assert!(first.starts_with("entries_"));
    assert_eq!(arena.views[&first].parent, TABLE_NAME);
  }

  #[test]
  fn chained_views_nest_names() {
    let conn = Connection::open_in_memory().unwrap();
    let entries = entries(&conn);
    let mut arena = ViewArena::default();
    let filters: Vec<Filter> = vec![
      Selection::new().with("param", "2t").into(),
      sift_core::Order::new().with("step", "descending").into(),
    ];
    let name = arena.resolve(&conn, &entries, &filters).unwrap();
    let chain = arena.chain(&name);
    assert_eq!(chain.len(), 2);
    assert_eq!(chain[0].parent, TABLE_NAME);
    assert!(name.starts_with(&chain[1].parent));
    assert!(chain[1].statement.contains("ORDER BY \"mars_step\" DESC"));
  }
}
