//! Coordinate side tables: one `coords_<key>` table per key listing its
//! distinct values in first-seen order.
//!
//! These tables are an optional enumeration aid. They describe the whole
//! base table, so they are never consulted in place of a filtered view.

use std::collections::{HashMap, hash_map::Entry};

use rusqlite::Connection;
use sift_core::{KeyGroup, Record};
use tracing::debug;

use crate::{Result, encode::ident};

pub const TABLE_PREFIX: &str = "coords_";

/// Non-attribute keys that also get a side table.
const EXTRA_KEYS: &[&str] = &["md5_grid_section", "_path"];

pub fn table_name(key: &str) -> String { format!("{TABLE_PREFIX}{key}") }

fn list_tables(conn: &Connection) -> Result<Vec<String>> {
  let mut stmt = conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table'")?;
  let names = stmt
    .query_map([], |row| row.get(0))?
    .collect::<rusqlite::Result<Vec<String>>>()?;
  Ok(names)
}

// ─── CoordTable ──────────────────────────────────────────────────────────────

#[derive(Debug)]
pub struct CoordTable {
  table:  String,
  values: Vec<String>,
}

impl CoordTable {
  fn read(conn: &Connection, key: &str) -> Result<Self> {
    let table = table_name(key);
    let sql = format!("SELECT value FROM {} ORDER BY key", ident(&table));
    debug!("{sql}");
    let mut stmt = conn.prepare(&sql)?;
    let values = stmt
      .query_map([], |row| row.get(0))?
      .collect::<rusqlite::Result<Vec<String>>>()?;
    Ok(Self { table, values })
  }

  fn create(conn: &Connection, key: &str) -> Result<Self> {
    let table = table_name(key);
    let sql = format!(
      "CREATE TABLE IF NOT EXISTS {} (key INTEGER PRIMARY KEY, value TEXT)",
      ident(&table)
    );
    debug!("{sql}");
    conn.execute(&sql, [])?;
    Self::read(conn, key)
  }

  /// Append `value` unless already present. Returns whether it was added.
  pub fn append(&mut self, conn: &Connection, value: &str) -> Result<bool> {
    if self.values.iter().any(|v| v == value) {
      return Ok(false);
    }
    let mut stmt = conn
      .prepare_cached(&format!("INSERT INTO {} (value) VALUES (?1)", ident(&self.table)))?;
    stmt.execute([value])?;
    self.values.push(value.to_owned());
    Ok(true)
  }

  pub fn values(&self) -> &[String] { &self.values }
}

// ─── CoordTables ─────────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct CoordTables {
  tables: HashMap<String, CoordTable>,
}

impl CoordTables {
  /// Load every existing `coords_*` table.
  pub fn discover(conn: &Connection) -> Result<Self> {
    let mut tables = HashMap::new();
    for name in list_tables(conn)? {
      if let Some(key) = name.strip_prefix(TABLE_PREFIX) {
        tables.insert(key.to_owned(), CoordTable::read(conn, key)?);
      }
    }
    Ok(Self { tables })
  }

  pub fn get(&self, key: &str) -> Option<&CoordTable> { self.tables.get(key) }

  fn get_or_create(&mut self, conn: &Connection, key: &str) -> Result<&mut CoordTable> {
    Ok(match self.tables.entry(key.to_owned()) {
      Entry::Occupied(slot) => slot.into_mut(),
      Entry::Vacant(slot) => slot.insert(CoordTable::create(conn, key)?),
    })
  }

  /// Record the attribute values of `record` in their side tables.
  pub fn update_with_record(&mut self, conn: &Connection, record: &Record) -> Result<()> {
    for (key, value) in record.iter() {
      let tracked = KeyGroup::of(key) == KeyGroup::Attribute || EXTRA_KEYS.contains(&key);
      if !tracked || value.is_null() {
        continue;
      }
      self.get_or_create(conn, key)?.append(conn, &value.to_string())?;
    }
    Ok(())
  }
}
