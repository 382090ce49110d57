//! The `entries` base table and the persisted schema version.
//!
//! Columns are inferred from the first record ever inserted and frozen
//! afterwards. The version lives in `PRAGMA user_version`; `0` means the
//! store has never been initialised.

use rusqlite::{Connection, OptionalExtension as _};
use sift_core::{DbKey, KeyGroup, Record, SqlType};
use tracing::{debug, info};

use crate::{
  Error, Result,
  encode::{ident, to_sql},
};

pub const TABLE_NAME: &str = "entries";

/// Schema version written to new stores and required of existing ones.
pub const SCHEMA_VERSION: i64 = 5;

// ─── Version ─────────────────────────────────────────────────────────────────

/// Read the persisted version; `None` when it was never written.
pub fn read_version(conn: &Connection) -> Result<Option<i64>> {
  let sql = "PRAGMA user_version";
  let version: i64 = conn
    .query_row(sql, [], |row| row.get(0))
    .optional()?
    .ok_or_else(|| Error::EmptyResult(sql.to_owned()))?;
  Ok((version != 0).then_some(version))
}

/// Initialise the version if absent, otherwise require it to match.
pub fn check_version(conn: &Connection) -> Result<()> {
  match read_version(conn)? {
    None => {
      debug!("PRAGMA user_version = {SCHEMA_VERSION}");
      conn.pragma_update(None, "user_version", SCHEMA_VERSION)?;
      Ok(())
    }
    Some(SCHEMA_VERSION) => Ok(()),
    Some(found) => {
      Err(Error::VersionMismatch { expected: SCHEMA_VERSION, found })
    }
  }
}

// ─── EntriesTable ────────────────────────────────────────────────────────────

/// In-memory view of the `entries` table schema.
#[derive(Debug, Default)]
pub struct EntriesTable {
  keys:       Vec<DbKey>,
  insert_sql: String,
}

impl EntriesTable {
  /// Read the columns of an existing table; empty if it does not exist.
  pub fn read(conn: &Connection) -> Result<Self> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({TABLE_NAME})"))?;
    let columns = stmt
      .query_map([], |row| {
        Ok((row.get::<_, String>(1)?, row.get::<_, String>(2)?))
      })?
      .collect::<rusqlite::Result<Vec<_>>>()?;

    let keys: Vec<DbKey> = columns
      .iter()
      .map(|(column, declared)| {
        let sql_type = SqlType::from_declared(declared).unwrap_or(SqlType::Text);
        DbKey::from_column(column, sql_type)
      })
      .collect();

    if keys.is_empty() {
      debug!("table {TABLE_NAME} does not exist yet");
    }
    Ok(Self::with_keys(keys))
  }

  fn with_keys(keys: Vec<DbKey>) -> Self {
    let columns: Vec<String> = keys.iter().map(|k| ident(k.column())).collect();
    let placeholders = vec!["?"; columns.len()].join(", ");
    let insert_sql = format!(
      "INSERT INTO {TABLE_NAME} ({}) VALUES ({placeholders})",
      columns.join(", ")
    );
    Self { keys, insert_sql }
  }

  pub fn is_created(&self) -> bool { !self.keys.is_empty() }

  pub fn keys(&self) -> &[DbKey] { &self.keys }

  pub fn key(&self, name: &str) -> Result<&DbKey> {
    self
      .keys
      .iter()
      .find(|k| k.name() == name)
      .ok_or_else(|| sift_core::Error::UnknownKey(name.to_owned()).into())
  }

  /// Create the table with the given schema. No-op if already created.
  pub fn create(&mut self, conn: &Connection, keys: Vec<DbKey>) -> Result<()> {
    if self.is_created() {
      return Ok(());
    }
    if keys.is_empty() {
      return Err(sift_core::Error::EmptyRecord.into());
    }

    let column_defs: Vec<String> = keys
      .iter()
      .map(|k| format!("{} {}", ident(k.column()), k.sql_type().declared()))
      .collect();
    let sql = format!(
      "CREATE TABLE IF NOT EXISTS {TABLE_NAME} ({})",
      column_defs.join(", ")
    );
    debug!("{sql}");
    conn.execute(&sql, [])?;

    *self = Self::with_keys(keys);
    debug!("{}", self.insert_sql);
    Ok(())
  }

  /// Create the table from the types of `record`'s values.
  pub fn create_from_record(&mut self, conn: &Connection, record: &Record) -> Result<()> {
    let keys = record
      .iter()
      .map(|(name, value)| DbKey::infer(name, value))
      .collect::<sift_core::Result<Vec<_>>>()?;
    self.create(conn, keys)
  }

  /// Insert one record, creating the table from it if needed. Keys the
  /// record lacks are stored as NULL.
  pub fn insert(&mut self, conn: &Connection, record: &Record) -> Result<()> {
    if !self.is_created() {
      self.create_from_record(conn, record)?;
    }

    if let Some(unknown) = record.keys().find(|k| self.key(k).is_err()) {
      return Err(sift_core::Error::UnknownKey(unknown.to_owned()).into());
    }

    let values = self
      .keys
      .iter()
      .map(|key| match record.get(key.name()) {
        Some(value) => key.normalize(value).map(|v| to_sql(&v)),
        None => Ok(rusqlite::types::Value::Null),
      })
      .collect::<sift_core::Result<Vec<_>>>()?;

    let mut stmt = conn.prepare_cached(&self.insert_sql)?;
    stmt.execute(rusqlite::params_from_iter(values))?;
    Ok(())
  }

  /// Index every attribute column and the path column. Returns the number
  /// of indexes ensured.
  pub fn build_indexes(&self, conn: &Connection) -> Result<usize> {
    let columns: Vec<&str> = self
      .keys
      .iter()
      .filter(|k| k.group() == KeyGroup::Attribute || k.name() == "_path")
      .map(DbKey::column)
      .collect();

    let total = columns.len();
    for (i, column) in columns.iter().enumerate() {
      info!("building index {}/{total} on {column}", i + 1);
      let sql = format!(
        "CREATE INDEX IF NOT EXISTS {} ON {TABLE_NAME} ({})",
        ident(&format!("{column}_index")),
        ident(column),
      );
      debug!("{sql}");
      conn.execute(&sql, [])?;
    }
    Ok(total)
  }
}
