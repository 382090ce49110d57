//! [`SqliteStore`] — a store path plus an accumulated filter chain.

use std::{
  path::{Path, PathBuf},
  sync::OnceLock,
};

use rusqlite::OptionalExtension as _;
use sift_core::{Filter, Part, Record, Value};
use tracing::{debug, info};

use crate::{
  Error, Result,
  config::StoreConfig,
  connection::{self, Session},
  coords::CoordTables,
  encode::ident,
  rows::{Records, Rows},
  schema,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A handle on an index stored in a single SQLite file.
///
/// Handles are cheap: opening one touches no storage, and
/// [`SqliteStore::filter`] returns a new handle with one more filter while
/// leaving `self` as it was. Storage is reached on first read, through the
/// calling thread's own connection.
#[derive(Debug, Clone)]
pub struct SqliteStore {
  path:    PathBuf,
  config:  StoreConfig,
  filters: Vec<Filter>,
  /// Current view, resolved on first read.
  view:    OnceLock<String>,
}

impl SqliteStore {
  pub fn open(path: impl AsRef<Path>) -> Self {
    Self::open_with(path, StoreConfig::default())
  }

  pub fn open_with(path: impl AsRef<Path>, config: StoreConfig) -> Self {
    Self {
      path: path.as_ref().to_path_buf(),
      config,
      filters: Vec::new(),
      view: OnceLock::new(),
    }
  }

  pub fn path(&self) -> &Path { &self.path }

  pub fn config(&self) -> &StoreConfig { &self.config }

  pub fn filters(&self) -> &[Filter] { &self.filters }

  fn call<T>(&self, f: impl FnOnce(&mut Session) -> Result<T>) -> Result<T> {
    connection::call(&self.path, &self.config, f)
  }

  /// Run `f` with the name of the current view, creating the view chain on
  /// this thread's connection if it is not there yet.
  pub(crate) fn with_view<T>(
    &self,
    f: impl FnOnce(&mut Session, &str) -> Result<T>,
  ) -> Result<T> {
    self.call(|session| {
      let view = match self.view.get() {
        Some(view) if session.has_view(view) => view.clone(),
        _ => {
          let view = session.resolve_view(&self.filters)?;
          debug!("{}: current view is {view}", self.path.display());
          let _ = self.view.set(view.clone());
          view
        }
      };
      f(session, &view)
    })
  }

  // ── Filters ───────────────────────────────────────────────────────────────

  /// A new handle with `filter` appended to this handle's filters.
  pub fn filter(&self, filter: impl Into<Filter>) -> Self {
    let mut filters = self.filters.clone();
    filters.push(filter.into());
    Self {
      path: self.path.clone(),
      config: self.config.clone(),
      filters,
      view: OnceLock::new(),
    }
  }

  /// Name of the view this handle reads from.
  pub fn view_name(&self) -> Result<String> {
    self.with_view(|_, view| Ok(view.to_owned()))
  }

  /// The statements defining the current view chain, base table first.
  pub fn explain(&self) -> Result<Vec<String>> {
    self.with_view(|session, view| Ok(session.view_statements(view)))
  }

  // ── Writes ────────────────────────────────────────────────────────────────

  /// Insert every record; returns how many were inserted. The first record
  /// ever inserted into the store defines its columns.
  pub fn load(&self, records: impl IntoIterator<Item = Record>) -> Result<usize> {
    self.try_load(records.into_iter().map(Ok::<_, Error>))
  }

  /// [`SqliteStore::load`] over fallible records; stops at the first error.
  pub fn try_load<I, E>(&self, records: I) -> Result<usize>
  where
    I: IntoIterator<Item = std::result::Result<Record, E>>,
    Error: From<E>,
  {
    let chunk_size = self.config.page_size.max(1);
    let mut records = records.into_iter();
    let mut count = 0;

    loop {
      let chunk = records
        .by_ref()
        .take(chunk_size)
        .collect::<std::result::Result<Vec<_>, E>>()?;
      if chunk.is_empty() {
        break;
      }

      self.call(|session| {
        for record in &chunk {
          let (conn, entries) = session.entries()?;
          entries.insert(conn, record)?;
          if self.config.coordinate_tables {
            let (conn, coords) = session.coords()?;
            coords.update_with_record(conn, record)?;
          }
        }
        Ok(())
      })?;
      count += chunk.len();
    }

    if count == 0 {
      return Err(Error::EmptyLoad);
    }
    info!("added {count} entries to {}", self.path.display());
    Ok(count)
  }

  /// Create secondary indexes on the attribute and path columns.
  pub fn build_indexes(&self) -> Result<usize> {
    self.call(|session| {
      let (conn, entries) = session.entries()?;
      entries.build_indexes(conn)
    })
  }

  /// Copy the rows visible through this handle into a new store at
  /// `target`, with the same columns. Returns a handle on the new store.
  pub fn duplicate(&self, target: impl AsRef<Path>) -> Result<Self> {
    if absolute(target.as_ref()) == absolute(&self.path) {
      return Err(Error::DuplicateOntoSelf(self.path.clone()));
    }
    let keys = self.call(|session| Ok(session.entries()?.1.keys().to_vec()))?;

    let duplicate = Self::open_with(target, self.config.clone());
    duplicate.call(|session| {
      let (conn, entries) = session.entries()?;
      entries.create(conn, keys)
    })?;

    let records = self.lookup_records::<&str>(&[], None, None)?;
    duplicate.try_load(records.iter())?;
    Ok(duplicate)
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  /// Initialise the persisted schema version, or fail if it differs from
  /// [`schema::SCHEMA_VERSION`].
  pub fn check_version(&self) -> Result<()> {
    self.call(|session| schema::check_version(session.conn()))
  }

  /// Logical key names, in column order.
  pub fn keys(&self) -> Result<Vec<String>> {
    self.call(|session| {
      let (_, entries) = session.entries()?;
      Ok(entries.keys().iter().map(|k| k.name().to_owned()).collect())
    })
  }

  /// Number of rows in the current view.
  pub fn count(&self) -> Result<u64> {
    self.with_view(|session, view| {
      let sql = format!("SELECT COUNT(*) FROM {view}");
      debug!("{sql}");
      let count: Option<i64> =
        session.conn().query_row(&sql, [], |row| row.get(0)).optional()?;
      count.map(|c| c as u64).ok_or(Error::EmptyResult(sql))
    })
  }

  /// The values of `keys` for each row of the current view. An empty `keys`
  /// selects every key.
  pub fn lookup_rows<K: AsRef<str>>(
    &self,
    keys: &[K],
    limit: Option<u64>,
    offset: Option<u64>,
  ) -> Result<Rows> {
    let (_, columns) = self.resolve_keys(keys)?;
    Ok(Rows::new(self.clone(), columns, limit, offset))
  }

  /// Like [`SqliteStore::lookup_rows`], yielding records by logical name.
  pub fn lookup_records<K: AsRef<str>>(
    &self,
    keys: &[K],
    limit: Option<u64>,
    offset: Option<u64>,
  ) -> Result<Records> {
    let (names, columns) = self.resolve_keys(keys)?;
    Ok(Records::new(Rows::new(self.clone(), columns, limit, offset), names))
  }

  /// File locations (`_path`, `_offset`, `_length`) of the rows in the
  /// current view. Relative paths are resolved against the directory
  /// holding the store.
  pub fn lookup_parts(&self, limit: Option<u64>, offset: Option<u64>) -> Result<Vec<Part>> {
    let base = self.path.parent().unwrap_or(Path::new(""));
    let rows = self.lookup_rows(&["_path", "_offset", "_length"], limit, offset)?;
    let first = offset.unwrap_or(0);

    let mut parts = Vec::new();
    for (i, row) in rows.iter().enumerate() {
      let row_number = first + i as u64;
      let invalid = |reason: &str| Error::InvalidPart {
        row:    row_number,
        reason: reason.to_owned(),
      };
      let mut values = row?.into_iter();
      let path = match values.next() {
        Some(Value::Null) | None => return Err(invalid("no path")),
        Some(path) => path.to_string(),
      };
      let offset = byte_position(values.next()).ok_or_else(|| invalid("bad offset"))?;
      let length = byte_position(values.next()).ok_or_else(|| invalid("bad length"))?;
      parts.push(Part::new(path, offset, length).resolve(base));
    }
    Ok(parts)
  }

  /// Distinct non-null values of `key` in the current view, in order of
  /// first appearance.
  pub fn distinct_values(&self, key: &str) -> Result<Vec<Value>> {
    let rows = self.lookup_rows(&[key], None, None)?;
    let mut values = Vec::new();
    for row in &rows {
      for value in row? {
        if !value.is_null() && !values.contains(&value) {
          values.push(value);
        }
      }
    }
    Ok(values)
  }

  /// Values recorded in the `coords_<key>` side table. These cover the
  /// whole store, not the current view.
  pub fn coordinate_values(&self, key: &str) -> Result<Vec<String>> {
    self.call(|session| {
      let coords = CoordTables::discover(session.conn())?;
      coords
        .get(key)
        .map(|table| table.values().to_vec())
        .ok_or_else(|| Error::NoCoordinateTable(key.to_owned()))
    })
  }

  /// Map logical keys to (names, quoted columns); empty means all keys.
  fn resolve_keys<K: AsRef<str>>(&self, keys: &[K]) -> Result<(Vec<String>, Vec<String>)> {
    self.call(|session| {
      let (_, entries) = session.entries()?;
      let selected = if keys.is_empty() {
        entries.keys().to_vec()
      } else {
        keys
          .iter()
          .map(|k| entries.key(k.as_ref()).cloned())
          .collect::<Result<Vec<_>>>()?
      };
      Ok(
        selected
          .iter()
          .map(|k| (k.name().to_owned(), ident(k.column())))
          .unzip(),
      )
    })
  }
}

/// `Some(None)` for NULL, `Some(Some(n))` for a non-negative integer.
fn byte_position(value: Option<Value>) -> Option<Option<u64>> {
  match value {
    None | Some(Value::Null) => Some(None),
    Some(Value::Integer(i)) => u64::try_from(i).ok().map(Some),
    Some(_) => None,
  }
}

/// Canonical form of `path`, which need not exist yet.
fn absolute(path: &Path) -> PathBuf {
  if let Ok(path) = path.canonicalize() {
    return path;
  }
  let (Some(parent), Some(name)) = (path.parent(), path.file_name()) else {
    return path.to_path_buf();
  };
  let parent = if parent.as_os_str().is_empty() { Path::new(".") } else { parent };
  parent
    .canonicalize()
    .map(|parent| parent.join(name))
    .unwrap_or_else(|_| path.to_path_buf())
}
