//! Per-thread connections.
//!
//! SQLite connections must not be shared across threads, so each thread
//! opens its own connection per store path on first use and keeps it for
//! the thread's lifetime. Everything scoped to a connection (the cached
//! schema, temporary views, registered ordering functions) lives beside it
//! in a [`Session`].

use std::{
  cell::RefCell,
  collections::HashMap,
  path::{Path, PathBuf},
  rc::Rc,
  time::Duration,
};

use rusqlite::Connection;
use sift_core::Filter;
use tracing::debug;

use crate::{
  Result,
  config::StoreConfig,
  coords::CoordTables,
  schema::{EntriesTable, check_version},
  view::ViewArena,
};

thread_local! {
  static SESSIONS: RefCell<HashMap<PathBuf, Rc<RefCell<Session>>>> =
    RefCell::new(HashMap::new());
}

/// Run `f` against this thread's session for `path`, opening it first if
/// needed.
///
/// Calls must not nest for the same path.
pub fn call<T>(
  path: &Path,
  config: &StoreConfig,
  f: impl FnOnce(&mut Session) -> Result<T>,
) -> Result<T> {
  let session = SESSIONS.with(|sessions| -> Result<_> {
    let mut sessions = sessions.borrow_mut();
    if let Some(session) = sessions.get(path) {
      return Ok(Rc::clone(session));
    }
    let session = Rc::new(RefCell::new(Session::open(path, config)?));
    sessions.insert(path.to_path_buf(), Rc::clone(&session));
    Ok(session)
  })?;
  let mut session = session.borrow_mut();
  f(&mut session)
}

/// A connection and the state scoped to it.
#[derive(Debug)]
pub struct Session {
  conn:            Connection,
  version_checked: bool,
  entries:         EntriesTable,
  coords:          Option<CoordTables>,
  views:           ViewArena,
}

impl Session {
  fn open(path: &Path, config: &StoreConfig) -> Result<Self> {
    debug!(
      "opening connection to {} on thread {:?}",
      path.display(),
      std::thread::current().id()
    );
    let conn = Connection::open(path)?;
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;
    Ok(Self {
      conn,
      version_checked: false,
      entries: EntriesTable::default(),
      coords: None,
      views: ViewArena::default(),
    })
  }

  pub fn conn(&self) -> &Connection { &self.conn }

  /// Check the store version once, then (re)read the `entries` schema
  /// while the table does not exist yet, since another connection may have
  /// created it since.
  fn load_entries(&mut self) -> Result<()> {
    if !self.version_checked {
      check_version(&self.conn)?;
      self.version_checked = true;
    }
    if !self.entries.is_created() {
      self.entries = EntriesTable::read(&self.conn)?;
    }
    Ok(())
  }

  pub fn entries(&mut self) -> Result<(&Connection, &mut EntriesTable)> {
    self.load_entries()?;
    Ok((&self.conn, &mut self.entries))
  }

  pub fn coords(&mut self) -> Result<(&Connection, &mut CoordTables)> {
    if self.coords.is_none() {
      self.coords = Some(CoordTables::discover(&self.conn)?);
    }
    let coords = self.coords.get_or_insert_with(CoordTables::default);
    Ok((&self.conn, coords))
  }

  /// Whether `name` is usable on this connection without resolving again.
  pub fn has_view(&self, name: &str) -> bool {
    self.version_checked && self.views.contains(name)
  }

  /// `CREATE VIEW` statements leading to `name`, base table first.
  pub fn view_statements(&self, name: &str) -> Vec<String> {
    self.views.chain(name).into_iter().map(|node| node.statement.clone()).collect()
  }

  /// Name of the view produced by folding `filters` over the base table.
  pub fn resolve_view(&mut self, filters: &[Filter]) -> Result<String> {
    self.load_entries()?;
    self.views.resolve(&self.conn, &self.entries, filters)
  }
}
