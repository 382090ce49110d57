//! Lazy, restartable row sequences over a store's current view.
//!
//! A [`Rows`] value holds the query, not the results. Each call to
//! [`Rows::iter`] runs the SELECT again from the start, one page at a time,
//! so iteration never keeps a statement open between items.

use std::collections::VecDeque;

use sift_core::{Record, Value};
use tracing::debug;

use crate::{Result, SqliteStore, encode::from_sql};

/// Selected columns of the current view, within an optional window.
#[derive(Debug, Clone)]
pub struct Rows {
  store:   SqliteStore,
  columns: Vec<String>,
  limit:   Option<u64>,
  offset:  u64,
}

impl Rows {
  pub(crate) fn new(
    store: SqliteStore,
    columns: Vec<String>,
    limit: Option<u64>,
    offset: Option<u64>,
  ) -> Self {
    Self { store, columns, limit, offset: offset.unwrap_or(0) }
  }

  pub fn iter(&self) -> RowIter<'_> {
    RowIter {
      rows:      self,
      buffer:    VecDeque::new(),
      fetched:   0,
      exhausted: false,
    }
  }

  fn fetch_page(&self, offset: u64, limit: u64) -> Result<Vec<Vec<Value>>> {
    let columns = if self.columns.is_empty() {
      "*".to_owned()
    } else {
      self.columns.join(", ")
    };
    self.store.with_view(|session, view| {
      let sql = format!("SELECT {columns} FROM {view} LIMIT {limit} OFFSET {offset}");
      debug!("{sql}");
      let mut stmt = session.conn().prepare(&sql)?;
      let width = stmt.column_count();
      let rows = stmt
        .query_map([], |row| {
          (0..width)
            .map(|i| row.get_ref(i).map(from_sql))
            .collect::<rusqlite::Result<Vec<_>>>()
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
      Ok(rows)
    })
  }
}

impl<'a> IntoIterator for &'a Rows {
  type Item = Result<Vec<Value>>;
  type IntoIter = RowIter<'a>;

  fn into_iter(self) -> Self::IntoIter { self.iter() }
}

/// One pass over a [`Rows`] query.
#[derive(Debug)]
pub struct RowIter<'a> {
  rows:      &'a Rows,
  buffer:    VecDeque<Vec<Value>>,
  fetched:   u64,
  exhausted: bool,
}

impl RowIter<'_> {
  fn refill(&mut self) -> Result<()> {
    let page = self.rows.store.config().page_size.max(1) as u64;
    let want = match self.rows.limit {
      Some(limit) => page.min(limit.saturating_sub(self.fetched)),
      None => page,
    };
    if want == 0 {
      self.exhausted = true;
      return Ok(());
    }

    let batch = self.rows.fetch_page(self.rows.offset + self.fetched, want)?;
    if (batch.len() as u64) < want {
      self.exhausted = true;
    }
    self.fetched += batch.len() as u64;
    self.buffer.extend(batch);
    Ok(())
  }
}

impl Iterator for RowIter<'_> {
  type Item = Result<Vec<Value>>;

  fn next(&mut self) -> Option<Self::Item> {
    if self.buffer.is_empty() && !self.exhausted {
      if let Err(e) = self.refill() {
        self.exhausted = true;
        return Some(Err(e));
      }
    }
    self.buffer.pop_front().map(Ok)
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// Like [`Rows`], but yields [`Record`]s keyed by logical name. NULL
/// values are left out of each record.
#[derive(Debug, Clone)]
pub struct Records {
  rows:  Rows,
  names: Vec<String>,
}

impl Records {
  pub(crate) fn new(rows: Rows, names: Vec<String>) -> Self { Self { rows, names } }

  pub fn names(&self) -> &[String] { &self.names }

  pub fn iter(&self) -> impl Iterator<Item = Result<Record>> + '_ {
    self.rows.iter().map(move |row| {
      row.map(|values| {
        self
          .names
          .iter()
          .cloned()
          .zip(values)
          .filter(|(_, v)| !v.is_null())
          .collect()
      })
    })
  }
}
