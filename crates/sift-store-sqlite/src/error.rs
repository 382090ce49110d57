//! Error type for `sift-store-sqlite`.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Schema errors: unmapped value types, unknown keys, bad values.
  #[error("schema error: {0}")]
  Core(#[from] sift_core::Error),

  #[error("database error: {0}")]
  Database(#[from] rusqlite::Error),

  #[error(
    "version mismatch: this index expects schema version {expected}, the \
     store has version {found}"
  )]
  VersionMismatch { expected: i64, found: i64 },

  /// A statement that must yield a row yielded none.
  #[error("no row returned by: {0}")]
  EmptyResult(String),

  #[error("no records to load")]
  EmptyLoad,

  /// A row whose `_path` is NULL, or whose offset or length is not a
  /// non-negative integer.
  #[error("invalid file location in row {row}: {reason}")]
  InvalidPart { row: u64, reason: String },

  #[error("cannot duplicate {0} onto itself")]
  DuplicateOntoSelf(PathBuf),

  #[error("no coordinate table for key {0:?}")]
  NoCoordinateTable(String),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
