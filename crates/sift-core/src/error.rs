//! Error types for `sift-core`.

use thiserror::Error;

use crate::value::{SqlType, ValueKind};

#[derive(Debug, Error)]
pub enum Error {
  /// A record value whose type has no storage mapping.
  #[error("unsupported value type {kind} for key {key:?}")]
  UnmappedType { key: String, kind: ValueKind },

  /// A key that is not part of the frozen schema.
  #[error("unknown key: {0:?}")]
  UnknownKey(String),

  #[error("cannot normalize {value} for key {key:?} as {expected}")]
  Normalize {
    key:      String,
    value:    String,
    expected: SqlType,
  },

  #[error("cannot build a schema from an empty record")]
  EmptyRecord,

  #[error("serialization error: {0}")]
  Json(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
