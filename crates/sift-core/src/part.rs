//! File locations of indexed records.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Where a record's payload lives: a byte range within a file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Part {
  pub path:   PathBuf,
  pub offset: Option<u64>,
  pub length: Option<u64>,
}

impl Part {
  pub fn new(path: impl Into<PathBuf>, offset: Option<u64>, length: Option<u64>) -> Self {
    Self { path: path.into(), offset, length }
  }

  /// Join a relative path onto `base`; absolute paths are kept.
  pub fn resolve(mut self, base: &Path) -> Self {
    if self.path.is_relative() {
      self.path = base.join(&self.path);
    }
    self
  }
}
