//! Runtime configuration for a store handle.

use serde::Deserialize;

const DEFAULT_PAGE_SIZE: usize = 1024;
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct StoreConfig {
  /// Rows fetched per SELECT when iterating a lookup; also the number of
  /// records handed to one connection call during a load.
  #[serde(default = "default_page_size")]
  pub page_size:         usize,
  /// Maintain `coords_<key>` side tables of distinct values during loads.
  #[serde(default)]
  pub coordinate_tables: bool,
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms:   u64,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      page_size:         DEFAULT_PAGE_SIZE,
      coordinate_tables: false,
      busy_timeout_ms:   DEFAULT_BUSY_TIMEOUT_MS,
    }
  }
}

const fn default_page_size() -> usize { DEFAULT_PAGE_SIZE }

const fn default_busy_timeout_ms() -> u64 { DEFAULT_BUSY_TIMEOUT_MS }
