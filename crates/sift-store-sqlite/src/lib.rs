//! SQLite backend for the Sift record index.
//!
//! Records are inserted into a single `entries` table whose columns are
//! inferred from the first record. Filters become chained temporary views,
//! and every thread talks to the store through its own blocking
//! [`rusqlite`] connection.

mod connection;
mod coords;
mod encode;
mod order;
mod rows;
mod schema;
mod store;
mod view;

pub mod config;
pub mod error;

pub use config::StoreConfig;
pub use error::{Error, Result};
pub use rows::{RowIter, Records, Rows};
pub use schema::{SCHEMA_VERSION, TABLE_NAME};
pub use store::SqliteStore;
