//! Core types for the Sift record index.
//!
//! This crate is deliberately free of database dependencies. It defines the
//! scalar values carried by records, the schema entries derived from them,
//! and the selection/order filters callers compose over an index.

pub mod error;
pub mod filter;
pub mod key;
pub mod part;
pub mod value;

pub use error::{Error, Result};
pub use filter::{Constraint, Filter, Order, OrderBy, Selection};
pub use key::{DbKey, KeyGroup};
pub use part::Part;
pub use value::{Record, SqlType, Value, ValueKind};
