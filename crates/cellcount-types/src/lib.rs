//! Cellcount Types
//!
//! This crate defines the key and value types shared across the cellcount
//! workspace: entity keys that identify images, group keys built from typed
//! column values, and the column type tags recorded per grouping dimension.

#![deny(missing_docs)]

mod types;
pub use types::{ColumnType, ColumnValue, EntityKey, GroupKey};
