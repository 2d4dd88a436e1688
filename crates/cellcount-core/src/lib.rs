#![allow(missing_docs)]
//! Core functionality for the cellcount object-count index.
//!
//! This crate indexes per-image object counts, groups images by categorical
//! keys such as well or gene, and draws objects uniformly at random across
//! millions of images without materializing the objects themselves. All data
//! comes from an injected [`DataSource`].

/// Typed configuration loaded from TOML
pub mod config;
/// Shared constants
pub mod constants;
/// Populated model and public query surface
pub mod data_model;
/// Entity object counts and cumulative distribution
pub mod entity_index;
/// Error types for model operations
pub mod error;
/// Lazily filled filter result cache
pub mod filter_cache;
/// In-memory data source used by tests and benchmarks
pub mod fixture;
/// Forward/reverse group maps and wildcard lookup
pub mod group_index;
/// Tabular per-group profile loading and saving
pub mod profiles;
/// Weighted object sampling
pub mod sampler;
/// External data source interface
pub mod source;
/// Tracing subscriber setup
pub mod telemetry;

pub use cellcount_types::{ColumnType, ColumnValue, EntityKey, GroupKey, group_key};
pub use config::ModelConfig;
pub use data_model::{DataModel, ModelSnapshot};
pub use entity_index::EntityIndex;
pub use error::{ModelError, ModelResult};
pub use filter_cache::{FilterCache, FilterSet};
pub use group_index::GroupIndex;
pub use profiles::{ProfileError, Profiles, describe_error};
pub use sampler::{ObjectRef, SubsetSampler, WeightedSampler};
pub use source::{DataSource, SourceError};
