//! Error handling for the cellcount model
//!
//! Query errors are local and recoverable by the caller. Population errors are
//! not: population fails fast and leaves the model empty.

use cellcount_types::{EntityKey, GroupKey};
use thiserror::Error;

use crate::source::SourceError;

/// Error type for index construction, sampling and group queries
#[derive(Error, Debug, Clone)]
pub enum ModelError {
    /// Entity key absent from the object-count index
    #[error("entity {key} is not in the index")]
    KeyNotFound { key: EntityKey },

    /// Grouping dimension not known to the model
    #[error("unknown group dimension '{dimension}'")]
    UnknownGroup { dimension: String },

    /// Entity has no group key in the given dimension
    #[error("entity {key} has no group in dimension '{dimension}'")]
    UnknownEntity { dimension: String, key: EntityKey },

    /// Value vectors of different widths passed to aggregation
    #[error("value vector for {key} has {actual} values, expected {expected}")]
    DimensionMismatch { key: EntityKey, expected: usize, actual: usize },

    /// Unrestricted sampling attempted while the model holds no objects
    #[error("cannot sample from an empty object pool")]
    EmptyPool,

    /// The data source could not resolve a sampled object
    #[error("failed to resolve object {rank} of entity {key}: {source}")]
    ResolutionFailure {
        key: EntityKey,
        rank: u64,
        #[source]
        source: SourceError,
    },

    /// Object count below zero reported for an entity
    #[error("entity {key} reported a negative object count ({count})")]
    NegativeCount { key: EntityKey, count: i64 },

    /// Object counts sum past `u64::MAX`
    #[error("object total overflows at entity {key}")]
    CountOverflow { key: EntityKey },

    /// Forward and reverse group maps disagree
    #[error("group maps for dimension '{dimension}' are inconsistent at {group}: {details}")]
    InconsistentGroups { dimension: String, group: GroupKey, details: String },

    /// Data source failure, surfaced unchanged
    #[error(transparent)]
    Source(#[from] SourceError),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {message}")]
    Configuration { message: String, setting: Option<String> },
}

impl ModelError {
    /// Get the error category for logging
    pub fn category(&self) -> &'static str {
        match self {
            ModelError::KeyNotFound { .. } => "key_not_found",
            ModelError::UnknownGroup { .. } => "unknown_group",
            ModelError::UnknownEntity { .. } => "unknown_entity",
            ModelError::DimensionMismatch { .. } => "dimension_mismatch",
            ModelError::EmptyPool => "empty_pool",
            ModelError::ResolutionFailure { .. } => "resolution_failure",
            ModelError::NegativeCount { .. } => "negative_count",
            ModelError::CountOverflow { .. } => "count_overflow",
            ModelError::InconsistentGroups { .. } => "inconsistent_groups",
            ModelError::Source(_) => "source",
            ModelError::Configuration { .. } => "configuration",
        }
    }

    /// Check if the caller can recover from this error without rebuilding the model
    pub fn is_recoverable(&self) -> bool {
        match self {
            ModelError::KeyNotFound { .. } => true,
            ModelError::UnknownGroup { .. } => true,
            ModelError::UnknownEntity { .. } => true,
            ModelError::DimensionMismatch { .. } => true,
            ModelError::EmptyPool => true,
            ModelError::ResolutionFailure { .. } => true,
            ModelError::NegativeCount { .. } => false, // Bad source data
            ModelError::CountOverflow { .. } => false, // Bad source data
            ModelError::InconsistentGroups { .. } => false, // Bad source data
            ModelError::Source(_) => false,
            ModelError::Configuration { .. } => false, // Config errors need fixing
        }
    }

    /// Create a configuration error for a specific setting
    pub fn configuration(setting: &str, message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into(), setting: Some(setting.to_string()) }
    }

    pub(crate) fn unknown_group(dimension: &str) -> Self {
        Self::UnknownGroup { dimension: dimension.to_string() }
    }

    pub(crate) fn unknown_entity(dimension: &str, key: &EntityKey) -> Self {
        Self::UnknownEntity { dimension: dimension.to_string(), key: key.clone() }
    }
}

/// Result type alias for model operations
pub type ModelResult<T> = Result<T, ModelError>;
