//! External data source interface
//!
//! The model never talks to a database directly. Everything it needs (entity
//! keys, per-entity object counts, group mappings, filters and object lookups)
//! comes through [`DataSource`], so SQL adapters, flat files and in-memory
//! fixtures are interchangeable.

use std::collections::HashMap;
use std::fmt::Debug;

use cellcount_types::{EntityKey, GroupKey};
use thiserror::Error;

/// Forward group maps: dimension -> entity -> group key
pub type ForwardGroupMaps = HashMap<String, HashMap<EntityKey, GroupKey>>;
/// Reverse group maps: dimension -> group key -> entities sharing it
pub type ReverseGroupMaps = HashMap<String, HashMap<GroupKey, Vec<EntityKey>>>;
/// Key column names per dimension
pub type GroupColumnNames = HashMap<String, Vec<String>>;

/// Errors reported by a data source implementation
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The backing store cannot be reached at all
    #[error("data source unavailable: {reason}")]
    Unavailable { reason: String },

    /// A single query against the backing store failed
    #[error("data source query '{operation}' failed: {message}")]
    Query { operation: String, message: String },
}

impl SourceError {
    /// Create a query failure for the named operation
    pub fn query(operation: &str, message: impl Into<String>) -> Self {
        Self::Query { operation: operation.to_string(), message: message.into() }
    }

    /// Create an unavailable-source error
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable { reason: reason.into() }
    }
}

/// Everything the model consumes from the outside world.
///
/// Implementations must return the same data for repeated calls within one
/// model lifetime; the model reads each bulk method once per population.
pub trait DataSource: Send + Sync {
    /// Identifier of a single object, as the source defines it
    type ObjectId: Clone + Debug + Send + Sync;

    /// Validate backing tables before population. Called only when
    /// `check_tables` is enabled in the model configuration.
    fn check_tables(&self) -> Result<(), SourceError> {
        Ok(())
    }

    /// Every entity key, including entities that contain no objects
    fn all_entity_keys(&self) -> Result<Vec<EntityKey>, SourceError>;

    /// `(key, count)` rows for entities with objects. Entities missing here
    /// count as zero.
    fn per_entity_object_counts(&self) -> Result<Vec<(EntityKey, i64)>, SourceError>;

    /// Resolve the `rank`-th object (1-based) inside `key`
    fn object_identifier_at(&self, key: &EntityKey, rank: u64)
    -> Result<Self::ObjectId, SourceError>;

    /// Forward group maps together with each dimension's key column names
    fn group_maps(&self) -> Result<(ForwardGroupMaps, GroupColumnNames), SourceError>;

    /// Reverse group maps. The default inverts [`DataSource::group_maps`];
    /// sources that can query the reverse direction directly should override it.
    fn reverse_group_maps(&self) -> Result<ReverseGroupMaps, SourceError> {
        let (forward, _) = self.group_maps()?;
        Ok(invert_group_maps(&forward))
    }

    /// Entity keys selected by the named filter
    fn filtered_entity_keys(&self, filter: &str) -> Result<Vec<EntityKey>, SourceError>;
}

impl<T: DataSource + ?Sized> DataSource for std::sync::Arc<T> {
    type ObjectId = T::ObjectId;

    fn check_tables(&self) -> Result<(), SourceError> {
        (**self).check_tables()
    }

    fn all_entity_keys(&self) -> Result<Vec<EntityKey>, SourceError> {
        (**self).all_entity_keys()
    }

    fn per_entity_object_counts(&self) -> Result<Vec<(EntityKey, i64)>, SourceError> {
        (**self).per_entity_object_counts()
    }

    fn object_identifier_at(
        &self,
        key: &EntityKey,
        rank: u64,
    ) -> Result<Self::ObjectId, SourceError> {
        (**self).object_identifier_at(key, rank)
    }

    fn group_maps(&self) -> Result<(ForwardGroupMaps, GroupColumnNames), SourceError> {
        (**self).group_maps()
    }

    fn reverse_group_maps(&self) -> Result<ReverseGroupMaps, SourceError> {
        (**self).reverse_group_maps()
    }

    fn filtered_entity_keys(&self, filter: &str) -> Result<Vec<EntityKey>, SourceError> {
        (**self).filtered_entity_keys(filter)
    }
}

/// Build reverse maps from forward maps. Entities within a group keep key order.
pub fn invert_group_maps(forward: &ForwardGroupMaps) -> ReverseGroupMaps {
    forward
        .iter()
        .map(|(dimension, mapping)| {
            let mut reverse: HashMap<GroupKey, Vec<EntityKey>> = HashMap::new();
            for (entity, group) in mapping {
                reverse.entry(group.clone()).or_default().push(entity.clone());
            }
            for entities in reverse.values_mut() {
                entities.sort();
            }
            (dimension.clone(), reverse)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cellcount_types::group_key;

    #[test]
    fn inverting_forward_maps_groups_entities() {
        let mut wells = HashMap::new();
        wells.insert(EntityKey::from([0, 2]), group_key![0, "A01"]);
        wells.insert(EntityKey::from([0, 1]), group_key![0, "A01"]);
        wells.insert(EntityKey::from([0, 3]), group_key![0, "A02"]);
        let mut forward = ForwardGroupMaps::new();
        forward.insert("Well".to_string(), wells);

        let reverse = invert_group_maps(&forward);
        let wells = &reverse["Well"];
        assert_eq!(wells.len(), 2);
        assert_eq!(
            wells[&group_key![0, "A01"]],
            vec![EntityKey::from([0, 1]), EntityKey::from([0, 2])]
        );
        assert_eq!(wells[&group_key![0, "A02"]], vec![EntityKey::from([0, 3])]);
    }
}
