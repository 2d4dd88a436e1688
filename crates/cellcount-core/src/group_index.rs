//! Per-dimension grouping of entities
//!
//! Each grouping dimension ("Well", "Gene", ...) keeps a forward map from
//! entity to group key and a reverse map from group key to its entities, plus
//! the key column names and types. The two maps are checked to be exact
//! inverses when the index is built.

use std::collections::{BTreeSet, HashMap};

use ahash::{AHashMap, AHashSet};
use cellcount_types::{ColumnType, ColumnValue, EntityKey, GroupKey};
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::source::{ForwardGroupMaps, GroupColumnNames, ReverseGroupMaps};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
struct Dimension {
    forward: AHashMap<EntityKey, GroupKey>,
    reverse: AHashMap<GroupKey, Vec<EntityKey>>,
    column_names: Vec<String>,
    column_types: Vec<ColumnType>,
}

impl Dimension {
    fn build(
        name: &str,
        forward: HashMap<EntityKey, GroupKey>,
        reverse: HashMap<GroupKey, Vec<EntityKey>>,
        column_names: Vec<String>,
    ) -> ModelResult<Self> {
        let mut listed: AHashSet<&EntityKey> = AHashSet::with_capacity(forward.len());
        for (group, entities) in &reverse {
            for entity in entities {
                let details = match forward.get(entity) {
                    Some(mapped) if mapped != group => {
                        format!("entity {entity} maps forward to {mapped}")
                    }
                    None => format!("entity {entity} has no forward mapping"),
                    Some(_) if !listed.insert(entity) => {
                        format!("entity {entity} is listed more than once")
                    }
                    Some(_) => continue,
                };
                return Err(ModelError::InconsistentGroups {
                    dimension: name.to_string(),
                    group: group.clone(),
                    details,
                });
            }
        }
        if let Some((entity, group)) = forward.iter().find(|(entity, _)| !listed.contains(entity)) {
            return Err(ModelError::InconsistentGroups {
                dimension: name.to_string(),
                group: group.clone(),
                details: format!("entity {entity} is missing from the reverse map"),
            });
        }

        let column_types =
            reverse.keys().min().map(GroupKey::column_types).unwrap_or_default();

        Ok(Self {
            forward: forward.into_iter().collect(),
            reverse: reverse.into_iter().collect(),
            column_names,
            column_types,
        })
    }
}

/// Forward and reverse group maps for every dimension
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GroupIndex {
    dimensions: AHashMap<String, Dimension>,
    wildcard: ColumnValue,
}

impl GroupIndex {
    /// Build from maps already computed by the data source.
    ///
    /// `wildcard` is the group-key component that matches any value in
    /// [`GroupIndex::entities_in_with_wildcards`].
    pub fn build(
        forward: ForwardGroupMaps,
        mut reverse: ReverseGroupMaps,
        mut column_names: GroupColumnNames,
        wildcard: ColumnValue,
    ) -> ModelResult<Self> {
        let mut dimensions = AHashMap::with_capacity(forward.len());

        for (name, forward_map) in forward {
            let reverse_map = reverse.remove(&name).unwrap_or_default();
            let names = column_names.remove(&name).unwrap_or_default();
            let dimension = Dimension::build(&name, forward_map, reverse_map, names)?;
            debug!(
                dimension = %name,
                entities = dimension.forward.len(),
                groups = dimension.reverse.len(),
                "Indexed group dimension"
            );
            dimensions.insert(name, dimension);
        }

        if let Some((name, reverse_map)) = reverse.into_iter().find(|(_, map)| !map.is_empty()) {
            let group = reverse_map.keys().min().cloned().unwrap_or_default();
            return Err(ModelError::InconsistentGroups {
                dimension: name,
                group,
                details: "dimension has a reverse map but no forward map".to_string(),
            });
        }

        Ok(Self { dimensions, wildcard })
    }

    /// An index with no dimensions
    pub fn empty(wildcard: ColumnValue) -> Self {
        Self { dimensions: AHashMap::new(), wildcard }
    }

    fn dimension(&self, name: &str) -> ModelResult<&Dimension> {
        self.dimensions.get(name).ok_or_else(|| ModelError::unknown_group(name))
    }

    /// Names of all dimensions, sorted
    pub fn dimension_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.dimensions.keys().cloned().collect();
        names.sort();
        names
    }

    /// The wildcard sentinel used by wildcard lookups
    pub fn wildcard(&self) -> &ColumnValue {
        &self.wildcard
    }

    /// Key column names of a dimension. The returned vector is a copy.
    pub fn column_names(&self, dimension: &str) -> ModelResult<Vec<String>> {
        Ok(self.dimension(dimension)?.column_names.clone())
    }

    /// Key column types of a dimension. The returned vector is a copy.
    pub fn column_types(&self, dimension: &str) -> ModelResult<Vec<ColumnType>> {
        Ok(self.dimension(dimension)?.column_types.clone())
    }

    /// Group key of one entity
    pub fn group_of(&self, dimension: &str, key: &EntityKey) -> ModelResult<&GroupKey> {
        self.dimension(dimension)?
            .forward
            .get(key)
            .ok_or_else(|| ModelError::unknown_entity(dimension, key))
    }

    /// Entities in one group, optionally intersected with a filter set.
    ///
    /// An unknown group key yields an empty set; an unknown dimension is an error.
    pub fn entities_in(
        &self,
        dimension: &str,
        group: &GroupKey,
        filter: Option<&AHashSet<EntityKey>>,
    ) -> ModelResult<BTreeSet<EntityKey>> {
        let dimension = self.dimension(dimension)?;
        let members = dimension.reverse.get(group).map(Vec::as_slice).unwrap_or_default();
        Ok(apply_filter(members.iter(), filter))
    }

    /// Like [`GroupIndex::entities_in`], but wildcard components in `pattern`
    /// match any value at that position, collecting entities from every
    /// matching group.
    pub fn entities_in_with_wildcards(
        &self,
        dimension: &str,
        pattern: &GroupKey,
        filter: Option<&AHashSet<EntityKey>>,
    ) -> ModelResult<BTreeSet<EntityKey>> {
        if !pattern.has_wildcard(&self.wildcard) {
            return self.entities_in(dimension, pattern, filter);
        }

        let dimension = self.dimension(dimension)?;
        let members = dimension
            .reverse
            .iter()
            .filter(|(group, _)| group.matches_pattern(pattern, &self.wildcard))
            .flat_map(|(_, entities)| entities.iter());
        Ok(apply_filter(members, filter))
    }

    /// Distinct group keys present in a dimension
    pub fn group_keys(&self, dimension: &str) -> ModelResult<BTreeSet<GroupKey>> {
        Ok(self.dimension(dimension)?.forward.values().cloned().collect())
    }

    /// Sum per-entity value vectors into per-group vectors.
    ///
    /// All vectors must have the same width. Entities without a group in the
    /// dimension are an error rather than being dropped.
    pub fn sum_to_group(
        &self,
        dimension: &str,
        values: &HashMap<EntityKey, Vec<f64>>,
    ) -> ModelResult<HashMap<GroupKey, Vec<f64>>> {
        let name = dimension;
        let dimension = self.dimension(name)?;
        let Some(width) = values.values().next().map(Vec::len) else {
            return Ok(HashMap::new());
        };

        let mut sums: HashMap<GroupKey, Vec<f64>> = HashMap::new();
        for (key, vector) in values {
            if vector.len() != width {
                return Err(ModelError::DimensionMismatch {
                    key: key.clone(),
                    expected: width,
                    actual: vector.len(),
                });
            }
            let group =
                dimension.forward.get(key).ok_or_else(|| ModelError::unknown_entity(name, key))?;
            let running = sums.entry(group.clone()).or_insert_with(|| vec![0.0; width]);
            for (total, value) in running.iter_mut().zip(vector) {
                *total += value;
            }
        }
        Ok(sums)
    }
}

fn apply_filter<'a>(
    members: impl Iterator<Item = &'a EntityKey>,
    filter: Option<&AHashSet<EntityKey>>,
) -> BTreeSet<EntityKey> {
    match filter {
        Some(allowed) => members.filter(|key| allowed.contains(*key)).cloned().collect(),
        None => members.cloned().collect(),
    }
}
