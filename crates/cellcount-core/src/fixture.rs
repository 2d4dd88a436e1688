//! In-memory data source for tests, benchmarks and small embedded datasets
//!
//! Object `i` of entity `k` is identified as `ObjectKey { entity: k, index: i }`.
//! Call counters make it possible to assert how often the model reaches out
//! to its source.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use cellcount_types::{EntityKey, GroupKey};

use crate::source::{DataSource, ForwardGroupMaps, GroupColumnNames, SourceError};

/// Object identifier produced by [`InMemorySource`]
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectKey {
    pub entity: EntityKey,
    /// 1-based object number within the entity
    pub index: u64,
}

#[derive(Debug, Default)]
struct GroupTable {
    columns: Vec<String>,
    members: HashMap<EntityKey, GroupKey>,
}

#[derive(Debug, Default)]
pub struct InMemorySource {
    entities: Vec<(EntityKey, i64)>,
    groups: BTreeMap<String, GroupTable>,
    filters: HashMap<String, Vec<EntityKey>>,
    unavailable: bool,
    failing_lookups: bool,
    population_calls: AtomicUsize,
    filter_calls: AtomicUsize,
    table_checks: AtomicUsize,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an entity with `count` objects. Adding a key twice replaces its count.
    pub fn with_entity(mut self, key: impl Into<EntityKey>, count: i64) -> Self {
        let key = key.into();
        match self.entities.iter_mut().find(|(existing, _)| *existing == key) {
            Some(entry) => entry.1 = count,
            None => self.entities.push((key, count)),
        }
        self
    }

    pub fn with_entities<K, I>(self, entities: I) -> Self
    where
        K: Into<EntityKey>,
        I: IntoIterator<Item = (K, i64)>,
    {
        entities.into_iter().fold(self, |source, (key, count)| source.with_entity(key, count))
    }

    /// Add a grouping dimension with its key column names and memberships
    pub fn with_group<I>(mut self, dimension: &str, columns: &[&str], members: I) -> Self
    where
        I: IntoIterator<Item = (EntityKey, GroupKey)>,
    {
        let table = self.groups.entry(dimension.to_string()).or_default();
        table.columns = columns.iter().map(ToString::to_string).collect();
        table.members.extend(members);
        self
    }

    pub fn with_filter<I>(mut self, name: &str, keys: I) -> Self
    where
        I: IntoIterator<Item = EntityKey>,
    {
        self.filters.insert(name.to_string(), keys.into_iter().collect());
        self
    }

    /// Make every call fail as if the backing store were unreachable
    pub fn unavailable(mut self) -> Self {
        self.unavailable = true;
        self
    }

    /// Make object lookups fail while bulk queries keep working
    pub fn with_failing_lookups(mut self) -> Self {
        self.failing_lookups = true;
        self
    }

    /// Times the entity key list was read, i.e. population passes
    pub fn population_calls(&self) -> usize {
        self.population_calls.load(Ordering::SeqCst)
    }

    /// Times a filter was resolved
    pub fn filter_calls(&self) -> usize {
        self.filter_calls.load(Ordering::SeqCst)
    }

    pub fn table_checks(&self) -> usize {
        self.table_checks.load(Ordering::SeqCst)
    }

    fn ensure_available(&self) -> Result<(), SourceError> {
        if self.unavailable {
            return Err(SourceError::unavailable("in-memory source is switched off"));
        }
        Ok(())
    }
}

impl DataSource for InMemorySource {
    type ObjectId = ObjectKey;

    fn check_tables(&self) -> Result<(), SourceError> {
        self.ensure_available()?;
        self.table_checks.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn all_entity_keys(&self) -> Result<Vec<EntityKey>, SourceError> {
        self.ensure_available()?;
        self.population_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.entities.iter().map(|(key, _)| key.clone()).collect())
    }

    fn per_entity_object_counts(&self) -> Result<Vec<(EntityKey, i64)>, SourceError> {
        self.ensure_available()?;
        // Like a GROUP BY over an object table, empty entities produce no row.
        Ok(self.entities.iter().filter(|(_, count)| *count != 0).cloned().collect())
    }

    fn object_identifier_at(&self, key: &EntityKey, rank: u64) -> Result<ObjectKey, SourceError> {
        self.ensure_available()?;
        if self.failing_lookups {
            return Err(SourceError::query("object_identifier_at", "lookup failure injected"));
        }
        let count = self
            .entities
            .iter()
            .find(|(existing, _)| existing == key)
            .map(|(_, count)| *count)
            .ok_or_else(|| SourceError::query("object_identifier_at", format!("no entity {key}")))?;
        if rank == 0 || rank as i64 > count {
            return Err(SourceError::query(
                "object_identifier_at",
                format!("entity {key} has {count} objects, asked for {rank}"),
            ));
        }
        Ok(ObjectKey { entity: key.clone(), index: rank })
    }

    fn group_maps(&self) -> Result<(ForwardGroupMaps, GroupColumnNames), SourceError> {
        self.ensure_available()?;
        let forward = self
            .groups
            .iter()
            .map(|(dimension, table)| (dimension.clone(), table.members.clone()))
            .collect();
        let columns = self
            .groups
            .iter()
            .map(|(dimension, table)| (dimension.clone(), table.columns.clone()))
            .collect();
        Ok((forward, columns))
    }

    fn filtered_entity_keys(&self, filter: &str) -> Result<Vec<EntityKey>, SourceError> {
        self.ensure_available()?;
        self.filter_calls.fetch_add(1, Ordering::SeqCst);
        self.filters
            .get(filter)
            .cloned()
            .ok_or_else(|| SourceError::query("filtered_entity_keys", format!("unknown filter '{filter}'")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_entities_have_no_count_row() {
        let source = InMemorySource::new().with_entities([([0, 1], 3), ([0, 2], 0)]);
        let rows = source.per_entity_object_counts().unwrap();
        assert_eq!(rows, vec![(EntityKey::from([0, 1]), 3)]);
        assert_eq!(source.all_entity_keys().unwrap().len(), 2);
        assert_eq!(source.population_calls(), 1);
    }

    #[test]
    fn object_lookup_checks_bounds() {
        let source = InMemorySource::new().with_entity([0, 1], 2);
        let key = EntityKey::from([0, 1]);
        assert_eq!(source.object_identifier_at(&key, 2).unwrap().index, 2);
        assert!(source.object_identifier_at(&key, 3).is_err());
        assert!(source.object_identifier_at(&key, 0).is_err());
    }

    #[test]
    fn switched_off_source_fails_everything() {
        let source = InMemorySource::new().with_entity([0, 1], 2).unavailable();
        assert!(matches!(source.all_entity_keys(), Err(SourceError::Unavailable { .. })));
        assert!(source.filtered_entity_keys("any").is_err());
    }
}
