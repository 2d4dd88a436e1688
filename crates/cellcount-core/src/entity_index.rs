//! Per-entity object counts and their cumulative distribution
//!
//! The index fixes an explicit key order once at build time. Every positional
//! computation against the cumulative array goes through [`EntityIndex::ordered_keys`];
//! nothing relies on the iteration order of a hash map.

use ahash::AHashMap;
use cellcount_types::EntityKey;
use tracing::debug;

use crate::error::{ModelError, ModelResult};

/// Object counts per entity plus the prefix-sum array used for weighted sampling
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EntityIndex {
    keys: Vec<EntityKey>,
    counts: Vec<u64>,
    positions: AHashMap<EntityKey, usize>,
    /// `cumulative[i]` is the sum of the first `i` counts; length is `keys.len() + 1`
    cumulative: Vec<u64>,
}

impl EntityIndex {
    /// Build the index from `(key, count)` pairs.
    ///
    /// The first occurrence of a key fixes its position; a later occurrence of
    /// the same key replaces its count. Negative counts are rejected.
    pub fn build<I>(counts: I) -> ModelResult<Self>
    where
        I: IntoIterator<Item = (EntityKey, i64)>,
    {
        let mut index = Self::default();

        for (key, count) in counts {
            if count < 0 {
                return Err(ModelError::NegativeCount { key, count });
            }
            let count = count as u64;
            match index.positions.get(&key) {
                Some(&position) => index.counts[position] = count,
                None => {
                    index.positions.insert(key.clone(), index.keys.len());
                    index.keys.push(key);
                    index.counts.push(count);
                }
            }
        }

        index.cumulative = cumulative_sums(&index.keys, &index.counts)?;
        debug!(entities = index.keys.len(), objects = index.total(), "Built entity index");
        Ok(index)
    }

    /// Object count of one entity
    pub fn count(&self, key: &EntityKey) -> ModelResult<u64> {
        self.positions
            .get(key)
            .map(|&position| self.counts[position])
            .ok_or_else(|| ModelError::KeyNotFound { key: key.clone() })
    }

    /// Total number of objects across all entities
    pub fn total(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// Keys in the order the cumulative array is indexed by
    pub fn ordered_keys(&self) -> &[EntityKey] {
        &self.keys
    }

    /// The prefix-sum array, starting at zero
    pub fn cumulative(&self) -> &[u64] {
        &self.cumulative
    }

    /// `(key, count)` pairs in index order
    pub fn iter(&self) -> impl Iterator<Item = (&EntityKey, u64)> + '_ {
        self.keys.iter().zip(self.counts.iter().copied())
    }

    /// Whether the key is indexed
    pub fn contains(&self, key: &EntityKey) -> bool {
        self.positions.contains_key(key)
    }

    /// Number of entities
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Whether the index holds no entities
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

/// Prefix sums with a leading zero: `[0, c0, c0 + c1, ...]`.
/// `keys[i]` owns `counts[i]` and is named in the overflow error.
pub(crate) fn cumulative_sums(keys: &[EntityKey], counts: &[u64]) -> ModelResult<Vec<u64>> {
    let mut cumulative = Vec::with_capacity(counts.len() + 1);
    let mut running = 0u64;
    cumulative.push(running);
    for (key, &count) in keys.iter().zip(counts) {
        running = running
            .checked_add(count)
            .ok_or_else(|| ModelError::CountOverflow { key: key.clone() })?;
        cumulative.push(running);
    }
    Ok(cumulative)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(image: i64) -> EntityKey {
        EntityKey::from([0, image])
    }

    #[test]
    fn cumulative_array_tracks_counts_in_order() {
        let index = EntityIndex::build(vec![(key(1), 3), (key(2), 0), (key(3), 5)]).unwrap();

        assert_eq!(index.ordered_keys(), &[key(1), key(2), key(3)]);
        assert_eq!(index.cumulative(), &[0, 3, 3, 8]);
        assert_eq!(index.total(), 8);
        assert_eq!(index.count(&key(2)).unwrap(), 0);
        assert_eq!(index.count(&key(3)).unwrap(), 5);
    }

    #[test]
    fn later_rows_override_counts_without_moving_keys() {
        let index =
            EntityIndex::build(vec![(key(1), 0), (key(2), 0), (key(2), 4), (key(1), 1)]).unwrap();

        assert_eq!(index.ordered_keys(), &[key(1), key(2)]);
        assert_eq!(index.cumulative(), &[0, 1, 5]);
    }

    #[test]
    fn negative_counts_are_rejected() {
        let err = EntityIndex::build(vec![(key(1), 2), (key(2), -1)]).unwrap_err();
        assert!(matches!(err, ModelError::NegativeCount { count: -1, .. }));
    }

    #[test]
    fn overflowing_total_is_rejected() {
        let err = EntityIndex::build(vec![(key(1), i64::MAX), (key(2), i64::MAX), (key(3), i64::MAX)])
            .unwrap_err();
        assert!(matches!(err, ModelError::CountOverflow { key } if key == EntityKey::from([0, 3])));
        assert!(!ModelError::CountOverflow { key: key(3) }.is_recoverable());

        // Two maximal counts still fit in u64.
        let index = EntityIndex::build(vec![(key(1), i64::MAX), (key(2), i64::MAX)]).unwrap();
        assert_eq!(index.total(), u64::MAX - 1);
    }

    #[test]
    fn missing_keys_report_key_not_found() {
        let index = EntityIndex::build(vec![(key(1), 2)]).unwrap();
        let err = index.count(&key(7)).unwrap_err();
        assert!(matches!(err, ModelError::KeyNotFound { key } if key == EntityKey::from([0, 7])));
    }

    #[test]
    fn empty_index_has_zero_total() {
        let index = EntityIndex::build(Vec::new()).unwrap();
        assert!(index.is_empty());
        assert_eq!(index.total(), 0);
        assert_eq!(index.cumulative(), &[0]);
    }
}
