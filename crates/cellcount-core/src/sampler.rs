//! Weighted random object sampling
//!
//! Objects are drawn uniformly from the union of all objects, which weights
//! every entity by its object count. A draw picks `t` in `[1, total]`, finds the
//! leftmost cumulative entry `>= t`, and turns the remainder into a 1-based
//! rank inside the owning entity. Resolving `(entity, rank)` to a concrete
//! object identifier is left to the data source.

use cellcount_types::EntityKey;
use rand::Rng;
use tracing::{debug, instrument};

use crate::entity_index::{EntityIndex, cumulative_sums};
use crate::error::{ModelError, ModelResult};

/// A sampled object, addressed relative to its owning entity
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    /// Entity that owns the object
    pub entity: EntityKey,
    /// 1-based position of the object within the entity
    pub rank: u64,
}

/// Position in `cumulative` owning object number `target`.
///
/// Zero-count entities repeat the previous cumulative value, so they are never
/// the leftmost entry `>= target` for a target in `[1, total]`. Runs of equal
/// sums are still folded back to their first entry, stopping at index 1 (the
/// first entity) for subsets and the global pool alike.
fn owning_position(cumulative: &[u64], target: u64) -> usize {
    let mut position = cumulative.partition_point(|&sum| sum < target);
    while position > 1 && cumulative[position] == cumulative[position - 1] {
        position -= 1;
    }
    position
}

fn locate_in(keys: &[EntityKey], cumulative: &[u64], target: u64) -> Option<ObjectRef> {
    let total = cumulative.last().copied().unwrap_or(0);
    if target == 0 || target > total {
        return None;
    }
    let position = owning_position(cumulative, target);
    Some(ObjectRef { entity: keys[position - 1].clone(), rank: target - cumulative[position - 1] })
}

/// Samples objects from every entity in an [`EntityIndex`]
#[derive(Debug, Clone, Copy)]
pub struct WeightedSampler<'a> {
    index: &'a EntityIndex,
}

impl<'a> WeightedSampler<'a> {
    pub fn new(index: &'a EntityIndex) -> Self {
        Self { index }
    }

    /// Map object number `target` (1-based, global order) to its owner and rank.
    /// `None` when `target` is outside `[1, total]`.
    pub fn locate(&self, target: u64) -> Option<ObjectRef> {
        locate_in(self.index.ordered_keys(), self.index.cumulative(), target)
    }

    /// Draw one object. Fails with [`ModelError::EmptyPool`] when the index holds no objects.
    pub fn draw<R: Rng + ?Sized>(&self, rng: &mut R) -> ModelResult<ObjectRef> {
        let total = self.index.total();
        if total == 0 {
            return Err(ModelError::EmptyPool);
        }
        let target = rng.random_range(1..=total);
        self.locate(target).ok_or(ModelError::EmptyPool)
    }

    /// Draw `n` independent objects with replacement
    #[instrument(skip(self, rng))]
    pub fn draw_many<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> ModelResult<Vec<ObjectRef>> {
        (0..n).map(|_| self.draw(rng)).collect()
    }
}

/// Samples objects restricted to a caller-supplied list of entities.
///
/// The local cumulative array follows the order of the supplied keys, not the
/// index order.
#[derive(Debug, Clone)]
pub struct SubsetSampler {
    keys: Vec<EntityKey>,
    cumulative: Vec<u64>,
}

impl SubsetSampler {
    /// Build over `keys`. Fails with [`ModelError::KeyNotFound`] for keys the index lacks.
    pub fn new(index: &EntityIndex, keys: &[EntityKey]) -> ModelResult<Self> {
        let counts = keys.iter().map(|key| index.count(key)).collect::<ModelResult<Vec<_>>>()?;
        let cumulative = cumulative_sums(keys, &counts)?;
        Ok(Self { keys: keys.to_vec(), cumulative })
    }

    /// Objects available across the subset
    pub fn total(&self) -> u64 {
        self.cumulative.last().copied().unwrap_or(0)
    }

    /// Map object number `target` (1-based, subset order) to its owner and rank
    pub fn locate(&self, target: u64) -> Option<ObjectRef> {
        locate_in(&self.keys, &self.cumulative, target)
    }

    /// Draw `n` objects with replacement. An empty subset, or one whose
    /// entities hold no objects, yields an empty result rather than an error.
    pub fn draw_many<R: Rng + ?Sized>(&self, n: usize, rng: &mut R) -> Vec<ObjectRef> {
        let total = self.total();
        if total == 0 {
            debug!(entities = self.keys.len(), "Subset holds no objects, returning no samples");
            return Vec::new();
        }
        (0..n).filter_map(|_| self.locate(rng.random_range(1..=total))).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn key(image: i64) -> EntityKey {
        EntityKey::from([0, image])
    }

    fn index_with(counts: &[i64]) -> EntityIndex {
        EntityIndex::build(counts.iter().enumerate().map(|(i, &c)| (key(i as i64), c))).unwrap()
    }

    #[test]
    fn locate_skips_zero_count_entities() {
        // cumulative: [0, 0, 2, 2, 2, 5]
        let index = index_with(&[0, 2, 0, 0, 3]);
        let sampler = WeightedSampler::new(&index);

        assert_eq!(sampler.locate(1), Some(ObjectRef { entity: key(1), rank: 1 }));
        assert_eq!(sampler.locate(2), Some(ObjectRef { entity: key(1), rank: 2 }));
        assert_eq!(sampler.locate(3), Some(ObjectRef { entity: key(4), rank: 1 }));
        assert_eq!(sampler.locate(5), Some(ObjectRef { entity: key(4), rank: 3 }));
        assert_eq!(sampler.locate(0), None);
        assert_eq!(sampler.locate(6), None);
    }

    #[test]
    fn empty_pool_is_an_error_for_global_draws() {
        let index = index_with(&[0, 0]);
        let mut rng = StdRng::seed_from_u64(7);
        let err = WeightedSampler::new(&index).draw(&mut rng).unwrap_err();
        assert!(matches!(err, ModelError::EmptyPool));
    }

    #[test]
    fn draws_never_land_on_empty_entities() {
        let index = index_with(&[0, 4, 0, 1, 0, 0, 9, 0]);
        let sampler = WeightedSampler::new(&index);
        let mut rng = StdRng::seed_from_u64(42);

        for object in sampler.draw_many(2_000, &mut rng).unwrap() {
            let count = index.count(&object.entity).unwrap();
            assert!(count > 0, "drew from empty entity {}", object.entity);
            assert!((1..=count).contains(&object.rank));
        }
    }

    #[test]
    fn subset_follows_supplied_order() {
        let index = index_with(&[2, 3, 4]);
        let subset = SubsetSampler::new(&index, &[key(2), key(0)]).unwrap();

        assert_eq!(subset.total(), 6);
        assert_eq!(subset.locate(4), Some(ObjectRef { entity: key(2), rank: 4 }));
        assert_eq!(subset.locate(5), Some(ObjectRef { entity: key(0), rank: 1 }));
    }

    #[test]
    fn subset_with_zero_count_first_entity() {
        let index = index_with(&[0, 0, 3]);
        let subset = SubsetSampler::new(&index, &[key(0), key(1), key(2)]).unwrap();
        let mut rng = StdRng::seed_from_u64(3);

        let draws = subset.draw_many(500, &mut rng);
        assert_eq!(draws.len(), 500);
        assert!(draws.iter().all(|object| object.entity == key(2)));
    }

    #[test]
    fn all_zero_subset_returns_nothing() {
        let index = index_with(&[0, 0, 5]);
        let subset = SubsetSampler::new(&index, &[key(0), key(1)]).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert!(subset.draw_many(10, &mut rng).is_empty());

        let empty = SubsetSampler::new(&index, &[]).unwrap();
        assert!(empty.draw_many(10, &mut rng).is_empty());
    }

    #[test]
    fn subset_repeating_a_huge_entity_overflows() {
        let index = index_with(&[i64::MAX, 1]);
        let err = SubsetSampler::new(&index, &[key(0), key(0), key(0)]).unwrap_err();
        assert!(matches!(err, ModelError::CountOverflow { .. }));
    }

    #[test]
    fn subset_rejects_unknown_keys() {
        let index = index_with(&[1]);
        assert!(matches!(
            SubsetSampler::new(&index, &[key(9)]),
            Err(ModelError::KeyNotFound { .. })
        ));
    }
}
