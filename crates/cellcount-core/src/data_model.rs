//! The populated model and its query surface
//!
//! `DataModel` reads everything it needs from a [`DataSource`] in one pass,
//! keeps the result as an immutable [`ModelSnapshot`], and answers sampling
//! and grouping queries against it. Every query populates the model on first
//! use. Population and reset take the state lock for writing; queries clone an
//! `Arc` to the snapshot and run without holding any lock.

use std::collections::{BTreeSet, HashMap};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use cellcount_types::{ColumnType, ColumnValue, EntityKey, GroupKey};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, info, instrument};

use crate::config::ModelConfig;
use crate::constants::fraction::{RANDOM_COLUMN_OFFSET, RANDOM_COLUMN_SPAN};
use crate::entity_index::EntityIndex;
use crate::error::{ModelError, ModelResult};
use crate::filter_cache::{FilterCache, FilterSet};
use crate::group_index::GroupIndex;
use crate::sampler::{ObjectRef, SubsetSampler, WeightedSampler};
use crate::source::DataSource;

/// Everything derived from the data source in one population pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSnapshot {
    entities: EntityIndex,
    groups: GroupIndex,
}

impl ModelSnapshot {
    pub fn entities(&self) -> &EntityIndex {
        &self.entities
    }

    pub fn groups(&self) -> &GroupIndex {
        &self.groups
    }
}

/// Object-count index, sampler and group lookups over one data source
pub struct DataModel<S: DataSource> {
    source: S,
    config: ModelConfig,
    state: RwLock<Option<Arc<ModelSnapshot>>>,
    filters: FilterCache,
    rng: Mutex<StdRng>,
}

impl<S: DataSource> DataModel<S> {
    /// Create an unpopulated model over `source`
    pub fn new(source: S, config: ModelConfig) -> Self {
        let rng = config.rng_seed.map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);
        Self {
            source,
            config,
            state: RwLock::new(None),
            filters: FilterCache::new(),
            rng: Mutex::new(rng),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Populate from the data source.
    ///
    /// Without `force` this is a no-op once populated. With `force` all state,
    /// including cached filters, is discarded and rebuilt. A failure leaves the
    /// model unpopulated.
    #[instrument(skip(self))]
    pub fn populate(&self, force: bool) -> ModelResult<()> {
        self.ensure_populated(force).map(|_| ())
    }

    /// Discard all derived state; the next query populates again
    pub fn reset(&self) {
        *self.state.write().unwrap_or_else(PoisonError::into_inner) = None;
        self.filters.clear();
        debug!("Model reset");
    }

    /// Whether population has completed
    pub fn is_populated(&self) -> bool {
        self.current().is_some()
    }

    /// Whether the model currently holds no entities (including before population)
    pub fn is_empty(&self) -> bool {
        self.current().is_none_or(|snapshot| snapshot.entities.is_empty())
    }

    /// The populated snapshot, populating first if needed
    pub fn snapshot(&self) -> ModelResult<Arc<ModelSnapshot>> {
        match self.current() {
            Some(snapshot) => Ok(snapshot),
            None => self.ensure_populated(false),
        }
    }

    fn current(&self) -> Option<Arc<ModelSnapshot>> {
        self.state.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    fn ensure_populated(&self, force: bool) -> ModelResult<Arc<ModelSnapshot>> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if let (Some(snapshot), false) = (state.as_ref(), force) {
            return Ok(Arc::clone(snapshot));
        }

        *state = None;
        self.filters.clear();

        let snapshot = Arc::new(self.load_snapshot()?);
        info!(
            entities = snapshot.entities.len(),
            objects = snapshot.entities.total(),
            dimensions = snapshot.groups.dimension_names().len(),
            "Populated model"
        );
        *state = Some(Arc::clone(&snapshot));
        Ok(snapshot)
    }

    fn load_snapshot(&self) -> ModelResult<ModelSnapshot> {
        if self.config.check_tables {
            self.source.check_tables()?;
        }

        // Every key starts at zero so entities without objects keep a position.
        let keys = self.source.all_entity_keys()?;
        let counts = self.source.per_entity_object_counts()?;
        let entities = EntityIndex::build(keys.into_iter().map(|key| (key, 0)).chain(counts))?;

        let (forward, column_names) = self.source.group_maps()?;
        let reverse = self.source.reverse_group_maps()?;
        let wildcard = ColumnValue::String(self.config.wildcard.clone());
        let groups = GroupIndex::build(forward, reverse, column_names, wildcard)?;

        Ok(ModelSnapshot { entities, groups })
    }

    fn rng(&self) -> MutexGuard<'_, StdRng> {
        self.rng.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn resolve(&self, object: &ObjectRef) -> ModelResult<S::ObjectId> {
        self.source.object_identifier_at(&object.entity, object.rank).map_err(|source| {
            ModelError::ResolutionFailure { key: object.entity.clone(), rank: object.rank, source }
        })
    }

    /// Resolve the named filter to its entity set, caching the result
    pub fn filter_set(&self, filter: &str) -> ModelResult<FilterSet> {
        self.filters
            .get_or_try_insert(filter, || self.source.filtered_entity_keys(filter))
            .map_err(ModelError::from)
    }

    fn optional_filter(&self, filter: Option<&str>) -> ModelResult<Option<FilterSet>> {
        filter.map(|name| self.filter_set(name)).transpose()
    }

    // ---------------------------------------------------------------------------------------------
    // Sampling
    // ---------------------------------------------------------------------------------------------

    /// One object drawn uniformly from all objects
    pub fn random_object(&self) -> ModelResult<S::ObjectId> {
        let object = {
            let snapshot = self.snapshot()?;
            WeightedSampler::new(&snapshot.entities).draw(&mut *self.rng())?
        };
        self.resolve(&object)
    }

    /// [`DataModel::random_object`] with a caller-supplied generator
    pub fn random_object_with<R: Rng + ?Sized>(&self, rng: &mut R) -> ModelResult<S::ObjectId> {
        let snapshot = self.snapshot()?;
        let object = WeightedSampler::new(&snapshot.entities).draw(rng)?;
        self.resolve(&object)
    }

    /// Draw `n` object references, with replacement, without resolving them.
    ///
    /// With `subset`, objects come only from those entities and an all-empty
    /// subset yields an empty result. Without it, an empty model is
    /// [`ModelError::EmptyPool`].
    #[instrument(skip(self, subset, rng), fields(subset_len = subset.map(<[EntityKey]>::len)))]
    pub fn random_object_refs_with<R: Rng + ?Sized>(
        &self,
        n: usize,
        subset: Option<&[EntityKey]>,
        rng: &mut R,
    ) -> ModelResult<Vec<ObjectRef>> {
        let snapshot = self.snapshot()?;
        match subset {
            None => WeightedSampler::new(&snapshot.entities).draw_many(n, rng),
            Some(keys) => Ok(SubsetSampler::new(&snapshot.entities, keys)?.draw_many(n, rng)),
        }
    }

    /// `n` objects drawn with replacement, optionally restricted to `subset`
    pub fn random_objects(
        &self,
        n: usize,
        subset: Option<&[EntityKey]>,
    ) -> ModelResult<Vec<S::ObjectId>> {
        let objects = self.random_object_refs_with(n, subset, &mut *self.rng())?;
        objects.iter().map(|object| self.resolve(object)).collect()
    }

    /// [`DataModel::random_objects`] with a caller-supplied generator
    pub fn random_objects_with<R: Rng + ?Sized>(
        &self,
        n: usize,
        subset: Option<&[EntityKey]>,
        rng: &mut R,
    ) -> ModelResult<Vec<S::ObjectId>> {
        let objects = self.random_object_refs_with(n, subset, rng)?;
        objects.iter().map(|object| self.resolve(object)).collect()
    }

    /// Threshold selecting roughly `n` objects from a uniformly distributed
    /// signed 64-bit random column: rows with a value below it are kept.
    pub fn random_fraction_threshold(&self, n: u64) -> ModelResult<i64> {
        let total = self.snapshot()?.entities.total();
        if total == 0 {
            return Err(ModelError::EmptyPool);
        }
        let threshold = RANDOM_COLUMN_SPAN * (n as f64 / total as f64) - RANDOM_COLUMN_OFFSET;
        debug!(n, total, threshold, "Computed random fraction threshold");
        // `as` saturates, so n >= total maps to i64::MAX
        Ok(threshold as i64)
    }

    // ---------------------------------------------------------------------------------------------
    // Entities and counts
    // ---------------------------------------------------------------------------------------------

    /// Every object in one entity, in rank order
    pub fn objects_in_entity(&self, key: &EntityKey) -> ModelResult<Vec<S::ObjectId>> {
        let count = self.count_in(key)?;
        (1..=count)
            .map(|rank| self.resolve(&ObjectRef { entity: key.clone(), rank }))
            .collect()
    }

    /// All entity keys in index order, or the keys the data source selects for `filter`
    pub fn all_entity_keys(&self, filter: Option<&str>) -> ModelResult<Vec<EntityKey>> {
        let snapshot = self.snapshot()?;
        match filter {
            None => Ok(snapshot.entities.ordered_keys().to_vec()),
            Some(name) => Ok(self.source.filtered_entity_keys(name)?),
        }
    }

    /// Object count of one entity
    pub fn count_in(&self, key: &EntityKey) -> ModelResult<u64> {
        self.snapshot()?.entities.count(key)
    }

    /// Total object count
    pub fn total_objects(&self) -> ModelResult<u64> {
        Ok(self.snapshot()?.entities.total())
    }

    /// `(key, count)` pairs, for all entities or for those the data source selects for `filter`
    pub fn entity_counts_filtered(
        &self,
        filter: Option<&str>,
    ) -> ModelResult<Vec<(EntityKey, u64)>> {
        let snapshot = self.snapshot()?;
        match filter {
            None => Ok(snapshot.entities.iter().map(|(key, count)| (key.clone(), count)).collect()),
            Some(name) => self
                .source
                .filtered_entity_keys(name)?
                .into_iter()
                .map(|key| snapshot.entities.count(&key).map(|count| (key, count)))
                .collect(),
        }
    }

    // ---------------------------------------------------------------------------------------------
    // Groups
    // ---------------------------------------------------------------------------------------------

    pub fn group_dimensions(&self) -> ModelResult<Vec<String>> {
        Ok(self.snapshot()?.groups.dimension_names())
    }

    /// Key column names of a dimension (a copy)
    pub fn group_column_names(&self, dimension: &str) -> ModelResult<Vec<String>> {
        self.snapshot()?.groups.column_names(dimension)
    }

    /// Key column types of a dimension (a copy)
    pub fn group_column_types(&self, dimension: &str) -> ModelResult<Vec<ColumnType>> {
        self.snapshot()?.groups.column_types(dimension)
    }

    pub fn group_of(&self, dimension: &str, key: &EntityKey) -> ModelResult<GroupKey> {
        self.snapshot()?.groups.group_of(dimension, key).cloned()
    }

    /// Entities in one group, optionally restricted to a cached filter
    pub fn entities_in_group(
        &self,
        dimension: &str,
        group: &GroupKey,
        filter: Option<&str>,
    ) -> ModelResult<BTreeSet<EntityKey>> {
        let snapshot = self.snapshot()?;
        let filter = self.optional_filter(filter)?;
        snapshot.groups.entities_in(dimension, group, filter.as_deref())
    }

    /// Entities in every group matching `pattern`, where wildcard components match anything
    pub fn entities_in_group_with_wildcards(
        &self,
        dimension: &str,
        pattern: &GroupKey,
        filter: Option<&str>,
    ) -> ModelResult<BTreeSet<EntityKey>> {
        let snapshot = self.snapshot()?;
        let filter = self.optional_filter(filter)?;
        snapshot.groups.entities_in_with_wildcards(dimension, pattern, filter.as_deref())
    }

    pub fn group_keys(&self, dimension: &str) -> ModelResult<BTreeSet<GroupKey>> {
        self.snapshot()?.groups.group_keys(dimension)
    }

    /// Sum per-entity value vectors into per-group vectors
    pub fn sum_to_group(
        &self,
        dimension: &str,
        values: &HashMap<EntityKey, Vec<f64>>,
    ) -> ModelResult<HashMap<GroupKey, Vec<f64>>> {
        self.snapshot()?.groups.sum_to_group(dimension, values)
    }
}

impl<S: DataSource> fmt::Display for DataModel<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (objects, entities) = self
            .current()
            .map_or((0, 0), |snapshot| (snapshot.entities.total(), snapshot.entities.len()));
        write!(f, "{objects} objects in {entities} images")
    }
}
