use cellcount_core::{EntityIndex, EntityKey, SubsetSampler, WeightedSampler};
use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

fn build(counts: &[i64]) -> EntityIndex {
    EntityIndex::build(
        counts.iter().enumerate().map(|(i, &count)| (EntityKey::from([0, i as i64]), count)),
    )
    .unwrap()
}

// Mostly small counts with plenty of zeros, so runs of empty entities are common.
fn counts_strategy() -> impl Strategy<Value = Vec<i64>> {
    prop::collection::vec(prop_oneof![3 => Just(0i64), 5 => 1i64..20], 1..40)
}

proptest! {
    #[test]
    fn total_matches_sum_and_last_cumulative(counts in counts_strategy()) {
        let index = build(&counts);
        let sum: i64 = counts.iter().sum();
        prop_assert_eq!(index.total(), sum as u64);
        prop_assert_eq!(*index.cumulative().last().unwrap(), index.total());
        prop_assert_eq!(index.cumulative().len(), index.len() + 1);
        prop_assert!(index.cumulative().windows(2).all(|pair| pair[0] <= pair[1]));
    }

    #[test]
    fn every_object_maps_to_a_covering_entity(counts in counts_strategy()) {
        let index = build(&counts);
        let sampler = WeightedSampler::new(&index);
        let mut seen_per_entity = vec![0u64; counts.len()];

        for target in 1..=index.total() {
            let object = sampler.locate(target).unwrap();
            let count = index.count(&object.entity).unwrap();
            prop_assert!(count > 0);
            prop_assert!(object.rank >= 1 && object.rank <= count);
            seen_per_entity[object.entity.components()[1] as usize] += 1;
        }
        // Each entity owns exactly as many object numbers as it has objects.
        let expected: Vec<u64> = counts.iter().map(|&count| count as u64).collect();
        prop_assert_eq!(seen_per_entity, expected);
    }

    #[test]
    fn subset_objects_stay_in_subset(counts in counts_strategy(), picks in prop::collection::vec(any::<prop::sample::Index>(), 0..10)) {
        let index = build(&counts);
        let keys: Vec<EntityKey> = picks.iter().map(|pick| index.ordered_keys()[pick.index(index.len())].clone()).collect();
        let subset = SubsetSampler::new(&index, &keys).unwrap();

        for target in 1..=subset.total() {
            let object = subset.locate(target).unwrap();
            prop_assert!(keys.contains(&object.entity));
            prop_assert!(object.rank >= 1 && object.rank <= index.count(&object.entity).unwrap());
        }
    }
}

#[test]
fn random_draws_skip_zero_count_entities() {
    let index = build(&[0, 0, 3, 0, 0, 0, 1, 0, 2, 0]);
    let sampler = WeightedSampler::new(&index);
    let mut rng = StdRng::seed_from_u64(2024);

    let draws = sampler.draw_many(10_000, &mut rng).unwrap();
    assert!(draws.iter().all(|object| index.count(&object.entity).unwrap() > 0));

    // Draw frequencies follow the 3:1:2 weights.
    let hits = |image: i64| draws.iter().filter(|object| object.entity == EntityKey::from([0, image])).count();
    assert!((4_500..5_500).contains(&hits(2)), "entity 2 drawn {} times", hits(2));
    assert!((1_300..2_000).contains(&hits(6)), "entity 6 drawn {} times", hits(6));
    assert!((2_900..3_800).contains(&hits(8)), "entity 8 drawn {} times", hits(8));
}

#[test]
fn subset_starting_with_zero_count_entity_never_selects_it() {
    let index = build(&[0, 5, 0, 2]);
    let keys = index.ordered_keys().to_vec();
    let subset = SubsetSampler::new(&index, &keys).unwrap();
    let mut rng = StdRng::seed_from_u64(17);

    for object in subset.draw_many(2_000, &mut rng) {
        assert_ne!(object.entity, keys[0]);
        assert_ne!(object.entity, keys[2]);
    }
}
