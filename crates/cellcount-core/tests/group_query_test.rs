use std::collections::{BTreeSet, HashMap};
use std::io::Cursor;

use cellcount_core::fixture::InMemorySource;
use cellcount_core::{
    ColumnType, DataModel, EntityKey, ModelConfig, ModelError, Profiles, group_key,
};

fn key(image: i64) -> EntityKey {
    EntityKey::from([0, image])
}

fn screen() -> InMemorySource {
    InMemorySource::new()
        .with_entities([([0, 1], 2), ([0, 2], 5), ([0, 3], 1), ([0, 4], 0)])
        .with_group(
            "Well",
            &["plate", "well"],
            [
                (key(1), group_key![0, "A01"]),
                (key(2), group_key![0, "A02"]),
                (key(3), group_key![1, "A01"]),
                (key(4), group_key![1, "A01"]),
            ],
        )
        .with_group(
            "Gene",
            &["gene"],
            [
                (key(1), group_key!["TP53"]),
                (key(2), group_key!["TP53"]),
                (key(3), group_key!["BRCA1"]),
                (key(4), group_key!["BRCA1"]),
            ],
        )
        .with_filter("first_plate", [key(1), key(2)])
}

fn model() -> DataModel<InMemorySource> {
    DataModel::new(screen(), ModelConfig::default())
}

#[test]
fn forward_and_reverse_maps_are_inverse() {
    let model = model();
    for dimension in model.group_dimensions().unwrap() {
        for entity in model.all_entity_keys(None).unwrap() {
            let group = model.group_of(&dimension, &entity).unwrap();
            let members = model.entities_in_group(&dimension, &group, None).unwrap();
            assert!(members.contains(&entity), "{entity} missing from {dimension} {group}");
        }
    }
}

#[test]
fn wildcard_collects_across_plates() {
    let model = model();
    let found = model
        .entities_in_group_with_wildcards("Well", &group_key!["__ANY__", "A01"], None)
        .unwrap();
    assert_eq!(found, BTreeSet::from([key(1), key(3), key(4)]));

    let filtered = model
        .entities_in_group_with_wildcards("Well", &group_key!["__ANY__", "A01"], Some("first_plate"))
        .unwrap();
    assert_eq!(filtered, BTreeSet::from([key(1)]));
}

#[test]
fn configured_wildcard_replaces_default() {
    let config = ModelConfig { wildcard: "*".to_string(), ..ModelConfig::default() };
    let model = DataModel::new(screen(), config);
    let found = model.entities_in_group_with_wildcards("Well", &group_key![0, "*"], None).unwrap();
    assert_eq!(found, BTreeSet::from([key(1), key(2)]));

    // The default sentinel is now an ordinary value that matches nothing.
    let none = model
        .entities_in_group_with_wildcards("Well", &group_key!["__ANY__", "A01"], None)
        .unwrap();
    assert!(none.is_empty());
}

#[test]
fn unknown_group_key_is_empty_but_unknown_dimension_fails() {
    let model = model();
    assert!(model.entities_in_group("Well", &group_key![7, "H12"], None).unwrap().is_empty());
    assert!(matches!(
        model.entities_in_group("Treatment", &group_key!["DMSO"], None),
        Err(ModelError::UnknownGroup { .. })
    ));
    assert!(matches!(
        model.group_of("Well", &key(99)),
        Err(ModelError::UnknownEntity { .. })
    ));
}

#[test]
fn group_filters_are_cached_after_first_use() {
    let model = model();
    for _ in 0..3 {
        let members = model.entities_in_group("Gene", &group_key!["TP53"], Some("first_plate")).unwrap();
        assert_eq!(members.len(), 2);
    }
    assert_eq!(model.source().filter_calls(), 1);
    assert!(matches!(
        model.entities_in_group("Gene", &group_key!["TP53"], Some("nope")),
        Err(ModelError::Source(_))
    ));
}

#[test]
fn group_keys_are_distinct() {
    let model = model();
    let wells = model.group_keys("Well").unwrap();
    assert_eq!(
        wells,
        BTreeSet::from([group_key![0, "A01"], group_key![0, "A02"], group_key![1, "A01"]])
    );
    assert_eq!(model.group_keys("Gene").unwrap().len(), 2);
}

#[test]
fn column_metadata_copies_are_independent() {
    let model = model();
    let mut names = model.group_column_names("Well").unwrap();
    names.push("extra".to_string());
    names[0] = "changed".to_string();
    assert_eq!(model.group_column_names("Well").unwrap(), vec!["plate", "well"]);

    let mut types = model.group_column_types("Well").unwrap();
    types.clear();
    assert_eq!(
        model.group_column_types("Well").unwrap(),
        vec![ColumnType::Integer, ColumnType::String]
    );
    assert_eq!(model.group_column_types("Gene").unwrap(), vec![ColumnType::String]);
}

#[test]
fn sum_to_group_adds_vectors_per_group() {
    let model = DataModel::new(
        InMemorySource::new()
            .with_entities([([0, 1], 1), ([0, 2], 1), ([0, 3], 1)])
            .with_group(
                "G",
                &["g"],
                [(key(1), group_key!["g"]), (key(2), group_key!["g"]), (key(3), group_key!["g2"])],
            ),
        ModelConfig::default(),
    );
    let values = HashMap::from([
        (key(1), vec![1.0, 2.0]),
        (key(2), vec![3.0, 4.0]),
        (key(3), vec![5.0, 6.0]),
    ]);

    let sums = model.sum_to_group("G", &values).unwrap();
    assert_eq!(
        sums,
        HashMap::from([(group_key!["g"], vec![4.0, 6.0]), (group_key!["g2"], vec![5.0, 6.0])])
    );
}

#[test]
fn group_sums_export_as_profiles() {
    let model = model();
    let values = HashMap::from([
        (key(1), vec![2.0]),
        (key(2), vec![5.0]),
        (key(3), vec![1.0]),
        (key(4), vec![0.0]),
    ]);
    let sums = model.sum_to_group("Well", &values).unwrap();
    let profiles = Profiles::from_group_sums("Well", vec!["objects".to_string()], &sums).unwrap();

    let mut buffer = Vec::new();
    profiles.save_tsv(&mut buffer).unwrap();
    let text = String::from_utf8(buffer).unwrap();
    assert_eq!(text, "Well\t\tobjects\n0\tA01\t2\n0\tA02\t5\n1\tA01\t1\n");

    let reloaded = Profiles::load_tsv(Cursor::new(text), "wells.txt").unwrap();
    assert_eq!(reloaded.key_size(), 2);
    assert_eq!(reloaded.len(), 3);
}
