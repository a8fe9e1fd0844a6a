//! Container Consistency Tests
//!
//! Tests for the coordinator invariants:
//! - Every registered index holds the same multiset of records
//! - Backfill produces a complete new index from either source flavor
//! - A failed delete leaves no partial fan-out

use multidex::{Index, IndexError, IndexFlavor, IndexKey, IndexSpec, MultiIndex};
use serde_json::{json, Value};

// =============================================================================
// Helper Functions
// =============================================================================

fn contact(name: &str, phone: &str) -> Value {
    json!({ "name": name, "phone_number": phone })
}

fn directory() -> MultiIndex<Value> {
    MultiIndex::with_indexes(vec![
        IndexSpec::hashed_unique_field("phone_number"),
        IndexSpec::ordered_non_unique_field("name"),
    ])
    .unwrap()
}

/// Phone numbers held by an index, sorted, as a multiset fingerprint
fn sorted_phones(index: &Index<Value>) -> Vec<String> {
    let mut phones: Vec<String> = index
        .records()
        .iter()
        .map(|r| r["phone_number"].as_str().unwrap().to_string())
        .collect();
    phones.sort();
    phones
}

fn assert_all_indexes_agree(container: &MultiIndex<Value>) {
    let mut fingerprints = container.iter().map(sorted_phones);
    let first = fingerprints.next().expect("container has indexes");
    for other in fingerprints {
        assert_eq!(first, other, "indexes diverged");
    }
}

// =============================================================================
// Cross-Index Consistency
// =============================================================================

/// All indexes report the same multiset after a mix of mutations.
#[test]
fn test_cross_index_consistency_after_mutations() {
    let mut container = directory();
    container
        .add_index(IndexSpec::hashed_non_unique_field("name"))
        .unwrap_err(); // "name" already registered as ordered
    container
        .add_index(IndexSpec::hashed_non_unique_field("city"))
        .unwrap();

    let joe = contact("joe", "555-0001");
    let ann = contact("ann", "555-0002");
    let bea = contact("bea", "555-0003");

    container.insert(joe.clone());
    container.insert(ann.clone());
    container.insert(bea.clone());
    assert_all_indexes_agree(&container);

    let joe2 = contact("joseph", "555-0001");
    container.update(&joe, joe2.clone()).unwrap();
    assert_all_indexes_agree(&container);

    container.delete(&ann).unwrap();
    assert_all_indexes_agree(&container);
    assert_eq!(container.len(), 2);
}

/// Insert followed by delete restores every index to empty.
#[test]
fn test_round_trip_restores_empty() {
    let mut container = directory();
    let joe = contact("joe", "555-0001");

    container.insert(joe.clone());
    container.delete(&joe).unwrap();

    assert!(container.is_empty());
    for index in container.iter() {
        assert!(index.is_empty(), "index {} not empty", index.name());
    }
}

// =============================================================================
// Two-Phase Delete
// =============================================================================

/// A delete rejected by one index mutates none of them.
#[test]
fn test_failed_delete_leaves_no_partial_mutation() {
    let mut container = directory();
    let joe = contact("joe", "555-0001");
    container.insert(joe.clone());

    // Same phone key as joe, so the unique index alone would accept the
    // delete; the ordered name index has no "zed" run and rejects it.
    let impostor = contact("zed", "555-0001");
    let err = container.delete(&impostor).unwrap_err();
    assert_eq!(
        err,
        IndexError::KeyNotFound {
            index: "name".to_string(),
            key: IndexKey::from_string("zed"),
        }
    );

    // The unique index was registered first and must be untouched
    let phones = container.index("phone_number").unwrap();
    assert!(phones.contains(&joe));
    assert_eq!(container.len(), 1);
    assert_all_indexes_agree(&container);
}

/// Update validates its delete half the same way.
#[test]
fn test_failed_update_leaves_no_partial_mutation() {
    let mut container = directory();
    let joe = contact("joe", "555-0001");
    container.insert(joe.clone());

    let absent = contact("ann", "555-0002");
    let err = container.update(&absent, contact("ann", "555-0009")).unwrap_err();
    assert!(matches!(err, IndexError::KeyNotFound { .. }));

    assert_eq!(container.len(), 1);
    assert!(container.index("phone_number").unwrap().contains(&joe));
}

/// Delete demands the exact record value previously inserted.
#[test]
fn test_delete_requires_exact_record_value() {
    let mut container = MultiIndex::with_indexes(vec![
        IndexSpec::ordered_non_unique_field("name"),
    ])
    .unwrap();

    container.insert(contact("joe", "555-0001"));

    // Right name key, wrong phone attribute: value equality fails
    let wrong = contact("joe", "555-9999");
    let err = container.delete(&wrong).unwrap_err();
    assert_eq!(
        err,
        IndexError::RecordNotFound {
            index: "name".to_string(),
        }
    );
    assert_eq!(container.len(), 1);
}

// =============================================================================
// Backfill
// =============================================================================

/// A late index added over existing data ends up holding all of it,
/// backfilled from the unique index.
#[test]
fn test_backfill_from_unique_source() {
    let mut container = MultiIndex::with_indexes(vec![
        IndexSpec::hashed_unique_field("phone_number"),
    ])
    .unwrap();

    container.insert(contact("joe", "555-0001"));
    container.insert(contact("ann", "555-0002"));

    container
        .add_index(IndexSpec::ordered_non_unique_field("name"))
        .unwrap();

    assert_all_indexes_agree(&container);
    let names: Vec<&str> = container
        .index("name")
        .unwrap()
        .as_ordered_non_unique()
        .unwrap()
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, ["ann", "joe"]);
}

/// A late unique index with only non-unique sources backfills from one
/// of them.
#[test]
fn test_backfill_from_non_unique_source() {
    let mut container = MultiIndex::with_indexes(vec![
        IndexSpec::ordered_non_unique_field("name"),
    ])
    .unwrap();

    container.insert(contact("joe", "555-0001"));
    container.insert(contact("ann", "555-0002"));

    container
        .add_index(IndexSpec::hashed_unique_field("phone_number"))
        .unwrap();

    assert_all_indexes_agree(&container);
    let phones = container
        .index("phone_number")
        .unwrap()
        .as_hashed_unique()
        .unwrap();
    assert_eq!(
        phones.get(&IndexKey::from_string("555-0002")),
        Some(&contact("ann", "555-0002"))
    );
}

/// A late non-unique index falls back to a unique source when nothing
/// else exists.
#[test]
fn test_backfill_falls_back_to_unique_source() {
    let mut container = MultiIndex::with_indexes(vec![
        IndexSpec::hashed_unique_field("phone_number"),
    ])
    .unwrap();

    container.insert(contact("joe", "555-0001"));

    container
        .add_index(IndexSpec::hashed_non_unique_field("name"))
        .unwrap();

    let grouped = container
        .index("name")
        .unwrap()
        .as_hashed_non_unique()
        .unwrap();
    assert_eq!(grouped.count(&IndexKey::from_string("joe")), 1);
}

/// Adding an index to an empty container starts it empty.
#[test]
fn test_backfill_empty_container() {
    let mut container: MultiIndex<Value> = MultiIndex::new();
    container
        .add_index(IndexSpec::ordered_non_unique_field("name"))
        .unwrap();

    assert!(container.index("name").unwrap().is_empty());
}

// =============================================================================
// Uniqueness
// =============================================================================

/// A duplicate key on the unique index overwrites there and nowhere
/// else; `update` is the consistent replacement path.
#[test]
fn test_duplicate_key_insert_overwrites_unique_index_only() {
    let mut container = directory();

    container.insert(contact("joe", "555-0001"));
    container.insert(contact("joseph", "555-0001"));

    let phones = container.index("phone_number").unwrap();
    assert_eq!(phones.len(), 1);
    assert!(phones.contains(&contact("joseph", "555-0001")));

    // The ordered index still holds both; this divergence is why
    // replacement goes through update()
    assert_eq!(container.index("name").unwrap().len(), 2);
}

// =============================================================================
// Directory Scenario
// =============================================================================

/// The phone/name directory walk-through: point lookup, range query,
/// delete, then a late grouped index that must not resurrect the
/// deleted record.
#[test]
fn test_directory_scenario() {
    let mut container = directory();
    let joe = contact("joe", "555-0001");
    let ann = contact("ann", "555-0002");

    container.insert(joe.clone());
    container.insert(ann.clone());

    let phones = container
        .index("phone_number")
        .unwrap()
        .as_hashed_unique()
        .unwrap();
    assert_eq!(phones.get(&IndexKey::from_string("555-0001")), Some(&joe));

    let names = container
        .index("name")
        .unwrap()
        .as_ordered_non_unique()
        .unwrap();
    let in_range: Vec<&Value> = names
        .irange_key(
            Some(&IndexKey::from_string("ann")),
            Some(&IndexKey::from_string("joe")),
            (true, true),
            false,
        )
        .collect();
    assert_eq!(in_range, [&ann, &joe]);

    container.delete(&joe).unwrap();

    container
        .add_index(IndexSpec::hashed_non_unique_field("city"))
        .unwrap();
    let grouped = container
        .index("city")
        .unwrap()
        .as_hashed_non_unique()
        .unwrap();
    // Both remaining records lack a city attribute; joe must not reappear
    assert_eq!(grouped.len(), 1);
    assert_eq!(grouped.get(&IndexKey::Null), &[ann.clone()]);

    assert_all_indexes_agree(&container);
}

/// Flavor tags survive registration.
#[test]
fn test_flavors_reported() {
    let container = directory();
    assert_eq!(
        container.index("phone_number").unwrap().flavor(),
        IndexFlavor::HashedUnique
    );
    assert_eq!(
        container.index("name").unwrap().flavor(),
        IndexFlavor::OrderedNonUnique
    );
}
