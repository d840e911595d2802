mod helpers;

use capdex::catalog::CatalogItem;
use capdex::embedding::codec;
use helpers::*;

#[test]
fn brand_search_is_case_insensitive_substring() {
    let store = test_store(2);
    store.upsert(&cap(1, "Coca-Cola"), None).unwrap();
    store.upsert(&cap(2, "Pepsi"), None).unwrap();
    store.upsert(&cap(3, "RC COLA"), None).unwrap();

    let ids: Vec<i64> = store
        .find_by_brand_substring("cola")
        .unwrap()
        .iter()
        .map(|i| i.id)
        .collect();
    assert_eq!(ids, vec![1, 3]);
    assert!(store.find_by_brand_substring("fanta").unwrap().is_empty());
}

#[test]
fn brand_search_folds_non_ascii() {
    let store = test_store(2);
    store.upsert(&cap(1, "ÉCLAIR Brasserie"), None).unwrap();
    let hits = store.find_by_brand_substring("éclair").unwrap();
    assert_eq!(hits.len(), 1);
}

#[test]
fn upserting_same_id_twice_keeps_one_row_with_latest_fields() {
    let store = test_store(2);
    store.upsert(&cap(1, "Pepsi"), None).unwrap();
    store
        .upsert(&CatalogItem::new(1, "Pepsi Max", "soda", "max.jpg"), None)
        .unwrap();

    let all = store.get_all().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].brand, "Pepsi Max");
    assert_eq!(all[0].image_ref, "max.jpg");
}

#[test]
fn metadata_only_upsert_preserves_embedding() {
    let store = test_store(2);
    store.upsert(&cap(1, "Pepsi"), Some(blob(&[0.0, 1.0]).as_slice())).unwrap();
    store
        .upsert(&CatalogItem::new(1, "Pepsi", "soda", "renamed.jpg"), None)
        .unwrap();

    let rows = store.rows_with_embeddings().unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].0.image_ref, "renamed.jpg");
    assert_eq!(codec::decode(&rows[0].1, 2).unwrap(), vec![0.0, 1.0]);
}

#[test]
fn get_all_is_ordered_by_id() {
    let store = test_store(2);
    for id in [5, 1, 3] {
        store.upsert(&cap(id, "Brand"), None).unwrap();
    }
    let ids: Vec<i64> = store.get_all().unwrap().iter().map(|i| i.id).collect();
    assert_eq!(ids, vec![1, 3, 5]);
}

#[test]
fn batch_upsert_and_stats() {
    let store = test_store(2);
    let rows = vec![
        (cap(1, "A"), Some(blob(&[1.0, 0.0]))),
        (cap(2, "B"), None),
        (cap(3, "C"), Some(vec![1, 2, 3])),
    ];
    assert_eq!(store.upsert_many(&rows).unwrap(), 3);

    let stats = store.stats(2).unwrap();
    assert_eq!(stats.total, 3);
    assert_eq!(stats.embedded, 2);
    assert_eq!(stats.missing_embedding, 1);
    assert_eq!(stats.corrupt_embedding, 1);

    let by_ref = store.embeddings_by_image_ref(2).unwrap();
    assert!(by_ref.contains_key("1.jpg"));
    assert!(!by_ref.contains_key("2.jpg"));
    assert!(!by_ref.contains_key("3.jpg"));
}

#[test]
fn reset_empties_the_catalog() {
    let store = test_store(2);
    store.upsert(&cap(1, "A"), None).unwrap();
    store.upsert(&cap(2, "B"), None).unwrap();
    assert_eq!(store.reset().unwrap(), 2);
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn export_shape_round_trips_through_import_shape() {
    let store = test_store(2);
    store.upsert(&cap(1, "Coca-Cola"), None).unwrap();
    let json = serde_json::to_string(&store.get_all().unwrap()).unwrap();
    assert!(json.contains("\"type\":\"soda\""));
    let items: Vec<CatalogItem> = serde_json::from_str(&json).unwrap();
    assert_eq!(items, vec![cap(1, "Coca-Cola")]);
}
