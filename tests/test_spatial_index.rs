//! Integration tests for the spatial index's public surface: intersection, k-NN and the
//! geometry-predicate `apply`, exercised the way an embedding crate would use them.

use qdex::geometry::{Predicate, Rect};
use qdex::index::Index;
use qdex::spatial_index::{Discriminator, SpatialIndex};
use qdex::value::Value;
use std::collections::BTreeMap;
use tracing::info;

fn rect_object(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Value {
    let mut m = BTreeMap::new();
    m.insert("geom".to_string(), Value::Geometry(Rect::new(min_x, min_y, max_x, max_y)));
    Value::Map(m)
}

#[test]
fn test_spatial_intersect_scenario() {
    info!("Running spatial intersect scenario");
    let mut idx = SpatialIndex::new(4, Discriminator::Attribute("geom".to_string())).unwrap();
    idx.index_doc(1, rect_object(5.0, 5.0, 25.0, 25.0)).unwrap();

    assert_eq!(
        idx.intersection((0.0, 0.0, 100.0, 100.0)),
        std::collections::BTreeSet::from([1])
    );
    assert!(idx.intersection((100.0, 100.0, 200.0, 200.0)).is_empty());
}

#[test]
fn test_knn_pythagorean_boundary_scenario() {
    info!("Running k-NN distance boundary scenario");
    let mut idx = SpatialIndex::new(4, Discriminator::Attribute("geom".to_string())).unwrap();
    idx.index_doc(1, rect_object(0.0, 0.0, 0.0, 0.0)).unwrap();
    idx.index_doc(2, rect_object(9.0, 9.0, 9.0, 9.0)).unwrap();
    idx.index_doc(3, rect_object(12.0, 12.0, 12.0, 12.0)).unwrap();
    idx.index_doc(4, rect_object(13.0, 14.0, 13.0, 14.0)).unwrap();
    idx.index_doc(5, rect_object(19.0, 11.0, 19.0, 11.0)).unwrap();

    let under = idx.knn(0.0, 0.0, None, Some(12.6));
    assert_eq!(under.iter().map(|(d, _)| *d).collect::<Vec<_>>(), vec![1]);

    let over = idx.knn(0.0, 0.0, None, Some(12.8));
    assert_eq!(over.iter().map(|(d, _)| *d).collect::<Vec<_>>(), vec![1, 2]);
}

#[test]
fn test_apply_within_predicate() {
    let mut idx = SpatialIndex::new(4, Discriminator::Attribute("geom".to_string())).unwrap();
    idx.index_doc(1, rect_object(2.0, 2.0, 4.0, 4.0)).unwrap();
    idx.index_doc(2, rect_object(50.0, 50.0, 60.0, 60.0)).unwrap();
    let query = Rect::new(0.0, 0.0, 10.0, 10.0);
    assert_eq!(idx.apply(&query, Predicate::Within), std::collections::BTreeSet::from([1]));
}

#[test]
fn test_unindex_then_index_round_trip_restores_state() {
    let mut idx = SpatialIndex::new(4, Discriminator::Attribute("geom".to_string())).unwrap();
    let object = rect_object(1.0, 1.0, 2.0, 2.0);
    idx.index_doc(1, object.clone()).unwrap();
    let before = idx.intersection((0.0, 0.0, 10.0, 10.0));
    idx.unindex_doc(1);
    assert!(idx.intersection((0.0, 0.0, 10.0, 10.0)).is_empty());
    idx.index_doc(1, object).unwrap();
    assert_eq!(idx.intersection((0.0, 0.0, 10.0, 10.0)), before);
}
