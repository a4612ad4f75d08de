//! ## Spatial index
//!
//! Wraps [`RTreeEngine`] with the document-level bookkeeping the bare tree knows
//! nothing about: a discriminator that pulls a geometry out of an arbitrary object, a
//! reverse map from docid back to that geometry, and the set of docids whose
//! discriminated value was the "do not index" sentinel (§4.2).
//!
//! Spatial queries do not go through the generic comparator algebra in `query::node` —
//! there is no natural `Eq`/`InRange` reading of "intersects" or "within" over a
//! geometry. Callers reach `intersection`, `apply`, `knn` and `knn_index` directly, the
//! way a spatial index naturally stands as a distinct capability
//! surface layered on top of, not folded into, the field-comparator interface. [`Index`]
//! is still implemented so the spatial index can be registered with a catalog and take
//! part in `index_doc`/`unindex_doc`/`reset` fan-out; its `apply` always reports the
//! comparator unsupported.
//!
//! Fixed at `Rect` (§9, ambiguity 2: coordinate-only `BBox`, geometry kept only in the
//! reverse index) rather than generic over the [`Geometry`] trait: `Value::Geometry`
//! only ever carries a `Rect`, so a generic spatial index would have nothing but `Rect`
//! to construct from a discriminated value anyway.

use std::collections::{BTreeMap, BTreeSet};

use tracing::debug;

use crate::error::QdexError;
use crate::geometry::{Geometry, Predicate, Rect};
use crate::index::Index;
use crate::query::node::Comparator;
use crate::rtree::{BBox, RTreeEngine};
use crate::value::Value;
use crate::DocId;

/// Where the spatial index gets the geometry to index for a given object.
pub enum Discriminator {
    /// Read a named attribute off the indexed [`Value::Map`].
    Attribute(String),
    /// Derive the geometry by calling an arbitrary function on the indexed value.
    Function(Box<dyn Fn(&Value) -> Option<Value>>),
}

impl Discriminator {
    fn discriminate(&self, value: &Value) -> Option<Value> {
        match self {
            Discriminator::Attribute(name) => value.get_attr(name).cloned(),
            Discriminator::Function(f) => f(value),
        }
    }
}

/// An ephemeral field-capable index over distances, handed back by
/// [`SpatialIndex::knn_index`] so a caller can sort a combined result set by k-NN
/// distance without persisting anything.
pub struct DistanceIndex {
    name: String,
    distances: BTreeMap<DocId, f64>,
}

impl Index for DistanceIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind_name(&mut self, name: String) {
        self.name = name;
    }

    fn index_doc(&mut self, _docid: DocId, _value: Value) -> Result<(), QdexError> {
        Ok(())
    }

    fn unindex_doc(&mut self, docid: DocId) {
        self.distances.remove(&docid);
    }

    fn reset(&mut self) {
        self.distances.clear();
    }

    fn indexed(&self) -> Vec<DocId> {
        self.distances.keys().copied().collect()
    }

    fn not_indexed(&self) -> Vec<DocId> {
        Vec::new()
    }

    fn apply(&self, comparator: &Comparator) -> Result<BTreeSet<DocId>, QdexError> {
        Err(QdexError::UnsupportedComparator {
            index: self.name.clone(),
            comparator: comparator.method_name().to_string(),
        })
    }

    fn sort(
        &self,
        docids: &[DocId],
        reverse: bool,
        limit: Option<usize>,
        _sort_type: Option<&str>,
    ) -> Result<Vec<DocId>, QdexError> {
        let mut missing = Vec::new();
        for d in docids {
            if !self.distances.contains_key(d) {
                missing.push(*d);
            }
        }
        if !missing.is_empty() {
            return Err(QdexError::Unsortable { docids: missing });
        }
        let mut ordered: Vec<DocId> = docids.to_vec();
        ordered.sort_by(|a, b| {
            self.distances[a]
                .partial_cmp(&self.distances[b])
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        if reverse {
            ordered.reverse();
        }
        if let Some(limit) = limit {
            ordered.truncate(limit);
        }
        Ok(ordered)
    }

    fn flush(&mut self, _deep: bool) {}
}

/// Wraps an [`RTreeEngine`] with per-document geometry bookkeeping (§4.2).
pub struct SpatialIndex {
    name: String,
    tree: RTreeEngine,
    rev_index: BTreeMap<DocId, Rect>,
    not_indexed: BTreeSet<DocId>,
    doc_count: u64,
    discriminator: Discriminator,
}

impl SpatialIndex {
    pub fn new(max_entries: usize, discriminator: Discriminator) -> Result<Self, QdexError> {
        Ok(SpatialIndex {
            name: String::new(),
            tree: RTreeEngine::new(max_entries)?,
            rev_index: BTreeMap::new(),
            not_indexed: BTreeSet::new(),
            doc_count: 0,
            discriminator,
        })
    }

    fn to_bbox(docid: DocId, geometry: &Rect) -> BBox {
        let (min_x, min_y, max_x, max_y) = geometry.bounds();
        BBox::new(docid, min_x, min_y, max_x, max_y)
    }

    /// Docids whose discriminated value currently returned the sentinel.
    pub fn not_indexed(&self) -> Vec<DocId> {
        self.not_indexed.iter().copied().collect()
    }

    pub fn doc_count(&self) -> u64 {
        self.doc_count
    }

    /// Docids whose `BBox` intersects `bounds`, cheap: uses only the R-tree, never
    /// evaluates exact geometry.
    pub fn intersection(&self, bounds: (f64, f64, f64, f64)) -> BTreeSet<DocId> {
        let (min_x, min_y, max_x, max_y) = bounds;
        self.tree
            .search(min_x, min_y, max_x, max_y)
            .into_iter()
            .map(|b| b.key)
            .collect()
    }

    /// Candidate fetch via BBox intersection, then exact filter by `predicate` evaluated
    /// against the candidates' stored geometry.
    pub fn apply(&self, query: &Rect, predicate: Predicate) -> BTreeSet<DocId> {
        let (min_x, min_y, max_x, max_y) = query.bounds();
        let candidates = self.tree.search(min_x, min_y, max_x, max_y);
        let geometries: Vec<Rect> = candidates
            .iter()
            .filter_map(|b| self.rev_index.get(&b.key).copied())
            .collect();
        let matches = query.evaluate(predicate, &geometries);
        candidates
            .iter()
            .zip(matches)
            .filter(|(_, matched)| *matched)
            .map(|(b, _)| b.key)
            .collect()
    }

    /// Thin wrapper over the tree's k-NN.
    pub fn knn(&self, x: f64, y: f64, count: Option<usize>, max_distance: Option<f64>) -> Vec<(DocId, f64)> {
        self.tree
            .knn(x, y, count, max_distance)
            .into_iter()
            .map(|hit| (hit.key, hit.distance))
            .collect()
    }

    /// Returns `(docid_set, sort_index)`: the k-NN hits as a plain set, plus an ephemeral
    /// field-capable index mapping each hit to its distance so a caller can sort a
    /// combined result set by it.
    pub fn knn_index(
        &self,
        x: f64,
        y: f64,
        count: Option<usize>,
        max_distance: Option<f64>,
    ) -> (BTreeSet<DocId>, DistanceIndex) {
        let hits = self.tree.knn(x, y, count, max_distance);
        let docids = hits.iter().map(|h| h.key).collect();
        let distances = hits.into_iter().map(|h| (h.key, h.distance)).collect();
        (
            docids,
            DistanceIndex {
                name: "knn_distance".to_string(),
                distances,
            },
        )
    }
}

impl Index for SpatialIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn bind_name(&mut self, name: String) {
        self.name = name;
    }

    /// Runs the discriminator over `value`. A sentinel (`None`) result moves the docid
    /// into `not_indexed`, unindexing any prior entry; otherwise the discriminated value
    /// must be a geometry or the call fails with [`QdexError::NotAGeometry`].
    fn index_doc(&mut self, docid: DocId, value: Value) -> Result<(), QdexError> {
        let discriminated = self.discriminator.discriminate(&value);
        let geometry = match discriminated {
            None => {
                self.unindex_doc(docid);
                self.not_indexed.insert(docid);
                return Ok(());
            }
            Some(v) => v,
        };
        let geometry = *geometry.as_geometry().ok_or(QdexError::NotAGeometry { docid })?;

        self.not_indexed.remove(&docid);
        if self.rev_index.remove(&docid).is_some() {
            self.tree.remove(docid);
        } else {
            self.doc_count += 1;
        }
        debug!(docid, "indexing geometry into spatial index");
        self.tree.insert(Self::to_bbox(docid, &geometry));
        self.rev_index.insert(docid, geometry);
        Ok(())
    }

    fn unindex_doc(&mut self, docid: DocId) {
        self.not_indexed.remove(&docid);
        if self.rev_index.remove(&docid).is_some() {
            self.tree.remove(docid);
            self.doc_count = self.doc_count.saturating_sub(1);
        }
    }

    fn reset(&mut self) {
        self.tree.clear();
        self.rev_index.clear();
        self.not_indexed.clear();
        self.doc_count = 0;
    }

    fn indexed(&self) -> Vec<DocId> {
        self.rev_index.keys().copied().collect()
    }

    fn not_indexed(&self) -> Vec<DocId> {
        SpatialIndex::not_indexed(self)
    }

    fn apply(&self, comparator: &Comparator) -> Result<BTreeSet<DocId>, QdexError> {
        Err(QdexError::UnsupportedComparator {
            index: self.name.clone(),
            comparator: comparator.method_name().to_string(),
        })
    }

    fn flush(&mut self, _deep: bool) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap as Map;

    fn rect_value(min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Value {
        Value::Geometry(Rect::new(min_x, min_y, max_x, max_y))
    }

    fn obj_with(attr: &str, v: Value) -> Value {
        let mut m = Map::new();
        m.insert(attr.to_string(), v);
        Value::Map(m)
    }

    fn discriminated_by(attr: &str) -> SpatialIndex {
        SpatialIndex::new(4, Discriminator::Attribute(attr.to_string())).unwrap()
    }

    #[test]
    fn test_spatial_intersect_scenario() {
        let mut idx = discriminated_by("geom");
        idx.index_doc(1, obj_with("geom", rect_value(5.0, 5.0, 25.0, 25.0)))
            .unwrap();
        assert_eq!(idx.intersection((0.0, 0.0, 100.0, 100.0)), BTreeSet::from([1]));
        assert_eq!(idx.intersection((100.0, 100.0, 200.0, 200.0)), BTreeSet::new());
    }

    #[test]
    fn test_knn_distance_boundary_scenario() {
        let mut idx = discriminated_by("geom");
        idx.index_doc(1, obj_with("geom", rect_value(0.0, 0.0, 0.0, 0.0))).unwrap();
        idx.index_doc(2, obj_with("geom", rect_value(9.0, 9.0, 9.0, 9.0))).unwrap();
        idx.index_doc(3, obj_with("geom", rect_value(12.0, 12.0, 12.0, 12.0)))
            .unwrap();

        let near: Vec<DocId> = idx.knn(0.0, 0.0, None, Some(12.6)).into_iter().map(|(d, _)| d).collect();
        assert_eq!(near, vec![1]);

        let near: Vec<DocId> = idx.knn(0.0, 0.0, None, Some(12.8)).into_iter().map(|(d, _)| d).collect();
        assert_eq!(near, vec![1, 2]);
    }

    #[test]
    fn test_index_doc_sentinel_moves_to_not_indexed() {
        let mut idx = discriminated_by("geom");
        idx.index_doc(1, obj_with("geom", rect_value(0.0, 0.0, 1.0, 1.0))).unwrap();
        assert_eq!(idx.indexed(), vec![1]);
        idx.index_doc(1, Value::Map(Map::new())).unwrap();
        assert!(idx.indexed().is_empty());
        assert_eq!(Index::not_indexed(&idx), vec![1]);
    }

    #[test]
    fn test_index_doc_rejects_non_geometry() {
        let mut idx = discriminated_by("geom");
        let err = idx.index_doc(1, obj_with("geom", Value::Int(5))).unwrap_err();
        assert!(matches!(err, QdexError::NotAGeometry { docid: 1 }));
    }

    #[test]
    fn test_reindex_doc_replaces_geometry() {
        let mut idx = discriminated_by("geom");
        idx.index_doc(1, obj_with("geom", rect_value(0.0, 0.0, 1.0, 1.0))).unwrap();
        idx.reindex_doc(1, obj_with("geom", rect_value(50.0, 50.0, 51.0, 51.0)))
            .unwrap();
        assert_eq!(idx.doc_count(), 1);
        assert_eq!(idx.intersection((0.0, 0.0, 1.0, 1.0)), BTreeSet::new());
        assert_eq!(idx.intersection((50.0, 50.0, 51.0, 51.0)), BTreeSet::from([1]));
    }

    #[test]
    fn test_knn_index_returns_ephemeral_distance_sort() {
        let mut idx = discriminated_by("geom");
        idx.index_doc(1, obj_with("geom", rect_value(0.0, 0.0, 0.0, 0.0))).unwrap();
        idx.index_doc(2, obj_with("geom", rect_value(3.0, 4.0, 3.0, 4.0))).unwrap();
        let (docids, sort_index) = idx.knn_index(0.0, 0.0, None, None);
        assert_eq!(docids, BTreeSet::from([1, 2]));
        let ordered = sort_index.sort(&[2, 1], false, None, None).unwrap();
        assert_eq!(ordered, vec![1, 2]);
    }

    #[test]
    fn test_apply_predicate_filters_by_exact_geometry() {
        let mut idx = discriminated_by("geom");
        idx.index_doc(1, obj_with("geom", rect_value(2.0, 2.0, 4.0, 4.0))).unwrap();
        idx.index_doc(2, obj_with("geom", rect_value(20.0, 20.0, 24.0, 24.0)))
            .unwrap();
        let query = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(idx.apply(&query, Predicate::Within), BTreeSet::from([1]));
    }
}
