//! ## R-tree engine
//!
//! A bounding-box R-tree supporting incremental insert/remove, iterative bounding-box
//! search, bulk loading via Overlap-Minimizing Top-down packing (OMT), and best-first
//! k-nearest-neighbour search. This is the engine the spatial index (`spatial_index.rs`)
//! builds on; it knows nothing about geometry predicates or documents beyond the
//! coordinate-only [`BBox`] entries it stores.
//!
//! The split algorithm and the OMT bulk loader follow the same two-phase
//! (margin-minimizing axis choice, then overlap-minimizing cut) construction used by the
//! R*-tree family.

mod bulk;
mod knn;
mod quickselect;
mod split;

pub use knn::KnnHit;

use crate::error::QdexError;
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

pub use crate::DocId;

/// A `(key, min_x, min_y, max_x, max_y)` entry: a coordinate-only bounding box plus the
/// docid it belongs to. Geometry itself is never stored in the tree; it lives only in
/// the spatial index's reverse map.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct BBox {
    pub key: DocId,
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BBox {
    pub fn new(key: DocId, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Self {
        BBox {
            key,
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    pub(crate) fn mbr(&self) -> Mbr {
        Mbr {
            min_x: self.min_x,
            min_y: self.min_y,
            max_x: self.max_x,
            max_y: self.max_y,
        }
    }
}

/// A minimum bounding rectangle. Every node, leaf or internal, carries one covering all
/// of its descendants.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub(crate) struct Mbr {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Mbr {
    pub(crate) const EMPTY: Mbr = Mbr {
        min_x: f64::INFINITY,
        min_y: f64::INFINITY,
        max_x: f64::NEG_INFINITY,
        max_y: f64::NEG_INFINITY,
    };

    pub(crate) fn intersects(&self, other: &Mbr) -> bool {
        self.min_x <= other.max_x
            && other.min_x <= self.max_x
            && self.min_y <= other.max_y
            && other.min_y <= self.max_y
    }

    pub(crate) fn contains(&self, other: &Mbr) -> bool {
        self.min_x <= other.min_x
            && self.min_y <= other.min_y
            && other.max_x <= self.max_x
            && other.max_y <= self.max_y
    }

    pub(crate) fn union(&self, other: &Mbr) -> Mbr {
        Mbr {
            min_x: self.min_x.min(other.min_x),
            min_y: self.min_y.min(other.min_y),
            max_x: self.max_x.max(other.max_x),
            max_y: self.max_y.max(other.max_y),
        }
    }

    pub(crate) fn extend(&mut self, other: &Mbr) {
        self.min_x = self.min_x.min(other.min_x);
        self.min_y = self.min_y.min(other.min_y);
        self.max_x = self.max_x.max(other.max_x);
        self.max_y = self.max_y.max(other.max_y);
    }

    pub(crate) fn area(&self) -> f64 {
        (self.max_x - self.min_x).max(0.0) * (self.max_y - self.min_y).max(0.0)
    }

    pub(crate) fn margin(&self) -> f64 {
        (self.max_x - self.min_x) + (self.max_y - self.min_y)
    }

    pub(crate) fn enlargement(&self, other: &Mbr) -> f64 {
        self.union(other).area() - self.area()
    }

    pub(crate) fn intersection_area(&self, other: &Mbr) -> f64 {
        let min_x = self.min_x.max(other.min_x);
        let min_y = self.min_y.max(other.min_y);
        let max_x = self.max_x.min(other.max_x);
        let max_y = self.max_y.min(other.max_y);
        (max_x - min_x).max(0.0) * (max_y - min_y).max(0.0)
    }

    /// Euclidean distance from `(x, y)` to the nearest point of this box; zero if the
    /// box contains the point. A lower bound on the distance from the point to any entry
    /// stored inside the box, which is what makes best-first k-NN traversal correct.
    pub(crate) fn min_distance(&self, x: f64, y: f64) -> f64 {
        let dx = if x < self.min_x {
            self.min_x - x
        } else if x > self.max_x {
            x - self.max_x
        } else {
            0.0
        };
        let dy = if y < self.min_y {
            self.min_y - y
        } else if y > self.max_y {
            y - self.max_y
        } else {
            0.0
        };
        (dx * dx + dy * dy).sqrt()
    }

    fn from_bbox(b: &BBox) -> Mbr {
        b.mbr()
    }
}

/// The children of a node: either bounding-box leaf entries or further nodes. A node's
/// `entries` variant is uniform — all-leaf or all-internal — for the lifetime of the
/// tree, matching the invariant that every leaf sits at the same depth.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub(crate) enum Entries {
    Leaf(Vec<BBox>),
    Internal(Vec<Node>),
}

/// A node in the R-tree: its own MBR, its height (leaves are height 1), and its children.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub(crate) struct Node {
    pub mbr: Mbr,
    pub height: usize,
    pub entries: Entries,
}

impl Node {
    fn empty_leaf() -> Node {
        Node {
            mbr: Mbr::EMPTY,
            height: 1,
            entries: Entries::Leaf(Vec::new()),
        }
    }

    pub(crate) fn is_leaf(&self) -> bool {
        matches!(self.entries, Entries::Leaf(_))
    }

    pub(crate) fn len(&self) -> usize {
        match &self.entries {
            Entries::Leaf(v) => v.len(),
            Entries::Internal(v) => v.len(),
        }
    }

    pub(crate) fn recompute_mbr(&mut self) {
        self.mbr = match &self.entries {
            Entries::Leaf(v) => v
                .iter()
                .map(|b| b.mbr())
                .fold(Mbr::EMPTY, |acc, m| acc.union(&m)),
            Entries::Internal(v) => v
                .iter()
                .map(|n| n.mbr)
                .fold(Mbr::EMPTY, |acc, m| acc.union(&m)),
        };
    }
}

/// Bounding-box R-tree, parameterized only by `max_entries` (default 9, clamped to a
/// minimum of 4); `min_entries` is derived as `max(2, ceil(max_entries * 0.4))`.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RTreeEngine {
    pub(crate) root: Node,
    pub(crate) max_entries: usize,
    pub(crate) min_entries: usize,
}

impl RTreeEngine {
    /// Creates an empty R-tree with the given node fanout.
    ///
    /// # Errors
    ///
    /// Returns [`QdexError::InvalidCapacity`] if `max_entries` is below 4.
    pub fn new(max_entries: usize) -> Result<Self, QdexError> {
        if max_entries < 4 {
            return Err(QdexError::InvalidCapacity {
                capacity: max_entries,
            });
        }
        let min_entries = (2usize).max((max_entries as f64 * 0.4).ceil() as usize);
        info!(max_entries, min_entries, "creating new RTreeEngine");
        Ok(RTreeEngine {
            root: Node::empty_leaf(),
            max_entries,
            min_entries,
        })
    }

    /// Drops every entry, keeping the configured fanout.
    pub fn clear(&mut self) {
        self.root = Node::empty_leaf();
    }

    /// The number of leaf entries currently stored.
    pub fn len(&self) -> usize {
        self.all().len()
    }

    pub fn is_empty(&self) -> bool {
        self.root.len() == 0
    }

    /// Inserts a bounding box, splitting nodes on overflow and growing the tree by one
    /// level if the root itself splits.
    pub fn insert(&mut self, bbox: BBox) {
        debug!(key = bbox.key, "inserting bbox into RTreeEngine");
        split::insert_at_level(&mut self.root, split::Item::Leaf(bbox), 0, self.max_entries);
    }

    /// Removes the leaf entry matching `bbox.key`, condensing the tree on the way back
    /// up. Returns `true` if an entry was found and removed.
    pub fn remove(&mut self, key: DocId) -> bool {
        debug!(key, "removing bbox from RTreeEngine");
        let removed = split::remove_by_key(&mut self.root, key, self.min_entries, self.max_entries);
        if removed && !self.root.is_leaf() && self.root.len() == 1 {
            if let Entries::Internal(children) = &mut self.root.entries {
                self.root = children.pop().unwrap();
            }
        }
        if removed && self.root.len() == 0 {
            self.root = Node::empty_leaf();
        }
        removed
    }

    /// Returns every leaf entry whose box intersects the query rectangle, with no
    /// duplicates. Nodes fully contained in the query are dumped via [`Self::all`]
    /// without further intersection tests; nodes with no overlap are skipped entirely.
    pub fn search(&self, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> Vec<BBox> {
        let query = Mbr {
            min_x,
            min_y,
            max_x,
            max_y,
        };
        let mut result = Vec::new();
        search_node(&self.root, &query, &mut result);
        result
    }

    /// Streams every leaf entry in the tree.
    pub fn all(&self) -> Vec<BBox> {
        let mut result = Vec::new();
        collect_all(&self.root, &mut result);
        result
    }

    /// Bulk-loads `items` using OMT (§4.1.4). Falls back to one-by-one insertion when
    /// `items` is smaller than `min_entries`. The freshly built tree is merged into the
    /// existing one by height: it replaces an empty root outright, becomes a sibling of
    /// equal-height roots under a fresh root, or is grafted as a sub-node of whichever
    /// tree is taller.
    pub fn load(&mut self, items: Vec<BBox>) {
        if items.is_empty() {
            return;
        }
        if items.len() < self.min_entries {
            for item in items {
                self.insert(item);
            }
            return;
        }
        info!(count = items.len(), "bulk loading RTreeEngine via OMT");
        let built = bulk::build(items, self.max_entries);

        if self.root.len() == 0 {
            self.root = built;
        } else if self.root.height == built.height {
            let old_root = std::mem::replace(&mut self.root, Node::empty_leaf());
            self.root = Node {
                mbr: old_root.mbr.union(&built.mbr),
                height: old_root.height + 1,
                entries: Entries::Internal(vec![old_root, built]),
            };
        } else if self.root.height < built.height {
            let (mut taller, shorter) = (built, std::mem::replace(&mut self.root, Node::empty_leaf()));
            let level = shorter.height;
            split::insert_at_level(&mut taller, split::Item::Node(shorter), level, self.max_entries);
            self.root = taller;
        } else {
            let level = built.height;
            split::insert_at_level(&mut self.root, split::Item::Node(built), level, self.max_entries);
        }
    }

    /// Best-first k-nearest-neighbour search from `(x, y)`. `count` bounds the number of
    /// results (`None` for unbounded); `max_distance` bounds the search radius (`None`
    /// for unbounded). Results are emitted in non-decreasing distance order.
    pub fn knn(&self, x: f64, y: f64, count: Option<usize>, max_distance: Option<f64>) -> Vec<KnnHit> {
        knn::search(&self.root, x, y, count, max_distance)
    }
}

fn search_node(node: &Node, query: &Mbr, result: &mut Vec<BBox>) {
    match &node.entries {
        Entries::Leaf(entries) => {
            for bbox in entries {
                if query.intersects(&bbox.mbr()) {
                    result.push(*bbox);
                }
            }
        }
        Entries::Internal(children) => {
            for child in children {
                if !query.intersects(&child.mbr) {
                    continue;
                }
                if query.contains(&child.mbr) {
                    collect_all(child, result);
                } else {
                    search_node(child, query, result);
                }
            }
        }
    }
}

fn collect_all(node: &Node, result: &mut Vec<BBox>) {
    match &node.entries {
        Entries::Leaf(entries) => result.extend(entries.iter().copied()),
        Entries::Internal(children) => {
            for child in children {
                collect_all(child, result);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bb(key: DocId, min_x: f64, min_y: f64, max_x: f64, max_y: f64) -> BBox {
        BBox::new(key, min_x, min_y, max_x, max_y)
    }

    #[test]
    fn test_new_rejects_small_capacity() {
        assert!(RTreeEngine::new(2).is_err());
        assert!(RTreeEngine::new(4).is_ok());
    }

    #[test]
    fn test_insert_and_search_single() {
        let mut tree = RTreeEngine::new(4).unwrap();
        tree.insert(bb(1, 5.0, 5.0, 25.0, 25.0));
        let found = tree.search(0.0, 0.0, 100.0, 100.0);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].key, 1);
        assert!(tree.search(100.0, 100.0, 200.0, 200.0).is_empty());
    }

    #[test]
    fn test_insert_many_and_condense_on_remove() {
        let mut tree = RTreeEngine::new(4).unwrap();
        for i in 0..200u64 {
            let x = i as f64;
            tree.insert(bb(i, x, x, x + 1.0, x + 1.0));
        }
        assert_eq!(tree.len(), 200);
        for i in 0..200u64 {
            assert!(tree.remove(i));
        }
        assert_eq!(tree.len(), 0);
        assert!(tree.root.is_leaf());
    }

    #[test]
    fn test_search_no_duplicates_after_heavy_insert() {
        let mut tree = RTreeEngine::new(4).unwrap();
        for i in 0..500u64 {
            let x = (i % 50) as f64;
            let y = (i / 50) as f64;
            tree.insert(bb(i, x, y, x + 0.5, y + 0.5));
        }
        let found = tree.search(f64::NEG_INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::INFINITY);
        let mut keys: Vec<_> = found.iter().map(|b| b.key).collect();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), 500);
    }
}
