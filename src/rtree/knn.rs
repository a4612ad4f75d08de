//! Best-first k-nearest-neighbour search.
//!
//! A single min-priority-queue holds both boxes (subtrees, keyed by their lower-bound
//! distance to the query point) and individual leaf entries (keyed by their true
//! distance), so a leaf is only ever popped, and therefore only ever emitted, once every
//! subtree that could possibly hold something closer has already been ruled out.

use std::cmp::Ordering;
use std::collections::BinaryHeap;

use ordered_float::OrderedFloat;

use super::{BBox, DocId, Entries, Node};

/// One result from [`super::RTreeEngine::knn`]: the matched docid, its box, and its
/// distance from the query point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KnnHit {
    pub key: DocId,
    pub distance: f64,
}

enum Candidate<'a> {
    Subtree(&'a Node),
    Entry(BBox),
}

struct QueueItem<'a> {
    distance: OrderedFloat<f64>,
    candidate: Candidate<'a>,
}

impl<'a> PartialEq for QueueItem<'a> {
    fn eq(&self, other: &Self) -> bool {
        self.distance == other.distance
    }
}
impl<'a> Eq for QueueItem<'a> {}

impl<'a> PartialOrd for QueueItem<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<'a> Ord for QueueItem<'a> {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed: `BinaryHeap` is a max-heap, and we want the closest candidate first.
        other.distance.cmp(&self.distance)
    }
}

pub(crate) fn search(
    root: &Node,
    x: f64,
    y: f64,
    count: Option<usize>,
    max_distance: Option<f64>,
) -> Vec<KnnHit> {
    let mut heap = BinaryHeap::new();
    heap.push(QueueItem {
        distance: OrderedFloat(root.mbr.min_distance(x, y)),
        candidate: Candidate::Subtree(root),
    });

    let mut results = Vec::new();
    while let Some(QueueItem { distance, candidate }) = heap.pop() {
        if let Some(limit) = max_distance {
            if distance.0 > limit {
                break;
            }
        }
        match candidate {
            Candidate::Entry(bbox) => {
                results.push(KnnHit {
                    key: bbox.key,
                    distance: distance.0,
                });
                if count.is_some_and(|c| results.len() >= c) {
                    break;
                }
            }
            Candidate::Subtree(node) => match &node.entries {
                Entries::Leaf(entries) => {
                    for bbox in entries {
                        heap.push(QueueItem {
                            distance: OrderedFloat(bbox.mbr().min_distance(x, y)),
                            candidate: Candidate::Entry(*bbox),
                        });
                    }
                }
                Entries::Internal(children) => {
                    for child in children {
                        heap.push(QueueItem {
                            distance: OrderedFloat(child.mbr.min_distance(x, y)),
                            candidate: Candidate::Subtree(child),
                        });
                    }
                }
            },
        }
    }
    results
}
