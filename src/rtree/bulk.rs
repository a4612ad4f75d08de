//! Overlap-Minimizing Top-down (OMT) bulk loading.
//!
//! Builds a balanced R-tree from a batch of entries in roughly O(n log n) time instead
//! of paying for n individual inserts and splits. The whole batch is tiled into
//! `sqrt(M)`-sized slabs along the x-axis, each slab tiled into `M`-sized groups along
//! the y-axis, and each group becomes one leaf or recurses one level down — the
//! `multi_select`/`quickselect` machinery in `quickselect.rs` does the tiling without a
//! full sort.

use super::quickselect::multi_select;
use super::{BBox, Entries, Mbr, Node};

/// Builds a single packed subtree over every entry in `items`.
pub(crate) fn build(mut items: Vec<BBox>, max_entries: usize) -> Node {
    let n = items.len();
    if n <= max_entries {
        return leaf_of(items);
    }
    let height = ((n as f64).ln() / (max_entries as f64).ln()).ceil() as usize;
    let top_m = (n as f64 / (max_entries as f64).powi((height - 1) as i32)).ceil() as usize;
    build_range(&mut items, 0, n - 1, height, top_m.max(2), max_entries)
}

fn leaf_of(items: Vec<BBox>) -> Node {
    let mbr = items.iter().map(|b| b.mbr()).fold(Mbr::EMPTY, |a, m| a.union(&m));
    Node {
        mbr,
        height: 1,
        entries: Entries::Leaf(items),
    }
}

fn build_range(
    items: &mut [BBox],
    left: usize,
    right: usize,
    height: usize,
    m: usize,
    max_entries: usize,
) -> Node {
    let n = right - left + 1;
    if n <= max_entries {
        return leaf_of(items[left..=right].to_vec());
    }

    let n2 = ((n as f64) / (m as f64)).ceil().max(1.0) as usize;
    let n1 = (n2 * ((m as f64).sqrt().ceil() as usize)).max(n2);

    multi_select(items, left, right, n1, &compare_min_x);

    let mut children = Vec::new();
    let mut i = left;
    while i <= right {
        let right2 = (i + n1 - 1).min(right);
        multi_select(items, i, right2, n2, &compare_min_y);
        let mut j = i;
        while j <= right2 {
            let right3 = (j + n2 - 1).min(right2);
            children.push(build_range(items, j, right3, height - 1, max_entries, max_entries));
            if right3 == right2 {
                break;
            }
            j = right3 + 1;
        }
        if right2 == right {
            break;
        }
        i = right2 + 1;
    }

    let mbr = children.iter().map(|c| c.mbr).fold(Mbr::EMPTY, |a, m| a.union(&m));
    Node {
        mbr,
        height,
        entries: Entries::Internal(children),
    }
}

fn compare_min_x(a: &BBox, b: &BBox) -> bool {
    a.min_x < b.min_x
}

fn compare_min_y(a: &BBox, b: &BBox) -> bool {
    a.min_y < b.min_y
}
