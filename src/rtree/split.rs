//! Subtree choice, node splitting, and condense-on-delete.
//!
//! `choose_subtree` and `choose_split_axis`/`choose_split_index` implement the same
//! two-phase R*-tree heuristic: descend by least-enlargement (tie-broken by smallest
//! area) on insert, and on overflow pick the axis that minimizes the summed margin of
//! every possible split, then the index along that axis that minimizes overlap (ties
//! broken by area) between the two resulting groups.

use super::{BBox, Entries, Mbr, Node};

/// Either a leaf entry or a whole subtree, to be attached at a specific height.
pub(crate) enum Item {
    Leaf(BBox),
    Node(Node),
}

impl Item {
    fn mbr(&self) -> Mbr {
        match self {
            Item::Leaf(b) => b.mbr(),
            Item::Node(n) => n.mbr,
        }
    }
}

/// Inserts `item` at `level` hops above the leaf level (0 attaches directly into a leaf
/// node's entries; 1 attaches a whole `Node` as a child of a height-2 node, and so on).
/// Grows the tree by one level if the root itself overflows and splits.
pub(crate) fn insert_at_level(node: &mut Node, item: Item, level: usize, max_entries: usize) {
    if let Some(sibling) = insert_recursive(node, item, level, max_entries) {
        let old_root = std::mem::replace(node, Node::empty_leaf());
        *node = Node {
            mbr: old_root.mbr.union(&sibling.mbr),
            height: old_root.height + 1,
            entries: Entries::Internal(vec![old_root, sibling]),
        };
    }
}

fn insert_recursive(node: &mut Node, item: Item, level: usize, max_entries: usize) -> Option<Node> {
    if node.height.saturating_sub(1) == level {
        match (&mut node.entries, item) {
            (Entries::Leaf(v), Item::Leaf(b)) => v.push(b),
            (Entries::Internal(v), Item::Node(n)) => v.push(n),
            _ => unreachable!("insert level/item kind mismatch"),
        }
        node.recompute_mbr();
        return overflow_split(node, max_entries);
    }

    let target_mbr = item.mbr();
    let children = match &mut node.entries {
        Entries::Internal(v) => v,
        Entries::Leaf(_) => unreachable!("leaf node below target insert level"),
    };
    let idx = choose_subtree(children, &target_mbr);
    let split_result = insert_recursive(&mut children[idx], item, level, max_entries);
    node.recompute_mbr();
    if let Some(new_child) = split_result {
        let children = match &mut node.entries {
            Entries::Internal(v) => v,
            Entries::Leaf(_) => unreachable!(),
        };
        children.push(new_child);
        node.recompute_mbr();
        return overflow_split(node, max_entries);
    }
    None
}

fn overflow_split(node: &mut Node, max_entries: usize) -> Option<Node> {
    if node.len() <= max_entries {
        return None;
    }
    Some(split_node(node, max_entries))
}

/// Chooses the child with the least MBR enlargement to accommodate `target`, breaking
/// ties by smallest resulting area.
pub(crate) fn choose_subtree(children: &[Node], target: &Mbr) -> usize {
    let mut best = 0;
    let mut best_enlargement = f64::INFINITY;
    let mut best_area = f64::INFINITY;
    for (i, child) in children.iter().enumerate() {
        let enlargement = child.mbr.enlargement(target);
        let area = child.mbr.area();
        if enlargement < best_enlargement
            || (enlargement == best_enlargement && area < best_area)
        {
            best = i;
            best_enlargement = enlargement;
            best_area = area;
        }
    }
    best
}

/// Splits an overflowing node's entries into two groups using the R*-tree heuristic,
/// replacing `node`'s own entries with one group and returning a fresh sibling node
/// holding the other.
pub(crate) fn split_node(node: &mut Node, max_entries: usize) -> Node {
    match &mut node.entries {
        Entries::Leaf(entries) => {
            let (left, right) = split_entries(entries.clone(), max_entries, |e| e.mbr());
            *entries = left;
            node.recompute_mbr();
            Node {
                mbr: right.iter().map(|e| e.mbr()).fold(Mbr::EMPTY, |a, m| a.union(&m)),
                height: node.height,
                entries: Entries::Leaf(right),
            }
        }
        Entries::Internal(entries) => {
            let (left, right) = split_entries(entries.clone(), max_entries, |n| n.mbr);
            *entries = left;
            node.recompute_mbr();
            Node {
                mbr: right.iter().map(|n| n.mbr).fold(Mbr::EMPTY, |a, m| a.union(&m)),
                height: node.height,
                entries: Entries::Internal(right),
            }
        }
    }
}

/// Generic two-phase split shared by leaf and internal nodes: pick the axis minimizing
/// summed margin across all valid distributions, then the split index along that axis
/// minimizing overlap (ties broken by total area).
fn split_entries<T: Clone>(
    mut entries: Vec<T>,
    max_entries: usize,
    mbr_of: impl Fn(&T) -> Mbr,
) -> (Vec<T>, Vec<T>) {
    let min_entries = (2usize).max((max_entries as f64 * 0.4).ceil() as usize);

    let axis = choose_split_axis(&entries, min_entries, &mbr_of);
    sort_by_axis(&mut entries, axis, &mbr_of);

    let index = choose_split_index(&entries, min_entries, &mbr_of);
    let right = entries.split_off(index);
    (entries, right)
}

fn sort_by_axis<T>(entries: &mut [T], axis: usize, mbr_of: &impl Fn(&T) -> Mbr) {
    entries.sort_by(|a, b| {
        let (ma, mb) = (mbr_of(a), mbr_of(b));
        let (ka, kb) = if axis == 0 {
            (ma.min_x, mb.min_x)
        } else {
            (ma.min_y, mb.min_y)
        };
        ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal)
    });
}

fn choose_split_axis<T>(entries: &[T], min_entries: usize, mbr_of: &impl Fn(&T) -> Mbr) -> usize {
    let margin_x = axis_margin_sum(entries, 0, min_entries, mbr_of);
    let margin_y = axis_margin_sum(entries, 1, min_entries, mbr_of);
    if margin_x <= margin_y {
        0
    } else {
        1
    }
}

fn axis_margin_sum<T>(
    entries: &[T],
    axis: usize,
    min_entries: usize,
    mbr_of: &impl Fn(&T) -> Mbr,
) -> f64 {
    let mut sorted: Vec<&T> = entries.iter().collect();
    sorted.sort_by(|a, b| {
        let (ma, mb) = (mbr_of(a), mbr_of(b));
        let (ka, kb) = if axis == 0 {
            (ma.min_x, mb.min_x)
        } else {
            (ma.min_y, mb.min_y)
        };
        ka.partial_cmp(&kb).unwrap_or(std::cmp::Ordering::Equal)
    });
    let n = sorted.len();
    let max_split = n - min_entries;
    let mut sum = 0.0;
    for k in min_entries..=max_split {
        let left_mbr = sorted[..k]
            .iter()
            .map(|e| mbr_of(e))
            .fold(Mbr::EMPTY, |a, m| a.union(&m));
        let right_mbr = sorted[k..]
            .iter()
            .map(|e| mbr_of(e))
            .fold(Mbr::EMPTY, |a, m| a.union(&m));
        sum += left_mbr.margin() + right_mbr.margin();
    }
    sum
}

fn choose_split_index<T>(entries: &[T], min_entries: usize, mbr_of: &impl Fn(&T) -> Mbr) -> usize {
    let n = entries.len();
    let max_split = n - min_entries;
    let mut best_index = min_entries;
    let mut best_overlap = f64::INFINITY;
    let mut best_area = f64::INFINITY;
    for k in min_entries..=max_split {
        let left_mbr = entries[..k]
            .iter()
            .map(mbr_of)
            .fold(Mbr::EMPTY, |a, m| a.union(&m));
        let right_mbr = entries[k..]
            .iter()
            .map(mbr_of)
            .fold(Mbr::EMPTY, |a, m| a.union(&m));
        let overlap = left_mbr.intersection_area(&right_mbr);
        let area = left_mbr.area() + right_mbr.area();
        if overlap < best_overlap || (overlap == best_overlap && area < best_area) {
            best_index = k;
            best_overlap = overlap;
            best_area = area;
        }
    }
    best_index
}

/// Removes the leaf entry with the given key, searching the whole tree (the engine has
/// no way to prune by box since only the key is known), then condenses any node left
/// underfull along the path back to the root by detaching it and reinserting its
/// surviving leaf descendants.
pub(crate) fn remove_by_key(node: &mut Node, key: u64, min_entries: usize, max_entries: usize) -> bool {
    let mut orphans = Vec::new();
    let found = remove_recursive(node, key, min_entries, &mut orphans);
    for orphan in orphans {
        insert_at_level(node, Item::Leaf(orphan), 0, max_entries);
    }
    found
}

fn remove_recursive(node: &mut Node, key: u64, min_entries: usize, orphans: &mut Vec<BBox>) -> bool {
    match &mut node.entries {
        Entries::Leaf(entries) => {
            if let Some(pos) = entries.iter().position(|b| b.key == key) {
                entries.remove(pos);
                node.recompute_mbr();
                true
            } else {
                false
            }
        }
        Entries::Internal(children) => {
            let mut found_at = None;
            for (i, child) in children.iter_mut().enumerate() {
                if remove_recursive(child, key, min_entries, orphans) {
                    found_at = Some(i);
                    break;
                }
            }
            let Some(i) = found_at else {
                return false;
            };
            if children[i].len() < min_entries {
                let removed = children.remove(i);
                collect_leaves(&removed, orphans);
            }
            node.recompute_mbr();
            true
        }
    }
}

fn collect_leaves(node: &Node, out: &mut Vec<BBox>) {
    match &node.entries {
        Entries::Leaf(v) => out.extend(v.iter().copied()),
        Entries::Internal(v) => {
            for child in v {
                collect_leaves(child, out);
            }
        }
    }
}
