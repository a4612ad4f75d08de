//! ## Result set
//!
//! The final output of query execution (§4.6): an ordered docid container plus an
//! optional resolver from docid back to an object. Supports the boolean set
//! operations, sorting by any field-capable index, and limiting.
//!
//! Sort stability is load-bearing: sorting a result set twice must compose the two
//! orderings, with the second sort's ties broken by the first sort's order (§8). This
//! falls out for free as long as every [`Index::sort`] implementation performs a stable
//! sort over the slice it is given — `ResultSet::sort` always hands the index its
//! *current* order, never a freshly collected one, so a stable sort downstream composes
//! correctly without this module doing anything special.

use std::collections::HashSet;
use std::rc::Rc;

use crate::error::QdexError;
use crate::index::Index;
use crate::value::Value;
use crate::DocId;

/// Resolves a docid back to the object it was indexed from, for callers that want more
/// than the bare id back from a query.
pub type Resolver = Rc<dyn Fn(DocId) -> Option<Value>>;

/// An ordered docid container, the `Result Set` of §3/§4.6.
#[derive(Clone)]
pub struct ResultSet {
    docids: Vec<DocId>,
    resolver: Option<Resolver>,
}

impl std::fmt::Debug for ResultSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResultSet")
            .field("docids", &self.docids)
            .field("has_resolver", &self.resolver.is_some())
            .finish()
    }
}

impl ResultSet {
    /// Builds a result set over `docids` with no resolver, in the order given.
    pub fn new(docids: impl IntoIterator<Item = DocId>) -> Self {
        ResultSet {
            docids: docids.into_iter().collect(),
            resolver: None,
        }
    }

    /// Builds a result set from an already-ordered docid set and a resolver.
    pub fn with_resolver(docids: impl IntoIterator<Item = DocId>, resolver: Resolver) -> Self {
        ResultSet {
            docids: docids.into_iter().collect(),
            resolver: Some(resolver),
        }
    }

    /// The docid count, `numids` in §4.6's terms.
    pub fn len(&self) -> usize {
        self.docids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.docids.is_empty()
    }

    /// The ordered docid list.
    pub fn all(&self) -> Vec<DocId> {
        self.docids.clone()
    }

    /// Resolves `docid` to its object, if a resolver was supplied and has one.
    pub fn resolve(&self, docid: DocId) -> Option<Value> {
        self.resolver.as_ref().and_then(|r| r(docid))
    }

    /// The intersection of the two docid sets, in `self`'s relative order.
    pub fn intersect(&self, other: &ResultSet) -> ResultSet {
        let keep: HashSet<DocId> = other.docids.iter().copied().collect();
        ResultSet {
            docids: self.docids.iter().copied().filter(|d| keep.contains(d)).collect(),
            resolver: self.resolver.clone(),
        }
    }

    /// The union of the two docid sets: `self`'s order first, then any of `other`'s
    /// docids not already present.
    pub fn union(&self, other: &ResultSet) -> ResultSet {
        let mut seen: HashSet<DocId> = self.docids.iter().copied().collect();
        let mut docids = self.docids.clone();
        for d in &other.docids {
            if seen.insert(*d) {
                docids.push(*d);
            }
        }
        ResultSet {
            docids,
            resolver: self.resolver.clone(),
        }
    }

    /// `self`'s docids minus `other`'s, in `self`'s relative order.
    pub fn difference(&self, other: &ResultSet) -> ResultSet {
        let remove: HashSet<DocId> = other.docids.iter().copied().collect();
        ResultSet {
            docids: self.docids.iter().copied().filter(|d| !remove.contains(d)).collect(),
            resolver: self.resolver.clone(),
        }
    }

    /// Sorts in place by `index`'s sort key. A second call on the same result set is
    /// stable with respect to the order the first call left behind (§8), because this
    /// always hands `index.sort` the *current* `self.docids`, not a fresh ordering.
    pub fn sort(
        &mut self,
        index: &dyn Index,
        reverse: bool,
        limit: Option<usize>,
        sort_type: Option<&str>,
    ) -> Result<(), QdexError> {
        self.docids = index.sort(&self.docids, reverse, limit, sort_type)?;
        Ok(())
    }

    /// Truncates to the first `n` docids.
    pub fn limit(&mut self, n: usize) {
        self.docids.truncate(n);
    }

    pub fn iter(&self) -> std::slice::Iter<'_, DocId> {
        self.docids.iter()
    }
}

impl IntoIterator for ResultSet {
    type Item = DocId;
    type IntoIter = std::vec::IntoIter<DocId>;

    fn into_iter(self) -> Self::IntoIter {
        self.docids.into_iter()
    }
}

impl<'a> IntoIterator for &'a ResultSet {
    type Item = &'a DocId;
    type IntoIter = std::slice::Iter<'a, DocId>;

    fn into_iter(self) -> Self::IntoIter {
        self.docids.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FieldIndex {
        name: String,
        values: std::collections::BTreeMap<DocId, i64>,
    }

    impl Index for FieldIndex {
        fn name(&self) -> &str {
            &self.name
        }
        fn bind_name(&mut self, name: String) {
            self.name = name;
        }
        fn index_doc(&mut self, docid: DocId, value: Value) -> Result<(), QdexError> {
            if let Value::Int(v) = value {
                self.values.insert(docid, v);
            }
            Ok(())
        }
        fn unindex_doc(&mut self, docid: DocId) {
            self.values.remove(&docid);
        }
        fn reset(&mut self) {
            self.values.clear();
        }
        fn indexed(&self) -> Vec<DocId> {
            self.values.keys().copied().collect()
        }
        fn not_indexed(&self) -> Vec<DocId> {
            Vec::new()
        }
        fn apply(&self, _comparator: &crate::query::node::Comparator) -> Result<std::collections::BTreeSet<DocId>, QdexError> {
            Ok(std::collections::BTreeSet::new())
        }
        fn sort(
            &self,
            docids: &[DocId],
            reverse: bool,
            limit: Option<usize>,
            _sort_type: Option<&str>,
        ) -> Result<Vec<DocId>, QdexError> {
            let mut missing = Vec::new();
            let mut ordered: Vec<DocId> = docids.to_vec();
            for d in docids {
                if !self.values.contains_key(d) {
                    missing.push(*d);
                }
            }
            if !missing.is_empty() {
                return Err(QdexError::Unsortable { docids: missing });
            }
            ordered.sort_by_key(|d| self.values[d]);
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

    #[test]
    fn test_intersect_preserves_self_order() {
        let a = ResultSet::new(vec![3, 1, 2]);
        let b = ResultSet::new(vec![2, 3]);
        assert_eq!(a.intersect(&b).all(), vec![3, 2]);
    }

    #[test]
    fn test_union_appends_new_docids_only() {
        let a = ResultSet::new(vec![1, 2]);
        let b = ResultSet::new(vec![2, 3]);
        assert_eq!(a.union(&b).all(), vec![1, 2, 3]);
    }

    #[test]
    fn test_difference_removes_matching_docids() {
        let a = ResultSet::new(vec![1, 2, 3]);
        let b = ResultSet::new(vec![2]);
        assert_eq!(a.difference(&b).all(), vec![1, 3]);
    }

    #[test]
    fn test_sort_unsortable_reports_missing_docids() {
        let mut index = FieldIndex {
            name: "x".to_string(),
            values: Default::default(),
        };
        index.index_doc(1, Value::Int(10)).unwrap();
        let mut rs = ResultSet::new(vec![1, 2]);
        let err = rs.sort(&index, false, None, None).unwrap_err();
        assert!(matches!(err, QdexError::Unsortable { docids } if docids == vec![2]));
    }

    #[test]
    fn test_second_sort_is_stable_with_respect_to_first() {
        let mut x_index = FieldIndex {
            name: "x".to_string(),
            values: Default::default(),
        };
        let mut y_index = FieldIndex {
            name: "y".to_string(),
            values: Default::default(),
        };
        // Two docs share the same y, differ by x. Sorting by x then y should keep the
        // x-order among y-ties.
        for (docid, x, y) in [(1, 1, 0), (2, 2, 0)] {
            x_index.index_doc(docid, Value::Int(x)).unwrap();
            y_index.index_doc(docid, Value::Int(y)).unwrap();
        }
        let mut rs = ResultSet::new(vec![2, 1]);
        rs.sort(&x_index, false, None, None).unwrap();
        assert_eq!(rs.all(), vec![1, 2]);
        rs.sort(&y_index, false, None, None).unwrap();
        assert_eq!(rs.all(), vec![1, 2]);
    }
}
