//! ## Catalog
//!
//! A named collection of indexes (§4.5): the fan-out point for `index_doc`/
//! `unindex_doc`/`reindex_doc`/`reset`, and the home of [`CatalogQuery`], the façade
//! that parses-or-accepts a query, executes it, optionally sorts the result, and
//! truncates to a limit.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::QdexError;
use crate::index::Index;
use crate::query::node::{Bindings, Comparator, QueryNode};
use crate::query::parser::parse;
use crate::result_set::ResultSet;
use crate::store::KeyWidth;
use crate::value::Value;
use crate::DocId;

/// A named collection of indexes. All indexes registered with one catalog share a
/// configured integer-bit-width family (§3), which determines the domain of the
/// persistent containers the backing store is asked to allocate.
pub struct Catalog {
    indexes: BTreeMap<String, Box<dyn Index>>,
    key_width: KeyWidth,
}

impl Catalog {
    pub fn new(key_width: KeyWidth) -> Self {
        Catalog {
            indexes: BTreeMap::new(),
            key_width,
        }
    }

    pub fn key_width(&self) -> KeyWidth {
        self.key_width
    }

    /// Registers `index` under `name`, binding the name on the index itself
    /// (`__setitem__`, §4.5). A duplicate name overwrites whatever was there.
    pub fn insert(&mut self, name: impl Into<String>, mut index: Box<dyn Index>) {
        let name = name.into();
        index.bind_name(name.clone());
        self.indexes.insert(name, index);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Index> {
        self.indexes.get(name).map(|b| b.as_ref())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.indexes.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(|s| s.as_str())
    }

    /// Fans `index_doc` out across every registered index. Stops at the first error,
    /// per §7: the core performs no partial recovery.
    pub fn index_doc(&mut self, docid: DocId, value: &Value) -> Result<(), QdexError> {
        for index in self.indexes.values_mut() {
            index.index_doc(docid, value.clone())?;
        }
        Ok(())
    }

    /// Fans `reindex_doc` out across every registered index.
    pub fn reindex_doc(&mut self, docid: DocId, value: &Value) -> Result<(), QdexError> {
        for index in self.indexes.values_mut() {
            index.reindex_doc(docid, value.clone())?;
        }
        Ok(())
    }

    /// Fans `unindex_doc` out across every registered index.
    pub fn unindex_doc(&mut self, docid: DocId) {
        for index in self.indexes.values_mut() {
            index.unindex_doc(docid);
        }
    }

    /// Returns every registered index to its empty state.
    pub fn reset(&mut self) {
        for index in self.indexes.values_mut() {
            index.reset();
        }
    }

    /// Dispatches a resolved comparator to its bound index.
    pub(crate) fn apply_comparator(
        &self,
        index_name: &str,
        comparator: &Comparator,
    ) -> Result<BTreeSet<DocId>, QdexError> {
        let index = self.indexes.get(index_name).ok_or_else(|| QdexError::UnknownIndex {
            name: index_name.to_string(),
        })?;
        index.apply(comparator)
    }

    /// Drops derived caches on the named index, if registered; a no-op otherwise since
    /// a query may reference an index that was never bound.
    pub(crate) fn flush_index(&mut self, index_name: &str, deep: bool) {
        if let Some(index) = self.indexes.get_mut(index_name) {
            index.flush(deep);
        }
    }
}

/// Either an unparsed expression string or an already-built query tree, the two forms
/// [`CatalogQuery::run`] accepts.
pub enum QueryInput {
    Text(String),
    Node(QueryNode),
}

impl From<&str> for QueryInput {
    fn from(s: &str) -> Self {
        QueryInput::Text(s.to_string())
    }
}

impl From<String> for QueryInput {
    fn from(s: String) -> Self {
        QueryInput::Text(s)
    }
}

impl From<QueryNode> for QueryInput {
    fn from(node: QueryNode) -> Self {
        QueryInput::Node(node)
    }
}

/// How to order a [`CatalogQuery::run`] result before truncating it.
pub struct SortBy<'a> {
    pub index: &'a str,
    pub reverse: bool,
    pub sort_type: Option<&'a str>,
}

/// The catalog's query entry point (§4.5): parses a text expression (or accepts an
/// already-built tree), executes it, optionally sorts by a named index, and truncates
/// to `limit`. Returns `(num_docs, docids)` where `num_docs` is the pre-truncation count
/// when `limit` actually truncated the result, else the final docid count (§9,
/// ambiguity 3 — resolved this way per spec.md).
pub struct CatalogQuery<'a> {
    catalog: &'a Catalog,
}

impl<'a> CatalogQuery<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        CatalogQuery { catalog }
    }

    pub fn run(
        &self,
        input: impl Into<QueryInput>,
        bindings: &Bindings,
        optimize: bool,
        sort: Option<SortBy<'_>>,
        limit: Option<usize>,
    ) -> Result<(usize, Vec<DocId>), QdexError> {
        let node = match input.into() {
            QueryInput::Text(text) => parse(&text)?,
            QueryInput::Node(node) => node,
        };
        let docids = node.execute(self.catalog, optimize, bindings)?;
        let mut result_set = ResultSet::new(docids);

        if let Some(SortBy { index, reverse, sort_type }) = sort {
            let sort_index = self
                .catalog
                .get(index)
                .ok_or_else(|| QdexError::UnknownIndex { name: index.to_string() })?;
            result_set.sort(sort_index, reverse, None, sort_type)?;
        }

        let numdocs = result_set.len();
        if let Some(limit) = limit {
            if limit < numdocs {
                result_set.limit(limit);
                return Ok((numdocs, result_set.all()));
            }
            result_set.limit(limit);
        }
        Ok((numdocs, result_set.all()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::node::eq;
    use std::cell::RefCell;
    use std::rc::Rc;

    struct FieldIndex {
        name: String,
        values: BTreeMap<DocId, Value>,
        applied_log: Option<Rc<RefCell<Vec<DocId>>>>,
    }

    impl Index for FieldIndex {
        fn name(&self) -> &str {
            &self.name
        }
        fn bind_name(&mut self, name: String) {
            self.name = name;
        }
        fn index_doc(&mut self, docid: DocId, value: Value) -> Result<(), QdexError> {
            self.values.insert(docid, value);
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
        fn apply(&self, comparator: &Comparator) -> Result<BTreeSet<DocId>, QdexError> {
            if let Some(log) = &self.applied_log {
                log.borrow_mut().push(self.values.len() as DocId);
            }
            match comparator {
                Comparator::Eq(crate::query::node::Operand::Literal(v)) => Ok(self
                    .values
                    .iter()
                    .filter(|(_, ev)| *ev == v)
                    .map(|(k, _)| *k)
                    .collect()),
                _ => Ok(BTreeSet::new()),
            }
        }
        fn sort(
            &self,
            docids: &[DocId],
            reverse: bool,
            limit: Option<usize>,
            _sort_type: Option<&str>,
        ) -> Result<Vec<DocId>, QdexError> {
            let mut ordered: Vec<DocId> = docids.to_vec();
            ordered.sort_by_key(|d| format!("{:?}", self.values.get(d)));
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

    fn field(name: &str) -> FieldIndex {
        FieldIndex {
            name: name.to_string(),
            values: BTreeMap::new(),
            applied_log: None,
        }
    }

    #[test]
    fn test_insert_binds_name() {
        let mut catalog = Catalog::new(KeyWidth::Bits64);
        catalog.insert("a", Box::new(field("unbound")));
        assert_eq!(catalog.get("a").unwrap().name(), "a");
    }

    #[test]
    fn test_index_doc_fans_out_to_every_index() {
        let mut catalog = Catalog::new(KeyWidth::Bits64);
        catalog.insert("a", Box::new(field("a")));
        catalog.insert("b", Box::new(field("b")));
        catalog.index_doc(1, &Value::Int(5)).unwrap();
        assert_eq!(catalog.get("a").unwrap().indexed(), vec![1]);
        assert_eq!(catalog.get("b").unwrap().indexed(), vec![1]);
    }

    #[test]
    fn test_catalog_query_runs_text_expression() {
        let mut catalog = Catalog::new(KeyWidth::Bits64);
        catalog.insert("a", Box::new(field("a")));
        catalog.index_doc(1, &Value::Int(1)).unwrap();
        catalog.index_doc(2, &Value::Int(2)).unwrap();
        let cq = CatalogQuery::new(&catalog);
        let (numdocs, docids) = cq.run("a == 1", &Bindings::new(), true, None, None).unwrap();
        assert_eq!(numdocs, 1);
        assert_eq!(docids, vec![1]);
    }

    #[test]
    fn test_catalog_query_accepts_a_node_directly() {
        let mut catalog = Catalog::new(KeyWidth::Bits64);
        catalog.insert("a", Box::new(field("a")));
        catalog.index_doc(1, &Value::Int(1)).unwrap();
        let cq = CatalogQuery::new(&catalog);
        let (_, docids) = cq.run(eq("a", 1i64), &Bindings::new(), true, None, None).unwrap();
        assert_eq!(docids, vec![1]);
    }

    #[test]
    fn test_catalog_query_numdocs_is_pretruncation_count() {
        let mut catalog = Catalog::new(KeyWidth::Bits64);
        catalog.insert("a", Box::new(field("a")));
        for d in 1..=5u64 {
            catalog.index_doc(d, &Value::Int(1)).unwrap();
        }
        let cq = CatalogQuery::new(&catalog);
        let (numdocs, docids) = cq
            .run(
                "a == 1",
                &Bindings::new(),
                true,
                Some(SortBy { index: "a", reverse: false, sort_type: None }),
                Some(2),
            )
            .unwrap();
        assert_eq!(numdocs, 5);
        assert_eq!(docids.len(), 2);
    }

    #[test]
    fn test_and_short_circuit_suppresses_right_side_application() {
        let mut catalog = Catalog::new(KeyWidth::Bits64);
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut empty = field("empty");
        // No docs indexed: applying Eq always yields the empty set.
        let mut spy = field("spy");
        spy.applied_log = Some(log.clone());
        catalog.insert("empty", Box::new({
            empty.applied_log = Some(log.clone());
            empty
        }));
        catalog.insert("spy", Box::new(spy));
        catalog.index_doc(1, &Value::Int(1)).unwrap();

        let q = crate::query::node::and(vec![eq("empty", 999i64), eq("spy", 1i64)]);
        let result = q.execute(&catalog, false, &Bindings::new()).unwrap();
        assert!(result.is_empty());
        // Only "empty" (the left, empty branch) should have been applied.
        assert_eq!(log.borrow().len(), 1);
    }
}
