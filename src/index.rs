//! ## Index capability interface
//!
//! Every concrete index — a field index over scalar attributes, a keyword or text
//! index, a facet/n-best index, or the spatial index in `spatial_index.rs` — satisfies
//! this one trait (§6.1). The catalog (`catalog.rs`) holds indexes behind `Box<dyn
//! Index>` and dispatches comparator application and sort requests through it without
//! knowing which concrete kind it's talking to, translating the "dynamic dispatch via
//! named methods" design note (§9) into a single `apply` entry point plus a
//! `method_name`-keyed error on unsupported comparators.

use std::collections::BTreeSet;

use crate::error::QdexError;
use crate::query::node::Comparator;
use crate::value::Value;
use crate::DocId;

/// The capability contract every index registered with a [`crate::catalog::Catalog`]
/// must satisfy.
pub trait Index {
    /// The name this index is bound to once registered with a catalog.
    fn name(&self) -> &str;

    /// Binds this index to `name`, called once by [`crate::catalog::Catalog`] when the
    /// index is registered (`__setitem__` in §4.5's terms).
    fn bind_name(&mut self, name: String);

    /// Indexes `value` under `docid`. Reindex semantics: if `docid` was already
    /// indexed, its prior entry is removed first.
    fn index_doc(&mut self, docid: DocId, value: Value) -> Result<(), QdexError>;

    /// Removes `docid`'s entry, if any.
    fn unindex_doc(&mut self, docid: DocId);

    /// Equivalent to `unindex_doc` followed by `index_doc`.
    fn reindex_doc(&mut self, docid: DocId, value: Value) -> Result<(), QdexError> {
        self.unindex_doc(docid);
        self.index_doc(docid, value)
    }

    /// Returns this index to its empty state.
    fn reset(&mut self);

    /// Docids with a current entry.
    fn indexed(&self) -> Vec<DocId>;

    /// Docids that were indexed but whose discriminated value was absent (the
    /// sentinel), per the discriminator contract in §4.2.
    fn not_indexed(&self) -> Vec<DocId>;

    fn indexed_count(&self) -> usize {
        self.indexed().len()
    }

    fn docids_count(&self) -> usize {
        self.indexed_count() + self.not_indexed().len()
    }

    /// Applies a comparator and returns the matching docid set. Indexes that cannot
    /// support a given comparator return [`QdexError::UnsupportedComparator`].
    fn apply(&self, comparator: &Comparator) -> Result<BTreeSet<DocId>, QdexError>;

    /// Orders `docids` per this index's sort key, stably with respect to their input
    /// order (so a second sort on the same result set composes with the first, §4.6).
    /// `sort_type` is an index-specific hint (e.g. a secondary key name); indexes that
    /// ignore it are free to. Indexes that do not support sorting at all return
    /// [`QdexError::UnsupportedComparator`] with `comparator: "sort"`.
    fn sort(
        &self,
        docids: &[DocId],
        reverse: bool,
        limit: Option<usize>,
        sort_type: Option<&str>,
    ) -> Result<Vec<DocId>, QdexError> {
        let _ = (docids, reverse, limit, sort_type);
        Err(QdexError::UnsupportedComparator {
            index: self.name().to_string(),
            comparator: "sort".to_string(),
        })
    }

    /// Hint to drop any derived caches this index keeps, forcing a rebuild on next
    /// access. `deep` asks for a full rebuild rather than a shallow invalidation.
    fn flush(&mut self, deep: bool);
}
