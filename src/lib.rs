//! # Qdex
//!
//! A pluggable indexing and querying core for persistent object collections: an R-tree
//! spatial index with OMT bulk loading and best-first k-NN, a small query algebra with
//! an optimizer and a restricted-infix expression parser, and a catalog that fans
//! document writes out across named indexes and runs query trees against them.
//!
//! The catalog and query layers are written against the [`index::Index`] capability
//! interface rather than any one concrete index, so [`spatial_index::SpatialIndex`] and
//! any field/keyword/text/facet index a caller supplies sit side by side in the same
//! [`catalog::Catalog`].

pub mod catalog;
pub mod error;
pub mod geometry;
pub mod index;
pub mod query;
pub mod result_set;
mod rtree;
mod settings;
pub mod spatial_index;
pub mod store;
pub mod value;

pub use error::QdexError;
pub use rtree::{BBox, KnnHit, RTreeEngine};

/// Non-negative document identifier (§3). Every index and the catalog share this type;
/// rejection of non-integer ids happens at the catalog boundary, the object model's
/// edge with the rest of the application.
pub type DocId = u64;
