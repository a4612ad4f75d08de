//! ## Errors for Qdex
//!
//! This module defines the error type shared by every fallible operation in the crate:
//! the R-tree engine, the spatial index, the query algebra, the expression parser, and
//! the catalog.

use std::error::Error;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Errors produced by the indexing and querying core.
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[derive(Debug)]
pub enum QdexError {
    /// A document id was not a non-negative integer.
    InvalidDocId {
        /// A textual representation of the rejected value.
        value: String,
    },
    /// An R-tree was constructed with too small a capacity.
    InvalidCapacity {
        /// The capacity value that was provided.
        capacity: usize,
    },
    /// An expression could not be parsed into a query tree.
    MalformedExpression {
        /// The expression that failed to parse.
        expr: String,
        /// A human-readable reason.
        reason: String,
    },
    /// A geometry predicate name is not one of the supported predicates.
    UnknownPredicate {
        /// The predicate name that was requested.
        predicate: String,
    },
    /// A comparator carries a `Name` operand with no binding at execution time.
    UnboundName {
        /// The unbound parameter name.
        name: String,
    },
    /// A query tree references no concrete index.
    NoConcreteIndex,
    /// An index was asked to apply a comparator it does not support.
    UnsupportedComparator {
        /// The name of the index.
        index: String,
        /// The name of the unsupported comparator.
        comparator: String,
    },
    /// A sort was requested for docids that have no entry in the sort index.
    Unsortable {
        /// The docids missing a sort key.
        docids: Vec<u64>,
    },
    /// An index produced a result of unexpected shape (e.g. not a set).
    BadResult {
        /// A textual representation of the unexpected result.
        got: String,
    },
    /// A spatial index's discriminator produced a value that is not a geometry.
    NotAGeometry {
        /// The docid whose discriminated value was rejected.
        docid: u64,
    },
    /// A query or catalog operation named an index that was never registered.
    UnknownIndex {
        /// The index name that was requested.
        name: String,
    },
}

impl fmt::Display for QdexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QdexError::InvalidDocId { value } => {
                write!(f, "{value} is not a valid document id; document ids must be non-negative integers")
            }
            QdexError::InvalidCapacity { capacity } => {
                write!(
                    f,
                    "invalid capacity: {capacity}. capacity must be at least 4"
                )
            }
            QdexError::MalformedExpression { expr, reason } => {
                write!(f, "could not parse expression {expr:?}: {reason}")
            }
            QdexError::UnknownPredicate { predicate } => {
                write!(f, "unknown geometry predicate: {predicate}")
            }
            QdexError::UnboundName { name } => {
                write!(f, "parameter {name:?} has no binding")
            }
            QdexError::NoConcreteIndex => {
                write!(f, "query references no concrete index")
            }
            QdexError::UnsupportedComparator { index, comparator } => {
                write!(f, "index {index:?} does not support {comparator}")
            }
            QdexError::Unsortable { docids } => {
                write!(f, "no sort key for docids: {docids:?}")
            }
            QdexError::BadResult { got } => {
                write!(f, "index returned an unexpected result: {got}")
            }
            QdexError::NotAGeometry { docid } => {
                write!(f, "discriminated value for docid {docid} is not a geometry")
            }
            QdexError::UnknownIndex { name } => {
                write!(f, "no index named {name:?} is registered with this catalog")
            }
        }
    }
}

impl Error for QdexError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_capacity_display() {
        let err = QdexError::InvalidCapacity { capacity: 2 };
        assert_eq!(
            format!("{err}"),
            "invalid capacity: 2. capacity must be at least 4"
        );
    }

    #[test]
    fn test_unbound_name_display() {
        let err = QdexError::UnboundName {
            name: "foo".to_string(),
        };
        assert_eq!(format!("{err}"), "parameter \"foo\" has no binding");
    }

    #[test]
    fn test_unsortable_display() {
        let err = QdexError::Unsortable {
            docids: vec![1, 2],
        };
        assert_eq!(format!("{err}"), "no sort key for docids: [1, 2]");
    }
}
