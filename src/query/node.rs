//! ## Query node types
//!
//! A query tree is a tagged-sum of comparators (each bound to one index by name) and
//! boolean combinators. Trees are immutable once built — the optimizer (`optimizer.rs`)
//! always returns a new tree rather than mutating its input, so a subtree shared between
//! two top-level queries is safe to reuse. Operator-overload sugar (`&`, `|`, `~`) is
//! replaced by the combinator functions at the bottom of this file — the algebra itself
//! does not depend on that surface syntax.

use std::collections::BTreeSet;

use crate::catalog::Catalog;
use crate::error::QdexError;
use crate::value::Value;
use crate::DocId;

/// An operand to a comparator: a literal value, a bound parameter name, or a list of
/// either (used by `any`/`all` and by dotted tuple-of-identifiers literals).
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal(Value),
    Name(String),
    List(Vec<Operand>),
}

impl Operand {
    fn resolve(&self, bindings: &std::collections::HashMap<String, Value>) -> Result<Value, QdexError> {
        match self {
            Operand::Literal(v) => Ok(v.clone()),
            Operand::Name(name) => bindings
                .get(name)
                .cloned()
                .ok_or_else(|| QdexError::UnboundName { name: name.clone() }),
            Operand::List(items) => {
                let mut resolved = Vec::with_capacity(items.len());
                for item in items {
                    resolved.push(item.resolve(bindings)?);
                }
                Ok(Value::List(resolved))
            }
        }
    }
}

/// The leaf operation a comparator performs against its bound index, mirroring the
/// `applyEq`/`applyInRange`/… capability methods of §6.1.
#[derive(Debug, Clone, PartialEq)]
pub enum Comparator {
    Eq(Operand),
    NotEq(Operand),
    Lt(Operand),
    Le(Operand),
    Gt(Operand),
    Ge(Operand),
    Contains(Operand),
    NotContains(Operand),
    Any(Operand),
    NotAny(Operand),
    All(Operand),
    NotAll(Operand),
    InRange {
        start: Operand,
        end: Operand,
        start_exclusive: bool,
        end_exclusive: bool,
    },
    NotInRange {
        start: Operand,
        end: Operand,
        start_exclusive: bool,
        end_exclusive: bool,
    },
}

impl Comparator {
    /// The name of the capability method this comparator maps to, for
    /// `QdexError::UnsupportedComparator` messages and for index dispatch.
    pub fn method_name(&self) -> &'static str {
        match self {
            Comparator::Eq(_) => "applyEq",
            Comparator::NotEq(_) => "applyNotEq",
            Comparator::Lt(_) => "applyLt",
            Comparator::Le(_) => "applyLe",
            Comparator::Gt(_) => "applyGt",
            Comparator::Ge(_) => "applyGe",
            Comparator::Contains(_) => "applyContains",
            Comparator::NotContains(_) => "applyNotContains",
            Comparator::Any(_) => "applyAny",
            Comparator::NotAny(_) => "applyNotAny",
            Comparator::All(_) => "applyAll",
            Comparator::NotAll(_) => "applyNotAll",
            Comparator::InRange { .. } => "applyInRange",
            Comparator::NotInRange { .. } => "applyNotInRange",
        }
    }

    /// The semantic negation of this comparator, used by [`QueryNode::negate`].
    fn negate(&self) -> Comparator {
        match self.clone() {
            Comparator::Eq(v) => Comparator::NotEq(v),
            Comparator::NotEq(v) => Comparator::Eq(v),
            Comparator::Lt(v) => Comparator::Ge(v),
            Comparator::Le(v) => Comparator::Gt(v),
            Comparator::Gt(v) => Comparator::Le(v),
            Comparator::Ge(v) => Comparator::Lt(v),
            Comparator::Contains(v) => Comparator::NotContains(v),
            Comparator::NotContains(v) => Comparator::Contains(v),
            Comparator::Any(v) => Comparator::NotAny(v),
            Comparator::NotAny(v) => Comparator::Any(v),
            Comparator::All(v) => Comparator::NotAll(v),
            Comparator::NotAll(v) => Comparator::All(v),
            Comparator::InRange {
                start,
                end,
                start_exclusive,
                end_exclusive,
            } => Comparator::NotInRange {
                start,
                end,
                start_exclusive,
                end_exclusive,
            },
            Comparator::NotInRange {
                start,
                end,
                start_exclusive,
                end_exclusive,
            } => Comparator::InRange {
                start,
                end,
                start_exclusive,
                end_exclusive,
            },
        }
    }
}

/// A node in a query tree. Immutable once constructed; combinators and the optimizer
/// build new trees rather than mutating existing ones.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryNode {
    Cmp {
        index: String,
        comparator: Comparator,
    },
    And(Vec<QueryNode>),
    Or(Vec<QueryNode>),
    Not(Box<QueryNode>),
}

pub type Bindings = std::collections::HashMap<String, Value>;

impl QueryNode {
    /// Produces this node's docid set, resolving `Name` operands against `bindings` and
    /// dispatching comparator leaves to `catalog`'s indexes.
    ///
    /// `And` short-circuits: once a branch evaluates to the empty set, later branches are
    /// not evaluated at all — this is observable by callers relying on it to suppress
    /// side effects. `Or` returns an untouched clone of whichever side is non-empty when
    /// the other side is empty, without forcing evaluation beyond what's needed.
    pub fn apply(&self, catalog: &Catalog, bindings: &Bindings) -> Result<BTreeSet<DocId>, QdexError> {
        match self {
            QueryNode::Cmp { index, comparator } => {
                let resolved = resolve_comparator(comparator, bindings)?;
                catalog.apply_comparator(index, &resolved)
            }
            QueryNode::And(children) => {
                if children.is_empty() {
                    return Ok(BTreeSet::new());
                }
                let mut acc = children[0].apply(catalog, bindings)?;
                for child in &children[1..] {
                    if acc.is_empty() {
                        break;
                    }
                    let next = child.apply(catalog, bindings)?;
                    acc = acc.intersection(&next).copied().collect();
                }
                Ok(acc)
            }
            QueryNode::Or(children) => {
                if children.is_empty() {
                    return Ok(BTreeSet::new());
                }
                let mut acc = children[0].apply(catalog, bindings)?;
                for child in &children[1..] {
                    let next = child.apply(catalog, bindings)?;
                    if acc.is_empty() {
                        acc = next;
                    } else if !next.is_empty() {
                        acc.extend(next);
                    }
                }
                Ok(acc)
            }
            QueryNode::Not(child) => child.negate().apply(catalog, bindings),
        }
    }

    /// Returns the semantically negated query tree. `negate(negate(q)) == q` for every
    /// variant, including through De Morgan's laws for `And`/`Or`.
    pub fn negate(&self) -> QueryNode {
        match self {
            QueryNode::Cmp { index, comparator } => QueryNode::Cmp {
                index: index.clone(),
                comparator: comparator.negate(),
            },
            QueryNode::And(children) => QueryNode::Or(children.iter().map(|c| c.negate()).collect()),
            QueryNode::Or(children) => QueryNode::And(children.iter().map(|c| c.negate()).collect()),
            QueryNode::Not(child) => (**child).clone(),
        }
    }

    /// The direct children of this node, for traversal and pretty-printing.
    pub fn iter_children(&self) -> Vec<&QueryNode> {
        match self {
            QueryNode::Cmp { .. } => Vec::new(),
            QueryNode::And(children) | QueryNode::Or(children) => children.iter().collect(),
            QueryNode::Not(child) => vec![child.as_ref()],
        }
    }

    /// Notifies every index named in this tree of an impending recomputation, letting
    /// them drop derived caches before `execute` re-runs them.
    pub fn flush(&self, catalog: &mut Catalog, deep: bool) {
        match self {
            QueryNode::Cmp { index, .. } => catalog.flush_index(index, deep),
            QueryNode::And(children) | QueryNode::Or(children) => {
                for child in children {
                    child.flush(catalog, deep);
                }
            }
            QueryNode::Not(child) => child.flush(catalog, deep),
        }
    }

    /// Returns `true` if this tree references at least one concrete index, i.e. it is
    /// not an empty `And`/`Or`/`Not` chain bottoming out in nothing.
    pub fn references_concrete_index(&self) -> bool {
        match self {
            QueryNode::Cmp { .. } => true,
            QueryNode::And(children) | QueryNode::Or(children) => {
                children.iter().any(|c| c.references_concrete_index())
            }
            QueryNode::Not(child) => child.references_concrete_index(),
        }
    }

    /// Entry point: optionally optimizes the tree (`super::optimizer::optimize`), then
    /// evaluates it, rejecting trees with no concrete index.
    pub fn execute(
        &self,
        catalog: &Catalog,
        optimize: bool,
        bindings: &Bindings,
    ) -> Result<BTreeSet<DocId>, QdexError> {
        if !self.references_concrete_index() {
            return Err(QdexError::NoConcreteIndex);
        }
        if optimize {
            let optimized = super::optimizer::optimize(self);
            optimized.apply(catalog, bindings)
        } else {
            self.apply(catalog, bindings)
        }
    }
}

fn resolve_comparator(comparator: &Comparator, bindings: &Bindings) -> Result<Comparator, QdexError> {
    Ok(match comparator.clone() {
        Comparator::Eq(v) => Comparator::Eq(Operand::Literal(v.resolve(bindings)?)),
        Comparator::NotEq(v) => Comparator::NotEq(Operand::Literal(v.resolve(bindings)?)),
        Comparator::Lt(v) => Comparator::Lt(Operand::Literal(v.resolve(bindings)?)),
        Comparator::Le(v) => Comparator::Le(Operand::Literal(v.resolve(bindings)?)),
        Comparator::Gt(v) => Comparator::Gt(Operand::Literal(v.resolve(bindings)?)),
        Comparator::Ge(v) => Comparator::Ge(Operand::Literal(v.resolve(bindings)?)),
        Comparator::Contains(v) => Comparator::Contains(Operand::Literal(v.resolve(bindings)?)),
        Comparator::NotContains(v) => Comparator::NotContains(Operand::Literal(v.resolve(bindings)?)),
        Comparator::Any(v) => Comparator::Any(Operand::Literal(v.resolve(bindings)?)),
        Comparator::NotAny(v) => Comparator::NotAny(Operand::Literal(v.resolve(bindings)?)),
        Comparator::All(v) => Comparator::All(Operand::Literal(v.resolve(bindings)?)),
        Comparator::NotAll(v) => Comparator::NotAll(Operand::Literal(v.resolve(bindings)?)),
        Comparator::InRange {
            start,
            end,
            start_exclusive,
            end_exclusive,
        } => Comparator::InRange {
            start: Operand::Literal(start.resolve(bindings)?),
            end: Operand::Literal(end.resolve(bindings)?),
            start_exclusive,
            end_exclusive,
        },
        Comparator::NotInRange {
            start,
            end,
            start_exclusive,
            end_exclusive,
        } => Comparator::NotInRange {
            start: Operand::Literal(start.resolve(bindings)?),
            end: Operand::Literal(end.resolve(bindings)?),
            start_exclusive,
            end_exclusive,
        },
    })
}

/// Builds an `Eq` comparator node, replacing the surface sugar `index == value`.
pub fn eq(index: impl Into<String>, value: impl Into<Value>) -> QueryNode {
    QueryNode::Cmp {
        index: index.into(),
        comparator: Comparator::Eq(Operand::Literal(value.into())),
    }
}

pub fn not_eq(index: impl Into<String>, value: impl Into<Value>) -> QueryNode {
    QueryNode::Cmp {
        index: index.into(),
        comparator: Comparator::NotEq(Operand::Literal(value.into())),
    }
}

pub fn lt(index: impl Into<String>, value: impl Into<Value>) -> QueryNode {
    QueryNode::Cmp {
        index: index.into(),
        comparator: Comparator::Lt(Operand::Literal(value.into())),
    }
}

pub fn gt(index: impl Into<String>, value: impl Into<Value>) -> QueryNode {
    QueryNode::Cmp {
        index: index.into(),
        comparator: Comparator::Gt(Operand::Literal(value.into())),
    }
}

pub fn in_range(index: impl Into<String>, start: Value, end: Value, start_exclusive: bool, end_exclusive: bool) -> QueryNode {
    QueryNode::Cmp {
        index: index.into(),
        comparator: Comparator::InRange {
            start: Operand::Literal(start),
            end: Operand::Literal(end),
            start_exclusive,
            end_exclusive,
        },
    }
}

pub fn any_of(index: impl Into<String>, values: Vec<Value>) -> QueryNode {
    QueryNode::Cmp {
        index: index.into(),
        comparator: Comparator::Any(Operand::Literal(Value::List(values))),
    }
}

pub fn all_of(index: impl Into<String>, values: Vec<Value>) -> QueryNode {
    QueryNode::Cmp {
        index: index.into(),
        comparator: Comparator::All(Operand::Literal(Value::List(values))),
    }
}

/// Replaces the `&` operator: n-ary conjunction, left-to-right, short-circuiting.
pub fn and(children: Vec<QueryNode>) -> QueryNode {
    QueryNode::And(children)
}

/// Replaces the `|` operator: n-ary disjunction.
pub fn or(children: Vec<QueryNode>) -> QueryNode {
    QueryNode::Or(children)
}

/// Replaces the `~` operator.
pub fn not(child: QueryNode) -> QueryNode {
    QueryNode::Not(Box::new(child))
}
