//! ## Query algebra
//!
//! A query tree ([`node::QueryNode`]) is built directly via its combinator functions
//! (`eq`, `and`, `or`, `not`, …) or parsed from the restricted infix expression
//! mini-language (`parser`). Either way it can be rewritten into an equivalent but
//! cheaper tree by `optimizer::optimize` before it is executed against a catalog.

pub mod node;
pub mod optimizer;
pub mod parser;

pub use node::{
    all_of, and, any_of, eq, gt, in_range, lt, not, not_eq, or, Bindings, Comparator, Operand,
    QueryNode,
};
pub use parser::parse;
