//! ## Dynamic value
//!
//! The query algebra and the index capability interface are written against objects of
//! unknown, heterogeneous shape — a field index might discriminate an integer, a string,
//! or a list of tags; the spatial index discriminates a geometry. Rather than making
//! every query node and index generic over its own value type (which would prevent a
//! single query tree from mixing a field comparator with a spatial one), this crate
//! follows the same dynamic-dispatch spirit a named-method comparator protocol implies
//! (§9 "Dynamic dispatch via named methods") and represents every
//! discriminated value and every comparator operand as one tagged [`Value`].

use std::cmp::Ordering;
use std::collections::BTreeMap;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::geometry::Rect;

/// A dynamically-typed value: what an index discriminates from an object, and what a
/// comparator's operand literal holds. [`Value::Map`] stands in for an indexed object's
/// attributes, so an attribute-name discriminator (§4.2) has something to look up.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Value {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Geometry(Rect),
}

impl Value {
    /// Orders two values of the same variant; returns `None` across variants (including
    /// geometry, which has no defined ordering) rather than picking an arbitrary
    /// cross-type ordering.
    pub fn partial_compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.partial_cmp(b),
            (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
            (Value::Int(a), Value::Float(b)) => (*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&(*b as f64)),
            (Value::Str(a), Value::Str(b)) => a.partial_cmp(b),
            (Value::Bool(a), Value::Bool(b)) => a.partial_cmp(b),
            _ => None,
        }
    }

    /// `Contains` semantics: `self` is a list and contains `other` as a member.
    pub fn contains(&self, other: &Value) -> bool {
        match self {
            Value::List(items) => items.contains(other),
            _ => false,
        }
    }

    pub fn as_geometry(&self) -> Option<&Rect> {
        match self {
            Value::Geometry(r) => Some(r),
            _ => None,
        }
    }

    /// Looks up `attr` when `self` is a [`Value::Map`]; `None` otherwise, including when
    /// the attribute is simply absent — both read as "no value" to a discriminator.
    pub fn get_attr(&self, attr: &str) -> Option<&Value> {
        match self {
            Value::Map(m) => m.get(attr),
            _ => None,
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}
