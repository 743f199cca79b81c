//! The closed predicate tree produced by the compiler.
//!
//! Every node is already type-checked against one shape: field references
//! point into the static field table and literals carry their final type.

use crate::shape::{Field, Value};

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CompareOp {
  Eq,
  Ne,
  Lt,
  Lte,
  Gt,
  Gte,
}

/// The only method calls a predicate may contain.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TextOp {
  Contains,
  StartsWith,
  EndsWith,
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Operand {
  Field(&'static Field),
  Value(Value),
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Predicate {
  True,
  False,
  And(Vec<Predicate>),
  Or(Vec<Predicate>),
  Not(Box<Predicate>),
  /// `==` and `!=` are null-safe; ordering against null is false.
  Compare {
    left:  Operand,
    op:    CompareOp,
    right: Operand,
  },
  Text {
    field:   &'static Field,
    op:      TextOp,
    pattern: String,
  },
  In {
    field:  &'static Field,
    values: Vec<Value>,
  },
}

impl Predicate {
  /// Levels of `and`/`or`/`not` above the deepest comparison.
  pub fn depth(&self) -> usize {
    match self {
      Self::And(items) | Self::Or(items) => {
        1 + items.iter().map(Self::depth).max().unwrap_or(0)
      }
      Self::Not(inner) => 1 + inner.depth(),
      _ => 0,
    }
  }
}
