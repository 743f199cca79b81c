//! Predicate compiler: caller-supplied filter text to a typed, bounded
//! [`Filter`] over one entity shape.
//!
//! Compilation is lex → parse → type-check in a single pass. The result is
//! a closed [`Predicate`] tree; nothing in it can name a column or call a
//! function that is not in the shape's static field table.

mod ast;
mod lexer;
mod parser;


use std::fmt;

pub use self::ast::{CompareOp, Operand, Predicate, TextOp};
use crate::{
  Error, Result,
  shape::{EntitySet, FieldType, Value},
};

/// Longest predicate text accepted, in characters.
pub const MAX_PREDICATE_LEN: usize = 4096;

/// Deepest nesting of parentheses and `not` accepted.
pub const MAX_DEPTH: usize = 32;

/// Deepest `and`/`or`/`not` structure a compiled tree may have. Each level
/// costs a few entries of SQLite's parser stack once lowered.
pub const MAX_TREE_DEPTH: usize = 16;

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Why a predicate failed to compile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PredicateError {
  message:  String,
  position: Option<usize>,
}

impl PredicateError {
  pub fn new(message: impl Into<String>) -> Self {
    Self { message: message.into(), position: None }
  }

  pub(crate) fn at(message: impl Into<String>, position: usize) -> Self {
    Self { message: message.into(), position: Some(position) }
  }

  pub fn message(&self) -> &str { &self.message }

  /// Character offset into the predicate text, when known.
  pub fn position(&self) -> Option<usize> { self.position }
}

impl fmt::Display for PredicateError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.position {
      Some(pos) => write!(f, "{} at position {pos}", self.message),
      None => f.write_str(&self.message),
    }
  }
}

impl std::error::Error for PredicateError {}

// ─── Filter ──────────────────────────────────────────────────────────────────

/// A compiled predicate bound to the entity set it was checked against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filter {
  set:       EntitySet,
  predicate: Predicate,
}

impl Filter {
  /// Compile `text` against the scalar fields of `set`.
  pub fn compile(set: EntitySet, text: &str) -> Result<Self, PredicateError> {
    let len = text.chars().count();
    if len > MAX_PREDICATE_LEN {
      return Err(PredicateError::new(format!(
        "predicate is {len} characters long, limit is {MAX_PREDICATE_LEN}"
      )));
    }
    if text.trim().is_empty() {
      return Err(PredicateError::new("predicate is empty"));
    }

    let tokens = lexer::tokenize(text)?;
    let predicate = parser::parse(set.shape(), &tokens)?;
    if predicate.depth() > MAX_TREE_DEPTH {
      return Err(PredicateError::new(format!(
        "expression alternates and/or/not more than {MAX_TREE_DEPTH} levels deep"
      )));
    }
    Ok(Self { set, predicate })
  }

  /// `field in (values...)`, built without going through text. An empty
  /// value list matches nothing.
  pub fn any_of(
    set: EntitySet,
    field: &str,
    values: impl IntoIterator<Item = Value>,
  ) -> Result<Self> {
    let shape = set.shape();
    let field = shape.field(field).ok_or_else(|| {
      Error::InvalidArgument(format!("{set} has no field '{field}'"))
    })?;

    let values: Vec<Value> = values.into_iter().collect();
    if let Some(bad) = values.iter().find(|v| !value_fits(field.ty, v)) {
      return Err(Error::InvalidArgument(format!(
        "{} value for {} field '{}'",
        bad.type_name(),
        field.ty,
        field.name
      )));
    }

    let predicate = if values.is_empty() {
      Predicate::False
    } else {
      Predicate::In { field, values }
    };
    Ok(Self { set, predicate })
  }

  pub fn set(&self) -> EntitySet { self.set }

  pub fn predicate(&self) -> &Predicate { &self.predicate }
}

fn value_fits(ty: FieldType, value: &Value) -> bool {
  matches!(
    (ty, value),
    (FieldType::Integer, Value::Integer(_)) | (FieldType::Text, Value::Text(_))
  )
}
