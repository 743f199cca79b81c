//! Error types for `cm-core`.

use thiserror::Error;

use crate::{predicate::PredicateError, shape::EntitySet};

#[derive(Debug, Error)]
pub enum Error {
  #[error("{set} {id} not found")]
  NotFound { set: EntitySet, id: i64 },

  /// A contract precondition was violated by the caller (e.g. a missing
  /// copy source).
  #[error("invalid argument: {0}")]
  InvalidArgument(String),

  #[error("malformed predicate: {0}")]
  MalformedPredicate(#[from] PredicateError),

  /// Uniqueness, referential-integrity or check constraint rejected at
  /// commit. The pending change set has been discarded.
  #[error("constraint violation: {0}")]
  ConstraintViolation(String),

  #[error("storage unavailable: {0}")]
  StorageUnavailable(String),

  /// A stored row does not match the shape it was read as.
  #[error("cannot decode {set} row: {message}")]
  Decode { set: EntitySet, message: String },
}

impl Error {
  /// Whether the failure was caused by the request rather than the server.
  pub fn is_client_error(&self) -> bool {
    matches!(
      self,
      Self::NotFound { .. }
        | Self::InvalidArgument(_)
        | Self::MalformedPredicate(_)
        | Self::ConstraintViolation(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
