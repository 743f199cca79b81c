//! Error type for `cm-store-sqlite`.

use cm_core::predicate::PredicateError;
use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] cm_core::Error),

  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
  /// The SQLite constraint message, if this is a constraint failure.
  fn constraint_message(&self) -> Option<String> {
    match self {
      Self::Database(tokio_rusqlite::Error::Rusqlite(
        rusqlite::Error::SqliteFailure(failure, message),
      )) if failure.code == ErrorCode::ConstraintViolation => {
        Some(message.clone().unwrap_or_else(|| failure.to_string()))
      }
      _ => None,
    }
  }

  /// SQLite's message when it refused to run a statement at all, e.g. on
  /// parser stack or expression depth limits.
  fn rejected_statement(&self) -> Option<String> {
    match self {
      Self::Database(tokio_rusqlite::Error::Rusqlite(
        rusqlite::Error::SqliteFailure(failure, message),
      )) if matches!(failure.code, ErrorCode::Unknown | ErrorCode::TooBig) => {
        Some(message.clone().unwrap_or_else(|| failure.to_string()))
      }
      _ => None,
    }
  }

  /// Categorize a failure of a filtered read; a refused statement is blamed
  /// on the predicate.
  pub(crate) fn into_filter_error(self) -> cm_core::Error {
    match self.rejected_statement() {
      Some(detail) => cm_core::Error::MalformedPredicate(PredicateError::new(format!(
        "predicate could not be evaluated: {detail}"
      ))),
      None => self.into(),
    }
  }
}

impl From<Error> for cm_core::Error {
  fn from(err: Error) -> Self {
    if let Some(message) = err.constraint_message() {
      return Self::ConstraintViolation(message);
    }
    match err {
      Error::Core(inner) => inner,
      Error::Database(inner) => Self::StorageUnavailable(inner.to_string()),
    }
  }
}
