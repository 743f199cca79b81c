//! Identity and property-copy contract shared by entities and wire models.
//!
//! Copying is the only way scalar state moves between the persisted and the
//! wire representation: hydration (entity → model) and mutation
//! (model → entity) both go through [`CopyFrom`]. Relationship fields are
//! never copied.

use crate::{Error, Result};

/// Anything with a storage-assigned integer identifier.
pub trait Identifiable {
  fn id(&self) -> i64;
}

/// Overwrite `id` and every scalar field of `self` with the values of a
/// like-shaped `source`.
pub trait CopyFrom<S: ?Sized> {
  fn copy_from(&mut self, source: &S);
}

/// Copy scalars from `source` onto `target`, failing with
/// [`Error::InvalidArgument`] when there is no source to copy from.
pub fn copy_properties<T, S>(target: &mut T, source: Option<&S>) -> Result<()>
where
  T: CopyFrom<S>,
  S: ?Sized,
{
  let source = source.ok_or_else(|| {
    Error::InvalidArgument("copy source must not be null".to_owned())
  })?;
  target.copy_from(source);
  Ok(())
}

/// Build a fresh `T` whose scalars are copied from `source`.
pub fn hydrate<T, S>(source: &S) -> T
where
  T: Default + CopyFrom<S>,
  S: ?Sized,
{
  let mut target = T::default();
  target.copy_from(source);
  target
}
