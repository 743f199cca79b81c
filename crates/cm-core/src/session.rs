//! The `Storage` / `Session` traits and the pending change set.
//!
//! A [`Session`] is a unit of work scoped to one logical operation: reads go
//! straight to the backend, writes are recorded in a [`ChangeSet`] and only
//! reach storage on [`Session::commit`]. Dropping a session without
//! committing discards whatever is pending.
//!
//! Backends (e.g. `cm-store-sqlite`) implement these traits; the API layer
//! depends only on the abstraction.

use std::future::Future;

use crate::{
  Result,
  entity::Entity,
  predicate::Filter,
  shape::{EntitySet, Value},
};

// ─── Change tracking ─────────────────────────────────────────────────────────

/// Handle for an entity added to a session, redeemed against the
/// [`Commit`] for its storage-assigned id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingKey(usize);

/// One recorded write. `values` follow
/// [`Shape::data_fields`](crate::shape::Shape::data_fields) order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Change {
  Insert { key: PendingKey, set: EntitySet, values: Vec<Value> },
  Update { set: EntitySet, id: i64, values: Vec<Value> },
  Delete { set: EntitySet, id: i64 },
}

/// Ordered list of writes awaiting commit.
#[derive(Debug, Default)]
pub struct ChangeSet {
  changes:  Vec<Change>,
  next_key: usize,
}

impl ChangeSet {
  pub fn new() -> Self { Self::default() }

  pub fn add<E: Entity>(&mut self, entity: &E) -> PendingKey {
    let key = PendingKey(self.next_key);
    self.next_key += 1;
    self.changes.push(Change::Insert { key, set: E::SET, values: entity.values() });
    key
  }

  pub fn update<E: Entity>(&mut self, entity: &E) {
    self.changes.push(Change::Update {
      set:    E::SET,
      id:     entity.id(),
      values: entity.values(),
    });
  }

  pub fn remove<E: Entity>(&mut self, entity: &E) {
    self.changes.push(Change::Delete { set: E::SET, id: entity.id() });
  }

  pub fn len(&self) -> usize { self.changes.len() }

  pub fn is_empty(&self) -> bool { self.changes.is_empty() }

  /// Hand the pending writes to the backend, leaving the set empty.
  pub fn take(&mut self) -> Vec<Change> { std::mem::take(&mut self.changes) }
}

/// Outcome of a successful commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Commit {
  assigned: Vec<(PendingKey, i64)>,
}

impl Commit {
  pub fn record(&mut self, key: PendingKey, id: i64) { self.assigned.push((key, id)); }

  /// The id storage gave the entity added under `key`.
  pub fn assigned_id(&self, key: PendingKey) -> Option<i64> {
    self.assigned.iter().find(|(k, _)| *k == key).map(|(_, id)| *id)
  }

  pub fn inserted(&self) -> usize { self.assigned.len() }
}

// ─── Traits ──────────────────────────────────────────────────────────────────

/// A backend able to open sessions.
pub trait Storage: Send + Sync + 'static {
  type Session: Session;

  /// Open a fresh session. Sessions are never shared between operations.
  fn session(&self) -> Self::Session;
}

/// Unit of work over all entity collections.
///
/// All read futures are `Send` so sessions can be driven from axum handlers.
pub trait Session: Send + Sync {
  /// Entities of type `E` matching `filter`, ordered by id, at most `limit`.
  ///
  /// Fails with [`Error::InvalidArgument`](crate::Error::InvalidArgument)
  /// when `filter` was compiled for a different entity set.
  fn query<'a, E: Entity>(
    &'a self,
    filter: Option<&'a Filter>,
    limit: Option<usize>,
  ) -> impl Future<Output = Result<Vec<E>>> + Send + 'a;

  /// Point lookup by id. Returns `None` if not found.
  fn find<E: Entity>(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<E>>> + Send + '_;

  /// Record `entity` for insertion. Its id is ignored.
  fn add<E: Entity>(&mut self, entity: &E) -> PendingKey;

  /// Record the scalar state of a loaded entity for writing back.
  fn update<E: Entity>(&mut self, entity: &E);

  fn remove<E: Entity>(&mut self, entity: &E);

  /// Apply every pending change atomically. On failure nothing is applied
  /// and the pending set is cleared.
  fn commit(&mut self) -> impl Future<Output = Result<Commit>> + Send + '_;
}
