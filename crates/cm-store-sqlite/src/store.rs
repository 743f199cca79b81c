//! [`SqliteStore`] and [`SqliteSession`]: the SQLite implementation of
//! [`Storage`] and [`Session`].

use std::path::Path;

use cm_core::{
  Error as CoreError,
  entity::Entity,
  predicate::Filter,
  session::{Change, ChangeSet, Commit, PendingKey, Session, Storage},
  shape::Value,
};
use rusqlite::{params_from_iter, types::Value as SqlValue};
use tracing::debug;

use crate::{
  Result,
  encode::{decode_value, encode_value},
  schema::SCHEMA,
  sql::{self, Sql},
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A company manager store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

impl Storage for SqliteStore {
  type Session = SqliteSession;

  fn session(&self) -> SqliteSession {
    SqliteSession { conn: self.conn.clone(), pending: ChangeSet::new() }
  }
}

// ─── Session ─────────────────────────────────────────────────────────────────

/// One unit of work against a [`SqliteStore`].
///
/// Writes stay in memory until [`Session::commit`]; dropping the session
/// throws them away.
pub struct SqliteSession {
  conn:    tokio_rusqlite::Connection,
  pending: ChangeSet,
}

/// A row as read: the id and the remaining columns in shape order.
type RawRow = (i64, Vec<SqlValue>);

impl SqliteSession {
  async fn fetch<E: Entity>(&self, statement: Sql) -> Result<Vec<E>> {
    let width = E::SET.shape().fields.len();
    let Sql { text, params } = statement;

    let rows: Vec<RawRow> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&text)?;
        let rows = stmt
          .query_map(params_from_iter(params), |row| {
            let id: i64 = row.get(0)?;
            let values = (1..width)
              .map(|i| row.get::<_, SqlValue>(i))
              .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok((id, values))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let entities = rows
      .into_iter()
      .map(|(id, raw)| decode_row::<E>(id, raw))
      .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(entities)
  }

  async fn apply(&self, changes: Vec<Change>) -> Result<Commit> {
    let commit = self
      .conn
      .call(move |conn| {
        // Dropping `tx` on an early return rolls everything back.
        let tx = conn.transaction()?;
        let mut commit = Commit::default();

        for change in changes {
          match change {
            Change::Insert { key, set, values } => {
              tx.execute(&sql::insert(set.shape()), encoded(&values, None))?;
              commit.record(key, tx.last_insert_rowid());
            }
            Change::Update { set, id, values } => {
              tx.execute(&sql::update(set.shape()), encoded(&values, Some(id)))?;
            }
            Change::Delete { set, id } => {
              tx.execute(&sql::delete(set.shape()), [id])?;
            }
          }
        }

        tx.commit()?;
        Ok(commit)
      })
      .await?;
    Ok(commit)
  }
}

fn encoded(
  values: &[Value],
  id: Option<i64>,
) -> rusqlite::ParamsFromIter<Vec<SqlValue>> {
  let mut params: Vec<SqlValue> = values.iter().map(encode_value).collect();
  if let Some(id) = id {
    params.push(SqlValue::Integer(id));
  }
  params_from_iter(params)
}

fn decode_row<E: Entity>(id: i64, raw: Vec<SqlValue>) -> cm_core::Result<E> {
  let values = raw
    .into_iter()
    .map(|v| decode_value(E::SET, v))
    .collect::<cm_core::Result<Vec<_>>>()?;
  E::from_row(id, values)
}

fn check_filter<E: Entity>(filter: Option<&Filter>) -> cm_core::Result<()> {
  match filter {
    Some(filter) if filter.set() != E::SET => Err(CoreError::InvalidArgument(format!(
      "filter compiled for {} cannot query {}",
      filter.set(),
      E::SET
    ))),
    _ => Ok(()),
  }
}

impl Session for SqliteSession {
  async fn query<'a, E: Entity>(
    &'a self,
    filter: Option<&'a Filter>,
    limit: Option<usize>,
  ) -> cm_core::Result<Vec<E>> {
    check_filter::<E>(filter)?;
    let statement = sql::select(E::SET.shape(), filter.map(Filter::predicate), limit);
    match self.fetch(statement).await {
      Ok(found) => Ok(found),
      Err(e) if filter.is_some() => Err(e.into_filter_error()),
      Err(e) => Err(e.into()),
    }
  }

  async fn find<E: Entity>(&self, id: i64) -> cm_core::Result<Option<E>> {
    let statement = sql::select_by_id(E::SET.shape(), id);
    let found: Vec<E> = self.fetch(statement).await?;
    Ok(found.into_iter().next())
  }

  fn add<E: Entity>(&mut self, entity: &E) -> PendingKey { self.pending.add(entity) }

  fn update<E: Entity>(&mut self, entity: &E) { self.pending.update(entity); }

  fn remove<E: Entity>(&mut self, entity: &E) { self.pending.remove(entity); }

  async fn commit(&mut self) -> cm_core::Result<Commit> {
    let changes = self.pending.take();
    if changes.is_empty() {
      return Ok(Commit::default());
    }

    let count = changes.len();
    let commit = self.apply(changes).await.inspect_err(|e| {
      debug!(changes = count, error = %e, "commit rolled back");
    })?;
    debug!(changes = count, inserted = commit.inserted(), "committed");
    Ok(commit)
  }
}

impl Drop for SqliteSession {
  fn drop(&mut self) {
    if !self.pending.is_empty() {
      debug!(
        discarded = self.pending.len(),
        "session dropped with uncommitted changes"
      );
    }
  }
}

