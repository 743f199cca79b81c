//! Generic CRUD handlers, instantiated once per [`Resource`].
//!
//! | Method   | Path                          | Notes |
//! |----------|-------------------------------|-------|
//! | `GET`    | `/{Resource}`                 | At most [`MAX_COUNT`] items |
//! | `GET`    | `/{Resource}/query/{predicate}` | Percent-encoded predicate; at most [`MAX_COUNT`] items |
//! | `POST`   | `/{Resource}`                 | 201 with `Location` |
//! | `GET`    | `/{Resource}/{id}`            | 404 if not found |
//! | `PUT`    | `/{Resource}/{id}`            | Path id wins over body id |
//! | `PATCH`  | `/{Resource}/{id}`            | Body: JSON Patch operation list |
//! | `DELETE` | `/{Resource}/{id}`            | 204 |
//!
//! Each handler opens its own session, which is dropped on every exit path.

use std::sync::Arc;

use axum::{
  Json, Router,
  extract::{Path, State},
  http::{StatusCode, header},
  response::IntoResponse,
  routing::get,
};
use cm_core::{
  Error,
  entity::Entity,
  identity::{copy_properties, hydrate},
  model::Model,
  predicate::Filter,
  session::{Session, Storage},
};
use tracing::debug;

use crate::{
  error::ApiError,
  patch::{self, PatchOperation},
  resource::Resource,
};

/// Cap on the number of items returned by list and query.
pub const MAX_COUNT: usize = 500;

/// Register every route for `R` on `router`.
pub fn routes<S, R>(router: Router<Arc<S>>) -> Router<Arc<S>>
where
  S: Storage,
  R: Resource,
{
  let base = format!("/{}", R::ROUTE);
  router
    .route(&base, get(list::<S, R>).post(create::<S, R>))
    .route(&format!("{base}/query/{{predicate}}"), get(query::<S, R>))
    .route(
      &format!("{base}/{{id}}"),
      get(get_one::<S, R>)
        .put(update::<S, R>)
        .patch(partial_update::<S, R>)
        .delete(delete::<S, R>),
    )
}

// ─── Mapping ─────────────────────────────────────────────────────────────────

async fn to_models<R: Resource>(
  session: &impl Session,
  entities: &[R::Entity],
) -> Result<Vec<R::Model>, ApiError> {
  let mut models: Vec<R::Model> = entities.iter().map(hydrate).collect();
  R::attach(session, &mut models).await?;
  Ok(models)
}

async fn to_model<R: Resource>(
  session: &impl Session,
  entity: &R::Entity,
) -> Result<R::Model, ApiError> {
  let mut models = to_models::<R>(session, std::slice::from_ref(entity)).await?;
  models
    .pop()
    .ok_or_else(|| ApiError::Store("mapping produced no model".into()))
}

async fn load<R: Resource>(session: &impl Session, id: i64) -> Result<R::Entity, ApiError> {
  session
    .find::<R::Entity>(id)
    .await?
    .ok_or_else(|| Error::NotFound { set: <R::Entity as Entity>::SET, id }.into())
}

// ─── Read ────────────────────────────────────────────────────────────────────

/// `GET /{Resource}`
pub async fn list<S, R>(
  State(storage): State<Arc<S>>,
) -> Result<Json<Vec<R::Model>>, ApiError>
where
  S: Storage,
  R: Resource,
{
  let session = storage.session();
  let entities = session.query::<R::Entity>(None, Some(MAX_COUNT)).await?;
  Ok(Json(to_models::<R>(&session, &entities).await?))
}

/// `GET /{Resource}/query/{predicate}`
///
/// The router has already percent-decoded the segment once; it is decoded
/// a second time here, form style, so `+` also reads as a space.
pub async fn query<S, R>(
  State(storage): State<Arc<S>>,
  Path(predicate): Path<String>,
) -> Result<Json<Vec<R::Model>>, ApiError>
where
  S: Storage,
  R: Resource,
{
  let spaced = predicate.replace('+', " ");
  let text = urlencoding::decode(&spaced).map_err(|e| {
    ApiError::BadRequest(format!("predicate is not valid percent-encoded UTF-8: {e}"))
  })?;
  let filter = Filter::compile(<R::Entity as Entity>::SET, &text).map_err(Error::from)?;

  let session = storage.session();
  let entities = session.query::<R::Entity>(Some(&filter), Some(MAX_COUNT)).await?;
  debug!(resource = R::ROUTE, predicate = %text, matched = entities.len(), "query");
  Ok(Json(to_models::<R>(&session, &entities).await?))
}

/// `GET /{Resource}/{id}`
pub async fn get_one<S, R>(
  State(storage): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<Json<R::Model>, ApiError>
where
  S: Storage,
  R: Resource,
{
  let session = storage.session();
  let entity = load::<R>(&session, id).await?;
  Ok(Json(to_model::<R>(&session, &entity).await?))
}

// ─── Write ───────────────────────────────────────────────────────────────────

/// `POST /{Resource}`: any `id` in the body is ignored.
pub async fn create<S, R>(
  State(storage): State<Arc<S>>,
  Json(body): Json<Option<R::Model>>,
) -> Result<impl IntoResponse, ApiError>
where
  S: Storage,
  R: Resource,
{
  let mut entity = R::Entity::default();
  copy_properties(&mut entity, body.as_ref())?;

  let mut session = storage.session();
  let key = session.add(&entity);
  let commit = session.commit().await?;
  let id = commit
    .assigned_id(key)
    .ok_or_else(|| ApiError::Store("commit reported no id for the new row".into()))?;

  let mut model: R::Model = hydrate(&entity);
  model.set_id(id);
  R::attach(&session, std::slice::from_mut(&mut model)).await?;

  debug!(resource = R::ROUTE, id, "created");
  let location = format!("/api/{}/{id}", R::ROUTE);
  Ok((StatusCode::CREATED, [(header::LOCATION, location)], Json(model)))
}

/// `PUT /{Resource}/{id}`
pub async fn update<S, R>(
  State(storage): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(mut body): Json<Option<R::Model>>,
) -> Result<Json<R::Model>, ApiError>
where
  S: Storage,
  R: Resource,
{
  let mut session = storage.session();
  let mut entity = load::<R>(&session, id).await?;

  if let Some(model) = body.as_mut() {
    model.set_id(id);
  }
  copy_properties(&mut entity, body.as_ref())?;
  session.update(&entity);
  session.commit().await?;

  debug!(resource = R::ROUTE, id, "updated");
  Ok(Json(to_model::<R>(&session, &entity).await?))
}

/// `PATCH /{Resource}/{id}`: one copy and one commit per call.
pub async fn partial_update<S, R>(
  State(storage): State<Arc<S>>,
  Path(id): Path<i64>,
  Json(ops): Json<Vec<PatchOperation>>,
) -> Result<Json<R::Model>, ApiError>
where
  S: Storage,
  R: Resource,
{
  let mut session = storage.session();
  let mut entity = load::<R>(&session, id).await?;

  let current: R::Model = hydrate(&entity);
  let mut patched = patch::apply(&current, &ops)?;
  patched.set_id(id);

  copy_properties(&mut entity, Some(&patched))?;
  session.update(&entity);
  session.commit().await?;

  debug!(resource = R::ROUTE, id, ops = ops.len(), "patched");
  Ok(Json(to_model::<R>(&session, &entity).await?))
}

/// `DELETE /{Resource}/{id}`
pub async fn delete<S, R>(
  State(storage): State<Arc<S>>,
  Path(id): Path<i64>,
) -> Result<StatusCode, ApiError>
where
  S: Storage,
  R: Resource,
{
  let mut session = storage.session();
  let entity = load::<R>(&session, id).await?;
  session.remove(&entity);
  session.commit().await?;

  debug!(resource = R::ROUTE, id, "deleted");
  Ok(StatusCode::NO_CONTENT)
}
