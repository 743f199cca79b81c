//! HTTP-level tests driving the full router with `tower::ServiceExt::oneshot`.

use std::sync::{
  Arc,
  atomic::{AtomicUsize, Ordering},
};

use axum::{
  Router,
  body::Body,
  http::{HeaderMap, Request, StatusCode, header},
};
use cm_core::{
  entity::{self, Entity},
  predicate::{Filter, MAX_DEPTH, MAX_TREE_DEPTH},
  session::{Commit, PendingKey, Session, Storage},
};
use cm_store_sqlite::{SqliteSession, SqliteStore};
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::handlers::MAX_COUNT;

// ─── Harness ─────────────────────────────────────────────────────────────────

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn make_app() -> Router { crate::app(Arc::new(store().await)) }

async fn send(
  app: &Router,
  method: &str,
  uri: &str,
  body: Option<Value>,
) -> (StatusCode, HeaderMap, Value) {
  let mut req = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(json) => {
      req = req.header(header::CONTENT_TYPE, "application/json");
      Body::from(json.to_string())
    }
    None => Body::empty(),
  };

  let resp = app.clone().oneshot(req.body(body).unwrap()).await.unwrap();
  let status = resp.status();
  let headers = resp.headers().clone();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let json = if bytes.is_empty() {
    Value::Null
  } else {
    serde_json::from_slice(&bytes).unwrap_or_else(|_| {
      Value::String(String::from_utf8_lossy(&bytes).into_owned())
    })
  };
  (status, headers, json)
}

async fn get(app: &Router, uri: &str) -> (StatusCode, Value) {
  let (status, _, body) = send(app, "GET", uri, None).await;
  (status, body)
}

/// POST and return the new id, asserting success.
async fn create(app: &Router, resource: &str, body: Value) -> i64 {
  let (status, _, created) =
    send(app, "POST", &format!("/api/{resource}"), Some(body)).await;
  assert_eq!(status, StatusCode::CREATED, "{created}");
  created["id"].as_i64().unwrap()
}

async fn create_company(app: &Router, name: &str) -> i64 {
  create(app, "Companies", json!({ "name": name })).await
}

async fn create_customer(app: &Router, company_id: i64, name: &str) -> i64 {
  create(
    app,
    "Customers",
    json!({
      "companyId": company_id,
      "name": name,
      "email": format!("{}@example.com", name.to_lowercase()),
    }),
  )
  .await
}

fn query_uri(resource: &str, predicate: &str) -> String {
  format!("/api/{resource}/query/{}", urlencoding::encode(predicate))
}

// ─── Create / get ────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_then_get_round_trips_scalars() {
  let app = make_app().await;
  let (status, headers, created) = send(
    &app,
    "POST",
    "/api/Companies",
    Some(json!({
      "id": 999,
      "name": "Acme",
      "address": "1 Road Runner Way",
      "description": "Anvils",
    })),
  )
  .await;

  assert_eq!(status, StatusCode::CREATED);
  let id = created["id"].as_i64().unwrap();
  assert_ne!(id, 999, "caller-supplied id must be ignored");
  assert_eq!(
    headers.get(header::LOCATION).unwrap(),
    format!("/api/Companies/{id}").as_str()
  );

  let (status, fetched) = get(&app, &format!("/api/Companies/{id}")).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(fetched["name"], "Acme");
  assert_eq!(fetched["address"], "1 Road Runner Way");
  assert_eq!(fetched["description"], "Anvils");
  assert_eq!(fetched["customers"], json!([]));
}

#[tokio::test]
async fn created_ids_are_unique_and_stable() {
  let app = make_app().await;
  let company = create_company(&app, "Acme").await;
  let first = create_customer(&app, company, "Wile").await;
  let second = create_customer(&app, company, "Road").await;
  assert_ne!(first, second);

  for (id, name) in [(first, "Wile"), (second, "Road")] {
    let (status, body) = get(&app, &format!("/api/Customers/{id}")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], id);
    assert_eq!(body["name"], name);
  }
}

#[tokio::test]
async fn get_missing_is_404_with_error_body() {
  let app = make_app().await;
  let (status, body) = get(&app, "/api/Employees/41").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
  assert!(body["error"].as_str().unwrap().contains("41"), "{body}");
}

#[tokio::test]
async fn null_body_is_rejected() {
  let app = make_app().await;
  let (status, _, body) = send(&app, "POST", "/api/Companies", Some(Value::Null)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("null"), "{body}");
}

#[tokio::test]
async fn unknown_resource_is_404() {
  let app = make_app().await;
  let (status, _) = get(&app, "/api/Widgets").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Update ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn update_persists_path_id_over_body_id() {
  let app = make_app().await;
  let id = create_company(&app, "Acme").await;

  let (status, _, updated) = send(
    &app,
    "PUT",
    &format!("/api/Companies/{id}"),
    Some(json!({ "id": 12345, "name": "Acme Corp", "address": "Desert" })),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{updated}");
  assert_eq!(updated["id"], id);

  let (_, fetched) = get(&app, &format!("/api/Companies/{id}")).await;
  assert_eq!(fetched["name"], "Acme Corp");
  assert_eq!(fetched["address"], "Desert");

  let (status, _) = get(&app, "/api/Companies/12345").await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn update_missing_or_null() {
  let app = make_app().await;
  let (status, _, _) =
    send(&app, "PUT", "/api/Companies/5", Some(json!({ "name": "X" }))).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let id = create_company(&app, "Acme").await;
  let (status, _, _) =
    send(&app, "PUT", &format!("/api/Companies/{id}"), Some(Value::Null)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

// ─── Partial update ──────────────────────────────────────────────────────────

#[tokio::test]
async fn patch_applies_operations_and_keeps_id() {
  let app = make_app().await;
  let company = create_company(&app, "Acme").await;
  let id = create_customer(&app, company, "Wile").await;

  let (status, _, patched) = send(
    &app,
    "PATCH",
    &format!("/api/Customers/{id}"),
    Some(json!([
      { "op": "replace", "path": "/name", "value": "Wile E." },
      { "op": "replace", "path": "/Id", "value": 777 },
    ])),
  )
  .await;
  assert_eq!(status, StatusCode::OK, "{patched}");
  assert_eq!(patched["id"], id);
  assert_eq!(patched["name"], "Wile E.");

  let (_, fetched) = get(&app, &format!("/api/Customers/{id}")).await;
  assert_eq!(fetched["name"], "Wile E.");
  assert_eq!(fetched["email"], "wile@example.com");
}

#[tokio::test]
async fn patch_failures_are_client_errors() {
  let app = make_app().await;
  let id = create_company(&app, "Acme").await;
  let uri = format!("/api/Companies/{id}");

  for ops in [
    json!([{ "op": "replace", "path": "/nickname", "value": "A" }]),
    json!([{ "op": "test", "path": "/name", "value": "Globex" }]),
    json!([{ "op": "explode", "path": "/name" }]),
    json!([{ "op": "replace", "path": "/name", "value": 42 }]),
  ] {
    let (status, _, body) = send(&app, "PATCH", &uri, Some(ops.clone())).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{ops} -> {body}");
    assert!(body["error"].is_string(), "{body}");
  }

  let (_, fetched) = get(&app, &uri).await;
  assert_eq!(fetched["name"], "Acme", "failed patches must not persist");
}

#[tokio::test]
async fn patch_missing_is_404() {
  let app = make_app().await;
  let (status, _, _) = send(
    &app,
    "PATCH",
    "/api/Employees/3",
    Some(json!([{ "op": "replace", "path": "/email", "value": "x" }])),
  )
  .await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

// ─── Delete ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn delete_then_get_is_404() {
  let app = make_app().await;
  let id = create_company(&app, "Acme").await;

  let (status, _, body) = send(&app, "DELETE", &format!("/api/Companies/{id}"), None).await;
  assert_eq!(status, StatusCode::NO_CONTENT);
  assert_eq!(body, Value::Null);

  let (status, _) = get(&app, &format!("/api/Companies/{id}")).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, _, _) = send(&app, "DELETE", &format!("/api/Companies/{id}"), None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn deleting_company_with_customers_is_rejected() {
  let app = make_app().await;
  let id = create_company(&app, "Acme").await;
  create_customer(&app, id, "Wile").await;

  let (status, _, body) = send(&app, "DELETE", &format!("/api/Companies/{id}"), None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

  let (status, _) = get(&app, &format!("/api/Companies/{id}")).await;
  assert_eq!(status, StatusCode::OK);
}

// ─── Constraints ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_company_name_is_rejected() {
  let app = make_app().await;
  let id = create(
    &app,
    "Companies",
    json!({ "name": "Acme", "description": "original" }),
  )
  .await;

  let (status, _, body) = send(
    &app,
    "POST",
    "/api/Companies",
    Some(json!({ "name": "Acme", "description": "impostor" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("UNIQUE"), "{body}");

  let (_, all) = get(&app, "/api/Companies").await;
  let all = all.as_array().unwrap();
  assert_eq!(all.len(), 1);
  assert_eq!(all[0]["id"], id);
  assert_eq!(all[0]["description"], "original");
}

#[tokio::test]
async fn customer_with_unknown_company_is_rejected() {
  let app = make_app().await;
  let (status, _, body) = send(
    &app,
    "POST",
    "/api/Customers",
    Some(json!({ "companyId": 404, "name": "Orphan", "email": "o@example.com" })),
  )
  .await;
  assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");

  let (_, all) = get(&app, "/api/Customers").await;
  assert_eq!(all, json!([]));
}

// ─── Query / list ────────────────────────────────────────────────────────────

#[tokio::test]
async fn query_by_name_returns_exact_matches() {
  let app = make_app().await;
  let acme = create_company(&app, "Acme").await;
  create_company(&app, "Acme Holdings").await;
  create_company(&app, "acme").await;

  let (status, found) = get(&app, &query_uri("Companies", r#"Name == "Acme""#)).await;
  assert_eq!(status, StatusCode::OK);
  let found = found.as_array().unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0]["id"], acme);
}

#[tokio::test]
async fn injected_statement_is_a_malformed_predicate() {
  let app = make_app().await;
  create_company(&app, "Acme").await;

  let (status, body) =
    get(&app, &query_uri("Companies", r#"Name == "Acme"; DropTable()"#)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  let message = body["error"].as_str().unwrap();
  assert!(message.contains("malformed predicate"), "{message}");
  assert!(message.contains("position 14"), "{message}");

  let (_, all) = get(&app, "/api/Companies").await;
  assert_eq!(all.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn query_segment_is_decoded_twice() {
  let app = make_app().await;
  let company = create_company(&app, "Acme").await;
  create_customer(&app, company, "Wile").await;

  let predicate = r#"Email.EndsWith("@example.com")"#;
  let twice = urlencoding::encode(&urlencoding::encode(predicate)).into_owned();
  let (status, found) = get(&app, &format!("/api/Customers/query/{twice}")).await;
  assert_eq!(status, StatusCode::OK, "{found}");
  assert_eq!(found.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn form_encoded_spaces_are_accepted() {
  let app = make_app().await;
  let acme = create_company(&app, "Acme").await;
  create_company(&app, "Acme Corp").await;

  let (status, found) = get(&app, "/api/Companies/query/Name+==+%22Acme%22").await;
  assert_eq!(status, StatusCode::OK, "{found}");
  let found = found.as_array().unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0]["id"], acme);

  // An encoded plus survives as a literal character.
  let (status, found) =
    get(&app, "/api/Companies/query/Name.Contains(%22%252B%22)").await;
  assert_eq!(status, StatusCode::OK, "{found}");
  assert!(found.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn deeply_nested_queries_are_never_server_faults() {
  let app = make_app().await;
  let acme = create_company(&app, "Acme").await;

  let chain = format!(
    "{}Id == {acme}{}",
    "(Id == -1 || ".repeat(MAX_DEPTH),
    ")".repeat(MAX_DEPTH)
  );
  let (status, found) = get(&app, &query_uri("Companies", &chain)).await;
  assert_eq!(status, StatusCode::OK, "{found}");
  assert_eq!(found.as_array().unwrap().len(), 1);

  let alternating = (0..=MAX_TREE_DEPTH).fold(format!("Id == {acme}"), |inner, level| {
    if level % 2 == 0 {
      format!("(Id == -1 || {inner})")
    } else {
      format!("(Id > 0 && {inner})")
    }
  });
  let (status, body) = get(&app, &query_uri("Companies", &alternating)).await;
  assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
  assert!(body["error"].as_str().unwrap().contains("levels deep"), "{body}");
}

#[tokio::test]
async fn query_rejects_relationship_and_unknown_fields() {
  let app = make_app().await;
  for predicate in ["Customers == null", "Salary > 10", "Name.ToUpper() == \"A\""] {
    let (status, body) = get(&app, &query_uri("Companies", predicate)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{predicate} -> {body}");
  }
}

#[tokio::test]
async fn list_is_capped() {
  let store = store().await;
  let mut session = store.session();
  for i in 0..=MAX_COUNT {
    session.add(&entity::Company { name: format!("Company {i:04}"), ..Default::default() });
  }
  session.commit().await.unwrap();

  let app = crate::app(Arc::new(store));
  let (status, all) = get(&app, "/api/Companies").await;
  assert_eq!(status, StatusCode::OK);
  let all = all.as_array().unwrap();
  assert_eq!(all.len(), MAX_COUNT);
  assert_eq!(all[0]["name"], "Company 0000");

  let (_, matched) = get(&app, &query_uri("Companies", "Id > 0")).await;
  assert_eq!(matched.as_array().unwrap().len(), MAX_COUNT);
}

#[tokio::test]
async fn company_responses_carry_customer_snapshot() {
  let app = make_app().await;
  let acme = create_company(&app, "Acme").await;
  let globex = create_company(&app, "Globex").await;
  create_customer(&app, acme, "Wile").await;
  create_customer(&app, acme, "Road").await;
  create_customer(&app, globex, "Hank").await;

  let (_, one) = get(&app, &format!("/api/Companies/{acme}")).await;
  let names: Vec<_> = one["customers"]
    .as_array()
    .unwrap()
    .iter()
    .map(|c| c["name"].as_str().unwrap().to_owned())
    .collect();
  assert_eq!(names, ["Wile", "Road"]);

  let (_, all) = get(&app, "/api/Companies").await;
  assert_eq!(all[1]["customers"].as_array().unwrap().len(), 1);
  assert_eq!(all[1]["customers"][0]["companyId"], globex);

  // Snapshots are read-only: a PUT carrying customers changes nothing.
  let (status, _, _) = send(
    &app,
    "PUT",
    &format!("/api/Companies/{globex}"),
    Some(json!({ "name": "Globex", "customers": [] })),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let (_, customers) = get(&app, "/api/Customers").await;
  assert_eq!(customers.as_array().unwrap().len(), 3);
}

// ─── One commit per partial update ───────────────────────────────────────────

/// Storage wrapper counting commits across all sessions.
struct Counting {
  inner:   SqliteStore,
  commits: Arc<AtomicUsize>,
}

struct CountingSession {
  inner:   SqliteSession,
  commits: Arc<AtomicUsize>,
}

impl Storage for Counting {
  type Session = CountingSession;

  fn session(&self) -> CountingSession {
    CountingSession { inner: self.inner.session(), commits: self.commits.clone() }
  }
}

impl Session for CountingSession {
  async fn query<'a, E: Entity>(
    &'a self,
    filter: Option<&'a Filter>,
    limit: Option<usize>,
  ) -> cm_core::Result<Vec<E>> {
    self.inner.query(filter, limit).await
  }

  async fn find<E: Entity>(&self, id: i64) -> cm_core::Result<Option<E>> {
    self.inner.find(id).await
  }

  fn add<E: Entity>(&mut self, entity: &E) -> PendingKey { self.inner.add(entity) }

  fn update<E: Entity>(&mut self, entity: &E) { self.inner.update(entity) }

  fn remove<E: Entity>(&mut self, entity: &E) { self.inner.remove(entity) }

  async fn commit(&mut self) -> cm_core::Result<Commit> {
    self.commits.fetch_add(1, Ordering::SeqCst);
    self.inner.commit().await
  }
}

#[tokio::test]
async fn partial_update_commits_exactly_once() {
  let commits = Arc::new(AtomicUsize::new(0));
  let storage = Counting { inner: store().await, commits: commits.clone() };
  let app = crate::app(Arc::new(storage));

  let id = create_company(&app, "Acme").await;
  commits.store(0, Ordering::SeqCst);

  let (status, _, _) = send(
    &app,
    "PATCH",
    &format!("/api/Companies/{id}"),
    Some(json!([
      { "op": "replace", "path": "/name", "value": "Acme Corp" },
      { "op": "add", "path": "/description", "value": "Anvils" },
      { "op": "remove", "path": "/address" },
    ])),
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(commits.load(Ordering::SeqCst), 1);
}
