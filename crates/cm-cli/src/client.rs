//! Async HTTP client wrapping the company manager JSON API.

use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use cm_core::model::{self, Model};
use reqwest::{Client, Response};
use serde_json::Value;

/// A wire model together with the route it is served under.
pub trait Remote: Model {
  const ROUTE: &'static str;
}

impl Remote for model::Company {
  const ROUTE: &'static str = "Companies";
}

impl Remote for model::Customer {
  const ROUTE: &'static str = "Customers";
}

impl Remote for model::Employee {
  const ROUTE: &'static str = "Employees";
}

/// Async HTTP client for the company manager REST API.
///
/// The inner [`reqwest::Client`] is `Arc`-based, so clones share a pool.
#[derive(Clone)]
pub struct ApiClient {
  client:   Client,
  base_url: String,
}

impl ApiClient {
  pub fn new(base_url: String) -> Result<Self> {
    let client = Client::builder()
      .timeout(Duration::from_secs(30))
      .build()
      .context("failed to build HTTP client")?;
    Ok(Self { client, base_url })
  }

  fn url(&self, path: &str) -> String {
    format!("{}/api{}", self.base_url.trim_end_matches('/'), path)
  }

  /// `GET /api/{Resource}`
  pub async fn list<M: Remote>(&self) -> Result<Vec<M>> {
    let path = format!("/{}", M::ROUTE);
    let resp = self.send(self.client.get(self.url(&path)), &path).await?;
    resp.json().await.with_context(|| format!("deserialising {}", M::ROUTE))
  }

  /// `GET /api/{Resource}/query/{predicate}`
  ///
  /// The server decodes the segment twice, so it is encoded twice here.
  pub async fn query<M: Remote>(&self, predicate: &str) -> Result<Vec<M>> {
    let encoded = urlencoding::encode(&urlencoding::encode(predicate)).into_owned();
    let path = format!("/{}/query/{encoded}", M::ROUTE);
    let resp = self.send(self.client.get(self.url(&path)), &path).await?;
    resp.json().await.with_context(|| format!("deserialising {}", M::ROUTE))
  }

  /// `GET /api/{Resource}/{id}`
  pub async fn get<M: Remote>(&self, id: i64) -> Result<M> {
    let path = format!("/{}/{id}", M::ROUTE);
    let resp = self.send(self.client.get(self.url(&path)), &path).await?;
    resp.json().await.with_context(|| format!("deserialising {path}"))
  }

  /// `POST /api/{Resource}`, returning the stored model with its new id.
  pub async fn create<M: Remote>(&self, model: &M) -> Result<M> {
    let path = format!("/{}", M::ROUTE);
    let resp = self
      .send(self.client.post(self.url(&path)).json(model), &path)
      .await?;
    resp.json().await.context("deserialising created item")
  }

  /// `DELETE /api/{Resource}/{id}`
  pub async fn delete<M: Remote>(&self, id: i64) -> Result<()> {
    let path = format!("/{}/{id}", M::ROUTE);
    self.send(self.client.delete(self.url(&path)), &path).await?;
    Ok(())
  }

  async fn send(&self, req: reqwest::RequestBuilder, path: &str) -> Result<Response> {
    tracing::debug!(path, "request");
    let resp = req.send().await.with_context(|| format!("{path} failed"))?;

    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let detail = resp
      .json::<Value>()
      .await
      .ok()
      .and_then(|body| body.get("error").and_then(Value::as_str).map(str::to_owned));
    match detail {
      Some(message) => Err(anyhow!("{path} → {status}: {message}")),
      None => Err(anyhow!("{path} → {status}")),
    }
  }
}
