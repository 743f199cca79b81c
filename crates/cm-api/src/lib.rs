//! JSON REST API for the company manager.
//!
//! Exposes an axum [`Router`] backed by any [`cm_core::session::Storage`].
//! Every resource gets the same generic handlers; see [`handlers`].
//!
//! # Mounting
//!
//! ```rust,ignore
//! let app = cm_api::app(Arc::new(store));
//! ```

pub mod config;
pub mod error;
pub mod handlers;
pub mod patch;
pub mod resource;

use std::sync::Arc;

use axum::Router;
use cm_core::session::Storage;
use tower_http::trace::TraceLayer;

pub use config::ServerConfig;
pub use error::ApiError;
use resource::{Companies, Customers, Employees};

/// Build the resource router for `storage`, without the `/api` prefix.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S: Storage>(storage: Arc<S>) -> Router<()> {
  let router = Router::new();
  let router = handlers::routes::<S, Companies>(router);
  let router = handlers::routes::<S, Customers>(router);
  let router = handlers::routes::<S, Employees>(router);
  router.with_state(storage)
}

/// The full application: resources under `/api`, with request tracing.
pub fn app<S: Storage>(storage: Arc<S>) -> Router {
  Router::new()
    .nest("/api", api_router(storage))
    .layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests;
