//! The three exposed resources and what distinguishes them.
//!
//! Everything else about a resource is generic: see [`crate::handlers`].

use std::future::Future;

use cm_core::{
  Result,
  entity::{self, Entity},
  identity::{CopyFrom, hydrate},
  model::{self, Model},
  predicate::Filter,
  session::Session,
  shape::{EntitySet, Value},
};

/// A (wire model, entity) pair exposed at `/api/{ROUTE}`.
pub trait Resource: Send + Sync + 'static {
  /// Path segment under `/api`.
  const ROUTE: &'static str;

  type Entity: Entity + CopyFrom<Self::Model>;
  type Model: Model<Entity = Self::Entity> + CopyFrom<Self::Entity>;

  /// Fill relationship snapshots on models just mapped from entities.
  fn attach<'a, S: Session>(
    session: &'a S,
    models: &'a mut [Self::Model],
  ) -> impl Future<Output = Result<()>> + Send + 'a {
    let _ = (session, models);
    async { Ok(()) }
  }
}

pub struct Companies;
pub struct Customers;
pub struct Employees;

impl Resource for Companies {
  const ROUTE: &'static str = "Companies";

  type Entity = entity::Company;
  type Model = model::Company;

  /// One batched query for the customers of every company in the response.
  async fn attach<'a, S: Session>(
    session: &'a S,
    models: &'a mut [model::Company],
  ) -> Result<()> {
    if models.is_empty() {
      return Ok(());
    }

    let ids = models.iter().map(|m| Value::Integer(m.id));
    let filter = Filter::any_of(EntitySet::Customers, "CompanyId", ids)?;
    let customers: Vec<entity::Customer> = session.query(Some(&filter), None).await?;

    for company in models.iter_mut() {
      company.customers = customers
        .iter()
        .filter(|c| c.company_id == company.id)
        .map(hydrate)
        .collect();
    }
    Ok(())
  }
}

impl Resource for Customers {
  const ROUTE: &'static str = "Customers";

  type Entity = entity::Customer;
  type Model = model::Customer;
}

impl Resource for Employees {
  const ROUTE: &'static str = "Employees";

  type Entity = entity::Employee;
  type Model = model::Employee;
}
