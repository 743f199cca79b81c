//! Wire models: the JSON payloads exchanged with callers.
//!
//! Models mirror their entity field-for-field. The one addition is
//! [`Company::customers`], a snapshot array filled by the API layer; it is a
//! relationship and therefore never copied onto an entity.

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
  entity::{self, Entity},
  identity::{CopyFrom, Identifiable},
};

/// A wire model paired with the entity it is persisted as.
///
/// Hydration (`Self: CopyFrom<Self::Entity>`) is required separately by the
/// resource layer.
pub trait Model:
  Identifiable + Default + Clone + Serialize + DeserializeOwned + Send + Sync + 'static
{
  type Entity: Entity + CopyFrom<Self>;

  fn set_id(&mut self, id: i64);
}

// ─── Company ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Company {
  pub id:          i64,
  pub name:        String,
  pub address:     Option<String>,
  pub description: Option<String>,
  /// Snapshot of the company's customers at read time.
  pub customers:   Vec<Customer>,
}

impl Identifiable for Company {
  fn id(&self) -> i64 { self.id }
}

impl Model for Company {
  type Entity = entity::Company;

  fn set_id(&mut self, id: i64) { self.id = id; }
}

impl CopyFrom<entity::Company> for Company {
  fn copy_from(&mut self, source: &entity::Company) {
    self.id = source.id;
    self.name.clone_from(&source.name);
    self.address.clone_from(&source.address);
    self.description.clone_from(&source.description);
  }
}

impl CopyFrom<Company> for entity::Company {
  fn copy_from(&mut self, source: &Company) {
    self.id = source.id;
    self.name.clone_from(&source.name);
    self.address.clone_from(&source.address);
    self.description.clone_from(&source.description);
  }
}

// ─── Customer ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Customer {
  pub id:         i64,
  pub company_id: i64,
  pub name:       String,
  pub email:      String,
}

impl Identifiable for Customer {
  fn id(&self) -> i64 { self.id }
}

impl Model for Customer {
  type Entity = entity::Customer;

  fn set_id(&mut self, id: i64) { self.id = id; }
}

impl CopyFrom<entity::Customer> for Customer {
  fn copy_from(&mut self, source: &entity::Customer) {
    self.id = source.id;
    self.company_id = source.company_id;
    self.name.clone_from(&source.name);
    self.email.clone_from(&source.email);
  }
}

impl CopyFrom<Customer> for entity::Customer {
  fn copy_from(&mut self, source: &Customer) {
    self.id = source.id;
    self.company_id = source.company_id;
    self.name.clone_from(&source.name);
    self.email.clone_from(&source.email);
  }
}

// ─── Employee ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Employee {
  pub id:         i64,
  pub company_id: i64,
  pub first_name: String,
  pub last_name:  String,
  pub email:      String,
}

impl Identifiable for Employee {
  fn id(&self) -> i64 { self.id }
}

impl Model for Employee {
  type Entity = entity::Employee;

  fn set_id(&mut self, id: i64) { self.id = id; }
}

impl CopyFrom<entity::Employee> for Employee {
  fn copy_from(&mut self, source: &entity::Employee) {
    self.id = source.id;
    self.company_id = source.company_id;
    self.first_name.clone_from(&source.first_name);
    self.last_name.clone_from(&source.last_name);
    self.email.clone_from(&source.email);
  }
}

impl CopyFrom<Employee> for entity::Employee {
  fn copy_from(&mut self, source: &Employee) {
    self.id = source.id;
    self.company_id = source.company_id;
    self.first_name.clone_from(&source.first_name);
    self.last_name.clone_from(&source.last_name);
    self.email.clone_from(&source.email);
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::{Error, identity::copy_properties};

  #[test]
  fn copy_ignores_customer_snapshot() {
    let mut model = Company {
      id:        3,
      name:      "Acme".into(),
      customers: vec![Customer { id: 9, ..Default::default() }],
      ..Default::default()
    };
    let mut entity = entity::Company::default();
    entity.copy_from(&model);
    assert_eq!(entity.id(), 3);
    assert_eq!(entity.name, "Acme");

    entity.name = "Globex".into();
    model.copy_from(&entity);
    assert_eq!(model.name, "Globex");
    assert_eq!(model.customers.len(), 1, "relationship must not be touched");
  }

  #[test]
  fn copy_properties_requires_a_source() {
    let mut entity = entity::Employee::default();
    let err = copy_properties::<_, Employee>(&mut entity, None).unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
  }

  #[test]
  fn wire_format_is_camel_case_with_defaults() {
    let model: Employee =
      serde_json::from_str(r#"{"firstName":"Ann","companyId":4}"#).unwrap();
    assert_eq!(model.first_name, "Ann");
    assert_eq!(model.company_id, 4);
    assert_eq!(model.id, 0);
    assert_eq!(model.email, "");

    let json = serde_json::to_value(Company::default()).unwrap();
    assert!(json.get("customers").is_some());
    assert!(json.get("address").is_some_and(serde_json::Value::is_null));
  }
}
