//! Persisted entities: the representation owned by a storage session.
//!
//! Entities carry only scalar fields. Relationships (a company's customers
//! and employees) are described by the [`Shape`](crate::shape::Shape)
//! metadata and loaded explicitly; they never live on the entity itself.

use std::{fmt, vec};

use crate::{
  Error, Result,
  identity::Identifiable,
  shape::{EntitySet, Value},
};

// ─── Trait ───────────────────────────────────────────────────────────────────

/// A record that a storage backend can persist.
///
/// `values` and `from_row` exchange the non-key scalar fields in the order
/// given by [`Shape::data_fields`](crate::shape::Shape::data_fields) for
/// [`Entity::SET`]. The key is passed separately because it is assigned by
/// storage and never written by the caller.
pub trait Entity:
  Identifiable + Default + Clone + fmt::Debug + Send + Sync + 'static
{
  const SET: EntitySet;

  fn values(&self) -> Vec<Value>;

  fn from_row(id: i64, values: Vec<Value>) -> Result<Self>;
}

/// Positional reader over one stored row.
struct RowReader {
  set:    EntitySet,
  values: vec::IntoIter<Value>,
}

impl RowReader {
  fn new(set: EntitySet, values: Vec<Value>) -> Result<Self> {
    let expected = set.shape().data_fields().len();
    if values.len() != expected {
      return Err(Error::Decode {
        set,
        message: format!("expected {expected} columns, got {}", values.len()),
      });
    }
    Ok(Self { set, values: values.into_iter() })
  }

  fn next(&mut self) -> Value { self.values.next().unwrap_or(Value::Null) }

  fn integer(&mut self) -> Result<i64> {
    match self.next() {
      Value::Integer(v) => Ok(v),
      other => Err(self.mismatch("integer", &other)),
    }
  }

  fn text(&mut self) -> Result<String> {
    match self.next() {
      Value::Text(v) => Ok(v),
      other => Err(self.mismatch("text", &other)),
    }
  }

  fn optional_text(&mut self) -> Result<Option<String>> {
    match self.next() {
      Value::Null => Ok(None),
      Value::Text(v) => Ok(Some(v)),
      other => Err(self.mismatch("text or null", &other)),
    }
  }

  fn mismatch(&self, expected: &str, found: &Value) -> Error {
    Error::Decode {
      set:     self.set,
      message: format!("expected {expected}, found {}", found.type_name()),
    }
  }
}

// ─── Company ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Company {
  pub id:          i64,
  pub name:        String,
  pub address:     Option<String>,
  pub description: Option<String>,
}

impl Identifiable for Company {
  fn id(&self) -> i64 { self.id }
}

impl Entity for Company {
  const SET: EntitySet = EntitySet::Companies;

  fn values(&self) -> Vec<Value> {
    vec![
      self.name.clone().into(),
      self.address.clone().into(),
      self.description.clone().into(),
    ]
  }

  fn from_row(id: i64, values: Vec<Value>) -> Result<Self> {
    let mut row = RowReader::new(Self::SET, values)?;
    Ok(Self {
      id,
      name: row.text()?,
      address: row.optional_text()?,
      description: row.optional_text()?,
    })
  }
}

impl fmt::Display for Company {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Company: {}", self.name)
  }
}

// ─── Customer ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Customer {
  pub id:         i64,
  pub company_id: i64,
  pub name:       String,
  pub email:      String,
}

impl Identifiable for Customer {
  fn id(&self) -> i64 { self.id }
}

impl Entity for Customer {
  const SET: EntitySet = EntitySet::Customers;

  fn values(&self) -> Vec<Value> {
    vec![
      self.company_id.into(),
      self.name.clone().into(),
      self.email.clone().into(),
    ]
  }

  fn from_row(id: i64, values: Vec<Value>) -> Result<Self> {
    let mut row = RowReader::new(Self::SET, values)?;
    Ok(Self {
      id,
      company_id: row.integer()?,
      name: row.text()?,
      email: row.text()?,
    })
  }
}

impl fmt::Display for Customer {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Customer: {} <{}>", self.name, self.email)
  }
}

// ─── Employee ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq)]
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

impl Entity for Employee {
  const SET: EntitySet = EntitySet::Employees;

  fn values(&self) -> Vec<Value> {
    vec![
      self.company_id.into(),
      self.first_name.clone().into(),
      self.last_name.clone().into(),
      self.email.clone().into(),
    ]
  }

  fn from_row(id: i64, values: Vec<Value>) -> Result<Self> {
    let mut row = RowReader::new(Self::SET, values)?;
    Ok(Self {
      id,
      company_id: row.integer()?,
      first_name: row.text()?,
      last_name: row.text()?,
      email: row.text()?,
    })
  }
}

impl fmt::Display for Employee {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "Employee: {} {} <{}>", self.first_name, self.last_name, self.email)
  }
}
