//! Static descriptions of the three entity shapes.
//!
//! A [`Shape`] names the scalar fields of one entity collection, the column
//! each field is stored in, and the relationships that hang off it. The
//! predicate compiler resolves identifiers against these field lists and
//! storage backends derive their statements from them, so user-supplied text
//! never names a column directly.

use std::fmt;

use strum::{EnumIter, IntoStaticStr};

// ─── Entity sets ─────────────────────────────────────────────────────────────

/// The closed set of entity collections. Dispatch on this tag replaces any
/// runtime type inspection.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  EnumIter,
  IntoStaticStr,
  strum::Display,
)]
pub enum EntitySet {
  Companies,
  Customers,
  Employees,
}

impl EntitySet {
  pub fn shape(self) -> &'static Shape {
    match self {
      Self::Companies => &COMPANIES,
      Self::Customers => &CUSTOMERS,
      Self::Employees => &EMPLOYEES,
    }
  }
}

// ─── Fields ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
  Integer,
  Text,
}

impl fmt::Display for FieldType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      Self::Integer => f.write_str("integer"),
      Self::Text => f.write_str("text"),
    }
  }
}

/// One scalar field of a shape.
#[derive(Debug, PartialEq, Eq)]
pub struct Field {
  /// Name callers use in predicates (matched case-insensitively).
  pub name:     &'static str,
  /// Storage column.
  pub column:   &'static str,
  pub ty:       FieldType,
  pub nullable: bool,
}

impl Field {
  const fn integer(name: &'static str, column: &'static str) -> Self {
    Self { name, column, ty: FieldType::Integer, nullable: false }
  }

  const fn text(name: &'static str, column: &'static str) -> Self {
    Self { name, column, ty: FieldType::Text, nullable: false }
  }

  const fn optional_text(name: &'static str, column: &'static str) -> Self {
    Self { name, column, ty: FieldType::Text, nullable: true }
  }
}

/// A navigation from one shape to another. Never a scalar, never copied,
/// never addressable from a predicate.
#[derive(Debug, PartialEq, Eq)]
pub struct Relation {
  pub name:        &'static str,
  pub target:      EntitySet,
  /// Name of the foreign-key field on the child side.
  pub foreign_key: &'static str,
}

// ─── Shapes ──────────────────────────────────────────────────────────────────

#[derive(Debug, PartialEq, Eq)]
pub struct Shape {
  pub set:       EntitySet,
  pub table:     &'static str,
  /// Scalar fields; the key field `Id` is always first.
  pub fields:    &'static [Field],
  pub relations: &'static [Relation],
}

impl Shape {
  pub fn key(&'static self) -> &'static Field { &self.fields[0] }

  /// Scalar fields other than the key, in storage order.
  pub fn data_fields(&'static self) -> &'static [Field] { &self.fields[1..] }

  /// Resolve a scalar field by name, ignoring ASCII case.
  pub fn field(&'static self, name: &str) -> Option<&'static Field> {
    self.fields.iter().find(|f| f.name.eq_ignore_ascii_case(name))
  }

  pub fn relation(&'static self, name: &str) -> Option<&'static Relation> {
    self.relations.iter().find(|r| r.name.eq_ignore_ascii_case(name))
  }
}

const ID: Field = Field::integer("Id", "id");

static COMPANIES: Shape = Shape {
  set:       EntitySet::Companies,
  table:     "companies",
  fields:    &[
    ID,
    Field::text("Name", "name"),
    Field::optional_text("Address", "address"),
    Field::optional_text("Description", "description"),
  ],
  relations: &[
    Relation {
      name:        "Customers",
      target:      EntitySet::Customers,
      foreign_key: "CompanyId",
    },
    Relation {
      name:        "Employees",
      target:      EntitySet::Employees,
      foreign_key: "CompanyId",
    },
  ],
};

static CUSTOMERS: Shape = Shape {
  set:       EntitySet::Customers,
  table:     "customers",
  fields:    &[
    ID,
    Field::integer("CompanyId", "company_id"),
    Field::text("Name", "name"),
    Field::text("Email", "email"),
  ],
  relations: &[Relation {
    name:        "Company",
    target:      EntitySet::Companies,
    foreign_key: "CompanyId",
  }],
};

static EMPLOYEES: Shape = Shape {
  set:       EntitySet::Employees,
  table:     "employees",
  fields:    &[
    ID,
    Field::integer("CompanyId", "company_id"),
    Field::text("FirstName", "first_name"),
    Field::text("LastName", "last_name"),
    Field::text("Email", "email"),
  ],
  relations: &[Relation {
    name:        "Company",
    target:      EntitySet::Companies,
    foreign_key: "CompanyId",
  }],
};

// ─── Values ──────────────────────────────────────────────────────────────────

/// A scalar value as exchanged with storage and carried by predicates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Value {
  Null,
  Integer(i64),
  Text(String),
}

impl Value {
  pub fn type_name(&self) -> &'static str {
    match self {
      Self::Null => "null",
      Self::Integer(_) => "integer",
      Self::Text(_) => "text",
    }
  }
}

impl From<i64> for Value {
  fn from(v: i64) -> Self { Self::Integer(v) }
}

impl From<String> for Value {
  fn from(v: String) -> Self { Self::Text(v) }
}

impl From<Option<String>> for Value {
  fn from(v: Option<String>) -> Self { v.map_or(Self::Null, Self::Text) }
}
