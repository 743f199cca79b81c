//! Statement text for each shape and lowering of compiled predicates.
//!
//! Identifiers are taken from the static [`Shape`] tables; every literal
//! becomes a positional `?` parameter.

use cm_core::{
  predicate::{CompareOp, Operand, Predicate, TextOp},
  shape::{Field, Shape},
};
use rusqlite::types::Value as SqlValue;

use crate::encode::encode_value;

/// Statement text plus its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Sql {
  pub text:   String,
  pub params: Vec<SqlValue>,
}

fn column_list(shape: &'static Shape) -> String {
  shape
    .fields
    .iter()
    .map(|f| f.column)
    .collect::<Vec<_>>()
    .join(", ")
}

// ─── Reads ───────────────────────────────────────────────────────────────────

pub fn select(
  shape: &'static Shape,
  predicate: Option<&Predicate>,
  limit: Option<usize>,
) -> Sql {
  let mut lower = Lowering::default();
  let mut text = format!("SELECT {} FROM {}", column_list(shape), shape.table);

  if let Some(predicate) = predicate {
    text.push_str(" WHERE ");
    lower.predicate(predicate);
    text.push_str(&lower.sql);
  }
  text.push_str(" ORDER BY id");
  if let Some(limit) = limit {
    text.push_str(" LIMIT ?");
    lower.params.push(SqlValue::Integer(i64::try_from(limit).unwrap_or(i64::MAX)));
  }

  Sql { text, params: lower.params }
}

pub fn select_by_id(shape: &'static Shape, id: i64) -> Sql {
  Sql {
    text:   format!("SELECT {} FROM {} WHERE id = ?", column_list(shape), shape.table),
    params: vec![SqlValue::Integer(id)],
  }
}

// ─── Writes ──────────────────────────────────────────────────────────────────
//
// Parameters bind in `data_fields` order; `update` and `delete` take the id
// last.

pub fn insert(shape: &'static Shape) -> String {
  let fields = shape.data_fields();
  let columns: Vec<_> = fields.iter().map(|f| f.column).collect();
  let slots = vec!["?"; fields.len()].join(", ");
  format!("INSERT INTO {} ({}) VALUES ({slots})", shape.table, columns.join(", "))
}

pub fn update(shape: &'static Shape) -> String {
  let assignments: Vec<_> = shape
    .data_fields()
    .iter()
    .map(|f| format!("{} = ?", f.column))
    .collect();
  format!("UPDATE {} SET {} WHERE id = ?", shape.table, assignments.join(", "))
}

pub fn delete(shape: &'static Shape) -> String {
  format!("DELETE FROM {} WHERE id = ?", shape.table)
}

// ─── Predicate lowering ──────────────────────────────────────────────────────

/// Every lowered node evaluates to exactly 0 or 1, never NULL, so `NOT`
/// keeps two-valued semantics.
#[derive(Default)]
struct Lowering {
  sql:    String,
  params: Vec<SqlValue>,
}

impl Lowering {
  fn predicate(&mut self, predicate: &Predicate) {
    match predicate {
      Predicate::True => self.sql.push('1'),
      Predicate::False => self.sql.push('0'),
      Predicate::And(items) => self.join(items, " AND "),
      Predicate::Or(items) => self.join(items, " OR "),
      Predicate::Not(inner) if matches!(**inner, Predicate::And(_) | Predicate::Or(_)) => {
        self.sql.push_str("NOT ");
        self.predicate(inner);
      }
      Predicate::Not(inner) => {
        self.sql.push_str("NOT (");
        self.predicate(inner);
        self.sql.push(')');
      }
      Predicate::Compare { left, op, right } => self.compare(left, *op, right),
      Predicate::Text { field, op, pattern } => self.text(field, *op, pattern),
      Predicate::In { field, values } => {
        self.sql.push_str("COALESCE(");
        self.sql.push_str(field.column);
        self.sql.push_str(" IN (");
        for (i, value) in values.iter().enumerate() {
          if i > 0 {
            self.sql.push_str(", ");
          }
          self.bind(encode_value(value));
        }
        self.sql.push_str("), 0)");
      }
    }
  }

  fn join(&mut self, items: &[Predicate], sep: &str) {
    self.sql.push('(');
    for (i, item) in items.iter().enumerate() {
      if i > 0 {
        self.sql.push_str(sep);
      }
      self.predicate(item);
    }
    self.sql.push(')');
  }

  fn compare(&mut self, left: &Operand, op: CompareOp, right: &Operand) {
    let (symbol, null_safe) = match op {
      CompareOp::Eq => ("IS", true),
      CompareOp::Ne => ("IS NOT", true),
      CompareOp::Lt => ("<", false),
      CompareOp::Lte => ("<=", false),
      CompareOp::Gt => (">", false),
      CompareOp::Gte => (">=", false),
    };

    if !null_safe {
      self.sql.push_str("COALESCE(");
    }
    self.operand(left);
    self.sql.push(' ');
    self.sql.push_str(symbol);
    self.sql.push(' ');
    self.operand(right);
    if !null_safe {
      self.sql.push_str(", 0)");
    }
  }

  fn text(&mut self, field: &Field, op: TextOp, pattern: &str) {
    let column = field.column;
    if pattern.is_empty() {
      self.sql.push_str(&format!("({column} IS NOT NULL)"));
      return;
    }

    let pattern = SqlValue::Text(pattern.to_owned());
    match op {
      TextOp::Contains => {
        self.sql.push_str(&format!("COALESCE(instr({column}, "));
        self.bind(pattern);
        self.sql.push_str(") > 0, 0)");
      }
      TextOp::StartsWith => {
        self.sql.push_str(&format!("COALESCE(substr({column}, 1, length("));
        self.bind(pattern.clone());
        self.sql.push_str(")) = ");
        self.bind(pattern);
        self.sql.push_str(", 0)");
      }
      TextOp::EndsWith => {
        self.sql.push_str(&format!("COALESCE(substr({column}, -length("));
        self.bind(pattern.clone());
        self.sql.push_str(")) = ");
        self.bind(pattern);
        self.sql.push_str(", 0)");
      }
    }
  }

  fn operand(&mut self, operand: &Operand) {
    match operand {
      Operand::Field(field) => self.sql.push_str(field.column),
      Operand::Value(value) => self.bind(encode_value(value)),
    }
  }

  fn bind(&mut self, value: SqlValue) {
    self.sql.push('?');
    self.params.push(value);
  }
}
