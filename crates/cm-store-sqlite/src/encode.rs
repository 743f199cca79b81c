//! Conversions between [`cm_core::shape::Value`] and SQLite values.

use cm_core::{
  Error as CoreError,
  shape::{EntitySet, Value},
};
use rusqlite::types::Value as SqlValue;

pub fn encode_value(value: &Value) -> SqlValue {
  match value {
    Value::Null => SqlValue::Null,
    Value::Integer(i) => SqlValue::Integer(*i),
    Value::Text(s) => SqlValue::Text(s.clone()),
  }
}

/// SQLite may hand back REAL or BLOB for a column written by another
/// client; neither has a place in any shape.
pub fn decode_value(set: EntitySet, value: SqlValue) -> Result<Value, CoreError> {
  match value {
    SqlValue::Null => Ok(Value::Null),
    SqlValue::Integer(i) => Ok(Value::Integer(i)),
    SqlValue::Text(s) => Ok(Value::Text(s)),
    SqlValue::Real(_) => Err(CoreError::Decode {
      set,
      message: "unexpected REAL column".to_owned(),
    }),
    SqlValue::Blob(_) => Err(CoreError::Decode {
      set,
      message: "unexpected BLOB column".to_owned(),
    }),
  }
}
