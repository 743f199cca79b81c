//! JSON Patch (RFC 6902) over typed wire models.
//!
//! The model is serialized to a [`serde_json::Value`], the operations are
//! applied in order, and the result is deserialized back. Object members
//! are matched case-insensitively and must already exist: a model has a
//! fixed property set, so `add` on an object member behaves like `replace`
//! and `remove` resets the member to its default value.

use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::{Map, Value};
use thiserror::Error;

/// One step of a patch document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatchOperation {
  pub op:    String,
  pub path:  String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub from:  Option<String>,
  /// Missing values are treated as `null`.
  #[serde(default)]
  pub value: Value,
}

#[derive(Debug, Error)]
pub enum PatchError {
  #[error("unknown patch operation '{0}'")]
  UnknownOp(String),

  #[error("invalid JSON pointer '{0}'")]
  InvalidPointer(String),

  #[error("path '{0}' does not exist on the model")]
  NoSuchPath(String),

  #[error("'{0}' operation requires a 'from' path")]
  MissingFrom(&'static str),

  #[error("cannot move '{from}' into its own child '{path}'")]
  MoveIntoChild { from: String, path: String },

  #[error("test failed: value at '{0}' does not match")]
  TestFailed(String),

  #[error("patched document is not a valid model: {0}")]
  InvalidResult(#[source] serde_json::Error),
}

type Result<T, E = PatchError> = std::result::Result<T, E>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Op {
  Add,
  Remove,
  Replace,
  Move,
  Copy,
  Test,
}

impl Op {
  fn parse(op: &str) -> Result<Self> {
    match op.to_ascii_lowercase().as_str() {
      "add" => Ok(Self::Add),
      "remove" => Ok(Self::Remove),
      "replace" => Ok(Self::Replace),
      "move" => Ok(Self::Move),
      "copy" => Ok(Self::Copy),
      "test" => Ok(Self::Test),
      _ => Err(PatchError::UnknownOp(op.to_owned())),
    }
  }
}

/// Apply `ops` to a copy of `model`, returning the patched model.
pub fn apply<M>(model: &M, ops: &[PatchOperation]) -> Result<M>
where
  M: Serialize + DeserializeOwned + Default,
{
  let mut doc = serde_json::to_value(model).map_err(PatchError::InvalidResult)?;
  let defaults =
    serde_json::to_value(M::default()).map_err(PatchError::InvalidResult)?;

  let mut patcher = Patcher { doc: &mut doc, defaults: &defaults };
  for op in ops {
    patcher.apply(op)?;
  }
  serde_json::from_value(doc).map_err(PatchError::InvalidResult)
}

// ─── Pointers ────────────────────────────────────────────────────────────────

/// Split a JSON pointer into unescaped reference tokens. The whole-document
/// pointer `""` is rejected: only properties of a model can be patched.
fn parse_pointer(path: &str) -> Result<Vec<String>> {
  let Some(rest) = path.strip_prefix('/') else {
    return Err(PatchError::InvalidPointer(path.to_owned()));
  };
  rest
    .split('/')
    .map(|token| {
      let mut out = String::with_capacity(token.len());
      let mut chars = token.chars();
      while let Some(c) = chars.next() {
        if c != '~' {
          out.push(c);
          continue;
        }
        match chars.next() {
          Some('0') => out.push('~'),
          Some('1') => out.push('/'),
          _ => return Err(PatchError::InvalidPointer(path.to_owned())),
        }
      }
      Ok(out)
    })
    .collect()
}

/// Exact match first, then ASCII case-insensitive.
fn member_key(map: &Map<String, Value>, token: &str) -> Option<String> {
  if map.contains_key(token) {
    return Some(token.to_owned());
  }
  map.keys().find(|k| k.eq_ignore_ascii_case(token)).cloned()
}

/// Array index token: digits only, no leading zeros.
fn array_index(token: &str) -> Option<usize> {
  let well_formed = !token.is_empty()
    && token.bytes().all(|b| b.is_ascii_digit())
    && (token == "0" || !token.starts_with('0'));
  if well_formed { token.parse().ok() } else { None }
}

fn lookup<'v>(mut node: &'v Value, tokens: &[String]) -> Option<&'v Value> {
  for token in tokens {
    node = match node {
      Value::Object(map) => map.get(&member_key(map, token)?)?,
      Value::Array(items) => items.get(array_index(token)?)?,
      _ => return None,
    };
  }
  Some(node)
}

fn lookup_mut<'v>(mut node: &'v mut Value, tokens: &[String]) -> Option<&'v mut Value> {
  for token in tokens {
    node = match node {
      Value::Object(map) => {
        let key = member_key(map, token)?;
        map.get_mut(&key)?
      }
      Value::Array(items) => items.get_mut(array_index(token)?)?,
      _ => return None,
    };
  }
  Some(node)
}

// ─── Operations ──────────────────────────────────────────────────────────────

struct Patcher<'a> {
  doc:      &'a mut Value,
  defaults: &'a Value,
}

impl Patcher<'_> {
  fn apply(&mut self, op: &PatchOperation) -> Result<()> {
    let kind = Op::parse(&op.op)?;
    let path = op.path.as_str();
    let tokens = parse_pointer(path)?;

    match kind {
      Op::Add => self.add(&tokens, path, op.value.clone()),
      Op::Replace => self.replace(&tokens, path, op.value.clone()),
      Op::Remove => self.remove(&tokens, path).map(drop),
      Op::Test => {
        let current = lookup(self.doc, &tokens)
          .ok_or_else(|| PatchError::NoSuchPath(path.to_owned()))?;
        if *current == op.value {
          Ok(())
        } else {
          Err(PatchError::TestFailed(path.to_owned()))
        }
      }
      Op::Copy => {
        let from = op.from.as_deref().ok_or(PatchError::MissingFrom("copy"))?;
        let from_tokens = parse_pointer(from)?;
        let value = lookup(self.doc, &from_tokens)
          .ok_or_else(|| PatchError::NoSuchPath(from.to_owned()))?
          .clone();
        self.add(&tokens, path, value)
      }
      Op::Move => {
        let from = op.from.as_deref().ok_or(PatchError::MissingFrom("move"))?;
        let from_tokens = parse_pointer(from)?;
        if tokens.len() > from_tokens.len() && tokens.starts_with(&from_tokens) {
          return Err(PatchError::MoveIntoChild {
            from: from.to_owned(),
            path: path.to_owned(),
          });
        }
        let value = self.remove(&from_tokens, from)?;
        self.add(&tokens, path, value)
      }
    }
  }

  /// Resolve the container holding the last token of `tokens`.
  fn parent<'t>(&mut self, tokens: &'t [String], path: &str) -> Result<(&mut Value, &'t str)> {
    let (last, parent) = tokens
      .split_last()
      .ok_or_else(|| PatchError::InvalidPointer(path.to_owned()))?;
    let node = lookup_mut(self.doc, parent)
      .ok_or_else(|| PatchError::NoSuchPath(path.to_owned()))?;
    Ok((node, last.as_str()))
  }

  fn add(&mut self, tokens: &[String], path: &str, value: Value) -> Result<()> {
    let missing = || PatchError::NoSuchPath(path.to_owned());
    match self.parent(tokens, path)? {
      (Value::Object(map), token) => {
        let key = member_key(map, token).ok_or_else(missing)?;
        map.insert(key, value);
      }
      (Value::Array(items), "-") => items.push(value),
      (Value::Array(items), token) => {
        let idx = array_index(token)
          .filter(|i| *i <= items.len())
          .ok_or_else(missing)?;
        items.insert(idx, value);
      }
      _ => return Err(missing()),
    }
    Ok(())
  }

  fn replace(&mut self, tokens: &[String], path: &str, value: Value) -> Result<()> {
    let target = lookup_mut(self.doc, tokens)
      .ok_or_else(|| PatchError::NoSuchPath(path.to_owned()))?;
    *target = value;
    Ok(())
  }

  /// Remove and return the value at `tokens`. Model properties are reset to
  /// their default rather than dropped, so later operations can still
  /// address them.
  fn remove(&mut self, tokens: &[String], path: &str) -> Result<Value> {
    let missing = || PatchError::NoSuchPath(path.to_owned());
    let default = lookup(self.defaults, tokens).cloned();

    match self.parent(tokens, path)? {
      (Value::Object(map), token) => {
        let key = member_key(map, token).ok_or_else(missing)?;
        match default {
          Some(default) => {
            let slot = map.get_mut(&key).ok_or_else(missing)?;
            Ok(std::mem::replace(slot, default))
          }
          None => map.remove(&key).ok_or_else(missing),
        }
      }
      (Value::Array(items), token) => {
        let idx = array_index(token)
          .filter(|i| *i < items.len())
          .ok_or_else(missing)?;
        Ok(items.remove(idx))
      }
      _ => Err(missing()),
    }
  }
}

#[cfg(test)]
mod tests {
  use cm_core::model::{Company, Customer};
  use serde_json::json;

  use super::*;

  fn ops(value: Value) -> Vec<PatchOperation> { serde_json::from_value(value).unwrap() }

  fn acme() -> Company {
    Company {
      id:          1,
      name:        "Acme".into(),
      address:     Some("1 Main St".into()),
      description: None,
      customers:   vec![Customer { id: 7, name: "Wile".into(), ..Default::default() }],
    }
  }

  #[test]
  fn replace_is_case_insensitive() {
    let patched = apply(
      &acme(),
      &ops(json!([{ "op": "replace", "path": "/NAME", "value": "Acme Corp" }])),
    )
    .unwrap();
    assert_eq!(patched.name, "Acme Corp");
    assert_eq!(patched.address.as_deref(), Some("1 Main St"));
  }

  #[test]
  fn remove_resets_to_default_and_stays_addressable() {
    let patched = apply(
      &acme(),
      &ops(json!([
        { "op": "remove", "path": "/address" },
        { "op": "test", "path": "/address", "value": null },
        { "op": "add", "path": "/description", "value": "Anvils" },
      ])),
    )
    .unwrap();
    assert_eq!(patched.address, None);
    assert_eq!(patched.description.as_deref(), Some("Anvils"));
  }

  #[test]
  fn move_and_copy() {
    let patched = apply(
      &acme(),
      &ops(json!([
        { "op": "copy", "from": "/name", "path": "/description" },
        { "op": "move", "from": "/address", "path": "/name" },
      ])),
    )
    .unwrap();
    assert_eq!(patched.description.as_deref(), Some("Acme"));
    assert_eq!(patched.name, "1 Main St");
    assert_eq!(patched.address, None);
  }

  #[test]
  fn array_members() {
    let patched = apply(
      &acme(),
      &ops(json!([
        { "op": "add", "path": "/customers/-", "value": { "id": 8, "name": "Road" } },
        { "op": "replace", "path": "/customers/0/name", "value": "Coyote" },
      ])),
    )
    .unwrap();
    assert_eq!(patched.customers.len(), 2);
    assert_eq!(patched.customers[0].name, "Coyote");
    assert_eq!(patched.customers[1].id, 8);
  }

  #[test]
  fn unknown_property_is_rejected() {
    let err = apply(
      &acme(),
      &ops(json!([{ "op": "add", "path": "/nickname", "value": "A" }])),
    )
    .unwrap_err();
    assert!(matches!(err, PatchError::NoSuchPath(_)), "{err}");
  }

  #[test]
  fn failed_test_aborts() {
    let err = apply(
      &acme(),
      &ops(json!([{ "op": "test", "path": "/name", "value": "Globex" }])),
    )
    .unwrap_err();
    assert!(matches!(err, PatchError::TestFailed(_)), "{err}");
  }

  #[test]
  fn type_errors_surface_after_patching() {
    let err = apply(
      &acme(),
      &ops(json!([{ "op": "replace", "path": "/id", "value": "seven" }])),
    )
    .unwrap_err();
    assert!(matches!(err, PatchError::InvalidResult(_)), "{err}");
  }

  #[test]
  fn malformed_operations() {
    let bad = |value: Value| apply(&acme(), &ops(value)).unwrap_err();
    assert!(matches!(
      bad(json!([{ "op": "frobnicate", "path": "/name" }])),
      PatchError::UnknownOp(_)
    ));
    assert!(matches!(
      bad(json!([{ "op": "replace", "path": "name", "value": 1 }])),
      PatchError::InvalidPointer(_)
    ));
    assert!(matches!(
      bad(json!([{ "op": "replace", "path": "", "value": {} }])),
      PatchError::InvalidPointer(_)
    ));
    assert!(matches!(
      bad(json!([{ "op": "move", "path": "/name" }])),
      PatchError::MissingFrom("move")
    ));
    assert!(matches!(
      bad(json!([{ "op": "move", "from": "/customers", "path": "/customers/0" }])),
      PatchError::MoveIntoChild { .. }
    ));
  }

  #[test]
  fn pointer_escapes() {
    assert_eq!(parse_pointer("/a~1b/c~0d").unwrap(), ["a/b", "c~d"]);
    assert!(parse_pointer("/a~2").is_err());
    assert_eq!(array_index("01"), None);
    assert_eq!(array_index("10"), Some(10));
  }
}
