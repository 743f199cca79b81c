//! Recursive-descent parser and type checker for predicate token streams.
//!
//! Precedence, loosest first: `or`, `and`, `not`, comparison. Identifiers are
//! resolved against the target shape while parsing, so the output tree never
//! contains an unresolved name.

use crate::shape::{Field, FieldType, Shape, Value};

use super::{
  MAX_DEPTH, PredicateError,
  ast::{CompareOp, Operand, Predicate, TextOp},
  lexer::{Token, TokenKind},
};

type Result<T> = std::result::Result<T, PredicateError>;

/// An operand before we know whether it is compared or stands alone.
enum Term {
  Bool(Predicate),
  Operand(Operand),
}

pub(crate) fn parse(shape: &'static Shape, tokens: &[Token]) -> Result<Predicate> {
  let mut parser = Parser { shape, tokens, pos: 0, depth: 0 };
  let predicate = parser.parse_or()?;
  let trailing = parser.peek();
  if trailing.kind != TokenKind::End {
    return Err(PredicateError::at(
      "unexpected input after end of expression",
      trailing.pos,
    ));
  }
  Ok(predicate)
}

struct Parser<'a> {
  shape:  &'static Shape,
  tokens: &'a [Token],
  pos:    usize,
  depth:  usize,
}

impl Parser<'_> {
  // ── Cursor ──────────────────────────────────────────────────────────────

  fn peek(&self) -> &Token {
    // The lexer always terminates the stream with `End`.
    &self.tokens[self.pos.min(self.tokens.len() - 1)]
  }

  fn peek_at(&self, offset: usize) -> &TokenKind {
    let idx = (self.pos + offset).min(self.tokens.len() - 1);
    &self.tokens[idx].kind
  }

  fn advance(&mut self) -> Token {
    let token = self.peek().clone();
    if token.kind != TokenKind::End {
      self.pos += 1;
    }
    token
  }

  fn expect(&mut self, kind: &TokenKind, what: &str) -> Result<Token> {
    let token = self.advance();
    if &token.kind == kind {
      Ok(token)
    } else {
      Err(PredicateError::at(format!("expected {what}"), token.pos))
    }
  }

  fn enter(&mut self, pos: usize) -> Result<()> {
    self.depth += 1;
    if self.depth > MAX_DEPTH {
      return Err(PredicateError::at(
        format!("expression nested deeper than {MAX_DEPTH} levels"),
        pos,
      ));
    }
    Ok(())
  }

  fn leave(&mut self) { self.depth -= 1; }

  // ── Boolean structure ───────────────────────────────────────────────────

  // Nested `or` inside `or` (and `and` inside `and`) is spliced into one
  // list, so redundant parentheses add no depth to the tree.

  fn parse_or(&mut self) -> Result<Predicate> {
    let mut items = Vec::new();
    loop {
      match self.parse_and()? {
        Predicate::Or(nested) => items.extend(nested),
        other => items.push(other),
      }
      if self.peek().kind != TokenKind::Or {
        break;
      }
      self.advance();
    }
    Ok(if items.len() == 1 { items.remove(0) } else { Predicate::Or(items) })
  }

  fn parse_and(&mut self) -> Result<Predicate> {
    let mut items = Vec::new();
    loop {
      match self.parse_unary()? {
        Predicate::And(nested) => items.extend(nested),
        other => items.push(other),
      }
      if self.peek().kind != TokenKind::And {
        break;
      }
      self.advance();
    }
    Ok(if items.len() == 1 { items.remove(0) } else { Predicate::And(items) })
  }

  fn parse_unary(&mut self) -> Result<Predicate> {
    if self.peek().kind == TokenKind::Not {
      let token = self.advance();
      self.enter(token.pos)?;
      let inner = self.parse_unary()?;
      self.leave();
      return Ok(match inner {
        Predicate::Not(double) => *double,
        other => Predicate::Not(Box::new(other)),
      });
    }
    self.parse_comparison()
  }

  fn parse_comparison(&mut self) -> Result<Predicate> {
    let start = self.peek().pos;
    let term = self.parse_term()?;

    if let Some(op) = compare_op(&self.peek().kind) {
      let op_pos = self.advance().pos;
      let left = into_operand(term, start)?;
      let right_pos = self.peek().pos;
      let right = into_operand(self.parse_term()?, right_pos)?;
      check_compare(&left, op, &right, op_pos)?;
      return Ok(Predicate::Compare { left, op, right });
    }

    if is_keyword(&self.peek().kind, "in") {
      let in_pos = self.advance().pos;
      let field = match term {
        Term::Operand(Operand::Field(field)) => field,
        _ => {
          return Err(PredicateError::at(
            "left side of 'in' must be a field",
            in_pos,
          ));
        }
      };
      let values = self.parse_value_list(field)?;
      return Ok(Predicate::In { field, values });
    }

    match term {
      Term::Bool(predicate) => Ok(predicate),
      Term::Operand(_) => Err(PredicateError::at(
        "expression is not boolean; compare it with an operator",
        start,
      )),
    }
  }

  // ── Terms ───────────────────────────────────────────────────────────────

  fn parse_term(&mut self) -> Result<Term> {
    let token = self.advance();
    match token.kind {
      TokenKind::LParen => {
        self.enter(token.pos)?;
        let inner = self.parse_or()?;
        self.expect(&TokenKind::RParen, "')'")?;
        self.leave();
        Ok(Term::Bool(inner))
      }
      TokenKind::Str(s) => Ok(Term::Operand(Operand::Value(Value::Text(s)))),
      TokenKind::Int(i) => Ok(Term::Operand(Operand::Value(Value::Integer(i)))),
      TokenKind::Ident(name) => self.parse_identifier(&name, token.pos),
      TokenKind::End => Err(PredicateError::at("unexpected end of expression", token.pos)),
      other => Err(PredicateError::at(
        format!("unexpected token {}", describe(&other)),
        token.pos,
      )),
    }
  }

  fn parse_identifier(&mut self, name: &str, pos: usize) -> Result<Term> {
    match name.to_ascii_lowercase().as_str() {
      "true" => return Ok(Term::Bool(Predicate::True)),
      "false" => return Ok(Term::Bool(Predicate::False)),
      "null" => return Ok(Term::Operand(Operand::Value(Value::Null))),
      "in" => return Err(PredicateError::at("unexpected keyword 'in'", pos)),
      _ => {}
    }

    if *self.peek_at(0) == TokenKind::LParen {
      return Err(PredicateError::at(
        format!("function call '{name}' is not allowed"),
        pos,
      ));
    }

    let Some(field) = self.shape.field(name) else {
      if let Some(relation) = self.shape.relation(name) {
        return Err(PredicateError::at(
          format!(
            "'{}' is a relationship of {}, not a scalar field",
            relation.name, self.shape.set
          ),
          pos,
        ));
      }
      return Err(PredicateError::at(
        format!("unknown field '{name}' on {}", self.shape.set),
        pos,
      ));
    };

    if *self.peek_at(0) == TokenKind::Dot {
      return self.parse_method(field);
    }
    Ok(Term::Operand(Operand::Field(field)))
  }

  /// `Field.Method("literal")`; text methods only.
  fn parse_method(&mut self, field: &'static Field) -> Result<Term> {
    self.advance();
    let token = self.advance();
    let TokenKind::Ident(method) = token.kind else {
      return Err(PredicateError::at("expected method name after '.'", token.pos));
    };
    let op = match method.to_ascii_lowercase().as_str() {
      "contains" => TextOp::Contains,
      "startswith" => TextOp::StartsWith,
      "endswith" => TextOp::EndsWith,
      _ => {
        return Err(PredicateError::at(
          format!("method '{method}' is not allowed"),
          token.pos,
        ));
      }
    };
    if field.ty != FieldType::Text {
      return Err(PredicateError::at(
        format!("'{method}' requires a text field, '{}' is {}", field.name, field.ty),
        token.pos,
      ));
    }

    self.expect(&TokenKind::LParen, "'(' after method name")?;
    let arg = self.advance();
    let TokenKind::Str(pattern) = arg.kind else {
      return Err(PredicateError::at(
        format!("'{method}' takes a single string literal"),
        arg.pos,
      ));
    };
    self.expect(&TokenKind::RParen, "')' after method argument")?;
    Ok(Term::Bool(Predicate::Text { field, op, pattern }))
  }

  fn parse_value_list(&mut self, field: &'static Field) -> Result<Vec<Value>> {
    self.expect(&TokenKind::LParen, "'(' after 'in'")?;
    let mut values = Vec::new();
    loop {
      let token = self.advance();
      let value = match token.kind {
        TokenKind::Int(i) if field.ty == FieldType::Integer => Value::Integer(i),
        TokenKind::Str(s) if field.ty == FieldType::Text => Value::Text(s),
        _ => {
          return Err(PredicateError::at(
            format!("expected {} literal in list for '{}'", field.ty, field.name),
            token.pos,
          ));
        }
      };
      values.push(value);

      let sep = self.advance();
      match sep.kind {
        TokenKind::Comma => {}
        TokenKind::RParen => return Ok(values),
        _ => return Err(PredicateError::at("expected ',' or ')'", sep.pos)),
      }
    }
  }
}

// ─── Helpers ─────────────────────────────────────────────────────────────────

fn compare_op(kind: &TokenKind) -> Option<CompareOp> {
  match kind {
    TokenKind::Eq => Some(CompareOp::Eq),
    TokenKind::Ne => Some(CompareOp::Ne),
    TokenKind::Lt => Some(CompareOp::Lt),
    TokenKind::Lte => Some(CompareOp::Lte),
    TokenKind::Gt => Some(CompareOp::Gt),
    TokenKind::Gte => Some(CompareOp::Gte),
    _ => None,
  }
}

fn is_keyword(kind: &TokenKind, word: &str) -> bool {
  matches!(kind, TokenKind::Ident(name) if name.eq_ignore_ascii_case(word))
}

fn into_operand(term: Term, pos: usize) -> Result<Operand> {
  match term {
    Term::Operand(operand) => Ok(operand),
    Term::Bool(_) => Err(PredicateError::at(
      "boolean expressions cannot be compared",
      pos,
    )),
  }
}

/// `None` stands for the `null` literal.
fn operand_type(operand: &Operand) -> Option<FieldType> {
  match operand {
    Operand::Field(field) => Some(field.ty),
    Operand::Value(Value::Integer(_)) => Some(FieldType::Integer),
    Operand::Value(Value::Text(_)) => Some(FieldType::Text),
    Operand::Value(Value::Null) => None,
  }
}

fn check_compare(
  left: &Operand,
  op: CompareOp,
  right: &Operand,
  pos: usize,
) -> Result<()> {
  match (operand_type(left), operand_type(right)) {
    (None, None) => Err(PredicateError::at("cannot compare null with null", pos)),
    (None, _) | (_, None) => {
      if matches!(op, CompareOp::Eq | CompareOp::Ne) {
        Ok(())
      } else {
        Err(PredicateError::at("null can only be compared with == or !=", pos))
      }
    }
    (Some(l), Some(r)) if l == r => Ok(()),
    (Some(l), Some(r)) => {
      Err(PredicateError::at(format!("cannot compare {l} with {r}"), pos))
    }
  }
}

fn describe(kind: &TokenKind) -> String {
  match kind {
    TokenKind::Ident(name) => format!("'{name}'"),
    TokenKind::Str(_) => "string literal".to_owned(),
    TokenKind::Int(i) => format!("'{i}'"),
    TokenKind::LParen => "'('".to_owned(),
    TokenKind::RParen => "')'".to_owned(),
    TokenKind::Comma => "','".to_owned(),
    TokenKind::Dot => "'.'".to_owned(),
    TokenKind::Eq => "'=='".to_owned(),
    TokenKind::Ne => "'!='".to_owned(),
    TokenKind::Lt => "'<'".to_owned(),
    TokenKind::Lte => "'<='".to_owned(),
    TokenKind::Gt => "'>'".to_owned(),
    TokenKind::Gte => "'>='".to_owned(),
    TokenKind::And => "'and'".to_owned(),
    TokenKind::Or => "'or'".to_owned(),
    TokenKind::Not => "'not'".to_owned(),
    TokenKind::End => "end of expression".to_owned(),
  }
}
