//! Tokenizer for predicate text.
//!
//! Anything outside the small token set below is rejected here, before the
//! parser ever runs: statement separators, arithmetic, braces, assignment
//! chains and the like never make it into a token stream.

use super::PredicateError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum TokenKind {
  Ident(String),
  Str(String),
  Int(i64),
  LParen,
  RParen,
  Comma,
  Dot,
  Eq,
  Ne,
  Lt,
  Lte,
  Gt,
  Gte,
  And,
  Or,
  Not,
  End,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Token {
  pub kind: TokenKind,
  /// Character offset of the token's first character.
  pub pos:  usize,
}

pub(crate) fn tokenize(input: &str) -> Result<Vec<Token>, PredicateError> {
  let chars: Vec<char> = input.chars().collect();
  let mut tokens = Vec::new();
  let mut i = 0usize;

  while i < chars.len() {
    let c = chars[i];
    let pos = i;
    let next = chars.get(i + 1).copied();

    let (kind, width) = match c {
      c if c.is_whitespace() => {
        i += 1;
        continue;
      }
      '(' => (TokenKind::LParen, 1),
      ')' => (TokenKind::RParen, 1),
      ',' => (TokenKind::Comma, 1),
      '.' => (TokenKind::Dot, 1),
      '=' if next == Some('=') => (TokenKind::Eq, 2),
      '=' => (TokenKind::Eq, 1),
      '!' if next == Some('=') => (TokenKind::Ne, 2),
      '!' => (TokenKind::Not, 1),
      '<' if next == Some('=') => (TokenKind::Lte, 2),
      '<' if next == Some('>') => (TokenKind::Ne, 2),
      '<' => (TokenKind::Lt, 1),
      '>' if next == Some('=') => (TokenKind::Gte, 2),
      '>' => (TokenKind::Gt, 1),
      '&' if next == Some('&') => (TokenKind::And, 2),
      '|' if next == Some('|') => (TokenKind::Or, 2),
      '"' | '\'' => {
        let (value, end) = lex_string(&chars, i)?;
        (TokenKind::Str(value), end - i)
      }
      c if c.is_ascii_digit()
        || (c == '-' && next.is_some_and(|n| n.is_ascii_digit())) =>
      {
        let (value, end) = lex_integer(&chars, i)?;
        (TokenKind::Int(value), end - i)
      }
      c if c.is_alphabetic() || c == '_' => {
        let end = scan_while(&chars, i, |c| c.is_alphanumeric() || c == '_');
        let word: String = chars[i..end].iter().collect();
        let kind = match word.to_ascii_lowercase().as_str() {
          "and" => TokenKind::And,
          "or" => TokenKind::Or,
          "not" => TokenKind::Not,
          _ => TokenKind::Ident(word),
        };
        (kind, end - i)
      }
      other => {
        return Err(PredicateError::at(
          format!("unexpected character {other:?}"),
          pos,
        ));
      }
    };

    tokens.push(Token { kind, pos });
    i += width;
  }

  tokens.push(Token { kind: TokenKind::End, pos: chars.len() });
  Ok(tokens)
}

fn scan_while(chars: &[char], start: usize, pred: impl Fn(char) -> bool) -> usize {
  let mut end = start;
  while end < chars.len() && pred(chars[end]) {
    end += 1;
  }
  end
}

/// Lex a quoted string starting at the opening quote. Returns the unescaped
/// value and the index just past the closing quote.
fn lex_string(chars: &[char], start: usize) -> Result<(String, usize), PredicateError> {
  let quote = chars[start];
  let mut value = String::new();
  let mut i = start + 1;

  while i < chars.len() {
    match chars[i] {
      '\\' => {
        let escaped = match chars.get(i + 1) {
          Some('"') => '"',
          Some('\'') => '\'',
          Some('\\') => '\\',
          Some('n') => '\n',
          Some('t') => '\t',
          Some(other) => {
            return Err(PredicateError::at(
              format!("unknown escape sequence \\{other}"),
              i,
            ));
          }
          None => break,
        };
        value.push(escaped);
        i += 2;
      }
      c if c == quote => return Ok((value, i + 1)),
      c => {
        value.push(c);
        i += 1;
      }
    }
  }

  Err(PredicateError::at("unterminated string literal", start))
}

fn lex_integer(chars: &[char], start: usize) -> Result<(i64, usize), PredicateError> {
  let digits_from = if chars[start] == '-' { start + 1 } else { start };
  let end = scan_while(chars, digits_from, |c| c.is_ascii_digit());

  if chars
    .get(end)
    .is_some_and(|c| c.is_alphanumeric() || *c == '_' || *c == '.')
  {
    return Err(PredicateError::at("invalid number literal", start));
  }

  let text: String = chars[start..end].iter().collect();
  let value = text
    .parse::<i64>()
    .map_err(|_| PredicateError::at("integer literal out of range", start))?;
  Ok((value, end))
}
