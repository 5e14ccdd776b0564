use tracing::debug;

use crate::render::{FieldValue, Record};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
enum ScanError {
    #[error("expected field name at byte {0}")]
    ExpectedField(usize),
    #[error("expected `=` after `{field}` at byte {at}")]
    ExpectedEquals { field: String, at: usize },
    #[error("expected `,` or `)` at byte {0}")]
    ExpectedSeparator(usize),
    #[error("empty value at byte {0}")]
    EmptyValue(usize),
    #[error("unterminated {0}")]
    Unterminated(&'static str),
}

struct Cursor<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.src[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn is_eof(&self) -> bool {
        self.pos >= self.src.len()
    }

    fn skip_ws(&mut self) {
        while self.peek().is_some_and(char::is_whitespace) {
            self.bump();
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.pos += expected.len_utf8();
            true
        } else {
            false
        }
    }

    fn eat_str(&mut self, expected: &str) -> bool {
        if self.rest().starts_with(expected) {
            self.pos += expected.len();
            true
        } else {
            false
        }
    }

    /// Moves to the next occurrence of `needle` without consuming it.
    fn seek(&mut self, needle: &str) -> bool {
        match self.rest().find(needle) {
            Some(offset) => {
                self.pos += offset;
                true
            }
            None => {
                self.pos = self.src.len();
                false
            }
        }
    }

    fn identifier(&mut self) -> Option<&'a str> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {
                self.bump();
            }
            _ => return None,
        }
        while self
            .peek()
            .is_some_and(|c| c.is_ascii_alphanumeric() || c == '_')
        {
            self.bump();
        }
        Some(&self.src[start..self.pos])
    }
}

/// Decodes every `tag(...)` block of a `[tag(...), ...]` literal.
///
/// Returns `None` when the trimmed input does not carry the envelope.
/// Blocks that fail to scan, and blocks with no fields, are dropped.
pub(crate) fn parse_literal(input: &str, tag: &str) -> Option<Vec<Record>> {
    let trimmed = input.trim();
    let block_open = format!("{tag}(");
    if !trimmed.starts_with('[')
        || !trimmed[1..].starts_with(&block_open)
        || !trimmed.ends_with(")]")
    {
        return None;
    }

    let body = &trimmed[1..trimmed.len() - 1];
    let mut cursor = Cursor::new(body);
    let mut records = Vec::new();
    loop {
        cursor.skip_ws();
        if cursor.is_eof() {
            break;
        }
        if !cursor.eat_str(&block_open) {
            if !cursor.seek(&block_open) {
                break;
            }
            continue;
        }
        match parse_fields(&mut cursor) {
            Ok(record) if !record.is_empty() => records.push(record),
            Ok(_) => {}
            Err(err) => {
                debug!(tag, error = %err, "skipping malformed literal block");
                if !cursor.seek(&block_open) {
                    break;
                }
                continue;
            }
        }
        cursor.skip_ws();
        cursor.eat(',');
    }
    Some(records)
}

fn parse_fields(cursor: &mut Cursor<'_>) -> Result<Record, ScanError> {
    let mut record = Record::new();
    loop {
        cursor.skip_ws();
        if cursor.eat(')') {
            return Ok(record);
        }
        if cursor.is_eof() {
            return Err(ScanError::Unterminated("block"));
        }
        let key = cursor
            .identifier()
            .ok_or(ScanError::ExpectedField(cursor.pos))?;
        cursor.skip_ws();
        if !cursor.eat('=') {
            return Err(ScanError::ExpectedEquals {
                field: key.to_string(),
                at: cursor.pos,
            });
        }
        cursor.skip_ws();
        let value = parse_value(cursor)?;
        record.insert(key, value);
        cursor.skip_ws();
        if cursor.eat(',') {
            continue;
        }
        if cursor.eat(')') {
            return Ok(record);
        }
        return Err(ScanError::ExpectedSeparator(cursor.pos));
    }
}

fn parse_value(cursor: &mut Cursor<'_>) -> Result<FieldValue, ScanError> {
    match cursor.peek() {
        Some(q @ ('\'' | '"')) => {
            cursor.bump();
            Ok(FieldValue::Text(parse_quoted(cursor, q)?))
        }
        Some('[') => {
            cursor.bump();
            Ok(FieldValue::List(parse_list(cursor)?))
        }
        Some(_) => parse_bare(cursor).map(FieldValue::Scalar),
        None => Err(ScanError::Unterminated("block")),
    }
}

/// Reads a quoted string whose opening quote was already consumed.
fn parse_quoted(cursor: &mut Cursor<'_>, quote: char) -> Result<String, ScanError> {
    let mut out = String::new();
    loop {
        match cursor.bump() {
            None => return Err(ScanError::Unterminated("string")),
            Some(c) if c == quote => return Ok(out),
            Some('\\') => match cursor.bump() {
                None => return Err(ScanError::Unterminated("string")),
                Some(c) if c == quote || c == '\\' => out.push(c),
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some(other) => {
                    out.push('\\');
                    out.push(other);
                }
            },
            Some(c) => out.push(c),
        }
    }
}

/// Reads list items after the opening `[`.
fn parse_list(cursor: &mut Cursor<'_>) -> Result<Vec<String>, ScanError> {
    let mut items = Vec::new();
    loop {
        cursor.skip_ws();
        match cursor.peek() {
            None => return Err(ScanError::Unterminated("list")),
            Some(']') => {
                cursor.bump();
                return Ok(items);
            }
            Some(q @ ('\'' | '"')) => {
                cursor.bump();
                let item = parse_quoted(cursor, q)?;
                if let Some(item) = super::clean_item(&item) {
                    items.push(item);
                }
            }
            Some(_) => {
                let start = cursor.pos;
                while cursor.peek().is_some_and(|c| c != ',' && c != ']') {
                    cursor.bump();
                }
                if let Some(item) = super::clean_item(&cursor.src[start..cursor.pos]) {
                    items.push(item);
                }
            }
        }
        cursor.skip_ws();
        if cursor.eat(',') {
            continue;
        }
        if cursor.eat(']') {
            return Ok(items);
        }
        if cursor.is_eof() {
            return Err(ScanError::Unterminated("list"));
        }
        return Err(ScanError::ExpectedSeparator(cursor.pos));
    }
}

/// Reads a bare token up to the next top-level `,` or `)`.
///
/// Nested parentheses and brackets are skipped so values such as
/// `date(2025, 1, 1)` stay whole.
fn parse_bare(cursor: &mut Cursor<'_>) -> Result<String, ScanError> {
    let start = cursor.pos;
    let mut depth = 0_usize;
    loop {
        match cursor.peek() {
            None => return Err(ScanError::Unterminated("block")),
            Some(',' | ')') if depth == 0 => break,
            Some('(' | '[') => depth += 1,
            Some(')' | ']') => depth = depth.saturating_sub(1),
            Some(_) => {}
        }
        cursor.bump();
    }
    let token = cursor.src[start..cursor.pos].trim();
    if token.is_empty() {
        return Err(ScanError::EmptyValue(start));
    }
    Ok(token.to_string())
}
