//! Hand-written scanner for the test_decoding line grammar
//!
//! ```text
//! line      := "table" WS qualified ":" WS op ":" body
//! qualified := ident "." ident
//! body      := (WS "(no-tuple-data)")
//!            | (WS "old-key:" columns)? (WS "new-tuple:")? columns
//! column    := name "[" typename "]" ":" value
//! ```
//!
//! A value runs until the whitespace that precedes the next `name[` token, a
//! section marker, or the end of the line. Text that cannot be read as a
//! column is reported as [`BodyToken::Unreadable`] and skipped up to the next
//! complete `name[type]:` token.

use crate::change::Operation;
use crate::error::DecodeSkip;
use std::iter::FusedIterator;

const TABLE_KEYWORD: &str = "table";
const NO_TUPLE_DATA: &str = "(no-tuple-data)";
const OLD_KEY: &str = "old-key:";
const NEW_TUPLE: &str = "new-tuple:";

/// The `table schema.table: OP:` prefix of a change line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Header {
    pub schema: String,
    pub table: String,
    pub operation: Operation,
}

/// Tuple section of an UPDATE body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Section {
    OldKey,
    NewTuple,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum BodyToken {
    Column {
        name: String,
        #[allow(dead_code)]
        type_name: String,
        value: String,
    },
    Section(Section),
    NoTupleData,
    /// Text starting at `offset` that is not a column
    Unreadable { offset: usize },
}

/// Iterator over the body of a change line, see [`Scanner::body`]
pub(crate) struct BodyTokens<'s, 'a> {
    scanner: &'s mut Scanner<'a>,
}

impl Iterator for BodyTokens<'_, '_> {
    type Item = BodyToken;

    fn next(&mut self) -> Option<BodyToken> {
        self.scanner.next_body_token()
    }
}

impl FusedIterator for BodyTokens<'_, '_> {}

pub(crate) struct Scanner<'a> {
    input: &'a str,
    pos: usize,
}

impl<'a> Scanner<'a> {
    pub fn new(input: &'a str) -> Self {
        Self { input, pos: 0 }
    }

    fn rest(&self) -> &'a str {
        &self.input[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eat(&mut self, literal: &str) -> bool {
        if self.rest().starts_with(literal) {
            self.pos += literal.len();
            true
        } else {
            false
        }
    }

    fn skip_whitespace(&mut self) -> usize {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_whitespace()) {
            self.bump();
        }
        self.pos - start
    }

    fn malformed_header(&self) -> DecodeSkip {
        DecodeSkip::MalformedHeader { offset: self.pos }
    }

    /// Scans `table schema.table: OP:` and leaves the cursor at the body.
    pub fn header(&mut self) -> Result<Header, DecodeSkip> {
        if !self.eat(TABLE_KEYWORD) || self.skip_whitespace() == 0 {
            return Err(DecodeSkip::NotATableChange);
        }

        let schema = self.identifier().ok_or_else(|| self.malformed_header())?;
        if !self.eat(".") {
            return Err(self.malformed_header());
        }
        let table = self.identifier().ok_or_else(|| self.malformed_header())?;
        if !self.eat(":") || self.skip_whitespace() == 0 {
            return Err(self.malformed_header());
        }

        let keyword_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_uppercase()) {
            self.bump();
        }
        let keyword = &self.input[keyword_start..self.pos];
        if keyword.is_empty() || !self.eat(":") {
            return Err(self.malformed_header());
        }
        let operation = keyword
            .parse::<Operation>()
            .map_err(DecodeSkip::UnknownOperation)?;

        Ok(Header {
            schema,
            table,
            operation,
        })
    }

    /// Iterates over the body tokens up to the end of the line.
    pub fn body(&mut self) -> BodyTokens<'_, 'a> {
        BodyTokens { scanner: self }
    }

    fn next_body_token(&mut self) -> Option<BodyToken> {
        self.skip_whitespace();
        if self.rest().is_empty() {
            return None;
        }
        if self.eat(NO_TUPLE_DATA) {
            return Some(BodyToken::NoTupleData);
        }
        if let Some((section, len)) = section_marker(self.rest()) {
            self.pos += len;
            return Some(BodyToken::Section(section));
        }

        let offset = self.pos;
        match self.column_header() {
            Some((name, type_name)) => Some(BodyToken::Column {
                name,
                type_name,
                value: self.value(),
            }),
            None => {
                self.pos = self.resync_point(offset);
                Some(BodyToken::Unreadable { offset })
            }
        }
    }

    /// `name[type]:`, leaving the cursor at the value
    fn column_header(&mut self) -> Option<(String, String)> {
        let name = self.column_name()?;
        let type_name = self.type_name()?;
        self.eat(":").then_some((name, type_name))
    }

    /// Start of the next complete column after `from`, or the end of input
    fn resync_point(&self, from: usize) -> usize {
        let rest = &self.input[from..];
        for (i, c) in rest.char_indices() {
            if !c.is_whitespace() {
                continue;
            }
            let after = rest[i..].trim_start();
            if starts_complete_column(after) || section_marker(after).is_some() {
                return self.input.len() - after.len();
            }
        }
        self.input.len()
    }

    /// Schema or table identifier, either bare or double-quoted.
    fn identifier(&mut self) -> Option<String> {
        if self.peek() == Some('"') {
            return self.quoted_identifier();
        }
        let start = self.pos;
        while matches!(self.peek(), Some(c) if !is_identifier_delimiter(c)) {
            self.bump();
        }
        (self.pos > start).then(|| self.input[start..self.pos].to_string())
    }

    fn quoted_identifier(&mut self) -> Option<String> {
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump()? {
                '"' if self.peek() == Some('"') => {
                    self.bump();
                    out.push('"');
                }
                '"' => return Some(out),
                c => out.push(c),
            }
        }
    }

    fn column_name(&mut self) -> Option<String> {
        if self.peek() == Some('"') {
            return self.quoted_identifier();
        }
        let start = self.pos;
        while matches!(self.peek(), Some(c) if is_column_char(c)) {
            self.bump();
        }
        (self.pos > start).then(|| self.input[start..self.pos].to_string())
    }

    /// Bracketed type name; brackets nest, so `text[]` is one type.
    fn type_name(&mut self) -> Option<String> {
        if !self.eat("[") {
            return None;
        }
        let start = self.pos;
        let mut depth = 1usize;
        while let Some(c) = self.bump() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return Some(self.input[start..self.pos - 1].to_string());
                    }
                }
                _ => {}
            }
        }
        None
    }

    fn value(&mut self) -> String {
        let start = self.pos;
        let end = self.value_end();
        self.pos = end;
        unquote(self.input[start..end].trim()).to_string()
    }

    fn value_end(&self) -> usize {
        for (i, c) in self.rest().char_indices() {
            if !c.is_whitespace() {
                continue;
            }
            let after = self.rest()[i..].trim_start();
            if after.is_empty() || starts_column(after) || section_marker(after).is_some() {
                return self.pos + i;
            }
        }
        self.input.len()
    }
}

fn is_identifier_delimiter(c: char) -> bool {
    c.is_whitespace() || matches!(c, '.' | ':' | '"' | '[')
}

fn is_column_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '$'
}

fn starts_column(rest: &str) -> bool {
    let mut scanner = Scanner::new(rest);
    scanner.column_name().is_some() && scanner.peek() == Some('[')
}

fn starts_complete_column(rest: &str) -> bool {
    Scanner::new(rest).column_header().is_some()
}

fn section_marker(rest: &str) -> Option<(Section, usize)> {
    [(OLD_KEY, Section::OldKey), (NEW_TUPLE, Section::NewTuple)]
        .into_iter()
        .find_map(|(marker, section)| {
            let after = rest.strip_prefix(marker)?;
            (after.is_empty() || after.starts_with(char::is_whitespace))
                .then_some((section, marker.len()))
        })
}

/// Strips one pair of enclosing single quotes. Nothing inside is unescaped.
fn unquote(value: &str) -> &str {
    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        &value[1..value.len() - 1]
    } else {
        value
    }
}
