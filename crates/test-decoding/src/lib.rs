//! Decoder for PostgreSQL's `test_decoding` logical replication output
//!
//! `test_decoding` renders every row change as a single human-readable line:
//!
//! ```text
//! table public.users: INSERT: id[integer]:1 name[text]:'Ana Silva'
//! ```
//!
//! This crate turns such lines into [`DecodedChange`] values. Lines that are
//! not row changes (transaction `BEGIN`/`COMMIT` markers, `TRUNCATE`, message
//! output) are skipped rather than treated as errors.
//!
//! # Example
//!
//! ```
//! use cdc_bronze_test_decoding::{decode, Operation};
//!
//! let change = decode("table pub.cliente: DELETE: id[integer]:7").unwrap();
//! assert_eq!(change.schema, "pub");
//! assert_eq!(change.operation, Operation::Delete);
//! assert_eq!(change.columns["id"], "7");
//!
//! assert!(decode("BEGIN 1234").is_none());
//! ```
//!
//! # Limitations
//!
//! Values are delimited by scanning forward to the next `name[` token, so a
//! quoted value containing whitespace followed by `word[` is split there. The
//! remainder rarely reads as a column. It is dropped up to the next complete
//! `name[type]:` token and the change is kept with the columns that were
//! read, flagged through [`DecodedChange::unread_at`].
//! Quoted values only lose their outer quotes; doubled quotes inside them are
//! passed through untouched.

mod change;
mod error;
mod scanner;

pub use change::{Columns, DecodedChange, Operation, TableRef};
pub use error::DecodeSkip;

use scanner::{BodyToken, Scanner, Section};

/// Decodes one `test_decoding` line, returning `None` for anything that is
/// not a row change.
pub fn decode(raw: &str) -> Option<DecodedChange> {
    match decode_line(raw) {
        Ok(change) => {
            if let Some(offset) = change.unread_at {
                tracing::warn!(
                    "Change on {}.{} decoded partially, column text from byte {offset} was dropped: {raw}",
                    change.schema,
                    change.table
                );
            }
            Some(change)
        }
        Err(skip) => {
            tracing::trace!("Skipping test_decoding line ({skip}): {raw}");
            None
        }
    }
}

/// Decodes one `test_decoding` line, reporting why it was skipped on failure.
///
/// Once the header is read the line is always a change. Column text that
/// cannot be tokenized is skipped and its offset kept in `unread_at`.
pub fn decode_line(raw: &str) -> Result<DecodedChange, DecodeSkip> {
    let mut scanner = Scanner::new(raw.trim());
    let header = scanner.header()?;

    let mut columns = Columns::new();
    let mut old_key: Option<Columns> = None;
    let mut section = Section::NewTuple;
    let mut unread_at = None;

    for token in scanner.body() {
        match token {
            BodyToken::NoTupleData => {}
            BodyToken::Section(Section::OldKey) => {
                section = Section::OldKey;
                old_key.get_or_insert_with(Columns::new);
            }
            BodyToken::Section(Section::NewTuple) => section = Section::NewTuple,
            BodyToken::Column { name, value, .. } => {
                let target = match section {
                    Section::OldKey => old_key.get_or_insert_with(Columns::new),
                    Section::NewTuple => &mut columns,
                };
                target.insert(name, value);
            }
            BodyToken::Unreadable { offset } => {
                unread_at.get_or_insert(offset);
            }
        }
    }

    Ok(DecodedChange {
        schema: header.schema,
        table: header.table,
        operation: header.operation,
        columns,
        old_key,
        unread_at,
    })
}
