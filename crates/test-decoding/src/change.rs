//! Decoded change data structures

use indexmap::IndexMap;
use std::fmt;
use std::str::FromStr;

/// Column name to raw textual value, in the order the columns appeared
pub type Columns = IndexMap<String, String>;

/// Row-level operation carried by a change line
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    Insert,
    Update,
    Delete,
}

impl Operation {
    /// The keyword used by test_decoding and in the CSV `op` column
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "INSERT",
            Operation::Update => "UPDATE",
            Operation::Delete => "DELETE",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "INSERT" => Ok(Operation::Insert),
            "UPDATE" => Ok(Operation::Update),
            "DELETE" => Ok(Operation::Delete),
            other => Err(other.to_string()),
        }
    }
}

/// A schema-qualified table name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TableRef {
    pub schema: String,
    pub table: String,
}

impl TableRef {
    pub fn new(schema: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            table: table.into(),
        }
    }
}

impl fmt::Display for TableRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.schema, self.table)
    }
}

/// One row change decoded from a test_decoding line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedChange {
    /// Schema name, unquoted
    pub schema: String,
    /// Table name, unquoted
    pub table: String,
    pub operation: Operation,
    /// New tuple for INSERT/UPDATE, key or full old row for DELETE
    pub columns: Columns,
    /// Old key tuple of an UPDATE, present only when the server emitted one
    pub old_key: Option<Columns>,
    /// Byte offset of the first body text that could not be read as a
    /// column. The columns around it are still present.
    pub unread_at: Option<usize>,
}

impl DecodedChange {
    /// Case-sensitive exact match against a schema-qualified table
    pub fn is_for(&self, target: &TableRef) -> bool {
        self.schema == target.schema && self.table == target.table
    }

    /// Whether part of the column list was dropped while decoding
    pub fn is_partial(&self) -> bool {
        self.unread_at.is_some()
    }
}
