//! Reasons a line is not decoded into a change.

use thiserror::Error;

/// Why a test_decoding line was not turned into a [`crate::DecodedChange`].
///
/// None of these are failures of the pipeline: transaction markers and other
/// non-row output are expected on every slot and are dropped silently.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeSkip {
    /// The line does not start with the `table` keyword.
    #[error("not a table change")]
    NotATableChange,

    /// The line starts with `table` but the `schema.table: OP:` header is broken.
    #[error("malformed table header at byte {offset}")]
    MalformedHeader { offset: usize },

    /// The operation keyword is not INSERT, UPDATE or DELETE.
    #[error("unsupported operation {0}")]
    UnknownOperation(String),
}
