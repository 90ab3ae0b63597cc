//! Error types for the core entity model and column codec.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, CodecError>;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("unknown value type token: {0}")]
    UnknownTypeToken(String),

    #[error("packed column of {found} bytes is not a multiple of {element_size} ({type_name})")]
    MisalignedColumn {
        type_name: &'static str,
        element_size: usize,
        found: usize,
    },

    #[error("columns of dataset '{dataset}' have unequal row counts ({left} vs {right})")]
    UnequalRowCounts {
        dataset: String,
        left: usize,
        right: usize,
    },
}
