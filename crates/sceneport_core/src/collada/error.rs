//! Errors raised by the resolution engine.

use thiserror::Error;

/// Errors that abort a parse. There is no recovery path that skips an
/// offending sub-element: the source document is treated as trusted, and a
/// structural problem invalidates the whole result.
#[derive(Error, Debug)]
pub enum ParseError {
    /// An identifier referenced by URL indirection is not declared by any
    /// element in the document.
    #[error("no element with id '{0}' in the document")]
    MissingReference(String),

    /// An expected child element (accessor, technique block, ...) is
    /// absent. Carries the expected path for diagnostics.
    #[error("COLLADA element expected: {0}")]
    MalformedStructure(String),
}

/// Result type for engine operations.
pub type ParseResult<T> = Result<T, ParseError>;
