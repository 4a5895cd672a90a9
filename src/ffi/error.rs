//! FFI error types.

use thiserror::Error;

use super::types::TypeCode;
use crate::host::ValueType;

/// Errors that can occur while loading, preparing or calling a foreign symbol
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FfiError {
    /// The shared library could not be mapped
    #[error("failed to load library '{path}': {message}")]
    LibraryLoad { path: String, message: String },

    /// The library has no export with this name
    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    /// Character outside the type-code alphabet
    #[error("unsupported type code '{0}'")]
    UnsupportedTypeCode(char),

    /// A host value has no conversion path into the bound type
    #[error("type mismatch: expected {expected}, got {found}")]
    TypeMismatch { expected: TypeCode, found: ValueType },

    #[error("unknown calling convention '{0}'")]
    UnknownCallingConvention(String),

    /// Decorated stack size disagrees with the declared argument types
    #[error("argument spec mismatch: symbol decoration expects {expected} stack bytes, types give {actual}")]
    ArgumentSpecMismatch { expected: usize, actual: usize },

    #[error("arity mismatch: expected {expected} arguments, got {got}")]
    ArityMismatch { expected: usize, got: usize },

    /// The ABI layer rejected the type/ABI combination
    #[error("bad call descriptor: {0}")]
    BadCallDescriptor(String),

    #[error("too many arguments: {0} (max 7)")]
    TooManyArguments(usize),

    #[error("'{0}' is not loaded as a function")]
    NotAFunction(String),

    #[error("'{0}' is not loaded as a variable")]
    NotAVariable(String),

    /// Leading trampoline argument is missing or not a long atom
    #[error("invalid dispatch handle")]
    InvalidDispatchHandle,

    #[error("null dispatch handle")]
    NullDispatchHandle,
}

impl FfiError {
    /// Whether the caller may retry with corrected input.
    ///
    /// A rejected call descriptor sticks to the invocation until it is
    /// loaded again with different types.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, FfiError::BadCallDescriptor(_))
    }
}

/// Result type alias for FFI operations.
pub type FfiResult<T> = std::result::Result<T, FfiError>;
