//! dynffi - Dynamic Foreign-Function Call Bridge
//!
//! Calls exported C functions and reads or writes exported C variables
//! that are only known at runtime. A call is described by a library path,
//! a symbol name, a one-character return type code and a string of
//! argument type codes; values cross the boundary in a small tagged,
//! reference-counted host representation.
//!
//! # Features
//!
//! - **Type codes**: `b x h i j e f c` plus space for void, up to 7 arguments
//! - **Prepared calls**: one libffi call descriptor per (library, symbol), cached
//! - **Calling conventions**: explicit names or inference from decorated exports,
//!   with stack-size verification on 32-bit Windows-style targets
//! - **Host callables**: loaded functions come back as projections the host applies
//! - **Variables**: read and write exported globals by type code
//! - **Errors as values**: failures at the host boundary become error values, never panics
//!
//! # Example
//!
//! ```no_run
//! use dynffi::{ForeignBridge, Value};
//!
//! let bridge = ForeignBridge::global();
//! let labs = bridge.load_function("", "labs", None, 'j', "j");
//! let result = labs.apply(&[Value::long(-42)]);
//! assert_eq!(result.as_i64(), Some(42));
//! ```
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │   Host values   │  tagged atoms, vectors, projections
//! └────────┬────────┘
//!          │ load_function / read_variable / write_variable
//!          ▼
//! ┌─────────────────┐
//! │ ForeignBridge   │  errors become host error values
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ Registry        │  one Invocation per (library, symbol)
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────┐
//! │ Invocation      │  bindings + libffi descriptor
//! └────────┬────────┘
//!          ▼
//! ┌─────────────────────┐
//! │   Native Code       │
//! └─────────────────────┘
//! ```

#![warn(clippy::all)]

pub mod config;
pub mod ffi;
pub mod host;
pub mod logging;

pub use config::{BridgeConfig, ConfigError, ConfigResult, LoaderConfig, LoggingConfig};
pub use ffi::{
    ArgumentBinding, ArgumentSpec, CallingConvention, ConventionResolver, DispatchShim, FfiError,
    FfiResult, ForeignBridge, Invocation, InvocationRegistry, Phase, Signature, SymbolResolver,
    TypeCode, MAX_ARGUMENTS,
};
pub use host::{NativeFn, Projection, Value, ValueType};
pub use logging::LogConfig;
