//! Dynamic FFI bridge
//!
//! Calls C functions and accesses C variables chosen at runtime, with
//! types given as one-character codes and values in the host's tagged
//! representation.
//!
//! # Architecture
//!
//! ```text
//! Host: load_function("libm.so.6", "pow", None, 'f', "ff")
//!       │
//!       ▼
//! InvocationRegistry (one Invocation per library + symbol)
//!       │
//!       ▼
//! Invocation::load
//!   SymbolResolver      (libloading)
//!   ConventionResolver  (decoration inference + stack check)
//!   NativeCallDescriptor (libffi cif)
//!       │
//!       ▼
//! DispatchShim::wrap ──▶ projection(trampoline, [handle])
//!       │
//!       ▼
//! Host: callable[2f; 10f]  ──▶  Invocation::call  ──▶  1024f
//! ```
//!
//! # Type codes
//!
//! | Code | Type   | C        |
//! |------|--------|----------|
//! | ` `  | void   | void     |
//! | `b`  | bool   | bool     |
//! | `x`  | byte   | uint8_t  |
//! | `h`  | short  | int16_t  |
//! | `i`  | int    | int32_t  |
//! | `j`  | long   | int64_t  |
//! | `e`  | real   | float    |
//! | `f`  | float  | double   |
//! | `c`  | char   | char     |
//!
//! # Example
//!
//! ```ignore
//! let bridge = ForeignBridge::global();
//! let add = bridge.try_load_function("libfixture.so", "add", None, 'i', "ii")?;
//! let sum = add.apply(&[Value::int(5), Value::int(3)]);
//! assert_eq!(sum.as_i64(), Some(8));
//! ```

mod binding;
mod bridge;
mod convention;
mod descriptor;
mod dispatch;
mod error;
mod invocation;
mod loader;
mod registry;
mod types;

pub use binding::{ArgumentBinding, Marshaled};
pub use bridge::ForeignBridge;
pub use convention::{
    platform_resolver, CallingConvention, ConventionResolver, Decoration, DecorationPrefix,
    DecoratedConventions, DefaultConvention, DECORATED_SLOT_WIDTH,
};
pub use descriptor::{NativeCallDescriptor, ResultSlot, RESULT_SLOT_SIZE};
pub use dispatch::{decode_handle, encode_handle, trampoline, DispatchShim};
pub use error::{FfiError, FfiResult};
pub use invocation::{Invocation, Phase};
pub use loader::{library_filename, SearchPaths, SymbolResolver};
pub use registry::{InvocationKey, InvocationRegistry};
pub use types::{describe, ArgumentSpec, Signature, TypeCode, TypeDescription, MAX_ARGUMENTS};
