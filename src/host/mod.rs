//! Host Value Model
//!
//! The dynamic value representation the bridge marshals to and from.
//!
//! Values are tagged and reference-counted. The bridge only ever:
//!
//! - creates atoms of a given type and fills their storage cell
//! - reads a value's type tag, element count and storage cell
//! - takes an extra reference (`clone`) when it keeps a value past a call
//!
//! Type tags follow q numbering: negative for atoms, positive for vectors.
//!
//! ```text
//!  tag   type       width
//!  -1    bool       1
//!  -4    byte       1
//!  -5    short      2
//!  -6    int        4
//!  -7    long       8
//!  -8    real       4
//!  -9    float      8
//! -10    char       1
//! -11    symbol     -
//! 101    unit (::)  -
//! 104    projection -
//! -128   error      -
//! ```

mod native;
mod value;

pub use native::{NativeFn, Projection, MAX_NATIVE_ARITY};
pub use value::{Cell, Value, ValueType};
