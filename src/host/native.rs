//! Native callbacks and the host's variadic apply.
//!
//! The host registers native functions only as plain fixed-arity
//! function pointers. There is no closure capture: extra context has to
//! travel as a bound leading argument of a [`Projection`].

use std::fmt;

use super::value::Value;

/// Largest arity the host accepts for a native function
pub const MAX_NATIVE_ARITY: usize = 8;

type V<'a> = &'a Value;

/// A fixed-arity native function pointer
#[derive(Clone, Copy)]
pub enum NativeFn {
    F1(fn(V) -> Value),
    F2(fn(V, V) -> Value),
    F3(fn(V, V, V) -> Value),
    F4(fn(V, V, V, V) -> Value),
    F5(fn(V, V, V, V, V) -> Value),
    F6(fn(V, V, V, V, V, V) -> Value),
    F7(fn(V, V, V, V, V, V, V) -> Value),
    F8(fn(V, V, V, V, V, V, V, V) -> Value),
}

impl NativeFn {
    pub const fn arity(&self) -> usize {
        match self {
            Self::F1(_) => 1,
            Self::F2(_) => 2,
            Self::F3(_) => 3,
            Self::F4(_) => 4,
            Self::F5(_) => 5,
            Self::F6(_) => 6,
            Self::F7(_) => 7,
            Self::F8(_) => 8,
        }
    }

    /// Call with exactly `arity` arguments; anything else is a `rank` error
    pub fn invoke(&self, args: &[Value]) -> Value {
        match (self, args) {
            (Self::F1(f), [a]) => f(a),
            (Self::F2(f), [a, b]) => f(a, b),
            (Self::F3(f), [a, b, c]) => f(a, b, c),
            (Self::F4(f), [a, b, c, d]) => f(a, b, c, d),
            (Self::F5(f), [a, b, c, d, e]) => f(a, b, c, d, e),
            (Self::F6(f), [a, b, c, d, e, g]) => f(a, b, c, d, e, g),
            (Self::F7(f), [a, b, c, d, e, g, h]) => f(a, b, c, d, e, g, h),
            (Self::F8(f), [a, b, c, d, e, g, h, i]) => f(a, b, c, d, e, g, h, i),
            _ => Value::error("rank"),
        }
    }

    fn address(&self) -> usize {
        match self {
            Self::F1(f) => *f as usize,
            Self::F2(f) => *f as usize,
            Self::F3(f) => *f as usize,
            Self::F4(f) => *f as usize,
            Self::F5(f) => *f as usize,
            Self::F6(f) => *f as usize,
            Self::F7(f) => *f as usize,
            Self::F8(f) => *f as usize,
        }
    }
}

impl fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "native/{}@{:#x}", self.arity(), self.address())
    }
}

/// A native function with some leading arguments already supplied
#[derive(Clone)]
pub struct Projection {
    function: NativeFn,
    bound: Vec<Value>,
}

impl Projection {
    pub fn new(function: NativeFn, bound: Vec<Value>) -> Self {
        Self { function, bound }
    }

    pub fn function(&self) -> NativeFn {
        self.function
    }

    pub fn bound(&self) -> &[Value] {
        &self.bound
    }

    /// Arguments still expected by the underlying function
    pub fn remaining(&self) -> usize {
        self.function.arity().saturating_sub(self.bound.len())
    }
}

impl fmt::Debug for Projection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}[", self.function)?;
        for (i, value) in self.bound.iter().enumerate() {
            if i > 0 {
                f.write_str(";")?;
            }
            write!(f, "{}", value)?;
        }
        f.write_str("]")
    }
}

impl Value {
    /// Apply a callable value to `args`.
    ///
    /// An empty argument list is passed as a single `(::)` placeholder.
    /// Non-callable values yield a `type` error value.
    pub fn apply(&self, args: &[Value]) -> Value {
        let Some(projection) = self.as_projection() else {
            return Value::error("type");
        };

        let placeholder;
        let args = if args.is_empty() {
            placeholder = [Value::unit()];
            &placeholder[..]
        } else {
            args
        };

        let mut full = Vec::with_capacity(projection.bound.len() + args.len());
        full.extend(projection.bound.iter().cloned());
        full.extend(args.iter().cloned());
        projection.function.invoke(&full)
    }
}
