//! Dynamic Dispatch Shim
//!
//! Turns a registered invocation into a host callable.
//!
//! The host only registers fixed-arity native function pointers and has
//! no closures, so the invocation travels as a bound leading argument:
//!
//! ```text
//! callable = projection(trampoline_n, [handle])
//! callable[a1; ...; an]  ─▶  trampoline_n(handle, a1, ..., an)
//!                        ─▶  decode(handle).call([a1, ..., an])
//! ```
//!
//! `handle` is the invocation's address stored in a long atom. This
//! module is the only place that converts between the two.

use std::sync::Arc;

use super::error::{FfiError, FfiResult};
use super::invocation::Invocation;
use super::registry::InvocationRegistry;
use super::types::MAX_ARGUMENTS;
use crate::host::{Cell, NativeFn, Projection, Value, ValueType};

/// Store an invocation's address in a long atom
pub fn encode_handle(invocation: &Arc<Invocation>) -> Value {
    Value::long(Arc::as_ptr(invocation) as usize as i64)
}

/// Recover the invocation behind a handle.
///
/// # Safety
///
/// A non-null handle must come from [`encode_handle`] on an invocation
/// that is still alive for `'a`. Registry-owned invocations live as long
/// as their registry.
pub unsafe fn decode_handle<'a>(handle: &Value) -> FfiResult<&'a Invocation> {
    if handle.value_type() != ValueType::Long || handle.is_vector() {
        return Err(FfiError::InvalidDispatchHandle);
    }
    let raw = handle
        .cell()
        .map(Cell::to_i64)
        .ok_or(FfiError::InvalidDispatchHandle)?;
    let ptr = raw as usize as *const Invocation;
    if ptr.is_null() {
        return Err(FfiError::NullDispatchHandle);
    }
    Ok(&*ptr)
}

fn forward(handle: &Value, args: &[Value]) -> Value {
    // Safety: handles are bound by `DispatchShim::wrap`, whose registry
    // is 'static and never drops entries.
    let result = unsafe { decode_handle(handle) }.and_then(|invocation| invocation.call(args));
    result.unwrap_or_else(|e| Value::error(e.to_string()))
}

macro_rules! trampolines {
    ($($name:ident($($arg:ident),+);)*) => {
        $(
            fn $name(handle: &Value, $($arg: &Value),+) -> Value {
                forward(handle, &[$($arg.clone()),+])
            }
        )*
    };
}

trampolines! {
    trampoline1(a);
    trampoline2(a, b);
    trampoline3(a, b, c);
    trampoline4(a, b, c, d);
    trampoline5(a, b, c, d, e);
    trampoline6(a, b, c, d, e, f);
    trampoline7(a, b, c, d, e, f, g);
}

/// Trampolines by foreign arity; slot 0 serves both 0 and 1 arguments
const TRAMPOLINES: [NativeFn; MAX_ARGUMENTS] = [
    NativeFn::F2(trampoline1),
    NativeFn::F3(trampoline2),
    NativeFn::F4(trampoline3),
    NativeFn::F5(trampoline4),
    NativeFn::F6(trampoline5),
    NativeFn::F7(trampoline6),
    NativeFn::F8(trampoline7),
];

/// Trampoline for a function taking `arity` foreign arguments
pub fn trampoline(arity: usize) -> FfiResult<NativeFn> {
    if arity > MAX_ARGUMENTS {
        return Err(FfiError::TooManyArguments(arity));
    }
    Ok(TRAMPOLINES[arity.max(1) - 1])
}

/// Wraps registry-owned invocations as host callables
#[derive(Clone, Copy)]
pub struct DispatchShim {
    registry: &'static InvocationRegistry,
}

impl DispatchShim {
    pub fn new(registry: &'static InvocationRegistry) -> Self {
        Self { registry }
    }

    /// Shim over the process-wide registry
    pub fn global() -> Self {
        Self::new(InvocationRegistry::global())
    }

    pub fn registry(&self) -> &'static InvocationRegistry {
        self.registry
    }

    /// Callable for the function cached under (library, symbol)
    pub fn wrap(&self, library: &str, symbol: &str) -> FfiResult<Value> {
        let invocation = self
            .registry
            .get(library, symbol)
            .ok_or_else(|| FfiError::NotAFunction(symbol.to_string()))?;
        let arity = invocation
            .arity()
            .ok_or_else(|| FfiError::NotAFunction(symbol.to_string()))?;
        let function = trampoline(arity)?;
        Ok(Value::projection(Projection::new(
            function,
            vec![encode_handle(&invocation)],
        )))
    }
}
