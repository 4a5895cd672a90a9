//! Invocation
//!
//! One cached slot per (library, symbol): the opened library, the symbol's
//! address, its bindings and, for functions, a prepared call descriptor.
//!
//! ```text
//!  Unbound ──load──▶ Loaded ──prepare──▶ Ready ──call──▶ Value
//!                      ▲                   │
//!                      └──────load─────────┘
//! ```
//!
//! `load` runs `prepare` itself; an invocation stays `Loaded` only when the
//! ABI layer rejected the signature. Variables skip the descriptor
//! entirely and are read or written by copying `size` bytes.

use std::ffi::c_void;
use std::fmt;
use std::ptr::{self, NonNull};

use parking_lot::RwLock;
use tracing::{debug, trace};

use super::binding::{ArgumentBinding, Marshaled};
use super::convention::{platform_resolver, CallingConvention, ConventionResolver};
use super::descriptor::NativeCallDescriptor;
use super::error::{FfiError, FfiResult};
use super::loader::SymbolResolver;
use super::types::{ArgumentSpec, Signature, TypeCode};
use crate::host::Value;

/// Lifecycle stage of an [`Invocation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Unbound,
    /// Bound to a function whose call descriptor could not be prepared
    Loaded,
    /// Callable function, or readable/writable variable
    Ready,
}

/// Resolved address inside a mapped library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct SymbolAddress(NonNull<c_void>);

// Safety: the address is only dereferenced by native calls and variable
// copies; the library it points into outlives the invocation's target.
unsafe impl Send for SymbolAddress {}
unsafe impl Sync for SymbolAddress {}

struct FunctionTarget {
    symbol: String,
    address: SymbolAddress,
    return_binding: ArgumentBinding,
    parameters: Vec<ArgumentBinding>,
    arguments: ArgumentSpec,
    convention: CallingConvention,
    descriptor: Option<NativeCallDescriptor>,
}

impl FunctionTarget {
    fn prepare(&mut self) -> FfiResult<()> {
        self.descriptor = None;
        let descriptor = NativeCallDescriptor::prepare(
            self.return_binding.code(),
            &self.arguments,
            self.convention,
        )?;
        self.descriptor = Some(descriptor);
        Ok(())
    }

    fn signature(&self) -> Signature {
        Signature::new(
            self.symbol.clone(),
            self.return_binding.code(),
            self.arguments.clone(),
        )
    }
}

struct VariableTarget {
    symbol: String,
    address: SymbolAddress,
    binding: ArgumentBinding,
}

enum Target {
    Unbound,
    Function(FunctionTarget),
    Variable(VariableTarget),
}

const UNBOUND: &str = "<unbound>";

/// A prepared, reusable foreign function or variable binding
pub struct Invocation {
    resolver: SymbolResolver,
    conventions: &'static dyn ConventionResolver,
    target: RwLock<Target>,
}

impl Invocation {
    /// Unbound invocation over an opened library
    pub fn new(resolver: SymbolResolver) -> Self {
        Self::with_conventions(resolver, platform_resolver())
    }

    pub fn with_conventions(
        resolver: SymbolResolver,
        conventions: &'static dyn ConventionResolver,
    ) -> Self {
        Self {
            resolver,
            conventions,
            target: RwLock::new(Target::Unbound),
        }
    }

    pub fn library(&self) -> &str {
        self.resolver.path()
    }

    pub fn phase(&self) -> Phase {
        match &*self.target.read() {
            Target::Unbound => Phase::Unbound,
            Target::Function(f) if f.descriptor.is_none() => Phase::Loaded,
            Target::Function(_) | Target::Variable(_) => Phase::Ready,
        }
    }

    /// Currently bound symbol, if any
    pub fn symbol(&self) -> Option<String> {
        match &*self.target.read() {
            Target::Unbound => None,
            Target::Function(f) => Some(f.symbol.clone()),
            Target::Variable(v) => Some(v.symbol.clone()),
        }
    }

    pub fn is_function(&self) -> bool {
        matches!(&*self.target.read(), Target::Function(_))
    }

    pub fn is_variable(&self) -> bool {
        matches!(&*self.target.read(), Target::Variable(_))
    }

    /// Number of foreign arguments of a bound function
    pub fn arity(&self) -> Option<usize> {
        match &*self.target.read() {
            Target::Function(f) => Some(f.parameters.len()),
            _ => None,
        }
    }

    pub fn signature(&self) -> Option<Signature> {
        match &*self.target.read() {
            Target::Function(f) => Some(f.signature()),
            _ => None,
        }
    }

    pub fn convention(&self) -> Option<CallingConvention> {
        match &*self.target.read() {
            Target::Function(f) => Some(f.convention),
            _ => None,
        }
    }

    /// Bind to a function from its type-code strings
    pub fn load(
        &self,
        symbol: &str,
        return_code: char,
        argument_codes: &str,
        convention: Option<&str>,
    ) -> FfiResult<()> {
        let arguments = ArgumentSpec::parse(argument_codes)?;
        let return_type = TypeCode::from_char(return_code)?;
        self.load_typed(symbol, return_type, arguments, convention)
    }

    /// Bind to a function, replacing whatever this invocation held.
    ///
    /// Failures up to and including convention verification leave the
    /// previous binding in place. A rejected call descriptor leaves the
    /// new binding `Loaded` and is returned as the error.
    pub fn load_typed(
        &self,
        symbol: &str,
        return_type: TypeCode,
        arguments: ArgumentSpec,
        convention: Option<&str>,
    ) -> FfiResult<()> {
        let address = SymbolAddress(self.resolver.resolve(symbol)?);
        let convention = self.conventions.resolve(convention, symbol)?;
        self.conventions.verify(convention, symbol, &arguments)?;

        let mut function = FunctionTarget {
            symbol: symbol.to_string(),
            address,
            return_binding: ArgumentBinding::new(return_type),
            parameters: arguments
                .codes()
                .iter()
                .map(|&code| ArgumentBinding::new(code))
                .collect(),
            arguments,
            convention,
            descriptor: None,
        };
        let prepared = function.prepare();

        debug!(
            library = %self.library(),
            signature = %function.signature(),
            %convention,
            ready = prepared.is_ok(),
            "loaded function"
        );
        *self.target.write() = Target::Function(function);
        prepared
    }

    /// Rebuild the call descriptor from the current bindings
    pub fn prepare(&self) -> FfiResult<()> {
        match &mut *self.target.write() {
            Target::Function(function) => function.prepare(),
            Target::Variable(v) => Err(FfiError::NotAFunction(v.symbol.clone())),
            Target::Unbound => Err(FfiError::NotAFunction(UNBOUND.to_string())),
        }
    }

    /// Call the bound function.
    ///
    /// `args` must match the bound arity, except that a single argument
    /// is accepted (and ignored) by a function taking none.
    pub fn call(&self, args: &[Value]) -> FfiResult<Value> {
        // Recursive so a native callback re-entering this invocation cannot
        // deadlock behind a queued `load`.
        let target = self.target.read_recursive();
        let function = match &*target {
            Target::Function(function) => function,
            Target::Variable(v) => return Err(FfiError::NotAFunction(v.symbol.clone())),
            Target::Unbound => return Err(FfiError::NotAFunction(UNBOUND.to_string())),
        };
        let descriptor = function.descriptor.as_ref().ok_or_else(|| {
            FfiError::BadCallDescriptor(format!(
                "'{}' has no prepared call descriptor",
                function.symbol
            ))
        })?;

        let arity = function.parameters.len();
        let args = match args.len() {
            n if n == arity => args,
            1 if arity == 0 => &args[..0],
            n => return Err(FfiError::ArityMismatch { expected: arity, got: n }),
        };

        let marshaled = function
            .parameters
            .iter()
            .zip(args)
            .map(|(binding, value)| binding.extract(value))
            .collect::<FfiResult<Vec<_>>>()?;
        let mut pointers: Vec<*mut c_void> = marshaled.iter().map(Marshaled::as_ptr).collect();

        trace!(
            symbol = %function.symbol,
            arity,
            scratch = marshaled.iter().filter(|m| !m.is_zero_copy()).count(),
            "calling"
        );
        // Safety: the descriptor was prepared from these bindings, and
        // every pointer refers to storage held by `marshaled`, which is
        // dropped only after the call returns.
        let slot = unsafe { descriptor.invoke(function.address.0, &mut pointers) };
        drop(marshaled);

        let code = function.return_binding.code();
        function.return_binding.read(slot.bytes(code))
    }

    /// Bind to an exported variable of the given type code
    pub fn load_variable(&self, symbol: &str, code: char) -> FfiResult<()> {
        let code = match TypeCode::from_char(code)? {
            TypeCode::Void => return Err(FfiError::UnsupportedTypeCode(code)),
            code => code,
        };
        let address = SymbolAddress(self.resolver.resolve(symbol)?);

        debug!(library = %self.library(), symbol, code = %code.as_char(), "loaded variable");
        *self.target.write() = Target::Variable(VariableTarget {
            symbol: symbol.to_string(),
            address,
            binding: ArgumentBinding::new(code),
        });
        Ok(())
    }

    /// Copy the variable's current value into a new host value.
    ///
    /// Nothing checks that the export really has the declared width.
    pub fn read(&self) -> FfiResult<Value> {
        let target = self.target.read_recursive();
        let variable = Self::variable(&target)?;
        let size = variable.binding.size();

        // Safety: the caller declared the export as `size` bytes wide.
        let bytes = unsafe {
            std::slice::from_raw_parts(variable.address.0.as_ptr() as *const u8, size)
        };
        variable.binding.read(bytes)
    }

    /// Overwrite the variable with `value`, converted to the bound type
    pub fn write(&self, value: &Value) -> FfiResult<()> {
        let target = self.target.read_recursive();
        let variable = Self::variable(&target)?;
        let marshaled = variable.binding.extract(value)?;

        // Safety: as for `read`; source storage is a full cell.
        unsafe {
            ptr::copy_nonoverlapping(
                marshaled.as_ptr() as *const u8,
                variable.address.0.as_ptr() as *mut u8,
                variable.binding.size(),
            );
        }
        trace!(symbol = %variable.symbol, "wrote variable");
        Ok(())
    }

    fn variable(target: &Target) -> FfiResult<&VariableTarget> {
        match target {
            Target::Variable(variable) => Ok(variable),
            Target::Function(f) => Err(FfiError::NotAVariable(f.symbol.clone())),
            Target::Unbound => Err(FfiError::NotAVariable(UNBOUND.to_string())),
        }
    }
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("library", &self.library())
            .field("symbol", &self.symbol())
            .field("phase", &self.phase())
            .finish()
    }
}
