//! Calling Conventions
//!
//! Resolves which ABI a foreign function uses and sanity-checks declared
//! argument types against decorated export names.
//!
//! On 32-bit Windows-style targets the compiler decorates exports:
//!
//! ```text
//! _name@N   stdcall, N bytes of arguments on the stack
//! @name@N   fastcall, N bytes of arguments
//! name      cdecl
//! ```
//!
//! Elsewhere there is a single C convention and resolution is a no-op.

use std::fmt;

use libffi::low::{ffi_abi, ffi_abi_FFI_DEFAULT_ABI};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::warn;

use super::error::{FfiError, FfiResult};
use super::types::ArgumentSpec;

/// Stack slot width on targets with decorated conventions
pub const DECORATED_SLOT_WIDTH: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CallingConvention {
    /// Platform default C convention
    #[default]
    Cdecl,
    Stdcall,
    Fastcall,
}

impl CallingConvention {
    /// Names accepted for an explicit convention (case-insensitive)
    pub const NAMES: [(&'static str, CallingConvention); 3] = [
        ("CDECL", CallingConvention::Cdecl),
        ("STDCALL", CallingConvention::Stdcall),
        ("FASTCALL", CallingConvention::Fastcall),
    ];

    pub fn from_name(name: &str) -> FfiResult<Self> {
        Self::NAMES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, convention)| *convention)
            .ok_or_else(|| FfiError::UnknownCallingConvention(name.to_string()))
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Cdecl => "CDECL",
            Self::Stdcall => "STDCALL",
            Self::Fastcall => "FASTCALL",
        }
    }

    /// Conventions whose exports carry a stack-size suffix
    pub const fn is_decorated(self) -> bool {
        matches!(self, Self::Stdcall | Self::Fastcall)
    }

    /// libffi ABI tag, if libffi supports this convention on this target
    pub fn ffi_abi(self) -> Option<ffi_abi> {
        match self {
            Self::Cdecl => Some(ffi_abi_FFI_DEFAULT_ABI),
            #[cfg(all(target_arch = "x86", windows))]
            Self::Stdcall => Some(libffi::raw::ffi_abi_FFI_STDCALL),
            #[cfg(all(target_arch = "x86", windows))]
            Self::Fastcall => Some(libffi::raw::ffi_abi_FFI_FASTCALL),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }
}

impl fmt::Display for CallingConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

static DECORATED_NAME: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^([_@])([A-Za-z_?$][\w?$]*)@(\d+)$").expect("decoration pattern compiles")
});

/// Leading character of a decorated export
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecorationPrefix {
    Underscore,
    At,
}

/// Convention and stack size encoded in an export name
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decoration {
    pub prefix: DecorationPrefix,
    pub name: String,
    pub stack_bytes: usize,
}

impl Decoration {
    /// Parse `_name@N` or `@name@N`; anything else is undecorated
    pub fn parse(symbol: &str) -> Option<Self> {
        let caps = DECORATED_NAME.captures(symbol)?;
        let prefix = match &caps[1] {
            "_" => DecorationPrefix::Underscore,
            _ => DecorationPrefix::At,
        };
        Some(Self {
            prefix,
            name: caps[2].to_string(),
            stack_bytes: caps[3].parse().ok()?,
        })
    }

    pub fn convention(&self) -> CallingConvention {
        match self.prefix {
            DecorationPrefix::Underscore => CallingConvention::Stdcall,
            DecorationPrefix::At => CallingConvention::Fastcall,
        }
    }
}

/// Picks and checks the calling convention of a foreign function
pub trait ConventionResolver: Send + Sync + fmt::Debug {
    /// Explicit name when present and non-empty, otherwise inference
    /// from the symbol's decoration.
    fn resolve(&self, explicit: Option<&str>, symbol: &str) -> FfiResult<CallingConvention>;

    /// Compare declared argument types with a decorated stack size.
    ///
    /// Only possible for decorated names under a decorated convention;
    /// everything else passes.
    fn verify(
        &self,
        convention: CallingConvention,
        symbol: &str,
        arguments: &ArgumentSpec,
    ) -> FfiResult<()>;
}

/// Resolver for targets where exports encode their convention
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecoratedConventions {
    slot_width: usize,
}

impl DecoratedConventions {
    pub const fn new(slot_width: usize) -> Self {
        Self { slot_width }
    }

    pub const fn slot_width(&self) -> usize {
        self.slot_width
    }
}

impl Default for DecoratedConventions {
    fn default() -> Self {
        Self::new(DECORATED_SLOT_WIDTH)
    }
}

impl ConventionResolver for DecoratedConventions {
    fn resolve(&self, explicit: Option<&str>, symbol: &str) -> FfiResult<CallingConvention> {
        match explicit.filter(|name| !name.is_empty()) {
            Some(name) => CallingConvention::from_name(name),
            None => Ok(Decoration::parse(symbol)
                .map(|d| d.convention())
                .unwrap_or_default()),
        }
    }

    fn verify(
        &self,
        convention: CallingConvention,
        symbol: &str,
        arguments: &ArgumentSpec,
    ) -> FfiResult<()> {
        if !convention.is_decorated() {
            return Ok(());
        }
        let Some(decoration) = Decoration::parse(symbol) else {
            if symbol.contains('@') {
                warn!(symbol, %convention, "unrecognised decoration, skipping stack size check");
            }
            return Ok(());
        };

        let actual = arguments.stack_footprint(self.slot_width);
        if actual != decoration.stack_bytes {
            return Err(FfiError::ArgumentSpecMismatch {
                expected: decoration.stack_bytes,
                actual,
            });
        }
        Ok(())
    }
}

/// Resolver for targets with a single C convention
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DefaultConvention;

impl ConventionResolver for DefaultConvention {
    fn resolve(&self, explicit: Option<&str>, _symbol: &str) -> FfiResult<CallingConvention> {
        if let Some(name) = explicit.filter(|name| !name.is_empty()) {
            CallingConvention::from_name(name)?;
        }
        Ok(CallingConvention::Cdecl)
    }

    fn verify(
        &self,
        _convention: CallingConvention,
        _symbol: &str,
        _arguments: &ArgumentSpec,
    ) -> FfiResult<()> {
        Ok(())
    }
}

/// The resolver matching the target this crate was built for
#[cfg(all(target_arch = "x86", windows))]
pub fn platform_resolver() -> &'static dyn ConventionResolver {
    static RESOLVER: DecoratedConventions = DecoratedConventions::new(DECORATED_SLOT_WIDTH);
    &RESOLVER
}

/// The resolver matching the target this crate was built for
#[cfg(not(all(target_arch = "x86", windows)))]
pub fn platform_resolver() -> &'static dyn ConventionResolver {
    static RESOLVER: DefaultConvention = DefaultConvention;
    &RESOLVER
}
