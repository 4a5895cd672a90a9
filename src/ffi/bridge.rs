//! Host-facing entry points.
//!
//! `try_*` methods report typed [`FfiError`]s. Their plain counterparts
//! are what the host sees: the same operation with any failure folded
//! into an error value.

use tracing::debug;

use super::dispatch::DispatchShim;
use super::error::{FfiError, FfiResult};
use super::registry::InvocationRegistry;
use super::types::{ArgumentSpec, TypeCode, MAX_ARGUMENTS};
use crate::host::Value;

/// Loads foreign functions and accesses foreign variables for the host
#[derive(Clone, Copy)]
pub struct ForeignBridge {
    shim: DispatchShim,
}

impl ForeignBridge {
    pub fn new(registry: &'static InvocationRegistry) -> Self {
        Self {
            shim: DispatchShim::new(registry),
        }
    }

    /// Bridge over the process-wide registry
    pub fn global() -> Self {
        Self::new(InvocationRegistry::global())
    }

    pub fn registry(&self) -> &'static InvocationRegistry {
        self.shim.registry()
    }

    /// Bind `symbol` in `library` and return a host callable for it.
    ///
    /// Type codes are checked before the library is touched. An existing
    /// invocation for the same key is re-targeted to the new types.
    pub fn try_load_function(
        &self,
        library: &str,
        symbol: &str,
        convention: Option<&str>,
        return_code: char,
        argument_codes: &str,
    ) -> FfiResult<Value> {
        let count = argument_codes.chars().count();
        if count > MAX_ARGUMENTS {
            return Err(FfiError::TooManyArguments(count));
        }
        let arguments = ArgumentSpec::parse(argument_codes)?;
        let return_type = TypeCode::from_char(return_code)?;

        let invocation = self.registry().get_or_create(library, symbol)?;
        invocation.load_typed(symbol, return_type, arguments, convention)?;
        self.shim.wrap(library, symbol)
    }

    pub fn load_function(
        &self,
        library: &str,
        symbol: &str,
        convention: Option<&str>,
        return_code: char,
        argument_codes: &str,
    ) -> Value {
        self.try_load_function(library, symbol, convention, return_code, argument_codes)
            .unwrap_or_else(|e| Self::report("load", symbol, e))
    }

    /// Current value of an exported variable.
    ///
    /// The (library, symbol) entry is re-targeted to variable mode, so a
    /// callable previously returned for the same key answers with a
    /// "not a function" error until the key is loaded as a function again.
    pub fn try_read_variable(&self, library: &str, variable: &str, code: char) -> FfiResult<Value> {
        let invocation = self.registry().get_or_create(library, variable)?;
        invocation.load_variable(variable, code)?;
        invocation.read()
    }

    /// Same as [`Self::try_read_variable`], with errors as host error values
    pub fn read_variable(&self, library: &str, variable: &str, code: char) -> Value {
        self.try_read_variable(library, variable, code)
            .unwrap_or_else(|e| Self::report("read", variable, e))
    }

    /// Overwrite an exported variable with `value` converted to `code`.
    ///
    /// Re-targets the key to variable mode, like [`Self::try_read_variable`].
    pub fn try_write_variable(
        &self,
        library: &str,
        variable: &str,
        code: char,
        value: &Value,
    ) -> FfiResult<()> {
        let invocation = self.registry().get_or_create(library, variable)?;
        invocation.load_variable(variable, code)?;
        invocation.write(value)
    }

    /// Unit on success. Re-targets the key like [`Self::try_write_variable`].
    pub fn write_variable(&self, library: &str, variable: &str, code: char, value: &Value) -> Value {
        match self.try_write_variable(library, variable, code, value) {
            Ok(()) => Value::unit(),
            Err(e) => Self::report("write", variable, e),
        }
    }

    fn report(operation: &str, symbol: &str, error: FfiError) -> Value {
        debug!(operation, symbol, %error, "foreign operation failed");
        Value::error(error.to_string())
    }
}
