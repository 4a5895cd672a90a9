//! Native call descriptors.
//!
//! A prepared `ffi_cif` keeps raw pointers to its argument type array and
//! to the type descriptors themselves. Both live on the heap here, so the
//! descriptor can move freely while those addresses stay put.

use std::ffi::c_void;
use std::fmt;
use std::mem::size_of;
use std::ptr::NonNull;

use libffi::low::{self, ffi_arg, ffi_cif, ffi_type};
use tracing::debug;

use super::convention::CallingConvention;
use super::error::{FfiError, FfiResult};
use super::types::{ArgumentSpec, TypeCode};

/// Bytes reserved for a raw call result
pub const RESULT_SLOT_SIZE: usize = 8;

const _: () = assert!(size_of::<ffi_arg>() <= RESULT_SLOT_SIZE);

/// Register-width buffer libffi writes the return value into
#[derive(Clone, Copy)]
#[repr(C, align(8))]
pub struct ResultSlot([u8; RESULT_SLOT_SIZE]);

impl ResultSlot {
    pub const fn new() -> Self {
        Self([0; RESULT_SLOT_SIZE])
    }

    /// Result bytes for `code`, starting at the value's first byte.
    ///
    /// libffi widens integral results narrower than `ffi_arg` to a full
    /// `ffi_arg`; on big-endian targets the value then sits at the end.
    pub fn bytes(&self, code: TypeCode) -> &[u8] {
        let size = code.size();
        let offset = if cfg!(target_endian = "big")
            && code.is_integral()
            && size < size_of::<ffi_arg>()
        {
            size_of::<ffi_arg>() - size
        } else {
            0
        };
        &self.0[offset..]
    }

    fn as_mut_ptr(&mut self) -> *mut c_void {
        self.0.as_mut_ptr().cast()
    }
}

impl Default for ResultSlot {
    fn default() -> Self {
        Self::new()
    }
}

/// A prepared libffi call interface for one signature and ABI
pub struct NativeCallDescriptor {
    cif: Box<ffi_cif>,
    arg_types: Box<[*mut ffi_type]>,
    return_type: TypeCode,
    arguments: ArgumentSpec,
    convention: CallingConvention,
}

// Safety: once prepared, neither the cif nor the type array is written
// again, and every ffi_type pointer refers to a libffi static.
unsafe impl Send for NativeCallDescriptor {}
unsafe impl Sync for NativeCallDescriptor {}

impl NativeCallDescriptor {
    /// Build and prepare the call interface
    pub fn prepare(
        return_type: TypeCode,
        arguments: &ArgumentSpec,
        convention: CallingConvention,
    ) -> FfiResult<Self> {
        let abi = convention.ffi_abi().ok_or_else(|| {
            FfiError::BadCallDescriptor(format!("{} is not available on this target", convention))
        })?;

        let mut arg_types: Box<[*mut ffi_type]> =
            arguments.codes().iter().map(|code| code.ffi_type()).collect();
        let mut cif: Box<ffi_cif> = Box::default();

        unsafe {
            low::prep_cif(
                &mut *cif,
                abi,
                arg_types.len(),
                return_type.ffi_type(),
                arg_types.as_mut_ptr(),
            )
        }
        .map_err(|e| {
            FfiError::BadCallDescriptor(format!(
                "libffi rejected {} ({}) under {}: {:?}",
                return_type.c_name(),
                arguments,
                convention,
                e
            ))
        })?;

        debug!(
            ret = %return_type.as_char(),
            args = %arguments,
            %convention,
            "prepared call descriptor"
        );
        Ok(Self {
            cif,
            arg_types,
            return_type,
            arguments: arguments.clone(),
            convention,
        })
    }

    pub fn return_type(&self) -> TypeCode {
        self.return_type
    }

    pub fn arguments(&self) -> &ArgumentSpec {
        &self.arguments
    }

    pub fn convention(&self) -> CallingConvention {
        self.convention
    }

    pub fn arity(&self) -> usize {
        self.arg_types.len()
    }

    /// Call `code` through this descriptor.
    ///
    /// # Safety
    ///
    /// - `code` must be a function with exactly this signature and ABI
    /// - `args` must hold one pointer per parameter, each to readable
    ///   storage of at least that parameter's width
    pub unsafe fn invoke(&self, code: NonNull<c_void>, args: &mut [*mut c_void]) -> ResultSlot {
        debug_assert_eq!(args.len(), self.arg_types.len());

        let mut slot = ResultSlot::new();
        let fun: unsafe extern "C" fn() = std::mem::transmute(code.as_ptr());
        // ffi_call takes the cif mutably but only reads it.
        let cif = &*self.cif as *const ffi_cif as *mut ffi_cif;
        libffi::raw::ffi_call(cif, Some(fun), slot.as_mut_ptr(), args.as_mut_ptr());
        slot
    }
}

impl fmt::Debug for NativeCallDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NativeCallDescriptor")
            .field("return_type", &self.return_type)
            .field("arguments", &self.arguments.to_string())
            .field("convention", &self.convention)
            .finish()
    }
}
