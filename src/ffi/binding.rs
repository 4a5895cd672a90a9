//! Argument Binding
//!
//! Per-parameter marshaling between host values and the raw storage a
//! native call reads from or writes into.

use std::ffi::c_void;
use std::ptr;

use super::error::{FfiError, FfiResult};
use super::types::TypeCode;
use crate::host::{Cell, Value, ValueType};

/// A host value made ready for a native call.
///
/// Scratch values are owned here and live until this is dropped, which
/// the invocation does only after the native call has returned.
#[derive(Debug)]
pub enum Marshaled<'v> {
    /// Void slot
    Null,
    /// The caller's value already had the bound type
    Borrowed(&'v Value),
    /// Freshly converted copy
    Scratch(Value),
}

impl Marshaled<'_> {
    /// Address of the storage libffi reads the argument from
    pub fn as_ptr(&self) -> *mut c_void {
        match self {
            Marshaled::Null => ptr::null_mut(),
            Marshaled::Borrowed(value) => cell_ptr(value),
            Marshaled::Scratch(value) => cell_ptr(value),
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            Marshaled::Null => None,
            Marshaled::Borrowed(value) => Some(value),
            Marshaled::Scratch(value) => Some(value),
        }
    }

    pub fn is_zero_copy(&self) -> bool {
        matches!(self, Marshaled::Borrowed(_))
    }
}

fn cell_ptr(value: &Value) -> *mut c_void {
    value
        .cell()
        .map_or(ptr::null_mut(), |cell| cell.as_ptr() as *mut c_void)
}

/// Numeric payload in transit between two scalar types
#[derive(Debug, Clone, Copy)]
enum Number {
    /// `None` is the integer null
    Int(Option<i64>),
    Float(f64),
}

impl Number {
    fn read(ty: ValueType, cell: &Cell) -> Option<Self> {
        let n = match ty {
            ValueType::Bool => Number::Int(Some(cell.to_bool() as i64)),
            ValueType::Byte => Number::Int(Some(cell.to_u8() as i64)),
            ValueType::Short => Number::Int(Some(cell.to_i16()).filter(|v| *v != i16::MIN).map(i64::from)),
            ValueType::Int => Number::Int(Some(cell.to_i32()).filter(|v| *v != i32::MIN).map(i64::from)),
            ValueType::Long => Number::Int(Some(cell.to_i64()).filter(|v| *v != i64::MIN)),
            ValueType::Real => Number::Float(cell.to_f32() as f64),
            ValueType::Float => Number::Float(cell.to_f64()),
            _ => return None,
        };
        Some(n)
    }

    /// Integer view, with NaN folded into null and floats truncated
    fn int(self) -> Option<i64> {
        match self {
            Number::Int(v) => v,
            Number::Float(f) if f.is_nan() => None,
            Number::Float(f) => Some(f as i64),
        }
    }

    fn float(self) -> f64 {
        match self {
            Number::Int(Some(v)) => v as f64,
            Number::Int(None) => f64::NAN,
            Number::Float(f) => f,
        }
    }

    fn write(self, code: TypeCode) -> Cell {
        match code {
            TypeCode::Bool => Cell::from_bool(match self {
                Number::Int(v) => v.unwrap_or(0) != 0,
                Number::Float(f) => !f.is_nan() && f != 0.0,
            }),
            TypeCode::Byte => Cell::from_u8(self.int().unwrap_or(0) as u8),
            TypeCode::Short => Cell::from_i16(self.int().map_or(i16::MIN, |v| v as i16)),
            TypeCode::Int => Cell::from_i32(self.int().map_or(i32::MIN, |v| v as i32)),
            TypeCode::Long => Cell::from_i64(self.int().unwrap_or(i64::MIN)),
            TypeCode::Real => Cell::from_f32(self.float() as f32),
            TypeCode::Float => Cell::from_f64(self.float()),
            TypeCode::Void | TypeCode::Char => Cell::ZERO,
        }
    }
}

/// Marshaling strategy for one parameter or return slot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgumentBinding {
    code: TypeCode,
}

impl ArgumentBinding {
    pub const fn new(code: TypeCode) -> Self {
        Self { code }
    }

    pub const fn void() -> Self {
        Self::new(TypeCode::Void)
    }

    #[inline]
    pub const fn code(&self) -> TypeCode {
        self.code
    }

    #[inline]
    pub const fn size(&self) -> usize {
        self.code.size()
    }

    /// Prepare `value` for the native call.
    ///
    /// Values of exactly the bound type are passed in place; others are
    /// converted into a scratch value.
    pub fn extract<'v>(&self, value: &'v Value) -> FfiResult<Marshaled<'v>> {
        if self.code.is_void() {
            return Ok(Marshaled::Null);
        }
        if value.value_type() == self.code.value_type() && value.cell().is_some() {
            return Ok(Marshaled::Borrowed(value));
        }
        let cell = self.coerce(value)?;
        Ok(Marshaled::Scratch(Value::atom(self.code.value_type(), cell)))
    }

    /// Convert a scalar host value into storage for the bound type
    pub fn coerce(&self, value: &Value) -> FfiResult<Cell> {
        let source = value.value_type();
        let mismatch = || FfiError::TypeMismatch {
            expected: self.code,
            found: source,
        };
        let cell = value.cell().ok_or_else(mismatch)?;

        match (self.code, source) {
            (TypeCode::Void, _) => Err(mismatch()),
            (TypeCode::Char | TypeCode::Byte, ValueType::Char)
            | (TypeCode::Char, ValueType::Byte) => Ok(Cell::from_u8(cell.to_u8())),
            (TypeCode::Char, _) | (_, ValueType::Char) => Err(mismatch()),
            (code, source) => Number::read(source, cell)
                .map(|n| n.write(code))
                .ok_or_else(mismatch),
        }
    }

    /// Copy the leading `size()` bytes of a raw native result into `target`.
    ///
    /// `raw` may be wider than the bound type (a register-width result
    /// slot); bytes past `size()` are never read.
    pub fn write_back(&self, target: &mut Value, raw: &[u8]) -> FfiResult<()> {
        if self.code.is_void() {
            return Ok(());
        }
        let size = self.size();
        let bytes = raw.get(..size).ok_or_else(|| {
            FfiError::BadCallDescriptor(format!(
                "{}-byte result slot for {}-byte {}",
                raw.len(),
                size,
                self.code
            ))
        })?;
        let found = target.value_type();
        if found != self.code.value_type() {
            return Err(FfiError::TypeMismatch {
                expected: self.code,
                found,
            });
        }
        let cell = target.cell_mut().ok_or(FfiError::TypeMismatch {
            expected: self.code,
            found,
        })?;
        cell.bytes_mut()[..size].copy_from_slice(bytes);
        Ok(())
    }

    /// A value of the bound type holding its null sentinel
    pub fn create_placeholder(&self) -> Value {
        if self.code.is_void() {
            return Value::unit();
        }
        Value::atom(self.code.value_type(), self.code.sentinel())
    }

    /// Placeholder filled from raw bytes
    pub fn read(&self, raw: &[u8]) -> FfiResult<Value> {
        let mut value = self.create_placeholder();
        self.write_back(&mut value, raw)?;
        Ok(value)
    }
}
