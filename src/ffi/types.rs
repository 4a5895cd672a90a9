//! Type Codec
//!
//! Maps the one-character type-code alphabet onto libffi type descriptors,
//! storage widths and host value types.
//!
//! ```text
//! code  type     native     width
//! ' '   void     void       0
//! 'b'   bool     uint8      1
//! 'x'   byte     uint8      1
//! 'h'   short    sint16     2
//! 'i'   int      sint32     4
//! 'j'   long     sint64     8
//! 'e'   real     float      4
//! 'f'   float    double     8
//! 'c'   char     char       1
//! ```

use std::ffi::c_char;
use std::fmt;
use std::ptr::addr_of_mut;

use libffi::low::{ffi_type, types};

use super::error::{FfiError, FfiResult};
use crate::host::{Cell, ValueType};

/// Most foreign arguments a single invocation can bind
pub const MAX_ARGUMENTS: usize = 7;

/// One entry of the closed type-code alphabet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeCode {
    Void,
    Bool,
    Byte,
    Short,
    Int,
    Long,
    Real,
    Float,
    Char,
}

impl TypeCode {
    /// Every code, in alphabet order
    pub const ALL: [TypeCode; 9] = [
        TypeCode::Void,
        TypeCode::Bool,
        TypeCode::Byte,
        TypeCode::Short,
        TypeCode::Int,
        TypeCode::Long,
        TypeCode::Real,
        TypeCode::Float,
        TypeCode::Char,
    ];

    pub fn from_char(code: char) -> FfiResult<Self> {
        match code {
            ' ' => Ok(Self::Void),
            'b' => Ok(Self::Bool),
            'x' => Ok(Self::Byte),
            'h' => Ok(Self::Short),
            'i' => Ok(Self::Int),
            'j' => Ok(Self::Long),
            'e' => Ok(Self::Real),
            'f' => Ok(Self::Float),
            'c' => Ok(Self::Char),
            other => Err(FfiError::UnsupportedTypeCode(other)),
        }
    }

    pub const fn as_char(self) -> char {
        match self {
            Self::Void => ' ',
            Self::Bool => 'b',
            Self::Byte => 'x',
            Self::Short => 'h',
            Self::Int => 'i',
            Self::Long => 'j',
            Self::Real => 'e',
            Self::Float => 'f',
            Self::Char => 'c',
        }
    }

    /// Native storage width in bytes
    #[inline]
    pub const fn size(self) -> usize {
        match self {
            Self::Void => 0,
            Self::Bool | Self::Byte | Self::Char => 1,
            Self::Short => 2,
            Self::Int | Self::Real => 4,
            Self::Long | Self::Float => 8,
        }
    }

    #[inline]
    pub const fn is_void(self) -> bool {
        matches!(self, Self::Void)
    }

    /// Integer-class codes, widened to `ffi_arg` when returned
    #[inline]
    pub const fn is_integral(self) -> bool {
        matches!(
            self,
            Self::Bool | Self::Byte | Self::Short | Self::Int | Self::Long | Self::Char
        )
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Self::Real | Self::Float)
    }

    /// Host type holding values of this code
    pub const fn value_type(self) -> ValueType {
        match self {
            Self::Void => ValueType::Unit,
            Self::Bool => ValueType::Bool,
            Self::Byte => ValueType::Byte,
            Self::Short => ValueType::Short,
            Self::Int => ValueType::Int,
            Self::Long => ValueType::Long,
            Self::Real => ValueType::Real,
            Self::Float => ValueType::Float,
            Self::Char => ValueType::Char,
        }
    }

    pub const fn from_value_type(ty: ValueType) -> Option<Self> {
        match ty {
            ValueType::Bool => Some(Self::Bool),
            ValueType::Byte => Some(Self::Byte),
            ValueType::Short => Some(Self::Short),
            ValueType::Int => Some(Self::Int),
            ValueType::Long => Some(Self::Long),
            ValueType::Real => Some(Self::Real),
            ValueType::Float => Some(Self::Float),
            ValueType::Char => Some(Self::Char),
            _ => None,
        }
    }

    /// libffi's builtin descriptor for this code.
    ///
    /// These are process-lifetime statics inside libffi; call descriptors
    /// store their addresses, and nothing here ever writes through them.
    pub fn ffi_type(self) -> *mut ffi_type {
        match self {
            Self::Void => addr_of_mut!(types::void),
            Self::Bool | Self::Byte => addr_of_mut!(types::uint8),
            Self::Short => addr_of_mut!(types::sint16),
            Self::Int => addr_of_mut!(types::sint32),
            Self::Long => addr_of_mut!(types::sint64),
            Self::Real => addr_of_mut!(types::float),
            Self::Float => addr_of_mut!(types::double),
            Self::Char if (c_char::MIN as i32) < 0 => addr_of_mut!(types::sint8),
            Self::Char => addr_of_mut!(types::uint8),
        }
    }

    /// Null bit pattern used to pre-fill result placeholders
    pub fn sentinel(self) -> Cell {
        match self {
            Self::Void | Self::Bool | Self::Byte => Cell::ZERO,
            Self::Short => Cell::from_i16(i16::MIN),
            Self::Int => Cell::from_i32(i32::MIN),
            Self::Long => Cell::from_i64(i64::MIN),
            Self::Real => Cell::from_f32(f32::NAN),
            Self::Float => Cell::from_f64(f64::NAN),
            Self::Char => Cell::from_u8(b' '),
        }
    }

    /// C spelling used in signatures and diagnostics
    pub const fn c_name(self) -> &'static str {
        match self {
            Self::Void => "void",
            Self::Bool => "bool",
            Self::Byte => "uint8_t",
            Self::Short => "int16_t",
            Self::Int => "int32_t",
            Self::Long => "int64_t",
            Self::Real => "float",
            Self::Float => "double",
            Self::Char => "char",
        }
    }

    pub fn describe(self) -> TypeDescription {
        TypeDescription {
            code: self,
            native: self.ffi_type(),
            storage_size: self.size(),
            is_void: self.is_void(),
        }
    }
}

impl fmt::Display for TypeCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ('{}')", self.value_type(), self.as_char())
    }
}

/// Everything the codec knows about one code
#[derive(Debug, Clone, Copy)]
pub struct TypeDescription {
    pub code: TypeCode,
    pub native: *mut ffi_type,
    pub storage_size: usize,
    pub is_void: bool,
}

/// Look up a type code character
pub fn describe(code: char) -> FfiResult<TypeDescription> {
    TypeCode::from_char(code).map(TypeCode::describe)
}

/// Ordered parameter types of a foreign function, fixed once bound
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct ArgumentSpec {
    codes: Vec<TypeCode>,
}

impl ArgumentSpec {
    /// Parse a string of argument type codes such as `"ii"`.
    ///
    /// The length check runs first so an oversized string is reported as
    /// such even when it also holds bad characters.
    pub fn parse(codes: &str) -> FfiResult<Self> {
        let count = codes.chars().count();
        if count > MAX_ARGUMENTS {
            return Err(FfiError::TooManyArguments(count));
        }
        let codes = codes
            .chars()
            .map(|c| match TypeCode::from_char(c)? {
                TypeCode::Void => Err(FfiError::UnsupportedTypeCode(c)),
                code => Ok(code),
            })
            .collect::<FfiResult<Vec<_>>>()?;
        Ok(Self { codes })
    }

    pub fn new(codes: Vec<TypeCode>) -> FfiResult<Self> {
        if codes.len() > MAX_ARGUMENTS {
            return Err(FfiError::TooManyArguments(codes.len()));
        }
        if codes.contains(&TypeCode::Void) {
            return Err(FfiError::UnsupportedTypeCode(' '));
        }
        Ok(Self { codes })
    }

    pub fn arity(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn codes(&self) -> &[TypeCode] {
        &self.codes
    }

    /// Stack bytes when every argument occupies at least one slot of
    /// `slot_width` bytes
    pub fn stack_footprint(&self, slot_width: usize) -> usize {
        self.codes.iter().map(|c| c.size().max(slot_width)).sum()
    }
}

impl fmt::Display for ArgumentSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for code in &self.codes {
            write!(f, "{}", code.as_char())?;
        }
        Ok(())
    }
}

/// Return and parameter types of a bound function
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub return_type: TypeCode,
    pub arguments: ArgumentSpec,
}

impl Signature {
    pub fn new(name: impl Into<String>, return_type: TypeCode, arguments: ArgumentSpec) -> Self {
        Self {
            name: name.into(),
            return_type,
            arguments,
        }
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}(", self.return_type.c_name(), self.name)?;
        for (i, code) in self.arguments.codes().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{}", code.c_name())?;
        }
        write!(f, ")")
    }
}
