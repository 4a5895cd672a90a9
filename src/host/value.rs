//! Tagged, reference-counted host values.

use std::fmt;
use std::sync::Arc;

use super::native::Projection;

/// Runtime type of a host value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ValueType {
    /// Generic null `(::)`
    Unit,
    /// 1-byte boolean
    Bool,
    /// 8-bit unsigned byte
    Byte,
    /// 16-bit signed integer
    Short,
    /// 32-bit signed integer
    Int,
    /// 64-bit signed integer
    Long,
    /// 32-bit floating point
    Real,
    /// 64-bit floating point
    Float,
    /// 8-bit character
    Char,
    /// Interned-style name
    Symbol,
    /// Error carrying a message
    Error,
    /// Native function with bound leading arguments
    Projection,
}

impl ValueType {
    /// Atom tag in q numbering (vectors use the negation)
    pub const fn tag(self) -> i8 {
        match self {
            Self::Unit => 101,
            Self::Bool => -1,
            Self::Byte => -4,
            Self::Short => -5,
            Self::Int => -6,
            Self::Long => -7,
            Self::Real => -8,
            Self::Float => -9,
            Self::Char => -10,
            Self::Symbol => -11,
            Self::Error => -128,
            Self::Projection => 104,
        }
    }

    /// Storage width in bytes for scalar types, 0 otherwise
    pub const fn width(self) -> usize {
        match self {
            Self::Bool | Self::Byte | Self::Char => 1,
            Self::Short => 2,
            Self::Int | Self::Real => 4,
            Self::Long | Self::Float => 8,
            Self::Unit | Self::Symbol | Self::Error | Self::Projection => 0,
        }
    }

    /// Scalar types live in a storage [`Cell`]
    pub const fn is_scalar(self) -> bool {
        self.width() > 0
    }

    /// Types that take part in numeric conversion
    pub const fn is_numeric(self) -> bool {
        matches!(
            self,
            Self::Bool | Self::Byte | Self::Short | Self::Int | Self::Long | Self::Real | Self::Float
        )
    }

    pub const fn is_float(self) -> bool {
        matches!(self, Self::Real | Self::Float)
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Unit => "unit",
            Self::Bool => "bool",
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Real => "real",
            Self::Float => "float",
            Self::Char => "char",
            Self::Symbol => "symbol",
            Self::Error => "error",
            Self::Projection => "projection",
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Fixed-width scalar storage, aligned for any scalar it holds.
///
/// Scalars are stored in native byte order starting at offset 0.
#[derive(Clone, Copy, Default, PartialEq, Eq)]
#[repr(C, align(8))]
pub struct Cell([u8; 8]);

macro_rules! cell_scalars {
    ($($from:ident, $to:ident, $ty:ty;)*) => {
        $(
            #[inline]
            pub fn $from(value: $ty) -> Self {
                let mut cell = Self::ZERO;
                let bytes = value.to_ne_bytes();
                cell.0[..bytes.len()].copy_from_slice(&bytes);
                cell
            }

            #[inline]
            pub fn $to(&self) -> $ty {
                let mut bytes = [0u8; std::mem::size_of::<$ty>()];
                bytes.copy_from_slice(&self.0[..std::mem::size_of::<$ty>()]);
                <$ty>::from_ne_bytes(bytes)
            }
        )*
    };
}

impl Cell {
    pub const ZERO: Cell = Cell([0; 8]);

    cell_scalars! {
        from_u8, to_u8, u8;
        from_i16, to_i16, i16;
        from_i32, to_i32, i32;
        from_i64, to_i64, i64;
        from_f32, to_f32, f32;
        from_f64, to_f64, f64;
    }

    /// Copy up to 8 leading bytes into a fresh cell
    pub fn from_bytes(bytes: &[u8]) -> Self {
        let mut cell = Self::ZERO;
        let n = bytes.len().min(cell.0.len());
        cell.0[..n].copy_from_slice(&bytes[..n]);
        cell
    }

    pub fn from_bool(value: bool) -> Self {
        Self::from_u8(value as u8)
    }

    pub fn to_bool(&self) -> bool {
        self.0[0] != 0
    }

    pub fn bytes(&self) -> &[u8; 8] {
        &self.0
    }

    pub fn bytes_mut(&mut self) -> &mut [u8; 8] {
        &mut self.0
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.0.as_ptr()
    }

    pub fn as_mut_ptr(&mut self) -> *mut u8 {
        self.0.as_mut_ptr()
    }
}

impl fmt::Debug for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Cell({:02x?})", self.0)
    }
}

#[derive(Clone)]
enum Repr {
    Unit,
    Atom(ValueType, Cell),
    Vector(ValueType, Vec<Cell>),
    Symbol(String),
    Error(String),
    Projection(Projection),
}

/// A host value.
///
/// Cloning takes another reference; the payload is freed when the last
/// reference goes away. Mutation through [`Value::cell_mut`] is
/// copy-on-write, so a value shared with someone else never changes
/// under them.
#[derive(Clone)]
pub struct Value(Arc<Repr>);

impl Value {
    fn new(repr: Repr) -> Self {
        Self(Arc::new(repr))
    }

    /// The generic null `(::)`
    pub fn unit() -> Self {
        Self::new(Repr::Unit)
    }

    /// Scalar atom from raw storage. Non-scalar types yield unit.
    pub fn atom(ty: ValueType, cell: Cell) -> Self {
        if ty.is_scalar() {
            Self::new(Repr::Atom(ty, cell))
        } else {
            Self::unit()
        }
    }

    pub fn bool(value: bool) -> Self {
        Self::atom(ValueType::Bool, Cell::from_bool(value))
    }

    pub fn byte(value: u8) -> Self {
        Self::atom(ValueType::Byte, Cell::from_u8(value))
    }

    pub fn short(value: i16) -> Self {
        Self::atom(ValueType::Short, Cell::from_i16(value))
    }

    pub fn int(value: i32) -> Self {
        Self::atom(ValueType::Int, Cell::from_i32(value))
    }

    pub fn long(value: i64) -> Self {
        Self::atom(ValueType::Long, Cell::from_i64(value))
    }

    pub fn real(value: f32) -> Self {
        Self::atom(ValueType::Real, Cell::from_f32(value))
    }

    pub fn float(value: f64) -> Self {
        Self::atom(ValueType::Float, Cell::from_f64(value))
    }

    pub fn char(value: u8) -> Self {
        Self::atom(ValueType::Char, Cell::from_u8(value))
    }

    pub fn symbol(name: impl Into<String>) -> Self {
        Self::new(Repr::Symbol(name.into()))
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::new(Repr::Error(message.into()))
    }

    /// Typed vector. Non-scalar element types yield unit.
    pub fn vector(ty: ValueType, cells: Vec<Cell>) -> Self {
        if ty.is_scalar() {
            Self::new(Repr::Vector(ty, cells))
        } else {
            Self::unit()
        }
    }

    /// Char vector holding the bytes of `text`
    pub fn string(text: &str) -> Self {
        Self::vector(
            ValueType::Char,
            text.bytes().map(Cell::from_u8).collect(),
        )
    }

    pub fn projection(projection: Projection) -> Self {
        Self::new(Repr::Projection(projection))
    }

    /// Runtime type (element type for vectors)
    pub fn value_type(&self) -> ValueType {
        match &*self.0 {
            Repr::Unit => ValueType::Unit,
            Repr::Atom(ty, _) | Repr::Vector(ty, _) => *ty,
            Repr::Symbol(_) => ValueType::Symbol,
            Repr::Error(_) => ValueType::Error,
            Repr::Projection(_) => ValueType::Projection,
        }
    }

    /// q type tag: negative for atoms, positive for vectors
    pub fn tag(&self) -> i8 {
        match &*self.0 {
            Repr::Vector(ty, _) => -ty.tag(),
            _ => self.value_type().tag(),
        }
    }

    pub fn is_vector(&self) -> bool {
        matches!(&*self.0, Repr::Vector(..))
    }

    pub fn is_unit(&self) -> bool {
        matches!(&*self.0, Repr::Unit)
    }

    pub fn is_error(&self) -> bool {
        matches!(&*self.0, Repr::Error(_))
    }

    /// Element count: vectors report their length, everything else 1
    pub fn count(&self) -> usize {
        match &*self.0 {
            Repr::Vector(_, cells) => cells.len(),
            _ => 1,
        }
    }

    /// Storage of a scalar atom or a one-element vector
    pub fn cell(&self) -> Option<&Cell> {
        match &*self.0 {
            Repr::Atom(_, cell) => Some(cell),
            Repr::Vector(_, cells) if cells.len() == 1 => cells.first(),
            _ => None,
        }
    }

    /// Mutable storage, detaching from other references first
    pub fn cell_mut(&mut self) -> Option<&mut Cell> {
        match Arc::make_mut(&mut self.0) {
            Repr::Atom(_, cell) => Some(cell),
            Repr::Vector(_, cells) if cells.len() == 1 => cells.first_mut(),
            _ => None,
        }
    }

    pub fn cells(&self) -> Option<&[Cell]> {
        match &*self.0 {
            Repr::Atom(_, cell) => Some(std::slice::from_ref(cell)),
            Repr::Vector(_, cells) => Some(cells),
            _ => None,
        }
    }

    pub fn as_symbol(&self) -> Option<&str> {
        match &*self.0 {
            Repr::Symbol(name) => Some(name),
            _ => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &*self.0 {
            Repr::Error(message) => Some(message),
            _ => None,
        }
    }

    /// Contents of a char vector
    pub fn text(&self) -> Option<String> {
        match &*self.0 {
            Repr::Vector(ValueType::Char, cells) => {
                Some(cells.iter().map(|c| c.to_u8() as char).collect())
            }
            Repr::Atom(ValueType::Char, cell) => Some((cell.to_u8() as char).to_string()),
            _ => None,
        }
    }

    pub fn as_projection(&self) -> Option<&Projection> {
        match &*self.0 {
            Repr::Projection(projection) => Some(projection),
            _ => None,
        }
    }

    /// Integer view of an integral scalar
    pub fn as_i64(&self) -> Option<i64> {
        let cell = self.cell()?;
        match self.value_type() {
            ValueType::Bool | ValueType::Byte | ValueType::Char => Some(cell.to_u8() as i64),
            ValueType::Short => Some(cell.to_i16() as i64),
            ValueType::Int => Some(cell.to_i32() as i64),
            ValueType::Long => Some(cell.to_i64()),
            _ => None,
        }
    }

    /// Floating view of a numeric scalar
    pub fn as_f64(&self) -> Option<f64> {
        let cell = self.cell()?;
        match self.value_type() {
            ValueType::Real => Some(cell.to_f32() as f64),
            ValueType::Float => Some(cell.to_f64()),
            _ => self.as_i64().map(|v| v as f64),
        }
    }

    /// Number of live references to this value
    pub fn ref_count(&self) -> usize {
        Arc::strong_count(&self.0)
    }

    /// True when both handles refer to the same allocation
    pub fn ptr_eq(&self, other: &Value) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

fn fmt_scalar(f: &mut fmt::Formatter<'_>, ty: ValueType, cell: &Cell) -> fmt::Result {
    match ty {
        ValueType::Bool => write!(f, "{}b", cell.to_u8() & 1),
        ValueType::Byte => write!(f, "0x{:02x}", cell.to_u8()),
        ValueType::Short => match cell.to_i16() {
            i16::MIN => f.write_str("0Nh"),
            v => write!(f, "{}h", v),
        },
        ValueType::Int => match cell.to_i32() {
            i32::MIN => f.write_str("0Ni"),
            v => write!(f, "{}i", v),
        },
        ValueType::Long => match cell.to_i64() {
            i64::MIN => f.write_str("0N"),
            v => write!(f, "{}", v),
        },
        ValueType::Real => match cell.to_f32() {
            v if v.is_nan() => f.write_str("0Ne"),
            v => write!(f, "{}e", v),
        },
        ValueType::Float => match cell.to_f64() {
            v if v.is_nan() => f.write_str("0n"),
            v => write!(f, "{}f", v),
        },
        ValueType::Char => write!(f, "\"{}\"", cell.to_u8() as char),
        _ => f.write_str("::"),
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.0 {
            Repr::Unit => f.write_str("::"),
            Repr::Atom(ty, cell) => fmt_scalar(f, *ty, cell),
            Repr::Vector(ValueType::Char, _) => {
                write!(f, "\"{}\"", self.text().unwrap_or_default())
            }
            Repr::Vector(ty, cells) => {
                if cells.len() == 1 {
                    f.write_str(",")?;
                }
                for (i, cell) in cells.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    fmt_scalar(f, *ty, cell)?;
                }
                Ok(())
            }
            Repr::Symbol(name) => write!(f, "`{}", name),
            Repr::Error(message) => write!(f, "'{}", message),
            Repr::Projection(projection) => write!(f, "{:?}", projection),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Value({}: {})", self.tag(), self)
    }
}
