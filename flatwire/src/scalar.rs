//! Fixed-width scalar wire types.
//!
//! [`Primitive`] is implemented for every Rust type with a scalar wire representation and is
//! what typed accessors are generic over. [`ScalarType`] and [`Scalar`] are the term-level
//! counterparts used by schema descriptors and owned value graphs.
use {core::fmt, pastey::paste};

/// Wire type of a scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(test, derive(proptest_derive::Arbitrary))]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ScalarType {
    Bool,
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
}

impl ScalarType {
    /// Encoded width in bytes. Scalars are aligned to their width.
    pub const fn width(self) -> usize {
        match self {
            ScalarType::Bool | ScalarType::U8 | ScalarType::I8 => 1,
            ScalarType::U16 | ScalarType::I16 => 2,
            ScalarType::U32 | ScalarType::I32 | ScalarType::F32 => 4,
            ScalarType::U64 | ScalarType::I64 | ScalarType::F64 => 8,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ScalarType::Bool => "bool",
            ScalarType::U8 => "u8",
            ScalarType::I8 => "i8",
            ScalarType::U16 => "u16",
            ScalarType::I16 => "i16",
            ScalarType::U32 => "u32",
            ScalarType::I32 => "i32",
            ScalarType::U64 => "u64",
            ScalarType::I64 => "i64",
            ScalarType::F32 => "f32",
            ScalarType::F64 => "f64",
        }
    }

    /// The zero value of this type, used as the default when a schema names none.
    pub const fn zero(self) -> Scalar {
        match self {
            ScalarType::Bool => Scalar::Bool(false),
            ScalarType::U8 => Scalar::U8(0),
            ScalarType::I8 => Scalar::I8(0),
            ScalarType::U16 => Scalar::U16(0),
            ScalarType::I16 => Scalar::I16(0),
            ScalarType::U32 => Scalar::U32(0),
            ScalarType::I32 => Scalar::I32(0),
            ScalarType::U64 => Scalar::U64(0),
            ScalarType::I64 => Scalar::I64(0),
            ScalarType::F32 => Scalar::F32(0.0),
            ScalarType::F64 => Scalar::F64(0.0),
        }
    }
}

impl fmt::Display for ScalarType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A scalar value tagged with its wire type.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Scalar {
    Bool(bool),
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
}

mod sealed {
    pub trait Sealed {}
}

/// A Rust type with a fixed-width little-endian wire representation.
///
/// Sealed: the set of scalar wire types is closed.
pub trait Primitive: Copy + PartialEq + fmt::Debug + sealed::Sealed {
    const TYPE: ScalarType;
    const WIDTH: usize = Self::TYPE.width();

    /// Decode from exactly [`Self::WIDTH`] little-endian bytes.
    ///
    /// # Panics
    ///
    /// Panics if `bytes.len() != Self::WIDTH`.
    fn from_le_slice(bytes: &[u8]) -> Self;

    /// Encode into exactly [`Self::WIDTH`] bytes.
    ///
    /// # Panics
    ///
    /// Panics if `dst.len() != Self::WIDTH`.
    fn write_le_slice(self, dst: &mut [u8]);

    fn into_scalar(self) -> Scalar;

    fn from_scalar(scalar: Scalar) -> Option<Self>;
}

impl sealed::Sealed for bool {}

impl Primitive for bool {
    const TYPE: ScalarType = ScalarType::Bool;

    #[inline]
    fn from_le_slice(bytes: &[u8]) -> Self {
        let [byte] = bytes else {
            panic!("bool is encoded in exactly one byte");
        };
        *byte != 0
    }

    #[inline]
    fn write_le_slice(self, dst: &mut [u8]) {
        dst.copy_from_slice(&[u8::from(self)]);
    }

    #[inline]
    fn into_scalar(self) -> Scalar {
        Scalar::Bool(self)
    }

    #[inline]
    fn from_scalar(scalar: Scalar) -> Option<Self> {
        match scalar {
            Scalar::Bool(value) => Some(value),
            _ => None,
        }
    }
}

/// Implement [`Primitive`] and the [`Scalar`] conversions for numeric types.
macro_rules! impl_numeric {
    ($($variant:ident => $ty:ty),* $(,)?) => {
        $(
            impl sealed::Sealed for $ty {}

            impl Primitive for $ty {
                const TYPE: ScalarType = ScalarType::$variant;

                #[inline]
                fn from_le_slice(bytes: &[u8]) -> Self {
                    let mut raw = [0u8; size_of::<$ty>()];
                    raw.copy_from_slice(bytes);
                    <$ty>::from_le_bytes(raw)
                }

                #[inline]
                fn write_le_slice(self, dst: &mut [u8]) {
                    dst.copy_from_slice(&self.to_le_bytes());
                }

                #[inline]
                fn into_scalar(self) -> Scalar {
                    Scalar::$variant(self)
                }

                #[inline]
                fn from_scalar(scalar: Scalar) -> Option<Self> {
                    match scalar {
                        Scalar::$variant(value) => Some(value),
                        _ => None,
                    }
                }
            }

            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Scalar::$variant(value)
                }
            }

            paste! {
                impl Scalar {
                    #[doc = concat!("The value as `", stringify!($ty), "`, if it has that wire type.")]
                    #[inline]
                    pub const fn [<as_ $ty>](&self) -> Option<$ty> {
                        match self {
                            Scalar::$variant(value) => Some(*value),
                            _ => None,
                        }
                    }
                }
            }
        )*
    };
}

impl_numeric!(
    U8 => u8,
    I8 => i8,
    U16 => u16,
    I16 => i16,
    U32 => u32,
    I32 => i32,
    U64 => u64,
    I64 => i64,
    F32 => f32,
    F64 => f64,
);

impl From<bool> for Scalar {
    fn from(value: bool) -> Self {
        Scalar::Bool(value)
    }
}

impl Scalar {
    pub const fn scalar_type(&self) -> ScalarType {
        match self {
            Scalar::Bool(_) => ScalarType::Bool,
            Scalar::U8(_) => ScalarType::U8,
            Scalar::I8(_) => ScalarType::I8,
            Scalar::U16(_) => ScalarType::U16,
            Scalar::I16(_) => ScalarType::I16,
            Scalar::U32(_) => ScalarType::U32,
            Scalar::I32(_) => ScalarType::I32,
            Scalar::U64(_) => ScalarType::U64,
            Scalar::I64(_) => ScalarType::I64,
            Scalar::F32(_) => ScalarType::F32,
            Scalar::F64(_) => ScalarType::F64,
        }
    }

    #[inline]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Scalar::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Decode a scalar of type `ty` from exactly `ty.width()` bytes.
    pub fn from_le_slice(ty: ScalarType, bytes: &[u8]) -> Scalar {
        match ty {
            ScalarType::Bool => bool::from_le_slice(bytes).into(),
            ScalarType::U8 => u8::from_le_slice(bytes).into(),
            ScalarType::I8 => i8::from_le_slice(bytes).into(),
            ScalarType::U16 => u16::from_le_slice(bytes).into(),
            ScalarType::I16 => i16::from_le_slice(bytes).into(),
            ScalarType::U32 => u32::from_le_slice(bytes).into(),
            ScalarType::I32 => i32::from_le_slice(bytes).into(),
            ScalarType::U64 => u64::from_le_slice(bytes).into(),
            ScalarType::I64 => i64::from_le_slice(bytes).into(),
            ScalarType::F32 => f32::from_le_slice(bytes).into(),
            ScalarType::F64 => f64::from_le_slice(bytes).into(),
        }
    }

    /// Encode into exactly `self.scalar_type().width()` bytes.
    pub fn write_le_slice(self, dst: &mut [u8]) {
        match self {
            Scalar::Bool(value) => value.write_le_slice(dst),
            Scalar::U8(value) => value.write_le_slice(dst),
            Scalar::I8(value) => value.write_le_slice(dst),
            Scalar::U16(value) => value.write_le_slice(dst),
            Scalar::I16(value) => value.write_le_slice(dst),
            Scalar::U32(value) => value.write_le_slice(dst),
            Scalar::I32(value) => value.write_le_slice(dst),
            Scalar::U64(value) => value.write_le_slice(dst),
            Scalar::I64(value) => value.write_le_slice(dst),
            Scalar::F32(value) => value.write_le_slice(dst),
            Scalar::F64(value) => value.write_le_slice(dst),
        }
    }

    /// Bitwise equality: unlike `==`, a NaN equals the identical NaN and `0.0 != -0.0`.
    pub fn bit_eq(&self, other: &Scalar) -> bool {
        match (self, other) {
            (Scalar::F32(a), Scalar::F32(b)) => a.to_bits() == b.to_bits(),
            (Scalar::F64(a), Scalar::F64(b)) => a.to_bits() == b.to_bits(),
            _ => self == other,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scalar::Bool(value) => write!(f, "{value}"),
            Scalar::U8(value) => write!(f, "{value}"),
            Scalar::I8(value) => write!(f, "{value}"),
            Scalar::U16(value) => write!(f, "{value}"),
            Scalar::I16(value) => write!(f, "{value}"),
            Scalar::U32(value) => write!(f, "{value}"),
            Scalar::I32(value) => write!(f, "{value}"),
            Scalar::U64(value) => write!(f, "{value}"),
            Scalar::I64(value) => write!(f, "{value}"),
            Scalar::F32(value) => write!(f, "{value}"),
            Scalar::F64(value) => write!(f, "{value}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use {super::*, crate::proptest_config::proptest_cfg, proptest::prelude::*};

    fn scalar_of(ty: ScalarType) -> impl Strategy<Value = Scalar> {
        match ty {
            ScalarType::Bool => any::<bool>().prop_map(Scalar::from).boxed(),
            ScalarType::U8 => any::<u8>().prop_map(Scalar::from).boxed(),
            ScalarType::I8 => any::<i8>().prop_map(Scalar::from).boxed(),
            ScalarType::U16 => any::<u16>().prop_map(Scalar::from).boxed(),
            ScalarType::I16 => any::<i16>().prop_map(Scalar::from).boxed(),
            ScalarType::U32 => any::<u32>().prop_map(Scalar::from).boxed(),
            ScalarType::I32 => any::<i32>().prop_map(Scalar::from).boxed(),
            ScalarType::U64 => any::<u64>().prop_map(Scalar::from).boxed(),
            ScalarType::I64 => any::<i64>().prop_map(Scalar::from).boxed(),
            ScalarType::F32 => any::<f32>().prop_map(Scalar::from).boxed(),
            ScalarType::F64 => any::<f64>().prop_map(Scalar::from).boxed(),
        }
    }

    proptest! {
        #![proptest_config(proptest_cfg())]

        #[test]
        fn scalar_le_bytes_are_bit_exact(
            scalar in any::<ScalarType>().prop_flat_map(scalar_of)
        ) {
            let width = scalar.scalar_type().width();
            let mut bytes = [0u8; 8];
            scalar.write_le_slice(&mut bytes[..width]);
            let decoded = Scalar::from_le_slice(scalar.scalar_type(), &bytes[..width]);
            prop_assert!(decoded.bit_eq(&scalar));
        }
    }

    #[test]
    fn little_endian_regardless_of_host() {
        let mut bytes = [0u8; 4];
        0x0102_0304u32.write_le_slice(&mut bytes);
        assert_eq!(bytes, [4, 3, 2, 1]);
        assert_eq!(i16::from_le_slice(&[0xfe, 0xff]), -2);
    }

    #[test]
    fn bool_reads_any_nonzero_byte_as_true() {
        assert!(bool::from_le_slice(&[7]));
        assert!(!bool::from_le_slice(&[0]));
    }

    #[test]
    fn typed_accessors() {
        let scalar = Scalar::from(7u32);
        assert_eq!(scalar.as_u32(), Some(7));
        assert_eq!(scalar.as_u64(), None);
        assert_eq!(scalar.scalar_type(), ScalarType::U32);
        assert_eq!(ScalarType::F64.zero(), Scalar::F64(0.0));
        assert!(Scalar::F32(f32::NAN).bit_eq(&Scalar::F32(f32::NAN)));
    }
}
