//! Schema descriptors.
//!
//! A schema is plain static data: hand-written or generated code declares one
//! [`TableSchema`] per table type and passes it to the readers and writers. Schemas may refer
//! to themselves or to each other, so declare them as `static` items.
//!
//! ```
//! use flatwire::{
//!     schema::{FieldDescriptor, TableSchema, WireType},
//!     scalar::{Scalar, ScalarType},
//! };
//!
//! static MONSTER: TableSchema = TableSchema::new(
//!     "Monster",
//!     &[
//!         FieldDescriptor::scalar("hp", 0, ScalarType::I16).with_default(Scalar::I16(100)),
//!         FieldDescriptor::new("name", 1, WireType::String),
//!         FieldDescriptor::new("friend", 2, WireType::Table(&MONSTER)),
//!     ],
//! );
//!
//! assert_eq!(MONSTER.slot_count(), 3);
//! assert_eq!(MONSTER.position("name"), Some(1));
//! ```
use {
    crate::{
        protocol::UOFFSET_SIZE,
        scalar::{Scalar, ScalarType},
    },
    core::fmt,
};

/// Wire type of a table field or vector element.
#[derive(Clone, Copy)]
pub enum WireType {
    /// Inline fixed-width scalar.
    Scalar(ScalarType),
    /// uoffset to a NUL-terminated, length-prefixed UTF-8 string.
    String,
    /// uoffset to a length-prefixed vector of the given element type.
    Vector(&'static WireType),
    /// uoffset to a nested table.
    Table(&'static TableSchema),
    /// Inline fixed-size record.
    Struct(&'static StructSchema),
    /// Discriminated union of tables.
    ///
    /// Occupies two vtable slots: `slot` holds the `u8` discriminant (0 = none) and
    /// `slot + 1` the uoffset of the member table. Discriminant `k` selects member `k - 1`.
    Union(&'static [&'static TableSchema]),
}

impl WireType {
    /// Bytes this type occupies inline, in a table or as a vector element.
    pub const fn inline_size(&self) -> usize {
        match self {
            WireType::Scalar(ty) => ty.width(),
            WireType::Struct(schema) => schema.size,
            WireType::String | WireType::Vector(_) | WireType::Table(_) | WireType::Union(_) => {
                UOFFSET_SIZE
            }
        }
    }

    pub const fn inline_align(&self) -> usize {
        match self {
            WireType::Scalar(ty) => ty.width(),
            WireType::Struct(schema) => schema.align,
            WireType::String | WireType::Vector(_) | WireType::Table(_) | WireType::Union(_) => {
                UOFFSET_SIZE
            }
        }
    }

    /// Whether the inline representation is a uoffset to a separate object.
    pub const fn is_indirect(&self) -> bool {
        !matches!(self, WireType::Scalar(_) | WireType::Struct(_))
    }

    pub const fn name(&self) -> &'static str {
        match self {
            WireType::Scalar(ty) => ty.name(),
            WireType::String => "string",
            WireType::Vector(_) => "vector",
            WireType::Table(schema) => schema.name,
            WireType::Struct(schema) => schema.name,
            WireType::Union(_) => "union",
        }
    }
}

/// Names referenced schemas instead of expanding them, as schemas may be recursive.
impl fmt::Debug for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireType::Scalar(ty) => write!(f, "Scalar({ty:?})"),
            WireType::String => f.write_str("String"),
            WireType::Vector(element) => write!(f, "Vector({element:?})"),
            WireType::Table(schema) => write!(f, "Table({})", schema.name),
            WireType::Struct(schema) => write!(f, "Struct({})", schema.name),
            WireType::Union(members) => f
                .debug_tuple("Union")
                .field(&members.iter().map(|member| member.name).collect::<Vec<_>>())
                .finish(),
        }
    }
}

/// One field of a [`TableSchema`].
#[derive(Debug, Clone, Copy)]
pub struct FieldDescriptor {
    pub name: &'static str,
    /// Index into the vtable's field-offset table.
    pub slot: u16,
    pub ty: WireType,
    /// Value read for an absent scalar field. Unused for other wire types.
    pub default: Scalar,
}

impl FieldDescriptor {
    pub const fn new(name: &'static str, slot: u16, ty: WireType) -> Self {
        let default = match ty {
            WireType::Scalar(scalar) => scalar.zero(),
            _ => Scalar::U8(0),
        };
        Self {
            name,
            slot,
            ty,
            default,
        }
    }

    pub const fn scalar(name: &'static str, slot: u16, ty: ScalarType) -> Self {
        Self::new(name, slot, WireType::Scalar(ty))
    }

    pub const fn with_default(self, default: Scalar) -> Self {
        Self { default, ..self }
    }

    /// Number of vtable slots the field occupies.
    pub const fn slot_span(&self) -> u16 {
        match self.ty {
            WireType::Union(_) => 2,
            _ => 1,
        }
    }
}

/// Ordered field list of a table type.
#[derive(Debug)]
pub struct TableSchema {
    pub name: &'static str,
    pub fields: &'static [FieldDescriptor],
}

impl TableSchema {
    pub const fn new(name: &'static str, fields: &'static [FieldDescriptor]) -> Self {
        Self { name, fields }
    }

    /// Length of the longest vtable a table of this type can have.
    pub fn slot_count(&self) -> usize {
        self.fields
            .iter()
            .map(|field| usize::from(field.slot) + usize::from(field.slot_span()))
            .max()
            .unwrap_or(0)
    }

    /// Position of the field called `name` in [`TableSchema::fields`].
    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }

    pub fn field(&self, name: &str) -> Option<&'static FieldDescriptor> {
        let fields: &'static [FieldDescriptor] = self.fields;
        fields.iter().find(|field| field.name == name)
    }
}

/// One member of a [`StructSchema`].
#[derive(Debug, Clone, Copy)]
pub struct StructField {
    pub name: &'static str,
    /// Byte offset from the start of the struct.
    pub offset: usize,
    pub ty: ScalarType,
}

impl StructField {
    pub const fn new(name: &'static str, offset: usize, ty: ScalarType) -> Self {
        Self { name, offset, ty }
    }
}

/// Layout of a fixed-size inline record.
///
/// Bytes not covered by a field are padding and are written as zero.
#[derive(Debug)]
pub struct StructSchema {
    pub name: &'static str,
    pub size: usize,
    pub align: usize,
    pub fields: &'static [StructField],
}

impl StructSchema {
    /// # Panics
    ///
    /// Panics if `align` is not a power of two or `size` is not a multiple of it. In a
    /// `static` declaration this is a compile error.
    pub const fn new(
        name: &'static str,
        size: usize,
        align: usize,
        fields: &'static [StructField],
    ) -> Self {
        assert!(align.is_power_of_two(), "struct alignment must be a power of two");
        assert!(size % align == 0, "struct size must be a multiple of its alignment");
        Self {
            name,
            size,
            align,
            fields,
        }
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|field| field.name == name)
    }
}
