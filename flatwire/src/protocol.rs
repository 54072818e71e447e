//! Offset and vtable protocol.
//!
//! Tables are located through two levels of indirection. A table starts with an `i32`
//! soffset to its vtable (`vtable = table - soffset`). The vtable lists, per field slot, the
//! field's byte offset from the start of the table, with 0 marking an absent field. Strings,
//! vectors and nested tables take one more hop through a `u32` uoffset relative to the
//! location it is stored at.
//!
//! ```text
//! vtable:  | u16 vtable len | u16 table len | u16 slot 0 | u16 slot 1 | ...
//! table:   | i32 soffset | inline fields ...
//! ```
use {
    crate::{
        codec::{check_alignment, read_scalar_dyn, read_string, StructRef, VectorRef},
        config::{ConfigCore, DefaultConfig},
        error::{corrupted, out_of_bounds, Result},
        io::{read_scalar, span_end, InputBuffer},
        scalar::{Primitive, Scalar, ScalarType},
        schema::{StructSchema, TableSchema, WireType},
    },
    core::{fmt, marker::PhantomData},
    std::borrow::Cow,
};

pub const UOFFSET_SIZE: usize = 4;
pub const SOFFSET_SIZE: usize = 4;
pub const VOFFSET_SIZE: usize = 2;
/// vtable length and table length.
pub const VTABLE_HEADER_SIZE: usize = 2 * VOFFSET_SIZE;
pub const FILE_IDENTIFIER_LENGTH: usize = 4;

/// Follow the uoffset stored at `offset`.
///
/// Fails with [`Error::CorruptedData`](crate::Error::CorruptedData) when the stored value is
/// below 4 or the target does not fit in `usize`, and with
/// [`Error::OutOfBounds`](crate::Error::OutOfBounds) when the target lies outside the buffer.
pub fn resolve_uoffset<B: InputBuffer + ?Sized>(buffer: &B, offset: usize) -> Result<usize> {
    let value = read_scalar::<u32, B>(buffer, offset)? as usize;
    if value < UOFFSET_SIZE {
        return Err(corrupted(offset, "uoffset smaller than 4"));
    }
    let target = offset
        .checked_add(value)
        .ok_or_else(|| corrupted(offset, "uoffset overflows"))?;
    if target >= buffer.len() {
        return Err(out_of_bounds(target, 1, buffer.len()));
    }
    Ok(target)
}

/// Whether the 4 bytes following the root uoffset equal `identifier`.
pub fn has_identifier<B: InputBuffer + ?Sized>(
    buffer: &B,
    identifier: &[u8; FILE_IDENTIFIER_LENGTH],
) -> bool {
    buffer
        .read_span(UOFFSET_SIZE, FILE_IDENTIFIER_LENGTH)
        .is_ok_and(|span| *span == identifier[..])
}

/// Decoded vtable of one table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VTable<'b> {
    vtable_offset: usize,
    table_offset: usize,
    table_len: usize,
    entries: Cow<'b, [u8]>,
}

/// Locate and validate the vtable of the table at `table_offset`.
pub fn initialize_vtable<B: InputBuffer + ?Sized>(
    buffer: &B,
    table_offset: usize,
) -> Result<VTable<'_>> {
    initialize_vtable_with_config::<B, DefaultConfig>(buffer, table_offset)
}

pub(crate) fn initialize_vtable_with_config<B: InputBuffer + ?Sized, C: ConfigCore>(
    buffer: &B,
    table_offset: usize,
) -> Result<VTable<'_>> {
    check_alignment::<C>(table_offset, SOFFSET_SIZE)?;
    let soffset = read_scalar::<i32, B>(buffer, table_offset)?;
    let vtable_offset = i64::try_from(table_offset)
        .ok()
        .and_then(|table| table.checked_sub(i64::from(soffset)))
        .and_then(|vtable| usize::try_from(vtable).ok())
        .ok_or_else(|| corrupted(table_offset, "vtable offset out of range"))?;
    check_alignment::<C>(vtable_offset, VOFFSET_SIZE)?;

    let vtable_len = usize::from(read_scalar::<u16, B>(buffer, vtable_offset)?);
    if vtable_len < VTABLE_HEADER_SIZE {
        return Err(corrupted(vtable_offset, "vtable shorter than its header"));
    }
    if vtable_len % VOFFSET_SIZE != 0 {
        return Err(corrupted(vtable_offset, "odd vtable length"));
    }
    let table_len = usize::from(read_scalar::<u16, B>(
        buffer,
        vtable_offset + VOFFSET_SIZE,
    )?);
    if table_len < SOFFSET_SIZE {
        return Err(corrupted(vtable_offset, "table shorter than its soffset"));
    }
    span_end(buffer.len(), table_offset, table_len)?;
    let entries = buffer.read_span(
        vtable_offset + VTABLE_HEADER_SIZE,
        vtable_len - VTABLE_HEADER_SIZE,
    )?;

    Ok(VTable {
        vtable_offset,
        table_offset,
        table_len,
        entries,
    })
}

impl VTable<'_> {
    pub const fn vtable_offset(&self) -> usize {
        self.vtable_offset
    }

    pub const fn table_offset(&self) -> usize {
        self.table_offset
    }

    /// Declared size of the table's inline part, soffset included.
    pub const fn table_len(&self) -> usize {
        self.table_len
    }

    /// Number of slots in the field-offset table.
    pub fn field_count(&self) -> usize {
        self.entries.len() / VOFFSET_SIZE
    }

    /// Raw entry for `slot`, relative to the table start. `None` when absent.
    pub fn entry(&self, slot: u16) -> Option<usize> {
        let at = usize::from(slot) * VOFFSET_SIZE;
        let raw = self.entries.get(at..at + VOFFSET_SIZE)?;
        match u16::from_le_slice(raw) {
            0 => None,
            relative => Some(usize::from(relative)),
        }
    }

    /// Absolute offset of the field in `slot`, or `None` if the field is absent.
    pub fn field_offset(&self, slot: u16) -> Result<Option<usize>> {
        self.field_span(slot, 1)
    }

    /// Absolute offset of a `width`-byte field in `slot`, checked to lie in the table.
    pub fn field_span(&self, slot: u16, width: usize) -> Result<Option<usize>> {
        let Some(relative) = self.entry(slot) else {
            return Ok(None);
        };
        if relative < SOFFSET_SIZE || relative + width > self.table_len {
            return Err(corrupted(
                self.vtable_offset + VTABLE_HEADER_SIZE + usize::from(slot) * VOFFSET_SIZE,
                "field lies outside of its table",
            ));
        }
        Ok(Some(self.table_offset + relative))
    }
}

/// A view of one table in a buffer.
///
/// Holds no decoded state: every accessor walks the vtable again. Any number of views may
/// alias one buffer.
pub struct TableRef<'b, B: ?Sized, C = DefaultConfig> {
    buffer: &'b B,
    offset: usize,
    _config: PhantomData<C>,
}

impl<B: ?Sized, C> Clone for TableRef<'_, B, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: ?Sized, C> Copy for TableRef<'_, B, C> {}

impl<B: ?Sized, C> fmt::Debug for TableRef<'_, B, C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TableRef")
            .field("offset", &self.offset)
            .finish_non_exhaustive()
    }
}

/// A decoded union field.
pub struct UnionRef<'b, B: ?Sized, C = DefaultConfig> {
    /// Discriminant, at least 1.
    pub tag: u8,
    pub schema: &'static TableSchema,
    pub table: TableRef<'b, B, C>,
}

impl<B: ?Sized, C> Clone for UnionRef<'_, B, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: ?Sized, C> Copy for UnionRef<'_, B, C> {}

impl<'b, B: InputBuffer + ?Sized> TableRef<'b, B> {
    /// View of the root table, located by the uoffset at the start of the buffer.
    pub fn root(buffer: &'b B) -> Result<Self> {
        Self::root_with_config(buffer, DefaultConfig::default())
    }
}

impl<'b, B: InputBuffer + ?Sized, C: ConfigCore> TableRef<'b, B, C> {
    pub const fn new(buffer: &'b B, offset: usize) -> Self {
        Self {
            buffer,
            offset,
            _config: PhantomData,
        }
    }

    pub fn root_with_config(buffer: &'b B, _config: C) -> Result<Self> {
        check_alignment::<C>(0, UOFFSET_SIZE)?;
        let offset = resolve_uoffset(buffer, 0)?;
        Ok(Self::new(buffer, offset))
    }

    pub const fn buffer(&self) -> &'b B {
        self.buffer
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub fn vtable(&self) -> Result<VTable<'b>> {
        initialize_vtable_with_config::<B, C>(self.buffer, self.offset)
    }

    pub fn field_offset(&self, slot: u16) -> Result<Option<usize>> {
        self.vtable()?.field_offset(slot)
    }

    /// Typed scalar in `slot`, or `default` when the field is absent.
    #[inline]
    pub fn scalar<T: Primitive>(&self, slot: u16, default: T) -> Result<T> {
        match self.vtable()?.field_span(slot, T::WIDTH)? {
            None => Ok(default),
            Some(at) => {
                check_alignment::<C>(at, T::WIDTH)?;
                read_scalar(self.buffer, at)
            }
        }
    }

    /// Scalar of wire type `ty` in `slot`, or `None` when the field is absent.
    pub fn scalar_field(&self, slot: u16, ty: ScalarType) -> Result<Option<Scalar>> {
        match self.vtable()?.field_span(slot, ty.width())? {
            None => Ok(None),
            Some(at) => {
                check_alignment::<C>(at, ty.width())?;
                read_scalar_dyn(self.buffer, at, ty).map(Some)
            }
        }
    }

    /// Target of the uoffset stored in `slot`.
    pub fn indirect(&self, slot: u16) -> Result<Option<usize>> {
        match self.vtable()?.field_span(slot, UOFFSET_SIZE)? {
            None => Ok(None),
            Some(at) => {
                check_alignment::<C>(at, UOFFSET_SIZE)?;
                resolve_uoffset(self.buffer, at).map(Some)
            }
        }
    }

    pub fn string(&self, slot: u16) -> Result<Option<Cow<'b, str>>> {
        match self.indirect(slot)? {
            None => Ok(None),
            Some(target) => read_string::<B, C>(self.buffer, target).map(Some),
        }
    }

    /// Payload of a `vector<u8>` / `vector<i8>` field, borrowed from contiguous buffers.
    pub fn byte_vector(&self, slot: u16) -> Result<Option<Cow<'b, [u8]>>> {
        match self.indirect(slot)? {
            None => Ok(None),
            Some(target) => VectorRef::<B, C>::new(self.buffer, target, &WireType::Scalar(ScalarType::U8))?
                .bytes()
                .map(Some),
        }
    }

    pub fn vector(&self, slot: u16, element: &'static WireType) -> Result<Option<VectorRef<'b, B, C>>> {
        match self.indirect(slot)? {
            None => Ok(None),
            Some(target) => VectorRef::new(self.buffer, target, element).map(Some),
        }
    }

    pub fn table(&self, slot: u16) -> Result<Option<TableRef<'b, B, C>>> {
        Ok(self
            .indirect(slot)?
            .map(|target| TableRef::new(self.buffer, target)))
    }

    pub fn structure(
        &self,
        slot: u16,
        schema: &'static StructSchema,
    ) -> Result<Option<StructRef<'b, B, C>>> {
        match self.vtable()?.field_span(slot, schema.size)? {
            None => Ok(None),
            Some(at) => StructRef::new(self.buffer, at, schema).map(Some),
        }
    }

    /// Union stored in `slot` (discriminant) and `slot + 1` (value).
    ///
    /// A zero or absent discriminant is `None`. A discriminant without a value, or one that
    /// names no member, is corrupted data.
    pub fn union(
        &self,
        slot: u16,
        members: &'static [&'static TableSchema],
    ) -> Result<Option<UnionRef<'b, B, C>>> {
        let tag = self.scalar::<u8>(slot, 0)?;
        if tag == 0 {
            return Ok(None);
        }
        let Some(schema) = members.get(usize::from(tag) - 1).copied() else {
            return Err(corrupted(self.offset, "unknown union discriminant"));
        };
        let value_slot = slot
            .checked_add(1)
            .ok_or_else(|| corrupted(self.offset, "union slot out of range"))?;
        let Some(table) = self.table(value_slot)? else {
            return Err(corrupted(self.offset, "union discriminant without a value"));
        };
        Ok(Some(UnionRef {
            tag,
            schema,
            table,
        }))
    }
}
