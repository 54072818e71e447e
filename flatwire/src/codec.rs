//! String, vector and struct codec.
use {
    crate::{
        config::{ConfigCore, DefaultConfig},
        error::{corrupted, invalid_encoding, out_of_bounds, type_mismatch, Result},
        io::{read_scalar, span_end, InputBuffer},
        protocol::{resolve_uoffset, TableRef},
        scalar::{Primitive, Scalar, ScalarType},
        schema::{StructSchema, WireType},
    },
    core::{marker::PhantomData, str},
    std::borrow::Cow,
};

/// Length prefix of strings and vectors.
pub const LENGTH_PREFIX_SIZE: usize = 4;

/// Fail if `offset` is not a multiple of `width` and `C` checks alignment.
#[inline]
pub fn check_alignment<C: ConfigCore>(offset: usize, width: usize) -> Result<()> {
    if C::ALIGNMENT_CHECK && width > 1 && offset % width != 0 {
        return Err(corrupted(offset, "misaligned scalar"));
    }
    Ok(())
}

/// Read a scalar whose wire type is only known at runtime.
pub fn read_scalar_dyn<B: InputBuffer + ?Sized>(
    buffer: &B,
    offset: usize,
    ty: ScalarType,
) -> Result<Scalar> {
    let mut raw = [0u8; 8];
    let raw = &mut raw[..ty.width()];
    match buffer.as_contiguous() {
        Some(bytes) => {
            let end = span_end(bytes.len(), offset, ty.width())?;
            raw.copy_from_slice(&bytes[offset..end]);
        }
        None => buffer.copy_span_into(offset, raw)?,
    }
    Ok(Scalar::from_le_slice(ty, raw))
}

/// Decode the string whose length prefix is at `offset`.
///
/// The byte count is authoritative: the NUL terminator is neither required nor inspected.
pub fn read_string<B: InputBuffer + ?Sized, C: ConfigCore>(
    buffer: &B,
    offset: usize,
) -> Result<Cow<'_, str>> {
    check_alignment::<C>(offset, LENGTH_PREFIX_SIZE)?;
    let count = read_scalar::<u32, B>(buffer, offset)? as usize;
    let payload = offset
        .checked_add(LENGTH_PREFIX_SIZE)
        .ok_or_else(|| corrupted(offset, "string offset overflows"))?;
    match buffer.read_span(payload, count)? {
        Cow::Borrowed(bytes) => str::from_utf8(bytes)
            .map(Cow::Borrowed)
            .map_err(|source| invalid_encoding(payload, source)),
        Cow::Owned(bytes) => String::from_utf8(bytes)
            .map(Cow::Owned)
            .map_err(|error| invalid_encoding(payload, error.utf8_error())),
    }
}

/// A view of one length-prefixed vector.
///
/// Construction validates that the whole payload lies in the buffer, so a corrupted count
/// fails before any element is read.
pub struct VectorRef<'b, B: ?Sized, C = DefaultConfig> {
    buffer: &'b B,
    /// Offset of the length prefix.
    offset: usize,
    len: usize,
    element: &'b WireType,
    _config: PhantomData<C>,
}

impl<B: ?Sized, C> Clone for VectorRef<'_, B, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: ?Sized, C> Copy for VectorRef<'_, B, C> {}

impl<'b, B: InputBuffer + ?Sized, C: ConfigCore> VectorRef<'b, B, C> {
    pub fn new(buffer: &'b B, offset: usize, element: &'b WireType) -> Result<Self> {
        check_alignment::<C>(offset, LENGTH_PREFIX_SIZE)?;
        let len = read_scalar::<u32, B>(buffer, offset)? as usize;
        let start = offset
            .checked_add(LENGTH_PREFIX_SIZE)
            .ok_or_else(|| corrupted(offset, "vector offset overflows"))?;
        let payload = len
            .checked_mul(element.inline_size())
            .ok_or_else(|| corrupted(offset, "vector length overflows"))?;
        span_end(buffer.len(), start, payload)?;
        check_alignment::<C>(start, element.inline_align())?;
        Ok(Self {
            buffer,
            offset,
            len,
            element,
            _config: PhantomData,
        })
    }

    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub const fn element(&self) -> &'b WireType {
        self.element
    }

    pub const fn buffer(&self) -> &'b B {
        self.buffer
    }

    /// Offset of the first element.
    pub const fn start(&self) -> usize {
        self.offset + LENGTH_PREFIX_SIZE
    }

    /// Offset of element `index`.
    pub fn element_offset(&self, index: usize) -> Result<usize> {
        let stride = self.element.inline_size();
        if index >= self.len {
            return Err(out_of_bounds(
                self.start().saturating_add(index.saturating_mul(stride)),
                stride,
                self.buffer.len(),
            ));
        }
        Ok(self.start() + index * stride)
    }

    /// Fail unless the elements are scalars of type `ty`.
    fn expect_scalar(&self, ty: ScalarType) -> Result<()> {
        match self.element {
            WireType::Scalar(element) if *element == ty => Ok(()),
            _ => Err(type_mismatch("vector element", ty.name(), self.offset)),
        }
    }

    pub fn scalar<T: Primitive>(&self, index: usize) -> Result<T> {
        self.expect_scalar(T::TYPE)?;
        read_scalar(self.buffer, self.element_offset(index)?)
    }

    pub fn scalar_dyn(&self, index: usize) -> Result<Scalar> {
        let WireType::Scalar(ty) = self.element else {
            return Err(type_mismatch("vector element", "scalar", self.offset));
        };
        read_scalar_dyn(self.buffer, self.element_offset(index)?, *ty)
    }

    /// Target of the uoffset element at `index`.
    pub fn indirect(&self, index: usize) -> Result<usize> {
        if !self.element.is_indirect() {
            return Err(type_mismatch("vector element", "offset", self.offset));
        }
        resolve_uoffset(self.buffer, self.element_offset(index)?)
    }

    pub fn string(&self, index: usize) -> Result<Cow<'b, str>> {
        match self.element {
            WireType::String => read_string::<B, C>(self.buffer, self.indirect(index)?),
            _ => Err(type_mismatch("vector element", "string", self.offset)),
        }
    }

    pub fn table(&self, index: usize) -> Result<TableRef<'b, B, C>> {
        match self.element {
            WireType::Table(_) => Ok(TableRef::new(self.buffer, self.indirect(index)?)),
            _ => Err(type_mismatch("vector element", "table", self.offset)),
        }
    }

    pub fn vector(&self, index: usize) -> Result<VectorRef<'b, B, C>> {
        match self.element {
            WireType::Vector(inner) => VectorRef::new(self.buffer, self.indirect(index)?, *inner),
            _ => Err(type_mismatch("vector element", "vector", self.offset)),
        }
    }

    pub fn structure(&self, index: usize) -> Result<StructRef<'b, B, C>> {
        match self.element {
            WireType::Struct(schema) => {
                StructRef::new(self.buffer, self.element_offset(index)?, *schema)
            }
            _ => Err(type_mismatch("vector element", "struct", self.offset)),
        }
    }

    /// The whole payload of a `vector<u8>` or `vector<i8>`.
    pub fn bytes(&self) -> Result<Cow<'b, [u8]>> {
        match self.element {
            WireType::Scalar(ScalarType::U8 | ScalarType::I8) => {
                self.buffer.read_span(self.start(), self.len)
            }
            _ => Err(type_mismatch("vector element", "u8", self.offset)),
        }
    }
}

/// Encode struct members into `dst`, zeroing the padding.
///
/// `offset` is where `dst` lives in the buffer and only serves error reporting.
pub fn encode_struct(
    schema: &StructSchema,
    values: &[Scalar],
    dst: &mut [u8],
    offset: usize,
) -> Result<()> {
    if values.len() != schema.fields.len() {
        return Err(type_mismatch(schema.name, "one value per struct member", offset));
    }
    dst.fill(0);
    for (member, value) in schema.fields.iter().zip(values) {
        if value.scalar_type() != member.ty {
            return Err(type_mismatch(member.name, member.ty.name(), offset + member.offset));
        }
        let span = dst
            .get_mut(member.offset..member.offset + member.ty.width())
            .ok_or_else(|| corrupted(offset + member.offset, "struct member lies outside of its struct"))?;
        value.write_le_slice(span);
    }
    Ok(())
}

/// A view of one inline struct.
pub struct StructRef<'b, B: ?Sized, C = DefaultConfig> {
    buffer: &'b B,
    offset: usize,
    schema: &'static StructSchema,
    _config: PhantomData<C>,
}

impl<B: ?Sized, C> Clone for StructRef<'_, B, C> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<B: ?Sized, C> Copy for StructRef<'_, B, C> {}

impl<'b, B: InputBuffer + ?Sized, C: ConfigCore> StructRef<'b, B, C> {
    pub fn new(buffer: &'b B, offset: usize, schema: &'static StructSchema) -> Result<Self> {
        span_end(buffer.len(), offset, schema.size)?;
        check_alignment::<C>(offset, schema.align)?;
        Ok(Self {
            buffer,
            offset,
            schema,
            _config: PhantomData,
        })
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub const fn schema(&self) -> &'static StructSchema {
        self.schema
    }

    pub const fn buffer(&self) -> &'b B {
        self.buffer
    }

    /// Member at position `index` of the struct schema.
    pub fn get(&self, index: usize) -> Result<Scalar> {
        let field = self
            .schema
            .fields
            .get(index)
            .ok_or_else(|| type_mismatch(self.schema.name, "a declared struct member", self.offset))?;
        let at = self.offset + field.offset;
        if field.offset + field.ty.width() > self.schema.size {
            return Err(corrupted(at, "struct member lies outside of its struct"));
        }
        read_scalar_dyn(self.buffer, at, field.ty)
    }

    pub fn field(&self, name: &str) -> Result<Scalar> {
        let index = self
            .schema
            .position(name)
            .ok_or_else(|| type_mismatch(self.schema.name, "a declared struct member", self.offset))?;
        self.get(index)
    }

    pub fn to_scalars(&self) -> Result<Vec<Scalar>> {
        (0..self.schema.fields.len()).map(|index| self.get(index)).collect()
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{error::Error, io::SegmentedBuffer, schema::StructField},
    };

    static POINT: StructSchema = StructSchema::new(
        "Point",
        8,
        4,
        &[
            StructField::new("x", 0, ScalarType::I32),
            StructField::new("y", 4, ScalarType::I32),
        ],
    );

    static U16: WireType = WireType::Scalar(ScalarType::U16);
    static STRINGS: WireType = WireType::String;
    static POINTS: WireType = WireType::Struct(&POINT);

    #[test]
    fn strings_are_validated() {
        let mut bytes = vec![0u8; 12];
        bytes[0..4].copy_from_slice(&3u32.to_le_bytes());
        bytes[4..8].copy_from_slice(b"abc\0");
        assert_eq!(
            read_string::<_, DefaultConfig>(bytes.as_slice(), 0).unwrap(),
            "abc"
        );

        bytes[5] = 0xff;
        let err = read_string::<_, DefaultConfig>(bytes.as_slice(), 0).unwrap_err();
        assert!(matches!(err, Error::InvalidEncoding { offset: 4, .. }));

        // Non-contiguous buffers take the owned path.
        let segmented = SegmentedBuffer::new(vec![bytes[..5].to_vec(), bytes[5..].to_vec()]);
        let err = read_string::<_, DefaultConfig>(&segmented, 0).unwrap_err();
        assert!(matches!(err, Error::InvalidEncoding { offset: 4, .. }));
    }

    #[test]
    fn oversized_counts_fail_before_reading_elements() {
        let mut bytes = vec![0u8; 16];
        bytes[0..4].copy_from_slice(&7u32.to_le_bytes());
        assert_eq!(
            VectorRef::<_, DefaultConfig>::new(bytes.as_slice(), 0, &U16).err(),
            Some(Error::OutOfBounds {
                offset: 4,
                len: 14,
                buffer_len: 16
            })
        );
        bytes[0..4].copy_from_slice(&u32::MAX.to_le_bytes());
        assert!(VectorRef::<_, DefaultConfig>::new(bytes.as_slice(), 0, &POINTS).is_err());
    }

    #[test]
    fn fixed_width_elements() {
        let mut bytes = vec![0u8; 8];
        bytes[0..4].copy_from_slice(&2u32.to_le_bytes());
        bytes[4..6].copy_from_slice(&10u16.to_le_bytes());
        bytes[6..8].copy_from_slice(&20u16.to_le_bytes());
        let vector = VectorRef::<_, DefaultConfig>::new(bytes.as_slice(), 0, &U16).unwrap();
        assert_eq!(vector.len(), 2);
        assert_eq!(vector.scalar::<u16>(1), Ok(20));
        assert_eq!(vector.scalar_dyn(0), Ok(Scalar::U16(10)));
        assert!(matches!(vector.scalar::<u32>(0), Err(Error::TypeMismatch { .. })));
        assert!(matches!(vector.scalar::<u16>(2), Err(Error::OutOfBounds { offset: 8, .. })));
        assert!(vector.string(0).is_err());
    }

    #[test]
    fn offset_elements() {
        // [count=2][uoffset -> "a"][uoffset -> "bc"]["a"]["bc"]
        let mut bytes = vec![0u8; 28];
        bytes[0..4].copy_from_slice(&2u32.to_le_bytes());
        bytes[4..8].copy_from_slice(&8u32.to_le_bytes());
        bytes[8..12].copy_from_slice(&12u32.to_le_bytes());
        bytes[12..16].copy_from_slice(&1u32.to_le_bytes());
        bytes[16..18].copy_from_slice(b"a\0");
        bytes[20..24].copy_from_slice(&2u32.to_le_bytes());
        bytes[24..27].copy_from_slice(b"bc\0");
        let vector = VectorRef::<_, DefaultConfig>::new(bytes.as_slice(), 0, &STRINGS).unwrap();
        assert_eq!(vector.string(0).unwrap(), "a");
        assert_eq!(vector.string(1).unwrap(), "bc");
        assert!(vector.bytes().is_err());
    }

    #[test]
    fn struct_encoding_checks_member_types() {
        let mut dst = [0xaau8; 8];
        encode_struct(&POINT, &[Scalar::I32(1), Scalar::I32(-1)], &mut dst, 0).unwrap();
        assert_eq!(dst, [1, 0, 0, 0, 0xff, 0xff, 0xff, 0xff]);
        assert!(matches!(
            encode_struct(&POINT, &[Scalar::I32(1), Scalar::U32(1)], &mut dst, 16),
            Err(Error::TypeMismatch {
                field: "y",
                offset: 20,
                ..
            })
        ));
        assert!(encode_struct(&POINT, &[Scalar::I32(1)], &mut dst, 0).is_err());
    }

    #[test]
    fn struct_members() {
        let mut bytes = vec![0u8; 12];
        bytes[0..4].copy_from_slice(&1u32.to_le_bytes());
        bytes[4..8].copy_from_slice(&(-3i32).to_le_bytes());
        bytes[8..12].copy_from_slice(&9i32.to_le_bytes());
        let vector = VectorRef::<_, DefaultConfig>::new(bytes.as_slice(), 0, &POINTS).unwrap();
        let point = vector.structure(0).unwrap();
        assert_eq!(point.field("y"), Ok(Scalar::I32(9)));
        assert_eq!(point.to_scalars(), Ok(vec![Scalar::I32(-3), Scalar::I32(9)]));
        assert!(point.field("z").is_err());
    }
}
