//! Back-to-front table builder.
//!
//! Objects are laid out from the end of the destination towards its start, children before
//! their parents, so every uoffset points at bytes that already exist when it is written.
//! [`TableBuilder::finish`] writes the root uoffset and moves the finished block to offset 0.
//!
//! ```
//! use flatwire::{protocol::TableRef, scalar::Scalar, writer::TableBuilder};
//!
//! let mut dst = [0u8; 64];
//! let mut builder = TableBuilder::new(&mut dst);
//! let name = builder.create_string("orc").unwrap();
//! let mut table = builder.start_table();
//! table.add_scalar(0, Scalar::U16(300));
//! table.add_offset(1, name);
//! let root = table.end().unwrap();
//! let len = builder.finish(root, None).unwrap();
//!
//! let root = TableRef::root(&dst[..len]).unwrap();
//! assert_eq!(root.scalar::<u16>(0, 0), Ok(300));
//! assert_eq!(root.string(1).unwrap().as_deref(), Some("orc"));
//! ```
use {
    crate::{
        codec::encode_struct,
        config::{ConfigCore, DefaultConfig},
        error::{buffer_too_small, layout_overflow, type_mismatch, Result},
        protocol::{FILE_IDENTIFIER_LENGTH, UOFFSET_SIZE, VTABLE_HEADER_SIZE},
        scalar::{Scalar, ScalarType},
        schema::StructSchema,
    },
    core::{cmp::Reverse, marker::PhantomData},
    log::{debug, trace},
    std::collections::HashMap,
};

/// Location of a finished object, counted in bytes from the end of the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Position(usize);

impl Position {
    /// Distance of the object's first byte from the end of the laid out block.
    pub const fn get(self) -> usize {
        self.0
    }
}

/// Counters for one build session.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct BuildStats {
    pub tables: usize,
    pub vtables_written: usize,
    pub vtables_reused: usize,
}

pub struct TableBuilder<'d, C = DefaultConfig> {
    dst: &'d mut [u8],
    /// Bytes used at the end of `dst`.
    head: usize,
    min_align: usize,
    /// Vtable bytes to the position they were written at.
    vtables: HashMap<Vec<u8>, usize>,
    stats: BuildStats,
    _config: PhantomData<C>,
}

impl<'d> TableBuilder<'d> {
    pub fn new(dst: &'d mut [u8]) -> Self {
        Self::with_config(dst, DefaultConfig::default())
    }
}

impl<'d, C: ConfigCore> TableBuilder<'d, C> {
    pub fn with_config(dst: &'d mut [u8], _config: C) -> Self {
        Self {
            dst,
            head: 0,
            min_align: 1,
            vtables: HashMap::new(),
            stats: BuildStats::default(),
            _config: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.dst.len()
    }

    /// Bytes laid out so far.
    pub const fn len(&self) -> usize {
        self.head
    }

    pub const fn is_empty(&self) -> bool {
        self.head == 0
    }

    pub const fn stats(&self) -> BuildStats {
        self.stats
    }

    #[inline]
    fn ensure(&self, additional: usize) -> Result<()> {
        let needed = self
            .head
            .checked_add(additional)
            .ok_or_else(|| layout_overflow("buffer size"))?;
        if needed > self.dst.len() {
            return Err(buffer_too_small(needed, self.dst.len()));
        }
        Ok(())
    }

    /// The `len` bytes in front of the current head, which become part of the block.
    fn claim(&mut self, len: usize) -> Result<&mut [u8]> {
        self.ensure(len)?;
        let end = self.dst.len() - self.head;
        self.head += len;
        Ok(&mut self.dst[end - len..end])
    }

    fn pad(&mut self, len: usize) -> Result<()> {
        self.claim(len)?.fill(0);
        Ok(())
    }

    /// Pad so that after `additional` more bytes the head is a multiple of `align`.
    fn prep(&mut self, align: usize, additional: usize) -> Result<()> {
        self.min_align = self.min_align.max(align);
        let padding = self.head.wrapping_add(additional).wrapping_neg() & (align - 1);
        self.pad(padding)
    }

    fn push_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        self.claim(bytes.len())?.copy_from_slice(bytes);
        Ok(())
    }

    fn push_scalar(&mut self, value: Scalar) -> Result<()> {
        let width = value.scalar_type().width();
        value.write_le_slice(self.claim(width)?);
        Ok(())
    }

    fn push_u32(&mut self, value: usize, what: &'static str) -> Result<()> {
        let value = u32::try_from(value).map_err(|_| layout_overflow(what))?;
        self.push_bytes(&value.to_le_bytes())
    }

    /// Push a uoffset pointing at `target`.
    fn push_uoffset(&mut self, target: Position) -> Result<()> {
        self.prep(UOFFSET_SIZE, 0)?;
        let distance = (self.head + UOFFSET_SIZE)
            .checked_sub(target.0)
            .ok_or_else(|| layout_overflow("backward uoffset"))?;
        self.push_u32(distance, "uoffset")
    }

    pub fn create_string(&mut self, value: &str) -> Result<Position> {
        let len = value.len();
        let payload = len
            .checked_add(1)
            .ok_or_else(|| layout_overflow("string length"))?;
        self.prep(UOFFSET_SIZE, payload)?;
        self.push_bytes(&[0])?;
        self.push_bytes(value.as_bytes())?;
        self.push_u32(len, "string length")?;
        Ok(Position(self.head))
    }

    pub fn create_byte_vector(&mut self, bytes: &[u8]) -> Result<Position> {
        self.prep(UOFFSET_SIZE, bytes.len())?;
        self.push_bytes(bytes)?;
        self.push_u32(bytes.len(), "vector length")?;
        Ok(Position(self.head))
    }

    /// Vector of scalars which must all be of type `ty`.
    pub fn create_scalar_vector(&mut self, ty: ScalarType, items: &[Scalar]) -> Result<Position> {
        if let Some(item) = items.iter().find(|item| item.scalar_type() != ty) {
            return Err(type_mismatch(
                "vector element",
                item.scalar_type().name(),
                self.head,
            ));
        }
        let payload = ty
            .width()
            .checked_mul(items.len())
            .ok_or_else(|| layout_overflow("vector payload"))?;
        self.prep(UOFFSET_SIZE, payload)?;
        self.prep(ty.width(), payload)?;
        for item in items.iter().rev() {
            self.push_scalar(*item)?;
        }
        self.push_u32(items.len(), "vector length")?;
        Ok(Position(self.head))
    }

    /// Vector of inline structs, one member list per element.
    pub fn create_struct_vector(
        &mut self,
        schema: &StructSchema,
        items: &[&[Scalar]],
    ) -> Result<Position> {
        let payload = schema
            .size
            .checked_mul(items.len())
            .ok_or_else(|| layout_overflow("vector payload"))?;
        self.prep(UOFFSET_SIZE, payload)?;
        self.prep(schema.align, payload)?;
        for item in items.iter().rev() {
            let at = self.head;
            encode_struct(schema, item, self.claim(schema.size)?, at)?;
        }
        self.push_u32(items.len(), "vector length")?;
        Ok(Position(self.head))
    }

    /// Vector of uoffsets to objects that are already laid out.
    pub fn create_offset_vector(&mut self, items: &[Position]) -> Result<Position> {
        let payload = UOFFSET_SIZE
            .checked_mul(items.len())
            .ok_or_else(|| layout_overflow("vector payload"))?;
        self.prep(UOFFSET_SIZE, payload)?;
        for item in items.iter().rev() {
            self.push_uoffset(*item)?;
        }
        self.push_u32(items.len(), "vector length")?;
        Ok(Position(self.head))
    }

    /// Begin a table. Its fields are laid out when [`TableWriter::end`] is called.
    pub fn start_table(&mut self) -> TableWriter<'_, 'd, C> {
        TableWriter {
            builder: self,
            fields: Vec::new(),
        }
    }

    /// Emit the vtable for a table whose soffset sits at `object`, or reuse an identical one.
    fn write_vtable(
        &mut self,
        object: usize,
        entries: &[(u16, usize)],
        table_len: usize,
    ) -> Result<usize> {
        let slot_count = entries
            .iter()
            .map(|(slot, _)| usize::from(*slot) + 1)
            .max()
            .unwrap_or(0);
        let mut vtable = vec![0u8; VTABLE_HEADER_SIZE + 2 * slot_count];
        let vtable_len =
            u16::try_from(vtable.len()).map_err(|_| layout_overflow("vtable length"))?;
        let table_len = u16::try_from(table_len).map_err(|_| layout_overflow("table length"))?;
        vtable[0..2].copy_from_slice(&vtable_len.to_le_bytes());
        vtable[2..4].copy_from_slice(&table_len.to_le_bytes());
        for (slot, field) in entries {
            let entry = u16::try_from(object - field)
                .map_err(|_| layout_overflow("field offset within table"))?;
            let at = VTABLE_HEADER_SIZE + 2 * usize::from(*slot);
            vtable[at..at + 2].copy_from_slice(&entry.to_le_bytes());
        }

        if C::VTABLE_DEDUP {
            if let Some(&existing) = self.vtables.get(&vtable) {
                trace!("reusing vtable of {} bytes for table at {object}", vtable.len());
                self.stats.vtables_reused += 1;
                return Ok(existing);
            }
        }
        self.push_bytes(&vtable)?;
        self.stats.vtables_written += 1;
        if C::VTABLE_DEDUP {
            self.vtables.insert(vtable, self.head);
        }
        Ok(self.head)
    }

    /// Write the root uoffset (and file identifier) and move the block to the start of the
    /// destination. Returns the number of bytes written.
    pub fn finish(mut self, root: Position, identifier: Option<[u8; 4]>) -> Result<usize> {
        let prefix = UOFFSET_SIZE + identifier.map_or(0, |_| FILE_IDENTIFIER_LENGTH);
        self.prep(self.min_align.max(UOFFSET_SIZE), prefix)?;
        if let Some(identifier) = identifier {
            self.push_bytes(&identifier)?;
        }
        self.push_uoffset(root)?;

        let cap = self.dst.len();
        self.dst.copy_within(cap - self.head..cap, 0);
        debug!(
            "finished {} bytes: {} tables, {} vtables written, {} reused",
            self.head, self.stats.tables, self.stats.vtables_written, self.stats.vtables_reused
        );
        Ok(self.head)
    }
}

enum Inline {
    Scalar(Scalar),
    Struct { align: usize, bytes: Vec<u8> },
    Offset(Position),
}

impl Inline {
    fn width(&self) -> usize {
        match self {
            Inline::Scalar(value) => value.scalar_type().width(),
            Inline::Struct { bytes, .. } => bytes.len(),
            Inline::Offset(_) => UOFFSET_SIZE,
        }
    }

    fn align(&self) -> usize {
        match self {
            Inline::Scalar(value) => value.scalar_type().width(),
            Inline::Struct { align, .. } => *align,
            Inline::Offset(_) => UOFFSET_SIZE,
        }
    }
}

/// A table under construction, borrowing its builder until [`TableWriter::end`].
pub struct TableWriter<'a, 'd, C = DefaultConfig> {
    builder: &'a mut TableBuilder<'d, C>,
    fields: Vec<(u16, Inline)>,
}

impl<C: ConfigCore> TableWriter<'_, '_, C> {
    pub fn add_scalar(&mut self, slot: u16, value: Scalar) {
        self.fields.push((slot, Inline::Scalar(value)));
    }

    /// Add a scalar that readers substitute with `default` when absent. It is left out when
    /// the configuration omits defaults and `value` is bit-identical to `default`.
    pub fn add_scalar_default(&mut self, slot: u16, value: Scalar, default: Scalar) {
        if C::OMIT_DEFAULTS && value.bit_eq(&default) {
            return;
        }
        self.add_scalar(slot, value);
    }

    pub fn add_offset(&mut self, slot: u16, target: Position) {
        self.fields.push((slot, Inline::Offset(target)));
    }

    pub fn add_struct(&mut self, slot: u16, schema: &StructSchema, values: &[Scalar]) -> Result<()> {
        let mut bytes = vec![0u8; schema.size];
        encode_struct(schema, values, &mut bytes, self.builder.head)?;
        self.fields.push((
            slot,
            Inline::Struct {
                align: schema.align,
                bytes,
            },
        ));
        Ok(())
    }

    /// Add a union: the discriminant goes into `slot`, the uoffset of `member` into `slot + 1`.
    pub fn add_union(&mut self, slot: u16, tag: u8, member: Position) -> Result<()> {
        let value_slot = slot
            .checked_add(1)
            .ok_or_else(|| layout_overflow("union slot"))?;
        self.add_scalar(slot, Scalar::U8(tag));
        self.add_offset(value_slot, member);
        Ok(())
    }

    /// Lay out the fields, widest first, followed by the soffset and the vtable.
    pub fn end(mut self) -> Result<Position> {
        let builder = self.builder;
        self.fields.sort_by_key(|(_, field)| Reverse(field.width()));
        for index in 0..self.fields.len() {
            let slot = self.fields[index].0;
            if self.fields[..index].iter().any(|(seen, _)| *seen == slot) {
                return Err(type_mismatch("table slot", "one value per slot", builder.head));
            }
        }

        // Leading padding stays outside the table so equal shapes get equal vtables.
        let align = self
            .fields
            .iter()
            .map(|(_, field)| field.align())
            .fold(UOFFSET_SIZE, usize::max);
        builder.prep(align, 0)?;
        let start = builder.head;

        let mut entries = Vec::with_capacity(self.fields.len());
        for (slot, field) in &self.fields {
            match field {
                Inline::Scalar(value) => {
                    let width = value.scalar_type().width();
                    builder.prep(width, width)?;
                    builder.push_scalar(*value)?;
                }
                Inline::Struct { align, bytes } => {
                    builder.prep(*align, bytes.len())?;
                    builder.push_bytes(bytes)?;
                }
                Inline::Offset(target) => builder.push_uoffset(*target)?,
            }
            entries.push((*slot, builder.head));
        }

        // soffset placeholder, patched once the vtable position is known
        builder.prep(UOFFSET_SIZE, UOFFSET_SIZE)?;
        builder.push_bytes(&[0; 4])?;
        let object = builder.head;
        let vtable = builder.write_vtable(object, &entries, object - start)?;

        let soffset = i32::try_from(vtable as i64 - object as i64)
            .map_err(|_| layout_overflow("soffset"))?;
        let at = builder.dst.len() - object;
        builder.dst[at..at + 4].copy_from_slice(&soffset.to_le_bytes());
        builder.stats.tables += 1;
        Ok(Position(object))
    }
}
