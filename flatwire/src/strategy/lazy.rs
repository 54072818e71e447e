//! Lazy decoding.
//!
//! Objects are thin views holding a buffer reference, an offset and the buffer generation
//! they were created under. Nothing is decoded up front: every access walks the vtable again
//! and reads straight from the buffer.
use {
    super::check_generation,
    crate::{
        codec::{read_string, StructRef, VectorRef},
        config::{ConfigCore, DefaultConfig},
        error::{corrupted, type_mismatch, Result},
        io::InputBuffer,
        protocol::TableRef,
        scalar::{Primitive, Scalar},
        schema::{FieldDescriptor, TableSchema, WireType},
        strategy::greedy,
        value::TableValue,
    },
    core::{cell::OnceCell, marker::PhantomData},
    std::borrow::Cow,
};

/// Implement `Clone` and `Copy` without requiring `B: Clone`.
macro_rules! impl_copy {
    ($($ty:ident),*) => {
        $(
            impl<B: ?Sized, C> Clone for $ty<'_, B, C> {
                fn clone(&self) -> Self {
                    *self
                }
            }

            impl<B: ?Sized, C> Copy for $ty<'_, B, C> {}
        )*
    };
}

impl_copy!(LazyTable, LazyVector, LazyString, LazyStruct, LazyValue);

/// A lazily decoded table.
pub struct LazyTable<'b, B: ?Sized, C = DefaultConfig> {
    table: TableRef<'b, B, C>,
    schema: &'static TableSchema,
    generation: u64,
    depth: usize,
}

/// A lazily decoded field or vector element.
pub enum LazyValue<'b, B: ?Sized, C = DefaultConfig> {
    Scalar(Scalar),
    String(LazyString<'b, B, C>),
    Vector(LazyVector<'b, B, C>),
    Table(LazyTable<'b, B, C>),
    Struct(LazyStruct<'b, B, C>),
    Union { tag: u8, table: LazyTable<'b, B, C> },
}

impl<'b, B: ?Sized, C> LazyValue<'b, B, C> {
    pub const fn as_scalar(&self) -> Option<Scalar> {
        match self {
            LazyValue::Scalar(scalar) => Some(*scalar),
            _ => None,
        }
    }

    pub const fn as_table(&self) -> Option<LazyTable<'b, B, C>> {
        match self {
            LazyValue::Table(table) => Some(*table),
            _ => None,
        }
    }

    pub const fn as_vector(&self) -> Option<LazyVector<'b, B, C>> {
        match self {
            LazyValue::Vector(vector) => Some(*vector),
            _ => None,
        }
    }

    pub const fn as_string(&self) -> Option<LazyString<'b, B, C>> {
        match self {
            LazyValue::String(string) => Some(*string),
            _ => None,
        }
    }
}

impl<'b, B: InputBuffer + ?Sized> LazyTable<'b, B> {
    /// View of the root table of `buffer`.
    pub fn root(buffer: &'b B, schema: &'static TableSchema) -> Result<Self> {
        Self::root_with_config(buffer, schema, DefaultConfig::default())
    }
}

impl<'b, B: InputBuffer + ?Sized, C: ConfigCore> LazyTable<'b, B, C> {
    pub fn root_with_config(buffer: &'b B, schema: &'static TableSchema, config: C) -> Result<Self> {
        let table = TableRef::root_with_config(buffer, config)?;
        Ok(Self::new(table, schema, buffer.generation(), 0))
    }

    pub(crate) const fn new(
        table: TableRef<'b, B, C>,
        schema: &'static TableSchema,
        generation: u64,
        depth: usize,
    ) -> Self {
        Self {
            table,
            schema,
            generation,
            depth,
        }
    }

    pub const fn schema(&self) -> &'static TableSchema {
        self.schema
    }

    pub const fn table_ref(&self) -> TableRef<'b, B, C> {
        self.table
    }

    pub const fn offset(&self) -> usize {
        self.table.offset()
    }

    /// Buffer generation this view was created under.
    pub const fn generation(&self) -> u64 {
        self.generation
    }

    pub(crate) fn check_generation(&self) -> Result<()> {
        check_generation(self.table.buffer(), self.generation)
    }

    pub(crate) fn descriptor(&self, name: &str) -> Result<&'static FieldDescriptor> {
        self.schema
            .field(name)
            .ok_or_else(|| type_mismatch(self.schema.name, "a declared field", self.offset()))
    }

    pub(crate) fn child(
        &self,
        table: TableRef<'b, B, C>,
        schema: &'static TableSchema,
    ) -> Result<LazyTable<'b, B, C>> {
        child_table(table, schema, self.generation, self.depth)
    }

    /// The field called `name`.
    ///
    /// Absent scalars yield their schema default, other absent fields `None`.
    pub fn get(&self, name: &str) -> Result<Option<LazyValue<'b, B, C>>> {
        self.field(self.descriptor(name)?)
    }

    /// The field at `position` in the schema's field list.
    pub fn get_at(&self, position: usize) -> Result<Option<LazyValue<'b, B, C>>> {
        let field = self
            .schema
            .fields
            .get(position)
            .ok_or_else(|| type_mismatch(self.schema.name, "a declared field", self.offset()))?;
        self.field(field)
    }

    fn field(&self, field: &'static FieldDescriptor) -> Result<Option<LazyValue<'b, B, C>>> {
        self.check_generation()?;
        let slot = field.slot;
        let value = match field.ty {
            WireType::Scalar(ty) => Some(LazyValue::Scalar(
                self.table.scalar_field(slot, ty)?.unwrap_or(field.default),
            )),
            WireType::String => self.table.indirect(slot)?.map(|offset| {
                LazyValue::String(LazyString::new(self.table.buffer(), offset, self.generation))
            }),
            WireType::Vector(element) => self
                .table
                .vector(slot, element)?
                .map(|vector| LazyValue::Vector(LazyVector::new(vector, self.generation, self.depth))),
            WireType::Table(schema) => match self.table.table(slot)? {
                None => None,
                Some(table) => Some(LazyValue::Table(self.child(table, schema)?)),
            },
            WireType::Struct(schema) => self.table.structure(slot, schema)?.map(|inner| {
                LazyValue::Struct(LazyStruct {
                    inner,
                    generation: self.generation,
                })
            }),
            WireType::Union(members) => match self.table.union(slot, members)? {
                None => None,
                Some(union) => Some(LazyValue::Union {
                    tag: union.tag,
                    table: self.child(union.table, union.schema)?,
                }),
            },
        };
        Ok(value)
    }

    /// Typed scalar field; the type must match the schema exactly.
    pub fn scalar<T: Primitive>(&self, name: &str) -> Result<T> {
        let field = self.descriptor(name)?;
        let expected = match field.ty {
            WireType::Scalar(ty) => ty,
            _ => return Err(type_mismatch(field.name, field.ty.name(), self.offset())),
        };
        if expected != T::TYPE {
            return Err(type_mismatch(field.name, expected.name(), self.offset()));
        }
        let default = T::from_scalar(field.default)
            .ok_or_else(|| type_mismatch(field.name, expected.name(), self.offset()))?;
        self.check_generation()?;
        self.table.scalar(field.slot, default)
    }

    fn typed<T>(
        &self,
        name: &str,
        expected: &'static str,
        pick: impl FnOnce(LazyValue<'b, B, C>) -> Option<T>,
    ) -> Result<Option<T>> {
        let field = self.descriptor(name)?;
        match self.field(field)? {
            None => Ok(None),
            Some(value) => pick(value)
                .map(Some)
                .ok_or_else(|| type_mismatch(field.name, expected, self.offset())),
        }
    }

    pub fn string(&self, name: &str) -> Result<Option<Cow<'b, str>>> {
        self.typed(name, "string", |value| value.as_string())?
            .map(|string| string.get())
            .transpose()
    }

    pub fn vector(&self, name: &str) -> Result<Option<LazyVector<'b, B, C>>> {
        self.typed(name, "vector", |value| value.as_vector())
    }

    pub fn table(&self, name: &str) -> Result<Option<LazyTable<'b, B, C>>> {
        self.typed(name, "table", |value| value.as_table())
    }

    pub fn structure(&self, name: &str) -> Result<Option<LazyStruct<'b, B, C>>> {
        self.typed(name, "struct", |value| match value {
            LazyValue::Struct(structure) => Some(structure),
            _ => None,
        })
    }

    /// Union field as its discriminant and member table.
    pub fn union(&self, name: &str) -> Result<Option<(u8, LazyTable<'b, B, C>)>> {
        self.typed(name, "union", |value| match value {
            LazyValue::Union { tag, table } => Some((tag, table)),
            _ => None,
        })
    }

    /// Copy the whole table into an owned graph.
    pub fn to_owned_value(&self) -> Result<TableValue> {
        self.check_generation()?;
        greedy::decode_table(self.table, self.schema, self.depth)
    }

    /// Release the buffer for reuse. Every view of it created so far becomes stale.
    pub fn recycle(self) {
        self.table.buffer().recycle();
    }
}

pub(crate) fn child_table<'b, B: InputBuffer + ?Sized, C: ConfigCore>(
    table: TableRef<'b, B, C>,
    schema: &'static TableSchema,
    generation: u64,
    depth: usize,
) -> Result<LazyTable<'b, B, C>> {
    let depth = depth + 1;
    if depth > C::MAX_DEPTH {
        return Err(corrupted(table.offset(), "nesting depth limit exceeded"));
    }
    Ok(LazyTable::new(table, schema, generation, depth))
}

/// A lazily decoded string. UTF-8 is validated on every [`LazyString::get`].
pub struct LazyString<'b, B: ?Sized, C = DefaultConfig> {
    buffer: &'b B,
    offset: usize,
    generation: u64,
    _config: PhantomData<C>,
}

impl<'b, B: InputBuffer + ?Sized, C: ConfigCore> LazyString<'b, B, C> {
    pub(crate) const fn new(buffer: &'b B, offset: usize, generation: u64) -> Self {
        Self {
            buffer,
            offset,
            generation,
            _config: PhantomData,
        }
    }

    /// Offset of the length prefix.
    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub fn get(&self) -> Result<Cow<'b, str>> {
        check_generation(self.buffer, self.generation)?;
        read_string::<B, C>(self.buffer, self.offset)
    }
}

/// A lazily decoded inline struct.
pub struct LazyStruct<'b, B: ?Sized, C = DefaultConfig> {
    inner: StructRef<'b, B, C>,
    generation: u64,
}

impl<'b, B: InputBuffer + ?Sized, C: ConfigCore> LazyStruct<'b, B, C> {
    pub(crate) const fn new(inner: StructRef<'b, B, C>, generation: u64) -> Self {
        Self { inner, generation }
    }

    pub const fn offset(&self) -> usize {
        self.inner.offset()
    }

    pub fn get(&self, index: usize) -> Result<Scalar> {
        self.check()?;
        self.inner.get(index)
    }

    pub fn field(&self, name: &str) -> Result<Scalar> {
        self.check()?;
        self.inner.field(name)
    }

    pub fn to_scalars(&self) -> Result<Vec<Scalar>> {
        self.check()?;
        self.inner.to_scalars()
    }

    fn check(&self) -> Result<()> {
        check_generation(self.inner.buffer(), self.generation)
    }
}

/// A lazily decoded vector. Every element access resolves offsets again.
pub struct LazyVector<'b, B: ?Sized, C = DefaultConfig> {
    vector: VectorRef<'b, B, C>,
    generation: u64,
    depth: usize,
}

impl<'b, B: InputBuffer + ?Sized, C: ConfigCore> LazyVector<'b, B, C> {
    pub(crate) const fn new(vector: VectorRef<'b, B, C>, generation: u64, depth: usize) -> Self {
        Self {
            vector,
            generation,
            depth,
        }
    }

    pub const fn len(&self) -> usize {
        self.vector.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.vector.is_empty()
    }

    pub const fn vector_ref(&self) -> VectorRef<'b, B, C> {
        self.vector
    }

    fn check(&self) -> Result<()> {
        check_generation(self.vector.buffer(), self.generation)
    }

    pub fn get(&self, index: usize) -> Result<LazyValue<'b, B, C>> {
        self.check()?;
        let vector = &self.vector;
        let value = match vector.element() {
            WireType::Scalar(_) => LazyValue::Scalar(vector.scalar_dyn(index)?),
            WireType::String => LazyValue::String(LazyString::new(
                vector.buffer(),
                vector.indirect(index)?,
                self.generation,
            )),
            WireType::Vector(_) => {
                LazyValue::Vector(LazyVector::new(vector.vector(index)?, self.generation, self.depth))
            }
            WireType::Table(schema) => LazyValue::Table(child_table(
                vector.table(index)?,
                *schema,
                self.generation,
                self.depth,
            )?),
            WireType::Struct(_) => {
                LazyValue::Struct(LazyStruct::new(vector.structure(index)?, self.generation))
            }
            WireType::Union(_) => {
                return Err(type_mismatch("vector element", "a non-union type", vector.offset()))
            }
        };
        Ok(value)
    }

    pub fn scalar<T: Primitive>(&self, index: usize) -> Result<T> {
        self.check()?;
        self.vector.scalar(index)
    }

    pub fn string(&self, index: usize) -> Result<Cow<'b, str>> {
        self.check()?;
        self.vector.string(index)
    }

    /// Payload of a `vector<u8>` / `vector<i8>`.
    pub fn bytes(&self) -> Result<Cow<'b, [u8]>> {
        self.check()?;
        self.vector.bytes()
    }

    pub fn iter(&self) -> impl Iterator<Item = Result<LazyValue<'b, B, C>>> + 'b {
        let vector = *self;
        (0..vector.len()).map(move |index| vector.get(index))
    }

    /// Memoize the element wrappers resolved from now on.
    pub fn cached(self) -> CachedVector<'b, B, C> {
        CachedVector {
            cells: (0..self.len()).map(|_| OnceCell::new()).collect(),
            vector: self,
        }
    }

    pub fn recycle(self) {
        self.vector.buffer().recycle();
    }
}

/// A [`LazyVector`] that resolves each offset-typed element at most once.
///
/// Only the wrappers are memoized: strings, tables and nested vectors still read the buffer
/// on access. Scalar elements are read directly every time.
pub struct CachedVector<'b, B: ?Sized, C = DefaultConfig> {
    vector: LazyVector<'b, B, C>,
    cells: Box<[OnceCell<LazyValue<'b, B, C>>]>,
}

impl<'b, B: InputBuffer + ?Sized, C: ConfigCore> CachedVector<'b, B, C> {
    pub const fn len(&self) -> usize {
        self.vector.len()
    }

    pub const fn is_empty(&self) -> bool {
        self.vector.is_empty()
    }

    pub fn get(&self, index: usize) -> Result<LazyValue<'b, B, C>> {
        self.vector.check()?;
        let Some(cell) = self.cells.get(index) else {
            return self.vector.get(index);
        };
        if matches!(self.vector.vector.element(), WireType::Scalar(_)) {
            return self.vector.get(index);
        }
        if let Some(value) = cell.get() {
            return Ok(*value);
        }
        let value = self.vector.get(index)?;
        Ok(*cell.get_or_init(|| value))
    }

    /// Number of elements resolved so far.
    pub fn resolved(&self) -> usize {
        self.cells.iter().filter(|cell| cell.get().is_some()).count()
    }

    pub fn into_inner(self) -> LazyVector<'b, B, C> {
        self.vector
    }
}
