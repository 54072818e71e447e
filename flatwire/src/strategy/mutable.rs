//! Mutable decoding: lazy views that write scalar changes back into the buffer.
//!
//! Only same-width overwrites are possible in place. Changing a string, replacing a table or
//! union, adding an absent field and resizing a vector all fail with
//! [`Error::UnsupportedMutation`](crate::Error::UnsupportedMutation).
use {
    super::{
        check_generation,
        lazy::{LazyTable, LazyValue, LazyVector},
    },
    crate::{
        codec::{check_alignment, encode_struct, VectorRef},
        config::{ConfigCore, DefaultConfig},
        error::{corrupted, type_mismatch, unsupported_mutation, Result},
        io::OutputBuffer,
        protocol::TableRef,
        scalar::{Primitive, Scalar, ScalarType},
        schema::{FieldDescriptor, TableSchema, WireType},
        value::Value,
    },
    core::marker::PhantomData,
};

/// A table view with exclusive access to its buffer.
pub struct MutableTable<'b, B: ?Sized, C = DefaultConfig> {
    buffer: &'b mut B,
    offset: usize,
    schema: &'static TableSchema,
    generation: u64,
    depth: usize,
    _config: PhantomData<C>,
}

impl<'b, B: OutputBuffer + ?Sized> MutableTable<'b, B> {
    pub fn root(buffer: &'b mut B, schema: &'static TableSchema) -> Result<Self> {
        Self::root_with_config(buffer, schema, DefaultConfig::default())
    }
}

impl<'b, B: OutputBuffer + ?Sized, C: ConfigCore> MutableTable<'b, B, C> {
    pub fn root_with_config(
        buffer: &'b mut B,
        schema: &'static TableSchema,
        config: C,
    ) -> Result<Self> {
        let offset = TableRef::<B, C>::root_with_config(&*buffer, config)?.offset();
        let generation = buffer.generation();
        Ok(Self {
            buffer,
            offset,
            schema,
            generation,
            depth: 0,
            _config: PhantomData,
        })
    }

    pub const fn offset(&self) -> usize {
        self.offset
    }

    pub const fn schema(&self) -> &'static TableSchema {
        self.schema
    }

    /// Read-only view of the same table.
    pub fn view(&self) -> LazyTable<'_, B, C> {
        LazyTable::new(
            TableRef::new(&*self.buffer, self.offset),
            self.schema,
            self.generation,
            self.depth,
        )
    }

    pub fn get(&self, name: &str) -> Result<Option<LazyValue<'_, B, C>>> {
        self.view().get(name)
    }

    pub fn scalar<T: Primitive>(&self, name: &str) -> Result<T> {
        self.view().scalar(name)
    }

    /// Location of a present field occupying `width` bytes.
    fn locate(&self, field: &FieldDescriptor, width: usize) -> Result<usize> {
        let view = self.view();
        view.check_generation()?;
        view.table_ref()
            .vtable()?
            .field_span(field.slot, width)?
            .ok_or_else(|| unsupported_mutation(self.offset, "field is absent from the table"))
    }

    /// Overwrite a present scalar field. `value` must have the field's exact wire type.
    pub fn set_scalar(&mut self, name: &str, value: Scalar) -> Result<()> {
        let field = self.view().descriptor(name)?;
        let ty = match field.ty {
            WireType::Scalar(ty) => ty,
            WireType::String => {
                return Err(unsupported_mutation(self.offset, "strings cannot be changed in place"))
            }
            WireType::Vector(_) => {
                return Err(unsupported_mutation(
                    self.offset,
                    "vectors cannot be replaced in place",
                ))
            }
            WireType::Table(_) | WireType::Union(_) => {
                return Err(unsupported_mutation(
                    self.offset,
                    "tables cannot be replaced in place",
                ))
            }
            WireType::Struct(_) => return Err(type_mismatch(field.name, "struct", self.offset)),
        };
        if value.scalar_type() != ty {
            return Err(type_mismatch(field.name, ty.name(), self.offset));
        }
        let at = self.locate(field, ty.width())?;
        check_alignment::<C>(at, ty.width())?;
        value.write_le_slice(self.buffer.span_mut(at, ty.width())?);
        Ok(())
    }

    pub fn set<T: Primitive>(&mut self, name: &str, value: T) -> Result<()> {
        self.set_scalar(name, value.into_scalar())
    }

    /// Overwrite a whole inline struct field.
    pub fn set_struct(&mut self, name: &str, values: &[Scalar]) -> Result<()> {
        let field = self.view().descriptor(name)?;
        let WireType::Struct(schema) = field.ty else {
            return Err(type_mismatch(field.name, field.ty.name(), self.offset));
        };
        let at = self.locate(field, schema.size)?;
        check_alignment::<C>(at, schema.align)?;
        encode_struct(schema, values, self.buffer.span_mut(at, schema.size)?, at)
    }

    /// Overwrite one member of an inline struct field.
    pub fn set_struct_member(&mut self, name: &str, member: &str, value: Scalar) -> Result<()> {
        let field = self.view().descriptor(name)?;
        let WireType::Struct(schema) = field.ty else {
            return Err(type_mismatch(field.name, field.ty.name(), self.offset));
        };
        let at = self.locate(field, schema.size)?;
        let member = schema
            .position(member)
            .map(|position| &schema.fields[position])
            .ok_or_else(|| type_mismatch(schema.name, "a declared struct member", at))?;
        if value.scalar_type() != member.ty {
            return Err(type_mismatch(member.name, member.ty.name(), at + member.offset));
        }
        let at = at + member.offset;
        check_alignment::<C>(at, member.ty.width())?;
        value.write_le_slice(self.buffer.span_mut(at, member.ty.width())?);
        Ok(())
    }

    fn child_depth(&self, offset: usize) -> Result<usize> {
        let depth = self.depth + 1;
        if depth > C::MAX_DEPTH {
            return Err(corrupted(offset, "nesting depth limit exceeded"));
        }
        Ok(depth)
    }

    fn reborrow(
        &mut self,
        offset: usize,
        schema: &'static TableSchema,
    ) -> Result<MutableTable<'_, B, C>> {
        let depth = self.child_depth(offset)?;
        Ok(MutableTable {
            buffer: &mut *self.buffer,
            offset,
            schema,
            generation: self.generation,
            depth,
            _config: PhantomData,
        })
    }

    /// Mutable view of a nested table field.
    pub fn table_mut(&mut self, name: &str) -> Result<Option<MutableTable<'_, B, C>>> {
        let (schema, target) = {
            let view = self.view();
            view.check_generation()?;
            let field = view.descriptor(name)?;
            let WireType::Table(schema) = field.ty else {
                return Err(type_mismatch(field.name, "table", self.offset));
            };
            (schema, view.table_ref().indirect(field.slot)?)
        };
        match target {
            None => Ok(None),
            Some(target) => self.reborrow(target, schema).map(Some),
        }
    }

    /// Mutable view of the member table of a union field.
    pub fn union_mut(&mut self, name: &str) -> Result<Option<(u8, MutableTable<'_, B, C>)>> {
        let member = {
            let view = self.view();
            view.check_generation()?;
            let field = view.descriptor(name)?;
            let WireType::Union(members) = field.ty else {
                return Err(type_mismatch(field.name, "union", self.offset));
            };
            view.table_ref()
                .union(field.slot, members)?
                .map(|union| (union.tag, union.schema, union.table.offset()))
        };
        match member {
            None => Ok(None),
            Some((tag, schema, target)) => Ok(Some((tag, self.reborrow(target, schema)?))),
        }
    }

    pub fn vector_mut(&mut self, name: &str) -> Result<Option<MutableVector<'_, B, C>>> {
        let vector = {
            let view = self.view();
            view.check_generation()?;
            let field = view.descriptor(name)?;
            let WireType::Vector(element) = field.ty else {
                return Err(type_mismatch(field.name, "vector", self.offset));
            };
            view.table_ref()
                .vector(field.slot, element)?
                .map(|vector| (vector.offset(), vector.len(), element))
        };
        Ok(vector.map(|(offset, len, element)| MutableVector {
            buffer: &mut *self.buffer,
            offset,
            len,
            element,
            generation: self.generation,
            depth: self.depth,
            _config: PhantomData,
        }))
    }

    /// Release the buffer for reuse. Every view of it created so far becomes stale.
    pub fn recycle(self) {
        self.buffer.recycle();
    }
}

/// A vector view with exclusive access to its buffer.
///
/// Elements can be overwritten whole when they have a fixed width. The element count is
/// fixed once written.
pub struct MutableVector<'b, B: ?Sized, C = DefaultConfig> {
    buffer: &'b mut B,
    /// Offset of the length prefix.
    offset: usize,
    len: usize,
    element: &'static WireType,
    generation: u64,
    depth: usize,
    _config: PhantomData<C>,
}

impl<'b, B: OutputBuffer + ?Sized, C: ConfigCore> MutableVector<'b, B, C> {
    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn vector_ref(&self) -> Result<VectorRef<'_, B, C>> {
        check_generation(&*self.buffer, self.generation)?;
        VectorRef::new(&*self.buffer, self.offset, self.element)
    }

    pub fn get(&self, index: usize) -> Result<LazyValue<'_, B, C>> {
        let vector = self.vector_ref()?;
        LazyVector::new(vector, self.generation, self.depth).get(index)
    }

    /// Overwrite scalar element `index`. `value` must have the element's exact wire type.
    pub fn set_scalar(&mut self, index: usize, value: Scalar) -> Result<()> {
        let ty = self.fixed_width_element()?;
        let WireType::Scalar(ty) = ty else {
            return Err(type_mismatch("vector element", "struct", self.offset));
        };
        if value.scalar_type() != ty {
            return Err(type_mismatch("vector element", ty.name(), self.offset));
        }
        let at = self.vector_ref()?.element_offset(index)?;
        value.write_le_slice(self.buffer.span_mut(at, ty.width())?);
        Ok(())
    }

    pub fn set<T: Primitive>(&mut self, index: usize, value: T) -> Result<()> {
        self.set_scalar(index, value.into_scalar())
    }

    /// Overwrite struct element `index`.
    pub fn set_struct(&mut self, index: usize, values: &[Scalar]) -> Result<()> {
        let WireType::Struct(schema) = self.fixed_width_element()? else {
            return Err(type_mismatch("vector element", "scalar", self.offset));
        };
        let at = self.vector_ref()?.element_offset(index)?;
        encode_struct(schema, values, self.buffer.span_mut(at, schema.size)?, at)
    }

    fn fixed_width_element(&self) -> Result<WireType> {
        match self.element {
            WireType::Scalar(_) | WireType::Struct(_) => Ok(*self.element),
            _ => Err(unsupported_mutation(
                self.offset,
                "offset-typed vector elements cannot be replaced in place",
            )),
        }
    }

    /// Always fails: the element count is fixed once written.
    pub fn push(&mut self, _value: impl Into<Value>) -> Result<()> {
        Err(unsupported_mutation(self.offset, "vectors cannot grow in place"))
    }

    /// Fails unless `len` is the current length.
    pub fn truncate(&mut self, len: usize) -> Result<()> {
        if len == self.len {
            return Ok(());
        }
        Err(unsupported_mutation(self.offset, "vectors cannot shrink in place"))
    }

    /// Payload of a `vector<u8>` / `vector<i8>` for whole-element overwrites.
    pub fn bytes_mut(&mut self) -> Result<&mut [u8]> {
        let start = self.vector_ref()?.start();
        match self.element {
            WireType::Scalar(ScalarType::U8 | ScalarType::I8) => self.buffer.span_mut(start, self.len),
            _ => Err(type_mismatch("vector element", "u8", self.offset)),
        }
    }

    /// Mutable view of table element `index`.
    pub fn table_mut(&mut self, index: usize) -> Result<MutableTable<'_, B, C>> {
        let WireType::Table(schema) = self.element else {
            return Err(type_mismatch("vector element", "table", self.offset));
        };
        let target = self.vector_ref()?.table(index)?.offset();
        let depth = self.depth + 1;
        if depth > C::MAX_DEPTH {
            return Err(corrupted(target, "nesting depth limit exceeded"));
        }
        Ok(MutableTable {
            buffer: &mut *self.buffer,
            offset: target,
            schema,
            generation: self.generation,
            depth,
            _config: PhantomData,
        })
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            error::Error,
            io::PooledBuffer,
            schema::{StructField, StructSchema},
            strategy::{greedy, lazy::LazyTable},
            value::TableValue,
            writer,
        },
    };

    static RGB: StructSchema = StructSchema::new(
        "Rgb",
        3,
        1,
        &[
            StructField::new("r", 0, ScalarType::U8),
            StructField::new("g", 1, ScalarType::U8),
            StructField::new("b", 2, ScalarType::U8),
        ],
    );

    static BYTES: WireType = WireType::Scalar(ScalarType::U8);
    static WEIGHTS: WireType = WireType::Scalar(ScalarType::F32);
    static PIXELS: WireType = WireType::Struct(&RGB);
    static NAMES: WireType = WireType::String;
    static LAYERS: WireType = WireType::Table(&LAYER);

    static LAYER: TableSchema = TableSchema::new(
        "Layer",
        &[
            FieldDescriptor::scalar("visible", 0, ScalarType::Bool),
            FieldDescriptor::scalar("opacity", 1, ScalarType::F32),
            FieldDescriptor::new("name", 2, WireType::String),
            FieldDescriptor::new("mask", 3, WireType::Vector(&BYTES)),
            FieldDescriptor::new("weights", 4, WireType::Vector(&WEIGHTS)),
            FieldDescriptor::new("palette", 5, WireType::Vector(&PIXELS)),
            FieldDescriptor::new("tags", 6, WireType::Vector(&NAMES)),
            FieldDescriptor::new("background", 7, WireType::Struct(&RGB)),
            FieldDescriptor::new("children", 8, WireType::Vector(&LAYERS)),
            FieldDescriptor::new("parent", 9, WireType::Table(&LAYER)),
        ],
    );

    fn layer() -> TableValue {
        let mut child = TableValue::empty(&LAYER);
        child.set(&LAYER, "visible", Scalar::Bool(false));
        child.set(&LAYER, "opacity", Scalar::F32(0.25));

        let mut layer = TableValue::empty(&LAYER);
        layer.set(&LAYER, "visible", Scalar::Bool(true));
        layer.set(&LAYER, "name", "base");
        layer.set(&LAYER, "mask", Value::bytes(&[0, 1, 0, 1]));
        layer.set(
            &LAYER,
            "weights",
            Value::Vector(vec![Scalar::F32(0.5).into(), Scalar::F32(1.5).into()]),
        );
        layer.set(
            &LAYER,
            "palette",
            Value::Vector(vec![Value::Struct(vec![
                Scalar::U8(1),
                Scalar::U8(2),
                Scalar::U8(3),
            ])]),
        );
        layer.set(&LAYER, "tags", Value::Vector(vec!["a".into()]));
        layer.set(
            &LAYER,
            "background",
            Value::Struct(vec![Scalar::U8(9), Scalar::U8(9), Scalar::U8(9)]),
        );
        layer.set(&LAYER, "children", Value::Vector(vec![child.clone().into()]));
        layer.set(&LAYER, "parent", child);
        layer
    }

    #[test]
    fn scalar_writes_are_visible_to_fresh_views() {
        let mut bytes = writer::serialize(&LAYER, &layer()).unwrap();
        {
            let mut table = MutableTable::root(&mut bytes, &LAYER).unwrap();
            table.set("visible", false).unwrap();
            table.set_struct("background", &[Scalar::U8(1), Scalar::U8(2), Scalar::U8(4)]).unwrap();
            table.set_struct_member("background", "b", Scalar::U8(3)).unwrap();
            assert!(table.set_struct_member("background", "a", Scalar::U8(3)).is_err());
            assert_eq!(table.scalar::<bool>("visible"), Ok(false));
        }
        let fresh = LazyTable::root(bytes.as_slice(), &LAYER).unwrap();
        assert_eq!(fresh.scalar::<bool>("visible"), Ok(false));
        assert_eq!(
            fresh.structure("background").unwrap().unwrap().to_scalars(),
            Ok(vec![Scalar::U8(1), Scalar::U8(2), Scalar::U8(3)])
        );
    }

    #[test]
    fn structural_changes_are_rejected() {
        let mut bytes = writer::serialize(&LAYER, &layer()).unwrap();
        let original = bytes.clone();
        let mut table = MutableTable::root(&mut bytes, &LAYER).unwrap();

        assert!(matches!(
            table.set("opacity", 1.0f32),
            Err(Error::UnsupportedMutation {
                reason: "field is absent from the table",
                ..
            })
        ));
        assert!(matches!(
            table.set_scalar("name", Scalar::U32(0)),
            Err(Error::UnsupportedMutation { .. })
        ));
        assert!(matches!(
            table.set_scalar("parent", Scalar::U32(0)),
            Err(Error::UnsupportedMutation { .. })
        ));
        assert!(matches!(
            table.set("visible", 1u8),
            Err(Error::TypeMismatch { field: "visible", .. })
        ));

        let mut mask = table.vector_mut("mask").unwrap().unwrap();
        assert!(matches!(
            mask.push(Scalar::U8(1)),
            Err(Error::UnsupportedMutation {
                reason: "vectors cannot grow in place",
                ..
            })
        ));
        assert!(mask.truncate(2).is_err());
        assert_eq!(mask.truncate(4), Ok(()));

        let mut tags = table.vector_mut("tags").unwrap().unwrap();
        assert!(matches!(
            tags.set_scalar(0, Scalar::U8(0)),
            Err(Error::UnsupportedMutation { .. })
        ));
        drop(table);
        assert_eq!(bytes, original);
    }

    #[test]
    fn vector_elements_are_overwritten_whole() {
        let mut bytes = writer::serialize(&LAYER, &layer()).unwrap();
        {
            let mut table = MutableTable::root(&mut bytes, &LAYER).unwrap();
            let mut mask = table.vector_mut("mask").unwrap().unwrap();
            mask.bytes_mut().unwrap().copy_from_slice(&[7, 7, 7, 7]);
            assert!(mask.set(4, 0u8).is_err());

            let mut weights = table.vector_mut("weights").unwrap().unwrap();
            weights.set(1, 2.5f32).unwrap();
            assert!(weights.set(0, 1.0f64).is_err());
            assert_eq!(weights.get(1).unwrap().as_scalar(), Some(Scalar::F32(2.5)));

            let mut palette = table.vector_mut("palette").unwrap().unwrap();
            palette.set_struct(0, &[Scalar::U8(4), Scalar::U8(5), Scalar::U8(6)]).unwrap();

            let mut children = table.vector_mut("children").unwrap().unwrap();
            children.table_mut(0).unwrap().set("opacity", 0.75f32).unwrap();

            table.table_mut("parent").unwrap().unwrap().set("visible", true).unwrap();
        }

        let decoded = greedy::decode(bytes.as_slice(), &LAYER).unwrap();
        let mut expected = layer();
        expected.set(&LAYER, "mask", Value::bytes(&[7, 7, 7, 7]));
        expected.set(
            &LAYER,
            "weights",
            Value::Vector(vec![Scalar::F32(0.5).into(), Scalar::F32(2.5).into()]),
        );
        expected.set(
            &LAYER,
            "palette",
            Value::Vector(vec![Value::Struct(vec![
                Scalar::U8(4),
                Scalar::U8(5),
                Scalar::U8(6),
            ])]),
        );
        let mut child = TableValue::empty(&LAYER);
        child.set(&LAYER, "visible", Scalar::Bool(false));
        child.set(&LAYER, "opacity", Scalar::F32(0.75));
        expected.set(&LAYER, "children", Value::Vector(vec![child.into()]));
        let mut parent = TableValue::empty(&LAYER);
        parent.set(&LAYER, "visible", Scalar::Bool(true));
        parent.set(&LAYER, "opacity", Scalar::F32(0.25));
        expected.set(&LAYER, "parent", parent);
        assert_eq!(decoded, expected);
    }

    #[test]
    fn recycled_buffers_reject_mutation() {
        let mut pooled = PooledBuffer::new(writer::serialize(&LAYER, &layer()).unwrap());
        let mut table = MutableTable::root(&mut pooled, &LAYER).unwrap();
        table.set("visible", false).unwrap();
        table.recycle();

        let mut table = MutableTable::root(&mut pooled, &LAYER).unwrap();
        table.set("visible", true).unwrap();
        let offset = table.offset();
        let stale = MutableTable {
            buffer: &mut pooled,
            offset,
            schema: &LAYER,
            generation: 0,
            depth: 0,
            _config: PhantomData::<DefaultConfig>,
        };
        assert!(matches!(
            stale.scalar::<bool>("visible"),
            Err(Error::UseAfterRecycle {
                generation: 0,
                current: 1
            })
        ));
    }
}
