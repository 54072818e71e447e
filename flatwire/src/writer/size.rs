//! Worst-case size estimation.
//!
//! The estimate assumes no vtable sharing and the largest padding every object could need,
//! so a destination of [`max_size`] bytes always fits the layout produced by
//! [`write`](super::write).
use crate::{
    error::{layout_overflow, type_mismatch, Result},
    protocol::{FILE_IDENTIFIER_LENGTH, SOFFSET_SIZE, UOFFSET_SIZE, VOFFSET_SIZE, VTABLE_HEADER_SIZE},
    schema::{TableSchema, WireType},
    value::{TableValue, Value},
};

/// Upper bound on the bytes [`write`](super::write) needs for `table`.
pub fn max_size(schema: &TableSchema, table: &TableValue) -> Result<usize> {
    max_size_with_identifier(schema, table, false)
}

pub(crate) fn max_size_with_identifier(
    schema: &TableSchema,
    table: &TableValue,
    identifier: bool,
) -> Result<usize> {
    let mut estimate = Estimate::default();
    estimate.table(schema, table)?;
    estimate.add(UOFFSET_SIZE)?;
    if identifier {
        estimate.add(FILE_IDENTIFIER_LENGTH)?;
    }
    estimate.add(estimate.max_align - 1)?;
    Ok(estimate.total)
}

struct Estimate {
    total: usize,
    max_align: usize,
}

impl Default for Estimate {
    fn default() -> Self {
        Self {
            total: 0,
            max_align: UOFFSET_SIZE,
        }
    }
}

impl Estimate {
    fn add(&mut self, bytes: usize) -> Result<()> {
        self.total = self
            .total
            .checked_add(bytes)
            .ok_or_else(|| layout_overflow("estimated size"))?;
        Ok(())
    }

    /// `bytes` of payload preceded by up to `align - 1` bytes of padding.
    fn aligned(&mut self, bytes: usize, align: usize) -> Result<()> {
        self.max_align = self.max_align.max(align);
        self.add(bytes)?;
        self.add(align - 1)
    }

    fn table(&mut self, schema: &TableSchema, table: &TableValue) -> Result<()> {
        if table.fields.len() != schema.fields.len() {
            return Err(type_mismatch(schema.name, "one entry per declared field", 0));
        }
        let vtable = schema
            .slot_count()
            .checked_mul(VOFFSET_SIZE)
            .ok_or_else(|| layout_overflow("vtable length"))?;
        self.add(VTABLE_HEADER_SIZE + vtable)?;

        // Leading padding up to the widest member, then the soffset and its own padding.
        let widest = schema
            .fields
            .iter()
            .map(|field| field.ty.inline_align())
            .fold(UOFFSET_SIZE, usize::max);
        self.aligned(0, widest)?;
        self.aligned(SOFFSET_SIZE, UOFFSET_SIZE)?;

        for (field, value) in schema.fields.iter().zip(&table.fields) {
            let Some(value) = value else {
                continue;
            };
            match (&field.ty, value) {
                (WireType::Scalar(ty), Value::Scalar(_)) => self.aligned(ty.width(), ty.width())?,
                (WireType::Struct(schema), Value::Struct(_)) => {
                    self.aligned(schema.size, schema.align)?
                }
                (WireType::Union(members), Value::Union(union)) => {
                    let member = usize::from(union.tag)
                        .checked_sub(1)
                        .and_then(|index| members.get(index))
                        .ok_or_else(|| type_mismatch(field.name, "a declared union member", 0))?;
                    self.aligned(1, 1)?;
                    self.aligned(UOFFSET_SIZE, UOFFSET_SIZE)?;
                    self.table(member, &union.table)?;
                }
                (ty, value) => {
                    self.aligned(UOFFSET_SIZE, UOFFSET_SIZE)?;
                    self.indirect(field.name, ty, value)?;
                }
            }
        }
        Ok(())
    }

    fn indirect(&mut self, name: &'static str, ty: &WireType, value: &Value) -> Result<()> {
        match (ty, value) {
            (WireType::String, Value::String(string)) => {
                self.add(UOFFSET_SIZE)?;
                self.aligned(string.len(), UOFFSET_SIZE)?;
                self.add(1)
            }
            (WireType::Table(schema), Value::Table(table)) => self.table(schema, table),
            (WireType::Vector(element), Value::Vector(items)) => {
                self.add(UOFFSET_SIZE)?;
                // Two alignment steps: to the length prefix, then to the element.
                self.aligned(0, UOFFSET_SIZE)?;
                self.aligned(0, element.inline_align())?;
                let payload = element
                    .inline_size()
                    .checked_mul(items.len())
                    .ok_or_else(|| layout_overflow("vector payload"))?;
                self.add(payload)?;
                if element.is_indirect() {
                    for item in items {
                        self.indirect(name, element, item)?;
                    }
                }
                Ok(())
            }
            (ty, _) => Err(type_mismatch(name, ty.name(), 0)),
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{scalar::{Scalar, ScalarType}, schema::FieldDescriptor},
    };

    static WORDS: WireType = WireType::String;
    static NOTE: TableSchema = TableSchema::new(
        "Note",
        &[
            FieldDescriptor::scalar("pitch", 0, ScalarType::U8),
            FieldDescriptor::new("lyrics", 1, WireType::Vector(&WORDS)),
        ],
    );

    #[test]
    fn empty_table_bound() {
        // vtable 8, leading padding 3, soffset 4 + 3, root uoffset 4, final padding 3
        assert_eq!(max_size(&NOTE, &TableValue::empty(&NOTE)), Ok(25));
    }

    #[test]
    fn shape_mismatches_are_reported() {
        let mut note = TableValue::empty(&NOTE);
        note.set(&NOTE, "lyrics", "la");
        assert!(matches!(
            max_size(&NOTE, &note),
            Err(crate::Error::TypeMismatch { field: "lyrics", .. })
        ));
        assert!(max_size(&NOTE, &TableValue::new(vec![None])).is_err());
    }

    #[test]
    fn identifier_adds_four_bytes() {
        let mut note = TableValue::empty(&NOTE);
        note.set(&NOTE, "pitch", Scalar::U8(60));
        note.set(&NOTE, "lyrics", Value::Vector(vec!["la".into(), "di".into()]));
        let plain = max_size(&NOTE, &note).unwrap();
        assert_eq!(max_size_with_identifier(&NOTE, &note, true), Ok(plain + 4));
    }
}
