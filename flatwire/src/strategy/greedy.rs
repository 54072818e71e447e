//! Greedy decoding.
//!
//! Every field is read and copied into an owned [`TableValue`] up front. The result keeps no
//! reference to the buffer and stays valid after the buffer is recycled or dropped.
//!
//! A table referenced from several offsets is copied once per reference. The number of tables
//! one decode may produce is capped by [`ConfigCore::MAX_TABLES`].
use crate::{
    codec::VectorRef,
    config::{ConfigCore, DefaultConfig},
    error::{corrupted, type_mismatch, Result},
    io::InputBuffer,
    protocol::TableRef,
    scalar::{Scalar, ScalarType},
    schema::{FieldDescriptor, TableSchema, WireType},
    value::{TableValue, UnionValue, Value},
};

/// Decode the root table of `buffer`.
pub fn decode<B: InputBuffer + ?Sized>(buffer: &B, schema: &TableSchema) -> Result<TableValue> {
    decode_with_config(buffer, schema, DefaultConfig::default())
}

pub fn decode_with_config<B: InputBuffer + ?Sized, C: ConfigCore>(
    buffer: &B,
    schema: &TableSchema,
    config: C,
) -> Result<TableValue> {
    let root = TableRef::root_with_config(buffer, config)?;
    decode_table(root, schema, 0)
}

/// Decode the table at `table`, which sits `depth` tables below the root.
pub fn decode_table<B: InputBuffer + ?Sized, C: ConfigCore>(
    table: TableRef<'_, B, C>,
    schema: &TableSchema,
    depth: usize,
) -> Result<TableValue> {
    Decoder { tables: 0 }.table(table, schema, depth)
}

/// Per-decode state shared by every table of one owned graph.
struct Decoder {
    tables: usize,
}

impl Decoder {
    fn table<B: InputBuffer + ?Sized, C: ConfigCore>(
        &mut self,
        table: TableRef<'_, B, C>,
        schema: &TableSchema,
        depth: usize,
    ) -> Result<TableValue> {
        if depth > C::MAX_DEPTH {
            return Err(corrupted(table.offset(), "nesting depth limit exceeded"));
        }
        self.tables += 1;
        if self.tables > C::MAX_TABLES {
            return Err(corrupted(table.offset(), "table limit exceeded"));
        }
        let fields = schema
            .fields
            .iter()
            .map(|field| self.field(table, field, depth))
            .collect::<Result<_>>()?;
        Ok(TableValue::new(fields))
    }

    fn field<B: InputBuffer + ?Sized, C: ConfigCore>(
        &mut self,
        table: TableRef<'_, B, C>,
        field: &FieldDescriptor,
        depth: usize,
    ) -> Result<Option<Value>> {
        let slot = field.slot;
        match field.ty {
            WireType::Scalar(ty) => Ok(table.scalar_field(slot, ty)?.map(Value::Scalar)),
            WireType::String => Ok(table
                .string(slot)?
                .map(|string| Value::String(string.into_owned()))),
            WireType::Vector(element) => table
                .vector(slot, element)?
                .map(|vector| self.vector(vector, depth))
                .transpose(),
            WireType::Table(schema) => table
                .table(slot)?
                .map(|child| self.table(child, schema, depth + 1).map(Value::Table))
                .transpose(),
            WireType::Struct(schema) => table
                .structure(slot, schema)?
                .map(|structure| structure.to_scalars().map(Value::Struct))
                .transpose(),
            WireType::Union(members) => table
                .union(slot, members)?
                .map(|union| {
                    self.table(union.table, union.schema, depth + 1)
                        .map(|member| Value::Union(UnionValue::new(union.tag, member)))
                })
                .transpose(),
        }
    }

    fn vector<B: InputBuffer + ?Sized, C: ConfigCore>(
        &mut self,
        vector: VectorRef<'_, B, C>,
        depth: usize,
    ) -> Result<Value> {
        let items = match vector.element() {
            WireType::Scalar(ScalarType::U8) => vector
                .bytes()?
                .iter()
                .map(|byte| Value::Scalar(Scalar::U8(*byte)))
                .collect(),
            WireType::Scalar(_) => (0..vector.len())
                .map(|index| vector.scalar_dyn(index).map(Value::Scalar))
                .collect::<Result<_>>()?,
            WireType::String => (0..vector.len())
                .map(|index| Ok(Value::String(vector.string(index)?.into_owned())))
                .collect::<Result<_>>()?,
            WireType::Vector(_) => (0..vector.len())
                .map(|index| self.vector(vector.vector(index)?, depth))
                .collect::<Result<_>>()?,
            WireType::Table(schema) => (0..vector.len())
                .map(|index| {
                    self.table(vector.table(index)?, schema, depth + 1)
                        .map(Value::Table)
                })
                .collect::<Result<_>>()?,
            WireType::Struct(_) => (0..vector.len())
                .map(|index| vector.structure(index)?.to_scalars().map(Value::Struct))
                .collect::<Result<_>>()?,
            WireType::Union(_) => {
                return Err(type_mismatch(
                    "vector element",
                    "a non-union type",
                    vector.offset(),
                ))
            }
        };
        Ok(Value::Vector(items))
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            config::Configuration,
            error::Error,
            writer::{self, TableBuilder},
        },
    };

    static FANOUT: TableSchema = TableSchema::new(
        "Fanout",
        &[FieldDescriptor::new("children", 0, WireType::Vector(&FANOUT_CHILD))],
    );
    static FANOUT_CHILD: WireType = WireType::Table(&FANOUT);

    /// Every level holds two offsets to the same table one level down, so the buffer grows
    /// linearly while the decoded graph doubles per level.
    fn shared_fanout(dst: &mut [u8], levels: usize) -> usize {
        let mut builder = TableBuilder::new(dst);
        let mut node = builder.start_table().end().unwrap();
        for _ in 0..levels {
            let children = builder.create_offset_vector(&[node, node]).unwrap();
            let mut table = builder.start_table();
            table.add_offset(0, children);
            node = table.end().unwrap();
        }
        builder.finish(node, None).unwrap()
    }

    fn count_tables(table: &TableValue) -> usize {
        let children = table.get(0).and_then(Value::as_vector).map_or(0, |items| {
            items.iter().filter_map(Value::as_table).map(count_tables).sum()
        });
        1 + children
    }

    #[test]
    fn decoded_graphs_outlive_the_buffer() {
        let decoded = {
            let bytes = writer::serialize(&NODE, &chain(5)).unwrap();
            decode(bytes.as_slice(), &NODE).unwrap()
        };
        assert_eq!(decoded, chain(5));

        fn assert_owned<T: Send + Sync + 'static>(_: &T) {}
        assert_owned(&decoded);
    }

    #[test]
    fn nesting_beyond_the_configured_depth_is_rejected() {
        let bytes = writer::serialize(&NODE, &chain(6)).unwrap();
        let shallow = Configuration::default().with_max_depth::<4>();
        assert!(matches!(
            decode_with_config(bytes.as_slice(), &NODE, shallow),
            Err(Error::CorruptedData {
                reason: "nesting depth limit exceeded",
                ..
            })
        ));
        let bytes = writer::serialize(&NODE, &chain(5)).unwrap();
        assert_eq!(
            decode_with_config(bytes.as_slice(), &NODE, shallow),
            Ok(chain(5))
        );
    }

    #[test]
    fn shared_subtables_count_against_the_table_budget() {
        let mut dst = vec![0u8; 1024];
        let len = shared_fanout(&mut dst, 6);
        let bytes = &dst[..len];

        let exact = Configuration::default().with_max_tables::<127>();
        let decoded = decode_with_config(bytes, &FANOUT, exact).unwrap();
        assert_eq!(count_tables(&decoded), 127);

        let tight = Configuration::default().with_max_tables::<126>();
        assert!(matches!(
            decode_with_config(bytes, &FANOUT, tight),
            Err(Error::CorruptedData {
                reason: "table limit exceeded",
                ..
            })
        ));
    }

    #[test]
    fn exponential_fanout_stops_at_the_budget() {
        let mut dst = vec![0u8; 4096];
        let len = shared_fanout(&mut dst, 48);
        assert!(len < 2048, "{len} bytes for 48 levels");
        let config = Configuration::default().with_max_tables::<10_000>();
        assert!(matches!(
            decode_with_config(&dst[..len], &FANOUT, config),
            Err(Error::CorruptedData {
                reason: "table limit exceeded",
                ..
            })
        ));
    }

    #[test]
    fn truncated_buffers_fail_as_a_whole() {
        let bytes = writer::serialize(&NODE, &chain(3)).unwrap();
        for len in 0..bytes.len() {
            assert!(decode(&bytes[..len], &NODE).is_err(), "prefix of {len} bytes decoded");
        }
    }
}
