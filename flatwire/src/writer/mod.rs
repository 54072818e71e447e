//! Serialization of owned table graphs.
//!
//! Writing happens in two passes, following the same shape as reading: [`max_size`] walks the
//! graph once for an upper bound, then [`write`] lays the graph out back to front with a
//! [`TableBuilder`]. Values are checked against the schema as they are written, and a value
//! that disagrees with its descriptor fails with [`TypeMismatch`](crate::Error::TypeMismatch)
//! before the object holding it is laid out.
//!
//! ```
//! use flatwire::{
//!     scalar::{Scalar, ScalarType},
//!     schema::{FieldDescriptor, TableSchema, WireType},
//!     strategy::greedy,
//!     value::TableValue,
//!     writer,
//! };
//!
//! static POINT: TableSchema = TableSchema::new(
//!     "Point",
//!     &[
//!         FieldDescriptor::scalar("x", 0, ScalarType::F32),
//!         FieldDescriptor::scalar("y", 1, ScalarType::F32),
//!         FieldDescriptor::new("label", 2, WireType::String),
//!     ],
//! );
//!
//! let mut point = TableValue::empty(&POINT);
//! point.set(&POINT, "x", Scalar::F32(1.5));
//! point.set(&POINT, "label", "origin-ish");
//!
//! let bytes = writer::serialize(&POINT, &point).unwrap();
//! assert_eq!(greedy::decode(bytes.as_slice(), &POINT).unwrap(), point);
//! ```
use {
    crate::{
        config::{ConfigCore, DefaultConfig},
        error::{buffer_too_small, type_mismatch, Error, Result},
        io::OutputBuffer,
        scalar::{Scalar, ScalarType},
        schema::{TableSchema, WireType},
        value::{TableValue, Value},
    },
    log::debug,
};

mod builder;
mod size;

pub use {
    builder::{BuildStats, Position, TableBuilder, TableWriter},
    size::max_size,
};

/// Write `table` into `buffer` and return the number of bytes written.
///
/// The serialized block starts at offset 0 of `buffer`. Bytes past the returned length are
/// scratch space and may have been overwritten.
pub fn write<B: OutputBuffer + ?Sized>(
    buffer: &mut B,
    schema: &TableSchema,
    table: &TableValue,
) -> Result<usize> {
    write_with_config(buffer, schema, table, DefaultConfig::default())
}

pub fn write_with_config<B: OutputBuffer + ?Sized, C: ConfigCore>(
    buffer: &mut B,
    schema: &TableSchema,
    table: &TableValue,
    config: C,
) -> Result<usize> {
    write_inner(buffer.as_contiguous_mut(), schema, table, None, config)
}

/// Like [`write`], with a 4-byte file identifier stored right after the root uoffset.
pub fn write_with_identifier<B: OutputBuffer + ?Sized>(
    buffer: &mut B,
    schema: &TableSchema,
    table: &TableValue,
    identifier: [u8; 4],
) -> Result<usize> {
    write_inner(
        buffer.as_contiguous_mut(),
        schema,
        table,
        Some(identifier),
        DefaultConfig::default(),
    )
}

/// Serialize `table` into a freshly allocated vector holding exactly the written bytes.
pub fn serialize(schema: &TableSchema, table: &TableValue) -> Result<Vec<u8>> {
    serialize_with_config(schema, table, DefaultConfig::default())
}

pub fn serialize_with_config<C: ConfigCore>(
    schema: &TableSchema,
    table: &TableValue,
    config: C,
) -> Result<Vec<u8>> {
    let mut buffer = vec![0; max_size(schema, table)?];
    let len = write_with_config(&mut buffer, schema, table, config)?;
    buffer.truncate(len);
    Ok(buffer)
}

fn write_inner<C: ConfigCore>(
    dst: &mut [u8],
    schema: &TableSchema,
    table: &TableValue,
    identifier: Option<[u8; 4]>,
    config: C,
) -> Result<usize> {
    match encode(dst, schema, table, identifier, config) {
        Err(Error::BufferTooSmall { available, .. }) => {
            // Measure the exact size against a destination that is known to be large enough.
            let mut scratch =
                vec![0; size::max_size_with_identifier(schema, table, identifier.is_some())?];
            let needed = encode(&mut scratch, schema, table, identifier, config)?;
            debug!("destination of {available} bytes is too small, {needed} needed");
            Err(buffer_too_small(needed, available))
        }
        result => result,
    }
}

fn encode<C: ConfigCore>(
    dst: &mut [u8],
    schema: &TableSchema,
    table: &TableValue,
    identifier: Option<[u8; 4]>,
    config: C,
) -> Result<usize> {
    let mut builder = TableBuilder::with_config(dst, config);
    let root = encode_table(&mut builder, schema, table)?;
    builder.finish(root, identifier)
}

fn encode_table<C: ConfigCore>(
    builder: &mut TableBuilder<'_, C>,
    schema: &TableSchema,
    table: &TableValue,
) -> Result<Position> {
    if table.fields.len() != schema.fields.len() {
        return Err(type_mismatch(schema.name, "one entry per declared field", builder.len()));
    }
    for (field, value) in schema.fields.iter().zip(&table.fields) {
        if let Some(value) = value {
            check_shape(field.name, &field.ty, value, builder.len())?;
        }
    }

    // Children first, so their positions are known when the table is laid out.
    let mut children = Vec::with_capacity(schema.fields.len());
    for (field, value) in schema.fields.iter().zip(&table.fields) {
        let child = match (&field.ty, value) {
            (WireType::String, Some(Value::String(string))) => Some(builder.create_string(string)?),
            (WireType::Vector(element), Some(Value::Vector(items))) => {
                Some(encode_vector(builder, field.name, element, items)?)
            }
            (WireType::Table(schema), Some(Value::Table(table))) => {
                Some(encode_table(builder, schema, table)?)
            }
            (WireType::Union(members), Some(Value::Union(union))) => {
                let member = members[usize::from(union.tag) - 1];
                Some(encode_table(builder, member, &union.table)?)
            }
            _ => None,
        };
        children.push(child);
    }

    let mut writer = builder.start_table();
    for ((field, value), child) in schema.fields.iter().zip(&table.fields).zip(children) {
        let Some(value) = value else {
            continue;
        };
        match (&field.ty, value, child) {
            (WireType::Scalar(_), Value::Scalar(value), _) => {
                writer.add_scalar_default(field.slot, *value, field.default)
            }
            (WireType::Struct(schema), Value::Struct(values), _) => {
                writer.add_struct(field.slot, schema, values)?
            }
            (WireType::Union(_), Value::Union(union), Some(member)) => {
                writer.add_union(field.slot, union.tag, member)?
            }
            (_, _, Some(child)) => writer.add_offset(field.slot, child),
            _ => {}
        }
    }
    writer.end()
}

/// Check that `value` has the shape `ty` describes, without descending into children.
fn check_shape(name: &'static str, ty: &WireType, value: &Value, offset: usize) -> Result<()> {
    let matches = match (ty, value) {
        (WireType::Scalar(ty), Value::Scalar(value)) => value.scalar_type() == *ty,
        (WireType::String, Value::String(_))
        | (WireType::Vector(_), Value::Vector(_))
        | (WireType::Table(_), Value::Table(_)) => true,
        (WireType::Struct(schema), Value::Struct(values)) => {
            values.len() == schema.fields.len()
                && schema
                    .fields
                    .iter()
                    .zip(values)
                    .all(|(member, value)| member.ty == value.scalar_type())
        }
        (WireType::Union(members), Value::Union(union)) => {
            union.tag != 0 && usize::from(union.tag) <= members.len()
        }
        _ => false,
    };
    if !matches {
        return Err(type_mismatch(name, ty.name(), offset));
    }
    Ok(())
}

fn encode_vector<C: ConfigCore>(
    builder: &mut TableBuilder<'_, C>,
    name: &'static str,
    element: &WireType,
    items: &[Value],
) -> Result<Position> {
    for item in items {
        check_shape(name, element, item, builder.len())?;
    }
    match element {
        WireType::Scalar(ScalarType::U8) => {
            let bytes = items
                .iter()
                .filter_map(|item| match item {
                    Value::Scalar(Scalar::U8(byte)) => Some(*byte),
                    _ => None,
                })
                .collect::<Vec<_>>();
            builder.create_byte_vector(&bytes)
        }
        WireType::Scalar(ty) => {
            let scalars = items.iter().filter_map(Value::as_scalar).collect::<Vec<_>>();
            builder.create_scalar_vector(*ty, &scalars)
        }
        WireType::Struct(schema) => {
            let members = items
                .iter()
                .filter_map(|item| match item {
                    Value::Struct(values) => Some(values.as_slice()),
                    _ => None,
                })
                .collect::<Vec<_>>();
            builder.create_struct_vector(schema, &members)
        }
        WireType::Union(_) => Err(type_mismatch(name, "a vector of tables", builder.len())),
        WireType::String | WireType::Vector(_) | WireType::Table(_) => {
            let mut children = Vec::with_capacity(items.len());
            for item in items {
                let child = match (element, item) {
                    (WireType::String, Value::String(string)) => builder.create_string(string)?,
                    (WireType::Vector(inner), Value::Vector(items)) => {
                        encode_vector(builder, name, inner, items)?
                    }
                    (WireType::Table(schema), Value::Table(table)) => {
                        encode_table(builder, schema, table)?
                    }
                    _ => return Err(type_mismatch(name, element.name(), builder.len())),
                };
                children.push(child);
            }
            builder.create_offset_vector(&children)
        }
    }
}

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            config::Configuration,
            protocol::{has_identifier, TableRef},
            schema::{FieldDescriptor, StructField, StructSchema},
            strategy::greedy,
            value::UnionValue,
        },
    };

    static VEC3: StructSchema = StructSchema::new(
        "Vec3",
        12,
        4,
        &[
            StructField::new("x", 0, ScalarType::F32),
            StructField::new("y", 4, ScalarType::F32),
            StructField::new("z", 8, ScalarType::F32),
        ],
    );

    static WEAPON: TableSchema = TableSchema::new(
        "Weapon",
        &[
            FieldDescriptor::new("name", 0, WireType::String),
            FieldDescriptor::scalar("damage", 1, ScalarType::I16).with_default(Scalar::I16(10)),
        ],
    );
    static ARMOR: TableSchema = TableSchema::new(
        "Armor",
        &[FieldDescriptor::scalar("rating", 0, ScalarType::U8)],
    );
    static WEAPONS: WireType = WireType::Table(&WEAPON);
    static PATH: WireType = WireType::Struct(&VEC3);

    static MONSTER: TableSchema = TableSchema::new(
        "Monster",
        &[
            FieldDescriptor::new("pos", 0, WireType::Struct(&VEC3)),
            FieldDescriptor::scalar("hp", 1, ScalarType::I16).with_default(Scalar::I16(100)),
            FieldDescriptor::new("weapons", 2, WireType::Vector(&WEAPONS)),
            FieldDescriptor::new("equipped", 3, WireType::Union(&[&WEAPON, &ARMOR])),
            FieldDescriptor::new("path", 5, WireType::Vector(&PATH)),
        ],
    );

    fn weapon(name: &str, damage: i16) -> TableValue {
        let mut weapon = TableValue::empty(&WEAPON);
        weapon.set(&WEAPON, "name", name);
        weapon.set(&WEAPON, "damage", Scalar::I16(damage));
        weapon
    }

    fn vec3(x: f32, y: f32, z: f32) -> Value {
        Value::Struct(vec![Scalar::F32(x), Scalar::F32(y), Scalar::F32(z)])
    }

    fn monster() -> TableValue {
        let mut monster = TableValue::empty(&MONSTER);
        monster.set(&MONSTER, "pos", vec3(1.0, 2.0, 3.0));
        monster.set(&MONSTER, "hp", Scalar::I16(80));
        monster.set(
            &MONSTER,
            "weapons",
            Value::Vector(vec![
                weapon("sword", 3).into(),
                weapon("axe", 5).into(),
                weapon("bow", 10).into(),
            ]),
        );
        monster.set(
            &MONSTER,
            "equipped",
            Value::Union(UnionValue::new(1, weapon("sword", 3))),
        );
        monster.set(
            &MONSTER,
            "path",
            Value::Vector(vec![vec3(0.0, 0.0, 0.0), vec3(1.0, 1.0, 1.0)]),
        );
        monster
    }

    #[test]
    fn unions_structs_and_nested_tables_round_trip() {
        let bytes = serialize(&MONSTER, &monster()).unwrap();
        assert_eq!(greedy::decode(bytes.as_slice(), &MONSTER), Ok(monster()));
    }

    #[test]
    fn shared_vtables_shrink_the_output() {
        let shared = serialize(&MONSTER, &monster()).unwrap();
        let config = Configuration::default().disable_vtable_dedup();
        let separate = serialize_with_config(&MONSTER, &monster(), config).unwrap();
        assert!(shared.len() < separate.len());
        assert_eq!(greedy::decode(separate.as_slice(), &MONSTER), Ok(monster()));
    }

    #[test]
    fn small_destinations_report_the_exact_size() {
        let exact = serialize(&MONSTER, &monster()).unwrap().len();
        let mut dst = vec![0u8; exact - 1];
        assert_eq!(
            write(&mut dst, &MONSTER, &monster()),
            Err(Error::BufferTooSmall {
                needed: exact,
                available: exact - 1
            })
        );

        let mut dst = vec![0u8; exact];
        assert_eq!(write(&mut dst, &MONSTER, &monster()), Ok(exact));
    }

    #[test]
    fn identifiers_follow_the_root_offset() {
        let table = weapon("mace", 7);
        let mut dst = vec![0u8; size::max_size_with_identifier(&WEAPON, &table, true).unwrap()];
        let len = write_with_identifier(&mut dst, &WEAPON, &table, *b"WEAP").unwrap();
        let bytes = &dst[..len];
        assert_eq!(&bytes[4..8], b"WEAP");
        assert!(has_identifier(bytes, b"WEAP"));
        assert!(!has_identifier(bytes, b"ARMR"));
        assert_eq!(greedy::decode(bytes, &WEAPON), Ok(table));
    }

    #[test]
    fn defaults_can_be_omitted() {
        let config = Configuration::default().omit_default_scalars();
        let table = weapon("club", 10);
        let bytes = serialize_with_config(&WEAPON, &table, config).unwrap();

        let root = TableRef::root(bytes.as_slice()).unwrap();
        assert_eq!(root.field_offset(1), Ok(None));
        assert_eq!(root.scalar::<i16>(1, 10), Ok(10));
        let decoded = greedy::decode(bytes.as_slice(), &WEAPON).unwrap();
        assert_eq!(decoded.get(1), None);
        assert_eq!(decoded.scalar(&WEAPON, "damage"), Some(Scalar::I16(10)));

        let written = serialize(&WEAPON, &table).unwrap();
        assert!(bytes.len() < written.len());
    }

    #[test]
    fn mismatched_values_are_rejected() {
        let mut table = monster();
        table.set(&MONSTER, "hp", Scalar::U16(1));
        assert!(matches!(
            serialize(&MONSTER, &table),
            Err(Error::TypeMismatch { field: "hp", .. })
        ));

        let mut table = monster();
        table.set(&MONSTER, "equipped", Value::Union(UnionValue::new(3, weapon("x", 1))));
        assert!(matches!(
            serialize(&MONSTER, &table),
            Err(Error::TypeMismatch { field: "equipped", .. })
        ));

        let mut table = monster();
        table.set(&MONSTER, "pos", Value::Struct(vec![Scalar::F32(1.0)]));
        assert!(matches!(
            serialize(&MONSTER, &table),
            Err(Error::TypeMismatch { field: "pos", .. })
        ));

        let mut table = monster();
        table.set(&MONSTER, "weapons", Value::Vector(vec!["sword".into()]));
        assert!(matches!(
            serialize(&MONSTER, &table),
            Err(Error::TypeMismatch { field: "weapons", .. })
        ));
    }
}
