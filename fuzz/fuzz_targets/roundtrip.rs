#![no_main]

use {
    flatwire::{
        scalar::{Scalar, ScalarType},
        schema::{FieldDescriptor, TableSchema, WireType},
        strategy::{greedy, lazy::LazyTable, mutable::MutableTable},
        value::{TableValue, UnionValue, Value},
        writer,
    },
    libfuzzer_sys::fuzz_target,
};

static BYTE: WireType = WireType::Scalar(ScalarType::U8);
static LONG: WireType = WireType::Scalar(ScalarType::I64);
static WORD: WireType = WireType::String;
static ITEMS: WireType = WireType::Table(&ITEM);

static ITEM: TableSchema = TableSchema::new(
    "Item",
    &[
        FieldDescriptor::scalar("count", 0, ScalarType::U32),
        FieldDescriptor::scalar("delta", 1, ScalarType::I16).with_default(Scalar::I16(-1)),
        FieldDescriptor::new("label", 2, WireType::String),
        FieldDescriptor::new("blob", 3, WireType::Vector(&BYTE)),
        FieldDescriptor::new("totals", 4, WireType::Vector(&LONG)),
        FieldDescriptor::new("words", 5, WireType::Vector(&WORD)),
        FieldDescriptor::new("items", 6, WireType::Vector(&ITEMS)),
        FieldDescriptor::new("extra", 7, WireType::Union(&[&ITEM])),
    ],
);

/// Build a table graph from fuzzer bytes, consuming them front to back.
fn item(data: &mut &[u8], depth: usize) -> TableValue {
    let mut take = |n: usize| {
        let remaining: &[u8] = *data;
        let (head, rest) = remaining.split_at(n.min(remaining.len()));
        *data = rest;
        head
    };
    let mask = take(1).first().copied().unwrap_or(0);
    let mut table = TableValue::empty(&ITEM);
    if mask & 1 != 0 {
        let mut raw = [0; 4];
        let bytes = take(4);
        raw[..bytes.len()].copy_from_slice(bytes);
        table.set(&ITEM, "count", Scalar::U32(u32::from_le_bytes(raw)));
    }
    if mask & 2 != 0 {
        let raw = take(2);
        table.set(&ITEM, "delta", Scalar::I16(i16::from(*raw.first().unwrap_or(&0) as i8)));
    }
    if mask & 4 != 0 {
        let len = usize::from(take(1).first().copied().unwrap_or(0) % 16);
        table.set(&ITEM, "label", String::from_utf8_lossy(take(len)).into_owned());
    }
    if mask & 8 != 0 {
        let len = usize::from(take(1).first().copied().unwrap_or(0) % 32);
        table.set(&ITEM, "blob", Value::bytes(take(len)));
    }
    if mask & 16 != 0 {
        let totals = take(16)
            .chunks(2)
            .map(|pair| {
                let high = i64::from(pair[0]) << 32;
                Scalar::I64(high | i64::from(pair[pair.len() - 1])).into()
            })
            .collect();
        table.set(&ITEM, "totals", Value::Vector(totals));
    }
    if mask & 32 != 0 {
        let words = take(3)
            .iter()
            .map(|len| Value::String("w".repeat(usize::from(len % 5))))
            .collect();
        table.set(&ITEM, "words", Value::Vector(words));
    }
    if depth < 4 && mask & 64 != 0 {
        let count = usize::from(take(1).first().copied().unwrap_or(0) % 3);
        let items = (0..count).map(|_| item(data, depth + 1).into()).collect();
        table.set(&ITEM, "items", Value::Vector(items));
    }
    if depth < 4 && mask & 128 != 0 {
        let member = item(data, depth + 1);
        table.set(&ITEM, "extra", Value::Union(UnionValue::new(1, member)));
    }
    table
}

fuzz_target!(|data: &[u8]| {
    let mut input = data;
    let table = item(&mut input, 0);

    let bound = writer::max_size(&ITEM, &table).unwrap();
    let mut bytes = writer::serialize(&ITEM, &table).unwrap();
    assert!(bytes.len() <= bound);

    assert_eq!(greedy::decode(bytes.as_slice(), &ITEM).unwrap(), table);
    let lazy = LazyTable::root(bytes.as_slice(), &ITEM).unwrap();
    assert_eq!(lazy.to_owned_value().unwrap(), table);

    if table.get(0).is_some() {
        let mut root = MutableTable::root(&mut bytes, &ITEM).unwrap();
        root.set("count", 42u32).unwrap();
        let fresh = LazyTable::root(bytes.as_slice(), &ITEM).unwrap();
        assert_eq!(fresh.scalar::<u32>("count").unwrap(), 42);
    }
});
