#![no_main]

use {
    flatwire::{
        config::Configuration,
        scalar::ScalarType,
        schema::{FieldDescriptor, StructField, StructSchema, TableSchema, WireType},
        strategy::{greedy, lazy::LazyTable},
    },
    libfuzzer_sys::fuzz_target,
};

static PAIR: StructSchema = StructSchema::new(
    "Pair",
    8,
    4,
    &[
        StructField::new("a", 0, ScalarType::U32),
        StructField::new("b", 4, ScalarType::F32),
    ],
);
static BYTE: WireType = WireType::Scalar(ScalarType::U8);
static WORD: WireType = WireType::String;
static PAIRS: WireType = WireType::Struct(&PAIR);
static NODES: WireType = WireType::Table(&NODE);

static NODE: TableSchema = TableSchema::new(
    "Node",
    &[
        FieldDescriptor::scalar("id", 0, ScalarType::U64),
        FieldDescriptor::scalar("flag", 1, ScalarType::Bool),
        FieldDescriptor::new("name", 2, WireType::String),
        FieldDescriptor::new("blob", 3, WireType::Vector(&BYTE)),
        FieldDescriptor::new("words", 4, WireType::Vector(&WORD)),
        FieldDescriptor::new("pairs", 5, WireType::Vector(&PAIRS)),
        FieldDescriptor::new("pair", 6, WireType::Struct(&PAIR)),
        FieldDescriptor::new("children", 7, WireType::Vector(&NODES)),
        FieldDescriptor::new("next", 8, WireType::Union(&[&NODE])),
    ],
);

fuzz_target!(|data: &[u8]| {
    // Arbitrary bytes must decode or fail with an error, never panic or recurse unbounded.
    // Shared children expand once per reference, so the table budget keeps each run short.
    let config = Configuration::default()
        .enable_alignment_check()
        .with_max_depth::<32>()
        .with_max_tables::<4096>();
    let greedy = greedy::decode_with_config(data, &NODE, config);

    let trusting = Configuration::default()
        .disable_alignment_check()
        .with_max_tables::<4096>();
    let _ = greedy::decode_with_config(data, &NODE, trusting);

    if let Ok(lazy) = LazyTable::root_with_config(data, &NODE, config) {
        for position in 0..NODE.fields.len() {
            let _ = lazy.get_at(position);
        }
        if let Ok(Some(children)) = lazy.vector("children") {
            children.iter().for_each(drop);
        }
        // Both strategies walk the same validation, so they agree on success.
        assert_eq!(lazy.to_owned_value().is_ok(), greedy.is_ok());
    }
});
