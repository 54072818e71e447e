//! flatwire is a zero-copy reader and back-to-front writer for vtable-indexed binary tables.
//!
//! A message is a graph of tables laid out in one contiguous byte buffer. Every table starts
//! with a signed offset to its vtable, which maps field slots to byte offsets inside the
//! table. Absent fields cost nothing on the wire, readers substitute their schema default, and
//! any field can be read without touching the rest of the message.
//!
//! # Quickstart
//!
//! Schemas are plain `static` descriptors. Recursive and mutually referencing schemas work
//! because statics can refer to each other.
//!
//! ```
//! use flatwire::{
//!     scalar::{Scalar, ScalarType},
//!     schema::{FieldDescriptor, TableSchema, WireType},
//!     strategy::{greedy, lazy::LazyTable, mutable::MutableTable},
//!     value::{TableValue, Value},
//!     writer,
//! };
//!
//! static BYTE: WireType = WireType::Scalar(ScalarType::U8);
//! static SAMPLE: TableSchema = TableSchema::new(
//!     "Sample",
//!     &[
//!         FieldDescriptor::scalar("a", 0, ScalarType::U32),
//!         FieldDescriptor::new("b", 1, WireType::String),
//!         FieldDescriptor::new("c", 2, WireType::Vector(&BYTE)),
//!     ],
//! );
//!
//! let mut table = TableValue::empty(&SAMPLE);
//! table.set(&SAMPLE, "a", Scalar::U32(7));
//! table.set(&SAMPLE, "b", "hi");
//! table.set(&SAMPLE, "c", Value::bytes(&[1, 2, 3]));
//!
//! let mut bytes = writer::serialize(&SAMPLE, &table).unwrap();
//!
//! // Lazy: nothing is decoded until a field is asked for.
//! let lazy = LazyTable::root(bytes.as_slice(), &SAMPLE).unwrap();
//! assert_eq!(lazy.scalar::<u32>("a"), Ok(7));
//! assert_eq!(lazy.string("b").unwrap().as_deref(), Some("hi"));
//!
//! // Greedy: an owned graph that outlives the buffer.
//! assert_eq!(greedy::decode(bytes.as_slice(), &SAMPLE).unwrap(), table);
//!
//! // Mutable: same-width scalar writes straight into the buffer.
//! MutableTable::root(&mut bytes, &SAMPLE).unwrap().set("a", 8u32).unwrap();
//! let updated = greedy::decode(bytes.as_slice(), &SAMPLE).unwrap();
//! assert_eq!(updated.scalar(&SAMPLE, "a"), Some(Scalar::U32(8)));
//! ```
//!
//! # Wire format
//!
//! All integers are little-endian and every scalar is aligned to its own width.
//!
//! |Object|Layout|
//! |---|---|
//! |Root|`u32` uoffset to the root table, then an optional 4-byte file identifier|
//! |Table|`i32` soffset (`vtable = table - soffset`) followed by the inline fields|
//! |VTable|`u16` vtable length, `u16` table length, one `u16` entry per slot (0 = absent)|
//! |String|`u32` byte count, UTF-8 bytes, NUL|
//! |Vector|`u32` element count, then inline elements or `u32` uoffsets|
//!
//! A uoffset is relative to its own position and always points forward. Every offset read
//! from a buffer is validated before use: hostile input fails with an [`Error`] carrying the
//! offending position instead of reading out of bounds.
//!
//! # Buffers
//!
//! Readers are generic over [`InputBuffer`](io::InputBuffer) and writers over
//! [`OutputBuffer`](io::OutputBuffer). Slices, vectors, boxed and shared slices implement
//! both capability traits; [`SegmentedBuffer`](io::SegmentedBuffer) stitches reads across
//! several allocations and [`PooledBuffer`](io::PooledBuffer) tracks recycling so stale views
//! fail with [`Error::UseAfterRecycle`].
//!
//! # Configuration
//!
//! Checks and writer behavior are selected at compile time through
//! [`Configuration`](config::Configuration). Every entry point has a `*_with_config` variant.
//!
//! # Features
//!
//! |Feature|Description|
//! |---|---|
//! |`bytes`|`bytes::Bytes` and `bytes::BytesMut` backends|
//! |`mmap`|`memmap2::Mmap` and `memmap2::MmapMut` backends|
//! |`serde`|`Serialize` / `Deserialize` for owned values|
#![cfg_attr(docsrs, feature(doc_cfg))]

pub mod codec;
pub mod config;
pub mod error;
pub use error::{Error, Result};
pub mod io;
pub mod protocol;
pub mod scalar;
pub mod schema;
pub mod strategy;
pub mod value;
pub mod writer;
#[cfg(test)]
mod proptest_config;
