use {
    criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput},
    flatwire::{
        scalar::{Scalar, ScalarType},
        schema::{FieldDescriptor, TableSchema, WireType},
        strategy::{greedy, lazy::LazyTable, mutable::MutableTable},
        value::{TableValue, Value},
        writer,
    },
    std::hint::black_box,
};

static BYTE: WireType = WireType::Scalar(ScalarType::U8);
static ORDERS: WireType = WireType::Table(&ORDER);

static ORDER: TableSchema = TableSchema::new(
    "Order",
    &[
        FieldDescriptor::scalar("id", 0, ScalarType::U64),
        FieldDescriptor::scalar("price", 1, ScalarType::F64),
        FieldDescriptor::scalar("quantity", 2, ScalarType::U32),
        FieldDescriptor::new("symbol", 3, WireType::String),
    ],
);

static BOOK: TableSchema = TableSchema::new(
    "Book",
    &[
        FieldDescriptor::scalar("sequence", 0, ScalarType::U64),
        FieldDescriptor::new("orders", 1, WireType::Vector(&ORDERS)),
        FieldDescriptor::new("checksum", 2, WireType::Vector(&BYTE)),
    ],
);

fn book(orders: usize) -> TableValue {
    let orders = (0..orders)
        .map(|i| {
            let mut order = TableValue::empty(&ORDER);
            order.set(&ORDER, "id", Scalar::U64(i as u64));
            order.set(&ORDER, "price", Scalar::F64(100.0 + i as f64 / 8.0));
            order.set(&ORDER, "quantity", Scalar::U32(i as u32 % 50));
            order.set(&ORDER, "symbol", "FLAT");
            order.into()
        })
        .collect();
    let mut book = TableValue::empty(&BOOK);
    book.set(&BOOK, "sequence", Scalar::U64(7));
    book.set(&BOOK, "orders", Value::Vector(orders));
    book.set(&BOOK, "checksum", Value::bytes(&[0xab; 32]));
    book
}

fn bench_write(c: &mut Criterion) {
    let mut group = c.benchmark_group("Write");
    for orders in [16, 1024] {
        let table = book(orders);
        let mut buffer = vec![0u8; writer::max_size(&BOOK, &table).unwrap()];
        group.throughput(Throughput::Elements(orders as u64));
        group.bench_with_input(BenchmarkId::new("write", orders), &table, |b, table| {
            b.iter(|| writer::write(black_box(&mut buffer), &BOOK, black_box(table)).unwrap())
        });
        group.bench_with_input(BenchmarkId::new("max_size", orders), &table, |b, table| {
            b.iter(|| writer::max_size(&BOOK, black_box(table)).unwrap())
        });
    }
    group.finish();
}

fn bench_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("Read");
    for orders in [16, 1024] {
        let mut bytes = writer::serialize(&BOOK, &book(orders)).unwrap();
        group.throughput(Throughput::Bytes(bytes.len() as u64));

        group.bench_function(BenchmarkId::new("greedy", orders), |b| {
            b.iter(|| greedy::decode(black_box(bytes.as_slice()), &BOOK).unwrap())
        });

        // One field of one element, the case lazy decoding is for.
        group.bench_function(BenchmarkId::new("lazy/single_field", orders), |b| {
            b.iter(|| {
                let root = LazyTable::root(black_box(bytes.as_slice()), &BOOK).unwrap();
                let orders = root.vector("orders").unwrap().unwrap();
                let last = orders.get(orders.len() - 1).unwrap().as_table().unwrap();
                last.scalar::<f64>("price").unwrap()
            })
        });

        group.bench_function(BenchmarkId::new("lazy/cached_scan", orders), |b| {
            b.iter(|| {
                let root = LazyTable::root(black_box(bytes.as_slice()), &BOOK).unwrap();
                let orders = root.vector("orders").unwrap().unwrap().cached();
                (0..orders.len())
                    .map(|i| {
                        let order = orders.get(i).unwrap().as_table().unwrap();
                        u64::from(order.scalar::<u32>("quantity").unwrap())
                    })
                    .sum::<u64>()
            })
        });

        group.bench_function(BenchmarkId::new("mutable/set", orders), |b| {
            b.iter(|| {
                let mut root = MutableTable::root(black_box(&mut bytes), &BOOK).unwrap();
                root.set("sequence", 8u64).unwrap();
            })
        });
    }
    group.finish();
}

criterion_group!(benches, bench_write, bench_read);
criterion_main!(benches);
