use criterion::{black_box, criterion_group, criterion_main, Criterion};

use bitloom::{Bits, Dtype, FieldType, Value};

fn bench_find(c: &mut Criterion) {
    let haystack = Bits::from_random(1 << 16, Some(0x42));
    let needle = haystack.slice(50_000, 50_040).unwrap();
    c.bench_function("find_40_bit_pattern_in_64k", |b| {
        b.iter(|| black_box(haystack.find(black_box(&needle), 0, false)))
    });
}

fn bench_logic(c: &mut Criterion) {
    let a = Bits::from_random(1 << 16, Some(1));
    let b = Bits::from_random(1 << 16, Some(2));
    c.bench_function("xor_64k_bits", |bencher| {
        bencher.iter(|| black_box(a.xor(black_box(&b)).unwrap()))
    });
}

fn bench_dtype_pack(c: &mut Criterion) {
    let dtype: Dtype = "[u12; 256]".parse().unwrap();
    let values = Value::List((0..256i64).map(Value::from).collect());
    c.bench_function("pack_256_u12", |b| {
        b.iter(|| black_box(dtype.pack(black_box(&values)).unwrap()))
    });
}

fn bench_schema_parse(c: &mut Criterion) {
    let mut schema =
        FieldType::from_string("(w: u12, h: u12, pixels: [u8; {w * h}])").unwrap();
    let input = schema
        .build(&Value::List(vec![
            Value::from(16i64),
            Value::from(16i64),
            Value::List((0..256i64).map(|i| Value::from(i % 256)).collect()),
        ]))
        .unwrap();
    c.bench_function("parse_expression_driven_schema", |b| {
        b.iter(|| black_box(schema.parse(black_box(&input), 0).unwrap()))
    });
}

criterion_group!(
    benches,
    bench_find,
    bench_logic,
    bench_dtype_pack,
    bench_schema_parse
);
criterion_main!(benches);
