//! End-to-end scenarios exercising the engine, the codec and the
//! interpreter together.

use bitloom::{Bits, Dtype, Error, FieldType, Value};

fn ints(values: &[i64]) -> Value {
    Value::List(values.iter().map(|&v| Value::from(v)).collect())
}

#[test]
fn binary_literal_with_typed_tokens() {
    let bits = Bits::from_string("0b001, u32=90, 0x5e").unwrap();
    assert_eq!(bits.len(), 3 + 32 + 8);
    // 001 | 90 as 32 bits | 0x5e, zero-padded to 48 bits.
    assert_eq!(bits.to_bytes(), vec![0x20, 0x00, 0x00, 0x05, 0xa5, 0xe0]);
}

#[test]
fn signed_round_trip_and_unsigned_reinterpretation() {
    let signed: Dtype = "i7".parse().unwrap();
    let bits = signed.pack(&Value::from(-31i64)).unwrap();
    assert_eq!(bits.len(), 7);
    assert_eq!(bits.to_bin(), "1100001");
    assert_eq!(signed.unpack(&bits).unwrap(), Value::from(-31i64));

    let unsigned: Dtype = "u7".parse().unwrap();
    assert_eq!(unsigned.unpack(&bits).unwrap(), Value::from(97i64));
}

#[test]
fn float_endianness_relations() {
    let value = Value::Float(13.5);
    let plain: Dtype = "f32".parse().unwrap();
    let big: Dtype = "f32_be".parse().unwrap();
    let little: Dtype = "f32_le".parse().unwrap();

    let be_bits = big.pack(&value).unwrap();
    assert_eq!(plain.pack(&value).unwrap(), be_bits);

    let mut reversed = be_bits.to_bytes();
    reversed.reverse();
    assert_eq!(little.pack(&value).unwrap().to_bytes(), reversed);
}

#[test]
fn expression_driven_pixel_array() {
    let text = "(w: u12, h: u12, pixels: [u8; {w * h}])";
    let mut schema = FieldType::from_string(text).unwrap();
    let pixels = ints(&[0, 1, 2, 3, 4, 5]);
    let values = Value::List(vec![Value::from(2i64), Value::from(3i64), pixels.clone()]);

    let packed = schema.pack(&values).unwrap();
    assert_eq!(packed.len(), 24 + 48);

    let mut fresh = FieldType::from_string(text).unwrap();
    assert_eq!(fresh.parse(&packed, 0).unwrap(), packed.len());
    assert_eq!(fresh.unpack().unwrap(), values);
}

#[test]
fn const_match_and_mismatch() {
    let text = "(code: const hex8 = 0x000001b3, size: u12)";
    let mut schema = FieldType::from_string(text).unwrap();

    let good = Bits::from_string("0x000001b3, u12 = 320").unwrap();
    assert_eq!(schema.parse(&good, 0).unwrap(), 44);
    // Const fields are fixed by the schema and omitted from the value
    // tree, so unpack output round-trips straight back through pack.
    let tree = schema.unpack().unwrap();
    assert_eq!(tree, Value::List(vec![Value::from(320i64)]));
    let mut fresh = FieldType::from_string(text).unwrap();
    assert_eq!(fresh.pack(&tree).unwrap(), good);

    let bad = Bits::from_string("0x010001b3, u12 = 320").unwrap();
    let err = schema.parse(&bad, 0).unwrap_err();
    assert!(err.is_const_mismatch());
    // No binding survives for the field after the failure point.
    assert!(schema.unpack().is_err());
}

#[test]
fn branch_recording_reproduces_the_input() {
    let text = "(flag: bool, if {flag}: (x: u8) else: (y: u16))";
    let mut schema = FieldType::from_string(text).unwrap();
    let input = Bits::from_string("0b1, 0x2a").unwrap();
    assert_eq!(input.len(), 9);

    assert_eq!(schema.parse(&input, 0).unwrap(), 9);
    assert_eq!(
        schema.unpack().unwrap(),
        Value::List(vec![Value::Bool(true), ints(&[42])])
    );
    assert_eq!(schema.to_bits().unwrap(), input);
}

#[test]
fn schema_round_trip_with_every_node_kind() {
    let text = "(n: u4, let wide = {n > 2}, repeat {n}: (v: u8), \
                if {wide}: (tail: u16) else: pass, pass)";
    let mut schema = FieldType::from_string(text).unwrap();
    let values = Value::List(vec![
        Value::from(3i64),
        Value::List(vec![ints(&[5]), ints(&[6]), ints(&[7])]),
        ints(&[4000]),
    ]);
    let packed = schema.pack(&values).unwrap();
    assert_eq!(packed.len(), 4 + 24 + 16);

    let mut fresh = FieldType::from_string(text).unwrap();
    assert_eq!(fresh.parse(&packed, 0).unwrap(), packed.len());
    let tree = fresh.unpack().unwrap();
    assert_eq!(
        tree,
        Value::List(vec![
            Value::from(3i64),
            Value::List(vec![ints(&[5]), ints(&[6]), ints(&[7])]),
            ints(&[4000]),
        ])
    );
    assert_eq!(fresh.to_bits().unwrap(), packed);
}

#[test]
fn stretchy_tail_consumes_the_remainder() {
    let mut schema = FieldType::from_string("(len: u8, body: bytes)").unwrap();
    let input = Bits::from_string("u8 = 2, bytes = hello").unwrap();
    assert_eq!(schema.parse(&input, 0).unwrap(), input.len());
    assert_eq!(
        schema.unpack().unwrap(),
        Value::List(vec![Value::from(2i64), Value::Bytes(b"hello".to_vec())])
    );
}

#[test]
fn errors_carry_their_family() {
    // Alignment: byte swap of a non-whole-byte builder.
    let mut m = bitloom::MutableBits::from_zeros(12);
    assert!(matches!(m.byte_swap(1), Err(Error::Alignment(_))));

    // Short input: a fixed field larger than what remains.
    let mut schema = FieldType::from_string("(a: u16)").unwrap();
    assert!(matches!(
        schema.parse(&Bits::from_zeros(8), 0),
        Err(Error::ShortInput { needed: 16, available: 8 })
    ));

    // Unresolved name: expression depends on a later binding.
    let mut schema = FieldType::from_string("(a: u{later}, later: u8)").unwrap();
    assert!(matches!(
        schema.parse(&Bits::from_zeros(16), 0),
        Err(Error::UnresolvedName(_))
    ));

    // Arithmetic: division by zero inside a size expression.
    let mut schema = FieldType::from_string("(a: u8, b: u{8 // a})").unwrap();
    assert!(matches!(
        schema.parse(&Bits::from_zeros(16), 0),
        Err(Error::Arithmetic(_))
    ));
}
