//! A contiguous, homogeneous sequence of one fixed-width dtype.

use std::fmt;

use crate::bits::Bits;
use crate::dtype::DtypeSingle;
use crate::error::{Error, Result};
use crate::mutable::MutableBits;
use crate::value::{self, Value};

/// A typed array backed by a mutable bit builder.
///
/// The buffer length is always `len() * item_bits()`; every mutation
/// preserves that invariant.
///
/// ```
/// use bitloom::{TypedArray, Value};
///
/// let mut a = TypedArray::new("u8".parse().unwrap()).unwrap();
/// a.append(&Value::from(250i64)).unwrap();
/// a.append(&Value::from(5i64)).unwrap();
/// a.add_scalar(&Value::from(5i64)).unwrap();
/// assert_eq!(a.to_bytes(), vec![255, 10]);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct TypedArray {
    item: DtypeSingle,
    data: MutableBits,
}

fn item_bits_of(item: &DtypeSingle) -> Result<usize> {
    match item.bit_length() {
        Some(n) if n > 0 => Ok(n),
        _ => Err(Error::BadDtype(format!(
            "a typed array needs a fixed-size item dtype, got '{item}'"
        ))),
    }
}

impl TypedArray {
    /// An empty array of the given item dtype.
    pub fn new(item: DtypeSingle) -> Result<TypedArray> {
        item_bits_of(&item)?;
        Ok(TypedArray {
            item,
            data: MutableBits::new(),
        })
    }

    /// An array initialised from a sequence of values.
    pub fn from_values(item: DtypeSingle, values: &[Value]) -> Result<TypedArray> {
        let mut array = TypedArray::new(item)?;
        array.extend(values)?;
        Ok(array)
    }

    /// Reinterpret raw bytes; the bit count must divide evenly into items.
    pub fn from_bytes(item: DtypeSingle, bytes: impl AsRef<[u8]>) -> Result<TypedArray> {
        let item_bits = item_bits_of(&item)?;
        let data = MutableBits::from_bytes(bytes);
        if data.len() % item_bits != 0 {
            return Err(Error::LengthMismatch {
                expected: data.len() / item_bits * item_bits,
                actual: data.len(),
            });
        }
        Ok(TypedArray { item, data })
    }

    /// The item dtype.
    pub fn dtype(&self) -> &DtypeSingle {
        &self.item
    }

    /// Bits per item.
    pub fn item_bits(&self) -> usize {
        self.item.bit_length().expect("array items are fixed-size")
    }

    /// Number of items.
    pub fn len(&self) -> usize {
        self.data.len() / self.item_bits()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    fn element(&self, i: usize) -> Result<Bits> {
        if i >= self.len() {
            return Err(Error::OutOfRange(format!(
                "index {i} out of range for an array of {}",
                self.len()
            )));
        }
        let w = self.item_bits();
        self.data.to_bits().slice(i * w, (i + 1) * w)
    }

    /// Decode the item at `i`.
    pub fn get(&self, i: usize) -> Result<Value> {
        self.item.unpack(&self.element(i)?)
    }

    /// Overwrite the item at `i`.
    pub fn set(&mut self, i: usize, value: &Value) -> Result<()> {
        if i >= self.len() {
            return Err(Error::OutOfRange(format!(
                "index {i} out of range for an array of {}",
                self.len()
            )));
        }
        let bits = self.item.pack(value)?;
        self.data.overwrite(i * self.item_bits(), &bits)?;
        Ok(())
    }

    /// Add one item at the end.
    pub fn append(&mut self, value: &Value) -> Result<()> {
        let bits = self.item.pack(value)?;
        self.data.append(&bits);
        Ok(())
    }

    /// Add each value in order.
    pub fn extend<'a>(&mut self, values: impl IntoIterator<Item = &'a Value>) -> Result<()> {
        for value in values {
            self.append(value)?;
        }
        Ok(())
    }

    /// Insert an item so that it lands at index `i`.
    pub fn insert(&mut self, i: usize, value: &Value) -> Result<()> {
        if i > self.len() {
            return Err(Error::OutOfRange(format!(
                "insert index {i} out of range for an array of {}",
                self.len()
            )));
        }
        let bits = self.item.pack(value)?;
        self.data.insert(i * self.item_bits(), &bits)?;
        Ok(())
    }

    /// Remove and return the last item.
    pub fn pop(&mut self) -> Result<Value> {
        if self.is_empty() {
            return Err(Error::OutOfRange("cannot pop from an empty array".into()));
        }
        self.remove(self.len() - 1)
    }

    /// Remove and return the item at `i`.
    pub fn remove(&mut self, i: usize) -> Result<Value> {
        let value = self.get(i)?;
        let w = self.item_bits();
        self.data.splice(i * w, (i + 1) * w, &Bits::new())?;
        Ok(value)
    }

    /// Reinterpret the underlying bits with a different item dtype,
    /// without converting any values. The buffer length must divide
    /// evenly into the new item size.
    pub fn set_dtype(&mut self, item: DtypeSingle) -> Result<()> {
        let item_bits = item_bits_of(&item)?;
        if self.data.len() % item_bits != 0 {
            return Err(Error::LengthMismatch {
                expected: self.data.len() / item_bits * item_bits,
                actual: self.data.len(),
            });
        }
        self.item = item;
        Ok(())
    }

    /// Snapshot of the underlying bits.
    pub fn to_bits(&self) -> Bits {
        self.data.to_bits()
    }

    /// The underlying bits as bytes, zero-padded at the tail.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.data.to_bytes()
    }

    /// Decode every item.
    pub fn unpack(&self) -> Result<Vec<Value>> {
        (0..self.len()).map(|i| self.get(i)).collect()
    }

    fn map_elements(&mut self, f: impl Fn(&Value) -> Result<Value>) -> Result<()> {
        for i in 0..self.len() {
            let updated = f(&self.get(i)?)?;
            self.set(i, &updated)?;
        }
        Ok(())
    }

    /// Add a scalar to every item in place.
    pub fn add_scalar(&mut self, operand: &Value) -> Result<()> {
        self.map_elements(|v| value::add_values(v, operand))
    }

    /// Subtract a scalar from every item in place.
    pub fn sub_scalar(&mut self, operand: &Value) -> Result<()> {
        self.map_elements(|v| value::sub_values(v, operand))
    }

    /// Multiply every item by a scalar in place.
    pub fn mul_scalar(&mut self, operand: &Value) -> Result<()> {
        self.map_elements(|v| value::mul_values(v, operand))
    }

    /// Divide every item by a scalar in place (floor division for
    /// integers).
    pub fn div_scalar(&mut self, operand: &Value) -> Result<()> {
        self.map_elements(|v| value::div_values(v, operand))
    }
}

impl fmt::Display for TypedArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{};] = [", self.item)?;
        for i in 0..self.len() {
            if i > 0 {
                write!(f, ", ")?;
            }
            match self.get(i) {
                Ok(v) => write!(f, "{v}")?,
                Err(_) => write!(f, "?")?,
            }
        }
        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dtype::Dtype;

    fn u8_dtype() -> DtypeSingle {
        match Dtype::from_string("u8").unwrap() {
            Dtype::Single(s) => s,
            _ => unreachable!(),
        }
    }

    fn ints(values: &[i64]) -> Vec<Value> {
        values.iter().map(|&v| Value::from(v)).collect()
    }

    #[test]
    fn construction_and_invariant() {
        let a = TypedArray::from_values(u8_dtype(), &ints(&[1, 2, 3])).unwrap();
        assert_eq!(a.len(), 3);
        assert_eq!(a.to_bits().len(), a.len() * a.item_bits());
        assert_eq!(a.to_bytes(), vec![1, 2, 3]);
    }

    #[test]
    fn item_dtype_must_be_sized() {
        let dynamic = match Dtype::from_string("u").unwrap() {
            Dtype::Single(s) => s,
            _ => unreachable!(),
        };
        assert!(TypedArray::new(dynamic).unwrap_err().is_bad_dtype());
    }

    #[test]
    fn get_set_append_insert() {
        let mut a = TypedArray::from_values(u8_dtype(), &ints(&[10, 30])).unwrap();
        a.insert(1, &Value::from(20i64)).unwrap();
        a.append(&Value::from(40i64)).unwrap();
        assert_eq!(a.to_bytes(), vec![10, 20, 30, 40]);
        a.set(0, &Value::from(11i64)).unwrap();
        assert_eq!(a.get(0).unwrap(), Value::from(11i64));
        assert!(a.get(4).unwrap_err().is_out_of_range());
        assert!(a.insert(9, &Value::from(0i64)).unwrap_err().is_out_of_range());
    }

    #[test]
    fn pop_and_remove() {
        let mut a = TypedArray::from_values(u8_dtype(), &ints(&[1, 2, 3])).unwrap();
        assert_eq!(a.pop().unwrap(), Value::from(3i64));
        assert_eq!(a.remove(0).unwrap(), Value::from(1i64));
        assert_eq!(a.unpack().unwrap(), ints(&[2]));
        a.pop().unwrap();
        assert!(a.pop().unwrap_err().is_out_of_range());
    }

    #[test]
    fn reinterpreting_the_buffer() {
        let mut a = TypedArray::from_values(u8_dtype(), &ints(&[0x12, 0x34])).unwrap();
        let u16_dtype = match Dtype::from_string("u16").unwrap() {
            Dtype::Single(s) => s,
            _ => unreachable!(),
        };
        a.set_dtype(u16_dtype).unwrap();
        assert_eq!(a.len(), 1);
        assert_eq!(a.get(0).unwrap(), Value::from(0x1234i64));

        let u12 = match Dtype::from_string("u12").unwrap() {
            Dtype::Single(s) => s,
            _ => unreachable!(),
        };
        assert!(a.set_dtype(u12).unwrap_err().is_length_mismatch());
    }

    #[test]
    fn from_bytes_checks_divisibility() {
        let u12 = match Dtype::from_string("u12").unwrap() {
            Dtype::Single(s) => s,
            _ => unreachable!(),
        };
        let a = TypedArray::from_bytes(u12.clone(), [0x12, 0x34, 0x56]).unwrap();
        assert_eq!(a.len(), 2);
        assert_eq!(a.unpack().unwrap(), ints(&[0x123, 0x456]));
        assert!(TypedArray::from_bytes(u12, [0x12, 0x34]).unwrap_err().is_length_mismatch());
    }

    #[test]
    fn element_wise_arithmetic() {
        let mut a = TypedArray::from_values(u8_dtype(), &ints(&[10, 20, 30])).unwrap();
        a.add_scalar(&Value::from(5i64)).unwrap();
        assert_eq!(a.to_bytes(), vec![15, 25, 35]);
        a.sub_scalar(&Value::from(5i64)).unwrap();
        a.mul_scalar(&Value::from(3i64)).unwrap();
        assert_eq!(a.to_bytes(), vec![30, 60, 90]);
        a.div_scalar(&Value::from(7i64)).unwrap();
        assert_eq!(a.to_bytes(), vec![4, 8, 12]);
    }

    #[test]
    fn overflow_during_arithmetic_is_reported() {
        let mut a = TypedArray::from_values(u8_dtype(), &ints(&[250])).unwrap();
        let err = a.add_scalar(&Value::from(10i64)).unwrap_err();
        assert!(err.is_out_of_range());
    }
}
