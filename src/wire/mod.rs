//! Wire codec: encode/decode the typed records carried in procedure bodies.
//!
//! Every integer is big-endian. Strings and opaque blobs are length-prefixed,
//! never null-terminated. `optional<T>` is a one-byte boolean discriminant
//! followed by the value when present. Variable-length arrays are capped by
//! per-field maxima (see [`caps`]) enforced *before* any allocation proportional
//! to the claimed length, so a hostile length prefix cannot be used to force a
//! large allocation.
//!
//! Decoded values own their storage (`String`, `Vec<u8>`); there is no
//! separate teardown pass to run after a handler returns, since `Drop` frees
//! everything once the argument struct goes out of scope.

pub mod caps;

use thiserror::Error;

/// Errors raised while decoding or encoding a wire value.
#[derive(Debug, Error)]
pub enum WireError {
    /// The buffer ended before the value could be fully read.
    #[error("unexpected end of buffer while decoding")]
    UnexpectedEof,
    /// A variable-length array or string exceeded its declared cap.
    #[error("{field} length {actual} exceeds cap {max}")]
    CapExceeded {
        /// Name of the field whose cap was exceeded.
        field: &'static str,
        /// The cap that was exceeded.
        max: usize,
        /// The length the client claimed.
        actual: usize,
    },
    /// A string was not valid UTF-8.
    #[error("string field is not valid utf-8")]
    InvalidUtf8,
    /// A tagged union carried a discriminant with no matching variant.
    #[error("unknown discriminant {0} for tagged union")]
    UnknownDiscriminant(u32),
    /// A boolean-discriminated value carried neither 0 nor 1.
    #[error("invalid boolean discriminant {0}")]
    InvalidBool(u32),
}

/// Cursor over an immutable byte slice, used to decode one request body.
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    /// Wrap `buf` for decoding starting at offset zero.
    #[must_use]
    pub const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// Bytes remaining to be consumed.
    #[must_use]
    pub const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], WireError> {
        if self.remaining() < n {
            return Err(WireError::UnexpectedEof);
        }
        let Some(slice) = self.buf.get(self.pos..self.pos + n) else {
            return Err(WireError::UnexpectedEof);
        };
        self.pos += n;
        Ok(slice)
    }

    /// Read a big-endian `u32`.
    pub fn read_u32(&mut self) -> Result<u32, WireError> {
        let bytes = self.take(4)?;
        let mut array = [0_u8; 4];
        array.copy_from_slice(bytes);
        Ok(u32::from_be_bytes(array))
    }

    /// Read a big-endian `i32`.
    pub fn read_i32(&mut self) -> Result<i32, WireError> {
        let bytes = self.take(4)?;
        let mut array = [0_u8; 4];
        array.copy_from_slice(bytes);
        Ok(i32::from_be_bytes(array))
    }

    /// Read a big-endian `u64`.
    pub fn read_u64(&mut self) -> Result<u64, WireError> {
        let bytes = self.take(8)?;
        let mut array = [0_u8; 8];
        array.copy_from_slice(bytes);
        Ok(u64::from_be_bytes(array))
    }

    /// Read a big-endian `i64`.
    pub fn read_i64(&mut self) -> Result<i64, WireError> {
        let bytes = self.take(8)?;
        let mut array = [0_u8; 8];
        array.copy_from_slice(bytes);
        Ok(i64::from_be_bytes(array))
    }

    /// Read an IEEE-754 double.
    pub fn read_f64(&mut self) -> Result<f64, WireError> {
        self.read_u64().map(f64::from_bits)
    }

    /// Read a boolean discriminant (must be exactly 0 or 1).
    pub fn read_bool(&mut self) -> Result<bool, WireError> {
        match self.read_u32()? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(WireError::InvalidBool(other)),
        }
    }

    /// Read a fixed-width opaque blob of exactly `n` bytes (e.g. a UUID).
    pub fn read_fixed_opaque<const N: usize>(&mut self) -> Result<[u8; N], WireError> {
        let bytes = self.take(N)?;
        let mut out = [0_u8; N];
        out.copy_from_slice(bytes);
        Ok(out)
    }

    /// Read a length-prefixed variable-length opaque blob, capped at `max`.
    pub fn read_var_opaque(&mut self, field: &'static str, max: usize) -> Result<Vec<u8>, WireError> {
        let len = self.read_u32()? as usize;
        if len > max {
            return Err(WireError::CapExceeded {
                field,
                max,
                actual: len,
            });
        }
        Ok(self.take(len)?.to_vec())
    }

    /// Read a length-prefixed UTF-8 string, capped at `max` bytes.
    pub fn read_string(&mut self, field: &'static str, max: usize) -> Result<String, WireError> {
        let raw = self.read_var_opaque(field, max)?;
        String::from_utf8(raw).map_err(|_| WireError::InvalidUtf8)
    }

    /// Read `optional<T>`: a boolean discriminant followed by the value.
    pub fn read_option<T>(
        &mut self,
        inner: impl FnOnce(&mut Self) -> Result<T, WireError>,
    ) -> Result<Option<T>, WireError> {
        if self.read_bool()? {
            Ok(Some(inner(self)?))
        } else {
            Ok(None)
        }
    }

    /// Read a length-prefixed variable array, capped at `max` entries, each
    /// decoded by `item`. The cap is checked before any per-item allocation.
    pub fn read_var_array<T>(
        &mut self,
        field: &'static str,
        max: usize,
        mut item: impl FnMut(&mut Self) -> Result<T, WireError>,
    ) -> Result<Vec<T>, WireError> {
        let len = self.read_u32()? as usize;
        if len > max {
            return Err(WireError::CapExceeded {
                field,
                max,
                actual: len,
            });
        }
        let mut out = Vec::with_capacity(len);
        for _ in 0..len {
            out.push(item(self)?);
        }
        Ok(out)
    }
}

/// Accumulator for encoding one reply body.
#[derive(Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    /// Start an empty writer.
    #[must_use]
    pub const fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Consume the writer, returning the encoded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    /// Write a big-endian `u32`.
    pub fn write_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a big-endian `i32`.
    pub fn write_i32(&mut self, value: i32) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a big-endian `u64`.
    pub fn write_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write a big-endian `i64`.
    pub fn write_i64(&mut self, value: i64) {
        self.buf.extend_from_slice(&value.to_be_bytes());
    }

    /// Write an IEEE-754 double.
    pub fn write_f64(&mut self, value: f64) {
        self.write_u64(value.to_bits());
    }

    /// Write a boolean discriminant.
    pub fn write_bool(&mut self, value: bool) {
        self.write_u32(u32::from(value));
    }

    /// Write a fixed-width opaque blob verbatim (no length prefix).
    pub fn write_fixed_opaque(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Write a length-prefixed variable-length opaque blob.
    ///
    /// # Panics
    ///
    /// Panics if `bytes` is longer than `u32::MAX` — callers are expected to
    /// have already checked a field-specific cap well below that bound.
    #[expect(
        clippy::expect_used,
        reason = "field caps are well below u32::MAX and checked at decode time"
    )]
    pub fn write_var_opaque(&mut self, bytes: &[u8]) {
        self.write_u32(u32::try_from(bytes.len()).expect("wire buffer fits in u32"));
        self.buf.extend_from_slice(bytes);
    }

    /// Write a length-prefixed UTF-8 string.
    pub fn write_string(&mut self, value: &str) {
        self.write_var_opaque(value.as_bytes());
    }

    /// Write `optional<T>` as a boolean discriminant followed by the value.
    pub fn write_option<T>(&mut self, value: Option<&T>, inner: impl FnOnce(&mut Self, &T)) {
        match value {
            Some(v) => {
                self.write_bool(true);
                inner(self, v);
            }
            None => self.write_bool(false),
        }
    }

    /// Write a length-prefixed variable array.
    ///
    /// # Panics
    ///
    /// Panics if `items` is longer than `u32::MAX`.
    #[expect(
        clippy::expect_used,
        reason = "field caps are well below u32::MAX and checked at decode time"
    )]
    pub fn write_var_array<T>(&mut self, items: &[T], mut item: impl FnMut(&mut Self, &T)) {
        self.write_u32(u32::try_from(items.len()).expect("wire array fits in u32"));
        for value in items {
            item(self, value);
        }
    }
}

/// Discriminated scheduler-parameter value (`SchedParamValue`), tagged by an
/// explicit discriminant at decode time — unknown discriminants are rejected
/// rather than silently coerced.
#[derive(Debug, Clone, PartialEq)]
pub enum SchedParamValue {
    /// Signed 32-bit value.
    Int(i32),
    /// Unsigned 32-bit value.
    Uint(u32),
    /// Signed 64-bit value.
    Llong(i64),
    /// Unsigned 64-bit value.
    Ullong(u64),
    /// Double-precision value.
    Double(f64),
    /// Boolean value.
    Boolean(bool),
}

impl SchedParamValue {
    const DISC_INT: u32 = 1;
    const DISC_UINT: u32 = 2;
    const DISC_LLONG: u32 = 3;
    const DISC_ULLONG: u32 = 4;
    const DISC_DOUBLE: u32 = 5;
    const DISC_BOOLEAN: u32 = 6;

    /// Decode a discriminant followed by the matching variant body.
    pub fn decode(reader: &mut Reader<'_>) -> Result<Self, WireError> {
        let disc = reader.read_u32()?;
        match disc {
            Self::DISC_INT => Ok(Self::Int(reader.read_i32()?)),
            Self::DISC_UINT => Ok(Self::Uint(reader.read_u32()?)),
            Self::DISC_LLONG => Ok(Self::Llong(reader.read_i64()?)),
            Self::DISC_ULLONG => Ok(Self::Ullong(reader.read_u64()?)),
            Self::DISC_DOUBLE => Ok(Self::Double(reader.read_f64()?)),
            Self::DISC_BOOLEAN => Ok(Self::Boolean(reader.read_bool()?)),
            other => Err(WireError::UnknownDiscriminant(other)),
        }
    }

    /// Encode the discriminant followed by the variant body.
    pub fn encode(&self, writer: &mut Writer) {
        match *self {
            Self::Int(v) => {
                writer.write_u32(Self::DISC_INT);
                writer.write_i32(v);
            }
            Self::Uint(v) => {
                writer.write_u32(Self::DISC_UINT);
                writer.write_u32(v);
            }
            Self::Llong(v) => {
                writer.write_u32(Self::DISC_LLONG);
                writer.write_i64(v);
            }
            Self::Ullong(v) => {
                writer.write_u32(Self::DISC_ULLONG);
                writer.write_u64(v);
            }
            Self::Double(v) => {
                writer.write_u32(Self::DISC_DOUBLE);
                writer.write_f64(v);
            }
            Self::Boolean(v) => {
                writer.write_u32(Self::DISC_BOOLEAN);
                writer.write_bool(v);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn round_trips_header_like_integers() {
        let mut w = Writer::new();
        w.write_u32(0xdead_beef);
        w.write_i32(-7);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_u32().unwrap(), 0xdead_beef);
        assert_eq!(r.read_i32().unwrap(), -7);
    }

    #[test]
    fn string_round_trips() {
        let mut w = Writer::new();
        w.write_string("vm1");
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(r.read_string("name", 64).unwrap(), "vm1");
    }

    #[test]
    fn empty_var_array_needs_no_allocation_signal() {
        let mut w = Writer::new();
        w.write_var_array::<u32>(&[], |w, v| w.write_u32(*v));
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let items = r.read_var_array("ids", 10, |r| r.read_u32()).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn cap_exceeded_rejected_before_reading_items() {
        let mut w = Writer::new();
        w.write_u32(5); // claims 5 items but provides none
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let err = r.read_var_array("ids", 2, |r| r.read_u32()).unwrap_err();
        assert!(matches!(err, WireError::CapExceeded { max: 2, actual: 5, .. }));
    }

    #[test]
    fn option_none_round_trips() {
        let mut w = Writer::new();
        w.write_option::<String>(None, |w, v| w.write_string(v));
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let value = r.read_option(|r| r.read_string("x", 8)).unwrap();
        assert_eq!(value, None);
    }

    #[rstest]
    #[case(SchedParamValue::Int(-3))]
    #[case(SchedParamValue::Uint(3))]
    #[case(SchedParamValue::Llong(-7))]
    #[case(SchedParamValue::Ullong(7))]
    #[case(SchedParamValue::Double(1.5))]
    #[case(SchedParamValue::Boolean(true))]
    fn sched_param_value_round_trips(#[case] value: SchedParamValue) {
        let mut w = Writer::new();
        value.encode(&mut w);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        assert_eq!(SchedParamValue::decode(&mut r).unwrap(), value);
    }

    #[test]
    fn unknown_discriminant_is_rejected() {
        let mut w = Writer::new();
        w.write_u32(99);
        let bytes = w.into_bytes();
        let mut r = Reader::new(&bytes);
        let err = SchedParamValue::decode(&mut r).unwrap_err();
        assert!(matches!(err, WireError::UnknownDiscriminant(99)));
    }
}
